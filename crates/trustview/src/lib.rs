//! TrustView — evidence-based trust views of the Web PKI.
//!
//! Maintains a local, evolving judgment of which certificate authorities
//! and end-entity certificates to trust: CertainTrust opinions over CA
//! keys, a trust path validation engine that consults and reinforces them,
//! request policy with retried transactions, and CRL/OCSP revocation
//! checking with a background refresh.

pub mod certificate;
pub mod config;
pub mod engine;
pub mod error;
pub mod opinion;
pub mod retry;
pub mod revocation;
pub mod storage;
pub mod time;
pub mod validation;
pub mod view;

// Re-export primary types
pub use certificate::{CertificateDetails, TrustCertificate};
pub use config::{Configuration, SecurityLevel};
pub use engine::TrustEngine;
pub use error::{Result, TrustViewError};
pub use opinion::{CertainTrustModel, EvidenceModel, KeyLegitimacy, Opinion};
pub use retry::RetryPolicy;
pub use storage::LocalModel;
pub use view::{AssessmentKey, Model, TrustAssessment, TrustView, TrustViewState};

// Re-export validation types
pub use validation::{
    PathValidity, ValidationInformation, ValidationOracle, ValidationRequest,
    ValidationRequestSpec, ValidationResult, ValidationResultSpec, Validator,
};

// Re-export revocation types
pub use revocation::{
    refresh_trust_view, OfflineFetcher, RevocationFetcher, RevocationScheduler,
    RevocationValidator,
};
