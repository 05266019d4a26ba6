//! Trust view store contract.
//!
//! A [`Model`] hands out [`TrustView`] transactions. A view is read and
//! mutated in memory and becomes durable only through [`Model::commit`];
//! dropping it discards every change. Commit fails with
//! `TrustViewError::ConcurrentModification` when another transaction
//! committed in between, and callers retry the whole cycle.

pub mod assessment;
pub mod state;

use serde::{Deserialize, Serialize};

use crate::certificate::TrustCertificate;
use crate::error::Result;
use crate::revocation::info::{CrlInfo, OcspInfo, ServiceKey};

pub use assessment::TrustAssessment;
pub use state::TrustViewState;

/// Identity of a trust assessment: a public key and the CA name it is
/// used under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssessmentKey {
    pub public_key: String,
    pub ca: String,
}

impl AssessmentKey {
    pub fn new(public_key: impl Into<String>, ca: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            ca: ca.into(),
        }
    }

    /// The assessment a certificate speaks for: its key under its subject.
    pub fn of(certificate: &TrustCertificate) -> Self {
        Self::new(certificate.public_key.clone(), certificate.subject.clone())
    }
}

impl std::fmt::Display for AssessmentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {}", self.ca, self.public_key)
    }
}

/// Operations on an open trust view.
pub trait TrustView {
    // ── Assessments ─────────────────────────────────────────────────────

    fn assessment(&self, key: &AssessmentKey) -> Option<TrustAssessment>;

    /// The assessment for the key and subject of `certificate`.
    fn assessment_for(&self, certificate: &TrustCertificate) -> Option<TrustAssessment> {
        self.assessment(&AssessmentKey::of(certificate))
    }

    /// Insert or replace an assessment. Certificates in its S set become
    /// known to the view.
    fn set_assessment(&mut self, assessment: TrustAssessment);

    fn assessments(&self) -> Vec<TrustAssessment>;

    // ── Certificates ────────────────────────────────────────────────────

    fn has_certificate(&self, certificate: &TrustCertificate) -> bool;
    fn certificates(&self) -> Vec<TrustCertificate>;
    fn trusted_certificates(&self) -> Vec<TrustCertificate>;
    fn untrusted_certificates(&self) -> Vec<TrustCertificate>;
    fn is_trusted(&self, certificate: &TrustCertificate) -> bool;
    fn is_untrusted(&self, certificate: &TrustCertificate) -> bool;
    fn is_revoked(&self, certificate: &TrustCertificate) -> bool;

    /// Mark trusted. Clears the untrusted flag.
    fn set_trusted(&mut self, certificate: &TrustCertificate);

    /// Mark untrusted. Clears the trusted flag.
    fn set_untrusted(&mut self, certificate: &TrustCertificate);

    /// Mark revoked. A revoked certificate is also untrusted.
    fn set_revoked(&mut self, certificate: &TrustCertificate);

    // ── Hosts ───────────────────────────────────────────────────────────

    fn add_host(&mut self, certificate: &TrustCertificate, host: &str);
    fn certificates_for_host(&self, host: &str) -> Vec<TrustCertificate>;

    // ── Watchlist ───────────────────────────────────────────────────────

    fn add_to_watchlist(&mut self, certificate: &TrustCertificate, timestamp: u64);
    fn remove_from_watchlist(&mut self, certificate: &TrustCertificate);
    fn watchlist_timestamp(&self, certificate: &TrustCertificate) -> Option<u64>;
    fn watchlist(&self) -> Vec<(TrustCertificate, u64)>;

    // ── Revocation services ─────────────────────────────────────────────

    fn crl(&self, key: &ServiceKey) -> Option<CrlInfo>;
    fn add_crl(&mut self, info: CrlInfo);
    fn ocsp(&self, key: &ServiceKey) -> Option<OcspInfo>;
    fn add_ocsp(&mut self, info: OcspInfo);

    // ── Maintenance ─────────────────────────────────────────────────────

    /// Purge watchlist entries and assessments older than their expiration
    /// and certificates whose validity ended before `now`. Durations are
    /// microseconds.
    fn clean(&mut self, now: u64, watchlist_expiration: u64, assessment_expiration: u64);

    /// Remove every assessment and certificate.
    fn erase(&mut self);
}

/// Source of trust view transactions.
pub trait Model: Send + Sync {
    type View: TrustView + Send;

    /// Open a transaction on the current state.
    ///
    /// # Errors
    ///
    /// Returns `TrustViewError::ModelAccess` if the backing store cannot be
    /// read.
    fn open_trust_view(&self) -> Result<Self::View>;

    /// Make the changes of `view` durable.
    ///
    /// # Errors
    ///
    /// Returns `TrustViewError::ConcurrentModification` if another
    /// transaction committed after `view` was opened.
    fn commit(&self, view: Self::View) -> Result<()>;
}
