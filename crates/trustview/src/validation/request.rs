//! Validation request and result types exchanged with the binding layer.

use serde::{Deserialize, Serialize};

use crate::certificate::TrustCertificate;

/// Trust verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationResult {
    Trusted,
    Untrusted,
    Unknown,
}

impl std::fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ValidationResult::Trusted => "TRUSTED",
            ValidationResult::Untrusted => "UNTRUSTED",
            ValidationResult::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Validity of the certificate path as judged by the caller's PKIX check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PathValidity {
    Valid,
    Invalid,
    Unknown,
}

/// What the caller wants done with the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationRequestSpec {
    /// Services in bootstrapping mode, otherwise local evidence only.
    Validate,
    ValidateWithServices,
    ValidateWithoutServices,
    /// The user trusts the host certificate directly.
    ValidateTrustEndCertificate,
    /// Ask the validation service only.
    RetrieveRecommendation,
}

/// How a verdict was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationResultSpec {
    Validated,
    ValidatedFirstSeen,
    ValidatedExistingExpiredSameCa,
    ValidatedExistingExpiredSameCaKey,
    ValidatedExistingValidSameCa,
    ValidatedExistingValidSameKey,
    ValidatedExisting,
    ValidatedOnWatchlist,
    ValidatedRevoked,
    Recommended,
}

/// A validation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRequest {
    pub url: String,
    /// Root first, end-entity last.
    pub certificate_path: Vec<TrustCertificate>,
    pub security_level: f64,
    pub requested_path_validity: PathValidity,
    pub spec: ValidationRequestSpec,
}

impl ValidationRequest {
    pub fn new(
        url: impl Into<String>,
        certificate_path: Vec<TrustCertificate>,
        security_level: f64,
        spec: ValidationRequestSpec,
    ) -> Self {
        Self {
            url: url.into(),
            certificate_path,
            security_level,
            requested_path_validity: PathValidity::Valid,
            spec,
        }
    }

    pub fn host_certificate(&self) -> Option<&TrustCertificate> {
        self.certificate_path.last()
    }
}

/// The answer to a request: a verdict, how it was reached, and a diagnostic
/// when processing failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationInformation {
    pub result: ValidationResult,
    pub result_spec: ValidationResultSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl ValidationInformation {
    pub fn new(result: ValidationResult, result_spec: ValidationResultSpec) -> Self {
        Self {
            result,
            result_spec,
            diagnostic: None,
        }
    }

    /// UNKNOWN with a diagnostic.
    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            result: ValidationResult::Unknown,
            result_spec: ValidationResultSpec::Validated,
            diagnostic: Some(diagnostic.into()),
        }
    }
}
