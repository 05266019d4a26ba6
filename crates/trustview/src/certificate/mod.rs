//! Certificate model consumed by the trust engine.
//!
//! X.509 parsing happens outside this crate; callers hand over the parsed
//! fields. Identity is `(serial, issuer, subject, public key)`; validity
//! window and extension details do not take part in equality.

pub mod path;

use std::hash::{Hash, Hasher};

use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, TrustViewError};

pub use path::check_path;

// ── Extension details ────────────────────────────────────────────────────────

/// Extension fields used for revocation checking and host bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CertificateDetails {
    /// CRL distribution point URLs.
    pub crl_urls: Vec<String>,
    /// OCSP responder URLs from the authority information access extension.
    pub ocsp_urls: Vec<String>,
    /// DNS names from the subject and subject alternative names.
    pub subject_hosts: Vec<String>,
    pub authority_key_id: Option<String>,
    pub subject_key_id: Option<String>,
    /// Serial of the issuing certificate, if the authority key identifier
    /// carries one.
    pub authority_serial: Option<String>,
}

// ── TrustCertificate ─────────────────────────────────────────────────────────

/// An immutable certificate value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustCertificate {
    pub serial: String,
    pub issuer: String,
    pub subject: String,
    /// Base64-encoded subject public key.
    #[serde(rename = "publicKeyEncoded")]
    pub public_key: String,
    /// Validity start, Unix epoch microseconds.
    pub not_before: u64,
    /// Validity end, Unix epoch microseconds.
    pub not_after: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<CertificateDetails>,
}

impl TrustCertificate {
    /// Create a certificate without extension details.
    pub fn new(
        serial: impl Into<String>,
        issuer: impl Into<String>,
        subject: impl Into<String>,
        public_key: impl Into<String>,
        not_before: u64,
        not_after: u64,
    ) -> Self {
        Self {
            serial: serial.into(),
            issuer: issuer.into(),
            subject: subject.into(),
            public_key: public_key.into(),
            not_before,
            not_after,
            details: None,
        }
    }

    /// Attach extension details.
    pub fn with_details(mut self, details: CertificateDetails) -> Self {
        self.details = Some(details);
        self
    }

    /// Reject certificates the engine cannot work with.
    ///
    /// # Errors
    ///
    /// Returns `TrustViewError::InvalidCertificate` for an empty serial,
    /// issuer, subject or key, or an inverted validity window.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("serial", &self.serial),
            ("issuer", &self.issuer),
            ("subject", &self.subject),
            ("public key", &self.public_key),
        ] {
            if value.is_empty() {
                return Err(TrustViewError::InvalidCertificate(format!(
                    "{name} must not be empty"
                )));
            }
        }
        if self.not_after < self.not_before {
            return Err(TrustViewError::InvalidCertificate(format!(
                "certificate {} expires before it becomes valid",
                self.serial
            )));
        }
        Ok(())
    }

    pub fn is_self_signed(&self) -> bool {
        self.issuer == self.subject
    }

    /// Whether `now` lies within `[not_before, not_after]`.
    pub fn is_within_validity(&self, now: u64) -> bool {
        self.not_before <= now && now <= self.not_after
    }

    /// Decode the base64 public key.
    ///
    /// # Errors
    ///
    /// Returns `TrustViewError::InvalidCertificate` if the key is not valid
    /// base64.
    pub fn public_key_bytes(&self) -> Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.public_key)
            .map_err(|e| TrustViewError::InvalidCertificate(format!("public key: {e}")))
    }

    /// SHA-256 over the identity fields, hex encoded.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [&self.serial, &self.issuer, &self.subject, &self.public_key] {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    pub fn crl_urls(&self) -> &[String] {
        self.details.as_ref().map(|d| d.crl_urls.as_slice()).unwrap_or(&[])
    }

    pub fn ocsp_urls(&self) -> &[String] {
        self.details.as_ref().map(|d| d.ocsp_urls.as_slice()).unwrap_or(&[])
    }

    pub fn subject_hosts(&self) -> &[String] {
        self.details
            .as_ref()
            .map(|d| d.subject_hosts.as_slice())
            .unwrap_or(&[])
    }
}

impl PartialEq for TrustCertificate {
    fn eq(&self, other: &Self) -> bool {
        self.serial == other.serial
            && self.issuer == other.issuer
            && self.subject == other.subject
            && self.public_key == other.public_key
    }
}

impl Eq for TrustCertificate {}

impl Hash for TrustCertificate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.serial.hash(state);
        self.issuer.hash(state);
        self.subject.hash(state);
        self.public_key.hash(state);
    }
}

// Ordered by identity fields, consistent with `Eq`.
impl PartialOrd for TrustCertificate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TrustCertificate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (&self.serial, &self.issuer, &self.subject, &self.public_key).cmp(&(
            &other.serial,
            &other.issuer,
            &other.subject,
            &other.public_key,
        ))
    }
}

impl std::fmt::Display for TrustCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{} -> {}]", self.serial, self.issuer, self.subject)
    }
}
