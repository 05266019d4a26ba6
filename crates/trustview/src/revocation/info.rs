//! Revocation service descriptors and cached service state.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::certificate::TrustCertificate;

// ── Service identity ─────────────────────────────────────────────────────────

/// Identifies one revocation service: the issuing certificate plus the URL
/// list advertised by the certificates it issued.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceKey {
    pub issuer: TrustCertificate,
    pub urls: Vec<String>,
}

impl ServiceKey {
    pub fn new(issuer: TrustCertificate, urls: &[Url]) -> Self {
        Self {
            issuer,
            urls: urls.iter().map(|u| u.to_string()).collect(),
        }
    }

    /// The URLs as parsed values. Entries that no longer parse are skipped.
    pub fn parsed_urls(&self) -> Vec<Url> {
        self.urls.iter().filter_map(|u| Url::parse(u).ok()).collect()
    }
}

// ── CRL ──────────────────────────────────────────────────────────────────────

/// The content of a downloaded certificate revocation list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrlData {
    pub this_update: u64,
    pub next_update: Option<u64>,
    pub revoked_serials: BTreeSet<String>,
}

impl CrlData {
    pub fn lists(&self, certificate: &TrustCertificate) -> bool {
        self.revoked_serials.contains(&certificate.serial)
    }
}

/// Locally known state of a CRL service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrlInfo {
    pub key: ServiceKey,
    pub next_update: Option<u64>,
    pub crl: Option<CrlData>,
}

impl CrlInfo {
    pub fn empty(key: ServiceKey) -> Self {
        Self {
            key,
            next_update: None,
            crl: None,
        }
    }

    pub fn from_data(key: ServiceKey, crl: CrlData) -> Self {
        Self {
            key,
            next_update: crl.next_update,
            crl: Some(crl),
        }
    }

    /// Whether CRL data is present and its next update lies after `now`.
    pub fn is_current(&self, now: u64) -> bool {
        self.crl.is_some() && self.next_update.map_or(false, |next| next > now)
    }

    pub fn is_revoked(&self, certificate: &TrustCertificate) -> bool {
        self.crl.as_ref().map_or(false, |crl| crl.lists(certificate))
    }
}

// ── OCSP ─────────────────────────────────────────────────────────────────────

/// Locally known state of an OCSP responder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcspInfo {
    pub key: ServiceKey,
    pub next_update: Option<u64>,
}

impl OcspInfo {
    pub fn is_current(&self, now: u64) -> bool {
        self.next_update.map_or(false, |next| next > now)
    }
}

/// Answer of an OCSP responder for one certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcspResponse {
    pub revoked: bool,
    pub next_update: Option<u64>,
}

// ── Extension extraction ─────────────────────────────────────────────────────

/// Revocation endpoints and issuer hints taken from a certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevocationInfo {
    pub crl_urls: Vec<Url>,
    pub ocsp_urls: Vec<Url>,
    pub authority_serial: Option<String>,
    pub authority_key_id: Option<String>,
    pub subject_key_id: Option<String>,
}

impl RevocationInfo {
    pub fn from_certificate(certificate: &TrustCertificate) -> Self {
        let details = certificate.details.as_ref();
        Self {
            crl_urls: supported_urls(certificate.crl_urls()),
            ocsp_urls: supported_urls(certificate.ocsp_urls()),
            authority_serial: details.and_then(|d| d.authority_serial.clone()),
            authority_key_id: details.and_then(|d| d.authority_key_id.clone()),
            subject_key_id: details.and_then(|d| d.subject_key_id.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.crl_urls.is_empty() && self.ocsp_urls.is_empty()
    }
}

/// Parse the advertised endpoints, keeping HTTP(S) URLs only. LDAP and
/// malformed entries are dropped.
pub fn supported_urls(raw: &[String]) -> Vec<Url> {
    let urls: Vec<Url> = raw
        .iter()
        .filter(|s| !s.starts_with("ldap://"))
        .filter_map(|s| match Url::parse(s) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Some(url),
            Ok(url) => {
                log::warn!("Unsupported revocation service scheme: {url}");
                None
            }
            Err(e) => {
                log::warn!("Malformed revocation service URL {s}: {e}");
                None
            }
        })
        .collect();

    if urls.is_empty() && !raw.is_empty() {
        log::warn!("Unsupported revocation service URL format: {}", raw.join(", "));
    }
    urls
}
