//! The persisted unit of trust state for one `(key, CA)` pair.

use serde::{Deserialize, Serialize};

use crate::certificate::TrustCertificate;
use crate::opinion::{KeyLegitimacy, Opinion};

use super::AssessmentKey;

/// Opinions about a CA operating under one public key, plus the set `S` of
/// certificates observed for that key and CA.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustAssessment {
    pub key: AssessmentKey,
    pub s: Vec<TrustCertificate>,
    pub o_kl: KeyLegitimacy,
    pub o_it_ca: Opinion,
    pub o_it_ee: Opinion,
    /// Last modification, Unix epoch microseconds.
    pub updated_at: u64,
}

impl TrustAssessment {
    /// A fresh assessment for the CA `certificate` speaks for, with
    /// `S = {certificate}`.
    pub fn new(
        certificate: &TrustCertificate,
        o_kl: KeyLegitimacy,
        o_it_ca: Opinion,
        o_it_ee: Opinion,
        now: u64,
    ) -> Self {
        Self {
            key: AssessmentKey::of(certificate),
            s: vec![certificate.clone()],
            o_kl,
            o_it_ca,
            o_it_ee,
            updated_at: now,
        }
    }

    pub fn contains(&self, certificate: &TrustCertificate) -> bool {
        self.s.contains(certificate)
    }

    /// Add `certificate` to S. Returns `false` if it was already there.
    pub fn record(&mut self, certificate: &TrustCertificate) -> bool {
        if self.contains(certificate) {
            return false;
        }
        self.s.push(certificate.clone());
        true
    }

    /// Whether any certificate in S was issued by `issuer`.
    pub fn has_issuer(&self, issuer: &str) -> bool {
        self.s.iter().any(|c| c.issuer == issuer)
    }
}
