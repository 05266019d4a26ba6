//! In-memory trust view.
//!
//! [`TrustViewState`] is the working copy handed out by the local model.
//! It tracks the model revision it was opened at and whether anything
//! changed, so that commits can detect conflicts and skip no-op writes.

use std::collections::{BTreeSet, HashMap};

use crate::certificate::TrustCertificate;
use crate::revocation::info::{CrlInfo, OcspInfo, ServiceKey};

use super::{AssessmentKey, TrustAssessment, TrustView};

/// Status flags kept per known certificate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CertificateFlags {
    pub trusted: bool,
    pub untrusted: bool,
    pub revoked: bool,
}

/// Complete trust view held in memory.
#[derive(Debug, Clone, Default)]
pub struct TrustViewState {
    pub(crate) assessments: HashMap<AssessmentKey, TrustAssessment>,
    pub(crate) certificates: HashMap<TrustCertificate, CertificateFlags>,
    pub(crate) hosts: HashMap<String, BTreeSet<TrustCertificate>>,
    pub(crate) watchlist: HashMap<TrustCertificate, u64>,
    pub(crate) crls: HashMap<ServiceKey, CrlInfo>,
    pub(crate) ocsp: HashMap<ServiceKey, OcspInfo>,
    pub(crate) revision: u64,
    pub(crate) dirty: bool,
}

impl TrustViewState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Model revision this view was opened at.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether the view was mutated since it was opened.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_in_s(&self, certificate: &TrustCertificate) -> bool {
        self.assessments.values().any(|a| a.contains(certificate))
    }

    fn flags_mut(&mut self, certificate: &TrustCertificate) -> &mut CertificateFlags {
        self.dirty = true;
        self.certificates.entry(certificate.clone()).or_default()
    }

    fn flagged(&self, predicate: impl Fn(&CertificateFlags) -> bool) -> Vec<TrustCertificate> {
        self.certificates
            .iter()
            .filter(|(_, flags)| predicate(flags))
            .map(|(cert, _)| cert.clone())
            .collect()
    }

    fn is_hosted(&self, certificate: &TrustCertificate) -> bool {
        self.hosts.values().any(|certs| certs.contains(certificate))
    }

    fn forget_certificate(&mut self, certificate: &TrustCertificate) {
        self.certificates.remove(certificate);
        self.watchlist.remove(certificate);
        for certs in self.hosts.values_mut() {
            certs.remove(certificate);
        }
        self.hosts.retain(|_, certs| !certs.is_empty());
        for assessment in self.assessments.values_mut() {
            assessment.s.retain(|c| c != certificate);
        }
    }
}

impl TrustView for TrustViewState {
    fn assessment(&self, key: &AssessmentKey) -> Option<TrustAssessment> {
        self.assessments.get(key).cloned()
    }

    fn set_assessment(&mut self, assessment: TrustAssessment) {
        self.dirty = true;
        for cert in &assessment.s {
            self.certificates.entry(cert.clone()).or_default();
        }
        self.assessments.insert(assessment.key.clone(), assessment);
    }

    fn assessments(&self) -> Vec<TrustAssessment> {
        let mut all: Vec<TrustAssessment> = self.assessments.values().cloned().collect();
        all.sort_by(|a, b| a.key.cmp(&b.key));
        all
    }

    fn has_certificate(&self, certificate: &TrustCertificate) -> bool {
        self.certificates.contains_key(certificate)
    }

    fn certificates(&self) -> Vec<TrustCertificate> {
        self.flagged(|_| true)
    }

    fn trusted_certificates(&self) -> Vec<TrustCertificate> {
        self.flagged(|f| f.trusted)
    }

    fn untrusted_certificates(&self) -> Vec<TrustCertificate> {
        self.flagged(|f| f.untrusted)
    }

    fn is_trusted(&self, certificate: &TrustCertificate) -> bool {
        self.certificates
            .get(certificate)
            .map_or(false, |f| f.trusted)
    }

    fn is_untrusted(&self, certificate: &TrustCertificate) -> bool {
        self.certificates
            .get(certificate)
            .map_or(false, |f| f.untrusted)
    }

    fn is_revoked(&self, certificate: &TrustCertificate) -> bool {
        self.certificates
            .get(certificate)
            .map_or(false, |f| f.revoked)
    }

    fn set_trusted(&mut self, certificate: &TrustCertificate) {
        let flags = self.flags_mut(certificate);
        flags.trusted = true;
        flags.untrusted = false;
    }

    fn set_untrusted(&mut self, certificate: &TrustCertificate) {
        let flags = self.flags_mut(certificate);
        flags.untrusted = true;
        flags.trusted = false;
    }

    fn set_revoked(&mut self, certificate: &TrustCertificate) {
        let flags = self.flags_mut(certificate);
        flags.revoked = true;
        flags.untrusted = true;
        flags.trusted = false;
    }

    fn add_host(&mut self, certificate: &TrustCertificate, host: &str) {
        self.dirty = true;
        self.certificates.entry(certificate.clone()).or_default();
        self.hosts
            .entry(host.to_ascii_lowercase())
            .or_default()
            .insert(certificate.clone());
    }

    fn certificates_for_host(&self, host: &str) -> Vec<TrustCertificate> {
        self.hosts
            .get(&host.to_ascii_lowercase())
            .map(|certs| certs.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn add_to_watchlist(&mut self, certificate: &TrustCertificate, timestamp: u64) {
        self.dirty = true;
        self.certificates.entry(certificate.clone()).or_default();
        self.watchlist.insert(certificate.clone(), timestamp);
    }

    fn remove_from_watchlist(&mut self, certificate: &TrustCertificate) {
        if self.watchlist.remove(certificate).is_some() {
            self.dirty = true;
        }
    }

    fn watchlist_timestamp(&self, certificate: &TrustCertificate) -> Option<u64> {
        self.watchlist.get(certificate).copied()
    }

    fn watchlist(&self) -> Vec<(TrustCertificate, u64)> {
        let mut entries: Vec<(TrustCertificate, u64)> = self
            .watchlist
            .iter()
            .map(|(cert, ts)| (cert.clone(), *ts))
            .collect();
        entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        entries
    }

    fn crl(&self, key: &ServiceKey) -> Option<CrlInfo> {
        self.crls.get(key).cloned()
    }

    fn add_crl(&mut self, info: CrlInfo) {
        self.dirty = true;
        self.crls.insert(info.key.clone(), info);
    }

    fn ocsp(&self, key: &ServiceKey) -> Option<OcspInfo> {
        self.ocsp.get(key).cloned()
    }

    fn add_ocsp(&mut self, info: OcspInfo) {
        self.dirty = true;
        self.ocsp.insert(info.key.clone(), info);
    }

    fn clean(&mut self, now: u64, watchlist_expiration: u64, assessment_expiration: u64) {
        let before = (
            self.watchlist.len(),
            self.assessments.len(),
            self.certificates.len(),
        );

        self.watchlist
            .retain(|_, added| now.saturating_sub(*added) <= watchlist_expiration);

        self.assessments
            .retain(|_, a| now.saturating_sub(a.updated_at) <= assessment_expiration);

        // certificates that lost their last reference
        let unreferenced: Vec<TrustCertificate> = self
            .certificates
            .iter()
            .filter(|(cert, flags)| {
                !flags.trusted
                    && !flags.untrusted
                    && !flags.revoked
                    && !self.watchlist.contains_key(*cert)
                    && !self.is_hosted(cert)
                    && !self.is_in_s(cert)
            })
            .map(|(cert, _)| cert.clone())
            .collect();
        for cert in &unreferenced {
            self.certificates.remove(cert);
        }

        let expired: Vec<TrustCertificate> = self
            .certificates
            .keys()
            .filter(|cert| cert.not_after < now)
            .cloned()
            .collect();
        for cert in &expired {
            self.forget_certificate(cert);
        }

        let after = (
            self.watchlist.len(),
            self.assessments.len(),
            self.certificates.len(),
        );
        if before != after {
            self.dirty = true;
            log::info!(
                "Cleaned trust view: {} watchlist entries, {} assessments, {} certificates removed",
                before.0 - after.0,
                before.1 - after.1,
                before.2 - after.2
            );
        }
    }

    fn erase(&mut self) {
        self.dirty = true;
        self.assessments.clear();
        self.certificates.clear();
        self.hosts.clear();
        self.watchlist.clear();
    }
}
