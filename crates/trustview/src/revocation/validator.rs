//! Revocation checking batches.
//!
//! Each certificate of a batch is checked against the CRL service and then
//! the OCSP responder of its issuer. Service state is shared between the
//! entries of a batch, so a CRL used by several certificates is downloaded
//! once. Revoked certificates are marked in the view; every other effect
//! (batch progress, the TTL cache) waits for [`RevocationBatch::committed`].

use std::collections::HashMap;
use std::sync::Arc;

use crate::certificate::TrustCertificate;
use crate::config::RevocationSettings;
use crate::view::TrustView;

use super::cache::RevocationCache;
use super::fetcher::RevocationFetcher;
use super::info::{CrlInfo, OcspInfo, OcspResponse, RevocationInfo, ServiceKey};
use super::{CHECK_MAX_MICROS, CHECK_MIN_MICROS};

/// Outcome of checking one certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Check {
    Revoked,
    /// Not revoked. The earliest next update of the services consulted,
    /// 0 if none was learned.
    Good(u64),
}

struct CrlService {
    info: CrlInfo,
}

struct OcspService {
    info: OcspInfo,
}

/// Revocation services referenced by a batch, pooled by [`ServiceKey`].
#[derive(Default)]
struct ServicePool {
    crl: Vec<CrlService>,
    ocsp: Vec<OcspService>,
    crl_index: HashMap<ServiceKey, usize>,
    ocsp_index: HashMap<ServiceKey, usize>,
}

impl ServicePool {
    fn crl_slot(&mut self, key: ServiceKey) -> usize {
        if let Some(&slot) = self.crl_index.get(&key) {
            return slot;
        }
        let slot = self.crl.len();
        self.crl.push(CrlService {
            info: CrlInfo::empty(key.clone()),
        });
        self.crl_index.insert(key, slot);
        slot
    }

    fn ocsp_slot(&mut self, key: ServiceKey) -> usize {
        if let Some(&slot) = self.ocsp_index.get(&key) {
            return slot;
        }
        let slot = self.ocsp.len();
        self.ocsp.push(OcspService {
            info: OcspInfo {
                key: key.clone(),
                next_update: None,
            },
        });
        self.ocsp_index.insert(key, slot);
        slot
    }

    fn entry(&mut self, certificate: &TrustCertificate, issuer: &TrustCertificate) -> Entry {
        let info = RevocationInfo::from_certificate(certificate);
        let crl = (!info.crl_urls.is_empty())
            .then(|| self.crl_slot(ServiceKey::new(issuer.clone(), &info.crl_urls)));
        let ocsp = (!info.ocsp_urls.is_empty())
            .then(|| self.ocsp_slot(ServiceKey::new(issuer.clone(), &info.ocsp_urls)));
        Entry {
            certificate: certificate.clone(),
            crl,
            ocsp,
        }
    }
}

struct Entry {
    certificate: TrustCertificate,
    crl: Option<usize>,
    ocsp: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchMode {
    /// A certificate path before validation. Stops at the first revoked
    /// certificate and maintains the TTL cache.
    Path,
    /// Every certificate of the view. Checks all entries.
    View,
}

/// Effects of the last `validate_up_to` call, applied on commit.
#[derive(Default)]
struct Pending {
    /// `Some(t)`: cache until `t`. `None`: drop from the cache.
    cache: Vec<(TrustCertificate, Option<u64>)>,
    advance: usize,
}

/// Checks certificates for revocation and owns the TTL cache of path checks.
pub struct RevocationValidator {
    fetcher: Arc<dyn RevocationFetcher>,
    settings: RevocationSettings,
    cache: RevocationCache,
}

impl RevocationValidator {
    pub fn new(fetcher: Arc<dyn RevocationFetcher>, settings: RevocationSettings) -> Self {
        Self {
            fetcher,
            settings,
            cache: RevocationCache::new(),
        }
    }

    pub fn settings(&self) -> &RevocationSettings {
        &self.settings
    }

    pub fn cache(&self) -> &RevocationCache {
        &self.cache
    }

    /// A batch over `path` (root first), checked from the end-entity back
    /// to the root. Each certificate's issuer is its predecessor; the root
    /// is its own issuer.
    pub fn path_batch(&self, path: &[TrustCertificate]) -> RevocationBatch<'_> {
        let mut pool = ServicePool::default();
        let entries = (0..path.len())
            .rev()
            .map(|i| pool.entry(&path[i], &path[i.saturating_sub(1)]))
            .collect();
        RevocationBatch::new(self, BatchMode::Path, entries, pool)
    }

    /// A batch over every certificate of `view` that advertises revocation
    /// services and whose issuer certificate is in the view.
    ///
    /// The issuer is picked by the authority serial, then by the authority
    /// key identifier. A certificate with neither is checked against every
    /// certificate named like its issuer.
    pub fn view_batch(&self, view: &dyn TrustView) -> RevocationBatch<'_> {
        let mut certificates = view.certificates();
        certificates.sort();

        let mut by_subject: HashMap<&str, Vec<&TrustCertificate>> = HashMap::new();
        for certificate in &certificates {
            by_subject
                .entry(certificate.subject.as_str())
                .or_default()
                .push(certificate);
        }

        let mut pool = ServicePool::default();
        let mut entries = Vec::new();
        for certificate in &certificates {
            let Some(issuers) = by_subject.get(certificate.issuer.as_str()) else {
                continue;
            };
            let info = RevocationInfo::from_certificate(certificate);
            if info.is_empty() {
                continue;
            }

            let by_serial = info
                .authority_serial
                .as_deref()
                .and_then(|serial| issuers.iter().find(|i| i.serial == serial));
            let by_key_id = || {
                info.authority_key_id.as_deref().and_then(|id| {
                    issuers.iter().find(|i| {
                        i.details.as_ref().and_then(|d| d.subject_key_id.as_deref()) == Some(id)
                    })
                })
            };

            match by_serial.or_else(by_key_id) {
                Some(issuer) => entries.push(pool.entry(certificate, issuer)),
                None if info.authority_serial.is_none() && info.authority_key_id.is_none() => {
                    for issuer in issuers {
                        entries.push(pool.entry(certificate, issuer));
                    }
                }
                None => log::debug!("No issuer certificate found for {certificate}"),
            }
        }

        RevocationBatch::new(self, BatchMode::View, entries, pool)
    }
}

/// A resumable run of revocation checks.
pub struct RevocationBatch<'a> {
    validator: &'a RevocationValidator,
    mode: BatchMode,
    entries: Vec<Entry>,
    pool: ServicePool,
    start: usize,
    pending: Pending,
}

impl<'a> RevocationBatch<'a> {
    fn new(
        validator: &'a RevocationValidator,
        mode: BatchMode,
        entries: Vec<Entry>,
        pool: ServicePool,
    ) -> Self {
        Self {
            validator,
            mode,
            entries,
            pool,
            start: 0,
            pending: Pending::default(),
        }
    }

    /// Entries not yet covered by a committed check.
    pub fn remaining(&self) -> usize {
        self.entries.len() - self.start
    }

    pub fn is_finished(&self) -> bool {
        self.remaining() == 0
    }

    /// Check every remaining entry. See [`validate_up_to`](Self::validate_up_to).
    pub fn validate(&mut self, view: &mut dyn TrustView, now: u64) -> bool {
        let n = self.remaining();
        self.validate_up_to(view, n, now)
    }

    /// Check up to `n` remaining entries against `view`, marking revoked
    /// certificates there.
    ///
    /// Returns `false` if a checked certificate is revoked. A path batch
    /// stops at the first revoked certificate. The checked entries count as
    /// done only after [`committed`](Self::committed).
    pub fn validate_up_to(&mut self, view: &mut dyn TrustView, n: usize, now: u64) -> bool {
        self.pending = Pending::default();
        let count = n.min(self.remaining());
        self.pending.advance = count;

        match self.mode {
            BatchMode::Path => self.validate_path(view, count, now),
            BatchMode::View => self.validate_view(view, count, now),
        }
    }

    fn validate_path(&mut self, view: &mut dyn TrustView, count: usize, now: u64) -> bool {
        let validator = self.validator;
        validator.cache.purge_expired(now);

        for entry in &self.entries[self.start..self.start + count] {
            let certificate = &entry.certificate;
            if view.is_revoked(certificate) {
                self.pending.cache.push((certificate.clone(), None));
                return false;
            }
            if validator.cache.contains(certificate) {
                continue;
            }
            match check_entry(validator, &mut self.pool, entry, view, now) {
                Check::Revoked => {
                    self.pending.cache.push((certificate.clone(), None));
                    return false;
                }
                Check::Good(next_update) => {
                    let next_check = next_update
                        .max(now.saturating_add(CHECK_MIN_MICROS))
                        .min(now.saturating_add(CHECK_MAX_MICROS));
                    self.pending.cache.push((certificate.clone(), Some(next_check)));
                }
            }
        }
        true
    }

    fn validate_view(&mut self, view: &mut dyn TrustView, count: usize, now: u64) -> bool {
        let validator = self.validator;
        let mut clean = true;

        for entry in &self.entries[self.start..self.start + count] {
            let certificate = &entry.certificate;
            let revoked = view.is_revoked(certificate)
                || check_entry(validator, &mut self.pool, entry, view, now) == Check::Revoked;
            if revoked {
                self.pending.cache.push((certificate.clone(), None));
                clean = false;
            }
        }

        if self.start + count == self.entries.len() {
            for service in &self.pool.ocsp {
                if service.info.next_update.is_some() {
                    view.add_ocsp(service.info.clone());
                }
            }
        }
        clean
    }

    /// The view passed to the last `validate_up_to` call was committed.
    pub fn committed(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        for (certificate, next_check) in pending.cache {
            match next_check {
                Some(next_check) => self.validator.cache.insert(certificate, next_check),
                None => self.validator.cache.remove(&certificate),
            }
        }
        self.start += pending.advance;
    }

    /// The view passed to the last `validate_up_to` call was discarded.
    pub fn rolled_back(&mut self) {
        self.pending = Pending::default();
    }
}

fn check_entry(
    validator: &RevocationValidator,
    pool: &mut ServicePool,
    entry: &Entry,
    view: &mut dyn TrustView,
    now: u64,
) -> Check {
    let certificate = &entry.certificate;
    let mut next_check = u64::MAX;

    if let Some(slot) = entry.crl {
        let service = &mut pool.crl[slot];
        let local = view.crl(&service.info.key);
        let mut known = local.clone();

        if !local.as_ref().map_or(false, |info| info.is_current(now)) {
            if !service.info.is_current(now) {
                fetch_crl(validator, service);
            }
            // A downloaded CRL without a future next update is discarded,
            // revoked serials included; only stored data is consulted then.
            if service.info.crl.is_some() && service.info.next_update.map_or(false, |t| t > now) {
                log::info!("Local CRL information for {} updated", service.info.key.issuer);
                known = Some(service.info.clone());
                view.add_crl(service.info.clone());
            } else {
                log::warn!(
                    "Failed to update CRL information for {}",
                    service.info.key.issuer
                );
            }
        }

        if let Some(info) = known.filter(|info| info.crl.is_some()) {
            if let Some(next_update) = info.next_update {
                next_check = next_check.min(next_update);
            }
            if info.is_revoked(certificate) {
                log::warn!("{certificate} is listed on the CRL of {}", info.key.issuer);
                view.set_revoked(certificate);
                return Check::Revoked;
            }
        }
    }

    if let Some(slot) = entry.ocsp {
        let service = &mut pool.ocsp[slot];
        let local = view.ocsp(&service.info.key);
        let stale = !view.has_certificate(certificate)
            || !local.as_ref().map_or(false, |info| info.is_current(now));

        if stale {
            let mut revoked = false;
            match query_ocsp(validator, service, certificate) {
                Some(response) => {
                    revoked = response.revoked;
                    match response.next_update.filter(|t| *t > now) {
                        Some(next_update) => {
                            service.info.next_update = Some(next_update);
                            if local.is_none() {
                                view.add_ocsp(service.info.clone());
                            }
                            next_check = next_check.min(next_update);
                        }
                        None => log::warn!("OCSP answer for {certificate} has no usable next update"),
                    }
                }
                None => log::warn!("Failed to query OCSP service for {certificate}"),
            }
            if revoked {
                log::warn!("{certificate} is revoked according to OCSP");
                view.set_revoked(certificate);
                return Check::Revoked;
            }
        }
    }

    Check::Good(if next_check == u64::MAX { 0 } else { next_check })
}

/// Replace the service's CRL with the first one that downloads.
fn fetch_crl(validator: &RevocationValidator, service: &mut CrlService) {
    let key = service.info.key.clone();
    for url in key.parsed_urls() {
        log::info!("Downloading CRL from {url}");
        match validator.fetcher.fetch_crl(&url, validator.settings.crl_timeout) {
            Ok(data) => {
                service.info = CrlInfo::from_data(key, data);
                return;
            }
            Err(e) => log::warn!("CRL download from {url} failed: {e}"),
        }
    }
}

fn query_ocsp(
    validator: &RevocationValidator,
    service: &OcspService,
    certificate: &TrustCertificate,
) -> Option<OcspResponse> {
    let key = &service.info.key;
    for url in key.parsed_urls() {
        log::info!("Querying OCSP responder {url} for {certificate}");
        match validator.fetcher.query_ocsp(
            &url,
            certificate,
            &key.issuer,
            validator.settings.ocsp_timeout,
        ) {
            Ok(response) => return Some(response),
            Err(e) => log::warn!("OCSP query to {url} failed: {e}"),
        }
    }
    None
}
