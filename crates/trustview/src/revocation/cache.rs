//! Time-to-live record of recently checked certificates.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::certificate::TrustCertificate;

/// Certificates that passed a path check, each with the time (microseconds)
/// until which it need not be checked again.
#[derive(Debug, Default)]
pub struct RevocationCache {
    entries: Mutex<HashMap<TrustCertificate, u64>>,
}

impl RevocationCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TrustCertificate, u64>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contains(&self, certificate: &TrustCertificate) -> bool {
        self.lock().contains_key(certificate)
    }

    pub fn next_check(&self, certificate: &TrustCertificate) -> Option<u64> {
        self.lock().get(certificate).copied()
    }

    pub fn insert(&self, certificate: TrustCertificate, next_check: u64) {
        self.lock().insert(certificate, next_check);
    }

    pub fn remove(&self, certificate: &TrustCertificate) {
        self.lock().remove(certificate);
    }

    /// Drop entries whose next check is due at `now`.
    pub fn purge_expired(&self, now: u64) {
        self.lock().retain(|_, next_check| *next_check > now);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
