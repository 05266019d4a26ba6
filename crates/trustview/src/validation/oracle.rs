//! External validation services ("oracles") and their combinators.
//!
//! The engine consults an oracle only when local evidence is not certain
//! enough. Concrete notary clients live outside this crate and implement
//! [`ValidationOracle`]; the types here shape their behavior.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::certificate::TrustCertificate;
use crate::error::{Result, TrustViewError};

use super::ValidationResult;

/// A third-party judgment about a certificate.
pub trait ValidationOracle: Send + Sync {
    /// # Errors
    ///
    /// Returns `TrustViewError::OracleTimeout` when the answer did not
    /// arrive in time, or `TrustViewError::OracleFailure` when the service
    /// could not be queried.
    fn query(&self, certificate: &TrustCertificate) -> Result<ValidationResult>;
}

impl<T: ValidationOracle + ?Sized> ValidationOracle for Arc<T> {
    fn query(&self, certificate: &TrustCertificate) -> Result<ValidationResult> {
        (**self).query(certificate)
    }
}

impl<T: ValidationOracle + ?Sized> ValidationOracle for Box<T> {
    fn query(&self, certificate: &TrustCertificate) -> Result<ValidationResult> {
        (**self).query(certificate)
    }
}

// ── Fixed ────────────────────────────────────────────────────────────────────

/// Answers the same verdict for every certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedOracle(pub ValidationResult);

impl ValidationOracle for FixedOracle {
    fn query(&self, _certificate: &TrustCertificate) -> Result<ValidationResult> {
        Ok(self.0)
    }
}

// ── Listed ───────────────────────────────────────────────────────────────────

/// Answers from explicit trusted and untrusted lists, deferring everything
/// else to a fallback (UNKNOWN without one).
#[derive(Clone, Default)]
pub struct ListedOracle {
    trusted: HashSet<TrustCertificate>,
    untrusted: HashSet<TrustCertificate>,
    fallback: Option<Arc<dyn ValidationOracle>>,
}

impl ListedOracle {
    pub fn new(
        trusted: impl IntoIterator<Item = TrustCertificate>,
        untrusted: impl IntoIterator<Item = TrustCertificate>,
    ) -> Self {
        Self {
            trusted: trusted.into_iter().collect(),
            untrusted: untrusted.into_iter().collect(),
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn ValidationOracle>) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

impl ValidationOracle for ListedOracle {
    fn query(&self, certificate: &TrustCertificate) -> Result<ValidationResult> {
        if self.trusted.contains(certificate) {
            return Ok(ValidationResult::Trusted);
        }
        if self.untrusted.contains(certificate) {
            return Ok(ValidationResult::Untrusted);
        }
        match &self.fallback {
            Some(fallback) => fallback.query(certificate),
            None => Ok(ValidationResult::Unknown),
        }
    }
}

// ── Caching ──────────────────────────────────────────────────────────────────

/// Remembers successful answers so a retried transaction does not query the
/// service again for the same certificate.
pub struct CachingOracle<O> {
    inner: O,
    answers: Mutex<HashMap<TrustCertificate, ValidationResult>>,
}

impl<O: ValidationOracle> CachingOracle<O> {
    pub fn new(inner: O) -> Self {
        Self {
            inner,
            answers: Mutex::new(HashMap::new()),
        }
    }

    /// Number of cached answers.
    pub fn cached(&self) -> usize {
        self.answers.lock().map(|a| a.len()).unwrap_or(0)
    }
}

impl<O: ValidationOracle> ValidationOracle for CachingOracle<O> {
    fn query(&self, certificate: &TrustCertificate) -> Result<ValidationResult> {
        if let Ok(answers) = self.answers.lock() {
            if let Some(result) = answers.get(certificate) {
                return Ok(*result);
            }
        }
        let result = self.inner.query(certificate)?;
        if let Ok(mut answers) = self.answers.lock() {
            answers.insert(certificate.clone(), result);
        }
        Ok(result)
    }
}

// ── Time-limited ─────────────────────────────────────────────────────────────

/// Worker threads with a query still running, shared by every
/// [`TimeLimitedOracle`] built from the same pool.
#[derive(Debug, Clone)]
pub struct QueryWorkers {
    busy: Arc<AtomicUsize>,
    limit: usize,
}

impl QueryWorkers {
    pub const DEFAULT_LIMIT: usize = 4;

    pub fn new(limit: usize) -> Self {
        Self {
            busy: Arc::new(AtomicUsize::new(0)),
            limit: limit.max(1),
        }
    }

    /// Queries that have not returned yet, including abandoned ones.
    pub fn busy(&self) -> usize {
        self.busy.load(Ordering::SeqCst)
    }

    fn acquire(&self) -> Option<WorkerSlot> {
        self.busy
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.limit).then_some(n + 1)
            })
            .ok()
            .map(|_| WorkerSlot(Arc::clone(&self.busy)))
    }
}

impl Default for QueryWorkers {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIMIT)
    }
}

struct WorkerSlot(Arc<AtomicUsize>);

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Bounds the time spent waiting for an answer.
///
/// The query runs on a worker thread. A blocking call cannot be cancelled,
/// so after a timeout the worker keeps running until the service returns
/// and its late answer is dropped. At most `QueryWorkers::limit` such
/// threads exist per pool; while all are busy, queries fail with
/// `TrustViewError::OracleTimeout` without starting another.
pub struct TimeLimitedOracle {
    inner: Arc<dyn ValidationOracle>,
    timeout: Duration,
    workers: QueryWorkers,
}

impl TimeLimitedOracle {
    pub fn new(inner: Arc<dyn ValidationOracle>, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            workers: QueryWorkers::default(),
        }
    }

    pub fn with_workers(mut self, workers: QueryWorkers) -> Self {
        self.workers = workers;
        self
    }
}

impl ValidationOracle for TimeLimitedOracle {
    fn query(&self, certificate: &TrustCertificate) -> Result<ValidationResult> {
        let Some(slot) = self.workers.acquire() else {
            log::warn!(
                "{} validation service queries still pending, not starting another",
                self.workers.busy()
            );
            return Err(TrustViewError::OracleTimeout);
        };

        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let certificate = certificate.clone();

        std::thread::Builder::new()
            .name("validation-service-query".into())
            .spawn(move || {
                let _slot = slot;
                let _ = tx.send(inner.query(&certificate));
            })
            .map_err(|e| TrustViewError::OracleFailure(format!("cannot spawn query: {e}")))?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                log::warn!("Validation service did not answer within {:?}", self.timeout);
                Err(TrustViewError::OracleTimeout)
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(TrustViewError::OracleFailure(
                "validation service query aborted".into(),
            )),
        }
    }
}
