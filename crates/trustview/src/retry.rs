//! Bounded retry of optimistic trust view transactions.
//!
//! A transaction opens a view, mutates it in memory and commits. Conflicts
//! and other transient failures (see
//! [`TrustViewError::is_retryable`](crate::error::TrustViewError::is_retryable))
//! restart the whole cycle after a delay, up to a fixed attempt budget.

use std::time::Duration;

use crate::error::Result;
use crate::view::Model;

/// Attempt budget plus the pause before each retry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// 60 attempts, 500 ms apart: validation requests.
    pub fn validation() -> Self {
        Self::fixed(60, Duration::from_millis(500))
    }

    /// 60 attempts, 1 s apart: background revocation refresh.
    pub fn revocation() -> Self {
        Self::fixed(60, Duration::from_millis(1_000))
    }

    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Run `attempt` until it succeeds, fails permanently, or the budget is
    /// spent. `attempt` receives the 1-based attempt number.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error, or the last retryable one once
    /// all attempts failed.
    pub fn run<T>(&self, mut attempt: impl FnMut(u32) -> Result<T>) -> Result<T> {
        let mut n = 1;
        loop {
            match attempt(n) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && n < self.max_attempts => {
                    log::debug!("Attempt {n}/{} failed: {e}", self.max_attempts);
                    n += 1;
                    std::thread::sleep(self.delay);
                }
                Err(e) => {
                    if e.is_retryable() {
                        log::warn!("Giving up after {n} attempts: {e}");
                    }
                    return Err(e);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::validation()
    }
}

/// Run `body` inside a trust view transaction, retrying the whole
/// open-mutate-commit cycle according to `policy`.
///
/// # Errors
///
/// Propagates the error of the last attempt.
pub fn transact<M, T>(
    model: &M,
    policy: &RetryPolicy,
    mut body: impl FnMut(&mut M::View) -> Result<T>,
) -> Result<T>
where
    M: Model + ?Sized,
{
    policy.run(|_| {
        let mut view = model.open_trust_view()?;
        let value = body(&mut view)?;
        model.commit(view)?;
        Ok(value)
    })
}
