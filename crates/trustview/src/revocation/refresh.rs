//! Background revocation refresh of the whole trust view.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::Result;
use crate::retry::RetryPolicy;
use crate::time::now_micros;
use crate::view::Model;

use super::validator::RevocationValidator;

/// Summary of one refresh run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Certificate/issuer pairs checked.
    pub checked: usize,
    /// Pairs whose certificate turned out revoked.
    pub revoked: usize,
}

/// Check every certificate of the view for revocation, one entry per
/// transaction, retrying conflicts according to `policy`.
///
/// # Errors
///
/// Returns the last error once `policy` is exhausted, or the first
/// non-retryable one.
pub fn refresh_trust_view<M>(
    model: &M,
    validator: &RevocationValidator,
    policy: &RetryPolicy,
) -> Result<RefreshReport>
where
    M: Model + ?Sized,
{
    log::info!("Performing revocation validation for trust view");
    let mut batch = policy.run(|_| {
        let view = model.open_trust_view()?;
        Ok(validator.view_batch(&view))
    })?;

    let mut report = RefreshReport::default();
    policy.run(|_| {
        while !batch.is_finished() {
            let mut view = model.open_trust_view()?;
            let clean = batch.validate_up_to(&mut view, 1, now_micros());
            if let Err(e) = model.commit(view) {
                batch.rolled_back();
                return Err(e);
            }
            batch.committed();
            report.checked += 1;
            if !clean {
                report.revoked += 1;
            }
        }
        Ok(())
    })?;

    log::info!(
        "Revocation validation completed: {} checked, {} revoked",
        report.checked,
        report.revoked
    );
    Ok(report)
}

/// Runs [`refresh_trust_view`] periodically on the tokio runtime.
pub struct RevocationScheduler {
    stop: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl RevocationScheduler {
    /// Spawn the refresh loop on the current runtime. The first refresh
    /// happens immediately if `check_initially` is set, otherwise after one
    /// checking interval.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<M>(
        model: Arc<M>,
        validator: Arc<RevocationValidator>,
        policy: RetryPolicy,
        check_initially: bool,
    ) -> Self
    where
        M: Model + 'static,
    {
        let period = validator
            .settings()
            .checking_interval
            .max(Duration::from_millis(1));
        let (stop, mut stopped) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            if !check_initially {
                ticker.tick().await;
            }

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let model = Arc::clone(&model);
                        let validator = Arc::clone(&validator);
                        let run = tokio::task::spawn_blocking(move || {
                            refresh_trust_view(model.as_ref(), &validator, &policy)
                        })
                        .await;
                        match run {
                            Ok(Ok(_)) => {}
                            Ok(Err(e)) => log::error!("Revocation information update failed: {e}"),
                            Err(e) => log::error!("Revocation refresh task aborted: {e}"),
                        }
                    }
                    changed = stopped.changed() => {
                        if changed.is_err() || *stopped.borrow() {
                            break;
                        }
                    }
                }
            }
            log::debug!("Revocation scheduler stopped");
        });

        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Signal the loop to end and wait for it. A refresh in progress is
    /// completed first.
    pub async fn stop(mut self) {
        let _ = self.stop.send(true);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                log::warn!("Revocation scheduler ended abnormally: {e}");
            }
        }
    }
}

impl Drop for RevocationScheduler {
    fn drop(&mut self) {
        let _ = self.stop.send(true);
    }
}
