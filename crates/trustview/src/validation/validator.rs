//! Retrying front end for validation requests.
//!
//! Every attempt opens a trust view, optionally checks the path for
//! revocation, runs the dispatcher and commits. Transient failures restart
//! the attempt. Requests that hit trouble are serialized through a
//! process-wide lock so that concurrent retries do not keep colliding.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::{Configuration, ServiceOverride, TrustSettings, ValidationSettings};
use crate::engine::TrustEngine;
use crate::error::{Result, TrustViewError};
use crate::retry::RetryPolicy;
use crate::revocation::RevocationValidator;
use crate::time::now_micros;
use crate::view::Model;

use super::dispatcher::dispatch;
use super::{
    CachingOracle, FixedOracle, PathValidity, QueryWorkers, TimeLimitedOracle,
    ValidationInformation, ValidationOracle, ValidationRequest, ValidationRequestSpec, ValidationResult,
};

static RETRY_LOCK: Mutex<()> = Mutex::new(());

/// Answers validation requests against a [`Model`].
pub struct Validator {
    service: Arc<dyn ValidationOracle>,
    policy: RetryPolicy,
    revocation: Option<Arc<RevocationValidator>>,
    workers: QueryWorkers,
}

impl Validator {
    /// A validator consulting `service` when validation services are
    /// enabled and not overridden by configuration.
    pub fn new(service: Arc<dyn ValidationOracle>) -> Self {
        Self {
            service,
            policy: RetryPolicy::validation(),
            revocation: None,
            workers: QueryWorkers::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Cap on validation service queries left running after a timeout,
    /// across all requests of this validator.
    pub fn with_query_workers(mut self, limit: usize) -> Self {
        self.workers = QueryWorkers::new(limit);
        self
    }

    /// Check request paths for revocation before validating them.
    pub fn with_revocation(mut self, revocation: Arc<RevocationValidator>) -> Self {
        self.revocation = Some(revocation);
        self
    }

    /// Answer `request`. Failures never escape: they produce UNKNOWN with
    /// a diagnostic.
    pub fn validate<M>(
        &self,
        model: &M,
        config: &Configuration,
        request: &ValidationRequest,
    ) -> ValidationInformation
    where
        M: Model + ?Sized,
    {
        log::info!(
            "Performing trust validation of {} at level {} ({:?})",
            request.url,
            request.security_level,
            request.spec
        );
        match self.try_validate(model, config, request) {
            Ok(info) => {
                log::info!(
                    "Trust validation of {} completed: {} ({:?})",
                    request.url,
                    info.result,
                    info.result_spec
                );
                info
            }
            Err(e) => {
                log::error!("Trust validation of {} failed: {e}", request.url);
                ValidationInformation::failed(e.to_string())
            }
        }
    }

    fn try_validate<M>(
        &self,
        model: &M,
        config: &Configuration,
        request: &ValidationRequest,
    ) -> Result<ValidationInformation>
    where
        M: Model + ?Sized,
    {
        let settings = ValidationSettings::from_config(config)?;
        let engine = TrustEngine::new(TrustSettings::from_config(config)?);
        let oracle = self.oracle_for(&settings);

        let mut retry_guard: Option<MutexGuard<'static, ()>> = None;
        let outcome = self.policy.run(|attempt| {
            if attempt > 1 && retry_guard.is_none() {
                log::warn!("Trust validation of {} is retrying", request.url);
                retry_guard = Some(RETRY_LOCK.lock().unwrap_or_else(PoisonError::into_inner));
            }
            self.attempt(model, &engine, &settings, request, Arc::clone(&oracle))
        });

        match outcome {
            Err(TrustViewError::OracleTimeout) => {
                log::warn!("Validation service kept timing out, validating without it");
                self.attempt(
                    model,
                    &engine,
                    &settings,
                    request,
                    Arc::new(FixedOracle(ValidationResult::Unknown)),
                )
            }
            other => other,
        }
    }

    fn oracle_for(&self, settings: &ValidationSettings) -> Arc<dyn ValidationOracle> {
        match settings.service_override {
            ServiceOverride::Fixed(result) => Arc::new(FixedOracle(result)),
            ServiceOverride::Off => Arc::new(CachingOracle::new(
                TimeLimitedOracle::new(Arc::clone(&self.service), settings.validation_timeout)
                    .with_workers(self.workers.clone()),
            )),
        }
    }

    fn attempt<M>(
        &self,
        model: &M,
        engine: &TrustEngine,
        settings: &ValidationSettings,
        request: &ValidationRequest,
        oracle: Arc<dyn ValidationOracle>,
    ) -> Result<ValidationInformation>
    where
        M: Model + ?Sized,
    {
        let mut view = model.open_trust_view()?;
        let now = now_micros();

        let checks_revocation = request.requested_path_validity == PathValidity::Valid
            && !matches!(
                request.spec,
                ValidationRequestSpec::RetrieveRecommendation
                    | ValidationRequestSpec::ValidateTrustEndCertificate
            );
        let mut batch = match &self.revocation {
            Some(revocation) if checks_revocation => {
                let mut batch = revocation.path_batch(&request.certificate_path);
                batch.validate(&mut view, now);
                Some(batch)
            }
            _ => None,
        };

        let info = dispatch(&mut view, engine, settings, request, oracle, now)?;
        model.commit(view)?;
        if let Some(batch) = batch.as_mut() {
            batch.committed();
        }
        Ok(info)
    }
}
