//! Request policy around the trust engine.
//!
//! Runs inside one open trust view. Decides whether the engine runs at all
//! (path validity, watchlist, known revocations), which validation service
//! it may consult, and what bookkeeping follows its verdict.

use std::sync::Arc;

use crate::config::ValidationSettings;
use crate::engine::TrustEngine;
use crate::error::{Result, TrustViewError};
use crate::view::TrustView;

use super::hosts::{derive_result_spec, insert_hosts_for_certificate};
use super::{
    FixedOracle, ListedOracle, PathValidity, ValidationInformation, ValidationOracle,
    ValidationRequest, ValidationRequestSpec, ValidationResult, ValidationResultSpec,
};

/// Answer `request` against `view`.
///
/// `oracle` is the validation service used when services are enabled for
/// the request.
///
/// # Errors
///
/// Returns `TrustViewError::InvalidRequest` for an empty path or a security
/// level outside `[0, 1]`, and propagates engine and validation service
/// errors.
pub fn dispatch(
    view: &mut dyn TrustView,
    engine: &TrustEngine,
    settings: &ValidationSettings,
    request: &ValidationRequest,
    oracle: Arc<dyn ValidationOracle>,
    now: u64,
) -> Result<ValidationInformation> {
    let host_certificate = request
        .host_certificate()
        .ok_or_else(|| TrustViewError::InvalidRequest("empty certificate path".into()))?;
    if !(0.0..=1.0).contains(&request.security_level) {
        return Err(TrustViewError::InvalidRequest(format!(
            "security level {} is outside [0, 1]",
            request.security_level
        )));
    }

    if request.requested_path_validity != PathValidity::Valid
        && request.spec != ValidationRequestSpec::RetrieveRecommendation
    {
        log::debug!(
            "Path for {} is {:?}, not validating",
            request.url,
            request.requested_path_validity
        );
        return Ok(ValidationInformation::new(
            ValidationResult::Unknown,
            ValidationResultSpec::Validated,
        ));
    }

    let spec = match request.spec {
        ValidationRequestSpec::Validate if settings.bootstrapping_mode => {
            ValidationRequestSpec::ValidateWithServices
        }
        ValidationRequestSpec::Validate => ValidationRequestSpec::ValidateWithoutServices,
        other => other,
    };

    let mut active: Arc<dyn ValidationOracle> = Arc::clone(&oracle);
    match spec {
        ValidationRequestSpec::ValidateTrustEndCertificate => {
            log::info!("{host_certificate} trusted directly, adding it to the watchlist");
            view.add_to_watchlist(host_certificate, now);
            return Ok(ValidationInformation::new(
                ValidationResult::Trusted,
                ValidationResultSpec::ValidatedOnWatchlist,
            ));
        }
        ValidationRequestSpec::RetrieveRecommendation => {
            let recommendation = oracle.query(host_certificate)?;
            return Ok(ValidationInformation::new(
                recommendation,
                ValidationResultSpec::Recommended,
            ));
        }
        ValidationRequestSpec::ValidateWithoutServices => {
            active = Arc::new(FixedOracle(ValidationResult::Unknown));
        }
        ValidationRequestSpec::Validate | ValidationRequestSpec::ValidateWithServices => {}
    }

    if let Some(added) = view.watchlist_timestamp(host_certificate) {
        if now.saturating_sub(added) > settings.watchlist_expiration {
            log::info!("Watchlist entry for {host_certificate} expired, validating with services");
            view.remove_from_watchlist(host_certificate);
            active = Arc::clone(&oracle);
        } else {
            return Ok(ValidationInformation::new(
                ValidationResult::Trusted,
                ValidationResultSpec::ValidatedOnWatchlist,
            ));
        }
    }

    if let Some(revoked) = request.certificate_path.iter().find(|c| view.is_revoked(c)) {
        log::info!("{revoked} is revoked");
        return Ok(ValidationInformation::new(
            ValidationResult::Untrusted,
            ValidationResultSpec::ValidatedRevoked,
        ));
    }

    let result_spec = derive_result_spec(view, host_certificate, &request.url, now);
    if result_spec == ValidationResultSpec::ValidatedExistingExpiredSameCaKey {
        // Renewal under the same CA and key.
        active = Arc::new(
            ListedOracle::new([host_certificate.clone()], std::iter::empty()).with_fallback(active),
        );
    }

    let result = engine.validate(
        view,
        &request.certificate_path,
        request.security_level,
        active.as_ref(),
        now,
    )?;

    if result != ValidationResult::Unknown {
        insert_hosts_for_certificate(view, host_certificate, &request.url);
    }

    if result == ValidationResult::Unknown
        && matches!(
            result_spec,
            ValidationResultSpec::ValidatedExistingValidSameKey
                | ValidationResultSpec::ValidatedExistingExpiredSameCa
        )
    {
        log::info!("{host_certificate} looks like a routine change ({result_spec:?}), watching it");
        view.add_to_watchlist(host_certificate, now);
        return Ok(ValidationInformation::new(
            ValidationResult::Trusted,
            ValidationResultSpec::ValidatedOnWatchlist,
        ));
    }

    Ok(ValidationInformation::new(result, result_spec))
}
