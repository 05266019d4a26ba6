//! Integration tests: validation requests against a file-backed model.
//!
//! Exercises the full request path (configuration, dispatcher policy,
//! engine, commit) and checks what survives a reopen of the store.

use std::sync::Arc;

use serde_json::json;
use tempfile::tempdir;

use trustview::config::BOOTSTRAPPING_MODE;
use trustview::validation::ListedOracle;
use trustview::{
    Configuration, LocalModel, Model, TrustCertificate, TrustView, ValidationRequest,
    ValidationRequestSpec, ValidationResult, ValidationResultSpec, Validator,
};

const URL: &str = "https://www.example.org/login";

fn cert(serial: &str, issuer: &str, subject: &str, key: &str) -> TrustCertificate {
    TrustCertificate::new(serial, issuer, subject, key, 0, u64::MAX)
}

fn root() -> TrustCertificate {
    cert("01", "RCA1", "RCA1", "RCA1-Key")
}

fn sca1() -> TrustCertificate {
    cert("02", "RCA1", "SCA1", "SCA1-Key")
}

fn sca2() -> TrustCertificate {
    cert("03", "RCA1", "SCA2", "SCA2-Key")
}

fn host_cert() -> TrustCertificate {
    cert("21", "SCA1", "www.example.org", "Host-Key")
}

fn request(path: Vec<TrustCertificate>) -> ValidationRequest {
    ValidationRequest::new(URL, path, 0.8, ValidationRequestSpec::Validate)
}

fn bootstrapping() -> Configuration {
    Configuration::default().with(BOOTSTRAPPING_MODE, json!(true))
}

fn trusting(certificates: impl IntoIterator<Item = TrustCertificate>) -> Validator {
    Validator::new(Arc::new(ListedOracle::new(certificates, std::iter::empty())))
}

/// A service that knows nothing.
fn offline() -> Validator {
    trusting(std::iter::empty())
}

#[test]
fn bootstrapped_verdict_survives_reopen() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("trustview.json");

    {
        let model = LocalModel::open(&store).unwrap();
        let info = trusting([host_cert()]).validate(
            &model,
            &bootstrapping(),
            &request(vec![root(), sca1(), host_cert()]),
        );
        assert_eq!(info.result, ValidationResult::Trusted);
        assert_eq!(info.result_spec, ValidationResultSpec::ValidatedFirstSeen);
        assert!(info.diagnostic.is_none());
    }

    let model = LocalModel::open(&store).unwrap();
    let view = model.open_trust_view().unwrap();
    assert!(view.is_trusted(&host_cert()));
    assert_eq!(view.assessments().len(), 2);
    assert_eq!(view.certificates_for_host("www.example.org"), vec![host_cert()]);
    assert_eq!(view.assessment_for(&sca1()).unwrap().o_it_ee.r, 1.0);
}

#[test]
fn repeated_request_is_answered_from_the_view() {
    let model = LocalModel::in_memory();
    let validator = trusting([host_cert()]);
    let req = request(vec![root(), sca1(), host_cert()]);

    let first = validator.validate(&model, &bootstrapping(), &req);
    assert_eq!(first.result, ValidationResult::Trusted);
    let before = model.open_trust_view().unwrap().assessments();

    // A validator with no trusted certificates still answers from the view.
    let second = offline().validate(&model, &Configuration::default(), &req);
    assert_eq!(second.result, ValidationResult::Trusted);
    assert_eq!(second.result_spec, ValidationResultSpec::Validated);
    assert_eq!(model.open_trust_view().unwrap().assessments(), before);
}

#[test]
fn key_kept_across_ca_change_goes_on_watchlist() {
    let model = LocalModel::in_memory();
    let first = trusting([host_cert()]).validate(
        &model,
        &bootstrapping(),
        &request(vec![root(), sca1(), host_cert()]),
    );
    assert_eq!(first.result, ValidationResult::Trusted);

    // Same key, now issued by SCA2. Without services the evidence is
    // inconclusive, but the history of the host vouches for it.
    let moved = cert("35", "SCA2", "www.example.org", "Host-Key");
    let req = request(vec![root(), sca2(), moved.clone()]);
    let info = offline().validate(&model, &Configuration::default(), &req);
    assert_eq!(info.result, ValidationResult::Trusted);
    assert_eq!(info.result_spec, ValidationResultSpec::ValidatedOnWatchlist);

    let view = model.open_trust_view().unwrap();
    assert!(view.watchlist_timestamp(&moved).is_some());
    assert!(!view.is_trusted(&moved));

    let again = offline().validate(&model, &Configuration::default(), &req);
    assert_eq!(again.result_spec, ValidationResultSpec::ValidatedOnWatchlist);
}

#[test]
fn configuration_file_overrides_the_service() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.json");
    std::fs::write(
        &config_path,
        r#"{ "bootstrapping-mode": true, "override-validation-service-result": "untrusted" }"#,
    )
    .unwrap();
    let config = Configuration::load(&config_path).unwrap();

    let model = LocalModel::in_memory();
    let info = trusting([host_cert()]).validate(
        &model,
        &config,
        &request(vec![root(), sca1(), host_cert()]),
    );
    assert_eq!(info.result, ValidationResult::Untrusted);

    let view = model.open_trust_view().unwrap();
    assert!(!view.is_trusted(&host_cert()));
    assert_eq!(view.untrusted_certificates().len(), 1);
}

#[test]
fn trusted_end_certificate_skips_the_engine() {
    let model = LocalModel::in_memory();
    let mut req = request(vec![root(), sca1(), host_cert()]);
    req.spec = ValidationRequestSpec::ValidateTrustEndCertificate;

    let info = offline().validate(&model, &Configuration::default(), &req);
    assert_eq!(info.result, ValidationResult::Trusted);
    assert_eq!(info.result_spec, ValidationResultSpec::ValidatedOnWatchlist);

    let view = model.open_trust_view().unwrap();
    assert!(view.assessments().is_empty());
    assert!(view.watchlist_timestamp(&host_cert()).is_some());
}

#[test]
fn malformed_configuration_is_reported_not_panicked() {
    let model = LocalModel::in_memory();
    let config = Configuration::default().with(BOOTSTRAPPING_MODE, json!("perhaps"));
    let req = request(vec![root(), sca1(), host_cert()]);
    let info = offline().validate(&model, &config, &req);
    assert_eq!(info.result, ValidationResult::Unknown);
    assert!(info.diagnostic.unwrap().contains(BOOTSTRAPPING_MODE));
}
