//! Integration tests: evidence accumulating over a sequence of validations.
//!
//! A small PKI with two roots, four intermediates and six end-entities is
//! validated path by path against a listed validation service, and the
//! resulting assessments are checked after every step.

use std::sync::Arc;

use trustview::config::TrustSettings;
use trustview::validation::ListedOracle;
use trustview::{
    TrustAssessment, TrustCertificate, TrustEngine, TrustView, TrustViewState, ValidationResult,
};

const LEVEL: f64 = 0.8;

fn cert(serial: &str, issuer: &str, subject: &str) -> TrustCertificate {
    TrustCertificate::new(serial, issuer, subject, format!("{subject}-Key"), 0, u64::MAX)
}

struct Pki {
    rca1_rca1: TrustCertificate,
    rca1_sca1: TrustCertificate,
    rca1_sca2: TrustCertificate,
    rca1_sca4: TrustCertificate,
    rca2_rca2: TrustCertificate,
    rca2_sca3: TrustCertificate,
    sca1_ee1: TrustCertificate,
    sca2_sca3: TrustCertificate,
    sca2_ee2: TrustCertificate,
    sca2_ee3: TrustCertificate,
    sca3_ee4: TrustCertificate,
    sca3_ee5: TrustCertificate,
    sca4_ee6: TrustCertificate,
}

impl Pki {
    fn new() -> Self {
        Self {
            rca1_rca1: cert("01", "RCA1", "RCA1"),
            rca1_sca1: cert("02", "RCA1", "SCA1"),
            rca1_sca2: cert("03", "RCA1", "SCA2"),
            rca1_sca4: cert("04", "RCA1", "SCA4"),
            rca2_rca2: cert("11", "RCA2", "RCA2"),
            rca2_sca3: cert("12", "RCA2", "SCA3"),
            sca1_ee1: cert("21", "SCA1", "EE1"),
            sca2_sca3: cert("31", "SCA2", "SCA3"),
            sca2_ee2: cert("32", "SCA2", "EE2"),
            sca2_ee3: cert("33", "SCA2", "EE3"),
            sca3_ee4: cert("41", "SCA3", "EE4"),
            sca3_ee5: cert("42", "SCA3", "EE5"),
            sca4_ee6: cert("62", "SCA4", "EE6"),
        }
    }

    /// Knows every certificate except EE3 and EE4 as trustworthy; SCA4's
    /// end-entity is unknown to it.
    fn service(&self) -> ListedOracle {
        ListedOracle::new(
            [
                &self.rca1_rca1,
                &self.rca1_sca1,
                &self.rca1_sca2,
                &self.rca1_sca4,
                &self.rca2_rca2,
                &self.rca2_sca3,
                &self.sca1_ee1,
                &self.sca2_sca3,
                &self.sca2_ee2,
                &self.sca3_ee5,
            ]
            .into_iter()
            .cloned(),
            [&self.sca2_ee3, &self.sca3_ee4].into_iter().cloned(),
        )
    }
}

fn engine(query_ca_certs: bool) -> TrustEngine {
    TrustEngine::new(TrustSettings {
        query_services_for_ca_certs: query_ca_certs,
        ..TrustSettings::default()
    })
}

fn assessment(view: &TrustViewState, ca: &TrustCertificate) -> TrustAssessment {
    view.assessment_for(ca)
        .unwrap_or_else(|| panic!("no assessment for {ca}"))
}

/// (o_it_ca.r, o_it_ca.s, o_it_ee.r, o_it_ee.s)
fn evidence(a: &TrustAssessment) -> (f64, f64, f64, f64) {
    (a.o_it_ca.r, a.o_it_ca.s, a.o_it_ee.r, a.o_it_ee.s)
}

fn sorted(mut certs: Vec<TrustCertificate>) -> Vec<TrustCertificate> {
    certs.sort();
    certs
}

#[test]
fn repeated_chains_with_ca_queries_converge() {
    let pki = Pki::new();
    let service = pki.service();
    let engine = engine(true);
    let mut view = TrustViewState::new();

    let paths = [
        vec![pki.rca1_rca1.clone(), pki.rca1_sca1.clone(), pki.sca1_ee1.clone()],
        vec![pki.rca1_rca1.clone(), pki.rca1_sca2.clone(), pki.sca2_ee3.clone()],
        vec![pki.rca1_rca1.clone(), pki.rca1_sca4.clone(), pki.sca4_ee6.clone()],
    ];

    for round in 0..10 {
        let verdicts: Vec<_> = paths
            .iter()
            .map(|path| engine.validate(&mut view, path, LEVEL, &service, round).unwrap())
            .collect();
        assert_eq!(
            verdicts,
            vec![
                ValidationResult::Trusted,
                ValidationResult::Untrusted,
                ValidationResult::Unknown
            ],
            "round {round}"
        );
        assert_eq!(view.assessments().len(), 3, "round {round}");

        let rca1 = assessment(&view, &pki.rca1_rca1);
        assert_eq!(evidence(&rca1), (2.0, 0.0, 0.0, 0.0), "round {round}");
        assert_eq!(rca1.s, vec![pki.rca1_rca1.clone()]);

        let sca1 = assessment(&view, &pki.rca1_sca1);
        assert_eq!(evidence(&sca1), (0.0, 0.0, 1.0, 0.0), "round {round}");
        assert_eq!(sca1.s, vec![pki.rca1_sca1.clone()]);

        let sca2 = assessment(&view, &pki.rca1_sca2);
        assert_eq!(evidence(&sca2), (0.0, 0.0, 0.0, 1.0), "round {round}");
        assert_eq!(sca2.s, vec![pki.rca1_sca2.clone()]);

        assert!(view.assessment_for(&pki.rca1_sca4).is_none());
        assert_eq!(view.trusted_certificates(), vec![pki.sca1_ee1.clone()]);
        assert_eq!(view.untrusted_certificates(), vec![pki.sca2_ee3.clone()]);
    }
}

#[test]
fn repeated_chains_without_ca_queries_blame_the_known_root() {
    let pki = Pki::new();
    let service = pki.service();
    let engine = engine(false);
    let mut view = TrustViewState::new();

    let first = [pki.rca1_rca1.clone(), pki.rca1_sca1.clone(), pki.sca1_ee1.clone()];
    let second = [pki.rca1_rca1.clone(), pki.rca1_sca2.clone(), pki.sca2_ee3.clone()];

    for round in 0..3 {
        assert_eq!(
            engine.validate(&mut view, &first, LEVEL, &service, round).unwrap(),
            ValidationResult::Trusted
        );
        assert_eq!(
            engine.validate(&mut view, &second, LEVEL, &service, round).unwrap(),
            ValidationResult::Untrusted
        );

        // SCA2 is new when the bad end-entity shows up, so the evidence
        // lands on the deepest CA already known: the root.
        assert_eq!(view.assessments().len(), 2, "round {round}");
        let rca1 = assessment(&view, &pki.rca1_rca1);
        assert_eq!(evidence(&rca1), (1.0, 1.0, 0.0, 0.0), "round {round}");
        assert!(view.assessment_for(&pki.rca1_sca2).is_none());
        assert!(view.is_untrusted(&pki.rca1_sca2));
        assert!(!view.is_untrusted(&pki.sca2_ee3));
    }
}

#[test]
fn paper_example_with_ca_queries() {
    let pki = Pki::new();
    let service = pki.service();
    let engine = engine(true);
    let mut view = TrustViewState::new();
    let validate = |view: &mut TrustViewState, path: &[&TrustCertificate]| {
        let path: Vec<_> = path.iter().map(|c| (*c).clone()).collect();
        engine.validate(view, &path, LEVEL, &service, 0).unwrap()
    };

    // RCA1 -> SCA1 -> EE1
    let verdict = validate(&mut view, &[&pki.rca1_rca1, &pki.rca1_sca1, &pki.sca1_ee1]);
    assert_eq!(verdict, ValidationResult::Trusted);
    assert_eq!(view.assessments().len(), 2);
    assert_eq!(evidence(&assessment(&view, &pki.rca1_rca1)), (1.0, 0.0, 0.0, 0.0));
    assert_eq!(evidence(&assessment(&view, &pki.rca1_sca1)), (0.0, 0.0, 1.0, 0.0));
    assert_eq!(view.trusted_certificates(), vec![pki.sca1_ee1.clone()]);
    assert!(view.untrusted_certificates().is_empty());

    // RCA1 -> SCA2 -> EE2
    let verdict = validate(&mut view, &[&pki.rca1_rca1, &pki.rca1_sca2, &pki.sca2_ee2]);
    assert_eq!(verdict, ValidationResult::Trusted);
    assert_eq!(view.assessments().len(), 3);
    assert_eq!(evidence(&assessment(&view, &pki.rca1_rca1)), (2.0, 0.0, 0.0, 0.0));
    assert_eq!(evidence(&assessment(&view, &pki.rca1_sca1)), (0.0, 0.0, 1.0, 0.0));
    assert_eq!(evidence(&assessment(&view, &pki.rca1_sca2)), (0.0, 0.0, 1.0, 0.0));
    assert_eq!(
        sorted(view.trusted_certificates()),
        sorted(vec![pki.sca1_ee1.clone(), pki.sca2_ee2.clone()])
    );

    // RCA1 -> SCA2 -> EE3: SCA2 is known, so it takes the blame
    let verdict = validate(&mut view, &[&pki.rca1_rca1, &pki.rca1_sca2, &pki.sca2_ee3]);
    assert_eq!(verdict, ValidationResult::Untrusted);
    assert_eq!(view.assessments().len(), 3);
    assert_eq!(evidence(&assessment(&view, &pki.rca1_rca1)), (2.0, 0.0, 0.0, 0.0));
    assert_eq!(evidence(&assessment(&view, &pki.rca1_sca2)), (0.0, 0.0, 1.0, 1.0));
    assert_eq!(view.untrusted_certificates(), vec![pki.sca2_ee3.clone()]);

    // RCA2 -> SCA3 -> EE4: the service vouches for the new SCA3
    let verdict = validate(&mut view, &[&pki.rca2_rca2, &pki.rca2_sca3, &pki.sca3_ee4]);
    assert_eq!(verdict, ValidationResult::Untrusted);
    assert_eq!(view.assessments().len(), 5);
    let rca2 = assessment(&view, &pki.rca2_rca2);
    assert_eq!(evidence(&rca2), (1.0, 0.0, 0.0, 0.0));
    assert_eq!(rca2.s, vec![pki.rca2_rca2.clone()]);
    let sca3 = assessment(&view, &pki.rca2_sca3);
    assert_eq!(evidence(&sca3), (0.0, 0.0, 0.0, 1.0));
    assert_eq!(sca3.s, vec![pki.rca2_sca3.clone()]);
    assert_eq!(
        sorted(view.untrusted_certificates()),
        sorted(vec![pki.sca2_ee3.clone(), pki.sca3_ee4.clone()])
    );

    // RCA1 -> SCA2 -> SCA3 -> EE5: SCA3 reached through a cross certificate
    let verdict = validate(
        &mut view,
        &[&pki.rca1_rca1, &pki.rca1_sca2, &pki.sca2_sca3, &pki.sca3_ee5],
    );
    assert_eq!(verdict, ValidationResult::Trusted);
    assert_eq!(view.assessments().len(), 5);
    assert_eq!(evidence(&assessment(&view, &pki.rca1_rca1)), (2.0, 0.0, 0.0, 0.0));
    assert_eq!(evidence(&assessment(&view, &pki.rca1_sca1)), (0.0, 0.0, 1.0, 0.0));
    assert_eq!(evidence(&assessment(&view, &pki.rca1_sca2)), (1.0, 0.0, 1.0, 1.0));
    assert_eq!(evidence(&assessment(&view, &pki.rca2_rca2)), (1.0, 0.0, 0.0, 0.0));
    let sca3 = assessment(&view, &pki.sca2_sca3);
    assert_eq!(evidence(&sca3), (0.0, 0.0, 1.0, 1.0));
    assert_eq!(
        sorted(sca3.s),
        sorted(vec![pki.rca2_sca3.clone(), pki.sca2_sca3.clone()])
    );
    assert_eq!(
        sorted(view.trusted_certificates()),
        sorted(vec![
            pki.sca1_ee1.clone(),
            pki.sca2_ee2.clone(),
            pki.sca3_ee5.clone()
        ])
    );
    assert_eq!(view.untrusted_certificates().len(), 2);
}

#[test]
fn unknown_verdicts_collect_no_evidence() {
    let pki = Pki::new();
    let service = pki.service();
    let mut view = TrustViewState::new();
    let path = [pki.rca1_rca1.clone(), pki.rca1_sca4.clone(), pki.sca4_ee6.clone()];

    let verdict = engine(true).validate(&mut view, &path, LEVEL, &service, 0).unwrap();
    assert_eq!(verdict, ValidationResult::Unknown);
    assert!(view.assessments().is_empty());
    assert!(view.trusted_certificates().is_empty());
    assert!(view.untrusted_certificates().is_empty());
}

#[test]
fn repeated_trust_raises_expectation_monotonically() {
    let pki = Pki::new();
    let service = pki.service();
    let engine = engine(false);
    let mut view = TrustViewState::new();
    let mut last = 0.0;

    // Each distinct end-entity under SCA1 adds one positive unit.
    for i in 0..8 {
        let ee = cert(&format!("5{i}"), "SCA1", &format!("EE-{i}"));
        let trusting = ListedOracle::new([ee.clone()], std::iter::empty())
            .with_fallback(Arc::new(service.clone()));
        let path = [pki.rca1_rca1.clone(), pki.rca1_sca1.clone(), ee];
        engine.validate(&mut view, &path, 0.99, &trusting, 0).unwrap();

        let sca1 = assessment(&view, &pki.rca1_sca1);
        let expectation = sca1.o_it_ee.expectation();
        assert!(expectation > last, "step {i}: {expectation} <= {last}");
        last = expectation;
    }
}
