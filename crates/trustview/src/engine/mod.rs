//! Trust path validation engine.
//!
//! Computes a verdict for a certificate path from the opinions stored in a
//! trust view and feeds the verdict back into the view as evidence:
//! 1. known trusted end-entity or known untrusted certificate short-circuits
//! 2. assessments are fetched or created for every CA of the path
//! 3. issuer-trust opinions are folded from the deepest anchored CA
//! 4. the expectation is compared against the requested level; uncertain
//!    chains are referred to the validation service
//! 5. the view is updated with the verdict (nothing happens on UNKNOWN)

pub mod computation;
pub mod update;

use std::sync::Arc;

use crate::certificate::{check_path, TrustCertificate};
use crate::config::TrustSettings;
use crate::error::Result;
use crate::opinion::{CertainTrustModel, EvidenceModel};
use crate::validation::{ValidationOracle, ValidationResult};
use crate::view::TrustView;

pub use computation::{anchor_index, chain_opinion, collect_assessments, PathAssessments};

/// Validates certificate paths against a trust view.
#[derive(Clone)]
pub struct TrustEngine {
    settings: TrustSettings,
    evidence: Arc<dyn EvidenceModel>,
}

impl TrustEngine {
    /// An engine using the CertainTrust evidence mapping with
    /// `settings.opinion_n`.
    pub fn new(settings: TrustSettings) -> Self {
        Self {
            evidence: Arc::new(CertainTrustModel::new(settings.opinion_n)),
            settings,
        }
    }

    pub fn with_evidence_model(mut self, evidence: Arc<dyn EvidenceModel>) -> Self {
        self.evidence = evidence;
        self
    }

    pub fn settings(&self) -> &TrustSettings {
        &self.settings
    }

    /// Validate `path` (root first) at assurance level `level` and update
    /// `view` with the outcome.
    ///
    /// # Errors
    ///
    /// Returns `TrustViewError::InvalidPath` or
    /// `TrustViewError::InvalidCertificate` for unusable paths, and
    /// propagates validation service errors.
    pub fn validate(
        &self,
        view: &mut dyn TrustView,
        path: &[TrustCertificate],
        level: f64,
        oracle: &dyn ValidationOracle,
        now: u64,
    ) -> Result<ValidationResult> {
        check_path(path)?;
        let end_entity = &path[path.len() - 1];

        if view.is_trusted(end_entity) {
            log::debug!("{end_entity} is already trusted");
            return Ok(ValidationResult::Trusted);
        }
        if let Some(untrusted) = path.iter().find(|c| view.is_untrusted(c)) {
            log::debug!("{untrusted} is untrusted");
            return Ok(ValidationResult::Untrusted);
        }

        let pa = collect_assessments(view, path, &self.settings, now);
        let h = anchor_index(&pa);
        let verdict = match chain_opinion(&pa, h) {
            Some(chain) => {
                let expectation = chain.expectation();
                log::debug!(
                    "Chain opinion from index {h}: {chain}, expectation {expectation:.4} (level {level})"
                );
                if expectation >= level {
                    ValidationResult::Trusted
                } else if chain.c == 1.0 {
                    ValidationResult::Untrusted
                } else {
                    let answer = oracle.query(end_entity)?;
                    log::debug!("Validation service answered {answer} for {end_entity}");
                    answer
                }
            }
            None => ValidationResult::Unknown,
        };

        match verdict {
            ValidationResult::Trusted => {
                update::apply_trusted(view, pa, path, self.evidence.as_ref(), now);
            }
            ValidationResult::Untrusted => {
                let ca_oracle = self.settings.query_services_for_ca_certs.then_some(oracle);
                update::apply_untrusted(view, pa, path, self.evidence.as_ref(), ca_oracle, now)?;
            }
            ValidationResult::Unknown => {}
        }

        log::info!("Trust validation of {end_entity}: {verdict}");
        Ok(verdict)
    }
}
