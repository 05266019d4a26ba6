//! Chain opinion computation.
//!
//! Gathers the assessments of the CAs along a path (creating missing ones
//! in memory), finds the deepest unconditionally anchored CA and folds the
//! issuer-trust opinions from there to the end-entity.

use crate::certificate::TrustCertificate;
use crate::config::TrustSettings;
use crate::opinion::{fold_and, KeyLegitimacy, Opinion};
use crate::view::{TrustAssessment, TrustView};

// ---------------------------------------------------------------------------
// Path assessments
// ---------------------------------------------------------------------------

/// Assessments for every CA of a path, index-aligned with the path.
#[derive(Debug, Clone)]
pub struct PathAssessments {
    pub assessments: Vec<TrustAssessment>,
    /// `true` where the assessment was created for this path and is not
    /// yet stored.
    pub is_new: Vec<bool>,
}

impl PathAssessments {
    pub fn len(&self) -> usize {
        self.assessments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assessments.is_empty()
    }

    /// Index of the last CA, the one that issued the end-entity.
    pub fn last_ca(&self) -> usize {
        self.assessments.len().saturating_sub(1)
    }
}

/// Fetch or create the assessment of each CA in `path` (all but the last
/// certificate).
///
/// The root gets `o_kl = (1,1,1)`. Every new assessment starts with
/// `S = {certificate}` and vacuous issuer-trust opinions whose base rates
/// are the mean expectation of the corresponding opinions of assessments
/// that observed a certificate from the same issuer, capped at
/// `settings.max_f` (0.5 without such assessments).
pub fn collect_assessments(
    view: &dyn TrustView,
    path: &[TrustCertificate],
    settings: &TrustSettings,
    now: u64,
) -> PathAssessments {
    let ca_count = path.len().saturating_sub(1);
    let existing = view.assessments();
    let mut assessments: Vec<TrustAssessment> = Vec::with_capacity(ca_count);
    let mut is_new = Vec::with_capacity(ca_count);

    for (i, certificate) in path.iter().take(ca_count).enumerate() {
        if let Some(found) = view.assessment_for(certificate) {
            assessments.push(found);
            is_new.push(false);
            continue;
        }

        let siblings: Vec<&TrustAssessment> = existing
            .iter()
            .chain(assessments.iter())
            .filter(|a| a.has_issuer(&certificate.issuer))
            .collect();
        let (f_ca, f_ee) = seed_base_rates(&siblings, settings.max_f);

        let o_kl = if i == 0 {
            KeyLegitimacy::Present(Opinion::certain())
        } else {
            KeyLegitimacy::Absent
        };

        log::debug!("Creating assessment for {certificate} (f_ca={f_ca:.3}, f_ee={f_ee:.3})");
        assessments.push(TrustAssessment::new(
            certificate,
            o_kl,
            Opinion::vacuous(f_ca),
            Opinion::vacuous(f_ee),
            now,
        ));
        is_new.push(true);
    }

    PathAssessments {
        assessments,
        is_new,
    }
}

fn seed_base_rates(siblings: &[&TrustAssessment], max_f: f64) -> (f64, f64) {
    if siblings.is_empty() {
        return (0.5_f64.min(max_f), 0.5_f64.min(max_f));
    }
    let n = siblings.len() as f64;
    let ca = siblings.iter().map(|a| a.o_it_ca.expectation()).sum::<f64>() / n;
    let ee = siblings.iter().map(|a| a.o_it_ee.expectation()).sum::<f64>() / n;
    (ca.min(max_f), ee.min(max_f))
}

// ---------------------------------------------------------------------------
// Chain opinion
// ---------------------------------------------------------------------------

/// Highest index whose key legitimacy is exactly `(1,1,1)`, or 0.
pub fn anchor_index(path: &PathAssessments) -> usize {
    path.assessments
        .iter()
        .rposition(|a| a.o_kl.is_anchored())
        .unwrap_or(0)
}

/// Fold of the issuer-trust opinions from `from` to the last CA: `o_it_ca`
/// for intermediate steps, `o_it_ee` for the step to the end-entity.
pub fn chain_opinion(path: &PathAssessments, from: usize) -> Option<Opinion> {
    let last = path.last_ca();
    let steps: Vec<&Opinion> = path
        .assessments
        .iter()
        .enumerate()
        .skip(from)
        .map(|(i, a)| if i == last { &a.o_it_ee } else { &a.o_it_ca })
        .collect();
    fold_and(steps)
}
