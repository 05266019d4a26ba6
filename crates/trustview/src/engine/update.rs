//! View update after a verdict (reinforcement).

use crate::certificate::TrustCertificate;
use crate::error::Result;
use crate::opinion::EvidenceModel;
use crate::validation::{ValidationOracle, ValidationResult};
use crate::view::TrustView;

use super::computation::PathAssessments;

/// Record `path[i]` in S and, if the link to `path[i + 1]` is news, add a
/// positive unit to the issuer-trust opinion used for that link.
fn reinforce(
    pa: &mut PathAssessments,
    path: &[TrustCertificate],
    i: usize,
    evidence: &dyn EvidenceModel,
) {
    let last = pa.last_ca();
    let next_is_news = i < last
        && (pa.is_new[i + 1] || !pa.assessments[i + 1].contains(&path[i + 1]));

    let assessment = &mut pa.assessments[i];
    assessment.record(&path[i]);
    if i == last {
        assessment.o_it_ee.add_positive(1.0, evidence);
    } else if next_is_news {
        assessment.o_it_ca.add_positive(1.0, evidence);
    }
}

fn persist(view: &mut dyn TrustView, pa: &mut PathAssessments, i: usize, now: u64) {
    pa.assessments[i].updated_at = now;
    pa.is_new[i] = false;
    view.set_assessment(pa.assessments[i].clone());
}

/// Positive evidence along the whole path; the end-entity becomes trusted.
pub fn apply_trusted(
    view: &mut dyn TrustView,
    mut pa: PathAssessments,
    path: &[TrustCertificate],
    evidence: &dyn EvidenceModel,
    now: u64,
) {
    for i in 0..pa.len() {
        reinforce(&mut pa, path, i, evidence);
        persist(view, &mut pa, i, now);
    }
    if let Some(end_entity) = path.last() {
        view.set_trusted(end_entity);
    }
}

/// Blame the deepest CA that was already known (or, with CA queries, that
/// the validation service vouches for); the certificate it issued becomes
/// untrusted. CAs before it receive the usual positive evidence; new CAs
/// after it are not stored.
///
/// # Errors
///
/// Propagates validation service errors from CA queries.
pub fn apply_untrusted(
    view: &mut dyn TrustView,
    mut pa: PathAssessments,
    path: &[TrustCertificate],
    evidence: &dyn EvidenceModel,
    ca_oracle: Option<&dyn ValidationOracle>,
    now: u64,
) -> Result<()> {
    let h = blamed_index(&pa, path, ca_oracle)?;

    for j in 0..h {
        reinforce(&mut pa, path, j, evidence);
        persist(view, &mut pa, j, now);
    }

    let blamed = &path[h + 1];
    let already_untrusted = view.is_untrusted(blamed);
    let last = pa.last_ca();
    let assessment = &mut pa.assessments[h];
    assessment.record(&path[h]);
    if !already_untrusted {
        if h == last {
            assessment.o_it_ee.add_negative(1.0, evidence);
        } else {
            assessment.o_it_ca.add_negative(1.0, evidence);
        }
    }
    persist(view, &mut pa, h, now);

    log::info!("Marking {blamed} untrusted");
    view.set_untrusted(blamed);
    Ok(())
}

fn blamed_index(
    pa: &PathAssessments,
    path: &[TrustCertificate],
    ca_oracle: Option<&dyn ValidationOracle>,
) -> Result<usize> {
    for i in (0..pa.len()).rev() {
        if !pa.is_new[i] {
            return Ok(i);
        }
        if let Some(oracle) = ca_oracle {
            if i > 0 && oracle.query(&path[i])? == ValidationResult::Trusted {
                log::debug!("Validation service vouches for new CA {}", path[i]);
                return Ok(i);
            }
        }
    }
    Ok(0)
}
