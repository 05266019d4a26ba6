//! Certificate path preconditions.
//!
//! A path runs from a self-signed root to the end-entity certificate.
//! Paths are linear by construction; cycles are rejected here instead of
//! being guarded against during the computation.

use std::collections::HashSet;

use crate::error::{Result, TrustViewError};

use super::TrustCertificate;

/// Check that `path` is usable by the trust engine.
///
/// # Errors
///
/// Returns `TrustViewError::InvalidPath` when the path has fewer than two
/// certificates, does not start at a self-signed root, breaks the
/// issuer/subject chain, or repeats a certificate or `(key, subject)` pair.
/// Returns `TrustViewError::InvalidCertificate` for malformed certificates.
pub fn check_path(path: &[TrustCertificate]) -> Result<()> {
    if path.len() < 2 {
        return Err(TrustViewError::InvalidPath(format!(
            "expected a root and an end-entity certificate, got {} certificate(s)",
            path.len()
        )));
    }

    for cert in path {
        cert.validate()?;
    }

    if !path[0].is_self_signed() {
        return Err(TrustViewError::InvalidPath(format!(
            "path does not start at a self-signed root: {}",
            path[0]
        )));
    }

    for pair in path.windows(2) {
        if pair[1].issuer != pair[0].subject {
            return Err(TrustViewError::InvalidPath(format!(
                "{} is not issued by {}",
                pair[1], pair[0].subject
            )));
        }
    }

    let mut seen_certs = HashSet::new();
    let mut seen_keys = HashSet::new();
    for cert in path {
        if !seen_certs.insert(cert) {
            return Err(TrustViewError::InvalidPath(format!(
                "certificate {cert} occurs twice"
            )));
        }
        if !seen_keys.insert((&cert.public_key, &cert.subject)) {
            return Err(TrustViewError::InvalidPath(format!(
                "key of {} occurs twice for the same subject",
                cert.subject
            )));
        }
    }

    Ok(())
}
