//! Host ↔ certificate history and result-spec derivation.
//!
//! Certificates that received a verdict are associated with the hosts they
//! were presented for. When a new certificate shows up for a known host,
//! its relation to the previously trusted certificates (same CA, same key,
//! expired or still valid) tells the dispatcher whether this looks like a
//! routine renewal.

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::certificate::TrustCertificate;
use crate::view::TrustView;

use super::ValidationResultSpec;

fn subdomain_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[^.]+\.(.+\..+)$").ok())
        .as_ref()
}

/// `www.example.org` → `*.example.org`. `None` for hosts with fewer than
/// three labels.
pub fn wildcard_host(host: &str) -> Option<String> {
    let pattern = subdomain_pattern()?;
    let captures = pattern.captures(host)?;
    Some(format!("*.{}", &captures[1]))
}

/// The host part of `url`, or `url` itself if it does not parse.
pub fn extract_host(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed
            .host_str()
            .map(|h| h.to_ascii_lowercase())
            .unwrap_or_else(|| url.to_string()),
        Err(e) => {
            log::debug!("Treating '{url}' as a bare host: {e}");
            url.to_ascii_lowercase()
        }
    }
}

/// Associate `certificate` with the hosts it names and with the host of
/// `url` unless one of its names already covers it.
pub fn insert_hosts_for_certificate(
    view: &mut dyn TrustView,
    certificate: &TrustCertificate,
    url: &str,
) {
    let names = certificate.subject_hosts();
    for name in names {
        view.add_host(certificate, name);
    }
    if url.is_empty() {
        return;
    }

    let host = extract_host(url);
    let covered = names.iter().any(|n| n.eq_ignore_ascii_case(&host))
        || wildcard_host(&host).map_or(false, |w| names.iter().any(|n| n.eq_ignore_ascii_case(&w)));
    if !covered {
        view.add_host(certificate, &host);
    }
}

/// Certificates associated with the host of `url` or its wildcard form.
pub fn certificates_for_host(view: &dyn TrustView, url: &str) -> Vec<TrustCertificate> {
    let host = extract_host(url);
    let mut certificates = view.certificates_for_host(&host);
    if let Some(wildcard) = wildcard_host(&host) {
        for cert in view.certificates_for_host(&wildcard) {
            if !certificates.contains(&cert) {
                certificates.push(cert);
            }
        }
    }
    certificates
}

/// Outside the validity window at `now`.
pub fn is_expired(certificate: &TrustCertificate, now: u64) -> bool {
    !certificate.is_within_validity(now)
}

/// Neither expired nor revoked.
pub fn is_valid(view: &dyn TrustView, certificate: &TrustCertificate, now: u64) -> bool {
    !is_expired(certificate, now) && !view.is_revoked(certificate)
}

/// Classify `host_certificate` against the trusted history of the host of
/// `url`.
pub fn derive_result_spec(
    view: &dyn TrustView,
    host_certificate: &TrustCertificate,
    url: &str,
    now: u64,
) -> ValidationResultSpec {
    if view.is_trusted(host_certificate) || view.is_untrusted(host_certificate) {
        return ValidationResultSpec::Validated;
    }

    let previous: Vec<TrustCertificate> = certificates_for_host(view, url)
        .into_iter()
        .filter(|c| view.is_trusted(c))
        .collect();
    let same_ca = |c: &TrustCertificate| c.issuer == host_certificate.issuer;
    let same_key = |c: &TrustCertificate| c.public_key == host_certificate.public_key;

    if previous
        .iter()
        .any(|c| is_expired(c, now) && !view.is_revoked(c) && same_ca(c) && same_key(c))
    {
        return ValidationResultSpec::ValidatedExistingExpiredSameCaKey;
    }
    if previous
        .iter()
        .any(|c| is_valid(view, c, now) && !same_ca(c) && same_key(c))
    {
        return ValidationResultSpec::ValidatedExistingValidSameKey;
    }
    if previous
        .iter()
        .any(|c| !is_valid(view, c, now) && same_ca(c))
    {
        return ValidationResultSpec::ValidatedExistingExpiredSameCa;
    }
    if previous.iter().any(|c| is_valid(view, c, now) && same_ca(c)) {
        return ValidationResultSpec::ValidatedExistingValidSameCa;
    }
    if previous.iter().any(|c| !same_ca(c) && !same_key(c)) {
        ValidationResultSpec::ValidatedExisting
    } else {
        ValidationResultSpec::ValidatedFirstSeen
    }
}
