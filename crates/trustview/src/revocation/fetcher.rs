//! Network boundary of revocation checking.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::certificate::TrustCertificate;
use crate::error::{Result, TrustViewError};

use super::info::{CrlData, OcspResponse};

/// Retrieves revocation data from CRL distribution points and OCSP
/// responders.
///
/// Implementations decode the wire formats; the validator only sees the
/// parsed results.
pub trait RevocationFetcher: Send + Sync {
    /// Download and decode the CRL published at `url`.
    ///
    /// # Errors
    ///
    /// Returns `TrustViewError::RevocationService` if the CRL cannot be
    /// retrieved within `timeout` or does not decode.
    fn fetch_crl(&self, url: &Url, timeout: Duration) -> Result<CrlData>;

    /// Ask the responder at `url` about `certificate`, issued by `issuer`.
    ///
    /// # Errors
    ///
    /// Returns `TrustViewError::RevocationService` if the responder cannot
    /// be reached within `timeout` or gives no usable answer.
    fn query_ocsp(
        &self,
        url: &Url,
        certificate: &TrustCertificate,
        issuer: &TrustCertificate,
        timeout: Duration,
    ) -> Result<OcspResponse>;
}

impl<T: RevocationFetcher + ?Sized> RevocationFetcher for Arc<T> {
    fn fetch_crl(&self, url: &Url, timeout: Duration) -> Result<CrlData> {
        (**self).fetch_crl(url, timeout)
    }

    fn query_ocsp(
        &self,
        url: &Url,
        certificate: &TrustCertificate,
        issuer: &TrustCertificate,
        timeout: Duration,
    ) -> Result<OcspResponse> {
        (**self).query_ocsp(url, certificate, issuer, timeout)
    }
}

/// A fetcher without network access. Every request fails, so only
/// revocation data already stored in the view is used.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFetcher;

impl RevocationFetcher for OfflineFetcher {
    fn fetch_crl(&self, url: &Url, _timeout: Duration) -> Result<CrlData> {
        Err(TrustViewError::RevocationService(format!(
            "offline, cannot fetch CRL from {url}"
        )))
    }

    fn query_ocsp(
        &self,
        url: &Url,
        _certificate: &TrustCertificate,
        _issuer: &TrustCertificate,
        _timeout: Duration,
    ) -> Result<OcspResponse> {
        Err(TrustViewError::RevocationService(format!(
            "offline, cannot query OCSP responder {url}"
        )))
    }
}
