//! Stress test: revocation refresh over a large trust view.
//!
//! Hundreds of certificates share one CRL service; the refresh must
//! download it once, keep using stored data when the service is down, and
//! bound the re-check schedule of path checks.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use trustview::certificate::CertificateDetails;
use trustview::config::RevocationSettings;
use trustview::revocation::info::{supported_urls, CrlData, CrlInfo, OcspResponse, ServiceKey};
use trustview::revocation::{CHECK_MAX_MICROS, CHECK_MIN_MICROS};
use trustview::time::now_micros;
use trustview::{
    refresh_trust_view, LocalModel, Model, OfflineFetcher, RetryPolicy, RevocationFetcher,
    RevocationValidator, TrustCertificate, TrustView, TrustViewError, TrustViewState,
};

const CRL_URL: &str = "http://crl.example/rca1.crl";
const MINUTE: u64 = 60_000_000;
const HOUR: u64 = 60 * MINUTE;

/// Serves one CRL, counting downloads.
struct CountingCrl {
    revoked: BTreeSet<String>,
    next_update: u64,
    downloads: AtomicUsize,
}

impl CountingCrl {
    fn new(revoked: BTreeSet<String>, next_update: u64) -> Self {
        Self {
            revoked,
            next_update,
            downloads: AtomicUsize::new(0),
        }
    }
}

impl RevocationFetcher for CountingCrl {
    fn fetch_crl(&self, _url: &Url, _timeout: Duration) -> trustview::Result<CrlData> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(CrlData {
            this_update: 0,
            next_update: Some(self.next_update),
            revoked_serials: self.revoked.clone(),
        })
    }

    fn query_ocsp(
        &self,
        _url: &Url,
        _certificate: &TrustCertificate,
        _issuer: &TrustCertificate,
        _timeout: Duration,
    ) -> trustview::Result<OcspResponse> {
        Err(TrustViewError::RevocationService("no OCSP responder".into()))
    }
}

fn root() -> TrustCertificate {
    TrustCertificate::new("01", "RCA1", "RCA1", "RCA1-Key", 0, u64::MAX)
}

fn issued(i: usize) -> TrustCertificate {
    TrustCertificate::new(
        format!("{i:04}"),
        "RCA1",
        format!("host-{i}.example.org"),
        format!("Host-{i}-Key"),
        0,
        u64::MAX,
    )
    .with_details(CertificateDetails {
        crl_urls: vec![CRL_URL.into()],
        ..Default::default()
    })
}

fn crl_key() -> ServiceKey {
    ServiceKey::new(root(), &supported_urls(&[CRL_URL.to_string()]))
}

/// Every tenth serial.
fn revoked_serials(count: usize) -> BTreeSet<String> {
    (0..count).step_by(10).map(|i| format!("{i:04}")).collect()
}

fn seeded_model(count: usize) -> LocalModel {
    let model = LocalModel::in_memory();
    let mut view = model.open_trust_view().unwrap();
    view.set_trusted(&root());
    for i in 0..count {
        view.set_trusted(&issued(i));
    }
    model.commit(view).unwrap();
    model
}

fn quick() -> RetryPolicy {
    RetryPolicy::fixed(1_000, Duration::from_millis(1))
}

#[test]
fn stress_refresh_downloads_shared_crl_once() {
    let count = 500;
    let model = seeded_model(count);
    let fetcher = Arc::new(CountingCrl::new(
        revoked_serials(count),
        now_micros() + HOUR,
    ));
    let validator = RevocationValidator::new(fetcher.clone(), RevocationSettings::default());

    let report = refresh_trust_view(&model, &validator, &quick()).unwrap();
    assert_eq!(report.checked, count);
    assert_eq!(report.revoked, count / 10);
    assert_eq!(fetcher.downloads.load(Ordering::SeqCst), 1);

    let view = model.open_trust_view().unwrap();
    for i in 0..count {
        assert_eq!(view.is_revoked(&issued(i)), i % 10 == 0, "certificate {i}");
        assert_eq!(view.is_trusted(&issued(i)), i % 10 != 0, "certificate {i}");
    }
    assert!(view.crl(&crl_key()).unwrap().is_current(now_micros()));
}

#[test]
fn stress_crl_fetch_failure_keeps_stored_status() {
    let count = 200;
    let model = seeded_model(count);
    let now = now_micros();

    // A CRL that is already past its next update, listing every tenth serial.
    let stored = CrlInfo::from_data(
        crl_key(),
        CrlData {
            this_update: now - 2 * HOUR,
            next_update: Some(now - HOUR),
            revoked_serials: revoked_serials(count),
        },
    );
    let mut view = model.open_trust_view().unwrap();
    view.add_crl(stored.clone());
    model.commit(view).unwrap();

    let validator = RevocationValidator::new(Arc::new(OfflineFetcher), RevocationSettings::default());
    let report = refresh_trust_view(&model, &validator, &quick()).unwrap();
    assert_eq!(report.checked, count);
    assert_eq!(report.revoked, count / 10);

    let view = model.open_trust_view().unwrap();
    assert_eq!(view.crl(&crl_key()), Some(stored));
    assert!(view.is_revoked(&issued(0)));
    assert!(!view.is_revoked(&issued(1)));
    assert!(view.is_trusted(&issued(1)));
}

#[test]
fn stress_current_crl_is_not_downloaded_again() {
    let count = 100;
    let model = seeded_model(count);
    let fetcher = Arc::new(CountingCrl::new(BTreeSet::new(), now_micros() + HOUR));
    let validator = RevocationValidator::new(fetcher.clone(), RevocationSettings::default());

    for _ in 0..5 {
        let report = refresh_trust_view(&model, &validator, &quick()).unwrap();
        assert_eq!(report.revoked, 0);
    }
    assert_eq!(fetcher.downloads.load(Ordering::SeqCst), 1);
}

#[test]
fn path_check_schedule_is_bounded() {
    const NOW: u64 = 1_000 * HOUR;

    for (next_update, expected) in [
        (NOW + MINUTE, NOW + CHECK_MIN_MICROS),
        (NOW + 5 * HOUR, NOW + 5 * HOUR),
        (NOW + 30 * 24 * HOUR, NOW + CHECK_MAX_MICROS),
    ] {
        let fetcher = Arc::new(CountingCrl::new(BTreeSet::new(), next_update));
        let validator = RevocationValidator::new(fetcher, RevocationSettings::default());
        let path = [root(), issued(1)];
        let mut view = TrustViewState::new();

        let mut batch = validator.path_batch(&path);
        assert!(batch.validate(&mut view, NOW));
        batch.committed();

        assert_eq!(validator.cache().next_check(&path[1]), Some(expected));
        // Services that publish nothing are re-checked at the floor.
        assert_eq!(
            validator.cache().next_check(&path[0]),
            Some(NOW + CHECK_MIN_MICROS)
        );
    }
}

#[test]
fn path_check_is_skipped_while_scheduled() {
    const NOW: u64 = 1_000 * HOUR;
    let fetcher = Arc::new(CountingCrl::new(BTreeSet::new(), NOW + 5 * HOUR));
    let validator = RevocationValidator::new(fetcher.clone(), RevocationSettings::default());
    let path = [root(), issued(1)];

    for step in 0..10 {
        let mut view = TrustViewState::new();
        let mut batch = validator.path_batch(&path);
        assert!(batch.validate(&mut view, NOW + step * MINUTE));
        batch.committed();
    }
    assert_eq!(fetcher.downloads.load(Ordering::SeqCst), 1);

    // Once the scheduled time passes the certificate is checked again.
    let mut view = TrustViewState::new();
    let mut batch = validator.path_batch(&path);
    assert!(batch.validate(&mut view, NOW + 6 * HOUR));
    batch.committed();
    assert_eq!(fetcher.downloads.load(Ordering::SeqCst), 2);
}
