//! Certificate revocation checking.
//!
//! A [`RevocationValidator`] checks certificates against CRL and OCSP
//! services reached through a [`RevocationFetcher`] and records revoked
//! certificates in the trust view. Work is organized in batches: one for a
//! certificate path before it is validated, one for every certificate of
//! the view when refreshing in the background ([`refresh`]).

pub mod cache;
pub mod fetcher;
pub mod info;
pub mod refresh;
pub mod validator;

pub use cache::RevocationCache;
pub use fetcher::{OfflineFetcher, RevocationFetcher};
pub use info::{CrlData, CrlInfo, OcspInfo, OcspResponse, RevocationInfo, ServiceKey};
pub use refresh::{refresh_trust_view, RefreshReport, RevocationScheduler};
pub use validator::{RevocationBatch, RevocationValidator};

/// Shortest time a certificate checked in a path stays exempt from
/// rechecking (30 minutes, microseconds).
pub const CHECK_MIN_MICROS: u64 = 1_800_000_000;

/// Longest such time (48 hours, microseconds).
pub const CHECK_MAX_MICROS: u64 = 172_800_000_000;
