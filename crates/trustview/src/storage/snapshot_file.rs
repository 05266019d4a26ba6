//! Snapshot file for a complete trust view.
//!
//! File format:
//! ```json
//! {
//!   "version": 1,
//!   "assessments": [ ... ],
//!   "certificates": [ { "certificate": { ... }, "trusted": true, ... } ],
//!   "watchlist": [ { "certificate": { ... }, "added_at": 1700000000000000 } ],
//!   "hosts": [ { "host": "www.example.org", "certificates": [ ... ] } ],
//!   "crls": [ ... ],
//!   "ocsp": [ ... ]
//! }
//! ```
//!
//! Writes go to a sibling temporary file that is then renamed over the
//! target, so readers never observe a partial snapshot.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::certificate::TrustCertificate;
use crate::error::{Result, TrustViewError};
use crate::revocation::info::{CrlInfo, OcspInfo};
use crate::view::state::CertificateFlags;
use crate::view::{TrustAssessment, TrustViewState};

// ── File format constants ─────────────────────────────────────────────────────

const SNAPSHOT_FILE_VERSION: u32 = 1;

// ── On-disk structures ────────────────────────────────────────────────────────

/// One row of the certificate table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub certificate: TrustCertificate,
    pub trusted: bool,
    pub untrusted: bool,
    #[serde(default)]
    pub revoked: bool,
    /// Whether the certificate belongs to some assessment's S set.
    pub in_s: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct WatchlistEntry {
    certificate: TrustCertificate,
    added_at: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct HostEntry {
    host: String,
    certificates: Vec<TrustCertificate>,
}

/// Wrapper written to disk.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    #[serde(default)]
    revision: u64,
    assessments: Vec<TrustAssessment>,
    certificates: Vec<CertificateRecord>,
    #[serde(default)]
    watchlist: Vec<WatchlistEntry>,
    #[serde(default)]
    hosts: Vec<HostEntry>,
    #[serde(default)]
    crls: Vec<CrlInfo>,
    #[serde(default)]
    ocsp: Vec<OcspInfo>,
}

impl SnapshotFile {
    fn from_state(state: &TrustViewState) -> Self {
        let mut certificates: Vec<CertificateRecord> = state
            .certificates
            .iter()
            .map(|(cert, flags)| CertificateRecord {
                certificate: cert.clone(),
                trusted: flags.trusted,
                untrusted: flags.untrusted,
                revoked: flags.revoked,
                in_s: state.is_in_s(cert),
            })
            .collect();
        certificates.sort_by(|a, b| a.certificate.cmp(&b.certificate));

        let mut assessments: Vec<TrustAssessment> = state.assessments.values().cloned().collect();
        assessments.sort_by(|a, b| a.key.cmp(&b.key));

        let mut watchlist: Vec<WatchlistEntry> = state
            .watchlist
            .iter()
            .map(|(cert, ts)| WatchlistEntry {
                certificate: cert.clone(),
                added_at: *ts,
            })
            .collect();
        watchlist.sort_by(|a, b| a.certificate.cmp(&b.certificate));

        let mut hosts: Vec<HostEntry> = state
            .hosts
            .iter()
            .map(|(host, certs)| HostEntry {
                host: host.clone(),
                certificates: certs.iter().cloned().collect(),
            })
            .collect();
        hosts.sort_by(|a, b| a.host.cmp(&b.host));

        Self {
            version: SNAPSHOT_FILE_VERSION,
            revision: state.revision,
            assessments,
            certificates,
            watchlist,
            hosts,
            crls: state.crls.values().cloned().collect(),
            ocsp: state.ocsp.values().cloned().collect(),
        }
    }

    fn into_state(self) -> TrustViewState {
        let mut state = TrustViewState::new();
        for record in self.certificates {
            // a record claiming both flags is read as untrusted
            let untrusted = record.revoked || record.untrusted;
            state.certificates.insert(
                record.certificate,
                CertificateFlags {
                    trusted: record.trusted && !untrusted,
                    untrusted,
                    revoked: record.revoked,
                },
            );
        }
        for assessment in self.assessments {
            for cert in &assessment.s {
                state.certificates.entry(cert.clone()).or_default();
            }
            state.assessments.insert(assessment.key.clone(), assessment);
        }
        for entry in self.watchlist {
            state
                .certificates
                .entry(entry.certificate.clone())
                .or_default();
            state.watchlist.insert(entry.certificate, entry.added_at);
        }
        for entry in self.hosts {
            let certs = state.hosts.entry(entry.host).or_default();
            for cert in entry.certificates {
                certs.insert(cert);
            }
        }
        for info in self.crls {
            state.crls.insert(info.key.clone(), info);
        }
        for info in self.ocsp {
            state.ocsp.insert(info.key.clone(), info);
        }
        state.revision = self.revision;
        state.dirty = false;
        state
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Write `state` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns `TrustViewError::SerializationError` if encoding fails, or
/// `TrustViewError::Io` for filesystem errors.
pub fn save_snapshot(path: &Path, state: &TrustViewState) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = SnapshotFile::from_state(state);
    let json = serde_json::to_string_pretty(&file)
        .map_err(|e| TrustViewError::SerializationError(e.to_string()))?;

    let tmp = temp_path(path);
    std::fs::write(&tmp, json.as_bytes())?;
    std::fs::rename(&tmp, path)?;

    log::debug!("Saved trust view revision {} to {}", state.revision, path.display());
    Ok(())
}

/// Read a trust view from `path`.
///
/// # Errors
///
/// Returns `TrustViewError::NotFound` if the file does not exist,
/// `TrustViewError::InvalidFileFormat` for malformed or unsupported files,
/// or `TrustViewError::Io` for other filesystem errors.
pub fn load_snapshot(path: &Path) -> Result<TrustViewState> {
    if !path.exists() {
        return Err(TrustViewError::NotFound(format!(
            "trust view snapshot not found: {}",
            path.display()
        )));
    }

    let bytes = std::fs::read(path)?;
    let file: SnapshotFile = serde_json::from_slice(&bytes).map_err(|e| {
        TrustViewError::InvalidFileFormat(format!(
            "failed to parse trust view snapshot {}: {e}",
            path.display()
        ))
    })?;

    if file.version != SNAPSHOT_FILE_VERSION {
        return Err(TrustViewError::InvalidFileFormat(format!(
            "unsupported snapshot version {} in {}",
            file.version,
            path.display()
        )));
    }

    Ok(file.into_state())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
