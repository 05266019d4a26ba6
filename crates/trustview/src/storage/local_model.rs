//! In-process trust view model.
//!
//! Holds the committed [`TrustViewState`] behind a mutex. Each transaction
//! works on a clone; a commit is accepted only if no other commit happened
//! since the clone was taken. A model opened on a file writes the snapshot
//! on every accepted commit.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::{Result, TrustViewError};
use crate::view::{Model, TrustViewState};

use super::snapshot_file::{load_snapshot, save_snapshot};

/// Reference implementation of [`Model`].
pub struct LocalModel {
    committed: Mutex<TrustViewState>,
    path: Option<PathBuf>,
}

impl LocalModel {
    /// A model that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            committed: Mutex::new(TrustViewState::new()),
            path: None,
        }
    }

    /// A model backed by the snapshot at `path`. A missing file starts an
    /// empty view; the file is created on the first commit.
    ///
    /// # Errors
    ///
    /// Returns `TrustViewError::InvalidFileFormat` or `TrustViewError::Io`
    /// if an existing snapshot cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = match load_snapshot(&path) {
            Ok(state) => state,
            Err(TrustViewError::NotFound(_)) => TrustViewState::new(),
            Err(e) => return Err(e),
        };
        log::debug!(
            "Opened trust view {} at revision {}",
            path.display(),
            state.revision()
        );
        Ok(Self {
            committed: Mutex::new(state),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of accepted commits that changed the view.
    ///
    /// # Errors
    ///
    /// Returns `TrustViewError::ModelAccess` if the model lock is poisoned.
    pub fn revision(&self) -> Result<u64> {
        Ok(self.lock()?.revision())
    }

    fn lock(&self) -> Result<MutexGuard<'_, TrustViewState>> {
        self.committed
            .lock()
            .map_err(|_| TrustViewError::ModelAccess("trust view lock poisoned".into()))
    }
}

impl Model for LocalModel {
    type View = TrustViewState;

    fn open_trust_view(&self) -> Result<TrustViewState> {
        let committed = self.lock()?;
        let mut view = committed.clone();
        view.dirty = false;
        Ok(view)
    }

    fn commit(&self, mut view: TrustViewState) -> Result<()> {
        let mut committed = self.lock()?;

        if view.revision != committed.revision {
            log::debug!(
                "Rejecting commit opened at revision {}, model is at {}",
                view.revision,
                committed.revision
            );
            return Err(TrustViewError::ConcurrentModification);
        }
        if !view.dirty {
            return Ok(());
        }

        view.revision = committed.revision + 1;
        view.dirty = false;
        if let Some(path) = &self.path {
            save_snapshot(path, &view)?;
        }
        *committed = view;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
