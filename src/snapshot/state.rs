//! The per-host current-state file and its single-writer lock.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use super::{SNAPSHOT_FORMAT, SystemSnapshot};
use crate::error::{MigratorError, Result};

/// Location of one host's current-state file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateStore {
    path: PathBuf,
}

/// Exclusive hold on a state file; released on drop.
#[derive(Debug)]
pub struct StateLock {
    file: File,
    path: PathBuf,
}

impl StateLock {
    /// Lock file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
        tracing::debug!(path = %self.path.display(), "state lock released");
    }
}

impl StateStore {
    /// Store backed by `path`.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// State file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<state>.lock`.
    fn lock_path(&self) -> PathBuf {
        let mut p = self.path.as_os_str().to_owned();
        p.push(".lock");
        PathBuf::from(p)
    }

    /// What: Take the single-writer lock without blocking.
    ///
    /// Output:
    /// - Guard held until dropped.
    ///
    /// # Errors
    /// - `StateLocked` when another scan or restore holds it.
    /// - `DestinationUnwritable` when the lock file cannot be created.
    pub fn lock(&self) -> Result<StateLock> {
        let path = self.lock_path();
        let unwritable = |e: std::io::Error| MigratorError::DestinationUnwritable {
            path: path.clone(),
            reason: e.to_string(),
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(unwritable)?;
        }
        let file = File::create(&path).map_err(unwritable)?;
        match file.try_lock_exclusive() {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "state lock acquired");
                Ok(StateLock { file, path })
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                Err(MigratorError::StateLocked { path })
            }
            Err(e) => Err(unwritable(e)),
        }
    }

    /// What: Read the current state.
    ///
    /// Output:
    /// - `None` when no state has been saved yet.
    ///
    /// # Errors
    /// - `ArtifactCorrupt` when the file cannot be decoded or has an unknown format.
    pub fn load(&self) -> Result<Option<SystemSnapshot>> {
        let body = match fs::read_to_string(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(MigratorError::ArtifactCorrupt {
                    path: self.path.clone(),
                    reason: e.to_string(),
                });
            }
        };
        load_snapshot_str(&self.path, &body).map(Some)
    }

    /// What: Replace the current state.
    ///
    /// Inputs:
    /// - `_lock`: Proof that the caller holds the writer lock.
    /// - `snapshot`: New current state.
    ///
    /// # Errors
    /// - `DestinationUnwritable` when the file cannot be written.
    ///
    /// Details:
    /// - Written to `<state>.tmp` and renamed over the old file.
    pub fn save(&self, _lock: &StateLock, snapshot: &SystemSnapshot) -> Result<()> {
        let unwritable = |e: std::io::Error| MigratorError::DestinationUnwritable {
            path: self.path.clone(),
            reason: e.to_string(),
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(unwritable)?;
        }
        let body = serde_json::to_string_pretty(snapshot)?;
        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, body).map_err(unwritable)?;
        fs::rename(&tmp, &self.path).map_err(unwritable)?;
        tracing::info!(
            path = %self.path.display(),
            packages = snapshot.packages.len(),
            configs = snapshot.configs.len(),
            "current state saved"
        );
        Ok(())
    }
}

/// What: Decode a snapshot document.
///
/// Inputs:
/// - `path`: Source path, for error messages.
/// - `body`: JSON text.
///
/// Output:
/// - Decoded snapshot.
///
/// # Errors
/// - `ArtifactCorrupt` on malformed JSON or an unknown `format_version`.
pub fn load_snapshot_str(path: &Path, body: &str) -> Result<SystemSnapshot> {
    let corrupt = |reason: String| MigratorError::ArtifactCorrupt {
        path: path.to_path_buf(),
        reason,
    };
    let snapshot: SystemSnapshot =
        serde_json::from_str(body).map_err(|e| corrupt(e.to_string()))?;
    if snapshot.format_version != SNAPSHOT_FORMAT {
        return Err(corrupt(format!(
            "unsupported snapshot format {}",
            snapshot.format_version
        )));
    }
    Ok(snapshot)
}
