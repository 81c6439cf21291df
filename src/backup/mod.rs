//! Immutable backup artifacts: writing, listing, loading and retention.

pub mod artifact;
pub mod retention;

use std::path::PathBuf;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::Result;
use crate::pathvars::PathTransform;
use crate::snapshot::SystemSnapshot;

pub use artifact::{
    ARTIFACT_FORMAT, ArtifactInfo, BackupArtifact, CapturedFile, FileContent, list_artifacts,
    load_artifact,
};
pub use retention::{RetentionOutcome, RetentionPolicy};

/// Result of one backup operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupReport {
    /// Written artifact.
    pub path: PathBuf,
    /// Creation timestamp embedded in the file name.
    pub created_at: DateTime<Utc>,
    /// Packages recorded.
    pub packages: usize,
    /// Config files whose content was copied.
    pub files_captured: usize,
    /// Config entries listed but not copied (sensitive or host-bound).
    pub files_skipped: usize,
    /// Artifacts deleted by retention.
    pub removed: Vec<PathBuf>,
    /// Scan, capture and retention warnings.
    pub warnings: Vec<String>,
}

/// What: Write one backup artifact for `snapshot` and apply retention.
///
/// Inputs:
/// - `ctx`: Context supplying the destination, retention and source root.
/// - `snapshot`: Captured state to store.
/// - `now`: Creation time; truncated to whole seconds.
///
/// Output:
/// - Report naming the written file and anything retention removed.
///
/// # Errors
/// - `DestinationUnwritable` when the artifact cannot be written.
///
/// Details:
/// - Retention only runs after the write succeeded and only touches artifacts
///   of the snapshot's host.
pub fn create_backup(
    ctx: &Context,
    snapshot: &SystemSnapshot,
    now: DateTime<Utc>,
) -> Result<BackupReport> {
    ctx.cancel.check()?;
    let transform = PathTransform::new(snapshot.host.identity());
    let (files, mut warnings) = artifact::capture_files(ctx, snapshot, &transform);
    let created_at = now.trunc_subsecs(0);
    let artifact = BackupArtifact {
        format_version: ARTIFACT_FORMAT,
        hostname: snapshot.host.hostname.clone(),
        created_at,
        snapshot: snapshot.clone(),
        files,
        warnings: warnings.clone(),
    };

    let root = ctx.backup_root();
    let dir = artifact::host_dir(&root, &snapshot.host.hostname, ctx.settings.per_host_subdir);
    let path = artifact::write_artifact(&dir, &artifact)?;

    let outcome = retention::apply(
        &root,
        &snapshot.host.hostname,
        ctx.settings.retention.policy(),
        created_at,
    );
    warnings.extend(outcome.warnings);
    Ok(BackupReport {
        path,
        created_at,
        packages: snapshot.packages.len(),
        files_captured: artifact.files.len(),
        files_skipped: snapshot.configs.len() - artifact.files.len(),
        removed: outcome.removed,
        warnings,
    })
}
