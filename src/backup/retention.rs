//! Retention applied after each successful backup write.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::artifact::list_artifacts;
use crate::util::safe_file_component;

/// Which artifacts of one host survive a retention pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetentionPolicy {
    /// Nothing is deleted.
    KeepAll,
    /// The newest `n` artifacts are kept.
    KeepLast(usize),
    /// Artifacts older than `n` days are deleted.
    MaxAgeDays(u32),
}

/// What a retention pass did.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionOutcome {
    /// Deleted artifacts.
    pub removed: Vec<PathBuf>,
    /// Deletion failures.
    pub warnings: Vec<String>,
}

/// What: Delete the artifacts of `hostname` that the policy no longer keeps.
///
/// Inputs:
/// - `root`: Backup destination (per-host subdirectories included).
/// - `hostname`: Host whose artifacts are considered; other hosts are never touched.
/// - `policy`: Retention rule.
/// - `now`: Reference time for age-based retention.
///
/// Output:
/// - Removed paths and warnings for files that could not be deleted.
///
/// Details:
/// - `KeepLast(0)` behaves like `KeepLast(1)` so the artifact just written survives.
#[must_use]
pub fn apply(
    root: &Path,
    hostname: &str,
    policy: RetentionPolicy,
    now: DateTime<Utc>,
) -> RetentionOutcome {
    let host = safe_file_component(hostname);
    let mine: Vec<_> = list_artifacts(root)
        .into_iter()
        .filter(|a| a.host == host)
        .collect();
    let doomed: Vec<PathBuf> = match policy {
        RetentionPolicy::KeepAll => Vec::new(),
        RetentionPolicy::KeepLast(n) => mine.into_iter().skip(n.max(1)).map(|a| a.path).collect(),
        RetentionPolicy::MaxAgeDays(days) => {
            let cutoff = now - Duration::days(i64::from(days));
            mine.into_iter()
                .skip(1)
                .filter(|a| a.created_at < cutoff)
                .map(|a| a.path)
                .collect()
        }
    };

    let mut outcome = RetentionOutcome::default();
    for path in doomed {
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(path = %path.display(), ?policy, "old backup removed");
                outcome.removed.push(path);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove old backup");
                outcome
                    .warnings
                    .push(format!("{}: not removed: {e}", path.display()));
            }
        }
    }
    outcome
}
