//! Error taxonomy shared by every migrator component.
//!
//! Per-item errors (timeouts, missing equivalents, conflicts) are recovered by
//! the caller and folded into a report. Only the variants reported by
//! [`MigratorError::is_fatal`] abort a whole operation.

use std::path::PathBuf;

use thiserror::Error;

use crate::managers::ManagerKind;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, MigratorError>;

/// Every failure the engine can report.
#[derive(Debug, Error)]
pub enum MigratorError {
    /// A backend failed its liveness probe and is skipped for this run.
    #[error("{manager} backend unavailable: {reason}")]
    BackendUnavailable {
        /// Backend that failed the probe.
        manager: ManagerKind,
        /// Probe failure description.
        reason: String,
    },

    /// An external command did not finish in time, even after one retry.
    #[error("`{command}` timed out after {timeout_secs}s")]
    QueryTimeout {
        /// Rendered command line.
        command: String,
        /// Timeout applied to each attempt.
        timeout_secs: u64,
    },

    /// No equivalent package name could be established on the target backend.
    #[error("no {to} equivalent found for {from} package `{name}`")]
    EquivalenceNotFound {
        /// Package name on the source backend.
        name: String,
        /// Source backend.
        from: ManagerKind,
        /// Target backend.
        to: ManagerKind,
    },

    /// A host-identity value is too generic to be rewritten safely.
    #[error("path variable {variable} = `{value}` is ambiguous; left unchanged")]
    PathTransformAmbiguous {
        /// Variable name (`HOME`, `USERNAME`, `HOSTNAME`).
        variable: String,
        /// The captured value.
        value: String,
    },

    /// One mount-table line could not be parsed.
    #[error("fstab line {line}: {reason}")]
    FstabParseError {
        /// 1-based line number.
        line: usize,
        /// What was wrong with the line.
        reason: String,
    },

    /// A destination file exists with different content.
    #[error("{} differs from the backed-up version", path.display())]
    RestoreConflict {
        /// Destination path.
        path: PathBuf,
    },

    /// The version policy could not pick an acceptable version.
    #[error("no acceptable version of `{name}` (recorded {recorded}, available: {})", available.join(", "))]
    VersionUnavailable {
        /// Package name on the target backend.
        name: String,
        /// Version captured in the backup.
        recorded: String,
        /// Versions the target backend offers.
        available: Vec<String>,
    },

    /// The backup artifact cannot be read or decoded.
    #[error("backup artifact {} is corrupt: {reason}", path.display())]
    ArtifactCorrupt {
        /// Artifact path.
        path: PathBuf,
        /// Decoder or I/O message.
        reason: String,
    },

    /// The backup destination or restore target cannot be written.
    #[error("cannot write to {}: {reason}", path.display())]
    DestinationUnwritable {
        /// Path that rejected the write.
        path: PathBuf,
        /// I/O message.
        reason: String,
    },

    /// An external command exited unsuccessfully.
    #[error("`{command}` failed (exit {code:?}): {stderr}")]
    CommandFailed {
        /// Rendered command line.
        command: String,
        /// Exit code, when the process exited normally.
        code: Option<i32>,
        /// Trimmed standard error.
        stderr: String,
    },

    /// The backend has no way to perform the requested operation.
    #[error("{manager} does not support {operation}")]
    Unsupported {
        /// Backend asked to perform the operation.
        manager: ManagerKind,
        /// Operation name.
        operation: &'static str,
    },

    /// The operator aborted the run.
    #[error("operation cancelled")]
    Cancelled,

    /// Another scan or restore holds the state file.
    #[error("state file {} is locked by another migrator process", path.display())]
    StateLocked {
        /// Lock file path.
        path: PathBuf,
    },

    /// Settings or override file problem.
    #[error("configuration error: {0}")]
    Config(String),

    /// Plain I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON encode/decode failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl MigratorError {
    /// What: Tell whether this error must abort the whole operation.
    ///
    /// Inputs:
    /// - `self`: Error to classify.
    ///
    /// Output:
    /// - `true` for artifact, destination, lock and cancellation errors.
    ///
    /// Details:
    /// - Everything else is recorded against a single plan item or backend.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ArtifactCorrupt { .. }
                | Self::DestinationUnwritable { .. }
                | Self::StateLocked { .. }
                | Self::Cancelled
        )
    }

    /// Short stable label used in reports.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::BackendUnavailable { .. } => "backend-unavailable",
            Self::QueryTimeout { .. } => "query-timeout",
            Self::EquivalenceNotFound { .. } => "equivalence-not-found",
            Self::PathTransformAmbiguous { .. } => "path-transform-ambiguous",
            Self::FstabParseError { .. } => "fstab-parse-error",
            Self::RestoreConflict { .. } => "restore-conflict",
            Self::VersionUnavailable { .. } => "version-unavailable",
            Self::ArtifactCorrupt { .. } => "artifact-corrupt",
            Self::DestinationUnwritable { .. } => "destination-unwritable",
            Self::CommandFailed { .. } => "command-failed",
            Self::Unsupported { .. } => "unsupported",
            Self::Cancelled => "cancelled",
            Self::StateLocked { .. } => "state-locked",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// What: Only artifact, destination, lock and cancel errors are fatal.
    ///
    /// Inputs:
    /// - One representative of each class.
    ///
    /// Output:
    /// - `is_fatal` matches the recovery rules.
    #[test]
    fn fatal_classification() {
        let corrupt = MigratorError::ArtifactCorrupt {
            path: PathBuf::from("/tmp/a.json"),
            reason: "eof".into(),
        };
        let timeout = MigratorError::QueryTimeout {
            command: "apt-cache madison vim".into(),
            timeout_secs: 5,
        };
        let missing = MigratorError::EquivalenceNotFound {
            name: "foo".into(),
            from: ManagerKind::Apt,
            to: ManagerKind::Pacman,
        };
        assert!(corrupt.is_fatal());
        assert!(MigratorError::Cancelled.is_fatal());
        assert!(!timeout.is_fatal());
        assert!(!missing.is_fatal());
        assert_eq!(missing.kind(), "equivalence-not-found");
    }

    #[test]
    fn version_unavailable_lists_candidates() {
        let err = MigratorError::VersionUnavailable {
            name: "vim".into(),
            recorded: "2.0".into(),
            available: vec!["1.9".into(), "1.8".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("recorded 2.0"));
        assert!(msg.contains("1.9, 1.8"));
    }
}
