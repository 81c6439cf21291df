//! User settings loaded from `settings.toml`.
//!
//! Every field has a default, so a missing file or a file naming only a few
//! keys is fine. Unknown keys are ignored.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backup::retention::RetentionPolicy;
use crate::error::{MigratorError, Result};
use crate::restore::policy::VersionPolicy;

/// Top-level settings document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Backup destination; `~` is expanded against the invoking user's home.
    pub backup_dir: String,
    /// Store each host's artifacts under `<backup_dir>/<hostname>/`.
    pub per_host_subdir: bool,
    /// Retention applied after each successful backup.
    pub retention: RetentionSettings,
    /// Scan tuning.
    pub scan: ScanSettings,
    /// Restore defaults.
    pub restore: RestoreSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backup_dir: "~/migrator_backups".to_string(),
            per_host_subdir: true,
            retention: RetentionSettings::default(),
            scan: ScanSettings::default(),
            restore: RestoreSettings::default(),
        }
    }
}

/// Retention mode as written in the settings file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionMode {
    /// Keep everything.
    #[default]
    Off,
    /// Keep the newest `keep_last` artifacts.
    Count,
    /// Delete artifacts older than `max_age_days`.
    Age,
}

/// `[retention]` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionSettings {
    /// Which rule applies.
    pub mode: RetentionMode,
    /// Artifact count kept in `count` mode.
    pub keep_last: usize,
    /// Age limit in `age` mode.
    pub max_age_days: u32,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            mode: RetentionMode::Off,
            keep_last: 5,
            max_age_days: 30,
        }
    }
}

impl RetentionSettings {
    /// Convert to the policy the backup module applies.
    #[must_use]
    pub const fn policy(&self) -> RetentionPolicy {
        match self.mode {
            RetentionMode::Off => RetentionPolicy::KeepAll,
            RetentionMode::Count => RetentionPolicy::KeepLast(self.keep_last),
            RetentionMode::Age => RetentionPolicy::MaxAgeDays(self.max_age_days),
        }
    }
}

/// `[scan]` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Upper bound on concurrently running backend/tracker jobs.
    pub workers: usize,
    /// Timeout for one external command attempt.
    pub command_timeout_secs: u64,
    /// Timeout for one whole backend during a scan.
    pub backend_timeout_secs: u64,
    /// Look for host-identity strings inside text config files, not only paths.
    pub detect_content_variables: bool,
    /// Config files larger than this are treated as application data and skipped.
    pub max_config_file_bytes: u64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            command_timeout_secs: 120,
            backend_timeout_secs: 300,
            detect_content_variables: true,
            max_config_file_bytes: 8 * 1024 * 1024,
        }
    }
}

impl ScanSettings {
    /// Per-attempt command timeout.
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Per-backend scan timeout.
    #[must_use]
    pub const fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    /// Worker count, never zero.
    #[must_use]
    pub fn worker_limit(&self) -> usize {
        self.workers.max(1)
    }
}

/// `[restore]` table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestoreSettings {
    /// Version policy used when the command line does not name one.
    pub version_policy: VersionPolicy,
}

impl Settings {
    /// What: Load settings from `path`.
    ///
    /// Inputs:
    /// - `path`: TOML file location.
    ///
    /// Output:
    /// - Parsed settings, or defaults when the file does not exist.
    ///
    /// # Errors
    /// - `Config` when the file exists but is unreadable or not valid TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let body = match std::fs::read_to_string(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file; using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(MigratorError::Config(format!(
                    "cannot read {}: {e}",
                    path.display()
                )));
            }
        };
        toml::from_str(&body)
            .map_err(|e| MigratorError::Config(format!("{}: {e}", path.display())))
    }

    /// What: Resolve the backup destination directory.
    ///
    /// Inputs:
    /// - `home`: Home directory used for `~` expansion.
    ///
    /// Output:
    /// - Absolute (or as-written relative) directory path.
    #[must_use]
    pub fn backup_root(&self, home: &Path) -> PathBuf {
        crate::util::expand_tilde(&self.backup_dir, home)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// What: Partial files keep defaults for everything they omit.
    ///
    /// Inputs:
    /// - TOML naming only the retention mode and scan workers.
    ///
    /// Output:
    /// - Named fields applied; other fields at their defaults.
    #[test]
    fn partial_file_keeps_defaults() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("settings.toml");
        std::fs::write(
            &path,
            "backup_dir = \"/srv/backups\"\n[retention]\nmode = \"count\"\nkeep_last = 3\n[scan]\nworkers = 8\n[restore]\nversion_policy = \"exact\"\n",
        )
        .expect("write settings");
        let s = Settings::load(&path).expect("load");
        assert_eq!(s.backup_dir, "/srv/backups");
        assert_eq!(s.retention.policy(), RetentionPolicy::KeepLast(3));
        assert_eq!(s.scan.workers, 8);
        assert_eq!(s.scan.command_timeout_secs, 120);
        assert!(s.per_host_subdir);
        assert_eq!(s.restore.version_policy, VersionPolicy::Exact);
    }

    #[test]
    fn missing_file_is_default() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let s = Settings::load(&tmp.path().join("absent.toml")).expect("defaults");
        assert_eq!(s, Settings::default());
        assert_eq!(s.retention.policy(), RetentionPolicy::KeepAll);
        assert_eq!(
            s.backup_root(Path::new("/home/ana")),
            PathBuf::from("/home/ana/migrator_backups")
        );
    }

    #[test]
    fn malformed_file_is_config_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("settings.toml");
        std::fs::write(&path, "backup_dir = [").expect("write");
        assert!(matches!(Settings::load(&path), Err(MigratorError::Config(_))));
    }
}
