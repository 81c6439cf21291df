//! Snap packages via the `snap` client.

use super::{
    AdapterEnv, InstallReason, InstallRequest, InstalledListing, ManagerKind, PackageRecord,
    RepositoryRecord, unsupported,
};
use crate::error::{MigratorError, Result};

/// Snaps that exist only to support other snaps.
const SUPPORT_SNAPS: &[&str] = &["snapd", "bare", "core", "core18", "core20", "core22", "core24"];

/// Snap adapter.
#[derive(Clone, Debug)]
pub struct SnapAdapter {
    pub(super) env: AdapterEnv,
}

/// What: Confirm `snapd` answered the `snap version` probe.
///
/// Inputs:
/// - `version_output`: stdout of `snap version`.
///
/// # Errors
/// - `BackendUnavailable` when the daemon line is missing or reports `unavailable`.
pub(super) fn check_daemon(version_output: &str) -> Result<()> {
    let daemon = version_output
        .lines()
        .find_map(|l| l.strip_prefix("snapd"))
        .map(str::trim);
    match daemon {
        Some(v) if !v.is_empty() && v != "unavailable" => Ok(()),
        _ => Err(MigratorError::BackendUnavailable {
            manager: ManagerKind::Snap,
            reason: "snapd is not running".to_string(),
        }),
    }
}

impl SnapAdapter {
    /// What: Parse `snap list`.
    ///
    /// Output:
    /// - Base, core and snapd snaps are dependencies; the rest are untracked.
    ///   The tracking channel is kept as the repository.
    pub(super) fn list_installed(&self) -> Result<InstalledListing> {
        let env = &self.env;
        let body = env.run(&env.cmd("snap", &["list"]))?;
        let mut packages = Vec::new();
        for line in body.lines().skip(1) {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 2 {
                continue;
            }
            let name = cols[0];
            let notes = cols.get(5).copied().unwrap_or("-");
            let support = SUPPORT_SNAPS.contains(&name)
                || notes.split(',').any(|n| matches!(n, "base" | "core" | "snapd"));
            packages.push(PackageRecord {
                manager: ManagerKind::Snap,
                name: name.to_string(),
                version: cols[1].to_string(),
                reason: if support {
                    InstallReason::Dependency
                } else {
                    InstallReason::Untracked
                },
                repository: cols
                    .get(3)
                    .filter(|t| **t != "-")
                    .map(ToString::to_string),
                summary: String::new(),
            });
        }
        Ok(InstalledListing {
            packages,
            tracks_reason: false,
            warnings: Vec::new(),
        })
    }

    /// What: Versions listed in the `channels:` block of `snap info`.
    ///
    /// Details:
    /// - Closed channels (`--`) and arrows (`↑`, same as the channel above) are skipped.
    pub(super) fn query_available(&self, name: &str) -> Result<Vec<String>> {
        let env = &self.env;
        let out = env.run_raw(&env.cmd("snap", &["info", name]))?;
        if !out.success {
            return Ok(Vec::new());
        }
        let mut versions: Vec<String> = Vec::new();
        let mut in_channels = false;
        for line in out.stdout.lines() {
            if line.starts_with("channels:") {
                in_channels = true;
                continue;
            }
            if !in_channels {
                continue;
            }
            if !line.starts_with(' ') {
                break;
            }
            let Some((_, rest)) = line.split_once(':') else {
                continue;
            };
            let Some(v) = rest.split_whitespace().next() else {
                continue;
            };
            if v != "↑" && v != "--" && v != "–" && !versions.iter().any(|x| x == v) {
                versions.push(v.to_string());
            }
        }
        Ok(versions)
    }

    /// Snap names from `snap find`.
    pub(super) fn search(&self, term: &str) -> Result<Vec<String>> {
        let env = &self.env;
        let out = env.run_raw(&env.cmd("snap", &["find", term]))?;
        Ok(out
            .stdout
            .lines()
            .skip(1)
            .filter_map(|l| l.split_whitespace().next())
            .map(ToString::to_string)
            .collect())
    }

    /// What: `snap install name [--channel=<tracking>]`.
    pub(super) fn install(&self, request: &InstallRequest) -> Result<()> {
        let channel = request
            .repository
            .as_ref()
            .map(|c| format!("--channel={c}"));
        let mut args = vec!["install", request.name.as_str()];
        if let Some(c) = channel.as_deref() {
            args.push(c);
        }
        self.env
            .run(&self.env.install_cmd("snap", &args))
            .map(|_| ())
    }

    /// Snap has no user-managed repositories.
    #[allow(clippy::unnecessary_wraps, clippy::unused_self)]
    pub(super) fn list_repositories(&self) -> Result<Vec<RepositoryRecord>> {
        Ok(Vec::new())
    }

    #[allow(clippy::unused_self)]
    pub(super) fn add_repository(&self, _repo: &RepositoryRecord) -> Result<()> {
        Err(unsupported(ManagerKind::Snap, "add_repository"))
    }
}
