//! Fedora/RHEL backend over `rpm` and `dnf repoquery`.

use std::collections::HashSet;

use super::{
    AdapterEnv, InstallReason, InstallRequest, InstalledListing, ManagerKind, PackageRecord,
    RepositoryRecord, repos,
};
use crate::error::Result;
use crate::util::version::compare_versions;

/// `rpm -qa` format: name, epoch:version-release and summary.
const RPM_FORMAT: &str = r"%{NAME}\t%{EPOCH}:%{VERSION}-%{RELEASE}\t%{SUMMARY}\n";

/// DNF adapter.
#[derive(Clone, Debug)]
pub struct DnfAdapter {
    pub(super) env: AdapterEnv,
}

impl DnfAdapter {
    /// What: List installed RPMs with user-installed marks.
    ///
    /// Output:
    /// - Listing; `gpg-pubkey` pseudo-packages are dropped and an unset
    ///   epoch (`(none):`) is stripped from versions.
    pub(super) fn list_installed(&self) -> Result<InstalledListing> {
        let env = &self.env;
        let body = env.run(&env.cmd("rpm", &["-qa", "--queryformat", RPM_FORMAT]))?;
        let mut listing = InstalledListing {
            tracks_reason: true,
            ..InstalledListing::default()
        };
        let user: Option<HashSet<String>> = match env.run(&env.cmd(
            "dnf",
            &["repoquery", "--userinstalled", "--qf", r"%{name}\n"],
        )) {
            Ok(out) => Some(out.lines().map(|l| l.trim().to_string()).collect()),
            Err(e) => {
                tracing::warn!(error = %e, "dnf repoquery --userinstalled failed");
                listing
                    .warnings
                    .push(format!("dnf: user-installed marks unavailable: {e}"));
                listing.tracks_reason = false;
                None
            }
        };
        for line in body.lines() {
            let mut cols = line.splitn(3, '\t');
            let (Some(name), Some(version)) = (cols.next(), cols.next()) else {
                continue;
            };
            if name.is_empty() || name == "gpg-pubkey" {
                continue;
            }
            let version = version.strip_prefix("(none):").unwrap_or(version);
            let version = version.strip_prefix("0:").unwrap_or(version);
            let reason = match &user {
                Some(set) if set.contains(name) => InstallReason::Explicit,
                Some(_) => InstallReason::Dependency,
                None => InstallReason::Untracked,
            };
            listing.packages.push(PackageRecord {
                manager: ManagerKind::Dnf,
                name: name.to_string(),
                version: version.to_string(),
                reason,
                repository: None,
                summary: cols.next().unwrap_or_default().trim().to_string(),
            });
        }
        Ok(listing)
    }

    /// What: Available `version-release` strings, newest first.
    pub(super) fn query_available(&self, name: &str) -> Result<Vec<String>> {
        let env = &self.env;
        let out = env.run_raw(&env.cmd(
            "dnf",
            &["repoquery", "--available", "--qf", r"%{version}-%{release}\n", name],
        ))?;
        if !out.success {
            return Ok(Vec::new());
        }
        let mut versions: Vec<String> = out
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(ToString::to_string)
            .collect();
        versions.sort_by(|a, b| compare_versions(b, a, false));
        versions.dedup();
        Ok(versions)
    }

    /// Package names matching `*term*` in enabled repositories.
    pub(super) fn search(&self, term: &str) -> Result<Vec<String>> {
        let env = &self.env;
        let pattern = format!("*{term}*");
        let body = env.run(&env.cmd(
            "dnf",
            &["repoquery", "--available", "--qf", r"%{name}\n", &pattern],
        ))?;
        let mut names: Vec<String> = body
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(ToString::to_string)
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// What: `dnf install -y name[-version]`.
    ///
    /// # Errors
    /// - `CommandFailed` or `QueryTimeout`.
    pub(super) fn install(&self, request: &InstallRequest) -> Result<()> {
        let target = request
            .version
            .as_ref()
            .map_or_else(|| request.name.clone(), |v| format!("{}-{v}", request.name));
        self.env
            .run(&self.env.install_cmd("dnf", &["install", "-y", &target]))
            .map(|_| ())
    }

    /// Third-party sections of `/etc/yum.repos.d/*.repo`.
    pub(super) fn list_repositories(&self) -> Result<Vec<RepositoryRecord>> {
        let mut out = Vec::new();
        for path in repos::glob_on_root(&self.env.root, "etc/yum.repos.d/*.repo") {
            match std::fs::read_to_string(&path) {
                Ok(body) => out.extend(repos::parse_yum_repo(&body)),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "unreadable repo file");
                }
            }
        }
        Ok(out)
    }

    /// What: Write `/etc/yum.repos.d/<id>.repo`.
    ///
    /// # Errors
    /// - `DestinationUnwritable`.
    pub(super) fn add_repository(&self, repo: &RepositoryRecord) -> Result<()> {
        let path = repos::write_yum_repo(&self.env.root, repo)?;
        tracing::info!(repo = %repo.id, path = %path.display(), "dnf repository written");
        Ok(())
    }
}
