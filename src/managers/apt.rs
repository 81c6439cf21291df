//! Debian/Ubuntu backend over `dpkg-query`, `apt-mark`, `apt-cache` and `apt-get`.

use std::collections::HashSet;
use std::path::Path;

use super::{
    AdapterEnv, InstallReason, InstallRequest, InstalledListing, ManagerKind, PackageRecord,
    RepositoryRecord, repos,
};
use crate::error::Result;

/// `dpkg-query` format: name, version and the two-letter status.
const DPKG_FORMAT: &str = r"-f=${Package}\t${Version}\t${db:Status-Abbrev}\n";

/// APT adapter.
#[derive(Clone, Debug)]
pub struct AptAdapter {
    pub(super) env: AdapterEnv,
}

impl AptAdapter {
    /// What: List packages dpkg reports as installed (`ii`).
    ///
    /// Output:
    /// - Listing with explicit/dependency reasons from `apt-mark showmanual`.
    ///
    /// Details:
    /// - When `apt-mark` fails every package is `untracked` and a warning is recorded.
    pub(super) fn list_installed(&self) -> Result<InstalledListing> {
        let env = &self.env;
        let body = env.run(&env.cmd("dpkg-query", &["-W", DPKG_FORMAT]))?;
        let mut listing = InstalledListing {
            tracks_reason: true,
            ..InstalledListing::default()
        };
        let manual: Option<HashSet<String>> =
            match env.run(&env.cmd("apt-mark", &["showmanual"])) {
                Ok(out) => Some(out.lines().map(|l| l.trim().to_string()).collect()),
                Err(e) => {
                    tracing::warn!(error = %e, "apt-mark showmanual failed; install reasons unknown");
                    listing
                        .warnings
                        .push(format!("apt: manual-install marks unavailable: {e}"));
                    listing.tracks_reason = false;
                    None
                }
            };
        for line in body.lines() {
            let mut cols = line.split('\t');
            let (Some(name), Some(version), Some(status)) = (cols.next(), cols.next(), cols.next())
            else {
                continue;
            };
            if !status.trim().starts_with("ii") || name.is_empty() {
                continue;
            }
            let reason = match &manual {
                Some(set) if set.contains(name) => InstallReason::Explicit,
                Some(_) => InstallReason::Dependency,
                None => InstallReason::Untracked,
            };
            listing.packages.push(PackageRecord {
                manager: ManagerKind::Apt,
                name: name.to_string(),
                version: version.to_string(),
                reason,
                repository: None,
                summary: String::new(),
            });
        }
        Ok(listing)
    }

    /// What: Candidate versions from `apt-cache madison`, in APT's order.
    ///
    /// Output:
    /// - Distinct versions; empty when APT does not know the package.
    pub(super) fn query_available(&self, name: &str) -> Result<Vec<String>> {
        let env = &self.env;
        let out = env.run_raw(&env.cmd("apt-cache", &["madison", name]))?;
        if !out.success {
            return Ok(Vec::new());
        }
        let mut versions: Vec<String> = Vec::new();
        for line in out.stdout.lines() {
            let mut cols = line.split('|').map(str::trim);
            if cols.next() != Some(name) {
                continue;
            }
            if let Some(v) = cols.next().filter(|v| !v.is_empty())
                && !versions.iter().any(|x| x == v)
            {
                versions.push(v.to_string());
            }
        }
        Ok(versions)
    }

    /// Package names matching `term` (`apt-cache search --names-only`).
    pub(super) fn search(&self, term: &str) -> Result<Vec<String>> {
        let env = &self.env;
        let body = env.run(&env.cmd("apt-cache", &["search", "--names-only", term]))?;
        Ok(body
            .lines()
            .filter_map(|l| l.split(" - ").next())
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect())
    }

    /// What: `apt-get install -y name[=version]` non-interactively.
    ///
    /// # Errors
    /// - `CommandFailed` or `QueryTimeout` from the install command.
    pub(super) fn install(&self, request: &InstallRequest) -> Result<()> {
        let target = request
            .version
            .as_ref()
            .map_or_else(|| request.name.clone(), |v| format!("{}={v}", request.name));
        let spec = self
            .env
            .install_cmd("apt-get", &["install", "-y", &target])
            .env("DEBIAN_FRONTEND", "noninteractive");
        self.env.run(&spec).map(|_| ())
    }

    /// What: Third-party sources from `sources.list` and `sources.list.d`.
    ///
    /// Details:
    /// - Unreadable files are skipped with a warning.
    pub(super) fn list_repositories(&self) -> Result<Vec<RepositoryRecord>> {
        let env = &self.env;
        let codename = env.codename.as_deref();
        let mut files = vec![env.file(Path::new("/etc/apt/sources.list"))];
        files.extend(repos::glob_on_root(&env.root, "etc/apt/sources.list.d/*.list"));
        files.extend(repos::glob_on_root(&env.root, "etc/apt/sources.list.d/*.sources"));
        let mut out = Vec::new();
        for path in files {
            let body = match std::fs::read_to_string(&path) {
                Ok(b) => b,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "unreadable apt source");
                    continue;
                }
            };
            if path.extension().is_some_and(|x| x == "sources") {
                out.extend(repos::parse_apt_sources(&body, codename));
            } else {
                out.extend(repos::parse_apt_list(&body, codename));
            }
        }
        Ok(out)
    }

    /// What: Write the source file, then refresh the package index.
    ///
    /// # Errors
    /// - `DestinationUnwritable` writing the file; `CommandFailed` from `apt-get update`.
    pub(super) fn add_repository(&self, repo: &RepositoryRecord) -> Result<()> {
        let path = repos::write_apt_source(&self.env.root, repo)?;
        tracing::info!(repo = %repo.id, path = %path.display(), "apt source written");
        self.env
            .run(&self.env.install_cmd("apt-get", &["update"]))
            .map(|_| ())
    }
}
