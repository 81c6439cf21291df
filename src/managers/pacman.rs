//! Arch backend over `pacman`.

use std::collections::HashSet;
use std::path::Path;

use super::{
    AdapterEnv, InstallReason, InstallRequest, InstalledListing, ManagerKind, PackageRecord,
    RepositoryRecord, repos,
};
use crate::error::Result;

/// pacman adapter.
#[derive(Clone, Debug)]
pub struct PacmanAdapter {
    pub(super) env: AdapterEnv,
}

impl PacmanAdapter {
    /// What: Execute `pacman` with the provided arguments and capture stdout.
    ///
    /// Inputs:
    /// - `args`: Slice of CLI arguments passed directly to the pacman binary.
    ///
    /// Output:
    /// - The command's stdout.
    ///
    /// # Errors
    /// - `CommandFailed` on non-zero exit, `QueryTimeout` after the retry.
    fn run_pacman(&self, args: &[&str]) -> Result<String> {
        self.env.run(&self.env.cmd("pacman", args))
    }

    /// What: Installed packages from `pacman -Q`, explicit ones from `pacman -Qqe`.
    pub(super) fn list_installed(&self) -> Result<InstalledListing> {
        let body = self.run_pacman(&["-Q"])?;
        let mut listing = InstalledListing {
            tracks_reason: true,
            ..InstalledListing::default()
        };
        let explicit: Option<HashSet<String>> = match self.run_pacman(&["-Qqe"]) {
            Ok(out) => Some(out.lines().map(|l| l.trim().to_string()).collect()),
            Err(e) => {
                tracing::warn!(error = %e, "pacman -Qqe failed");
                listing
                    .warnings
                    .push(format!("pacman: explicit marks unavailable: {e}"));
                listing.tracks_reason = false;
                None
            }
        };
        for line in body.lines() {
            let Some((name, version)) = line.trim().split_once(' ') else {
                continue;
            };
            let reason = match &explicit {
                Some(set) if set.contains(name) => InstallReason::Explicit,
                Some(_) => InstallReason::Dependency,
                None => InstallReason::Untracked,
            };
            listing.packages.push(PackageRecord {
                manager: ManagerKind::Pacman,
                name: name.to_string(),
                version: version.trim().to_string(),
                reason,
                repository: None,
                summary: String::new(),
            });
        }
        Ok(listing)
    }

    /// What: Versions from `pacman -Si`, one per sync repository carrying the package.
    ///
    /// Details:
    /// - Sync repositories only hold the latest build, so this is usually one entry.
    pub(super) fn query_available(&self, name: &str) -> Result<Vec<String>> {
        let env = &self.env;
        let out = env.run_raw(&env.cmd("pacman", &["-Si", name]))?;
        if !out.success {
            return Ok(Vec::new());
        }
        let mut versions: Vec<String> = Vec::new();
        for line in out.stdout.lines() {
            if let Some((key, value)) = line.split_once(':')
                && key.trim() == "Version"
            {
                let v = value.trim().to_string();
                if !versions.contains(&v) {
                    versions.push(v);
                }
            }
        }
        Ok(versions)
    }

    /// Sync database names matching `term` (`pacman -Ssq`).
    pub(super) fn search(&self, term: &str) -> Result<Vec<String>> {
        let env = &self.env;
        let out = env.run_raw(&env.cmd("pacman", &["-Ssq", term]))?;
        // pacman exits 1 when nothing matches
        Ok(out
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(ToString::to_string)
            .collect())
    }

    /// What: `pacman -S --noconfirm --needed name`.
    ///
    /// Details:
    /// - Sync repositories cannot pin versions; the requested version is logged only.
    pub(super) fn install(&self, request: &InstallRequest) -> Result<()> {
        if let Some(v) = &request.version {
            tracing::debug!(package = %request.name, version = %v, "pacman installs the sync version");
        }
        self.env
            .run(&self.env.install_cmd(
                "pacman",
                &["-S", "--noconfirm", "--needed", &request.name],
            ))
            .map(|_| ())
    }

    /// Custom repositories declared in `pacman.conf`.
    pub(super) fn list_repositories(&self) -> Result<Vec<RepositoryRecord>> {
        let path = self.env.file(Path::new("/etc/pacman.conf"));
        match std::fs::read_to_string(&path) {
            Ok(body) => Ok(repos::parse_pacman_conf(&body)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// What: Append the section to `pacman.conf` and refresh databases when new.
    ///
    /// # Errors
    /// - `DestinationUnwritable`, or `CommandFailed` from `pacman -Sy`.
    pub(super) fn add_repository(&self, repo: &RepositoryRecord) -> Result<()> {
        if repos::append_pacman_repo(&self.env.root, repo)? {
            tracing::info!(repo = %repo.id, "pacman repository appended");
            self.env
                .run(&self.env.install_cmd("pacman", &["-Sy", "--noconfirm"]))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::managers::test_env::env;
    use crate::util::command::testing::ScriptedRunner;

    /// What: `-Q` rows are split and `-Qqe` marks explicit packages.
    ///
    /// Inputs:
    /// - Three installed packages, two explicit.
    ///
    /// Output:
    /// - Reasons explicit/dependency as expected.
    #[test]
    fn installed_packages_with_explicit_marks() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let runner = ScriptedRunner::with_programs(&["pacman"])
            .respond("pacman -Q", "firefox 131.0-1\nglibc 2.40+r16-1\nneovim 0.10.2-1\n")
            .respond("pacman -Qqe", "firefox\nneovim\n");
        let (_, env) = env(runner, tmp.path());
        let listing = PacmanAdapter { env }.list_installed().expect("listing");
        let reasons: Vec<InstallReason> = listing.packages.iter().map(|p| p.reason).collect();
        assert_eq!(
            reasons,
            vec![
                InstallReason::Explicit,
                InstallReason::Dependency,
                InstallReason::Explicit
            ]
        );
        assert_eq!(listing.packages[1].version, "2.40+r16-1");
    }

    #[test]
    fn si_versions_and_unknown_package() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let runner = ScriptedRunner::with_programs(&["pacman"])
            .respond(
                "pacman -Si htop",
                "Repository      : extra\nName            : htop\nVersion         : 3.3.0-3\nDescription     : Interactive process viewer\n",
            )
            .fail("pacman -Si nope", 1);
        let (_, env) = env(runner, tmp.path());
        let adapter = PacmanAdapter { env };
        assert_eq!(adapter.query_available("htop").expect("htop"), vec!["3.3.0-3"]);
        assert!(adapter.query_available("nope").expect("nope").is_empty());
    }

    #[test]
    fn repositories_from_pacman_conf() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(tmp.path().join("etc")).expect("mkdir");
        std::fs::write(
            tmp.path().join("etc/pacman.conf"),
            "[options]\nColor\n[extra]\nInclude = /etc/pacman.d/mirrorlist\n[archlinuxcn]\nServer = https://repo.archlinuxcn.org/$arch\n",
        )
        .expect("write");
        let (_, env) = env(ScriptedRunner::default(), tmp.path());
        let repos = PacmanAdapter { env }.list_repositories().expect("repos");
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].uri, "https://repo.archlinuxcn.org/$arch");
    }
}
