//! Flatpak applications and remotes.
//!
//! Flatpak does not record why an application was installed, so every entry
//! is reported `untracked`. Remotes are distribution-independent.

use super::{
    AdapterEnv, InstallReason, InstallRequest, InstalledListing, ManagerKind, PackageRecord,
    RepoCompat, RepositoryRecord,
};
use crate::error::Result;

/// Flatpak adapter.
#[derive(Clone, Debug)]
pub struct FlatpakAdapter {
    pub(super) env: AdapterEnv,
}

/// Tab-separated columns of one output line, trimmed.
fn columns(line: &str) -> Vec<&str> {
    line.split('\t').map(str::trim).collect()
}

impl FlatpakAdapter {
    /// Installed applications (runtimes are dependencies and not listed).
    pub(super) fn list_installed(&self) -> Result<InstalledListing> {
        let env = &self.env;
        let body = env.run(&env.cmd(
            "flatpak",
            &["list", "--app", "--columns=application,version,origin"],
        ))?;
        let packages = body
            .lines()
            .map(columns)
            .filter(|c| c.first().is_some_and(|id| !id.is_empty()))
            .map(|c| PackageRecord {
                manager: ManagerKind::Flatpak,
                name: c[0].to_string(),
                version: c.get(1).copied().unwrap_or_default().to_string(),
                reason: InstallReason::Untracked,
                repository: c.get(2).filter(|o| !o.is_empty()).map(ToString::to_string),
                summary: String::new(),
            })
            .collect();
        Ok(InstalledListing {
            packages,
            tracks_reason: false,
            warnings: Vec::new(),
        })
    }

    /// Versions of application `name` offered by configured remotes.
    pub(super) fn query_available(&self, name: &str) -> Result<Vec<String>> {
        let env = &self.env;
        let out = env.run_raw(&env.cmd(
            "flatpak",
            &["search", "--columns=application,version", name],
        ))?;
        if !out.success {
            return Ok(Vec::new());
        }
        let mut versions: Vec<String> = Vec::new();
        for c in out.stdout.lines().map(columns) {
            if c.first() == Some(&name) {
                let v = c.get(1).copied().unwrap_or_default().to_string();
                if !versions.contains(&v) {
                    versions.push(v);
                }
            }
        }
        Ok(versions)
    }

    /// Application ids matching `term`.
    pub(super) fn search(&self, term: &str) -> Result<Vec<String>> {
        let env = &self.env;
        let out = env.run_raw(&env.cmd("flatpak", &["search", "--columns=application", term]))?;
        let mut ids: Vec<String> = out
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && l.contains('.'))
            .map(ToString::to_string)
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    /// What: `flatpak install -y --noninteractive [origin] id`.
    ///
    /// Details:
    /// - The remote recorded at capture time is passed when known.
    pub(super) fn install(&self, request: &InstallRequest) -> Result<()> {
        let mut args = vec!["install", "-y", "--noninteractive"];
        if let Some(origin) = request.repository.as_deref() {
            args.push(origin);
        }
        args.push(&request.name);
        self.env
            .run(&self.env.install_cmd("flatpak", &args))
            .map(|_| ())
    }

    /// What: Configured remotes.
    ///
    /// Output:
    /// - Portable records; `definition` holds the remote URL.
    pub(super) fn list_repositories(&self) -> Result<Vec<RepositoryRecord>> {
        let env = &self.env;
        let body = env.run(&env.cmd("flatpak", &["remotes", "--columns=name,url,options"]))?;
        Ok(body
            .lines()
            .map(columns)
            .filter(|c| c.len() >= 2 && !c[0].is_empty())
            .map(|c| RepositoryRecord {
                manager: ManagerKind::Flatpak,
                id: c[0].to_string(),
                uri: c[1].to_string(),
                enabled: !c.get(2).is_some_and(|o| o.contains("disabled")),
                compat: RepoCompat::Portable,
                definition: c[1].to_string(),
            })
            .collect())
    }

    /// `flatpak remote-add --if-not-exists name url`.
    pub(super) fn add_repository(&self, repo: &RepositoryRecord) -> Result<()> {
        self.env
            .run(&self.env.install_cmd(
                "flatpak",
                &["remote-add", "--if-not-exists", &repo.id, &repo.uri],
            ))
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::managers::test_env::env;
    use crate::util::command::testing::ScriptedRunner;

    #[test]
    fn installed_apps_are_untracked_with_origin() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let runner = ScriptedRunner::with_programs(&["flatpak"]).respond(
            "flatpak list --app --columns=application,version,origin",
            "org.mozilla.firefox\t131.0\tflathub\ncom.spotify.Client\t\tflathub\n",
        );
        let (_, env) = env(runner, tmp.path());
        let listing = FlatpakAdapter { env }.list_installed().expect("listing");
        assert!(!listing.tracks_reason);
        assert_eq!(listing.packages.len(), 2);
        assert_eq!(listing.packages[0].repository.as_deref(), Some("flathub"));
        assert_eq!(listing.packages[1].version, "");
        assert!(
            listing
                .packages
                .iter()
                .all(|p| p.reason == InstallReason::Untracked)
        );
    }

    /// What: Remotes are portable and install passes the origin.
    ///
    /// Inputs:
    /// - One enabled and one disabled remote; an install request with origin.
    ///
    /// Output:
    /// - Portable records, enabled flags honored, install command includes origin.
    #[test]
    fn remotes_and_install() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let runner = ScriptedRunner::with_programs(&["flatpak"])
            .respond(
                "flatpak remotes --columns=name,url,options",
                "flathub\thttps://dl.flathub.org/repo/\tsystem\nfedora\toci+https://registry.fedoraproject.org\tsystem,disabled\n",
            )
            .respond(
                "flatpak install -y --noninteractive flathub org.gimp.GIMP",
                "",
            );
        let (runner, env) = env(runner, tmp.path());
        let adapter = FlatpakAdapter { env };
        let remotes = adapter.list_repositories().expect("remotes");
        assert_eq!(remotes[0].compat, RepoCompat::Portable);
        assert!(remotes[0].enabled);
        assert!(!remotes[1].enabled);
        adapter
            .install(&InstallRequest {
                name: "org.gimp.GIMP".into(),
                version: None,
                repository: Some("flathub".into()),
            })
            .expect("install");
        assert!(
            runner
                .ran()
                .contains(&"flatpak install -y --noninteractive flathub org.gimp.GIMP".to_string())
        );
    }
}
