//! The explicit handle every component receives instead of reading globals.
//!
//! A [`Context`] bundles the filesystem root being inspected, the identity of
//! the host, resolved migrator paths, loaded settings and the cancellation
//! token. Tests build one over a temp directory; the binary builds one with
//! [`Context::for_host`].

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::distro::DistroInfo;
use crate::error::{MigratorError, Result};
use crate::paths::MigratorPaths;
use crate::pathvars::HostIdentity;
use crate::settings::Settings;

/// Cooperative cancellation flag shared by a whole operation.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// What: Fail fast when cancelled.
    ///
    /// # Errors
    /// - `Cancelled` once [`Self::cancel`] has been called.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(MigratorError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Host metadata captured into every snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    /// Hostname.
    pub hostname: String,
    /// Login name of the user whose configuration is tracked.
    pub username: String,
    /// That user's home directory.
    pub home: PathBuf,
    /// Distribution identity.
    pub distro: DistroInfo,
    /// Desktop session, lowercased (`gnome`, `ubuntu:gnome`, `kde`, `sway`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desktop: Option<String>,
}

impl HostInfo {
    /// Identity values used by the path-variable transform.
    #[must_use]
    pub fn identity(&self) -> HostIdentity {
        HostIdentity {
            username: self.username.clone(),
            hostname: self.hostname.clone(),
            home: self.home.to_string_lossy().into_owned(),
        }
    }

    /// What: Detect metadata for the running host.
    ///
    /// Inputs:
    /// - `root`: Filesystem root used to read `os-release`.
    ///
    /// Output:
    /// - Host metadata; unknown values become `unknown`.
    ///
    /// Details:
    /// - Under `sudo`, the invoking user (`SUDO_USER`) is tracked rather than root.
    #[must_use]
    pub fn detect(root: &Path) -> Self {
        let (username, home) = detect_user();
        Self {
            hostname: detect_hostname(root),
            username,
            home,
            distro: DistroInfo::detect(root),
            desktop: detect_desktop(),
        }
    }
}

/// Resolve the tracked user's name and home directory.
fn detect_user() -> (String, PathBuf) {
    #[cfg(unix)]
    {
        use nix::unistd::{Uid, User, geteuid};
        let sudo_user = std::env::var("SUDO_USER").ok().filter(|u| !u.is_empty());
        if geteuid().is_root()
            && let Some(name) = sudo_user
            && let Ok(Some(user)) = User::from_name(&name)
        {
            return (user.name, user.dir);
        }
        if let Ok(Some(user)) = User::from_uid(Uid::current()) {
            let home = std::env::var_os("HOME").map_or(user.dir, PathBuf::from);
            return (user.name, home);
        }
    }
    let name = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    let home = std::env::var_os("HOME").map_or_else(|| PathBuf::from("/"), PathBuf::from);
    (name, home)
}

/// Resolve the hostname, falling back to `etc/hostname` under `root`.
fn detect_hostname(root: &Path) -> String {
    #[cfg(unix)]
    {
        if let Ok(name) = nix::unistd::gethostname()
            && let Ok(name) = name.into_string()
            && !name.trim().is_empty()
        {
            return name.trim().to_string();
        }
    }
    std::fs::read_to_string(root.join("etc/hostname"))
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Desktop session from `XDG_CURRENT_DESKTOP` or `DESKTOP_SESSION`, lowercased.
///
/// The full value is kept (`ubuntu:gnome`); trackers match known names inside it.
fn detect_desktop() -> Option<String> {
    ["XDG_CURRENT_DESKTOP", "DESKTOP_SESSION"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .map(|v| v.trim().to_ascii_lowercase())
        .find(|v| !v.is_empty())
}

/// Everything a migrator operation needs to know about its environment.
#[derive(Clone, Debug)]
pub struct Context {
    /// Root of the filesystem being captured or restored (`/` on a live host).
    pub root: PathBuf,
    /// Host metadata.
    pub host: HostInfo,
    /// Migrator's own files.
    pub paths: MigratorPaths,
    /// Loaded settings.
    pub settings: Settings,
    /// Cancellation for the running operation.
    pub cancel: CancelToken,
}

impl Context {
    /// Build a context from explicit parts.
    #[must_use]
    pub fn new(root: PathBuf, host: HostInfo, paths: MigratorPaths, settings: Settings) -> Self {
        Self {
            root,
            host,
            paths,
            settings,
            cancel: CancelToken::default(),
        }
    }

    /// What: Build the context for the running host.
    ///
    /// Inputs:
    /// - `host`: Metadata from [`HostInfo::detect`].
    /// - `paths`: Resolved migrator paths.
    /// - `settings_file`: Explicit settings path, or `None` for the default location.
    ///
    /// Output:
    /// - Context rooted at `/`.
    ///
    /// # Errors
    /// - `Config` when the settings file is malformed.
    pub fn for_host(
        host: HostInfo,
        paths: MigratorPaths,
        settings_file: Option<&Path>,
    ) -> Result<Self> {
        let settings_path = settings_file.map_or_else(|| paths.settings_file(), Path::to_path_buf);
        let settings = Settings::load(&settings_path)?;
        tracing::info!(
            hostname = %host.hostname,
            user = %host.username,
            distro = %host.distro.id,
            family = %host.distro.family,
            "host detected"
        );
        Ok(Self::new(PathBuf::from("/"), host, paths, settings))
    }

    /// What: Map a logical absolute path onto the context root.
    ///
    /// Inputs:
    /// - `logical`: Path as it appears on the host (e.g. `/etc/hosts`).
    ///
    /// Output:
    /// - `root` joined with the path's normal components; `..` components are dropped.
    #[must_use]
    pub fn on_root(&self, logical: &Path) -> PathBuf {
        logical
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part),
                _ => None,
            })
            .fold(self.root.clone(), |acc, part| acc.join(part))
    }

    /// Current-state file for this host.
    #[must_use]
    pub fn state_file(&self) -> PathBuf {
        self.paths.state_file(&self.host.hostname)
    }

    /// Backup destination root.
    #[must_use]
    pub fn backup_root(&self) -> PathBuf {
        self.settings.backup_root(&self.host.home)
    }
}
