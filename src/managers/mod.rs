//! Package-manager backends behind one capability surface.
//!
//! Every backend is a variant of [`Adapter`]. Callers only talk to the enum:
//! enumerate installed packages, query available versions, search the index,
//! install, and list or add repositories. Adding a backend means adding one
//! variant here and one entry in [`registry`].

mod appimage;
mod apt;
mod dnf;
mod flatpak;
mod pacman;
pub mod registry;
pub mod repos;
mod snap;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::distro::{DistroFamily, DistroInfo};
use crate::error::{MigratorError, Result};
use crate::util::command::{CommandSpec, SharedRunner};

pub use appimage::AppImageAdapter;
pub use apt::AptAdapter;
pub use dnf::DnfAdapter;
pub use flatpak::FlatpakAdapter;
pub use pacman::PacmanAdapter;
pub use registry::Registry;
pub use snap::SnapAdapter;

/// One concrete package-management system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagerKind {
    /// Debian/Ubuntu APT + dpkg.
    Apt,
    /// Fedora/RHEL DNF + rpm.
    Dnf,
    /// Arch pacman.
    Pacman,
    /// Flatpak applications.
    Flatpak,
    /// Snap packages.
    Snap,
    /// Loose AppImage bundles.
    #[serde(rename = "appimage")]
    AppImage,
}

impl ManagerKind {
    /// Every backend, in probing order.
    pub const ALL: [Self; 6] = [
        Self::Apt,
        Self::Dnf,
        Self::Pacman,
        Self::Flatpak,
        Self::Snap,
        Self::AppImage,
    ];

    /// Lowercase name used in files and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Apt => "apt",
            Self::Dnf => "dnf",
            Self::Pacman => "pacman",
            Self::Flatpak => "flatpak",
            Self::Snap => "snap",
            Self::AppImage => "appimage",
        }
    }

    /// Distribution family whose system packages this backend manages.
    #[must_use]
    pub const fn native_family(self) -> Option<DistroFamily> {
        match self {
            Self::Apt => Some(DistroFamily::Debian),
            Self::Dnf => Some(DistroFamily::Rpm),
            Self::Pacman => Some(DistroFamily::Arch),
            Self::Flatpak | Self::Snap | Self::AppImage => None,
        }
    }

    /// Whether this is a distribution's system package manager.
    #[must_use]
    pub const fn is_native(self) -> bool {
        self.native_family().is_some()
    }
}

impl fmt::Display for ManagerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ManagerKind {
    type Err = MigratorError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == lower)
            .ok_or_else(|| MigratorError::Config(format!("unknown package manager `{s}`")))
    }
}

/// Why a package is installed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallReason {
    /// Requested by the user.
    Explicit,
    /// Pulled in by another package.
    Dependency,
    /// The backend does not record the distinction.
    Untracked,
}

/// One installed package.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    /// Backend that owns the package.
    pub manager: ManagerKind,
    /// Package name (application id for Flatpak).
    pub name: String,
    /// Installed version as the backend reports it.
    pub version: String,
    /// Install reason.
    pub reason: InstallReason,
    /// Repository, remote or channel the package came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    /// One-line description, when cheap to obtain.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
}

impl PackageRecord {
    /// Identity within a snapshot.
    #[must_use]
    pub fn identity(&self) -> (ManagerKind, &str) {
        (self.manager, self.name.as_str())
    }

    /// Whether a restore should try to reinstall this package.
    #[must_use]
    pub fn wanted(&self) -> bool {
        self.reason != InstallReason::Dependency
    }
}

/// Where a repository definition can be reused.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "scope")]
pub enum RepoCompat {
    /// Valid on any distribution that has the backend.
    Portable,
    /// Only valid on one distribution family, optionally one release.
    Family {
        /// Required family.
        family: DistroFamily,
        /// Required release codename.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        release: Option<String>,
    },
}

impl RepoCompat {
    /// What: Check whether a destination distribution can use the repository.
    ///
    /// Inputs:
    /// - `distro`: Destination identity.
    ///
    /// Output:
    /// - `true` for portable repositories, or when family (and release, if
    ///   recorded) match.
    #[must_use]
    pub fn matches(&self, distro: &DistroInfo) -> bool {
        match self {
            Self::Portable => true,
            Self::Family { family, release } => {
                *family == distro.family
                    && release
                        .as_ref()
                        .is_none_or(|r| distro.codename.as_deref() == Some(r.as_str()))
            }
        }
    }
}

/// One configured repository or remote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    /// Owning backend.
    pub manager: ManagerKind,
    /// Short identifier (section name, remote name, PPA name).
    pub id: String,
    /// Primary URI.
    pub uri: String,
    /// Whether the repository is enabled.
    pub enabled: bool,
    /// Compatibility tag.
    pub compat: RepoCompat,
    /// Text needed to recreate the definition (source line, INI section).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub definition: String,
}

/// Result of enumerating one backend's installed packages.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstalledListing {
    /// Installed packages.
    pub packages: Vec<PackageRecord>,
    /// The backend distinguishes explicit from dependency installs.
    pub tracks_reason: bool,
    /// Non-fatal problems hit while listing.
    pub warnings: Vec<String>,
}

/// Install request handed to an adapter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstallRequest {
    /// Package name on the target backend.
    pub name: String,
    /// Version to pin, or `None` for the backend's default candidate.
    pub version: Option<String>,
    /// Repository/remote/channel hint.
    pub repository: Option<String>,
}

/// Everything an adapter needs from its surroundings.
#[derive(Clone)]
pub struct AdapterEnv {
    /// Process runner.
    pub runner: SharedRunner,
    /// Filesystem root for file-based discovery.
    pub root: PathBuf,
    /// Tracked user's home (logical path).
    pub home: PathBuf,
    /// Per-attempt command timeout.
    pub timeout: Duration,
    /// Release codename of the host, used to tag release-bound repositories.
    pub codename: Option<String>,
}

impl fmt::Debug for AdapterEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterEnv")
            .field("root", &self.root)
            .field("home", &self.home)
            .field("timeout", &self.timeout)
            .field("codename", &self.codename)
            .finish_non_exhaustive()
    }
}

impl AdapterEnv {
    /// Command spec with this environment's timeout.
    fn cmd(&self, program: &str, args: &[&str]) -> CommandSpec {
        CommandSpec::new(program, args).timeout(self.timeout)
    }

    /// Privileged spec for installs and repository refreshes, which get ten
    /// times the query timeout.
    fn install_cmd(&self, program: &str, args: &[&str]) -> CommandSpec {
        CommandSpec::new(program, args)
            .timeout(self.timeout.saturating_mul(10))
            .privileged()
    }

    /// Map a logical path onto the root.
    fn file(&self, logical: &Path) -> PathBuf {
        logical
            .strip_prefix("/")
            .map_or_else(|_| self.root.join(logical), |rel| self.root.join(rel))
    }

    /// Run a command and require success.
    fn run(&self, spec: &CommandSpec) -> Result<String> {
        crate::util::command::run_checked(self.runner.as_ref(), spec)
    }

    /// Run a command and return raw output.
    fn run_raw(&self, spec: &CommandSpec) -> Result<crate::util::command::CommandOutput> {
        crate::util::command::run_output(self.runner.as_ref(), spec)
    }
}

/// A usable backend.
#[derive(Clone, Debug)]
pub enum Adapter {
    /// APT/dpkg.
    Apt(AptAdapter),
    /// DNF/rpm.
    Dnf(DnfAdapter),
    /// pacman.
    Pacman(PacmanAdapter),
    /// Flatpak.
    Flatpak(FlatpakAdapter),
    /// Snap.
    Snap(SnapAdapter),
    /// AppImage bundles.
    AppImage(AppImageAdapter),
}

/// Forward a call to whichever adapter variant is present.
macro_rules! dispatch {
    ($self:expr, $a:ident => $call:expr) => {
        match $self {
            Adapter::Apt($a) => $call,
            Adapter::Dnf($a) => $call,
            Adapter::Pacman($a) => $call,
            Adapter::Flatpak($a) => $call,
            Adapter::Snap($a) => $call,
            Adapter::AppImage($a) => $call,
        }
    };
}

impl Adapter {
    /// What: Construct the adapter for `kind`.
    ///
    /// Inputs:
    /// - `kind`: Backend to build.
    /// - `env`: Runner, root and timeout shared by its calls.
    ///
    /// Output:
    /// - Adapter; no probing happens here.
    #[must_use]
    pub fn new(kind: ManagerKind, env: AdapterEnv) -> Self {
        match kind {
            ManagerKind::Apt => Self::Apt(AptAdapter { env }),
            ManagerKind::Dnf => Self::Dnf(DnfAdapter { env }),
            ManagerKind::Pacman => Self::Pacman(PacmanAdapter { env }),
            ManagerKind::Flatpak => Self::Flatpak(FlatpakAdapter { env }),
            ManagerKind::Snap => Self::Snap(SnapAdapter { env }),
            ManagerKind::AppImage => Self::AppImage(AppImageAdapter { env }),
        }
    }

    /// Backend kind.
    #[must_use]
    pub const fn kind(&self) -> ManagerKind {
        match self {
            Self::Apt(_) => ManagerKind::Apt,
            Self::Dnf(_) => ManagerKind::Dnf,
            Self::Pacman(_) => ManagerKind::Pacman,
            Self::Flatpak(_) => ManagerKind::Flatpak,
            Self::Snap(_) => ManagerKind::Snap,
            Self::AppImage(_) => ManagerKind::AppImage,
        }
    }

    /// Shared environment.
    fn env(&self) -> &AdapterEnv {
        dispatch!(self, a => &a.env)
    }

    /// What: Check that the backend is present and responsive.
    ///
    /// Output:
    /// - `Ok(())` when operable.
    ///
    /// # Errors
    /// - `BackendUnavailable` when an executable is missing or the liveness
    ///   command fails or times out.
    pub fn probe(&self) -> Result<()> {
        let kind = self.kind();
        let (programs, liveness): (&[&str], Option<(&str, &[&str])>) = match self {
            Self::Apt(_) => (&["apt-get", "dpkg-query"], Some(("apt-get", &["--version"]))),
            Self::Dnf(_) => (&["dnf", "rpm"], Some(("dnf", &["--version"]))),
            Self::Pacman(_) => (&["pacman"], Some(("pacman", &["--version"]))),
            Self::Flatpak(_) => (&["flatpak"], Some(("flatpak", &["--version"]))),
            Self::Snap(_) => (&["snap"], Some(("snap", &["version"]))),
            Self::AppImage(_) => (&[], None),
        };
        let env = self.env();
        if let Some(missing) = programs.iter().find(|p| !env.runner.locate(p)) {
            return Err(MigratorError::BackendUnavailable {
                manager: kind,
                reason: format!("{missing} not found on PATH"),
            });
        }
        if let Some((program, args)) = liveness {
            let out = env
                .run(&env.cmd(program, args))
                .map_err(|e| MigratorError::BackendUnavailable {
                    manager: kind,
                    reason: e.to_string(),
                })?;
            if let Self::Snap(_) = self {
                snap::check_daemon(&out)?;
            }
        }
        Ok(())
    }

    /// What: Enumerate installed packages.
    ///
    /// # Errors
    /// - Command failures of the primary listing command.
    pub fn list_installed(&self) -> Result<InstalledListing> {
        dispatch!(self, a => a.list_installed())
    }

    /// What: Versions of `name` the backend can install, newest first when known.
    ///
    /// Output:
    /// - Empty when the package is absent.
    ///
    /// # Errors
    /// - `QueryTimeout`, `CommandFailed`, or `Unsupported` for AppImage.
    pub fn query_available(&self, name: &str) -> Result<Vec<String>> {
        dispatch!(self, a => a.query_available(name))
    }

    /// What: Package names in the backend's index similar to `name`.
    ///
    /// # Errors
    /// - Command failures, or `Unsupported`.
    pub fn search(&self, name: &str) -> Result<Vec<String>> {
        dispatch!(self, a => a.search(name))
    }

    /// What: Install one package.
    ///
    /// # Errors
    /// - `CommandFailed`, `QueryTimeout`, `Cancelled`, or `Unsupported`.
    pub fn install(&self, request: &InstallRequest) -> Result<()> {
        tracing::info!(
            manager = %self.kind(),
            package = %request.name,
            version = request.version.as_deref().unwrap_or("default"),
            "installing package"
        );
        dispatch!(self, a => a.install(request))
    }

    /// What: Repositories configured for this backend.
    ///
    /// # Errors
    /// - Read or command failures; callers degrade to an empty set.
    pub fn list_repositories(&self) -> Result<Vec<RepositoryRecord>> {
        dispatch!(self, a => a.list_repositories())
    }

    /// What: Add a repository definition captured on another host.
    ///
    /// # Errors
    /// - `DestinationUnwritable`, command failures, or `Unsupported`.
    pub fn add_repository(&self, repo: &RepositoryRecord) -> Result<()> {
        dispatch!(self, a => a.add_repository(repo))
    }
}

/// Shared `Unsupported` constructor for adapters.
fn unsupported(manager: ManagerKind, operation: &'static str) -> MigratorError {
    MigratorError::Unsupported { manager, operation }
}
