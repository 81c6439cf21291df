//! Where migrator keeps its own files.
//!
//! Resolution happens once at startup and the result travels inside the
//! [`crate::context::Context`]; nothing else reads `XDG_*` variables.

use std::env;
use std::path::{Path, PathBuf};

/// Resolved locations of every file migrator owns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MigratorPaths {
    /// `$XDG_CONFIG_HOME/migrator`.
    pub config_dir: PathBuf,
    /// `$XDG_DATA_HOME/migrator`.
    pub data_dir: PathBuf,
    /// `<config_dir>/logs`.
    pub logs_dir: PathBuf,
}

/// Resolve an XDG base directory from environment or default to `$HOME` + segments.
///
/// Inputs:
/// - `var`: Environment variable to check (e.g., `XDG_CONFIG_HOME`).
/// - `home`: Home directory used for the fallback.
/// - `home_default`: Fallback path segments relative to `home` if `var` is unset/empty.
///
/// Output: Resolved base directory path.
fn xdg_base_dir(var: &str, home: &Path, home_default: &[&str]) -> PathBuf {
    if let Ok(p) = env::var(var)
        && !p.trim().is_empty()
    {
        return PathBuf::from(p);
    }
    home_default
        .iter()
        .fold(home.to_path_buf(), |base, seg| base.join(seg))
}

impl MigratorPaths {
    /// What: Resolve paths from the XDG environment.
    ///
    /// Inputs:
    /// - `home`: The invoking user's home directory.
    ///
    /// Output:
    /// - Paths under `XDG_CONFIG_HOME`/`XDG_DATA_HOME`, falling back to
    ///   `~/.config` and `~/.local/share`.
    ///
    /// Details:
    /// - Directories are not created here; [`Self::ensure`] does that when a
    ///   command first needs to write.
    #[must_use]
    pub fn from_env(home: &Path) -> Self {
        let config_dir = xdg_base_dir("XDG_CONFIG_HOME", home, &[".config"]).join("migrator");
        let data_dir = xdg_base_dir("XDG_DATA_HOME", home, &[".local", "share"]).join("migrator");
        Self::with_dirs(config_dir, data_dir)
    }

    /// Paths rooted under one base directory (`<base>/config`, `<base>/data`).
    #[must_use]
    pub fn under(base: &Path) -> Self {
        Self::with_dirs(base.join("config"), base.join("data"))
    }

    /// Build from explicit config and data directories.
    fn with_dirs(config_dir: PathBuf, data_dir: PathBuf) -> Self {
        let logs_dir = config_dir.join("logs");
        Self {
            config_dir,
            data_dir,
            logs_dir,
        }
    }

    /// What: Create the config, data and logs directories.
    ///
    /// # Errors
    /// - Propagates the first `create_dir_all` failure.
    pub fn ensure(&self) -> std::io::Result<()> {
        for dir in [&self.config_dir, &self.data_dir, &self.logs_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// `<config_dir>/settings.toml`.
    #[must_use]
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.toml")
    }

    /// `<config_dir>/package_mappings.json`.
    #[must_use]
    pub fn mappings_file(&self) -> PathBuf {
        self.config_dir.join("package_mappings.json")
    }

    /// What: Current-state file for one host.
    ///
    /// Inputs:
    /// - `hostname`: Host the state belongs to.
    ///
    /// Output:
    /// - `<data_dir>/state-<safe hostname>.json`.
    #[must_use]
    pub fn state_file(&self, hostname: &str) -> PathBuf {
        self.data_dir.join(format!(
            "state-{}.json",
            crate::util::safe_file_component(hostname)
        ))
    }
}
