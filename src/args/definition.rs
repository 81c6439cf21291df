//! Command-line argument definition.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use migrator::error::Result;
use migrator::restore::{Phase, PhaseMode, RestoreOptions, TransformMode, VersionPolicy};

/// migrator - capture a Linux host's software state and restore it on another host
#[derive(Parser, Debug)]
#[command(name = "migrator")]
#[command(version)]
#[command(about = "Capture a Linux host's packages, configs and mounts, and restore them elsewhere", long_about = None)]
pub struct Args {
    /// Set the logging level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Enable verbose output (equivalent to --log-level debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Settings file (default: ~/.config/migrator/settings.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Operation to run
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan the host and store the result as current state
    Scan,
    /// Scan and write a backup artifact
    Backup {
        /// Backup directory for this run (overrides `backup_dir` in settings)
        #[arg(long, value_name = "DIR")]
        dest: Option<PathBuf>,
    },
    /// Restore a backup artifact (dry run unless --execute)
    Restore {
        /// Backup artifact
        artifact: PathBuf,
        /// Restore switches
        #[command(flatten)]
        flags: RestoreFlags,
    },
    /// Show the restore plan for an artifact without touching the host
    Plan {
        /// Backup artifact
        artifact: PathBuf,
        /// Restore switches
        #[command(flatten)]
        flags: RestoreFlags,
    },
    /// Diff two snapshots (artifacts or state files); the second defaults to current state
    Compare {
        /// Older side
        old: PathBuf,
        /// Newer side
        new: Option<PathBuf>,
    },
    /// Scan and report what changed since the stored state
    Check,
    /// List backup artifacts, newest first
    Backups,
    /// Open the package mapping override file in $VISUAL or $EDITOR
    EditMappings,
}

/// Switches shared by `restore` and `plan`.
#[derive(ClapArgs, Debug, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct RestoreFlags {
    /// Apply changes (otherwise dry run)
    #[arg(long)]
    pub execute: bool,

    /// Restore packages only
    #[arg(long, conflicts_with = "configs_only")]
    pub packages_only: bool,

    /// Restore config files only
    #[arg(long)]
    pub configs_only: bool,

    /// Version selection policy (exact, prefer-same, prefer-newer, always-newest)
    #[arg(long, value_name = "POLICY")]
    pub version_policy: Option<VersionPolicy>,

    /// Accept an older version when nothing else matches
    #[arg(long)]
    pub allow_downgrade: bool,

    /// Host placeholder handling for configs (on, off, preview)
    #[arg(long, value_name = "MODE", default_value = "on")]
    pub path_transform: TransformMode,

    /// Mount-table handling (skip, preview, apply)
    #[arg(long, value_name = "MODE", default_value = "preview")]
    pub fstab: PhaseMode,

    /// Third-party repository handling (skip, preview, apply)
    #[arg(long, value_name = "MODE", default_value = "preview")]
    pub repos: PhaseMode,

    /// Apply repositories built for another distribution family
    #[arg(long)]
    pub force_repos: bool,

    /// Overwrite every differing config file
    #[arg(long)]
    pub overwrite_conflicts: bool,

    /// Confirm overwriting one differing config file (repeatable)
    #[arg(long, value_name = "PATH")]
    pub confirm: Vec<String>,
}

impl RestoreFlags {
    /// What: Turn command-line switches into restore options.
    ///
    /// Inputs:
    /// - `default_policy`: Version policy from settings, used when `--version-policy` is absent.
    ///
    /// Output:
    /// - Options ready for [`migrator::ops::restore`] or [`migrator::ops::plan`].
    ///
    /// Details:
    /// - `--packages-only` and `--configs-only` also drop repositories and fstab.
    pub fn options(&self, default_policy: VersionPolicy) -> RestoreOptions {
        let options = RestoreOptions {
            execute: self.execute,
            packages: true,
            configs: true,
            repositories: self.repos,
            fstab: self.fstab,
            version_policy: self.version_policy.unwrap_or(default_policy),
            allow_downgrade: self.allow_downgrade,
            path_transform: self.path_transform,
            force_repos: self.force_repos,
            overwrite_conflicts: self.overwrite_conflicts,
            confirmed: self.confirm.iter().cloned().collect(),
        };
        if self.packages_only {
            options.only(Phase::Packages)
        } else if self.configs_only {
            options.only(Phase::Configs)
        } else {
            options
        }
    }
}

/// What: Parse process arguments.
///
/// Output:
/// - Parsed arguments; clap exits on `--help`, `--version` and usage errors.
pub fn parse() -> Args {
    Args::parse()
}

/// What: Validate a raw log level before it reaches the subscriber.
///
/// Inputs:
/// - `raw`: Value of `--log-level`.
///
/// Output:
/// - The lowercased level.
///
/// # Errors
/// - `Config` for anything but trace, debug, info, warn, error.
pub fn checked_level(raw: &str) -> Result<String> {
    let level = raw.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(level),
        _ => Err(migrator::MigratorError::Config(format!(
            "unknown log level `{raw}`"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_from(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).expect("valid arguments")
    }

    /// What: A bare `restore` is a dry run with previews for repos and fstab.
    ///
    /// Inputs:
    /// - `migrator restore a.json`
    ///
    /// Output:
    /// - Options equal to the library defaults with the settings policy.
    #[test]
    fn bare_restore_is_dry_run() {
        let args = parse_from(&["migrator", "restore", "a.json"]);
        let Command::Restore { artifact, flags } = args.command else {
            panic!("expected restore");
        };
        assert_eq!(artifact, PathBuf::from("a.json"));
        let opts = flags.options(VersionPolicy::PreferNewer);
        assert_eq!(opts, RestoreOptions::default());
    }

    /// What: Every restore switch lands in the options.
    ///
    /// Inputs:
    /// - All switches set, two `--confirm` paths, `--packages-only`.
    ///
    /// Output:
    /// - Executing packages-only options with the named policy and confirmations.
    #[test]
    fn restore_flags_map_to_options() {
        let args = parse_from(&[
            "migrator",
            "--verbose",
            "restore",
            "a.json",
            "--execute",
            "--packages-only",
            "--version-policy",
            "exact",
            "--allow-downgrade",
            "--path-transform",
            "off",
            "--fstab",
            "apply",
            "--repos",
            "apply",
            "--force-repos",
            "--confirm",
            "/etc/hosts",
            "--confirm",
            "/home/ana/.bashrc",
        ]);
        assert!(args.verbose);
        let Command::Restore { flags, .. } = args.command else {
            panic!("expected restore");
        };
        let opts = flags.options(VersionPolicy::PreferNewer);
        assert!(opts.execute);
        assert!(opts.packages && !opts.configs);
        assert_eq!(opts.repositories, PhaseMode::Skip);
        assert_eq!(opts.fstab, PhaseMode::Skip);
        assert_eq!(opts.version_policy, VersionPolicy::Exact);
        assert_eq!(opts.path_transform, TransformMode::Off);
        assert!(opts.allow_downgrade && opts.force_repos);
        assert_eq!(opts.confirmed.len(), 2);
    }

    #[test]
    fn conflicting_only_flags_rejected() {
        let res = Args::try_parse_from([
            "migrator",
            "restore",
            "a.json",
            "--packages-only",
            "--configs-only",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn compare_second_side_optional() {
        let args = parse_from(&["migrator", "compare", "old.json"]);
        assert!(matches!(args.command, Command::Compare { new: None, .. }));
    }

    #[test]
    fn log_levels_checked() {
        assert_eq!(checked_level("WARN").expect("level"), "warn");
        assert!(checked_level("loud").is_err());
    }
}
