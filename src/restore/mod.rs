//! Plan generation and phased restore of a backup artifact.
//!
//! A restore always builds a [`plan::RestorePlan`] first and then walks it
//! phase by phase. Whether anything is mutated is decided by one flag per
//! phase ([`RestoreOptions::applies`]); a dry run walks the same code path
//! with that flag off and reports `planned` instead of `applied`.

pub mod cache;
pub mod execute;
pub mod plan;
pub mod policy;
pub mod report;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::backup::BackupArtifact;
use crate::error::{MigratorError, Result};

pub use cache::AvailabilityCache;
pub use execute::execute;
pub use plan::{Destination, Disposition, PlanAction, PlanItem, Planner, RestorePlan};
pub use policy::{VersionPolicy, select_version};
pub use report::{ItemOutcome, Outcome, ReportStatus, RestoreReport, Summary};

/// Restore phases in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Third-party repositories, so later installs can find their packages.
    Repositories,
    /// Package installs.
    Packages,
    /// Config file writes.
    Configs,
    /// Mount-table appends.
    Fstab,
}

impl Phase {
    /// Every phase in execution order.
    pub const ALL: [Self; 4] = [Self::Repositories, Self::Packages, Self::Configs, Self::Fstab];

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Repositories => "repositories",
            Self::Packages => "packages",
            Self::Configs => "configs",
            Self::Fstab => "fstab",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handling of an optional phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseMode {
    /// Left out of the plan.
    Skip,
    /// Planned and reported, never applied.
    #[default]
    Preview,
    /// Applied on an executing restore.
    Apply,
}

impl FromStr for PhaseMode {
    type Err = MigratorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "skip" => Ok(Self::Skip),
            "preview" => Ok(Self::Preview),
            "apply" => Ok(Self::Apply),
            other => Err(MigratorError::Config(format!("unknown phase mode `{other}`"))),
        }
    }
}

/// Handling of host-identity placeholders in restored configs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformMode {
    /// Resolve placeholders to the destination's values.
    #[default]
    On,
    /// Restore the source host's original values.
    Off,
    /// Plan with destination values but never write.
    Preview,
}

impl FromStr for TransformMode {
    type Err = MigratorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            "preview" => Ok(Self::Preview),
            other => Err(MigratorError::Config(format!(
                "unknown path-transform mode `{other}`"
            ))),
        }
    }
}

/// Operator choices for one restore.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreOptions {
    /// Mutate the destination; `false` is a dry run.
    pub execute: bool,
    /// Include the packages phase.
    pub packages: bool,
    /// Include the configs phase.
    pub configs: bool,
    /// Repository phase handling.
    pub repositories: PhaseMode,
    /// Mount-table phase handling.
    pub fstab: PhaseMode,
    /// Version selection policy.
    pub version_policy: VersionPolicy,
    /// Accept older versions when nothing else matches.
    pub allow_downgrade: bool,
    /// Placeholder handling for configs.
    pub path_transform: TransformMode,
    /// Apply repositories built for another distribution family.
    pub force_repos: bool,
    /// Overwrite every differing config file.
    pub overwrite_conflicts: bool,
    /// Destination paths the operator confirmed for overwrite.
    pub confirmed: BTreeSet<String>,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            execute: false,
            packages: true,
            configs: true,
            repositories: PhaseMode::Preview,
            fstab: PhaseMode::Preview,
            version_policy: VersionPolicy::default(),
            allow_downgrade: false,
            path_transform: TransformMode::On,
            force_repos: false,
            overwrite_conflicts: false,
            confirmed: BTreeSet::new(),
        }
    }
}

impl RestoreOptions {
    /// Whether `phase` appears in the plan.
    #[must_use]
    pub fn includes(&self, phase: Phase) -> bool {
        match phase {
            Phase::Packages => self.packages,
            Phase::Configs => self.configs,
            Phase::Repositories => self.repositories != PhaseMode::Skip,
            Phase::Fstab => self.fstab != PhaseMode::Skip,
        }
    }

    /// What: Whether `phase` may mutate the destination.
    ///
    /// Output:
    /// - `true` only on an executing restore, for an included phase that is
    ///   not in preview.
    #[must_use]
    pub fn applies(&self, phase: Phase) -> bool {
        self.execute
            && self.includes(phase)
            && match phase {
                Phase::Packages => true,
                Phase::Configs => self.path_transform != TransformMode::Preview,
                Phase::Repositories => self.repositories == PhaseMode::Apply,
                Phase::Fstab => self.fstab == PhaseMode::Apply,
            }
    }

    /// What: Keep only `only` among packages and configs.
    ///
    /// Inputs:
    /// - `only`: Phase to keep; repositories and fstab are skipped as well.
    #[must_use]
    pub fn only(mut self, only: Phase) -> Self {
        self.packages = only == Phase::Packages;
        self.configs = only == Phase::Configs;
        if only != Phase::Repositories {
            self.repositories = PhaseMode::Skip;
        }
        if only != Phase::Fstab {
            self.fstab = PhaseMode::Skip;
        }
        self
    }

    /// What: Restrict the options to the phases an operator picked.
    ///
    /// Inputs:
    /// - `chosen`: Phases to keep.
    ///
    /// Output:
    /// - Options with every other phase excluded.
    #[must_use]
    pub fn filtered(mut self, chosen: &[Phase]) -> Self {
        self.packages &= chosen.contains(&Phase::Packages);
        self.configs &= chosen.contains(&Phase::Configs);
        if !chosen.contains(&Phase::Repositories) {
            self.repositories = PhaseMode::Skip;
        }
        if !chosen.contains(&Phase::Fstab) {
            self.fstab = PhaseMode::Skip;
        }
        self
    }
}

/// What: Phases for which an artifact has anything to restore.
///
/// Inputs:
/// - `artifact`: Loaded backup.
///
/// Output:
/// - Non-empty phases in execution order; used to ask the operator which to
///   include before calling [`RestoreOptions::filtered`].
#[must_use]
pub fn available_phases(artifact: &BackupArtifact) -> Vec<Phase> {
    let snap = &artifact.snapshot;
    Phase::ALL
        .into_iter()
        .filter(|p| match p {
            Phase::Repositories => !snap.repositories.is_empty(),
            Phase::Packages => snap.wanted_packages().next().is_some(),
            Phase::Configs => !snap.configs.is_empty(),
            Phase::Fstab => !snap.fstab.is_empty(),
        })
        .collect()
}

/// What: Plan and run a restore.
///
/// Inputs:
/// - `planner`: Destination context, backends, resolver and cache.
/// - `artifact`: Backup to restore.
/// - `options`: Operator choices.
///
/// Output:
/// - Report with the plan and one outcome per plan item.
///
/// # Errors
/// - `Cancelled` when cancellation fires while planning. Cancellation during
///   execution is reported per item as `not-run` instead.
pub fn restore(
    planner: &Planner<'_>,
    artifact: &BackupArtifact,
    options: &RestoreOptions,
) -> Result<RestoreReport> {
    let plan = planner.plan(artifact, options)?;
    Ok(execute(planner, plan, options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::fixtures::sample;

    fn artifact() -> BackupArtifact {
        let snapshot = sample();
        BackupArtifact {
            format_version: crate::backup::ARTIFACT_FORMAT,
            hostname: snapshot.host.hostname.clone(),
            created_at: snapshot.captured_at,
            snapshot,
            files: Vec::new(),
            warnings: Vec::new(),
        }
    }

    #[test]
    fn dry_run_never_applies() {
        let opts = RestoreOptions {
            repositories: PhaseMode::Apply,
            fstab: PhaseMode::Apply,
            ..RestoreOptions::default()
        };
        assert!(Phase::ALL.iter().all(|p| !opts.applies(*p)));
        let live = RestoreOptions {
            execute: true,
            ..opts
        };
        assert!(Phase::ALL.iter().all(|p| live.applies(*p)));
    }

    /// What: Preview modes plan without applying; only-filters drop the rest.
    ///
    /// Inputs:
    /// - Executing defaults, path transform in preview, `only(Packages)`.
    ///
    /// Output:
    /// - Repos and fstab planned but not applied by default; configs not
    ///   applied in transform preview; only packages remain after `only`.
    #[test]
    fn previews_and_filters() {
        let live = RestoreOptions {
            execute: true,
            path_transform: TransformMode::Preview,
            ..RestoreOptions::default()
        };
        assert!(live.includes(Phase::Repositories));
        assert!(!live.applies(Phase::Repositories));
        assert!(!live.applies(Phase::Fstab));
        assert!(!live.applies(Phase::Configs));
        assert!(live.applies(Phase::Packages));

        let packages_only = live.only(Phase::Packages);
        let kept: Vec<Phase> = Phase::ALL
            .into_iter()
            .filter(|p| packages_only.includes(*p))
            .collect();
        assert_eq!(kept, vec![Phase::Packages]);
    }

    #[test]
    fn available_phases_follow_artifact_content() {
        let mut a = artifact();
        assert_eq!(available_phases(&a), Phase::ALL.to_vec());
        a.snapshot.fstab.clear();
        a.snapshot.repositories.clear();
        assert_eq!(available_phases(&a), vec![Phase::Packages, Phase::Configs]);

        let opts = RestoreOptions::default().filtered(&[Phase::Configs]);
        assert!(!opts.includes(Phase::Packages));
        assert!(opts.includes(Phase::Configs));
        assert!(!opts.includes(Phase::Fstab));
    }

    #[test]
    fn modes_parse() {
        assert_eq!("apply".parse::<PhaseMode>().expect("mode"), PhaseMode::Apply);
        assert_eq!("off".parse::<TransformMode>().expect("mode"), TransformMode::Off);
        assert!("always".parse::<PhaseMode>().is_err());
    }
}
