//! Phase-by-phase execution of a restore plan.
//!
//! Items run sequentially in plan order. A failing item is recorded and the
//! next one runs; cancellation marks every remaining item `not-run`.

use std::fs;
use std::path::Path;

use super::plan::{Disposition, PlanAction, PlanItem, Planner, RestorePlan};
use super::report::{ItemOutcome, Outcome, ReportStatus, RestoreReport, Summary};
use super::{Phase, RestoreOptions};
use crate::context::Context;
use crate::error::{MigratorError, Result};
use crate::fstab::{FstabEntry, append_portable};
use crate::managers::InstallRequest;

/// What: Walk a plan and apply it where the options allow.
///
/// Inputs:
/// - `planner`: Destination context and backends.
/// - `plan`: Plan built by [`Planner::plan`].
/// - `options`: The same options the plan was built with.
///
/// Output:
/// - Report with one outcome per item.
///
/// Details:
/// - Mutation is gated by [`RestoreOptions::applies`] per phase; a dry run
///   produces `planned` where a live run would produce `applied`.
#[must_use]
pub fn execute(planner: &Planner<'_>, plan: RestorePlan, options: &RestoreOptions) -> RestoreReport {
    let mut outcomes = Vec::with_capacity(plan.items.len());
    for phase in Phase::ALL {
        let apply = options.applies(phase);
        let items: Vec<&PlanItem> = plan.phase(phase).collect();
        if items.is_empty() {
            continue;
        }
        tracing::info!(%phase, items = items.len(), apply, "restore phase");
        if phase == Phase::Fstab {
            outcomes.extend(run_mounts(planner.ctx, &items, apply));
            continue;
        }
        for item in items {
            let outcome = if planner.ctx.cancel.is_cancelled() {
                Outcome::NotRun
            } else {
                run_item(planner, item, apply)
            };
            outcomes.push(outcome_for(item, outcome));
        }
    }

    let summary = Summary::of(&outcomes);
    let status = ReportStatus::from_summary(&summary);
    tracing::info!(
        applied = summary.applied,
        planned = summary.planned,
        skipped = summary.skipped,
        failed = summary.failed,
        not_run = summary.not_run,
        status = status.as_str(),
        "restore finished"
    );
    RestoreReport {
        dry_run: !options.execute,
        plan,
        outcomes,
        summary,
        status,
    }
}

/// Pair an item with its outcome.
fn outcome_for(item: &PlanItem, outcome: Outcome) -> ItemOutcome {
    ItemOutcome {
        phase: item.phase,
        subject: item.subject.clone(),
        disposition: item.disposition,
        outcome,
    }
}

/// What: Outcome of one non-mount item.
///
/// Inputs:
/// - `planner`: Destination context and backends.
/// - `item`: Plan item.
/// - `apply`: Whether mutation is allowed for its phase.
///
/// Output:
/// - `skipped` for anything but `will-apply`, `planned` when not applying,
///   else `applied` or `failed`.
fn run_item(planner: &Planner<'_>, item: &PlanItem, apply: bool) -> Outcome {
    let Some(action) = item.action.as_ref().filter(|_| item.disposition == Disposition::WillApply)
    else {
        return Outcome::Skipped;
    };
    if !apply {
        return Outcome::Planned;
    }
    let result = match action {
        PlanAction::Install {
            manager,
            name,
            version,
            repository,
            ..
        } => planner
            .registry
            .get(*manager)
            .ok_or_else(|| MigratorError::BackendUnavailable {
                manager: *manager,
                reason: "no longer operable".into(),
            })
            .and_then(|adapter| {
                adapter.install(&InstallRequest {
                    name: name.clone(),
                    version: version.clone(),
                    repository: repository.clone(),
                })
            }),
        PlanAction::WriteConfig {
            path,
            content,
            overwrite,
        } => write_config(planner.ctx, path, content, *overwrite),
        PlanAction::AddRepository { repository } => planner
            .registry
            .get(repository.manager)
            .ok_or_else(|| MigratorError::BackendUnavailable {
                manager: repository.manager,
                reason: "no longer operable".into(),
            })
            .and_then(|adapter| adapter.add_repository(repository)),
        PlanAction::AppendMount { .. } => Ok(()),
    };
    match result {
        Ok(()) => Outcome::Applied,
        Err(MigratorError::Cancelled) => Outcome::NotRun,
        Err(e) => {
            tracing::warn!(phase = %item.phase, subject = %item.subject, error = %e, "restore item failed");
            Outcome::Failed {
                error: e.to_string(),
            }
        }
    }
}

/// What: Write one config file under the destination root.
///
/// Inputs:
/// - `ctx`: Destination context.
/// - `logical`: Destination path.
/// - `content`: Bytes to write.
/// - `overwrite`: Whether a differing existing file may be replaced.
///
/// # Errors
/// - `RestoreConflict` when `overwrite` is unset and a differing file
///   appeared after planning.
/// - `DestinationUnwritable` when the directory or file cannot be written.
///
/// Details:
/// - The target is re-read at write time; earlier phases may have created it.
/// - Written to `<file>.migrator.tmp` and renamed into place.
fn write_config(ctx: &Context, logical: &str, content: &[u8], overwrite: bool) -> Result<()> {
    let target = ctx.on_root(Path::new(logical));
    if !overwrite
        && let Ok(existing) = fs::read(&target)
        && existing != content
    {
        return Err(MigratorError::RestoreConflict { path: target });
    }
    let unwritable = |e: std::io::Error| MigratorError::DestinationUnwritable {
        path: target.clone(),
        reason: e.to_string(),
    };
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(unwritable)?;
    }
    let mut tmp = target.as_os_str().to_owned();
    tmp.push(".migrator.tmp");
    fs::write(&tmp, content).map_err(unwritable)?;
    fs::rename(&tmp, &target).map_err(unwritable)?;
    tracing::info!(path = %logical, bytes = content.len(), "config restored");
    Ok(())
}

/// What: Outcomes of the mount phase.
///
/// Inputs:
/// - `ctx`: Destination context.
/// - `items`: Fstab plan items.
/// - `apply`: Whether mutation is allowed.
///
/// Output:
/// - One outcome per item; every `will-apply` entry is appended in one block.
fn run_mounts(ctx: &Context, items: &[&PlanItem], apply: bool) -> Vec<ItemOutcome> {
    let entries: Vec<&FstabEntry> = items
        .iter()
        .filter(|i| i.disposition == Disposition::WillApply)
        .filter_map(|i| match &i.action {
            Some(PlanAction::AppendMount { entry }) => Some(entry),
            _ => None,
        })
        .collect();
    let appended: Outcome = if ctx.cancel.is_cancelled() {
        Outcome::NotRun
    } else if !apply {
        Outcome::Planned
    } else {
        match append_portable(&ctx.on_root(Path::new("/etc/fstab")), &entries) {
            Ok(_) => Outcome::Applied,
            Err(e) => {
                tracing::warn!(error = %e, "fstab append failed");
                Outcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    };
    items
        .iter()
        .map(|item| {
            let outcome = if item.disposition == Disposition::WillApply {
                appended.clone()
            } else {
                Outcome::Skipped
            };
            outcome_for(item, outcome)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backup::{ARTIFACT_FORMAT, BackupArtifact, CapturedFile, FileContent};
    use crate::equivalence::Resolver;
    use crate::managers::registry::adapter_env;
    use crate::managers::{Adapter, ManagerKind, Registry};
    use crate::paths::MigratorPaths;
    use crate::restore::plan::Destination;
    use crate::restore::{AvailabilityCache, PhaseMode};
    use crate::settings::Settings;
    use crate::snapshot::fixtures::{config, host, package, sample};
    use crate::tracking::Fingerprint;
    use crate::util::command::testing::ScriptedRunner;

    fn artifact() -> BackupArtifact {
        let mut snapshot = sample();
        snapshot.packages = vec![
            package(ManagerKind::Apt, "vim", "2:9.1.0016-1ubuntu7"),
            package(ManagerKind::Apt, "htop", "3.3.0-4"),
        ];
        snapshot.repositories.clear();
        snapshot.configs = vec![config("/home/ana/.vimrc", b"")];
        let text = "set number\n\" ${HOME}/notes\n";
        BackupArtifact {
            format_version: ARTIFACT_FORMAT,
            hostname: "atlas".into(),
            created_at: snapshot.captured_at,
            snapshot,
            files: vec![CapturedFile {
                path: "/home/ana/.vimrc".into(),
                tokenized_path: "${HOME}/.vimrc".into(),
                fingerprint: Fingerprint::of_bytes(text.as_bytes()),
                replaced: Vec::new(),
                ambiguous: Vec::new(),
                collision: false,
                content: FileContent::Text { text: text.into() },
            }],
            warnings: Vec::new(),
        }
    }

    /// What: A dry run plans exactly what a following live run applies.
    ///
    /// Inputs:
    /// - apt artifact restored onto an apt host: two packages, one config,
    ///   one NFS mount; fstab in apply mode; `htop` install fails.
    ///
    /// Output:
    /// - Identical plans; the dry run leaves files untouched and runs no
    ///   installs; the live run writes the config, appends fstab, records
    ///   `htop` as failed and still installs `vim`.
    #[test]
    fn dry_run_matches_live_run() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let ctx = Context::new(
            tmp.path().to_path_buf(),
            host("orbit", "bo"),
            MigratorPaths::under(&tmp.path().join("m")),
            Settings::default(),
        );
        let scripted = ScriptedRunner::with_programs(&["apt-get", "apt-cache", "dpkg-query"])
            .respond("apt-cache madison vim", " vim | 2:9.1.0016-1ubuntu7 | http://archive.ubuntu.com noble/main amd64 Packages\n")
            .respond("apt-cache madison htop", " htop | 3.3.0-4build1 | http://archive.ubuntu.com noble/main amd64 Packages\n")
            .respond("apt-get install -y vim=2:9.1.0016-1ubuntu7", "")
            .fail("apt-get install -y htop=3.3.0-4build1", 100);
        let runner = Arc::new(scripted);
        let shared: crate::util::command::SharedRunner = runner.clone();
        let registry =
            Registry::from_adapters(vec![Adapter::new(ManagerKind::Apt, adapter_env(&ctx, shared))]);
        let resolver = Resolver::builtin_only();
        let destination = Destination::default();
        let options = RestoreOptions {
            fstab: PhaseMode::Apply,
            ..RestoreOptions::default()
        };

        let dry_cache = AvailabilityCache::default();
        let dry_planner = Planner {
            ctx: &ctx,
            registry: &registry,
            resolver: &resolver,
            cache: &dry_cache,
            destination: &destination,
        };
        let dry = crate::restore::restore(&dry_planner, &artifact(), &options).expect("dry run");
        assert!(dry.dry_run);
        assert_eq!(dry.summary.applied, 0);
        assert_eq!(dry.summary.planned, 4);
        assert!(!tmp.path().join("home/bo/.vimrc").exists());
        assert!(!tmp.path().join("etc/fstab").exists());
        assert!(runner.ran().iter().all(|c| !c.starts_with("apt-get install")));

        let live_cache = AvailabilityCache::default();
        let live_planner = Planner {
            cache: &live_cache,
            ..dry_planner
        };
        let live_options = RestoreOptions {
            execute: true,
            ..options
        };
        let live = crate::restore::restore(&live_planner, &artifact(), &live_options).expect("live");
        assert_eq!(live.plan, dry.plan);
        assert_eq!(live.summary.applied, 3);
        assert_eq!(live.summary.failed, 1);
        assert_eq!(live.status, ReportStatus::Partial);
        assert_eq!(
            live.failures().map(|f| f.subject.as_str()).collect::<Vec<_>>(),
            vec!["apt:htop"]
        );
        let vimrc = fs::read_to_string(tmp.path().join("home/bo/.vimrc")).expect("vimrc");
        assert_eq!(vimrc, "set number\n\" /home/bo/notes\n");
        let fstab = fs::read_to_string(tmp.path().join("etc/fstab")).expect("fstab");
        assert!(fstab.contains("server:/export\t/mnt/share\tnfs"));
    }

    /// What: A file created after planning is not replaced without confirmation.
    ///
    /// Inputs:
    /// - Config planned as `will-apply` onto a missing path; the operator then
    ///   writes their own file there before the live run.
    ///
    /// Output:
    /// - The item fails as a conflict and the operator's file is unchanged.
    #[test]
    fn config_appearing_after_planning_is_not_overwritten() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let ctx = Context::new(
            tmp.path().to_path_buf(),
            host("orbit", "bo"),
            MigratorPaths::under(&tmp.path().join("m")),
            Settings::default(),
        );
        let registry = Registry::default();
        let resolver = Resolver::builtin_only();
        let cache = AvailabilityCache::default();
        let destination = Destination::default();
        let planner = Planner {
            ctx: &ctx,
            registry: &registry,
            resolver: &resolver,
            cache: &cache,
            destination: &destination,
        };
        let options = RestoreOptions {
            execute: true,
            ..RestoreOptions::default()
        }
        .only(Phase::Configs);
        let plan = planner.plan(&artifact(), &options).expect("plan");
        let item = plan.find(Phase::Configs, "/home/bo/.vimrc").expect("vimrc planned");
        assert_eq!(item.disposition, Disposition::WillApply);
        assert!(matches!(
            item.action,
            Some(PlanAction::WriteConfig { overwrite: false, .. })
        ));

        let target = tmp.path().join("home/bo/.vimrc");
        fs::create_dir_all(target.parent().expect("parent")).expect("mkdir");
        fs::write(&target, "operator's own vimrc\n").expect("write");

        let report = execute(&planner, plan, &options);
        assert_eq!(report.summary.failed, 1);
        let failure = report.failures().next().expect("conflict reported");
        assert!(matches!(&failure.outcome, Outcome::Failed { error } if error.contains("differs")));
        assert_eq!(
            fs::read_to_string(&target).expect("read"),
            "operator's own vimrc\n"
        );
    }

    #[test]
    fn cancelled_run_marks_items_not_run() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let ctx = Context::new(
            tmp.path().to_path_buf(),
            host("orbit", "bo"),
            MigratorPaths::under(&tmp.path().join("m")),
            Settings::default(),
        );
        let registry = Registry::default();
        let resolver = Resolver::builtin_only();
        let cache = AvailabilityCache::default();
        let destination = Destination::default();
        let planner = Planner {
            ctx: &ctx,
            registry: &registry,
            resolver: &resolver,
            cache: &cache,
            destination: &destination,
        };
        let options = RestoreOptions {
            execute: true,
            ..RestoreOptions::default()
        }
        .only(Phase::Configs);
        let plan = planner.plan(&artifact(), &options).expect("plan");
        ctx.cancel.cancel();
        let report = execute(&planner, plan, &options);
        assert_eq!(report.summary.not_run, 1);
        assert_eq!(report.status, ReportStatus::Partial);
        assert!(!tmp.path().join("home/bo/.vimrc").exists());
    }
}
