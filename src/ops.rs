//! The operations the command line exposes, each returning a structured report.
//!
//! Nothing here prints. Fatal problems come back as `Err`; everything that
//! can be recovered per item lands in the returned report.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use crate::backup::{self, ArtifactInfo, BackupArtifact, BackupReport};
use crate::context::Context;
use crate::equivalence::{Resolver, overrides};
use crate::error::{MigratorError, Result};
use crate::managers::{Adapter, ManagerKind, Registry};
use crate::restore::plan::target_adapter;
use crate::restore::{self, AvailabilityCache, Destination, Planner, RestoreOptions, RestorePlan, RestoreReport};
use crate::snapshot::state::load_snapshot_str;
use crate::snapshot::{self, SnapshotDiff, StateStore, SystemSnapshot};
use crate::util::command::SharedRunner;

/// Result of `scan`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    /// The new current state.
    pub snapshot: SystemSnapshot,
    /// Where it was saved.
    pub state_file: PathBuf,
}

/// Result of `check`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
    /// Capture time of the previous state, if one existed.
    pub previous: Option<DateTime<Utc>>,
    /// Capture time of the new state.
    pub current: DateTime<Utc>,
    /// Changes since the previous state.
    pub diff: SnapshotDiff,
    /// Scan warnings plus problems reading the previous state.
    pub warnings: Vec<String>,
}

/// Result of `compare`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareReport {
    /// Label of the older side.
    pub old: String,
    /// Label of the newer side.
    pub new: String,
    /// Differences from `old` to `new`.
    pub diff: SnapshotDiff,
}

/// Result of `edit-mappings`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingsFile {
    /// Override file path.
    pub path: PathBuf,
    /// The file was created with the skeleton by this call.
    pub created: bool,
}

/// Map a join failure of a blocking task onto the crate error.
fn joined<T>(r: std::result::Result<T, tokio::task::JoinError>) -> Result<T> {
    r.map_err(|e| MigratorError::Io(std::io::Error::other(e.to_string())))
}

/// Probe backends off the async runtime.
async fn detect_registry(ctx: &Context, runner: SharedRunner) -> Result<Registry> {
    let ctx = ctx.clone();
    joined(tokio::task::spawn_blocking(move || Registry::detect(&ctx, runner)).await)
}

/// What: Scan the host and save the result as current state.
///
/// Inputs:
/// - `ctx`: Context of the host.
/// - `runner`: Process runner.
///
/// Output:
/// - The new snapshot and the state file path.
///
/// # Errors
/// - `StateLocked` when another scan or restore holds the state file.
/// - `Cancelled`, or `DestinationUnwritable` when the state cannot be saved.
pub async fn scan(ctx: &Context, runner: SharedRunner) -> Result<ScanReport> {
    let store = StateStore::new(ctx.state_file());
    let lock = store.lock()?;
    let snapshot = snapshot::scan::scan(ctx, runner).await?;
    store.save(&lock, &snapshot)?;
    Ok(ScanReport {
        snapshot,
        state_file: store.path().to_path_buf(),
    })
}

/// What: Scan, save current state and write a backup artifact.
///
/// Inputs:
/// - `ctx`: Context of the host.
/// - `runner`: Process runner.
///
/// Output:
/// - Backup report; scan warnings are included.
///
/// # Errors
/// - Everything [`scan`] returns, and `DestinationUnwritable` for the artifact.
pub async fn backup(ctx: &Context, runner: SharedRunner) -> Result<BackupReport> {
    let scanned = scan(ctx, runner).await?;
    let mut report = backup::create_backup(ctx, &scanned.snapshot, Utc::now())?;
    let mut warnings = scanned.snapshot.warnings;
    warnings.append(&mut report.warnings);
    report.warnings = warnings;
    Ok(report)
}

/// What: Resolver over the override file and the built-in table.
///
/// Inputs:
/// - `ctx`: Context naming the override file.
///
/// Output:
/// - Resolver and warnings; a malformed file degrades to built-in mappings only.
pub fn load_resolver(ctx: &Context) -> (Resolver, Vec<String>) {
    let path = ctx.paths.mappings_file();
    match overrides::load(&path) {
        Ok(loaded) => (Resolver::new(loaded.table), loaded.warnings),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring package mappings");
            (
                Resolver::builtin_only(),
                vec![format!("{}: ignored: {e}", path.display())],
            )
        }
    }
}

/// What: Resolve names and query availability for every wanted package in parallel.
///
/// Inputs:
/// - `cache`: Cache filled by the lookups.
/// - `resolver`: Equivalence resolver for cross-backend packages.
/// - `registry`: Destination backends.
/// - `artifact`: Source of package names.
/// - `workers`: Concurrency bound.
///
/// Details:
/// - Cross-backend packages are resolved through the cached index, so the
///   planner's own resolution only hits the cache.
/// - Failures are not cached; the planner repeats them and dispositions the item.
async fn prefetch(
    cache: Arc<AvailabilityCache>,
    resolver: Arc<Resolver>,
    registry: &Registry,
    artifact: &BackupArtifact,
    workers: usize,
) {
    let jobs: Vec<(ManagerKind, String, Adapter)> = artifact
        .snapshot
        .wanted_packages()
        .filter_map(|p| {
            target_adapter(registry, p.manager)
                .ok()
                .map(|a| (p.manager, p.name.clone(), a.clone()))
        })
        .collect();
    tracing::debug!(lookups = jobs.len(), workers, "prefetching package availability");
    let _: Vec<_> = stream::iter(jobs)
        .map(|(from, name, adapter)| {
            let (cache, resolver) = (cache.clone(), resolver.clone());
            tokio::task::spawn_blocking(move || {
                let resolved = resolver
                    .resolve(from, &name, adapter.kind(), &cache.index(&adapter))
                    .map(|r| r.name);
                if let Err(e) = resolved.and_then(|n| cache.versions(&adapter, &n)) {
                    tracing::debug!(package = %name, error = %e, "availability lookup failed");
                }
            })
        })
        .buffer_unordered(workers)
        .collect()
        .await;
}

/// Loaded inputs shared by `plan` and `restore`.
struct Prepared {
    artifact: BackupArtifact,
    registry: Registry,
    resolver: Resolver,
    cache: Arc<AvailabilityCache>,
    destination: Destination,
    warnings: Vec<String>,
}

/// Load the artifact and gather everything planning needs.
async fn prepare(ctx: &Context, runner: SharedRunner, artifact_path: &Path) -> Result<Prepared> {
    let artifact = backup::load_artifact(artifact_path)?;
    let registry = detect_registry(ctx, runner).await?;
    let destination = {
        let (ctx, registry) = (ctx.clone(), registry.clone());
        joined(tokio::task::spawn_blocking(move || Destination::gather(&ctx, &registry)).await)?
    };
    let (resolver, warnings) = load_resolver(ctx);
    let cache = Arc::new(AvailabilityCache::default());
    prefetch(
        cache.clone(),
        Arc::new(resolver.clone()),
        &registry,
        &artifact,
        ctx.settings.scan.worker_limit(),
    )
    .await;
    ctx.cancel.check()?;
    Ok(Prepared {
        artifact,
        registry,
        resolver,
        cache,
        destination,
        warnings,
    })
}

/// What: Plan a restore without touching the destination.
///
/// Inputs:
/// - `ctx`: Destination context.
/// - `runner`: Process runner.
/// - `artifact_path`: Backup to plan.
/// - `options`: Phase selection and policies.
///
/// Output:
/// - Plan with a disposition for every item.
///
/// # Errors
/// - `ArtifactCorrupt` for an unreadable artifact, `Cancelled`.
pub async fn plan(
    ctx: &Context,
    runner: SharedRunner,
    artifact_path: &Path,
    options: &RestoreOptions,
) -> Result<RestorePlan> {
    let prepared = prepare(ctx, runner, artifact_path).await?;
    let (ctx, options) = (ctx.clone(), options.clone());
    joined(
        tokio::task::spawn_blocking(move || {
            let planner = Planner {
                ctx: &ctx,
                registry: &prepared.registry,
                resolver: &prepared.resolver,
                cache: &prepared.cache,
                destination: &prepared.destination,
            };
            let mut plan = planner.plan(&prepared.artifact, &options)?;
            plan.warnings.extend(prepared.warnings);
            Ok::<_, MigratorError>(plan)
        })
        .await,
    )?
}

/// What: Restore an artifact, dry or live.
///
/// Inputs:
/// - `ctx`: Destination context.
/// - `runner`: Process runner.
/// - `artifact_path`: Backup to restore.
/// - `options`: Operator choices; `execute = false` is a dry run.
///
/// Output:
/// - Report with plan, per-item outcomes and summary.
///
/// # Errors
/// - `ArtifactCorrupt`, `StateLocked` (live runs take the state lock),
///   `Cancelled` during planning.
pub async fn restore(
    ctx: &Context,
    runner: SharedRunner,
    artifact_path: &Path,
    options: &RestoreOptions,
) -> Result<RestoreReport> {
    let store = StateStore::new(ctx.state_file());
    let lock = if options.execute {
        Some(store.lock()?)
    } else {
        None
    };
    let prepared = prepare(ctx, runner, artifact_path).await?;
    let (ctx, options) = (ctx.clone(), options.clone());
    let report = joined(
        tokio::task::spawn_blocking(move || {
            let planner = Planner {
                ctx: &ctx,
                registry: &prepared.registry,
                resolver: &prepared.resolver,
                cache: &prepared.cache,
                destination: &prepared.destination,
            };
            let mut report = restore::restore(&planner, &prepared.artifact, &options)?;
            report.plan.warnings.extend(prepared.warnings);
            Ok::<_, MigratorError>(report)
        })
        .await,
    )??;
    drop(lock);
    Ok(report)
}

/// What: Read a snapshot from an artifact or a state file.
///
/// Inputs:
/// - `path`: Backup artifact or state file.
///
/// Output:
/// - The contained snapshot.
///
/// # Errors
/// - `ArtifactCorrupt` when the file is neither.
pub fn load_any_snapshot(path: &Path) -> Result<SystemSnapshot> {
    let body = std::fs::read_to_string(path).map_err(|e| MigratorError::ArtifactCorrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let is_artifact = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .is_some_and(|v| v.get("snapshot").is_some());
    if is_artifact {
        backup::load_artifact(path).map(|a| a.snapshot)
    } else {
        load_snapshot_str(path, &body)
    }
}

/// What: Diff two stored snapshots.
///
/// Inputs:
/// - `ctx`: Context naming the current-state file.
/// - `old`: Artifact or state file.
/// - `new`: Artifact or state file; the current state when `None`.
///
/// Output:
/// - Labels and diff from `old` to `new`.
///
/// # Errors
/// - `ArtifactCorrupt` for unreadable inputs; `Config` when `new` is omitted
///   and no current state exists.
pub fn compare(ctx: &Context, old: &Path, new: Option<&Path>) -> Result<CompareReport> {
    let before = load_any_snapshot(old)?;
    let (after, label) = match new {
        Some(p) => (load_any_snapshot(p)?, p.display().to_string()),
        None => {
            let store = StateStore::new(ctx.state_file());
            let current = store.load()?.ok_or_else(|| {
                MigratorError::Config("no current state recorded; run `scan` first".to_string())
            })?;
            (current, format!("current state ({})", store.path().display()))
        }
    };
    Ok(CompareReport {
        old: old.display().to_string(),
        new: label,
        diff: snapshot::diff(&before, &after),
    })
}

/// What: Scan, diff against the stored state, then store the new state.
///
/// Inputs:
/// - `ctx`: Context of the host.
/// - `runner`: Process runner.
///
/// Output:
/// - Diff from the previous state (everything added when there was none).
///
/// # Errors
/// - `StateLocked`, `Cancelled`, or `DestinationUnwritable` when saving.
///
/// Details:
/// - An unreadable previous state is reported as a warning and treated as empty.
pub async fn check(ctx: &Context, runner: SharedRunner) -> Result<CheckReport> {
    let store = StateStore::new(ctx.state_file());
    let lock = store.lock()?;
    let mut warnings = Vec::new();
    let previous = match store.load() {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "previous state unreadable; comparing against empty state");
            warnings.push(format!("previous state ignored: {e}"));
            None
        }
    };
    let current = snapshot::scan::scan(ctx, runner).await?;
    let before = previous
        .clone()
        .unwrap_or_else(|| SystemSnapshot::empty(current.host.clone()));
    let diff = snapshot::diff(&before, &current);
    store.save(&lock, &current)?;
    warnings.extend(current.warnings.iter().cloned());
    Ok(CheckReport {
        previous: previous.map(|p| p.captured_at),
        current: current.captured_at,
        diff,
        warnings,
    })
}

/// Every artifact under the backup destination, newest first.
#[must_use]
pub fn list_backups(ctx: &Context) -> Vec<ArtifactInfo> {
    backup::list_artifacts(&ctx.backup_root())
}

/// What: Make sure the override file exists and return its path.
///
/// Inputs:
/// - `ctx`: Context naming the override file.
///
/// Output:
/// - Path and whether it was just created.
///
/// # Errors
/// - `DestinationUnwritable` when the skeleton cannot be written.
pub fn edit_mappings(ctx: &Context) -> Result<MappingsFile> {
    let path = ctx.paths.mappings_file();
    let created = overrides::ensure_skeleton(&path)?;
    Ok(MappingsFile { path, created })
}
