//! Parallel capture of a host into a [`SystemSnapshot`].
//!
//! Every backend, every tracker category and the mount table is one job.
//! Jobs run on the blocking pool, at most `scan.workers` at a time, each
//! under its own timeout. A job that fails or times out contributes a warning
//! instead of records; only cancellation aborts the scan.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};

use super::{SnapshotParts, SystemSnapshot};
use crate::context::Context;
use crate::error::{MigratorError, Result};
use crate::fstab;
use crate::managers::{Adapter, Registry};
use crate::pathvars::PathTransform;
use crate::tracking::{self, ConfigCategory, TrackerScan};
use crate::util::command::SharedRunner;

/// One unit of scan work.
#[derive(Clone, Debug)]
enum ScanJob {
    /// Installed packages and repositories of one backend.
    Backend(Adapter),
    /// One config tracker category.
    Tracker(ConfigCategory),
    /// The mount table.
    Fstab,
}

impl ScanJob {
    fn label(&self) -> String {
        match self {
            Self::Backend(a) => format!("{} backend", a.kind()),
            Self::Tracker(c) => format!("{c} config tracker"),
            Self::Fstab => "fstab".to_string(),
        }
    }
}

/// What a finished job contributes.
#[derive(Debug, Default)]
struct Partial {
    parts: SnapshotParts,
    trackers: Vec<TrackerScan>,
}

impl Partial {
    fn warning(message: String) -> Self {
        let mut p = Self::default();
        p.parts.warnings.push(message);
        p
    }
}

/// What: Run one job synchronously.
///
/// Inputs:
/// - `job`: Work item.
/// - `ctx`: Context.
/// - `transform`: Source-host transform for tracker jobs.
///
/// Output:
/// - Records and warnings of the job.
///
/// # Errors
/// - `Cancelled`; every other failure is folded into warnings.
fn run_job(job: ScanJob, ctx: &Context, transform: &PathTransform) -> Result<Partial> {
    ctx.cancel.check()?;
    let mut out = Partial::default();
    match job {
        ScanJob::Backend(adapter) => {
            let kind = adapter.kind();
            match adapter.list_installed() {
                Ok(listing) => {
                    if !listing.tracks_reason {
                        out.parts
                            .warnings
                            .push(format!("{kind}: explicit and dependency installs are not distinguished"));
                    }
                    out.parts.packages = listing.packages;
                    out.parts.warnings.extend(listing.warnings);
                }
                Err(MigratorError::Cancelled) => return Err(MigratorError::Cancelled),
                Err(e) => {
                    tracing::warn!(manager = %kind, error = %e, "listing installed packages failed");
                    out.parts.warnings.push(format!("{kind}: {e}"));
                }
            }
            match adapter.list_repositories() {
                Ok(repos) => out.parts.repositories = repos,
                Err(MigratorError::Cancelled) => return Err(MigratorError::Cancelled),
                Err(e) => {
                    tracing::warn!(manager = %kind, error = %e, "listing repositories failed");
                    out.parts
                        .warnings
                        .push(format!("{kind}: repositories unavailable: {e}"));
                }
            }
        }
        ScanJob::Tracker(category) => {
            out.trackers
                .push(tracking::scan_category(ctx, transform, category)?);
        }
        ScanJob::Fstab => {
            let path = ctx.on_root(std::path::Path::new("/etc/fstab"));
            match fstab::read_fstab(&path) {
                Ok(parsed) => {
                    out.parts.fstab = parsed.entries;
                    out.parts
                        .warnings
                        .extend(parsed.errors.iter().map(ToString::to_string));
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "cannot read fstab");
                    out.parts.warnings.push(format!("fstab: {e}"));
                }
            }
        }
    }
    Ok(out)
}

/// What: Run a job on the blocking pool under a timeout.
///
/// Inputs:
/// - `job`: Work item.
/// - `ctx`, `transform`: Shared inputs.
/// - `limit`: Timeout for the whole job.
///
/// Output:
/// - The job's contribution, or a warning when it timed out or panicked.
///
/// # Errors
/// - `Cancelled` when the job observed cancellation.
async fn run_bounded(
    job: ScanJob,
    ctx: Arc<Context>,
    transform: Arc<PathTransform>,
    limit: Duration,
) -> Result<Partial> {
    let label = job.label();
    let handle = tokio::task::spawn_blocking(move || run_job(job, &ctx, &transform));
    match tokio::time::timeout(limit, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => {
            tracing::warn!(job = %label, error = %join, "scan job panicked");
            Ok(Partial::warning(format!("{label}: job failed: {join}")))
        }
        Err(_) => {
            tracing::warn!(job = %label, timeout_secs = limit.as_secs(), "scan job timed out");
            Ok(Partial::warning(format!(
                "{label}: timed out after {}s; partial results discarded",
                limit.as_secs()
            )))
        }
    }
}

/// What: Capture the host described by `ctx`.
///
/// Inputs:
/// - `ctx`: Context (root, host, settings, cancellation).
/// - `runner`: Process runner for backend commands.
///
/// Output:
/// - A new snapshot; backend and tracker failures are recorded as warnings.
///
/// # Errors
/// - `Cancelled` when the operator aborts; partial results are discarded.
///
/// Details:
/// - Backends are probed first (on the blocking pool); the jobs then run
///   through `buffer_unordered(workers)` and are merged in one step.
pub async fn scan(ctx: &Context, runner: SharedRunner) -> Result<SystemSnapshot> {
    let shared = Arc::new(ctx.clone());
    let registry = {
        let ctx = shared.clone();
        tokio::task::spawn_blocking(move || Registry::detect(&ctx, runner))
            .await
            .map_err(|e| MigratorError::Io(std::io::Error::other(e.to_string())))?
    };
    scan_with(ctx, &registry).await
}

/// What: Capture the host using an already-built registry.
///
/// Inputs:
/// - `ctx`: Context.
/// - `registry`: Operable backends.
///
/// Output:
/// - A new snapshot.
///
/// # Errors
/// - `Cancelled` only.
pub async fn scan_with(ctx: &Context, registry: &Registry) -> Result<SystemSnapshot> {
    ctx.cancel.check()?;
    let shared = Arc::new(ctx.clone());
    let transform = Arc::new(PathTransform::new(ctx.host.identity()));
    let workers = ctx.settings.scan.worker_limit();
    let backend_limit = ctx.settings.scan.backend_timeout();

    let mut jobs: Vec<ScanJob> = registry
        .adapters()
        .iter()
        .cloned()
        .map(ScanJob::Backend)
        .collect();
    jobs.extend(ConfigCategory::ALL.into_iter().map(ScanJob::Tracker));
    jobs.push(ScanJob::Fstab);
    tracing::info!(jobs = jobs.len(), workers, "scan started");

    let results: Vec<Result<Partial>> = stream::iter(jobs)
        .map(|job| run_bounded(job, shared.clone(), transform.clone(), backend_limit))
        .buffer_unordered(workers)
        .collect()
        .await;
    ctx.cancel.check()?;

    let mut parts = SnapshotParts {
        managers: registry.kinds(),
        ..SnapshotParts::default()
    };
    let mut trackers = Vec::new();
    for result in results {
        let partial = result?;
        parts.packages.extend(partial.parts.packages);
        parts.repositories.extend(partial.parts.repositories);
        parts.fstab.extend(partial.parts.fstab);
        parts.warnings.extend(partial.parts.warnings);
        trackers.extend(partial.trackers);
    }
    let merged = TrackerScan::merge(trackers);
    parts.configs = merged.entries;
    parts.warnings.extend(merged.warnings);
    for var in transform.ambiguous_variables() {
        parts.warnings.push(transform.ambiguity(*var).to_string());
    }
    parts.warnings.sort();
    parts.warnings.dedup();

    let snapshot = SystemSnapshot::assemble(ctx.host.clone(), Utc::now(), parts);
    tracing::info!(
        packages = snapshot.packages.len(),
        repositories = snapshot.repositories.len(),
        configs = snapshot.configs.len(),
        mounts = snapshot.fstab.len(),
        warnings = snapshot.warnings.len(),
        "scan finished"
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use super::*;
    use crate::context::HostInfo;
    use crate::distro::{DistroFamily, DistroInfo};
    use crate::managers::{ManagerKind, registry::adapter_env};
    use crate::paths::MigratorPaths;
    use crate::settings::Settings;
    use crate::util::command::testing::ScriptedRunner;

    fn ctx_over(root: &Path) -> Context {
        let host = HostInfo {
            hostname: "atlas".into(),
            username: "ana".into(),
            home: PathBuf::from("/home/ana"),
            distro: DistroInfo {
                id: "arch".into(),
                family: DistroFamily::Arch,
                ..DistroInfo::default()
            },
            desktop: None,
        };
        Context::new(
            root.to_path_buf(),
            host,
            MigratorPaths::under(&root.join("m")),
            Settings::default(),
        )
    }

    fn write(root: &Path, logical: &str, body: &str) {
        let p = root.join(logical.trim_start_matches('/'));
        std::fs::create_dir_all(p.parent().expect("parent")).expect("mkdir");
        std::fs::write(p, body).expect("write");
    }

    /// What: A scan merges backend, tracker and fstab results.
    ///
    /// Inputs:
    /// - Scripted pacman with two packages (one explicit), a temp root with
    ///   `.bashrc`, `pacman.conf` and an fstab holding one good and one bad line.
    ///
    /// Output:
    /// - Both packages, the `.bashrc` entry, one mount and one fstab warning.
    #[tokio::test]
    async fn scan_merges_all_sources() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path();
        write(root, "/home/ana/.bashrc", "alias ll='ls -l'\n");
        write(root, "/etc/pacman.conf", "[options]\n[core]\nInclude = /etc/pacman.d/mirrorlist\n");
        write(
            root,
            "/etc/fstab",
            "UUID=abcd / ext4 defaults 0 1\nnas:/srv /mnt/nas nfs defaults 0 0\nbroken\n",
        );
        let runner = ScriptedRunner::with_programs(&["pacman"])
            .respond("pacman -Q", "linux 6.9.1-1\nzsh 5.9-5\n")
            .respond("pacman -Qqe", "zsh\n");
        let ctx = ctx_over(root);
        let runner: crate::util::command::SharedRunner = Arc::new(runner);
        let env = adapter_env(&ctx, runner);
        let registry = Registry::from_adapters(vec![Adapter::new(ManagerKind::Pacman, env)]);

        let snap = scan_with(&ctx, &registry).await.expect("scan");
        assert_eq!(snap.managers, vec![ManagerKind::Pacman]);
        assert_eq!(snap.packages.len(), 2);
        assert!(snap.configs.iter().any(|c| c.path == "/home/ana/.bashrc"));
        assert_eq!(snap.fstab.len(), 2);
        assert!(snap.warnings.iter().any(|w| w.contains("fstab line 3")));
    }

    #[tokio::test]
    async fn failing_backend_degrades_to_warning() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let ctx = ctx_over(tmp.path());
        let runner: crate::util::command::SharedRunner =
            Arc::new(ScriptedRunner::with_programs(&["pacman"]));
        let env = adapter_env(&ctx, runner);
        let registry = Registry::from_adapters(vec![Adapter::new(ManagerKind::Pacman, env)]);
        let snap = scan_with(&ctx, &registry).await.expect("scan");
        assert!(snap.packages.is_empty());
        assert!(snap.warnings.iter().any(|w| w.starts_with("pacman:")));
    }

    /// What: A backend exceeding its time budget is dropped, the rest merged.
    ///
    /// Inputs:
    /// - pacman stalling for 3s against a 1s backend timeout; flatpak answering
    ///   at once; a `.bashrc` in the root.
    ///
    /// Output:
    /// - Flatpak packages and the config entry present, no pacman packages,
    ///   and a timeout warning naming the pacman backend.
    #[tokio::test]
    async fn slow_backend_times_out_without_blocking_others() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path();
        write(root, "/home/ana/.bashrc", "alias ll='ls -l'\n");
        let mut ctx = ctx_over(root);
        ctx.settings.scan.backend_timeout_secs = 1;
        let runner = ScriptedRunner::with_programs(&["pacman", "flatpak"])
            .respond("pacman -Q", "zsh 5.9-5\n")
            .respond("pacman -Qqe", "zsh\n")
            .stall("pacman -Q", Duration::from_secs(3))
            .respond(
                "flatpak list --app --columns=application,version,origin",
                "org.gimp.GIMP\t2.10.38\tflathub\n",
            );
        let runner: crate::util::command::SharedRunner = Arc::new(runner);
        let registry = Registry::from_adapters(vec![
            Adapter::new(ManagerKind::Pacman, adapter_env(&ctx, runner.clone())),
            Adapter::new(ManagerKind::Flatpak, adapter_env(&ctx, runner)),
        ]);

        let snap = scan_with(&ctx, &registry).await.expect("scan");
        assert_eq!(snap.packages.len(), 1);
        assert_eq!(snap.packages[0].name, "org.gimp.GIMP");
        assert!(snap.configs.iter().any(|c| c.path == "/home/ana/.bashrc"));
        assert!(
            snap.warnings
                .iter()
                .any(|w| w.starts_with("pacman backend: timed out after 1s")),
            "{:?}",
            snap.warnings
        );
    }

    #[tokio::test]
    async fn cancelled_scan_returns_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let ctx = ctx_over(tmp.path());
        ctx.cancel.cancel();
        let result = scan_with(&ctx, &Registry::default()).await;
        assert!(matches!(result, Err(MigratorError::Cancelled)));
    }
}
