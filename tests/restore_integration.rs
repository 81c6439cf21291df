//! Integration tests for backup and restore across hosts.
//!
//! Tests cover:
//! - Cross-family restore (apt source, pacman destination), dry run then live
//! - Version policy selection on a same-family destination

mod common;

use std::path::{Path, PathBuf};

use migrator::distro::DistroFamily;
use migrator::managers::ManagerKind;
use migrator::ops;
use migrator::restore::{
    Disposition, Outcome, Phase, PlanAction, ReportStatus, RestoreOptions, RestoreReport,
    VersionPolicy,
};

use common::{DPKG_QUERY, FakeRunner, context, host, seed_ubuntu_root, ubuntu_runner};

/// Back up the seeded Ubuntu host under `root` and return the artifact path.
async fn ubuntu_backup(root: &Path) -> PathBuf {
    seed_ubuntu_root(root);
    let ctx = context(root, host("atlas", "ana", "ubuntu", DistroFamily::Debian));
    let (_, runner) = ubuntu_runner().shared();
    let report = ops::backup(&ctx, runner).await.expect("backup");
    assert_eq!(report.packages, 4);
    report.path
}

/// Arch destination with vim already installed and gcc/htop in its sync repos.
fn arch_runner() -> FakeRunner {
    FakeRunner::with_programs(&["pacman"])
        .respond("pacman --version", "Pacman v7.0.0 - libalpm v15.0.0\n")
        .respond("pacman -Q", "vim 9.1.0866-1\n")
        .respond("pacman -Qqe", "vim\n")
        .respond(
            "pacman -Si gcc",
            "Repository      : core\nName            : gcc\nVersion         : 14.2.1+r134+gab884fffe3fc-2\n",
        )
        .respond(
            "pacman -Si htop",
            "Repository      : extra\nName            : htop\nVersion         : 3.3.0-3\n",
        )
        .respond("pacman -S --noconfirm --needed gcc", "")
        .respond("pacman -S --noconfirm --needed htop", "")
}

fn outcome<'a>(report: &'a RestoreReport, subject: &str) -> &'a Outcome {
    &report
        .outcomes
        .iter()
        .find(|o| o.subject == subject)
        .unwrap_or_else(|| panic!("no outcome for {subject}"))
        .outcome
}

#[tokio::test]
/// What: Restore an Ubuntu backup onto an Arch host, first dry then live.
///
/// Inputs:
/// - Ubuntu artifact with vim, g++, htop (explicit) and libc6 (dependency),
///   a `.bashrc` naming `/home/ana`, and an fstab with a disk and an NFS mount.
/// - Arch destination for user `bo` with vim already installed.
///
/// Output:
/// - Dry run: identical plan, nothing installed or written.
/// - Live run: g++ installed as gcc, htop installed, `.bashrc` rewritten to
///   `/home/bo`, fstab left alone because its phase is in preview.
///
/// Details:
/// - The dependency-only libc6 never appears in the plan.
async fn integration_cross_family_restore_dry_then_live() {
    let src = tempfile::tempdir().expect("tempdir");
    let artifact = ubuntu_backup(src.path()).await;

    let dst = tempfile::tempdir().expect("tempdir");
    let ctx = context(dst.path(), host("borealis", "bo", "arch", DistroFamily::Arch));
    let (runner, shared) = arch_runner().shared();

    let dry = ops::restore(&ctx, shared.clone(), &artifact, &RestoreOptions::default())
        .await
        .expect("dry run");
    assert!(dry.dry_run);
    let plan = &dry.plan;
    assert_eq!(plan.source_host, "atlas");
    assert_eq!(plan.destination_host, "borealis");
    assert!(plan.find(Phase::Packages, "apt:libc6").is_none());
    assert_eq!(
        plan.find(Phase::Packages, "apt:vim").map(|i| i.disposition),
        Some(Disposition::AlreadySatisfied)
    );
    let gxx = plan.find(Phase::Packages, "apt:g++").expect("g++ planned");
    assert_eq!(gxx.disposition, Disposition::WillApply);
    assert!(matches!(
        &gxx.action,
        Some(PlanAction::Install { manager: ManagerKind::Pacman, name, .. }) if name == "gcc"
    ));
    assert_eq!(
        plan.find(Phase::Configs, "/home/bo/.bashrc").map(|i| i.disposition),
        Some(Disposition::WillApply)
    );
    assert_eq!(
        plan.find(Phase::Fstab, "/").map(|i| i.disposition),
        Some(Disposition::SkippedIncompatible)
    );
    assert_eq!(
        plan.find(Phase::Fstab, "/mnt/nas").map(|i| i.disposition),
        Some(Disposition::WillApply)
    );
    assert_eq!(dry.summary.applied, 0);
    assert_eq!(dry.summary.planned, 4);
    assert!(runner.ran().iter().all(|c| !c.starts_with("pacman -S ")));
    assert!(!dst.path().join("home/bo/.bashrc").exists());

    let live_options = RestoreOptions {
        execute: true,
        ..RestoreOptions::default()
    };
    let live = ops::restore(&ctx, shared, &artifact, &live_options)
        .await
        .expect("live run");
    assert!(!live.dry_run);
    assert_eq!(live.plan.items, dry.plan.items);
    assert_eq!(live.status, ReportStatus::Success);
    assert_eq!(outcome(&live, "apt:g++"), &Outcome::Applied);
    assert_eq!(outcome(&live, "apt:htop"), &Outcome::Applied);
    assert_eq!(outcome(&live, "/home/bo/.bashrc"), &Outcome::Applied);
    assert_eq!(outcome(&live, "/mnt/nas"), &Outcome::Planned);
    assert_eq!(outcome(&live, "apt:vim"), &Outcome::Skipped);

    let ran = runner.ran();
    assert!(ran.contains(&"pacman -S --noconfirm --needed gcc".to_string()));
    assert!(ran.contains(&"pacman -S --noconfirm --needed htop".to_string()));
    let bashrc = std::fs::read_to_string(dst.path().join("home/bo/.bashrc")).expect("bashrc");
    assert!(bashrc.starts_with("export PATH=/home/bo/bin:$PATH\n"));
    assert!(!dst.path().join("etc/fstab").exists());
}

/// Ubuntu destination with nothing installed and two versions of `tool` on offer.
fn apt_destination_runner() -> FakeRunner {
    FakeRunner::with_programs(&["apt-get", "apt-cache", "apt-mark", "dpkg-query"])
        .respond("apt-get --version", "apt 2.7.14 (amd64)\n")
        .respond(DPKG_QUERY, "")
        .respond("apt-mark showmanual", "")
        .respond(
            "apt-cache madison tool",
            "      tool | 2.1-1 | http://archive.ubuntu.com/ubuntu noble-updates/main amd64 Packages\n      tool | 1.9-1 | http://archive.ubuntu.com/ubuntu noble/main amd64 Packages\n",
        )
        .respond(
            "apt-cache madison legacy",
            "    legacy | 2.5-1 | http://archive.ubuntu.com/ubuntu noble/main amd64 Packages\n",
        )
}

fn planned_version(plan: &migrator::restore::RestorePlan, subject: &str) -> Option<String> {
    match &plan.find(Phase::Packages, subject)?.action {
        Some(PlanAction::Install { version, .. }) => version.clone(),
        _ => None,
    }
}

#[tokio::test]
/// What: Version policies choose among the destination's versions.
///
/// Inputs:
/// - Backup recording `tool` 2.0-1 and `legacy` 3.0-1.
/// - Destination offering `tool` 2.1-1 and 1.9-1, `legacy` 2.5-1 only.
///
/// Output:
/// - prefer-newer: tool 2.1-1, legacy unavailable.
/// - exact: both unavailable, even with downgrades allowed.
/// - prefer-newer with downgrades: legacy 2.5-1.
/// - always-newest: tool 2.1-1 and legacy 2.5-1.
async fn integration_version_policies() {
    let src = tempfile::tempdir().expect("tempdir");
    let src_ctx = context(src.path(), host("atlas", "ana", "ubuntu", DistroFamily::Debian));
    let (_, src_runner) = FakeRunner::with_programs(&["apt-get", "apt-cache", "apt-mark", "dpkg-query"])
        .respond("apt-get --version", "apt 2.7.14 (amd64)\n")
        .respond(DPKG_QUERY, "tool\t2.0-1\tii \nlegacy\t3.0-1\tii \n")
        .respond("apt-mark showmanual", "legacy\ntool\n")
        .shared();
    let artifact = ops::backup(&src_ctx, src_runner).await.expect("backup").path;

    let dst = tempfile::tempdir().expect("tempdir");
    let ctx = context(dst.path(), host("orbit", "bo", "ubuntu", DistroFamily::Debian));
    let (_, runner) = apt_destination_runner().shared();
    let plan_with = |policy: VersionPolicy, allow_downgrade: bool| RestoreOptions {
        version_policy: policy,
        allow_downgrade,
        ..RestoreOptions::default()
    }
    .only(Phase::Packages);

    let newer = ops::plan(&ctx, runner.clone(), &artifact, &plan_with(VersionPolicy::PreferNewer, false))
        .await
        .expect("plan");
    assert_eq!(planned_version(&newer, "apt:tool").as_deref(), Some("2.1-1"));
    let legacy = newer.find(Phase::Packages, "apt:legacy").expect("legacy");
    assert_eq!(legacy.disposition, Disposition::Unavailable);
    assert!(legacy.note.as_deref().is_some_and(|n| n.contains("2.5-1")));

    let exact = ops::plan(&ctx, runner.clone(), &artifact, &plan_with(VersionPolicy::Exact, true))
        .await
        .expect("plan");
    assert_eq!(exact.count(Disposition::Unavailable), 2);

    let downgrade = ops::plan(&ctx, runner.clone(), &artifact, &plan_with(VersionPolicy::PreferNewer, true))
        .await
        .expect("plan");
    assert_eq!(planned_version(&downgrade, "apt:legacy").as_deref(), Some("2.5-1"));

    let newest = ops::plan(&ctx, runner, &artifact, &plan_with(VersionPolicy::AlwaysNewest, false))
        .await
        .expect("plan");
    assert_eq!(planned_version(&newest, "apt:tool").as_deref(), Some("2.1-1"));
    assert_eq!(planned_version(&newest, "apt:legacy").as_deref(), Some("2.5-1"));
}

#[tokio::test]
/// What: A corrupt artifact is a fatal error and nothing runs.
///
/// Inputs:
/// - A file that is not JSON.
///
/// Output:
/// - `ArtifactCorrupt`; no install command issued.
async fn integration_corrupt_artifact_is_fatal() {
    let dst = tempfile::tempdir().expect("tempdir");
    let bogus = dst.path().join("migrator_backup_x_20240101_000000.json");
    std::fs::write(&bogus, "not json").expect("write");
    let ctx = context(dst.path(), host("orbit", "bo", "ubuntu", DistroFamily::Debian));
    let (runner, shared) = apt_destination_runner().shared();
    let options = RestoreOptions {
        execute: true,
        ..RestoreOptions::default()
    };
    let err = ops::restore(&ctx, shared, &bogus, &options)
        .await
        .expect_err("corrupt");
    assert!(err.is_fatal());
    assert_eq!(err.kind(), "artifact-corrupt");
    assert!(runner.ran().iter().all(|c| !c.starts_with("apt-get install")));
}
