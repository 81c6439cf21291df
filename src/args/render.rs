//! Plain-text rendering of operation reports.
//!
//! Every function returns a `String`; `main` decides where it goes.

use std::fmt::Write as _;

use migrator::backup::{ArtifactInfo, BackupReport};
use migrator::ops::{CheckReport, CompareReport, MappingsFile, ScanReport};
use migrator::restore::{Outcome, RestorePlan, RestoreReport};
use migrator::snapshot::SnapshotDiff;
use migrator::util::ts_to_date;

/// Append a `warning:` line per warning.
fn push_warnings(out: &mut String, warnings: &[String]) {
    for w in warnings {
        let _ = writeln!(out, "warning: {w}");
    }
}

/// What: Render a scan report.
///
/// Inputs:
/// - `report`: Result of `scan`.
///
/// Output:
/// - Counts per category, the state file and warnings.
pub fn scan(report: &ScanReport) -> String {
    let s = &report.snapshot;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "scanned {} ({}) at {}",
        s.host.hostname,
        s.host.distro.id,
        ts_to_date(s.captured_at)
    );
    let managers: Vec<&str> = s.managers.iter().map(|m| m.as_str()).collect();
    let _ = writeln!(out, "  backends:     {}", managers.join(", "));
    let _ = writeln!(out, "  packages:     {}", s.packages.len());
    let _ = writeln!(out, "  repositories: {}", s.repositories.len());
    let _ = writeln!(out, "  configs:      {}", s.configs.len());
    let _ = writeln!(out, "  mounts:       {}", s.fstab.len());
    let _ = writeln!(out, "state saved to {}", report.state_file.display());
    push_warnings(&mut out, &s.warnings);
    out
}

/// Render a backup report.
pub fn backup(report: &BackupReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "backup written to {}", report.path.display());
    let _ = writeln!(
        out,
        "  {} packages, {} config files copied, {} listed only",
        report.packages, report.files_captured, report.files_skipped
    );
    for removed in &report.removed {
        let _ = writeln!(out, "  retention removed {}", removed.display());
    }
    push_warnings(&mut out, &report.warnings);
    out
}

/// What: Render a restore plan grouped by phase.
///
/// Inputs:
/// - `plan`: Plan to show.
///
/// Output:
/// - One line per item: disposition, subject and note.
pub fn plan(plan: &RestorePlan) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "restore plan: {} -> {}",
        plan.source_host, plan.destination_host
    );
    let mut current = None;
    for item in &plan.items {
        if current != Some(item.phase) {
            current = Some(item.phase);
            let _ = writeln!(out, "[{}]", item.phase);
        }
        let _ = write!(out, "  {:<20} {}", item.disposition.as_str(), item.subject);
        if let Some(note) = &item.note {
            let _ = write!(out, "  ({note})");
        }
        out.push('\n');
    }
    push_warnings(&mut out, &plan.warnings);
    out
}

/// What: Render a restore report.
///
/// Inputs:
/// - `report`: Result of a dry or live restore.
///
/// Output:
/// - Per-item outcomes, counts and the overall status.
pub fn restore(report: &RestoreReport) -> String {
    let mut out = String::new();
    let mode = if report.dry_run { "dry run" } else { "live" };
    let _ = writeln!(
        out,
        "restore ({mode}): {} -> {}",
        report.plan.source_host, report.plan.destination_host
    );
    for item in &report.outcomes {
        let label = match &item.outcome {
            Outcome::Applied => "applied".to_string(),
            Outcome::Planned => "planned".to_string(),
            Outcome::Skipped => format!("skipped ({})", item.disposition),
            Outcome::Failed { error } => format!("failed: {error}"),
            Outcome::NotRun => "not run".to_string(),
        };
        let _ = writeln!(out, "  {:<13} {:<28} {label}", item.phase.as_str(), item.subject);
    }
    let s = &report.summary;
    let _ = writeln!(
        out,
        "{}: {} applied, {} planned, {} skipped, {} failed, {} not run",
        report.status.as_str(),
        s.applied,
        s.planned,
        s.skipped,
        s.failed,
        s.not_run
    );
    push_warnings(&mut out, &report.plan.warnings);
    out
}

/// Render a snapshot diff, one `+`/`-`/`~` line per change.
fn diff(out: &mut String, d: &SnapshotDiff) {
    if d.is_empty() {
        out.push_str("no changes\n");
        return;
    }
    for p in &d.packages_added {
        let _ = writeln!(out, "+ package {}:{} {}", p.manager, p.name, p.version);
    }
    for p in &d.packages_removed {
        let _ = writeln!(out, "- package {}:{} {}", p.manager, p.name, p.version);
    }
    for c in &d.packages_changed {
        let _ = writeln!(out, "~ package {}:{} {} -> {}", c.manager, c.name, c.from, c.to);
    }
    for path in &d.configs_added {
        let _ = writeln!(out, "+ config {path}");
    }
    for path in &d.configs_removed {
        let _ = writeln!(out, "- config {path}");
    }
    for path in &d.configs_changed {
        let _ = writeln!(out, "~ config {path}");
    }
    for r in &d.repositories_added {
        let _ = writeln!(out, "+ repository {}:{} {}", r.manager, r.id, r.uri);
    }
    for r in &d.repositories_removed {
        let _ = writeln!(out, "- repository {}:{} {}", r.manager, r.id, r.uri);
    }
    for m in &d.fstab_added {
        let _ = writeln!(out, "+ mount {} on {}", m.spec, m.mount_point);
    }
    for m in &d.fstab_removed {
        let _ = writeln!(out, "- mount {} on {}", m.spec, m.mount_point);
    }
}

/// Render a comparison between two stored snapshots.
pub fn compare(report: &CompareReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "--- {}\n+++ {}", report.old, report.new);
    diff(&mut out, &report.diff);
    out
}

/// Render the result of `check`.
pub fn check(report: &CheckReport) -> String {
    let mut out = String::new();
    match report.previous {
        Some(at) => {
            let _ = writeln!(out, "changes since {}", ts_to_date(at));
        }
        None => out.push_str("no previous state; everything is new\n"),
    }
    diff(&mut out, &report.diff);
    push_warnings(&mut out, &report.warnings);
    out
}

/// What: Render the artifact listing.
///
/// Inputs:
/// - `artifacts`: Newest first.
///
/// Output:
/// - One line per artifact, or a hint when there are none.
pub fn backups(artifacts: &[ArtifactInfo]) -> String {
    if artifacts.is_empty() {
        return "no backups found\n".to_string();
    }
    let mut out = String::new();
    for a in artifacts {
        let _ = writeln!(
            out,
            "{}  {:<16} {:>10}  {}",
            ts_to_date(a.created_at),
            a.host,
            a.size,
            a.path.display()
        );
    }
    out
}

/// Render the mapping file location.
pub fn mappings(file: &MappingsFile) -> String {
    if file.created {
        format!("created {}\n", file.path.display())
    } else {
        format!("{}\n", file.path.display())
    }
}
