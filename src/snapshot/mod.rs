//! The captured state of one host at one point in time.
//!
//! A [`SystemSnapshot`] is built once by [`scan::scan`] and never mutated
//! afterwards; a new scan produces a new value. Collections are kept sorted
//! by identity so serialized snapshots and diffs are reproducible.

pub mod diff;
pub mod scan;
pub mod state;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::HostInfo;
use crate::fstab::FstabEntry;
use crate::managers::{ManagerKind, PackageRecord, RepositoryRecord};
use crate::tracking::ConfigEntry;

pub use diff::{SnapshotDiff, VersionChange, diff};
pub use state::{StateLock, StateStore};

/// Snapshot document format understood by this build.
pub const SNAPSHOT_FORMAT: u32 = 1;

/// Immutable capture of a host's tracked state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    /// Document format.
    pub format_version: u32,
    /// Host metadata.
    pub host: HostInfo,
    /// Capture time (UTC).
    pub captured_at: DateTime<Utc>,
    /// Backends that were operable during the scan.
    pub managers: Vec<ManagerKind>,
    /// Installed packages, sorted and unique by `(manager, name)`.
    pub packages: Vec<PackageRecord>,
    /// Configured repositories, sorted by `(manager, id)`.
    pub repositories: Vec<RepositoryRecord>,
    /// Tracked config files, sorted by path.
    pub configs: Vec<ConfigEntry>,
    /// Mount-table entries in file order.
    pub fstab: Vec<FstabEntry>,
    /// Non-fatal problems hit during the scan.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Parts a snapshot is assembled from.
#[derive(Clone, Debug, Default)]
pub struct SnapshotParts {
    /// Operable backends.
    pub managers: Vec<ManagerKind>,
    /// Packages in any order.
    pub packages: Vec<PackageRecord>,
    /// Repositories in any order.
    pub repositories: Vec<RepositoryRecord>,
    /// Config entries in any order.
    pub configs: Vec<ConfigEntry>,
    /// Mount-table entries.
    pub fstab: Vec<FstabEntry>,
    /// Warnings.
    pub warnings: Vec<String>,
}

impl SystemSnapshot {
    /// What: Assemble a snapshot, enforcing ordering and identity uniqueness.
    ///
    /// Inputs:
    /// - `host`: Host metadata.
    /// - `captured_at`: Capture time.
    /// - `parts`: Collected records.
    ///
    /// Output:
    /// - Snapshot with sorted collections; a duplicate `(manager, name)`
    ///   package keeps its first occurrence.
    #[must_use]
    pub fn assemble(host: HostInfo, captured_at: DateTime<Utc>, parts: SnapshotParts) -> Self {
        let SnapshotParts {
            mut managers,
            mut packages,
            mut repositories,
            mut configs,
            fstab,
            warnings,
        } = parts;
        managers.sort();
        managers.dedup();
        packages.sort_by(|a, b| a.identity().cmp(&b.identity()));
        packages.dedup_by(|later, first| later.identity() == first.identity());
        repositories.sort_by(|a, b| (a.manager, &a.id, &a.uri).cmp(&(b.manager, &b.id, &b.uri)));
        repositories.dedup_by(|later, first| {
            (later.manager, &later.id, &later.uri) == (first.manager, &first.id, &first.uri)
        });
        configs.sort_by(|a, b| a.path.cmp(&b.path));
        configs.dedup_by(|later, first| later.path == first.path);
        Self {
            format_version: SNAPSHOT_FORMAT,
            host,
            captured_at,
            managers,
            packages,
            repositories,
            configs,
            fstab,
            warnings,
        }
    }

    /// What: Empty snapshot used when no previous state exists.
    ///
    /// Inputs:
    /// - `host`: Host metadata.
    ///
    /// Output:
    /// - Snapshot with no records, captured at the Unix epoch.
    #[must_use]
    pub fn empty(host: HostInfo) -> Self {
        Self::assemble(host, DateTime::<Utc>::UNIX_EPOCH, SnapshotParts::default())
    }

    /// Packages a restore should try to reinstall.
    pub fn wanted_packages(&self) -> impl Iterator<Item = &PackageRecord> {
        self.packages.iter().filter(|p| p.wanted())
    }

    /// Number of packages per backend.
    #[must_use]
    pub fn package_counts(&self) -> Vec<(ManagerKind, usize)> {
        let mut out: Vec<(ManagerKind, usize)> = Vec::new();
        for p in &self.packages {
            match out.last_mut() {
                Some((kind, n)) if *kind == p.manager => *n += 1,
                _ => out.push((p.manager, 1)),
            }
        }
        out
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn assemble_sorts_and_deduplicates() {
        let snap = SystemSnapshot::assemble(
            host("atlas", "ana"),
            Utc::now(),
            SnapshotParts {
                packages: vec![
                    package(ManagerKind::Pacman, "zsh", "5.9-5"),
                    package(ManagerKind::Apt, "zsh", "5.9-6"),
                    package(ManagerKind::Pacman, "zsh", "5.9-4"),
                ],
                ..SnapshotParts::default()
            },
        );
        let ids: Vec<_> = snap.packages.iter().map(PackageRecord::identity).collect();
        assert_eq!(ids, vec![(ManagerKind::Apt, "zsh"), (ManagerKind::Pacman, "zsh")]);
        assert_eq!(snap.packages[1].version, "5.9-5");
        assert_eq!(
            snap.package_counts(),
            vec![(ManagerKind::Apt, 1), (ManagerKind::Pacman, 1)]
        );
    }

    #[test]
    fn snapshot_json_round_trip() {
        let snap = sample();
        let json = serde_json::to_string(&snap).expect("encode");
        let back: SystemSnapshot = serde_json::from_str(&json).expect("decode");
        assert_eq!(back, snap);
        assert!(SystemSnapshot::empty(snap.host.clone()).packages.is_empty());
    }
}
