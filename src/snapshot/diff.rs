//! Pure set difference between two snapshots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::SystemSnapshot;
use crate::fstab::FstabEntry;
use crate::managers::{ManagerKind, PackageRecord, RepositoryRecord};

/// A package present in both snapshots with a different version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionChange {
    /// Backend.
    pub manager: ManagerKind,
    /// Package name.
    pub name: String,
    /// Version in the older snapshot.
    pub from: String,
    /// Version in the newer snapshot.
    pub to: String,
}

/// Differences from an old snapshot to a new one, each list sorted by identity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDiff {
    /// Packages only in the new snapshot.
    pub packages_added: Vec<PackageRecord>,
    /// Packages only in the old snapshot.
    pub packages_removed: Vec<PackageRecord>,
    /// Packages whose version changed.
    pub packages_changed: Vec<VersionChange>,
    /// Config paths only in the new snapshot.
    pub configs_added: Vec<String>,
    /// Config paths only in the old snapshot.
    pub configs_removed: Vec<String>,
    /// Config paths whose content fingerprint changed.
    pub configs_changed: Vec<String>,
    /// Repositories only in the new snapshot.
    pub repositories_added: Vec<RepositoryRecord>,
    /// Repositories only in the old snapshot.
    pub repositories_removed: Vec<RepositoryRecord>,
    /// Mount entries only in the new snapshot.
    pub fstab_added: Vec<FstabEntry>,
    /// Mount entries only in the old snapshot.
    pub fstab_removed: Vec<FstabEntry>,
}

impl SnapshotDiff {
    /// Whether nothing changed in any category.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages_added.is_empty()
            && self.packages_removed.is_empty()
            && self.packages_changed.is_empty()
            && self.configs_added.is_empty()
            && self.configs_removed.is_empty()
            && self.configs_changed.is_empty()
            && self.repositories_added.is_empty()
            && self.repositories_removed.is_empty()
            && self.fstab_added.is_empty()
            && self.fstab_removed.is_empty()
    }

    /// Total number of reported differences.
    #[must_use]
    pub fn len(&self) -> usize {
        self.packages_added.len()
            + self.packages_removed.len()
            + self.packages_changed.len()
            + self.configs_added.len()
            + self.configs_removed.len()
            + self.configs_changed.len()
            + self.repositories_added.len()
            + self.repositories_removed.len()
            + self.fstab_added.len()
            + self.fstab_removed.len()
    }

    /// What: The same diff seen from the other direction.
    ///
    /// Output:
    /// - Added and removed exchanged; version changes reversed.
    #[must_use]
    pub fn swapped(self) -> Self {
        Self {
            packages_added: self.packages_removed,
            packages_removed: self.packages_added,
            packages_changed: self
                .packages_changed
                .into_iter()
                .map(|c| VersionChange {
                    from: c.to,
                    to: c.from,
                    ..c
                })
                .collect(),
            configs_added: self.configs_removed,
            configs_removed: self.configs_added,
            configs_changed: self.configs_changed,
            repositories_added: self.repositories_removed,
            repositories_removed: self.repositories_added,
            fstab_added: self.fstab_removed,
            fstab_removed: self.fstab_added,
        }
    }
}

/// What: Split two keyed collections into only-new and only-old items.
///
/// Inputs:
/// - `old`, `new`: Items keyed by identity.
///
/// Output:
/// - `(added, removed)` in key order.
fn split<K: Ord, V: Clone>(old: &BTreeMap<K, V>, new: &BTreeMap<K, V>) -> (Vec<V>, Vec<V>) {
    let added = new
        .iter()
        .filter(|(k, _)| !old.contains_key(k))
        .map(|(_, v)| v.clone())
        .collect();
    let removed = old
        .iter()
        .filter(|(k, _)| !new.contains_key(k))
        .map(|(_, v)| v.clone())
        .collect();
    (added, removed)
}

/// What: Compute the difference from `old` to `new`.
///
/// Inputs:
/// - `old`: Earlier snapshot.
/// - `new`: Later snapshot.
///
/// Output:
/// - Differences per category, sorted by identity.
///
/// Details:
/// - Packages are keyed by `(manager, name)`, configs by path, repositories by
///   `(manager, id, uri)`, mounts by all four fstab fields. A config changes
///   when its hash or size changes; mtime alone is not a change.
#[must_use]
pub fn diff(old: &SystemSnapshot, new: &SystemSnapshot) -> SnapshotDiff {
    let old_pkgs: BTreeMap<_, _> = old.packages.iter().map(|p| (p.identity(), p)).collect();
    let new_pkgs: BTreeMap<_, _> = new.packages.iter().map(|p| (p.identity(), p)).collect();
    let (packages_added, packages_removed) = split(&old_pkgs, &new_pkgs);
    let packages_changed = new_pkgs
        .iter()
        .filter_map(|(k, n)| {
            let o = old_pkgs.get(k)?;
            (o.version != n.version).then(|| VersionChange {
                manager: n.manager,
                name: n.name.clone(),
                from: o.version.clone(),
                to: n.version.clone(),
            })
        })
        .collect();

    let old_cfg: BTreeMap<_, _> = old.configs.iter().map(|c| (c.path.as_str(), c)).collect();
    let new_cfg: BTreeMap<_, _> = new.configs.iter().map(|c| (c.path.as_str(), c)).collect();
    let (configs_added, configs_removed): (Vec<_>, Vec<_>) = split(&old_cfg, &new_cfg);
    let configs_changed = new_cfg
        .iter()
        .filter(|(k, n)| {
            old_cfg.get(*k).is_some_and(|o| match (&o.fingerprint, &n.fingerprint) {
                (Some(a), Some(b)) => !a.same_content(b),
                (None, None) => false,
                _ => true,
            })
        })
        .map(|(k, _)| (*k).to_string())
        .collect();

    let repo_key = |r: &RepositoryRecord| (r.manager, r.id.clone(), r.uri.clone());
    let old_repos: BTreeMap<_, _> = old.repositories.iter().map(|r| (repo_key(r), r)).collect();
    let new_repos: BTreeMap<_, _> = new.repositories.iter().map(|r| (repo_key(r), r)).collect();
    let (repositories_added, repositories_removed) = split(&old_repos, &new_repos);

    let old_mounts: BTreeMap<_, _> = old.fstab.iter().map(|e| (e.identity(), e)).collect();
    let new_mounts: BTreeMap<_, _> = new.fstab.iter().map(|e| (e.identity(), e)).collect();
    let (fstab_added, fstab_removed) = split(&old_mounts, &new_mounts);

    SnapshotDiff {
        packages_added: packages_added.into_iter().cloned().collect(),
        packages_removed: packages_removed.into_iter().cloned().collect(),
        packages_changed,
        configs_added: configs_added.into_iter().map(|c| c.path.clone()).collect(),
        configs_removed: configs_removed.into_iter().map(|c| c.path.clone()).collect(),
        configs_changed,
        repositories_added: repositories_added.into_iter().cloned().collect(),
        repositories_removed: repositories_removed.into_iter().cloned().collect(),
        fstab_added: fstab_added.into_iter().cloned().collect(),
        fstab_removed: fstab_removed.into_iter().cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::super::SnapshotParts;
    use super::super::fixtures::*;
    use super::*;

    fn changed_copy() -> SystemSnapshot {
        let base = sample();
        let mut packages = base.packages.clone();
        packages.retain(|p| p.name != "git");
        packages.push(package(ManagerKind::Apt, "htop", "3.3.0-4"));
        if let Some(vim) = packages.iter_mut().find(|p| p.name == "vim") {
            vim.version = "2:9.1.0016-1ubuntu8".into();
        }
        let mut configs = base.configs.clone();
        configs[0].fingerprint = Some(crate::tracking::Fingerprint::of_bytes(b"alias la='ls -a'\n"));
        configs.push(config("/home/ana/.gitconfig", b"[user]\n"));
        SystemSnapshot::assemble(
            base.host.clone(),
            base.captured_at,
            SnapshotParts {
                managers: base.managers.clone(),
                packages,
                repositories: Vec::new(),
                configs,
                fstab: vec![
                    base.fstab[0].clone(),
                    mount("//nas/media /mnt/media cifs credentials=/etc/nas 0 0"),
                ],
                warnings: Vec::new(),
            },
        )
    }

    #[test]
    fn identical_snapshots_have_empty_diff() {
        let s = sample();
        let d = diff(&s, &s);
        assert!(d.is_empty());
        assert_eq!(d.len(), 0);
    }

    /// What: Each category reports additions, removals and changes by identity.
    ///
    /// Inputs:
    /// - Sample snapshot and a copy with one package removed, one added, one
    ///   upgraded, one config edited, one config added, the repo dropped, one mount added.
    ///
    /// Output:
    /// - Exactly those differences.
    #[test]
    fn categories_are_reported() {
        let old = sample();
        let new = changed_copy();
        let d = diff(&old, &new);
        assert_eq!(d.packages_added.len(), 1);
        assert_eq!(d.packages_added[0].name, "htop");
        assert_eq!(d.packages_removed[0].name, "git");
        assert_eq!(d.packages_changed.len(), 1);
        assert_eq!(d.packages_changed[0].to, "2:9.1.0016-1ubuntu8");
        assert_eq!(d.configs_changed, vec!["/home/ana/.bashrc".to_string()]);
        assert_eq!(d.configs_added, vec!["/home/ana/.gitconfig".to_string()]);
        assert_eq!(d.repositories_removed.len(), 1);
        assert_eq!(d.fstab_added.len(), 1);
        assert_eq!(d.len(), 7);
    }

    #[test]
    fn reverse_diff_is_swapped() {
        let a = sample();
        let b = changed_copy();
        assert_eq!(diff(&b, &a), diff(&a, &b).swapped());
    }

    #[test]
    fn mtime_only_change_is_not_reported() {
        let old = sample();
        let mut new = old.clone();
        if let Some(fp) = new.configs[0].fingerprint.as_mut() {
            fp.mtime = Some(chrono::Utc::now());
        }
        assert!(diff(&old, &new).is_empty());
    }
}
