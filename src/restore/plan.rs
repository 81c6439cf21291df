//! Read-only restore planning.
//!
//! Every item of an artifact gets exactly one [`Disposition`]. Planning never
//! mutates the destination; it only queries package indexes (through the
//! availability cache) and reads destination files.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::cache::AvailabilityCache;
use super::policy::select_version;
use super::{Phase, RestoreOptions, TransformMode};
use crate::backup::{BackupArtifact, CapturedFile, FileContent};
use crate::context::Context;
use crate::equivalence::{MatchTier, Resolver};
use crate::error::{MigratorError, Result};
use crate::fstab::{FstabEntry, read_fstab};
use crate::managers::{Adapter, ManagerKind, PackageRecord, Registry, RepositoryRecord};
use crate::pathvars::{HostIdentity, PathTransform, resolve};

/// What a restore intends to do with one item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Disposition {
    /// Will be installed, written, added or appended.
    WillApply,
    /// Cannot be used on this destination.
    SkippedIncompatible,
    /// Destination already holds a differing file.
    Conflict,
    /// No package or version satisfies the request.
    Unavailable,
    /// Destination already matches.
    AlreadySatisfied,
}

impl Disposition {
    /// Every disposition.
    pub const ALL: [Self; 5] = [
        Self::WillApply,
        Self::SkippedIncompatible,
        Self::Conflict,
        Self::Unavailable,
        Self::AlreadySatisfied,
    ];

    /// Kebab-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WillApply => "will-apply",
            Self::SkippedIncompatible => "skipped-incompatible",
            Self::Conflict => "conflict",
            Self::Unavailable => "unavailable",
            Self::AlreadySatisfied => "already-satisfied",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The mutation behind a `will-apply` item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum PlanAction {
    /// Install a package.
    Install {
        /// Destination backend.
        manager: ManagerKind,
        /// Name on the destination backend.
        name: String,
        /// Version to request; `None` lets the backend choose.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<String>,
        /// Remote or channel hint.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        repository: Option<String>,
        /// How the name was found.
        tier: MatchTier,
    },
    /// Write a config file.
    WriteConfig {
        /// Logical destination path.
        path: String,
        /// Bytes to write.
        #[serde(skip)]
        content: Vec<u8>,
        /// An existing differing file is replaced.
        overwrite: bool,
    },
    /// Add a repository definition.
    AddRepository {
        /// Captured definition.
        repository: RepositoryRecord,
    },
    /// Append a mount-table line.
    AppendMount {
        /// Portable entry.
        entry: FstabEntry,
    },
}

/// One dispositioned plan item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanItem {
    /// Owning phase.
    pub phase: Phase,
    /// What the item is about (`apt:vim`, a path, a repository id, a mount point).
    pub subject: String,
    /// Decision.
    pub disposition: Disposition,
    /// Mutation for `will-apply` items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<PlanAction>,
    /// Reason or caveat shown to the operator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl PlanItem {
    /// Item without an action.
    fn decided(phase: Phase, subject: String, disposition: Disposition, note: impl Into<String>) -> Self {
        Self {
            phase,
            subject,
            disposition,
            action: None,
            note: Some(note.into()),
        }
    }

    /// `will-apply` item.
    fn apply(phase: Phase, subject: String, action: PlanAction, note: Option<String>) -> Self {
        Self {
            phase,
            subject,
            disposition: Disposition::WillApply,
            action: Some(action),
            note,
        }
    }
}

/// The whole plan for one artifact on one destination.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RestorePlan {
    /// Host the artifact came from.
    pub source_host: String,
    /// Host being restored.
    pub destination_host: String,
    /// Items in phase order.
    pub items: Vec<PlanItem>,
    /// Plan-level notes (ambiguous transforms, missing backends).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl RestorePlan {
    /// Items with `disposition`.
    #[must_use]
    pub fn count(&self, disposition: Disposition) -> usize {
        self.items.iter().filter(|i| i.disposition == disposition).count()
    }

    /// Items of one phase.
    pub fn phase(&self, phase: Phase) -> impl Iterator<Item = &PlanItem> {
        self.items.iter().filter(move |i| i.phase == phase)
    }

    /// Item for `subject` within `phase`.
    #[must_use]
    pub fn find(&self, phase: Phase, subject: &str) -> Option<&PlanItem> {
        self.phase(phase).find(|i| i.subject == subject)
    }
}

/// Destination facts gathered once before planning.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Destination {
    /// Installed packages → version.
    pub installed: BTreeMap<(ManagerKind, String), String>,
    /// Configured repositories.
    pub repositories: Vec<RepositoryRecord>,
    /// Existing mount table.
    pub fstab: Vec<FstabEntry>,
    /// Problems gathering the above.
    pub warnings: Vec<String>,
}

impl Destination {
    /// What: Read installed packages, repositories and the mount table.
    ///
    /// Inputs:
    /// - `ctx`: Destination context.
    /// - `registry`: Destination backends.
    ///
    /// Output:
    /// - Facts; failures of one source become warnings.
    #[must_use]
    pub fn gather(ctx: &Context, registry: &Registry) -> Self {
        let mut dest = Self::default();
        for adapter in registry.adapters() {
            let kind = adapter.kind();
            match adapter.list_installed() {
                Ok(listing) => {
                    for p in listing.packages {
                        dest.installed.insert((kind, p.name), p.version);
                    }
                }
                Err(e) => {
                    tracing::warn!(manager = %kind, error = %e, "cannot list destination packages");
                    dest.warnings.push(format!("{kind}: installed packages unknown: {e}"));
                }
            }
            match adapter.list_repositories() {
                Ok(repos) => dest.repositories.extend(repos),
                Err(e) => {
                    tracing::warn!(manager = %kind, error = %e, "cannot list destination repositories");
                    dest.warnings.push(format!("{kind}: repositories unknown: {e}"));
                }
            }
        }
        match read_fstab(&ctx.on_root(Path::new("/etc/fstab"))) {
            Ok(parsed) => dest.fstab = parsed.entries,
            Err(e) => dest.warnings.push(format!("/etc/fstab: {e}")),
        }
        dest
    }
}

/// Everything planning needs about the destination.
#[derive(Clone, Copy, Debug)]
pub struct Planner<'a> {
    /// Destination context.
    pub ctx: &'a Context,
    /// Destination backends.
    pub registry: &'a Registry,
    /// Name resolver with loaded overrides.
    pub resolver: &'a Resolver,
    /// Per-operation availability cache.
    pub cache: &'a AvailabilityCache,
    /// Destination facts.
    pub destination: &'a Destination,
}

/// Decision for one package before it becomes a [`PlanItem`].
type Decision = (Disposition, Option<PlanAction>, Option<String>);

impl Planner<'_> {
    /// What: Build the plan for `artifact`.
    ///
    /// Inputs:
    /// - `artifact`: Backup to restore.
    /// - `options`: Phase selection and policies.
    ///
    /// Output:
    /// - Plan covering every item of every included phase.
    ///
    /// # Errors
    /// - `Cancelled` when the context token fires.
    pub fn plan(&self, artifact: &BackupArtifact, options: &RestoreOptions) -> Result<RestorePlan> {
        let mut plan = RestorePlan {
            source_host: artifact.hostname.clone(),
            destination_host: self.ctx.host.hostname.clone(),
            items: Vec::new(),
            warnings: self.destination.warnings.clone(),
        };
        for phase in super::Phase::ALL {
            if !options.includes(phase) {
                continue;
            }
            self.ctx.cancel.check()?;
            match phase {
                Phase::Repositories => self.plan_repositories(artifact, options, &mut plan),
                Phase::Packages => self.plan_packages(artifact, options, &mut plan)?,
                Phase::Configs => self.plan_configs(artifact, options, &mut plan),
                Phase::Fstab => self.plan_mounts(artifact, &mut plan),
            }
        }
        tracing::info!(
            source = %plan.source_host,
            items = plan.items.len(),
            will_apply = plan.count(Disposition::WillApply),
            unavailable = plan.count(Disposition::Unavailable),
            conflicts = plan.count(Disposition::Conflict),
            "restore plan built"
        );
        Ok(plan)
    }

    /// What: Destination backend for packages of `source`.
    ///
    /// Output:
    /// - Same backend when operable, else the native backend for native
    ///   sources; `Err(reason)` otherwise.
    fn target_for(&self, source: ManagerKind) -> std::result::Result<&Adapter, String> {
        target_adapter(self.registry, source)
    }

    /// Plan every wanted package in identity order; dependency installs are left to the backend.
    fn plan_packages(
        &self,
        artifact: &BackupArtifact,
        options: &RestoreOptions,
        plan: &mut RestorePlan,
    ) -> Result<()> {
        let skipped = artifact.snapshot.packages.len() - artifact.snapshot.wanted_packages().count();
        if skipped > 0 {
            tracing::debug!(count = skipped, "dependency packages left out of the plan");
        }
        let mut wanted: Vec<&PackageRecord> = artifact.snapshot.wanted_packages().collect();
        wanted.sort_by(|a, b| a.identity().cmp(&b.identity()));
        for pkg in wanted {
            self.ctx.cancel.check()?;
            let (disposition, action, note) = self.decide_package(pkg, options)?;
            plan.items.push(PlanItem {
                phase: Phase::Packages,
                subject: format!("{}:{}", pkg.manager, pkg.name),
                disposition,
                action,
                note,
            });
        }
        Ok(())
    }

    /// What: Disposition of one package.
    ///
    /// # Errors
    /// - `Cancelled` only; every other failure becomes `unavailable`.
    fn decide_package(&self, pkg: &PackageRecord, options: &RestoreOptions) -> Result<Decision> {
        let unavailable = |e: &MigratorError| (Disposition::Unavailable, None, Some(e.to_string()));
        let target = match self.target_for(pkg.manager) {
            Ok(a) => a,
            Err(reason) => return Ok((Disposition::SkippedIncompatible, None, Some(reason))),
        };
        let to = target.kind();
        if let Some(installed) = self.destination.installed.get(&(to, pkg.name.clone())) {
            return Ok((
                Disposition::AlreadySatisfied,
                None,
                Some(format!("{to}:{} {installed} installed", pkg.name)),
            ));
        }
        let index = self.cache.index(target);
        let resolution = match self.resolver.resolve(pkg.manager, &pkg.name, to, &index) {
            Ok(r) => r,
            Err(MigratorError::Cancelled) => return Err(MigratorError::Cancelled),
            Err(e) => return Ok(unavailable(&e)),
        };
        let subject_note = (resolution.tier != MatchTier::Identity)
            .then(|| format!("{to}:{} via {}", resolution.name, resolution.tier));
        if let Some(installed) = self.destination.installed.get(&(to, resolution.name.clone())) {
            return Ok((
                Disposition::AlreadySatisfied,
                None,
                Some(format!("{to}:{} {installed} installed", resolution.name)),
            ));
        }

        let version = match self.cache.versions(target, &resolution.name) {
            Ok(versions) if versions.is_empty() => {
                let e = MigratorError::EquivalenceNotFound {
                    name: resolution.name,
                    from: pkg.manager,
                    to,
                };
                return Ok(unavailable(&e));
            }
            Ok(versions) => match select_version(
                &resolution.name,
                &pkg.version,
                &versions,
                options.version_policy,
                options.allow_downgrade,
                to != pkg.manager,
            ) {
                Ok(v) => Some(v),
                Err(e) => return Ok(unavailable(&e)),
            },
            Err(MigratorError::Unsupported { .. }) => None,
            Err(MigratorError::Cancelled) => return Err(MigratorError::Cancelled),
            Err(e) => return Ok(unavailable(&e)),
        };
        let repository = (to == pkg.manager).then(|| pkg.repository.clone()).flatten();
        Ok((
            Disposition::WillApply,
            Some(PlanAction::Install {
                manager: to,
                name: resolution.name,
                version,
                repository,
                tier: resolution.tier,
            }),
            subject_note,
        ))
    }

    /// Plan captured files, and list the config entries that were never captured.
    fn plan_configs(&self, artifact: &BackupArtifact, options: &RestoreOptions, plan: &mut RestorePlan) {
        let source = artifact.snapshot.host.identity();
        let dest = self.ctx.host.identity();
        let transform = PathTransform::new(source.clone());
        for entry in &artifact.snapshot.configs {
            if let Some(file) = artifact.file(&entry.path) {
                for var in &file.ambiguous {
                    plan.warnings
                        .push(format!("{}: {}", file.path, transform.ambiguity(*var)));
                }
                plan.items
                    .push(self.decide_config(file, options, &source, &dest));
                continue;
            }
            let reason = if entry.sensitive {
                "sensitive; content is never backed up".to_string()
            } else if !entry.portable {
                entry
                    .warning
                    .clone()
                    .unwrap_or_else(|| "bound to the source host".to_string())
            } else {
                "content missing from backup".to_string()
            };
            let disposition = if entry.sensitive || !entry.portable {
                Disposition::SkippedIncompatible
            } else {
                Disposition::Unavailable
            };
            plan.items.push(PlanItem::decided(
                Phase::Configs,
                entry.path.clone(),
                disposition,
                reason,
            ));
        }
    }

    /// Disposition of one captured file.
    fn decide_config(
        &self,
        file: &CapturedFile,
        options: &RestoreOptions,
        source: &HostIdentity,
        dest: &HostIdentity,
    ) -> PlanItem {
        let identity = match options.path_transform {
            TransformMode::Off => source,
            TransformMode::On | TransformMode::Preview => dest,
        };
        let path = resolve(&file.tokenized_path, identity);
        let content = match &file.content {
            FileContent::Text { text } if file.collision => text.clone().into_bytes(),
            FileContent::Text { text } => resolve(text, identity).into_bytes(),
            FileContent::Binary { bytes } => bytes.clone(),
        };
        let write = |overwrite: bool| PlanAction::WriteConfig {
            path: path.clone(),
            content: content.clone(),
            overwrite,
        };
        match std::fs::read(self.ctx.on_root(Path::new(&path))) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                PlanItem::apply(Phase::Configs, path.clone(), write(false), None)
            }
            Ok(existing) if existing == content => PlanItem::decided(
                Phase::Configs,
                path.clone(),
                Disposition::AlreadySatisfied,
                "identical file present",
            ),
            Ok(_) if options.overwrite_conflicts || options.confirmed.contains(&path) => {
                PlanItem::apply(
                    Phase::Configs,
                    path.clone(),
                    write(true),
                    Some("replaces a differing file".into()),
                )
            }
            Ok(_) => PlanItem::decided(
                Phase::Configs,
                path.clone(),
                Disposition::Conflict,
                MigratorError::RestoreConflict {
                    path: path.clone().into(),
                }
                .to_string(),
            ),
            Err(e) => PlanItem::decided(
                Phase::Configs,
                path.clone(),
                Disposition::Conflict,
                format!("existing file unreadable: {e}"),
            ),
        }
    }

    /// Plan repositories by backend presence and distribution compatibility.
    fn plan_repositories(&self, artifact: &BackupArtifact, options: &RestoreOptions, plan: &mut RestorePlan) {
        let distro = &self.ctx.host.distro;
        for repo in &artifact.snapshot.repositories {
            let subject = format!("{}:{}", repo.manager, repo.id);
            if self.registry.get(repo.manager).is_none() {
                plan.items.push(PlanItem::decided(
                    Phase::Repositories,
                    subject,
                    Disposition::SkippedIncompatible,
                    format!("{} is not available on destination", repo.manager),
                ));
                continue;
            }
            let present = self
                .destination
                .repositories
                .iter()
                .any(|r| r.manager == repo.manager && (r.id == repo.id || r.uri == repo.uri));
            if present {
                plan.items.push(PlanItem::decided(
                    Phase::Repositories,
                    subject,
                    Disposition::AlreadySatisfied,
                    "already configured",
                ));
                continue;
            }
            let action = PlanAction::AddRepository {
                repository: repo.clone(),
            };
            if repo.compat.matches(distro) {
                plan.items.push(PlanItem::apply(Phase::Repositories, subject, action, None));
            } else if options.force_repos {
                let caveat = format!("forced: built for {}", compat_label(repo));
                plan.items
                    .push(PlanItem::apply(Phase::Repositories, subject, action, Some(caveat)));
            } else {
                plan.items.push(PlanItem::decided(
                    Phase::Repositories,
                    subject,
                    Disposition::SkippedIncompatible,
                    format!("built for {}", compat_label(repo)),
                ));
            }
        }
    }

    /// Plan portable mounts not already present on the destination.
    fn plan_mounts(&self, artifact: &BackupArtifact, plan: &mut RestorePlan) {
        for entry in &artifact.snapshot.fstab {
            let subject = entry.mount_point.clone();
            if !entry.is_portable() {
                plan.items.push(PlanItem::decided(
                    Phase::Fstab,
                    subject,
                    Disposition::SkippedIncompatible,
                    format!("hardware-bound ({})", entry.spec),
                ));
            } else if self
                .destination
                .fstab
                .iter()
                .any(|e| e.mount_point == entry.mount_point)
            {
                plan.items.push(PlanItem::decided(
                    Phase::Fstab,
                    subject,
                    Disposition::AlreadySatisfied,
                    "mount point already in fstab",
                ));
            } else {
                plan.items.push(PlanItem::apply(
                    Phase::Fstab,
                    subject,
                    PlanAction::AppendMount {
                        entry: entry.clone(),
                    },
                    None,
                ));
            }
        }
    }
}

/// Human label for a repository's compatibility tag.
fn compat_label(repo: &RepositoryRecord) -> String {
    match &repo.compat {
        crate::managers::RepoCompat::Portable => "any distribution".to_string(),
        crate::managers::RepoCompat::Family { family, release } => match release {
            Some(r) => format!("{family} {r}"),
            None => family.to_string(),
        },
    }
}

/// What: Destination backend that receives packages captured on `source`.
///
/// Inputs:
/// - `registry`: Destination backends.
/// - `source`: Backend the package was captured on.
///
/// Output:
/// - Same backend when operable, else the native backend for native
///   sources; `Err(reason)` otherwise.
pub fn target_adapter(registry: &Registry, source: ManagerKind) -> std::result::Result<&Adapter, String> {
    if source == ManagerKind::AppImage {
        return Err("AppImages are copied by hand, not installed".into());
    }
    if let Some(a) = registry.get(source) {
        return Ok(a);
    }
    if source.is_native() {
        return registry
            .native()
            .ok_or_else(|| "no system package manager on destination".to_string());
    }
    Err(format!("{source} is not available on destination"))
}
