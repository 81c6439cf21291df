//! Integration tests for cross-backend package name resolution.
//!
//! Tests cover:
//! - Override file created by `edit-mappings` and loaded by the resolver
//! - Tier order: identity, override, built-in, normalized, similarity
//! - Degradation to built-in mappings on a malformed override file

mod common;

use std::collections::BTreeSet;

use migrator::distro::DistroFamily;
use migrator::equivalence::{MatchTier, PackageIndex};
use migrator::error::Result;
use migrator::managers::ManagerKind::{Apt, Dnf, Pacman};
use migrator::ops;

use common::{context, host};

/// Destination index backed by fixed name lists.
struct FixedIndex {
    names: BTreeSet<String>,
    search_hits: Vec<String>,
}

impl FixedIndex {
    fn new(names: &[&str], search_hits: &[&str]) -> Self {
        Self {
            names: names.iter().map(ToString::to_string).collect(),
            search_hits: search_hits.iter().map(ToString::to_string).collect(),
        }
    }
}

impl PackageIndex for FixedIndex {
    fn available(&self, name: &str) -> Result<bool> {
        Ok(self.names.contains(name))
    }

    fn search(&self, _term: &str) -> Result<Vec<String>> {
        Ok(self.search_hits.clone())
    }
}

#[test]
/// What: Overrides written after `edit-mappings` win over the built-in table.
///
/// Inputs:
/// - Skeleton created by `edit_mappings`, then replaced with a `vim` entry
///   naming only the dnf package.
///
/// Output:
/// - apt vim resolves to dnf `vim-minimal` by override and to pacman `vim`
///   by the built-in table; g++ still maps to pacman gcc.
fn integration_override_file_wins() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let ctx = context(tmp.path(), host("atlas", "ana", "ubuntu", DistroFamily::Debian));

    let first = ops::edit_mappings(&ctx).expect("skeleton");
    assert!(first.created);
    assert!(!ops::edit_mappings(&ctx).expect("exists").created);
    let (_, warnings) = ops::load_resolver(&ctx);
    assert!(warnings.is_empty(), "skeleton loads cleanly: {warnings:?}");

    std::fs::write(&first.path, r#"{"vim": {"dnf": "vim-minimal"}}"#).expect("write");
    let (resolver, warnings) = ops::load_resolver(&ctx);
    assert!(warnings.is_empty());
    let none = FixedIndex::new(&[], &[]);

    let dnf = resolver.resolve(Apt, "vim", Dnf, &none).expect("dnf");
    assert_eq!(dnf.name, "vim-minimal");
    assert_eq!(dnf.tier, MatchTier::Override);
    let pacman = resolver.resolve(Apt, "vim", Pacman, &none).expect("pacman");
    assert_eq!(pacman.name, "vim");
    assert_eq!(pacman.tier, MatchTier::BuiltIn);
    let gxx = resolver.resolve(Apt, "g++", Pacman, &none).expect("g++");
    assert_eq!((gxx.name.as_str(), gxx.tier), ("gcc", MatchTier::BuiltIn));
}

#[test]
/// What: Names outside the tables fall through to conventions and search.
///
/// Inputs:
/// - Pacman index holding `libssl` and `python-requests`, and a search that
///   returns `neovim-qt5` among unrelated names.
///
/// Output:
/// - `libssl-dev` and `python3-requests` resolve by naming convention,
///   `neovim-qt` by similarity, a same-backend name by identity, and an
///   unknown name fails with `EquivalenceNotFound`.
fn integration_fallback_tiers() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let ctx = context(tmp.path(), host("atlas", "ana", "ubuntu", DistroFamily::Debian));
    let (resolver, _) = ops::load_resolver(&ctx);
    let index = FixedIndex::new(
        &["libssl", "python-requests"],
        &["neovim", "neovim-qt5", "vim"],
    );

    let dev = resolver.resolve(Apt, "libssl-dev", Pacman, &index).expect("dev");
    assert_eq!((dev.name.as_str(), dev.tier), ("libssl", MatchTier::Normalized));
    let py = resolver
        .resolve(Apt, "python3-requests", Pacman, &index)
        .expect("python");
    assert_eq!(py.name, "python-requests");

    let similar = resolver.resolve(Apt, "neovim-qt", Pacman, &index).expect("similar");
    assert_eq!(similar.name, "neovim-qt5");
    assert!(matches!(similar.tier, MatchTier::Similarity { score } if score >= 0.75));

    let same = resolver.resolve(Apt, "anything", Apt, &index).expect("identity");
    assert_eq!(same.tier, MatchTier::Identity);

    let empty = FixedIndex::new(&[], &[]);
    let err = resolver
        .resolve(Apt, "frobnicator", Pacman, &empty)
        .expect_err("unknown");
    assert_eq!(err.kind(), "equivalence-not-found");
}

#[test]
/// What: A malformed override file degrades to the built-in table with a warning.
///
/// Inputs:
/// - Override file holding invalid JSON.
///
/// Output:
/// - One warning; built-in mappings still resolve.
fn integration_malformed_overrides_degrade() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let ctx = context(tmp.path(), host("atlas", "ana", "ubuntu", DistroFamily::Debian));
    let path = ops::edit_mappings(&ctx).expect("skeleton").path;
    std::fs::write(&path, "{ not json").expect("write");

    let (resolver, warnings) = ops::load_resolver(&ctx);
    assert_eq!(warnings.len(), 1);
    let none = FixedIndex::new(&[], &[]);
    let chromium = resolver
        .resolve(Apt, "chromium-browser", Dnf, &none)
        .expect("built-in");
    assert_eq!(chromium.name, "chromium");
}
