//! Cross-backend package name resolution.
//!
//! Resolution runs in fixed tiers and stops at the first hit:
//! 1. user override table (exact)
//! 2. built-in table (exact)
//! 3. normalized name and naming-convention rewrites, looked up in both
//!    tables and then confirmed against the target index
//! 4. similarity search over the target index
//!
//! Nothing below the similarity floor is ever returned; callers get
//! `EquivalenceNotFound` instead.

pub mod builtin;
pub mod normalize;
pub mod overrides;
pub mod similarity;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MigratorError, Result};
use crate::managers::{Adapter, ManagerKind};

/// Package name → per-backend names.
pub type MappingTable = BTreeMap<String, BTreeMap<ManagerKind, String>>;

/// Read-only view of a target backend's package index.
pub trait PackageIndex {
    /// Whether `name` can be installed.
    ///
    /// # Errors
    /// - Backend query failures.
    fn available(&self, name: &str) -> Result<bool>;

    /// Names related to `term`.
    ///
    /// # Errors
    /// - Backend query failures, or `Unsupported`.
    fn search(&self, term: &str) -> Result<Vec<String>>;
}

impl PackageIndex for Adapter {
    fn available(&self, name: &str) -> Result<bool> {
        Ok(!self.query_available(name)?.is_empty())
    }

    fn search(&self, term: &str) -> Result<Vec<String>> {
        Self::search(self, term)
    }
}

/// Which tier produced a resolution.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "tier")]
pub enum MatchTier {
    /// Same backend; the name is kept.
    Identity,
    /// User override table.
    Override,
    /// Built-in table.
    BuiltIn,
    /// Normalized or convention-rewritten name.
    Normalized,
    /// Similarity search.
    Similarity {
        /// Score of the accepted candidate.
        score: f64,
    },
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => f.write_str("identity"),
            Self::Override => f.write_str("override"),
            Self::BuiltIn => f.write_str("built-in"),
            Self::Normalized => f.write_str("normalized"),
            Self::Similarity { score } => write!(f, "similarity {score:.2}"),
        }
    }
}

/// A resolved target name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// Name on the target backend.
    pub name: String,
    /// How it was found.
    #[serde(flatten)]
    pub tier: MatchTier,
}

/// What: Look `name` up in a mapping table.
///
/// Inputs:
/// - `table`: Mapping table.
/// - `from`, `name`, `to`: Source backend, source name, target backend.
///
/// Output:
/// - Target name when an entry is keyed by `name` or lists `name` for `from`.
fn lookup(table: &MappingTable, from: ManagerKind, name: &str, to: ManagerKind) -> Option<String> {
    let lower = name.to_lowercase();
    if let Some(target) = table.get(&lower).and_then(|m| m.get(&to)) {
        return Some(target.clone());
    }
    table
        .values()
        .find(|m| m.get(&from).is_some_and(|n| n.eq_ignore_ascii_case(name)))
        .and_then(|m| m.get(&to).cloned())
}

/// Deterministic, tiered name resolver.
#[derive(Clone, Debug, Default)]
pub struct Resolver {
    overrides: MappingTable,
    builtin: MappingTable,
}

impl Resolver {
    /// What: Build a resolver over user overrides and the built-in table.
    ///
    /// Inputs:
    /// - `overrides`: Loaded override table.
    ///
    /// Output:
    /// - Resolver; override entries win per backend over built-in ones.
    #[must_use]
    pub fn new(overrides: MappingTable) -> Self {
        Self {
            overrides,
            builtin: builtin::table(),
        }
    }

    /// Resolver with the built-in table only.
    #[must_use]
    pub fn builtin_only() -> Self {
        Self::new(MappingTable::new())
    }

    /// Overrides merged over the built-in table, per backend.
    #[must_use]
    pub fn merged(&self) -> MappingTable {
        let mut out = self.builtin.clone();
        for (name, per_kind) in &self.overrides {
            out.entry(name.clone())
                .or_default()
                .extend(per_kind.iter().map(|(k, v)| (*k, v.clone())));
        }
        out
    }

    /// What: Resolve `name` from backend `from` to backend `to`.
    ///
    /// Inputs:
    /// - `from`: Backend the package was captured on.
    /// - `name`: Captured name.
    /// - `to`: Destination backend.
    /// - `index`: Destination index used by tiers 3 and 4.
    ///
    /// Output:
    /// - Resolution naming the tier that matched.
    ///
    /// # Errors
    /// - `EquivalenceNotFound` when no tier matches.
    /// - Index query errors other than `Unsupported` (`QueryTimeout`, `Cancelled`, ...).
    pub fn resolve(
        &self,
        from: ManagerKind,
        name: &str,
        to: ManagerKind,
        index: &dyn PackageIndex,
    ) -> Result<Resolution> {
        if from == to {
            return Ok(Resolution {
                name: name.to_string(),
                tier: MatchTier::Identity,
            });
        }
        if let Some(hit) = lookup(&self.overrides, from, name, to) {
            return Ok(Resolution {
                name: hit,
                tier: MatchTier::Override,
            });
        }
        if let Some(hit) = lookup(&self.builtin, from, name, to) {
            return Ok(Resolution {
                name: hit,
                tier: MatchTier::BuiltIn,
            });
        }

        let normalized = normalize::normalize(name);
        let mut candidates = vec![normalized.clone()];
        candidates.extend(normalize::rewrite(from, &normalized, to));
        let merged = self.merged();
        for candidate in &candidates {
            if let Some(hit) = lookup(&merged, from, candidate, to) {
                return Ok(Resolution {
                    name: hit,
                    tier: MatchTier::Normalized,
                });
            }
        }
        for candidate in &candidates {
            if normalize::is_too_generic(candidate) {
                continue;
            }
            match index.available(candidate) {
                Ok(true) => {
                    return Ok(Resolution {
                        name: candidate.clone(),
                        tier: MatchTier::Normalized,
                    });
                }
                Ok(false) | Err(MigratorError::Unsupported { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        let not_found = || MigratorError::EquivalenceNotFound {
            name: name.to_string(),
            from,
            to,
        };
        if normalize::is_too_generic(&normalized) {
            return Err(not_found());
        }
        let hits = match index.search(&normalized) {
            Ok(hits) => hits,
            Err(MigratorError::Unsupported { .. }) => return Err(not_found()),
            Err(e) => return Err(e),
        };
        let best = similarity::best_match(&normalized, &hits).ok_or_else(not_found)?;
        tracing::debug!(
            source = %name,
            target = %best.name,
            score = best.score,
            "similarity match"
        );
        Ok(Resolution {
            name: best.name,
            tier: MatchTier::Similarity { score: best.score },
        })
    }
}
