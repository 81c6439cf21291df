//! Version selection for packages being reinstalled.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MigratorError, Result};
use crate::util::version::compare_versions;

/// Which available version to request for a recorded one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersionPolicy {
    /// Only the recorded version.
    Exact,
    /// The recorded version, else the nearest newer one.
    PreferSame,
    /// The newest newer version, else the recorded one.
    #[default]
    PreferNewer,
    /// The newest available version, whatever was recorded.
    AlwaysNewest,
}

impl VersionPolicy {
    /// All policies in documentation order.
    pub const ALL: [Self; 4] = [
        Self::Exact,
        Self::PreferSame,
        Self::PreferNewer,
        Self::AlwaysNewest,
    ];

    /// Name used on the command line and in settings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::PreferSame => "prefer-same",
            Self::PreferNewer => "prefer-newer",
            Self::AlwaysNewest => "always-newest",
        }
    }
}

impl fmt::Display for VersionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VersionPolicy {
    type Err = MigratorError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s.trim())
            .ok_or_else(|| MigratorError::Config(format!("unknown version policy `{s}`")))
    }
}

/// What: Pick the version to install.
///
/// Inputs:
/// - `name`: Package name, for the error.
/// - `recorded`: Version captured on the source host.
/// - `available`: Versions the destination offers, any order.
/// - `policy`: Selection policy.
/// - `allow_downgrade`: Accept an older version when nothing else matches.
/// - `upstream_only`: Compare upstream versions only (cross-backend restores).
///
/// Output:
/// - The chosen version string, exactly as the backend reported it.
///
/// # Errors
/// - `VersionUnavailable` when nothing satisfies the policy.
///
/// Details:
/// - `always-newest` ignores `recorded` and `allow_downgrade`.
/// - A downgrade picks the newest of the older versions.
pub fn select_version(
    name: &str,
    recorded: &str,
    available: &[String],
    policy: VersionPolicy,
    allow_downgrade: bool,
    upstream_only: bool,
) -> Result<String> {
    let cmp = |a: &String, b: &String| compare_versions(a, b, upstream_only);
    let against = |v: &String| compare_versions(v, recorded, upstream_only);
    let same = available.iter().find(|v| against(v) == Ordering::Equal);
    let newer = || available.iter().filter(|v| against(v) == Ordering::Greater);
    let older = || {
        available
            .iter()
            .filter(|v| against(v) == Ordering::Less)
            .max_by(|a, b| cmp(a, b))
    };

    let chosen = match policy {
        VersionPolicy::AlwaysNewest => available.iter().max_by(|a, b| cmp(a, b)),
        VersionPolicy::Exact => same,
        VersionPolicy::PreferSame => same.or_else(|| newer().min_by(|a, b| cmp(a, b))),
        VersionPolicy::PreferNewer => newer().max_by(|a, b| cmp(a, b)).or(same),
    };
    let chosen = match chosen {
        Some(v) => Some(v),
        None if allow_downgrade && policy != VersionPolicy::Exact => older(),
        None => None,
    };
    chosen.cloned().ok_or_else(|| MigratorError::VersionUnavailable {
        name: name.to_string(),
        recorded: recorded.to_string(),
        available: available.to_vec(),
    })
}
