//! Distribution identification from `os-release`.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::util::config::{parse_key_value, skip_comment_or_empty};

/// Package-format family a distribution belongs to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistroFamily {
    /// Debian, Ubuntu and derivatives (`.deb`, APT).
    Debian,
    /// Fedora, RHEL and rebuilds (`.rpm`, DNF).
    Rpm,
    /// Arch Linux and derivatives (pacman).
    Arch,
    /// Anything else.
    #[default]
    Other,
}

impl fmt::Display for DistroFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Debian => "debian",
            Self::Rpm => "rpm",
            Self::Arch => "arch",
            Self::Other => "other",
        })
    }
}

/// Known distribution ids per family.
const DEBIAN_IDS: &[&str] = &[
    "debian",
    "ubuntu",
    "linuxmint",
    "pop",
    "elementary",
    "kali",
    "raspbian",
    "zorin",
];
/// RPM-based distribution ids.
const RPM_IDS: &[&str] = &[
    "fedora", "rhel", "centos", "rocky", "almalinux", "ol", "nobara",
];
/// Arch-based distribution ids.
const ARCH_IDS: &[&str] = &["arch", "manjaro", "endeavouros", "garuda", "cachyos", "artix"];

impl DistroFamily {
    /// What: Map one os-release id to a family.
    ///
    /// Inputs:
    /// - `id`: Value such as `ubuntu` or `rocky`.
    ///
    /// Output:
    /// - Family, or `Other` when unknown.
    #[must_use]
    pub fn from_id(id: &str) -> Self {
        let id = id.trim().to_ascii_lowercase();
        if DEBIAN_IDS.contains(&id.as_str()) {
            Self::Debian
        } else if RPM_IDS.contains(&id.as_str()) {
            Self::Rpm
        } else if ARCH_IDS.contains(&id.as_str()) {
            Self::Arch
        } else {
            Self::Other
        }
    }
}

/// Parsed distribution identity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistroInfo {
    /// `ID`.
    pub id: String,
    /// `ID_LIKE`, split on whitespace.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub id_like: Vec<String>,
    /// `NAME` (or `PRETTY_NAME` when `NAME` is missing).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// `VERSION_ID`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version_id: String,
    /// `VERSION_CODENAME` (or `UBUNTU_CODENAME`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codename: Option<String>,
    /// Derived family.
    pub family: DistroFamily,
}

impl DistroInfo {
    /// What: Parse the body of an `os-release` file.
    ///
    /// Inputs:
    /// - `body`: File content.
    ///
    /// Output:
    /// - Distribution identity; `ID` decides the family first, then each
    ///   `ID_LIKE` token in order.
    #[must_use]
    pub fn parse(body: &str) -> Self {
        let mut info = Self::default();
        let mut pretty = String::new();
        for line in body.lines().filter(|l| !skip_comment_or_empty(l)) {
            let Some((key, value)) = parse_key_value(line) else {
                continue;
            };
            match key.as_str() {
                "ID" => info.id = value.to_ascii_lowercase(),
                "ID_LIKE" => {
                    info.id_like = value
                        .split_whitespace()
                        .map(str::to_ascii_lowercase)
                        .collect();
                }
                "NAME" => info.name = value,
                "PRETTY_NAME" => pretty = value,
                "VERSION_ID" => info.version_id = value,
                "VERSION_CODENAME" if !value.is_empty() => info.codename = Some(value),
                "UBUNTU_CODENAME" if info.codename.is_none() && !value.is_empty() => {
                    info.codename = Some(value);
                }
                _ => {}
            }
        }
        if info.name.is_empty() {
            info.name = pretty;
        }
        info.family = std::iter::once(info.id.as_str())
            .chain(info.id_like.iter().map(String::as_str))
            .map(DistroFamily::from_id)
            .find(|f| *f != DistroFamily::Other)
            .unwrap_or_default();
        info
    }

    /// What: Read `etc/os-release` (or `usr/lib/os-release`) below `root`.
    ///
    /// Inputs:
    /// - `root`: Filesystem root, `/` on a live system.
    ///
    /// Output:
    /// - Parsed identity; an empty `Other` identity when neither file exists.
    #[must_use]
    pub fn detect(root: &Path) -> Self {
        for rel in ["etc/os-release", "usr/lib/os-release"] {
            let path = root.join(rel);
            match std::fs::read_to_string(&path) {
                Ok(body) => return Self::parse(&body),
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "os-release not readable");
                }
            }
        }
        tracing::warn!(root = %root.display(), "no os-release found; distribution unknown");
        Self::default()
    }
}
