//! Loose `*.AppImage` bundles found in the usual install locations.
//!
//! AppImages have no index or installer, so only enumeration is supported.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{
    AdapterEnv, InstallReason, InstallRequest, InstalledListing, ManagerKind, PackageRecord,
    RepositoryRecord, unsupported,
};
use crate::error::Result;

/// Architecture suffixes dropped from file names.
const ARCH_TOKENS: &[&str] = &["x86_64", "amd64", "aarch64", "arm64", "i386", "i686", "armhf"];

/// AppImage adapter.
#[derive(Clone, Debug)]
pub struct AppImageAdapter {
    pub(super) env: AdapterEnv,
}

/// What: Split an AppImage file name into name and version.
///
/// Inputs:
/// - `file_name`: e.g. `Obsidian-1.6.7-x86_64.AppImage`.
///
/// Output:
/// - `("Obsidian", "1.6.7")`; version is `unknown` when no token starts with a digit.
///
/// Details:
/// - A trailing architecture suffix is removed before tokenizing, since
///   `x86_64` itself contains a separator.
/// - Tokens split on `-` and `_`; the version starts at the first token
///   beginning with a digit (after an optional `v`).
#[must_use]
pub fn split_name(file_name: &str) -> (String, String) {
    let stem = file_name
        .rsplit_once('.')
        .filter(|(_, ext)| ext.eq_ignore_ascii_case("appimage"))
        .map_or(file_name, |(s, _)| s);
    let stem = strip_arch(stem);
    let tokens: Vec<&str> = stem
        .split(['-', '_'])
        .filter(|t| !t.is_empty() && !ARCH_TOKENS.contains(&t.to_ascii_lowercase().as_str()))
        .collect();
    let starts_version = |t: &str| {
        t.trim_start_matches(['v', 'V'])
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit())
    };
    let split = tokens
        .iter()
        .skip(1)
        .position(|t| starts_version(t))
        .map_or(tokens.len(), |i| i + 1);
    let name = tokens[..split].join("-");
    let version = tokens[split..].join("-");
    let name = if name.is_empty() { stem.to_string() } else { name };
    let version = if version.is_empty() {
        "unknown".to_string()
    } else {
        version.trim_start_matches(['v', 'V']).to_string()
    };
    (name, version)
}

/// Drop one trailing `-<arch>`, `_<arch>` or `.<arch>` suffix, case-insensitively.
fn strip_arch(stem: &str) -> &str {
    let lower = stem.to_ascii_lowercase();
    for arch in ARCH_TOKENS {
        let cut = stem.len().saturating_sub(arch.len() + 1);
        if lower.ends_with(arch)
            && lower.len() > arch.len() + 1
            && lower.is_char_boundary(cut)
            && matches!(lower.as_bytes()[cut], b'-' | b'_' | b'.')
        {
            return &stem[..cut];
        }
    }
    stem
}

impl AppImageAdapter {
    /// Search roots with their walk depth.
    fn roots(&self) -> Vec<(PathBuf, usize)> {
        let home = self.env.home.as_path();
        vec![
            (home.join("Applications"), 1),
            (home.join(".local/bin"), 1),
            (home.join("bin"), 1),
            (PathBuf::from("/opt"), 2),
            (PathBuf::from("/usr/local/bin"), 1),
        ]
    }

    /// What: Enumerate AppImage files.
    ///
    /// Output:
    /// - One untracked record per file; the logical path is kept as the repository.
    #[allow(clippy::unnecessary_wraps)]
    pub(super) fn list_installed(&self) -> Result<InstalledListing> {
        let mut packages: Vec<PackageRecord> = Vec::new();
        for (logical, depth) in self.roots() {
            let dir = self.env.file(&logical);
            if !dir.is_dir() {
                continue;
            }
            for entry in WalkDir::new(&dir)
                .max_depth(depth)
                .into_iter()
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().is_file())
            {
                let file_name = entry.file_name().to_string_lossy();
                let is_appimage = Path::new(file_name.as_ref())
                    .extension()
                    .is_some_and(|x| x.eq_ignore_ascii_case("appimage"));
                if !is_appimage {
                    continue;
                }
                let (name, version) = split_name(&file_name);
                if packages.iter().any(|p| p.name == name) {
                    continue;
                }
                let rel = entry.path().strip_prefix(&dir).unwrap_or(entry.path());
                packages.push(PackageRecord {
                    manager: ManagerKind::AppImage,
                    name,
                    version,
                    reason: InstallReason::Untracked,
                    repository: Some(logical.join(rel).to_string_lossy().into_owned()),
                    summary: String::new(),
                });
            }
        }
        packages.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(InstalledListing {
            packages,
            tracks_reason: false,
            warnings: Vec::new(),
        })
    }

    #[allow(clippy::unused_self)]
    pub(super) fn query_available(&self, _name: &str) -> Result<Vec<String>> {
        Err(unsupported(ManagerKind::AppImage, "query_available"))
    }

    #[allow(clippy::unused_self)]
    pub(super) fn search(&self, _term: &str) -> Result<Vec<String>> {
        Err(unsupported(ManagerKind::AppImage, "search"))
    }

    #[allow(clippy::unused_self)]
    pub(super) fn install(&self, _request: &InstallRequest) -> Result<()> {
        Err(unsupported(ManagerKind::AppImage, "install"))
    }

    #[allow(clippy::unused_self, clippy::unnecessary_wraps)]
    pub(super) fn list_repositories(&self) -> Result<Vec<RepositoryRecord>> {
        Ok(Vec::new())
    }

    #[allow(clippy::unused_self)]
    pub(super) fn add_repository(&self, _repo: &RepositoryRecord) -> Result<()> {
        Err(unsupported(ManagerKind::AppImage, "add_repository"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::managers::test_env::env;
    use crate::util::command::testing::ScriptedRunner;

    #[test]
    fn file_name_splitting() {
        assert_eq!(
            split_name("Obsidian-1.6.7-x86_64.AppImage"),
            ("Obsidian".into(), "1.6.7".into())
        );
        assert_eq!(
            split_name("nvim.appimage"),
            ("nvim".into(), "unknown".into())
        );
        assert_eq!(
            split_name("balenaEtcher-v1.19.21-x64.AppImage"),
            ("balenaEtcher".into(), "1.19.21-x64".into())
        );
        assert_eq!(
            split_name("Joplin_3.0.15.AppImage"),
            ("Joplin".into(), "3.0.15".into())
        );
        assert_eq!(
            split_name("krita-5.2.3_X86_64.appimage"),
            ("krita".into(), "5.2.3".into())
        );
        assert_eq!(
            split_name("Cursor-0.42.3.aarch64.AppImage"),
            ("Cursor".into(), "0.42.3".into())
        );
    }

    /// What: AppImages are found under home and `/opt`, nothing else is listed.
    ///
    /// Inputs:
    /// - A root with two AppImages and one unrelated file.
    ///
    /// Output:
    /// - Two untracked records with logical paths.
    #[test]
    fn scans_known_locations() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let apps = tmp.path().join("home/ana/Applications");
        let opt = tmp.path().join("opt/krita");
        std::fs::create_dir_all(&apps).expect("mkdir");
        std::fs::create_dir_all(&opt).expect("mkdir");
        std::fs::write(apps.join("Obsidian-1.6.7.AppImage"), b"x").expect("write");
        std::fs::write(apps.join("notes.txt"), b"x").expect("write");
        std::fs::write(opt.join("krita-5.2.3-x86_64.appimage"), b"x").expect("write");
        let (_, env) = env(ScriptedRunner::default(), tmp.path());
        let adapter = AppImageAdapter { env };
        let listing = adapter.list_installed().expect("listing");
        assert_eq!(listing.packages.len(), 2);
        assert_eq!(listing.packages[0].name, "Obsidian");
        assert_eq!(
            listing.packages[0].repository.as_deref(),
            Some("/home/ana/Applications/Obsidian-1.6.7.AppImage")
        );
        assert_eq!(listing.packages[1].name, "krita");
        assert!(adapter.query_available("krita").is_err());
    }
}
