//! Repository definition files: APT source lists, DNF `.repo` files and
//! `pacman.conf` sections.
//!
//! Stock distribution archives are skipped when reading; only third-party
//! repositories are worth carrying to another host.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{ManagerKind, RepoCompat, RepositoryRecord};
use crate::distro::DistroFamily;
use crate::error::{MigratorError, Result};
use crate::util::config::{parse_ini, skip_comment_or_empty};
use crate::util::safe_file_component;

/// Hosts serving the stock Debian/Ubuntu archives.
const OFFICIAL_APT_HOSTS: &[&str] = &[
    "archive.ubuntu.com",
    "security.ubuntu.com",
    "ports.ubuntu.com",
    "deb.debian.org",
    "security.debian.org",
    "ftp.debian.org",
];

/// Stock Fedora/EL repository ids.
const OFFICIAL_DNF_IDS: &[&str] = &[
    "fedora",
    "updates",
    "updates-testing",
    "fedora-cisco-openh264",
    "fedora-modular",
    "updates-modular",
    "baseos",
    "appstream",
    "extras",
    "crb",
    "powertools",
    "rawhide",
];

/// Stock Arch repository sections.
const OFFICIAL_PACMAN_REPOS: &[&str] = &[
    "core",
    "extra",
    "multilib",
    "community",
    "testing",
    "core-testing",
    "extra-testing",
    "multilib-testing",
    "community-testing",
    "gnome-unstable",
    "kde-unstable",
];

/// Host part of a URI (`http://host:port/path` → `host`).
fn uri_host(uri: &str) -> &str {
    let rest = uri.split_once("://").map_or(uri, |(_, r)| r);
    let host = rest.split('/').next().unwrap_or(rest);
    host.split(':').next().unwrap_or(host)
}

/// Whether an APT URI points at a stock archive or one of its mirrors.
fn is_official_apt(uri: &str) -> bool {
    let host = uri_host(uri);
    OFFICIAL_APT_HOSTS
        .iter()
        .any(|h| host == *h || host.ends_with(&format!(".{h}")))
}

/// `ppa:owner/name` for Launchpad PPA URIs.
fn ppa_name(uri: &str) -> Option<String> {
    let host = uri_host(uri);
    if !host.starts_with("ppa.launchpad") {
        return None;
    }
    let path = uri.split_once(host).map(|(_, p)| p)?;
    let mut parts = path.trim_matches('/').split('/');
    let owner = parts.next().filter(|s| !s.is_empty())?;
    let name = parts.next().filter(|s| !s.is_empty())?;
    Some(format!("ppa:{owner}/{name}"))
}

/// Identifier for a non-PPA APT source: host plus path, without scheme.
fn apt_source_id(uri: &str) -> String {
    let rest = uri.split_once("://").map_or(uri, |(_, r)| r);
    rest.trim_end_matches('/').to_string()
}

/// Compatibility of an APT source given its suite and the host codename.
fn apt_compat(uri: &str, suite: &str, codename: Option<&str>) -> RepoCompat {
    let release = if ppa_name(uri).is_some() {
        Some(suite.split('-').next().unwrap_or(suite).to_string())
    } else {
        codename
            .filter(|c| suite == *c || suite.starts_with(&format!("{c}-")))
            .map(ToString::to_string)
    };
    RepoCompat::Family {
        family: DistroFamily::Debian,
        release,
    }
}

/// What: Parse one-line APT sources (`deb [opts] uri suite components`).
///
/// Inputs:
/// - `body`: Content of `sources.list` or a `*.list` file.
/// - `codename`: Host release codename, used to tag release-bound suites.
///
/// Output:
/// - Third-party repositories; commented-out `deb` lines are returned disabled.
#[must_use]
pub fn parse_apt_list(body: &str, codename: Option<&str>) -> Vec<RepositoryRecord> {
    let mut out = Vec::new();
    for raw in body.lines() {
        let trimmed = raw.trim();
        let (enabled, line) = match trimmed.strip_prefix('#') {
            Some(rest) => (false, rest.trim()),
            None => (true, trimmed),
        };
        let mut tokens = line.split_whitespace().peekable();
        let Some(kind) = tokens.next() else {
            continue;
        };
        if kind != "deb" && kind != "deb-src" {
            continue;
        }
        if tokens.peek().is_some_and(|t| t.starts_with('[')) {
            for t in tokens.by_ref() {
                if t.ends_with(']') {
                    break;
                }
            }
        }
        let (Some(uri), Some(suite)) = (tokens.next(), tokens.next()) else {
            continue;
        };
        if is_official_apt(uri) || kind == "deb-src" {
            continue;
        }
        out.push(RepositoryRecord {
            manager: ManagerKind::Apt,
            id: ppa_name(uri).unwrap_or_else(|| apt_source_id(uri)),
            uri: uri.to_string(),
            enabled,
            compat: apt_compat(uri, suite, codename),
            definition: line.to_string(),
        });
    }
    out
}

/// What: Parse deb822 `*.sources` files.
///
/// Inputs:
/// - `body`: File content; paragraphs separated by blank lines.
/// - `codename`: Host release codename.
///
/// Output:
/// - One record per third-party URI of each paragraph.
#[must_use]
pub fn parse_apt_sources(body: &str, codename: Option<&str>) -> Vec<RepositoryRecord> {
    let mut out = Vec::new();
    for paragraph in body.split("\n\n") {
        let mut uris: Vec<&str> = Vec::new();
        let mut suite = "";
        let mut enabled = true;
        let mut is_binary = false;
        for line in paragraph.lines().filter(|l| !skip_comment_or_empty(l)) {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "Types" => is_binary = value.split_whitespace().any(|t| t == "deb"),
                "URIs" => uris = value.split_whitespace().collect(),
                "Suites" => suite = value.split_whitespace().next().unwrap_or(""),
                "Enabled" => enabled = !value.eq_ignore_ascii_case("no"),
                _ => {}
            }
        }
        if !is_binary {
            continue;
        }
        for uri in uris.into_iter().filter(|u| !is_official_apt(u)) {
            out.push(RepositoryRecord {
                manager: ManagerKind::Apt,
                id: ppa_name(uri).unwrap_or_else(|| apt_source_id(uri)),
                uri: uri.to_string(),
                enabled,
                compat: apt_compat(uri, suite, codename),
                definition: paragraph.trim().to_string(),
            });
        }
    }
    out
}

/// Whether a DNF repo id is a stock distribution repository.
fn is_official_dnf(id: &str) -> bool {
    let lower = id.to_ascii_lowercase();
    OFFICIAL_DNF_IDS
        .iter()
        .any(|o| lower == *o || lower.starts_with(&format!("{o}-")))
}

/// What: Parse a DNF/YUM `.repo` file.
///
/// Inputs:
/// - `body`: INI content.
///
/// Output:
/// - Third-party sections as records; `definition` is the section re-rendered.
#[must_use]
pub fn parse_yum_repo(body: &str) -> Vec<RepositoryRecord> {
    parse_ini(body)
        .into_iter()
        .filter(|s| !is_official_dnf(&s.name))
        .map(|s| {
            let uri = ["baseurl", "metalink", "mirrorlist"]
                .iter()
                .find_map(|k| s.get(k))
                .unwrap_or_default()
                .to_string();
            let enabled = s.get("enabled").is_none_or(|v| v.trim() != "0");
            let mut definition = format!("[{}]\n", s.name);
            for (k, v) in &s.entries {
                definition.push_str(&format!("{k}={v}\n"));
            }
            RepositoryRecord {
                manager: ManagerKind::Dnf,
                id: s.name.clone(),
                uri,
                enabled,
                compat: RepoCompat::Family {
                    family: DistroFamily::Rpm,
                    release: None,
                },
                definition,
            }
        })
        .collect()
}

/// What: Parse custom repositories from `pacman.conf`.
///
/// Inputs:
/// - `body`: `pacman.conf` content.
///
/// Output:
/// - One record per non-stock section; `definition` is the section text.
#[must_use]
pub fn parse_pacman_conf(body: &str) -> Vec<RepositoryRecord> {
    parse_ini(body)
        .into_iter()
        .filter(|s| s.name != "options" && !OFFICIAL_PACMAN_REPOS.contains(&s.name.as_str()))
        .map(|s| {
            let uri = s
                .get("Server")
                .or_else(|| s.get("Include"))
                .unwrap_or_default()
                .to_string();
            let mut definition = format!("[{}]\n", s.name);
            for (k, v) in &s.entries {
                if v.is_empty() {
                    definition.push_str(&format!("{k}\n"));
                } else {
                    definition.push_str(&format!("{k} = {v}\n"));
                }
            }
            RepositoryRecord {
                manager: ManagerKind::Pacman,
                id: s.name.clone(),
                uri,
                enabled: true,
                compat: RepoCompat::Family {
                    family: DistroFamily::Arch,
                    release: None,
                },
                definition,
            }
        })
        .collect()
}

/// Map an I/O failure on `path` to `DestinationUnwritable`.
fn unwritable(path: &Path) -> impl Fn(std::io::Error) -> MigratorError + '_ {
    move |e| MigratorError::DestinationUnwritable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

/// Write `body` to `path`, creating parent directories.
fn write_file(path: &Path, body: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(unwritable(path))?;
    }
    fs::write(path, body).map_err(unwritable(path))
}

/// What: Recreate an APT source under `sources.list.d`.
///
/// Inputs:
/// - `root`: Filesystem root.
/// - `repo`: Captured record.
///
/// Output:
/// - Path of the file written (`migrator-<id>.list` or `.sources`).
///
/// # Errors
/// - `DestinationUnwritable` on write failure.
pub fn write_apt_source(root: &Path, repo: &RepositoryRecord) -> Result<PathBuf> {
    let deb822 = repo.definition.starts_with("Types:");
    let ext = if deb822 { "sources" } else { "list" };
    let path = root.join("etc/apt/sources.list.d").join(format!(
        "migrator-{}.{ext}",
        safe_file_component(&repo.id.replace(['/', ':'], "-"))
    ));
    write_file(&path, &format!("{}\n", repo.definition.trim_end()))?;
    Ok(path)
}

/// What: Recreate a DNF repository as `/etc/yum.repos.d/<id>.repo`.
///
/// # Errors
/// - `DestinationUnwritable` on write failure.
pub fn write_yum_repo(root: &Path, repo: &RepositoryRecord) -> Result<PathBuf> {
    let path = root
        .join("etc/yum.repos.d")
        .join(format!("{}.repo", safe_file_component(&repo.id)));
    write_file(&path, &repo.definition)?;
    Ok(path)
}

/// What: Append a pacman repository section unless it already exists.
///
/// Inputs:
/// - `root`: Filesystem root.
/// - `repo`: Captured record.
///
/// Output:
/// - `true` when the section was appended, `false` when already present.
///
/// # Errors
/// - `DestinationUnwritable` on read or append failure.
pub fn append_pacman_repo(root: &Path, repo: &RepositoryRecord) -> Result<bool> {
    let path = root.join("etc/pacman.conf");
    let existing = match fs::read_to_string(&path) {
        Ok(body) => body,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(unwritable(&path)(e)),
    };
    if parse_ini(&existing).iter().any(|s| s.name == repo.id) {
        return Ok(false);
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(unwritable(&path))?;
    file.write_all(format!("\n{}", repo.definition).as_bytes())
        .map_err(unwritable(&path))?;
    Ok(true)
}

/// What: List files matching `pattern` below `root`.
///
/// Inputs:
/// - `root`: Filesystem root.
/// - `pattern`: Logical glob such as `/etc/yum.repos.d/*.repo`.
///
/// Output:
/// - Sorted matching paths (on the root).
pub fn glob_on_root(root: &Path, pattern: &str) -> Vec<PathBuf> {
    let full = root.join(pattern.trim_start_matches('/'));
    let Some(full) = full.to_str() else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = match glob::glob(full) {
        Ok(iter) => iter.filter_map(std::result::Result::ok).collect(),
        Err(e) => {
            tracing::warn!(pattern = %full, error = %e, "invalid glob pattern");
            Vec::new()
        }
    };
    paths.sort();
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    /// What: Stock archives are skipped; PPAs and third-party sources are kept.
    ///
    /// Inputs:
    /// - A `sources.list` mixing Ubuntu archives, a PPA, a vendor repo and a disabled line.
    ///
    /// Output:
    /// - Three records with the expected ids, compat tags and enabled flags.
    #[test]
    fn apt_list_parsing() {
        let body = "\
deb http://archive.ubuntu.com/ubuntu noble main restricted
deb http://de.archive.ubuntu.com/ubuntu noble-updates main
deb-src http://archive.ubuntu.com/ubuntu noble main
deb [arch=amd64 signed-by=/etc/apt/keyrings/ppa.gpg] https://ppa.launchpadcontent.net/graphics-drivers/ppa/ubuntu noble main
deb [signed-by=/usr/share/keyrings/microsoft.gpg] https://packages.microsoft.com/repos/code stable main
# deb http://repo.example.org/debian noble-backports main
";
        let repos = parse_apt_list(body, Some("noble"));
        assert_eq!(repos.len(), 3);
        assert_eq!(repos[0].id, "ppa:graphics-drivers/ppa");
        assert_eq!(
            repos[0].compat,
            RepoCompat::Family {
                family: DistroFamily::Debian,
                release: Some("noble".into())
            }
        );
        assert_eq!(repos[1].id, "packages.microsoft.com/repos/code");
        assert_eq!(
            repos[1].compat,
            RepoCompat::Family {
                family: DistroFamily::Debian,
                release: None
            }
        );
        assert!(!repos[2].enabled);
        assert_eq!(repos[2].id, "repo.example.org/debian");
    }

    #[test]
    fn deb822_sources_parsing() {
        let body = "\
Types: deb
URIs: https://download.docker.com/linux/ubuntu
Suites: noble
Components: stable
Signed-By: /etc/apt/keyrings/docker.asc

Types: deb
URIs: http://archive.ubuntu.com/ubuntu
Suites: noble noble-updates
Components: main
";
        let repos = parse_apt_sources(body, Some("noble"));
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].id, "download.docker.com/linux/ubuntu");
        assert!(repos[0].definition.starts_with("Types: deb"));
    }

    #[test]
    fn yum_repo_parsing_skips_stock_ids() {
        let body = "\
[fedora]
name=Fedora $releasever
metalink=https://mirrors.fedoraproject.org/metalink?repo=fedora-$releasever
enabled=1

[vscode]
name=Visual Studio Code
baseurl=https://packages.microsoft.com/yumrepos/vscode
enabled=0
gpgcheck=1
";
        let repos = parse_yum_repo(body);
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].id, "vscode");
        assert_eq!(repos[0].uri, "https://packages.microsoft.com/yumrepos/vscode");
        assert!(!repos[0].enabled);
        assert!(repos[0].definition.contains("gpgcheck=1"));
    }

    #[test]
    fn pacman_conf_custom_sections() {
        let body = "\
[options]
Architecture = auto

[core]
Include = /etc/pacman.d/mirrorlist

[chaotic-aur]
Include = /etc/pacman.d/chaotic-mirrorlist
";
        let repos = parse_pacman_conf(body);
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].id, "chaotic-aur");
        assert_eq!(repos[0].uri, "/etc/pacman.d/chaotic-mirrorlist");
    }

    /// What: Appending a pacman section is idempotent.
    ///
    /// Inputs:
    /// - A root with an existing pacman.conf; the same record appended twice.
    ///
    /// Output:
    /// - First call appends, second reports already present.
    #[test]
    fn pacman_append_is_idempotent() {
        let tmp = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(tmp.path().join("etc")).expect("mkdir");
        fs::write(tmp.path().join("etc/pacman.conf"), "[options]\nColor\n").expect("seed");
        let repo = parse_pacman_conf("[chaotic-aur]\nInclude = /etc/pacman.d/chaotic-mirrorlist\n")
            .pop()
            .expect("one repo");
        assert!(append_pacman_repo(tmp.path(), &repo).expect("append"));
        assert!(!append_pacman_repo(tmp.path(), &repo).expect("second append"));
        let body = fs::read_to_string(tmp.path().join("etc/pacman.conf")).expect("read");
        assert_eq!(body.matches("[chaotic-aur]").count(), 1);
    }

    #[test]
    fn apt_source_file_name() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let repo = parse_apt_list(
            "deb https://ppa.launchpadcontent.net/neovim-ppa/stable/ubuntu noble main\n",
            Some("noble"),
        )
        .pop()
        .expect("ppa");
        let path = write_apt_source(tmp.path(), &repo).expect("write");
        assert!(path.ends_with("etc/apt/sources.list.d/migrator-ppa-neovim-ppa-stable.list"));
        let body = fs::read_to_string(path).expect("read");
        assert!(body.starts_with("deb https://ppa.launchpadcontent.net/neovim-ppa/stable/ubuntu"));
    }
}
