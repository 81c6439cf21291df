//! Configuration trackers for system, user and desktop settings.
//!
//! Each category has a fixed list of roots ([`roots`]). Roots are expanded
//! (globs), walked (directories) or taken as-is (files), then every candidate
//! is classified by [`filter::classify`]. Denied paths vanish; sensitive ones
//! stay in the listing with a warning and are never read; host-bound ones are
//! listed as non-portable.

pub mod filter;
pub mod fingerprint;
pub mod roots;

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::context::Context;
use crate::error::Result;
use crate::pathvars::{PathTransform, PathVariable};

pub use filter::PathClass;
pub use fingerprint::Fingerprint;

/// Deepest directory level walked below a root.
const MAX_WALK_DEPTH: usize = 6;

/// Most files taken from one root.
const MAX_FILES_PER_ROOT: usize = 2000;

/// Tracker category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigCategory {
    /// `/etc` and other system-wide settings.
    System,
    /// Desktop-environment and window-manager settings.
    Desktop,
    /// User dotfiles and application configuration.
    User,
}

impl ConfigCategory {
    /// Categories in scan order; a path claimed by an earlier one is not listed again.
    pub const ALL: [Self; 3] = [Self::System, Self::Desktop, Self::User];

    /// Lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Desktop => "desktop",
            Self::User => "user",
        }
    }
}

impl fmt::Display for ConfigCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse subject of a config file, derived from path keywords.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    /// Keys, credentials, privilege rules.
    Security,
    /// Package-manager settings.
    Packages,
    /// Network configuration.
    Network,
    /// Bootloader, initramfs, kernel modules.
    Boot,
    /// systemd units and cron.
    Services,
    /// Display server and monitor layout.
    Display,
    /// Desktop environment and window manager.
    Desktop,
    /// Terminal emulators and multiplexers.
    Terminal,
    /// Text editors.
    Editor,
    /// Shell startup files.
    Shell,
    /// Anything else.
    Other,
}

/// Keywords per topic, checked in this order.
const TOPIC_KEYWORDS: &[(Topic, &[&str])] = &[
    (
        Topic::Security,
        &["ssh", "sshd", "gnupg", "keyrings", "sudoers", "shadow", "security", "pam"],
    ),
    (
        Topic::Packages,
        &["apt", "dnf", "yum", "pacman", "flatpak", "snap", "makepkg"],
    ),
    (
        Topic::Network,
        &["networkmanager", "network", "hosts", "resolv", "wpa", "wireguard", "connections"],
    ),
    (
        Topic::Boot,
        &["grub", "mkinitcpio", "dracut", "modprobe", "modules", "boot", "sysctl"],
    ),
    (Topic::Services, &["systemd", "cron", "crontab", "service", "timer"]),
    (
        Topic::Display,
        &["xorg", "x11", "monitors", "xrandr", "kscreen", "udev", "fonts"],
    ),
    (
        Topic::Desktop,
        &[
            "dconf", "gnome", "kde", "plasma", "kwinrc", "kdeglobals", "xfce4", "cinnamon",
            "mate", "lxqt", "autostart", "applications", "mimeapps", "dirs", "gtk", "i3",
            "sway", "hypr", "awesome", "bspwm", "openbox", "qtile", "kglobalshortcutsrc",
        ],
    ),
    (
        Topic::Terminal,
        &["alacritty", "kitty", "konsole", "tmux", "wezterm", "foot", "terminator"],
    ),
    (
        Topic::Editor,
        &["vim", "vimrc", "nvim", "emacs", "code", "helix", "nano", "nanorc"],
    ),
    (
        Topic::Shell,
        &[
            "bash", "bashrc", "bash_profile", "bash_aliases", "zsh", "zshrc", "zprofile",
            "fish", "profile", "inputrc", "starship", "environment",
        ],
    ),
];

impl Topic {
    /// What: Derive a topic from a logical path.
    ///
    /// Inputs:
    /// - `path`: Logical path.
    ///
    /// Output:
    /// - First topic whose keyword equals one of the path's lowercase words.
    ///
    /// Details:
    /// - Words are split on `/`, `.` and `-`; `_` stays inside words so
    ///   `bash_profile` is one word.
    #[must_use]
    pub fn for_path(path: &str) -> Self {
        let lower = path.to_ascii_lowercase();
        let words: BTreeSet<&str> = lower
            .split(['/', '.', '-'])
            .filter(|w| !w.is_empty())
            .collect();
        TOPIC_KEYWORDS
            .iter()
            .find(|(_, keys)| keys.iter().any(|k| words.contains(k)))
            .map_or(Self::Other, |(topic, _)| *topic)
    }
}

/// One tracked configuration file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Absolute logical path on the captured host.
    pub path: String,
    /// Tracker that found it.
    pub category: ConfigCategory,
    /// Subject derived from the path.
    pub topic: Topic,
    /// Content fingerprint; absent for sensitive files, which are never read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<Fingerprint>,
    /// Safe to restore on another host.
    pub portable: bool,
    /// Holds secrets.
    pub sensitive: bool,
    /// Why the entry is not portable, when it is not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Host-identity variables found in the path or the text content.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<PathVariable>,
}

/// Output of a tracker run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackerScan {
    /// Entries sorted by path.
    pub entries: Vec<ConfigEntry>,
    /// Non-fatal problems.
    pub warnings: Vec<String>,
}

impl TrackerScan {
    /// What: Merge per-category results.
    ///
    /// Inputs:
    /// - `parts`: Results of individual category runs, in any order.
    ///
    /// Output:
    /// - One scan; a path listed by several categories keeps the entry of the
    ///   earliest category in [`ConfigCategory::ALL`].
    #[must_use]
    pub fn merge(parts: Vec<Self>) -> Self {
        let mut out = Self::default();
        for part in parts {
            out.entries.extend(part.entries);
            out.warnings.extend(part.warnings);
        }
        out.entries
            .sort_by(|a, b| a.path.cmp(&b.path).then(a.category.cmp(&b.category)));
        out.entries.dedup_by(|later, first| later.path == first.path);
        out
    }
}

/// What: Expand a `~/` root against the tracked home.
///
/// Inputs:
/// - `root`: Root as listed in [`roots`].
/// - `home`: Logical home directory.
///
/// Output:
/// - Absolute logical path string.
fn logical_root(root: &str, home: &Path) -> String {
    root.strip_prefix("~/").map_or_else(
        || root.to_string(),
        |rest| home.join(rest).to_string_lossy().into_owned(),
    )
}

/// Logical path of a file found under the context root.
fn logical_of(ctx_root: &Path, physical: &Path) -> Option<String> {
    let rel = physical.strip_prefix(ctx_root).ok()?;
    Some(format!("/{}", rel.to_string_lossy()))
}

/// What: Roots for one category on this host.
///
/// Inputs:
/// - `ctx`: Context (desktop session, root, home).
/// - `category`: Tracker category.
///
/// Output:
/// - Logical root strings, `~` already expanded.
#[must_use]
pub fn roots_for(ctx: &Context, category: ConfigCategory) -> Vec<String> {
    let home = &ctx.host.home;
    let raw: Vec<&str> = match category {
        ConfigCategory::System => roots::SYSTEM.to_vec(),
        ConfigCategory::User => roots::USER.to_vec(),
        ConfigCategory::Desktop => {
            let session = ctx.host.desktop.as_deref().unwrap_or_default();
            let mut out: Vec<&str> = roots::DESKTOP_COMMON.to_vec();
            for (names, paths) in roots::DESKTOPS {
                if names.iter().any(|n| session.contains(n)) {
                    out.extend_from_slice(paths);
                }
            }
            out.extend(roots::WINDOW_MANAGERS.iter().copied().filter(|wm| {
                ctx.on_root(Path::new(&logical_root(wm, home))).is_dir()
            }));
            out
        }
    };
    raw.into_iter().map(|r| logical_root(r, home)).collect()
}

/// What: Collect candidate files below one logical root.
///
/// Inputs:
/// - `ctx`: Context (root mapping, cancellation).
/// - `root`: Logical root (file, directory or glob).
///
/// Output:
/// - Physical file paths, denied directories pruned during walks.
///
/// # Errors
/// - `Cancelled` when the token fires mid-walk.
fn candidates(ctx: &Context, root: &str) -> Result<Vec<PathBuf>> {
    if root.contains('*') {
        return Ok(crate::managers::repos::glob_on_root(&ctx.root, root)
            .into_iter()
            .filter(|p| p.is_file())
            .collect());
    }
    let physical = ctx.on_root(Path::new(root));
    if physical.is_file() {
        return Ok(vec![physical]);
    }
    if !physical.is_dir() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    let walker = WalkDir::new(&physical)
        .max_depth(MAX_WALK_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || !filter::is_denied_dir(&e.file_name().to_string_lossy())
        });
    for entry in walker.filter_map(std::result::Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        ctx.cancel.check()?;
        if out.len() >= MAX_FILES_PER_ROOT {
            tracing::warn!(root = %root, limit = MAX_FILES_PER_ROOT, "file limit reached; rest of root skipped");
            break;
        }
        out.push(entry.into_path());
    }
    Ok(out)
}

/// What: Build the entry for one candidate file.
///
/// Inputs:
/// - `ctx`: Context (settings).
/// - `transform`: Source-host path transform.
/// - `category`: Tracker category.
/// - `logical`: Logical path.
/// - `physical`: File on the context root.
///
/// Output:
/// - `Ok(None)` for denied paths and oversized files.
///
/// # Errors
/// - I/O errors while fingerprinting; the caller records them as warnings.
fn build_entry(
    ctx: &Context,
    transform: &PathTransform,
    category: ConfigCategory,
    logical: &str,
    physical: &Path,
) -> std::io::Result<Option<ConfigEntry>> {
    let class = filter::classify(logical);
    let mut variables: BTreeSet<PathVariable> = transform.detect(logical).into_iter().collect();
    let (portable, sensitive, warning, fingerprint) = match class {
        PathClass::Denied => return Ok(None),
        PathClass::Sensitive => (
            false,
            true,
            Some("contains secrets; listed only, content not captured".to_string()),
            None,
        ),
        PathClass::HostBound | PathClass::Portable => {
            let fp = fingerprint::fingerprint_file(physical)?;
            if fp.size > ctx.settings.scan.max_config_file_bytes {
                tracing::debug!(path = %logical, size = fp.size, "oversized file treated as application data");
                return Ok(None);
            }
            if class == PathClass::Portable
                && ctx.settings.scan.detect_content_variables
                && let Ok(text) = std::fs::read_to_string(physical)
            {
                variables.extend(transform.detect(&text));
            }
            let warning = (class == PathClass::HostBound)
                .then(|| "bound to this host's hardware or identity".to_string());
            (class == PathClass::Portable, false, warning, Some(fp))
        }
    };
    if sensitive {
        tracing::warn!(path = %logical, "sensitive config listed without content");
    }
    Ok(Some(ConfigEntry {
        path: logical.to_string(),
        category,
        topic: Topic::for_path(logical),
        fingerprint,
        portable,
        sensitive,
        warning,
        variables: variables.into_iter().collect(),
    }))
}

/// What: Run one tracker category.
///
/// Inputs:
/// - `ctx`: Context.
/// - `transform`: Source-host path transform for variable detection.
/// - `category`: Category to scan.
///
/// Output:
/// - Entries sorted by path; unreadable files become warnings.
///
/// # Errors
/// - `Cancelled` only.
pub fn scan_category(
    ctx: &Context,
    transform: &PathTransform,
    category: ConfigCategory,
) -> Result<TrackerScan> {
    let mut scan = TrackerScan::default();
    let mut seen = BTreeSet::new();
    for root in roots_for(ctx, category) {
        ctx.cancel.check()?;
        for physical in candidates(ctx, &root)? {
            let Some(logical) = logical_of(&ctx.root, &physical) else {
                continue;
            };
            if !seen.insert(logical.clone()) {
                continue;
            }
            match build_entry(ctx, transform, category, &logical, &physical) {
                Ok(Some(entry)) => {
                    if let Some(w) = entry.warning.as_ref().filter(|_| entry.sensitive) {
                        scan.warnings.push(format!("{logical}: {w}"));
                    }
                    scan.entries.push(entry);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = %logical, error = %e, "cannot read config file");
                    scan.warnings.push(format!("{logical}: {e}"));
                }
            }
        }
    }
    scan.entries.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::info!(category = %category, entries = scan.entries.len(), "config tracker finished");
    Ok(scan)
}

/// What: Run every tracker category and merge the results.
///
/// # Errors
/// - `Cancelled` only.
pub fn scan_configs(ctx: &Context, transform: &PathTransform) -> Result<TrackerScan> {
    let parts = ConfigCategory::ALL
        .into_iter()
        .map(|c| scan_category(ctx, transform, c))
        .collect::<Result<Vec<_>>>()?;
    Ok(TrackerScan::merge(parts))
}
