//! Path classification for config tracking: denied, sensitive, host-bound or portable.
//!
//! Rules match on the logical path (`/home/ana/.cache/...`), so they apply the
//! same way on a live host and under a test root.

/// How a candidate path is treated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathClass {
    /// Not tracked at all.
    Denied,
    /// Listed with a warning, never copied.
    Sensitive,
    /// Listed but not portable to other hardware or hosts.
    HostBound,
    /// Listed and portable.
    Portable,
}

/// Directory names whose whole subtree is skipped.
const DENIED_DIRS: &[&str] = &[
    ".cache",
    "cache",
    "Cache",
    "caches",
    "Code Cache",
    "GPUCache",
    "CachedData",
    "ShaderCache",
    "Trash",
    "node_modules",
    ".npm",
    ".cargo",
    ".rustup",
    ".steam",
    "Steam",
    ".var",
    "__pycache__",
    "logs",
    "Crash Reports",
    "IndexedDB",
    "Service Worker",
    "storage",
    "sessionstore-backups",
    ".git",
];

/// File names never tracked.
const DENIED_FILES: &[&str] = &[
    ".bash_history",
    ".zsh_history",
    ".python_history",
    ".node_repl_history",
    ".lesshst",
    ".viminfo",
    ".wget-hsts",
    ".xsession-errors",
    ".ICEauthority",
    ".Xauthority",
    "recently-used.xbel",
];

/// File extensions never tracked.
const DENIED_EXTENSIONS: &[&str] = &["sock", "lock", "pid", "log", "tmp", "swp", "sqlite-wal", "sqlite-shm"];

/// Logical paths owned by other components or regenerated by the system.
const DENIED_PATHS: &[&str] = &["/etc/fstab", "/etc/mtab", "/etc/ld.so.cache", "/var/cache", "/etc/.pwd.lock"];

/// Path fragments marking secrets.
const SENSITIVE: &[&str] = &[
    "/.local/share/keyrings",
    "/.gnupg",
    "/.password-store",
    "/.pki",
    "/kwalletd",
    "/.netrc",
    "/etc/shadow",
    "/etc/gshadow",
    "/etc/sudoers",
    "/etc/NetworkManager/system-connections",
    "/etc/ssh/ssh_host_",
];

/// File-name fragments marking hardware- or host-specific settings.
const HOST_BOUND_NAMES: &[&str] = &[
    "monitors.xml",
    "xrandr",
    "kscreen",
    "xorg.conf",
    "nvidia",
    "amdgpu",
    "input-devices",
    "touchpad",
    "wacom",
    "machine-id",
];

/// Logical paths bound to this host's identity.
const HOST_BOUND_PATHS: &[&str] = &[
    "/etc/hostname",
    "/etc/machine-id",
    "/etc/adjtime",
    "/etc/passwd",
    "/etc/group",
    "/etc/X11/xorg.conf.d",
    "/etc/udev/rules.d/70-persistent-net.rules",
];

/// Whether `path` is `prefix` or lies below it.
fn under(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Whether a directory name prunes its subtree during walks.
#[must_use]
pub fn is_denied_dir(name: &str) -> bool {
    DENIED_DIRS.contains(&name)
}

/// Whether an SSH key file is a private key.
fn is_private_ssh_key(path: &str) -> bool {
    let Some((dir, name)) = path.rsplit_once('/') else {
        return false;
    };
    dir.ends_with("/.ssh")
        && std::path::Path::new(name)
            .extension()
            .is_none_or(|e| !e.eq_ignore_ascii_case("pub"))
        && (name.starts_with("id_") || name.ends_with(".pem") || name.ends_with(".key"))
}

/// What: Classify one logical path.
///
/// Inputs:
/// - `path`: Absolute logical path.
///
/// Output:
/// - The first matching class in the order denied, sensitive, host-bound, portable.
#[must_use]
pub fn classify(path: &str) -> PathClass {
    let name = path.rsplit('/').next().unwrap_or(path);
    let denied = DENIED_PATHS.iter().any(|p| under(path, p))
        || DENIED_FILES.contains(&name)
        || std::path::Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| DENIED_EXTENSIONS.contains(&e))
        || path.split('/').any(is_denied_dir);
    if denied {
        return PathClass::Denied;
    }
    if SENSITIVE.iter().any(|s| path.contains(s)) || is_private_ssh_key(path) {
        return PathClass::Sensitive;
    }
    let lower = name.to_ascii_lowercase();
    if HOST_BOUND_PATHS.iter().any(|p| under(path, p))
        || HOST_BOUND_NAMES.iter().any(|n| lower.contains(n))
    {
        return PathClass::HostBound;
    }
    PathClass::Portable
}

#[cfg(test)]
mod tests {
    use super::*;

    /// What: Representative paths land in the expected class.
    ///
    /// Inputs:
    /// - Cache, history, keyring, SSH key, monitor layout and shell rc paths.
    ///
    /// Output:
    /// - Denied, sensitive, host-bound and portable respectively.
    #[test]
    fn classification_examples() {
        assert_eq!(classify("/home/ana/.cache/fontconfig/x"), PathClass::Denied);
        assert_eq!(classify("/home/ana/.bash_history"), PathClass::Denied);
        assert_eq!(classify("/etc/fstab"), PathClass::Denied);
        assert_eq!(
            classify("/home/ana/.config/Code/User/workspaceStorage/x/state.vscdb"),
            PathClass::Portable
        );
        assert_eq!(
            classify("/home/ana/.config/Code/CachedData/abc/x.js"),
            PathClass::Denied
        );
        assert_eq!(
            classify("/home/ana/.local/share/keyrings/login.keyring"),
            PathClass::Sensitive
        );
        assert_eq!(classify("/home/ana/.ssh/id_ed25519"), PathClass::Sensitive);
        assert_eq!(classify("/home/ana/.ssh/id_ed25519.pub"), PathClass::Portable);
        assert_eq!(classify("/home/ana/.ssh/config"), PathClass::Portable);
        assert_eq!(classify("/etc/sudoers.d/ana"), PathClass::Sensitive);
        assert_eq!(
            classify("/etc/NetworkManager/system-connections/home.nmconnection"),
            PathClass::Sensitive
        );
        assert_eq!(classify("/home/ana/.config/monitors.xml"), PathClass::HostBound);
        assert_eq!(classify("/etc/hostname"), PathClass::HostBound);
        assert_eq!(classify("/etc/X11/xorg.conf.d/20-intel.conf"), PathClass::HostBound);
        assert_eq!(classify("/home/ana/.bashrc"), PathClass::Portable);
        assert_eq!(classify("/etc/hosts"), PathClass::Portable);
    }

    #[test]
    fn prefix_matching_respects_components() {
        assert!(under("/etc/fstab", "/etc/fstab"));
        assert!(!under("/etc/fstab.d", "/etc/fstab"));
        assert!(under("/var/cache/apt/x", "/var/cache"));
    }
}
