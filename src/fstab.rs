//! Mount-table parsing and portability classification.
//!
//! An entry is portable when it does not depend on the local block devices of
//! the machine it was captured on: network shares, removable/optical media,
//! virtual filesystems and bind mounts between standard directories.
//! Everything else (UUID/LABEL/PARTUUID sources, `/dev/*` disks, swap) is
//! hardware-bound and never restored.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MigratorError, Result};

/// Whether an entry can move to another machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MountClass {
    /// Safe to append on a destination host.
    Portable,
    /// Bound to local storage of the source host.
    HardwareBound,
}

/// Why an entry got its classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MountBasis {
    /// NFS, CIFS, SSHFS and friends.
    NetworkShare,
    /// Optical or removable media.
    Removable,
    /// Kernel or memory-backed filesystem.
    Virtual,
    /// Bind mount between standard directories.
    BindMount,
    /// UUID/label/device-path bound to a local disk.
    LocalDevice,
}

/// One parsed mount-table line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FstabEntry {
    /// First field (`UUID=...`, `/dev/sda1`, `server:/export`).
    pub spec: String,
    /// Mount point.
    pub mount_point: String,
    /// Filesystem type.
    pub fs_type: String,
    /// Mount options.
    pub options: String,
    /// Dump frequency.
    pub dump: u32,
    /// fsck pass number.
    pub pass: u32,
    /// Classification.
    pub class: MountClass,
    /// Classification reason.
    pub basis: MountBasis,
}

/// Filesystem types served over the network.
const NETWORK_TYPES: &[&str] = &[
    "nfs",
    "nfs4",
    "cifs",
    "smbfs",
    "smb3",
    "sshfs",
    "fuse.sshfs",
    "davfs",
    "fuse.davfs2",
    "glusterfs",
    "ceph",
    "9p",
    "afs",
];

/// Filesystems of removable or optical media.
const REMOVABLE_TYPES: &[&str] = &["iso9660", "udf"];

/// Device nodes of removable drives.
const REMOVABLE_DEVICES: &[&str] = &["/dev/sr", "/dev/cdrom", "/dev/dvd", "/dev/fd"];

/// Kernel and memory filesystems.
const VIRTUAL_TYPES: &[&str] = &[
    "proc",
    "sysfs",
    "tmpfs",
    "ramfs",
    "devpts",
    "devtmpfs",
    "debugfs",
    "securityfs",
    "cgroup",
    "cgroup2",
    "pstore",
    "efivarfs",
    "configfs",
    "hugetlbfs",
    "mqueue",
    "binfmt_misc",
];

/// Directory trees a bind mount may come from and still be portable.
const BIND_SOURCES: &[&str] = &["/home", "/var", "/opt", "/usr", "/etc", "/srv"];

/// Source prefixes that name a local block device.
const DEVICE_TAGS: &[&str] = &["UUID=", "LABEL=", "PARTUUID=", "PARTLABEL=", "ID="];

/// What: Classify a mount by source, type and options.
///
/// Inputs:
/// - `spec`: First fstab field.
/// - `fs_type`: Third field.
/// - `options`: Fourth field.
///
/// Output:
/// - Classification and the rule that decided it.
#[must_use]
pub fn classify(spec: &str, fs_type: &str, options: &str) -> (MountClass, MountBasis) {
    let ty = fs_type.to_ascii_lowercase();
    let tagged = DEVICE_TAGS.iter().any(|t| spec.starts_with(t));
    let network_spec =
        spec.starts_with("//") || (!tagged && !spec.starts_with('/') && spec.contains(':'));
    if NETWORK_TYPES.contains(&ty.as_str()) || ty.starts_with("nfs") || network_spec {
        return (MountClass::Portable, MountBasis::NetworkShare);
    }
    if REMOVABLE_TYPES.contains(&ty.as_str())
        || REMOVABLE_DEVICES.iter().any(|d| spec.starts_with(d))
    {
        return (MountClass::Portable, MountBasis::Removable);
    }
    if VIRTUAL_TYPES.contains(&ty.as_str()) {
        return (MountClass::Portable, MountBasis::Virtual);
    }
    let is_bind = options
        .split(',')
        .any(|o| matches!(o.trim(), "bind" | "rbind"));
    if is_bind
        && BIND_SOURCES
            .iter()
            .any(|root| spec == *root || spec.starts_with(&format!("{root}/")))
    {
        return (MountClass::Portable, MountBasis::BindMount);
    }
    (MountClass::HardwareBound, MountBasis::LocalDevice)
}

/// Decode fstab octal escapes such as `\040`.
fn unescape(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let octal = (bytes[i] == b'\\'
            && i + 3 < bytes.len()
            && bytes[i + 1..=i + 3].iter().all(|b| (b'0'..=b'7').contains(b)))
        .then(|| {
            bytes[i + 1..=i + 3]
                .iter()
                .fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'))
        })
        .and_then(|code| u8::try_from(code).ok());
        if let Some(code) = octal {
            out.push(code);
            i += 4;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Encode whitespace and backslashes for writing back to fstab.
fn escape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for c in field.chars() {
        match c {
            ' ' => out.push_str("\\040"),
            '\t' => out.push_str("\\011"),
            '\n' => out.push_str("\\012"),
            '\\' => out.push_str("\\134"),
            other => out.push(other),
        }
    }
    out
}

impl FstabEntry {
    /// What: Parse one non-comment line.
    ///
    /// Inputs:
    /// - `line`: Raw fstab line.
    /// - `number`: 1-based line number for error reporting.
    ///
    /// Output:
    /// - Parsed, classified entry.
    ///
    /// # Errors
    /// - `FstabParseError` when fewer than 3 or more than 6 fields are present
    ///   or dump/pass are not numbers.
    pub fn parse_line(line: &str, number: usize) -> Result<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let bad = |reason: String| MigratorError::FstabParseError {
            line: number,
            reason,
        };
        if fields.len() < 3 {
            return Err(bad(format!("expected at least 3 fields, found {}", fields.len())));
        }
        if fields.len() > 6 {
            return Err(bad(format!("expected at most 6 fields, found {}", fields.len())));
        }
        let num = |idx: usize, what: &str| -> Result<u32> {
            fields.get(idx).map_or(Ok(0), |raw| {
                raw.parse::<u32>()
                    .map_err(|_| bad(format!("{what} field `{raw}` is not a number")))
            })
        };
        let spec = unescape(fields[0]);
        let fs_type = fields[2].to_string();
        let options = fields.get(3).map_or_else(|| "defaults".to_string(), |o| (*o).to_string());
        let (class, basis) = classify(&spec, &fs_type, &options);
        Ok(Self {
            mount_point: unescape(fields[1]),
            dump: num(4, "dump")?,
            pass: num(5, "pass")?,
            spec,
            fs_type,
            options,
            class,
            basis,
        })
    }

    /// Whether the entry may be appended on another host.
    #[must_use]
    pub fn is_portable(&self) -> bool {
        self.class == MountClass::Portable
    }

    /// Render as a tab-separated fstab line.
    #[must_use]
    pub fn to_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            escape(&self.spec),
            escape(&self.mount_point),
            self.fs_type,
            self.options,
            self.dump,
            self.pass
        )
    }

    /// Identity used for diffing.
    #[must_use]
    pub fn identity(&self) -> (&str, &str, &str, &str) {
        (&self.spec, &self.mount_point, &self.fs_type, &self.options)
    }
}

/// Parsed mount table plus the lines that could not be parsed.
#[derive(Debug, Default)]
pub struct FstabParse {
    /// Entries in file order.
    pub entries: Vec<FstabEntry>,
    /// One `FstabParseError` per skipped line.
    pub errors: Vec<MigratorError>,
}

/// What: Parse a whole mount table.
///
/// Inputs:
/// - `body`: File content.
///
/// Output:
/// - Entries and per-line errors; malformed lines are skipped with a warning.
#[must_use]
pub fn parse_fstab(body: &str) -> FstabParse {
    let mut parsed = FstabParse::default();
    for (idx, raw) in body.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match FstabEntry::parse_line(line, idx + 1) {
            Ok(entry) => parsed.entries.push(entry),
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed fstab line");
                parsed.errors.push(e);
            }
        }
    }
    parsed
}

/// What: Read and parse a mount table from disk.
///
/// Inputs:
/// - `path`: fstab location.
///
/// Output:
/// - Parsed table; an empty table when the file does not exist.
///
/// # Errors
/// - `Io` for read failures other than a missing file.
pub fn read_fstab(path: &Path) -> Result<FstabParse> {
    match fs::read_to_string(path) {
        Ok(body) => Ok(parse_fstab(&body)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no fstab present");
            Ok(FstabParse::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// Header written above appended entries.
pub const APPEND_HEADER: &str = "# Portable fstab entries added by migrator";

/// What: Append portable entries to a mount table.
///
/// Inputs:
/// - `path`: Destination fstab.
/// - `entries`: Entries to append; hardware-bound ones are ignored.
///
/// Output:
/// - Number of lines appended.
///
/// # Errors
/// - `DestinationUnwritable` when the backup copy or the append fails.
///
/// Details:
/// - Copies the current file to `<path>.migrator.bak` first, then appends a
///   header and one line per entry. Existing lines are never rewritten.
/// - A missing table (and its directory) is created.
pub fn append_portable(path: &Path, entries: &[&FstabEntry]) -> Result<usize> {
    let portable: Vec<&&FstabEntry> = entries.iter().filter(|e| e.is_portable()).collect();
    if portable.is_empty() {
        return Ok(0);
    }
    let unwritable = |e: std::io::Error| MigratorError::DestinationUnwritable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(unwritable)?;
    }
    if path.exists() {
        let mut backup = path.as_os_str().to_owned();
        backup.push(".migrator.bak");
        fs::copy(path, &backup).map_err(unwritable)?;
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(unwritable)?;
    let mut block = format!("\n{APPEND_HEADER}\n");
    for e in &portable {
        block.push_str(&e.to_line());
        block.push('\n');
    }
    file.write_all(block.as_bytes()).map_err(unwritable)?;
    tracing::info!(path = %path.display(), count = portable.len(), "appended portable fstab entries");
    Ok(portable.len())
}
