//! Backup artifact format, naming, writing, listing and loading.
//!
//! One artifact is one JSON document named
//! `migrator_backup_<YYYYMMDD_HHMMSS>_<host>.json` (UTC). Its identity is
//! `(host, timestamp)`; an existing artifact is never overwritten.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::context::Context;
use crate::error::{MigratorError, Result};
use crate::pathvars::{PathTransform, PathVariable};
use crate::snapshot::{SNAPSHOT_FORMAT, SystemSnapshot};
use crate::tracking::Fingerprint;
use crate::util::safe_file_component;

/// Artifact document format understood by this build.
pub const ARTIFACT_FORMAT: u32 = 1;

/// File-name prefix of every artifact.
const PREFIX: &str = "migrator_backup_";

/// Timestamp layout inside file names.
const NAME_TIME_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Captured bytes of one file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "encoding", rename_all = "lowercase")]
pub enum FileContent {
    /// UTF-8 text, placeholders already substituted.
    Text {
        /// Tokenized text.
        text: String,
    },
    /// Anything else, copied verbatim.
    Binary {
        /// Raw bytes.
        bytes: Vec<u8>,
    },
}

/// One config file copied into an artifact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedFile {
    /// Logical path on the source host.
    pub path: String,
    /// Path with host-identity placeholders.
    pub tokenized_path: String,
    /// Fingerprint of the original bytes.
    pub fingerprint: Fingerprint,
    /// Variables replaced in path or content.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replaced: Vec<PathVariable>,
    /// Ambiguous variables found and left unchanged.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ambiguous: Vec<PathVariable>,
    /// Content already contained placeholder literals and was stored as-is.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub collision: bool,
    /// Content.
    pub content: FileContent,
}

/// Snapshot plus copied config content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupArtifact {
    /// Document format.
    pub format_version: u32,
    /// Source hostname.
    pub hostname: String,
    /// Creation time (UTC), second precision.
    pub created_at: DateTime<Utc>,
    /// Captured state.
    pub snapshot: SystemSnapshot,
    /// Copied config files.
    pub files: Vec<CapturedFile>,
    /// Problems hit while copying.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl BackupArtifact {
    /// Captured file for a logical path.
    #[must_use]
    pub fn file(&self, path: &str) -> Option<&CapturedFile> {
        self.files.iter().find(|f| f.path == path)
    }

    /// File name for this artifact.
    #[must_use]
    pub fn file_name(&self) -> String {
        artifact_file_name(&self.hostname, self.created_at)
    }
}

/// What: Artifact file name for a host and time.
///
/// Inputs:
/// - `hostname`: Raw hostname.
/// - `at`: Creation time.
///
/// Output:
/// - `migrator_backup_<YYYYMMDD_HHMMSS>_<safe host>.json`.
#[must_use]
pub fn artifact_file_name(hostname: &str, at: DateTime<Utc>) -> String {
    format!(
        "{PREFIX}{}_{}.json",
        at.format(NAME_TIME_FORMAT),
        safe_file_component(hostname)
    )
}

/// What: Parse an artifact file name.
///
/// Inputs:
/// - `name`: File name without directory.
///
/// Output:
/// - `(safe host, timestamp)`, or `None` for foreign files.
#[must_use]
pub fn parse_file_name(name: &str) -> Option<(String, DateTime<Utc>)> {
    let rest = name.strip_prefix(PREFIX)?.strip_suffix(".json")?;
    let stamp = rest.get(..15)?;
    let host = rest.get(15..)?.strip_prefix('_')?;
    if host.is_empty() {
        return None;
    }
    let naive = NaiveDateTime::parse_from_str(stamp, NAME_TIME_FORMAT).ok()?;
    Some((host.to_string(), naive.and_utc()))
}

/// What: Copy the content of a snapshot's portable config files.
///
/// Inputs:
/// - `ctx`: Context used to map logical paths onto the root.
/// - `snapshot`: Snapshot whose configs are copied.
/// - `transform`: Source-host transform.
///
/// Output:
/// - Captured files sorted by path, plus warnings for unreadable files.
///
/// Details:
/// - Sensitive and host-bound entries are never copied. Text is tokenized
///   when `scan.detect_content_variables` is set; binary content is stored
///   verbatim. Paths are always tokenized.
#[must_use]
pub fn capture_files(
    ctx: &Context,
    snapshot: &SystemSnapshot,
    transform: &PathTransform,
) -> (Vec<CapturedFile>, Vec<String>) {
    let mut files = Vec::new();
    let mut warnings = Vec::new();
    for entry in snapshot.configs.iter().filter(|c| c.portable && !c.sensitive) {
        let physical = ctx.on_root(Path::new(&entry.path));
        let bytes = match fs::read(&physical) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(path = %entry.path, error = %e, "config vanished before backup");
                warnings.push(format!("{}: not copied: {e}", entry.path));
                continue;
            }
        };
        let fingerprint = Fingerprint {
            mtime: entry.fingerprint.as_ref().and_then(|f| f.mtime),
            ..Fingerprint::of_bytes(&bytes)
        };
        let path_tok = transform.tokenize(&entry.path);
        let (content, replaced, ambiguous, collision) = match String::from_utf8(bytes) {
            Ok(text) if !ctx.settings.scan.detect_content_variables => (
                FileContent::Text { text },
                Vec::new(),
                Vec::new(),
                false,
            ),
            Ok(text) => {
                let tok = transform.tokenize(&text);
                (
                    FileContent::Text { text: tok.text },
                    tok.replaced,
                    tok.ambiguous,
                    tok.collision,
                )
            }
            Err(e) => (
                FileContent::Binary {
                    bytes: e.into_bytes(),
                },
                Vec::new(),
                Vec::new(),
                false,
            ),
        };
        let mut replaced: Vec<PathVariable> = replaced.into_iter().chain(path_tok.replaced).collect();
        replaced.sort();
        replaced.dedup();
        let mut ambiguous: Vec<PathVariable> = ambiguous.into_iter().chain(path_tok.ambiguous).collect();
        ambiguous.sort();
        ambiguous.dedup();
        if collision {
            warnings.push(format!(
                "{}: already contains placeholder text; stored without substitution",
                entry.path
            ));
        }
        files.push(CapturedFile {
            path: entry.path.clone(),
            tokenized_path: path_tok.text,
            fingerprint,
            replaced,
            ambiguous,
            collision,
            content,
        });
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    (files, warnings)
}

/// What: Directory an artifact for `hostname` is written to.
///
/// Inputs:
/// - `root`: Backup destination.
/// - `hostname`: Source hostname.
/// - `per_host`: Use a per-host subdirectory.
///
/// Output:
/// - `root` or `root/<safe host>`.
#[must_use]
pub fn host_dir(root: &Path, hostname: &str, per_host: bool) -> PathBuf {
    if per_host {
        root.join(safe_file_component(hostname))
    } else {
        root.to_path_buf()
    }
}

/// What: Write an artifact without ever replacing an existing one.
///
/// Inputs:
/// - `dir`: Target directory (created when missing).
/// - `artifact`: Document to write.
///
/// Output:
/// - Path of the written file.
///
/// # Errors
/// - `DestinationUnwritable` when the directory cannot be written or an
///   artifact with the same identity exists.
///
/// Details:
/// - The document goes to a hidden temp file first and is then hard-linked
///   into place, which fails instead of overwriting.
pub fn write_artifact(dir: &Path, artifact: &BackupArtifact) -> Result<PathBuf> {
    let target = dir.join(artifact.file_name());
    let unwritable = |path: &Path, reason: String| MigratorError::DestinationUnwritable {
        path: path.to_path_buf(),
        reason,
    };
    fs::create_dir_all(dir).map_err(|e| unwritable(dir, e.to_string()))?;
    if target.exists() {
        return Err(unwritable(&target, "an artifact with this identity already exists".into()));
    }
    let body = serde_json::to_vec_pretty(artifact)?;
    let tmp = dir.join(format!(".{}.tmp", artifact.file_name()));
    fs::write(&tmp, body).map_err(|e| unwritable(&tmp, e.to_string()))?;
    let linked = fs::hard_link(&tmp, &target);
    let _ = fs::remove_file(&tmp);
    linked.map_err(|e| unwritable(&target, e.to_string()))?;
    tracing::info!(
        path = %target.display(),
        files = artifact.files.len(),
        packages = artifact.snapshot.packages.len(),
        "backup artifact written"
    );
    Ok(target)
}

/// What: Read and validate an artifact.
///
/// Inputs:
/// - `path`: Artifact file.
///
/// Output:
/// - Decoded artifact.
///
/// # Errors
/// - `ArtifactCorrupt` when the file is unreadable, not JSON, or of an unknown format.
pub fn load_artifact(path: &Path) -> Result<BackupArtifact> {
    let corrupt = |reason: String| MigratorError::ArtifactCorrupt {
        path: path.to_path_buf(),
        reason,
    };
    let body = fs::read(path).map_err(|e| corrupt(e.to_string()))?;
    let artifact: BackupArtifact =
        serde_json::from_slice(&body).map_err(|e| corrupt(e.to_string()))?;
    if artifact.format_version != ARTIFACT_FORMAT {
        return Err(corrupt(format!(
            "unsupported artifact format {}",
            artifact.format_version
        )));
    }
    if artifact.snapshot.format_version != SNAPSHOT_FORMAT {
        return Err(corrupt(format!(
            "unsupported snapshot format {}",
            artifact.snapshot.format_version
        )));
    }
    Ok(artifact)
}

/// One artifact found on disk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    /// Hostname component of the file name.
    pub host: String,
    /// Timestamp component of the file name.
    pub created_at: DateTime<Utc>,
    /// File path.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
}

/// What: List artifacts under a backup root.
///
/// Inputs:
/// - `root`: Backup destination (per-host subdirectories included).
///
/// Output:
/// - Artifacts of every host, newest first; ties by host then path.
#[must_use]
pub fn list_artifacts(root: &Path) -> Vec<ArtifactInfo> {
    let mut out: Vec<ArtifactInfo> = WalkDir::new(root)
        .max_depth(2)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let (host, created_at) = parse_file_name(&e.file_name().to_string_lossy())?;
            let size = e.metadata().map(|m| m.len()).unwrap_or_default();
            Some(ArtifactInfo {
                host,
                created_at,
                path: e.into_path(),
                size,
            })
        })
        .collect();
    out.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.host.cmp(&b.host))
            .then_with(|| a.path.cmp(&b.path))
    });
    out
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::snapshot::fixtures::sample;

    fn artifact_at(host: &str, secs: i64) -> BackupArtifact {
        let mut snapshot = sample();
        snapshot.host.hostname = host.into();
        BackupArtifact {
            format_version: ARTIFACT_FORMAT,
            hostname: host.into(),
            created_at: Utc.timestamp_opt(1_770_000_000 + secs, 0).single().expect("time"),
            snapshot,
            files: Vec::new(),
            warnings: Vec::new(),
        }
    }

    #[test]
    fn file_names_round_trip() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 7, 5, 9).single().expect("time");
        let name = artifact_file_name("work_laptop", at);
        assert_eq!(name, "migrator_backup_20260301_070509_work-laptop.json");
        assert_eq!(parse_file_name(&name), Some(("work-laptop".to_string(), at)));
        assert_eq!(parse_file_name("notes.json"), None);
        assert_eq!(parse_file_name("migrator_backup_2026_x.json"), None);
    }

    /// What: Same identity is refused, distinct ones coexist and list newest first.
    ///
    /// Inputs:
    /// - Two hosts writing into per-host directories, one duplicate write.
    ///
    /// Output:
    /// - Duplicate rejected with `DestinationUnwritable`; listing has three entries.
    #[test]
    fn write_never_overwrites_and_lists_newest_first() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path();
        let a1 = artifact_at("atlas", 0);
        let a2 = artifact_at("atlas", 60);
        let b1 = artifact_at("borealis", 30);
        for a in [&a1, &a2, &b1] {
            write_artifact(&host_dir(root, &a.hostname, true), a).expect("write");
        }
        let err = write_artifact(&host_dir(root, "atlas", true), &a1).expect_err("duplicate");
        assert!(matches!(err, MigratorError::DestinationUnwritable { .. }));

        let listed = list_artifacts(root);
        let order: Vec<(&str, i64)> = listed
            .iter()
            .map(|i| (i.host.as_str(), i.created_at.timestamp() - 1_770_000_000))
            .collect();
        assert_eq!(order, vec![("atlas", 60), ("borealis", 30), ("atlas", 0)]);
        assert!(listed.iter().all(|i| i.size > 0));

        let loaded = load_artifact(&listed[0].path).expect("load");
        assert_eq!(loaded, a2);
    }

    #[test]
    fn corrupt_or_foreign_format_is_rejected() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let bad = tmp.path().join("migrator_backup_20260301_070509_x.json");
        fs::write(&bad, "{not json").expect("write");
        assert!(matches!(load_artifact(&bad), Err(MigratorError::ArtifactCorrupt { .. })));

        let mut future = artifact_at("x", 0);
        future.format_version = 99;
        let path = write_artifact(tmp.path(), &future).expect("write");
        assert!(matches!(load_artifact(&path), Err(MigratorError::ArtifactCorrupt { .. })));
        assert!(matches!(
            load_artifact(&tmp.path().join("missing.json")),
            Err(MigratorError::ArtifactCorrupt { .. })
        ));
    }

    /// What: Text content is tokenized, binary kept, sensitive entries skipped.
    ///
    /// Inputs:
    /// - Root with a `.bashrc` naming the home dir, a binary file and a
    ///   snapshot entry marked sensitive.
    ///
    /// Output:
    /// - Two captured files; `.bashrc` content uses `${HOME}`.
    #[test]
    fn capture_tokenizes_text_and_skips_sensitive() {
        use crate::context::Context;
        use crate::paths::MigratorPaths;
        use crate::settings::Settings;
        use crate::snapshot::fixtures::{config, host};

        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path();
        let put = |logical: &str, body: &[u8]| {
            let p = root.join(logical.trim_start_matches('/'));
            fs::create_dir_all(p.parent().expect("parent")).expect("mkdir");
            fs::write(p, body).expect("write");
        };
        put("/home/ana/.bashrc", b"export PATH=/home/ana/bin:$PATH\n");
        put("/home/ana/.config/app/blob.bin", &[0xff, 0x00, 0xfe]);
        put("/home/ana/.gnupg/secring.gpg", b"secret");
        let ctx = Context::new(
            root.to_path_buf(),
            host("atlas", "ana"),
            MigratorPaths::under(&root.join("m")),
            Settings::default(),
        );
        let mut snapshot = sample();
        let mut secret = config("/home/ana/.gnupg/secring.gpg", b"secret");
        secret.sensitive = true;
        secret.portable = false;
        snapshot.configs = vec![
            config("/home/ana/.bashrc", b""),
            config("/home/ana/.config/app/blob.bin", b""),
            secret,
        ];
        let transform = PathTransform::new(ctx.host.identity());
        let (files, warnings) = capture_files(&ctx, &snapshot, &transform);
        assert!(warnings.is_empty());
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].tokenized_path, "${HOME}/.bashrc");
        assert_eq!(
            files[0].content,
            FileContent::Text {
                text: "export PATH=${HOME}/bin:$PATH\n".into()
            }
        );
        assert!(files[0].replaced.contains(&PathVariable::Home));
        assert!(matches!(files[1].content, FileContent::Binary { .. }));
    }

    /// What: Content substitution follows `scan.detect_content_variables`.
    ///
    /// Inputs:
    /// - A `.bashrc` naming the home dir, captured with the setting off.
    ///
    /// Output:
    /// - Content stored byte-for-byte; the path is still tokenized.
    #[test]
    fn capture_keeps_content_when_detection_is_off() {
        use crate::context::Context;
        use crate::paths::MigratorPaths;
        use crate::settings::Settings;
        use crate::snapshot::fixtures::{config, host};

        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path();
        let bashrc = root.join("home/ana/.bashrc");
        fs::create_dir_all(bashrc.parent().expect("parent")).expect("mkdir");
        fs::write(&bashrc, "export PATH=/home/ana/bin:$PATH\n").expect("write");
        let mut settings = Settings::default();
        settings.scan.detect_content_variables = false;
        let ctx = Context::new(
            root.to_path_buf(),
            host("atlas", "ana"),
            MigratorPaths::under(&root.join("m")),
            settings,
        );
        let mut snapshot = sample();
        snapshot.configs = vec![config("/home/ana/.bashrc", b"")];
        let transform = PathTransform::new(ctx.host.identity());
        let (files, _) = capture_files(&ctx, &snapshot, &transform);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].tokenized_path, "${HOME}/.bashrc");
        assert_eq!(
            files[0].content,
            FileContent::Text {
                text: "export PATH=/home/ana/bin:$PATH\n".into()
            }
        );
        assert!(files[0].replaced.iter().all(|v| *v == PathVariable::Home));
        assert!(!files[0].collision);
    }

    #[test]
    fn file_lookup_does_not_depend_on_order() {
        let mut artifact = artifact_at("atlas", 0);
        let captured = |path: &str| CapturedFile {
            path: path.into(),
            tokenized_path: path.into(),
            fingerprint: Fingerprint::of_bytes(b""),
            replaced: Vec::new(),
            ambiguous: Vec::new(),
            collision: false,
            content: FileContent::Text { text: String::new() },
        };
        artifact.files = vec![
            captured("/home/ana/.bashrc"),
            captured("/home/ana/.gitconfig"),
            captured("/home/ana/.config/fish/config.fish"),
        ];
        for path in ["/home/ana/.bashrc", "/home/ana/.gitconfig", "/home/ana/.config/fish/config.fish"] {
            assert!(artifact.file(path).is_some(), "{path}");
        }
        assert!(artifact.file("/home/ana/.zshrc").is_none());
    }
}
