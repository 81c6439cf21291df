//! User-editable override table (`package_mappings.json`).
//!
//! Schema: a JSON object mapping a package name to an object of
//! `manager kind → name on that manager`. Keys starting with `_` (such as
//! `_comment`) are ignored at both levels.

use std::fs;
use std::path::Path;

use serde_json::Value;

use super::MappingTable;
use crate::error::{MigratorError, Result};
use crate::managers::ManagerKind;

/// Skeleton written by `edit-mappings` when the file does not exist yet.
const SKELETON: &str = r#"{
  "_comment": "Package name mappings used when restoring onto a different package manager. Each entry maps a package name to {manager: name}. Managers: apt, dnf, pacman, flatpak, snap. Entries here win over the built-in table. Keys starting with _ are ignored.",
  "_example": {
    "_comment": "Rename to a real package name to activate.",
    "apt": "fd-find",
    "dnf": "fd-find",
    "pacman": "fd"
  }
}
"#;

/// Loaded overrides plus the problems found while reading them.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    /// Name → per-manager names.
    pub table: MappingTable,
    /// Skipped entries.
    pub warnings: Vec<String>,
}

/// What: Parse an override document.
///
/// Inputs:
/// - `body`: JSON text.
///
/// Output:
/// - Table with lowercase keys; unknown kinds and non-string names become warnings.
///
/// # Errors
/// - `Config` when the document is not a JSON object.
pub fn parse(body: &str) -> Result<Overrides> {
    let root: Value = serde_json::from_str(body)
        .map_err(|e| MigratorError::Config(format!("package mappings: {e}")))?;
    let Value::Object(entries) = root else {
        return Err(MigratorError::Config(
            "package mappings: top level must be an object".to_string(),
        ));
    };
    let mut out = Overrides::default();
    for (name, value) in entries {
        if name.starts_with('_') {
            continue;
        }
        let Value::Object(per_kind) = value else {
            out.warnings
                .push(format!("mapping `{name}` is not an object; skipped"));
            continue;
        };
        let slot = out.table.entry(name.to_lowercase()).or_default();
        for (kind, target) in per_kind {
            if kind.starts_with('_') {
                continue;
            }
            let Ok(kind_parsed) = kind.parse::<ManagerKind>() else {
                tracing::warn!(package = %name, manager = %kind, "unknown manager in mappings");
                out.warnings
                    .push(format!("mapping `{name}`: unknown manager `{kind}`"));
                continue;
            };
            match target {
                Value::String(t) if !t.trim().is_empty() => {
                    slot.insert(kind_parsed, t.trim().to_string());
                }
                _ => out
                    .warnings
                    .push(format!("mapping `{name}`.{kind} is not a package name")),
            }
        }
    }
    out.table.retain(|_, v| !v.is_empty());
    Ok(out)
}

/// What: Load the override file.
///
/// Inputs:
/// - `path`: Override file location.
///
/// Output:
/// - Empty overrides when the file does not exist.
///
/// # Errors
/// - `Io` on read failure, `Config` on malformed content.
pub fn load(path: &Path) -> Result<Overrides> {
    match fs::read_to_string(path) {
        Ok(body) => {
            let loaded = parse(&body)?;
            tracing::info!(
                path = %path.display(),
                entries = loaded.table.len(),
                "loaded custom package mappings"
            );
            Ok(loaded)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Overrides::default()),
        Err(e) => Err(e.into()),
    }
}

/// What: Create the override file with a documented skeleton when missing.
///
/// Inputs:
/// - `path`: Override file location.
///
/// Output:
/// - `true` when the file was created.
///
/// # Errors
/// - `DestinationUnwritable` when the directory or file cannot be written.
pub fn ensure_skeleton(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    let unwritable = |e: std::io::Error| MigratorError::DestinationUnwritable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(unwritable)?;
    }
    fs::write(path, SKELETON).map_err(unwritable)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// What: Comments are ignored and unknown kinds are reported.
    ///
    /// Inputs:
    /// - Document with a top-level comment, an entry comment, an unknown kind
    ///   and a non-object entry.
    ///
    /// Output:
    /// - One usable entry, two warnings.
    #[test]
    fn parse_skips_comments_and_unknown_kinds() {
        let body = r#"{
            "_comment": "mine",
            "Code": {"_comment": "vscode", "apt": "code", "pacman": "visual-studio-code-bin", "zypper": "code"},
            "broken": "nope"
        }"#;
        let o = parse(body).expect("parse");
        assert_eq!(o.table.len(), 1);
        let code = &o.table["code"];
        assert_eq!(code[&ManagerKind::Pacman], "visual-studio-code-bin");
        assert_eq!(o.warnings.len(), 2);
    }

    #[test]
    fn non_object_document_is_config_error() {
        assert!(matches!(parse("[1,2]"), Err(MigratorError::Config(_))));
        assert!(matches!(parse("{"), Err(MigratorError::Config(_))));
    }

    #[test]
    fn skeleton_is_created_once_and_loads_empty() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("cfg/package_mappings.json");
        assert!(load(&path).expect("missing").table.is_empty());
        assert!(ensure_skeleton(&path).expect("create"));
        assert!(!ensure_skeleton(&path).expect("exists"));
        let loaded = load(&path).expect("load");
        assert!(loaded.table.is_empty());
        assert!(loaded.warnings.is_empty());
    }
}
