//! Small helpers shared across modules: subprocess plumbing, text parsing,
//! version ordering, and path/name sanitizing.

pub mod command;
pub mod config;
pub mod version;

use std::path::{Path, PathBuf};

/// What: Format a UTC timestamp as `YYYY-MM-DD HH:MM:SS`.
///
/// Inputs:
/// - `ts`: Timestamp to render.
///
/// Output:
/// - Rendered string used in logs and reports.
#[must_use]
pub fn ts_to_date(ts: chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// What: Turn a hostname into something safe to embed in a file name.
///
/// Inputs:
/// - `name`: Raw hostname.
///
/// Output:
/// - ASCII alphanumerics, `-` and `.` kept; everything else becomes `-`.
///   An empty result becomes `unknown-host`.
///
/// Details:
/// - `_` is replaced as well because it separates fields in artifact names.
#[must_use]
pub fn safe_file_component(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unknown-host".to_string()
    } else {
        cleaned
    }
}

/// What: Expand a leading `~` against `home`.
///
/// Inputs:
/// - `raw`: Path as written by the user.
/// - `home`: Home directory to substitute.
///
/// Output:
/// - Expanded path; other paths are returned unchanged.
#[must_use]
pub fn expand_tilde(raw: &str, home: &Path) -> PathBuf {
    if raw == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = raw.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(raw)
}
