//! Shared utilities for argument processing.

use std::path::Path;

use migrator::error::{MigratorError, Result};

/// What: Determine the log level based on command-line arguments.
///
/// Inputs:
/// - `args`: Parsed command-line arguments.
///
/// Output:
/// - Log level string (trace, debug, info, warn, error).
///
/// Details:
/// - Verbose flag overrides `--log-level`.
/// - An unknown `--log-level` falls back to `info` with a note on stderr.
/// - `RUST_LOG` is handled by the subscriber and wins over both.
pub fn determine_log_level(args: &crate::args::Args) -> String {
    if args.verbose {
        return "debug".to_string();
    }
    crate::args::definition::checked_level(&args.log_level).unwrap_or_else(|e| {
        eprintln!("{e}; using info");
        "info".to_string()
    })
}

/// What: Pick the editor for `edit-mappings`.
///
/// Inputs:
/// - `visual`, `editor`: Values of `$VISUAL` and `$EDITOR`.
///
/// Output:
/// - The first non-empty value, else `vi`.
pub fn pick_editor(visual: Option<String>, editor: Option<String>) -> String {
    [visual, editor]
        .into_iter()
        .flatten()
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
        .unwrap_or_else(|| "vi".to_string())
}

/// What: Open `path` in the operator's editor and wait for it.
///
/// Inputs:
/// - `path`: File to edit.
///
/// # Errors
/// - `Config` when the editor cannot be started; `CommandFailed`
///   when it exits non-zero.
///
/// Details:
/// - The editor value may carry arguments (`code --wait`); it is split on whitespace.
pub fn open_in_editor(path: &Path) -> Result<()> {
    let editor = pick_editor(std::env::var("VISUAL").ok(), std::env::var("EDITOR").ok());
    let mut parts = editor.split_whitespace();
    let program = parts.next().unwrap_or("vi");
    tracing::info!(editor = %editor, path = %path.display(), "opening mapping file");
    let status = std::process::Command::new(program)
        .args(parts)
        .arg(path)
        .status()
        .map_err(|e| MigratorError::Config(format!("cannot start editor `{program}`: {e}")))?;
    if status.success() {
        Ok(())
    } else {
        Err(MigratorError::CommandFailed {
            command: format!("{editor} {}", path.display()),
            code: status.code(),
            stderr: String::new(),
        })
    }
}
