//! Content fingerprints for tracked files.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// SHA-256, size and modification time of one file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Lowercase hex digest.
    pub sha256: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time, when the filesystem reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtime: Option<DateTime<Utc>>,
}

impl Fingerprint {
    /// Whether two fingerprints describe the same content; mtime is ignored.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.sha256 == other.sha256 && self.size == other.size
    }

    /// What: Fingerprint an in-memory buffer.
    ///
    /// Inputs:
    /// - `bytes`: Content.
    ///
    /// Output:
    /// - Fingerprint without mtime.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self {
            sha256: hex(&Sha256::digest(bytes)),
            size: bytes.len() as u64,
            mtime: None,
        }
    }
}

/// Lowercase hex rendering of a digest.
fn hex(digest: &[u8]) -> String {
    use std::fmt::Write;
    digest.iter().fold(String::with_capacity(64), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

/// What: Fingerprint a file on disk.
///
/// Inputs:
/// - `path`: File to read.
///
/// Output:
/// - Digest streamed through `Sha256`, plus size and mtime from metadata.
///
/// # Errors
/// - Open, read or metadata failures.
pub fn fingerprint_file(path: &Path) -> io::Result<Fingerprint> {
    let file = File::open(path)?;
    let meta = file.metadata()?;
    let mut hasher = Sha256::new();
    io::copy(&mut BufReader::new(file), &mut hasher)?;
    Ok(Fingerprint {
        sha256: hex(&hasher.finalize()),
        size: meta.len(),
        mtime: meta.modified().ok().map(DateTime::<Utc>::from),
    })
}
