//! Package version parsing and ordering.
//!
//! Debian, RPM and pacman versions all follow `[epoch:]upstream[-release]`.
//! Ordering compares epochs numerically, then upstream and release segment by
//! segment: digit runs numerically, letter runs lexically, a digit run sorts
//! above a letter run, and `~` sorts below everything including the end of
//! the string.

use std::cmp::Ordering;
use std::fmt;

/// A version split into its three components.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PackageVersion {
    /// Epoch, `0` when absent.
    pub epoch: u64,
    /// Upstream version.
    pub upstream: String,
    /// Distribution release/revision.
    pub release: Option<String>,
}

impl PackageVersion {
    /// What: Parse a version string leniently.
    ///
    /// Inputs:
    /// - `raw`: e.g. `1:2.3.4-5ubuntu1`, `2.0`, `7.4.1-1`.
    ///
    /// Output:
    /// - Parsed components. A non-numeric epoch is kept as part of upstream.
    ///
    /// Details:
    /// - The release is split on the last `-` so Debian upstream versions with
    ///   dashes keep them.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let (epoch, rest) = match raw.split_once(':') {
            Some((e, r)) if !e.is_empty() && e.chars().all(|c| c.is_ascii_digit()) => {
                (e.parse::<u64>().unwrap_or(0), r)
            }
            _ => (0, raw),
        };
        let (upstream, release) = match rest.rsplit_once('-') {
            Some((u, r)) if !u.is_empty() && !r.is_empty() => (u.to_string(), Some(r.to_string())),
            _ => (rest.to_string(), None),
        };
        Self {
            epoch,
            upstream,
            release,
        }
    }

    /// Compare on upstream only, ignoring epoch and release.
    #[must_use]
    pub fn cmp_upstream(&self, other: &Self) -> Ordering {
        compare_segments(&self.upstream, &other.upstream)
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(f, "{}:", self.epoch)?;
        }
        f.write_str(&self.upstream)?;
        if let Some(rel) = &self.release {
            write!(f, "-{rel}")?;
        }
        Ok(())
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| compare_segments(&self.upstream, &other.upstream))
            .then_with(|| match (&self.release, &other.release) {
                (Some(a), Some(b)) => compare_segments(a, b),
                // A missing release matches any release.
                _ => Ordering::Equal,
            })
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One comparable run inside a version component.
#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    /// `~`, sorts lowest.
    Tilde,
    /// Digit run with leading zeros removed.
    Num(&'a str),
    /// Letter run.
    Alpha(&'a str),
}

/// Split a component into segments, dropping other separators.
fn segments(s: &str) -> Vec<Segment<'_>> {
    let bytes = s.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c == b'~' {
            out.push(Segment::Tilde);
            i += 1;
        } else if c.is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            let digits = s[start..i].trim_start_matches('0');
            out.push(Segment::Num(digits));
        } else if c.is_ascii_alphabetic() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
                i += 1;
            }
            out.push(Segment::Alpha(&s[start..i]));
        } else {
            i += 1;
        }
    }
    out
}

/// What: Compare two version components segment by segment.
///
/// Inputs:
/// - `a`, `b`: Upstream or release strings.
///
/// Output:
/// - Ordering of `a` relative to `b`.
#[must_use]
pub fn compare_segments(a: &str, b: &str) -> Ordering {
    let sa = segments(a);
    let sb = segments(b);
    for pair in sa.iter().zip(sb.iter()) {
        let ord = match pair {
            (Segment::Tilde, Segment::Tilde) => Ordering::Equal,
            (Segment::Tilde, _) => Ordering::Less,
            (_, Segment::Tilde) => Ordering::Greater,
            (Segment::Num(x), Segment::Num(y)) => x.len().cmp(&y.len()).then_with(|| x.cmp(y)),
            (Segment::Alpha(x), Segment::Alpha(y)) => x.cmp(y),
            (Segment::Num(_), Segment::Alpha(_)) => Ordering::Greater,
            (Segment::Alpha(_), Segment::Num(_)) => Ordering::Less,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    match sa.len().cmp(&sb.len()) {
        Ordering::Equal => Ordering::Equal,
        Ordering::Less => {
            if sb[sa.len()] == Segment::Tilde {
                Ordering::Greater
            } else {
                Ordering::Less
            }
        }
        Ordering::Greater => {
            if sa[sb.len()] == Segment::Tilde {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        }
    }
}

/// What: Compare two raw version strings.
///
/// Inputs:
/// - `a`, `b`: Version strings as reported by a backend.
/// - `upstream_only`: Ignore epoch and release (used across backend families).
///
/// Output:
/// - Ordering of `a` relative to `b`.
#[must_use]
pub fn compare_versions(a: &str, b: &str, upstream_only: bool) -> Ordering {
    let va = PackageVersion::parse(a);
    let vb = PackageVersion::parse(b);
    if upstream_only {
        va.cmp_upstream(&vb)
    } else {
        va.cmp(&vb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_components() {
        let v = PackageVersion::parse("1:2.3.4-5ubuntu1");
        assert_eq!(v.epoch, 1);
        assert_eq!(v.upstream, "2.3.4");
        assert_eq!(v.release.as_deref(), Some("5ubuntu1"));
        assert_eq!(v.to_string(), "1:2.3.4-5ubuntu1");

        let plain = PackageVersion::parse("2.0");
        assert_eq!(plain.epoch, 0);
        assert_eq!(plain.release, None);
    }

    /// What: Numeric segments compare as numbers, not strings.
    ///
    /// Inputs:
    /// - Pairs such as `2.10` vs `2.9` and `1.0~rc1` vs `1.0`.
    ///
    /// Output:
    /// - Orderings matching package-manager semantics.
    #[test]
    fn ordering_rules() {
        assert_eq!(compare_versions("2.10", "2.9", false), Ordering::Greater);
        assert_eq!(compare_versions("2.0", "2.1", false), Ordering::Less);
        assert_eq!(compare_versions("1.0~rc1", "1.0", false), Ordering::Less);
        assert_eq!(compare_versions("1:1.0", "2.0", false), Ordering::Greater);
        assert_eq!(compare_versions("1.0a", "1.0", false), Ordering::Greater);
        assert_eq!(compare_versions("007", "7", false), Ordering::Equal);
        assert_eq!(compare_versions("2.0-1", "2.0-2", false), Ordering::Less);
    }

    #[test]
    fn upstream_only_ignores_epoch_and_release() {
        assert_eq!(
            compare_versions("1:2.0-3ubuntu1", "2.0-1.fc40", true),
            Ordering::Equal
        );
        assert_eq!(compare_versions("2.0-1", "2.1-9", true), Ordering::Less);
    }
}
