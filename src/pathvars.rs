//! Host-identity placeholders in paths and text content.
//!
//! At capture time the source host's home directory, username and hostname
//! are replaced by `${HOME}`, `${USERNAME}` and `${HOSTNAME}`. At restore time
//! the placeholders are resolved to the destination host's values.
//!
//! Matching is exact and anchored: a value only matches when the characters
//! on both sides are not ASCII alphanumerics, `_` or `-`. Values that are too
//! short or too generic to identify a host are never rewritten; they are
//! reported as ambiguous instead. Text that already contains a placeholder
//! literal is left alone so resolving with the source identity always
//! reproduces the original.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MigratorError;

/// One host-identity variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathVariable {
    /// Home directory.
    Home,
    /// Login name.
    Username,
    /// Hostname.
    Hostname,
}

impl PathVariable {
    /// All variables.
    pub const ALL: [Self; 3] = [Self::Home, Self::Username, Self::Hostname];

    /// Placeholder literal.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Home => "${HOME}",
            Self::Username => "${USERNAME}",
            Self::Hostname => "${HOSTNAME}",
        }
    }

    /// Upper-case variable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Home => "HOME",
            Self::Username => "USERNAME",
            Self::Hostname => "HOSTNAME",
        }
    }
}

impl fmt::Display for PathVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identity values of one host.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostIdentity {
    /// Login name.
    pub username: String,
    /// Hostname.
    pub hostname: String,
    /// Home directory as a string.
    pub home: String,
}

impl HostIdentity {
    /// Value bound to `var`.
    #[must_use]
    pub fn value(&self, var: PathVariable) -> &str {
        match var {
            PathVariable::Home => &self.home,
            PathVariable::Username => &self.username,
            PathVariable::Hostname => &self.hostname,
        }
    }
}

/// Words that name too many hosts or users to be treated as identity.
const GENERIC_VALUES: &[&str] = &[
    "root",
    "user",
    "users",
    "admin",
    "administrator",
    "localhost",
    "localdomain",
    "linux",
    "home",
    "test",
    "guest",
    "default",
    "unknown",
    "server",
    "desktop",
    "laptop",
    "computer",
    "host",
    "ubuntu",
    "debian",
    "fedora",
    "arch",
    "live",
];

/// Characters that continue a word for anchoring purposes.
const fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

/// Whether `text[start..end]` is bounded by non-word characters.
fn anchored(text: &str, start: usize, end: usize) -> bool {
    let bytes = text.as_bytes();
    let before_ok = start == 0 || !is_word_byte(bytes[start - 1]);
    let after_ok = end >= bytes.len() || !is_word_byte(bytes[end]);
    before_ok && after_ok
}

/// Whether `text` already contains any placeholder literal.
#[must_use]
pub fn contains_placeholder(text: &str) -> bool {
    PathVariable::ALL.iter().any(|v| text.contains(v.token()))
}

/// Result of tokenizing one path or text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokenized {
    /// Text with placeholders substituted.
    pub text: String,
    /// Variables that were replaced at least once.
    pub replaced: Vec<PathVariable>,
    /// Ambiguous variables that occur in the text and were left unchanged.
    pub ambiguous: Vec<PathVariable>,
    /// The input already contained placeholder literals and was left unchanged.
    pub collision: bool,
}

impl Tokenized {
    /// Whether any placeholder was inserted.
    #[must_use]
    pub fn changed(&self) -> bool {
        !self.replaced.is_empty()
    }
}

/// Capture-side transform bound to the source host's identity.
#[derive(Clone, Debug)]
pub struct PathTransform {
    /// Source identity.
    source: HostIdentity,
    /// Rewritable variables, longest value first.
    usable: Vec<PathVariable>,
    /// Variables whose values are too generic to rewrite.
    ambiguous: Vec<PathVariable>,
}

impl PathTransform {
    /// What: Prepare a transform for `source`.
    ///
    /// Inputs:
    /// - `source`: Identity of the host being captured.
    ///
    /// Output:
    /// - Transform with each variable classified as usable or ambiguous.
    ///
    /// Details:
    /// - A value is ambiguous when shorter than 3 characters, listed as a
    ///   generic word, or, for the home directory, equal to `/`.
    #[must_use]
    pub fn new(source: HostIdentity) -> Self {
        let (mut usable, ambiguous): (Vec<_>, Vec<_>) = PathVariable::ALL
            .into_iter()
            .partition(|v| !Self::is_ambiguous_value(*v, source.value(*v)));
        usable.sort_by_key(|v| std::cmp::Reverse(source.value(*v).len()));
        for v in &ambiguous {
            tracing::debug!(variable = %v, value = %source.value(*v), "path variable treated as ambiguous");
        }
        Self {
            source,
            usable,
            ambiguous,
        }
    }

    /// Whether `value` is unsafe to treat as identity for `var`.
    fn is_ambiguous_value(var: PathVariable, value: &str) -> bool {
        let v = value.trim();
        if var == PathVariable::Home {
            let trimmed = v.trim_end_matches('/');
            return trimmed.len() < 3;
        }
        v.chars().count() < 3 || GENERIC_VALUES.contains(&v.to_ascii_lowercase().as_str())
    }

    /// Source identity.
    #[must_use]
    pub const fn source(&self) -> &HostIdentity {
        &self.source
    }

    /// Variables that will never be rewritten.
    #[must_use]
    pub fn ambiguous_variables(&self) -> &[PathVariable] {
        &self.ambiguous
    }

    /// What: Build the error reported for an ambiguous variable.
    ///
    /// Inputs:
    /// - `var`: Ambiguous variable.
    ///
    /// Output:
    /// - `PathTransformAmbiguous` carrying the captured value.
    #[must_use]
    pub fn ambiguity(&self, var: PathVariable) -> MigratorError {
        MigratorError::PathTransformAmbiguous {
            variable: var.name().to_string(),
            value: self.source.value(var).to_string(),
        }
    }

    /// Whether `var`'s value occurs anchored anywhere in `text`.
    fn occurs(&self, text: &str, var: PathVariable) -> bool {
        let value = self.source.value(var);
        !value.is_empty()
            && text
                .match_indices(value)
                .any(|(i, m)| anchored(text, i, i + m.len()))
    }

    /// What: List variables with anchored occurrences in `text`.
    ///
    /// Inputs:
    /// - `text`: Path or file content.
    ///
    /// Output:
    /// - Sorted variables found, ambiguous ones included.
    #[must_use]
    pub fn detect(&self, text: &str) -> Vec<PathVariable> {
        PathVariable::ALL
            .into_iter()
            .filter(|v| self.occurs(text, *v))
            .collect()
    }

    /// Longest usable variable matching at byte offset `i`.
    fn match_at(&self, text: &str, i: usize) -> Option<(PathVariable, usize)> {
        let rest = &text[i..];
        self.usable.iter().find_map(|var| {
            let value = self.source.value(*var);
            (!value.is_empty() && rest.starts_with(value) && anchored(text, i, i + value.len()))
                .then_some((*var, value.len()))
        })
    }

    /// What: Replace anchored identity values with placeholders.
    ///
    /// Inputs:
    /// - `text`: Path or UTF-8 file content.
    ///
    /// Output:
    /// - [`Tokenized`] with the rewritten text and what was replaced.
    ///
    /// Details:
    /// - Single left-to-right pass; at each position the longest value wins,
    ///   so `/home/ana` becomes `${HOME}` rather than `/home/${USERNAME}`.
    #[must_use]
    pub fn tokenize(&self, text: &str) -> Tokenized {
        let ambiguous: Vec<PathVariable> = self
            .ambiguous
            .iter()
            .copied()
            .filter(|v| self.occurs(text, *v))
            .collect();
        if contains_placeholder(text) {
            return Tokenized {
                text: text.to_string(),
                replaced: Vec::new(),
                ambiguous,
                collision: true,
            };
        }

        let mut out = String::with_capacity(text.len());
        let mut replaced = BTreeSet::new();
        let mut i = 0;
        while i < text.len() {
            if let Some((var, len)) = self.match_at(text, i) {
                out.push_str(var.token());
                replaced.insert(var);
                i += len;
                continue;
            }
            let Some(ch) = text[i..].chars().next() else {
                break;
            };
            out.push(ch);
            i += ch.len_utf8();
        }
        Tokenized {
            text: out,
            replaced: replaced.into_iter().collect(),
            ambiguous,
            collision: false,
        }
    }
}

/// What: Resolve placeholders against a destination identity.
///
/// Inputs:
/// - `text`: Tokenized path or content.
/// - `dest`: Destination host identity.
///
/// Output:
/// - Text with every placeholder replaced by the destination value.
#[must_use]
pub fn resolve(text: &str, dest: &HostIdentity) -> String {
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < text.len() {
        let rest = &text[i..];
        if rest.starts_with("${")
            && let Some(var) = PathVariable::ALL
                .into_iter()
                .find(|v| rest.starts_with(v.token()))
        {
            out.push_str(dest.value(var));
            i += var.token().len();
            continue;
        }
        let Some(ch) = rest.chars().next() else {
            break;
        };
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}
