//! Line-oriented parsing helpers for the plain-text files migrator reads.
//!
//! `os-release`, `pacman.conf`, `*.repo` files and APT source lists all share
//! the same building blocks: comment skipping, `key=value` splitting and
//! `[section]` headers.

/// What: Check if a line carries no data (blank or a comment).
///
/// Inputs:
/// - `line`: Raw line.
///
/// Output:
/// - `true` when the line is empty or starts with `#` or `;`.
pub fn skip_comment_or_empty(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';')
}

/// What: Split a `key=value` line.
///
/// Inputs:
/// - `line`: Line containing `key=value` (spaces around `=` allowed).
///
/// Output:
/// - `Some((key, value))` with both sides trimmed and surrounding quotes
///   removed from the value; `None` when there is no `=` or the key is empty.
///
/// Details:
/// - Splits on the first `=` only, so URLs with query strings survive.
pub fn parse_key_value(line: &str) -> Option<(String, String)> {
    let (key, value) = line.trim().split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), unquote(value.trim()).to_string()))
}

/// Remove one pair of matching single or double quotes.
pub fn unquote(value: &str) -> &str {
    for q in ['"', '\''] {
        if let Some(inner) = value.strip_prefix(q).and_then(|v| v.strip_suffix(q)) {
            return inner;
        }
    }
    value
}

/// What: Return the section name when `line` is an INI header.
///
/// Inputs:
/// - `line`: Raw line such as `[extra]`.
///
/// Output:
/// - `Some("extra")` for headers, `None` otherwise.
pub fn section_header(line: &str) -> Option<&str> {
    let t = line.trim();
    let inner = t.strip_prefix('[')?.strip_suffix(']')?.trim();
    if inner.is_empty() { None } else { Some(inner) }
}

/// One `[section]` of an INI-style file with its key/value pairs in file order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IniSection {
    /// Section name without brackets.
    pub name: String,
    /// Key/value pairs in file order; duplicate keys are kept.
    pub entries: Vec<(String, String)>,
}

impl IniSection {
    /// First value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All values stored under `key`.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// What: Parse an INI-style document into sections.
///
/// Inputs:
/// - `body`: Whole file content.
///
/// Output:
/// - Sections in file order. Keys before the first header are dropped.
///
/// Details:
/// - Bare words inside a section (pacman's `ILoveCandy`, `Color`) are stored
///   with an empty value.
pub fn parse_ini(body: &str) -> Vec<IniSection> {
    let mut sections: Vec<IniSection> = Vec::new();
    for line in body.lines() {
        if skip_comment_or_empty(line) {
            continue;
        }
        if let Some(name) = section_header(line) {
            sections.push(IniSection {
                name: name.to_string(),
                entries: Vec::new(),
            });
            continue;
        }
        let Some(current) = sections.last_mut() else {
            continue;
        };
        let pair = parse_key_value(line).unwrap_or_else(|| (line.trim().to_string(), String::new()));
        current.entries.push(pair);
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_strips_quotes_and_keeps_later_equals() {
        assert_eq!(
            parse_key_value(r#"PRETTY_NAME="Debian GNU/Linux 12""#),
            Some(("PRETTY_NAME".into(), "Debian GNU/Linux 12".into()))
        );
        assert_eq!(
            parse_key_value("baseurl = https://x.example/repo?arch=x86_64"),
            Some(("baseurl".into(), "https://x.example/repo?arch=x86_64".into()))
        );
        assert_eq!(parse_key_value("no separator"), None);
        assert_eq!(parse_key_value(" = value"), None);
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        assert!(skip_comment_or_empty("   "));
        assert!(skip_comment_or_empty("# comment"));
        assert!(skip_comment_or_empty("; comment"));
        assert!(!skip_comment_or_empty("[core]"));
    }

    /// What: INI parsing keeps section order, duplicate keys and bare words.
    ///
    /// Inputs:
    /// - A pacman.conf fragment.
    ///
    /// Output:
    /// - Two sections, `Server` values in order, `Color` with an empty value.
    #[test]
    fn ini_sections_parse_pacman_conf() {
        let body = "\
# comment
[options]
Color
HoldPkg = pacman glibc

[chaotic-aur]
Server = https://a.example/$repo/$arch
Server = https://b.example/$repo/$arch
";
        let sections = parse_ini(body);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].name, "options");
        assert_eq!(sections[0].get("Color"), Some(""));
        assert_eq!(sections[0].get("HoldPkg"), Some("pacman glibc"));
        let servers: Vec<&str> = sections[1].get_all("Server").collect();
        assert_eq!(
            servers,
            vec!["https://a.example/$repo/$arch", "https://b.example/$repo/$arch"]
        );
    }
}
