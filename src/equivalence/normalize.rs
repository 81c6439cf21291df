//! Name normalization and distribution naming conventions.

use crate::managers::ManagerKind;

/// Names too generic to search for.
const GENERIC: &[&str] = &["lib", "dev", "bin", "core"];

/// One naming convention: the affix each native backend uses for the same
/// kind of package. An empty affix means the backend ships it in the base package.
struct AffixRule {
    prefix: bool,
    apt: &'static [&'static str],
    dnf: &'static [&'static str],
    pacman: &'static [&'static str],
}

const RULES: &[AffixRule] = &[
    AffixRule {
        prefix: false,
        apt: &["-dev"],
        dnf: &["-devel"],
        pacman: &[""],
    },
    AffixRule {
        prefix: false,
        apt: &["-dbg"],
        dnf: &["-debuginfo"],
        pacman: &["-debug"],
    },
    AffixRule {
        prefix: true,
        apt: &["python3-"],
        dnf: &["python3-"],
        pacman: &["python-"],
    },
];

impl AffixRule {
    fn affixes(&self, kind: ManagerKind) -> &'static [&'static str] {
        match kind {
            ManagerKind::Apt => self.apt,
            ManagerKind::Dnf => self.dnf,
            ManagerKind::Pacman => self.pacman,
            ManagerKind::Flatpak | ManagerKind::Snap | ManagerKind::AppImage => &[],
        }
    }

    /// Base name when `name` carries one of `kind`'s affixes.
    fn strip<'a>(&self, kind: ManagerKind, name: &'a str) -> Option<&'a str> {
        self.affixes(kind)
            .iter()
            .filter(|a| !a.is_empty())
            .find_map(|a| {
                if self.prefix {
                    name.strip_prefix(a)
                } else {
                    name.strip_suffix(a)
                }
            })
            .filter(|base| !base.is_empty())
    }

    fn apply(&self, affix: &str, base: &str) -> String {
        if self.prefix {
            format!("{affix}{base}")
        } else {
            format!("{base}{affix}")
        }
    }
}

/// What: Normalize a package name for table lookup and similarity search.
///
/// Inputs:
/// - `name`: Raw name.
///
/// Output:
/// - Lowercase, `_` replaced by `-`, parenthesized qualifiers removed, trimmed.
#[must_use]
pub fn normalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut depth = 0usize;
    for c in name.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth > 0 => {}
            '_' => out.push('-'),
            _ => out.extend(c.to_lowercase()),
        }
    }
    out.trim().trim_matches('-').to_string()
}

/// Whether a name is too short or generic to search for.
#[must_use]
pub fn is_too_generic(name: &str) -> bool {
    name.chars().count() < 3 || GENERIC.contains(&name)
}

/// What: Rewrite a name from one backend's conventions to another's.
///
/// Inputs:
/// - `from`: Source backend.
/// - `name`: Normalized source name.
/// - `to`: Target backend.
///
/// Output:
/// - Candidate names in rule order; empty when no rule applies.
///
/// Details:
/// - `libfoo-dev` on apt becomes `libfoo-devel` on dnf and `libfoo` on pacman;
///   `python-foo` on pacman becomes `python3-foo` elsewhere.
#[must_use]
pub fn rewrite(from: ManagerKind, name: &str, to: ManagerKind) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for rule in RULES {
        let Some(base) = rule.strip(from, name) else {
            continue;
        };
        for affix in rule.affixes(to) {
            let candidate = rule.apply(affix, base);
            if candidate != name && !out.contains(&candidate) {
                out.push(candidate);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_rules() {
        assert_eq!(normalize("Foo_Bar (x86_64)"), "foo-bar");
        assert_eq!(normalize("  LibreOffice "), "libreoffice");
        assert_eq!(normalize("gtk+3.0"), "gtk+3.0");
    }

    #[test]
    fn generic_names() {
        assert!(is_too_generic("lib"));
        assert!(is_too_generic("qt"));
        assert!(!is_too_generic("zsh"));
    }

    /// What: Affix rules translate between conventions in both directions.
    ///
    /// Inputs:
    /// - `-dev`, `-devel`, `-dbg` and `python-` names across apt, dnf and pacman.
    ///
    /// Output:
    /// - The target backend's spelling.
    #[test]
    fn rewrite_between_conventions() {
        use ManagerKind::{Apt, Dnf, Pacman};
        assert_eq!(rewrite(Apt, "libssl-dev", Dnf), vec!["libssl-devel"]);
        assert_eq!(rewrite(Dnf, "zlib-devel", Apt), vec!["zlib-dev"]);
        assert_eq!(rewrite(Apt, "libpng-dev", Pacman), vec!["libpng"]);
        assert_eq!(rewrite(Apt, "gdb-dbg", Dnf), vec!["gdb-debuginfo"]);
        assert_eq!(rewrite(Pacman, "python-requests", Apt), vec!["python3-requests"]);
        assert_eq!(rewrite(Dnf, "python3-requests", Pacman), vec!["python-requests"]);
        assert!(rewrite(Pacman, "libpng", Apt).is_empty());
        assert!(rewrite(Apt, "vim", ManagerKind::Flatpak).is_empty());
    }
}
