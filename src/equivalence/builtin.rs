//! Well-known package names that differ across distribution families.

use crate::managers::ManagerKind::{self, Apt, Dnf, Pacman};

use super::MappingTable;

/// `(canonical name, [(backend, name on that backend)])`.
type Entry = (&'static str, &'static [(ManagerKind, &'static str)]);

const BUILTIN: &[Entry] = &[
    // desktop applications
    ("libreoffice", &[(Apt, "libreoffice"), (Dnf, "libreoffice"), (Pacman, "libreoffice-still")]),
    ("firefox", &[(Apt, "firefox"), (Dnf, "firefox"), (Pacman, "firefox")]),
    ("chromium", &[(Apt, "chromium-browser"), (Dnf, "chromium"), (Pacman, "chromium")]),
    ("thunderbird", &[(Apt, "thunderbird"), (Dnf, "thunderbird"), (Pacman, "thunderbird")]),
    ("vlc", &[(Apt, "vlc"), (Dnf, "vlc"), (Pacman, "vlc")]),
    // build tooling
    ("git", &[(Apt, "git"), (Dnf, "git"), (Pacman, "git")]),
    ("gcc", &[(Apt, "gcc"), (Dnf, "gcc"), (Pacman, "gcc")]),
    ("g++", &[(Apt, "g++"), (Dnf, "gcc-c++"), (Pacman, "gcc")]),
    ("make", &[(Apt, "make"), (Dnf, "make"), (Pacman, "make")]),
    ("cmake", &[(Apt, "cmake"), (Dnf, "cmake"), (Pacman, "cmake")]),
    ("python3", &[(Apt, "python3"), (Dnf, "python3"), (Pacman, "python")]),
    ("python3-pip", &[(Apt, "python3-pip"), (Dnf, "python3-pip"), (Pacman, "python-pip")]),
    ("golang", &[(Apt, "golang-go"), (Dnf, "golang"), (Pacman, "go")]),
    ("rust", &[(Apt, "rustc"), (Dnf, "rust"), (Pacman, "rust")]),
    ("nodejs", &[(Apt, "nodejs"), (Dnf, "nodejs"), (Pacman, "nodejs")]),
    // command-line tools
    ("htop", &[(Apt, "htop"), (Dnf, "htop"), (Pacman, "htop")]),
    ("curl", &[(Apt, "curl"), (Dnf, "curl"), (Pacman, "curl")]),
    ("wget", &[(Apt, "wget"), (Dnf, "wget"), (Pacman, "wget")]),
    ("nano", &[(Apt, "nano"), (Dnf, "nano"), (Pacman, "nano")]),
    ("vim", &[(Apt, "vim"), (Dnf, "vim-enhanced"), (Pacman, "vim")]),
    ("fd", &[(Apt, "fd-find"), (Dnf, "fd-find"), (Pacman, "fd")]),
    ("openssh-client", &[(Apt, "openssh-client"), (Dnf, "openssh-clients"), (Pacman, "openssh")]),
    ("gnupg", &[(Apt, "gnupg"), (Dnf, "gnupg2"), (Pacman, "gnupg")]),
    ("p7zip", &[(Apt, "p7zip-full"), (Dnf, "p7zip"), (Pacman, "p7zip")]),
    ("docker", &[(Apt, "docker.io"), (Dnf, "moby-engine"), (Pacman, "docker")]),
    // media
    ("ffmpeg", &[(Apt, "ffmpeg"), (Dnf, "ffmpeg"), (Pacman, "ffmpeg")]),
    ("gstreamer", &[
        (Apt, "gstreamer1.0-plugins-good"),
        (Dnf, "gstreamer1-plugins-good"),
        (Pacman, "gst-plugins-good"),
    ]),
    ("gstreamer-plugins-bad", &[
        (Apt, "gstreamer1.0-plugins-bad"),
        (Dnf, "gstreamer1-plugins-bad-free"),
        (Pacman, "gst-plugins-bad"),
    ]),
    ("gstreamer-plugins-ugly", &[
        (Apt, "gstreamer1.0-plugins-ugly"),
        (Dnf, "gstreamer1-plugins-ugly-free"),
        (Pacman, "gst-plugins-ugly"),
    ]),
];

/// Built-in mapping table.
#[must_use]
pub fn table() -> MappingTable {
    BUILTIN
        .iter()
        .map(|(key, names)| {
            (
                (*key).to_string(),
                names.iter().map(|(k, n)| (*k, (*n).to_string())).collect(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_entry_covers_the_native_managers() {
        for (key, names) in BUILTIN {
            for kind in [Apt, Dnf, Pacman] {
                assert!(
                    names.iter().any(|(k, _)| *k == kind),
                    "{key} lacks a {kind} name"
                );
            }
        }
        assert_eq!(table().len(), BUILTIN.len());
    }
}
