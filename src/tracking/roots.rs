//! Fixed root locations per tracker category.
//!
//! Entries starting with `~/` are relative to the tracked user's home. An
//! entry containing `*` is a glob; otherwise directories are walked and
//! files are taken as they are.

/// System-wide configuration. Repository definitions and the mount table are
/// owned by the package and fstab scanners and are not listed here.
pub const SYSTEM: &[&str] = &[
    "/etc/hosts",
    "/etc/hostname",
    "/etc/environment",
    "/etc/locale.conf",
    "/etc/locale.gen",
    "/etc/vconsole.conf",
    "/etc/timezone",
    "/etc/default/grub",
    "/etc/default/locale",
    "/etc/default/keyboard",
    "/etc/profile.d",
    "/etc/bash.bashrc",
    "/etc/zsh",
    "/etc/sysctl.conf",
    "/etc/sysctl.d",
    "/etc/modprobe.d",
    "/etc/modules-load.d",
    "/etc/mkinitcpio.conf",
    "/etc/dracut.conf.d",
    "/etc/NetworkManager/NetworkManager.conf",
    "/etc/NetworkManager/conf.d",
    "/etc/NetworkManager/system-connections",
    "/etc/ssh/ssh_config",
    "/etc/ssh/sshd_config",
    "/etc/sudoers",
    "/etc/sudoers.d",
    "/etc/security/limits.conf",
    "/etc/systemd/system/*.service",
    "/etc/systemd/system/*.timer",
    "/etc/systemd/logind.conf",
    "/etc/crontab",
    "/etc/cron.d",
    "/etc/X11/xorg.conf",
    "/etc/X11/xorg.conf.d",
    "/etc/udev/rules.d",
    "/etc/fonts/local.conf",
];

/// User dotfiles and application configuration.
pub const USER: &[&str] = &[
    "~/.bashrc",
    "~/.bash_profile",
    "~/.bash_aliases",
    "~/.profile",
    "~/.zshrc",
    "~/.zprofile",
    "~/.config/fish",
    "~/.inputrc",
    "~/.config/starship.toml",
    "~/.gitconfig",
    "~/.config/git",
    "~/.vimrc",
    "~/.config/nvim",
    "~/.emacs.d/init.el",
    "~/.config/helix",
    "~/.tmux.conf",
    "~/.config/tmux",
    "~/.config/alacritty",
    "~/.config/kitty",
    "~/.config/wezterm",
    "~/.config/foot",
    "~/.config/htop",
    "~/.config/Code/User/settings.json",
    "~/.config/Code/User/keybindings.json",
    "~/.mozilla/firefox/*/prefs.js",
    "~/.mozilla/firefox/*/user.js",
    "~/.config/chromium/Default/Preferences",
    "~/.config/google-chrome/Default/Preferences",
    "~/.ssh/config",
    "~/.ssh/id_*",
    "~/.gnupg",
    "~/.local/share/keyrings",
];

/// Roots captured whatever desktop is running.
pub const DESKTOP_COMMON: &[&str] = &[
    "~/.config/autostart",
    "~/.local/share/applications/*.desktop",
    "~/.config/mimeapps.list",
    "~/.config/user-dirs.dirs",
];

/// Desktop environments, keyed by a name found in the session string.
pub const DESKTOPS: &[(&[&str], &[&str])] = &[
    (
        &["gnome", "unity", "budgie"],
        &[
            "~/.config/dconf/user",
            "~/.config/gtk-3.0",
            "~/.config/gtk-4.0",
            "~/.config/monitors.xml",
            "~/.local/share/gnome-shell/extensions",
        ],
    ),
    (
        &["kde", "plasma"],
        &[
            "~/.config/kdeglobals",
            "~/.config/kwinrc",
            "~/.config/kglobalshortcutsrc",
            "~/.config/plasmarc",
            "~/.config/plasma-org.kde.plasma.desktop-appletsrc",
            "~/.config/plasmashellrc",
            "~/.config/kscreen",
            "~/.local/share/konsole",
        ],
    ),
    (&["xfce"], &["~/.config/xfce4"]),
    (&["cinnamon"], &["~/.config/cinnamon", "~/.cinnamon"]),
    (&["mate"], &["~/.config/mate"]),
    (&["lxqt"], &["~/.config/lxqt"]),
];

/// Window managers, detected by the presence of their config directory.
pub const WINDOW_MANAGERS: &[&str] = &[
    "~/.config/i3",
    "~/.config/sway",
    "~/.config/hypr",
    "~/.config/awesome",
    "~/.config/bspwm",
    "~/.config/openbox",
    "~/.config/qtile",
];
