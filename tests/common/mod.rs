//! Shared fixtures for integration tests: a scripted command runner and
//! host contexts rooted in temp directories.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use migrator::context::{Context, HostInfo};
use migrator::distro::{DistroFamily, DistroInfo};
use migrator::paths::MigratorPaths;
use migrator::settings::Settings;
use migrator::util::command::{CommandOutput, CommandRunner, CommandSpec, RunError, SharedRunner};

/// Rendered `dpkg-query` listing command.
pub const DPKG_QUERY: &str = r"dpkg-query -W -f=${Package}\t${Version}\t${db:Status-Abbrev}\n";

/// Runner replaying canned output keyed by the rendered command line.
#[derive(Default)]
pub struct FakeRunner {
    programs: Vec<String>,
    responses: HashMap<String, CommandOutput>,
    calls: Mutex<Vec<String>>,
}

impl FakeRunner {
    /// Runner where `programs` are on `PATH`.
    pub fn with_programs(programs: &[&str]) -> Self {
        Self {
            programs: programs.iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }

    /// Successful output for `command`.
    pub fn respond(mut self, command: &str, stdout: &str) -> Self {
        self.responses
            .insert(command.to_string(), CommandOutput::ok(stdout));
        self
    }

    /// Non-zero exit for `command`.
    pub fn fail(mut self, command: &str, code: i32) -> Self {
        self.responses.insert(
            command.to_string(),
            CommandOutput::failed(code, "scripted failure"),
        );
        self
    }

    /// Every command line run so far.
    pub fn ran(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Share as a runner handle while keeping access to the call log.
    pub fn shared(self) -> (Arc<Self>, SharedRunner) {
        let runner = Arc::new(self);
        let shared: SharedRunner = runner.clone();
        (runner, shared)
    }
}

impl CommandRunner for FakeRunner {
    fn locate(&self, program: &str) -> bool {
        self.programs.iter().any(|p| p == program)
    }

    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunError> {
        let line = spec.display();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(line.clone());
        }
        if !self.locate(&spec.program) {
            return Err(RunError::NotFound);
        }
        Ok(self
            .responses
            .get(&line)
            .cloned()
            .unwrap_or_else(|| CommandOutput::failed(1, format!("unscripted: {line}"))))
    }
}

/// Host metadata for `hostname`/`user` on a distribution family.
pub fn host(hostname: &str, user: &str, id: &str, family: DistroFamily) -> HostInfo {
    HostInfo {
        hostname: hostname.to_string(),
        username: user.to_string(),
        home: PathBuf::from(format!("/home/{user}")),
        distro: DistroInfo {
            id: id.to_string(),
            family,
            ..DistroInfo::default()
        },
        desktop: None,
    }
}

/// Context over `root` with migrator files and backups kept inside it.
pub fn context(root: &Path, host: HostInfo) -> Context {
    let mut settings = Settings::default();
    settings.backup_dir = root.join("backups").display().to_string();
    Context::new(
        root.to_path_buf(),
        host,
        MigratorPaths::under(&root.join("migrator")),
        settings,
    )
}

/// Write `body` at logical path `logical` under `root`.
pub fn write(root: &Path, logical: &str, body: &str) {
    let p = root.join(logical.trim_start_matches('/'));
    if let Some(parent) = p.parent() {
        std::fs::create_dir_all(parent).expect("mkdir");
    }
    std::fs::write(p, body).expect("write");
}

/// An Ubuntu host with apt and three explicitly installed packages.
pub fn ubuntu_runner() -> FakeRunner {
    FakeRunner::with_programs(&["apt-get", "apt-cache", "apt-mark", "dpkg-query"])
        .respond("apt-get --version", "apt 2.7.14 (amd64)\n")
        .respond(
            DPKG_QUERY,
            "vim\t2:9.1.0016-1ubuntu7\tii \ng++\t4:13.2.0-7ubuntu1\tii \nhtop\t3.3.0-4build1\tii \nlibc6\t2.39-0ubuntu8\tii \n",
        )
        .respond("apt-mark showmanual", "g++\nhtop\nvim\n")
}

/// Populate an Ubuntu source root: a `.bashrc` naming the home directory
/// and an fstab with one disk-bound and one network mount.
pub fn seed_ubuntu_root(root: &Path) {
    write(
        root,
        "/home/ana/.bashrc",
        "export PATH=/home/ana/bin:$PATH\nalias ll='ls -l'\n",
    );
    write(
        root,
        "/etc/fstab",
        "UUID=0a1b2c3d / ext4 defaults 0 1\nnas:/export /mnt/nas nfs defaults 0 0\n",
    );
}
