//! External command execution for package-manager backends.
//!
//! Adapters never spawn processes directly. They describe a call as a
//! [`CommandSpec`] and hand it to a [`CommandRunner`], which lets tests replay
//! canned backend output and lets the real runner enforce timeouts and
//! cancellation in one place.

use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use wait_timeout::ChildExt;

use crate::context::CancelToken;
use crate::error::{MigratorError, Result};

/// Timeout used when a caller does not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// How often a waiting runner re-checks the cancellation token.
const POLL_SLICE: Duration = Duration::from_millis(100);

/// Description of one external command invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable name, resolved through `PATH`.
    pub program: String,
    /// Arguments passed verbatim.
    pub args: Vec<String>,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
    /// Run through `sudo -n` unless already root.
    pub privileged: bool,
    /// Upper bound for a single attempt.
    pub timeout: Duration,
}

impl CommandSpec {
    /// What: Build a spec for `program args...` with the default timeout.
    ///
    /// Inputs:
    /// - `program`: Executable name.
    /// - `args`: Arguments.
    ///
    /// Output:
    /// - Unprivileged spec with no extra environment.
    pub fn new<S: AsRef<str>>(program: &str, args: &[S]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.as_ref().to_string()).collect(),
            env: Vec::new(),
            privileged: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set an environment variable for the child.
    #[must_use]
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    /// Mark the command as requiring root.
    #[must_use]
    pub const fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }

    /// Override the per-attempt timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Human-readable command line used in logs and errors.
    #[must_use]
    pub fn display(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.as_str());
        parts.extend(self.args.iter().map(String::as_str));
        parts.join(" ")
    }
}

/// Captured result of a finished command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status was zero.
    pub success: bool,
    /// Exit code when the process exited normally.
    pub code: Option<i32>,
    /// Standard output, lossily decoded.
    pub stdout: String,
    /// Standard error, lossily decoded.
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output carrying `stdout`.
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code and stderr.
    #[must_use]
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Low-level failure of a single attempt, before retry policy is applied.
#[derive(Debug)]
pub enum RunError {
    /// Executable not found.
    NotFound,
    /// The attempt exceeded its timeout and the child was killed.
    TimedOut,
    /// The cancellation token fired and the child was killed.
    Cancelled,
    /// Spawn or wait failed.
    Io(std::io::Error),
}

/// Something that can execute [`CommandSpec`]s.
pub trait CommandRunner: Send + Sync {
    /// Whether `program` can be found on `PATH`.
    fn locate(&self, program: &str) -> bool;

    /// Run one attempt of `spec`.
    ///
    /// # Errors
    /// - [`RunError`] when the process cannot be spawned, times out or is cancelled.
    fn run(&self, spec: &CommandSpec) -> std::result::Result<CommandOutput, RunError>;
}

/// Shared handle to a runner, cloned into adapters and blocking tasks.
pub type SharedRunner = Arc<dyn CommandRunner>;

/// Runner that spawns real processes.
#[derive(Clone, Debug, Default)]
pub struct SystemRunner {
    /// Checked while waiting; a fired token kills the child.
    cancel: CancelToken,
}

impl SystemRunner {
    /// Runner bound to `cancel`.
    #[must_use]
    pub const fn new(cancel: CancelToken) -> Self {
        Self { cancel }
    }
}

/// What: Drain a child pipe on a helper thread.
///
/// Inputs:
/// - `pipe`: Taken stdout/stderr handle, if any.
///
/// Output:
/// - Join handle yielding all bytes read (empty on read error).
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> std::thread::JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut p) = pipe {
            let _ = p.read_to_end(&mut buf);
        }
        buf
    })
}

/// Whether the current process already runs as root.
fn running_as_root() -> bool {
    #[cfg(unix)]
    {
        nix::unistd::geteuid().is_root()
    }
    #[cfg(not(unix))]
    {
        false
    }
}

impl CommandRunner for SystemRunner {
    fn locate(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }

    fn run(&self, spec: &CommandSpec) -> std::result::Result<CommandOutput, RunError> {
        let mut cmd = if spec.privileged && !running_as_root() {
            let mut c = Command::new("sudo");
            c.arg("-n").arg(&spec.program);
            c
        } else {
            Command::new(&spec.program)
        };
        cmd.args(&spec.args)
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (k, v) in &spec.env {
            cmd.env(k, v);
        }
        tracing::debug!(command = %spec.display(), privileged = spec.privileged, "spawning");

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RunError::NotFound
            } else {
                RunError::Io(e)
            }
        })?;
        let out_reader = drain(child.stdout.take());
        let err_reader = drain(child.stderr.take());

        let deadline = Instant::now() + spec.timeout;
        let status = loop {
            let now = Instant::now();
            let stop = if self.cancel.is_cancelled() {
                Some(RunError::Cancelled)
            } else if now >= deadline {
                Some(RunError::TimedOut)
            } else {
                None
            };
            if let Some(reason) = stop {
                let _ = child.kill();
                let _ = child.wait();
                return Err(reason);
            }
            match child.wait_timeout((deadline - now).min(POLL_SLICE)) {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => {
                    let _ = child.kill();
                    return Err(RunError::Io(e));
                }
            }
        };

        let stdout = out_reader.join().unwrap_or_default();
        let stderr = err_reader.join().unwrap_or_default();
        Ok(CommandOutput {
            success: status.success(),
            code: status.code(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
        })
    }
}

/// What: Run a command with one retry on timeout and return its raw output.
///
/// Inputs:
/// - `runner`: Runner to use.
/// - `spec`: Command to execute.
///
/// Output:
/// - `Ok(CommandOutput)` regardless of exit status.
///
/// # Errors
/// - `QueryTimeout` when both attempts time out.
/// - `Cancelled` when the token fired.
/// - `CommandFailed` when the executable is missing or cannot be spawned.
///
/// Details:
/// - Callers that treat a non-zero exit as "absent" (e.g. `pacman -Si` on an
///   unknown name) use this instead of [`run_checked`].
pub fn run_output(runner: &dyn CommandRunner, spec: &CommandSpec) -> Result<CommandOutput> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match runner.run(spec) {
            Ok(out) => return Ok(out),
            Err(RunError::TimedOut) if attempt < 2 => {
                tracing::warn!(command = %spec.display(), "command timed out; retrying once");
            }
            Err(RunError::TimedOut) => {
                return Err(MigratorError::QueryTimeout {
                    command: spec.display(),
                    timeout_secs: spec.timeout.as_secs(),
                });
            }
            Err(RunError::Cancelled) => return Err(MigratorError::Cancelled),
            Err(RunError::NotFound) => {
                return Err(MigratorError::CommandFailed {
                    command: spec.display(),
                    code: None,
                    stderr: format!("{} not found", spec.program),
                });
            }
            Err(RunError::Io(e)) => {
                return Err(MigratorError::CommandFailed {
                    command: spec.display(),
                    code: None,
                    stderr: e.to_string(),
                });
            }
        }
    }
}

/// What: Run a command and require a zero exit status.
///
/// Inputs:
/// - `runner`: Runner to use.
/// - `spec`: Command to execute.
///
/// Output:
/// - Standard output on success.
///
/// # Errors
/// - Everything [`run_output`] returns, plus `CommandFailed` on non-zero exit.
pub fn run_checked(runner: &dyn CommandRunner, spec: &CommandSpec) -> Result<String> {
    let out = run_output(runner, spec)?;
    if !out.success {
        return Err(MigratorError::CommandFailed {
            command: spec.display(),
            code: out.code,
            stderr: out.stderr,
        });
    }
    Ok(out.stdout)
}
