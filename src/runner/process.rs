//! Child process execution with bounded wall-clock time.
//!
//! Both output pipes are drained on dedicated reader threads while the
//! calling thread waits on the child, so a tool that floods stderr while
//! stdout is unread cannot stall the wait. On timeout the child is killed
//! and reaped, and whatever the readers collected up to that point is kept.
//! Readers get a short grace period to hit EOF; a grandchild still holding
//! a pipe open cannot extend the call past that.

use std::ffi::OsString;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex, PoisonError, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};
use wait_timeout::ChildExt;

use crate::error::{BslError, BslResult};

/// Exit code reported when the child was killed or ended by a signal.
pub const SIGNALLED_EXIT_CODE: i32 = -1;

/// How long readers may keep draining after the child is gone.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// A fully specified child process launch.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub current_dir: Option<PathBuf>,
    /// Variables set on top of the inherited environment.
    pub env: Vec<(OsString, OsString)>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Arguments rendered for logs.
    pub fn display_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    /// The argument following `flag`, if any.
    pub fn flag_value(&self, flag: &str) -> Option<String> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(|v| v.to_string_lossy().into_owned())
    }
}

/// Captured result of one child process run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    /// Contents of the reporter's output file, when one was written.
    pub report: Option<String>,
}

impl ProcessOutcome {
    pub const fn exited_cleanly(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }
}

/// Capability to run an external command.
///
/// Implemented by [`SystemRunner`] for real processes; tests substitute
/// scripted fakes.
pub trait ProcessRunner: Send + Sync {
    /// Run `invocation`, killing it after `timeout`.
    ///
    /// A missing executable is reported as [`BslError::ToolNotFound`];
    /// other launch failures as [`BslError::Io`]. Non-zero exits and
    /// timeouts are not errors here, they are recorded in the outcome.
    fn run(&self, invocation: &Invocation, timeout: Duration) -> BslResult<ProcessOutcome>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, invocation: &Invocation, timeout: Duration) -> BslResult<ProcessOutcome> {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &invocation.current_dir {
            command.current_dir(dir);
        }
        for (key, value) in &invocation.env {
            command.env(key, value);
        }

        debug!(command = invocation.display_line(), timeout_secs = timeout.as_secs(), "spawning");

        let child = command.spawn().map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                BslError::ToolNotFound {
                    tool: invocation.program.display().to_string(),
                    reason: source.to_string(),
                }
            } else {
                BslError::Io {
                    path: invocation.program.clone(),
                    source,
                }
            }
        })?;

        let mut guard = ChildGuard::new(child);
        let stdout_reader = guard.child.stdout.take().map(spawn_reader);
        let stderr_reader = guard.child.stderr.take().map(spawn_reader);

        let started = Instant::now();
        let (exit_code, timed_out) = match guard.child.wait_timeout(timeout) {
            Ok(Some(status)) => {
                guard.reaped = true;
                (status.code().unwrap_or(SIGNALLED_EXIT_CODE), false)
            }
            Ok(None) => {
                error!(
                    program = %invocation.program.display(),
                    timeout_secs = timeout.as_secs(),
                    "child exceeded time limit, killing"
                );
                guard.kill_and_reap();
                (SIGNALLED_EXIT_CODE, true)
            }
            Err(source) => {
                guard.kill_and_reap();
                return Err(BslError::Io {
                    path: invocation.program.clone(),
                    source,
                });
            }
        };

        let drain_deadline = Instant::now() + DRAIN_GRACE;
        let stdout = collect_reader(stdout_reader, drain_deadline, "stdout");
        let stderr = collect_reader(stderr_reader, drain_deadline, "stderr");

        debug!(
            exit_code,
            timed_out,
            elapsed_ms = started.elapsed().as_millis(),
            stdout_len = stdout.len(),
            stderr_len = stderr.len(),
            "child finished"
        );

        Ok(ProcessOutcome {
            exit_code,
            stdout,
            stderr,
            timed_out,
            report: None,
        })
    }
}

/// Kills and reaps the child if it is dropped before being waited on, so an
/// unwinding caller never leaves a zombie behind.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    const fn new(child: Child) -> Self {
        Self {
            child,
            reaped: false,
        }
    }

    fn kill_and_reap(&mut self) {
        if let Err(e) = self.child.kill() {
            warn!(error = %e, "failed to kill child");
        }
        if let Err(e) = self.child.wait() {
            warn!(error = %e, "failed to reap child");
        }
        self.reaped = true;
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.reaped {
            self.kill_and_reap();
        }
    }
}

/// Output collected by a reader thread, shared so a partial capture is
/// available even if the thread never sees EOF.
struct PipeReader {
    buffer: Arc<Mutex<Vec<u8>>>,
    done: mpsc::Receiver<()>,
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> PipeReader {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&buffer);
    let (tx, done) = mpsc::channel();

    thread::spawn(move || {
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => sink
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    debug!(error = %e, "pipe read ended with error");
                    break;
                }
            }
        }
        let _ = tx.send(());
    });

    PipeReader { buffer, done }
}

fn collect_reader(reader: Option<PipeReader>, deadline: Instant, stream: &str) -> String {
    let Some(reader) = reader else {
        return String::new();
    };

    let remaining = deadline.saturating_duration_since(Instant::now());
    if reader.done.recv_timeout(remaining).is_err() {
        warn!(stream, "pipe still open after child exit, keeping partial output");
    }

    let bytes = reader
        .buffer
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    String::from_utf8_lossy(&bytes).into_owned()
}
