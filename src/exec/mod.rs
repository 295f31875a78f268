//! Injectable command-execution boundary
//!
//! Every concrete action delegates its effect to a [`CommandRunner`] held as
//! `Arc<dyn CommandRunner>`, so the external tool invocation can be swapped
//! out — [`SystemRunner`] spawns real child processes, [`MockRunner`] replays
//! scripted outcomes for tests and dry runs.
//!
//! A runner returns `Ok` only for a zero exit status. Non-zero exits, spawn
//! failures, timeouts, and cancellation are all [`ExecError`]s, with captured
//! output attached where it exists so failures stay diagnosable.

pub mod mock;
pub mod system;

pub use mock::MockRunner;
pub use system::SystemRunner;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// One external command invocation: program, arguments, optional working
/// directory, optional deadline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl CommandSpec {
    /// Start a spec for the given program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            timeout: None,
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run the command in the given directory instead of the inherited one.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Give the command a deadline; exceeding it is a distinct effect error.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The program to invoke.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The argument list, in order.
    pub fn arg_list(&self) -> &[String] {
        &self.args
    }

    /// The working directory override, if any.
    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Duration> {
        self.timeout
    }

    /// Single-line rendering for logs and error messages.
    pub fn display_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Captured text output of a successfully completed command.
///
/// Both streams are captured lossily as UTF-8.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl CommandOutput {
    /// Output with the given stdout and empty stderr.
    pub fn from_stdout(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }
}

/// Errors from the command-execution boundary.
///
/// Cancellation and deadline expiry are deliberately separate variants from
/// operational failure so callers can tell them apart.
#[derive(Debug)]
pub enum ExecError {
    /// The program could not be spawned at all
    Spawn {
        /// The program that failed to spawn
        program: String,
        /// The underlying OS error
        source: std::io::Error,
    },

    /// Waiting on the child or collecting its output failed
    Wait {
        /// The program being waited on
        program: String,
        /// The underlying OS error
        source: std::io::Error,
    },

    /// The command ran but exited unsuccessfully
    Failed {
        /// The program that failed
        program: String,
        /// Exit code, absent when the process was killed by a signal
        code: Option<i32>,
        /// Captured standard output
        stdout: String,
        /// Captured standard error
        stderr: String,
    },

    /// The cancellation token fired before the command completed
    Cancelled {
        /// The program that was cancelled
        program: String,
    },

    /// The command exceeded its deadline
    TimedOut {
        /// The program that timed out
        program: String,
        /// The deadline that was exceeded
        timeout: Duration,
    },
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn { program, source } => {
                write!(f, "failed to spawn '{program}': {source}")
            }
            Self::Wait { program, source } => {
                write!(f, "failed waiting for '{program}': {source}")
            }
            Self::Failed {
                program,
                code,
                stderr,
                ..
            } => {
                match code {
                    Some(code) => write!(f, "'{program}' exited with status {code}")?,
                    None => write!(f, "'{program}' was terminated by a signal")?,
                }
                let diag = stderr.trim();
                if !diag.is_empty() {
                    write!(f, ": {diag}")?;
                }
                Ok(())
            }
            Self::Cancelled { program } => {
                write!(f, "'{program}' was cancelled before completion")
            }
            Self::TimedOut { program, timeout } => {
                write!(f, "'{program}' timed out after {}ms", timeout.as_millis())
            }
        }
    }
}

impl std::error::Error for ExecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn { source, .. } | Self::Wait { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl ExecError {
    /// True when the command stopped because of cancellation or a deadline
    /// rather than an operational failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled { .. } | Self::TimedOut { .. })
    }
}

/// The injectable command-execution collaborator.
///
/// Implementations must honor the cancellation token for anything blocking;
/// a fired token turns into [`ExecError::Cancelled`], never into a generic
/// failure.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run one command to completion and capture its text output.
    ///
    /// # Errors
    ///
    /// Any [`ExecError`]; `Ok` implies a zero exit status.
    async fn run(
        &self,
        spec: &CommandSpec,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, ExecError>;
}
