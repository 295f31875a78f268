//! Command runner backed by real child processes

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::{CommandOutput, CommandRunner, CommandSpec, ExecError};

/// Runs commands as real child processes via [`tokio::process`].
///
/// Both output streams are captured. Completion is raced against the
/// cancellation token and the effective deadline (the spec's own deadline,
/// falling back to the runner default); the child is spawned with
/// `kill_on_drop`, so losing either race also kills the process.
#[derive(Clone, Debug, Default)]
pub struct SystemRunner {
    default_timeout: Option<Duration>,
}

impl SystemRunner {
    /// Runner with no default deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a deadline to every command that does not carry its own.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, ExecError> {
        let mut cmd = Command::new(spec.program());
        cmd.args(spec.arg_list())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = spec.working_dir() {
            cmd.current_dir(dir);
        }

        tracing::debug!(command = %spec.display_line(), "spawning external command");

        let child = cmd.spawn().map_err(|source| ExecError::Spawn {
            program: spec.program().to_string(),
            source,
        })?;

        let effective_timeout = spec.deadline().or(self.default_timeout);
        let deadline = async {
            match effective_timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };

        let wait = child.wait_with_output();
        tokio::pin!(wait);
        tokio::pin!(deadline);

        tokio::select! {
            result = &mut wait => {
                let output = result.map_err(|source| ExecError::Wait {
                    program: spec.program().to_string(),
                    source,
                })?;
                let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                if output.status.success() {
                    Ok(CommandOutput { stdout, stderr })
                } else {
                    Err(ExecError::Failed {
                        program: spec.program().to_string(),
                        code: output.status.code(),
                        stdout,
                        stderr,
                    })
                }
            }
            () = cancel.cancelled() => {
                tracing::warn!(command = %spec.display_line(), "command cancelled");
                Err(ExecError::Cancelled {
                    program: spec.program().to_string(),
                })
            }
            () = &mut deadline => {
                tracing::warn!(command = %spec.display_line(), "command deadline exceeded");
                Err(ExecError::TimedOut {
                    program: spec.program().to_string(),
                    timeout: effective_timeout.unwrap_or_default(),
                })
            }
        }
    }
}
