//! Scripted command runner for tests and dry runs.
//!
//! [`MockRunner`] never touches the system. It replays a FIFO queue of
//! scripted outcomes (an empty queue means "succeed with empty output") and
//! records every [`CommandSpec`] it receives so tests can assert on exactly
//! what would have been invoked. **Never wire it into production paths.**
//!
//! # Example
//!
//! ```
//! use runbook::exec::{CommandRunner, CommandSpec, MockRunner};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let runner = MockRunner::new();
//! runner.enqueue_stdout("active\n");
//!
//! let out = runner
//!     .run(&CommandSpec::new("systemctl").arg("is-active"), &CancellationToken::new())
//!     .await
//!     .unwrap();
//! assert_eq!(out.stdout, "active\n");
//! assert_eq!(runner.call_count(), 1);
//! # }
//! ```

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::{CommandOutput, CommandRunner, CommandSpec, ExecError};

#[derive(Debug)]
enum Scripted {
    Output(CommandOutput),
    // Program name is filled in from the spec at dispatch time.
    Failure {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    Error(ExecError),
}

/// Command runner that replays scripted outcomes and records invocations.
#[derive(Debug, Default)]
pub struct MockRunner {
    outcomes: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl MockRunner {
    /// Runner with an empty script: every call succeeds with empty output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next outcome as a full [`CommandOutput`].
    pub fn enqueue_output(&self, output: CommandOutput) {
        self.outcomes.lock().push_back(Scripted::Output(output));
    }

    /// Script the next outcome as a success with the given stdout.
    pub fn enqueue_stdout(&self, stdout: impl Into<String>) {
        self.enqueue_output(CommandOutput::from_stdout(stdout));
    }

    /// Script the next outcome as a non-zero exit. The failing program name
    /// is taken from the spec the action actually submits.
    pub fn enqueue_failure(&self, code: i32, stderr: impl Into<String>) {
        self.outcomes.lock().push_back(Scripted::Failure {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        });
    }

    /// Script the next outcome as this exact error.
    pub fn enqueue_error(&self, error: ExecError) {
        self.outcomes.lock().push_back(Scripted::Error(error));
    }

    /// Every spec submitted so far, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().clone()
    }

    /// Number of specs submitted so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, ExecError> {
        self.calls.lock().push(spec.clone());

        if cancel.is_cancelled() {
            return Err(ExecError::Cancelled {
                program: spec.program().to_string(),
            });
        }

        match self.outcomes.lock().pop_front() {
            None => Ok(CommandOutput::default()),
            Some(Scripted::Output(output)) => Ok(output),
            Some(Scripted::Failure {
                code,
                stdout,
                stderr,
            }) => Err(ExecError::Failed {
                program: spec.program().to_string(),
                code,
                stdout,
                stderr,
            }),
            Some(Scripted::Error(error)) => Err(error),
        }
    }
}
