//! External command execution
//!
//! Installers, the shutdown manager and the process supervisor shell out to
//! platform tools. They go through [`CommandRunner`] so tests can script the
//! results instead of touching the machine.

use std::process::Stdio;

use application::ApplicationError;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code and stderr
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Runs external programs
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` to completion and capture its output
    ///
    /// Fails only when the program cannot be spawned; a non-zero exit is
    /// reported through [`CommandOutput::code`].
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, ApplicationError>;

    /// Start `program` without waiting for it
    async fn spawn_detached(&self, program: &str, args: &[&str]) -> Result<(), ApplicationError>;
}

/// [`CommandRunner`] backed by `tokio::process`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    #[instrument(skip(self))]
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, ApplicationError> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ApplicationError::CommandFailed(format!("{program}: {e}")))?;

        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(code = ?result.code, "Command finished");
        Ok(result)
    }

    #[instrument(skip(self))]
    async fn spawn_detached(&self, program: &str, args: &[&str]) -> Result<(), ApplicationError> {
        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ApplicationError::CommandFailed(format!("{program}: {e}")))?;
        debug!("Command spawned");
        Ok(())
    }
}
