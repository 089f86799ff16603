//! External process execution for oracle updates
//!
//! [`ProcessRunner`] spawns the chain client with the argument vector from the
//! command description (no shell) and captures stdout/stderr. A non-zero exit
//! is a [`FeederError::Submission`] carrying the captured output.

use async_trait::async_trait;
use feeder_rust_core::command::CommandDescription;
use feeder_rust_core::error::{FeederError, Result};
use std::process::Stdio;
use tokio::process::Command;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// stdout followed by stderr, trimmed
    pub fn combined(&self) -> String {
        match (self.stdout.trim(), self.stderr.trim()) {
            ("", err) => err.to_string(),
            (out, "") => out.to_string(),
            (out, err) => format!("{}\n{}", out, err),
        }
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &CommandDescription) -> Result<CommandOutput>;
}

/// Runs the command as a child process
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &CommandDescription) -> Result<CommandOutput> {
        let output = Command::new(&command.program)
            .args(command.argv())
            .stdin(Stdio::null())
            // Dropping the future (submission timeout) kills the child
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| FeederError::Submission {
                exit_code: None,
                message: format!("failed to spawn {}: {}", command.program, e),
                output: String::new(),
            })?;

        let captured = CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !output.status.success() {
            return Err(FeederError::Submission {
                exit_code: captured.exit_code,
                message: format!("{} exited with {}", command.program, output.status),
                output: captured.combined(),
            });
        }

        Ok(captured)
    }
}

/// Logs the command instead of executing it
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunRunner;

#[async_trait]
impl CommandRunner for DryRunRunner {
    async fn run(&self, command: &CommandDescription) -> Result<CommandOutput> {
        info!(command = %command, "Dry run, not executing");
        Ok(CommandOutput {
            exit_code: Some(0),
            stdout: command.to_string(),
            stderr: String::new(),
        })
    }
}
