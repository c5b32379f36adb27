//! External command execution
//!
//! Every external tool invocation (istioctl, kubectl, fortio, k6) goes
//! through the `CommandRunner` trait so callers can decide per-call whether
//! a failure is fatal, and so tests can assert full call traces.

use std::process::Stdio;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Captured result of one external command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Trimmed stderr, falling back to stdout when stderr is empty
    pub fn failure_detail(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// The command could not be spawned at all
#[derive(Debug, Error)]
#[error("failed to execute '{program}': {source}")]
pub struct CommandError {
    pub program: String,
    #[source]
    pub source: std::io::Error,
}

/// Executes external commands, echoing each one before it runs
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: Vec<String>) -> Result<CommandOutput, CommandError>;
}

/// Render a command line for logging
pub fn render(program: &str, args: &[String]) -> String {
    let mut line = String::from(program);
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// Synchronous (per-call) shell runner backed by tokio::process
#[derive(Debug, Clone, Default)]
pub struct ShellRunner;

impl ShellRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, program: &str, args: Vec<String>) -> Result<CommandOutput, CommandError> {
        info!(command = %render(program, &args), "Running command");

        let output = Command::new(program)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| CommandError {
                program: program.to_string(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !stdout.is_empty() {
            debug!(program, "stdout: {}", stdout.trim_end());
        }
        if !stderr.is_empty() {
            warn!(program, "stderr: {}", stderr.trim_end());
        }

        Ok(CommandOutput {
            success: output.status.success(),
            stdout,
            stderr,
        })
    }
}

#[cfg(test)]
pub(crate) fn ok_output() -> CommandOutput {
    CommandOutput {
        success: true,
        stdout: String::new(),
        stderr: String::new(),
    }
}

#[cfg(test)]
pub(crate) fn failed_output(stderr: &str) -> CommandOutput {
    CommandOutput {
        success: false,
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}
