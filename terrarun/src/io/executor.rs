//! Executor abstraction for the external IaC tool.
//!
//! The [`ToolExecutor`] trait decouples batch orchestration from the actual
//! tool (`terragrunt <command>`). Tests use recording executors that return
//! predetermined outputs without spawning processes.

use std::path::PathBuf;
use std::process::{Command as ProcessCommand, ExitStatus};

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::cancel::CancellationToken;
use crate::core::types::Command;
use crate::io::process::run_command_cancellable;

/// Parameters for one tool invocation.
#[derive(Debug, Clone)]
pub struct ToolRequest {
    /// Module directory the tool runs in.
    pub workdir: PathBuf,
    pub command: Command,
}

/// Result of a tool invocation that was launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub success: bool,
    /// Exit status description, for error messages.
    pub status: String,
    /// Combined stdout and stderr.
    pub output: String,
    /// True if the process was interrupted because of cancellation.
    pub interrupted: bool,
}

impl ToolOutput {
    fn from_status(status: ExitStatus, output: String, interrupted: bool) -> Self {
        Self {
            success: status.success(),
            status: status.to_string(),
            output,
            interrupted,
        }
    }
}

/// Abstraction over tool execution backends.
pub trait ToolExecutor {
    /// Launch the tool for `request`. Errors only when it could not be run at
    /// all; a non-zero exit is reported through [`ToolOutput::success`].
    fn execute(&self, request: &ToolRequest, cancel: &CancellationToken) -> Result<ToolOutput>;
}

/// Executor that spawns `<program> <command>` in the module directory.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    program: String,
    echo: bool,
}

impl ProcessExecutor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            echo: true,
        }
    }

    /// Whether tool output is echoed to stdout while it runs.
    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }
}

impl ToolExecutor for ProcessExecutor {
    #[instrument(skip_all, fields(program = %self.program, command = %request.command))]
    fn execute(&self, request: &ToolRequest, cancel: &CancellationToken) -> Result<ToolOutput> {
        info!(workdir = %request.workdir.display(), "starting {}", self.program);

        let mut cmd = ProcessCommand::new(&self.program);
        cmd.arg(request.command.as_str())
            .current_dir(&request.workdir);

        let output = run_command_cancellable(cmd, cancel, self.echo)
            .with_context(|| format!("run {} {}", self.program, request.command))?;

        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "{} failed", self.program);
        } else {
            debug!("{} completed successfully", self.program);
        }
        Ok(ToolOutput::from_status(
            output.status,
            output.combined_lossy(),
            output.interrupted,
        ))
    }
}
