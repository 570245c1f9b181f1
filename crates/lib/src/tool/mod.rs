//! External tool invocation.
//!
//! Builder bodies never spawn processes themselves; they go through the
//! [`Tool`] capability so the engine can be exercised with a deterministic
//! fake. [`ProcessTool`] is the real implementation: it maps a tool id to a
//! configured command line and runs it to completion, optionally bounded by a
//! wall-clock timeout.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use humantime::format_duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// How a tool id is turned into a process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
  /// Program to run.
  pub command: String,
  /// Arguments placed before the builder's own arguments.
  #[serde(default)]
  pub args: Vec<String>,
}

/// Captured result of a tool that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
  pub exit_code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

impl ToolOutput {
  pub fn success(&self) -> bool {
    self.exit_code == Some(0)
  }
}

#[derive(Debug, Error)]
pub enum ToolError {
  #[error("failed to start {tool}: {source}")]
  Spawn { tool: String, source: std::io::Error },

  #[error("{tool} timed out after {}", format_duration(*timeout))]
  Timeout { tool: String, timeout: Duration },
}

/// Runs external tools on behalf of builders.
pub trait Tool {
  /// Run `tool` with `args` in `cwd` and wait for it to exit.
  fn invoke(&self, tool: &str, args: &[String], cwd: &Path) -> Result<ToolOutput, ToolError>;
}

/// Runs tools as child processes.
///
/// Tools without an entry in `commands` run the tool id itself as the
/// program name, resolved through `PATH`.
#[derive(Debug, Clone, Default)]
pub struct ProcessTool {
  commands: BTreeMap<String, ToolCommand>,
  timeout: Option<Duration>,
}

impl ProcessTool {
  pub fn new(commands: BTreeMap<String, ToolCommand>) -> Self {
    Self {
      commands,
      timeout: None,
    }
  }

  pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }

  fn command_for(&self, tool: &str) -> ToolCommand {
    self.commands.get(tool).cloned().unwrap_or_else(|| ToolCommand {
      command: tool.to_string(),
      args: Vec::new(),
    })
  }

  async fn run(&self, tool: &str, args: &[String], cwd: &Path) -> Result<ToolOutput, ToolError> {
    let spec = self.command_for(tool);

    let mut command = Command::new(&spec.command);
    command
      .args(&spec.args)
      .args(args)
      .current_dir(cwd)
      .stdin(Stdio::null())
      .kill_on_drop(true);

    debug!(tool, program = %spec.command, ?args, cwd = ?cwd, "spawning tool");

    let output = command.output();
    let output = match self.timeout {
      Some(timeout) => tokio::time::timeout(timeout, output).await.map_err(|_| ToolError::Timeout {
        tool: tool.to_string(),
        timeout,
      })?,
      None => output.await,
    }
    .map_err(|source| ToolError::Spawn {
      tool: tool.to_string(),
      source,
    })?;

    let result = ToolOutput {
      exit_code: output.status.code(),
      stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    if !result.stderr.is_empty() {
      debug!(tool, stderr = %result.stderr.trim_end(), "tool stderr");
    }

    Ok(result)
  }
}

impl Tool for ProcessTool {
  fn invoke(&self, tool: &str, args: &[String], cwd: &Path) -> Result<ToolOutput, ToolError> {
    info!(tool, "running tool");

    // The engine is synchronous; a private runtime only drives the child
    // process and the timeout.
    let rt = tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .map_err(|source| ToolError::Spawn {
        tool: tool.to_string(),
        source,
      })?;

    rt.block_on(self.run(tool, args, cwd))
  }
}
