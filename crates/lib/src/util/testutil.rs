//! Test utilities for metabuild-lib.
//!
//! [`FakeTool`] stands in for the external language tools so build behaviour
//! can be tested without them installed.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use crate::tool::{Tool, ToolError, ToolOutput};

/// One recorded tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
  pub tool: String,
  pub args: Vec<String>,
}

#[derive(Debug, Clone)]
enum Behaviour {
  Fail { code: i32, stderr: String },
  NoOutput,
  TimeOut(Duration),
  NotFound,
}

/// Deterministic tool double.
///
/// By default every invocation succeeds and writes the path following each
/// `-o` argument. The written content is the tool id followed by the contents
/// of every argument that names an existing file, so a changed input yields a
/// changed output.
#[derive(Debug, Default)]
pub struct FakeTool {
  invocations: RefCell<Vec<Invocation>>,
  behaviours: RefCell<BTreeMap<String, Behaviour>>,
  output_positions: RefCell<BTreeMap<String, BTreeSet<usize>>>,
}

impl FakeTool {
  pub fn new() -> Self {
    Self::default()
  }

  /// Make `tool` exit with `code` and `stderr` until [`FakeTool::succeed`].
  pub fn fail(&self, tool: &str, code: i32, stderr: &str) {
    self.behaviours.borrow_mut().insert(
      tool.to_string(),
      Behaviour::Fail {
        code,
        stderr: stderr.to_string(),
      },
    );
  }

  /// Make `tool` exit successfully without writing anything.
  pub fn no_output(&self, tool: &str) {
    self.behaviours.borrow_mut().insert(tool.to_string(), Behaviour::NoOutput);
  }

  /// Make `tool` run past a limit of `after`.
  pub fn time_out(&self, tool: &str, after: Duration) {
    self.behaviours.borrow_mut().insert(tool.to_string(), Behaviour::TimeOut(after));
  }

  /// Make `tool` fail to start, as if it were not installed.
  pub fn not_found(&self, tool: &str) {
    self.behaviours.borrow_mut().insert(tool.to_string(), Behaviour::NotFound);
  }

  pub fn succeed(&self, tool: &str) {
    self.behaviours.borrow_mut().remove(tool);
  }

  /// Also treat the argument at `index` as an output of `tool`.
  pub fn output_at(&self, tool: &str, index: usize) {
    self
      .output_positions
      .borrow_mut()
      .entry(tool.to_string())
      .or_default()
      .insert(index);
  }

  pub fn invocations(&self) -> Vec<Invocation> {
    self.invocations.borrow().clone()
  }

  /// Number of times `tool` ran.
  pub fn count(&self, tool: &str) -> usize {
    self.invocations.borrow().iter().filter(|i| i.tool == tool).count()
  }

  /// Ids of every invocation in order.
  pub fn tools(&self) -> Vec<String> {
    self.invocations.borrow().iter().map(|i| i.tool.clone()).collect()
  }

  pub fn clear(&self) {
    self.invocations.borrow_mut().clear();
  }

  fn outputs(&self, tool: &str, args: &[String]) -> BTreeSet<usize> {
    let mut outputs: BTreeSet<usize> = args
      .iter()
      .enumerate()
      .filter(|(_, arg)| *arg == "-o")
      .map(|(i, _)| i + 1)
      .filter(|i| *i < args.len())
      .collect();
    if let Some(extra) = self.output_positions.borrow().get(tool) {
      outputs.extend(extra.iter().copied().filter(|i| *i < args.len()));
    }
    outputs
  }
}

impl Tool for FakeTool {
  fn invoke(&self, tool: &str, args: &[String], cwd: &Path) -> Result<ToolOutput, ToolError> {
    self.invocations.borrow_mut().push(Invocation {
      tool: tool.to_string(),
      args: args.to_vec(),
    });

    match self.behaviours.borrow().get(tool) {
      Some(Behaviour::Fail { code, stderr }) => {
        return Ok(ToolOutput {
          exit_code: Some(*code),
          stdout: String::new(),
          stderr: stderr.clone(),
        });
      }
      Some(Behaviour::NoOutput) => return Ok(success()),
      Some(Behaviour::TimeOut(after)) => {
        return Err(ToolError::Timeout {
          tool: tool.to_string(),
          timeout: *after,
        });
      }
      Some(Behaviour::NotFound) => {
        return Err(ToolError::Spawn {
          tool: tool.to_string(),
          source: io::Error::from(io::ErrorKind::NotFound),
        });
      }
      None => {}
    }

    let outputs = self.outputs(tool, args);
    let mut content = format!("{}\n", tool);
    for (i, arg) in args.iter().enumerate() {
      let path = cwd.join(arg);
      if !outputs.contains(&i) && path.is_file() {
        content.push_str(&fs::read_to_string(&path).unwrap_or_default());
        content.push('\n');
      }
    }

    for i in outputs {
      let path = cwd.join(&args[i]);
      if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ToolError::Spawn {
          tool: tool.to_string(),
          source,
        })?;
      }
      fs::write(&path, &content).map_err(|source| ToolError::Spawn {
        tool: tool.to_string(),
        source,
      })?;
    }

    Ok(success())
  }
}

fn success() -> ToolOutput {
  ToolOutput {
    exit_code: Some(0),
    ..Default::default()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn writes_outputs_derived_from_inputs() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("in.rtg"), "grammar").unwrap();
    let tool = FakeTool::new();

    let output = tool
      .invoke("rtg2sig", &args(&["-i", "in.rtg", "-o", "out/sig.str"]), temp.path())
      .unwrap();

    assert!(output.success());
    let written = fs::read_to_string(temp.path().join("out/sig.str")).unwrap();
    assert_eq!(written, "rtg2sig\ngrammar\n");
    assert_eq!(tool.count("rtg2sig"), 1);
  }

  #[test]
  fn configured_failure_is_reported() {
    let temp = TempDir::new().unwrap();
    let tool = FakeTool::new();
    tool.fail("sdf2table", 1, "ambiguity");

    let output = tool.invoke("sdf2table", &args(&["-o", "t.tbl"]), temp.path()).unwrap();
    assert_eq!(output.exit_code, Some(1));
    assert_eq!(output.stderr, "ambiguity");
    assert!(!temp.path().join("t.tbl").exists());

    tool.succeed("sdf2table");
    assert!(tool.invoke("sdf2table", &args(&["-o", "t.tbl"]), temp.path()).unwrap().success());
  }

  #[test]
  fn scripted_start_and_timeout_errors() {
    let temp = TempDir::new().unwrap();
    let tool = FakeTool::new();
    tool.time_out("strj", Duration::from_millis(250));
    tool.not_found("sdf2table");

    let err = tool.invoke("strj", &args(&["-o", "a.java"]), temp.path()).unwrap_err();
    assert_eq!(err.to_string(), "strj timed out after 250ms");
    let err = tool.invoke("sdf2table", &args(&["-o", "t.tbl"]), temp.path()).unwrap_err();
    assert!(matches!(err, ToolError::Spawn { .. }));
    assert!(!temp.path().join("a.java").exists());
    assert_eq!(tool.count("strj"), 1);
  }

  #[test]
  fn extra_output_positions() {
    let temp = TempDir::new().unwrap();
    let tool = FakeTool::new();
    tool.output_at("jar", 1);

    tool.invoke("jar", &args(&["cf", "lib.jar", "-C", "classes", "."]), temp.path()).unwrap();
    assert!(temp.path().join("lib.jar").exists());
  }
}
