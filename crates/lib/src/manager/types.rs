//! Failure, error and reporting types for build resolution.
//!
//! Two kinds of trouble are kept apart:
//! - [`Failure`]: a recoverable problem local to one unit (missing input, a tool
//!   exiting non-zero). It is persisted as the unit's terminal state.
//! - [`BuildError`]: a fatal problem (cycle, unit store corruption) that aborts
//!   the whole phase and is never persisted.

use std::path::PathBuf;
use std::time::Duration;

use humantime::format_duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::builder::RequestKey;
use crate::fingerprint::FingerprintError;
use crate::unit::UnitStoreError;

/// User-facing explanation attached to a suppressed retry.
pub const FAILING_REBUILD_MESSAGE: &str = "previous build failed and no change in the build input has been observed, \
   not rebuilding; fix the problem, or clean and rebuild the project to force a rebuild";

/// A recoverable, unit-local failure.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Failure {
  /// A mandatory input path does not exist.
  #[error("required input does not exist: {}", path.display())]
  MissingInput { path: PathBuf },

  /// A tool reported success but did not produce a declared output.
  #[error("{tool} did not produce {}", path.display())]
  MissingOutput { tool: String, path: PathBuf },

  /// A tool exited with a non-zero status.
  #[error("{tool} failed with exit code {code:?}{}", diagnostics_suffix(.diagnostics))]
  ToolExecution {
    tool: String,
    code: Option<i32>,
    diagnostics: String,
  },

  /// A tool could not be started.
  #[error("failed to start {tool}: {message}")]
  ToolSpawn { tool: String, message: String },

  /// A tool exceeded the configured wall-clock limit.
  #[error("{tool} timed out after {}", format_duration(Duration::from_millis(*limit_ms)))]
  ToolTimeout { tool: String, limit_ms: u64 },

  /// A required sub-build finished in a failed state.
  #[error("required build failed: {description} ({key})")]
  RequiredBuildFailed { key: RequestKey, description: String },

  /// Builder-specific rejection of its input.
  #[error("{message}")]
  Invalid { message: String },
}

fn diagnostics_suffix(diagnostics: &str) -> String {
  let trimmed = diagnostics.trim();
  if trimmed.is_empty() {
    String::new()
  } else {
    format!(":\n{}", trimmed)
  }
}

/// A fatal error, or the terminal failure of a requested build.
#[derive(Debug, Error)]
pub enum BuildError {
  /// The requested build ran and failed.
  #[error("{description} ({key}) failed: {failure}")]
  BuildFailed {
    key: RequestKey,
    description: String,
    failure: Failure,
  },

  /// The requested build failed earlier and nothing it depends on changed.
  #[error("{description} ({key}): {}", FAILING_REBUILD_MESSAGE)]
  NoRebuildOfFailingBuilder { key: RequestKey, description: String },

  /// A request requires itself, directly or transitively.
  #[error("dependency cycle detected: {}", .cycle.join(" -> "))]
  CycleDetected { cycle: Vec<String> },

  #[error("unit store error: {0}")]
  Persistence(#[from] UnitStoreError),

  #[error("fingerprint error: {0}")]
  Fingerprint(#[from] FingerprintError),

  #[error("no builder registered under '{0}'")]
  UnknownBuilder(String),

  #[error("builder '{0}' registered twice")]
  DuplicateBuilder(String),

  #[error("failed to (de)serialize builder value: {0}")]
  Serialize(#[from] serde_json::Error),

  #[error("i/o error on {}: {source}", path.display())]
  Io { path: PathBuf, source: std::io::Error },
}

impl BuildError {
  pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    BuildError::Io {
      path: path.into(),
      source,
    }
  }

  /// Whether the error aborts the whole phase.
  ///
  /// Only a suppressed retry lets the phase continue with its other requests.
  pub fn aborts_phase(&self) -> bool {
    !matches!(self, BuildError::NoRebuildOfFailingBuilder { .. })
  }
}

/// What a builder body can stop with.
#[derive(Debug, Error)]
pub enum BuilderError {
  #[error(transparent)]
  Failed(#[from] Failure),

  #[error(transparent)]
  Fatal(#[from] BuildError),
}

impl From<crate::fingerprint::FingerprintError> for BuilderError {
  fn from(e: FingerprintError) -> Self {
    BuilderError::Fatal(e.into())
  }
}

impl From<serde_json::Error> for BuilderError {
  fn from(e: serde_json::Error) -> Self {
    BuilderError::Fatal(e.into())
  }
}

/// How a request was satisfied during one manager session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
  /// The body ran in this session.
  Executed,
  /// Persisted output reused without running the body.
  Cached,
  /// Failed before and nothing changed, body not run.
  Suppressed,
}

/// Counters for one manager session.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SessionStats {
  /// Keys executed this session, in execution order.
  pub executed: Vec<RequestKey>,
  pub cached: usize,
  pub suppressed: usize,
  pub failed: usize,
}

impl SessionStats {
  pub fn executed_count(&self) -> usize {
    self.executed.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::hash::ObjectHash;

  fn key(s: &str) -> RequestKey {
    RequestKey(ObjectHash(s.to_string()))
  }

  #[test]
  fn tool_failure_display_includes_diagnostics() {
    let failure = Failure::ToolExecution {
      tool: "sdf2table".to_string(),
      code: Some(1),
      diagnostics: "  error: ambiguous production\n".to_string(),
    };
    assert_eq!(
      failure.to_string(),
      "sdf2table failed with exit code Some(1):\nerror: ambiguous production"
    );
  }

  #[test]
  fn tool_failure_display_without_diagnostics() {
    let failure = Failure::ToolExecution {
      tool: "strj".to_string(),
      code: None,
      diagnostics: String::new(),
    };
    assert_eq!(failure.to_string(), "strj failed with exit code None");
  }

  #[test]
  fn suppressed_retry_does_not_abort_phase() {
    let suppressed = BuildError::NoRebuildOfFailingBuilder {
      key: key("abc"),
      description: "Generate signatures".to_string(),
    };
    let failed = BuildError::BuildFailed {
      key: key("abc"),
      description: "Generate signatures".to_string(),
      failure: Failure::Invalid {
        message: "bad".to_string(),
      },
    };

    assert!(!suppressed.aborts_phase());
    assert!(failed.aborts_phase());
    assert!(suppressed.to_string().contains("not rebuilding"));
  }

  #[test]
  fn cycle_display_lists_path() {
    let err = BuildError::CycleDetected {
      cycle: vec!["a".to_string(), "b".to_string(), "a".to_string()],
    };
    assert_eq!(err.to_string(), "dependency cycle detected: a -> b -> a");
  }

  #[test]
  fn failure_roundtrips_through_json() {
    let failure = Failure::RequiredBuildFailed {
      key: key("0123"),
      description: "Pack SDF".to_string(),
    };
    let json = serde_json::to_string(&failure).unwrap();
    assert_eq!(serde_json::from_str::<Failure>(&json).unwrap(), failure);
  }
}
