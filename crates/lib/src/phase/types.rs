use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::builder::RequestKey;
use crate::manager::{BuildError, SessionStats};

/// A stage of a project build, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
  Initialize,
  GenerateSources,
  PreLink,
  PostLink,
  Clean,
}

impl Phase {
  pub const ALL: [Phase; 5] = [
    Phase::Initialize,
    Phase::GenerateSources,
    Phase::PreLink,
    Phase::PostLink,
    Phase::Clean,
  ];

  /// Every phase of a full build, i.e. all but `Clean`.
  pub fn build_phases() -> impl Iterator<Item = Phase> {
    Self::ALL.into_iter().filter(|p| *p != Phase::Clean)
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Phase::Initialize => "initialize",
      Phase::GenerateSources => "generate-sources",
      Phase::PreLink => "pre-link",
      Phase::PostLink => "post-link",
      Phase::Clean => "clean",
    }
  }
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPoint {
  Before,
  After,
}

impl fmt::Display for HookPoint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      HookPoint::Before => f.write_str("before"),
      HookPoint::After => f.write_str("after"),
    }
  }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RequestOutcome {
  Succeeded { output: Value },
  /// Failed before, nothing changed since; not re-run.
  Suppressed { message: String },
  Failed { reason: String },
}

/// What happened to one request issued by a phase.
#[derive(Debug, Clone, Serialize)]
pub struct RequestReport {
  pub key: RequestKey,
  pub builder: String,
  pub description: String,
  #[serde(flatten)]
  pub outcome: RequestOutcome,
}

impl RequestReport {
  pub fn is_success(&self) -> bool {
    matches!(self.outcome, RequestOutcome::Succeeded { .. })
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct HookFailure {
  pub step: String,
  pub point: HookPoint,
  pub message: String,
}

/// Aggregated result of one phase.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseReport {
  pub phase: Phase,
  pub requests: Vec<RequestReport>,
  pub hook_failures: Vec<HookFailure>,
  pub stats: SessionStats,
}

impl PhaseReport {
  pub fn new(phase: Phase) -> Self {
    Self {
      phase,
      requests: Vec::new(),
      hook_failures: Vec::new(),
      stats: SessionStats::default(),
    }
  }

  /// Requests that did not succeed.
  pub fn failures(&self) -> Vec<&RequestReport> {
    self.requests.iter().filter(|r| !r.is_success()).collect()
  }

  /// No failed or suppressed requests and no hook failures.
  pub fn is_success(&self) -> bool {
    self.hook_failures.is_empty() && self.requests.iter().all(RequestReport::is_success)
  }
}

#[derive(Debug, Error)]
pub enum PhaseError {
  /// A request failed or a fatal error occurred; the phase stopped.
  #[error("{phase} aborted: {error}")]
  Aborted {
    phase: Phase,
    report: Box<PhaseReport>,
    #[source]
    error: BuildError,
  },

  #[error("{phase}: build step '{step}' failed: {source:#}")]
  Hook {
    phase: Phase,
    step: String,
    source: anyhow::Error,
  },

  #[error("{phase}: {action} {}: {source}", path.display())]
  Io {
    phase: Phase,
    action: &'static str,
    path: PathBuf,
    source: std::io::Error,
  },

  #[error(transparent)]
  Config(#[from] crate::langspec::ConfigError),
}

impl PhaseError {
  /// The partial report, when the phase got as far as issuing requests.
  pub fn report(&self) -> Option<&PhaseReport> {
    match self {
      PhaseError::Aborted { report, .. } => Some(report),
      _ => None,
    }
  }
}
