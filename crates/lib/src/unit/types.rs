use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::builder::{BuildRequest, RequestKey};
use crate::consts::UNIT_FORMAT_VERSION;
use crate::fingerprint::Fingerprint;
use crate::manager::Failure;

/// Terminal (or transient) state of a build unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UnitState {
  NeverBuilt,
  InProgress,
  Succeeded,
  Failed { reason: Failure },
}

impl UnitState {
  pub fn is_finished(&self) -> bool {
    matches!(self, UnitState::Succeeded | UnitState::Failed { .. })
  }

  pub fn label(&self) -> &'static str {
    match self {
      UnitState::NeverBuilt => "never built",
      UnitState::InProgress => "in progress",
      UnitState::Succeeded => "succeeded",
      UnitState::Failed { .. } => "failed",
    }
  }
}

/// What a required sub-build looked like when it was required.
///
/// Only the presence of a failure is recorded, never its content: a dependent
/// is rebuilt when a dependency starts or stops failing, not when the wording
/// of its diagnostics changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "output", rename_all = "snake_case")]
pub enum ResultStamp {
  Output(Value),
  Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathDependency {
  pub path: PathBuf,
  /// Set when `path` is a directory scanned for `.{extension}` files; the
  /// fingerprint then stamps which files matched.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub extension: Option<String>,
  pub fingerprint: Fingerprint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildDependency {
  pub key: RequestKey,
  pub request: BuildRequest,
  pub stamp: ResultStamp,
}

/// The persisted record of one request's last execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildUnit {
  pub version: u32,
  pub key: RequestKey,
  pub request: BuildRequest,
  pub description: String,
  pub required_paths: Vec<PathDependency>,
  pub required_builds: Vec<BuildDependency>,
  pub provided_paths: Vec<PathDependency>,
  #[serde(flatten)]
  pub state: UnitState,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output: Option<Value>,
}

impl BuildUnit {
  pub fn new(key: RequestKey, request: BuildRequest, description: String) -> Self {
    Self {
      version: UNIT_FORMAT_VERSION,
      key,
      request,
      description,
      required_paths: Vec::new(),
      required_builds: Vec::new(),
      provided_paths: Vec::new(),
      state: UnitState::NeverBuilt,
      output: None,
    }
  }

  /// Reset all recorded dependencies and mark the unit as executing.
  pub fn start(&mut self) {
    self.required_paths.clear();
    self.required_builds.clear();
    self.provided_paths.clear();
    self.output = None;
    self.state = UnitState::InProgress;
  }

  pub fn succeed(&mut self, output: Value) {
    self.output = Some(output);
    self.state = UnitState::Succeeded;
  }

  pub fn fail(&mut self, reason: Failure) {
    self.output = None;
    self.state = UnitState::Failed { reason };
  }

  /// Record a required path. A path required twice keeps its first fingerprint.
  pub fn record_required_path(&mut self, path: PathBuf, fingerprint: Fingerprint) {
    self.record_required(path, None, fingerprint);
  }

  /// Record the set of `.{extension}` files found under `dir`.
  pub fn record_required_listing(&mut self, dir: PathBuf, extension: &str, fingerprint: Fingerprint) {
    self.record_required(dir, Some(extension.to_string()), fingerprint);
  }

  fn record_required(&mut self, path: PathBuf, extension: Option<String>, fingerprint: Fingerprint) {
    if !self
      .required_paths
      .iter()
      .any(|d| d.path == path && d.extension == extension)
    {
      self.required_paths.push(PathDependency {
        path,
        extension,
        fingerprint,
      });
    }
  }

  /// Record a provided path; the fingerprint is filled in once the body ends.
  pub fn record_provided_path(&mut self, path: PathBuf) {
    if !self.provided_paths.iter().any(|d| d.path == path) {
      self.provided_paths.push(PathDependency {
        path,
        extension: None,
        fingerprint: Fingerprint::Absent,
      });
    }
  }

  pub fn record_required_build(&mut self, key: RequestKey, request: BuildRequest, stamp: ResultStamp) {
    if let Some(existing) = self.required_builds.iter_mut().find(|d| d.key == key) {
      existing.stamp = stamp;
    } else {
      self.required_builds.push(BuildDependency { key, request, stamp });
    }
  }
}
