//! The capability a running builder body works through.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, trace};
use walkdir::WalkDir;

use super::{BuildRequest, Builder};
use crate::manager::{BuildError, BuildManager, BuilderError, Failure};
use crate::tool::{ToolError, ToolOutput};
use crate::unit::BuildUnit;

/// Dependency-recording handle for one executing unit.
///
/// Every method that observes the file system or another build records what it
/// saw on the unit; the manager persists those records once the body returns.
/// Relative paths are resolved against the project directory.
pub struct BuildContext<'m, 'a> {
  manager: &'m mut BuildManager<'a>,
  unit: &'m mut BuildUnit,
}

impl<'m, 'a> BuildContext<'m, 'a> {
  pub(crate) fn new(manager: &'m mut BuildManager<'a>, unit: &'m mut BuildUnit) -> Self {
    Self { manager, unit }
  }

  fn absolute(&self, path: &Path) -> PathBuf {
    self.manager.working_dir().join(path)
  }

  /// Declare a mandatory input. Fails the unit if the path does not exist, but
  /// still records it so that creating it later triggers a rebuild.
  pub fn require(&mut self, path: impl AsRef<Path>) -> Result<PathBuf, BuilderError> {
    let path = self.absolute(path.as_ref());
    let fingerprint = self.manager.fingerprints().fingerprint(&path)?;
    let missing = fingerprint.is_absent();
    trace!(path = %path.display(), "require");
    self.unit.record_required_path(path.clone(), fingerprint);

    if missing {
      return Err(Failure::MissingInput { path }.into());
    }
    Ok(path)
  }

  /// Declare an input that may legitimately be absent. Returns whether it exists.
  pub fn require_optional(&mut self, path: impl AsRef<Path>) -> Result<bool, BuilderError> {
    let path = self.absolute(path.as_ref());
    let fingerprint = self.manager.fingerprints().fingerprint(&path)?;
    let exists = !fingerprint.is_absent();
    self.unit.record_required_path(path, fingerprint);
    Ok(exists)
  }

  /// Declare every file under `dir` ending in `.{extension}` as an input and
  /// return them sorted. A missing directory yields no files.
  ///
  /// Each matching file is recorded, plus the set of matching names, so that
  /// a file appearing or disappearing is a change. Unrelated files in the same
  /// directory are not recorded and do not cause rebuilds.
  pub fn require_files(&mut self, dir: impl AsRef<Path>, extension: &str) -> Result<Vec<PathBuf>, BuilderError> {
    let dir = self.absolute(dir.as_ref());
    let listing = self.manager.fingerprints().listing(&dir, extension)?;
    trace!(dir = %dir.display(), extension, "require files");
    self.unit.record_required_listing(dir.clone(), extension, listing);
    if !dir.is_dir() {
      return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&dir).sort_by_file_name() {
      let entry = entry.map_err(|e| {
        let path = e.path().unwrap_or(&dir).to_path_buf();
        BuildError::io(path, e.into())
      })?;
      if entry.file_type().is_file() && entry.path().extension().is_some_and(|ext| ext == extension) {
        files.push(entry.into_path());
      }
    }
    for file in &files {
      self.require_optional(file)?;
    }
    Ok(files)
  }

  /// Declare that this unit writes `path`. Its fingerprint is taken after the
  /// body returns.
  pub fn provide(&mut self, path: impl AsRef<Path>) -> PathBuf {
    let path = self.absolute(path.as_ref());
    trace!(path = %path.display(), "provide");
    self.unit.record_provided_path(path.clone());
    path
  }

  /// Require another build and return its output.
  ///
  /// The edge is recorded whether or not the sub-build succeeded. A failed
  /// sub-build fails this unit with [`Failure::RequiredBuildFailed`].
  pub fn require_build<B: Builder>(&mut self, input: &B::Input) -> Result<B::Output, BuilderError> {
    let request = BuildRequest::new::<B>(input)?;
    let value = self.require_request(&request)?;
    Ok(serde_json::from_value(value)?)
  }

  /// Untyped form of [`BuildContext::require_build`].
  pub fn require_request(&mut self, request: &BuildRequest) -> Result<Value, BuilderError> {
    let key = request.key()?;
    let resolved = self.manager.require(request)?;
    self
      .unit
      .record_required_build(key.clone(), request.clone(), resolved.stamp());

    match resolved.result {
      Ok(output) => Ok(output),
      Err(_) => {
        debug!(required = %key, "required build failed");
        Err(
          Failure::RequiredBuildFailed {
            key,
            description: resolved.description,
          }
          .into(),
        )
      }
    }
  }

  /// Run an external tool in the working directory.
  ///
  /// A non-zero exit fails the unit with the tool's diagnostics.
  pub fn invoke(&mut self, tool: &str, args: &[String]) -> Result<ToolOutput, BuilderError> {
    let output = self
      .manager
      .tool()
      .invoke(tool, args, self.manager.working_dir())
      .map_err(|e| match e {
        ToolError::Spawn { tool, source } => Failure::ToolSpawn {
          tool,
          message: source.to_string(),
        },
        ToolError::Timeout { tool, timeout } => Failure::ToolTimeout {
          tool,
          limit_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        },
      })?;

    if !output.success() {
      let diagnostics = if output.stderr.trim().is_empty() {
        output.stdout.clone()
      } else {
        output.stderr.clone()
      };
      return Err(
        Failure::ToolExecution {
          tool: tool.to_string(),
          code: output.exit_code,
          diagnostics,
        }
        .into(),
      );
    }
    Ok(output)
  }

  /// Provide `path`, failing the unit if `tool` did not actually create it.
  pub fn expect_output(&mut self, tool: &str, path: impl AsRef<Path>) -> Result<PathBuf, BuilderError> {
    let path = self.provide(path);
    if !path.exists() {
      return Err(
        Failure::MissingOutput {
          tool: tool.to_string(),
          path,
        }
        .into(),
      );
    }
    Ok(path)
  }

  /// Write `contents` to `path`, creating parent directories, and provide it.
  pub fn write_file(&mut self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<PathBuf, BuilderError> {
    let path = self.provide(path);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
    }
    fs::write(&path, contents).map_err(|e| BuildError::io(&path, e))?;
    Ok(path)
  }

  /// Require `from`, copy it to `to` and provide the copy.
  pub fn copy_file(&mut self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<PathBuf, BuilderError> {
    let from = self.require(from)?;
    let to = self.provide(to);
    if let Some(parent) = to.parent() {
      fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
    }
    fs::copy(&from, &to).map_err(|e| BuildError::io(&from, e))?;
    Ok(to)
  }

  /// Ensure a directory exists. Not recorded as a dependency.
  pub fn create_dir(&mut self, path: impl AsRef<Path>) -> Result<PathBuf, BuilderError> {
    let path = self.absolute(path.as_ref());
    fs::create_dir_all(&path).map_err(|e| BuildError::io(&path, e))?;
    Ok(path)
  }
}
