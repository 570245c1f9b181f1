//! Request resolution: deciding whether a unit is up to date, and re-running
//! its builder when it is not.
//!
//! # Algorithm
//!
//! For a request with key `k`:
//!
//! 1. If `k` was already resolved in this session, reuse that result. Each
//!    request executes at most once per manager.
//! 2. If `k` is on the stack of requests currently being resolved, stop with
//!    [`BuildError::CycleDetected`].
//! 3. Load the persisted unit. A missing unit, one left unfinished by an
//!    interrupted run, or one recorded for a different request is executed.
//! 4. Otherwise the unit is checked for changes: required builds (resolved
//!    recursively, in recorded order) against their recorded result stamps,
//!    then required paths against their fingerprints, then provided paths.
//! 5. Unchanged and succeeded: the persisted output is reused. Unchanged and
//!    failed: the body is not run again and the request reports
//!    [`BuildError::NoRebuildOfFailingBuilder`].
//! 6. Changed: the body runs with a fresh [`BuildContext`]; the unit is
//!    persisted atomically once it reaches a terminal state.
//!
//! Fatal errors abort the whole resolution and leave the previously persisted
//! unit in place.

mod types;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::builder::{BuildContext, BuildRequest, Builder, BuilderRegistry, DynBuilder, RequestKey};
use crate::fingerprint::FingerprintStore;
use crate::tool::Tool;
use crate::unit::{BuildUnit, ResultStamp, UnitState, UnitStore};

pub use types::*;

/// Outcome of resolving one request within a session.
#[derive(Debug, Clone)]
pub(crate) struct Resolved {
  pub description: String,
  pub resolution: Resolution,
  pub result: Result<Value, Failure>,
}

impl Resolved {
  pub fn stamp(&self) -> ResultStamp {
    match &self.result {
      Ok(output) => ResultStamp::Output(output.clone()),
      Err(_) => ResultStamp::Failed,
    }
  }
}

/// Resolves build requests against a unit store.
///
/// A manager is one session: results are memoized for its lifetime, so a
/// fresh manager should be used whenever the file system may have changed
/// underneath (for instance once per build phase).
pub struct BuildManager<'a> {
  registry: &'a BuilderRegistry,
  tool: &'a dyn Tool,
  store: UnitStore,
  fingerprints: FingerprintStore,
  working_dir: PathBuf,
  stack: Vec<(RequestKey, String)>,
  session: HashMap<RequestKey, Resolved>,
  stats: SessionStats,
}

impl<'a> BuildManager<'a> {
  pub fn new(registry: &'a BuilderRegistry, tool: &'a dyn Tool, store: UnitStore, working_dir: impl Into<PathBuf>) -> Self {
    Self {
      registry,
      tool,
      store,
      fingerprints: FingerprintStore::default(),
      working_dir: working_dir.into(),
      stack: Vec::new(),
      session: HashMap::new(),
      stats: SessionStats::default(),
    }
  }

  pub fn with_fingerprints(mut self, fingerprints: FingerprintStore) -> Self {
    self.fingerprints = fingerprints;
    self
  }

  pub fn working_dir(&self) -> &Path {
    &self.working_dir
  }

  pub fn fingerprints(&self) -> &FingerprintStore {
    &self.fingerprints
  }

  pub fn tool(&self) -> &'a dyn Tool {
    self.tool
  }

  pub fn store(&self) -> &UnitStore {
    &self.store
  }

  pub fn stats(&self) -> &SessionStats {
    &self.stats
  }

  /// The description the request's builder gives it.
  pub fn describe(&self, request: &BuildRequest) -> Result<String, BuildError> {
    self.registry.get(&request.builder)?.description(&request.input)
  }

  /// Bring a typed request up to date and return its output.
  pub fn build<B: Builder>(&mut self, input: &B::Input) -> Result<B::Output, BuildError> {
    let request = BuildRequest::new::<B>(input)?;
    let output = self.resolve(&request)?;
    Ok(serde_json::from_value(output)?)
  }

  /// Bring `request` up to date and return its output.
  ///
  /// A unit that ends in a failed state is reported as
  /// [`BuildError::BuildFailed`], or as
  /// [`BuildError::NoRebuildOfFailingBuilder`] if its body was not re-run.
  pub fn resolve(&mut self, request: &BuildRequest) -> Result<Value, BuildError> {
    let key = request.key()?;
    let resolved = self.require(request)?;

    match resolved.result {
      Ok(output) => Ok(output),
      Err(_) if resolved.resolution == Resolution::Suppressed => Err(BuildError::NoRebuildOfFailingBuilder {
        key,
        description: resolved.description,
      }),
      Err(failure) => Err(BuildError::BuildFailed {
        key,
        description: resolved.description,
        failure,
      }),
    }
  }

  /// Resolve `request`, memoized per session and guarded against cycles.
  pub(crate) fn require(&mut self, request: &BuildRequest) -> Result<Resolved, BuildError> {
    let key = request.key()?;
    if let Some(done) = self.session.get(&key) {
      return Ok(done.clone());
    }

    let registry = self.registry;
    let builder = registry.get(&request.builder)?;
    let description = builder.description(&request.input)?;

    if let Some(start) = self.stack.iter().position(|(k, _)| *k == key) {
      let mut cycle: Vec<String> = self.stack[start..].iter().map(|(_, d)| d.clone()).collect();
      cycle.push(description);
      return Err(BuildError::CycleDetected { cycle });
    }

    self.stack.push((key.clone(), description.clone()));
    let result = self.require_unguarded(&key, request, builder, description);
    self.stack.pop();

    let resolved = result?;
    self.session.insert(key, resolved.clone());
    Ok(resolved)
  }

  fn require_unguarded(
    &mut self,
    key: &RequestKey,
    request: &BuildRequest,
    builder: &'a dyn DynBuilder,
    description: String,
  ) -> Result<Resolved, BuildError> {
    let location = builder.persistent_location(key, &request.input)?;

    let previous = match self.store.load(&location)? {
      Some(unit) if unit.key != *key || unit.request != *request => {
        warn!(location = %location.display(), "unit belongs to a different request, rebuilding");
        None
      }
      other => other,
    };

    let Some(unit) = previous else {
      debug!(%key, "never built");
      return self.execute(key, request, builder, description, &location);
    };

    if !unit.state.is_finished() {
      debug!(%key, state = unit.state.label(), "previous run did not finish");
      return self.execute(key, request, builder, description, &location);
    }

    if let Some(reason) = self.find_change(&unit)? {
      info!(%key, %reason, "{}", description);
      return self.execute(key, request, builder, description, &location);
    }

    match unit.state {
      UnitState::Failed { reason } => {
        warn!(%key, "{}: {}", description, FAILING_REBUILD_MESSAGE);
        self.stats.suppressed += 1;
        Ok(Resolved {
          description,
          resolution: Resolution::Suppressed,
          result: Err(reason),
        })
      }
      _ => {
        debug!(%key, "up to date: {}", description);
        self.stats.cached += 1;
        Ok(Resolved {
          description,
          resolution: Resolution::Cached,
          result: Ok(unit.output.unwrap_or(Value::Null)),
        })
      }
    }
  }

  /// The first recorded dependency that no longer matches, if any.
  ///
  /// Sub-builds are brought up to date before any path is compared: a
  /// required path is often another unit's output, and it is only current once
  /// that unit has been re-run.
  fn find_change(&mut self, unit: &BuildUnit) -> Result<Option<String>, BuildError> {
    for dep in &unit.required_builds {
      let resolved = match self.require(&dep.request) {
        Ok(resolved) => resolved,
        // The recorded request no longer fits any registered builder; running
        // this unit again will issue whatever it needs now.
        Err(BuildError::UnknownBuilder(_) | BuildError::Serialize(_)) => {
          return Ok(Some(format!("required build is no longer valid: {}", dep.key)));
        }
        Err(e) => return Err(e),
      };
      if resolved.stamp() != dep.stamp {
        return Ok(Some(format!("required build changed: {}", resolved.description)));
      }
    }

    for dep in &unit.required_paths {
      let changed = match &dep.extension {
        Some(extension) => self.fingerprints.listing_changed(&dep.path, extension, &dep.fingerprint)?,
        None => self.fingerprints.changed(&dep.path, &dep.fingerprint)?,
      };
      if changed {
        return Ok(Some(format!("required path changed: {}", dep.path.display())));
      }
    }

    for dep in &unit.provided_paths {
      if self.fingerprints.changed(&dep.path, &dep.fingerprint)? {
        return Ok(Some(format!("provided path changed: {}", dep.path.display())));
      }
    }

    Ok(None)
  }

  fn execute(
    &mut self,
    key: &RequestKey,
    request: &BuildRequest,
    builder: &'a dyn DynBuilder,
    description: String,
    location: &Path,
  ) -> Result<Resolved, BuildError> {
    info!(builder = builder.id(), %key, "{}", description);

    let mut unit = BuildUnit::new(key.clone(), request.clone(), description.clone());
    unit.start();

    let outcome = {
      let mut ctx = BuildContext::new(self, &mut unit);
      builder.build(&request.input, &mut ctx)
    };

    let result = match outcome {
      Ok(output) => {
        unit.succeed(output.clone());
        Ok(output)
      }
      Err(BuilderError::Failed(failure)) => {
        warn!(builder = builder.id(), %key, "{} failed: {}", description, failure);
        unit.fail(failure.clone());
        self.stats.failed += 1;
        Err(failure)
      }
      Err(BuilderError::Fatal(e)) => return Err(e),
    };

    for provided in &mut unit.provided_paths {
      provided.fingerprint = self.fingerprints.fingerprint(&provided.path)?;
    }

    self.store.store(location, &unit)?;
    self.stats.executed.push(key.clone());

    Ok(Resolved {
      description,
      resolution: Resolution::Executed,
      result,
    })
  }
}
