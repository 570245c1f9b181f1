//! Build phases and the hooks around them.
//!
//! A project build is split into a closed, ordered set of [`Phase`]s. The caller
//! picks exactly one phase per invocation; nothing transitions implicitly.
//! Running a phase means:
//!
//! 1. run every [`BuildStep`] hook at [`HookPoint::Before`],
//! 2. do the phase's own work and issue its build requests in order,
//! 3. run every hook at [`HookPoint::After`].
//!
//! A failing hook is recorded in the [`PhaseReport`] and the remaining hooks
//! still run, unless the hook is fatal. A request suppressed with
//! `NoRebuildOfFailingBuilder` is recorded and the phase continues; any other
//! request failure aborts the phase, skipping the remaining requests and the
//! `After` hooks.

mod types;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::builder::BuildRequest;
use crate::manager::{BuildError, BuildManager, FAILING_REBUILD_MESSAGE};

pub use types::*;

/// An externally supplied action run before or after a phase.
///
/// `I` is whatever the driver hands to its hooks; for language specifications
/// it is the loaded project.
pub trait BuildStep<I: ?Sized> {
  fn name(&self) -> &str;

  /// Whether a failure of this step stops the phase.
  fn fatal(&self) -> bool {
    false
  }

  fn execute(&self, phase: Phase, point: HookPoint, input: &I) -> anyhow::Result<()>;
}

/// Runs phases against a fixed set of hooks.
pub struct PhaseSequencer<'s, I: ?Sized> {
  steps: &'s [Box<dyn BuildStep<I>>],
}

impl<'s, I: ?Sized> PhaseSequencer<'s, I> {
  pub fn new(steps: &'s [Box<dyn BuildStep<I>>]) -> Self {
    Self { steps }
  }

  /// Start `phase`: runs the `Before` hooks.
  pub fn begin<'r>(&'r self, phase: Phase, input: &'r I) -> Result<PhaseRun<'r, I>, PhaseError> {
    info!(%phase, "starting phase");
    let mut run = PhaseRun {
      steps: self.steps,
      input,
      report: PhaseReport::new(phase),
    };
    run.hooks(HookPoint::Before)?;
    Ok(run)
  }
}

/// A phase in progress.
pub struct PhaseRun<'r, I: ?Sized> {
  steps: &'r [Box<dyn BuildStep<I>>],
  input: &'r I,
  report: PhaseReport,
}

impl<I: ?Sized> PhaseRun<'_, I> {
  pub fn phase(&self) -> Phase {
    self.report.phase
  }

  pub fn report(&self) -> &PhaseReport {
    &self.report
  }

  fn hooks(&mut self, point: HookPoint) -> Result<(), PhaseError> {
    let phase = self.report.phase;
    for step in self.steps {
      debug!(%phase, %point, step = step.name(), "running build step");
      if let Err(source) = step.execute(phase, point, self.input) {
        if step.fatal() {
          return Err(PhaseError::Hook {
            phase,
            step: step.name().to_string(),
            source,
          });
        }
        warn!(%phase, %point, step = step.name(), error = %source, "build step failed");
        self.report.hook_failures.push(HookFailure {
          step: step.name().to_string(),
          point,
          message: format!("{:#}", source),
        });
      }
    }
    Ok(())
  }

  /// Bring one request up to date.
  ///
  /// Returns the output, or `None` if the request was suppressed as an
  /// unchanged failure. Any other failure aborts the phase.
  pub fn request(&mut self, manager: &mut BuildManager<'_>, request: &BuildRequest) -> Result<Option<Value>, PhaseError> {
    let result = manager.resolve(request);
    self.report.stats = manager.stats().clone();

    match result {
      Ok(output) => {
        let key = request.key().map_err(|e| self.abort(e.into()))?;
        let description = manager.describe(request).map_err(|e| self.abort(e))?;
        self.report.requests.push(RequestReport {
          key,
          builder: request.builder.clone(),
          description,
          outcome: RequestOutcome::Succeeded { output: output.clone() },
        });
        Ok(Some(output))
      }
      Err(BuildError::NoRebuildOfFailingBuilder { key, description }) => {
        self.report.requests.push(RequestReport {
          key,
          builder: request.builder.clone(),
          description,
          outcome: RequestOutcome::Suppressed {
            message: FAILING_REBUILD_MESSAGE.to_string(),
          },
        });
        Ok(None)
      }
      Err(error) => {
        if let BuildError::BuildFailed { key, description, failure } = &error {
          self.report.requests.push(RequestReport {
            key: key.clone(),
            builder: request.builder.clone(),
            description: description.clone(),
            outcome: RequestOutcome::Failed {
              reason: failure.to_string(),
            },
          });
        }
        Err(self.abort(error))
      }
    }
  }

  /// Issue `requests` in order.
  pub fn request_all(&mut self, manager: &mut BuildManager<'_>, requests: &[BuildRequest]) -> Result<(), PhaseError> {
    for request in requests {
      self.request(manager, request)?;
    }
    Ok(())
  }

  /// Abort with a fatal error, keeping what was recorded so far.
  pub fn abort(&self, error: BuildError) -> PhaseError {
    PhaseError::Aborted {
      phase: self.report.phase,
      report: Box::new(self.report.clone()),
      error,
    }
  }

  /// Run the `After` hooks and return the report.
  pub fn finish(mut self) -> Result<PhaseReport, PhaseError> {
    self.hooks(HookPoint::After)?;
    info!(
      phase = %self.report.phase,
      executed = self.report.stats.executed_count(),
      cached = self.report.stats.cached,
      suppressed = self.report.stats.suppressed,
      "phase finished"
    );
    Ok(self.report)
  }
}
