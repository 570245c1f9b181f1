//! Implementation of the phase commands: `generate`, `pre-link`, `post-link`
//! and `build`.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use tracing::info;

use metabuild_lib::langspec::LanguageSpecBuilder;
use metabuild_lib::phase::{Phase, PhaseError, PhaseReport};
use metabuild_lib::store_lock::StoreLock;

use super::{load_spec, process_tool};
use crate::output::{OutputFormat, format_duration, print_json, print_report, print_stat};

/// Run `phases` in order against the project at `project`.
///
/// Stops at the first phase that aborts. Exits with an error if any phase
/// aborted or reported failed, suppressed, or hook failures.
pub fn cmd_phases(project: &Path, phases: &[Phase], output: OutputFormat) -> Result<()> {
  let start = Instant::now();
  let spec = load_spec(project)?;

  let command = phases.iter().map(Phase::as_str).collect::<Vec<_>>().join(",");
  let _lock = StoreLock::exclusive(&spec.paths().units_dir(), spec.root(), phases)
    .context("Failed to acquire unit store lock")?;

  let tool = process_tool(&spec);
  let builder = LanguageSpecBuilder::new(&tool)?;

  let mut reports: Vec<PhaseReport> = Vec::new();
  let mut error: Option<PhaseError> = None;
  for &phase in phases {
    match builder.run(phase, &spec) {
      Ok(report) => reports.push(report),
      Err(e) => {
        if let Some(report) = e.report() {
          reports.push(report.clone());
        }
        error = Some(e);
        break;
      }
    }
  }

  if output.is_json() {
    print_json(&reports)?;
  } else {
    for report in &reports {
      print_report(report);
    }
    println!();
    print_stat("Duration", &format_duration(start.elapsed()));
  }

  if let Some(e) = error {
    return Err(e).context(format!("{} failed", command));
  }

  let failed = reports.iter().filter(|r| !r.is_success()).count();
  if failed > 0 {
    let requests: usize = reports.iter().map(|r| r.failures().len()).sum();
    bail!("{} phase(s) reported failures, {} request(s) not built", failed, requests);
  }

  info!(phases = %command, "build finished");
  Ok(())
}
