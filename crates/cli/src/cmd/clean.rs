//! Implementation of the `mb clean` command.

use std::path::Path;

use anyhow::{Context, Result};

use metabuild_lib::langspec::LanguageSpecBuilder;
use metabuild_lib::phase::Phase;
use metabuild_lib::store_lock::StoreLock;

use super::{load_spec, process_tool};
use crate::output::{OutputFormat, print_json, print_report};

/// Delete generated files and all persisted build units.
pub fn cmd_clean(project: &Path, output: OutputFormat) -> Result<()> {
  let spec = load_spec(project)?;
  let _lock = StoreLock::exclusive(&spec.paths().units_dir(), spec.root(), &[Phase::Clean])
    .context("Failed to acquire unit store lock")?;

  let tool = process_tool(&spec);
  let builder = LanguageSpecBuilder::new(&tool)?;
  let report = builder.clean(&spec).context("Clean failed")?;

  if output.is_json() {
    print_json(&report)?;
  } else {
    print_report(&report);
  }
  Ok(())
}
