//! Implementation of the `mb status` command.
//!
//! Lists persisted build units in dependency order, grouped by level.

use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::{OwoColorize, Stream};

use metabuild_lib::graph::UnitGraph;
use metabuild_lib::store_lock::{StoreLock, StoreLockError};
use metabuild_lib::unit::UnitState;

use super::load_spec;
use crate::output::{OutputFormat, print_info, print_json, print_stat, print_warning, symbols, truncate_hash};

pub fn cmd_status(project: &Path, verbose: bool, output: OutputFormat) -> Result<()> {
  let spec = load_spec(project)?;
  let store = spec.unit_store();
  // Units are replaced atomically, so a running build only makes the listing
  // stale, not unreadable.
  let _lock = match StoreLock::shared(store.base_path()) {
    Ok(lock) => Some(lock),
    Err(StoreLockError::Busy { holder, .. }) => {
      let who = holder.map_or_else(|| "another process".to_string(), |h| h.to_string());
      print_warning(&format!("Build in progress ({}); units may be out of date", who));
      None
    }
    Err(e) => return Err(e).context("Failed to acquire unit store lock"),
  };

  let units = store.list().context("Failed to read build units")?;
  let graph = UnitGraph::from_units(units)?;
  let levels = graph.levels()?;

  if output.is_json() {
    let items: Vec<_> = levels
      .iter()
      .enumerate()
      .flat_map(|(level, units)| {
        units.iter().map(move |unit| {
          serde_json::json!({
            "key": unit.key,
            "builder": unit.request.builder,
            "description": unit.description,
            "state": unit.state.label(),
            "level": level,
          })
        })
      })
      .collect();
    return print_json(&serde_json::json!({ "project": spec.config().name, "units": items }));
  }

  if graph.is_empty() {
    print_info("No build units. Run 'mb build' to build the project.");
    return Ok(());
  }

  print_stat("Project", &spec.config().name);
  print_stat("Units", &graph.len().to_string());
  let failed = graph
    .topological()?
    .into_iter()
    .filter(|u| matches!(u.state, UnitState::Failed { .. }))
    .count();
  print_stat("Failed", &failed.to_string());

  for (level, units) in levels.iter().enumerate() {
    println!();
    println!("Level {}:", level);
    for unit in units {
      let symbol = match &unit.state {
        UnitState::Succeeded => symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()).to_string(),
        UnitState::Failed { .. } => symbols::ERROR.if_supports_color(Stream::Stdout, |s| s.red()).to_string(),
        _ => symbols::INFO.to_string(),
      };
      let key = unit.key.to_string();
      println!(
        "  {} {} {}",
        symbol,
        unit.description,
        truncate_hash(&key).if_supports_color(Stream::Stdout, |s| s.dimmed())
      );
      if verbose && let UnitState::Failed { reason } = &unit.state {
        println!("      {}", reason);
      }
    }
  }

  Ok(())
}
