//! Implementation of the `mb init` command.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use owo_colors::OwoColorize;

use metabuild_lib::consts::CONFIG_FILENAME;
use metabuild_lib::langspec::LanguageSpecConfig;
use metabuild_lib::phase::Phase;

use super::cmd_phases;
use crate::output::{OutputFormat, symbols};

/// Run the initialize phase, first writing a minimal configuration when
/// `name` is given and the project has none.
pub fn cmd_init(project: &Path, name: Option<&str>, output: OutputFormat) -> Result<()> {
  let config_path = project.join(CONFIG_FILENAME);

  if let Some(name) = name {
    if config_path.exists() {
      bail!("{} already exists", config_path.display());
    }
    let config = LanguageSpecConfig::new(name);
    config.validate()?;
    fs::create_dir_all(project).with_context(|| format!("Failed to create {}", project.display()))?;
    let yaml = config.to_yaml().context("Failed to serialize configuration")?;
    fs::write(&config_path, yaml).with_context(|| format!("Failed to write {}", config_path.display()))?;

    if !output.is_json() {
      println!(
        "{} {} {}",
        symbols::SUCCESS.green(),
        "Created".green().bold(),
        config_path.display()
      );
    }
  }

  cmd_phases(project, &[Phase::Initialize], output)
}
