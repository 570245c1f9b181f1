//! Project configuration, read from `metabuild.yaml`.
//!
//! ```yaml
//! name: Entity
//! sdf:
//!   args: ["-Idef", "lib/Common.def"]
//! stratego:
//!   format: jar
//!   package: org.example.entity.strategies
//! build:
//!   stamper: modified
//!   tool_timeout_secs: 300
//! tools:
//!   sdf2table:
//!     command: /opt/sdf/bin/sdf2table
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{CONFIG_FILENAME, STAMPER_ENV, TOOL_TIMEOUT_ENV};
use crate::fingerprint::Stamper;
use crate::tool::ToolCommand;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read {}: {source}", path.display())]
  Read { path: PathBuf, source: std::io::Error },

  #[error("failed to parse {}: {source}", path.display())]
  Parse { path: PathBuf, source: serde_yaml::Error },

  #[error("invalid configuration: {0}")]
  Invalid(String),

  #[error("invalid value '{value}' for {var}: {message}")]
  Env {
    var: &'static str,
    value: String,
    message: String,
  },
}

/// What the Stratego compiler produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategoFormat {
  /// A single compiled tree, interpreted at runtime.
  #[default]
  Ctree,
  /// Java sources, packaged into jars after the Java compile.
  Jar,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdfConfig {
  /// Main syntax module; defaults to the language name.
  pub module: Option<String>,
  /// Optional meta-syntax module whose table is built alongside.
  pub meta_module: Option<String>,
  pub args: Vec<String>,
  /// Prebuilt definition used instead of packing `syntax/`.
  pub external_def: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategoConfig {
  pub enabled: bool,
  pub format: StrategoFormat,
  /// Java package for generated strategies; derived from the name if unset.
  pub package: Option<String>,
  pub args: Vec<String>,
  pub external_jar: Option<PathBuf>,
  pub external_jar_flags: Vec<String>,
}

impl Default for StrategoConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      format: StrategoFormat::default(),
      package: None,
      args: Vec::new(),
      external_jar: None,
      external_jar_flags: Vec::new(),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynSemConfig {
  /// Main semantics file; defaults to `trans/<name>.ds`.
  pub main_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
  pub stamper: Stamper,
  pub tool_timeout_secs: Option<u64>,
}

/// A language specification project's configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageSpecConfig {
  pub name: String,
  #[serde(default)]
  pub sdf: SdfConfig,
  #[serde(default)]
  pub stratego: StrategoConfig,
  #[serde(default)]
  pub dynsem: DynSemConfig,
  #[serde(default)]
  pub build: BuildSettings,
  /// Tool id to command line. Unmapped tools run under their own name.
  #[serde(default)]
  pub tools: BTreeMap<String, ToolCommand>,
}

impl LanguageSpecConfig {
  /// A configuration with every optional setting at its default.
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      sdf: SdfConfig::default(),
      stratego: StrategoConfig::default(),
      dynsem: DynSemConfig::default(),
      build: BuildSettings::default(),
      tools: BTreeMap::new(),
    }
  }

  /// Read `metabuild.yaml` from `project_dir` and apply environment overrides.
  pub fn load(project_dir: &Path) -> Result<Self, ConfigError> {
    let path = project_dir.join(CONFIG_FILENAME);
    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
      path: path.clone(),
      source,
    })?;
    let mut config: Self = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.clone(),
      source,
    })?;
    config.apply_env()?;
    config.validate()?;
    debug!(path = %path.display(), name = %config.name, "loaded configuration");
    Ok(config)
  }

  pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(self)
  }

  /// Apply `METABUILD_*` environment overrides.
  pub fn apply_env(&mut self) -> Result<(), ConfigError> {
    if let Ok(value) = std::env::var(STAMPER_ENV) {
      self.build.stamper = value.parse().map_err(|message| ConfigError::Env {
        var: STAMPER_ENV,
        value: value.clone(),
        message,
      })?;
    }

    if let Ok(value) = std::env::var(TOOL_TIMEOUT_ENV) {
      let secs: u64 = value.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::Env {
        var: TOOL_TIMEOUT_ENV,
        value: value.clone(),
        message: e.to_string(),
      })?;
      self.build.tool_timeout_secs = (secs > 0).then_some(secs);
    }

    Ok(())
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.name.trim().is_empty() {
      return Err(ConfigError::Invalid("name must not be empty".to_string()));
    }
    for module in std::iter::once(self.sdf_module()).chain(self.sdf.meta_module.as_deref()) {
      if module.is_empty() || module.contains(['/', '\\']) {
        return Err(ConfigError::Invalid(format!(
          "'{}' is not a valid module name",
          module
        )));
      }
    }
    Ok(())
  }

  pub fn sdf_module(&self) -> &str {
    self.sdf.module.as_deref().unwrap_or(&self.name)
  }

  /// Java package of the generated strategies.
  pub fn strategies_package(&self) -> String {
    if let Some(package) = &self.stratego.package {
      return package.clone();
    }
    let base: String = self
      .name
      .chars()
      .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
      .collect::<String>()
      .to_ascii_lowercase();
    format!("{}.strategies", base)
  }

  pub fn tool_timeout(&self) -> Option<Duration> {
    self.build.tool_timeout_secs.map(Duration::from_secs)
  }
}
