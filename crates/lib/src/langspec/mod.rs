//! Language specification projects: configuration, file layout, builders, and
//! the per-phase entry points a driver calls.

pub mod builders;
mod config;
pub mod inputs;
pub mod paths;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::builder::{BuildRequest, Builder, BuilderRegistry};
use crate::consts::APP_NAME;
use crate::fingerprint::FingerprintStore;
use crate::manager::{BuildError, BuildManager};
use crate::phase::{BuildStep, Phase, PhaseError, PhaseReport, PhaseRun, PhaseSequencer};
use crate::tool::Tool;
use crate::unit::UnitStore;
use builders::editor::{DsCompile, EsvCompile};
use builders::generate::GenerateSources;
use builders::package::Package;

pub use config::{
  BuildSettings, ConfigError, DynSemConfig, LanguageSpecConfig, SdfConfig, StrategoConfig, StrategoFormat,
};
pub use inputs::BuildInputs;
pub use paths::LanguageSpecPaths;

/// A loaded language specification project.
#[derive(Debug, Clone)]
pub struct LanguageSpec {
  root: PathBuf,
  config: LanguageSpecConfig,
  paths: LanguageSpecPaths,
}

impl LanguageSpec {
  pub fn new(root: impl Into<PathBuf>, config: LanguageSpecConfig) -> Self {
    let root = root.into();
    let paths = LanguageSpecPaths::new(&root, &config);
    Self { root, config, paths }
  }

  /// Load the project rooted at `root` from its `metabuild.yaml`.
  pub fn load(root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
    let root = root.into();
    let config = LanguageSpecConfig::load(&root)?;
    Ok(Self::new(root, config))
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn config(&self) -> &LanguageSpecConfig {
    &self.config
  }

  /// Absolute file layout.
  pub fn paths(&self) -> &LanguageSpecPaths {
    &self.paths
  }

  pub fn inputs(&self) -> BuildInputs {
    BuildInputs::new(&self.config)
  }

  pub fn unit_store(&self) -> UnitStore {
    UnitStore::new(self.paths.units_dir())
  }
}

/// Component description consumed by the language runtime.
#[derive(Serialize)]
struct ComponentConfig<'a> {
  name: &'a str,
  syntax: &'a str,
  stratego: Option<StrategoFormat>,
  strategies_package: String,
}

/// Runs the phases of a language specification build.
pub struct LanguageSpecBuilder<'t> {
  registry: BuilderRegistry,
  tool: &'t dyn Tool,
  steps: Vec<Box<dyn BuildStep<LanguageSpec>>>,
}

impl<'t> LanguageSpecBuilder<'t> {
  /// A builder with every language specification builder registered.
  pub fn new(tool: &'t dyn Tool) -> Result<Self, BuildError> {
    let mut registry = BuilderRegistry::new();
    builders::register_all(&mut registry)?;
    Ok(Self {
      registry,
      tool,
      steps: Vec::new(),
    })
  }

  /// Add a hook run before and after every phase.
  pub fn with_step(mut self, step: Box<dyn BuildStep<LanguageSpec>>) -> Self {
    self.steps.push(step);
    self
  }

  pub fn registry(&self) -> &BuilderRegistry {
    &self.registry
  }

  /// A fresh session for one phase.
  fn manager(&self, spec: &LanguageSpec) -> BuildManager<'_> {
    BuildManager::new(&self.registry, self.tool, spec.unit_store(), &spec.root)
      .with_fingerprints(FingerprintStore::new(spec.config.build.stamper))
  }

  /// Run a single phase.
  pub fn run(&self, phase: Phase, spec: &LanguageSpec) -> Result<PhaseReport, PhaseError> {
    match phase {
      Phase::Initialize => self.initialize(spec),
      Phase::GenerateSources => self.generate_sources(spec),
      Phase::PreLink => self.compile_pre_link(spec),
      Phase::PostLink => self.compile_post_link(spec),
      Phase::Clean => self.clean(spec),
    }
  }

  /// Run every build phase in order, stopping at the first that errors.
  pub fn build(&self, spec: &LanguageSpec) -> Result<Vec<PhaseReport>, PhaseError> {
    Phase::build_phases().map(|phase| self.run(phase, spec)).collect()
  }

  /// Create the generated-file directories.
  pub fn initialize(&self, spec: &LanguageSpec) -> Result<PhaseReport, PhaseError> {
    let sequencer = PhaseSequencer::new(&self.steps);
    let run = sequencer.begin(Phase::Initialize, spec)?;

    let paths = &spec.paths;
    for dir in [
      paths.include_dir(),
      paths.lib_dir(),
      paths.src_gen_dir(),
      paths.src_gen_syntax_dir(),
    ] {
      fs::create_dir_all(&dir).map_err(|source| PhaseError::Io {
        phase: Phase::Initialize,
        action: "create",
        path: dir.clone(),
        source,
      })?;
    }

    run.finish()
  }

  /// Write the component configuration and generate every source.
  pub fn generate_sources(&self, spec: &LanguageSpec) -> Result<PhaseReport, PhaseError> {
    let sequencer = PhaseSequencer::new(&self.steps);
    let mut run = sequencer.begin(Phase::GenerateSources, spec)?;

    write_component_config(spec)?;

    let request = request::<GenerateSources>(&run, &spec.inputs().generate())?;
    let mut manager = self.manager(spec);
    run.request(&mut manager, &request)?;
    run.finish()
  }

  /// Compile editor services and the DynSem interpreter, for whichever of the
  /// two the project has.
  pub fn compile_pre_link(&self, spec: &LanguageSpec) -> Result<PhaseReport, PhaseError> {
    let sequencer = PhaseSequencer::new(&self.steps);
    let mut run = sequencer.begin(Phase::PreLink, spec)?;

    let inputs = spec.inputs();
    let mut requests = Vec::new();
    if spec.paths.esv_main_file().is_file() {
      requests.push(request::<EsvCompile>(&run, &inputs.esv())?);
    } else {
      debug!("no editor services, skipping esv");
    }
    if spec.paths.ds_main_file().is_file() {
      requests.push(request::<DsCompile>(&run, &inputs.dynsem())?);
    } else {
      debug!("no semantics, skipping dynsem");
    }

    let mut manager = self.manager(spec);
    run.request_all(&mut manager, &requests)?;
    run.finish()
  }

  /// Package tables and compiled strategies.
  pub fn compile_post_link(&self, spec: &LanguageSpec) -> Result<PhaseReport, PhaseError> {
    let sequencer = PhaseSequencer::new(&self.steps);
    let mut run = sequencer.begin(Phase::PostLink, spec)?;

    let request = request::<Package>(&run, &spec.inputs().package())?;
    let mut manager = self.manager(spec);
    run.request(&mut manager, &request)?;
    run.finish()
  }

  /// Delete generated files and every persisted unit.
  pub fn clean(&self, spec: &LanguageSpec) -> Result<PhaseReport, PhaseError> {
    let sequencer = PhaseSequencer::new(&self.steps);
    let run = sequencer.begin(Phase::Clean, spec)?;

    let store = spec.unit_store();
    let units = store.list().map_err(|e| run.abort(e.into()))?;
    for provided in units.iter().flat_map(|unit| &unit.provided_paths) {
      // Units record absolute paths; never follow one out of the project.
      if provided.path.starts_with(&spec.root) {
        remove_provided(&provided.path)?;
      }
    }

    let paths = &spec.paths;
    remove_java_files(&paths.ds_java_dir())?;
    for dir in [
      paths.include_dir(),
      paths.str_java_dir(),
      paths.src_gen_dir(),
      paths.cache_dir(),
    ] {
      remove_dir(&dir)?;
    }
    for file in [paths.str_ctree_file(), paths.str_jar_file(), paths.esv_packed_file()] {
      remove_file(&file)?;
    }

    let removed = store.clear().map_err(|e| run.abort(e.into()))?;
    info!(units = removed, "cleared build units");

    run.finish()
  }
}

fn request<B: Builder>(run: &PhaseRun<'_, LanguageSpec>, input: &B::Input) -> Result<BuildRequest, PhaseError> {
  BuildRequest::new::<B>(input).map_err(|e| run.abort(e.into()))
}

/// Write `src-gen/metaborg.component.yaml`, leaving it untouched when the
/// content is the same.
fn write_component_config(spec: &LanguageSpec) -> Result<(), PhaseError> {
  let path = spec.paths.component_config_file();
  let io_error = |action, source| PhaseError::Io {
    phase: Phase::GenerateSources,
    action,
    path: path.clone(),
    source,
  };

  let config = &spec.config;
  let component = ComponentConfig {
    name: &config.name,
    syntax: config.sdf_module(),
    stratego: config.stratego.enabled.then_some(config.stratego.format),
    strategies_package: config.strategies_package(),
  };
  let yaml = serde_yaml::to_string(&component).map_err(|e| io_error("serialize", io::Error::other(e)))?;
  let content = format!("# Generated by {}, do not edit.\n{}", APP_NAME, yaml);

  if fs::read_to_string(&path).is_ok_and(|existing| existing == content) {
    debug!(path = %path.display(), "component configuration unchanged");
    return Ok(());
  }
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).map_err(|source| io_error("create", source))?;
  }
  fs::write(&path, content).map_err(|source| io_error("write", source))?;
  debug!(path = %path.display(), "wrote component configuration");
  Ok(())
}

fn clean_error(path: &Path, source: io::Error) -> PhaseError {
  PhaseError::Io {
    phase: Phase::Clean,
    action: "remove",
    path: path.to_path_buf(),
    source,
  }
}

fn remove_dir(dir: &Path) -> Result<(), PhaseError> {
  match fs::remove_dir_all(dir) {
    Ok(()) => {
      debug!(path = %dir.display(), "removed");
      Ok(())
    }
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(clean_error(dir, e)),
  }
}

fn remove_file(file: &Path) -> Result<(), PhaseError> {
  match fs::remove_file(file) {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(clean_error(file, e)),
  }
}

fn remove_provided(path: &Path) -> Result<(), PhaseError> {
  if path.is_dir() {
    remove_dir(path)
  } else {
    remove_file(path)
  }
}

fn remove_java_files(dir: &Path) -> Result<(), PhaseError> {
  if !dir.is_dir() {
    return Ok(());
  }
  for entry in WalkDir::new(dir) {
    let entry = entry.map_err(|e| clean_error(dir, e.into()))?;
    if entry.file_type().is_file() && entry.path().extension().is_some_and(|ext| ext == "java") {
      remove_file(entry.path())?;
    }
  }
  Ok(())
}
