//! File layout of a language specification project.
//!
//! ```text
//! {project}/
//! ├── metabuild.yaml
//! ├── syntax/<Module>.sdf, <Module>.pp    # grammar and pretty-printer
//! ├── trans/<name>.str, <name>.ds         # transformations and semantics
//! ├── editor/Main.esv                     # editor services
//! ├── include/                            # generated tables, signatures
//! ├── lib/
//! ├── src-gen/                            # generated sources
//! │   ├── syntax/
//! │   ├── stratego-java/<package>/        # jar format only
//! │   ├── ds-java/
//! │   └── metaborg.component.yaml
//! └── target/
//!     ├── classes/
//!     ├── stratego-cache/
//!     └── metaborg/
//!         ├── units/                      # persisted build units
//!         ├── stratego.ctree | stratego.jar
//!         └── editor.esv.af
//! ```

use std::path::{Path, PathBuf};

use super::config::LanguageSpecConfig;

/// Every path the build reads or writes, resolved against the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageSpecPaths {
  root: PathBuf,
  name: String,
  package: String,
  ds_main: Option<PathBuf>,
}

impl LanguageSpecPaths {
  pub fn new(root: impl Into<PathBuf>, config: &LanguageSpecConfig) -> Self {
    Self {
      root: root.into(),
      name: config.name.clone(),
      package: config.strategies_package(),
      ds_main: config.dynsem.main_file.clone(),
    }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn syntax_dir(&self) -> PathBuf {
    self.root.join("syntax")
  }

  pub fn trans_dir(&self) -> PathBuf {
    self.root.join("trans")
  }

  pub fn editor_dir(&self) -> PathBuf {
    self.root.join("editor")
  }

  pub fn include_dir(&self) -> PathBuf {
    self.root.join("include")
  }

  pub fn lib_dir(&self) -> PathBuf {
    self.root.join("lib")
  }

  pub fn src_gen_dir(&self) -> PathBuf {
    self.root.join("src-gen")
  }

  pub fn src_gen_syntax_dir(&self) -> PathBuf {
    self.src_gen_dir().join("syntax")
  }

  pub fn target_dir(&self) -> PathBuf {
    self.root.join("target")
  }

  pub fn build_dir(&self) -> PathBuf {
    self.target_dir().join("metaborg")
  }

  pub fn units_dir(&self) -> PathBuf {
    self.build_dir().join("units")
  }

  pub fn cache_dir(&self) -> PathBuf {
    self.target_dir().join("stratego-cache")
  }

  pub fn classes_dir(&self) -> PathBuf {
    self.target_dir().join("classes")
  }

  pub fn component_config_file(&self) -> PathBuf {
    self.src_gen_dir().join("metaborg.component.yaml")
  }

  // Syntax

  pub fn sdf_main_file(&self, module: &str) -> PathBuf {
    self.syntax_dir().join(format!("{}.sdf", module))
  }

  pub fn pp_file(&self, module: &str) -> PathBuf {
    self.syntax_dir().join(format!("{}.pp", module))
  }

  pub fn def_file(&self, module: &str) -> PathBuf {
    self.include_dir().join(format!("{}.def", module))
  }

  pub fn permissive_def_file(&self, module: &str) -> PathBuf {
    self.include_dir().join(format!("{}-permissive.def", module))
  }

  pub fn table_file(&self, module: &str) -> PathBuf {
    self.include_dir().join(format!("{}.tbl", module))
  }

  pub fn generated_pp_file(&self, module: &str) -> PathBuf {
    self.include_dir().join(format!("{}.generated.pp", module))
  }

  pub fn generated_pp_af_file(&self, module: &str) -> PathBuf {
    self.include_dir().join(format!("{}.generated.pp.af", module))
  }

  pub fn pp_af_file(&self, module: &str) -> PathBuf {
    self.include_dir().join(format!("{}.pp.af", module))
  }

  pub fn parenthesizer_file(&self, module: &str) -> PathBuf {
    self.include_dir().join(format!("{}-parenthesize.str", module))
  }

  pub fn rtg_file(&self, module: &str) -> PathBuf {
    self.include_dir().join(format!("{}.rtg", module))
  }

  pub fn signature_file(&self, module: &str) -> PathBuf {
    self.include_dir().join(format!("{}.str", module))
  }

  // Stratego

  pub fn str_main_file(&self) -> PathBuf {
    self.trans_dir().join(format!("{}.str", self.name))
  }

  pub fn str_ctree_file(&self) -> PathBuf {
    self.build_dir().join("stratego.ctree")
  }

  /// Root of the generated Stratego Java tree.
  pub fn str_java_dir(&self) -> PathBuf {
    self.src_gen_dir().join("stratego-java")
  }

  pub fn str_java_trans_dir(&self) -> PathBuf {
    let mut dir = self.str_java_dir();
    dir.extend(self.package.split('.'));
    dir
  }

  pub fn str_java_main_file(&self) -> PathBuf {
    self.str_java_trans_dir().join("Main.java")
  }

  pub fn str_jar_file(&self) -> PathBuf {
    self.build_dir().join("stratego.jar")
  }

  /// Compiled classes of the generated Stratego Java tree.
  pub fn str_classes_dir(&self) -> PathBuf {
    let mut dir = self.classes_dir();
    dir.extend(self.package.split('.'));
    dir
  }

  // Editor and semantics

  pub fn esv_main_file(&self) -> PathBuf {
    self.editor_dir().join("Main.esv")
  }

  pub fn esv_packed_file(&self) -> PathBuf {
    self.build_dir().join("editor.esv.af")
  }

  pub fn ds_main_file(&self) -> PathBuf {
    match &self.ds_main {
      Some(path) => self.root.join(path),
      None => self.trans_dir().join(format!("{}.ds", self.name)),
    }
  }

  pub fn ds_java_dir(&self) -> PathBuf {
    self.src_gen_dir().join("ds-java")
  }

  /// Where an external jar is copied before compiling.
  pub fn included_jar(&self, jar: &Path) -> Option<PathBuf> {
    jar.file_name().map(|name| self.include_dir().join(name))
  }

  /// Resolve a configured path against the project root.
  pub fn resolve(&self, path: &Path) -> PathBuf {
    self.root.join(path)
  }
}
