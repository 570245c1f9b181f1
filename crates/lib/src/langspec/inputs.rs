//! Mapping from project configuration to builder inputs.

use super::builders::editor::{DsInput, EsvInput};
use super::builders::generate::GenerateSourcesInput;
use super::builders::package::PackageInput;
use super::builders::pp::{PpGenInput, PpPackInput, Sdf2ParenthesizeInput};
use super::builders::sdf::{MakePermissiveInput, PackSdfInput, Sdf2TableInput};
use super::builders::sig::{Rtg2SigInput, Sdf2RtgInput};
use super::builders::stratego::{CopyJarInput, StrjInput};
use super::config::{LanguageSpecConfig, StrategoFormat};
use super::paths::LanguageSpecPaths;

/// Builds the input of every builder from one configuration.
///
/// Paths are relative to the project root so that persisted units stay valid
/// when the project moves.
#[derive(Debug, Clone)]
pub struct BuildInputs {
  config: LanguageSpecConfig,
  paths: LanguageSpecPaths,
}

impl BuildInputs {
  pub fn new(config: &LanguageSpecConfig) -> Self {
    Self {
      config: config.clone(),
      paths: LanguageSpecPaths::new("", config),
    }
  }

  pub fn paths(&self) -> &LanguageSpecPaths {
    &self.paths
  }

  fn module(&self) -> String {
    self.config.sdf_module().to_string()
  }

  pub fn pack(&self) -> PackSdfInput {
    let mut input = self.pack_for(&self.module());
    input.args = self.config.sdf.args.clone();
    input.external_def = self.config.sdf.external_def.clone();
    input
  }

  /// Pack input for `module` with no extra arguments.
  pub fn pack_for(&self, module: &str) -> PackSdfInput {
    PackSdfInput {
      module: module.to_string(),
      args: Vec::new(),
      external_def: None,
      main_file: self.paths.sdf_main_file(module),
      output: self.paths.def_file(module),
      syntax_dirs: vec![self.paths.syntax_dir(), self.paths.src_gen_syntax_dir()],
    }
  }

  pub fn permissive(&self) -> MakePermissiveInput {
    self.permissive_for(self.pack())
  }

  fn permissive_for(&self, pack: PackSdfInput) -> MakePermissiveInput {
    MakePermissiveInput {
      output: self.paths.permissive_def_file(&pack.module),
      pack,
    }
  }

  pub fn table(&self) -> Sdf2TableInput {
    self.table_for(self.pack())
  }

  fn table_for(&self, pack: PackSdfInput) -> Sdf2TableInput {
    let module = pack.module.clone();
    Sdf2TableInput {
      output: self.paths.table_file(&module),
      permissive: self.permissive_for(pack),
      module,
    }
  }

  /// Table of the meta-syntax module, if one is configured.
  pub fn meta_table(&self) -> Option<Sdf2TableInput> {
    let module = self.config.sdf.meta_module.as_deref()?;
    Some(self.table_for(self.pack_for(module)))
  }

  pub fn ppgen(&self) -> PpGenInput {
    let module = self.module();
    PpGenInput {
      pack: self.pack(),
      pp_output: self.paths.generated_pp_file(&module),
      af_output: self.paths.generated_pp_af_file(&module),
    }
  }

  pub fn pp_pack(&self) -> PpPackInput {
    let module = self.module();
    PpPackInput {
      input: self.paths.pp_file(&module),
      output: self.paths.pp_af_file(&module),
      module,
    }
  }

  pub fn parenthesize(&self) -> Sdf2ParenthesizeInput {
    let module = self.module();
    Sdf2ParenthesizeInput {
      pack: self.pack(),
      output: self.paths.parenthesizer_file(&module),
      output_module: format!("include/{}-parenthesize", module),
    }
  }

  pub fn rtg(&self) -> Sdf2RtgInput {
    Sdf2RtgInput {
      pack: self.pack(),
      output: self.paths.rtg_file(&self.module()),
    }
  }

  pub fn sig(&self) -> Rtg2SigInput {
    Rtg2SigInput {
      rtg: self.rtg(),
      output: self.paths.signature_file(&self.module()),
    }
  }

  pub fn copy_jar(&self) -> Option<CopyJarInput> {
    let jar = self.config.stratego.external_jar.as_ref()?;
    Some(CopyJarInput {
      jar: jar.clone(),
      output: self.paths.included_jar(jar)?,
    })
  }

  /// `None` when Stratego compilation is disabled.
  pub fn strj(&self) -> Option<StrjInput> {
    let stratego = &self.config.stratego;
    if !stratego.enabled {
      return None;
    }
    let output = match stratego.format {
      StrategoFormat::Ctree => self.paths.str_ctree_file(),
      StrategoFormat::Jar => self.paths.str_java_main_file(),
    };
    Some(StrjInput {
      name: self.config.name.clone(),
      main_file: self.paths.str_main_file(),
      source_dirs: vec![self.paths.trans_dir()],
      include_dirs: vec![self.paths.include_dir(), self.paths.lib_dir()],
      format: stratego.format,
      output,
      package: self.config.strategies_package(),
      cache_dir: self.paths.cache_dir(),
      signatures: self.sig(),
      parenthesizer: self.parenthesize(),
      external_jar: self.copy_jar(),
      external_jar_flags: stratego.external_jar_flags.clone(),
      args: stratego.args.clone(),
    })
  }

  pub fn generate(&self) -> GenerateSourcesInput {
    GenerateSourcesInput {
      name: self.config.name.clone(),
      table: self.table(),
      meta_table: self.meta_table(),
      ppgen: self.ppgen(),
      pp_pack: self.pp_pack(),
      strj: self.strj(),
    }
  }

  pub fn esv(&self) -> EsvInput {
    EsvInput {
      main_file: self.paths.esv_main_file(),
      editor_dir: self.paths.editor_dir(),
      output: self.paths.esv_packed_file(),
    }
  }

  pub fn dynsem(&self) -> DsInput {
    DsInput {
      name: self.config.name.clone(),
      main_file: self.paths.ds_main_file(),
      trans_dir: self.paths.trans_dir(),
      output_dir: self.paths.ds_java_dir(),
      generate: self.generate(),
    }
  }

  pub fn package(&self) -> PackageInput {
    PackageInput {
      name: self.config.name.clone(),
      format: self.config.stratego.format,
      generate: self.generate(),
      resources_dir: self.paths.classes_dir(),
      classes_dir: self.paths.str_classes_dir(),
      jar_output: self.paths.str_jar_file(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::PathBuf;

  #[test]
  fn inputs_use_relative_paths() {
    let inputs = BuildInputs::new(&LanguageSpecConfig::new("Entity"));
    let table = inputs.table();

    assert_eq!(table.output, PathBuf::from("include/Entity.tbl"));
    assert_eq!(table.permissive.output, PathBuf::from("include/Entity-permissive.def"));
    assert_eq!(table.permissive.pack.main_file, PathBuf::from("syntax/Entity.sdf"));
  }

  #[test]
  fn shared_pack_input_is_identical() {
    let inputs = BuildInputs::new(&LanguageSpecConfig::new("Entity"));
    assert_eq!(inputs.table().permissive.pack, inputs.ppgen().pack);
    assert_eq!(inputs.rtg().pack, inputs.parenthesize().pack);
  }

  #[test]
  fn meta_table_only_when_configured() {
    let mut config = LanguageSpecConfig::new("Entity");
    assert!(BuildInputs::new(&config).meta_table().is_none());

    config.sdf.meta_module = Some("Stratego-Entity".to_string());
    let meta = BuildInputs::new(&config).meta_table().unwrap();
    assert_eq!(meta.output, PathBuf::from("include/Stratego-Entity.tbl"));
    assert!(meta.permissive.pack.args.is_empty());
  }

  #[test]
  fn disabled_stratego_has_no_compile_input() {
    let mut config = LanguageSpecConfig::new("Entity");
    config.stratego.enabled = false;
    let inputs = BuildInputs::new(&config);
    assert!(inputs.strj().is_none());
    assert!(inputs.generate().strj.is_none());
  }
}
