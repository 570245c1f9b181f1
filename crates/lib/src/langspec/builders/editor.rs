//! Editor services and the DynSem interpreter.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::generate::{GenerateSources, GenerateSourcesInput};
use super::path_arg;
use crate::builder::{BuildContext, Builder};
use crate::manager::BuilderError;

/// Compiles the editor service definitions into one packed file.
pub struct EsvCompile;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EsvInput {
  pub main_file: PathBuf,
  pub editor_dir: PathBuf,
  pub output: PathBuf,
}

impl Builder for EsvCompile {
  const ID: &'static str = "esv";
  type Input = EsvInput;
  type Output = PathBuf;

  fn description(&self, _input: &EsvInput) -> String {
    "Compile editor services".to_string()
  }

  fn build(&self, input: &EsvInput, ctx: &mut BuildContext<'_, '_>) -> Result<PathBuf, BuilderError> {
    ctx.require(&input.main_file)?;
    ctx.require_files(&input.editor_dir, "esv")?;

    let args = vec![
      "-i".to_string(),
      path_arg(&input.main_file),
      "-I".to_string(),
      path_arg(&input.editor_dir),
      "-o".to_string(),
      path_arg(&input.output),
    ];
    ctx.invoke(Self::ID, &args)?;
    ctx.expect_output(Self::ID, &input.output)?;
    Ok(input.output.clone())
  }
}

/// Generates the Java interpreter for the DynSem specification.
pub struct DsCompile;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DsInput {
  pub name: String,
  pub main_file: PathBuf,
  pub trans_dir: PathBuf,
  pub output_dir: PathBuf,
  /// The interpreter reads the parse table and signatures.
  pub generate: GenerateSourcesInput,
}

impl DsInput {
  /// Entry point of the generated interpreter.
  pub fn entry_file(&self) -> PathBuf {
    self.output_dir.join(format!("{}Interpreter.java", self.name))
  }
}

impl Builder for DsCompile {
  const ID: &'static str = "dynsem";
  type Input = DsInput;
  type Output = PathBuf;

  fn description(&self, input: &DsInput) -> String {
    format!("Generate DynSem interpreter for {}", input.name)
  }

  fn build(&self, input: &DsInput, ctx: &mut BuildContext<'_, '_>) -> Result<PathBuf, BuilderError> {
    let generated = ctx.require_build::<GenerateSources>(&input.generate)?;
    ctx.require(&generated.table)?;
    ctx.require(&input.main_file)?;
    ctx.require_files(&input.trans_dir, "ds")?;

    let entry = input.entry_file();
    let args = vec![
      "-i".to_string(),
      path_arg(&input.main_file),
      "--table".to_string(),
      path_arg(&generated.table),
      "--target".to_string(),
      path_arg(&input.output_dir),
      "-o".to_string(),
      path_arg(&entry),
    ];
    ctx.create_dir(&input.output_dir)?;
    ctx.invoke(Self::ID, &args)?;
    ctx.expect_output(Self::ID, &entry)?;
    Ok(entry)
  }
}
