//! Pretty-printer tables and the parenthesizer.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::path_arg;
use super::sdf::{PackSdf, PackSdfInput};
use crate::builder::{BuildContext, Builder};
use crate::manager::BuilderError;

/// Table written when the project has no hand-written pretty-printer.
pub const EMPTY_PP_TABLE: &str = "PP-Table([])";

/// Derives a pretty-printer from the grammar.
pub struct PpGen;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PpGenInput {
  pub pack: PackSdfInput,
  pub pp_output: PathBuf,
  pub af_output: PathBuf,
}

impl Builder for PpGen {
  const ID: &'static str = "ppgen";
  type Input = PpGenInput;
  type Output = PathBuf;

  fn description(&self, input: &PpGenInput) -> String {
    format!("Generate pretty-print table for {}", input.pack.module)
  }

  fn build(&self, input: &PpGenInput, ctx: &mut BuildContext<'_, '_>) -> Result<PathBuf, BuilderError> {
    let def = ctx.require_build::<PackSdf>(&input.pack)?;
    ctx.require(&def)?;

    let args = vec![
      "-i".to_string(),
      path_arg(&def),
      "-t".to_string(),
      "-b".to_string(),
      "-o".to_string(),
      path_arg(&input.af_output),
    ];
    ctx.invoke(Self::ID, &args)?;
    ctx.expect_output(Self::ID, &input.af_output)?;

    let args = vec![
      "-i".to_string(),
      path_arg(&input.af_output),
      "-o".to_string(),
      path_arg(&input.pp_output),
    ];
    ctx.invoke("pp-pp", &args)?;
    ctx.expect_output("pp-pp", &input.pp_output)?;
    Ok(input.af_output.clone())
  }
}

/// Compiles the hand-written pretty-printer, or writes an empty table when the
/// project has none.
pub struct PpPack;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PpPackInput {
  pub module: String,
  pub input: PathBuf,
  pub output: PathBuf,
}

impl Builder for PpPack {
  const ID: &'static str = "pp-pack";
  type Input = PpPackInput;
  type Output = PathBuf;

  fn description(&self, input: &PpPackInput) -> String {
    format!("Compress pretty-print table of {}", input.module)
  }

  fn build(&self, input: &PpPackInput, ctx: &mut BuildContext<'_, '_>) -> Result<PathBuf, BuilderError> {
    if !ctx.require_optional(&input.input)? {
      ctx.write_file(&input.output, EMPTY_PP_TABLE)?;
      return Ok(input.output.clone());
    }

    let args = vec![
      "-i".to_string(),
      path_arg(&input.input),
      "-o".to_string(),
      path_arg(&input.output),
    ];
    ctx.invoke("parse-pp-table", &args)?;
    ctx.expect_output("parse-pp-table", &input.output)?;
    Ok(input.output.clone())
  }
}

/// Generates the Stratego parenthesizer from the grammar's priorities.
pub struct Sdf2Parenthesize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sdf2ParenthesizeInput {
  pub pack: PackSdfInput,
  pub output: PathBuf,
  /// Stratego module name of the generated file.
  pub output_module: String,
}

impl Builder for Sdf2Parenthesize {
  const ID: &'static str = "sdf2parenthesize";
  type Input = Sdf2ParenthesizeInput;
  type Output = PathBuf;

  fn description(&self, input: &Sdf2ParenthesizeInput) -> String {
    format!("Generate parenthesizer for {}", input.pack.module)
  }

  fn build(&self, input: &Sdf2ParenthesizeInput, ctx: &mut BuildContext<'_, '_>) -> Result<PathBuf, BuilderError> {
    let def = ctx.require_build::<PackSdf>(&input.pack)?;
    ctx.require(&def)?;

    let module = &input.pack.module;
    let args = vec![
      "-i".to_string(),
      path_arg(&def),
      "-m".to_string(),
      module.clone(),
      "--lang".to_string(),
      module.clone(),
      "--omod".to_string(),
      input.output_module.clone(),
      "-o".to_string(),
      path_arg(&input.output),
      "--main-strategy".to_string(),
      format!("io-{}-parenthesize", module),
      "--rule-prefix".to_string(),
      module.clone(),
      "--sig-module".to_string(),
      format!("include/{}", module),
    ];
    ctx.invoke(Self::ID, &args)?;
    ctx.expect_output(Self::ID, &input.output)?;
    Ok(input.output.clone())
  }
}
