//! Regular tree grammar and Stratego signature generation.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::path_arg;
use super::sdf::{PackSdf, PackSdfInput};
use crate::builder::{BuildContext, Builder, RequestKey};
use crate::manager::BuilderError;

/// Extracts a regular tree grammar from the packed definition.
pub struct Sdf2Rtg;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sdf2RtgInput {
  pub pack: PackSdfInput,
  pub output: PathBuf,
}

impl Builder for Sdf2Rtg {
  const ID: &'static str = "sdf2rtg";
  type Input = Sdf2RtgInput;
  type Output = PathBuf;

  fn description(&self, input: &Sdf2RtgInput) -> String {
    format!("Extract constructor signatures from grammar {}", input.pack.module)
  }

  fn build(&self, input: &Sdf2RtgInput, ctx: &mut BuildContext<'_, '_>) -> Result<PathBuf, BuilderError> {
    let def = ctx.require_build::<PackSdf>(&input.pack)?;
    ctx.require(&def)?;

    let args = vec![
      "-i".to_string(),
      path_arg(&def),
      "-m".to_string(),
      input.pack.module.clone(),
      "-o".to_string(),
      path_arg(&input.output),
      "--ignore-missing-cons".to_string(),
    ];
    ctx.invoke(Self::ID, &args)?;
    ctx.expect_output(Self::ID, &input.output)?;
    Ok(input.output.clone())
  }
}

/// Turns the tree grammar into Stratego signatures.
pub struct Rtg2Sig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rtg2SigInput {
  pub rtg: Sdf2RtgInput,
  pub output: PathBuf,
}

impl Builder for Rtg2Sig {
  const ID: &'static str = "rtg2sig";
  type Input = Rtg2SigInput;
  type Output = PathBuf;

  fn description(&self, _input: &Rtg2SigInput) -> String {
    "Generate Stratego signatures for grammar constructors".to_string()
  }

  /// One unit per module, whatever the arguments.
  fn persistent_location(&self, _key: &RequestKey, input: &Rtg2SigInput) -> PathBuf {
    PathBuf::from(Self::ID).join(format!("{}.json", input.rtg.pack.module))
  }

  fn build(&self, input: &Rtg2SigInput, ctx: &mut BuildContext<'_, '_>) -> Result<PathBuf, BuilderError> {
    let rtg = ctx.require_build::<Sdf2Rtg>(&input.rtg)?;
    ctx.require(&rtg)?;

    let args = vec![
      "-i".to_string(),
      path_arg(&rtg),
      "--module".to_string(),
      input.rtg.pack.module.clone(),
      "-o".to_string(),
      path_arg(&input.output),
    ];
    ctx.invoke(Self::ID, &args)?;
    ctx.expect_output(Self::ID, &input.output)?;
    Ok(input.output.clone())
  }
}
