//! The aggregate that produces every generated source of a language.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::pp::{PpGen, PpGenInput, PpPack, PpPackInput};
use super::sdf::{Sdf2Table, Sdf2TableInput};
use super::stratego::{Strj, StrjInput};
use crate::builder::{BuildContext, Builder};
use crate::manager::BuilderError;

pub struct GenerateSources;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateSourcesInput {
  pub name: String,
  pub table: Sdf2TableInput,
  /// Built only when its main module exists.
  pub meta_table: Option<Sdf2TableInput>,
  pub ppgen: PpGenInput,
  pub pp_pack: PpPackInput,
  /// Absent when Stratego compilation is disabled.
  pub strj: Option<StrjInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedSources {
  pub table: PathBuf,
  pub meta_table: Option<PathBuf>,
  pub generated_pp: PathBuf,
  pub pp_table: PathBuf,
  pub stratego: Option<PathBuf>,
}

impl Builder for GenerateSources {
  const ID: &'static str = "generate-sources";
  type Input = GenerateSourcesInput;
  type Output = GeneratedSources;

  fn description(&self, input: &GenerateSourcesInput) -> String {
    format!("Generate sources for {}", input.name)
  }

  fn build(&self, input: &GenerateSourcesInput, ctx: &mut BuildContext<'_, '_>) -> Result<GeneratedSources, BuilderError> {
    let table = ctx.require_build::<Sdf2Table>(&input.table)?;

    let meta_table = match &input.meta_table {
      Some(meta) if ctx.require_optional(&meta.permissive.pack.main_file)? => Some(ctx.require_build::<Sdf2Table>(meta)?),
      Some(meta) => {
        debug!(module = %meta.module, "meta-syntax module absent, skipping its table");
        None
      }
      None => None,
    };

    let generated_pp = ctx.require_build::<PpGen>(&input.ppgen)?;
    let pp_table = ctx.require_build::<PpPack>(&input.pp_pack)?;

    let stratego = match &input.strj {
      Some(strj) => Some(ctx.require_build::<Strj>(strj)?),
      None => None,
    };

    Ok(GeneratedSources {
      table,
      meta_table,
      generated_pp,
      pp_table,
      stratego,
    })
  }
}
