//! Grammar packing and parse table generation.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::path_arg;
use crate::builder::{BuildContext, Builder};
use crate::manager::BuilderError;

/// Packs the main SDF module and everything it imports into one definition.
pub struct PackSdf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackSdfInput {
  pub module: String,
  pub args: Vec<String>,
  /// Prebuilt definition to use instead of packing.
  pub external_def: Option<PathBuf>,
  pub main_file: PathBuf,
  pub output: PathBuf,
  /// Directories searched for imported modules.
  pub syntax_dirs: Vec<PathBuf>,
}

impl Builder for PackSdf {
  const ID: &'static str = "pack-sdf";
  type Input = PackSdfInput;
  type Output = PathBuf;

  fn description(&self, input: &PackSdfInput) -> String {
    match &input.external_def {
      Some(_) => format!("Copy external grammar definition for {}", input.module),
      None => format!("Pack SDF modules of {}", input.module),
    }
  }

  fn build(&self, input: &PackSdfInput, ctx: &mut BuildContext<'_, '_>) -> Result<PathBuf, BuilderError> {
    if let Some(external) = &input.external_def {
      ctx.copy_file(external, &input.output)?;
      return Ok(input.output.clone());
    }

    ctx.require(&input.main_file)?;
    for dir in &input.syntax_dirs {
      ctx.require_files(dir, "sdf")?;
    }

    let mut args = vec![
      "-i".to_string(),
      path_arg(&input.main_file),
      "-o".to_string(),
      path_arg(&input.output),
    ];
    for dir in &input.syntax_dirs {
      args.push("-I".to_string());
      args.push(path_arg(dir));
    }
    args.extend(input.args.iter().cloned());

    ctx.invoke(Self::ID, &args)?;
    ctx.expect_output(Self::ID, &input.output)?;
    Ok(input.output.clone())
  }
}

/// Makes the packed definition error-recovering.
pub struct MakePermissive;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MakePermissiveInput {
  pub pack: PackSdfInput,
  pub output: PathBuf,
}

impl Builder for MakePermissive {
  const ID: &'static str = "make-permissive";
  type Input = MakePermissiveInput;
  type Output = PathBuf;

  fn description(&self, input: &MakePermissiveInput) -> String {
    format!("Make grammar of {} permissive for error recovery", input.pack.module)
  }

  fn build(&self, input: &MakePermissiveInput, ctx: &mut BuildContext<'_, '_>) -> Result<PathBuf, BuilderError> {
    let def = ctx.require_build::<PackSdf>(&input.pack)?;
    ctx.require(&def)?;

    let args = vec![
      "-i".to_string(),
      path_arg(&def),
      "-o".to_string(),
      path_arg(&input.output),
      "--optimize".to_string(),
      "on".to_string(),
    ];
    ctx.invoke(Self::ID, &args)?;
    ctx.expect_output(Self::ID, &input.output)?;
    Ok(input.output.clone())
  }
}

/// Generates the parse table.
pub struct Sdf2Table;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sdf2TableInput {
  pub module: String,
  pub permissive: MakePermissiveInput,
  pub output: PathBuf,
}

impl Builder for Sdf2Table {
  const ID: &'static str = "sdf2table";
  type Input = Sdf2TableInput;
  type Output = PathBuf;

  fn description(&self, input: &Sdf2TableInput) -> String {
    format!("Compile grammar {} to parse table", input.module)
  }

  fn build(&self, input: &Sdf2TableInput, ctx: &mut BuildContext<'_, '_>) -> Result<PathBuf, BuilderError> {
    let permissive = ctx.require_build::<MakePermissive>(&input.permissive)?;
    ctx.require(&permissive)?;

    let args = vec![
      "-t".to_string(),
      "-i".to_string(),
      path_arg(&permissive),
      "-m".to_string(),
      input.module.clone(),
      "-o".to_string(),
      path_arg(&input.output),
    ];
    ctx.invoke(Self::ID, &args)?;
    ctx.expect_output(Self::ID, &input.output)?;
    Ok(input.output.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::langspec::builders::testing::Project;
  use crate::manager::{BuildError, Failure};
  use std::fs;

  #[test]
  fn table_requires_pack_and_permissive() {
    let project = Project::new();
    let input = project.inputs().table();

    let table = project.manager().build::<Sdf2Table>(&input).unwrap();

    assert!(project.path(&table).exists());
    assert_eq!(project.tool.tools(), vec!["pack-sdf", "make-permissive", "sdf2table"]);
  }

  #[test]
  fn imported_module_change_repacks() {
    let project = Project::new();
    project.write("syntax/Common.sdf", "module Common");
    let input = project.inputs().pack();
    project.manager().build::<PackSdf>(&input).unwrap();

    project.write("syntax/Common.sdf", "module Common exports");
    project.manager().build::<PackSdf>(&input).unwrap();

    assert_eq!(project.tool.count("pack-sdf"), 2);
  }

  #[test]
  fn external_definition_is_copied_without_packing() {
    let project = Project::new();
    project.write("lib/Prebuilt.def", "definition");
    let mut input = project.inputs().pack();
    input.external_def = Some(PathBuf::from("lib/Prebuilt.def"));

    let def = project.manager().build::<PackSdf>(&input).unwrap();

    assert_eq!(fs::read_to_string(project.path(&def)).unwrap(), "definition");
    assert_eq!(project.tool.count("pack-sdf"), 0);
  }

  #[test]
  fn missing_main_module_fails() {
    let project = Project::new();
    fs::remove_file(project.path("syntax/Entity.sdf")).unwrap();

    let err = project.manager().build::<PackSdf>(&project.inputs().pack()).unwrap_err();
    assert!(matches!(
      err,
      BuildError::BuildFailed {
        failure: Failure::MissingInput { .. },
        ..
      }
    ));
    assert_eq!(project.tool.count("pack-sdf"), 0);
  }

  #[test]
  fn silent_tool_is_missing_output() {
    let project = Project::new();
    project.tool.no_output("pack-sdf");

    let err = project.manager().build::<PackSdf>(&project.inputs().pack()).unwrap_err();
    assert!(matches!(
      err,
      BuildError::BuildFailed {
        failure: Failure::MissingOutput { .. },
        ..
      }
    ));
  }
}
