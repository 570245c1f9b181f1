//! Stratego compilation.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::path_arg;
use super::pp::{Sdf2Parenthesize, Sdf2ParenthesizeInput};
use super::sig::{Rtg2Sig, Rtg2SigInput};
use crate::builder::{BuildContext, Builder};
use crate::langspec::config::StrategoFormat;
use crate::manager::BuilderError;

/// Copies an external strategy jar into the project.
pub struct CopyJar;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyJarInput {
  pub jar: PathBuf,
  pub output: PathBuf,
}

impl Builder for CopyJar {
  const ID: &'static str = "copy-jar";
  type Input = CopyJarInput;
  type Output = PathBuf;

  fn description(&self, input: &CopyJarInput) -> String {
    format!("Copy external jar {}", input.jar.display())
  }

  fn build(&self, input: &CopyJarInput, ctx: &mut BuildContext<'_, '_>) -> Result<PathBuf, BuilderError> {
    ctx.copy_file(&input.jar, &input.output)?;
    Ok(input.output.clone())
  }
}

/// Compiles the main Stratego module.
pub struct Strj;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrjInput {
  pub name: String,
  pub main_file: PathBuf,
  /// Directories holding hand-written modules, searched for imports.
  pub source_dirs: Vec<PathBuf>,
  /// Directories holding generated modules.
  pub include_dirs: Vec<PathBuf>,
  pub format: StrategoFormat,
  /// `stratego.ctree` for ctree, `Main.java` for jar.
  pub output: PathBuf,
  pub package: String,
  pub cache_dir: PathBuf,
  pub signatures: Rtg2SigInput,
  pub parenthesizer: Sdf2ParenthesizeInput,
  pub external_jar: Option<CopyJarInput>,
  pub external_jar_flags: Vec<String>,
  pub args: Vec<String>,
}

impl Builder for Strj {
  const ID: &'static str = "strj";
  type Input = StrjInput;
  type Output = PathBuf;

  fn description(&self, input: &StrjInput) -> String {
    match input.format {
      StrategoFormat::Ctree => format!("Compile Stratego code of {} to ctree", input.name),
      StrategoFormat::Jar => format!("Compile Stratego code of {} to Java", input.name),
    }
  }

  fn build(&self, input: &StrjInput, ctx: &mut BuildContext<'_, '_>) -> Result<PathBuf, BuilderError> {
    let signatures = ctx.require_build::<Rtg2Sig>(&input.signatures)?;
    ctx.require(&signatures)?;
    let parenthesizer = ctx.require_build::<Sdf2Parenthesize>(&input.parenthesizer)?;
    ctx.require(&parenthesizer)?;
    let external_jar = match &input.external_jar {
      Some(jar) => Some(ctx.require_build::<CopyJar>(jar)?),
      None => None,
    };

    ctx.require(&input.main_file)?;
    for dir in &input.source_dirs {
      ctx.require_files(dir, "str")?;
    }

    let mut args = vec![
      "-i".to_string(),
      path_arg(&input.main_file),
      "-o".to_string(),
      path_arg(&input.output),
    ];
    match input.format {
      StrategoFormat::Ctree => args.push("-F".to_string()),
      StrategoFormat::Jar => {
        args.push("-p".to_string());
        args.push(input.package.clone());
        args.push("--clean".to_string());
      }
    }
    for dir in input.source_dirs.iter().chain(&input.include_dirs) {
      args.push("-I".to_string());
      args.push(path_arg(dir));
    }
    args.push("--cache-dir".to_string());
    args.push(path_arg(&input.cache_dir));
    if let Some(jar) = &external_jar {
      ctx.require(jar)?;
      args.extend(input.external_jar_flags.iter().cloned());
    }
    args.extend(input.args.iter().cloned());

    ctx.create_dir(&input.cache_dir)?;
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

  fn strj(project: &Project) -> StrjInput {
    project.inputs().strj().unwrap()
  }

  #[test]
  fn ctree_compile_requires_generated_modules() {
    let project = Project::new();
    let output = project.manager().build::<Strj>(&strj(&project)).unwrap();

    assert_eq!(output, PathBuf::from("target/metaborg/stratego.ctree"));
    assert!(project.path(&output).exists());
    let tools = project.tool.tools();
    assert_eq!(tools.last().map(String::as_str), Some("strj"));
    assert!(tools.contains(&"rtg2sig".to_string()));
    assert!(tools.contains(&"sdf2parenthesize".to_string()));
    assert_eq!(project.tool.count("pack-sdf"), 1);

    let invocation = project.tool.invocations().pop().unwrap();
    assert!(invocation.args.contains(&"-F".to_string()));
  }

  #[test]
  fn jar_format_writes_java_main() {
    let project = Project::with_config("name: Entity\nstratego:\n  format: jar\n");
    let output = project.manager().build::<Strj>(&strj(&project)).unwrap();

    assert_eq!(
      output,
      PathBuf::from("src-gen/stratego-java/entity/strategies/Main.java")
    );
    let invocation = project.tool.invocations().pop().unwrap();
    let package = invocation.args.iter().position(|a| a == "-p").unwrap();
    assert_eq!(invocation.args[package + 1], "entity.strategies");
  }

  #[test]
  fn changed_transformation_recompiles() {
    let project = Project::new();
    let input = strj(&project);
    project.manager().build::<Strj>(&input).unwrap();
    project.tool.clear();

    project.write("trans/Entity.str", "module Entity imports names");
    project.manager().build::<Strj>(&input).unwrap();

    assert_eq!(project.tool.tools(), vec!["strj"]);
  }

  #[test]
  fn external_jar_is_copied_and_flagged() {
    let project = Project::with_config(
      "name: Entity\nstratego:\n  external_jar: vendor/runtime.jar\n  external_jar_flags: [\"-la\", \"org.example.runtime\"]\n",
    );
    project.write("vendor/runtime.jar", "jar");
    project.manager().build::<Strj>(&strj(&project)).unwrap();

    assert!(project.path("include/runtime.jar").exists());
    let invocation = project.tool.invocations().pop().unwrap();
    assert!(invocation.args.contains(&"org.example.runtime".to_string()));
  }

  #[test]
  fn missing_main_module_fails_before_compiling() {
    let project = Project::new();
    std::fs::remove_file(project.path("trans/Entity.str")).unwrap();

    let err = project.manager().build::<Strj>(&strj(&project)).unwrap_err();
    assert!(matches!(
      err,
      BuildError::BuildFailed {
        failure: Failure::MissingInput { .. },
        ..
      }
    ));
    assert_eq!(project.tool.count("strj"), 0);
  }
}
