//! Packaging of generated artifacts after the Java compile.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::generate::{GenerateSources, GenerateSourcesInput};
use super::path_arg;
use crate::builder::{BuildContext, Builder};
use crate::langspec::config::StrategoFormat;
use crate::manager::BuilderError;

pub struct Package;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInput {
  pub name: String,
  pub format: StrategoFormat,
  pub generate: GenerateSourcesInput,
  /// Where tables are copied for the runtime to find on the class path.
  pub resources_dir: PathBuf,
  /// Compiled strategy classes, packed into the jar.
  pub classes_dir: PathBuf,
  pub jar_output: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagedArtifacts {
  pub resources: Vec<PathBuf>,
  pub jar: Option<PathBuf>,
}

impl Builder for Package {
  const ID: &'static str = "package";
  type Input = PackageInput;
  type Output = PackagedArtifacts;

  fn description(&self, input: &PackageInput) -> String {
    format!("Package {}", input.name)
  }

  fn build(&self, input: &PackageInput, ctx: &mut BuildContext<'_, '_>) -> Result<PackagedArtifacts, BuilderError> {
    let generated = ctx.require_build::<GenerateSources>(&input.generate)?;

    let mut artifacts = PackagedArtifacts::default();
    for source in [&generated.table, &generated.pp_table, &generated.generated_pp] {
      let Some(file_name) = source.file_name() else {
        continue;
      };
      let target = input.resources_dir.join(file_name);
      ctx.copy_file(source, &target)?;
      artifacts.resources.push(target);
    }

    if input.format == StrategoFormat::Jar {
      ctx.create_dir(&input.classes_dir)?;
      ctx.require_files(&input.classes_dir, "class")?;
      let args = vec![
        "--create".to_string(),
        "--file".to_string(),
        path_arg(&input.jar_output),
        "-C".to_string(),
        path_arg(&input.classes_dir),
        ".".to_string(),
      ];
      ctx.invoke("jar", &args)?;
      ctx.expect_output("jar", &input.jar_output)?;
      artifacts.jar = Some(input.jar_output.clone());
    }

    Ok(artifacts)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::langspec::builders::testing::Project;

  #[test]
  fn ctree_package_copies_tables() {
    let project = Project::new();
    let artifacts = project.manager().build::<Package>(&project.inputs().package()).unwrap();

    assert_eq!(artifacts.jar, None);
    assert_eq!(artifacts.resources.len(), 3);
    for resource in &artifacts.resources {
      assert!(project.path(resource).exists(), "{}", resource.display());
    }
    assert_eq!(project.tool.count("jar"), 0);
  }

  #[test]
  fn jar_package_packs_classes() {
    let project = Project::with_config("name: Entity\nstratego:\n  format: jar\n");
    project.write("target/classes/entity/strategies/Main.class", "class");

    let artifacts = project.manager().build::<Package>(&project.inputs().package()).unwrap();

    assert_eq!(artifacts.jar, Some(PathBuf::from("target/metaborg/stratego.jar")));
    assert!(project.path("target/metaborg/stratego.jar").exists());
    assert_eq!(project.tool.count("jar"), 1);
  }

  #[test]
  fn recompiled_classes_repack() {
    let project = Project::with_config("name: Entity\nstratego:\n  format: jar\n");
    project.write("target/classes/entity/strategies/Main.class", "class");
    let input = project.inputs().package();
    project.manager().build::<Package>(&input).unwrap();

    project.write("target/classes/entity/strategies/Main.class", "class v2");
    project.manager().build::<Package>(&input).unwrap();

    assert_eq!(project.tool.count("jar"), 2);
  }

  #[test]
  fn new_class_file_repacks() {
    let project = Project::with_config("name: Entity\nstratego:\n  format: jar\n");
    project.write("target/classes/entity/strategies/Main.class", "class");
    let input = project.inputs().package();
    project.manager().build::<Package>(&input).unwrap();

    project.write("target/classes/entity/strategies/NewStrategy.class", "class");
    project.manager().build::<Package>(&input).unwrap();
    assert_eq!(project.tool.count("jar"), 2);

    let mut manager = project.manager();
    manager.build::<Package>(&input).unwrap();
    assert_eq!(manager.stats().executed_count(), 0);
    assert_eq!(project.tool.count("jar"), 2);
  }
}
