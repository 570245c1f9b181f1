//! Builders for the stages of a language specification build.
//!
//! Each builder wraps one external tool (or, for `generate-sources` and
//! `package`, a group of other builders). Inputs carry project-relative paths;
//! the build context resolves them against the project directory.

pub mod editor;
pub mod generate;
pub mod package;
pub mod pp;
pub mod sdf;
pub mod sig;
pub mod stratego;

use std::path::Path;

use crate::builder::BuilderRegistry;
use crate::manager::BuildError;

/// Render a path as a tool argument.
pub(crate) fn path_arg(path: &Path) -> String {
  path.to_string_lossy().into_owned()
}

/// Register every language specification builder.
pub fn register_all(registry: &mut BuilderRegistry) -> Result<(), BuildError> {
  registry
    .register(sdf::PackSdf)?
    .register(sdf::MakePermissive)?
    .register(sdf::Sdf2Table)?
    .register(pp::PpGen)?
    .register(pp::PpPack)?
    .register(pp::Sdf2Parenthesize)?
    .register(sig::Sdf2Rtg)?
    .register(sig::Rtg2Sig)?
    .register(stratego::CopyJar)?
    .register(stratego::Strj)?
    .register(generate::GenerateSources)?
    .register(editor::EsvCompile)?
    .register(editor::DsCompile)?
    .register(package::Package)?;
  Ok(())
}
