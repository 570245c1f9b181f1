mod build;
mod clean;
mod init;
mod status;

pub use build::cmd_phases;
pub use clean::cmd_clean;
pub use init::cmd_init;
pub use status::cmd_status;

use std::path::Path;

use anyhow::{Context, Result};

use metabuild_lib::langspec::LanguageSpec;
use metabuild_lib::tool::ProcessTool;

/// Load the project at `project` with its configuration.
fn load_spec(project: &Path) -> Result<LanguageSpec> {
  LanguageSpec::load(project).with_context(|| format!("Failed to load project at {}", project.display()))
}

/// The tool runner the project's configuration describes.
fn process_tool(spec: &LanguageSpec) -> ProcessTool {
  ProcessTool::new(spec.config().tools.clone()).with_timeout(spec.config().tool_timeout())
}
