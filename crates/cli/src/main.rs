mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use metabuild_lib::phase::Phase;

use crate::output::{OutputFormat, print_error};

/// mb - incremental builds for language specification projects
#[derive(Parser)]
#[command(name = "mb")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Project directory containing metabuild.yaml
  #[arg(short, long, global = true, default_value = ".")]
  project: PathBuf,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
  output: OutputFormat,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Create the generated-file directories
  Init {
    /// Write a minimal metabuild.yaml for a language with this name first
    #[arg(long)]
    name: Option<String>,
  },

  /// Generate parse tables, pretty-printers, signatures and compiled strategies
  Generate,

  /// Compile editor services and the semantics interpreter
  PreLink,

  /// Package generated artifacts
  PostLink,

  /// Run every phase except clean, in order
  Build,

  /// Delete generated files and all build units
  Clean,

  /// Show persisted build units in dependency order
  Status,
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let project = cli.project.as_path();
  let result = match cli.command {
    Commands::Init { name } => cmd::cmd_init(project, name.as_deref(), cli.output),
    Commands::Generate => cmd::cmd_phases(project, &[Phase::GenerateSources], cli.output),
    Commands::PreLink => cmd::cmd_phases(project, &[Phase::PreLink], cli.output),
    Commands::PostLink => cmd::cmd_phases(project, &[Phase::PostLink], cli.output),
    Commands::Build => {
      let phases: Vec<Phase> = Phase::build_phases().collect();
      cmd::cmd_phases(project, &phases, cli.output)
    }
    Commands::Clean => cmd::cmd_clean(project, cli.output),
    Commands::Status => cmd::cmd_status(project, cli.verbose, cli.output),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      print_error(&format!("{:#}", e));
      ExitCode::FAILURE
    }
  }
}
