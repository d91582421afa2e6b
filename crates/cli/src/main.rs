mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use scriptres_lib::config::{LogLevel, ProviderSettings, ResourceKind};
use scriptres_lib::lifecycle::Operation;

use cmd::{cmd_operation, cmd_show_config};
use output::print_error;

/// scriptres - manage a resource entirely through shell commands
#[derive(Parser)]
#[command(name = "scriptres")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Provider settings file (JSON)
  #[arg(short, long, global = true, default_value = "scriptres.json")]
  config: PathBuf,

  /// Resource state file
  #[arg(short, long, global = true, default_value = "scriptres.state.json")]
  state: PathBuf,

  /// Resource kind: crd, crde, crud or crude (default: inferred from the configured commands)
  #[arg(short, long, global = true)]
  kind: Option<ResourceKind>,

  /// Output as JSON
  #[arg(long, global = true)]
  json: bool,

  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run the create command, then read the resource back
  Create,
  /// Run the read command and record the result
  Read,
  /// Update the resource according to the configured update order
  Update,
  /// Run the delete command
  Delete,
  /// Check whether the resource exists
  Exists,
  /// Show the resolved configuration
  ShowConfig,
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  match run(cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      print_error(&format!("{:#}", e));
      ExitCode::FAILURE
    }
  }
}

fn run(cli: Cli) -> Result<()> {
  let settings = ProviderSettings::from_file(&cli.config)
    .with_context(|| format!("Failed to load provider settings from {}", cli.config.display()))?;

  init_logging(settings.log_level, cli.verbose);

  let operation = match cli.command {
    Commands::Create => Operation::Create,
    Commands::Read => Operation::Read,
    Commands::Update => Operation::Update,
    Commands::Delete => Operation::Delete,
    Commands::Exists => Operation::Exists,
    Commands::ShowConfig => return cmd_show_config(settings, cli.kind, cli.json),
  };

  cmd_operation(operation, settings, &cli.state, cli.kind, cli.json)
}

/// Log to stderr at the configured level. `RUST_LOG` takes precedence.
fn init_logging(level: LogLevel, verbose: bool) {
  let default = if verbose { LogLevel::Debug } else { level };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default.as_directive()));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}
