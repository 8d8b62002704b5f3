mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{BuildArgs, cmd_build, cmd_validate};
use output::OutputFormat;

/// strata - build orchestration front door
#[derive(Parser)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build once, or keep rebuilding with --watch
  Build {
    /// Config file (default: strata.lua, strata.json, strata.yaml or strata.yml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Rebuild whenever a dependency changes
    #[arg(short, long)]
    watch: bool,

    /// Override the configured mode (development, production, none)
    #[arg(short, long)]
    mode: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
  },

  /// Check a config file and construct its compilers without building
  Validate {
    /// Config file (default: strata.lua, strata.json, strata.yaml or strata.yml)
    #[arg(short, long)]
    config: Option<PathBuf>,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "info" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Build {
      config,
      watch,
      mode,
      output,
    } => cmd_build(BuildArgs {
      config,
      watch,
      mode,
      format: output,
    }),
    Commands::Validate { config } => cmd_validate(config.as_deref()),
  }
}
