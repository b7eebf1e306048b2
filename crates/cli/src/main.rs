mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::BuildArgs;
use output::OutputFormat;

/// cforge - Build C and C++ projects from a JSON manifest
#[derive(Parser)]
#[command(name = "cforge")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build every target in the manifest
  Build {
    /// Project root (default: current directory)
    #[arg(short = 'C', long)]
    root: Option<PathBuf>,

    /// Manifest file (default: <root>/cforge.json)
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Maximum number of concurrent tasks (default: CFORGE_JOBS or 32)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Run every task inline, one at a time
    #[arg(long)]
    inline: bool,

    /// Stop dependents of a failed task and exit with an error
    #[arg(long)]
    strict: bool,

    /// Skip the manifest's run commands
    #[arg(long)]
    no_run: bool,
  },

  /// Show platform and toolchain information
  Info {
    /// Project root (default: current directory)
    #[arg(short = 'C', long)]
    root: Option<PathBuf>,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Build {
      root,
      manifest,
      jobs,
      inline,
      strict,
      no_run,
    } => cmd::cmd_build(BuildArgs {
      root,
      manifest,
      jobs,
      inline,
      strict,
      no_run,
    }),
    Commands::Info { root, output } => cmd::cmd_info(root, output),
  }
}
