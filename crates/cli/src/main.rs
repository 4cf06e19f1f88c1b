mod cmd;
mod output;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use autobuild_lib::config::{CONFIG_FILENAME, Config};
use autobuild_lib::coord::Coordinate;

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "autobuild")]
#[command(author, version, about = "Incremental dependency-ordered package builds with a local repository proxy")]
struct Cli {
  /// Configuration file; a missing default file means built-in defaults
  #[arg(short, long, global = true, default_value = CONFIG_FILENAME)]
  config: PathBuf,

  /// Log at debug level unless RUST_LOG says otherwise
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build a package and everything it depends on
  Build {
    /// Root package as group:artifact:version
    coordinate: Coordinate,
  },
  /// Run the repository proxy in the foreground
  Serve,
  /// Print the dependency graph of a package
  Graph {
    /// Root package as group:artifact:version
    coordinate: Coordinate,

    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },
  /// List the package descriptors under the source root
  Index {
    #[arg(short, long, value_enum, default_value_t)]
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

  let config = load_config(&cli.config)?;

  match cli.command {
    Commands::Build { coordinate } => {
      if !cmd::cmd_build(&config, &coordinate)? {
        std::process::exit(1);
      }
    }
    Commands::Serve => cmd::cmd_serve(&config)?,
    Commands::Graph { coordinate, output } => cmd::cmd_graph(&config, &coordinate, output)?,
    Commands::Index { output } => cmd::cmd_index(&config, output)?,
  }

  Ok(())
}

fn load_config(path: &Path) -> Result<Config> {
  if path.exists() {
    return Config::load(path).with_context(|| format!("Failed to load {}", path.display()));
  }
  if path != Path::new(CONFIG_FILENAME) {
    anyhow::bail!("Configuration file {} does not exist", path.display());
  }

  let cwd = std::env::current_dir().context("Failed to determine current directory")?;
  tracing::debug!(dir = %cwd.display(), "no configuration file, using defaults");
  Config::from_toml("", &cwd).context("Failed to build default configuration")
}
