mod cmd;
mod output;

use std::process::exit;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use kiln_lib::{BuildOptions, Config, Profile, Session, SystemExecutor};

use crate::output::print_error;

/// kiln - build orchestrator for native CMake projects
#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Fetch submodules and provision the toolchain
  Init,

  /// Configure the project from scratch
  Configure {
    /// Configure a Debug build instead of Release
    #[arg(long)]
    debug: bool,
  },

  /// Build the project, configuring first when needed
  Build {
    /// Build with debug information
    #[arg(long)]
    debug: bool,

    /// Launch the binary after a successful build
    #[arg(long)]
    run: bool,

    /// Remove the build directory first
    #[arg(long)]
    clean: bool,
  },

  /// Remove the build directory
  Clean,

  /// Launch the built binary
  Run {
    /// Arguments passed to the binary
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
  },

  /// Build the Docker image from its Dockerfile
  DockerBuild,

  /// Show the detected platform and build strategy
  Info {
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },
}

fn main() {
  let cli = match Cli::try_parse() {
    Ok(cli) => cli,
    Err(e) => {
      let code = match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => 0,
        _ => 1,
      };
      let _ = e.print();
      exit(code);
    }
  };

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let code = match dispatch(cli.command) {
    Ok(code) => code,
    Err(e) => {
      print_error(&format!("{e:#}"));
      e.downcast_ref::<kiln_lib::Error>().map_or(1, kiln_lib::Error::exit_code)
    }
  };
  debug!(code, "exiting");
  exit(code);
}

fn dispatch(command: Commands) -> Result<i32> {
  let root = std::env::current_dir().context("Failed to determine the current directory")?;
  let config = Config::load(&root).map_err(kiln_lib::Error::from)?;
  let executor = SystemExecutor::echoing();
  let session = Session::new(config, &executor)?;

  match command {
    Commands::Init => cmd::cmd_init(&session),
    Commands::Configure { debug } => cmd::cmd_configure(&session, Profile::from_debug(debug)),
    Commands::Build { debug, run, clean } => cmd::cmd_build(
      &session,
      BuildOptions {
        profile: Profile::from_debug(debug),
        run_after_build: run,
        clean_first: clean,
      },
    ),
    Commands::Clean => cmd::cmd_clean(&session),
    Commands::Run { args } => cmd::cmd_run(&session, &args),
    Commands::DockerBuild => cmd::cmd_docker_build(&session),
    Commands::Info { json } => cmd::cmd_info(&session, json),
  }
}
