mod cmd;
mod output;

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use kiln_lib::config::{CONFIG_FILENAME, Mode};
use kiln_lib::engine::{BuildError, BuildRequest};

use crate::output::print_error;

/// kiln - self-hosting incremental build orchestrator
#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Actions to perform. With no mode action, builds without mode flags.
  #[arg(value_enum)]
  actions: Vec<Action>,

  /// Path to the project file
  #[arg(short, long, default_value = CONFIG_FILENAME)]
  file: PathBuf,

  /// Maximum number of compilers running at once
  #[arg(short, long, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
  jobs: Option<usize>,

  /// Enable verbose output
  #[arg(short, long)]
  verbose: bool,

  /// Print `status` as JSON
  #[arg(long)]
  json: bool,

  /// Run the executable after building, passing these arguments
  #[arg(last = true, num_args = 0..)]
  run_args: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Action {
  /// Build in debug mode
  Dev,
  /// Build in release mode
  Rel,
  /// Remove the output directory and rebuild everything, including kiln itself
  Clean,
  /// Rebuild kiln itself and stop
  BuildOnly,
  /// Show the persisted build record
  Status,
  /// Clear a lock left behind by a killed build
  Unlock,
}

fn init_tracing(verbose: bool) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn main() {
  // Forwarded untouched to a rebuilt copy of kiln.
  let forward_args: Vec<OsString> = std::env::args_os().skip(1).collect();

  let cli = Cli::parse();
  init_tracing(cli.verbose);

  let code = match dispatch(cli, forward_args) {
    Ok(code) => code,
    Err(e) => {
      print_error(&format!("{:#}", e));
      e.downcast_ref::<BuildError>().map(BuildError::exit_code).unwrap_or(1)
    }
  };

  std::process::exit(code);
}

fn dispatch(cli: Cli, forward_args: Vec<OsString>) -> anyhow::Result<i32> {
  if cli.actions.contains(&Action::Unlock) {
    return cmd::cmd_unlock(&cli.file);
  }
  if cli.actions.contains(&Action::Status) {
    return cmd::cmd_status(&cli.file, cli.json);
  }

  let mode = cli.actions.iter().fold(None, |mode, action| match action {
    Action::Dev => Some(Mode::Debug),
    Action::Rel => Some(Mode::Release),
    _ => mode,
  });

  let request = BuildRequest {
    mode: mode.unwrap_or_default(),
    clean: cli.actions.contains(&Action::Clean),
    build_only: cli.actions.contains(&Action::BuildOnly),
    jobs: cli.jobs,
    run: cli.run_args,
    forward_args,
  };
  debug!(?request, file = %cli.file.display(), "dispatching build");

  cmd::cmd_build(&cli.file, request)
}
