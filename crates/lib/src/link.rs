//! Link stage: one command over every unit's object file.

use std::path::PathBuf;

use tracing::info;

use crate::config::BuildConfig;
use crate::execute::{CommandLine, ExecuteError, exit_code, run_command};
use crate::unit::SourceUnit;

/// `compiler -o <executable> <objects...> <link_flags>`
pub fn link_command(config: &BuildConfig, units: &[SourceUnit]) -> CommandLine {
  CommandLine::new(&config.compiler)
    .arg("-o")
    .arg(config.executable_path().to_string_lossy())
    .args(units.iter().map(|unit| unit.object.to_string_lossy().into_owned()))
    .args(&config.link_flags)
}

/// Link every object into the configured executable. Objects of units that
/// were up to date are included as well as the ones just rebuilt.
pub async fn link(config: &BuildConfig, units: &[SourceUnit]) -> Result<PathBuf, ExecuteError> {
  let output = config.executable_path();
  let command = link_command(config, units);
  info!(output = %output.display(), objects = units.len(), "linking");

  let status = run_command(&command, &config.root).await?;
  if !status.success() {
    return Err(ExecuteError::LinkFailed {
      output,
      code: exit_code(&status),
    });
  }

  Ok(output)
}
