//! Process execution.
//!
//! Compiler, linker, and target processes are spawned directly with their
//! output streamed to the console. Hooks are shell snippets and go through the
//! platform shell.

use std::path::Path;
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;
use tracing::{debug, info};

use super::types::{CommandLine, ExecuteError};

/// Run `command` in `cwd`, streaming its output, and wait for it to exit.
pub async fn run_command(command: &CommandLine, cwd: &Path) -> Result<ExitStatus, ExecuteError> {
  info!(cmd = %command, "executing command");

  let status = Command::new(&command.program)
    .args(&command.args)
    .current_dir(cwd)
    .stdin(Stdio::null())
    .stdout(Stdio::inherit())
    .stderr(Stdio::inherit())
    .status()
    .await
    .map_err(|e| ExecuteError::Spawn {
      program: command.program.clone(),
      source: e,
    })?;

  debug!(cmd = %command.program, code = ?status.code(), "command exited");
  Ok(status)
}

/// Run `command` with the terminal's stdin attached. Used for the target
/// executable, which may be interactive.
pub async fn run_interactive(command: &CommandLine, cwd: &Path) -> Result<ExitStatus, ExecuteError> {
  info!(cmd = %command, "running executable");

  Command::new(&command.program)
    .args(&command.args)
    .current_dir(cwd)
    .status()
    .await
    .map_err(|e| ExecuteError::Spawn {
      program: command.program.clone(),
      source: e,
    })
}

/// Run a shell snippet through the platform shell.
pub async fn run_shell(script: &str, cwd: &Path) -> Result<ExitStatus, ExecuteError> {
  let (shell, shell_args) = get_shell();
  let command = CommandLine::new(shell).args(shell_args).arg(script);
  run_command(&command, cwd).await
}

/// Get the shell command and arguments for the current platform.
///
/// Always `/bin/sh` on Unix rather than `$SHELL`: interactive shells may source
/// profile files that change the environment hooks run in.
fn get_shell() -> (&'static str, Vec<&'static str>) {
  #[cfg(unix)]
  {
    ("/bin/sh", vec!["-c"])
  }

  #[cfg(windows)]
  {
    ("cmd.exe", vec!["/C"])
  }
}

/// Exit code to report for a finished process. Signals map to `None`.
pub fn exit_code(status: &ExitStatus) -> Option<i32> {
  status.code()
}
