//! Self-bootstrap controller.
//!
//! Before any project work the tool checks whether its own descriptor changed,
//! whether the requested mode differs from the last one, or whether a clean or
//! build-only run was requested. If so it compiles a fresh copy of itself and
//! hands control to that copy with the original arguments.
//!
//! The `rebuilding` flag in the build record limits this to one hop: the
//! re-executed copy sees the flag, clears it, and proceeds without rebuilding.

use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::config::{BootstrapConfig, BuildConfig, Mode};
use crate::execute::{CommandLine, ExecuteError, exit_code, run_command};
use crate::state::BuildRecord;
use crate::timestamp::mod_time;

#[derive(Debug, Error)]
pub enum BootstrapError {
  /// The compiler rejected the descriptor. The previous binary is untouched.
  #[error("self-rebuild failed (exit code {})", display_code(.code))]
  Failed { code: Option<i32> },

  #[error(transparent)]
  Execute(#[from] ExecuteError),

  #[error("failed to install rebuilt tool at {path}: {source}")]
  Install {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

fn display_code(code: &Option<i32>) -> String {
  code.map(|c| c.to_string()).unwrap_or_else(|| "none, killed by signal".to_string())
}

/// Why a self-rebuild was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
  DescriptorChanged,
  ModeChanged { from: Mode, to: Mode },
  Clean,
  BuildOnly,
}

impl fmt::Display for Trigger {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Trigger::DescriptorChanged => f.write_str("descriptor changed"),
      Trigger::ModeChanged { from, to } => write!(f, "mode changed from {} to {}", from, to),
      Trigger::Clean => f.write_str("clean requested"),
      Trigger::BuildOnly => f.write_str("build-only requested"),
    }
  }
}

/// Result of the bootstrap checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
  /// No `[bootstrap]` table; the tool never rebuilds itself.
  NotConfigured,
  /// This process is the copy a previous invocation just rebuilt.
  Guarded,
  UpToDate,
  Rebuild(Trigger),
}

/// Evaluate the bootstrap checkpoint for a requested `mode`.
pub fn evaluate(config: &BuildConfig, record: &BuildRecord, mode: Mode, clean: bool, build_only: bool) -> Checkpoint {
  let Some(bootstrap) = &config.bootstrap else {
    return Checkpoint::NotConfigured;
  };

  if record.rebuilding {
    debug!("self-rebuild already in progress, skipping bootstrap check");
    return Checkpoint::Guarded;
  }

  let descriptor = config.resolve(&bootstrap.descriptor);
  let trigger = if mod_time(&descriptor).is_some_and(|t| t >= record.last_build_time) {
    Some(Trigger::DescriptorChanged)
  } else if record.last_mode != mode {
    Some(Trigger::ModeChanged {
      from: record.last_mode,
      to: mode,
    })
  } else if clean {
    Some(Trigger::Clean)
  } else if build_only {
    Some(Trigger::BuildOnly)
  } else {
    None
  };

  match trigger {
    Some(trigger) => Checkpoint::Rebuild(trigger),
    None => Checkpoint::UpToDate,
  }
}

/// `<output>.new`, where the compiler writes before the result replaces `output`.
pub fn staged_path(output: &Path) -> PathBuf {
  let mut name = output.file_name().unwrap_or_default().to_os_string();
  name.push(".new");
  output.with_file_name(name)
}

/// `compiler <descriptor> -o <output>.new <flags>`
pub fn rebuild_command(config: &BuildConfig, bootstrap: &BootstrapConfig, mode: Mode) -> CommandLine {
  let output = config.resolve(&bootstrap.output);
  CommandLine::new(&bootstrap.compiler)
    .arg(config.resolve(&bootstrap.descriptor).to_string_lossy())
    .arg("-o")
    .arg(staged_path(&output).to_string_lossy())
    .args(bootstrap.flags_for(mode))
}

/// Compile a new copy of the tool and move it over the configured output.
///
/// On failure the staged file is removed and the existing binary is left as it was.
pub async fn rebuild(config: &BuildConfig, bootstrap: &BootstrapConfig, mode: Mode) -> Result<PathBuf, BootstrapError> {
  let output = config.resolve(&bootstrap.output);
  let staged = staged_path(&output);

  if let Some(parent) = output.parent() {
    std::fs::create_dir_all(parent).map_err(|e| BootstrapError::Install {
      path: parent.to_path_buf(),
      source: e,
    })?;
  }

  info!(output = %output.display(), mode = %mode, "rebuilding self");
  let status = run_command(&rebuild_command(config, bootstrap, mode), &config.root).await?;

  if !status.success() {
    let _ = std::fs::remove_file(&staged);
    return Err(BootstrapError::Failed {
      code: exit_code(&status),
    });
  }

  std::fs::rename(&staged, &output).map_err(|e| BootstrapError::Install {
    path: output.clone(),
    source: e,
  })?;

  info!(output = %output.display(), "self-rebuild complete");
  Ok(output)
}

/// Control transfer to a freshly rebuilt copy of the tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandOff {
  /// Absolute path of the rebuilt binary.
  pub program: PathBuf,
  /// The original arguments, without the program name.
  pub args: Vec<OsString>,
}

impl HandOff {
  pub fn new(output: &Path, args: Vec<OsString>) -> Result<Self, BootstrapError> {
    let program = dunce::canonicalize(output).map_err(|e| BootstrapError::Install {
      path: output.to_path_buf(),
      source: e,
    })?;
    Ok(Self { program, args })
  }

  /// Replace the current process with the rebuilt tool. Only returns on failure.
  #[cfg(unix)]
  pub fn exec(self) -> io::Error {
    use std::os::unix::process::CommandExt;

    info!(program = %self.program.display(), "handing off to rebuilt tool");
    std::process::Command::new(&self.program).args(&self.args).exec()
  }

  /// Run the rebuilt tool to completion and exit with its status. Only
  /// returns if it could not be started.
  #[cfg(not(unix))]
  pub fn exec(self) -> io::Error {
    info!(program = %self.program.display(), "handing off to rebuilt tool");
    match std::process::Command::new(&self.program).args(&self.args).status() {
      Ok(status) => std::process::exit(status.code().unwrap_or(1)),
      Err(e) => e,
    }
  }
}
