//! Types for the compilation pass.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;

use crate::unit::SourceUnit;

/// Errors that can occur while running compiler, linker, and hook processes.
#[derive(Debug, Error)]
pub enum ExecuteError {
  /// The program could not be started at all.
  #[error("failed to run {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },

  /// At least one unit failed to compile. Reports the first failing unit in
  /// source order.
  #[error("failed to compile {} (exit code {}){}", .unit.display(), display_code(.code), others(.failed))]
  CompileFailed {
    unit: PathBuf,
    code: Option<i32>,
    failed: usize,
  },

  #[error("failed to link {} (exit code {})", .output.display(), display_code(.code))]
  LinkFailed { output: PathBuf, code: Option<i32> },

  #[error("failed to create directory {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// A compile task panicked or was cancelled.
  #[error("compile task failed: {0}")]
  Join(String),
}

fn display_code(code: &Option<i32>) -> String {
  code.map(|c| c.to_string()).unwrap_or_else(|| "none, killed by signal".to_string())
}

fn others(failed: &usize) -> String {
  match *failed {
    0 | 1 => String::new(),
    n => format!(" and {} other unit(s)", n - 1),
  }
}

/// A program and its arguments, run without a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
  pub program: String,
  pub args: Vec<String>,
}

impl CommandLine {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }
}

impl fmt::Display for CommandLine {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.program)?;
    for arg in &self.args {
      if arg.is_empty() || arg.contains(char::is_whitespace) {
        write!(f, " '{}'", arg)?;
      } else {
        write!(f, " {}", arg)?;
      }
    }
    Ok(())
  }
}

/// One stale unit and the command that recompiles it.
#[derive(Debug, Clone)]
pub struct CompileJob {
  /// Position in the configured source list.
  pub index: usize,
  pub unit: SourceUnit,
  pub command: CommandLine,
}

/// Outcome of a successful compilation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
  /// Units recompiled. Zero means there is nothing to link.
  pub compiled: usize,
  pub up_to_date: usize,
  /// Most compile jobs observed running at once.
  pub peak_jobs: usize,
}

/// Counts running compile jobs and remembers the high-water mark.
#[derive(Debug, Default)]
pub struct JobGauge {
  active: AtomicUsize,
  peak: AtomicUsize,
}

impl JobGauge {
  pub fn enter(self: &Arc<Self>) -> ActiveJob {
    let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
    self.peak.fetch_max(now, Ordering::SeqCst);
    ActiveJob(Arc::clone(self))
  }

  pub fn active(&self) -> usize {
    self.active.load(Ordering::SeqCst)
  }

  pub fn peak(&self) -> usize {
    self.peak.load(Ordering::SeqCst)
  }
}

/// Decrements the gauge when the job finishes.
#[derive(Debug)]
pub struct ActiveJob(Arc<JobGauge>);

impl Drop for ActiveJob {
  fn drop(&mut self) {
    self.0.active.fetch_sub(1, Ordering::SeqCst);
  }
}
