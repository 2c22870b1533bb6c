//! Compilation pass.
//!
//! Every stale unit becomes one compile job. Jobs run as independent tasks on
//! the runtime, admitted in source-list order and bounded by a semaphore whose
//! permits are taken by the controlling loop before each spawn. A failing job
//! never cancels its siblings: the pass drains completely and then reports the
//! first failure in source order.

pub mod cmd;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::config::{BuildConfig, Mode};
use crate::state::BuildRecord;
use crate::unit::{LEDGER_FLAG, SourceUnit, is_stale};

pub use cmd::{exit_code, run_command, run_interactive, run_shell};
pub use types::{CommandLine, CompileJob, ExecuteError, JobGauge, PassReport};

/// How each unit is compiled for this pass.
#[derive(Debug, Clone)]
pub struct CompileSettings {
  pub compiler: String,
  pub flags: Vec<String>,
  /// Working directory for every compiler process.
  pub cwd: PathBuf,
}

impl CompileSettings {
  pub fn from_config(config: &BuildConfig, mode: Mode) -> Self {
    Self {
      compiler: config.compiler.clone(),
      flags: config.cflags_for(mode),
      cwd: config.root.clone(),
    }
  }

  /// `compiler -MD -c <source> -o <object> <flags>`
  ///
  /// The ledger flag is always present, so every compile leaves the ledger the
  /// next run's staleness check reads.
  pub fn command_for(&self, unit: &SourceUnit) -> CommandLine {
    CommandLine::new(&self.compiler)
      .arg(LEDGER_FLAG)
      .arg("-c")
      .arg(unit.source.to_string_lossy())
      .arg("-o")
      .arg(unit.object.to_string_lossy())
      .args(&self.flags)
  }
}

/// Recompile every stale unit with at most `limit` compilers running at once.
///
/// Fresh units spawn nothing. Returns how many units were recompiled; zero
/// means the link stage can be skipped.
pub async fn run_all(
  units: &[SourceUnit],
  record: &BuildRecord,
  settings: &CompileSettings,
  limit: usize,
) -> Result<PassReport, ExecuteError> {
  let limit = limit.max(1);
  let semaphore = Arc::new(Semaphore::new(limit));
  let gauge = Arc::new(JobGauge::default());

  let mut join_set = JoinSet::new();
  let mut failures: Vec<(usize, ExecuteError)> = Vec::new();
  let mut up_to_date = 0;

  for (index, unit) in units.iter().enumerate() {
    if !is_stale(unit, record) {
      up_to_date += 1;
      continue;
    }

    if let Some(dir) = unit.object.parent()
      && let Err(e) = tokio::fs::create_dir_all(dir).await
    {
      error!(source = %unit.source.display(), error = %e, "failed to create object directory");
      failures.push((
        index,
        ExecuteError::CreateDir {
          path: dir.to_path_buf(),
          source: e,
        },
      ));
      continue;
    }

    let job = CompileJob {
      index,
      unit: unit.clone(),
      command: settings.command_for(unit),
    };

    // Blocks until a running job finishes when `limit` are already in flight.
    let permit = match Arc::clone(&semaphore).acquire_owned().await {
      Ok(permit) => permit,
      Err(e) => {
        failures.push((index, ExecuteError::Join(e.to_string())));
        break;
      }
    };

    let gauge = Arc::clone(&gauge);
    let cwd = settings.cwd.clone();
    debug!(source = %job.unit.source.display(), index, "admitting compile job");

    join_set.spawn(async move {
      let _permit = permit;
      let _active = gauge.enter();
      let result = compile(&job, &cwd).await;
      (job.index, result)
    });
  }

  let mut compiled = 0;
  while let Some(joined) = join_set.join_next().await {
    match joined {
      Ok((_, Ok(()))) => compiled += 1,
      Ok((index, Err(e))) => {
        error!(error = %e, "compile job failed");
        failures.push((index, e));
      }
      Err(e) => {
        error!(error = %e, "compile task panicked");
        failures.push((usize::MAX, ExecuteError::Join(e.to_string())));
      }
    }
  }

  if !failures.is_empty() {
    let failed = failures.len();
    failures.sort_by_key(|(index, _)| *index);
    let (_, first) = failures.remove(0);
    return Err(match first {
      ExecuteError::CompileFailed { unit, code, .. } => ExecuteError::CompileFailed { unit, code, failed },
      other => other,
    });
  }

  let report = PassReport {
    compiled,
    up_to_date,
    peak_jobs: gauge.peak(),
  };
  info!(
    compiled = report.compiled,
    up_to_date = report.up_to_date,
    peak_jobs = report.peak_jobs,
    limit,
    "compilation pass complete"
  );
  Ok(report)
}

async fn compile(job: &CompileJob, cwd: &std::path::Path) -> Result<(), ExecuteError> {
  let status = run_command(&job.command, cwd).await?;
  if status.success() {
    return Ok(());
  }

  Err(ExecuteError::CompileFailed {
    unit: job.unit.source.clone(),
    code: exit_code(&status),
    failed: 1,
  })
}
