//! Build entry point.
//!
//! One invocation: load the record and take the lock, run the bootstrap
//! checkpoint, recompile stale units, link if anything changed, persist the
//! new watermark and release the lock, then optionally run the executable.
//!
//! The record is only touched here, by the controlling task. Every error path
//! after the lock is taken leaves the record unlocked through [`BuildLock`].

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};

use crate::bootstrap::{self, BootstrapError, Checkpoint, HandOff};
use crate::config::{BuildConfig, ConfigError, Mode};
use crate::execute::{CommandLine, CompileSettings, ExecuteError, PassReport, run_all, run_interactive};
use crate::hooks::{HookStage, run_hooks};
use crate::link::link;
use crate::state::{BuildLock, BuildRecord, LockError, StateError, StateStore, ensure_unlocked};
use crate::timestamp::Timestamp;

#[derive(Debug, Error)]
pub enum BuildError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  State(#[from] StateError),

  #[error(transparent)]
  Lock(#[from] LockError),

  #[error(transparent)]
  Execute(#[from] ExecuteError),

  #[error(transparent)]
  Bootstrap(#[from] BootstrapError),

  #[error("failed to prepare output directory {path}: {source}")]
  OutputDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

impl BuildError {
  /// Process exit code for this error.
  ///
  /// A failed self-rebuild exits with the compiler's own status.
  pub fn exit_code(&self) -> i32 {
    match self {
      BuildError::Lock(LockError::InProgress { .. }) => 1,
      BuildError::Execute(ExecuteError::CompileFailed { .. } | ExecuteError::LinkFailed { .. }) => 2,
      BuildError::Bootstrap(BootstrapError::Failed { code }) => code.unwrap_or(1),
      _ => 1,
    }
  }
}

/// What the caller asked for.
#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
  pub mode: Mode,
  pub clean: bool,
  /// Rebuild the tool itself and stop.
  pub build_only: bool,
  pub jobs: Option<usize>,
  /// Arguments for the executable, if it should run after the build.
  pub run: Option<Vec<String>>,
  /// The invocation's arguments, passed unchanged to a rebuilt copy of the tool.
  pub forward_args: Vec<OsString>,
}

#[derive(Debug)]
pub enum Outcome {
  Built(BuildSummary),
  /// A build-only request finished. `output` is `None` when there was nothing
  /// to rebuild.
  SelfBuilt { output: Option<PathBuf> },
  /// The tool was rebuilt; the caller must hand control to the new copy.
  HandOff(HandOff),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildSummary {
  pub report: PassReport,
  pub linked: bool,
  /// Exit code of the executable when run was requested.
  pub run_exit: Option<i32>,
}

/// Run one invocation against `config`.
pub async fn invoke(config: &BuildConfig, request: &BuildRequest) -> Result<Outcome, BuildError> {
  let build_dir = config.build_dir_path();
  let store = StateStore::new(config.state_path());
  let mut record = store.load()?;
  ensure_unlocked(&store, &record)?;

  if request.clean {
    if record.rebuilding {
      info!("self-rebuild in progress, ignoring clean");
    } else {
      clean(&build_dir)?;
      record = BuildRecord::default();
    }
  }

  std::fs::create_dir_all(&build_dir).map_err(|e| BuildError::OutputDir {
    path: build_dir.clone(),
    source: e,
  })?;

  let mut lock = BuildLock::acquire(store, record)?;

  let checkpoint = bootstrap::evaluate(config, lock.record(), request.mode, request.clean, request.build_only);
  match checkpoint {
    Checkpoint::Rebuild(trigger) => {
      if let Some(self_build) = &config.bootstrap {
        info!(trigger = %trigger, "self-rebuild triggered");
        let output = bootstrap::rebuild(config, self_build, request.mode).await?;

        let record = lock.record_mut();
        let mode_changed = record.last_mode != request.mode;
        record.last_mode = request.mode;
        record.last_build_time = if mode_changed { Timestamp::ZERO } else { Timestamp::now() };
        record.rebuilding = !request.build_only;
        lock.release()?;

        if request.build_only {
          return Ok(Outcome::SelfBuilt { output: Some(output) });
        }
        return Ok(Outcome::HandOff(HandOff::new(&output, request.forward_args.clone())?));
      }
    }
    Checkpoint::Guarded => lock.record_mut().rebuilding = false,
    Checkpoint::NotConfigured | Checkpoint::UpToDate => {}
  }

  if request.build_only {
    info!("nothing to rebuild");
    lock.release()?;
    return Ok(Outcome::SelfBuilt { output: None });
  }

  if lock.record().last_mode != request.mode {
    info!(
      from = %lock.record().last_mode,
      to = %request.mode,
      "mode changed, forcing full rebuild"
    );
    lock.record_mut().last_build_time = Timestamp::ZERO;
  }

  run_hooks(HookStage::PreBuild, &config.hooks.pre_build, &config.root).await;

  let units = config.units();
  let settings = CompileSettings::from_config(config, request.mode);
  let report = run_all(&units, lock.record(), &settings, config.jobs(request.jobs)).await?;

  let linked = if report.compiled > 0 {
    link(config, &units).await?;
    true
  } else {
    info!("nothing recompiled, skipping link");
    false
  };

  let record = lock.record_mut();
  record.last_build_time = Timestamp::now();
  record.last_mode = request.mode;
  record.rebuilding = false;
  lock.release()?;

  info!(compiled = report.compiled, linked, mode = %request.mode, "build complete");
  run_hooks(HookStage::PostBuild, &config.hooks.post_build, &config.root).await;

  let run_exit = match &request.run {
    Some(args) => Some(run_executable(config, args).await?),
    None => None,
  };

  Ok(Outcome::Built(BuildSummary {
    report,
    linked,
    run_exit,
  }))
}

fn clean(build_dir: &std::path::Path) -> Result<(), BuildError> {
  match std::fs::remove_dir_all(build_dir) {
    Ok(()) => {
      info!(path = %build_dir.display(), "removed output directory");
      Ok(())
    }
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(BuildError::OutputDir {
      path: build_dir.to_path_buf(),
      source: e,
    }),
  }
}

async fn run_executable(config: &BuildConfig, args: &[String]) -> Result<i32, ExecuteError> {
  run_hooks(HookStage::PreRun, &config.hooks.pre_run, &config.root).await;

  let command = CommandLine::new(config.executable_path().to_string_lossy()).args(args);
  let status = run_interactive(&command, &config.root).await?;
  let code = status.code().unwrap_or_else(|| {
    warn!("executable was terminated by a signal");
    1
  });

  run_hooks(HookStage::PostRun, &config.hooks.post_run, &config.root).await;
  Ok(code)
}
