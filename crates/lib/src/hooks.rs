//! User hooks around the build and run stages.
//!
//! Hooks are shell snippets run in the project root. A failing hook is logged
//! and otherwise ignored; hooks never change the outcome of an invocation.

use std::fmt;
use std::path::Path;

use tracing::{info, warn};

use crate::execute::run_shell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
  PreBuild,
  PostBuild,
  PreRun,
  PostRun,
}

impl fmt::Display for HookStage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      HookStage::PreBuild => "pre_build",
      HookStage::PostBuild => "post_build",
      HookStage::PreRun => "pre_run",
      HookStage::PostRun => "post_run",
    })
  }
}

/// Run each hook in order. Returns how many exited successfully.
pub async fn run_hooks(stage: HookStage, hooks: &[String], cwd: &Path) -> usize {
  let mut succeeded = 0;

  for hook in hooks {
    info!(stage = %stage, hook = %hook, "running hook");
    match run_shell(hook, cwd).await {
      Ok(status) if status.success() => succeeded += 1,
      Ok(status) => warn!(stage = %stage, hook = %hook, code = ?status.code(), "hook failed"),
      Err(e) => warn!(stage = %stage, hook = %hook, error = %e, "hook could not be started"),
    }
  }

  succeeded
}
