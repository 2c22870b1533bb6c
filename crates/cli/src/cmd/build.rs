//! Build command implementation.
//!
//! Loads the project, runs one engine invocation, and reports the outcome.
//! When the engine rebuilt kiln itself, control passes to the new binary here.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result, anyhow};

use kiln_lib::config::BuildConfig;
use kiln_lib::engine::{BuildRequest, Outcome, invoke};

use crate::output::{format_duration, print_info, print_stat, print_success, print_warning, yes_no};

/// Build the project described by `file`.
///
/// Returns the process exit code: the executable's when it was run, otherwise 0.
pub fn cmd_build(file: &Path, request: BuildRequest) -> Result<i32> {
  let start = Instant::now();
  let config = BuildConfig::load(file).context("Failed to load project")?;

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let outcome = rt.block_on(invoke(&config, &request))?;
  drop(rt);

  match outcome {
    Outcome::Built(summary) => {
      if summary.report.compiled == 0 {
        print_success("Up to date");
      } else {
        print_success("Build complete");
      }
      print_stat("Mode", request.mode.as_str());
      print_stat("Compiled", &summary.report.compiled.to_string());
      print_stat("Up to date", &summary.report.up_to_date.to_string());
      print_stat("Linked", yes_no(summary.linked));
      print_stat("Duration", &format_duration(start.elapsed()));

      match summary.run_exit {
        Some(code) => {
          if code != 0 {
            print_warning(&format!("{} exited with code {}", config.executable, code));
          }
          Ok(code)
        }
        None => Ok(0),
      }
    }
    Outcome::SelfBuilt { output: Some(output) } => {
      print_success(&format!("Rebuilt {}", output.display()));
      Ok(0)
    }
    Outcome::SelfBuilt { output: None } => {
      print_info("Nothing to rebuild (no [bootstrap] table, or a self-rebuild just finished)");
      Ok(0)
    }
    Outcome::HandOff(hand_off) => {
      print_info(&format!("Re-executing {}", hand_off.program.display()));
      let program = hand_off.program.clone();
      let err = hand_off.exec();
      Err(anyhow!(err).context(format!("Failed to hand off to {}", program.display())))
    }
  }
}
