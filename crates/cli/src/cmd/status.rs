//! Status command implementation.
//!
//! Displays the persisted build record for the project's output directory.

use std::path::Path;

use anyhow::{Context, Result};

use kiln_lib::config::BuildConfig;
use kiln_lib::state::StateStore;
use kiln_lib::timestamp::Timestamp;

use crate::output::{print_info, print_json, print_stat, print_success, print_warning, yes_no};

pub fn cmd_status(file: &Path, json: bool) -> Result<i32> {
  let config = BuildConfig::load(file).context("Failed to load project")?;
  let store = StateStore::new(config.state_path());

  let Some(record) = store.read().context("Failed to read build record")? else {
    if json {
      print_json(&serde_json::Value::Null)?;
    } else {
      print_info("No build record yet. Run 'kiln' to build.");
    }
    return Ok(0);
  };

  if json {
    print_json(&record)?;
    return Ok(0);
  }

  print_success(&format!("Build record: {}", store.path().display()));
  print_stat("Last mode", record.last_mode.as_str());
  if record.last_build_time.is_zero() {
    print_stat("Last build", "never");
  } else {
    let ago = record.last_build_time.elapsed_until(Timestamp::now());
    print_stat(
      "Last build",
      &format!("{} ago", humantime::format_duration(ago)),
    );
  }
  print_stat("Locked", yes_no(record.locked));
  print_stat("Rebuilding", yes_no(record.rebuilding));

  if record.locked {
    println!();
    print_warning("A build holds the lock. If none is running, run 'kiln unlock'.");
  }

  Ok(0)
}
