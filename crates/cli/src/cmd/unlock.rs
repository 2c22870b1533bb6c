use std::path::Path;

use anyhow::{Context, Result};

use kiln_lib::config::BuildConfig;
use kiln_lib::state::StateStore;

use crate::output::{print_info, print_success};

/// Clear a lock left by a build that was killed before it could release it.
pub fn cmd_unlock(file: &Path) -> Result<i32> {
  let config = BuildConfig::load(file).context("Failed to load project")?;
  let store = StateStore::new(config.state_path());

  if store.force_unlock().context("Failed to update build record")? {
    print_success("Cleared stale build lock");
  } else {
    print_info("Build record is not locked");
  }

  Ok(0)
}
