use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Build mode. Selects per-mode compiler flags for both the project and the
/// tool's own bootstrap build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
  #[default]
  None,
  Debug,
  Release,
}

impl Mode {
  pub fn as_str(&self) -> &'static str {
    match self {
      Mode::None => "none",
      Mode::Debug => "debug",
      Mode::Release => "release",
    }
  }
}

impl fmt::Display for Mode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Extra flags appended for a given mode.
///
/// When the table is omitted from the config entirely, the C defaults apply:
/// `-g -DDEBUG` for debug and `-O3 -DRELEASE` for release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModeFlags {
  #[serde(default)]
  pub debug: Vec<String>,
  #[serde(default)]
  pub release: Vec<String>,
}

impl ModeFlags {
  pub fn c_defaults() -> Self {
    Self {
      debug: vec!["-g".to_string(), "-DDEBUG".to_string()],
      release: vec!["-O3".to_string(), "-DRELEASE".to_string()],
    }
  }

  pub fn for_mode(&self, mode: Mode) -> &[String] {
    match mode {
      Mode::None => &[],
      Mode::Debug => &self.debug,
      Mode::Release => &self.release,
    }
  }
}

/// How the tool rebuilds itself.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BootstrapConfig {
  /// Compiler invoked on the descriptor.
  pub compiler: String,
  /// The tool's own source/descriptor. Its modification time triggers a self-rebuild.
  pub descriptor: PathBuf,
  /// Where the rebuilt tool binary lives.
  pub output: PathBuf,
  #[serde(default)]
  pub flags: Vec<String>,
  #[serde(default)]
  pub mode: Option<ModeFlags>,
}

impl BootstrapConfig {
  /// Flags for a self-rebuild in `mode`: common flags, then mode flags.
  pub fn flags_for(&self, mode: Mode) -> Vec<String> {
    let defaults = ModeFlags::c_defaults();
    let per_mode = self.mode.as_ref().unwrap_or(&defaults);
    self.flags.iter().chain(per_mode.for_mode(mode)).cloned().collect()
  }
}

/// Shell commands run around the build and run stages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Hooks {
  #[serde(default)]
  pub pre_build: Vec<String>,
  #[serde(default)]
  pub post_build: Vec<String>,
  #[serde(default)]
  pub pre_run: Vec<String>,
  #[serde(default)]
  pub post_run: Vec<String>,
}
