//! Project configuration.
//!
//! The configuration is read once per invocation from `kiln.toml` and passed
//! through the engine as an immutable [`BuildConfig`]. Relative paths are
//! resolved against the directory holding the config file, which is also the
//! working directory of every command the engine spawns.
//!
//! # Example
//!
//! ```toml
//! compiler = "clang"
//! executable = "trace"
//! build_dir = "out"
//! sources = ["src/main.c", "src/util.c"]
//! cflags = ["-Wall"]
//! link_flags = ["-lm"]
//!
//! [mode]
//! debug = ["-g", "-DDEBUG", "-fsanitize=address"]
//! release = ["-O3", "-DRELEASE"]
//!
//! [bootstrap]
//! compiler = "clang"
//! descriptor = "build.c"
//! output = "build"
//!
//! [hooks]
//! pre_build = ["echo 'start build'"]
//! ```

mod types;

use std::fs;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::state::STATE_FILENAME;
use crate::unit::SourceUnit;

pub use types::{BootstrapConfig, Hooks, Mode, ModeFlags};

/// Default configuration file, looked up in the working directory.
pub const CONFIG_FILENAME: &str = "kiln.toml";

/// Overrides the default concurrency limit when neither the CLI nor the config sets one.
pub const JOBS_ENV: &str = "KILN_JOBS";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("config file not found: {0}")]
  NotFound(PathBuf),

  #[error("failed to read config {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse config {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("invalid config: {0}")]
  Invalid(String),
}

fn default_build_dir() -> PathBuf {
  PathBuf::from("out")
}

/// Static build configuration for one project.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
  /// Project root. Not read from the file; set to the config file's directory.
  #[serde(skip)]
  pub root: PathBuf,

  pub compiler: String,
  /// Name of the linked executable, placed in `build_dir`.
  pub executable: String,
  #[serde(default = "default_build_dir")]
  pub build_dir: PathBuf,
  /// Translation units, compiled in this order.
  pub sources: Vec<PathBuf>,
  #[serde(default)]
  pub cflags: Vec<String>,
  #[serde(default)]
  pub link_flags: Vec<String>,
  #[serde(default)]
  pub jobs: Option<usize>,
  #[serde(default)]
  pub mode: Option<ModeFlags>,
  #[serde(default)]
  pub bootstrap: Option<BootstrapConfig>,
  #[serde(default)]
  pub hooks: Hooks,
}

impl BuildConfig {
  /// Load and validate the config at `path`.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(ConfigError::NotFound(path.to_path_buf())),
      Err(e) => {
        return Err(ConfigError::Read {
          path: path.to_path_buf(),
          source: e,
        });
      }
    };

    let root = match path.parent() {
      Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
      _ => PathBuf::from("."),
    };

    let config = Self::parse(&content, root).map_err(|e| match e {
      ConfigError::Parse { source, .. } => ConfigError::Parse {
        path: path.to_path_buf(),
        source,
      },
      other => other,
    })?;

    debug!(
      path = %path.display(),
      sources = config.sources.len(),
      bootstrap = config.bootstrap.is_some(),
      "loaded config"
    );
    Ok(config)
  }

  /// Parse config text for a project rooted at `root`.
  pub fn parse(content: &str, root: PathBuf) -> Result<Self, ConfigError> {
    let mut config: BuildConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
      path: PathBuf::new(),
      source,
    })?;
    config.root = root;
    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> Result<(), ConfigError> {
    if self.compiler.trim().is_empty() {
      return Err(ConfigError::Invalid("`compiler` must not be empty".to_string()));
    }
    if self.executable.trim().is_empty() {
      return Err(ConfigError::Invalid("`executable` must not be empty".to_string()));
    }
    if self.sources.is_empty() {
      return Err(ConfigError::Invalid("`sources` must list at least one file".to_string()));
    }
    if self.jobs == Some(0) {
      return Err(ConfigError::Invalid("`jobs` must be at least 1".to_string()));
    }
    if let Some(bootstrap) = &self.bootstrap
      && bootstrap.compiler.trim().is_empty()
    {
      return Err(ConfigError::Invalid("`bootstrap.compiler` must not be empty".to_string()));
    }
    Ok(())
  }

  /// Resolve a configured path against the project root.
  pub fn resolve(&self, path: &Path) -> PathBuf {
    if path.is_absolute() {
      path.to_path_buf()
    } else {
      self.root.join(path)
    }
  }

  pub fn build_dir_path(&self) -> PathBuf {
    self.resolve(&self.build_dir)
  }

  pub fn state_path(&self) -> PathBuf {
    self.build_dir_path().join(STATE_FILENAME)
  }

  pub fn executable_path(&self) -> PathBuf {
    self.build_dir_path().join(&self.executable)
  }

  /// One unit per configured source, in configuration order.
  pub fn units(&self) -> Vec<SourceUnit> {
    self
      .sources
      .iter()
      .map(|source| SourceUnit::new(&self.root, &self.build_dir, source))
      .collect()
  }

  /// Compiler flags for `mode`: common flags, then mode flags.
  pub fn cflags_for(&self, mode: Mode) -> Vec<String> {
    let defaults = ModeFlags::c_defaults();
    let per_mode = self.mode.as_ref().unwrap_or(&defaults);
    self.cflags.iter().chain(per_mode.for_mode(mode)).cloned().collect()
  }

  /// Concurrency limit: explicit override, then config, then `KILN_JOBS`,
  /// then the number of available processors.
  pub fn jobs(&self, override_jobs: Option<usize>) -> usize {
    override_jobs
      .or(self.jobs)
      .or_else(|| std::env::var(JOBS_ENV).ok().and_then(|v| v.trim().parse().ok()))
      .filter(|&n| n > 0)
      .unwrap_or_else(|| std::thread::available_parallelism().map(NonZeroUsize::get).unwrap_or(1))
  }
}
