//! Persistent build record.
//!
//! One record lives in each output directory and carries the cooperative lock,
//! the self-rebuild guard, the staleness watermark, and the last build mode
//! across invocations.
//!
//! # Example State File
//!
//! ```json
//! {
//!   "version": 1,
//!   "locked": false,
//!   "rebuilding": false,
//!   "last_build_time": 1735689600,
//!   "last_mode": "debug"
//! }
//! ```

pub mod lock;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Mode;
use crate::timestamp::Timestamp;

pub use lock::{BuildLock, LockError, ensure_unlocked};

/// Build record file, one per output directory.
pub const STATE_FILENAME: &str = "kiln-state.json";

/// On-disk format version of the build record.
pub const STATE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
  pub version: u32,
  /// Set while an invocation is inside its critical section.
  pub locked: bool,
  /// Set between a successful self-rebuild and the rebuilt copy taking over.
  pub rebuilding: bool,
  /// Completion time of the last successful build; the staleness watermark.
  pub last_build_time: Timestamp,
  pub last_mode: Mode,
}

impl Default for BuildRecord {
  fn default() -> Self {
    Self {
      version: STATE_VERSION,
      locked: false,
      rebuilding: false,
      last_build_time: Timestamp::ZERO,
      last_mode: Mode::None,
    }
  }
}

#[derive(Debug, Error)]
pub enum StateError {
  #[error("failed to read build record {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write build record {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse build record {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to serialize build record: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("unsupported build record version {found} in {path}")]
  UnsupportedVersion { path: PathBuf, found: u32 },
}

/// Reads and writes the build record at a fixed path.
#[derive(Debug, Clone)]
pub struct StateStore {
  path: PathBuf,
}

impl StateStore {
  pub fn new(path: PathBuf) -> Self {
    Self { path }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn temp_path(&self) -> PathBuf {
    let mut name = self.path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    self.path.with_file_name(name)
  }

  /// Read the record if one exists. Does not create anything.
  pub fn read(&self) -> Result<Option<BuildRecord>, StateError> {
    let content = match fs::read_to_string(&self.path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(e) => {
        return Err(StateError::Read {
          path: self.path.clone(),
          source: e,
        });
      }
    };

    // An empty file is a record that was created but never written.
    if content.trim().is_empty() {
      return Ok(Some(BuildRecord::default()));
    }

    let record: BuildRecord = serde_json::from_str(&content).map_err(|e| StateError::Parse {
      path: self.path.clone(),
      source: e,
    })?;

    if record.version != STATE_VERSION {
      return Err(StateError::UnsupportedVersion {
        path: self.path.clone(),
        found: record.version,
      });
    }

    Ok(Some(record))
  }

  /// Load the record, creating an empty one on first use.
  ///
  /// A missing output directory is not an error: the empty record is returned
  /// and written once the directory exists.
  pub fn load(&self) -> Result<BuildRecord, StateError> {
    if let Some(record) = self.read()? {
      debug!(path = %self.path.display(), ?record, "loaded build record");
      return Ok(record);
    }

    let record = BuildRecord::default();
    if self.path.parent().is_some_and(Path::exists) {
      self.save(&record)?;
      info!(path = %self.path.display(), "created build record");
    }
    Ok(record)
  }

  /// Persist the record. Writes to a temp file and renames it into place so a
  /// reader never sees a half-written record.
  pub fn save(&self, record: &BuildRecord) -> Result<(), StateError> {
    let content = serde_json::to_string_pretty(record).map_err(StateError::Serialize)?;
    let temp_path = self.temp_path();

    fs::write(&temp_path, &content).map_err(|e| StateError::Write {
      path: temp_path.clone(),
      source: e,
    })?;
    fs::rename(&temp_path, &self.path).map_err(|e| StateError::Write {
      path: self.path.clone(),
      source: e,
    })?;

    debug!(path = %self.path.display(), ?record, "saved build record");
    Ok(())
  }

  /// Overwrite the record in place, bypassing the temp file. Used only to
  /// clear the lock when an atomic save has already failed.
  pub fn write_in_place(&self, record: &BuildRecord) -> Result<(), StateError> {
    let content = serde_json::to_string_pretty(record).map_err(StateError::Serialize)?;
    fs::write(&self.path, content).map_err(|e| StateError::Write {
      path: self.path.clone(),
      source: e,
    })
  }

  /// Clear a lock left behind by an invocation that was killed mid-build.
  ///
  /// Returns whether the record was locked.
  pub fn force_unlock(&self) -> Result<bool, StateError> {
    let Some(mut record) = self.read()? else {
      return Ok(false);
    };
    if !record.locked {
      return Ok(false);
    }

    record.locked = false;
    self.save(&record)?;
    info!(path = %self.path.display(), "cleared stale build lock");
    Ok(true)
  }
}
