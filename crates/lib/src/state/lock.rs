//! Cooperative build lock.
//!
//! The lock is the `locked` flag in the build record, not an OS file lock. It
//! catches accidental overlapping invocations; it does not survive a crash. A
//! killed build leaves the flag set until cleared with `kiln unlock`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use super::{BuildRecord, StateError, StateStore};
use crate::timestamp::Timestamp;

#[derive(Debug, Error)]
pub enum LockError {
  #[error(
    "Build in progress (last build finished {} ago)\n\
     If you're sure no kiln process is running, run `kiln unlock` or edit:\n  {path}",
    ago(.since)
  )]
  InProgress { since: Duration, path: PathBuf },

  #[error(transparent)]
  State(#[from] StateError),
}

fn ago(since: &Duration) -> humantime::FormattedDuration {
  humantime::format_duration(*since)
}

/// Fail with [`LockError::InProgress`] if `record` is held by another invocation.
pub fn ensure_unlocked(store: &StateStore, record: &BuildRecord) -> Result<(), LockError> {
  if record.locked {
    return Err(LockError::InProgress {
      since: record.last_build_time.elapsed_until(Timestamp::now()),
      path: store.path().to_path_buf(),
    });
  }
  Ok(())
}

/// Holds the build record with `locked` set for the duration of a build.
///
/// Dropping the guard without calling [`BuildLock::release`] still clears the
/// lock, so every early return and `?` leaves the record unlocked.
#[derive(Debug)]
pub struct BuildLock {
  store: StateStore,
  record: BuildRecord,
  released: bool,
}

impl BuildLock {
  /// Mark `record` locked and persist it.
  pub fn acquire(store: StateStore, mut record: BuildRecord) -> Result<Self, LockError> {
    ensure_unlocked(&store, &record)?;

    record.locked = true;
    store.save(&record)?;
    info!(path = %store.path().display(), "acquired build lock");

    Ok(Self {
      store,
      record,
      released: false,
    })
  }

  pub fn record(&self) -> &BuildRecord {
    &self.record
  }

  pub fn record_mut(&mut self) -> &mut BuildRecord {
    &mut self.record
  }

  /// Clear the lock and persist the record as it now stands.
  ///
  /// If the atomic save fails, the lock is still cleared with an in-place
  /// write before the error is returned.
  pub fn release(mut self) -> Result<BuildRecord, StateError> {
    self.released = true;
    self.record.locked = false;

    match self.store.save(&self.record) {
      Ok(()) => {
        info!(path = %self.store.path().display(), "released build lock");
        Ok(self.record.clone())
      }
      Err(e) => {
        self.clear_in_place();
        Err(e)
      }
    }
  }

  fn clear_in_place(&self) {
    if let Err(e) = self.store.write_in_place(&self.record) {
      error!(
        path = %self.store.path().display(),
        error = %e,
        "failed to clear build lock; run `kiln unlock` before the next build"
      );
    }
  }
}

impl Drop for BuildLock {
  fn drop(&mut self) {
    if self.released {
      return;
    }

    self.record.locked = false;
    if let Err(e) = self.store.save(&self.record) {
      warn!(error = %e, "atomic save failed while releasing build lock, writing in place");
      self.clear_in_place();
    } else {
      info!(path = %self.store.path().display(), "released build lock after failure");
    }
  }
}
