//! Filesystem modification times.
//!
//! Every staleness decision reduces to comparing two [`Timestamp`]s. Times are
//! whole seconds since the Unix epoch, which is also the resolution persisted in
//! the build record.

use std::fmt;
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
  /// The epoch. A record carrying this watermark treats every unit as stale.
  pub const ZERO: Timestamp = Timestamp(0);

  pub fn now() -> Self {
    Self::from_system_time(SystemTime::now())
  }

  pub fn from_system_time(time: SystemTime) -> Self {
    match time.duration_since(UNIX_EPOCH) {
      Ok(since) => Timestamp(since.as_secs() as i64),
      Err(before) => Timestamp(-(before.duration().as_secs() as i64)),
    }
  }

  pub fn is_zero(self) -> bool {
    self.0 == 0
  }

  /// Time elapsed between `self` and `now`, saturating at zero.
  pub fn elapsed_until(self, now: Timestamp) -> Duration {
    Duration::from_secs(now.0.saturating_sub(self.0).max(0) as u64)
  }
}

impl fmt::Display for Timestamp {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Modification time of `path`, or `None` if it cannot be stat'ed.
///
/// Never cached: files routinely change between invocations run seconds apart.
pub fn mod_time(path: &Path) -> Option<Timestamp> {
  match path.metadata().and_then(|meta| meta.modified()) {
    Ok(modified) => Some(Timestamp::from_system_time(modified)),
    Err(e) if e.kind() == io::ErrorKind::NotFound => None,
    Err(e) => {
      debug!(path = %path.display(), error = %e, "failed to stat file");
      None
    }
  }
}
