//! kiln-lib: the incremental build engine behind `kiln`.
//!
//! - [`config`]: the `kiln.toml` project description
//! - [`unit`] and [`ledger`]: which sources are stale, from file times and
//!   compiler-written dependency ledgers
//! - [`state`]: the persisted build record and the cooperative lock
//! - [`execute`]: the bounded-concurrency compilation pass
//! - [`bootstrap`]: rebuilding and re-executing the tool itself
//! - [`engine`]: one invocation, end to end

pub mod bootstrap;
pub mod config;
pub mod engine;
pub mod execute;
pub mod hooks;
pub mod ledger;
pub mod link;
pub mod state;
pub mod timestamp;
pub mod unit;
pub mod util;
