//! Source units and the staleness decision.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::ledger::newest_dependency;
use crate::state::BuildRecord;
use crate::timestamp::{Timestamp, mod_time};

pub const OBJECT_EXTENSION: &str = "o";
pub const LEDGER_EXTENSION: &str = "d";

/// Compiler flag that writes a unit's ledger beside its object, named after
/// the `-o` path with the [`LEDGER_EXTENSION`].
pub const LEDGER_FLAG: &str = "-MD";

/// One translation unit: a source file, the object it compiles to, and the
/// dependency ledger the compiler writes beside that object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
  pub source: PathBuf,
  pub object: PathBuf,
  pub ledger: PathBuf,
  /// Directory the compiler runs in; relative ledger entries resolve against it.
  pub root: PathBuf,
}

impl SourceUnit {
  /// Derive a unit's paths. `src/net/tcp.c` maps to `<build_dir>/src/net/tcp.o`
  /// with its ledger at `<build_dir>/src/net/tcp.d`.
  pub fn new(root: &Path, build_dir: &Path, source: &Path) -> Self {
    let mut object_dir = if build_dir.is_absolute() {
      build_dir.to_path_buf()
    } else {
      root.join(build_dir)
    };

    if let Some(parent) = source.parent() {
      for component in parent.components() {
        match component {
          Component::Normal(part) => object_dir.push(part),
          Component::ParentDir => object_dir.push("__"),
          Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
      }
    }

    let stem = source
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_else(|| "unit".to_string());
    let object = object_dir.join(format!("{}.{}", stem, OBJECT_EXTENSION));
    let ledger = object.with_extension(LEDGER_EXTENSION);

    let source = if source.is_absolute() {
      source.to_path_buf()
    } else {
      root.join(source)
    };

    Self {
      source,
      object,
      ledger,
      root: root.to_path_buf(),
    }
  }
}

/// Why a unit was (or was not) scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
  /// The source itself is at least as new as the watermark.
  SourceChanged,
  /// The source could not be stat'ed; the compiler will report why.
  SourceMissing,
  /// No ledger was ever written for this unit.
  LedgerMissing,
  /// A file listed in the ledger is at least as new as the watermark.
  DependencyChanged,
  /// The ledger lists nothing that still exists.
  DependenciesUnresolved,
  Fresh,
}

impl Staleness {
  pub fn is_stale(self) -> bool {
    !matches!(self, Staleness::Fresh)
  }
}

impl fmt::Display for Staleness {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let reason = match self {
      Staleness::SourceChanged => "source changed",
      Staleness::SourceMissing => "source missing",
      Staleness::LedgerMissing => "no dependency ledger",
      Staleness::DependencyChanged => "dependency changed",
      Staleness::DependenciesUnresolved => "no resolvable dependencies",
      Staleness::Fresh => "up to date",
    };
    f.write_str(reason)
  }
}

/// Decide whether `unit` must be recompiled against `watermark`.
///
/// Comparisons use `>=`: a file modified in the same second as the last build
/// is treated as changed.
pub fn staleness(unit: &SourceUnit, watermark: Timestamp) -> Staleness {
  let Some(source_time) = mod_time(&unit.source) else {
    return Staleness::SourceMissing;
  };
  if source_time >= watermark {
    return Staleness::SourceChanged;
  }

  if !unit.ledger.exists() {
    return Staleness::LedgerMissing;
  }

  match newest_dependency(&unit.ledger, &unit.root) {
    Some(newest) if newest >= watermark => Staleness::DependencyChanged,
    Some(_) => Staleness::Fresh,
    None => Staleness::DependenciesUnresolved,
  }
}

/// Whether `unit` is stale relative to the record's last successful build.
pub fn is_stale(unit: &SourceUnit, record: &BuildRecord) -> bool {
  let verdict = staleness(unit, record.last_build_time);
  debug!(
    source = %unit.source.display(),
    watermark = %record.last_build_time,
    verdict = %verdict,
    "staleness check"
  );
  verdict.is_stale()
}
