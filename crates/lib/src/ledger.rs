//! Dependency ledger reader.
//!
//! A ledger is the Makefile-style dependency listing a compiler writes next to
//! an object file when invoked with `-MD`:
//!
//! ```text
//! out/src/main.o: src/main.c src/util.h \
//!   include/config.h
//! ```
//!
//! The first path names the object being described and is skipped. Every other
//! path is a dependency. The compiler has already flattened transitive includes,
//! so reading a ledger is a reduction to the newest modification time, not a
//! graph walk.

use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, warn};

use crate::timestamp::{Timestamp, mod_time};

/// Line continuation marker.
const CONTINUATION: char = '\\';

/// Split ledger text into paths, honouring `\`-newline continuations and
/// backslash-escaped spaces inside paths.
pub fn parse_ledger(content: &str) -> Vec<String> {
  let mut tokens = Vec::new();
  let mut current = String::new();
  let mut chars = content.chars().peekable();

  while let Some(c) = chars.next() {
    match c {
      CONTINUATION => match chars.peek() {
        Some(' ') => {
          current.push(' ');
          chars.next();
        }
        Some('#') => {
          current.push('#');
          chars.next();
        }
        // `\` at end of line or `\r\n`: the record continues on the next line.
        Some('\n') | Some('\r') | None => {
          flush(&mut current, &mut tokens);
        }
        Some(_) => current.push(c),
      },
      '$' if chars.peek() == Some(&'$') => {
        current.push('$');
        chars.next();
      }
      c if c.is_whitespace() => flush(&mut current, &mut tokens),
      c => current.push(c),
    }
  }
  flush(&mut current, &mut tokens);

  tokens
}

fn flush(current: &mut String, tokens: &mut Vec<String>) {
  if !current.is_empty() {
    tokens.push(std::mem::take(current));
  }
}

/// The dependency paths of a ledger: every token after the target.
pub fn dependencies(content: &str) -> Vec<String> {
  parse_ledger(content).into_iter().skip(1).collect()
}

/// Newest modification time among the files listed in the ledger at `ledger_path`.
///
/// Relative dependency paths are resolved against `base`, the directory the
/// compiler ran in. Returns `None` when the ledger does not exist or none of
/// its dependencies could be stat'ed.
pub fn newest_dependency(ledger_path: &Path, base: &Path) -> Option<Timestamp> {
  let content = match fs::read_to_string(ledger_path) {
    Ok(content) => content,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
    Err(e) => {
      warn!(ledger = %ledger_path.display(), error = %e, "failed to read dependency ledger");
      return None;
    }
  };

  let newest = dependencies(&content)
    .iter()
    .filter_map(|dep| {
      let path = Path::new(dep);
      if path.is_absolute() {
        mod_time(path)
      } else {
        mod_time(&base.join(path))
      }
    })
    .max();

  debug!(ledger = %ledger_path.display(), newest = ?newest, "read dependency ledger");
  newest
}
