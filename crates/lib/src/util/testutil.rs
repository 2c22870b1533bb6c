//! Test utilities for kiln-lib.
//!
//! Provides cross-platform shell helpers and, on Unix, a scratch project with a
//! fake compiler written as a `/bin/sh` script. The fake compiler behaves like
//! `cc`: it writes the object, a dependency ledger beside it only when given
//! `-MD`, and logs each invocation so tests can count what ran.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use filetime::FileTime;
use tempfile::TempDir;

use crate::config::BuildConfig;

/// Returns the shell command and args to execute a shell script.
#[cfg(unix)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("/bin/sh", vec!["-c".to_string(), script.to_string()])
}

#[cfg(windows)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("cmd.exe", vec!["/C".to_string(), script.to_string()])
}

/// Returns the command and args to create a marker file in the current directory.
#[cfg(unix)]
pub fn touch_file(filename: &str) -> (&'static str, Vec<String>) {
  ("/usr/bin/touch", vec![filename.to_string()])
}

#[cfg(windows)]
pub fn touch_file(filename: &str) -> (&'static str, Vec<String>) {
  (
    "powershell.exe",
    vec![
      "-NoProfile".to_string(),
      "-Command".to_string(),
      format!("New-Item -ItemType File -Path '{}' -Force | Out-Null", filename),
    ],
  )
}

/// Set a file's modification time `secs` seconds into the past.
pub fn backdate(path: &Path, secs: u64) {
  let time = SystemTime::now() - Duration::from_secs(secs);
  filetime::set_file_mtime(path, FileTime::from_system_time(time)).unwrap();
}

/// Body of the fake compiler. `{delay}` is replaced with a `sleep` line or nothing.
///
/// Compile mode (`-c SRC -o OBJ`): fails with exit 3 if SRC contains `FAIL`,
/// otherwise writes OBJ, appends SRC to `compile.log`, and with `-MD` writes
/// `OBJ%.o.d` listing SRC and `include/NAME` for each `#include "NAME"` line.
///
/// Link mode (no `-c`): fails with exit 4 when given `-lmissing`, otherwise
/// writes OUT as an executable script that echoes its arguments (exiting 5
/// when the first one is `fail`), and appends OUT to `link.log`.
#[cfg(unix)]
const FAKE_CC: &str = r#"#!/bin/sh
mode=link
src=
out=
ledger=
missing=
while [ $# -gt 0 ]; do
  case "$1" in
    -c) mode=compile; src="$2"; shift 2 ;;
    -o) out="$2"; shift 2 ;;
    -MD) ledger=1; shift ;;
    -lmissing) missing=1; shift ;;
    *) shift ;;
  esac
done
{delay}
if [ "$mode" = compile ]; then
  if grep -q FAIL "$src"; then
    echo "error: $src: forced failure" >&2
    exit 3
  fi
  echo "object for $src" > "$out"
  if [ -n "$ledger" ]; then
    dep="${out%.o}.d"
    printf '%s: %s' "$out" "$src" > "$dep"
    for h in $(sed -n 's/^#include "\(.*\)"$/\1/p' "$src"); do
      printf ' \\\n  include/%s' "$h" >> "$dep"
    done
    echo >> "$dep"
  fi
  echo "$src" >> compile.log
else
  if [ -n "$missing" ]; then
    echo "ld: cannot find -lmissing" >&2
    exit 4
  fi
  printf '#!/bin/sh\necho "app ran $*"\n[ "$1" = fail ] && exit 5\nexit 0\n' > "$out"
  chmod +x "$out"
  echo "$out" >> link.log
fi
"#;

/// Write the fake compiler into `dir` and return its path.
#[cfg(unix)]
pub fn fake_compiler(dir: &Path, name: &str, delay: Option<&str>) -> PathBuf {
  let delay = delay.map(|d| format!("sleep {}", d)).unwrap_or_default();
  write_script(&dir.join(name), &FAKE_CC.replace("{delay}", &delay))
}

/// Write an executable shell script.
#[cfg(unix)]
pub fn write_script(path: &Path, body: &str) -> PathBuf {
  use std::os::unix::fs::PermissionsExt;

  fs::write(path, body).unwrap();
  fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
  path.to_path_buf()
}

/// A scratch project root with a fake compiler and `kiln.toml`-style config.
pub struct Project {
  pub temp: TempDir,
}

impl Project {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    #[cfg(unix)]
    fake_compiler(temp.path(), "fakecc", None);
    Self { temp }
  }

  /// Like [`Project::new`], but each compile sleeps so jobs overlap.
  #[cfg(unix)]
  pub fn slow() -> Self {
    let temp = TempDir::new().unwrap();
    fake_compiler(temp.path(), "fakecc", Some("0.2"));
    Self { temp }
  }

  pub fn root(&self) -> &Path {
    self.temp.path()
  }

  pub fn path(&self, rel: &str) -> PathBuf {
    self.root().join(rel)
  }

  /// Write a file relative to the root and backdate it so it predates any build.
  pub fn write(&self, rel: &str, content: &str) -> PathBuf {
    let path = self.path(rel);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    backdate(&path, 60);
    path
  }

  /// Write a file and leave its modification time at now.
  pub fn touch(&self, rel: &str, content: &str) -> PathBuf {
    let path = self.path(rel);
    fs::write(&path, content).unwrap();
    path
  }

  /// Config for `sources` compiled with the fake compiler, plus extra TOML.
  pub fn config(&self, sources: &[&str], extra: &str) -> BuildConfig {
    let compiler = self.path("fakecc");
    let list = sources.iter().map(|s| format!("\"{}\"", s)).collect::<Vec<_>>().join(", ");
    let toml = format!(
      "compiler = \"{}\"\nexecutable = \"app\"\nsources = [{}]\n{}",
      compiler.display(),
      list,
      extra
    );
    BuildConfig::parse(&toml, self.root().to_path_buf()).unwrap()
  }

  /// Lines appended to `compile.log` by the fake compiler.
  pub fn compiled(&self) -> Vec<String> {
    read_lines(&self.path("compile.log"))
  }

  /// Lines appended to `link.log` by the fake compiler.
  pub fn linked(&self) -> Vec<String> {
    read_lines(&self.path("link.log"))
  }

  /// Forget what the fake compiler logged so far.
  pub fn reset_logs(&self) {
    let _ = fs::remove_file(self.path("compile.log"));
    let _ = fs::remove_file(self.path("link.log"));
  }
}

fn read_lines(path: &Path) -> Vec<String> {
  fs::read_to_string(path)
    .map(|content| content.lines().map(str::to_string).collect())
    .unwrap_or_default()
}
