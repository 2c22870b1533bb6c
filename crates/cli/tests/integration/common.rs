//! Shared test helpers for CLI integration tests.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use filetime::FileTime;
use tempfile::TempDir;

/// A compiler stand-in. Compile mode writes the object and logs the source to
/// `compile.log`. Only when given `-MD` does it also write a ledger listing the
/// source and its `#include "..."` headers under `include/`. A source
/// containing `FAIL` exits 3. Link
/// mode writes a runnable script and logs the output to `link.log`.
const FAKE_CC: &str = r#"#!/bin/sh
mode=link
src=
out=
ledger=
while [ $# -gt 0 ]; do
  case "$1" in
    -c) mode=compile; src="$2"; shift 2 ;;
    -o) out="$2"; shift 2 ;;
    -MD) ledger=1; shift ;;
    *) shift ;;
  esac
done
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
  printf '#!/bin/sh\necho "app ran $*"\n[ "$1" = fail ] && exit 5\nexit 0\n' > "$out"
  chmod +x "$out"
  echo "$out" >> link.log
fi
"#;

/// Isolated project directory.
///
/// Holds a fake compiler at `fakecc`; `kiln.toml` is written by the test.
pub struct TestEnv {
  pub temp: TempDir,
  pub config_path: PathBuf,
}

impl TestEnv {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("kiln.toml");
    let env = Self { temp, config_path };
    env.write_script("fakecc", FAKE_CC);
    env
  }

  /// A project compiling `sources` with the fake compiler, plus extra TOML.
  pub fn project(sources: &[&str], extra: &str) -> Self {
    let env = Self::new();
    for source in sources {
      env.write_file(source, "int x;\n");
    }
    env.write_config(sources, extra);
    env
  }

  pub fn root(&self) -> &Path {
    self.temp.path()
  }

  pub fn path(&self, relative_path: &str) -> PathBuf {
    self.root().join(relative_path)
  }

  pub fn write_config(&self, sources: &[&str], extra: &str) {
    let list = sources.iter().map(|s| format!("\"{}\"", s)).collect::<Vec<_>>().join(", ");
    let content = format!(
      "compiler = \"{}\"\nexecutable = \"app\"\nsources = [{}]\n{}",
      self.path("fakecc").display(),
      list,
      extra
    );
    std::fs::write(&self.config_path, content).unwrap();
  }

  /// Write a file relative to the project, dated a minute in the past.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.path(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    let past = SystemTime::now() - Duration::from_secs(60);
    filetime::set_file_mtime(&path, FileTime::from_system_time(past)).unwrap();
  }

  /// Write a file relative to the project, dated now.
  pub fn touch_file(&self, relative_path: &str, content: &str) {
    std::fs::write(self.path(relative_path), content).unwrap();
  }

  pub fn write_script(&self, relative_path: &str, content: &str) -> PathBuf {
    let path = self.path(relative_path);
    std::fs::write(&path, content).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
  }

  pub fn compiled(&self) -> Vec<String> {
    read_lines(&self.path("compile.log"))
  }

  pub fn linked(&self) -> Vec<String> {
    read_lines(&self.path("link.log"))
  }

  pub fn state_json(&self) -> serde_json::Value {
    let content = std::fs::read_to_string(self.path("out/kiln-state.json")).unwrap();
    serde_json::from_str(&content).unwrap()
  }

  /// Get a Command for the kiln binary, run from the project root.
  pub fn kiln_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("kiln");
    cmd.current_dir(self.root());
    cmd.env_remove("RUST_LOG");
    cmd.env_remove("KILN_JOBS");
    cmd
  }
}

fn read_lines(path: &Path) -> Vec<String> {
  std::fs::read_to_string(path)
    .map(|content| content.lines().map(str::to_string).collect())
    .unwrap_or_default()
}
