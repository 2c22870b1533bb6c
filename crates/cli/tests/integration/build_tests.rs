//! Build command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn first_build_compiles_and_links() {
  let env = TestEnv::project(&["src/main.c", "src/util.c"], "");

  env
    .kiln_cmd()
    .assert()
    .success()
    .stdout(predicate::str::contains("Build complete"))
    .stdout(predicate::str::contains("Compiled: 2"));

  assert_eq!(env.compiled().len(), 2);
  assert_eq!(env.linked().len(), 1);
  assert!(env.path("out/app").exists());
  assert!(env.path("out/src/main.o").exists());

  let state = env.state_json();
  assert_eq!(state["locked"], false);
  assert_eq!(state["version"], 1);
  assert!(state["last_build_time"].as_i64().unwrap() > 0);
}

#[test]
fn second_build_is_up_to_date() {
  let env = TestEnv::project(&["src/main.c"], "");
  env.kiln_cmd().assert().success();

  env
    .kiln_cmd()
    .assert()
    .success()
    .stdout(predicate::str::contains("Up to date"))
    .stdout(predicate::str::contains("Linked: no"));

  assert_eq!(env.compiled().len(), 1);
  assert_eq!(env.linked().len(), 1);
}

#[test]
fn touched_header_recompiles_its_includer_and_relinks() {
  let env = TestEnv::new();
  env.write_file("include/util.h", "int util(void);\n");
  env.write_file("src/a.c", "#include \"util.h\"\nint a;\n");
  env.write_file("src/b.c", "int b;\n");
  env.write_config(&["src/a.c", "src/b.c"], "");
  env.kiln_cmd().assert().success();

  env.touch_file("include/util.h", "int util(int);\n");
  env
    .kiln_cmd()
    .assert()
    .success()
    .stdout(predicate::str::contains("Compiled: 1"));

  let compiled = env.compiled();
  assert_eq!(compiled.len(), 3);
  assert!(compiled[2].ends_with("src/a.c"));
  assert_eq!(env.linked().len(), 2);
}

#[test]
fn switching_mode_rebuilds_everything() {
  let env = TestEnv::project(&["src/a.c", "src/b.c"], "");
  env.kiln_cmd().arg("dev").assert().success();

  env
    .kiln_cmd()
    .arg("rel")
    .assert()
    .success()
    .stdout(predicate::str::contains("Mode: release"))
    .stdout(predicate::str::contains("Compiled: 2"));

  assert_eq!(env.state_json()["last_mode"], "release");
}

#[test]
fn compile_failure_exits_2_and_unlocks() {
  let env = TestEnv::project(&["src/good.c"], "");
  env.write_file("src/bad.c", "FAIL\n");
  env.write_config(&["src/good.c", "src/bad.c"], "");

  env
    .kiln_cmd()
    .assert()
    .code(2)
    .stderr(predicate::str::contains("failed to compile"))
    .stderr(predicate::str::contains("bad.c"));

  assert_eq!(env.state_json()["locked"], false);
  assert!(env.linked().is_empty());
}

#[test]
fn jobs_flag_rejects_zero() {
  let env = TestEnv::project(&["src/main.c"], "");

  env.kiln_cmd().args(["-j", "0"]).assert().failure();
  assert!(env.compiled().is_empty());
}

#[test]
fn clean_removes_output_directory() {
  let env = TestEnv::project(&["src/main.c"], "");
  env.kiln_cmd().assert().success();
  env.write_file("out/stray.txt", "left over");

  env
    .kiln_cmd()
    .arg("clean")
    .assert()
    .success()
    .stdout(predicate::str::contains("Compiled: 1"));

  assert!(!env.path("out/stray.txt").exists());
  assert_eq!(env.compiled().len(), 2);
}

#[test]
fn run_passes_arguments_and_exit_code() {
  let env = TestEnv::project(&["src/main.c"], "");

  env
    .kiln_cmd()
    .args(["--", "hello", "world"])
    .assert()
    .success()
    .stdout(predicate::str::contains("app ran hello world"));

  env
    .kiln_cmd()
    .args(["--", "fail"])
    .assert()
    .code(5)
    .stdout(predicate::str::contains("app ran fail"));
}

#[test]
fn build_without_separator_does_not_run() {
  let env = TestEnv::project(&["src/main.c"], "");

  env
    .kiln_cmd()
    .args(["-j", "2"])
    .assert()
    .success()
    .stdout(predicate::str::contains("app ran").not());
}

#[test]
fn arguments_after_separator_are_not_parsed_as_options() {
  let env = TestEnv::project(&["src/main.c"], "");

  env
    .kiln_cmd()
    .args(["-j", "1", "--", "-j", "0", "--", "rel"])
    .assert()
    .success()
    .stdout(predicate::str::contains("app ran -j 0 -- rel"));
}

#[test]
fn hooks_run_around_build_and_run() {
  let env = TestEnv::project(
    &["src/main.c"],
    r#"
[hooks]
pre_build = ["echo pre_build >> hooks.log"]
post_build = ["echo post_build >> hooks.log", "exit 1"]
pre_run = ["echo pre_run >> hooks.log"]
post_run = ["echo post_run >> hooks.log"]
"#,
  );

  env.kiln_cmd().arg("--").assert().success();

  let log = std::fs::read_to_string(env.path("hooks.log")).unwrap();
  assert_eq!(log, "pre_build\npost_build\npre_run\npost_run\n");
}

#[test]
fn project_file_flag_resolves_paths_against_its_directory() {
  let env = TestEnv::project(&["src/main.c"], "");
  let elsewhere = tempfile::TempDir::new().unwrap();

  env
    .kiln_cmd()
    .current_dir(elsewhere.path())
    .arg("-f")
    .arg(&env.config_path)
    .assert()
    .success();

  assert!(env.path("out/app").exists());
  assert_eq!(env.compiled().len(), 1);
}
