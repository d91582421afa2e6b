//! Lifecycle command integration tests.

#![cfg(unix)]

use predicates::prelude::*;
use serde_json::json;

use super::common::TestEnv;

#[test]
fn create_records_read_payload() {
  let env = TestEnv::new();

  env
    .cmd()
    .arg("create")
    .assert()
    .success()
    .stdout(predicate::str::contains("Created script_crd"))
    .stdout(predicate::str::contains("hi"));

  assert!(env.path("resource").exists());
  assert_eq!(env.state(), json!({ "status": "present", "payload": "hi\n" }));
}

#[test]
fn read_json_output() {
  let env = TestEnv::new();
  env.cmd().arg("create").assert().success();

  let output = env.cmd().args(["--json", "read"]).assert().success().get_output().stdout.clone();
  let value: serde_json::Value = serde_json::from_slice(&output).unwrap();

  assert_eq!(value["kind"], "script_crd");
  assert_eq!(value["operation"], "read");
  assert_eq!(value["state"], json!({ "status": "present", "payload": "hi\n" }));
}

#[test]
fn read_of_missing_resource_records_absent() {
  let env = TestEnv::new();
  env.cmd().arg("create").assert().success();
  std::fs::remove_file(env.path("resource")).unwrap();

  env.cmd().arg("read").assert().success().stdout(predicate::str::contains("absent"));

  assert_eq!(env.state(), json!({ "status": "absent" }));
}

#[test]
fn read_failure_surfaces_when_not_masked() {
  let env = TestEnv::with_settings(json!({ "delete_on_read_failure": false }));

  env
    .cmd()
    .arg("read")
    .assert()
    .failure()
    .stderr(predicate::str::contains("read command exited with status 1"));
}

#[test]
fn create_with_unreadable_resource_keeps_it_deletable() {
  let env = TestEnv::with_settings(json!({ "read_command": "exit 1" }));

  env
    .cmd()
    .arg("create")
    .assert()
    .failure()
    .stderr(predicate::str::contains("could not be read back"));

  assert_eq!(env.state(), json!({ "status": "present", "payload": "" }));

  env.cmd().arg("delete").assert().success();
  assert!(!env.path("resource").exists());
  assert_eq!(env.state(), json!({ "status": "absent" }));
}

#[test]
fn delete_removes_resource() {
  let env = TestEnv::new();
  env.cmd().arg("create").assert().success();

  env
    .cmd()
    .arg("delete")
    .assert()
    .success()
    .stdout(predicate::str::contains("Deleted"));

  assert!(!env.path("resource").exists());
  assert_eq!(env.state(), json!({ "status": "absent" }));
}

#[test]
fn delete_without_state_does_nothing() {
  let env = TestEnv::with_settings(json!({ "delete_command": "echo D >> order.log" }));

  env.cmd().arg("delete").assert().success();

  assert!(env.lines("order.log").is_empty());
}

#[test]
fn create_twice_is_rejected() {
  let env = TestEnv::new();
  env.cmd().arg("create").assert().success();

  env
    .cmd()
    .arg("create")
    .assert()
    .failure()
    .stderr(predicate::str::contains("cannot create a resource that is present"));
}

#[test]
fn failed_create_reports_stderr() {
  let env = TestEnv::with_settings(json!({ "create_command": "echo 'quota exceeded' >&2; exit 3" }));

  env
    .cmd()
    .arg("create")
    .assert()
    .failure()
    .stderr(predicate::str::contains("exited with status 3"))
    .stderr(predicate::str::contains("quota exceeded"));

  assert_eq!(env.state(), json!({ "status": "absent" }));
}

#[test]
fn update_runs_in_configured_order() {
  let env = TestEnv::with_settings(json!({
    "create_command": "echo C >> order.log; echo hi > resource",
    "update_command": "echo U >> order.log",
    "delete_command": "echo D >> order.log",
    "delete_before_update": true,
    "create_after_update": true,
  }));
  env.cmd().arg("create").assert().success();

  env
    .cmd()
    .arg("update")
    .assert()
    .success()
    .stdout(predicate::str::contains("Updated script_crud"));

  assert_eq!(env.lines("order.log"), ["C", "D", "U", "C"]);
}

#[test]
fn update_with_crd_kind_replaces() {
  let env = TestEnv::with_settings(json!({
    "create_command": "echo C >> order.log; echo hi > resource",
    "update_command": "echo U >> order.log",
    "delete_command": "echo D >> order.log",
  }));
  env.cmd().arg("create").assert().success();

  env.cmd().args(["--kind", "crd", "update"]).assert().success();

  assert_eq!(env.lines("order.log"), ["C", "D", "C"]);
}

#[test]
fn update_before_create_is_rejected() {
  let env = TestEnv::with_settings(json!({ "update_command": "true" }));

  env
    .cmd()
    .arg("update")
    .assert()
    .failure()
    .stderr(predicate::str::contains("cannot update a resource that is absent"));
}

#[test]
fn exists_uses_expected_status() {
  let env = TestEnv::with_settings(json!({
    "exists_command": "test -f resource || exit 3",
    "exists_expected_status": 0,
  }));

  env
    .cmd()
    .arg("exists")
    .assert()
    .success()
    .stdout(predicate::str::contains("script_crde does not exist"));

  env.cmd().arg("create").assert().success();

  env
    .cmd()
    .arg("exists")
    .assert()
    .success()
    .stdout(predicate::str::contains("script_crde exists"));
}

#[test]
fn exists_json_output() {
  let env = TestEnv::with_settings(json!({ "exists_command": "exit 3", "exists_expected_status": 3 }));

  let output = env.cmd().args(["--json", "exists"]).assert().success().get_output().stdout.clone();
  let value: serde_json::Value = serde_json::from_slice(&output).unwrap();

  assert_eq!(value["exists"], true);
}

#[test]
fn base64_read_is_decoded() {
  let env = TestEnv::with_settings(json!({
    "create_command": "true",
    "read_command": "echo 'log noise'; echo 'OUT:aWQ9NDI='",
    "read_format": "base64",
    "read_line_prefix": "OUT:",
  }));

  env.cmd().arg("create").assert().success();

  assert_eq!(env.state(), json!({ "status": "present", "payload": "id=42" }));
}

#[test]
fn command_output_is_logged() {
  let env = TestEnv::with_settings(json!({
    "create_command": "echo provisioning-step; echo hi > resource",
    "log_provider_name": "acme",
  }));

  env
    .cmd()
    .env("RUST_LOG", "info")
    .arg("create")
    .assert()
    .success()
    .stderr(predicate::str::contains("provisioning-step"))
    .stderr(predicate::str::contains("acme"));
}
