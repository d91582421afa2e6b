//! Settings resolution integration tests.

use predicates::prelude::*;
use serde_json::json;

use super::common::TestEnv;

#[test]
fn show_config_infers_kind() {
  let env = TestEnv::with_settings(json!({ "update_command": "true", "exists_command": "true" }));

  env
    .cmd()
    .arg("show-config")
    .assert()
    .success()
    .stdout(predicate::str::contains("script_crude"))
    .stdout(predicate::str::contains("update"));
}

#[test]
fn show_config_reports_replace_without_update_command() {
  let env = TestEnv::new();

  let output = env
    .cmd()
    .args(["--json", "show-config"])
    .assert()
    .success()
    .get_output()
    .stdout
    .clone();
  let value: serde_json::Value = serde_json::from_slice(&output).unwrap();

  assert_eq!(value["kind"], "script_crd");
  assert_eq!(value["update_order"], json!(["delete", "create"]));
  assert_eq!(value["exists_check"], "read command");
  assert_eq!(value["buffer_size"], 1024 * 1024);
}

#[test]
fn show_config_honours_kind_flag() {
  let env = TestEnv::with_settings(json!({ "update_command": "true" }));

  let output = env
    .cmd()
    .args(["--json", "--kind", "script_crd", "show-config"])
    .assert()
    .success()
    .get_output()
    .stdout
    .clone();
  let value: serde_json::Value = serde_json::from_slice(&output).unwrap();

  assert_eq!(value["kind"], "script_crd");
  assert_eq!(value["update_order"], json!(["delete", "create"]));
}

#[test]
fn missing_required_command_is_rejected() {
  let env = TestEnv::with_settings(json!({ "create_command": "" }));

  env
    .cmd()
    .arg("show-config")
    .assert()
    .failure()
    .stderr(predicate::str::contains("Invalid provider settings"))
    .stderr(predicate::str::contains("create_command"));
}

#[test]
fn conflicting_update_flags_are_rejected() {
  let env = TestEnv::with_settings(json!({
    "update_command": "true",
    "create_before_update": true,
    "create_after_update": true,
  }));

  env.cmd().arg("update").assert().failure().stderr(predicate::str::contains("Invalid provider settings"));
}

#[test]
fn unknown_setting_is_rejected() {
  let env = TestEnv::with_settings(json!({ "create_comand": "true" }));

  env
    .cmd()
    .arg("show-config")
    .assert()
    .failure()
    .stderr(predicate::str::contains("create_comand"));
}

#[test]
fn bad_joiner_template_is_rejected() {
  let env = TestEnv::with_settings(json!({ "command_joiner": "%s" }));

  env
    .cmd()
    .arg("show-config")
    .assert()
    .failure()
    .stderr(predicate::str::contains("command_joiner"));
}
