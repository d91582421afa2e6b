//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::{Value, json};
use tempfile::TempDir;

/// Isolated test environment.
///
/// Each test gets its own temporary directory holding the settings file, the
/// state file, and whatever the resource commands create.
pub struct TestEnv {
  pub temp: TempDir,
  pub config_path: PathBuf,
  pub state_path: PathBuf,
}

impl TestEnv {
  /// Settings managing a `resource` file, with `overrides` merged on top.
  pub fn with_settings(overrides: Value) -> Self {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("scriptres.json");
    let state_path = temp.path().join("state").join("resource.json");

    let mut settings = json!({
      "working_directory": temp.path(),
      "create_command": "echo hi > resource",
      "read_command": "cat resource 2>/dev/null",
      "delete_command": "rm -f resource",
      "kill_grace_period_secs": 2,
    });
    if let (Some(base), Value::Object(extra)) = (settings.as_object_mut(), overrides) {
      base.extend(extra);
    }
    std::fs::write(&config_path, serde_json::to_string_pretty(&settings).unwrap()).unwrap();

    Self {
      temp,
      config_path,
      state_path,
    }
  }

  /// Default settings.
  pub fn new() -> Self {
    Self::with_settings(json!({}))
  }

  /// Get a Command for the scriptres binary pointed at this environment.
  pub fn cmd(&self) -> Command {
    let mut cmd = cargo_bin_cmd!("scriptres");
    cmd
      .current_dir(self.temp.path())
      .env_remove("RUST_LOG")
      .arg("--config")
      .arg(&self.config_path)
      .arg("--state")
      .arg(&self.state_path);
    cmd
  }

  /// Path of a file relative to the temp directory.
  pub fn path(&self, relative: &str) -> PathBuf {
    self.temp.path().join(relative)
  }

  /// The recorded state file as JSON.
  pub fn state(&self) -> Value {
    let content = std::fs::read_to_string(&self.state_path).unwrap();
    serde_json::from_str(&content).unwrap()
  }

  /// Lines appended to `name` by the test commands.
  pub fn lines(&self, name: &str) -> Vec<String> {
    std::fs::read_to_string(self.path(name))
      .unwrap_or_default()
      .lines()
      .map(str::to_string)
      .collect()
  }
}
