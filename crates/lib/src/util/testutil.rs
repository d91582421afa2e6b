//! Test utilities for scriptres-lib.
//!
//! Builds resolved configurations rooted in a temporary directory so tests
//! can run real commands without touching the working tree.

use std::path::Path;
use std::sync::Arc;

use crate::config::{Config, ProviderSettings};

/// Settings with trivial commands, running in `dir`.
///
/// The commands manage a `resource` file: create writes it, read prints it,
/// delete removes it.
pub fn settings(dir: &Path) -> ProviderSettings {
  ProviderSettings {
    working_directory: Some(dir.to_path_buf()),
    create_command: "echo created > resource".to_string(),
    read_command: "cat resource 2>/dev/null".to_string(),
    delete_command: "rm -f resource".to_string(),
    kill_grace_period_secs: 2,
    ..Default::default()
  }
}

/// Resolve settings into a shared config.
pub fn resolve(settings: ProviderSettings) -> Arc<Config> {
  Arc::new(settings.resolve().unwrap())
}

/// Resolve the default test settings after applying `edit`.
pub fn config_with(dir: &Path, edit: impl FnOnce(&mut ProviderSettings)) -> Arc<Config> {
  let mut settings = settings(dir);
  edit(&mut settings);
  resolve(settings)
}

/// Read a file written by a test command into lines.
pub fn read_lines(path: &Path) -> Vec<String> {
  std::fs::read_to_string(path)
    .unwrap_or_default()
    .lines()
    .map(str::to_string)
    .collect()
}
