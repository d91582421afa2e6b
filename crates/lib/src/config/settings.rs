//! User-facing provider settings.
//!
//! [`ProviderSettings`] mirrors the provider's option schema, including its
//! defaults. It is what a settings file deserializes into; [`ProviderSettings::resolve`]
//! validates it and produces the immutable [`Config`] the lifecycle runs on.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{
  CommandLog, Config, ConfigError, CreatePlacement, LogLevel, ReadFormat, UpdateExecution, UpdateStrategy,
};
use crate::compose::Composer;

/// Default per-stream output cap: 1 MiB.
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Default joiner: run the second command on the next line.
pub const DEFAULT_COMMAND_JOINER: &str = "%s\n%s";

/// Default isolator: a subshell.
pub const DEFAULT_COMMAND_ISOLATOR: &str = "(\n%s\n)";

/// Default grace period between SIGTERM and SIGKILL on cancellation.
pub const DEFAULT_KILL_GRACE_PERIOD_SECS: u64 = 10;

/// Provider options as written by the user.
///
/// Every field is optional in the serialized form except the three required
/// commands; missing fields take the provider defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderSettings {
  pub buffer_size: usize,
  pub log_provider_name: String,
  pub log_level: LogLevel,
  pub command_log_level: LogLevel,
  pub command_log_width: usize,
  pub interpreter: Vec<String>,
  pub working_directory: Option<PathBuf>,
  pub include_parent_environment: bool,
  pub environment: BTreeMap<String, String>,
  pub command_prefix: String,
  pub command_joiner: String,
  pub command_isolator: String,
  pub create_command: String,
  pub read_command: String,
  pub delete_on_read_failure: bool,
  pub read_format: ReadFormat,
  pub read_line_prefix: String,
  pub update_command: String,
  pub update_execution: UpdateExecution,
  pub delete_before_update: bool,
  pub create_before_update: bool,
  pub create_after_update: bool,
  pub exists_command: String,
  pub exists_expected_status: i32,
  pub delete_command: String,
  pub kill_grace_period_secs: u64,
}

impl Default for ProviderSettings {
  fn default() -> Self {
    Self {
      buffer_size: DEFAULT_BUFFER_SIZE,
      log_provider_name: String::new(),
      log_level: LogLevel::Warn,
      command_log_level: LogLevel::Info,
      command_log_width: 1,
      interpreter: Vec::new(),
      working_directory: None,
      include_parent_environment: true,
      environment: BTreeMap::new(),
      command_prefix: String::new(),
      command_joiner: DEFAULT_COMMAND_JOINER.to_string(),
      command_isolator: DEFAULT_COMMAND_ISOLATOR.to_string(),
      create_command: String::new(),
      read_command: String::new(),
      delete_on_read_failure: true,
      read_format: ReadFormat::Raw,
      read_line_prefix: String::new(),
      update_command: String::new(),
      update_execution: UpdateExecution::Sequential,
      delete_before_update: false,
      create_before_update: false,
      create_after_update: false,
      exists_command: String::new(),
      exists_expected_status: 0,
      delete_command: String::new(),
      kill_grace_period_secs: DEFAULT_KILL_GRACE_PERIOD_SECS,
    }
  }
}

impl ProviderSettings {
  /// Load settings from a JSON file.
  pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Read)?;
    let settings = serde_json::from_str(&content).map_err(ConfigError::Parse)?;
    debug!(path = %path.display(), "loaded provider settings");
    Ok(settings)
  }

  /// Validate the settings and produce the immutable configuration.
  pub fn resolve(self) -> Result<Config, ConfigError> {
    let interpreter = if self.interpreter.is_empty() {
      default_interpreter()
    } else {
      self.interpreter
    };
    if interpreter.first().is_none_or(|program| program.is_empty()) {
      return Err(ConfigError::EmptyInterpreter);
    }

    let working_directory = match self.working_directory {
      Some(dir) if dir.is_absolute() => dir,
      Some(dir) => return Err(ConfigError::RelativeWorkingDirectory(dir)),
      None => std::env::current_dir().map_err(ConfigError::CurrentDir)?,
    };

    if self.buffer_size == 0 {
      return Err(ConfigError::InvalidBufferSize);
    }

    for (name, command) in [
      ("create_command", &self.create_command),
      ("read_command", &self.read_command),
      ("delete_command", &self.delete_command),
    ] {
      if command.is_empty() {
        return Err(ConfigError::MissingCommand(name));
      }
    }

    let composer = Composer::new(self.command_prefix, &self.command_joiner, &self.command_isolator)?;

    let update_command = non_empty(self.update_command);
    let update_strategy = resolve_update_strategy(
      update_command.is_some(),
      self.delete_before_update,
      self.create_before_update,
      self.create_after_update,
    )?;

    let config = Config {
      interpreter,
      working_directory,
      include_parent_environment: self.include_parent_environment,
      environment: self.environment,
      buffer_size: self.buffer_size,
      composer,
      create_command: self.create_command,
      read_command: self.read_command,
      delete_command: self.delete_command,
      update_command,
      exists_command: non_empty(self.exists_command),
      exists_expected_status: self.exists_expected_status,
      read_format: self.read_format,
      read_line_prefix: non_empty(self.read_line_prefix),
      delete_on_read_failure: self.delete_on_read_failure,
      update_strategy,
      update_execution: self.update_execution,
      command_log: CommandLog {
        level: self.command_log_level,
        width: self.command_log_width,
        provider_name: self.log_provider_name,
      },
      log_level: self.log_level,
      kill_grace_period: Duration::from_secs(self.kill_grace_period_secs),
    };

    debug!(
      interpreter = ?config.interpreter,
      working_directory = %config.working_directory.display(),
      strategy = ?config.update_strategy,
      "resolved provider configuration"
    );

    Ok(config)
  }
}

/// The interpreter used when none is configured.
pub fn default_interpreter() -> Vec<String> {
  #[cfg(windows)]
  {
    vec!["cmd".to_string(), "/C".to_string()]
  }

  #[cfg(not(windows))]
  {
    vec!["/bin/sh".to_string(), "-c".to_string()]
  }
}

fn non_empty(value: String) -> Option<String> {
  if value.is_empty() { None } else { Some(value) }
}

/// Fold the three update flags into a strategy.
///
/// Without an update command the flags are ignored and the resource is
/// replaced.
fn resolve_update_strategy(
  has_update: bool,
  delete_before_update: bool,
  create_before_update: bool,
  create_after_update: bool,
) -> Result<UpdateStrategy, ConfigError> {
  if create_before_update && create_after_update {
    return Err(ConfigError::ConflictingUpdateFlags);
  }

  if !has_update {
    return Ok(UpdateStrategy::Replace);
  }

  let create = if create_before_update {
    CreatePlacement::BeforeUpdate
  } else if create_after_update {
    CreatePlacement::AfterUpdate
  } else {
    CreatePlacement::Never
  };

  Ok(UpdateStrategy::InPlace {
    delete_first: delete_before_update,
    create,
  })
}
