//! Types for resolved provider configuration.
//!
//! A [`Config`] is produced once from [`ProviderSettings`](super::ProviderSettings)
//! and then shared read-only by every resource lifecycle built from it.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compose::Composer;

/// Errors raised while loading or resolving provider settings.
///
/// All of these are reported before any command is spawned.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// The interpreter argv is empty or starts with an empty program name.
  #[error("interpreter must name a program")]
  EmptyInterpreter,

  /// Working directory was given as a relative path.
  #[error("working directory must be absolute: {0}")]
  RelativeWorkingDirectory(PathBuf),

  /// Working directory was omitted and the current directory is unavailable.
  #[error("failed to determine current directory: {0}")]
  CurrentDir(#[source] io::Error),

  /// Output buffers must hold at least one byte.
  #[error("buffer_size must be positive")]
  InvalidBufferSize,

  /// A required lifecycle command was left empty.
  #[error("{0} is required")]
  MissingCommand(&'static str),

  /// `create_before_update` and `create_after_update` were both set.
  #[error("create_before_update conflicts with create_after_update")]
  ConflictingUpdateFlags,

  /// A joiner or isolator template has the wrong number of `%s` placeholders.
  #[error("{name} must contain exactly {expected} %s placeholder(s), found {found}")]
  Template {
    name: &'static str,
    expected: usize,
    found: usize,
  },

  /// Unknown log level name.
  #[error("invalid log level {0:?}: expected one of TRACE, DEBUG, INFO, WARN, ERROR")]
  InvalidLogLevel(String),

  /// Unknown resource kind name.
  #[error("invalid resource kind {0:?}: expected one of crd, crde, crud, crude")]
  InvalidResourceKind(String),

  /// Failed to read a settings file.
  #[error("failed to read settings file: {0}")]
  Read(#[source] io::Error),

  /// Failed to parse a settings file.
  #[error("failed to parse settings file: {0}")]
  Parse(#[source] serde_json::Error),
}

/// Encoding of the read command's output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadFormat {
  /// Output is the payload itself.
  #[default]
  Raw,
  /// Output is the standard base64 encoding of the payload.
  Base64,
}

/// Severity used for host logging and for captured command output.
///
/// Parsed case-insensitively from the names `TRACE`, `DEBUG`, `INFO`, `WARN`
/// and `ERROR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LogLevel {
  Trace,
  Debug,
  Info,
  Warn,
  Error,
}

impl LogLevel {
  /// Lower-case form, usable as an `EnvFilter` directive.
  pub fn as_directive(self) -> &'static str {
    match self {
      LogLevel::Trace => "trace",
      LogLevel::Debug => "debug",
      LogLevel::Info => "info",
      LogLevel::Warn => "warn",
      LogLevel::Error => "error",
    }
  }
}

impl FromStr for LogLevel {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_uppercase().as_str() {
      "TRACE" => Ok(LogLevel::Trace),
      "DEBUG" => Ok(LogLevel::Debug),
      "INFO" => Ok(LogLevel::Info),
      "WARN" => Ok(LogLevel::Warn),
      "ERROR" => Ok(LogLevel::Error),
      _ => Err(ConfigError::InvalidLogLevel(s.to_string())),
    }
  }
}

impl TryFrom<String> for LogLevel {
  type Error = ConfigError;

  fn try_from(value: String) -> Result<Self, ConfigError> {
    value.parse()
  }
}

impl From<LogLevel> for String {
  fn from(level: LogLevel) -> Self {
    level.to_string()
  }
}

impl fmt::Display for LogLevel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.as_directive().to_ascii_uppercase())
  }
}

/// Where the create command runs relative to the update command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatePlacement {
  Never,
  BeforeUpdate,
  AfterUpdate,
}

/// How an update is carried out.
///
/// Resolved once from the `*_before_update` / `*_after_update` flags, so an
/// illegal combination cannot reach the sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStrategy {
  /// No update command: delete, then create.
  Replace,
  /// Run the update command, optionally surrounded by delete and create.
  InPlace {
    delete_first: bool,
    create: CreatePlacement,
  },
}

/// Whether update steps run as separate processes or as one joined script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateExecution {
  /// Each step is its own process; a failing step stops the sequence.
  #[default]
  Sequential,
  /// All steps are joined and isolated into a single script.
  Joined,
}

/// The four registered resource variants.
///
/// Each variant only differs in which optional commands it is allowed to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
  /// create, read, delete
  Crd,
  /// create, read, delete, exists
  Crde,
  /// create, read, update, delete
  Crud,
  /// create, read, update, delete, exists
  Crude,
}

impl ResourceKind {
  pub fn has_update(self) -> bool {
    matches!(self, ResourceKind::Crud | ResourceKind::Crude)
  }

  pub fn has_exists(self) -> bool {
    matches!(self, ResourceKind::Crde | ResourceKind::Crude)
  }

  /// The richest kind the configured commands can support.
  pub fn infer(config: &Config) -> Self {
    match (config.update_command.is_some(), config.exists_command.is_some()) {
      (false, false) => ResourceKind::Crd,
      (false, true) => ResourceKind::Crde,
      (true, false) => ResourceKind::Crud,
      (true, true) => ResourceKind::Crude,
    }
  }

  /// Registered resource type name.
  pub fn type_name(self) -> &'static str {
    match self {
      ResourceKind::Crd => "script_crd",
      ResourceKind::Crde => "script_crde",
      ResourceKind::Crud => "script_crud",
      ResourceKind::Crude => "script_crude",
    }
  }
}

impl FromStr for ResourceKind {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let name = s.strip_prefix("script_").unwrap_or(s);
    match name.to_ascii_lowercase().as_str() {
      "crd" => Ok(ResourceKind::Crd),
      "crde" => Ok(ResourceKind::Crde),
      "crud" => Ok(ResourceKind::Crud),
      "crude" => Ok(ResourceKind::Crude),
      _ => Err(ConfigError::InvalidResourceKind(s.to_string())),
    }
  }
}

impl fmt::Display for ResourceKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.type_name())
  }
}

/// Presentation of captured command output in the log.
#[derive(Debug, Clone)]
pub struct CommandLog {
  /// Level every captured line is logged at.
  pub level: LogLevel,
  /// Minimum width each logged line is padded to.
  pub width: usize,
  /// Provider name attached to every record.
  pub provider_name: String,
}

/// Fully resolved provider configuration.
#[derive(Debug, Clone)]
pub struct Config {
  /// argv prefix every composed command is appended to. Never empty.
  pub interpreter: Vec<String>,
  /// Absolute directory commands run in.
  pub working_directory: PathBuf,
  /// Start from the parent's environment instead of an empty one.
  pub include_parent_environment: bool,
  /// Variables set on top of the (possibly empty) base environment.
  pub environment: BTreeMap<String, String>,
  /// Maximum bytes retained per output stream.
  pub buffer_size: usize,
  pub composer: Composer,

  pub create_command: String,
  pub read_command: String,
  pub delete_command: String,
  pub update_command: Option<String>,
  pub exists_command: Option<String>,
  pub exists_expected_status: i32,

  pub read_format: ReadFormat,
  pub read_line_prefix: Option<String>,
  pub delete_on_read_failure: bool,

  pub update_strategy: UpdateStrategy,
  pub update_execution: UpdateExecution,

  pub command_log: CommandLog,
  /// Host logger verbosity; not used by the library itself.
  pub log_level: LogLevel,
  /// Time a cancelled command gets to exit after SIGTERM before it is killed.
  pub kill_grace_period: Duration,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn log_level_parses_case_insensitively() {
    assert_eq!("warn".parse::<LogLevel>().unwrap(), LogLevel::Warn);
    assert_eq!("Info".parse::<LogLevel>().unwrap(), LogLevel::Info);
    assert_eq!("TRACE".parse::<LogLevel>().unwrap(), LogLevel::Trace);
    assert!(matches!(
      "verbose".parse::<LogLevel>(),
      Err(ConfigError::InvalidLogLevel(name)) if name == "verbose"
    ));
  }

  #[test]
  fn log_level_try_from_string() {
    assert_eq!(LogLevel::try_from("warn".to_string()).unwrap(), LogLevel::Warn);
    assert!(matches!(
      LogLevel::try_from("loud".to_string()),
      Err(ConfigError::InvalidLogLevel(_))
    ));
    assert_eq!(String::from(LogLevel::Error), "ERROR");
  }

  #[test]
  fn log_level_display_and_directive() {
    assert_eq!(LogLevel::Debug.to_string(), "DEBUG");
    assert_eq!(LogLevel::Debug.as_directive(), "debug");
  }

  #[test]
  fn log_level_serde_uses_names() {
    let level: LogLevel = serde_json::from_str("\"error\"").unwrap();
    assert_eq!(level, LogLevel::Error);
    assert_eq!(serde_json::to_string(&LogLevel::Info).unwrap(), "\"INFO\"");
    assert!(serde_json::from_str::<LogLevel>("\"loud\"").is_err());
  }

  #[test]
  fn resource_kind_capabilities() {
    assert!(!ResourceKind::Crd.has_update());
    assert!(!ResourceKind::Crd.has_exists());
    assert!(ResourceKind::Crde.has_exists());
    assert!(!ResourceKind::Crde.has_update());
    assert!(ResourceKind::Crud.has_update());
    assert!(!ResourceKind::Crud.has_exists());
    assert!(ResourceKind::Crude.has_update());
    assert!(ResourceKind::Crude.has_exists());
  }

  #[test]
  fn resource_kind_accepts_type_names() {
    assert_eq!("script_crude".parse::<ResourceKind>().unwrap(), ResourceKind::Crude);
    assert_eq!("CRD".parse::<ResourceKind>().unwrap(), ResourceKind::Crd);
    assert_eq!(ResourceKind::Crde.to_string(), "script_crde");
    assert!("crux".parse::<ResourceKind>().is_err());
  }

  #[test]
  fn read_format_serde() {
    let format: ReadFormat = serde_json::from_str("\"base64\"").unwrap();
    assert_eq!(format, ReadFormat::Base64);
    assert!(serde_json::from_str::<ReadFormat>("\"hex\"").is_err());
  }
}
