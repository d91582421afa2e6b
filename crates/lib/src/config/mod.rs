//! Provider configuration.
//!
//! Settings are loaded in their user-facing form ([`ProviderSettings`]) and
//! resolved once into an immutable [`Config`]. Everything downstream only
//! reads the resolved form.

mod settings;
mod types;

pub use settings::{
  DEFAULT_BUFFER_SIZE, DEFAULT_COMMAND_ISOLATOR, DEFAULT_COMMAND_JOINER, DEFAULT_KILL_GRACE_PERIOD_SECS,
  ProviderSettings, default_interpreter,
};
pub use types::{
  CommandLog, Config, ConfigError, CreatePlacement, LogLevel, ReadFormat, ResourceKind, UpdateExecution,
  UpdateStrategy,
};
