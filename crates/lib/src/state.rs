//! Observed resource state and its persistence.
//!
//! The lifecycle only computes a [`ResourceState`]; whoever drives it owns the
//! value. For callers that keep state between runs, the state can be written
//! to and read back from a JSON file.
//!
//! # Example State File
//!
//! ```json
//! {
//!   "status": "present",
//!   "payload": "id=42\n"
//! }
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

/// Whether the managed resource exists, and what its read command reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "payload", rename_all = "lowercase")]
pub enum ResourceState {
  #[default]
  Absent,
  /// Present with the decoded read output.
  Present(String),
}

impl ResourceState {
  pub fn is_present(&self) -> bool {
    matches!(self, ResourceState::Present(_))
  }

  /// The read payload, if present.
  pub fn payload(&self) -> Option<&str> {
    match self {
      ResourceState::Absent => None,
      ResourceState::Present(payload) => Some(payload),
    }
  }

  /// Short name used in logs and errors.
  pub fn label(&self) -> &'static str {
    match self {
      ResourceState::Absent => "absent",
      ResourceState::Present(_) => "present",
    }
  }
}

/// Errors that can occur when persisting resource state.
#[derive(Debug, Error)]
pub enum StateError {
  /// Failed to read the state file.
  #[error("failed to read resource state: {0}")]
  Read(#[source] io::Error),

  /// Failed to write the state file.
  #[error("failed to write resource state: {0}")]
  Write(#[source] io::Error),

  /// Failed to parse the state file.
  #[error("failed to parse resource state: {0}")]
  Parse(#[source] serde_json::Error),

  /// Failed to serialize the state.
  #[error("failed to serialize resource state: {0}")]
  Serialize(#[source] serde_json::Error),
}

/// Save resource state.
///
/// Writes to a temporary file next to `path` and renames it into place, so a
/// crash never leaves a half-written state file.
pub fn save_state(path: &Path, state: &ResourceState) -> Result<(), StateError> {
  info!(path = %path.display(), status = state.label(), "saving resource state");

  let dir = match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent,
    _ => Path::new("."),
  };
  fs::create_dir_all(dir).map_err(StateError::Write)?;

  let content = serde_json::to_string_pretty(state).map_err(StateError::Serialize)?;

  let mut temp = NamedTempFile::new_in(dir).map_err(StateError::Write)?;
  temp.write_all(content.as_bytes()).map_err(StateError::Write)?;
  temp.persist(path).map_err(|e| StateError::Write(e.error))?;

  debug!(path = %path.display(), "resource state saved");
  Ok(())
}

/// Load resource state.
///
/// A missing file means the resource was never created: `Absent`.
pub fn load_state(path: &Path) -> Result<ResourceState, StateError> {
  let content = match fs::read_to_string(path) {
    Ok(content) => content,
    Err(e) if e.kind() == io::ErrorKind::NotFound => {
      debug!(path = %path.display(), "resource state file not found");
      return Ok(ResourceState::Absent);
    }
    Err(e) => return Err(StateError::Read(e)),
  };

  let state: ResourceState = serde_json::from_str(&content).map_err(StateError::Parse)?;
  info!(path = %path.display(), status = state.label(), "resource state loaded");
  Ok(state)
}
