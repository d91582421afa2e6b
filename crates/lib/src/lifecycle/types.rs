//! Types for lifecycle sequencing.

use std::fmt;

use thiserror::Error;

use crate::execute::ExecuteError;
use crate::read::DecodeError;

/// A lifecycle operation, or one step of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
  Create,
  Read,
  Update,
  Delete,
  Exists,
}

impl Operation {
  pub fn as_str(self) -> &'static str {
    match self {
      Operation::Create => "create",
      Operation::Read => "read",
      Operation::Update => "update",
      Operation::Delete => "delete",
      Operation::Exists => "exists",
    }
  }
}

impl fmt::Display for Operation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Errors returned by lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
  /// The command could not run to completion (spawn, environment, cancellation).
  #[error(transparent)]
  Execute(#[from] ExecuteError),

  /// A lifecycle command ran and reported failure.
  #[error("{operation} failed: {step} command {reason}{}", stderr_suffix(.stderr_tail))]
  Command {
    operation: Operation,
    /// The command that failed; differs from `operation` during update.
    step: Operation,
    /// Exit code, `None` if killed by a signal.
    code: Option<i32>,
    reason: String,
    /// Last lines of the command's stderr.
    stderr_tail: String,
  },

  /// Read output could not be decoded.
  #[error("read failed: {0}")]
  Decode(#[from] DecodeError),

  /// The command succeeded but the read that followed did not find the
  /// resource. It is still recorded as present so it can be deleted.
  #[error("{operation} succeeded but the resource could not be read back; it is kept as present")]
  NotFoundAfter { operation: Operation },

  /// The operation is not valid for the resource's current state.
  #[error("cannot {operation} a resource that is {state}")]
  InvalidState { operation: Operation, state: &'static str },
}

impl LifecycleError {
  /// The operation was cancelled by the caller.
  pub fn is_cancelled(&self) -> bool {
    matches!(self, LifecycleError::Execute(ExecuteError::Cancelled { .. }))
  }
}

fn stderr_suffix(tail: &str) -> String {
  if tail.is_empty() {
    String::new()
  } else {
    format!("\nstderr:\n{}", tail)
  }
}
