//! Types for command execution.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::capture::CapturedStream;
use crate::lifecycle::Operation;

/// Errors that prevent a command from running to completion.
///
/// A command that runs and exits non-zero is not an error at this level; see
/// [`ExecutionResult::success`].
#[derive(Debug, Error)]
pub enum ExecuteError {
  /// The interpreter could not be started.
  #[error("failed to spawn interpreter {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },

  /// The working directory is missing or not a directory.
  #[error("working directory {path} is unusable: {reason}")]
  Environment { path: PathBuf, reason: String },

  /// The caller cancelled the operation; the child has been terminated.
  #[error("{operation} cancelled")]
  Cancelled { operation: Operation },

  /// I/O error while waiting on the child or its output.
  #[error("io error: {0}")]
  Io(#[from] io::Error),
}

/// Outcome of one command invocation.
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
  /// Exit code, `None` if the child was killed by a signal.
  pub exit_code: Option<i32>,
  pub stdout: CapturedStream,
  pub stderr: CapturedStream,
}

impl ExecutionResult {
  /// The command exited with status 0.
  pub fn success(&self) -> bool {
    self.exit_code == Some(0)
  }

  /// The last `lines` lines of stderr, for error reports.
  ///
  /// Taken from the rolling tail, so the end of the output is reported even
  /// when the capture was truncated.
  pub fn stderr_tail(&self, lines: usize) -> String {
    let text = String::from_utf8_lossy(&self.stderr.tail);
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn with_stderr(stderr: &str) -> ExecutionResult {
    ExecutionResult {
      exit_code: Some(1),
      stderr: CapturedStream {
        bytes: stderr.as_bytes().to_vec(),
        truncated: false,
        tail: stderr.as_bytes().to_vec(),
      },
      ..Default::default()
    }
  }

  #[test]
  fn success_only_for_zero() {
    assert!(ExecutionResult { exit_code: Some(0), ..Default::default() }.success());
    assert!(!ExecutionResult { exit_code: Some(3), ..Default::default() }.success());
    assert!(!ExecutionResult { exit_code: None, ..Default::default() }.success());
  }

  #[test]
  fn stderr_tail_keeps_last_lines() {
    let result = with_stderr("one\ntwo\nthree\nfour\n");
    assert_eq!(result.stderr_tail(2), "three\nfour");
  }

  #[test]
  fn stderr_tail_reads_past_truncated_capture() {
    let result = ExecutionResult {
      exit_code: Some(2),
      stderr: CapturedStream {
        bytes: b"noise\nnoi".to_vec(),
        truncated: true,
        tail: b"noise\nREAL ERROR: quota\n".to_vec(),
      },
      ..Default::default()
    };

    assert_eq!(result.stderr_tail(1), "REAL ERROR: quota");
  }

  #[test]
  fn stderr_tail_short_output() {
    let result = with_stderr("only");
    assert_eq!(result.stderr_tail(5), "only");
    assert_eq!(with_stderr("").stderr_tail(5), "");
  }
}
