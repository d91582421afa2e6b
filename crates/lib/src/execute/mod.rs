//! Command execution.
//!
//! [`Runner::run`] executes one composed command under the configured
//! interpreter:
//! - working directory and environment come from the [`Config`]
//! - stdout and stderr are drained concurrently into bounded buffers and
//!   logged line by line
//! - the caller's [`CancellationToken`] terminates the child
//!
//! On Unix the child leads its own process group, so termination reaches
//! anything the script started.

mod capture;
mod types;

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use crate::config::Config;
use crate::lifecycle::Operation;

pub use capture::{CapturedStream, StreamKind, TAIL_SIZE};
pub use types::{ExecuteError, ExecutionResult};

use capture::{LineLogger, drain};

/// Runs composed commands for one provider configuration.
#[derive(Debug, Clone)]
pub struct Runner {
  config: Arc<Config>,
  provider: Arc<str>,
}

impl Runner {
  pub fn new(config: Arc<Config>) -> Self {
    let provider = Arc::from(config.command_log.provider_name.as_str());
    Self { config, provider }
  }

  /// Run `command` and wait for it to exit.
  ///
  /// A non-zero exit is reported in the result, not as an error. Errors are
  /// reserved for commands that could not run to completion: spawn failure,
  /// unusable working directory, cancellation.
  pub async fn run(
    &self,
    operation: Operation,
    command: &str,
    cancel: &CancellationToken,
  ) -> Result<ExecutionResult, ExecuteError> {
    let config = &*self.config;

    if cancel.is_cancelled() {
      return Err(ExecuteError::Cancelled { operation });
    }

    check_working_directory(&config.working_directory)?;

    let (program, args) = config.interpreter.split_first().ok_or_else(|| ExecuteError::Spawn {
      program: String::new(),
      source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty interpreter"),
    })?;

    info!(provider = %self.provider, operation = operation.as_str(), "running command");
    debug!(
      program = %program,
      args = ?args,
      working_dir = %config.working_directory.display(),
      command = %command,
      "spawning process"
    );

    let mut cmd = Command::new(program);
    cmd
      .args(args)
      .arg(command)
      .current_dir(&config.working_directory)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true);

    if !config.include_parent_environment {
      cmd.env_clear();
    }
    cmd.envs(&config.environment);

    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn().map_err(|source| ExecuteError::Spawn {
      program: program.clone(),
      source,
    })?;

    let stop = CancellationToken::new();
    let stdout = child.stdout.take().map(|pipe| self.spawn_reader(pipe, operation, StreamKind::Stdout, &stop));
    let stderr = child.stderr.take().map(|pipe| self.spawn_reader(pipe, operation, StreamKind::Stderr, &stop));

    let waited = tokio::select! {
      status = child.wait() => Some(status),
      _ = cancel.cancelled() => None,
    };

    let status = match waited {
      Some(status) => status,
      None => {
        warn!(provider = %self.provider, operation = operation.as_str(), "cancelling command");
        terminate(&mut child, config.kill_grace_period).await;
        stop.cancel();
        let _ = tokio::join!(join_reader(stdout), join_reader(stderr));
        return Err(ExecuteError::Cancelled { operation });
      }
    };

    let status = match status {
      Ok(status) => status,
      Err(e) => {
        stop.cancel();
        return Err(ExecuteError::Io(e));
      }
    };

    let (stdout, stderr) = collect(stdout, stderr, &stop, config.kill_grace_period).await?;

    if stdout.truncated || stderr.truncated {
      warn!(
        provider = %self.provider,
        operation = operation.as_str(),
        stdout_truncated = stdout.truncated,
        stderr_truncated = stderr.truncated,
        buffer_size = config.buffer_size,
        "command output exceeded buffer size and was truncated"
      );
    }

    let result = ExecutionResult {
      exit_code: status.code(),
      stdout,
      stderr,
    };

    debug!(
      provider = %self.provider,
      operation = operation.as_str(),
      exit_code = ?result.exit_code,
      stdout_len = result.stdout.bytes.len(),
      stderr_len = result.stderr.bytes.len(),
      "command finished"
    );

    Ok(result)
  }

  fn spawn_reader<R>(
    &self,
    pipe: R,
    operation: Operation,
    stream: StreamKind,
    stop: &CancellationToken,
  ) -> JoinHandle<std::io::Result<CapturedStream>>
  where
    R: AsyncRead + Unpin + Send + 'static,
  {
    let config = &self.config;
    let logger = LineLogger::new(
      &config.command_log,
      Arc::clone(&self.provider),
      operation,
      stream,
      config.buffer_size,
    );
    tokio::spawn(drain(pipe, logger, config.buffer_size, stop.clone()).instrument(tracing::Span::current()))
  }
}

fn check_working_directory(path: &Path) -> Result<(), ExecuteError> {
  match std::fs::metadata(path) {
    Ok(meta) if meta.is_dir() => Ok(()),
    Ok(_) => Err(ExecuteError::Environment {
      path: path.to_path_buf(),
      reason: "not a directory".to_string(),
    }),
    Err(e) => Err(ExecuteError::Environment {
      path: path.to_path_buf(),
      reason: e.to_string(),
    }),
  }
}

/// Wait for both reader tasks.
///
/// Readers normally finish when the child closes its pipes. A background
/// process that inherited them can keep them open forever, so after `grace`
/// the readers are told to stop and return what they have.
async fn collect(
  stdout: Option<JoinHandle<std::io::Result<CapturedStream>>>,
  stderr: Option<JoinHandle<std::io::Result<CapturedStream>>>,
  stop: &CancellationToken,
  grace: Duration,
) -> Result<(CapturedStream, CapturedStream), ExecuteError> {
  let mut joined = Box::pin(async { tokio::join!(join_reader(stdout), join_reader(stderr)) });

  let (stdout, stderr) = match tokio::time::timeout(grace, &mut joined).await {
    Ok(joined) => joined,
    Err(_) => {
      warn!("output pipes still open after the command exited; a background process may be holding them");
      stop.cancel();
      joined.await
    }
  };

  Ok((stdout?, stderr?))
}

async fn join_reader(
  handle: Option<JoinHandle<std::io::Result<CapturedStream>>>,
) -> Result<CapturedStream, ExecuteError> {
  let Some(handle) = handle else {
    return Ok(CapturedStream::default());
  };
  match handle.await {
    Ok(captured) => Ok(captured?),
    Err(e) => Err(ExecuteError::Io(std::io::Error::other(e))),
  }
}

/// Stop a cancelled child: SIGTERM to its process group, then SIGKILL once
/// `grace` has passed.
async fn terminate(child: &mut Child, grace: Duration) {
  #[cfg(unix)]
  if let Some(pid) = child.id() {
    signal_group(pid, nix::sys::signal::Signal::SIGTERM);
  }

  #[cfg(unix)]
  if let Ok(Ok(status)) = tokio::time::timeout(grace, child.wait()).await {
    debug!(status = %status, "cancelled command exited");
    return;
  }

  #[cfg(not(unix))]
  let _ = grace;

  #[cfg(unix)]
  if let Some(pid) = child.id() {
    signal_group(pid, nix::sys::signal::Signal::SIGKILL);
  }

  if let Err(e) = child.kill().await {
    warn!(error = %e, "failed to kill cancelled command");
  }
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: nix::sys::signal::Signal) {
  use nix::sys::signal::killpg;
  use nix::unistd::Pid;

  let Ok(raw) = i32::try_from(pid) else {
    return;
  };
  if let Err(e) = killpg(Pid::from_raw(raw), signal) {
    debug!(pid, signal = ?signal, error = %e, "failed to signal process group");
  }
}
