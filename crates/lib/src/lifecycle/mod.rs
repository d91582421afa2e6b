//! Lifecycle sequencing.
//!
//! [`Lifecycle`] decides which commands run, in what order, for each
//! operation, and interprets their exit codes and output. It is stateless:
//! [`ScriptResource`] layers the Absent/Present state machine on top.
//!
//! The four resource kinds share one sequencer. A kind only narrows which
//! optional commands are used:
//! - without update capability, update is always delete then create
//! - without exists capability, exists is answered by a read

mod resource;
mod types;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Config, CreatePlacement, ResourceKind, UpdateExecution, UpdateStrategy};
use crate::execute::{ExecutionResult, Runner};
use crate::read::ReadParser;
use crate::state::ResourceState;

pub use resource::ScriptResource;
pub use types::{LifecycleError, Operation};

/// Lines of stderr carried in a [`LifecycleError::Command`].
const STDERR_TAIL_LINES: usize = 10;

/// Outcome of running the read command.
enum Observed {
  Present(String),
  Missing { code: Option<i32>, reason: String, stderr_tail: String },
}

/// Runs lifecycle operations for one provider configuration.
#[derive(Debug, Clone)]
pub struct Lifecycle {
  config: Arc<Config>,
  kind: ResourceKind,
  runner: Runner,
  parser: ReadParser,
}

impl Lifecycle {
  pub fn new(config: Arc<Config>, kind: ResourceKind) -> Self {
    let runner = Runner::new(Arc::clone(&config));
    let parser = ReadParser::from_config(&config);
    Self {
      config,
      kind,
      runner,
      parser,
    }
  }

  pub fn kind(&self) -> ResourceKind {
    self.kind
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  /// Run the create command.
  pub async fn create(&self, cancel: &CancellationToken) -> Result<(), LifecycleError> {
    info!(kind = %self.kind, "creating resource");
    self
      .run_checked(Operation::Create, Operation::Create, &self.config.create_command, cancel)
      .await?;
    info!(kind = %self.kind, "resource created");
    Ok(())
  }

  /// Run the read command and parse its output.
  ///
  /// A failing or empty read means the resource is gone. With
  /// `delete_on_read_failure` that is reported as `Absent`, otherwise as
  /// [`LifecycleError::Command`]. Undecodable output is always an error.
  pub async fn read(&self, cancel: &CancellationToken) -> Result<ResourceState, LifecycleError> {
    match self.observe(cancel).await? {
      Observed::Present(payload) => Ok(ResourceState::Present(payload)),
      Observed::Missing { .. } if self.config.delete_on_read_failure => {
        warn!(kind = %self.kind, "read did not find the resource; treating it as absent");
        Ok(ResourceState::Absent)
      }
      Observed::Missing {
        code,
        reason,
        stderr_tail,
      } => Err(LifecycleError::Command {
        operation: Operation::Read,
        step: Operation::Read,
        code,
        reason,
        stderr_tail,
      }),
    }
  }

  /// Bring the resource in line with its configuration.
  ///
  /// Partial application is not rolled back: if a later step fails, earlier
  /// steps have already taken effect.
  pub async fn update(&self, cancel: &CancellationToken) -> Result<(), LifecycleError> {
    let steps = self.update_steps();
    info!(
      kind = %self.kind,
      steps = ?steps.iter().map(|(step, _)| step.as_str()).collect::<Vec<_>>(),
      execution = ?self.config.update_execution,
      "updating resource"
    );

    match self.config.update_execution {
      UpdateExecution::Sequential => {
        for (step, command) in steps {
          debug!(step = step.as_str(), "running update step");
          self.run_checked(Operation::Update, step, command, cancel).await?;
        }
      }
      UpdateExecution::Joined => {
        let commands: Vec<&str> = steps.iter().map(|(_, command)| *command).collect();
        let script = self.config.composer.compose(&commands);
        let result = self.runner.run(Operation::Update, &script, cancel).await?;
        ensure_success(Operation::Update, Operation::Update, &result)?;
      }
    }

    info!(kind = %self.kind, "resource updated");
    Ok(())
  }

  /// Run the delete command.
  pub async fn delete(&self, cancel: &CancellationToken) -> Result<(), LifecycleError> {
    info!(kind = %self.kind, "deleting resource");
    self
      .run_checked(Operation::Delete, Operation::Delete, &self.config.delete_command, cancel)
      .await?;
    info!(kind = %self.kind, "resource deleted");
    Ok(())
  }

  /// Check whether the resource exists.
  ///
  /// Present iff the exists command exits with `exists_expected_status`. Any
  /// other exit, including one caused by the command itself being broken,
  /// means absent; only failing to run the command at all is an error.
  pub async fn exists(&self, cancel: &CancellationToken) -> Result<bool, LifecycleError> {
    let command = match &self.config.exists_command {
      Some(command) if self.kind.has_exists() => command,
      _ => {
        debug!(kind = %self.kind, "no exists command; checking with read");
        return Ok(matches!(self.observe(cancel).await?, Observed::Present(_)));
      }
    };

    let result = self.run_step(Operation::Exists, command, cancel).await?;
    let present = result.exit_code == Some(self.config.exists_expected_status);
    debug!(
      kind = %self.kind,
      exit_code = ?result.exit_code,
      expected = self.config.exists_expected_status,
      present,
      "exists check finished"
    );
    Ok(present)
  }

  async fn observe(&self, cancel: &CancellationToken) -> Result<Observed, LifecycleError> {
    let result = self.run_step(Operation::Read, &self.config.read_command, cancel).await?;

    if !result.success() {
      return Ok(Observed::Missing {
        code: result.exit_code,
        reason: exit_reason(result.exit_code),
        stderr_tail: result.stderr_tail(STDERR_TAIL_LINES),
      });
    }

    match self.parser.parse(&result.stdout.bytes)? {
      ResourceState::Present(payload) => Ok(Observed::Present(payload)),
      ResourceState::Absent => Ok(Observed::Missing {
        code: result.exit_code,
        reason: "produced no output".to_string(),
        stderr_tail: result.stderr_tail(STDERR_TAIL_LINES),
      }),
    }
  }

  /// The commands an update runs, in order.
  pub fn update_order(&self) -> Vec<Operation> {
    self.update_steps().into_iter().map(|(step, _)| step).collect()
  }

  /// The (step, command) pairs an update runs, in order.
  fn update_steps(&self) -> Vec<(Operation, &str)> {
    let config = &*self.config;
    let update = if self.kind.has_update() {
      config.update_command.as_deref()
    } else {
      None
    };
    let strategy = match update {
      Some(_) => config.update_strategy,
      None => UpdateStrategy::Replace,
    };

    let delete = (Operation::Delete, config.delete_command.as_str());
    let create = (Operation::Create, config.create_command.as_str());

    match strategy {
      UpdateStrategy::Replace => vec![delete, create],
      UpdateStrategy::InPlace {
        delete_first,
        create: placement,
      } => {
        let mut steps = Vec::with_capacity(3);
        if delete_first {
          steps.push(delete);
        }
        if placement == CreatePlacement::BeforeUpdate {
          steps.push(create);
        }
        steps.extend(update.map(|command| (Operation::Update, command)));
        if placement == CreatePlacement::AfterUpdate {
          steps.push(create);
        }
        steps
      }
    }
  }

  async fn run_step(
    &self,
    operation: Operation,
    command: &str,
    cancel: &CancellationToken,
  ) -> Result<ExecutionResult, LifecycleError> {
    let script = self.config.composer.compose(&[command]);
    Ok(self.runner.run(operation, &script, cancel).await?)
  }

  async fn run_checked(
    &self,
    operation: Operation,
    step: Operation,
    command: &str,
    cancel: &CancellationToken,
  ) -> Result<ExecutionResult, LifecycleError> {
    let result = self.run_step(operation, command, cancel).await?;
    ensure_success(operation, step, &result)?;
    Ok(result)
  }
}

fn ensure_success(operation: Operation, step: Operation, result: &ExecutionResult) -> Result<(), LifecycleError> {
  if result.success() {
    return Ok(());
  }
  Err(LifecycleError::Command {
    operation,
    step,
    code: result.exit_code,
    reason: exit_reason(result.exit_code),
    stderr_tail: result.stderr_tail(STDERR_TAIL_LINES),
  })
}

fn exit_reason(code: Option<i32>) -> String {
  match code {
    Some(code) => format!("exited with status {}", code),
    None => "was terminated by a signal".to_string(),
  }
}
