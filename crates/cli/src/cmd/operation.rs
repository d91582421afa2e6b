//! Lifecycle operation commands.
//!
//! `create`, `read`, `update`, `delete` and `exists` all follow the same
//! shape: resolve the settings, load the recorded state, run one operation on
//! a [`ScriptResource`], save the state and report.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use scriptres_lib::config::{ProviderSettings, ResourceKind};
use scriptres_lib::lifecycle::{Lifecycle, LifecycleError, Operation, ScriptResource};
use scriptres_lib::state::{load_state, save_state};

use crate::output::{format_duration, print_info, print_json, print_state, print_success, print_warning};

/// Execute one lifecycle operation.
///
/// State is saved even when the operation fails: a create whose follow-up
/// read failed still leaves a resource behind that must be recorded.
pub fn cmd_operation(
  operation: Operation,
  settings: ProviderSettings,
  state_path: &Path,
  kind: Option<ResourceKind>,
  json: bool,
) -> Result<()> {
  let config = Arc::new(settings.resolve().context("Invalid provider settings")?);
  let kind = kind.unwrap_or_else(|| ResourceKind::infer(&config));
  let state = load_state(state_path).context("Failed to load resource state")?;
  let mut resource = ScriptResource::with_state(Lifecycle::new(config, kind), state);

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let started = Instant::now();
  let outcome = rt.block_on(async {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        warn!("interrupted; cancelling running command");
        trigger.cancel();
      }
    });

    run(&mut resource, operation, &cancel).await
  });
  let elapsed = started.elapsed();
  let kind = resource.lifecycle().kind();

  save_state(state_path, resource.state()).context("Failed to save resource state")?;

  let exists = match outcome {
    Ok(exists) => exists,
    Err(e) => {
      if e.is_cancelled() {
        print_warning("Operation cancelled; the command was terminated");
      }
      return Err(e).with_context(|| format!("{} {}", kind, operation));
    }
  };

  if json {
    let output = serde_json::json!({
      "kind": kind.type_name(),
      "operation": operation.as_str(),
      "state": resource.state(),
      "exists": exists,
    });
    return print_json(&output);
  }

  let took = format_duration(elapsed);
  match operation {
    Operation::Create => print_success(&format!("Created {} in {}", kind, took)),
    Operation::Update => print_success(&format!("Updated {} in {}", kind, took)),
    Operation::Delete => print_success(&format!("Deleted {} in {}", kind, took)),
    Operation::Read => print_info(&format!("Read {} in {}", kind, took)),
    Operation::Exists => {
      let verdict = if exists == Some(true) { "exists" } else { "does not exist" };
      print_info(&format!("{} {}", kind, verdict));
      return Ok(());
    }
  }
  print_state(resource.state());

  Ok(())
}

/// Run `operation`; only `exists` produces a value.
async fn run(
  resource: &mut ScriptResource,
  operation: Operation,
  cancel: &CancellationToken,
) -> Result<Option<bool>, LifecycleError> {
  match operation {
    Operation::Create => resource.create(cancel).await.map(|_| None),
    Operation::Read => resource.refresh(cancel).await.map(|_| None),
    Operation::Update => resource.update(cancel).await.map(|_| None),
    Operation::Delete => resource.delete(cancel).await.map(|_| None),
    Operation::Exists => resource.exists(cancel).await.map(Some),
  }
}
