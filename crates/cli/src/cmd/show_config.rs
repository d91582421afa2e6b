//! Implementation of the `scriptres show-config` command.

use std::sync::Arc;

use anyhow::{Context, Result};

use scriptres_lib::config::{ProviderSettings, ResourceKind};
use scriptres_lib::lifecycle::Lifecycle;

use crate::output::{print_json, print_stat, print_success, symbols};

/// Resolve the settings and print what the lifecycle will do with them.
pub fn cmd_show_config(settings: ProviderSettings, kind: Option<ResourceKind>, json: bool) -> Result<()> {
  let config = Arc::new(settings.resolve().context("Invalid provider settings")?);
  let kind = kind.unwrap_or_else(|| ResourceKind::infer(&config));
  let lifecycle = Lifecycle::new(config, kind);
  let config = lifecycle.config();

  let update_order: Vec<&str> = lifecycle.update_order().iter().map(|step| step.as_str()).collect();
  let exists_check = match &config.exists_command {
    Some(_) if kind.has_exists() => format!("exists command, expecting status {}", config.exists_expected_status),
    _ => "read command".to_string(),
  };

  if json {
    let output = serde_json::json!({
      "kind": kind.type_name(),
      "interpreter": config.interpreter,
      "working_directory": config.working_directory,
      "include_parent_environment": config.include_parent_environment,
      "environment": config.environment.keys().collect::<Vec<_>>(),
      "buffer_size": config.buffer_size,
      "read_format": config.read_format,
      "read_line_prefix": config.read_line_prefix,
      "delete_on_read_failure": config.delete_on_read_failure,
      "update_order": update_order,
      "update_execution": config.update_execution,
      "exists_check": exists_check,
      "log_level": config.log_level,
      "command_log_level": config.command_log.level,
      "kill_grace_period_secs": config.kill_grace_period.as_secs(),
    });
    return print_json(&output);
  }

  print_success(&format!("Resource kind: {}", kind));
  print_stat("Interpreter", &config.interpreter.join(" "));
  print_stat("Working directory", &config.working_directory.display().to_string());
  print_stat(
    "Parent environment",
    if config.include_parent_environment { "included" } else { "excluded" },
  );
  if !config.environment.is_empty() {
    let names: Vec<&str> = config.environment.keys().map(String::as_str).collect();
    print_stat("Environment", &names.join(", "));
  }
  print_stat("Buffer size", &format!("{} bytes", config.buffer_size));
  print_stat("Read format", &format!("{:?}", config.read_format).to_lowercase());
  if let Some(prefix) = &config.read_line_prefix {
    print_stat("Read line prefix", &format!("{:?}", prefix));
  }
  print_stat("Update order", &update_order.join(&format!(" {} ", symbols::ARROW)));
  print_stat("Update execution", &format!("{:?}", config.update_execution).to_lowercase());
  print_stat("Exists check", &exists_check);
  print_stat("Log level", &config.log_level.to_string());

  Ok(())
}
