//! Production [`ControllerClient`](super::ControllerClient) backed by the
//! `juju` CLI, invoked through `tokio::process::Command` — the async
//! generalization of the `CommandRunner`/`SystemCommandRunner` idiom used
//! elsewhere in this crate for shelling out.
//!
//! The Juju controller wire protocol itself is out of scope; every method
//! here shells out to `juju` and parses its `--format=json` output, which is
//! the narrowest surface that satisfies [`ControllerClient`](super::ControllerClient)
//! without embedding a full API client.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use super::{ActionResult, ApplicationStatus, CommandResult, ControllerClient, MachineStatus, ModelStatus, UnitStatus};
use crate::errors::CouError;

/// Juju-CLI-backed controller client, scoped to one model.
pub struct JujuControllerClient {
    model: Option<String>,
}

impl JujuControllerClient {
    /// What: Build a client talking to `model` (`None` uses `juju`'s
    /// currently active model).
    #[must_use]
    pub const fn new(model: Option<String>) -> Self {
        Self { model }
    }

    fn model_args(&self) -> Vec<String> {
        self.model.as_ref().map_or_else(Vec::new, |m| vec!["-m".to_string(), m.clone()])
    }

    async fn run_juju(&self, args: &[String]) -> Result<CommandResult, CouError> {
        let mut full_args = self.model_args();
        full_args.extend(args.iter().cloned());
        let output = tokio::process::Command::new("juju").args(&full_args).output().await?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let code = output.status.code();
        if !output.status.success() {
            return Err(CouError::CommandRunFailed { unit: String::new(), command: format!("juju {}", full_args.join(" ")), code });
        }
        Ok(CommandResult { stdout, stderr, code: code.unwrap_or(-1) })
    }

    async fn status_json(&self) -> Result<serde_json::Value, CouError> {
        let result = self.run_juju(&["status".to_string(), "--format=json".to_string()]).await?;
        serde_json::from_str(&result.stdout).map_err(|e| CouError::RunUpgradeError(format!("failed to parse juju status: {e}")))
    }
}

#[async_trait]
impl ControllerClient for JujuControllerClient {
    async fn get_status(&self) -> Result<ModelStatus, CouError> {
        let value = self.status_json().await?;
        let mut status = parse_model_status(&value);
        for (name, app) in &mut status.applications {
            if let Ok(config) = self.get_application_config(name).await {
                app.config = config;
            }
        }
        Ok(status)
    }

    async fn get_charm_name(&self, app: &str) -> Result<String, CouError> {
        let status = self.get_status().await?;
        status.applications.get(app).map(|a| a.charm.clone()).ok_or_else(|| CouError::ApplicationNotFound(app.to_string()))
    }

    async fn get_application_config(&self, app: &str) -> Result<HashMap<String, String>, CouError> {
        let result = self.run_juju(&["config".to_string(), app.to_string(), "--format=json".to_string()]).await?;
        let value: serde_json::Value =
            serde_json::from_str(&result.stdout).map_err(|e| CouError::RunUpgradeError(format!("failed to parse juju config: {e}")))?;
        let mut config = HashMap::new();
        if let Some(settings) = value.get("settings").and_then(serde_json::Value::as_object) {
            for (key, entry) in settings {
                if let Some(v) = entry.get("value") {
                    config.insert(key.clone(), value_to_string(v));
                }
            }
        }
        Ok(config)
    }

    async fn set_application_config(&self, app: &str, config: HashMap<String, String>) -> Result<(), CouError> {
        let mut args = vec!["config".to_string(), app.to_string()];
        args.extend(config.into_iter().map(|(k, v)| format!("{k}={v}")));
        self.run_juju(&args).await?;
        Ok(())
    }

    async fn upgrade_charm(&self, app: &str, channel: Option<&str>, revision: Option<i32>) -> Result<(), CouError> {
        let mut args = vec!["refresh".to_string(), app.to_string()];
        if let Some(channel) = channel {
            args.push("--channel".to_string());
            args.push(channel.to_string());
        }
        if let Some(revision) = revision {
            args.push("--revision".to_string());
            args.push(revision.to_string());
        }
        self.run_juju(&args).await?;
        Ok(())
    }

    async fn run_on_unit(&self, unit: &str, command: &str, timeout_secs: u64) -> Result<CommandResult, CouError> {
        let args = vec![
            "exec".to_string(),
            "--unit".to_string(),
            unit.to_string(),
            "--wait".to_string(),
            format!("{timeout_secs}s"),
            "--".to_string(),
            command.to_string(),
        ];
        self.run_juju(&args).await.map_err(|_| CouError::CommandRunFailed { unit: unit.to_string(), command: command.to_string(), code: None })
    }

    async fn run_action(&self, unit: &str, action: &str, params: HashMap<String, String>) -> Result<ActionResult, CouError> {
        let mut args = vec!["run-action".to_string(), unit.to_string(), action.to_string(), "--wait".to_string(), "--format=json".to_string()];
        args.extend(params.into_iter().map(|(k, v)| format!("{k}={v}")));
        let result = self.run_juju(&args).await?;
        let value: serde_json::Value = serde_json::from_str(&result.stdout).unwrap_or(serde_json::Value::Null);
        let entry = value.as_object().and_then(|m| m.values().next());
        let status = entry.and_then(|e| e.get("status")).and_then(serde_json::Value::as_str).unwrap_or("completed").to_string();
        let mut output = HashMap::new();
        if let Some(results) = entry.and_then(|e| e.get("results")).and_then(serde_json::Value::as_object) {
            for (k, v) in results {
                output.insert(k.clone(), value_to_string(v));
            }
        }
        if status != "completed" {
            let message = output.get("message").cloned().unwrap_or_default();
            return Err(CouError::ActionFailed { unit: unit.to_string(), action: action.to_string(), message });
        }
        Ok(ActionResult { status, output })
    }

    async fn wait_for_active_idle(&self, timeout_secs: u64, apps: Option<&[String]>, raise_on_blocked: bool, idle_period_secs: u64) -> Result<(), CouError> {
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(timeout_secs);
        let mut idle_since: Option<tokio::time::Instant> = None;
        loop {
            let status = self.get_status().await?;
            let relevant = status.applications.iter().filter(|(name, _)| apps.is_none_or(|a| a.iter().any(|n| n == *name)));

            let mut all_idle = true;
            for (name, app) in relevant {
                for unit in &app.units {
                    if raise_on_blocked && unit.workload_status == "blocked" {
                        return Err(CouError::ApplicationError {
                            app: name.clone(),
                            reason: format!("unit '{}' is blocked", unit.name),
                            remediation: None,
                        });
                    }
                    if unit.workload_status != "active" || unit.agent_status != "idle" {
                        all_idle = false;
                    }
                }
            }

            if all_idle {
                let since = *idle_since.get_or_insert_with(tokio::time::Instant::now);
                if since.elapsed() >= std::time::Duration::from_secs(idle_period_secs) {
                    return Ok(());
                }
            } else {
                idle_since = None;
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(CouError::TimeoutException { what: "model to reach active/idle".to_string(), seconds: timeout_secs });
            }
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        }
    }

    async fn scp_from_unit(&self, unit: &str, remote_path: &str, local_path: &Path) -> Result<(), CouError> {
        let args = vec!["scp".to_string(), format!("{unit}:{remote_path}"), local_path.display().to_string()];
        self.run_juju(&args).await?;
        Ok(())
    }
}

fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Best-effort parse of `juju status --format=json`'s relevant subset.
/// Application config is intentionally left empty here; `get_status`
/// fills it in with a separate `juju config` call per application, since
/// `status` itself never reports it.
fn parse_model_status(value: &serde_json::Value) -> ModelStatus {
    let mut applications = HashMap::new();
    if let Some(apps) = value.get("applications").and_then(serde_json::Value::as_object) {
        for (name, app) in apps {
            let charm = app.get("charm").and_then(serde_json::Value::as_str).unwrap_or_default().to_string();
            let charm_origin = if charm.starts_with("cs:") { "cs".to_string() } else { "ch".to_string() };
            let channel = app.get("charm-channel").and_then(serde_json::Value::as_str).unwrap_or_default().to_string();
            let workload_version = app.get("version").and_then(serde_json::Value::as_str).unwrap_or_default().to_string();
            let series = app.get("series").and_then(serde_json::Value::as_str).unwrap_or_default().to_string();
            let relations = app
                .get("relations")
                .and_then(serde_json::Value::as_object)
                .map(|rels| rels.keys().cloned().collect())
                .unwrap_or_default();

            let mut units = Vec::new();
            if let Some(unit_map) = app.get("units").and_then(serde_json::Value::as_object) {
                for (unit_name, unit) in unit_map {
                    units.push(UnitStatus {
                        name: unit_name.clone(),
                        machine: unit.get("machine").and_then(serde_json::Value::as_str).unwrap_or_default().to_string(),
                        workload_status: unit
                            .get("workload-status")
                            .and_then(|w| w.get("current"))
                            .and_then(serde_json::Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        workload_info: unit
                            .get("workload-status")
                            .and_then(|w| w.get("message"))
                            .and_then(serde_json::Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        agent_status: unit
                            .get("juju-status")
                            .and_then(|w| w.get("current"))
                            .and_then(serde_json::Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                    });
                }
            }

            applications.insert(
                name.clone(),
                ApplicationStatus { charm, channel, charm_origin, workload_version, units, config: HashMap::new(), series, relations },
            );
        }
    }

    let mut machines = HashMap::new();
    if let Some(machine_map) = value.get("machines").and_then(serde_json::Value::as_object) {
        for (id, machine) in machine_map {
            let availability_zone = machine
                .get("hardware")
                .and_then(serde_json::Value::as_str)
                .and_then(|hw| hw.split_whitespace().find_map(|tok| tok.strip_prefix("availability-zone=")))
                .unwrap_or_default()
                .to_string();
            let hostname = machine.get("hostname").and_then(serde_json::Value::as_str).unwrap_or_default().to_string();
            machines.insert(id.clone(), MachineStatus { availability_zone, hostname });
        }
    }

    ModelStatus { applications, machines }
}
