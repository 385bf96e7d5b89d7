//! Controller abstraction used for every interaction with the deployed
//! cloud: status queries, charm upgrades, unit commands, actions, and
//! idle-waits.
//!
//! This module provides the [`ControllerClient`] trait and implementations
//! for talking to a Juju controller, enabling testability through
//! dependency injection — the async generalization of the synchronous
//! command-runner abstraction used elsewhere in this crate.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use crate::errors::CouError;

/// Status of a single unit of an application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitStatus {
    /// Unit name, e.g. `"keystone/0"`.
    pub name: String,
    /// Machine (or container) the unit is deployed to.
    pub machine: String,
    /// Workload status (`active`, `blocked`, `maintenance`, ...).
    pub workload_status: String,
    /// Workload status message, e.g. `"Unit is sealed"`.
    pub workload_info: String,
    /// Agent status (`idle`, `executing`, ...).
    pub agent_status: String,
}

/// Status of a single deployed application.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ApplicationStatus {
    /// Charm name backing this application (may differ from the
    /// application name).
    pub charm: String,
    /// Current channel, e.g. `"yoga/stable"`.
    pub channel: String,
    /// Charm origin, e.g. `"ch"` (charmhub) or `"cs"` (charmstore).
    pub charm_origin: String,
    /// Reported workload version string.
    pub workload_version: String,
    /// Deployed units.
    pub units: Vec<UnitStatus>,
    /// Application config as currently set.
    pub config: HashMap<String, String>,
    /// Series (Ubuntu release) the application is deployed on.
    pub series: String,
    /// Application names this application is related to.
    pub relations: Vec<String>,
}

/// Whole-model status: every application by name.
#[derive(Clone, Debug, Default)]
pub struct ModelStatus {
    /// Applications in the model, keyed by application name.
    pub applications: HashMap<String, ApplicationStatus>,
    /// Machines in the model, keyed by machine id, with their availability
    /// zone (empty string if none) and hostname.
    pub machines: HashMap<String, MachineStatus>,
}

/// Status of a single machine.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MachineStatus {
    /// Availability zone, empty when the cloud has none.
    pub availability_zone: String,
    /// Hostname as reported by the hypervisor.
    pub hostname: String,
}

/// Result of running a command on a unit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandResult {
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
    /// Process exit code.
    pub code: i32,
}

/// Result of running a Juju action on a unit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActionResult {
    /// Action status, e.g. `"completed"` or `"failed"`.
    pub status: String,
    /// Action result map.
    pub output: HashMap<String, String>,
}

/// Abstract controller interface used for every Juju interaction the
/// planner and executor need.
///
/// Inputs: application/unit/action names as plain `&str`; this trait does
/// not know about this crate's own application taxonomy.
///
/// Output: structured status/result types, or `CouError` on failure.
///
/// # Errors
/// Every method may return `Err(CouError::Io)`-shaped or
/// `Err(CouError::CommandRunFailed)`/`Err(CouError::ActionFailed)` errors;
/// see each method for its specific failure mode.
///
/// Details: implementations may stub responses to enable deterministic unit
/// testing. Production code relies on a real Juju-backed implementation;
/// see `JujuControllerClient` in the binary crate's wiring.
#[async_trait]
pub trait ControllerClient: Send + Sync {
    /// What: Fetch the full model status.
    async fn get_status(&self) -> Result<ModelStatus, CouError>;

    /// What: The charm name backing `app` (may differ from `app` itself).
    async fn get_charm_name(&self, app: &str) -> Result<String, CouError>;

    /// What: The current application config for `app`.
    async fn get_application_config(&self, app: &str) -> Result<HashMap<String, String>, CouError>;

    /// What: Set one or more config keys on `app`.
    async fn set_application_config(&self, app: &str, config: HashMap<String, String>) -> Result<(), CouError>;

    /// What: Upgrade `app`'s charm, optionally switching channel and/or
    /// pinning a revision.
    async fn upgrade_charm(&self, app: &str, channel: Option<&str>, revision: Option<i32>) -> Result<(), CouError>;

    /// What: Run a shell command on `unit`, waiting up to `timeout_secs`.
    ///
    /// # Errors
    /// Returns `Err(CouError::CommandRunFailed)` on a non-zero exit or a
    /// timed-out run.
    async fn run_on_unit(&self, unit: &str, command: &str, timeout_secs: u64) -> Result<CommandResult, CouError>;

    /// What: Run Juju action `action` on `unit` with `params`, blocking
    /// until it completes.
    ///
    /// # Errors
    /// Returns `Err(CouError::ActionFailed)` when the action's reported
    /// status is not `"completed"`.
    async fn run_action(
        &self,
        unit: &str,
        action: &str,
        params: HashMap<String, String>,
    ) -> Result<ActionResult, CouError>;

    /// What: Block until every application in `apps` (or, if `None`, every
    /// application in the model) reports `active`/`idle` for at least
    /// `idle_period_secs`, or `timeout_secs` elapses.
    ///
    /// Input: `raise_on_blocked`, when true, treats any unit reporting
    /// `blocked` as an immediate failure rather than continuing to poll.
    ///
    /// # Errors
    /// Returns `Err(CouError::TimeoutException)` on timeout, or
    /// `Err(CouError::ApplicationError)` when `raise_on_blocked` is set and
    /// a unit is blocked.
    async fn wait_for_active_idle(
        &self,
        timeout_secs: u64,
        apps: Option<&[String]>,
        raise_on_blocked: bool,
        idle_period_secs: u64,
    ) -> Result<(), CouError>;

    /// What: Copy `remote_path` off `unit` to `local_path`.
    async fn scp_from_unit(&self, unit: &str, remote_path: &str, local_path: &Path) -> Result<(), CouError>;
}

pub mod juju;

/// Deterministic, in-memory [`ControllerClient`] used by tests: every call
/// either returns a canned response keyed by its arguments, or records the
/// call for later assertion, never touching the network or a subprocess.
pub mod test_double {
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{ActionResult, ApplicationStatus, CommandResult, ControllerClient, ModelStatus};
    use crate::errors::CouError;

    /// A single recorded call, for assertions in tests that exercise the
    /// executor or a step factory end to end.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum Call {
        /// `run_on_unit(unit, command)`.
        RunOnUnit { unit: String, command: String },
        /// `run_action(unit, action)`.
        RunAction { unit: String, action: String },
        /// `upgrade_charm(app, channel)`.
        UpgradeCharm { app: String, channel: Option<String> },
        /// `set_application_config(app, config)`.
        SetApplicationConfig { app: String, config: HashMap<String, String> },
    }

    /// Canned responses plus a call log, guarded by a single mutex since
    /// tests drive this client from one task at a time.
    #[derive(Default)]
    pub struct RecordReplayControllerClient {
        status: ModelStatus,
        command_results: HashMap<(String, String), CommandResult>,
        action_results: HashMap<(String, String), ActionResult>,
        fail_commands: bool,
        calls: Mutex<Vec<Call>>,
    }

    impl RecordReplayControllerClient {
        /// What: A client with an empty model and no canned responses;
        /// every call that requires a specific response returns a
        /// not-found-shaped error instead.
        #[must_use]
        pub fn empty() -> Self {
            Self::default()
        }

        /// What: Build a client around a pre-populated status, e.g. from a
        /// test that wants `get_status` to report specific applications.
        #[must_use]
        pub fn with_status(status: ModelStatus) -> Self {
            Self { status, ..Self::default() }
        }

        /// What: Register a canned result for `run_on_unit(unit, command)`.
        #[must_use]
        pub fn with_command_result(mut self, unit: &str, command: &str, result: CommandResult) -> Self {
            self.command_results.insert((unit.to_string(), command.to_string()), result);
            self
        }

        /// What: Register a canned result for `run_action(unit, action)`.
        #[must_use]
        pub fn with_action_result(mut self, unit: &str, action: &str, result: ActionResult) -> Self {
            self.action_results.insert((unit.to_string(), action.to_string()), result);
            self
        }

        /// What: Every subsequent `run_on_unit` call fails with
        /// `CommandRunFailed`, for testing failure-policy branches.
        #[must_use]
        pub fn failing_commands(mut self) -> Self {
            self.fail_commands = true;
            self
        }

        /// What: The calls recorded so far, in order.
        #[must_use]
        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().expect("call log mutex poisoned").clone()
        }

        fn record(&self, call: Call) {
            self.calls.lock().expect("call log mutex poisoned").push(call);
        }
    }

    #[async_trait]
    impl ControllerClient for RecordReplayControllerClient {
        async fn get_status(&self) -> Result<ModelStatus, CouError> {
            Ok(self.status.clone())
        }

        async fn get_charm_name(&self, app: &str) -> Result<String, CouError> {
            self.status
                .applications
                .get(app)
                .map(|a| a.charm.clone())
                .ok_or_else(|| CouError::ApplicationNotFound(app.to_string()))
        }

        async fn get_application_config(&self, app: &str) -> Result<HashMap<String, String>, CouError> {
            self.status
                .applications
                .get(app)
                .map(|a| a.config.clone())
                .ok_or_else(|| CouError::ApplicationNotFound(app.to_string()))
        }

        async fn set_application_config(&self, app: &str, config: HashMap<String, String>) -> Result<(), CouError> {
            self.record(Call::SetApplicationConfig { app: app.to_string(), config });
            Ok(())
        }

        async fn upgrade_charm(&self, app: &str, channel: Option<&str>, _revision: Option<i32>) -> Result<(), CouError> {
            self.record(Call::UpgradeCharm { app: app.to_string(), channel: channel.map(str::to_string) });
            Ok(())
        }

        async fn run_on_unit(&self, unit: &str, command: &str, _timeout_secs: u64) -> Result<CommandResult, CouError> {
            self.record(Call::RunOnUnit { unit: unit.to_string(), command: command.to_string() });
            if self.fail_commands {
                return Err(CouError::CommandRunFailed {
                    unit: unit.to_string(),
                    command: command.to_string(),
                    code: Some(1),
                });
            }
            Ok(self
                .command_results
                .get(&(unit.to_string(), command.to_string()))
                .cloned()
                .unwrap_or_default())
        }

        async fn run_action(
            &self,
            unit: &str,
            action: &str,
            _params: HashMap<String, String>,
        ) -> Result<ActionResult, CouError> {
            self.record(Call::RunAction { unit: unit.to_string(), action: action.to_string() });
            let result = self
                .action_results
                .get(&(unit.to_string(), action.to_string()))
                .cloned()
                .unwrap_or_else(|| ActionResult { status: "completed".to_string(), output: HashMap::new() });
            if result.status != "completed" {
                return Err(CouError::ActionFailed {
                    unit: unit.to_string(),
                    action: action.to_string(),
                    message: result.output.get("message").cloned().unwrap_or_default(),
                });
            }
            Ok(result)
        }

        async fn wait_for_active_idle(
            &self,
            _timeout_secs: u64,
            _apps: Option<&[String]>,
            raise_on_blocked: bool,
            _idle_period_secs: u64,
        ) -> Result<(), CouError> {
            if raise_on_blocked {
                for app in self.status.applications.values() {
                    if app.units.iter().any(|u| u.workload_status == "blocked") {
                        return Err(CouError::ApplicationError {
                            app: "model".to_string(),
                            reason: "a unit is blocked".to_string(),
                            remediation: None,
                        });
                    }
                }
            }
            Ok(())
        }

        async fn scp_from_unit(&self, _unit: &str, _remote_path: &str, _local_path: &Path) -> Result<(), CouError> {
            Ok(())
        }
    }

}
