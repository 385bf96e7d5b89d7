//! Runs a plan assembled from a classified application through the
//! executor against a canned controller, the way `cou run` drives a real
//! Juju controller but fully offline.

use std::collections::HashMap;
use std::sync::Arc;

use cou::apps::{self, Application};
use cou::catalog::{Catalog, OpenStackRelease};
use cou::controller::test_double::{Call, RecordReplayControllerClient};
use cou::controller::{ApplicationStatus, ModelStatus, UnitStatus};
use cou::execute::{execute, ExecuteOutcome};

fn keystone_status(channel: &str, workload_version: &str) -> ApplicationStatus {
    ApplicationStatus {
        charm: "keystone".to_string(),
        channel: channel.to_string(),
        charm_origin: "ch".to_string(),
        workload_version: workload_version.to_string(),
        units: vec![UnitStatus {
            name: "keystone/0".to_string(),
            machine: "0".to_string(),
            workload_status: "active".to_string(),
            workload_info: String::new(),
            agent_status: "idle".to_string(),
        }],
        config: HashMap::from([
            ("openstack-origin".to_string(), "distro".to_string()),
            ("action-managed-upgrade".to_string(), "true".to_string()),
        ]),
        series: "focal".to_string(),
        relations: Vec::new(),
    }
}

#[tokio::test]
async fn running_a_principal_upgrade_plan_completes_and_drives_the_expected_calls() {
    let catalog = Arc::new(Catalog::load_default().unwrap());
    let before = keystone_status("ussuri/stable", "17.0.1");
    let app = apps::classify("keystone", &before, &catalog).unwrap().unwrap();
    assert!(matches!(app, Application::Principal(_)));

    let target = OpenStackRelease::parse("victoria").unwrap();
    let mut plan = app.generate_upgrade_plan(target, false, &catalog).unwrap();

    // The controller's status reflects the already-upgraded workload so the
    // post-upgrade verification step, which re-reads status, passes.
    let after = keystone_status("victoria/stable", "18.0.1");
    let mut applications = HashMap::new();
    applications.insert("keystone".to_string(), after);
    let controller = RecordReplayControllerClient::with_status(ModelStatus { applications, machines: HashMap::new() });

    let outcome = execute(&mut plan, &controller, false, true).await;
    assert_eq!(outcome, ExecuteOutcome::Completed);

    let calls = controller.calls();

    assert!(calls.contains(&Call::RunOnUnit {
        unit: "keystone/0".to_string(),
        command: "apt-get update && apt-get dist-upgrade -y && apt-get autoremove -y".to_string(),
    }));
    assert!(calls.contains(&Call::UpgradeCharm { app: "keystone".to_string(), channel: None }));
    assert!(calls.contains(&Call::UpgradeCharm { app: "keystone".to_string(), channel: Some("victoria/stable".to_string()) }));
    assert!(calls.contains(&Call::SetApplicationConfig {
        app: "keystone".to_string(),
        config: HashMap::from([("action-managed-upgrade".to_string(), "false".to_string())]),
    }));
    assert!(calls.contains(&Call::SetApplicationConfig {
        app: "keystone".to_string(),
        config: HashMap::from([("openstack-origin".to_string(), "cloud:focal-victoria".to_string())]),
    }));
}

#[tokio::test]
async fn a_failing_unit_command_fails_the_whole_run_without_skipping_recording() {
    let catalog = Arc::new(Catalog::load_default().unwrap());
    let before = keystone_status("ussuri/stable", "17.0.1");
    let app = apps::classify("keystone", &before, &catalog).unwrap().unwrap();

    let target = OpenStackRelease::parse("victoria").unwrap();
    let mut plan = app.generate_upgrade_plan(target, false, &catalog).unwrap();

    let controller = RecordReplayControllerClient::with_status(ModelStatus {
        applications: HashMap::from([("keystone".to_string(), before)]),
        machines: HashMap::new(),
    })
    .failing_commands();

    let outcome = execute(&mut plan, &controller, false, true).await;
    assert_eq!(outcome, ExecuteOutcome::Failed);

    let calls = controller.calls();
    assert!(calls.contains(&Call::RunOnUnit {
        unit: "keystone/0".to_string(),
        command: "apt-get update && apt-get dist-upgrade -y && apt-get autoremove -y".to_string(),
    }));
    // Siblings of the failed package-upgrade step that don't depend on it
    // still ran, so the charm refresh was still recorded.
    assert!(calls.contains(&Call::UpgradeCharm { app: "keystone".to_string(), channel: None }));
}
