//! Builds an [`Analysis`] from a canned controller and checks the
//! assembled [`Plan`]'s top-level shape, the way `cou plan` does end to
//! end but without touching a real Juju controller.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use cou::analyze::Analysis;
use cou::catalog::Catalog;
use cou::controller::test_double::RecordReplayControllerClient;
use cou::controller::{ApplicationStatus, MachineStatus, ModelStatus, UnitStatus};
use cou::plan;
use cou::steps::StepCategory;

fn keystone_status() -> ApplicationStatus {
    ApplicationStatus {
        charm: "keystone".to_string(),
        channel: "ussuri/stable".to_string(),
        charm_origin: "ch".to_string(),
        workload_version: "17.0.1".to_string(),
        units: vec![UnitStatus {
            name: "keystone/0".to_string(),
            machine: "0".to_string(),
            workload_status: "active".to_string(),
            workload_info: String::new(),
            agent_status: "idle".to_string(),
        }],
        config: HashMap::from([("openstack-origin".to_string(), "distro".to_string())]),
        series: "focal".to_string(),
        relations: Vec::new(),
    }
}

fn nova_compute_status() -> ApplicationStatus {
    ApplicationStatus {
        charm: "nova-compute".to_string(),
        channel: "ussuri/stable".to_string(),
        charm_origin: "ch".to_string(),
        workload_version: "21.0.0".to_string(),
        units: vec![UnitStatus {
            name: "nova-compute/0".to_string(),
            machine: "1".to_string(),
            workload_status: "active".to_string(),
            workload_info: String::new(),
            agent_status: "idle".to_string(),
        }],
        config: HashMap::from([("action-managed-upgrade".to_string(), "false".to_string())]),
        series: "focal".to_string(),
        relations: Vec::new(),
    }
}

fn model() -> ModelStatus {
    let mut applications = HashMap::new();
    applications.insert("keystone".to_string(), keystone_status());
    applications.insert("nova-compute".to_string(), nova_compute_status());
    let mut machines = HashMap::new();
    machines.insert("0".to_string(), MachineStatus { availability_zone: String::new(), hostname: "control-1".to_string() });
    machines.insert("1".to_string(), MachineStatus { availability_zone: "zone1".to_string(), hostname: "hv-1".to_string() });
    ModelStatus { applications, machines }
}

#[tokio::test]
async fn generates_a_plan_with_verify_idle_control_plane_and_hypervisor_groups() {
    let catalog = Arc::new(Catalog::load_default().unwrap());
    let controller = RecordReplayControllerClient::with_status(model());
    let analysis = Analysis::create(&controller, &catalog).await.unwrap();

    let (root, advisories) = plan::generate_plan(&analysis, true, Path::new("/tmp"), &catalog).unwrap();
    assert!(advisories.is_empty());
    assert_eq!(root.category, StepCategory::UpgradePlan);

    let descriptions: Vec<&str> = root.children.iter().map(|c| c.description.as_str()).collect();
    assert!(descriptions[0].starts_with("Verify that the cloud is in an idle state"));
    assert!(descriptions.iter().any(|d| d.starts_with("Upgrade control-plane principal applications")));
    assert!(descriptions.iter().any(|d| d.starts_with("Upgrade control-plane subordinate applications")));
    assert!(descriptions.iter().any(|d| d.starts_with("Upgrade plan for data plane hypervisors")));

    let principal_group = root
        .children
        .iter()
        .find(|c| c.description.starts_with("Upgrade control-plane principal applications"))
        .unwrap();
    assert_eq!(principal_group.children.len(), 1);
    assert_eq!(principal_group.children[0].description, "Upgrade plan for 'keystone' to 'victoria'");

    let hypervisor_group = root.children.iter().find(|c| c.description.starts_with("Upgrade plan for data plane hypervisors")).unwrap();
    assert!(!hypervisor_group.children.is_empty());
}

#[tokio::test]
async fn skipping_the_backup_flag_omits_the_backup_step_when_no_database_application_exists() {
    let catalog = Arc::new(Catalog::load_default().unwrap());
    let controller = RecordReplayControllerClient::with_status(model());
    let analysis = Analysis::create(&controller, &catalog).await.unwrap();

    let (root, _) = plan::generate_plan(&analysis, false, Path::new("/tmp"), &catalog).unwrap();
    assert!(!root.children.iter().any(|c| c.description.starts_with("Backup databases")));
}
