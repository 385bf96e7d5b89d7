//! Dispatches a handful of representative charms through the public
//! classification entrypoint and checks the resulting variant and its
//! derived current release, the way `analyze::Analysis::create` relies on
//! it for a whole deployed model.

use std::collections::HashMap;

use cou::apps::{self, Application};
use cou::catalog::{Catalog, OpenStackRelease};
use cou::controller::{ApplicationStatus, UnitStatus};

fn status(charm: &str, channel: &str, workload_version: &str) -> ApplicationStatus {
    ApplicationStatus {
        charm: charm.to_string(),
        channel: channel.to_string(),
        charm_origin: "ch".to_string(),
        workload_version: workload_version.to_string(),
        units: vec![UnitStatus {
            name: format!("{charm}/0"),
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

#[test]
fn keystone_classifies_as_a_principal_deriving_release_from_units() {
    let catalog = Catalog::load_default().unwrap();
    let app = apps::classify("keystone", &status("keystone", "ussuri/stable", "17.0.1"), &catalog).unwrap().unwrap();
    assert!(matches!(app, Application::Principal(_)));
    assert_eq!(app.current_os_release(&catalog).unwrap(), OpenStackRelease::parse("ussuri").unwrap());
}

#[test]
fn nova_compute_classifies_as_nova_compute_and_waits_for_the_model() {
    let catalog = Catalog::load_default().unwrap();
    let app = apps::classify("nova-compute", &status("nova-compute", "ussuri/stable", "22.0.0"), &catalog).unwrap().unwrap();
    assert!(matches!(app, Application::NovaCompute(_)));
    assert!(app.core().wait_for_model);
}

#[test]
fn ceph_mon_classifies_as_ceph_mon_with_a_ceph_release_channel() {
    let catalog = Catalog::load_default().unwrap();
    let app = apps::classify("ceph-mon", &status("ceph-mon", "pacific/stable", "16.2.5"), &catalog).unwrap().unwrap();
    assert!(matches!(app, Application::CephMon(_)));
    assert_eq!(app.current_os_release(&catalog).unwrap(), OpenStackRelease::parse("xena").unwrap());
}

#[test]
fn keystone_ldap_classifies_as_a_subordinate() {
    let catalog = Catalog::load_default().unwrap();
    let mut status = status("keystone-ldap", "ussuri/stable", "");
    status.units[0].workload_status = "active".to_string();
    let app = apps::classify("keystone-ldap", &status, &catalog).unwrap().unwrap();
    assert!(matches!(app, Application::Subordinate(_)));
}

#[test]
fn an_unrecognized_charm_classifies_to_none() {
    let catalog = Catalog::load_default().unwrap();
    let app = apps::classify("mystery-app", &status("totally-unknown-charm", "stable", "1.0"), &catalog).unwrap();
    assert!(app.is_none());
}
