//! Dispatch table from a deployed application's charm to its
//! [`Application`] variant.
//!
//! This is the "registry: map<charm_name, factory>" the design notes call
//! for — a tagged-enum match keyed by [`CharmClass`], not a class
//! hierarchy. Unknown charms return `None` and are kept only for display.

use std::collections::HashMap;

use crate::apps::core::{AppCore, Machine, Origin, Unit};
use crate::apps::Application;
use crate::catalog::{CharmClass, Catalog};
use crate::controller::ApplicationStatus;
use crate::errors::CouError;

const STANDARD_IDLE_TIMEOUT: u64 = 300;
const LONG_IDLE_TIMEOUT: u64 = 1800;

/// What: Classify one application's live status into an [`Application`].
///
/// Input: `name` as deployed, the controller's reported `status`, and the
/// process-wide `catalog`.
///
/// Output: `Ok(None)` when the charm is outside the catalog's known set
/// (kept for display, excluded from planning).
///
/// # Errors
/// Returns `Err` when the application's origin or channel cannot be
/// parsed.
pub fn classify(name: &str, status: &ApplicationStatus, catalog: &Catalog) -> Result<Option<Application>, CouError> {
    let Some(class) = catalog.charms.classify(&status.charm) else {
        return Ok(None);
    };

    let origin = Origin::parse(name, &status.charm_origin)?;
    let units = status
        .units
        .iter()
        .map(|u| (u.name.clone(), Unit { name: u.name.clone(), machine: machine_of(&u.name, status), workload_version: u.workload_version.clone(), agent_status: Some(u.agent_status.clone()) }))
        .collect::<HashMap<_, _>>();

    let machines = units
        .values()
        .map(|u| {
            (
                u.machine.clone(),
                Machine { id: u.machine.clone(), hostname: None, availability_zone: None, is_data_plane: catalog.is_data_plane_charm(&status.charm) },
            )
        })
        .collect::<HashMap<_, _>>();

    let mut core = AppCore {
        name: name.to_string(),
        charm: status.charm.clone(),
        channel: status.channel.clone(),
        origin,
        series: status.series.clone(),
        config: status.config.clone(),
        subordinate_to: Vec::new(),
        can_upgrade_to: None,
        units,
        machines,
        wait_timeout: STANDARD_IDLE_TIMEOUT,
        wait_for_model: false,
        packages_to_hold: Vec::new(),
        relations: status.relations.clone(),
    };
    apply_charm_specific_defaults(&mut core);

    Ok(Some(match class {
        CharmClass::Principal => Application::Principal(core),
        CharmClass::ChannelBased => Application::ChannelBased(core),
        CharmClass::Subordinate => Application::Subordinate(core),
        CharmClass::Auxiliary => Application::Auxiliary(core),
        CharmClass::AuxiliarySubordinate => Application::AuxiliarySubordinate(core),
        CharmClass::CephMon => Application::CephMon(core),
        CharmClass::OvnPrincipal => Application::OvnPrincipal(core),
        CharmClass::OvnSubordinate => Application::OvnSubordinate(core),
        CharmClass::NovaCompute => Application::NovaCompute(core),
    }))
}

fn machine_of(unit_name: &str, status: &ApplicationStatus) -> String {
    status
        .units
        .iter()
        .find(|u| u.name == unit_name)
        .map(|u| u.machine.clone())
        .unwrap_or_default()
}

/// What: The handful of per-charm overrides this tool applies by name
/// rather than by class: long waits for Keystone/Octavia/RabbitMQ/CephMon,
/// model-wide waits for Keystone/RabbitMQ/CephMon, and held packages for
/// `mysql-innodb-cluster`.
fn apply_charm_specific_defaults(core: &mut AppCore) {
    match core.charm.as_str() {
        "keystone" => {
            core.wait_timeout = LONG_IDLE_TIMEOUT;
            core.wait_for_model = true;
        }
        "octavia" => {
            core.wait_timeout = LONG_IDLE_TIMEOUT;
        }
        "rabbitmq-server" => {
            core.wait_timeout = LONG_IDLE_TIMEOUT;
            core.wait_for_model = true;
        }
        "ceph-mon" => {
            core.wait_timeout = LONG_IDLE_TIMEOUT;
            core.wait_for_model = true;
        }
        "mysql-innodb-cluster" => {
            core.packages_to_hold = vec!["mysql-server-core-8.0".to_string()];
        }
        "nova-compute" => {
            core.wait_for_model = true;
        }
        _ => {}
    }
}
