//! Groups `nova-compute` units by availability zone and machine, and emits
//! one `HypervisorUpgradePlan` step tree per AZ.
//!
//! Each `nova-compute` application still contributes its own app-wide
//! steps (package upgrade, charm refresh/crossgrade, config toggles, and
//! the post-upgrade wait/verify pair) exactly once, but its per-unit
//! container is unpacked and its individual unit subtrees are
//! redistributed into the availability-zone / machine tree instead of
//! staying grouped under the owning application.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::apps::nova_compute;
use crate::apps::Application;
use crate::catalog::{Catalog, OpenStackRelease};
use crate::errors::CouError;
use crate::steps::{Step, StepCategory};

/// What: Pre-plan gate: every machine carrying a `nova-compute` unit must
/// carry exactly the units this planner expects — a sanity check for
/// grouping correctness, not a cloud-health check.
///
/// # Errors
/// Returns `Err(CouError::ApplicationError)` when a machine hosts more
/// than one `nova-compute` unit (grouping would be ambiguous).
pub fn assert_grouping_is_sane(apps: &[&Application]) -> Result<(), CouError> {
    let mut seen_machines = std::collections::HashSet::new();
    for app in apps {
        if app.core().charm != "nova-compute" {
            continue;
        }
        for unit in app.core().units.values() {
            if !seen_machines.insert(unit.machine.clone()) {
                return Err(CouError::ApplicationError {
                    app: app.core().name.clone(),
                    reason: format!("machine '{}' carries more than one nova-compute unit", unit.machine),
                    remediation: None,
                });
            }
        }
    }
    Ok(())
}

/// What: Build the hypervisor group: per `nova-compute` application, its
/// app-wide pre-upgrade steps, then one `HypervisorUpgradePlan` subtree per
/// availability zone (machines in id order, one child per unit), then its
/// app-wide post-upgrade steps.
///
/// Input: `nova_apps`, every classified `NovaCompute` application in the
/// data plane; `target`, the release being upgraded to; `force`, whether
/// to skip the empty-hypervisor safety check and run pause/upgrade/resume
/// without waiting on prior units; `catalog`, the release/version tables
/// app-level planning needs.
///
/// Output: One root step. An app already at `target` is skipped silently
/// (nothing left to do for it) rather than failing the whole group.
///
/// # Errors
/// Propagates the pre-plan gate's error, and any invariant violation
/// [`nova_compute::app_level_plan`] reports.
pub fn build_hypervisor_group(
    nova_apps: &[&Application],
    target: OpenStackRelease,
    force: bool,
    catalog: &Arc<Catalog>,
) -> Result<Step, CouError> {
    assert_grouping_is_sane(nova_apps)?;

    let mut root = Step::new("Upgrade plan for data plane hypervisors", StepCategory::HypervisorUpgradePlan, true);
    for app in nova_apps {
        let (pre, post) = match nova_compute::app_level_plan(app, target, catalog) {
            Ok(steps) => steps,
            Err(CouError::HaltUpgradePlanGeneration { .. }) => continue,
            Err(err) => return Err(err),
        };

        for step in pre {
            root.add_child(step);
        }
        root.add_child(unit_tree(app, force));
        for step in post {
            root.add_child(step);
        }
    }
    Ok(root)
}

fn unit_tree(app: &Application, force: bool) -> Step {
    let mut by_az: BTreeMap<String, BTreeMap<String, Vec<String>>> = BTreeMap::new();
    let core = app.core();
    for (machine_id, machine) in &core.machines {
        let az = machine.availability_zone.clone().unwrap_or_default();
        for unit in core.units.values().filter(|u| &u.machine == machine_id) {
            by_az.entry(az.clone()).or_default().entry(machine_id.clone()).or_default().push(unit.name.clone());
        }
    }

    let mut apps_tree = Step::new(format!("Upgrade hypervisor units of '{}'", core.name), StepCategory::HypervisorUpgradePlan, true);
    for (az, machines) in by_az {
        let az_label = if az.is_empty() { "(no availability zone)".to_string() } else { az };
        let mut az_step = Step::new(format!("Upgrade hypervisors in availability zone '{az_label}'"), StepCategory::HypervisorUpgradePlan, true);
        for (machine_id, mut units) in machines {
            units.sort();
            let mut machine_step = Step::new(format!("Upgrade machine '{machine_id}'"), StepCategory::HypervisorUpgradePlan, false);
            for unit in units {
                machine_step.add_child(nova_compute::unit_subtree(&unit, force));
            }
            az_step.add_child(machine_step);
        }
        apps_tree.add_child(az_step);
    }
    apps_tree
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::core::{AppCore, Machine, Origin, Unit};
    use std::collections::HashMap;

    fn sample_catalog() -> Arc<Catalog> {
        Arc::new(Catalog::load_default().unwrap())
    }

    fn nova_compute_app(machine: &str, az: &str, version: &str) -> Application {
        let mut units = HashMap::new();
        units.insert(
            "nova-compute/0".to_string(),
            Unit { name: "nova-compute/0".to_string(), machine: machine.to_string(), workload_version: version.to_string(), agent_status: None },
        );
        let mut machines = HashMap::new();
        machines.insert(machine.to_string(), Machine { id: machine.to_string(), hostname: None, availability_zone: Some(az.to_string()), is_data_plane: true });
        let mut config = HashMap::new();
        config.insert("action-managed-upgrade".to_string(), "false".to_string());
        Application::NovaCompute(AppCore {
            name: "nova-compute".to_string(),
            charm: "nova-compute".to_string(),
            channel: "ussuri/stable".to_string(),
            origin: Origin::Charmhub,
            series: "focal".to_string(),
            config,
            subordinate_to: Vec::new(),
            can_upgrade_to: None,
            units,
            machines,
            wait_timeout: 300,
            wait_for_model: true,
            packages_to_hold: Vec::new(),
            relations: Vec::new(),
        })
    }

    #[test]
    fn groups_by_availability_zone_and_emits_app_wide_steps_once() {
        let catalog = sample_catalog();
        let target = OpenStackRelease::parse("victoria").unwrap();
        let zone_a = nova_compute_app("0", "zone-a", "21.0.0");
        let zone_b = nova_compute_app("1", "zone-b", "21.0.0");
        let apps = vec![&zone_b, &zone_a];
        let group = build_hypervisor_group(&apps, target, false, &catalog).unwrap();
        // Two apps, each contributing 4 pre-steps + 1 unit tree + 2 post-steps.
        assert_eq!(group.children.len(), 2 * (4 + 1 + 2));
    }

    #[test]
    fn two_nova_compute_units_on_one_machine_fails_the_gate() {
        let mut app = nova_compute_app("0", "zone-a", "21.0.0");
        if let Application::NovaCompute(core) = &mut app {
            core.units.insert(
                "nova-compute/1".to_string(),
                Unit { name: "nova-compute/1".to_string(), machine: "0".to_string(), workload_version: "21.0.0".to_string(), agent_status: None },
            );
        }
        let apps = vec![&app];
        let catalog = sample_catalog();
        let target = OpenStackRelease::parse("victoria").unwrap();
        assert!(build_hypervisor_group(&apps, target, false, &catalog).is_err());
    }

    #[test]
    fn app_already_at_target_is_skipped_silently() {
        let catalog = sample_catalog();
        let target = OpenStackRelease::parse("ussuri").unwrap();
        let app = nova_compute_app("0", "zone-a", "21.0.0");
        let apps = vec![&app];
        let group = build_hypervisor_group(&apps, target, false, &catalog).unwrap();
        assert!(group.children.is_empty());
    }
}
