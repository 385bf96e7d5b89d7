//! The shared `generate_upgrade_plan` algorithm: sanity checks, then
//! pre-upgrade / upgrade / post-upgrade step composition, with each
//! variant contributing only its own deltas on top of the shared shape.

use std::collections::HashMap;
use std::sync::Arc;

use crate::apps::{ceph, nova_compute, ovn, principal, Application};
use crate::catalog::{Catalog, OpenStackRelease};
use crate::controller::ControllerClient;
use crate::errors::CouError;
use crate::steps::{Step, StepCategory, StepOp};

/// What: `generate_upgrade_plan(target, force)`, dispatched across every
/// variant's deltas from the common shape.
///
/// # Errors
/// - `Err(CouError::HaltUpgradePlanGeneration)` when the app is already at
///   or above `target` with nothing pending.
/// - Any other taxonomy member on an invariant violation.
pub fn generate_upgrade_plan(
    app: &Application,
    target: OpenStackRelease,
    force: bool,
    catalog: &Arc<Catalog>,
) -> Result<Step, CouError> {
    check_application_target(app, target, catalog)?;
    check_mismatched_versions(app, catalog)?;
    check_auto_restarts(app)?;
    if app.uses_ovn_version_gate() {
        ovn::assert_minimum_version(app)?;
    }

    let core = app.core();
    let mut root = Step::new(
        format!("Upgrade plan for '{}' to '{target}'", core.name),
        StepCategory::ApplicationUpgradePlan,
        false,
    );

    if app.has_package_step() {
        root.add_child(principal::package_upgrade_step(app));
    }
    if let Some(step) = principal::refresh_charm_step(app, target, catalog)? {
        root.add_child(step);
    }
    if app.uses_ceph_release_gate() {
        root.add_child(ceph::ensure_require_osd_release_current(app, catalog)?);
    }

    let unit_by_unit = app.is_nova_compute();
    root.add_child(toggle_action_managed_upgrade_step(app, unit_by_unit));

    let target_channel = app.target_channel(target, catalog)?;
    if target_channel != core.channel {
        root.add_child(channel_crossgrade_step(app, &target_channel));
    }
    if let Some(step) = change_install_repository_step(app, target, catalog)? {
        root.add_child(step);
    }
    if unit_by_unit {
        root.add_child(nova_compute::per_unit_upgrade_container(app, force));
    }

    if app.has_post_upgrade_shape() && !skips_post_upgrade_as_versionless(app) {
        root.add_child(wait_step(app));
        root.add_child(verify_workload_step(app, target, catalog));
        if app.uses_ceph_release_gate() {
            root.add_child(ceph::ensure_require_osd_release_target(app, target, catalog)?);
        }
    }

    Ok(root)
}

fn skips_post_upgrade_as_versionless(app: &Application) -> bool {
    matches!(app, Application::ChannelBased(_)) && app.is_versionless()
}

pub(crate) fn check_application_target(app: &Application, target: OpenStackRelease, catalog: &Catalog) -> Result<(), CouError> {
    let current = app.current_os_release(catalog)?;
    let can_upgrade_empty = app.core().can_upgrade_to.is_none();
    let apt_source_ok = if app.ignores_apt_source_in_target_check() {
        true
    } else {
        app.core().apt_source_codename(catalog)? >= target
    };
    if current >= target && can_upgrade_empty && apt_source_ok {
        return Err(CouError::HaltUpgradePlanGeneration { app: app.core().name.clone() });
    }
    Ok(())
}

pub(crate) fn check_mismatched_versions(app: &Application, catalog: &Catalog) -> Result<(), CouError> {
    if app.derives_release_from_units() {
        let by_release = app.os_release_units(catalog)?;
        if by_release.len() > 1 {
            return Err(CouError::MismatchedOpenStackVersions {
                app: app.core().name.clone(),
                releases: by_release.keys().map(ToString::to_string).collect(),
            });
        }
    }
    Ok(())
}

pub(crate) fn check_auto_restarts(app: &Application) -> Result<(), CouError> {
    if app.core().auto_restarts_disabled() {
        return Err(CouError::ApplicationError {
            app: app.core().name.clone(),
            reason: "'enable-auto-restarts' is disabled".to_string(),
            remediation: None,
        });
    }
    Ok(())
}

pub(crate) fn toggle_action_managed_upgrade_step(app: &Application, enabled: bool) -> Step {
    let core = app.core();
    let app_name = core.name.clone();
    let op: StepOp = Box::new(move |controller| {
        let app_name = app_name.clone();
        Box::pin(async move {
            let mut config = HashMap::new();
            config.insert("action-managed-upgrade".to_string(), enabled.to_string());
            controller.set_application_config(&app_name, config).await
        })
    });
    Step::leaf(format!("Set 'action-managed-upgrade' to '{enabled}' for '{}'", core.name), StepCategory::Upgrade, op)
}

pub(crate) fn channel_crossgrade_step(app: &Application, target_channel: &str) -> Step {
    let core = app.core();
    let app_name = core.name.clone();
    let channel = target_channel.to_string();
    let op: StepOp = Box::new(move |controller| {
        let app_name = app_name.clone();
        let channel = channel.clone();
        Box::pin(async move { controller.upgrade_charm(&app_name, Some(&channel), None).await })
    });
    Step::leaf(format!("Upgrade '{}' to '{target_channel}'", core.name), StepCategory::Upgrade, op)
}

pub(crate) fn change_install_repository_step(
    app: &Application,
    target: OpenStackRelease,
    _catalog: &Catalog,
) -> Result<Option<Step>, CouError> {
    let core = app.core();
    let Some(key) = core.origin_setting() else {
        return Ok(None);
    };
    let new_value = format!("cloud:{}-{target}", core.series);
    if core.config.get(key).is_some_and(|v| v == &new_value) {
        return Ok(None);
    }

    let app_name = core.name.clone();
    let key_owned = key.to_string();
    let value = new_value.clone();
    let op: StepOp = Box::new(move |controller| {
        let app_name = app_name.clone();
        let key_owned = key_owned.clone();
        let value = value.clone();
        Box::pin(async move {
            let mut config = HashMap::new();
            config.insert(key_owned, value);
            controller.set_application_config(&app_name, config).await
        })
    });
    Ok(Some(Step::leaf(format!("Set '{key}' to '{new_value}' for '{}'", core.name), StepCategory::Upgrade, op)))
}

pub(crate) fn wait_step(app: &Application) -> Step {
    let core = app.core();
    let timeout = core.wait_timeout;
    let wait_for_model = core.wait_for_model;
    let app_name = core.name.clone();
    let description = if wait_for_model {
        format!("Wait for up to {timeout}s for the model to reach the idle state")
    } else {
        format!("Wait for up to {timeout}s for app '{app_name}' to reach the idle state")
    };
    let op: StepOp = Box::new(move |controller| {
        let app_name = app_name.clone();
        Box::pin(async move {
            let apps = if wait_for_model { None } else { Some(vec![app_name]) };
            controller.wait_for_active_idle(timeout, apps.as_deref(), false, 15).await
        })
    });
    Step::leaf(description, StepCategory::PostUpgrade, op)
}

pub(crate) fn verify_workload_step(app: &Application, target: OpenStackRelease, catalog: &Arc<Catalog>) -> Step {
    let core = app.core();
    let app_name = core.name.clone();
    let charm = core.charm.clone();
    let units = core.unit_names();
    let catalog = Arc::clone(catalog);
    let op: StepOp = Box::new(move |controller| {
        let app_name = app_name.clone();
        let charm = charm.clone();
        let units = units.clone();
        let catalog = Arc::clone(&catalog);
        Box::pin(async move { verify_workload(controller, &app_name, &charm, &units, target, &catalog).await })
    });
    Step::leaf(format!("Verify that the workload of '{}' has been upgraded to '{target}'", core.name), StepCategory::PostUpgrade, op)
}

async fn verify_workload(
    controller: &dyn ControllerClient,
    app_name: &str,
    charm: &str,
    units: &[String],
    target: OpenStackRelease,
    catalog: &Catalog,
) -> Result<(), CouError> {
    let status = controller.get_status().await?;
    let Some(app_status) = status.applications.get(app_name) else {
        return Err(CouError::ApplicationNotFound(app_name.to_string()));
    };

    let mut not_upgraded = Vec::new();
    for unit in units {
        let Some(unit_status) = app_status.units.iter().find(|u| &u.name == unit) else {
            not_upgraded.push(unit.clone());
            continue;
        };
        let compatible = catalog.versions.compatible_codenames(charm, &unit_status.workload_version);
        if !compatible.contains(&target) {
            not_upgraded.push(unit.clone());
        }
    }
    if !not_upgraded.is_empty() {
        return Err(CouError::ApplicationError {
            app: app_name.to_string(),
            reason: format!("units not upgraded to '{target}': {}", not_upgraded.join(", ")),
            remediation: None,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::core::{AppCore, Origin, Unit};
    use crate::steps::StepState;

    fn sample_catalog() -> Arc<Catalog> {
        Arc::new(Catalog::load_default().unwrap())
    }

    fn keystone_app(channel: &str, origin: &str, versions: &[&str]) -> Application {
        let mut units = HashMap::new();
        let mut config = HashMap::new();
        config.insert("openstack-origin".to_string(), "distro".to_string());
        config.insert("action-managed-upgrade".to_string(), "true".to_string());
        for (idx, version) in versions.iter().enumerate() {
            let name = format!("keystone/{idx}");
            units.insert(
                name.clone(),
                Unit { name, machine: idx.to_string(), workload_version: (*version).to_string(), agent_status: None },
            );
        }
        Application::Principal(AppCore {
            name: "keystone".to_string(),
            charm: "keystone".to_string(),
            channel: channel.to_string(),
            origin: Origin::parse("keystone", origin).unwrap(),
            series: "focal".to_string(),
            config,
            subordinate_to: Vec::new(),
            can_upgrade_to: None,
            units,
            machines: HashMap::new(),
            wait_timeout: 1800,
            wait_for_model: true,
            packages_to_hold: Vec::new(),
            relations: Vec::new(),
        })
    }

    #[test]
    fn keystone_plan_matches_documented_shape_and_order() {
        let catalog = sample_catalog();
        let app = keystone_app("ussuri/stable", "ch", &["17.0.1", "17.0.1", "17.0.1"]);
        let target = OpenStackRelease::parse("victoria").unwrap();
        let plan = generate_upgrade_plan(&app, target, false, &catalog).unwrap();

        assert_eq!(plan.description, "Upgrade plan for 'keystone' to 'victoria'");
        let descriptions: Vec<&str> = plan.children.iter().map(|c| c.description.as_str()).collect();
        assert!(descriptions[0].starts_with("Upgrade software packages"));
        assert!(descriptions[1].starts_with("Refresh 'keystone' to the latest revision"));
        assert!(descriptions[2].starts_with("Set 'action-managed-upgrade' to 'false'"));
        assert!(descriptions[3].starts_with("Upgrade 'keystone' to 'victoria/stable'"));
        assert!(descriptions[4].starts_with("Set 'openstack-origin' to 'cloud:focal-victoria'"));
        assert!(descriptions[5].starts_with("Wait for up to 1800s for the model"));
        assert!(descriptions[6].starts_with("Verify that the workload"));
        assert_eq!(plan.children[0].children.len(), 3);
    }

    #[test]
    fn already_at_target_halts_plan_generation() {
        let catalog = sample_catalog();
        let app = keystone_app("victoria/stable", "ch", &["18.0.0", "18.0.0", "18.0.0"]);
        let target = OpenStackRelease::parse("victoria").unwrap();
        let err = generate_upgrade_plan(&app, target, false, &catalog).unwrap_err();
        assert!(matches!(err, CouError::HaltUpgradePlanGeneration { app } if app == "keystone"));
    }

    #[test]
    fn mismatched_unit_versions_abort_with_explicit_error() {
        let catalog = sample_catalog();
        let app = keystone_app("ussuri/stable", "ch", &["17.0.1", "18.0.0"]);
        let target = OpenStackRelease::parse("victoria").unwrap();
        let err = generate_upgrade_plan(&app, target, false, &catalog).unwrap_err();
        assert!(matches!(err, CouError::MismatchedOpenStackVersions { .. }));
    }

    #[test]
    fn disabled_auto_restarts_abort_with_application_error() {
        let catalog = sample_catalog();
        let mut app = keystone_app("ussuri/stable", "ch", &["17.0.1", "17.0.1", "17.0.1"]);
        if let Application::Principal(core) = &mut app {
            core.config.insert("enable-auto-restarts".to_string(), "false".to_string());
        }
        let target = OpenStackRelease::parse("victoria").unwrap();
        let err = generate_upgrade_plan(&app, target, false, &catalog).unwrap_err();
        assert!(matches!(err, CouError::ApplicationError { .. }));
    }

    #[test]
    fn package_upgrade_unit_children_have_no_grandchildren() {
        let catalog = sample_catalog();
        let app = keystone_app("ussuri/stable", "ch", &["17.0.1", "17.0.1", "17.0.1"]);
        let target = OpenStackRelease::parse("victoria").unwrap();
        let plan = generate_upgrade_plan(&app, target, false, &catalog).unwrap();
        for unit_step in &plan.children[0].children {
            assert!(unit_step.children.is_empty());
            assert_eq!(unit_step.state, StepState::Pending);
        }
    }

    #[test]
    fn app_level_wait_names_the_application_when_not_waiting_for_the_model() {
        let catalog = sample_catalog();
        let mut app = keystone_app("ussuri/stable", "ch", &["17.0.1", "17.0.1", "17.0.1"]);
        if let Application::Principal(core) = &mut app {
            core.name = "cinder".to_string();
            core.charm = "cinder".to_string();
            core.wait_timeout = 300;
            core.wait_for_model = false;
        }
        let target = OpenStackRelease::parse("victoria").unwrap();
        let plan = generate_upgrade_plan(&app, target, false, &catalog).unwrap();
        let wait = plan.children.iter().find(|c| c.description.starts_with("Wait for")).unwrap();
        assert_eq!(wait.description, "Wait for up to 300s for app 'cinder' to reach the idle state");
    }

    #[test]
    fn keystone_ldap_subordinate_has_no_package_step_and_no_post_upgrade_steps() {
        let catalog = sample_catalog();
        let app = Application::Subordinate(AppCore {
            name: "keystone-ldap".to_string(),
            charm: "keystone-ldap".to_string(),
            channel: "ussuri/stable".to_string(),
            origin: Origin::parse("keystone-ldap", "ch").unwrap(),
            series: "focal".to_string(),
            config: HashMap::new(),
            subordinate_to: vec!["keystone".to_string()],
            can_upgrade_to: None,
            units: HashMap::new(),
            machines: HashMap::new(),
            wait_timeout: 300,
            wait_for_model: false,
            packages_to_hold: Vec::new(),
            relations: Vec::new(),
        });
        let target = OpenStackRelease::parse("victoria").unwrap();
        let plan = generate_upgrade_plan(&app, target, false, &catalog).unwrap();
        let descriptions: Vec<&str> = plan.children.iter().map(|c| c.description.as_str()).collect();
        assert_eq!(descriptions.len(), 2);
        assert!(descriptions[0].starts_with("Refresh 'keystone-ldap' to the latest revision"));
        assert!(descriptions[1].starts_with("Upgrade 'keystone-ldap' to 'victoria/stable'"));
    }

    #[test]
    fn ceph_mon_channel_tracks_the_ceph_release_name_not_the_codename() {
        let catalog = sample_catalog();
        let mut units = HashMap::new();
        units.insert(
            "ceph-mon/0".to_string(),
            Unit { name: "ceph-mon/0".to_string(), machine: "0".to_string(), workload_version: "16.2.5".to_string(), agent_status: None },
        );
        let app = Application::CephMon(AppCore {
            name: "ceph-mon".to_string(),
            charm: "ceph-mon".to_string(),
            channel: "pacific/stable".to_string(),
            origin: Origin::parse("ceph-mon", "ch").unwrap(),
            series: "focal".to_string(),
            config: HashMap::new(),
            subordinate_to: Vec::new(),
            can_upgrade_to: None,
            units,
            machines: HashMap::new(),
            wait_timeout: 1800,
            wait_for_model: true,
            packages_to_hold: Vec::new(),
            relations: Vec::new(),
        });
        assert_eq!(app.current_os_release(&catalog).unwrap(), OpenStackRelease::parse("xena").unwrap());

        let target = OpenStackRelease::parse("yoga").unwrap();
        let plan = generate_upgrade_plan(&app, target, false, &catalog).unwrap();
        let descriptions: Vec<&str> = plan.children.iter().map(|c| c.description.as_str()).collect();

        assert!(descriptions[0].starts_with("Upgrade software packages"));
        assert!(descriptions[1].starts_with("Refresh 'ceph-mon' to the latest revision"));
        assert_eq!(descriptions[2], "Ensure require-osd-release on ceph-mon units correctly set to 'pacific'");
        assert!(descriptions.iter().any(|d| *d == "Upgrade 'ceph-mon' to 'quincy/stable'"));
        assert_eq!(*descriptions.last().unwrap(), "Ensure require-osd-release on ceph-mon units correctly set to 'quincy'");
    }
}
