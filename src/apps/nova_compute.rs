//! `NovaCompute`'s per-unit upgrade shape: scheduler disable/enable and an
//! empty-hypervisor gate bracketing the ordinary pause/upgrade/resume
//! sequence.

use std::collections::HashMap;

use std::sync::Arc;

use crate::apps::{principal, steps_common, Application};
use crate::catalog::{Catalog, OpenStackRelease};
use crate::controller::ControllerClient;
use crate::errors::CouError;
use crate::steps::{Step, StepCategory, StepOp};

/// What: *Per-unit upgrade container* for `NovaCompute`: parallel
/// container, one sequential child per
/// unit, each running `disable-scheduler`, an optional empty-hypervisor
/// check, `pause`, `openstack-upgrade`, `resume`, `enable-scheduler`.
#[must_use]
pub fn per_unit_upgrade_container(app: &Application, force: bool) -> Step {
    let core = app.core();
    let mut container = Step::new(format!("Upgrade plan for units of '{}'", core.name), StepCategory::Upgrade, true);
    for unit in core.unit_names() {
        container.add_child(unit_subtree(&unit, force));
    }
    container
}

/// What: The steps a `NovaCompute` app's upgrade plan carries outside the
/// per-unit container, split into what must run before the hypervisors are
/// touched and what must run after every hypervisor is done — used by the
/// data-plane planner, which redistributes the per-unit steps by
/// availability zone and machine instead of keeping them grouped by app.
///
/// # Errors
/// Same preconditions as [`crate::apps::Application::generate_upgrade_plan`]:
/// halts when the app is already at `target`, and propagates any invariant
/// violation.
pub(crate) fn app_level_plan(app: &Application, target: OpenStackRelease, catalog: &Arc<Catalog>) -> Result<(Vec<Step>, Vec<Step>), CouError> {
    steps_common::check_application_target(app, target, catalog)?;
    steps_common::check_mismatched_versions(app, catalog)?;
    steps_common::check_auto_restarts(app)?;

    let mut pre = vec![principal::package_upgrade_step(app)];
    if let Some(step) = principal::refresh_charm_step(app, target, catalog)? {
        pre.push(step);
    }
    pre.push(steps_common::toggle_action_managed_upgrade_step(app, true));

    let target_channel = app.target_channel(target, catalog)?;
    if target_channel != app.core().channel {
        pre.push(steps_common::channel_crossgrade_step(app, &target_channel));
    }
    if let Some(step) = steps_common::change_install_repository_step(app, target, catalog)? {
        pre.push(step);
    }

    let post = vec![steps_common::wait_step(app), steps_common::verify_workload_step(app, target, catalog)];
    Ok((pre, post))
}

pub(crate) fn unit_subtree(unit: &str, force: bool) -> Step {
    let mut subtree = Step::new(format!("Upgrade unit '{unit}'"), StepCategory::Unit, false);
    subtree.add_child(action_step(unit, "disable-scheduler", "Disable scheduler on"));
    if !force {
        subtree.add_child(empty_hypervisor_check_step(unit));
    }

    let mut pause = action_step(unit, "pause", "Pause the unit:");
    let mut upgrade = action_step(unit, "openstack-upgrade", "Upgrade the plugin:");
    let mut resume = action_step(unit, "resume", "Resume the unit:");
    if !force {
        pause = pause.dependent();
        upgrade = upgrade.dependent();
        resume = resume.dependent();
    }
    subtree.add_child(pause);
    subtree.add_child(upgrade);
    subtree.add_child(resume);
    subtree.add_child(action_step(unit, "enable-scheduler", "Enable scheduler on"));
    subtree
}

fn action_step(unit: &str, action: &str, verb: &str) -> Step {
    let unit_name = unit.to_string();
    let action_name = action.to_string();
    let op: StepOp = Box::new(move |controller| {
        let unit_name = unit_name.clone();
        let action_name = action_name.clone();
        Box::pin(async move {
            controller.run_action(&unit_name, &action_name, HashMap::new()).await?;
            Ok(())
        })
    });
    Step::leaf(format!("{verb} '{unit}'"), StepCategory::Unit, op)
}

fn empty_hypervisor_check_step(unit: &str) -> Step {
    let unit_name = unit.to_string();
    let op: StepOp = Box::new(move |controller| {
        let unit_name = unit_name.clone();
        Box::pin(async move { check_empty_hypervisor(controller, &unit_name).await })
    });
    Step::leaf(format!("Check that unit '{unit}' has no VMs running before upgrading"), StepCategory::Unit, op)
}

async fn check_empty_hypervisor(controller: &dyn ControllerClient, unit: &str) -> Result<(), CouError> {
    let result = controller.run_action(unit, "instance-count", HashMap::new()).await?;
    let count: u64 = result.output.get("instance-count").and_then(|v| v.parse().ok()).unwrap_or(0);
    if count > 0 {
        return Err(CouError::HaltUpgradeExecution {
            unit: unit.to_string(),
            reason: format!("{count} instance(s) still running on this hypervisor"),
        });
    }
    Ok(())
}
