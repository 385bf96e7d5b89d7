//! Step builders shared by every principal-shaped variant: the
//! package-upgrade pre-upgrade step and the refresh-charm step every
//! variant (principal or not) needs.

use crate::apps::Application;
use crate::catalog::{Catalog, OpenStackRelease};
use crate::errors::CouError;
use crate::steps::{Step, StepCategory, StepOp};

/// What: *Package upgrade* pre-upgrade step: one
/// parallel container with one child per unit, each running
/// `apt-get update && dist-upgrade && autoremove`, wrapped in
/// `apt-mark hold/unhold` when `packages_to_hold` is non-empty.
#[must_use]
pub fn package_upgrade_step(app: &Application) -> Step {
    let core = app.core();
    let mut container = Step::new(
        format!("Upgrade software packages of '{}' from the current APT repositories", core.name),
        StepCategory::PreUpgrade,
        true,
    );
    for unit in core.unit_names() {
        container.add_child(unit_package_upgrade_step(&unit, &core.packages_to_hold));
    }
    container
}

fn unit_package_upgrade_step(unit: &str, packages_to_hold: &[String]) -> Step {
    let unit_name = unit.to_string();
    let packages = packages_to_hold.to_vec();
    let op: StepOp = Box::new(move |controller| {
        let unit_name = unit_name.clone();
        let packages = packages.clone();
        Box::pin(async move {
            if !packages.is_empty() {
                controller.run_on_unit(&unit_name, &format!("apt-mark hold {}", packages.join(" ")), 120).await?;
            }
            controller
                .run_on_unit(&unit_name, "apt-get update && apt-get dist-upgrade -y && apt-get autoremove -y", 1800)
                .await?;
            if !packages.is_empty() {
                controller.run_on_unit(&unit_name, &format!("apt-mark unhold {}", packages.join(" ")), 120).await?;
            }
            Ok(())
        })
    });
    Step::leaf(format!("Upgrade packages on unit '{unit}'"), StepCategory::Unit, op)
}

/// What: *Refresh charm* pre-upgrade step: exactly one
/// of a charmstore migration, a refresh-to-latest, a no-op (`Ok(None)`),
/// or an error.
///
/// # Errors
/// Returns `Err(CouError::ApplicationError)` when the current channel is
/// neither a recognized "current" channel nor already at or above
/// `target`.
pub fn refresh_charm_step(app: &Application, target: OpenStackRelease, catalog: &Catalog) -> Result<Option<Step>, CouError> {
    let core = app.core();
    if core.is_from_charm_store() {
        return Ok(Some(migrate_from_charm_store_step(app)));
    }

    let possible_current = app.possible_current_channels(catalog)?;
    if possible_current.iter().any(|channel| channel == &core.channel) {
        return Ok(Some(refresh_to_latest_step(app)));
    }

    let current_codename = app.channel_codename(catalog)?;
    if current_codename >= target {
        return Ok(None);
    }

    Err(CouError::ApplicationError {
        app: core.name.clone(),
        reason: format!(
            "current channel '{}' is neither a recognized current channel nor already at or above '{target}'",
            core.channel
        ),
        remediation: None,
    })
}

fn migrate_from_charm_store_step(app: &Application) -> Step {
    let core = app.core();
    let app_name = core.name.clone();
    let channel = core.channel.clone();
    let op: StepOp = Box::new(move |controller| {
        let app_name = app_name.clone();
        let channel = channel.clone();
        Box::pin(async move { controller.upgrade_charm(&app_name, Some(&channel), None).await })
    });
    Step::leaf(format!("Migrate '{}' from charmstore to charmhub", core.name), StepCategory::PreUpgrade, op)
}

fn refresh_to_latest_step(app: &Application) -> Step {
    let core = app.core();
    let app_name = core.name.clone();
    let channel = core.channel.clone();
    let op: StepOp = Box::new(move |controller| {
        let app_name = app_name.clone();
        Box::pin(async move { controller.upgrade_charm(&app_name, None, None).await })
    });
    Step::leaf(format!("Refresh '{}' to the latest revision of '{}'", core.name, channel), StepCategory::PreUpgrade, op)
}
