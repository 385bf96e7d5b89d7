//! Assembles the ordered upgrade [`Plan`] tree: picks the target release,
//! orders applications, and composes verify-idle / backup / control-plane /
//! hypervisor groups into one root step.
//!
//! Restructured around the typed [`Application`] enum and this crate's
//! [`Step`] tree instead of a flat list of coroutines.

use std::path::Path;
use std::sync::Arc;

use crate::analyze::Analysis;
use crate::apps::Application;
use crate::backup::{backup_databases, find_database_application, ControllerBackupClient};
use crate::catalog::{Catalog, OpenStackRelease};
use crate::errors::CouError;
use crate::hypervisor;
use crate::steps::{Plan, Step, StepCategory, StepOp};

/// Timeout and settle period for the pre-flight "is the model already
/// idle" check, distinct from the per-application post-upgrade waits
/// (`AppCore::wait_timeout`), which use the operator's configured
/// standard/long idle timeouts instead.
const VERIFY_IDLE_TIMEOUT_SECS: u64 = 300;
const VERIFY_IDLE_PERIOD_SECS: u64 = 15;

/// Never exposed on the CLI (confirmed absent from the original argument
/// parser); every plan is assembled as if `--force` were never passed.
const FORCE: bool = false;

/// What: `determine_upgrade_target(min_release, series) -> Codename`
///
///
/// # Errors
/// - `Err(CouError::NoTargetError)` when either input is missing.
/// - `Err(CouError::OutOfSupportRange)` when `min_release` falls outside
///   `series`'s supported range.
/// - `Err(CouError::HighestReleaseAchieved)` when `min_release` has no
///   successor release.
pub fn determine_upgrade_target(
    min_release: Option<OpenStackRelease>,
    series: Option<&str>,
    catalog: &Catalog,
) -> Result<OpenStackRelease, CouError> {
    let (Some(min_release), Some(series)) = (min_release, series) else {
        return Err(CouError::NoTargetError);
    };
    let (lowest, highest) = catalog.series.supported_range(series)?;
    if min_release < lowest || min_release > highest {
        return Err(CouError::OutOfSupportRange { release: min_release.to_string(), series: series.to_string() });
    }
    min_release.next().ok_or(CouError::HighestReleaseAchieved { release: min_release.to_string() })
}

/// What: `generate_plan(analysis, args) -> Plan`.
///
/// Output: The assembled root step, plus any advisory messages about
/// data-plane applications that could not be planned (non-fatal; printed
/// alongside the plan rather than aborting it).
///
/// # Errors
/// Aborts (returns `Err`) when the target cannot be determined, or when a
/// control-plane application's plan fails with anything other than
/// `HaltUpgradePlanGeneration`.
pub fn generate_plan(analysis: &Analysis, no_backup: bool, data_dir: &Path, catalog: &Arc<Catalog>) -> Result<(Plan, Vec<String>), CouError> {
    let (control_plane, data_plane) = Analysis::split_apps(&analysis.apps);
    let min_release = Analysis::min_os_release_apps(control_plane.iter().copied(), catalog)?;
    let series = Analysis::current_cloud_series(control_plane.iter().copied(), catalog);
    let target = determine_upgrade_target(min_release, series, catalog)?;

    let mut root = Step::new(format!("Upgrade cloud to '{target}'"), StepCategory::UpgradePlan, false);
    root.add_child(verify_idle_step());
    if !no_backup {
        if let Some(step) = backup_step(analysis, data_dir) {
            root.add_child(step);
        }
    }

    let (principals, subordinates): (Vec<&Application>, Vec<&Application>) =
        control_plane.into_iter().partition(|app| !is_subordinate(app));
    root.add_child(build_group(&principals, target, catalog, "Upgrade control-plane principal applications")?);
    root.add_child(build_group(&subordinates, target, catalog, "Upgrade control-plane subordinate applications")?);

    let mut advisories = Vec::new();
    root.add_child(hypervisor_group(&data_plane, target, catalog, &mut advisories));

    Ok((root, advisories))
}

fn is_subordinate(app: &Application) -> bool {
    matches!(app, Application::Subordinate(_) | Application::AuxiliarySubordinate(_) | Application::OvnSubordinate(_))
}

/// What: `apps` sorted by `UPGRADE_ORDER` position; a stable sort since
/// `Analysis::create` has already sorted applications by name, so ties
/// within `UPGRADE_ORDER` (or charms absent from it) keep deterministic
/// name order.
fn ordered<'a>(apps: &[&'a Application], catalog: &Catalog) -> Vec<&'a Application> {
    let mut sorted = apps.to_vec();
    sorted.sort_by_key(|app| catalog.charms.upgrade_order_position(&app.core().charm));
    sorted
}

/// What: Build one top-level group step: one `ApplicationUpgradePlan` per
/// app in `apps`, in `UPGRADE_ORDER`.
///
/// # Errors
/// `HaltUpgradePlanGeneration` from an individual app is logged and
/// dropped; any other error aborts the whole group
/// (and therefore the whole plan).
fn build_group(apps: &[&Application], target: OpenStackRelease, catalog: &Arc<Catalog>, label: &str) -> Result<Step, CouError> {
    let mut group = Step::new(label, StepCategory::UpgradePlan, false);
    for app in ordered(apps, catalog) {
        match app.generate_upgrade_plan(target, FORCE, catalog) {
            Ok(step) => group.add_child(step),
            Err(CouError::HaltUpgradePlanGeneration { app }) => {
                tracing::info!("{app}: nothing to do, skipping");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(group)
}

/// What: The data-plane `HypervisorUpgradePlan` group, built from every
/// classified `NovaCompute` application.
///
/// Non-nova-compute data-plane applications (e.g. co-located `ceph-osd`)
/// are not yet folded into this tree; see `DESIGN.md` for the scope
/// decision.
///
/// Output: A failure planning the hypervisor group is recorded in
/// `advisories` and does not fail the overall plan.
fn hypervisor_group(data_plane: &[&Application], target: OpenStackRelease, catalog: &Arc<Catalog>, advisories: &mut Vec<String>) -> Step {
    let nova_apps: Vec<&Application> = data_plane.iter().copied().filter(|app| matches!(app, Application::NovaCompute(_))).collect();
    match hypervisor::build_hypervisor_group(&nova_apps, target, FORCE, catalog) {
        Ok(step) => step,
        Err(err) => {
            advisories.push(format!("data plane hypervisor planning failed, skipping: {err}"));
            Step::new("Upgrade plan for data plane hypervisors", StepCategory::HypervisorUpgradePlan, true)
        }
    }
}

fn verify_idle_step() -> Step {
    let op: StepOp = Box::new(|controller| {
        Box::pin(async move { controller.wait_for_active_idle(VERIFY_IDLE_TIMEOUT_SECS, None, true, VERIFY_IDLE_PERIOD_SECS).await })
    });
    Step::leaf("Verify that the cloud is in an idle state before upgrading", StepCategory::PreUpgrade, op)
}

/// What: The database-backup step, when a `mysql-innodb-cluster`
/// application related to `keystone` exists; `None` otherwise (nothing to
/// back up, so the caller simply omits the step rather than failing).
fn backup_step(analysis: &Analysis, data_dir: &Path) -> Option<Step> {
    let candidates: Vec<(&str, &str, &[String])> =
        analysis.apps.iter().map(|app| (app.core().name.as_str(), app.core().charm.as_str(), app.core().relations.as_slice())).collect();
    let db_app_name = find_database_application(candidates)?;
    let db_app = analysis.apps.iter().find(|app| app.core().name == db_app_name)?;
    let unit = db_app.core().unit_names().into_iter().next()?;

    let description = format!("Backup databases via unit '{unit}'");
    let data_dir = data_dir.to_path_buf();
    let op: StepOp = Box::new(move |controller| {
        let unit = unit.clone();
        let data_dir = data_dir.clone();
        Box::pin(async move {
            let client = ControllerBackupClient::new(controller);
            backup_databases(&client, &unit, &data_dir).await?;
            Ok(())
        })
    });
    Some(Step::leaf(description, StepCategory::PreUpgrade, op))
}
