//! Builds the typed application set from live cluster state: classifies
//! every deployed application, splits control plane from data plane, and
//! derives the cloud's minimum current release and series.
//!
//! The vault pre-flight check lives here too (`Analysis::create` runs it
//! before classifying applications) even though it isn't itself part of
//! the application taxonomy — it is the one pre-flight gate every upgrade
//! needs regardless of which applications are present.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::apps::{self, Application};
use crate::catalog::{Catalog, OpenStackRelease};
use crate::controller::ControllerClient;
use crate::errors::CouError;

/// The typed application set for one cloud, plus the untyped (unclassified)
/// applications kept only for display.
pub struct Analysis {
    /// Every application the controller reported that the catalog could
    /// classify.
    pub apps: Vec<Application>,
    /// Application names present in the model but outside the catalog's
    /// known set (kept for the operator's awareness, excluded from
    /// planning).
    pub unclassified: Vec<String>,
}

impl Analysis {
    /// What: `Analysis.create(controller) -> Analysis`.
    ///
    /// # Errors
    /// Returns `Err(CouError::VaultSealed)` when vault is deployed and
    /// sealed; propagates controller/classification errors otherwise.
    pub async fn create(controller: &dyn ControllerClient, catalog: &Catalog) -> Result<Self, CouError> {
        let status = controller.get_status().await?;
        check_vault_unsealed(&status.applications)?;

        let mut apps = Vec::new();
        let mut unclassified = Vec::new();
        for (name, app_status) in &status.applications {
            match apps::classify(name, app_status, catalog)? {
                Some(app) => apps.push(app),
                None => unclassified.push(name.clone()),
            }
        }
        apps.sort_by(|a, b| a.core().name.cmp(&b.core().name));
        unclassified.sort();

        mark_data_plane_machines(&mut apps, catalog);
        enrich_machine_metadata(&mut apps, &status.machines);

        Ok(Self { apps, unclassified })
    }

    /// What: `split_apps(apps) -> (control_plane, data_plane)`. An
    /// application is data-plane if its charm is
    /// inherently data-plane, or any of its units shares a machine with a
    /// data-plane unit (subordinates inherit their principal's
    /// machine-level classification this way, with no special case
    /// needed).
    ///
    /// Stable: calling this twice on the same (unmutated) `apps` yields
    /// the same partition, since classification depends only on each
    /// application's own charm and the machines already marked during
    /// `create`.
    #[must_use]
    pub fn split_apps(apps: &[Application]) -> (Vec<&Application>, Vec<&Application>) {
        apps.iter().partition(|app| !is_data_plane(app))
    }

    /// What: `min_os_release_apps(apps) -> Codename?`. (step
    /// 5): minimum `current_os_release` across apps, excluding
    /// channel-based apps that still require a crossgrade (channel track
    /// `latest*` or origin charm-store).
    ///
    /// # Errors
    /// Propagates a classification error from any included app.
    pub fn min_os_release_apps<'a>(
        apps: impl IntoIterator<Item = &'a Application>,
        catalog: &Catalog,
    ) -> Result<Option<OpenStackRelease>, CouError> {
        let mut min = None;
        for app in apps {
            if needs_crossgrade_before_release_is_meaningful(app) {
                continue;
            }
            let release = app.current_os_release(catalog)?;
            min = Some(min.map_or(release, |current: OpenStackRelease| current.min(release)));
        }
        Ok(min)
    }

    /// What: `current_cloud_series`: the minimum Ubuntu series string
    /// across apps, ordered lexicographically on the declared series list
    ///
    #[must_use]
    pub fn current_cloud_series<'a>(apps: impl IntoIterator<Item = &'a Application>, catalog: &Catalog) -> Option<&'a str> {
        catalog.series.min_series(apps.into_iter().map(|a| a.core().series.as_str()))
    }
}

fn needs_crossgrade_before_release_is_meaningful(app: &Application) -> bool {
    matches!(app, Application::ChannelBased(_)) && (app.core().is_from_charm_store() || app.core().channel_track().starts_with("latest"))
}

pub(crate) fn is_data_plane(app: &Application) -> bool {
    app.core().machines.values().any(|m| m.is_data_plane)
}

/// What: Fill in each application's per-machine hostname and availability
/// zone from the model-wide status, since [`apps::classify`] only sees one
/// application's units and cannot know them on its own.
fn enrich_machine_metadata(apps: &mut [Application], machines: &HashMap<String, crate::controller::MachineStatus>) {
    for app in apps.iter_mut() {
        for (id, machine) in app.core_mut().machines.iter_mut() {
            if let Some(status) = machines.get(id) {
                machine.availability_zone =
                    if status.availability_zone.is_empty() { None } else { Some(status.availability_zone.clone()) };
                machine.hostname = if status.hostname.is_empty() { None } else { Some(status.hostname.clone()) };
            }
        }
    }
}

fn mark_data_plane_machines(apps: &mut [Application], catalog: &Catalog) {
    let mut data_plane_machine_ids: HashSet<String> = HashSet::new();
    for app in apps.iter() {
        if catalog.is_data_plane_charm(&app.core().charm) {
            data_plane_machine_ids.extend(app.core().machines.keys().cloned());
        }
    }
    for app in apps.iter_mut() {
        for (id, machine) in app.core_mut().machines.iter_mut() {
            machine.is_data_plane = data_plane_machine_ids.contains(id);
        }
    }
}

/// What: `verify_vault_is_unsealed()` — a pure structured-field check
/// against each vault unit's already-reported status, not a live command.
///
/// A unit counts as sealed when its workload status is exactly
/// `"blocked"` with the message `"Unit is sealed"`, mirroring the
/// original's `(status="blocked", info="Unit is sealed")` comparison.
fn check_vault_unsealed(applications: &HashMap<String, crate::controller::ApplicationStatus>) -> Result<(), CouError> {
    let Some(vault) = applications.get("vault") else {
        tracing::warn!("application vault not found, skip");
        return Ok(());
    };
    for unit in &vault.units {
        if unit.workload_status == "blocked" && unit.workload_info == "Unit is sealed" {
            return Err(CouError::VaultSealed);
        }
    }
    Ok(())
}

/// What: `Arc<Catalog>` is what `main` constructs and threads through; this
/// free function exists so callers that already hold an `Arc` don't need
/// to dereference it themselves.
pub async fn analyze(controller: &dyn ControllerClient, catalog: &Arc<Catalog>) -> Result<Analysis, CouError> {
    Analysis::create(controller, catalog).await
}
