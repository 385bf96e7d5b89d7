//! Typed application model and per-class upgrade-step generation.
//!
//! An [`Application`] is a tagged variant over the charm classes the
//! release catalog knows about (`registry: map<charm_name, factory>` from
//! the design notes is [`factory::classify`]); unknown charms are kept only
//! for display and excluded from planning.

pub mod core;
pub mod factory;

mod ceph;
pub(crate) mod nova_compute;
mod ovn;
mod principal;
mod steps_common;

pub use self::core::{AppCore, Machine, Origin, Unit};
pub use factory::classify;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::catalog::{Catalog, OpenStackRelease};
use crate::errors::CouError;
use crate::steps::Step;

/// The class an application was classified into. Mirrors
/// [`crate::catalog::CharmClass`] one-to-one; kept distinct because the
/// catalog's version is pure data lookup while this one carries behavior.
#[derive(Clone, Debug)]
pub enum Application {
    /// `OpenStackApplication`: a principal control-plane charm.
    Principal(AppCore),
    /// `ChannelBasedApplication`: version is derived from channel, not
    /// workload.
    ChannelBased(AppCore),
    /// `SubordinateApplication`: co-located with a principal, owns no
    /// packages or post-upgrade steps.
    Subordinate(AppCore),
    /// `OpenStackAuxiliaryApplication`: e.g. `rabbitmq-server`, `vault`,
    /// `hacluster`. Tracks are not OpenStack codenames.
    Auxiliary(AppCore),
    /// `AuxiliarySubordinate`: subordinate shape with auxiliary channel
    /// logic.
    AuxiliarySubordinate(AppCore),
    /// `CephMon`: channel-based plus the `require-osd-release` dance.
    CephMon(AppCore),
    /// `OvnPrincipal`: principal plus the OVN version gate.
    OvnPrincipal(AppCore),
    /// `OvnSubordinate`: subordinate plus the OVN version gate.
    OvnSubordinate(AppCore),
    /// `NovaCompute`: data-plane hypervisor charm with its own per-unit
    /// step shape.
    NovaCompute(AppCore),
}

impl Application {
    /// What: The shared fields, regardless of variant.
    #[must_use]
    pub const fn core(&self) -> &AppCore {
        match self {
            Self::Principal(c)
            | Self::ChannelBased(c)
            | Self::Subordinate(c)
            | Self::Auxiliary(c)
            | Self::AuxiliarySubordinate(c)
            | Self::CephMon(c)
            | Self::OvnPrincipal(c)
            | Self::OvnSubordinate(c)
            | Self::NovaCompute(c) => c,
        }
    }

    pub(crate) fn core_mut(&mut self) -> &mut AppCore {
        match self {
            Self::Principal(c)
            | Self::ChannelBased(c)
            | Self::Subordinate(c)
            | Self::Auxiliary(c)
            | Self::AuxiliarySubordinate(c)
            | Self::CephMon(c)
            | Self::OvnPrincipal(c)
            | Self::OvnSubordinate(c)
            | Self::NovaCompute(c) => c,
        }
    }

    /// What: Whether this variant carries its own package-upgrade
    /// pre-upgrade step. Every variant except the subordinate-shaped ones
    /// does (packages on a subordinate-shaped app are owned by its
    /// principal, per spec.md §4.3's "Pre-upgrade package step is
    /// omitted" delta, which names only the subordinate variants).
    fn has_package_step(&self) -> bool {
        !matches!(
            self,
            Self::Subordinate(_) | Self::AuxiliarySubordinate(_) | Self::OvnSubordinate(_)
        )
    }

    /// What: Whether this variant ever emits post-upgrade steps at all
    /// (subordinates never do).
    fn has_post_upgrade_shape(&self) -> bool {
        !matches!(
            self,
            Self::Subordinate(_) | Self::AuxiliarySubordinate(_) | Self::OvnSubordinate(_)
        )
    }

    /// What: Whether channel tracks for this variant map through the
    /// auxiliary track table rather than parsing directly as a codename.
    fn uses_auxiliary_tracks(&self) -> bool {
        matches!(self, Self::Auxiliary(_) | Self::AuxiliarySubordinate(_))
    }

    /// What: Whether `_check_application_target` should ignore
    /// `apt_source_codename` (subordinate-shaped variants).
    fn ignores_apt_source_in_target_check(&self) -> bool {
        matches!(
            self,
            Self::Subordinate(_) | Self::AuxiliarySubordinate(_) | Self::OvnSubordinate(_)
        )
    }

    /// What: Whether this variant derives `current_os_release` from its
    /// units' workload versions (principal-shaped, and `CephMon` - its
    /// units report Ceph package versions, which `release_table.csv` maps
    /// back to an OpenStack codename same as any other workload) rather
    /// than from its channel.
    fn derives_release_from_units(&self) -> bool {
        matches!(self, Self::Principal(_) | Self::OvnPrincipal(_) | Self::NovaCompute(_) | Self::CephMon(_))
    }

    /// What: Whether channel tracks for this variant name a Ceph release
    /// (`quincy`, `reef`, ...) rather than an OpenStack codename, and so
    /// must go through the Ceph release map instead of parsing directly.
    fn uses_ceph_channel_mapping(&self) -> bool {
        matches!(self, Self::CephMon(_))
    }

    /// What: Whether every unit's workload version must be at least
    /// `22.03.0` before any pre-upgrade step runs.
    fn uses_ovn_version_gate(&self) -> bool {
        matches!(self, Self::OvnPrincipal(_) | Self::OvnSubordinate(_))
    }

    /// What: Whether this variant injects the `require-osd-release`
    /// pre-/post-upgrade steps.
    fn uses_ceph_release_gate(&self) -> bool {
        matches!(self, Self::CephMon(_))
    }

    /// What: Whether per-unit upgrade steps follow the hypervisor shape
    /// (`disable-scheduler` / empty-hypervisor-check / ... /
    /// `enable-scheduler`) instead of the plain `pause/openstack-upgrade/resume`
    /// shape.
    fn is_nova_compute(&self) -> bool {
        matches!(self, Self::NovaCompute(_))
    }

    /// What: Per-unit workload-version -> codename map, used both to
    /// derive `current_os_release` for principal-shaped variants and by
    /// the verify-workload post-upgrade step.
    ///
    /// # Errors
    /// Returns `Err(UnknownVersion)` if a unit's workload version matches
    /// no codename in the catalog.
    pub fn os_release_units(&self, catalog: &Catalog) -> Result<BTreeMap<OpenStackRelease, Vec<String>>, CouError> {
        let core = self.core();
        let mut map: BTreeMap<OpenStackRelease, Vec<String>> = BTreeMap::new();
        for name in core.unit_names() {
            let unit = &core.units[&name];
            let codename = catalog.versions.latest_compatible(&core.charm, &unit.workload_version)?;
            map.entry(codename).or_default().push(name);
        }
        Ok(map)
    }

    /// What: `current_os_release`: `min(os_release_units.keys())` for
    /// principal-shaped variants, else `channel_codename`.
    ///
    /// # Errors
    /// Propagates whichever derivation's error.
    pub fn current_os_release(&self, catalog: &Catalog) -> Result<OpenStackRelease, CouError> {
        if self.derives_release_from_units() {
            self.os_release_units(catalog)?
                .keys()
                .next()
                .copied()
                .ok_or_else(|| CouError::ApplicationError {
                    app: self.core().name.clone(),
                    reason: "application has no units to derive a release from".to_string(),
                    remediation: None,
                })
        } else {
            self.channel_codename(catalog)
        }
    }

    /// What: The codename implied by the current channel track.
    ///
    /// For auxiliary-shaped variants this goes through the auxiliary
    /// track table and takes the max of the mapped set (charm-store
    /// installs with no recognizable track default to `ussuri`, per
    /// auxiliary track table). For `CephMon` the track names a Ceph
    /// release (`"quincy/stable"`, not an OpenStack codename) and goes
    /// through the Ceph release map instead. Everything else's track
    /// parses directly as a codename.
    ///
    /// # Errors
    /// Returns `Err(InvalidChannel)` when the track maps to no codename.
    pub fn channel_codename(&self, catalog: &Catalog) -> Result<OpenStackRelease, CouError> {
        let core = self.core();
        if self.uses_auxiliary_tracks() {
            let track = core.channel_track();
            let codenames = catalog.auxiliary_tracks.track_to_codename(&core.charm, &core.series, track);
            codenames.into_iter().max().map_or_else(
                || {
                    if core.is_from_charm_store() {
                        OpenStackRelease::parse("ussuri")
                    } else {
                        Err(CouError::InvalidChannel { app: core.name.clone(), channel: core.channel.clone() })
                    }
                },
                Ok,
            )
        } else if self.uses_ceph_channel_mapping() {
            catalog
                .charms
                .ceph_release_to_openstack(core.channel_track())
                .map_err(|_| CouError::InvalidChannel { app: core.name.clone(), channel: core.channel.clone() })
        } else {
            OpenStackRelease::parse(core.channel_track())
                .map_err(|_| CouError::InvalidChannel { app: core.name.clone(), channel: core.channel.clone() })
        }
    }

    /// What: Channels this application could currently be sitting on
    /// without needing a crossgrade — used to pick the refresh-charm step.
    fn possible_current_channels(&self, catalog: &Catalog) -> Result<Vec<String>, CouError> {
        let core = self.core();
        if self.uses_auxiliary_tracks() {
            let current = self.current_os_release(catalog)?;
            Ok(catalog
                .auxiliary_tracks
                .codename_to_tracks(&core.charm, &core.series, current)
                .into_iter()
                .map(|track| format!("{track}/stable"))
                .collect())
        } else if self.uses_ceph_channel_mapping() {
            let current = self.current_os_release(catalog)?;
            let ceph_release = catalog.charms.openstack_to_ceph_release(current)?;
            Ok(vec![format!("{ceph_release}/stable")])
        } else {
            Ok(vec![format!("{}/stable", self.current_os_release(catalog)?)])
        }
    }

    /// What: The channel this application should track once upgraded to
    /// `target`.
    fn target_channel(&self, target: OpenStackRelease, catalog: &Catalog) -> Result<String, CouError> {
        let core = self.core();
        if self.uses_auxiliary_tracks() {
            let tracks = catalog.auxiliary_tracks.codename_to_tracks(&core.charm, &core.series, target);
            let track = tracks.into_iter().max_by_key(|t| t.len()).ok_or_else(|| CouError::InvalidChannel {
                app: core.name.clone(),
                channel: core.channel.clone(),
            })?;
            Ok(format!("{track}/stable"))
        } else if self.uses_ceph_channel_mapping() {
            let ceph_release = catalog.charms.openstack_to_ceph_release(target)?;
            Ok(format!("{ceph_release}/stable"))
        } else {
            Ok(format!("{target}/stable"))
        }
    }

    /// What: Whether every unit of this application reports an empty
    /// workload version (`ChannelBasedApplication.is_versionless`).
    fn is_versionless(&self) -> bool {
        self.core().units.values().all(|u| u.workload_version.is_empty())
    }

    /// What: `generate_upgrade_plan(target, force) -> ApplicationUpgradePlan`.
    ///
    /// # Errors
    /// - `Err(CouError::HaltUpgradePlanGeneration)` when there is nothing
    ///   to do for this app at `target`.
    /// - `Err(CouError::ApplicationError)` / other taxonomy members on an
    ///   invariant violation (mismatched versions, disabled auto-restarts,
    ///   OVN too old, invalid channel, ...).
    pub fn generate_upgrade_plan(&self, target: OpenStackRelease, force: bool, catalog: &Arc<Catalog>) -> Result<Step, CouError> {
        steps_common::generate_upgrade_plan(self, target, force, catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_core(charm: &str) -> AppCore {
        AppCore {
            name: charm.to_string(),
            charm: charm.to_string(),
            channel: "ussuri/stable".to_string(),
            origin: Origin::parse(charm, "ch").unwrap(),
            series: "focal".to_string(),
            config: std::collections::HashMap::new(),
            subordinate_to: Vec::new(),
            can_upgrade_to: None,
            units: std::collections::HashMap::new(),
            machines: std::collections::HashMap::new(),
            wait_timeout: 300,
            wait_for_model: false,
            packages_to_hold: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// spec.md §4.3 names exactly one variant that omits the pre-upgrade
    /// package step ("Pre-upgrade package step is omitted" for
    /// `SubordinateApplication`); every other variant, including
    /// `ChannelBased`/`Auxiliary`/`AuxiliarySubordinate`/`CephMon`, carries
    /// its own package upgrade like any other principal-shaped app.
    #[test]
    fn only_subordinate_shaped_variants_omit_the_package_step() {
        let core = bare_core("charm");
        assert!(Application::Principal(core.clone()).has_package_step());
        assert!(Application::ChannelBased(core.clone()).has_package_step());
        assert!(Application::Auxiliary(core.clone()).has_package_step());
        assert!(Application::CephMon(core.clone()).has_package_step());
        assert!(Application::OvnPrincipal(core.clone()).has_package_step());
        assert!(Application::NovaCompute(core.clone()).has_package_step());
        assert!(!Application::Subordinate(core.clone()).has_package_step());
        assert!(!Application::AuxiliarySubordinate(core.clone()).has_package_step());
        assert!(!Application::OvnSubordinate(core).has_package_step());
    }
}
