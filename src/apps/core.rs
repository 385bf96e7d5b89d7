//! Shared application data: identity, relations, and the derived
//! attributes every variant builds on.

use std::collections::HashMap;

use crate::catalog::{Catalog, OpenStackRelease};
use crate::errors::CouError;

/// Charm repository origin: Charmhub (`ch`) or the legacy charm store
/// (`cs`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    /// Charmhub-origin charm.
    Charmhub,
    /// Legacy charm-store origin; triggers a one-time migration step.
    CharmStore,
}

impl Origin {
    /// What: Parse the `origin` field as reported by the controller.
    ///
    /// # Errors
    /// Returns `Err(CouError::ApplicationError)` for any value other than
    /// `"ch"`/`"cs"`.
    pub fn parse(app: &str, raw: &str) -> Result<Self, CouError> {
        match raw {
            "ch" => Ok(Self::Charmhub),
            "cs" => Ok(Self::CharmStore),
            other => Err(CouError::ApplicationError {
                app: app.to_string(),
                reason: format!("unrecognized charm origin {other:?}"),
                remediation: None,
            }),
        }
    }
}

/// A unit of a deployed application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unit {
    /// Unit name, e.g. `"keystone/0"`.
    pub name: String,
    /// Machine (or container) id the unit is deployed to.
    pub machine: String,
    /// Reported workload version; empty for versionless applications.
    pub workload_version: String,
    /// Juju agent status, when known.
    pub agent_status: Option<String>,
}

/// A machine (or container) hosting one or more units.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Machine {
    /// Machine id.
    pub id: String,
    /// Hostname as reported by the hypervisor, when known.
    pub hostname: Option<String>,
    /// Availability zone, when the cloud reports one.
    pub availability_zone: Option<String>,
    /// True iff a data-plane application (or a subordinate of one) has a
    /// unit on this machine. Computed during analysis, not at construction,
    /// since it depends on the whole deployed set.
    pub is_data_plane: bool,
}

/// Fields shared by every application variant.
///
/// The fields every charm class shares, regardless of how it upgrades.
/// Each variant wraps one of these
/// plus whatever extra fields its class needs (e.g. `CephMon`'s ceph
/// release cache).
#[derive(Clone, Debug)]
pub struct AppCore {
    /// Application name as deployed (may differ from the charm name).
    pub name: String,
    /// Charm name backing this application.
    pub charm: String,
    /// Current channel, e.g. `"ussuri/stable"`.
    pub channel: String,
    /// Charm repository origin.
    pub origin: Origin,
    /// Ubuntu series the application is deployed on.
    pub series: String,
    /// Application config as currently set.
    pub config: HashMap<String, String>,
    /// Names of principal applications this one is subordinate to (empty
    /// for principals).
    pub subordinate_to: Vec<String>,
    /// Channel Juju reports the charm could be refreshed to, if any.
    pub can_upgrade_to: Option<String>,
    /// Units, keyed by unit name.
    pub units: HashMap<String, Unit>,
    /// Machines this application has units on, keyed by machine id.
    pub machines: HashMap<String, Machine>,
    /// Idle-wait timeout in seconds for this application's post-upgrade
    /// wait step.
    pub wait_timeout: u64,
    /// Whether the post-upgrade wait is for the whole model (`true`) or
    /// this application only (`false`).
    pub wait_for_model: bool,
    /// Packages to `apt-mark hold` around the package-upgrade step.
    pub packages_to_hold: Vec<String>,
    /// Application names this one is related to, `app:endpoint` form as
    /// reported by the controller. Used only to locate the database
    /// backup target (`mysql-innodb-cluster` related to `keystone` via
    /// `db-router`).
    pub relations: Vec<String>,
}

impl AppCore {
    /// What: Which config key (`"openstack-origin"` or `"source"`) selects
    /// the APT repository, if either is present.
    #[must_use]
    pub fn origin_setting(&self) -> Option<&'static str> {
        if self.config.contains_key("openstack-origin") {
            Some("openstack-origin")
        } else if self.config.contains_key("source") {
            Some("source")
        } else {
            None
        }
    }

    /// What: The value of whichever origin-setting key is present.
    #[must_use]
    pub fn os_origin(&self) -> Option<&str> {
        self.origin_setting().and_then(|key| self.config.get(key)).map(String::as_str)
    }

    /// What: The codename implied by `os_origin`, falling back to the
    /// series' distro default when `os_origin` is `"distro"` or absent.
    ///
    /// Input: `os_origin` values of the form `"cloud:<series>-<codename>"`
    /// are parsed directly; anything else (including `"distro"`) resolves
    /// through [`crate::catalog::SeriesTable::distro_default_codename`].
    ///
    /// # Errors
    /// Propagates `UnknownRelease` from a malformed `cloud:` value or an
    /// unrecognized series.
    pub fn apt_source_codename(&self, catalog: &Catalog) -> Result<OpenStackRelease, CouError> {
        match self.os_origin() {
            Some(value) if value.starts_with("cloud:") => {
                let tail = &value["cloud:".len()..];
                let codename = tail.rsplit_once('-').map_or(tail, |(_, codename)| codename);
                OpenStackRelease::parse(codename)
            }
            _ => catalog.series.distro_default_codename(&self.series),
        }
    }

    /// What: The track portion of `channel`, i.e. everything before `/`.
    #[must_use]
    pub fn channel_track(&self) -> &str {
        self.channel.split_once('/').map_or(self.channel.as_str(), |(track, _)| track)
    }

    /// What: True when this application was deployed from the legacy charm
    /// store and has not yet migrated to Charmhub.
    #[must_use]
    pub const fn is_from_charm_store(&self) -> bool {
        matches!(self.origin, Origin::CharmStore)
    }

    /// What: `enable-auto-restarts` is present and explicitly `false`.
    #[must_use]
    pub fn auto_restarts_disabled(&self) -> bool {
        self.config.get("enable-auto-restarts").is_some_and(|v| v == "false")
    }

    /// What: Unit names in a stable order (insertion order is irrelevant;
    /// sorted here for deterministic step generation).
    #[must_use]
    pub fn unit_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.units.keys().cloned().collect();
        names.sort();
        names
    }
}
