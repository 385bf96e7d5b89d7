//! Charm classification sets and the control-plane ordering list.

use std::collections::HashMap;

use crate::catalog::release::OpenStackRelease;
use crate::errors::CouError;

/// The taxonomy a charm is classified into. `Plain` is the fallback for
/// charms outside the known set; unknown charms map to this variant and
/// are excluded from planning, keeping them only for display (see
/// `apps::factory`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CharmClass {
    /// `OpenStackApplication`.
    Principal,
    /// `ChannelBasedApplication`.
    ChannelBased,
    /// `SubordinateApplication`.
    Subordinate,
    /// `OpenStackAuxiliaryApplication`.
    Auxiliary,
    /// `AuxiliarySubordinate`.
    AuxiliarySubordinate,
    /// `CephMon`.
    CephMon,
    /// `OvnPrincipal`.
    OvnPrincipal,
    /// `OvnSubordinate`.
    OvnSubordinate,
    /// `NovaCompute`.
    NovaCompute,
}

impl CharmClass {
    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "principal" => Self::Principal,
            "channel_based" => Self::ChannelBased,
            "subordinate" => Self::Subordinate,
            "auxiliary" => Self::Auxiliary,
            "auxiliary_subordinate" => Self::AuxiliarySubordinate,
            "ceph_mon" => Self::CephMon,
            "ovn_principal" => Self::OvnPrincipal,
            "ovn_subordinate" => Self::OvnSubordinate,
            "nova_compute" => Self::NovaCompute,
            _ => return None,
        })
    }

    /// What: True for variants whose `DATA_PLANE_CHARMS` membership is
    /// fixed by class alone (`nova-compute`, `ceph-osd`) rather than by
    /// co-location (the minimum data-plane charm set).
    #[must_use]
    pub const fn is_inherently_data_plane(self) -> bool {
        matches!(self, Self::NovaCompute)
    }
}

/// Charm classification plus control-plane ordering, loaded from the
/// `charm_classes.csv` and `upgrade_order.csv` data assets.
#[derive(Debug, Default)]
pub struct CharmTable {
    classes: HashMap<String, CharmClass>,
    order: HashMap<String, u32>,
    ceph_release: HashMap<OpenStackRelease, String>,
    ceph_release_codenames: HashMap<String, Vec<OpenStackRelease>>,
}

impl CharmTable {
    /// What: Load charm classes, `UPGRADE_ORDER`, and the Ceph release map
    /// from their CSV assets.
    ///
    /// # Errors
    /// Returns `Err` when a row names an unrecognized class or codename.
    pub fn load(classes_csv: &str, order_csv: &str, ceph_csv: &str) -> Result<Self, CouError> {
        let mut classes = HashMap::new();
        let mut reader = csv::Reader::from_reader(classes_csv.as_bytes());
        for record in reader.records() {
            let record = record.map_err(|e| CouError::RunUpgradeError(e.to_string()))?;
            let charm = record.get(0).unwrap_or_default().to_string();
            let class_str = record.get(1).unwrap_or_default();
            let class = CharmClass::parse(class_str)
                .ok_or_else(|| CouError::UnknownCharm(format!("unrecognized class {class_str:?} for {charm}")))?;
            classes.insert(charm, class);
        }

        let mut order = HashMap::new();
        let mut reader = csv::Reader::from_reader(order_csv.as_bytes());
        for record in reader.records() {
            let record = record.map_err(|e| CouError::RunUpgradeError(e.to_string()))?;
            let charm = record.get(0).unwrap_or_default().to_string();
            let ord: u32 = record
                .get(1)
                .unwrap_or_default()
                .parse()
                .map_err(|_| CouError::RunUpgradeError(format!("bad upgrade order for {charm}")))?;
            order.insert(charm, ord);
        }

        let mut ceph_release = HashMap::new();
        let mut ceph_release_codenames: HashMap<String, Vec<OpenStackRelease>> = HashMap::new();
        let mut reader = csv::Reader::from_reader(ceph_csv.as_bytes());
        for record in reader.records() {
            let record = record.map_err(|e| CouError::RunUpgradeError(e.to_string()))?;
            let codename = OpenStackRelease::parse(record.get(0).unwrap_or_default())?;
            let release = record.get(1).unwrap_or_default().to_string();
            ceph_release_codenames.entry(release.clone()).or_default().push(codename);
            ceph_release.insert(codename, release);
        }

        Ok(Self { classes, order, ceph_release, ceph_release_codenames })
    }

    /// What: `classify(charm) → Option<CharmClass>`; `None` means the charm
    /// is outside the known set.
    #[must_use]
    pub fn classify(&self, charm: &str) -> Option<CharmClass> {
        self.classes.get(charm).copied()
    }

    /// What: Position of `charm` in `UPGRADE_ORDER`, for sorting the
    /// control-plane principal group. Charms absent from the table sort
    /// last, in the order they were encountered (a stable sort upstream
    /// preserves that).
    #[must_use]
    pub fn upgrade_order_position(&self, charm: &str) -> u32 {
        self.order.get(charm).copied().unwrap_or(u32::MAX)
    }

    /// What: `openstack_to_ceph_release(codename) → ceph release name`,
    /// e.g. `"quincy"` → `"yoga"`'s counterpart. Used by the `require-osd-release`
    /// pre/post-upgrade steps.
    ///
    /// # Errors
    /// Returns `Err(RunUpgradeError)` listing the supported releases when
    /// the codename has no mapping; unknown Ceph codenames abort with
    /// `RunUpgradeError` listing the supported releases.
    pub fn openstack_to_ceph_release(&self, codename: OpenStackRelease) -> Result<&str, CouError> {
        self.ceph_release.get(&codename).map(String::as_str).ok_or_else(|| {
            CouError::RunUpgradeError(format!(
                "no Ceph release known for {codename}; supported releases: octopus, pacific, quincy"
            ))
        })
    }

    /// What: `ceph_release_to_openstack(release) → OpenStack codename`,
    /// the inverse of `openstack_to_ceph_release`. Several codenames can
    /// share one Ceph release (e.g. `yoga`, `zed` and `antelope` all ship
    /// `quincy`), so this takes the max of the mapped set - the same
    /// "latest codename wins" rule `channel_codename` uses for auxiliary
    /// tracks. Used to parse `ceph-mon`'s channel track, which names a
    /// Ceph release rather than an OpenStack codename.
    ///
    /// # Errors
    /// Returns `Err(RunUpgradeError)` when `release` matches no row in the
    /// Ceph release map.
    pub fn ceph_release_to_openstack(&self, release: &str) -> Result<OpenStackRelease, CouError> {
        self.ceph_release_codenames
            .get(release)
            .and_then(|codenames| codenames.iter().copied().max())
            .ok_or_else(|| CouError::RunUpgradeError(format!("unrecognized Ceph release '{release}'")))
    }

    /// What: `DATA_PLANE_CHARMS`-style test: is this charm inherently data
    /// plane by class (co-location-derived membership is computed
    /// separately in `analyze`).
    #[must_use]
    pub fn is_inherently_data_plane(&self, charm: &str) -> bool {
        self.classify(charm).is_some_and(CharmClass::is_inherently_data_plane)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CharmTable {
        CharmTable::load(
            include_str!("../../assets/charm_classes.csv"),
            include_str!("../../assets/upgrade_order.csv"),
            include_str!("../../assets/ceph_release_map.csv"),
        )
        .unwrap()
    }

    #[test]
    fn classifies_known_charms() {
        let table = sample();
        assert_eq!(table.classify("keystone"), Some(CharmClass::Principal));
        assert_eq!(table.classify("nova-compute"), Some(CharmClass::NovaCompute));
        assert_eq!(table.classify("ceph-mon"), Some(CharmClass::CephMon));
        assert_eq!(table.classify("totally-unknown"), None);
    }

    #[test]
    fn ceph_release_map_covers_documented_releases() {
        let table = sample();
        let yoga = OpenStackRelease::parse("yoga").unwrap();
        assert_eq!(table.openstack_to_ceph_release(yoga).unwrap(), "quincy");
    }

    #[test]
    fn ceph_release_to_openstack_takes_the_latest_codename_sharing_a_release() {
        let table = sample();
        // yoga, zed and antelope all ship quincy; the max of that set is antelope.
        let antelope = OpenStackRelease::parse("antelope").unwrap();
        assert_eq!(table.ceph_release_to_openstack("quincy").unwrap(), antelope);
        assert!(table.ceph_release_to_openstack("nonexistent-release").is_err());
    }

    #[test]
    fn upgrade_order_sorts_known_charms_before_unknown() {
        let table = sample();
        assert!(table.upgrade_order_position("keystone") < table.upgrade_order_position("not-a-charm"));
    }
}
