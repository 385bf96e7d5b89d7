//! Static knowledge: ordered OpenStack codenames, per-charm workload
//! version ranges, charm classification, and the Ceph release map.
//!
//! The catalog is loaded once (from `main`, via [`Catalog::load_default`])
//! and threaded through the rest of the program as an `Arc<Catalog>`,
//! per the design note on "global-ish state": no ambient singleton is
//! reached into from deep call sites that weren't handed a reference.

pub mod charms;
pub mod release;
pub mod table;

pub use charms::{CharmClass, CharmTable};
pub use release::OpenStackRelease;
pub use table::{AuxiliaryTrackTable, SeriesTable, WorkloadCodenameTable};

use crate::errors::CouError;

/// Charms this crate always treats as producing data-plane workloads,
/// independent of co-location: at minimum `nova-compute` and `ceph-osd`.
pub const MINIMUM_DATA_PLANE_CHARMS: &[&str] = &["nova-compute", "ceph-osd"];

/// The aggregate release catalog: every lookup table the planner needs.
#[derive(Debug)]
pub struct Catalog {
    /// Charm classification and ordering.
    pub charms: CharmTable,
    /// Workload version → codename lookup.
    pub versions: WorkloadCodenameTable,
    /// Auxiliary charm channel-track → codename lookup.
    pub auxiliary_tracks: AuxiliaryTrackTable,
    /// Ubuntu series ordering and distro-default codenames.
    pub series: SeriesTable,
}

impl Catalog {
    /// What: Load the catalog from explicit CSV contents. Exposed for tests
    /// that want a trimmed-down table; production code uses
    /// [`Catalog::load_default`].
    ///
    /// # Errors
    /// Propagates any parse error from the underlying tables.
    pub fn load(
        release_csv: &str,
        classes_csv: &str,
        order_csv: &str,
        ceph_csv: &str,
        auxiliary_csv: &str,
        series_csv: &str,
    ) -> Result<Self, CouError> {
        Ok(Self {
            charms: CharmTable::load(classes_csv, order_csv, ceph_csv)?,
            versions: WorkloadCodenameTable::from_csv(release_csv)?,
            auxiliary_tracks: AuxiliaryTrackTable::from_csv(auxiliary_csv)?,
            series: SeriesTable::from_csv(series_csv)?,
        })
    }

    /// What: Load the catalog from the CSV assets embedded in the binary
    /// at compile time.
    ///
    /// # Errors
    /// Propagates any parse error from the underlying tables; a failure
    /// here indicates a corrupt shipped asset, not a user error.
    pub fn load_default() -> Result<Self, CouError> {
        Self::load(
            include_str!("../../assets/release_table.csv"),
            include_str!("../../assets/charm_classes.csv"),
            include_str!("../../assets/upgrade_order.csv"),
            include_str!("../../assets/ceph_release_map.csv"),
            include_str!("../../assets/auxiliary_tracks.csv"),
            include_str!("../../assets/series.csv"),
        )
    }

    /// What: Whether `charm` is in the data-plane set purely by class
    /// membership (co-location-derived membership lives in `analyze`).
    #[must_use]
    pub fn is_data_plane_charm(&self, charm: &str) -> bool {
        MINIMUM_DATA_PLANE_CHARMS.contains(&charm) || self.charms.is_inherently_data_plane(charm)
    }
}
