//! Workload-version and channel-track lookup tables, loaded once from the
//! CSV data assets embedded in the binary.
//!
//! The exact set of charms, versions, and tracks lives in the CSV data
//! assets, not in this code — the tables here are the authoritative
//! source for every charm-specific constant the planner consults.

use std::collections::{HashMap, HashSet};

use crate::catalog::release::OpenStackRelease;
use crate::errors::CouError;

/// A half-open version range `[lo, hi)` compared component-wise on
/// `(major, minor, patch)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct VersionRange {
    lo: (u32, u32, u32),
    hi: (u32, u32, u32),
}

impl VersionRange {
    fn contains(self, v: (u32, u32, u32)) -> bool {
        v >= self.lo && v < self.hi
    }
}

/// `(charm → codename → [VersionRange])`. A charm/codename pair may have
/// several disjoint ranges only in theory; in the shipped asset each pair
/// has exactly one, but the lookup doesn't assume that.
#[derive(Debug, Default)]
pub struct WorkloadCodenameTable {
    entries: HashMap<String, Vec<(OpenStackRelease, VersionRange)>>,
}

/// What: Parse an epoch-stripped workload version string into numeric
/// components.
///
/// Input: `version`, e.g. `"17.0.1"`, `"16.2.5"`, or `"2.0.3"`. Any leading
/// Debian-style epoch (`"2:17.0.1"`) is stripped first, as is any suffix
/// after the first non-numeric, non-dot character (e.g. `"17.0.1~rc1"` →
/// `17.0.1`).
///
/// Output: `(major, minor, patch)`, defaulting missing trailing components
/// to zero (`"17.0"` → `(17, 0, 0)`, `"17"` → `(17, 0, 0)`).
///
/// Details: Matches the two shapes a workload version can take — `x.y.z` for
/// Swift/Ceph-style charms and `x.y` elsewhere — by simply defaulting
/// absent components rather than branching on charm identity.
#[must_use]
pub fn parse_version(version: &str) -> (u32, u32, u32) {
    let stripped = version.split_once(':').map_or(version, |(_, rest)| rest);
    let mut parts = [0u32; 3];
    for (idx, raw) in stripped.splitn(3, '.').enumerate() {
        if idx >= 3 {
            break;
        }
        let numeric: String = raw.chars().take_while(char::is_ascii_digit).collect();
        parts[idx] = numeric.parse().unwrap_or(0);
    }
    (parts[0], parts[1], parts[2])
}

impl WorkloadCodenameTable {
    /// What: Load the table from a CSV asset with header
    /// `charm,codename,version_lo,version_hi`.
    ///
    /// # Errors
    /// Returns `Err` when a row's version fields cannot be parsed.
    pub fn from_csv(data: &str) -> Result<Self, CouError> {
        let mut entries: HashMap<String, Vec<(OpenStackRelease, VersionRange)>> = HashMap::new();
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        for record in reader.records() {
            let record = record.map_err(|e| CouError::RunUpgradeError(e.to_string()))?;
            let charm = record.get(0).unwrap_or_default().to_string();
            let codename_str = record.get(1).unwrap_or_default();
            let lo = record.get(2).unwrap_or_default();
            let hi = record.get(3).unwrap_or_default();
            let codename = OpenStackRelease::parse(codename_str)?;
            let range = VersionRange {
                lo: parse_version(lo),
                hi: parse_version(hi),
            };
            entries.entry(charm).or_default().push((codename, range));
        }
        Ok(Self { entries })
    }

    /// What: `compatible_codenames(charm, version) → set<Codename>`.
    ///
    /// Output: The set of codenames whose range contains `version`. Empty
    /// when no range contains it.
    #[must_use]
    pub fn compatible_codenames(&self, charm: &str, version: &str) -> HashSet<OpenStackRelease> {
        let parsed = parse_version(version);
        self.entries
            .get(charm)
            .into_iter()
            .flatten()
            .filter(|(_, range)| range.contains(parsed))
            .map(|(codename, _)| *codename)
            .collect()
    }

    /// What: `max()` of `compatible_codenames`, the "latest compatible"
    /// codename.
    ///
    /// # Errors
    /// Returns `Err(UnknownVersion)` when the set is empty.
    pub fn latest_compatible(&self, charm: &str, version: &str) -> Result<OpenStackRelease, CouError> {
        self.compatible_codenames(charm, version)
            .into_iter()
            .max()
            .ok_or_else(|| CouError::UnknownVersion {
                charm: charm.to_string(),
                version: version.to_string(),
            })
    }

    /// What: True when the charm appears in the loaded table at all.
    #[must_use]
    pub fn knows_charm(&self, charm: &str) -> bool {
        self.entries.contains_key(charm)
    }
}

/// `(charm, series, track) → set<Codename>` and its inverse, for auxiliary
/// charms whose channel tracks are not themselves OpenStack codenames.
#[derive(Debug, Default)]
pub struct AuxiliaryTrackTable {
    /// `(charm, series, track) → codenames`.
    forward: HashMap<(String, String, String), HashSet<OpenStackRelease>>,
    /// `(charm, series, codename) → tracks`.
    inverse: HashMap<(String, String, OpenStackRelease), Vec<String>>,
}

impl AuxiliaryTrackTable {
    /// What: Load from a CSV asset with header `charm,series,track,codename`.
    ///
    /// # Errors
    /// Returns `Err` when a row's codename doesn't parse.
    pub fn from_csv(data: &str) -> Result<Self, CouError> {
        let mut forward: HashMap<(String, String, String), HashSet<OpenStackRelease>> = HashMap::new();
        let mut inverse: HashMap<(String, String, OpenStackRelease), Vec<String>> = HashMap::new();
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        for record in reader.records() {
            let record = record.map_err(|e| CouError::RunUpgradeError(e.to_string()))?;
            let charm = record.get(0).unwrap_or_default().to_string();
            let series = record.get(1).unwrap_or_default().to_string();
            let track = record.get(2).unwrap_or_default().to_string();
            let codename = OpenStackRelease::parse(record.get(3).unwrap_or_default())?;

            forward
                .entry((charm.clone(), series.clone(), track.clone()))
                .or_default()
                .insert(codename);
            let tracks = inverse.entry((charm, series, codename)).or_default();
            if !tracks.contains(&track) {
                tracks.push(track);
            }
        }
        Ok(Self { forward, inverse })
    }

    /// What: `track_to_codename(charm, series, track) → set<Codename>`.
    #[must_use]
    pub fn track_to_codename(&self, charm: &str, series: &str, track: &str) -> HashSet<OpenStackRelease> {
        self.forward
            .get(&(charm.to_string(), series.to_string(), track.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// What: Inverse of [`Self::track_to_codename`]: the tracks that carry
    /// `codename` for this charm/series.
    #[must_use]
    pub fn codename_to_tracks(&self, charm: &str, series: &str, codename: OpenStackRelease) -> Vec<String> {
        self.inverse
            .get(&(charm.to_string(), series.to_string(), codename))
            .cloned()
            .unwrap_or_default()
    }

    /// What: True when `track` is a recognized track for `charm` on
    /// `series`, regardless of which codename(s) it maps to.
    #[must_use]
    pub fn is_valid_track(&self, charm: &str, series: &str, track: &str) -> bool {
        !self.track_to_codename(charm, series, track).is_empty()
    }
}

/// `series → default OpenStack codename` plus the series' lexicographic
/// ordering, loaded from `assets/series.csv`.
#[derive(Debug, Default)]
pub struct SeriesTable {
    order: HashMap<String, u32>,
    default_codename: HashMap<String, OpenStackRelease>,
}

impl SeriesTable {
    /// What: Load from a CSV asset with header `series,order,default_codename`.
    ///
    /// # Errors
    /// Returns `Err` when a row's order or codename fails to parse.
    pub fn from_csv(data: &str) -> Result<Self, CouError> {
        let mut order = HashMap::new();
        let mut default_codename = HashMap::new();
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        for record in reader.records() {
            let record = record.map_err(|e| CouError::RunUpgradeError(e.to_string()))?;
            let series = record.get(0).unwrap_or_default().to_string();
            let ord: u32 = record
                .get(1)
                .unwrap_or_default()
                .parse()
                .map_err(|_| CouError::RunUpgradeError(format!("bad series order for {series}")))?;
            let codename = OpenStackRelease::parse(record.get(2).unwrap_or_default())?;
            order.insert(series.clone(), ord);
            default_codename.insert(series, codename);
        }
        Ok(Self { order, default_codename })
    }

    /// What: `distro_default_codename(series) → Codename`.
    ///
    /// # Errors
    /// Returns `Err(UnknownRelease)`-shaped error when the series is unknown;
    /// reuses that variant since the caller-visible failure mode is the same
    /// ("no release can be determined for this input").
    pub fn distro_default_codename(&self, series: &str) -> Result<OpenStackRelease, CouError> {
        self.default_codename
            .get(series)
            .copied()
            .ok_or_else(|| CouError::UnknownRelease(format!("series {series:?} has no default codename")))
    }

    /// What: Compare two series lexicographically on their declared order
    /// (the minimum Ubuntu series string, compared positionally on the
    /// ordered Ubuntu-release list, not lexicographically).
    #[must_use]
    pub fn min_series<'a>(&self, series: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
        series.into_iter().min_by_key(|s| self.order.get(*s).copied().unwrap_or(u32::MAX))
    }

    /// What: The inclusive `[lowest, highest]` OpenStack release range
    /// `series` supports, derived from its own default codename and the
    /// following series' (the release just before the next series' anchor
    /// is this series' ceiling; the newest known series is capped at the
    /// newest known release).
    ///
    /// # Errors
    /// Returns `Err` when `series` is unknown.
    pub fn supported_range(&self, series: &str) -> Result<(OpenStackRelease, OpenStackRelease), CouError> {
        let lowest = self.distro_default_codename(series)?;
        let this_order = self.order[series];
        let highest = self
            .default_codename
            .iter()
            .find(|(s, _)| self.order.get(*s).copied() == Some(this_order + 1))
            .and_then(|(_, codename)| codename.previous())
            .unwrap_or_else(OpenStackRelease::newest);
        Ok((lowest, highest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_version_handles_epoch_and_short_forms() {
        assert_eq!(parse_version("2:17.0.1"), (17, 0, 1));
        assert_eq!(parse_version("17.0"), (17, 0, 0));
        assert_eq!(parse_version("17"), (17, 0, 0));
        assert_eq!(parse_version("17.0.1~rc1"), (17, 0, 1));
    }

    #[test]
    fn compatible_codenames_empty_outside_any_range() {
        let csv = "charm,codename,version_lo,version_hi\nfoo,ussuri,1.0.0,2.0.0\n";
        let table = WorkloadCodenameTable::from_csv(csv).unwrap();
        assert!(table.compatible_codenames("foo", "3.0.0").is_empty());
    }

    #[test]
    fn boundary_version_belongs_to_successor_range() {
        let csv = "charm,codename,version_lo,version_hi\nfoo,ussuri,1.0.0,2.0.0\nfoo,victoria,2.0.0,3.0.0\n";
        let table = WorkloadCodenameTable::from_csv(csv).unwrap();
        let at_boundary = table.latest_compatible("foo", "2.0.0").unwrap();
        assert_eq!(at_boundary.codename(), "victoria");
    }

    #[test]
    fn supported_range_ceils_at_the_series_before_the_next_anchor() {
        let csv = "series,order,default_codename\nfocal,0,ussuri\njammy,1,yoga\nnoble,2,caracal\n";
        let table = SeriesTable::from_csv(csv).unwrap();
        let (lo, hi) = table.supported_range("focal").unwrap();
        assert_eq!(lo.codename(), "ussuri");
        assert_eq!(hi.codename(), "xena");
    }

    #[test]
    fn newest_series_is_capped_at_the_newest_known_release() {
        let csv = "series,order,default_codename\nfocal,0,ussuri\njammy,1,yoga\nnoble,2,caracal\n";
        let table = SeriesTable::from_csv(csv).unwrap();
        let (_, hi) = table.supported_range("noble").unwrap();
        assert_eq!(hi, OpenStackRelease::newest());
    }

    #[test]
    fn multi_codename_charm_preserves_full_set() {
        let csv = "charm,codename,version_lo,version_hi\nceph-mon,ussuri,15.2.0,16.2.0\nceph-mon,victoria,15.2.0,16.2.0\n";
        let table = WorkloadCodenameTable::from_csv(csv).unwrap();
        let set = table.compatible_codenames("ceph-mon", "15.2.5");
        assert_eq!(set.len(), 2);
        assert_eq!(table.latest_compatible("ceph-mon", "15.2.5").unwrap().codename(), "victoria");
    }
}
