//! The totally-ordered OpenStack release codename.
//!
//! Per the design notes on "release comparisons": rather than a string
//! comparator exploiting an ordered list (the source's approach), this is an
//! ordinal wrapper over a static codename table, with explicit conversions
//! to and from the codename string. Equality against a raw string is
//! case-sensitive and goes through [`OpenStackRelease::parse`].

use std::fmt;

use crate::errors::CouError;

/// Ordered list of supported OpenStack codenames, oldest first. This is the
/// default table; in principle it is data the release catalog owns, but the
/// ordinal itself only needs the index, so the list is kept next to the
/// type that indexes into it.
pub const CODENAMES: &[&str] = &[
    "ussuri", "victoria", "wallaby", "xena", "yoga", "zed", "antelope", "bobcat", "caracal",
];

/// A single, totally-ordered OpenStack release.
///
/// Stored as an index into [`CODENAMES`]. Construction from an unknown
/// codename fails with [`CouError::UnknownRelease`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OpenStackRelease(u16);

impl OpenStackRelease {
    /// What: Parse a codename string into an [`OpenStackRelease`].
    ///
    /// Input: `codename`, e.g. `"ussuri"`. Matching is case-sensitive.
    ///
    /// Output: `Ok(release)` on success, `Err(CouError::UnknownRelease)`
    /// when the codename isn't in [`CODENAMES`].
    pub fn parse(codename: &str) -> Result<Self, CouError> {
        CODENAMES
            .iter()
            .position(|c| *c == codename)
            .map(|idx| Self(u16::try_from(idx).unwrap_or(u16::MAX)))
            .ok_or_else(|| CouError::UnknownRelease(codename.to_string()))
    }

    /// What: The codename string for this release.
    #[must_use]
    pub fn codename(self) -> &'static str {
        CODENAMES[self.0 as usize]
    }

    /// What: The next release in the sequence, if any.
    ///
    /// Output: `None` for the newest known release (the caller treats this
    /// as `HighestReleaseAchieved`).
    #[must_use]
    pub fn next(self) -> Option<Self> {
        let idx = self.0 as usize + 1;
        (idx < CODENAMES.len()).then(|| Self(u16::try_from(idx).unwrap_or(u16::MAX)))
    }

    /// What: The previous release in the sequence, if any.
    #[must_use]
    pub fn previous(self) -> Option<Self> {
        self.0.checked_sub(1).map(Self)
    }

    /// What: The calendar year the release shipped in, derived from its
    /// position (OpenStack has shipped two releases a year since ussuri,
    /// April 2020).
    #[must_use]
    pub fn release_year(self) -> u32 {
        2020 + u32::from(self.0) / 2
    }

    /// What: The oldest known release.
    #[must_use]
    pub fn oldest() -> Self {
        Self(0)
    }

    /// What: The newest known release.
    #[must_use]
    pub fn newest() -> Self {
        Self(u16::try_from(CODENAMES.len() - 1).unwrap_or(0))
    }
}

impl fmt::Display for OpenStackRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.codename())
    }
}

impl std::str::FromStr for OpenStackRelease {
    type Err = CouError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialEq<str> for OpenStackRelease {
    fn eq(&self, other: &str) -> bool {
        self.codename() == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_order_round_trips_through_next_and_previous() {
        for window in CODENAMES.windows(2) {
            let a = OpenStackRelease::parse(window[0]).unwrap();
            let b = OpenStackRelease::parse(window[1]).unwrap();
            assert!(a < b);
            assert_eq!(a.next(), Some(b));
            assert_eq!(b.previous(), Some(a));
        }
    }

    #[test]
    fn unknown_codename_fails() {
        let err = OpenStackRelease::parse("not-a-release").unwrap_err();
        assert!(matches!(err, CouError::UnknownRelease(s) if s == "not-a-release"));
    }

    #[test]
    fn newest_release_has_no_next() {
        assert_eq!(OpenStackRelease::newest().next(), None);
    }

    #[test]
    fn oldest_release_has_no_previous() {
        assert_eq!(OpenStackRelease::oldest().previous(), None);
    }

    #[test]
    fn release_year_increases_every_two_releases() {
        let ussuri = OpenStackRelease::parse("ussuri").unwrap();
        let victoria = OpenStackRelease::parse("victoria").unwrap();
        let wallaby = OpenStackRelease::parse("wallaby").unwrap();
        assert_eq!(ussuri.release_year(), 2020);
        assert_eq!(victoria.release_year(), 2020);
        assert_eq!(wallaby.release_year(), 2021);
    }
}
