//! Severity classification for mismatch percentages and structural outcomes.
//!
//! [`classify`] is the only place that maps a percentage onto a tag; page and
//! component verdicts both go through it. Structural tags (missing, extra,
//! redirect) are assigned by the aggregator and always count as failures.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Discrete verdict attached to every component and page.
///
/// The serialized strings are consumed by downstream CI tooling and must not
/// change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeverityTag {
    #[serde(rename = "not compared")]
    NotCompared,
    #[serde(rename = "perfect-match")]
    PerfectMatch,
    #[serde(rename = "minor-diff")]
    MinorDiff,
    #[serde(rename = "medium-diff")]
    MediumDiff,
    #[serde(rename = "major-diff")]
    MajorDiff,
    #[serde(rename = "critical-diff")]
    CriticalDiff,
    #[serde(rename = "missing-in-migrated")]
    MissingInMigrated,
    #[serde(rename = "extra-in-migrated")]
    ExtraInMigrated,
    #[serde(rename = "redirect-url-mismatch")]
    RedirectUrlMismatch,
    #[serde(rename = "ignored-diff")]
    IgnoredDiff,
}

impl SeverityTag {
    pub const ALL: [SeverityTag; 10] = [
        SeverityTag::NotCompared,
        SeverityTag::PerfectMatch,
        SeverityTag::MinorDiff,
        SeverityTag::MediumDiff,
        SeverityTag::MajorDiff,
        SeverityTag::CriticalDiff,
        SeverityTag::MissingInMigrated,
        SeverityTag::ExtraInMigrated,
        SeverityTag::RedirectUrlMismatch,
        SeverityTag::IgnoredDiff,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SeverityTag::NotCompared => "not compared",
            SeverityTag::PerfectMatch => "perfect-match",
            SeverityTag::MinorDiff => "minor-diff",
            SeverityTag::MediumDiff => "medium-diff",
            SeverityTag::MajorDiff => "major-diff",
            SeverityTag::CriticalDiff => "critical-diff",
            SeverityTag::MissingInMigrated => "missing-in-migrated",
            SeverityTag::ExtraInMigrated => "extra-in-migrated",
            SeverityTag::RedirectUrlMismatch => "redirect-url-mismatch",
            SeverityTag::IgnoredDiff => "ignored-diff",
        }
    }

    /// Position in the "worst tag" order; higher is worse.
    fn rank(self) -> u8 {
        match self {
            SeverityTag::NotCompared => 0,
            SeverityTag::PerfectMatch => 1,
            SeverityTag::IgnoredDiff => 2,
            SeverityTag::MinorDiff => 3,
            SeverityTag::MediumDiff => 4,
            SeverityTag::MajorDiff => 5,
            SeverityTag::CriticalDiff => 6,
            SeverityTag::MissingInMigrated => 7,
            SeverityTag::ExtraInMigrated => 8,
            SeverityTag::RedirectUrlMismatch => 9,
        }
    }

    /// Missing, extra and redirect verdicts fail regardless of any percentage.
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            SeverityTag::MissingInMigrated
                | SeverityTag::ExtraInMigrated
                | SeverityTag::RedirectUrlMismatch
        )
    }

    pub fn is_failure(self) -> bool {
        self.is_structural()
            || matches!(
                self,
                SeverityTag::MinorDiff
                    | SeverityTag::MediumDiff
                    | SeverityTag::MajorDiff
                    | SeverityTag::CriticalDiff
            )
    }

    /// Picks the worse of two tags.
    pub fn worst(self, other: SeverityTag) -> SeverityTag {
        if other > self {
            other
        } else {
            self
        }
    }
}

impl PartialOrd for SeverityTag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SeverityTag {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for SeverityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeverityTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim();
        SeverityTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == normalized)
            .or_else(|| (normalized == "not-compared").then_some(SeverityTag::NotCompared))
            .ok_or_else(|| format!("unknown severity tag '{s}'"))
    }
}

/// Maps a mismatch percentage onto its severity tier.
///
/// Upper bounds are inclusive: `1.0` is minor, `20.0` is major.
pub fn classify(mismatch_percent: Option<f64>) -> SeverityTag {
    match mismatch_percent {
        None => SeverityTag::NotCompared,
        Some(m) if m.is_nan() => SeverityTag::CriticalDiff,
        Some(m) if m <= 0.0 => SeverityTag::PerfectMatch,
        Some(m) if m <= 1.0 => SeverityTag::MinorDiff,
        Some(m) if m <= 5.0 => SeverityTag::MediumDiff,
        Some(m) if m <= 20.0 => SeverityTag::MajorDiff,
        Some(_) => SeverityTag::CriticalDiff,
    }
}

/// Rolls a set of tags up to the single worst one.
pub fn worst_of<I>(tags: I) -> SeverityTag
where
    I: IntoIterator<Item = SeverityTag>,
{
    tags.into_iter()
        .fold(SeverityTag::NotCompared, SeverityTag::worst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_boundaries_are_inclusive_on_upper_edge() {
        assert_eq!(classify(None), SeverityTag::NotCompared);
        assert_eq!(classify(Some(0.0)), SeverityTag::PerfectMatch);
        assert_eq!(classify(Some(0.01)), SeverityTag::MinorDiff);
        assert_eq!(classify(Some(1.0)), SeverityTag::MinorDiff);
        assert_eq!(classify(Some(1.01)), SeverityTag::MediumDiff);
        assert_eq!(classify(Some(5.0)), SeverityTag::MediumDiff);
        assert_eq!(classify(Some(5.01)), SeverityTag::MajorDiff);
        assert_eq!(classify(Some(20.0)), SeverityTag::MajorDiff);
        assert_eq!(classify(Some(20.01)), SeverityTag::CriticalDiff);
        assert_eq!(classify(Some(100.0)), SeverityTag::CriticalDiff);
    }

    #[test]
    fn classify_is_total_over_percent_range() {
        for step in 0..=10_000 {
            let m = step as f64 / 100.0;
            let tag = classify(Some(m));
            assert!(
                !tag.is_structural() && tag != SeverityTag::NotCompared,
                "{m} classified as {tag}"
            );
        }
    }

    #[test]
    fn wire_values_are_verbatim() {
        let json = serde_json::to_string(&SeverityTag::NotCompared).unwrap();
        assert_eq!(json, "\"not compared\"");
        for tag in SeverityTag::ALL {
            let json = serde_json::to_string(&tag).unwrap();
            assert_eq!(json, format!("\"{}\"", tag.as_str()));
            assert_eq!(tag.as_str().parse::<SeverityTag>(), Ok(tag));
        }
    }

    #[test]
    fn worst_prefers_structural_over_percentage_tags() {
        assert_eq!(
            worst_of([
                SeverityTag::PerfectMatch,
                SeverityTag::CriticalDiff,
                SeverityTag::MissingInMigrated,
            ]),
            SeverityTag::MissingInMigrated
        );
        assert_eq!(
            SeverityTag::ExtraInMigrated.worst(SeverityTag::RedirectUrlMismatch),
            SeverityTag::RedirectUrlMismatch
        );
        assert_eq!(worst_of(Vec::new()), SeverityTag::NotCompared);
        assert!(SeverityTag::MinorDiff > SeverityTag::IgnoredDiff);
    }

    #[test]
    fn failure_set_excludes_passing_tags() {
        assert!(!SeverityTag::PerfectMatch.is_failure());
        assert!(!SeverityTag::IgnoredDiff.is_failure());
        assert!(!SeverityTag::NotCompared.is_failure());
        assert!(SeverityTag::MinorDiff.is_failure());
        assert!(SeverityTag::RedirectUrlMismatch.is_failure());
    }
}
