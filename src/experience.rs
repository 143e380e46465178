//! Work-experience parsing for the admit finder.
//!
//! The source column is free text ("NA", "6 months", "6", "6 mon"), so the
//! month count is recovered by trying a few patterns in order.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::FinderError;

static MON_ABBREVIATED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*mon\b").expect("valid regex"));
static MONTHS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*months?\b").expect("valid regex"));
static BARE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s*$").expect("valid regex"));

/// Returns the number of months, or `None` when nothing recognisable is present.
pub fn parse_months(raw: &str) -> Option<u32> {
    [&*MON_ABBREVIATED, &*MONTHS, &*BARE_NUMBER]
        .iter()
        .find_map(|pattern| pattern.captures(raw))
        .and_then(|captures| captures.get(1))
        .and_then(|digits| digits.as_str().parse().ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExperienceRange {
    /// The "0" bucket: confirmed zero, "NA", or anything unparseable.
    NoExperience,
    Between { min: u32, max: u32 },
    AtLeast(u32),
}

impl ExperienceRange {
    pub fn matches(&self, raw: Option<&str>) -> bool {
        let months = raw.and_then(parse_months);
        match *self {
            ExperienceRange::NoExperience => {
                months.is_none() || months == Some(0) || raw == Some("NA")
            }
            ExperienceRange::AtLeast(floor) => months.is_some_and(|m| m >= floor),
            ExperienceRange::Between { min, max } => {
                months.is_some_and(|m| (min..=max).contains(&m))
            }
        }
    }
}

impl FromStr for ExperienceRange {
    type Err = FinderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid =
            || FinderError::InvalidCriterion(format!("unrecognised experience range '{s}'"));

        if s == "0" {
            return Ok(ExperienceRange::NoExperience);
        }
        if let Some(floor) = s.strip_suffix('+') {
            return floor
                .trim()
                .parse()
                .map(ExperienceRange::AtLeast)
                .map_err(|_| invalid());
        }
        let (min, max) = s.split_once('-').ok_or_else(invalid)?;
        let min: u32 = min.trim().parse().map_err(|_| invalid())?;
        let max: u32 = max.trim().parse().map_err(|_| invalid())?;
        if min > max {
            return Err(invalid());
        }
        Ok(ExperienceRange::Between { min, max })
    }
}

impl fmt::Display for ExperienceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExperienceRange::NoExperience => write!(f, "0"),
            ExperienceRange::Between { min, max } => write!(f, "{min}-{max}"),
            ExperienceRange::AtLeast(floor) => write!(f, "{floor}+"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_encodings() {
        assert_eq!(parse_months("6 months"), Some(6));
        assert_eq!(parse_months("1 month"), Some(1));
        assert_eq!(parse_months("6 mon"), Some(6));
        assert_eq!(parse_months("18 Months"), Some(18));
        assert_eq!(parse_months("7"), Some(7));
        assert_eq!(parse_months("NA"), None);
        assert_eq!(parse_months("part-time"), None);
    }

    #[test]
    fn na_and_unparseable_only_match_zero_bucket() {
        let ranges = [
            ExperienceRange::NoExperience,
            ExperienceRange::Between { min: 1, max: 12 },
            ExperienceRange::AtLeast(60),
        ];

        for raw in [Some("NA"), Some("part-time"), None] {
            let hits: Vec<_> = ranges.iter().filter(|range| range.matches(raw)).collect();
            assert_eq!(hits, vec![&ExperienceRange::NoExperience], "raw = {raw:?}");
        }
    }

    #[test]
    fn bounded_ranges_are_inclusive() {
        let range: ExperienceRange = "1-12".parse().unwrap();
        assert!(range.matches(Some("1 month")));
        assert!(range.matches(Some("12")));
        assert!(range.matches(Some("6 months")));
        assert!(!range.matches(Some("13 mon")));
        assert!(!range.matches(Some("0")));
    }

    #[test]
    fn open_ended_range_uses_floor() {
        let range: ExperienceRange = "60+".parse().unwrap();
        assert!(range.matches(Some("60 months")));
        assert!(range.matches(Some("72")));
        assert!(!range.matches(Some("59")));
    }

    #[test]
    fn zero_bucket_matches_confirmed_zero() {
        assert!(ExperienceRange::NoExperience.matches(Some("0")));
        assert!(!ExperienceRange::NoExperience.matches(Some("7")));
    }

    #[test]
    fn rejects_malformed_ranges() {
        assert!("abc".parse::<ExperienceRange>().is_err());
        assert!("12-1".parse::<ExperienceRange>().is_err());
        assert!("x+".parse::<ExperienceRange>().is_err());
        assert_eq!("13-24".parse::<ExperienceRange>().unwrap().to_string(), "13-24");
    }
}
