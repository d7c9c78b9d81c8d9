//! MRZ date fields
//!
//! Dates in the zone are written as `YYMMDD`. The two-digit year is resolved
//! to a full year by a [`CenturyPolicy`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// How a two-digit MRZ year is mapped to a century
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CenturyPolicy {
    /// Years after the current two-digit year are in the 1900s, the rest in the 2000s
    #[default]
    Sliding,
    /// Every year is in the 2000s
    AlwaysTwoThousands,
}

impl CenturyPolicy {
    /// Resolve a two-digit year against the current four-digit year
    pub fn resolve(&self, yy: u32, reference_year: i32) -> i32 {
        let yy = yy as i32;
        match self {
            CenturyPolicy::Sliding => {
                if yy > reference_year.rem_euclid(100) {
                    1900 + yy
                } else {
                    2000 + yy
                }
            }
            CenturyPolicy::AlwaysTwoThousands => 2000 + yy,
        }
    }
}

/// A date read from the MRZ
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MrzDate {
    /// A real calendar date
    Valid(NaiveDate),
    /// The field could not be turned into a date; the raw slice is kept
    Unparseable { raw: String },
}

impl MrzDate {
    /// Parse a `YYMMDD` slice.
    ///
    /// Anything that is not six ASCII digits, has a month outside 1..=12, a
    /// day outside 1..=31, or names a day the month does not have (31 April,
    /// 29 February in a common year) is [`MrzDate::Unparseable`].
    pub fn parse(raw: &str, policy: CenturyPolicy, reference_year: i32) -> Self {
        let unparseable = || MrzDate::Unparseable {
            raw: raw.to_string(),
        };

        if raw.len() != 6 || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return unparseable();
        }

        let field = |range: std::ops::Range<usize>| raw[range].parse::<u32>().ok();
        let (Some(yy), Some(mm), Some(dd)) = (field(0..2), field(2..4), field(4..6)) else {
            return unparseable();
        };

        if !(1..=12).contains(&mm) || !(1..=31).contains(&dd) {
            return unparseable();
        }

        let year = policy.resolve(yy, reference_year);
        NaiveDate::from_ymd_opt(year, mm, dd)
            .map(MrzDate::Valid)
            .unwrap_or_else(unparseable)
    }

    /// The calendar date, if the field was valid
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            MrzDate::Valid(date) => Some(*date),
            MrzDate::Unparseable { .. } => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, MrzDate::Valid(_))
    }
}

/// Renders `DD/MM/YYYY`, or nothing for an unparseable field
impl fmt::Display for MrzDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MrzDate::Valid(date) => write!(f, "{}", date.format("%d/%m/%Y")),
            MrzDate::Unparseable { .. } => Ok(()),
        }
    }
}

impl Serialize for MrzDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
