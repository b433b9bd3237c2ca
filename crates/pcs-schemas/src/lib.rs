//! pcs-schemas
//!
//! Shared data model for the postcode sync: registry entries, the coarse
//! year-month dates the registry publishes, hierarchy maps and the per-record
//! outcome taxonomy. Pure types. No IO.

pub mod outcome;
pub mod postcode;

pub use outcome::{ReconcileOutcome, SkipReason};

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// EDTF "unspecified" marker. Distinct from every real date.
pub const EDTF_UNSPECIFIED: &str = "uuuu";

/// Parent identifier written when no enclosing region is known.
pub const NO_PARENT: i64 = -1;

/// One ancestor chain entry: `<placetype>_id` -> identifier.
pub type Hierarchy = BTreeMap<String, i64>;

/// Month precision date as published by the registry (`YYYYMM`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid year-month '{raw}': expected YYYYMM")]
pub struct YearMonthParseError {
    pub raw: String,
}

impl YearMonth {
    /// Parse the registry's `YYYYMM` form. Surrounding whitespace is ignored.
    pub fn parse(raw: &str) -> Result<Self, YearMonthParseError> {
        let err = || YearMonthParseError {
            raw: raw.to_string(),
        };

        let s = raw.trim();
        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }

        let year: i32 = s[..4].parse().map_err(|_| err())?;
        let month: u32 = s[4..].parse().map_err(|_| err())?;
        NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(err)?;

        Ok(Self { year, month })
    }

    /// Parse an optional registry cell: empty means "not published".
    pub fn parse_opt(raw: &str) -> Result<Option<Self>, YearMonthParseError> {
        if raw.trim().is_empty() {
            return Ok(None);
        }
        Self::parse(raw).map(Some)
    }

    /// Calendar date form written to records (first day of the month).
    pub fn to_edtf(&self) -> String {
        format!("{:04}-{:02}-01", self.year, self.month)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

/// EDTF rendering of an optional registry date.
pub fn edtf_or_unspecified(date: Option<YearMonth>) -> String {
    match date {
        Some(d) => d.to_edtf(),
        None => EDTF_UNSPECIFIED.to_string(),
    }
}

/// True for a real EDTF value; absent, empty and `uuuu` all mean "unspecified".
pub fn is_specified(edtf: Option<&str>) -> bool {
    match edtf {
        Some(v) => !v.is_empty() && v != EDTF_UNSPECIFIED,
        None => false,
    }
}

/// One authoritative postcode entry.
///
/// Coordinates stay as the registry's decimal strings until enrichment; they
/// are written to records as JSON numbers, so trailing zeros do not survive.
/// Ingestion has already checked that they parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryRecord {
    pub code: String,
    pub latitude: String,
    pub longitude: String,
    pub inception: Option<YearMonth>,
    pub cessation: Option<YearMonth>,
    pub country_code: String,
    pub region_code: String,
    pub county_code: String,
    pub district_code: String,
    pub positional_quality: String,
}

impl RegistryRecord {
    /// True when the registry says the code has been terminated.
    pub fn is_terminated(&self) -> bool {
        self.cessation.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_month_parse_and_render() {
        let ym = YearMonth::parse("200601").unwrap();
        assert_eq!(ym, YearMonth { year: 2006, month: 1 });
        assert_eq!(ym.to_edtf(), "2006-01-01");
        assert_eq!(ym.to_string(), "200601");
    }

    #[test]
    fn year_month_rejects_bad_input() {
        for raw in ["2006", "20061", "200613", "200600", "2006-1", "abcdef", "2006011"] {
            assert!(YearMonth::parse(raw).is_err(), "accepted '{raw}'");
        }
    }

    #[test]
    fn empty_cell_is_absent() {
        assert_eq!(YearMonth::parse_opt("").unwrap(), None);
        assert_eq!(YearMonth::parse_opt("  ").unwrap(), None);
        assert!(YearMonth::parse_opt("x").is_err());
    }

    #[test]
    fn unspecified_markers() {
        assert!(!is_specified(None));
        assert!(!is_specified(Some("")));
        assert!(!is_specified(Some("uuuu")));
        assert!(is_specified(Some("2020-01-01")));
    }

    #[test]
    fn unspecified_for_absent_date() {
        assert_eq!(edtf_or_unspecified(None), EDTF_UNSPECIFIED);
        let ym = YearMonth::parse("198001").unwrap();
        assert_eq!(edtf_or_unspecified(Some(ym)), "1980-01-01");
    }
}
