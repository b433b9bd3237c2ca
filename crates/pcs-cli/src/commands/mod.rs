//! Command handlers for the `pcs` binary.

pub mod sync;

use anyhow::{Context, Result};
use chrono::NaiveDate;

/// Parse a `--registry-date` value. Only `YYYY-MM-DD` is accepted.
pub fn parse_registry_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").with_context(|| {
        format!(
            "invalid --registry-date '{raw}': expected YYYY-MM-DD, the date the registry snapshot was published"
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_date_format() {
        assert_eq!(
            parse_registry_date("2024-02-01").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
        );
        assert!(parse_registry_date("01/02/2024").is_err());
        assert!(parse_registry_date("2024-02").is_err());
        assert!(parse_registry_date("").is_err());
    }
}
