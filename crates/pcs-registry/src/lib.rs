//! pcs-registry
//!
//! The authoritative postcode table. Built once from the registry CSV,
//! immutable afterwards, so lookups and enumeration need no locking.

mod ingest_csv;

pub use ingest_csv::{IngestError, REQUIRED_COLUMNS};

use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::Path;

use pcs_schemas::RegistryRecord;

/// Keyed registry: code -> record, plus a stable enumeration order.
#[derive(Debug, Clone, Default)]
pub struct RegistryTable {
    records: HashMap<String, RegistryRecord>,
    /// Codes in ascending order; fixed at build time.
    order: Vec<String>,
}

impl RegistryTable {
    /// Read and index the registry CSV at `path`.
    pub fn build(path: &Path) -> Result<Self, IngestError> {
        let file = std::fs::File::open(path).map_err(|source| IngestError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let table = Self::from_reader(file)?;
        tracing::info!(path = %path.display(), records = table.len(), "registry built");
        Ok(table)
    }

    pub fn from_reader<R: Read>(rdr: R) -> Result<Self, IngestError> {
        Self::from_records(ingest_csv::parse_registry(rdr)?)
    }

    /// Index already-parsed records. Codes must be non-empty and unique.
    pub fn from_records(
        records: impl IntoIterator<Item = RegistryRecord>,
    ) -> Result<Self, IngestError> {
        let mut map: HashMap<String, RegistryRecord> = HashMap::new();
        for (i, rec) in records.into_iter().enumerate() {
            if rec.code.is_empty() {
                return Err(IngestError::EmptyCode { row: i + 1 });
            }
            if map.contains_key(&rec.code) {
                return Err(IngestError::DuplicateCode {
                    row: i + 1,
                    code: rec.code,
                });
            }
            map.insert(rec.code.clone(), rec);
        }

        let mut order: Vec<String> = map.keys().cloned().collect();
        order.sort();

        Ok(Self {
            records: map,
            order,
        })
    }

    pub fn lookup(&self, code: &str) -> Option<&RegistryRecord> {
        self.records.get(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.records.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in ascending code order. Each call starts a fresh enumeration.
    pub fn iter(&self) -> impl Iterator<Item = &RegistryRecord> + '_ {
        self.order.iter().filter_map(|code| self.records.get(code))
    }

    /// Codes in ascending order.
    pub fn codes(&self) -> &[String] {
        &self.order
    }

    /// Visit every record; stops at and returns the first visitor error.
    pub fn for_each<E, F>(&self, mut visit: F) -> Result<(), E>
    where
        F: FnMut(&RegistryRecord) -> Result<(), E>,
    {
        for rec in self.iter() {
            visit(rec)?;
        }
        Ok(())
    }

    /// Distinct country classification codes present in the table.
    pub fn country_codes(&self) -> BTreeSet<&str> {
        self.records
            .values()
            .map(|r| r.country_code.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(code: &str, country: &str) -> RegistryRecord {
        RegistryRecord {
            code: code.to_string(),
            latitude: "51.5".to_string(),
            longitude: "-0.1".to_string(),
            inception: None,
            cessation: None,
            country_code: country.to_string(),
            region_code: String::new(),
            county_code: String::new(),
            district_code: String::new(),
            positional_quality: "1".to_string(),
        }
    }

    #[test]
    fn lookup_hit_and_miss() {
        let t = RegistryTable::from_records(vec![rec("SW1A 1AA", "E92000001")]).unwrap();
        assert!(t.lookup("SW1A 1AA").is_some());
        assert!(t.lookup("SW1A 1AB").is_none());
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn duplicate_and_empty_codes_rejected() {
        let err = RegistryTable::from_records(vec![rec("A1 1AA", "X"), rec("A1 1AA", "X")])
            .unwrap_err();
        assert!(matches!(err, IngestError::DuplicateCode { row: 2, .. }));

        let err = RegistryTable::from_records(vec![rec("", "X")]).unwrap_err();
        assert!(matches!(err, IngestError::EmptyCode { row: 1 }));
    }

    #[test]
    fn enumeration_is_sorted_and_restartable() {
        let t = RegistryTable::from_records(vec![
            rec("M1 1AE", "E"),
            rec("B33 8TH", "E"),
            rec("CR2 6XH", "E"),
        ])
        .unwrap();

        let first: Vec<&str> = t.iter().map(|r| r.code.as_str()).collect();
        let second: Vec<&str> = t.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(first, vec!["B33 8TH", "CR2 6XH", "M1 1AE"]);
        assert_eq!(first, second);
    }

    #[test]
    fn for_each_stops_on_first_error() {
        let t = RegistryTable::from_records(vec![
            rec("A1 1AA", "E"),
            rec("B1 1AA", "E"),
            rec("C1 1AA", "E"),
        ])
        .unwrap();

        let mut visited = Vec::new();
        let res: Result<(), String> = t.for_each(|r| {
            visited.push(r.code.clone());
            if r.code == "B1 1AA" {
                return Err(format!("boom at {}", r.code));
            }
            Ok(())
        });

        assert_eq!(res.unwrap_err(), "boom at B1 1AA");
        assert_eq!(visited, vec!["A1 1AA", "B1 1AA"]);
    }

    #[test]
    fn country_codes_are_distinct() {
        let t = RegistryTable::from_records(vec![
            rec("A1 1AA", "E92000001"),
            rec("B1 1AA", "E92000001"),
            rec("GY1 1AA", "L93000001"),
        ])
        .unwrap();
        let codes: Vec<&str> = t.country_codes().into_iter().collect();
        assert_eq!(codes, vec!["E92000001", "L93000001"]);
    }
}
