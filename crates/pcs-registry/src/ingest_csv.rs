//! Registry CSV ingestion.
//!
//! ## Column contract (by header name, order-independent, extra columns ignored)
//!
//! | Column     | Example     | Field                 |
//! |------------|-------------|-----------------------|
//! | `pcds`     | `SW1A 1AA`  | code                  |
//! | `lat`      | `51.501009` | latitude              |
//! | `long`     | `-0.141588` | longitude             |
//! | `dointr`   | `198001`    | inception (`YYYYMM`)  |
//! | `doterm`   | `` / `202001` | cessation (`YYYYMM`) |
//! | `ctry`     | `E92000001` | country code          |
//! | `rgn`      | `E12000007` | region code           |
//! | `oscty`    | `E99999999` | county code           |
//! | `oslaua`   | `E09000033` | district code         |
//! | `osgrdind` | `1`         | positional quality    |
//!
//! Any malformed row fails the whole build: a half-loaded registry would make
//! every missing code look retired.

use std::io::Read;

use pcs_schemas::{RegistryRecord, YearMonth};
use serde::Deserialize;

pub const REQUIRED_COLUMNS: &[&str] = &[
    "pcds", "lat", "long", "dointr", "doterm", "ctry", "rgn", "oscty", "oslaua", "osgrdind",
];

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("cannot read registry '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("registry csv missing required header column: '{0}'")]
    MissingHeader(String),
    #[error("registry csv line {line}: {message}")]
    Csv { line: u64, message: String },
    #[error("registry csv line {line}: cannot parse field '{field}' from value '{raw}'")]
    ParseField {
        line: u64,
        field: &'static str,
        raw: String,
    },
    #[error("registry row {row}: empty postcode")]
    EmptyCode { row: usize },
    #[error("registry row {row}: duplicate postcode '{code}'")]
    DuplicateCode { row: usize, code: String },
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    pcds: String,
    lat: String,
    long: String,
    dointr: String,
    doterm: String,
    ctry: String,
    rgn: String,
    oscty: String,
    oslaua: String,
    osgrdind: String,
}

pub(crate) fn parse_registry<R: Read>(src: R) -> Result<Vec<RegistryRecord>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(src);

    let headers = reader
        .headers()
        .map_err(|e| IngestError::Csv {
            line: 1,
            message: e.to_string(),
        })?
        .clone();

    for req in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == *req) {
            return Err(IngestError::MissingHeader(req.to_string()));
        }
    }

    let mut out = Vec::new();
    let mut record = csv::StringRecord::new();
    loop {
        let more = reader.read_record(&mut record).map_err(|e| IngestError::Csv {
            line: e.position().map(|p| p.line()).unwrap_or(0),
            message: e.to_string(),
        })?;
        if !more {
            break;
        }

        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let row: CsvRow = record
            .deserialize(Some(&headers))
            .map_err(|e| IngestError::Csv {
                line,
                message: e.to_string(),
            })?;

        out.push(into_record(row, line)?);
    }

    Ok(out)
}

fn into_record(row: CsvRow, line: u64) -> Result<RegistryRecord, IngestError> {
    check_coordinate(&row.lat, "lat", line)?;
    check_coordinate(&row.long, "long", line)?;

    let inception = YearMonth::parse_opt(&row.dointr).map_err(|_| IngestError::ParseField {
        line,
        field: "dointr",
        raw: row.dointr.clone(),
    })?;
    let cessation = YearMonth::parse_opt(&row.doterm).map_err(|_| IngestError::ParseField {
        line,
        field: "doterm",
        raw: row.doterm.clone(),
    })?;

    Ok(RegistryRecord {
        code: row.pcds,
        latitude: row.lat,
        longitude: row.long,
        inception,
        cessation,
        country_code: row.ctry,
        region_code: row.rgn,
        county_code: row.oscty,
        district_code: row.oslaua,
        positional_quality: row.osgrdind,
    })
}

fn check_coordinate(raw: &str, field: &'static str, line: u64) -> Result<(), IngestError> {
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(()),
        _ => Err(IngestError::ParseField {
            line,
            field,
            raw: raw.to_string(),
        }),
    }
}
