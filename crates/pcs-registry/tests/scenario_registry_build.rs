use std::io::Write;

use pcs_registry::{IngestError, RegistryTable};

const CSV: &str = "\
pcds,dointr,doterm,oscty,oslaua,osgrdind,ctry,rgn,lat,long
SW1A 1AA,198001,,E99999999,E09000033,1,E92000001,E12000007,51.501009,-0.141588
EC1A 1BB,198001,201512,E99999999,E09000001,1,E92000001,E12000007,51.520261,-0.097320
GY1 1AA,198001,,L99999999,L99999999,1,L93000001,L99999999,49.456,-2.536
";

#[test]
fn build_from_file_indexes_every_row() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("registry.csv");
    std::fs::File::create(&path)?.write_all(CSV.as_bytes())?;

    let table = RegistryTable::build(&path)?;
    assert_eq!(table.len(), 3);

    let ec = table.lookup("EC1A 1BB").expect("EC1A 1BB indexed");
    assert!(ec.is_terminated());
    assert_eq!(ec.cessation.unwrap().to_edtf(), "2015-12-01");

    assert!(!table.lookup("SW1A 1AA").unwrap().is_terminated());
    assert!(table.country_codes().contains("L93000001"));
    Ok(())
}

#[test]
fn unreadable_source_reports_path() {
    let err = RegistryTable::build(std::path::Path::new("/nonexistent/registry.csv")).unwrap_err();
    assert!(matches!(err, IngestError::Io { .. }));
    assert!(err.to_string().contains("/nonexistent/registry.csv"));
}

#[test]
fn duplicate_rows_fail_the_build() {
    let csv = format!("{CSV}SW1A 1AA,198001,,E99999999,E09000033,1,E92000001,E12000007,51.5,-0.14\n");
    let err = RegistryTable::from_reader(csv.as_bytes()).unwrap_err();
    assert!(matches!(err, IngestError::DuplicateCode { ref code, .. } if code == "SW1A 1AA"));
}
