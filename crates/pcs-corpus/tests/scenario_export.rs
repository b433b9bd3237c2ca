//! Exporter against a real directory: change detection, dry-run, atomic writes, ids.

use std::sync::Arc;

use pcs_corpus::{
    canonical_bytes, id_to_abs_path, load_record, ExportError, Exporter, SequentialIdMinter,
};
use serde_json::{json, Value};

fn feature(id: Option<i64>, name: &str) -> Value {
    let mut doc = json!({
        "type": "Feature",
        "geometry": {"type": "Point", "coordinates": [-0.1416, 51.5010]},
        "properties": {
            "wof:name": name,
            "wof:country": "GB",
            "mz:is_current": 1,
            "wof:hierarchy": [{"postalcode_id": 101748123, "region_id": 85684593}]
        }
    });
    if let Some(id) = id {
        doc["id"] = json!(id);
    }
    doc
}

#[test]
fn new_record_is_written_under_id_path() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let exporter = Exporter::new(dir.path(), false).with_fixed_clock(1_700_000_000);

    let out = exporter.export_if_changed(feature(Some(101748123), "SW1A 1AA"), None)?;
    assert!(out.changed);
    assert!(out.written);
    assert_eq!(out.path, dir.path().join("101/748/123/101748123.geojson"));

    let stored: Value = serde_json::from_slice(&std::fs::read(&out.path)?)?;
    assert_eq!(stored["properties"]["wof:id"], 101748123);
    assert_eq!(stored["properties"]["wof:lastmodified"], 1_700_000_000);
    assert_eq!(stored["properties"]["wof:belongsto"], json!([85684593]));
    Ok(())
}

#[test]
fn second_export_of_same_form_is_unchanged_and_leaves_bytes_alone() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let first = Exporter::new(dir.path(), false).with_fixed_clock(1_700_000_000);
    let out = first.export_if_changed(feature(Some(7), "M1 1AE"), None)?;
    let before = std::fs::read(&out.path)?;

    // A later clock must not count as a change on its own.
    let later = Exporter::new(dir.path(), false).with_fixed_clock(1_800_000_000);
    let record = load_record(&out.path)?;
    let again = later.export_if_changed(record.doc.clone(), Some(&record.raw))?;
    assert!(!again.changed);
    assert!(!again.written);
    assert_eq!(std::fs::read(&out.path)?, before);
    Ok(())
}

#[test]
fn real_change_refreshes_lastmodified() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    Exporter::new(dir.path(), false)
        .with_fixed_clock(1_700_000_000)
        .export_if_changed(feature(Some(7), "M1 1AE"), None)?;

    let path = id_to_abs_path(dir.path(), 7).unwrap();
    let record = load_record(&path)?;
    let mut doc = record.doc.clone();
    doc["properties"]["mz:is_current"] = json!(0);

    let out = Exporter::new(dir.path(), false)
        .with_fixed_clock(1_800_000_000)
        .export_if_changed(doc, Some(&record.raw))?;
    assert!(out.changed && out.written);

    let stored: Value = serde_json::from_slice(&std::fs::read(&path)?)?;
    assert_eq!(stored["properties"]["mz:is_current"], 0);
    assert_eq!(stored["properties"]["wof:lastmodified"], 1_800_000_000);
    Ok(())
}

#[test]
fn dry_run_reports_change_without_writing() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let exporter = Exporter::new(dir.path(), true);

    let out = exporter.export_if_changed(feature(Some(101748123), "SW1A 1AA"), None)?;
    assert!(out.changed);
    assert!(!out.written);
    assert!(!out.path.exists());
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
    Ok(())
}

#[test]
fn missing_id_without_minter_is_an_error() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let exporter = Exporter::new(dir.path(), false);

    let err = exporter
        .export_if_changed(feature(None, "SW1A 1AA"), None)
        .unwrap_err();
    assert!(matches!(err, ExportError::MissingId));

    let mut negative = feature(None, "SW1A 1AA");
    negative["id"] = json!(-1);
    let err = exporter.export_if_changed(negative, None).unwrap_err();
    assert!(matches!(err, ExportError::MissingId));
    Ok(())
}

#[test]
fn minter_assigns_ids_to_new_records() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let exporter = Exporter::new(dir.path(), false)
        .with_minter(Arc::new(SequentialIdMinter::starting_after(1_000)));

    let a = exporter.export_if_changed(feature(None, "SW1A 1AA"), None)?;
    let b = exporter.export_if_changed(feature(None, "SW1A 2AA"), None)?;
    assert_eq!((a.id, b.id), (1_001, 1_002));

    let stored = load_record(&a.path)?;
    assert_eq!(stored.id, 1_001);
    assert_eq!(stored.name, "SW1A 1AA");
    Ok(())
}

#[test]
fn minted_ids_skip_files_already_on_disk() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let taken = id_to_abs_path(dir.path(), 1_001).expect("path");
    std::fs::create_dir_all(taken.parent().expect("parent"))?;
    std::fs::write(&taken, b"{ unparseable")?;

    let exporter = Exporter::new(dir.path(), false)
        .with_minter(Arc::new(SequentialIdMinter::starting_after(1_000)));
    let out = exporter.export_if_changed(feature(None, "SW1A 1AA"), None)?;

    assert_eq!(out.id, 1_002);
    assert_eq!(std::fs::read(&taken)?, b"{ unparseable");
    Ok(())
}

#[test]
fn stored_bytes_are_canonical() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let out = Exporter::new(dir.path(), false)
        .with_fixed_clock(1)
        .export_if_changed(feature(Some(3), "E1 6AN"), None)?;
    let stored = std::fs::read(&out.path)?;
    let reparsed: Value = serde_json::from_slice(&stored)?;
    assert_eq!(canonical_bytes(&reparsed)?, stored);
    Ok(())
}
