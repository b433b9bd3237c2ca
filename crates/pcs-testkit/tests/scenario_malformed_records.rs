//! Per-record failures stop the run by default and are counted when the
//! operator asks to keep going.

use anyhow::Result;
use pcs_reconcile::RunError;
use pcs_testkit::{existing_record, run_options, run_sync, RegistryCsv, RegistryRow, TempCorpus};
use serde_json::json;

fn seeded() -> Result<TempCorpus> {
    let corpus = TempCorpus::new()?;
    corpus.put(11, &existing_record(11, "SW1A 1AA", "GB"))?;
    corpus.put_bytes(&corpus.path_for(12)?, b"{\"type\": \"Feature\", ")?;
    let mut nameless = existing_record(13, "EC1A 1BB", "GB");
    nameless["properties"]
        .as_object_mut()
        .expect("properties object")
        .remove("wof:name");
    corpus.put(13, &nameless)?;
    // Alternate geometries are not records and are never parsed.
    let alt = corpus.path_for(11)?.with_file_name("11-alt-os.geojson");
    corpus.put_bytes(&alt, b"not json")?;
    Ok(corpus)
}

fn registry() -> RegistryCsv {
    RegistryCsv::new()
        .row(RegistryRow::new("SW1A 1AA", "51.501009", "-0.141588"))
        .row(RegistryRow::new("M1 1AE", "53.479251", "-2.240764"))
}

#[tokio::test]
async fn first_failure_aborts_before_creation() -> Result<()> {
    let corpus = seeded()?;

    let before = corpus.snapshot()?;

    let (_, result) = run_sync(&registry(), run_options(&corpus), None).await?;
    let (failure, summary) = match result {
        Err(RunError::Aborted { failure, summary }) => (failure, summary),
        other => panic!("expected an aborted run, got {other:?}"),
    };

    assert!(failure.subject.ends_with("12.geojson"), "{}", failure.subject);
    assert!(summary.counts.errored >= 1);
    assert_eq!(summary.counts.created, 0);
    // Only the record before the failure was rewritten; nothing was created.
    let after = corpus.snapshot()?;
    assert_eq!(after.len(), before.len());
    Ok(())
}

#[tokio::test]
async fn keep_going_counts_failures_and_finishes() -> Result<()> {
    let corpus = seeded()?;
    let mut opts = run_options(&corpus);
    opts.pool.fail_fast = false;

    let (_, result) = run_sync(&registry(), opts, None).await?;
    let counts = result?.counts;

    assert_eq!(counts.errored, 2);
    assert_eq!(counts.updated, 1);
    assert_eq!(counts.created, 1);
    // 12 and 13 are taken by the unreadable records.
    let created = corpus.read(14)?;
    assert_eq!(created["properties"]["wof:name"], json!("M1 1AE"));
    assert_eq!(created["properties"]["wof:placetype"], json!("postalcode"));
    Ok(())
}
