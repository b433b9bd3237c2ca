//! A second sync over its own output changes nothing: no writes, no
//! transitions, identical bytes.

use std::sync::Arc;

use anyhow::Result;
use pcs_corpus::{load_record, Exporter};
use pcs_enrich::{enrich, EnrichPolicy};
use pcs_hierarchy::HierarchyResolver;
use pcs_schemas::SkipReason;
use pcs_testkit::{
    existing_record, run_options, run_sync, FakeResolver, RegistryCsv, RegistryRow, TempCorpus,
};

fn registry() -> RegistryCsv {
    RegistryCsv::new()
        .row(RegistryRow::new("SW1A 1AA", "51.501009", "-0.141588"))
        .row(RegistryRow::new("SW1A 2AA", "51.503541", "-0.127670"))
        .row(RegistryRow::new("M1 1AE", "53.480800", "-2.242600"))
        .row(RegistryRow::new("BT1 1AA", "54.597300", "-5.930100").country("N92000002"))
}

fn resolver() -> Arc<dyn HierarchyResolver> {
    Arc::new(FakeResolver::new([("SW1A", 404_477_281), ("M1", 404_477_299)]))
}

#[tokio::test]
async fn second_run_is_a_no_op() -> Result<()> {
    let corpus = TempCorpus::new()?;
    corpus.put(10, &existing_record(10, "SW1A 1AA", "GB"))?;
    corpus.put(11, &existing_record(11, "EC1A 1BB", "GB"))?;
    corpus.put(12, &existing_record(12, "ZZ99 9ZZ", "GB"))?;

    let (_, first) = run_sync(&registry(), run_options(&corpus), Some(resolver())).await?;
    let first = first?;
    assert_eq!(first.counts.updated, 1);
    assert_eq!(first.counts.ceased, 1);
    assert_eq!(first.counts.deprecated, 1);
    assert_eq!(first.counts.created, 3);
    let after_first = corpus.snapshot()?;

    // A later clock: only a real change may refresh wof:lastmodified.
    let mut opts = run_options(&corpus);
    opts.fixed_clock = Some(1_900_000_000);
    let (_, second) = run_sync(&registry(), opts, Some(resolver())).await?;
    let second = second?;

    assert_eq!(second.counts.updated, 0);
    assert_eq!(second.counts.ceased, 0);
    assert_eq!(second.counts.deprecated, 0);
    assert_eq!(second.counts.created, 0);
    assert_eq!(second.counts.errored, 0);
    assert_eq!(second.counts.skipped_for(SkipReason::Unchanged), 4);
    assert_eq!(second.counts.skipped_for(SkipReason::AlreadyTerminal), 2);
    assert_eq!(second.counts.skipped_for(SkipReason::AlreadySeen), 4);
    assert_eq!(corpus.snapshot()?, after_first);
    Ok(())
}

#[tokio::test]
async fn enrich_then_export_of_canonical_record_reports_no_change() -> Result<()> {
    let corpus = TempCorpus::new()?;
    corpus.put(10, &existing_record(10, "SW1A 1AA", "GB"))?;
    let (_, first) = run_sync(&registry(), run_options(&corpus), Some(resolver())).await?;
    first?;

    let path = corpus.path_for(10)?;
    let stored = load_record(&path)?;
    let table = registry().table()?;
    let entry = table.lookup("SW1A 1AA").unwrap();
    let resolver = resolver();

    let enriched = enrich(&stored.doc, entry, Some(resolver.as_ref()), &EnrichPolicy::default()).await?;
    let out = Exporter::new(corpus.root(), false)
        .with_fixed_clock(1_900_000_000)
        .export_if_changed(enriched, Some(&stored.raw))?;
    assert!(!out.changed);
    assert_eq!(std::fs::read(&path)?, stored.raw);
    Ok(())
}
