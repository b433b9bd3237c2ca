//! The `pcs` binary end to end: summary on stdout, setup errors on stderr.

use std::path::PathBuf;

use pcs_testkit::{existing_record, RegistryCsv, RegistryRow, TempCorpus};
use predicates::prelude::*;

fn pcs(cwd: &std::path::Path) -> anyhow::Result<assert_cmd::Command> {
    let mut cmd = assert_cmd::Command::cargo_bin("pcs")?;
    // Run outside the repo so no .env.local is picked up.
    cmd.current_dir(cwd)
        .env_remove("PCS_PIP_URL")
        .env("RUST_LOG", "warn");
    Ok(cmd)
}

fn defaults_yaml() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("config")
        .join("defaults")
        .join("sync.yaml")
}

#[test]
fn sync_prints_summary_line() -> anyhow::Result<()> {
    let corpus = TempCorpus::new()?;
    corpus.put(11, &existing_record(11, "SW1A 1AA", "GB"))?;
    let work = tempfile::tempdir()?;
    let csv = work.path().join("registry.csv");
    RegistryCsv::new()
        .row(RegistryRow::new("SW1A 1AA", "51.501009", "-0.141588"))
        .row(RegistryRow::new("M1 1AE", "53.479251", "-2.240764"))
        .write_to(&csv)?;

    pcs(work.path())?
        .args(["sync", "--registry-date", "2024-02-01"])
        .arg("--registry-csv")
        .arg(&csv)
        .arg("--corpus")
        .arg(corpus.root())
        .arg("--config")
        .arg(defaults_yaml())
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "ceased=0 deprecated=0 updated=1 created=1 skipped=1 errored=0",
        ));

    assert_eq!(corpus.snapshot()?.len(), 2);
    Ok(())
}

#[test]
fn dry_run_leaves_corpus_untouched() -> anyhow::Result<()> {
    let corpus = TempCorpus::new()?;
    corpus.put(11, &existing_record(11, "EC1A 1BB", "GB"))?;
    let before = corpus.snapshot()?;
    let work = tempfile::tempdir()?;
    let csv = work.path().join("registry.csv");
    RegistryCsv::new()
        .row(RegistryRow::new("M1 1AE", "53.479251", "-2.240764"))
        .write_to(&csv)?;

    pcs(work.path())?
        .args(["sync", "--registry-date", "2024-02-01", "--dry-run"])
        .arg("--registry-csv")
        .arg(&csv)
        .arg("--corpus")
        .arg(corpus.root())
        .assert()
        .success()
        .stdout(predicate::str::contains("ceased=1").and(predicate::str::contains("created=1")));

    assert_eq!(corpus.snapshot()?, before);
    Ok(())
}

#[test]
fn bad_registry_date_names_the_value() -> anyhow::Result<()> {
    let corpus = TempCorpus::new()?;
    let work = tempfile::tempdir()?;

    pcs(work.path())?
        .args(["sync", "--registry-date", "01/02/2024", "--registry-csv", "r.csv"])
        .arg("--corpus")
        .arg(corpus.root())
        .assert()
        .failure()
        .stderr(predicate::str::contains("01/02/2024"));
    Ok(())
}

#[test]
fn missing_registry_fails_before_touching_corpus() -> anyhow::Result<()> {
    let corpus = TempCorpus::new()?;
    corpus.put(11, &existing_record(11, "EC1A 1BB", "GB"))?;
    let before = corpus.snapshot()?;
    let work = tempfile::tempdir()?;

    pcs(work.path())?
        .args(["sync", "--registry-date", "2024-02-01", "--registry-csv", "absent.csv"])
        .arg("--corpus")
        .arg(corpus.root())
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent.csv"));

    assert_eq!(corpus.snapshot()?, before);
    Ok(())
}

#[test]
fn config_hash_prints_hash_and_canonical_json() -> anyhow::Result<()> {
    let work = tempfile::tempdir()?;
    pcs(work.path())?
        .arg("config-hash")
        .arg(defaults_yaml())
        .assert()
        .success()
        .stdout(predicate::str::starts_with("config_hash=").and(predicate::str::contains("\"fail_fast\"")));
    Ok(())
}
