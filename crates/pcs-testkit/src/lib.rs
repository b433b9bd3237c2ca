//! Fixtures for scenario tests: a throwaway corpus, a registry CSV builder,
//! a deterministic in-process resolver and a one-call driver runner.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde_json::{json, Value};
use tempfile::TempDir;
use walkdir::WalkDir;

use pcs_corpus::{canonical_bytes, id_to_abs_path};
use pcs_hierarchy::{HierarchyResolver, ParentResolution, ResolverError};
use pcs_reconcile::{Reconciler, RunError, RunOptions, RunSummary};
use pcs_registry::RegistryTable;
use pcs_schemas::{postcode, Hierarchy, RegistryRecord};

/// Fixed `wof:lastmodified` used by every fixture run.
pub const FIXED_CLOCK: i64 = 1_700_000_000;

/// Registry publication date used by the scenarios.
pub fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 2, 1).expect("valid date")
}

/// Run date used by the scenarios.
pub fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).expect("valid date")
}

/// A corpus in a temporary directory, deleted on drop.
pub struct TempCorpus {
    dir: TempDir,
}

impl TempCorpus {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir().context("create temp corpus")?,
        })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path_for(&self, id: i64) -> Result<PathBuf> {
        id_to_abs_path(self.root(), id).with_context(|| format!("no path for id {id}"))
    }

    /// Store `doc` in canonical form under its id path.
    pub fn put(&self, id: i64, doc: &Value) -> Result<PathBuf> {
        let path = self.path_for(id)?;
        self.put_bytes(&path, &canonical_bytes(doc)?)?;
        Ok(path)
    }

    /// Store arbitrary bytes at `path` (for malformed records).
    pub fn put_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, bytes).with_context(|| format!("write {}", path.display()))
    }

    pub fn read(&self, id: i64) -> Result<Value> {
        let path = self.path_for(id)?;
        let raw = std::fs::read(&path).with_context(|| format!("read {}", path.display()))?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Relative path -> bytes for every file in the corpus.
    pub fn snapshot(&self) -> Result<BTreeMap<PathBuf, Vec<u8>>> {
        let mut out = BTreeMap::new();
        for entry in WalkDir::new(self.root()) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry.path().strip_prefix(self.root())?.to_path_buf();
            out.insert(rel, std::fs::read(entry.path())?);
        }
        Ok(out)
    }

    /// Every stored record keyed by `wof:name`.
    pub fn records_by_name(&self) -> Result<BTreeMap<String, Value>> {
        let mut out = BTreeMap::new();
        for (rel, bytes) in self.snapshot()? {
            let doc: Value = serde_json::from_slice(&bytes)
                .with_context(|| format!("parse {}", rel.display()))?;
            if let Some(name) = doc["properties"]["wof:name"].as_str() {
                out.insert(name.to_string(), doc);
            }
        }
        Ok(out)
    }
}

/// A stored postcode record as the corpus holds it before a sync.
pub fn existing_record(id: i64, code: &str, country: &str) -> Value {
    json!({
        "id": id,
        "type": "Feature",
        "geometry": {"type": "Point", "coordinates": [-0.1, 51.5]},
        "properties": {
            "wof:id": id,
            "wof:name": code,
            "wof:country": country,
            "wof:placetype": "postalcode",
            "wof:repo": "whosonfirst-data-postalcode-gb",
            "mz:is_current": 1,
            "edtf:inception": "uuuu",
            "edtf:cessation": "uuuu",
            "os:admin_distict_code": "E09000007",
            "wof:lastmodified": 1_500_000_000,
        }
    })
}

/// One registry row. Dates are raw `YYYYMM` cells, empty for none.
#[derive(Debug, Clone)]
pub struct RegistryRow {
    pub code: String,
    pub lat: String,
    pub long: String,
    pub dointr: String,
    pub doterm: String,
    pub ctry: String,
}

impl RegistryRow {
    pub fn new(code: &str, lat: &str, long: &str) -> Self {
        Self {
            code: code.to_string(),
            lat: lat.to_string(),
            long: long.to_string(),
            dointr: "198001".to_string(),
            doterm: String::new(),
            ctry: "E92000001".to_string(),
        }
    }

    pub fn terminated(mut self, yyyymm: &str) -> Self {
        self.doterm = yyyymm.to_string();
        self
    }

    pub fn country(mut self, ctry: &str) -> Self {
        self.ctry = ctry.to_string();
        self
    }
}

/// Registry CSV builder.
#[derive(Debug, Clone, Default)]
pub struct RegistryCsv {
    rows: Vec<RegistryRow>,
}

impl RegistryCsv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(mut self, row: RegistryRow) -> Self {
        self.rows.push(row);
        self
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut w = csv::Writer::from_writer(Vec::new());
        w.write_record([
            "pcd", "pcds", "dointr", "doterm", "oscty", "oslaua", "osgrdind", "ctry", "rgn",
            "lat", "long",
        ])?;
        for r in &self.rows {
            let compact = r.code.replace(' ', "");
            w.write_record([
                compact.as_str(),
                r.code.as_str(),
                r.dointr.as_str(),
                r.doterm.as_str(),
                "E99999999",
                "E09000033",
                "1",
                r.ctry.as_str(),
                "E12000007",
                r.lat.as_str(),
                r.long.as_str(),
            ])?;
        }
        w.into_inner().context("flush registry csv")
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_bytes()?).with_context(|| format!("write {}", path.display()))
    }

    pub fn table(&self) -> Result<RegistryTable> {
        Ok(RegistryTable::from_reader(self.to_bytes()?.as_slice())?)
    }
}

/// Resolver keyed by outward code. Deterministic and side-effect free apart
/// from the call counter.
#[derive(Debug, Default)]
pub struct FakeResolver {
    parents: HashMap<String, i64>,
    calls: AtomicUsize,
}

impl FakeResolver {
    pub fn new(parents: impl IntoIterator<Item = (&'static str, i64)>) -> Self {
        Self {
            parents: parents
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl HierarchyResolver for FakeResolver {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn resolve_parent(
        &self,
        entry: &RegistryRecord,
    ) -> Result<Option<ParentResolution>, ResolverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outward = postcode::outward_code(&entry.code);
        Ok(self.parents.get(outward).map(|id| {
            let mut h = Hierarchy::new();
            h.insert("postalregion_id".to_string(), *id);
            h.insert("country_id".to_string(), 85633159);
            ParentResolution {
                parent_id: *id,
                hierarchy: vec![h],
            }
        }))
    }
}

/// Driver options for a fixture corpus: pinned dates and clock, one worker.
pub fn run_options(corpus: &TempCorpus) -> RunOptions {
    let mut opts = RunOptions::new(corpus.root(), as_of());
    opts.run_date = run_date();
    opts.fixed_clock = Some(FIXED_CLOCK);
    opts
}

/// Build a reconciler over `registry` and run both passes.
pub async fn run_sync(
    registry: &RegistryCsv,
    opts: RunOptions,
    resolver: Option<Arc<dyn HierarchyResolver>>,
) -> Result<(Arc<Reconciler>, Result<RunSummary, RunError>)> {
    let mut reconciler = Reconciler::new(Arc::new(registry.table()?), opts);
    if let Some(resolver) = resolver {
        reconciler = reconciler.with_resolver(resolver);
    }
    let reconciler = Arc::new(reconciler);
    let result = Arc::clone(&reconciler).run().await;
    Ok((reconciler, result))
}
