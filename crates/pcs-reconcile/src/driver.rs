use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, error, info};

use pcs_config::{CreationSettings, TargetSettings};
use pcs_corpus::{
    load_record, walk_records, CorpusError, ExportError, Exporter, RecordLoadError,
    SequentialIdMinter,
};
use pcs_enrich::{cease, deprecate, enrich, synthesize, EnrichError, EnrichPolicy};
use pcs_hierarchy::HierarchyResolver;
use pcs_registry::RegistryTable;
use pcs_schemas::{postcode, ReconcileOutcome, RegistryRecord, SkipReason};

use crate::counters::{OutcomeCounters, OutcomeCounts};
use crate::policy::{CreationPolicy, DenylistPolicy};
use crate::pool::{run_pool, PoolError, PoolOptions};
use crate::seen::SeenSet;

/// Per-run switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub corpus_root: PathBuf,
    /// Registry as-of date; written as the cessation date of dropped codes.
    pub as_of: NaiveDate,
    /// Written as the deprecation date of invalid codes.
    pub run_date: NaiveDate,
    pub dry_run: bool,
    pub no_create: bool,
    pub no_update: bool,
    pub prefix_filter: Option<String>,
    pub pool: PoolOptions,
    /// Pass-two workers.
    pub create_workers: usize,
    /// New identifiers are greater than this and than every identifier seen.
    pub id_floor: i64,
    /// Pin `wof:lastmodified` instead of reading the clock.
    pub fixed_clock: Option<i64>,
}

impl RunOptions {
    pub fn new(corpus_root: impl Into<PathBuf>, as_of: NaiveDate) -> Self {
        Self {
            corpus_root: corpus_root.into(),
            as_of,
            run_date: chrono::Utc::now().date_naive(),
            dry_run: false,
            no_create: false,
            no_update: false,
            prefix_filter: None,
            pool: PoolOptions::default(),
            create_workers: 1,
            id_floor: 0,
            fixed_clock: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error(transparent)]
    Walk(#[from] CorpusError),
    #[error(transparent)]
    Load(#[from] RecordLoadError),
    #[error(transparent)]
    Enrich(#[from] EnrichError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// A record error with the path or code it concerns.
#[derive(Debug, thiserror::Error)]
#[error("{subject}: {source}")]
pub struct RecordFailure {
    pub subject: String,
    #[source]
    pub source: RecordError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub counts: OutcomeCounts,
    /// Size of the seen set after pass one.
    pub seen: usize,
    pub dry_run: bool,
    /// Highest identifier observed in the corpus.
    pub max_existing_id: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("run aborted: {failure}")]
    Aborted {
        #[source]
        failure: RecordFailure,
        /// Totals up to the point dispatch stopped.
        summary: RunSummary,
    },
    #[error("worker task failed: {0}")]
    Pool(#[from] tokio::task::JoinError),
}

struct Settled {
    code: String,
    id: Option<i64>,
    outcome: ReconcileOutcome,
}

/// The reconciliation driver. Build it, wrap it in an `Arc`, call [`Reconciler::run`].
pub struct Reconciler {
    registry: Arc<RegistryTable>,
    resolver: Option<Arc<dyn HierarchyResolver>>,
    enrich_policy: EnrichPolicy,
    creation: Arc<dyn CreationPolicy>,
    target: TargetSettings,
    opts: RunOptions,
    seen: SeenSet,
    counters: OutcomeCounters,
    max_id: AtomicI64,
}

impl Reconciler {
    pub fn new(registry: Arc<RegistryTable>, opts: RunOptions) -> Self {
        Self {
            registry,
            resolver: None,
            enrich_policy: EnrichPolicy::default(),
            creation: Arc::new(DenylistPolicy::from_settings(&CreationSettings::default())),
            target: TargetSettings::default(),
            opts,
            seen: SeenSet::new(),
            counters: OutcomeCounters::new(),
            max_id: AtomicI64::new(0),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn HierarchyResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_enrich_policy(mut self, policy: EnrichPolicy) -> Self {
        self.enrich_policy = policy;
        self
    }

    pub fn with_creation_policy(mut self, policy: Arc<dyn CreationPolicy>) -> Self {
        self.creation = policy;
        self
    }

    pub fn with_target(mut self, target: TargetSettings) -> Self {
        self.target = target;
        self
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    pub fn counts(&self) -> OutcomeCounts {
        self.counters.snapshot()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            counts: self.counters.snapshot(),
            seen: self.seen.len(),
            dry_run: self.opts.dry_run,
            max_existing_id: self.max_id.load(Ordering::Relaxed),
        }
    }

    /// Both passes. Pass two starts only once every pass-one worker has joined.
    pub async fn run(self: Arc<Self>) -> Result<RunSummary, RunError> {
        let opts = &self.opts;
        info!(
            corpus = %opts.corpus_root.display(),
            registry = self.registry.len(),
            workers = opts.pool.workers,
            dry_run = opts.dry_run,
            "pass one: reconciling existing records"
        );
        let exporter = self.exporter();
        self.pass_one(exporter)
            .await
            .map_err(|e| self.abort(e))?;
        info!(seen = self.seen.len(), counts = %self.counters.snapshot(), "pass one complete");

        if opts.no_create {
            info!("creation disabled, skipping pass two");
        } else {
            let floor = opts.id_floor.max(self.max_id.load(Ordering::Relaxed));
            info!(id_floor = floor, "pass two: creating unseen registry entries");
            let exporter = self
                .exporter()
                .with_minter(Arc::new(SequentialIdMinter::starting_after(floor)));
            self.pass_two(exporter)
                .await
                .map_err(|e| self.abort(e))?;
        }

        Ok(self.summary())
    }

    fn exporter(&self) -> Exporter {
        let exporter = Exporter::new(&self.opts.corpus_root, self.opts.dry_run);
        match self.opts.fixed_clock {
            Some(ts) => exporter.with_fixed_clock(ts),
            None => exporter,
        }
    }

    async fn pass_one(self: &Arc<Self>, exporter: Exporter) -> Result<(), PoolError<RecordFailure>> {
        let this = Arc::clone(self);
        let exporter = Arc::new(exporter);
        let items = walk_records(&self.opts.corpus_root);
        run_pool(items, self.opts.pool, move |item| {
            let this = Arc::clone(&this);
            let exporter = Arc::clone(&exporter);
            async move {
                let path = match item {
                    Ok(path) => path,
                    Err(e) => {
                        let subject = this.opts.corpus_root.display().to_string();
                        return Err(this.fail(subject, e.into()));
                    }
                };
                match this.reconcile_existing(&exporter, &path).await {
                    Ok(settled) => {
                        this.note(&settled);
                        Ok(())
                    }
                    Err(e) => Err(this.fail(path.display().to_string(), e)),
                }
            }
        })
        .await
    }

    /// Existing-record state machine.
    async fn reconcile_existing(
        &self,
        exporter: &Exporter,
        path: &Path,
    ) -> Result<Settled, RecordError> {
        let record = load_record(path)?;
        self.max_id.fetch_max(record.id, Ordering::Relaxed);
        let settled = |outcome| Settled {
            code: record.name.clone(),
            id: Some(record.id),
            outcome,
        };

        if record.country.as_deref() != Some(self.target.country.as_str()) {
            return Ok(settled(ReconcileOutcome::Skipped(SkipReason::ForeignJurisdiction)));
        }
        self.seen.insert(&record.name);

        if self.opts.no_update {
            return Ok(settled(ReconcileOutcome::Skipped(SkipReason::UpdatesDisabled)));
        }
        if !self.matches_prefix(&record.name) {
            return Ok(settled(ReconcileOutcome::Skipped(SkipReason::PrefixFiltered)));
        }

        let Some(entry) = self.registry.lookup(&record.name) else {
            // Absent from the registry: a well-formed code has been retired,
            // a malformed one should never have existed.
            let (candidate, outcome) = if postcode::is_valid(&record.name) {
                (cease(&record.doc, self.opts.as_of), ReconcileOutcome::Ceased)
            } else {
                (
                    deprecate(&record.doc, self.opts.run_date),
                    ReconcileOutcome::Deprecated,
                )
            };
            let Some(candidate) = candidate else {
                return Ok(settled(ReconcileOutcome::Skipped(SkipReason::AlreadyTerminal)));
            };
            let out = exporter.export_if_changed(candidate, Some(&record.raw))?;
            return Ok(settled(changed_or_unchanged(out.changed, outcome)));
        };

        if record.is_ceased() || record.is_deprecated() {
            debug!(
                code = %record.name,
                ceased = record.is_ceased(),
                deprecated = record.is_deprecated(),
                "registry lists a terminal record, markers kept"
            );
        }
        let candidate = enrich(
            &record.doc,
            entry,
            self.resolver.as_deref(),
            &self.enrich_policy,
        )
        .await?;
        let out = exporter.export_if_changed(candidate, Some(&record.raw))?;
        Ok(settled(changed_or_unchanged(out.changed, ReconcileOutcome::Updated)))
    }

    async fn pass_two(self: &Arc<Self>, exporter: Exporter) -> Result<(), PoolError<RecordFailure>> {
        let mut pending: Vec<RegistryRecord> = Vec::new();
        self.registry
            .for_each(|entry| {
                match self.creation_gate(entry) {
                    Some(reason) => self.note(&Settled {
                        code: entry.code.clone(),
                        id: None,
                        outcome: ReconcileOutcome::Skipped(reason),
                    }),
                    None => pending.push(entry.clone()),
                }
                Ok::<(), Infallible>(())
            })
            .unwrap_or_else(|never| match never {});
        info!(pending = pending.len(), "new registry entries to create");

        let this = Arc::clone(self);
        let exporter = Arc::new(exporter);
        let workers = self.opts.create_workers.max(1);
        let opts = PoolOptions {
            workers,
            queue_depth: workers * 2,
            fail_fast: self.opts.pool.fail_fast,
        };
        run_pool(pending, opts, move |entry| {
            let this = Arc::clone(&this);
            let exporter = Arc::clone(&exporter);
            async move {
                match this.create_missing(&exporter, &entry).await {
                    Ok(settled) => {
                        this.note(&settled);
                        Ok(())
                    }
                    Err(e) => Err(this.fail(entry.code.clone(), e)),
                }
            }
        })
        .await
    }

    /// Reason an unseen registry entry is not created, if any.
    fn creation_gate(&self, entry: &RegistryRecord) -> Option<SkipReason> {
        if self.seen.contains(&entry.code) {
            Some(SkipReason::AlreadySeen)
        } else if !self.matches_prefix(&entry.code) {
            Some(SkipReason::PrefixFiltered)
        } else if !self.creation.allows(entry) {
            Some(SkipReason::Ineligible)
        } else {
            None
        }
    }

    async fn create_missing(
        &self,
        exporter: &Exporter,
        entry: &RegistryRecord,
    ) -> Result<Settled, RecordError> {
        let skeleton = synthesize(entry, &self.target);
        let candidate = enrich(
            &skeleton,
            entry,
            self.resolver.as_deref(),
            &self.enrich_policy,
        )
        .await?;
        let out = exporter.export_if_changed(candidate, None)?;
        Ok(Settled {
            code: entry.code.clone(),
            id: Some(out.id),
            outcome: changed_or_unchanged(out.changed, ReconcileOutcome::Created),
        })
    }

    fn matches_prefix(&self, code: &str) -> bool {
        self.opts
            .prefix_filter
            .as_deref()
            .map_or(true, |prefix| code.starts_with(prefix))
    }

    fn note(&self, settled: &Settled) {
        self.counters.record(settled.outcome);
        match settled.outcome {
            ReconcileOutcome::Skipped(reason) => {
                debug!(code = %settled.code, id = settled.id, reason = reason.as_str(), "skipped");
            }
            outcome => {
                info!(
                    code = %settled.code,
                    id = settled.id,
                    outcome = %outcome,
                    dry_run = self.opts.dry_run,
                    "record {outcome}"
                );
            }
        }
    }

    fn fail(&self, subject: String, source: RecordError) -> RecordFailure {
        self.counters.record_error();
        error!(subject = %subject, error = %source, "record failed");
        RecordFailure { subject, source }
    }

    fn abort(&self, e: PoolError<RecordFailure>) -> RunError {
        match e {
            PoolError::Aborted(failure) => RunError::Aborted {
                failure,
                summary: self.summary(),
            },
            PoolError::Join(e) => RunError::Pool(e),
        }
    }
}

fn changed_or_unchanged(changed: bool, outcome: ReconcileOutcome) -> ReconcileOutcome {
    if changed {
        outcome
    } else {
        ReconcileOutcome::Skipped(SkipReason::Unchanged)
    }
}
