//! `pcs sync`: build the registry, pick a resolver, run both passes.
//!
//! Everything up to the first record is setup; any failure there exits
//! non-zero before the corpus is touched.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::{info, warn};

use pcs_config::{
    load_layered_yaml, report_unused_keys, LoadedConfig, ResolverKind, SyncConfig,
    UnusedKeyPolicy,
};
use pcs_enrich::EnrichPolicy;
use pcs_hierarchy::{HierarchyResolver, PrefixTableResolver, SpatialOptions, SpatialResolver};
use pcs_reconcile::{DenylistPolicy, PoolOptions, Reconciler, RunError, RunOptions};
use pcs_registry::RegistryTable;

/// Environment fallback for `--pip-url`.
pub const ENV_PIP_URL: &str = "PCS_PIP_URL";

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Registry CSV (one row per postcode)
    #[arg(long)]
    pub registry_csv: PathBuf,

    /// Publication date of the registry snapshot, YYYY-MM-DD
    #[arg(long)]
    pub registry_date: String,

    /// Root of the record corpus
    #[arg(long)]
    pub corpus: PathBuf,

    /// Layered config paths in merge order
    #[arg(long = "config")]
    pub config_paths: Vec<String>,

    /// Compute and report every change without writing
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Skip pass two (creation of new records)
    #[arg(long, default_value_t = false)]
    pub no_create: bool,

    /// Only mark existing records seen; no cease/deprecate/update
    #[arg(long, default_value_t = false)]
    pub no_update: bool,

    /// Only process codes starting with this prefix
    #[arg(long)]
    pub prefix_filter: Option<String>,

    /// Publish coordinates for licence-restricted prefixes
    #[arg(long, default_value_t = false)]
    pub ignore_restrictive_licence: bool,

    /// Count and log per-record failures instead of stopping at the first
    #[arg(long, default_value_t = false)]
    pub keep_going: bool,

    /// Pass-one workers (overrides pool.workers)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Point-in-polygon endpoint; selects the spatial resolver
    #[arg(long)]
    pub pip_url: Option<String>,

    /// Postal region documents; selects the prefix-table resolver
    #[arg(long)]
    pub regions_path: Option<PathBuf>,

    /// Fail when the config carries keys the sync does not read
    #[arg(long, default_value_t = false)]
    pub strict_config: bool,
}

pub async fn run(args: SyncArgs) -> Result<()> {
    let as_of = super::parse_registry_date(&args.registry_date)?;

    let config_refs: Vec<&str> = args.config_paths.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&config_refs)?;
    check_unused_keys(&loaded, args.strict_config)?;
    let env_pip_url = std::env::var(ENV_PIP_URL).ok().filter(|v| !v.trim().is_empty());
    let cfg = loaded
        .settings_with(|cfg| apply_overrides(cfg, &args, env_pip_url))
        .context("invalid sync configuration")?;

    if !args.corpus.is_dir() {
        bail!("corpus root '{}' is not a directory", args.corpus.display());
    }

    let registry = RegistryTable::build(&args.registry_csv)
        .with_context(|| format!("failed to build registry from '{}'", args.registry_csv.display()))?;

    let denylist = DenylistPolicy::from_settings(&cfg.creation);
    for code in denylist.unknown_codes(&registry) {
        warn!(code, "denylisted country code does not occur in the registry");
    }

    let workers = cfg.pool.effective_workers();
    let resolver = build_resolver(&cfg, workers)?;

    let mut opts = RunOptions::new(&args.corpus, as_of);
    opts.dry_run = args.dry_run;
    opts.no_create = args.no_create;
    opts.no_update = args.no_update;
    opts.prefix_filter = args.prefix_filter.clone().filter(|p| !p.is_empty());
    opts.pool = PoolOptions {
        workers,
        queue_depth: cfg.pool.effective_queue_depth(),
        fail_fast: cfg.pool.fail_fast,
    };
    opts.create_workers = cfg.pool.create_workers;
    opts.id_floor = cfg.ids.floor;

    info!(
        config_hash = %loaded.config_hash,
        registry_date = %as_of,
        resolver = resolver.as_ref().map(|r| r.name()).unwrap_or("none"),
        fail_fast = opts.pool.fail_fast,
        "sync starting"
    );
    if args.dry_run {
        info!("dry run: no records will be written");
    }

    let mut reconciler = Reconciler::new(Arc::new(registry), opts)
        .with_enrich_policy(EnrichPolicy::from_settings(
            &cfg.geometry,
            args.ignore_restrictive_licence,
        ))
        .with_creation_policy(Arc::new(denylist))
        .with_target(cfg.target.clone());
    if let Some(resolver) = resolver {
        reconciler = reconciler.with_resolver(resolver);
    }

    match Arc::new(reconciler).run().await {
        Ok(summary) => {
            info!(
                seen = summary.seen,
                dry_run = summary.dry_run,
                config_hash = %loaded.config_hash,
                "{}",
                summary.counts
            );
            println!("{}", summary.counts);
            Ok(())
        }
        Err(RunError::Aborted { failure, summary }) => {
            info!(
                seen = summary.seen,
                dry_run = summary.dry_run,
                config_hash = %loaded.config_hash,
                "{}",
                summary.counts
            );
            println!("{}", summary.counts);
            Err::<(), _>(failure).context(
                "sync stopped at the first record failure (use --keep-going to continue past failures)",
            )
        }
        Err(e) => Err(e.into()),
    }
}

fn check_unused_keys(loaded: &LoadedConfig, strict: bool) -> Result<()> {
    let policy = if strict {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let report = report_unused_keys(&loaded.config_json, policy)?;
    for pointer in &report.unused_leaf_pointers {
        warn!(pointer = %pointer, "config key is not used by the sync");
    }
    Ok(())
}

/// Command-line flags win over config; the environment fills a missing URL.
fn apply_overrides(cfg: &mut SyncConfig, args: &SyncArgs, env_pip_url: Option<String>) {
    if let Some(workers) = args.workers {
        cfg.pool.workers = workers;
    }
    if args.keep_going {
        cfg.pool.fail_fast = false;
    }

    if let Some(url) = &args.pip_url {
        cfg.resolver.kind = ResolverKind::Spatial;
        cfg.resolver.url = Some(url.clone());
    } else if let Some(path) = &args.regions_path {
        cfg.resolver.kind = ResolverKind::Prefix;
        cfg.resolver.regions_path = Some(path.clone());
    } else if cfg.resolver.kind == ResolverKind::Spatial && cfg.resolver.url.is_none() {
        cfg.resolver.url = env_pip_url;
    }
}

fn build_resolver(cfg: &SyncConfig, workers: usize) -> Result<Option<Arc<dyn HierarchyResolver>>> {
    let rs = &cfg.resolver;
    match rs.kind {
        ResolverKind::None => Ok(None),
        ResolverKind::Spatial => {
            let url = rs
                .url
                .as_deref()
                .context("spatial resolver selected without a url")?;
            let resolver = SpatialResolver::new(
                url,
                SpatialOptions {
                    connect_timeout: Duration::from_secs(rs.connect_timeout_secs),
                    idle_timeout: Duration::from_secs(rs.idle_timeout_secs),
                    request_timeout: Duration::from_secs(rs.request_timeout_secs),
                    max_idle_per_host: workers.max(1),
                    allowed_placetypes: rs.allowed_placetypes.clone(),
                },
            )
            .context("failed to initialise spatial resolver")?;
            info!(url, "spatial resolver ready");
            Ok(Some(Arc::new(resolver)))
        }
        ResolverKind::Prefix => {
            let root = rs
                .regions_path
                .as_deref()
                .context("prefix resolver selected without regions_path")?;
            let resolver = PrefixTableResolver::build(root)
                .context("failed to build postal region table")?;
            if resolver.is_empty() {
                bail!("no postal regions found under '{}'", root.display());
            }
            info!(path = %root.display(), regions = resolver.len(), "prefix resolver ready");
            Ok(Some(Arc::new(resolver)))
        }
    }
}
