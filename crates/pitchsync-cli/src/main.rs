use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pitchsync_core::{RunSpec, ScopeId};
use pitchsync_pipeline::{OfficialEntry, SourceRegistry, SyncConfig, SyncPipeline};
use pitchsync_source::CancelFlag;
use pitchsync_store::PgStatStore;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pitchsync")]
#[command(about = "Match-event dedup and player-stats aggregation pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch, dedupe, aggregate and persist one or more scopes.
    Sync {
        /// Scopes as competition:season pairs, e.g. 39:2025.
        #[arg(long = "scope", required = true)]
        scopes: Vec<String>,
        /// Source ids in trust order; defaults to the registry order.
        #[arg(long)]
        sources: Vec<String>,
        #[arg(long, default_value_t = 300)]
        rate_limit_ms: u64,
        #[arg(long, default_value_t = 3)]
        max_retries: usize,
        /// Optional official ranking feed (JSON) to reconcile against;
        /// requires exactly one --scope.
        #[arg(long)]
        official: Option<PathBuf>,
    },
    /// Reconcile an official ranking feed against already-persisted stat
    /// lines, without fetching anything.
    Reconcile {
        /// Scope as a competition:season pair, e.g. 39:2025.
        #[arg(long)]
        scope: String,
        /// Official ranking feed (JSON array of rows).
        #[arg(long)]
        official: PathBuf,
    },
    /// Apply database migrations.
    Migrate,
}

fn parse_scope(raw: &str) -> Result<ScopeId> {
    let (competition, season) = raw
        .split_once(':')
        .with_context(|| format!("scope `{raw}` is not competition:season"))?;
    Ok(ScopeId::new(competition, season))
}

fn load_official(path: &PathBuf) -> Result<Vec<OfficialEntry>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = SyncConfig::from_env();

    let store = PgStatStore::connect(&config.database_url)
        .await
        .context("connecting to database")?;

    match cli.command {
        Commands::Migrate => {
            store.migrate().await.context("running migrations")?;
            println!("migrations applied");
        }
        Commands::Sync {
            scopes,
            sources,
            rate_limit_ms,
            max_retries,
            official,
        } => {
            let registry = SourceRegistry::load(&config.registry_path())?;
            let sources = if sources.is_empty() {
                registry.trust_priority()
            } else {
                sources
            };

            if official.is_some() && scopes.len() > 1 {
                anyhow::bail!(
                    "--official applies to exactly one --scope; sync the scopes first, \
                     then use `pitchsync reconcile` per scope"
                );
            }
            let official: Option<Vec<OfficialEntry>> =
                official.as_ref().map(load_official).transpose()?;

            let pipeline = Arc::new(SyncPipeline::new(config, registry, Arc::new(store)));
            let cancel = CancelFlag::new();

            let specs = scopes
                .iter()
                .map(|raw| {
                    Ok(RunSpec {
                        scope: parse_scope(raw)?,
                        sources: sources.clone(),
                        rate_limit_ms,
                        max_retries,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            if let (Some(feed), [spec]) = (official.as_deref(), specs.as_slice()) {
                let summary = pipeline.run_scope(spec, &cancel, Some(feed)).await?;
                println!(
                    "sync {}: status={:?} fetched={} collapsed={} stat_lines={} diffs={} skipped_pages={}",
                    summary.scope,
                    summary.status,
                    summary.events_fetched,
                    summary.duplicates_collapsed,
                    summary.stat_lines_written,
                    summary.reconciliation_diffs,
                    summary.skipped_pages.len()
                );
                return Ok(());
            }

            let mut failed = false;
            for (scope, result) in pipeline.run_scopes(specs, &cancel).await {
                match result {
                    Ok(summary) => println!(
                        "sync {}: status={:?} fetched={} collapsed={} stat_lines={} skipped_pages={}",
                        scope,
                        summary.status,
                        summary.events_fetched,
                        summary.duplicates_collapsed,
                        summary.stat_lines_written,
                        summary.skipped_pages.len()
                    ),
                    Err(err) => {
                        failed = true;
                        error!(scope = %scope, error = %err, "scope run failed");
                    }
                }
            }
            if failed {
                anyhow::bail!("one or more scopes failed");
            }
        }
        Commands::Reconcile { scope, official } => {
            let registry = SourceRegistry::load(&config.registry_path())?;
            let scope = parse_scope(&scope)?;
            let feed = load_official(&official)?;

            let pipeline = SyncPipeline::new(config, registry, Arc::new(store));
            let findings = pipeline.reconcile_scope(&scope, &feed).await?;

            if findings.is_empty() {
                println!("reconcile {scope}: no drift against {} official rows", feed.len());
            } else {
                println!("{}", serde_json::to_string_pretty(&findings)?);
                println!("reconcile {scope}: {} findings", findings.len());
            }
        }
    }

    Ok(())
}
