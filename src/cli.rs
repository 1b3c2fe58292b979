//! Command-line interface.
//!
//! `serve` hosts the seed endpoints; `reset`, `delete` and `insert` drive the
//! pipeline against a running service; `tables` prints the configured order.
//!
//! Settings come from flags or the environment (a `.env` file is honoured):
//!
//! - `PORT`, `DATABASE_URL`, `SEED_ROOT` for `serve`
//! - `DEMO_DATA_API_URL`, `DEMO_DATA_SOURCE`, `DEMO_DATA_SETTLE_MS` for the pipeline commands

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;

use crate::api::{self, AppState};
use crate::client::HttpSeedClient;
use crate::domain::aggregates::TableStatus;
use crate::domain::events::Phase;
use crate::domain::value_objects::SourceFolder;
use crate::pipeline::{RunSnapshot, TableResetPipeline};
use crate::seed::SeedRepository;
use crate::sink::TracingProgressSink;
use crate::store::{MemoryTableStore, PgTableStore, TableStore};
use crate::tables::{TableOrder, FOREIGN_KEYS};

#[derive(Debug, Parser)]
#[command(name = "opensase-demo-data")]
#[command(author, version, about = "Reset and reseed the storefront's demo data", long_about = None)]
pub struct Cli {
    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Serve the row-delete and row-insert endpoints.
    Serve(ServeArgs),
    /// Delete every demo table, then reload all of them from a seed bundle.
    Reset(ResetArgs),
    /// Run only the deletion phase.
    Delete(RemoteArgs),
    /// Run only the insertion phase.
    Insert(InsertArgs),
    /// Print the deletion and insertion order and check them.
    Tables,
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[arg(long, env = "PORT", default_value_t = 8083)]
    pub port: u16,

    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Directory holding one sub-folder per seed bundle.
    #[arg(long, env = "SEED_ROOT", default_value = "./seed")]
    pub seed_root: PathBuf,

    /// Keep rows in memory instead of Postgres.
    #[arg(long)]
    pub memory: bool,
}

#[derive(Debug, Args)]
pub struct RemoteArgs {
    #[arg(long, env = "DEMO_DATA_API_URL", default_value = "http://localhost:8083")]
    pub api_url: String,

    /// Per-request timeout of the HTTP client. Unset means no timeout.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Print the final progress snapshot as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct InsertArgs {
    #[command(flatten)]
    pub remote: RemoteArgs,

    /// Seed bundle to load rows from.
    #[arg(long, env = "DEMO_DATA_SOURCE", default_value = SourceFolder::DEMO_DATA)]
    pub source: String,
}

#[derive(Debug, Args)]
pub struct ResetArgs {
    #[command(flatten)]
    pub insert: InsertArgs,

    /// Pause between the two phases, in milliseconds.
    #[arg(long, env = "DEMO_DATA_SETTLE_MS", default_value_t = 1000)]
    pub settle_ms: u64,
}

/// Runs the parsed command to completion.
///
/// # Errors
///
/// Returns an error when configuration is invalid, the service cannot be
/// reached or started, or any table ends up failed.
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve(args) => serve(args).await,
        Commands::Reset(args) => reset(args).await,
        Commands::Delete(args) => delete(args).await,
        Commands::Insert(args) => insert(args).await,
        Commands::Tables => tables(),
    }
}

fn storefront_order() -> Result<TableOrder> {
    let order = TableOrder::storefront()?;
    order.validate(FOREIGN_KEYS).context("Built-in table order is inconsistent")?;
    Ok(order)
}

async fn serve(args: ServeArgs) -> Result<()> {
    let order = storefront_order()?;
    let store: Arc<dyn TableStore> = if args.memory {
        tracing::warn!("using in-memory store, nothing is persisted");
        Arc::new(MemoryTableStore::new())
    } else {
        let url = args.database_url.context("DATABASE_URL is required unless --memory is set")?;
        let db = PgPoolOptions::new().max_connections(10).connect(&url).await.context("Failed to connect to database")?;
        Arc::new(PgTableStore::new(db))
    };

    let app = api::router(AppState::new(store, SeedRepository::new(&args.seed_root), order));
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port)).await?;
    tracing::info!(seed_root = %args.seed_root.display(), "demo-data service listening on 0.0.0.0:{}", args.port);
    axum::serve(listener, app).await?;
    Ok(())
}

fn pipeline(remote: &RemoteArgs, settle: Duration) -> Result<TableResetPipeline<HttpSeedClient, TracingProgressSink>> {
    let client = HttpSeedClient::new(&remote.api_url, remote.timeout_secs.map(Duration::from_secs))?;
    Ok(TableResetPipeline::new(client, TracingProgressSink).with_settle_delay(settle))
}

fn source_folder(raw: &str) -> Result<SourceFolder> {
    SourceFolder::new(raw).with_context(|| format!("Invalid source folder {raw:?}"))
}

async fn reset(args: ResetArgs) -> Result<()> {
    let order = storefront_order()?;
    let source = source_folder(&args.insert.source)?;
    let pipeline = pipeline(&args.insert.remote, Duration::from_millis(args.settle_ms))?;
    let summary = pipeline.run(&order, &source).await?.context("A reset is already running")?;
    tracing::info!(run_id = %summary.run_id, elapsed_ms = summary.elapsed_ms, "reset finished");
    report(&pipeline.snapshot().await, args.insert.remote.json)
}

async fn delete(args: RemoteArgs) -> Result<()> {
    let order = storefront_order()?;
    let pipeline = pipeline(&args, Duration::ZERO)?;
    pipeline.run_deletion_phase(order.deletion()).await?.context("A reset is already running")?;
    report(&pipeline.snapshot().await, args.json)
}

async fn insert(args: InsertArgs) -> Result<()> {
    let order = storefront_order()?;
    let source = source_folder(&args.source)?;
    let pipeline = pipeline(&args.remote, Duration::ZERO)?;
    pipeline.run_insertion_phase(order.insertion(), &source).await?.context("A reset is already running")?;
    report(&pipeline.snapshot().await, args.remote.json)
}

fn tables() -> Result<()> {
    let order = storefront_order()?;
    println!("{:>3}  {:<28} {:<28}", "#", "delete", "insert");
    for (i, (d, ins)) in order.deletion().iter().zip(order.insertion()).enumerate() {
        println!("{:>3}  {:<28} {:<28}", i + 1, d.as_str(), ins.as_str());
    }
    println!("{} tables, {} foreign keys checked", order.deletion().len(), FOREIGN_KEYS.len());
    Ok(())
}

fn report(snapshot: &RunSnapshot, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(snapshot)?);
    } else {
        for phase in [Phase::Deletion, Phase::Insertion] {
            let entries = match phase { Phase::Deletion => &snapshot.deletion, Phase::Insertion => &snapshot.insertion };
            for e in entries {
                let mark = match e.status {
                    TableStatus::Completed => "ok",
                    TableStatus::Failed => "FAILED",
                    TableStatus::Pending | TableStatus::Running => "-",
                };
                println!("{phase:<9}  {:<28} {mark:<6}  {}", e.table.as_str(), e.message);
            }
        }
    }

    let failed = snapshot.failed_tables(Phase::Deletion).count() + snapshot.failed_tables(Phase::Insertion).count();
    if failed > 0 {
        anyhow::bail!("{failed} table operation(s) failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_reset() {
        let cli = Cli::try_parse_from(["opensase-demo-data", "reset", "--api-url", "http://seed:9000", "--source", "production-import", "--settle-ms", "0"]).unwrap();
        let Commands::Reset(args) = cli.command else { panic!("expected reset") };
        assert_eq!(args.insert.remote.api_url, "http://seed:9000");
        assert_eq!(args.insert.source, "production-import");
        assert_eq!(args.settle_ms, 0);
        assert_eq!(args.insert.remote.timeout_secs, None);
    }

    #[test]
    fn test_parse_delete_with_timeout() {
        let cli = Cli::try_parse_from(["opensase-demo-data", "delete", "--timeout-secs", "45"]).unwrap();
        let Commands::Delete(remote) = cli.command else { panic!("expected delete") };
        assert_eq!(remote.timeout_secs, Some(45));
    }

    #[test]
    fn test_parse_serve_memory() {
        let cli = Cli::try_parse_from(["opensase-demo-data", "serve", "--memory", "--port", "9100"]).unwrap();
        let Commands::Serve(args) = cli.command else { panic!("expected serve") };
        assert!(args.memory);
        assert_eq!(args.port, 9100);
    }

    #[test]
    fn test_report_fails_on_failed_tables() {
        use crate::domain::aggregates::PhaseProgress;
        use crate::domain::aggregates::RunState;
        use crate::domain::value_objects::TableName;

        let mut failed = PhaseProgress::pending(TableName::new("users").unwrap());
        failed.status = TableStatus::Failed;
        failed.error = Some("boom".into());
        let snapshot = RunSnapshot { run_id: uuid::Uuid::now_v7(), state: RunState::DeletionComplete, source: None, deletion: vec![failed], insertion: vec![] };
        assert!(report(&snapshot, true).is_err());

        let clean = RunSnapshot { deletion: vec![], ..snapshot };
        assert!(report(&clean, false).is_ok());
    }
}
