use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use api::ApiState;
use clap::{Args, Parser, Subcommand};
use common::constant::DEFAULT_API_PORT;
use common::logger;
use connector::{ConnectorConfig, RelayClient, RequestSource};
use dotenvy::dotenv;
use engine::{
    run_scheduler, run_snapshot, run_sync, LeaderboardJobs, SchedulerConfig, SnapshotConfig,
    SyncConfig,
};
use sea_orm::DatabaseConnection;
use store::{connect_db, DbStore, StoreConfig, SyncStore};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "leaderboard", about = "Relay volume leaderboard sync, snapshot and API")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Create missing tables and seed the sync cursor
    Migrate,
    /// Abandon a stuck pagination chain and resume from the watermark
    ResetCursor,
    /// Run one incremental sync and print its result
    Sync(SyncArgs),
    /// Rebuild the ranked snapshot once
    Snapshot(SnapshotArgs),
    /// Run the sync and snapshot jobs on their schedule until Ctrl-C
    Cron,
    /// Serve the read API
    Serve(ServeArgs),
}

#[derive(Args, Debug, Clone, Default)]
struct SyncArgs {
    /// Page budget for this run.
    #[arg(long)]
    max_pages: Option<usize>,
    /// Pause between page fetches.
    #[arg(long)]
    page_delay_ms: Option<u64>,
}

#[derive(Args, Debug, Clone, Default)]
struct SnapshotArgs {
    /// Number of wallets to rank.
    #[arg(long)]
    top_n: Option<u64>,
}

#[derive(Args, Debug, Clone)]
struct ServeArgs {
    #[arg(long, env = "PORT", default_value_t = DEFAULT_API_PORT)]
    port: u16,
    /// Also run the scheduler in this process.
    #[arg(long)]
    with_scheduler: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    logger::init_logging();
    let cli = Cli::parse();
    match cli.command {
        Command::Migrate => {
            open_db().await?;
            println!("schema up to date");
            Ok(())
        }
        Command::ResetCursor => {
            let store = DbStore::new(open_db().await?);
            let before = store.load_cursor().await?;
            let watermark = store.complete_run(0).await?;
            warn!(
                abandoned = ?before.last_continuation,
                watermark,
                "sync cursor reset"
            );
            println!("cursor reset, resuming from watermark {watermark}");
            Ok(())
        }
        Command::Sync(args) => {
            let mut cfg = SyncConfig::from_env();
            if let Some(pages) = args.max_pages {
                cfg.max_pages_per_run = pages.max(1);
            }
            if let Some(delay_ms) = args.page_delay_ms {
                cfg.page_delay = Duration::from_millis(delay_ms);
            }
            let store = DbStore::new(open_db().await?);
            let source = relay_source()?;
            let result = run_sync(source.as_ref(), &store, &cfg).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Command::Snapshot(args) => {
            let mut cfg = SnapshotConfig::from_env();
            if let Some(top_n) = args.top_n {
                cfg.top_n = top_n;
            }
            let db = open_db().await?;
            let rows = run_snapshot(&db, &cfg).await?;
            println!("snapshot published: {rows} rows");
            Ok(())
        }
        Command::Cron => {
            let jobs = build_jobs(open_db().await?)?;
            run_scheduler(jobs, SchedulerConfig::from_env(), shutdown_signal()).await
        }
        Command::Serve(args) => serve(args).await,
    }
}

async fn open_db() -> Result<DatabaseConnection> {
    connect_db(&StoreConfig::from_env()).await
}

fn relay_source() -> Result<Arc<dyn RequestSource>> {
    let cfg = ConnectorConfig::from_env();
    let client = RelayClient::from_config(&cfg).context("build relay client")?;
    info!(endpoint = client.endpoint(), "relay client ready");
    Ok(Arc::new(client))
}

fn build_jobs(db: DatabaseConnection) -> Result<LeaderboardJobs> {
    Ok(LeaderboardJobs::new(
        relay_source()?,
        DbStore::new(db),
        SyncConfig::from_env(),
        SnapshotConfig::from_env(),
    ))
}

async fn serve(args: ServeArgs) -> Result<()> {
    let db = open_db().await?;
    let mut state = ApiState::new(db.clone());
    let mut scheduler = None;
    if args.with_scheduler {
        let jobs = build_jobs(db)?;
        state = state.with_jobs(jobs.clone());
        scheduler = Some(tokio::spawn(run_scheduler(
            jobs,
            SchedulerConfig::from_env(),
            shutdown_signal(),
        )));
    }

    api::serve(state, args.port, shutdown_signal()).await?;

    if let Some(handle) = scheduler {
        match handle.await {
            Ok(result) => result?,
            Err(err) => warn!(error = %err, "scheduler task ended abnormally"),
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
