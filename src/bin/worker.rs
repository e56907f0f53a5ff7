use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use jobq::db::{self, SqliteStore};
use jobq::metrics::Metrics;
use jobq::services::{FixedDelayHandler, WorkerService};
use jobq::shutdown;

const HANDLER_DELAY: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "jobq-worker", about = "Job queue worker process")]
struct Args {
    /// Path to the SQLite database file
    #[arg(long, default_value = "jobs.db")]
    db: PathBuf,

    /// Lease horizon in seconds; must comfortably exceed handler duration
    #[arg(long, default_value_t = 30)]
    lease_secs: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let args = Args::parse();

    tracing::info!(db = %args.db.display(), "opening job store");
    let pool = db::init_pool(&args.db)
        .await
        .expect("failed to open database");
    db::init_schema(&pool)
        .await
        .expect("failed to initialize schema");

    let store = Arc::new(SqliteStore::new(pool.clone()));
    let metrics = Arc::new(Metrics::new());
    let handler = Arc::new(FixedDelayHandler::new(HANDLER_DELAY));
    let worker = WorkerService::new(store, metrics, handler)
        .with_lease_duration(Duration::from_secs(args.lease_secs));

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        shutdown::shutdown_signal().await;
        tracing::info!("shutting down worker");
        signal_token.cancel();
    });

    tracing::info!("worker started, polling for jobs");
    worker.run(cancel).await;

    pool.close().await;
    tracing::info!("worker stopped");
}
