use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use jobq::app_state::AppState;
use jobq::db::{self, SqliteStore};
use jobq::metrics::Metrics;
use jobq::routes;
use jobq::services::rate_limit::{
    DEFAULT_MAX_CONCURRENT_RUNNING, DEFAULT_MAX_SUBMISSIONS_PER_MINUTE,
};
use jobq::services::{JobService, RateLimiter};
use jobq::shutdown;

#[derive(Parser, Debug)]
#[command(name = "jobq-api", about = "Job queue HTTP API server")]
struct Args {
    /// Path to the SQLite database file
    #[arg(long, default_value = "jobs.db")]
    db: PathBuf,

    /// HTTP listen port
    #[arg(long, default_value_t = 8080)]
    port: u16,
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
    let limiter = RateLimiter::new(
        DEFAULT_MAX_CONCURRENT_RUNNING,
        DEFAULT_MAX_SUBMISSIONS_PER_MINUTE,
    );
    let jobs = JobService::new(store, limiter, Arc::clone(&metrics));
    let state = AppState::new(pool.clone(), jobs, metrics);

    let app = routes::build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind listener");

    tracing::info!(%addr, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::shutdown_signal())
        .await
        .expect("server error");

    pool.close().await;
    tracing::info!("server stopped");
}
