use axum::response::Html;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

use jobq::shutdown;

#[derive(Parser, Debug)]
#[command(name = "jobq-dashboard", about = "Static dashboard for the job queue")]
struct Args {
    /// HTTP listen port
    #[arg(long, default_value_t = 3000)]
    port: u16,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // Dashboard page is embedded at compile time.
    let app = Router::new().route(
        "/",
        get(|| async { Html(include_str!("../../static/index.html")) }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind listener");

    tracing::info!(%addr, "dashboard listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("dashboard stopped");
}
