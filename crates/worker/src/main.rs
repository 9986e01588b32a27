//! Generation worker.
//!
//! Serves the hand-off endpoint and runs admitted jobs against the stores
//! and blob staging area it shares with the public service.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use slides_api::bootstrap::{self, Stores};
use slides_api::config::ServerConfig;
use slides_api::router::build_worker_router;
use slides_api::state::WorkerState;
use slides_pipeline::JobProcessor;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slides_worker=debug,slides_pipeline=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded worker configuration");

    let stores = Stores::connect(&config)
        .await
        .expect("Failed to initialise stores");
    if stores.pool.is_none() {
        tracing::warn!("Worker is using in-memory stores; job records are not shared with the API");
    }

    let processor = Arc::new(JobProcessor::new(
        Arc::clone(&stores.jobs),
        Arc::clone(&stores.results),
        bootstrap::generator(&config.generator).expect("Failed to build slide generator"),
        Some(bootstrap::blob_store(&config.blobs).await),
        config.processor_config(),
    ));

    let config = Arc::new(config);
    let app = build_worker_router(WorkerState {
        config: Arc::clone(&config),
        processor: Arc::clone(&processor),
        pool: stores.pool.clone(),
    });

    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, max_concurrent_jobs = config.max_concurrent_jobs, "Starting worker");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!(in_flight = processor.in_flight(), "Worker stopped accepting tasks, draining");
    let grace = Duration::from_secs(config.shutdown_timeout_secs);
    if tokio::time::timeout(grace, processor.shutdown()).await.is_err() {
        tracing::warn!(in_flight = processor.in_flight(), "Shutdown grace period elapsed with jobs still running");
    }
    tracing::info!("Graceful shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
