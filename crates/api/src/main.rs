use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use slides_api::background;
use slides_api::bootstrap::{self, Stores};
use slides_api::config::{DispatchMode, ServerConfig};
use slides_api::router::build_app_router;
use slides_api::state::AppState;
use slides_events::JobStatusService;
use slides_pipeline::{Dispatcher, JobProcessor, Scheduler};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slides_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Stores ---
    let stores = Stores::connect(&config)
        .await
        .expect("Failed to initialise stores");

    // --- Dispatcher ---
    let (processor, scheduler) = match &config.dispatch {
        DispatchMode::Local => {
            let processor = Arc::new(JobProcessor::new(
                Arc::clone(&stores.jobs),
                Arc::clone(&stores.results),
                bootstrap::generator(&config.generator).expect("Failed to build slide generator"),
                None,
                config.processor_config(),
            ));
            tracing::info!(max_concurrent_jobs = config.max_concurrent_jobs, "Running jobs in-process");
            (Some(Arc::clone(&processor)), Scheduler::Local(processor))
        }
        DispatchMode::Remote { worker_url } => {
            let queue = bootstrap::task_queue(worker_url, &config).expect("Failed to build worker client");
            tracing::info!(endpoint = %queue.endpoint(), "Handing jobs off to worker");
            let scheduler = Scheduler::Remote {
                queue: Arc::new(queue),
                blobs: bootstrap::blob_store(&config.blobs).await,
            };
            (None, scheduler)
        }
    };
    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&stores.jobs), scheduler));

    // --- Status service ---
    let status = Arc::new(JobStatusService::new(
        Arc::clone(&stores.jobs),
        Arc::clone(&stores.results),
        config.subscriber_buffer,
        config.heartbeat(),
    ));

    // --- Background tasks ---
    let cancel = CancellationToken::new();
    let sweep_handle = tokio::spawn(background::expiry_sweep::run(
        Arc::clone(&stores.jobs),
        Arc::clone(&stores.results),
        config.sweep_interval(),
        cancel.clone(),
    ));

    // --- App state ---
    let config = Arc::new(config);
    let state = AppState {
        config: Arc::clone(&config),
        dispatcher,
        status,
        pool: stores.pool.clone(),
    };
    let app = build_app_router(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), sweep_handle).await;
    tracing::info!("Expiry sweep stopped");

    if let Some(processor) = processor {
        let grace = Duration::from_secs(config.shutdown_timeout_secs);
        tracing::info!(in_flight = processor.in_flight(), "Waiting for running jobs");
        if tokio::time::timeout(grace, processor.shutdown()).await.is_err() {
            tracing::warn!(in_flight = processor.in_flight(), "Shutdown grace period elapsed with jobs still running");
        }
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
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
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
