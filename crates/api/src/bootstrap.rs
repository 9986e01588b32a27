//! Start-up wiring shared by the service and worker binaries.

use std::sync::Arc;

use slides_db::blob::{LocalBlobStore, S3BlobStore};
use slides_db::memory::{MemoryBlobStore, MemoryJobStore, MemoryResultStore};
use slides_db::postgres::{PgJobStore, PgResultStore};
use slides_db::{BlobStore, DbPool, JobStore, ResultStore};
use slides_generator::{ArtifactGenerator, GeminiClient, MarpRenderer, SlideGenerator};
use slides_pipeline::HttpTaskQueue;

use crate::config::{BlobBackend, GeneratorConfig, ServerConfig, StoreBackend};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("database unavailable: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("http client setup failed: {0}")]
    HttpClient(String),
}

/// The record stores selected by configuration.
#[derive(Clone)]
pub struct Stores {
    pub jobs: Arc<dyn JobStore>,
    pub results: Arc<dyn ResultStore>,
    /// Present for the PostgreSQL backend.
    pub pool: Option<DbPool>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            jobs: Arc::new(MemoryJobStore::new()),
            results: Arc::new(MemoryResultStore::new()),
            pool: None,
        }
    }

    /// Connect the configured backend, applying migrations for PostgreSQL.
    pub async fn connect(config: &ServerConfig) -> Result<Self, StartupError> {
        match &config.store {
            StoreBackend::Memory => {
                tracing::info!("Using in-memory job and result stores");
                Ok(Self::in_memory())
            }
            StoreBackend::Postgres { database_url } => {
                let pool = slides_db::create_pool(database_url).await?;
                tracing::info!("Database connection pool created");

                slides_db::health_check(&pool).await?;
                tracing::info!("Database health check passed");

                slides_db::run_migrations(&pool).await?;
                tracing::info!("Database migrations applied");

                Ok(Self {
                    jobs: Arc::new(PgJobStore::new(pool.clone(), config.store_poll_interval())),
                    results: Arc::new(PgResultStore::new(pool.clone())),
                    pool: Some(pool),
                })
            }
        }
    }
}

pub async fn blob_store(backend: &BlobBackend) -> Arc<dyn BlobStore> {
    match backend {
        BlobBackend::Memory => Arc::new(MemoryBlobStore::new()),
        BlobBackend::Local { root } => {
            tracing::info!(root = %root.display(), "Staging uploads on the local filesystem");
            Arc::new(LocalBlobStore::new(root.clone()))
        }
        BlobBackend::S3 { bucket, endpoint } => {
            tracing::info!(bucket = %bucket, "Staging uploads in S3");
            Arc::new(S3BlobStore::from_env(bucket.clone(), endpoint.as_deref()).await)
        }
    }
}

/// Model client and renderer composed into the slide generator.
pub fn generator(config: &GeneratorConfig) -> Result<Arc<dyn ArtifactGenerator>, StartupError> {
    let model = GeminiClient::new(
        config.api_url.clone(),
        config.api_key.clone(),
        config.model.clone(),
        config.max_output_tokens,
        config.request_timeout(),
    )
    .map_err(|e| StartupError::HttpClient(e.to_string()))?;
    let renderer = MarpRenderer::new(&config.marp_command, config.themes_dir.clone());
    tracing::info!(model = %config.model, command = %config.marp_command, "Slide generator configured");

    Ok(Arc::new(SlideGenerator::new(
        Arc::new(model),
        Arc::new(renderer),
        config.max_input_tokens,
    )))
}

/// Client for handing jobs to the worker at `worker_url`.
pub fn task_queue(worker_url: &str, config: &ServerConfig) -> Result<HttpTaskQueue, StartupError> {
    HttpTaskQueue::new(worker_url, config.handoff_timeout())
        .map_err(|e| StartupError::HttpClient(e.to_string()))
}
