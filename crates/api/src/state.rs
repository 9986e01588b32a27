use std::sync::Arc;

use slides_db::DbPool;
use slides_events::JobStatusService;
use slides_pipeline::{Dispatcher, JobProcessor};

use crate::config::ServerConfig;

/// Shared state of the public service, available to handlers via
/// `State<AppState>`. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Admission of new jobs.
    pub dispatcher: Arc<Dispatcher>,
    /// Lookups and live streams.
    pub status: Arc<JobStatusService>,
    /// Database pool when records live in PostgreSQL.
    pub pool: Option<DbPool>,
}

/// Shared state of the generation worker.
#[derive(Clone)]
pub struct WorkerState {
    pub config: Arc<ServerConfig>,
    pub processor: Arc<JobProcessor>,
    pub pool: Option<DbPool>,
}
