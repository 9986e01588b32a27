//! Route definitions for the worker's hand-off endpoint.

use axum::routing::post;
use axum::Router;
use slides_pipeline::task::PROCESS_TASK_PATH;

use crate::handlers::tasks;
use crate::state::WorkerState;

/// ```text
/// POST   /tasks/process-slides   -> run a handed-off job
/// ```
pub fn router() -> Router<WorkerState> {
    Router::new().route(PROCESS_TASK_PATH, post(tasks::process_slides))
}
