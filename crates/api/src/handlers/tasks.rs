//! Worker-side hand-off endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use slides_core::types::JobId;
use slides_pipeline::{GenerationTask, TaskAcceptance};

use crate::error::AppResult;
use crate::state::WorkerState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskReceipt {
    #[serde(rename = "jobID")]
    pub job_id: JobId,
    pub status: &'static str,
}

/// POST /tasks/process-slides
///
/// 202 when the job is started or already running here, 200 when it has
/// already finished, 503 when the worker is at capacity.
pub async fn process_slides(
    State(state): State<WorkerState>,
    Json(task): Json<GenerationTask>,
) -> AppResult<impl IntoResponse> {
    let job_id = task.job_id.clone();
    let acceptance = state.processor.accept_task(task).await?;

    let (status, label) = match acceptance {
        TaskAcceptance::Accepted => (StatusCode::ACCEPTED, "accepted"),
        TaskAcceptance::AlreadyRunning => (StatusCode::ACCEPTED, "running"),
        TaskAcceptance::AlreadyFinished => (StatusCode::OK, "finished"),
    };
    tracing::info!(job_id = %job_id, outcome = label, "Hand-off task received");

    Ok((status, Json(TaskReceipt { job_id, status: label })))
}
