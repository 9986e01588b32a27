//! Handlers for submitting jobs, following their status and fetching
//! results.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::header::ACCEPT;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use slides_core::error::CoreError;
use slides_core::settings::SlideRequest;
use slides_core::types::JobId;
use slides_pipeline::SubmittedFile;

use crate::error::AppResult;
use crate::response::{html_inline, pdf_attachment, sse_response, SubmittedJob};
use crate::state::AppState;

/// Multipart field holding the JSON request.
const DATA_FIELD: &str = "data";
/// Multipart field name for each uploaded document.
const FILES_FIELD: &str = "files";

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/generate
///
/// Accepts a `data` field with the JSON request and one or more `files`.
/// Returns 202 as soon as the job is admitted.
pub async fn generate_slides(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let mut data = None;
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(DATA_FIELD) => data = Some(field.text().await?),
            Some(FILES_FIELD) => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                files.push(SubmittedFile {
                    filename,
                    data: bytes.to_vec(),
                });
            }
            other => {
                tracing::debug!(field = ?other, "Ignoring unknown form field");
            }
        }
    }

    let data = data.ok_or_else(|| CoreError::Validation("Missing data field in form".into()))?;
    let request = SlideRequest::parse(&data)?;

    let record = state.dispatcher.add_job(&request, files).await?;
    tracing::info!(job_id = %record.id, "Job submitted");

    Ok((StatusCode::ACCEPTED, Json(SubmittedJob::from(record))))
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// GET /api/v1/slides/{id}
///
/// Returns the current status as JSON, or a live SSE stream when the
/// client accepts `text/event-stream`.
pub async fn get_slide_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let id = JobId::from(id);

    if wants_event_stream(&headers) {
        let stream = state.status.stream_job(&id).await?;
        tracing::debug!(job_id = %id, "Status stream opened");
        return Ok(sse_response(stream));
    }

    let update = state.status.get_job(&id).await?;
    Ok(Json(update).into_response())
}

fn wants_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.contains("text/event-stream"))
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ResultQuery {
    #[serde(default)]
    pub download: Option<String>,
}

impl ResultQuery {
    fn is_download(&self) -> bool {
        self.download.as_deref() == Some("true")
    }
}

/// GET /api/v1/results/{id}
///
/// `?download=true` serves the PDF as an attachment; otherwise the HTML
/// rendering is served inline.
pub async fn get_slide_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ResultQuery>,
) -> AppResult<Response> {
    let id = JobId::from(id);
    let result = state.status.get_result(&id).await?;

    if query.is_download() {
        Ok(pdf_attachment(&id, result.bundle.pdf))
    } else {
        Ok(html_inline(result.bundle.html))
    }
}
