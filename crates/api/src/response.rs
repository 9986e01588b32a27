//! Response shapes shared by the handlers.

use std::convert::Infallible;

use axum::http::header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use serde::Serialize;
use slides_core::job::{JobRecord, JobStatus};
use slides_core::types::{JobId, Timestamp};
use slides_events::{StatusStream, StreamEvent};

/// Body of an accepted submission.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedJob {
    pub id: JobId,
    pub status: JobStatus,
    pub message: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<JobRecord> for SubmittedJob {
    fn from(record: JobRecord) -> Self {
        Self {
            id: record.id,
            status: record.status,
            message: record.message,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Frame one stream event for SSE.
pub fn sse_event(event: &StreamEvent) -> Event {
    let frame = Event::default().event(event.name());
    match event.data() {
        Some(data) => frame.data(data.to_string()),
        None => frame,
    }
}

/// Serve a status stream as `text/event-stream`, with proxy buffering
/// disabled so frames reach the client as they are produced.
pub fn sse_response(stream: StatusStream) -> Response {
    let frames = stream.map(|event| Ok::<_, Infallible>(sse_event(&event)));

    let mut response = Sse::new(frames).into_response();
    let headers = response.headers_mut();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(
        HeaderName::from_static("x-accel-buffering"),
        HeaderValue::from_static("no"),
    );
    response
}

/// A PDF served as a download.
pub fn pdf_attachment(id: &JobId, pdf: Vec<u8>) -> Response {
    let disposition = format!("attachment; filename=presentation-{id}.pdf");
    let disposition = HeaderValue::from_str(&disposition)
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    (
        [
            (CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (CONTENT_DISPOSITION, disposition),
        ],
        pdf,
    )
        .into_response()
}

/// An HTML document rendered inline.
pub fn html_inline(html: Vec<u8>) -> Response {
    (
        [(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"))],
        html,
    )
        .into_response()
}
