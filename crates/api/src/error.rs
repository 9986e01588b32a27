use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use slides_core::error::CoreError;
use slides_events::StatusError;
use slides_pipeline::{AcceptError, AdmissionError};

/// Application-level error type for HTTP handlers.
///
/// Domain errors from the lower crates are folded into [`CoreError`] so
/// every response has the same `{ "error", "code" }` shape.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A multipart body axum rejected, with the status it chose (413 for an
    /// oversized upload).
    #[error("Multipart error: {message}")]
    Multipart { status: StatusCode, message: String },

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, .. } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Unavailable(msg) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_BUSY", msg.clone())
                }
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            AppError::Multipart { status, message } => {
                let code = if *status == StatusCode::PAYLOAD_TOO_LARGE {
                    "PAYLOAD_TOO_LARGE"
                } else {
                    "BAD_REQUEST"
                };
                (*status, code, message.clone())
            }
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<AdmissionError> for AppError {
    fn from(e: AdmissionError) -> Self {
        match e {
            AdmissionError::Validation(msg) => AppError::Core(CoreError::Validation(msg)),
            AdmissionError::Busy => AppError::Core(CoreError::Unavailable(e.to_string())),
            other => AppError::InternalError(other.to_string()),
        }
    }
}

impl From<StatusError> for AppError {
    fn from(e: StatusError) -> Self {
        match e {
            StatusError::JobNotFound(id) => AppError::Core(CoreError::NotFound {
                entity: "Job",
                id: id.to_string(),
            }),
            StatusError::ResultNotFound(id) => AppError::Core(CoreError::NotFound {
                entity: "Result",
                id: id.to_string(),
            }),
            StatusError::Store(e) => AppError::InternalError(e.to_string()),
        }
    }
}

impl From<AcceptError> for AppError {
    fn from(e: AcceptError) -> Self {
        match e {
            AcceptError::Busy => AppError::Core(CoreError::Unavailable(e.to_string())),
            AcceptError::NotFound(id) => AppError::Core(CoreError::NotFound { entity: "Job", id }),
            AcceptError::Store(e) => AppError::InternalError(e.to_string()),
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        AppError::Multipart {
            status: e.status(),
            message: e.body_text(),
        }
    }
}
