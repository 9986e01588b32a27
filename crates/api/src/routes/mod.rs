pub mod health;
pub mod slides;
pub mod tasks;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree (without middleware or state).
///
/// ```text
/// POST   /generate         -> submit a job (multipart)
/// GET    /slides/{id}      -> status as JSON or SSE
/// GET    /results/{id}     -> generated presentation
/// ```
pub fn api_routes() -> Router<AppState> {
    slides::router()
}
