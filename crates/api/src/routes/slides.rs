//! Route definitions for job submission, status and results.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::slides;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generate", post(slides::generate_slides))
        .route("/slides/{id}", get(slides::get_slide_status))
        .route("/results/{id}", get(slides::get_slide_result))
}
