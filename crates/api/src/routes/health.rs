use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;
use slides_db::DbPool;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the database is reachable. Absent without a database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_healthy: Option<bool>,
}

/// GET /health -- returns service and, when configured, database health.
async fn health_check(State(pool): State<Option<DbPool>>) -> Json<HealthResponse> {
    let db_healthy = match &pool {
        Some(pool) => Some(slides_db::health_check(pool).await.is_ok()),
        None => None,
    };

    let status = if db_healthy == Some(false) { "degraded" } else { "ok" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
    })
}

/// Mount health check routes (root level, not under `/api/v1`).
///
/// Carries its own state so both the service and the worker can merge it.
pub fn router<S>(pool: Option<DbPool>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .with_state(pool)
}
