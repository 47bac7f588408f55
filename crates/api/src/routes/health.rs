use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::middleware::auth::WorkerAuth;
use crate::state::AppState;

/// Public service banner.
#[derive(Serialize)]
pub struct IndexResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub status: &'static str,
    pub ready: bool,
}

/// Authenticated readiness check.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
}

/// GET / -- public liveness banner.
async fn index() -> Json<IndexResponse> {
    Json(IndexResponse {
        name: "Stegstream Worker API",
        version: env!("CARGO_PKG_VERSION"),
        status: "running",
        ready: true,
    })
}

/// GET /api/health -- lets a client verify its token against the worker.
async fn health_check(_auth: WorkerAuth) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: "Worker is ready",
    })
}

/// Mount the public banner (intended for root-level, NOT under `/api`).
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(index))
}

/// Mount the token-protected health check under `/api`.
pub fn api_router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
