pub mod commands;
pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /health                               readiness (requires token)
///
/// /commands/{id}                        snapshot
/// /commands/{id}/stream                 live log (SSE)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::api_router())
        .nest("/commands", commands::router())
}

/// Job submission, mounted at the root and kept out of the request timeout.
///
/// ```text
/// POST   /api/commands   -> submit_command (multipart)
/// ```
pub fn submit_router() -> Router<AppState> {
    Router::new().route("/api/commands", post(handlers::commands::submit_command))
}

/// Artifact downloads, mounted at the root.
///
/// ```text
/// GET    /uploads/{id}/{filename}   -> download_artifact
/// ```
pub fn uploads_router() -> Router<AppState> {
    Router::new().route(
        "/uploads/{id}/{filename}",
        get(handlers::commands::download_artifact),
    )
}
