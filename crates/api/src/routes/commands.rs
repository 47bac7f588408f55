//! Route definitions for the `/commands` resource.
//!
//! All endpoints require the worker token. Submission lives in
//! [`super::submit_router`].

use axum::routing::get;
use axum::Router;

use crate::handlers::{commands, stream};
use crate::state::AppState;

/// Routes mounted at `/commands`.
///
/// ```text
/// GET    /{id}            -> get_command
/// GET    /{id}/stream     -> stream_command
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(commands::get_command))
        .route("/{id}/stream", get(stream::stream_command))
}
