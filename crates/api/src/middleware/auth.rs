//! Shared-token authentication extractor for Axum handlers.

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use serde::Deserialize;
use stegstream_core::error::CoreError;

use crate::error::AppError;
use crate::state::AppState;

/// Proof that the request carried the configured worker token.
///
/// The token is read from `Authorization: Bearer <token>` (a bare token in
/// the header is accepted too) or, failing that, from the `token` query
/// parameter, since browser `EventSource` clients cannot set headers.
///
/// ```ignore
/// async fn my_handler(_auth: WorkerAuth) -> AppResult<Json<()>> {
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct WorkerAuth;

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

impl FromRequestParts<AppState> for WorkerAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_token = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.strip_prefix("Bearer ").unwrap_or(v).trim().to_string());

        let token = header_token.or_else(|| {
            Query::<TokenQuery>::try_from_uri(&parts.uri)
                .ok()
                .and_then(|Query(q)| q.token)
        });

        match token {
            Some(token) if token == state.config.worker_token => Ok(WorkerAuth),
            _ => {
                tracing::debug!(path = %parts.uri.path(), "Rejected request without a valid worker token");
                Err(AppError::Core(CoreError::Unauthorized("Unauthorized".into())))
            }
        }
    }
}
