use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use stegstream_core::error::CoreError;
use stegstream_events::StoreError;
use stegstream_pipeline::DispatchError;

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain errors of the lower crates and adds HTTP-specific
/// variants. Implements [`IntoResponse`] to produce consistent JSON error
/// responses of the form `{"error": "...", "code": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `stegstream_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A submission the dispatcher refused or could not stage.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// A command-store lookup failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// 404 for an unknown command id.
    pub fn command_not_found(id: impl Into<String>) -> Self {
        AppError::Core(CoreError::NotFound {
            entity: "Command",
            id: id.into(),
        })
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
            },

            // --- Dispatch errors ---
            AppError::Dispatch(err) => match err {
                DispatchError::InvalidJobType(_) => (
                    StatusCode::BAD_REQUEST,
                    "BAD_REQUEST",
                    "Invalid command type".to_string(),
                ),
                DispatchError::Store(store) => classify_store_error(store),
                DispatchError::Io(_) => internal(&err.to_string()),
            },

            AppError::Store(err) => classify_store_error(err),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => internal(msg),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn classify_store_error(err: &StoreError) -> (StatusCode, &'static str, String) {
    match err {
        StoreError::NotFound(id) => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("Command with id {id} not found"),
        ),
        StoreError::AlreadyExists(_) => internal(&err.to_string()),
    }
}

/// Log the real cause and return a sanitized 500.
fn internal(detail: &str) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %detail, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}
