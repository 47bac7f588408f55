//! Handlers for submitting commands, inspecting them, and downloading
//! their artifacts.

use axum::extract::{Multipart, Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use stegstream_core::command::JobParams;
use stegstream_core::error::CoreError;
use stegstream_core::types::CommandId;
use stegstream_events::CommandSnapshot;
use stegstream_pipeline::{JobRequest, Upload};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::WorkerAuth;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub command_id: CommandId,
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/commands
///
/// Multipart fields: `type`, `params` (JSON), `file` (cover, required) and
/// `wordlist` (optional). Returns as soon as the command is registered.
pub async fn submit_command(
    _auth: WorkerAuth,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<SubmitResponse>> {
    let mut kind = String::new();
    let mut raw_params = String::new();
    let mut cover: Option<Upload> = None;
    let mut wordlist: Option<Upload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "type" => {
                kind = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
            }
            "params" => {
                raw_params = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
            }
            "file" | "wordlist" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;

                // An empty part with no file name is an unselected form input.
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                let upload = Upload {
                    file_name,
                    bytes: bytes.to_vec(),
                };
                if name == "file" {
                    cover = Some(upload);
                } else {
                    wordlist = Some(upload);
                }
            }
            other => {
                tracing::debug!(field = %other, "Ignoring unknown multipart field");
            }
        }
    }

    let cover = cover.ok_or_else(|| AppError::BadRequest("No cover file uploaded".into()))?;
    let params = JobParams::from_json(&raw_params)?;

    let command_id = state
        .dispatcher
        .submit(JobRequest {
            kind: kind.trim().to_string(),
            params,
            cover,
            wordlist,
        })
        .await?;

    Ok(Json(SubmitResponse { command_id }))
}

// ---------------------------------------------------------------------------
// Inspect
// ---------------------------------------------------------------------------

/// GET /api/commands/{id}
pub async fn get_command(
    _auth: WorkerAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<CommandSnapshot>> {
    let id = CommandId::from(id);
    state
        .store
        .snapshot(&id)
        .map(Json)
        .ok_or_else(|| AppError::command_not_found(id.as_str()))
}

// ---------------------------------------------------------------------------
// Download
// ---------------------------------------------------------------------------

/// GET /uploads/{id}/{filename}
///
/// Serves the command's artifact as an attachment named `filename`,
/// whatever the file is called on disk.
pub async fn download_artifact(
    _auth: WorkerAuth,
    State(state): State<AppState>,
    Path((id, filename)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let id = CommandId::from(id);
    let snapshot = state
        .store
        .snapshot(&id)
        .ok_or_else(|| AppError::command_not_found(id.as_str()))?;

    let not_found = || {
        AppError::Core(CoreError::NotFound {
            entity: "File",
            id: filename.clone(),
        })
    };
    let artifact = snapshot.artifact.ok_or_else(not_found)?;

    let bytes = match tokio::fs::read(&artifact.path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => {
            return Err(AppError::InternalError(format!(
                "Failed to read {}: {e}",
                artifact.path.display()
            )))
        }
    };

    tracing::info!(command_id = %id, file = %artifact.file_name, size = bytes.len(), "Serving artifact");
    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", attachment_name(&filename)),
            ),
        ],
        bytes,
    ))
}

/// Header values must be visible ASCII; quotes would end the parameter.
fn attachment_name(requested: &str) -> String {
    let name: String = requested
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();
    if name.is_empty() {
        "download".to_string()
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_name_strips_quotes_and_controls() {
        assert_eq!(attachment_name("song.mp3"), "song.mp3");
        assert_eq!(attachment_name("a\"b\\c\r\n.mp3"), "abc.mp3");
        assert_eq!(attachment_name("\"\""), "download");
        assert_eq!(attachment_name("chanson-é.mp3"), "chanson-_.mp3");
    }
}
