//! Server-sent event stream of a command's log.
//!
//! Wire sequence: a `retry` hint, `event: connected`, one `event: log` per
//! backlog entry, live `event: log` entries, then a single `event: done`
//! after which the stream closes. Idle periods carry keep-alive comments.
//! Dropping the connection drops the subscription.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::header::CACHE_CONTROL;
use axum::http::HeaderName;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use futures::{stream, StreamExt};
use serde::Serialize;
use stegstream_core::command::{CommandOutcome, CommandStatus};
use stegstream_core::types::CommandId;
use stegstream_events::{CommandSnapshot, StreamEvent};

use crate::error::AppResult;
use crate::middleware::auth::WorkerAuth;
use crate::state::AppState;

/// Reconnect delay suggested to `EventSource` clients.
pub const RETRY_INTERVAL: Duration = Duration::from_millis(3000);

/// Idle time before a keep-alive comment is sent.
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Payload of the terminal `done` event.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonePayload<'a> {
    pub status: CommandStatus,
    pub result: Option<&'a CommandOutcome>,
    pub has_result_file: bool,
    pub result_file: Option<&'a str>,
}

impl<'a> From<&'a CommandSnapshot> for DonePayload<'a> {
    fn from(snapshot: &'a CommandSnapshot) -> Self {
        Self {
            status: snapshot.status,
            result: snapshot.result.as_ref(),
            has_result_file: snapshot.artifact.is_some(),
            result_file: snapshot.artifact.as_ref().map(|a| a.file_name.as_str()),
        }
    }
}

/// GET /api/commands/{id}/stream
pub async fn stream_command(
    _auth: WorkerAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let id = CommandId::from(id);
    let subscription = state.store.subscribe(&id)?;
    tracing::debug!(
        command_id = %id,
        backlog = subscription.backlog_len(),
        "Stream subscriber attached"
    );

    let head = stream::iter([
        Event::default().retry(RETRY_INTERVAL),
        json_event("connected", &serde_json::json!({ "commandId": id })),
    ]);
    let body = subscription.into_stream().map(|event| match &event {
        StreamEvent::Log(entry) => json_event("log", entry),
        StreamEvent::Done(snapshot) => json_event("done", &DonePayload::from(snapshot)),
    });
    let events = head.chain(body).map(Ok::<_, Infallible>);

    let keep_alive = KeepAlive::new().interval(KEEP_ALIVE_INTERVAL).text("hb");
    let sse = Sse::new(events).keep_alive(keep_alive);

    Ok((
        [
            (CACHE_CONTROL, "no-cache, no-transform"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        sse,
    ))
}

/// A named event with a JSON body. Serialization of these payloads cannot
/// fail; should it ever, the event degrades to an empty data line.
fn json_event(name: &str, payload: &impl Serialize) -> Event {
    let data = serde_json::to_string(payload).unwrap_or_else(|e| {
        tracing::error!(event = name, error = %e, "Failed to serialize stream event");
        String::new()
    });
    Event::default().event(name).data(data)
}
