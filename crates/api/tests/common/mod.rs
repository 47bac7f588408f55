#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use stegstream_api::config::{LogFormat, ServerConfig};
use stegstream_api::router::build_app_router;
use stegstream_api::state::AppState;
use stegstream_core::command::LogKind;
use stegstream_core::scripting::executor::{
    LogSink, ToolError, ToolInvocation, ToolOutput, ToolRunner,
};
use stegstream_core::toolkit::{extracted_text_name, Toolkit};
use tempfile::TempDir;
use tower::ServiceExt;

pub const TOKEN: &str = "test-token";
pub const SECRET: &str = "secret123";
pub const HIDDEN_TEXT: &str = "meet at dawn";
pub const BOUNDARY: &str = "stegstream-test-boundary";

/// Stand-in for MP3Stego: encode writes the output file, decode writes
/// `<cover>.txt` when the passphrase is [`SECRET`].
pub struct FakeStego;

#[async_trait]
impl ToolRunner for FakeStego {
    async fn run(
        &self,
        invocation: &ToolInvocation,
        sink: &dyn LogSink,
    ) -> Result<ToolOutput, ToolError> {
        let args = &invocation.args;
        let dir = &invocation.working_directory;
        let last = args.last().cloned().unwrap_or_default();
        let password = args
            .iter()
            .position(|a| a == "-P")
            .and_then(|i| args.get(i + 1))
            .cloned();

        let success = match args.first().map(String::as_str) {
            Some("-E") => {
                sink.emit("[Frame 20]", LogKind::Info);
                tokio::fs::write(dir.join(&last), b"stego audio").await?;
                true
            }
            Some("-X") if password.as_deref() == Some(SECRET) => {
                tokio::fs::write(dir.join(extracted_text_name(&last)), HIDDEN_TEXT).await?;
                true
            }
            _ => false,
        };

        Ok(ToolOutput {
            success,
            exit_code: Some(if success { 0 } else { 1 }),
            stdout: String::new(),
            stderr: if success { String::new() } else { "wrong passphrase".into() },
            duration_ms: 1,
        })
    }
}

/// Build a test `ServerConfig` rooted in temporary directories.
pub fn test_config(work_dir: &Path, bin_dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        max_upload_bytes: 1024 * 1024,
        worker_token: TOKEN.to_string(),
        worker_token_generated: false,
        work_dir: work_dir.to_path_buf(),
        toolkit: Toolkit::mp3stego(bin_dir, "encode.exe", "decode.exe"),
        attempt_timeout_secs: 5,
        subscriber_buffer: 100,
        log_format: LogFormat::Text,
    }
}

/// The router plus everything that must outlive it.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _work: TempDir,
    _bin: TempDir,
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub fn work_dir(&self) -> &Path {
        self.state.config.work_dir.as_path()
    }
}

/// Build the full application router, with all middleware layers, around
/// [`FakeStego`].
pub fn build_test_app() -> TestApp {
    build_test_app_with(|_| {})
}

/// [`build_test_app`] with a tweaked configuration.
pub fn build_test_app_with(configure: impl FnOnce(&mut ServerConfig)) -> TestApp {
    let work = tempfile::tempdir().unwrap();
    let bin = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(bin.path().join("tables")).unwrap();

    let mut config = test_config(work.path(), bin.path());
    configure(&mut config);
    let state = AppState::new(config.clone(), Arc::new(FakeStego));
    let router = build_app_router(state.clone(), &config);

    TestApp {
        router,
        state,
        _work: work,
        _bin: bin,
    }
}

/// GET without credentials.
pub fn get(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

/// GET with the worker token as a Bearer header.
pub fn authed_get(path: &str) -> Request<Body> {
    Request::builder()
        .uri(path)
        .header("authorization", format!("Bearer {TOKEN}"))
        .body(Body::empty())
        .unwrap()
}

/// A multipart form part.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

/// Encode `parts` as a `multipart/form-data` body delimited by [`BOUNDARY`].
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body: Vec<u8> = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, file_name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Authenticated `POST /api/commands` carrying `body`.
pub fn submit_request_with_body(body: Body) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/commands")
        .header("authorization", format!("Bearer {TOKEN}"))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(body)
        .unwrap()
}

/// Authenticated `POST /api/commands` with a multipart body.
pub fn submit_request(parts: &[Part<'_>]) -> Request<Body> {
    submit_request_with_body(Body::from(multipart_body(parts)))
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    tokio::time::timeout(Duration::from_secs(10), response.into_body().collect())
        .await
        .expect("body should complete")
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

/// `(event name, data)` pairs of a complete SSE body. Comment lines and the
/// bare `retry` record are skipped.
pub fn sse_events(body: &str) -> Vec<(String, serde_json::Value)> {
    body.split("\n\n")
        .filter_map(|record| {
            let mut name = None;
            let mut data = String::new();
            for line in record.lines() {
                if let Some(v) = line.strip_prefix("event:") {
                    name = Some(v.trim().to_string());
                } else if let Some(v) = line.strip_prefix("data:") {
                    data.push_str(v.trim_start());
                }
            }
            let name = name?;
            Some((name, serde_json::from_str(&data).unwrap_or(serde_json::Value::Null)))
        })
        .collect()
}

/// Submit a job and return its command id.
pub async fn submit(app: &TestApp, parts: &[Part<'_>]) -> String {
    let response = app.send(submit_request(parts)).await;
    assert_eq!(response.status(), 200);
    let json = body_json(response).await;
    json["commandId"].as_str().unwrap().to_string()
}

/// Read the whole SSE stream of a command (it closes after `done`).
pub async fn stream_to_end(app: &TestApp, id: &str) -> Vec<(String, serde_json::Value)> {
    let response = app
        .send(authed_get(&format!("/api/commands/{id}/stream")))
        .await;
    assert_eq!(response.status(), 200);
    sse_events(&body_text(response).await)
}
