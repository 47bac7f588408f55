//! Subprocess-backed [`ToolRunner`].
//!
//! Spawns the tool with piped stdout/stderr, forwards each line to the
//! [`LogSink`] as soon as it is read, and enforces the invocation timeout.
//! On timeout the child is killed and reaped before returning.

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use super::executor::{LogSink, ToolError, ToolInvocation, ToolOutput, ToolRunner};
use crate::command::LogKind;
use crate::log_filter;
use crate::toolkit::is_explicit_path;

/// Maximum stdout or stderr size captured per stream (10 MiB).
///
/// Lines past the limit are still forwarded to the sink, only the captured
/// copy is truncated.
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Production runner that spawns real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SubprocessRunner;

#[async_trait]
impl ToolRunner for SubprocessRunner {
    async fn run(
        &self,
        invocation: &ToolInvocation,
        sink: &dyn LogSink,
    ) -> Result<ToolOutput, ToolError> {
        let program = &invocation.program;

        // Bare names are left to PATH lookup; spawn reports them missing.
        if is_explicit_path(program) && tokio::fs::metadata(program).await.is_err() {
            return Err(ToolError::NotFound(program.display().to_string()));
        }

        let mut cmd = Command::new(program);
        cmd.args(&invocation.args)
            .current_dir(&invocation.working_directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            ErrorKind::NotFound => ToolError::NotFound(program.display().to_string()),
            _ => ToolError::Io(e),
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let collect = async {
            let (stdout, stderr) = tokio::join!(
                pump(stdout, sink, Stream::Stdout),
                pump(stderr, sink, Stream::Stderr)
            );
            let status = child.wait().await;
            (stdout, stderr, status)
        };

        let waited = match invocation.timeout {
            Some(limit) => tokio::time::timeout(limit, collect).await.ok(),
            None => Some(collect.await),
        };

        match waited {
            Some((stdout, stderr, status)) => {
                let status = status?;
                Ok(ToolOutput {
                    success: status.success(),
                    exit_code: status.code(),
                    stdout,
                    stderr,
                    duration_ms: start.elapsed().as_millis() as u64,
                })
            }
            None => {
                let elapsed_ms = start.elapsed().as_millis() as u64;
                if let Err(e) = child.kill().await {
                    tracing::warn!(
                        error = %e,
                        program = %program.display(),
                        "Failed to kill timed-out tool"
                    );
                }
                Err(ToolError::Timeout { elapsed_ms })
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

/// Read `handle` line by line until EOF, forwarding lines to `sink` and
/// returning the captured text.
///
/// Stdout lines are trimmed, blank ones skipped, and the rest pass through
/// the frame filter as `info`. Stderr lines are forwarded untrimmed as
/// `error` unless blank.
async fn pump<R: AsyncRead + Unpin>(
    handle: Option<R>,
    sink: &dyn LogSink,
    stream: Stream,
) -> String {
    let mut captured = String::new();
    let Some(handle) = handle else {
        return captured;
    };

    let mut reader = BufReader::new(handle);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(error = %e, ?stream, "Tool output stream closed with error");
                break;
            }
        }

        let raw = String::from_utf8_lossy(&buf);
        let line = raw.trim_end_matches(['\n', '\r']);

        if captured.len() + line.len() < MAX_OUTPUT_BYTES {
            captured.push_str(line);
            captured.push('\n');
        }

        match stream {
            Stream::Stdout => {
                let trimmed = line.trim();
                if !trimmed.is_empty() && log_filter::should_forward(trimmed) {
                    sink.emit(trimmed, LogKind::Info);
                }
            }
            Stream::Stderr => {
                if !line.trim().is_empty() {
                    sink.emit(line, LogKind::Error);
                }
            }
        }
    }
    captured
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
