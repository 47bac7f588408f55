//! Tool execution interface and shared types.
//!
//! Defines [`ToolRunner`], the capability every execution path uses to run
//! an encoder or decoder, along with [`ToolInvocation`], [`ToolOutput`],
//! [`ToolError`], and the [`LogSink`] that receives streamed output lines.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::command::LogKind;

/// Receives output lines while a tool is still running.
pub trait LogSink: Send + Sync {
    fn emit(&self, text: &str, kind: LogKind);
}

/// A sink that drops everything. Used for brute-force attempts, whose
/// per-frame output is not interesting to observers.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl LogSink for DiscardSink {
    fn emit(&self, _text: &str, _kind: LogKind) {}
}

/// One external tool run.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// Executable path, or a bare name resolved through `PATH`.
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Child working directory. Argument paths are relative to it.
    pub working_directory: PathBuf,
    /// Kill the child after this long. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<PathBuf>, working_directory: impl AsRef<Path>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_directory: working_directory.as_ref().to_path_buf(),
            timeout: None,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// `program arg1 arg2 ...`, with the value following any `-P`/`-p` flag
    /// masked so passphrases never reach the log.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        let mut mask_next = false;
        for arg in &self.args {
            if mask_next {
                parts.push("****".to_string());
                mask_next = false;
            } else {
                mask_next = arg == "-P" || arg == "-p";
                parts.push(arg.clone());
            }
        }
        parts.join(" ")
    }
}

/// Captured result of a completed tool run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// True iff the process exited with status zero.
    pub success: bool,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl ToolOutput {
    /// Diagnostic text for the command log.
    ///
    /// Some tools report errors on stdout, so on failure both streams are
    /// joined.
    pub fn combined_output(&self) -> String {
        if self.success {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr).trim().to_string()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Executable not found: {0}")]
    NotFound(String),

    #[error("Tool timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Runs external tools. Implementations must stream output lines to `sink`
/// as they arrive rather than after exit.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(
        &self,
        invocation: &ToolInvocation,
        sink: &dyn LogSink,
    ) -> Result<ToolOutput, ToolError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn output(success: bool, stdout: &str, stderr: &str) -> ToolOutput {
        ToolOutput {
            success,
            exit_code: Some(if success { 0 } else { 1 }),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            duration_ms: 1,
        }
    }

    #[test]
    fn combined_output_on_success_is_stdout() {
        assert_eq!(output(true, "done", "warn").combined_output(), "done");
    }

    #[test]
    fn combined_output_on_failure_joins_streams() {
        assert_eq!(
            output(false, "bad header\n", "abort\n").combined_output(),
            "bad header\n\nabort"
        );
        assert_eq!(output(false, "", "only stderr").combined_output(), "only stderr");
    }

    #[test]
    fn display_command_masks_passphrases() {
        let inv = ToolInvocation::new("/opt/decode", "/tmp")
            .args(["-X", "-P", "hunter2", "file.mp3"]);
        assert_eq!(inv.display_command(), "/opt/decode -X -P **** file.mp3");

        let inv = ToolInvocation::new("steghide", "/tmp").args(["extract", "-p", "x"]);
        assert_eq!(inv.display_command(), "steghide extract -p ****");
    }

    #[test]
    fn display_timeout() {
        let err = ToolError::Timeout { elapsed_ms: 30000 };
        assert_eq!(err.to_string(), "Tool timed out after 30000ms");
    }

    #[test]
    fn io_error_has_source() {
        let err = ToolError::from(std::io::Error::other("boom"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
