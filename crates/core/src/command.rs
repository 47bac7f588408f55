//! Command lifecycle types shared by the store, the pipeline, and the API.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Job kind
// ---------------------------------------------------------------------------

/// The three job types a worker accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Encode,
    Decode,
    Bruteforce,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Encode => "encode",
            Self::Decode => "decode",
            Self::Bruteforce => "bruteforce",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "encode" => Ok(Self::Encode),
            "decode" => Ok(Self::Decode),
            "bruteforce" => Ok(Self::Bruteforce),
            other => Err(CoreError::Validation(format!(
                "Invalid command type: '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Command status. Transitions only move forward:
/// `pending -> running -> completed | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl CommandStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

// ---------------------------------------------------------------------------
// Log entries
// ---------------------------------------------------------------------------

/// Classification of a log line, serialized under the `type` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Info,
    Error,
    Success,
    BruteSuccess,
    BruteFail,
}

/// One immutable line of a command's log.
///
/// `at` is for display only; ordering is defined by append order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub at: Timestamp,
}

impl LogEntry {
    pub fn new(msg: impl Into<String>, kind: LogKind) -> Self {
        Self {
            msg: msg.into(),
            kind,
            at: chrono::Utc::now(),
        }
    }

    pub fn info(msg: impl Into<String>) -> Self {
        Self::new(msg, LogKind::Info)
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self::new(msg, LogKind::Error)
    }
}

// ---------------------------------------------------------------------------
// Job parameters
// ---------------------------------------------------------------------------

/// Default brute-force concurrency when `chunk_size` is absent.
pub const DEFAULT_CHUNK_SIZE: usize = 10;

/// Lower bound for brute-force concurrency.
pub const MIN_CHUNK_SIZE: usize = 1;

/// Upper bound for brute-force concurrency.
pub const MAX_CHUNK_SIZE: usize = 50;

/// The JSON parameter bag submitted alongside a job.
///
/// Unknown keys are ignored. `chunk_size` is accepted as any JSON number
/// because browser clients routinely send `10.0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobParams {
    /// Passphrase for encode/decode. Empty is treated as absent.
    pub secret: Option<String>,
    /// Message to hide (encode only).
    pub text: Option<String>,
    /// Requested brute-force concurrency.
    pub chunk_size: Option<f64>,
    /// Apply the plausibility filter to brute-force candidates.
    pub check_gibberish: bool,
}

impl JobParams {
    /// Parse the raw `params` form field. A blank field yields defaults.
    pub fn from_json(raw: &str) -> Result<Self, CoreError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw)
            .map_err(|e| CoreError::Validation(format!("Invalid params JSON: {e}")))
    }

    /// The passphrase, if one was provided and is non-empty.
    pub fn secret(&self) -> Option<&str> {
        self.secret.as_deref().filter(|s| !s.is_empty())
    }

    /// Effective brute-force concurrency.
    pub fn chunk_size(&self) -> usize {
        clamp_chunk_size(self.chunk_size)
    }
}

/// Clamp a requested concurrency into `[MIN_CHUNK_SIZE, MAX_CHUNK_SIZE]`.
///
/// Missing or non-finite values fall back to [`DEFAULT_CHUNK_SIZE`].
/// Fractional values are truncated.
pub fn clamp_chunk_size(requested: Option<f64>) -> usize {
    match requested {
        Some(n) if n.is_finite() => {
            let n = n.trunc();
            if n < MIN_CHUNK_SIZE as f64 {
                MIN_CHUNK_SIZE
            } else if n > MAX_CHUNK_SIZE as f64 {
                MAX_CHUNK_SIZE
            } else {
                n as usize
            }
        }
        _ => DEFAULT_CHUNK_SIZE,
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// The payload a successful command produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobResult {
    /// Brute force: the winning passphrase and the text it revealed.
    Cracked { password: String, text: String },
    /// Decode: the extracted hidden text.
    Decoded { text: String },
    /// Encode: a human-readable confirmation.
    Message(String),
}

/// Terminal result of a command, set exactly once.
///
/// Serializes as `{"success": bool, "result": ..., "error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub success: bool,
    pub result: Option<JobResult>,
    pub error: String,
}

impl CommandOutcome {
    pub fn succeeded(result: JobResult) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: String::new(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: error.into(),
        }
    }

    /// Status this outcome moves a command into.
    pub fn status(&self) -> CommandStatus {
        if self.success {
            CommandStatus::Completed
        } else {
            CommandStatus::Failed
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn job_kind_parses_known_types() {
        assert_eq!("encode".parse::<JobKind>().unwrap(), JobKind::Encode);
        assert_eq!("decode".parse::<JobKind>().unwrap(), JobKind::Decode);
        assert_eq!(
            "bruteforce".parse::<JobKind>().unwrap(),
            JobKind::Bruteforce
        );
    }

    #[test]
    fn job_kind_rejects_unknown_type() {
        assert_matches!("crack".parse::<JobKind>(), Err(CoreError::Validation(_)));
        assert_matches!("Encode".parse::<JobKind>(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn terminal_statuses() {
        assert!(!CommandStatus::Pending.is_terminal());
        assert!(!CommandStatus::Running.is_terminal());
        assert!(CommandStatus::Completed.is_terminal());
        assert!(CommandStatus::Failed.is_terminal());
    }

    #[test]
    fn log_entry_serializes_with_type_key() {
        let entry = LogEntry::new("abc", LogKind::BruteFail);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["msg"], "abc");
        assert_eq!(json["type"], "brute_fail");
        assert!(json["at"].is_string());
    }

    #[test]
    fn chunk_size_defaults_and_clamps() {
        assert_eq!(clamp_chunk_size(None), DEFAULT_CHUNK_SIZE);
        assert_eq!(clamp_chunk_size(Some(0.0)), 1);
        assert_eq!(clamp_chunk_size(Some(-4.0)), 1);
        assert_eq!(clamp_chunk_size(Some(3.0)), 3);
        assert_eq!(clamp_chunk_size(Some(7.9)), 7);
        assert_eq!(clamp_chunk_size(Some(500.0)), 50);
        assert_eq!(clamp_chunk_size(Some(f64::NAN)), DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn params_parse_recognized_keys() {
        let params = JobParams::from_json(
            r#"{"secret":"pw","text":"hi","chunk_size":4,"check_gibberish":true,"extra":1}"#,
        )
        .unwrap();
        assert_eq!(params.secret(), Some("pw"));
        assert_eq!(params.text.as_deref(), Some("hi"));
        assert_eq!(params.chunk_size(), 4);
        assert!(params.check_gibberish);
    }

    #[test]
    fn params_blank_or_empty_secret() {
        let params = JobParams::from_json("").unwrap();
        assert_eq!(params, JobParams::default());

        let params = JobParams::from_json(r#"{"secret":""}"#).unwrap();
        assert_eq!(params.secret(), None);
    }

    #[test]
    fn params_reject_malformed_json() {
        assert_matches!(JobParams::from_json("{not json"), Err(CoreError::Validation(_)));
    }

    #[test]
    fn outcome_serializes_like_the_wire_format() {
        let ok = CommandOutcome::succeeded(JobResult::Cracked {
            password: "secret123".into(),
            text: "hello".into(),
        });
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["result"]["password"], "secret123");
        assert_eq!(json["result"]["text"], "hello");
        assert_eq!(json["error"], "");

        let msg = CommandOutcome::succeeded(JobResult::Message("Encoding successful".into()));
        assert_eq!(
            serde_json::to_value(&msg).unwrap()["result"],
            "Encoding successful"
        );

        let failed = CommandOutcome::failed("boom");
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["success"], false);
        assert!(json["result"].is_null());
        assert_eq!(json["error"], "boom");
        assert_eq!(failed.status(), CommandStatus::Failed);
    }
}
