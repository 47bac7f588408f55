use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use stegstream_core::toolkit::{Toolkit, ToolkitKind};
use stegstream_events::store::DEFAULT_SUBSCRIBER_CAPACITY;
use stegstream_pipeline::PipelineSettings;

/// How the binary formats its log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for running the worker next to its
/// binaries. Override via environment variables (or a `.env` file).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `5001`).
    pub port: u16,
    /// Allowed CORS origins. Empty allows any origin.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`). Does not bound SSE
    /// streams once their headers are sent.
    pub request_timeout_secs: u64,
    /// Maximum multipart request size in bytes (`MAX_UPLOAD_MB`, default `200`).
    pub max_upload_bytes: usize,
    /// Shared secret clients present as a Bearer token or `?token=`.
    pub worker_token: String,
    /// Whether `worker_token` was generated because `WORKER_TOKEN` was unset.
    pub worker_token_generated: bool,
    /// Parent of every per-command working area.
    pub work_dir: PathBuf,
    /// The external tools and where they live.
    pub toolkit: Toolkit,
    /// Per-attempt decode timeout during brute force.
    pub attempt_timeout_secs: u64,
    /// Bounded queue size per stream subscriber.
    pub subscriber_buffer: usize,
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                         |
    /// |------------------------------|---------------------------------|
    /// | `HOST`                       | `0.0.0.0`                       |
    /// | `PORT`                       | `5001`                          |
    /// | `CORS_ORIGINS`               | empty (any origin)              |
    /// | `REQUEST_TIMEOUT_SECS`       | `30`                            |
    /// | `MAX_UPLOAD_MB`              | `200`                           |
    /// | `WORKER_TOKEN`               | generated `steg-<uuid>`         |
    /// | `WORK_DIR`                   | `<tmp>/stegstream`              |
    /// | `STEG_TOOLKIT`               | `mp3stego`                      |
    /// | `STEG_BIN_DIR`               | directory of the executable     |
    /// | `ENCODE_EXE` / `DECODE_EXE`  | `encode.exe` / `decode.exe`     |
    /// | `STEGHIDE_BIN`               | `steghide`                      |
    /// | `BRUTE_ATTEMPT_TIMEOUT_SECS` | `30`                            |
    /// | `SUBSCRIBER_BUFFER`          | `100`                           |
    /// | `LOG_FORMAT`                 | `text`                          |
    ///
    /// Panics on malformed values so misconfiguration fails at startup.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse(&var, "PORT", 5001, "u16");

        let cors_origins: Vec<String> = var("CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = parse(&var, "REQUEST_TIMEOUT_SECS", 30, "u64");
        let max_upload_mb: usize = parse(&var, "MAX_UPLOAD_MB", 200, "usize");

        let (worker_token, worker_token_generated) = match var("WORKER_TOKEN") {
            Some(token) => (token.trim().to_string(), false),
            None => (format!("steg-{}", uuid::Uuid::new_v4()), true),
        };

        let work_dir = var("WORK_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("stegstream"));

        let kind: ToolkitKind = var("STEG_TOOLKIT")
            .unwrap_or_else(|| "mp3stego".into())
            .parse()
            .unwrap_or_else(|e| panic!("STEG_TOOLKIT is invalid: {e}"));

        let toolkit = match kind {
            ToolkitKind::Mp3Stego => {
                let bin_dir = var("STEG_BIN_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(executable_dir);
                Toolkit::mp3stego(
                    &absolutize(&bin_dir),
                    &var("ENCODE_EXE").unwrap_or_else(|| "encode.exe".into()),
                    &var("DECODE_EXE").unwrap_or_else(|| "decode.exe".into()),
                )
            }
            ToolkitKind::Steghide => {
                Toolkit::steghide(var("STEGHIDE_BIN").unwrap_or_else(|| "steghide".into()))
            }
        };

        let attempt_timeout_secs: u64 = parse(&var, "BRUTE_ATTEMPT_TIMEOUT_SECS", 30, "u64");
        let subscriber_buffer: usize =
            parse(&var, "SUBSCRIBER_BUFFER", DEFAULT_SUBSCRIBER_CAPACITY, "usize");

        let log_format = match var("LOG_FORMAT").as_deref().map(str::trim) {
            None => LogFormat::Text,
            Some(v) if v.eq_ignore_ascii_case("text") => LogFormat::Text,
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            Some(other) => panic!("LOG_FORMAT must be 'text' or 'json', got '{other}'"),
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
            worker_token,
            worker_token_generated,
            work_dir,
            toolkit,
            attempt_timeout_secs,
            subscriber_buffer,
            log_format,
        }
    }

    /// Settings handed to the command dispatcher.
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            work_root: self.work_dir.clone(),
            toolkit: self.toolkit.clone(),
            attempt_timeout: Duration::from_secs(self.attempt_timeout_secs),
        }
    }
}

fn parse<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
    type_name: &str,
) -> T {
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a valid {type_name}")),
        None => default,
    }
}

/// Directory holding the running executable, or the current directory.
fn executable_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Tools run with the job directory as cwd, so relative locations must be
/// resolved up front.
fn absolutize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
