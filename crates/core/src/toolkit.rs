//! Argument construction for the external steganography tools.
//!
//! Two tool families are supported:
//!
//! - **MP3Stego** (default): separate `encode` / `decode` executables that
//!   need a `tables/` lookup directory in their working directory.
//! - **steghide**: a single executable with `embed` / `extract` subcommands.
//!
//! All paths handed to the tools are relative to the job's working
//! directory; MP3Stego mis-parses long absolute paths.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::CoreError;

/// Name of the lookup-table directory MP3Stego expects next to its input.
pub const TABLES_DIR_NAME: &str = "tables";

/// Suffix the decoders append to the cover file name for extracted text.
pub const EXTRACTED_SUFFIX: &str = ".txt";

/// Which tool family is wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolkitKind {
    Mp3Stego,
    Steghide,
}

impl FromStr for ToolkitKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp3stego" => Ok(Self::Mp3Stego),
            "steghide" => Ok(Self::Steghide),
            other => Err(CoreError::Validation(format!("Unknown toolkit: '{other}'"))),
        }
    }
}

impl fmt::Display for ToolkitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mp3Stego => f.write_str("mp3stego"),
            Self::Steghide => f.write_str("steghide"),
        }
    }
}

/// Resolved executables plus the per-family argument conventions.
#[derive(Debug, Clone)]
pub struct Toolkit {
    kind: ToolkitKind,
    encoder: PathBuf,
    decoder: PathBuf,
    tables_dir: Option<PathBuf>,
}

impl Toolkit {
    /// MP3Stego with binaries resolved against `bin_dir`.
    ///
    /// Relative executable names are joined onto `bin_dir`; absolute ones
    /// are kept. The lookup tables are expected at `bin_dir/tables`.
    pub fn mp3stego(bin_dir: &Path, encoder: &str, decoder: &str) -> Self {
        Self {
            kind: ToolkitKind::Mp3Stego,
            encoder: resolve_against(bin_dir, encoder),
            decoder: resolve_against(bin_dir, decoder),
            tables_dir: Some(bin_dir.join(TABLES_DIR_NAME)),
        }
    }

    /// steghide, either a bare name looked up on `PATH` or a full path.
    pub fn steghide(binary: impl Into<PathBuf>) -> Self {
        let binary = binary.into();
        Self {
            kind: ToolkitKind::Steghide,
            encoder: binary.clone(),
            decoder: binary,
            tables_dir: None,
        }
    }

    pub fn kind(&self) -> ToolkitKind {
        self.kind
    }

    pub fn encoder(&self) -> &Path {
        &self.encoder
    }

    pub fn decoder(&self) -> &Path {
        &self.decoder
    }

    /// Source directory of the lookup tables, if the family needs them.
    pub fn tables_dir(&self) -> Option<&Path> {
        self.tables_dir.as_deref()
    }

    /// Label embedded in `brute_success` log lines.
    pub fn label(&self) -> &'static str {
        match self.kind {
            ToolkitKind::Mp3Stego => "MP3Stego Found",
            ToolkitKind::Steghide => "Steghide Found",
        }
    }

    /// Arguments that hide `message` inside `cover`, writing `output`.
    pub fn encode_args(
        &self,
        message: &str,
        cover: &str,
        output: &str,
        secret: Option<&str>,
    ) -> Vec<String> {
        match self.kind {
            ToolkitKind::Mp3Stego => {
                let mut args = vec!["-E".to_string(), message.to_string()];
                if let Some(secret) = secret {
                    args.push("-P".to_string());
                    args.push(secret.to_string());
                }
                args.push(cover.to_string());
                args.push(output.to_string());
                args
            }
            ToolkitKind::Steghide => vec![
                "embed".to_string(),
                "-ef".to_string(),
                message.to_string(),
                "-cf".to_string(),
                cover.to_string(),
                "-sf".to_string(),
                output.to_string(),
                "-f".to_string(),
                "-p".to_string(),
                secret.unwrap_or_default().to_string(),
            ],
        }
    }

    /// Arguments that extract hidden text from `cover` into
    /// [`extracted_text_name`]`(cover)`.
    pub fn decode_args(&self, cover: &str, secret: Option<&str>) -> Vec<String> {
        match self.kind {
            ToolkitKind::Mp3Stego => {
                let mut args = vec!["-X".to_string()];
                if let Some(secret) = secret {
                    args.push("-P".to_string());
                    args.push(secret.to_string());
                }
                args.push(cover.to_string());
                args
            }
            ToolkitKind::Steghide => vec![
                "extract".to_string(),
                "-sf".to_string(),
                cover.to_string(),
                "-xf".to_string(),
                extracted_text_name(cover),
                "-f".to_string(),
                "-p".to_string(),
                secret.unwrap_or_default().to_string(),
            ],
        }
    }

    /// Human-readable message for a missing executable.
    pub fn missing_tool_message(&self, binary: &Path) -> String {
        let name = binary
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| binary.display().to_string());
        match self.kind {
            ToolkitKind::Mp3Stego => format!(
                "Executable not found: {}. Place {name} and the '{TABLES_DIR_NAME}' folder \
                 in the worker's binary directory (STEG_BIN_DIR) or set ENCODE_EXE / DECODE_EXE.",
                binary.display()
            ),
            ToolkitKind::Steghide => format!(
                "Executable not found: {}. Install steghide or point STEGHIDE_BIN at it.",
                binary.display()
            ),
        }
    }
}

/// File name the decoders write extracted text to.
pub fn extracted_text_name(cover: &str) -> String {
    format!("{cover}{EXTRACTED_SUFFIX}")
}

/// Whether `path` names a location on disk rather than a bare program name
/// left for `PATH` lookup.
pub fn is_explicit_path(path: &Path) -> bool {
    path.is_absolute() || path.components().count() > 1
}

fn resolve_against(base: &Path, name: &str) -> PathBuf {
    let candidate = Path::new(name);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base.join(candidate)
    }
}
