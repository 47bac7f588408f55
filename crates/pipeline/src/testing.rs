//! Fake tools for exercising the pipeline without the native binaries.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use stegstream_core::command::LogKind;
use stegstream_core::scripting::executor::{
    LogSink, ToolError, ToolInvocation, ToolOutput, ToolRunner,
};
use stegstream_core::toolkit::{extracted_text_name, Toolkit};
use stegstream_core::types::CommandId;
use stegstream_events::{CommandStore, CommandWriter};

/// Mimics MP3Stego: `-E` writes the output file, `-X` writes `<cover>.txt`
/// when the passphrase matches.
pub struct FakeTool {
    secret: Option<String>,
    hidden_text: String,
    /// Text "extracted" with a wrong passphrase. `None` makes wrong
    /// passphrases fail with a non-zero exit.
    wrong_text: Option<String>,
    delays: HashMap<String, Duration>,
    missing: bool,
    fail_encode: bool,
    tried: Mutex<Vec<String>>,
}

impl FakeTool {
    pub fn new(secret: Option<&str>, hidden_text: &str) -> Self {
        Self {
            secret: secret.map(str::to_string),
            hidden_text: hidden_text.to_string(),
            wrong_text: None,
            delays: HashMap::new(),
            missing: false,
            fail_encode: false,
            tried: Mutex::new(Vec::new()),
        }
    }

    /// Wrong passphrases "succeed" and produce `text`.
    pub fn with_wrong_text(mut self, text: &str) -> Self {
        self.wrong_text = Some(text.to_string());
        self
    }

    /// Attempts with `password` take `delay`.
    pub fn with_delay(mut self, password: &str, delay: Duration) -> Self {
        self.delays.insert(password.to_string(), delay);
        self
    }

    /// Every run reports the executable as missing.
    pub fn missing() -> Self {
        Self {
            missing: true,
            ..Self::new(None, "")
        }
    }

    pub fn failing_encode() -> Self {
        Self {
            fail_encode: true,
            ..Self::new(None, "")
        }
    }

    /// Passphrases tried by decode runs, in start order.
    pub fn tried(&self) -> Vec<String> {
        self.tried.lock().clone()
    }

    fn passphrase(args: &[String]) -> Option<String> {
        args.iter()
            .position(|a| a == "-P")
            .and_then(|i| args.get(i + 1))
            .cloned()
    }
}

fn output(success: bool, stdout: &str) -> ToolOutput {
    ToolOutput {
        success,
        exit_code: Some(if success { 0 } else { 1 }),
        stdout: stdout.to_string(),
        stderr: if success { String::new() } else { "fake tool failed".to_string() },
        duration_ms: 1,
    }
}

#[async_trait]
impl ToolRunner for FakeTool {
    async fn run(
        &self,
        invocation: &ToolInvocation,
        sink: &dyn LogSink,
    ) -> Result<ToolOutput, ToolError> {
        if self.missing {
            return Err(ToolError::NotFound(invocation.program.display().to_string()));
        }
        let dir = &invocation.working_directory;
        let args = &invocation.args;
        let last = args.last().cloned().unwrap_or_default();

        match args.first().map(String::as_str) {
            Some("-E") => {
                if self.fail_encode {
                    sink.emit("cannot open cover", LogKind::Error);
                    return Ok(output(false, "bad cover"));
                }
                sink.emit("[Frame 20]", LogKind::Info);
                tokio::fs::write(dir.join(&last), b"stego audio").await?;
                Ok(output(true, "[Frame 20]\n"))
            }
            Some("-X") => {
                let password = Self::passphrase(args);
                if let Some(password) = &password {
                    self.tried.lock().push(password.clone());
                    if let Some(delay) = self.delays.get(password) {
                        match invocation.timeout {
                            Some(limit) if limit < *delay => {
                                tokio::time::sleep(limit).await;
                                return Err(ToolError::Timeout {
                                    elapsed_ms: limit.as_millis() as u64,
                                });
                            }
                            _ => tokio::time::sleep(*delay).await,
                        }
                    }
                }

                let target = dir.join(extracted_text_name(&last));
                if password == self.secret {
                    tokio::fs::write(&target, &self.hidden_text).await?;
                    Ok(output(true, ""))
                } else if let Some(wrong) = &self.wrong_text {
                    tokio::fs::write(&target, wrong).await?;
                    Ok(output(true, ""))
                } else {
                    Ok(output(false, "wrong passphrase"))
                }
            }
            _ => Ok(output(false, "unsupported arguments")),
        }
    }
}

/// A fresh store with one command and its writer.
pub fn command() -> (Arc<CommandStore>, CommandWriter) {
    let store = Arc::new(CommandStore::default());
    let id = CommandId::generate();
    store.create(id.clone()).expect("fresh id");
    let writer = CommandWriter::new(Arc::clone(&store), id);
    (store, writer)
}

/// MP3Stego toolkit rooted at `bin`, with a populated `tables/` dir.
pub fn toolkit_with_tables(bin: &Path) -> Toolkit {
    std::fs::create_dir_all(bin.join("tables")).expect("tables dir");
    std::fs::write(bin.join("tables/huffdec"), "huff").expect("tables file");
    Toolkit::mp3stego(bin, "encode.exe", "decode.exe")
}

/// Write a fake cover upload into `dir`.
pub fn cover(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"ID3 fake cover").expect("write cover");
    path
}

/// Directory entries of `dir` whose names start with `w_`.
pub fn sandboxes_in(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|name| name.starts_with("w_"))
                .collect()
        })
        .unwrap_or_default()
}
