//! The three execution paths.
//!
//! Each path owns its command for the duration of the job: it logs through
//! the [`CommandWriter`] and always completes the command exactly once.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use stegstream_core::command::{CommandOutcome, JobKind, JobParams, JobResult};
use stegstream_core::scripting::executor::{ToolError, ToolInvocation, ToolOutput, ToolRunner};
use stegstream_core::toolkit::{extracted_text_name, Toolkit};
use stegstream_core::wordlist;
use stegstream_events::{Artifact, CommandWriter};

use crate::bruteforce::{BruteForceScheduler, SearchOutcome, SearchSettings};
use crate::fsutil;
use crate::sandbox::SandboxAssets;

/// Message file the encoder reads, relative to the working area.
pub const MESSAGE_FILE: &str = "message.txt";

/// Where an uploaded wordlist is stored, relative to the working area.
pub const WORDLIST_FILE: &str = "wordlist.txt";

const HIDDEN_MESSAGE_HEADER: &str = "--- HIDDEN MESSAGE ---";
const HIDDEN_MESSAGE_FOOTER: &str = "----------------------";

/// Everything an execution path needs.
pub struct JobContext {
    pub writer: CommandWriter,
    pub runner: Arc<dyn ToolRunner>,
    pub toolkit: Toolkit,
    /// The command's working area, `work_root/steg_<id>`.
    pub work_dir: PathBuf,
    /// Cover file name inside `work_dir`.
    pub cover_name: String,
    /// Uploaded wordlist inside `work_dir`, if any.
    pub wordlist: Option<PathBuf>,
    pub params: JobParams,
    pub attempt_timeout: Duration,
}

/// Run the path for `kind` to completion.
pub async fn execute(kind: JobKind, ctx: &JobContext) {
    ctx.writer.mark_running();
    match kind {
        JobKind::Encode => encode(ctx).await,
        JobKind::Decode => decode(ctx).await,
        JobKind::Bruteforce => bruteforce(ctx).await,
    }
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

async fn encode(ctx: &JobContext) {
    const SUCCESS: &str = "Encoding successful";

    let text = ctx.params.text.clone().unwrap_or_default();
    if let Err(e) = tokio::fs::write(ctx.work_dir.join(MESSAGE_FILE), text.as_bytes()).await {
        fail(ctx, format!("Encoding failed: could not write message file: {e}"));
        return;
    }

    let output_name = format!(
        "output_{}{}",
        ctx.writer.id(),
        fsutil::dotted_extension(&ctx.cover_name)
    );
    let args = ctx.toolkit.encode_args(
        MESSAGE_FILE,
        &ctx.cover_name,
        &output_name,
        ctx.params.secret(),
    );

    match run_tool(ctx, ctx.toolkit.encoder().to_path_buf(), args).await {
        Ok(output) if output.success => {
            ctx.writer.success(SUCCESS);
            let path = ctx.work_dir.join(&output_name);
            let artifact = match tokio::fs::try_exists(&path).await {
                Ok(true) => Some(Artifact {
                    file_name: output_name,
                    path,
                }),
                _ => {
                    tracing::warn!(
                        command_id = %ctx.writer.id().short(),
                        "Encoder succeeded but produced no output file"
                    );
                    None
                }
            };
            ctx.writer.finish(
                CommandOutcome::succeeded(JobResult::Message(SUCCESS.to_string())),
                artifact,
            );
        }
        Ok(output) => fail(ctx, format!("Encoding failed: {}", output.combined_output())),
        Err(ToolError::NotFound(_)) => tool_missing(ctx, ctx.toolkit.encoder().to_path_buf()),
        Err(e) => fail(ctx, format!("Encoding failed: {e}")),
    }
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

async fn decode(ctx: &JobContext) {
    let args = ctx.toolkit.decode_args(&ctx.cover_name, ctx.params.secret());

    match run_tool(ctx, ctx.toolkit.decoder().to_path_buf(), args).await {
        Ok(output) if output.success => {
            let extracted = ctx.work_dir.join(extracted_text_name(&ctx.cover_name));
            let text = match tokio::fs::read(&extracted).await {
                Ok(bytes) => String::from_utf8_lossy(&bytes).trim().to_string(),
                Err(e) => {
                    tracing::warn!(
                        command_id = %ctx.writer.id().short(),
                        error = %e,
                        "Decoder succeeded but extracted text is unreadable"
                    );
                    String::new()
                }
            };

            ctx.writer.success("Decode successful");
            if !text.is_empty() {
                ctx.writer.success(HIDDEN_MESSAGE_HEADER);
                ctx.writer.success(text.clone());
                ctx.writer.success(HIDDEN_MESSAGE_FOOTER);
            }
            ctx.writer.finish(
                CommandOutcome::succeeded(JobResult::Decoded { text }),
                None,
            );
        }
        Ok(output) => fail(ctx, format!("Decoding failed: {}", output.combined_output())),
        Err(ToolError::NotFound(_)) => tool_missing(ctx, ctx.toolkit.decoder().to_path_buf()),
        Err(e) => fail(ctx, format!("Decoding failed: {e}")),
    }
}

// ---------------------------------------------------------------------------
// Brute force
// ---------------------------------------------------------------------------

async fn bruteforce(ctx: &JobContext) {
    let candidates = match &ctx.wordlist {
        Some(path) => match tokio::fs::read(path).await {
            Ok(bytes) => wordlist::parse(&bytes),
            Err(e) => {
                fail(ctx, format!("Brute force failed: could not read wordlist: {e}"));
                return;
            }
        },
        None => wordlist::fallback(),
    };

    let assets = SandboxAssets::new(
        ctx.work_dir.join(&ctx.cover_name),
        ctx.toolkit.tables_dir().map(|p| p.to_path_buf()),
    );
    let settings = SearchSettings {
        workers: ctx.params.chunk_size(),
        check_gibberish: ctx.params.check_gibberish,
        attempt_timeout: ctx.attempt_timeout,
    };
    let scheduler = BruteForceScheduler::new(
        Arc::clone(&ctx.runner),
        ctx.toolkit.clone(),
        ctx.work_dir.clone(),
        assets,
        settings,
    );

    match scheduler.run(candidates, &ctx.writer).await {
        SearchOutcome::Found { password, text } => {
            ctx.writer.finish(
                CommandOutcome::succeeded(JobResult::Cracked { password, text }),
                None,
            );
        }
        SearchOutcome::Exhausted { tried } => {
            fail(ctx, format!("No password found ({tried} tried)"));
        }
        SearchOutcome::ToolMissing(path) => tool_missing(ctx, path),
        SearchOutcome::Aborted(reason) => fail(ctx, format!("Brute force failed: {reason}")),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Run one tool inside the working area, streaming its output to the
/// command log.
async fn run_tool(
    ctx: &JobContext,
    program: PathBuf,
    args: Vec<String>,
) -> Result<ToolOutput, ToolError> {
    if let Err(e) = fsutil::ensure_tables(&ctx.toolkit, &ctx.work_dir).await {
        tracing::warn!(command_id = %ctx.writer.id().short(), error = %e, "Failed to copy lookup tables");
    }

    let invocation = ToolInvocation::new(program, &ctx.work_dir).args(args);
    ctx.writer
        .info(format!("Running: {}", invocation.display_command()));
    ctx.runner.run(&invocation, &ctx.writer).await
}

fn fail(ctx: &JobContext, message: String) {
    ctx.writer.error(message.clone());
    ctx.writer.finish(CommandOutcome::failed(message), None);
}

fn tool_missing(ctx: &JobContext, binary: PathBuf) {
    fail(ctx, ctx.toolkit.missing_tool_message(&binary));
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
