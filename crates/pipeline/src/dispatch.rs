//! Command submission.
//!
//! [`Dispatcher::submit`] validates a request, persists its uploads into a
//! fresh working area, registers the command, and spawns the execution path.
//! It returns the command id without waiting for the job.

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use stegstream_core::command::{CommandOutcome, JobKind, JobParams};
use stegstream_core::scripting::executor::ToolRunner;
use stegstream_core::toolkit::Toolkit;
use stegstream_core::types::CommandId;
use stegstream_events::{CommandStore, CommandWriter, StoreError};

use crate::fsutil;
use crate::jobs::{self, JobContext, WORDLIST_FILE};

/// Stem of the stored cover. The client's extension is kept so the tools
/// see the right format; the stem never collides with the other staged files.
const COVER_STEM: &str = "cover";

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Invalid command type: '{0}'")]
    InvalidJobType(String),

    #[error("Failed to prepare working area: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// An uploaded file.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Client-supplied name; reduced to its final component before use.
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// A job submission.
#[derive(Debug, Clone)]
pub struct JobRequest {
    /// `encode`, `decode` or `bruteforce`.
    pub kind: String,
    pub params: JobParams,
    pub cover: Upload,
    pub wordlist: Option<Upload>,
}

/// Fixed settings shared by every command.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Parent of every `steg_<id>` working area.
    pub work_root: PathBuf,
    pub toolkit: Toolkit,
    pub attempt_timeout: Duration,
}

#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<CommandStore>,
    runner: Arc<dyn ToolRunner>,
    settings: Arc<PipelineSettings>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<CommandStore>,
        runner: Arc<dyn ToolRunner>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            runner,
            settings: Arc::new(settings),
        }
    }

    pub fn store(&self) -> &Arc<CommandStore> {
        &self.store
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Working area of a command.
    pub fn work_dir(&self, id: &CommandId) -> PathBuf {
        self.settings.work_root.join(format!("steg_{id}"))
    }

    /// Accept a job and start it in the background.
    pub async fn submit(&self, request: JobRequest) -> Result<CommandId, DispatchError> {
        let kind: JobKind = request
            .kind
            .parse()
            .map_err(|_| DispatchError::InvalidJobType(request.kind.clone()))?;

        let id = CommandId::generate();
        let work_dir = self.work_dir(&id);
        tokio::fs::create_dir_all(&work_dir).await?;

        let (cover_name, wordlist) = match persist_uploads(&work_dir, &request).await {
            Ok(persisted) => persisted,
            Err(e) => {
                let _ = tokio::fs::remove_dir_all(&work_dir).await;
                return Err(e.into());
            }
        };

        self.store.create(id.clone())?;
        let writer = CommandWriter::new(Arc::clone(&self.store), id.clone());
        writer.info("Worker picked up command");

        let ctx = JobContext {
            writer,
            runner: Arc::clone(&self.runner),
            toolkit: self.settings.toolkit.clone(),
            work_dir,
            cover_name,
            wordlist,
            params: request.params,
            attempt_timeout: self.settings.attempt_timeout,
        };

        tracing::info!(command_id = %id, %kind, "Command dispatched");
        tokio::spawn(run_guarded(kind, ctx));
        Ok(id)
    }
}

/// Write the cover (as `cover<ext>`) and wordlist into `work_dir`, returning
/// the cover's file name and the wordlist path.
async fn persist_uploads(
    work_dir: &Path,
    request: &JobRequest,
) -> std::io::Result<(String, Option<PathBuf>)> {
    let client_name = fsutil::sanitize_file_name(&request.cover.file_name, COVER_STEM);
    let cover_name = format!("{COVER_STEM}{}", fsutil::dotted_extension(&client_name));
    tokio::fs::write(work_dir.join(&cover_name), &request.cover.bytes).await?;

    let wordlist = match &request.wordlist {
        Some(upload) => {
            let path = work_dir.join(WORDLIST_FILE);
            tokio::fs::write(&path, &upload.bytes).await?;
            Some(path)
        }
        None => None,
    };
    Ok((cover_name, wordlist))
}

/// Run a job, failing its command if the path panics or returns without
/// completing it.
async fn run_guarded(kind: JobKind, ctx: JobContext) {
    let writer = ctx.writer.clone();
    let result = AssertUnwindSafe(jobs::execute(kind, &ctx)).catch_unwind().await;

    if result.is_err() {
        tracing::error!(command_id = %writer.id(), %kind, "Job panicked");
        writer.error("Internal error: job aborted unexpectedly");
        writer.finish(
            CommandOutcome::failed("Internal error: job aborted unexpectedly"),
            None,
        );
        return;
    }

    let done = writer
        .store()
        .snapshot(writer.id())
        .map(|snapshot| snapshot.done)
        .unwrap_or(true);
    if !done {
        tracing::error!(command_id = %writer.id(), %kind, "Job ended without a result");
        writer.finish(CommandOutcome::failed("Job ended without a result"), None);
    }
}
