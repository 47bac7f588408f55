//! Bounded-concurrency passphrase search.
//!
//! Candidates go into a shared work queue. A fixed number of executors, each
//! owning one [`Sandbox`], pull candidates one at a time and run the decoder
//! against their private copy of the cover. Results flow back over a channel
//! to a single aggregator, which declares the first success the winner and
//! cancels the remaining work.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use stegstream_core::command::LogKind;
use stegstream_core::plausibility::{self, Plausibility};
use stegstream_core::scripting::executor::{DiscardSink, ToolError, ToolInvocation, ToolRunner};
use stegstream_core::toolkit::{extracted_text_name, Toolkit};
use stegstream_events::CommandWriter;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::sandbox::{Sandbox, SandboxAssets};

/// Per-attempt wall-clock limit.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Separator used in `brute_success` log lines.
const FIELD_SEPARATOR: &str = "|||";

/// One unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BruteJob {
    pub password: String,
}

/// The verdict for one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BruteResult {
    pub password: String,
    pub success: bool,
    /// Extracted text; empty unless `success`.
    pub text: String,
}

/// How a search ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Found { password: String, text: String },
    /// Every candidate was tried without success.
    Exhausted { tried: usize },
    /// The decoder executable does not exist.
    ToolMissing(PathBuf),
    /// No executor could run, so candidates were left untried.
    Aborted(String),
}

#[derive(Debug, Clone, Copy)]
pub struct SearchSettings {
    /// Number of executors, already clamped by the caller.
    pub workers: usize,
    pub check_gibberish: bool,
    pub attempt_timeout: Duration,
}

/// Messages from executors to the aggregator.
enum Report {
    Attempt(BruteResult),
    ToolMissing(PathBuf),
    SandboxFailed { slot: usize, error: String },
}

/// Shared, read-only state of one search.
struct SearchContext {
    runner: Arc<dyn ToolRunner>,
    toolkit: Toolkit,
    root: PathBuf,
    assets: SandboxAssets,
    settings: SearchSettings,
}

pub struct BruteForceScheduler {
    ctx: Arc<SearchContext>,
}

impl BruteForceScheduler {
    /// `root` is the command's working area; sandboxes are created under it.
    pub fn new(
        runner: Arc<dyn ToolRunner>,
        toolkit: Toolkit,
        root: PathBuf,
        assets: SandboxAssets,
        settings: SearchSettings,
    ) -> Self {
        Self {
            ctx: Arc::new(SearchContext {
                runner,
                toolkit,
                root,
                assets,
                settings,
            }),
        }
    }

    /// Try `candidates` and report progress through `writer`.
    ///
    /// Logs the start banner, one `brute_fail` line per failed candidate
    /// before a winner, and the `brute_success` line for the winner. The
    /// caller completes the command from the returned outcome.
    pub async fn run(&self, candidates: Vec<String>, writer: &CommandWriter) -> SearchOutcome {
        let total = candidates.len();
        let workers = self.ctx.settings.workers.max(1);
        writer.info(format!(
            "Brute forcing {total} passwords (Workers: {workers})..."
        ));
        if total == 0 {
            return SearchOutcome::Exhausted { tried: 0 };
        }

        let queue: Arc<Mutex<VecDeque<BruteJob>>> = Arc::new(Mutex::new(
            candidates
                .into_iter()
                .map(|password| BruteJob { password })
                .collect(),
        ));
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel::<Report>(workers * 2);

        let mut executors = JoinSet::new();
        for slot in 0..workers.min(total) {
            executors.spawn(execute(
                slot,
                Arc::clone(&self.ctx),
                Arc::clone(&queue),
                cancel.clone(),
                tx.clone(),
            ));
        }
        drop(tx);

        let label = self.ctx.toolkit.label();
        let mut attempted = 0usize;
        let mut outcome: Option<SearchOutcome> = None;
        let mut sandbox_error: Option<String> = None;

        while let Some(report) = rx.recv().await {
            match report {
                Report::Attempt(result) => {
                    attempted += 1;
                    if outcome.is_some() {
                        tracing::debug!(
                            command_id = %writer.id().short(),
                            success = result.success,
                            "Attempt finished after a winner, ignored"
                        );
                        continue;
                    }
                    if result.success {
                        writer.push(
                            [result.password.as_str(), label, result.text.as_str()]
                                .join(FIELD_SEPARATOR),
                            LogKind::BruteSuccess,
                        );
                        outcome = Some(SearchOutcome::Found {
                            password: result.password,
                            text: result.text,
                        });
                        cancel.cancel();
                    } else {
                        writer.push(result.password, LogKind::BruteFail);
                    }
                }
                Report::ToolMissing(path) => {
                    if outcome.is_none() {
                        outcome = Some(SearchOutcome::ToolMissing(path));
                        cancel.cancel();
                    }
                }
                Report::SandboxFailed { slot, error } => {
                    tracing::error!(
                        command_id = %writer.id().short(),
                        worker = slot,
                        %error,
                        "Executor could not prepare its sandbox"
                    );
                    sandbox_error.get_or_insert(error);
                }
            }
        }

        while let Some(joined) = executors.join_next().await {
            if let Err(e) = joined {
                tracing::error!(command_id = %writer.id().short(), error = %e, "Executor task failed");
            }
        }

        match outcome {
            Some(outcome) => outcome,
            None if attempted < total => SearchOutcome::Aborted(sandbox_error.unwrap_or_else(|| {
                format!("Only {attempted} of {total} candidates could be tried")
            })),
            None => SearchOutcome::Exhausted { tried: total },
        }
    }
}

/// One executor: acquire a sandbox, then drain the queue until it is empty
/// or the search is cancelled.
async fn execute(
    slot: usize,
    ctx: Arc<SearchContext>,
    queue: Arc<Mutex<VecDeque<BruteJob>>>,
    cancel: CancellationToken,
    tx: mpsc::Sender<Report>,
) {
    let sandbox = match Sandbox::acquire(&ctx.root, slot, &ctx.assets).await {
        Ok(sandbox) => sandbox,
        Err(e) => {
            let _ = tx
                .send(Report::SandboxFailed {
                    slot,
                    error: e.to_string(),
                })
                .await;
            return;
        }
    };

    loop {
        if cancel.is_cancelled() {
            break;
        }
        let Some(job) = queue.lock().pop_front() else {
            break;
        };

        // Dropping an in-flight attempt kills its child process.
        let report = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            report = attempt(&ctx, &sandbox, job) => report,
        };
        // A success or a missing tool settles the search; stop pulling
        // candidates before the aggregator gets to it.
        let settled = matches!(
            report,
            Report::Attempt(BruteResult { success: true, .. }) | Report::ToolMissing(_)
        );
        if settled {
            cancel.cancel();
        }
        if tx.send(report).await.is_err() || settled {
            break;
        }
    }

    sandbox.release().await;
}

/// Run the decoder once with `job.password`.
async fn attempt(ctx: &SearchContext, sandbox: &Sandbox, job: BruteJob) -> Report {
    let toolkit = &ctx.toolkit;
    let cover = sandbox.cover_name();
    let extracted = sandbox.path().join(extracted_text_name(cover));

    let invocation = ToolInvocation::new(toolkit.decoder(), sandbox.path())
        .args(toolkit.decode_args(cover, Some(&job.password)))
        .with_timeout(ctx.settings.attempt_timeout);

    let mut result = BruteResult {
        password: job.password,
        success: false,
        text: String::new(),
    };

    match ctx.runner.run(&invocation, &DiscardSink).await {
        Ok(output) if output.success => {
            if let Ok(bytes) = tokio::fs::read(&extracted).await {
                let text = String::from_utf8_lossy(&bytes).trim().to_string();
                if !text.is_empty() {
                    let verdict = if ctx.settings.check_gibberish {
                        plausibility::assess(&text)
                    } else {
                        Plausibility::Plausible
                    };
                    if verdict.is_plausible() {
                        result.success = true;
                        result.text = text;
                    }
                }
            }
        }
        Ok(_) => {}
        Err(ToolError::NotFound(_)) => {
            return Report::ToolMissing(toolkit.decoder().to_path_buf());
        }
        Err(ToolError::Timeout { elapsed_ms }) => {
            tracing::debug!(elapsed_ms, sandbox = %sandbox.path().display(), "Attempt timed out");
        }
        Err(e) => {
            tracing::debug!(error = %e, sandbox = %sandbox.path().display(), "Attempt failed to run");
        }
    }

    let _ = tokio::fs::remove_file(&extracted).await;
    Report::Attempt(result)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
