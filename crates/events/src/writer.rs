//! Write handle for a single command.

use std::sync::Arc;

use stegstream_core::command::{CommandOutcome, LogEntry, LogKind};
use stegstream_core::scripting::executor::LogSink;
use stegstream_core::types::CommandId;

use crate::store::{Artifact, CommandStore};

/// The owning execution path's handle onto its command.
///
/// Every line is appended to the store and mirrored to `tracing` at debug
/// level under the short command id.
#[derive(Clone)]
pub struct CommandWriter {
    store: Arc<CommandStore>,
    id: CommandId,
}

impl CommandWriter {
    pub fn new(store: Arc<CommandStore>, id: CommandId) -> Self {
        Self { store, id }
    }

    pub fn id(&self) -> &CommandId {
        &self.id
    }

    pub fn store(&self) -> &Arc<CommandStore> {
        &self.store
    }

    pub fn push(&self, msg: impl Into<String>, kind: LogKind) {
        let entry = LogEntry::new(msg, kind);
        tracing::debug!(command_id = %self.id.short(), kind = ?entry.kind, "{}", entry.msg);
        self.store.append_log(&self.id, entry);
    }

    pub fn info(&self, msg: impl Into<String>) {
        self.push(msg, LogKind::Info);
    }

    pub fn error(&self, msg: impl Into<String>) {
        self.push(msg, LogKind::Error);
    }

    pub fn success(&self, msg: impl Into<String>) {
        self.push(msg, LogKind::Success);
    }

    pub fn mark_running(&self) {
        self.store.mark_running(&self.id);
    }

    /// Complete the command. Returns `false` if it was already done.
    pub fn finish(&self, outcome: CommandOutcome, artifact: Option<Artifact>) -> bool {
        let success = outcome.success;
        let accepted = self.store.mark_done(&self.id, outcome, artifact);
        if accepted {
            tracing::info!(command_id = %self.id.short(), success, "Command finished");
        } else {
            tracing::warn!(command_id = %self.id.short(), "Command already finished, outcome ignored");
        }
        accepted
    }
}

impl LogSink for CommandWriter {
    fn emit(&self, text: &str, kind: LogKind) {
        self.push(text, kind);
    }
}

#[cfg(test)]
mod tests {
    use stegstream_core::command::{CommandStatus, JobResult};

    use super::*;

    #[test]
    fn writes_land_in_the_store_in_order() {
        let store = Arc::new(CommandStore::default());
        let id = CommandId::from("w1");
        store.create(id.clone()).unwrap();
        let writer = CommandWriter::new(Arc::clone(&store), id.clone());

        writer.mark_running();
        writer.info("Worker picked up command");
        writer.emit("[Frame 20]", LogKind::Info);
        writer.error("stderr noise");
        writer.success("Decode successful");

        let kinds: Vec<LogKind> = store.logs(&id).unwrap().iter().map(|l| l.kind).collect();
        assert_eq!(
            kinds,
            vec![LogKind::Info, LogKind::Info, LogKind::Error, LogKind::Success]
        );
        assert_eq!(store.snapshot(&id).unwrap().status, CommandStatus::Running);
    }

    #[test]
    fn finish_reports_whether_it_won() {
        let store = Arc::new(CommandStore::default());
        let id = CommandId::from("w2");
        store.create(id.clone()).unwrap();
        let writer = CommandWriter::new(Arc::clone(&store), id.clone());

        assert!(writer.finish(
            CommandOutcome::succeeded(JobResult::Decoded { text: "t".into() }),
            None
        ));
        assert!(!writer.finish(CommandOutcome::failed("late"), None));
        assert_eq!(store.snapshot(&id).unwrap().status, CommandStatus::Completed);
    }
}
