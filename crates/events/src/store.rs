//! Per-command state machine and multi-subscriber log broadcast.
//!
//! Every command lives behind its own mutex. Appends, the terminal
//! transition, and subscriber registration all happen under that lock, which
//! gives each subscriber the log in append order with no gaps or duplicates
//! between the backlog it replays and the live events it receives.
//!
//! Delivery to subscribers is best-effort: queues are bounded and a full
//! queue drops the event instead of blocking the writer. After the terminal
//! event every queue is released, so a subscriber that lost the terminal
//! event to a full queue still sees end-of-stream and resolves the final
//! state from the store.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::Stream;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use stegstream_core::command::{CommandOutcome, CommandStatus, LogEntry};
use stegstream_core::types::{CommandId, Timestamp};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Default bounded queue size per subscriber.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 100;

pub type SubscriberId = u64;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Command already exists: {0}")]
    AlreadyExists(CommandId),

    #[error("Command not found: {0}")]
    NotFound(CommandId),
}

// ---------------------------------------------------------------------------
// Public views
// ---------------------------------------------------------------------------

/// A file produced by a command, downloadable by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub file_name: String,
    #[serde(skip)]
    pub path: PathBuf,
}

/// Read-only view of a command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandSnapshot {
    pub id: CommandId,
    pub status: CommandStatus,
    pub result: Option<CommandOutcome>,
    pub artifact: Option<Artifact>,
    pub done: bool,
    pub log_len: usize,
    pub created_at: Timestamp,
}

/// What a subscriber receives.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Log(LogEntry),
    /// Terminal event. Nothing follows it.
    Done(CommandSnapshot),
}

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

struct CommandEntry {
    id: CommandId,
    status: CommandStatus,
    log: Vec<LogEntry>,
    outcome: Option<CommandOutcome>,
    artifact: Option<Artifact>,
    created_at: Timestamp,
    subscribers: Vec<(SubscriberId, mpsc::Sender<StreamEvent>)>,
}

impl CommandEntry {
    fn new(id: CommandId) -> Self {
        Self {
            id,
            status: CommandStatus::Pending,
            log: Vec::new(),
            outcome: None,
            artifact: None,
            created_at: chrono::Utc::now(),
            subscribers: Vec::new(),
        }
    }

    fn snapshot(&self) -> CommandSnapshot {
        CommandSnapshot {
            id: self.id.clone(),
            status: self.status,
            result: self.outcome.clone(),
            artifact: self.artifact.clone(),
            done: self.status.is_terminal(),
            log_len: self.log.len(),
            created_at: self.created_at,
        }
    }

    /// Offer `event` to every subscriber without blocking. Closed queues are
    /// pruned; full queues lose the event.
    fn broadcast(&mut self, event: &StreamEvent) {
        let id = &self.id;
        self.subscribers
            .retain(|(subscriber, tx)| match tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    tracing::debug!(
                        command_id = %id.short(),
                        subscriber,
                        "Subscriber queue full, dropping event"
                    );
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            });
    }
}

type SharedEntry = Arc<Mutex<CommandEntry>>;

// ---------------------------------------------------------------------------
// CommandStore
// ---------------------------------------------------------------------------

/// Process-scoped registry of commands.
///
/// Shared as `Arc<CommandStore>`. Entries are never evicted.
pub struct CommandStore {
    commands: RwLock<HashMap<CommandId, SharedEntry>>,
    next_subscriber: AtomicU64,
    subscriber_capacity: usize,
}

impl CommandStore {
    /// Create a store whose subscriber queues hold `subscriber_capacity`
    /// events (at least one).
    pub fn new(subscriber_capacity: usize) -> Self {
        Self {
            commands: RwLock::new(HashMap::new()),
            next_subscriber: AtomicU64::new(1),
            subscriber_capacity: subscriber_capacity.max(1),
        }
    }

    fn entry(&self, id: &CommandId) -> Option<SharedEntry> {
        self.commands.read().get(id).cloned()
    }

    /// Register a new command in `pending`.
    pub fn create(&self, id: CommandId) -> Result<(), StoreError> {
        let mut commands = self.commands.write();
        if commands.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id));
        }
        let entry = Arc::new(Mutex::new(CommandEntry::new(id.clone())));
        commands.insert(id, entry);
        Ok(())
    }

    /// Move `pending -> running`. Any other state is left alone.
    pub fn mark_running(&self, id: &CommandId) {
        if let Some(entry) = self.entry(id) {
            let mut entry = entry.lock();
            if entry.status == CommandStatus::Pending {
                entry.status = CommandStatus::Running;
            }
        }
    }

    /// Append one log entry and broadcast it.
    ///
    /// Returns `false` when the command is unknown or already done; the log
    /// is sealed by the terminal event.
    pub fn append_log(&self, id: &CommandId, log: LogEntry) -> bool {
        let Some(entry) = self.entry(id) else {
            tracing::warn!(command_id = %id, "Log append for unknown command");
            return false;
        };
        let mut entry = entry.lock();
        if entry.status.is_terminal() {
            tracing::debug!(command_id = %id.short(), msg = %log.msg, "Log append after done discarded");
            return false;
        }
        entry.log.push(log.clone());
        entry.broadcast(&StreamEvent::Log(log));
        true
    }

    /// Set the terminal outcome. The first call wins and returns `true`;
    /// later calls change nothing and return `false`.
    ///
    /// Broadcasts [`StreamEvent::Done`] and then releases every subscriber
    /// queue.
    pub fn mark_done(
        &self,
        id: &CommandId,
        outcome: CommandOutcome,
        artifact: Option<Artifact>,
    ) -> bool {
        let Some(entry) = self.entry(id) else {
            tracing::warn!(command_id = %id, "Completion for unknown command");
            return false;
        };
        let mut entry = entry.lock();
        if entry.status.is_terminal() {
            return false;
        }
        entry.status = outcome.status();
        entry.outcome = Some(outcome);
        entry.artifact = artifact;

        let done = StreamEvent::Done(entry.snapshot());
        entry.broadcast(&done);
        entry.subscribers.clear();
        true
    }

    /// Attach an observer.
    ///
    /// The backlog is captured and the queue registered in one critical
    /// section. For a command that is already done no queue is registered;
    /// the subscription replays the backlog and then the terminal event.
    pub fn subscribe(&self, id: &CommandId) -> Result<Subscription, StoreError> {
        let shared = self
            .entry(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        let mut entry = shared.lock();
        let backlog: VecDeque<LogEntry> = entry.log.iter().cloned().collect();

        let (subscriber_id, rx) = if entry.status.is_terminal() {
            (None, None)
        } else {
            let subscriber_id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
            let (tx, rx) = mpsc::channel(self.subscriber_capacity);
            entry.subscribers.push((subscriber_id, tx));
            (Some(subscriber_id), Some(rx))
        };
        drop(entry);

        Ok(Subscription {
            entry: shared,
            subscriber_id,
            backlog,
            rx,
            finished: false,
        })
    }

    /// Detach a subscriber and close its queue. Returns whether it was
    /// registered.
    pub fn unsubscribe(&self, id: &CommandId, subscriber_id: SubscriberId) -> bool {
        match self.entry(id) {
            Some(entry) => remove_subscriber(&entry, subscriber_id),
            None => false,
        }
    }

    pub fn snapshot(&self, id: &CommandId) -> Option<CommandSnapshot> {
        self.entry(id).map(|entry| entry.lock().snapshot())
    }

    /// Copy of the full log.
    pub fn logs(&self, id: &CommandId) -> Option<Vec<LogEntry>> {
        self.entry(id).map(|entry| entry.lock().log.clone())
    }

    /// Number of live subscriber queues for a command.
    pub fn subscriber_count(&self, id: &CommandId) -> usize {
        self.entry(id)
            .map(|entry| entry.lock().subscribers.len())
            .unwrap_or(0)
    }

    pub fn contains(&self, id: &CommandId) -> bool {
        self.commands.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.commands.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CommandStore {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

fn remove_subscriber(entry: &SharedEntry, subscriber_id: SubscriberId) -> bool {
    let mut entry = entry.lock();
    let before = entry.subscribers.len();
    entry.subscribers.retain(|(id, _)| *id != subscriber_id);
    entry.subscribers.len() != before
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// One observer's view of a command: the backlog, then live events, then
/// exactly one terminal event.
///
/// Dropping the subscription unsubscribes it.
pub struct Subscription {
    entry: SharedEntry,
    subscriber_id: Option<SubscriberId>,
    backlog: VecDeque<LogEntry>,
    rx: Option<mpsc::Receiver<StreamEvent>>,
    finished: bool,
}

impl Subscription {
    /// `None` when the command finished before this subscriber attached.
    pub fn subscriber_id(&self) -> Option<SubscriberId> {
        self.subscriber_id
    }

    /// Number of backlog entries not yet yielded.
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Next event, or `None` once the terminal event has been yielded.
    ///
    /// Also returns `None` if the subscriber was removed with
    /// [`CommandStore::unsubscribe`] while the command is still running.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        if let Some(log) = self.backlog.pop_front() {
            return Some(StreamEvent::Log(log));
        }
        if self.finished {
            return None;
        }

        if let Some(rx) = self.rx.as_mut() {
            match rx.recv().await {
                Some(StreamEvent::Done(snapshot)) => {
                    self.finished = true;
                    return Some(StreamEvent::Done(snapshot));
                }
                Some(event) => return Some(event),
                None => {}
            }
        }

        // Queue released or never registered: the terminal state, if any,
        // is authoritative in the store.
        self.finished = true;
        let snapshot = self.entry.lock().snapshot();
        snapshot.done.then_some(StreamEvent::Done(snapshot))
    }

    /// Adapt into a [`Stream`] that ends after the terminal event.
    pub fn into_stream(self) -> impl Stream<Item = StreamEvent> + Send {
        futures::stream::unfold(self, |mut subscription| async move {
            subscription
                .next_event()
                .await
                .map(|event| (event, subscription))
        })
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("subscriber_id", &self.subscriber_id)
            .field("backlog_len", &self.backlog.len())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(subscriber_id) = self.subscriber_id {
            remove_subscriber(&self.entry, subscriber_id);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
