//! In-memory command registry with ordered, replayable live logs.
//!
//! [`store::CommandStore`] owns every command's state machine and fans log
//! entries out to subscribers. [`writer::CommandWriter`] is the handle an
//! execution path uses to write into one command.

pub mod store;
pub mod writer;

pub use store::{Artifact, CommandSnapshot, CommandStore, StoreError, StreamEvent, Subscription};
pub use writer::CommandWriter;
