//! Job execution for the stegstream worker.
//!
//! [`dispatch::Dispatcher`] accepts submissions and spawns one task per
//! command. Encode and decode run a single tool invocation
//! ([`jobs`]); brute force fans candidates out over a bounded pool of
//! sandboxed executors ([`bruteforce`], [`sandbox`]).

pub mod bruteforce;
pub mod dispatch;
pub mod fsutil;
pub mod jobs;
pub mod sandbox;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatch::{DispatchError, Dispatcher, JobRequest, PipelineSettings, Upload};
