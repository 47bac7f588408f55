//! Domain building blocks for the stegstream worker.
//!
//! Everything in this crate is free of shared state: command and log types,
//! the error taxonomy, the stdout frame filter, the decoded-text plausibility
//! heuristic, wordlist parsing, toolkit argument construction, and the
//! subprocess runner behind the [`scripting::executor::ToolRunner`] trait.

pub mod command;
pub mod error;
pub mod log_filter;
pub mod plausibility;
pub mod scripting;
pub mod toolkit;
pub mod types;
pub mod wordlist;
