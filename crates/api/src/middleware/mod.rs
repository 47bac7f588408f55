//! Request extractors that guard handlers.
//!
//! - [`auth::WorkerAuth`] -- Requires the shared worker token.

pub mod auth;
