//! Request handlers for the command resource.
//!
//! Every handler requires the worker token via [`WorkerAuth`](crate::middleware::auth::WorkerAuth)
//! and maps failures through [`AppError`](crate::error::AppError).

pub mod commands;
pub mod stream;
