use std::sync::Arc;

use stegstream_core::scripting::executor::ToolRunner;
use stegstream_events::CommandStore;
use stegstream_pipeline::Dispatcher;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything inside is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (worker token, limits).
    pub config: Arc<ServerConfig>,
    /// Process-wide command registry. Entries live for the process lifetime.
    pub store: Arc<CommandStore>,
    /// Accepts submissions and spawns their execution.
    pub dispatcher: Dispatcher,
}

impl AppState {
    /// Wire a fresh command store and dispatcher around `runner`.
    pub fn new(config: ServerConfig, runner: Arc<dyn ToolRunner>) -> Self {
        let store = Arc::new(CommandStore::new(config.subscriber_buffer));
        let dispatcher = Dispatcher::new(Arc::clone(&store), runner, config.pipeline_settings());
        Self {
            config: Arc::new(config),
            store,
            dispatcher,
        }
    }
}
