use std::net::SocketAddr;
use std::sync::Arc;

use stegstream_api::config::{LogFormat, ServerConfig};
use stegstream_api::router::build_app_router;
use stegstream_api::state::AppState;
use stegstream_core::scripting::subprocess::SubprocessRunner;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    // Loaded first: LOG_FORMAT picks the tracing formatter.
    let config = ServerConfig::from_env();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "stegstream_api=debug,stegstream_pipeline=debug,tower_http=debug".into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");
    tracing::info!(
        toolkit = %config.toolkit.kind(),
        encoder = %config.toolkit.encoder().display(),
        decoder = %config.toolkit.decoder().display(),
        work_dir = %config.work_dir.display(),
        "Tool configuration"
    );
    if config.worker_token_generated {
        tracing::warn!(token = %config.worker_token, "WORKER_TOKEN not set, generated one for this run");
    }

    // --- Working area ---
    tokio::fs::create_dir_all(&config.work_dir)
        .await
        .expect("Failed to create WORK_DIR");

    // --- App state ---
    let runner = Arc::new(SubprocessRunner);
    let state = AppState::new(config.clone(), runner);

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
