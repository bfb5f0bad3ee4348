use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use certgen_api::background;
use certgen_api::config::ServerConfig;
use certgen_api::router::build_app_router;
use certgen_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "certgen_api=debug,certgen_jobs=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Storage directories ---
    std::fs::create_dir_all(&config.upload_dir).expect("Failed to create upload directory");
    std::fs::create_dir_all(&config.output_dir).expect("Failed to create output directory");
    tracing::info!(
        upload_dir = %config.upload_dir.display(),
        output_dir = %config.output_dir.display(),
        "Storage directories ready"
    );

    // --- App state ---
    let state = AppState::new(config.clone());
    tracing::info!(fonts = state.fonts.list_available().len(), "Font library ready");

    // --- Job janitor ---
    let janitor_cancel = CancellationToken::new();
    let janitor_handle = tokio::spawn(background::job_janitor::run(
        Arc::clone(&state.jobs),
        config.job_ttl(),
        config.janitor_interval(),
        janitor_cancel.clone(),
    ));

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

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    janitor_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), janitor_handle).await;
    tracing::info!("Job janitor stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
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
