use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trainhub_api::config::ServerConfig;
use trainhub_api::router::build_app_router;
use trainhub_api::state::AppState;
use trainhub_core::training_config::TrainingConfig;
use trainhub_events::ProgressBus;
use trainhub_training::{IngestListener, JobLauncher, ProgressTracker};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "trainhub_api=debug,trainhub_training=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let mut config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Progress record ---
    let bus = Arc::new(ProgressBus::default());
    let tracker = Arc::new(ProgressTracker::new(Arc::clone(&bus)));

    // --- Progress listener ---
    // Bound once for the whole process; every job's trainer connects to it.
    let listener = IngestListener::bind(&config.trainer.progress_endpoint, Arc::clone(&tracker))
        .await
        .expect("Failed to bind progress listener");
    config.trainer.progress_endpoint = listener.endpoint().to_string();

    let shutdown = CancellationToken::new();
    let listener_handle = tokio::spawn(listener.run(shutdown.child_token()));

    // --- Launcher ---
    let launcher = Arc::new(JobLauncher::new(Arc::clone(&tracker), config.trainer.clone()));
    tracing::info!(
        program = %config.trainer.program,
        progress_endpoint = %config.trainer.progress_endpoint,
        "Trainer launcher ready",
    );

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        tracker: Arc::clone(&tracker),
        launcher,
        training_config: Arc::new(RwLock::new(TrainingConfig::default())),
        shutdown: shutdown.clone(),
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let tcp = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    let signal_token = shutdown.clone();
    axum::serve(tcp, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Open status streams only end on their own when the job does.
            signal_token.cancel();
        })
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    shutdown.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), listener_handle).await;
    tracing::info!("Progress listener stopped");

    if tracker.is_job_active() {
        tracing::warn!("Exiting with a training job still running");
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
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
