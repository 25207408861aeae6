use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use lipsync_cloud::{R2Config, R2Storage};
use lipsync_core::ffmpeg::FfmpegTranscoder;
use lipsync_core::normalize::SourceNormalizer;
use lipsync_core::paths::DataDirs;
use lipsync_events::{EventBus, EventLogger};
use lipsync_pipeline::{GenerationOrchestrator, PipelineConfig};
use lipsync_remote::SyncApiClient;
use lipsync_store::JobStore;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lipsync_api::background::storage_cleanup;
use lipsync_api::config::ServerConfig;
use lipsync_api::router::build_app_router;
use lipsync_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "lipsync_api=debug,lipsync_pipeline=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let dirs = DataDirs::under(&config.data_dir);
    dirs.ensure()
        .await
        .expect("Failed to create data directories");
    tracing::info!(data_dir = %dirs.base.display(), "Data directories ready");

    let pipeline_config = PipelineConfig::from_env(&dirs, config.documents_dir.clone());

    // --- Job store ---
    let store = Arc::new(JobStore::open(dirs.snapshot_file(), config.job_store_capacity).await);
    tracing::info!(jobs = store.len().await, "Job store loaded");

    // --- Remote services ---
    let storage = R2Storage::from_config(R2Config::from_env()).await;
    if !storage.is_configured() {
        tracing::warn!("R2 storage not configured, local sources cannot be uploaded");
    }
    let remote = SyncApiClient::new(config.sync_api_base.clone());
    let normalizer = SourceNormalizer::new(Arc::new(FfmpegTranscoder::new(
        config.ffmpeg_path.clone(),
    )));

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let events_cancel = CancellationToken::new();
    let logger_handle = tokio::spawn(EventLogger::run(
        event_bus.subscribe(),
        events_cancel.clone(),
    ));

    // --- Orchestrator ---
    let orchestrator = GenerationOrchestrator::new(
        pipeline_config,
        store,
        Arc::new(remote),
        Arc::new(storage),
        normalizer,
        Arc::clone(&event_bus),
    );
    orchestrator.resume_pending().await;

    // --- Storage cleanup ---
    let cleanup_cancel = CancellationToken::new();
    let cleanup_handle = tokio::spawn(storage_cleanup::run(
        dirs.clone(),
        config.cleanup.clone(),
        cleanup_cancel.clone(),
    ));

    // --- Router ---
    let state = AppState {
        orchestrator: Arc::clone(&orchestrator),
        config: Arc::new(config.clone()),
    };
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

    // In-flight jobs stay `processing` in the snapshot and resume next start.
    orchestrator.shutdown().await;
    tracing::info!("Poll loops stopped");

    cleanup_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), cleanup_handle).await;

    events_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), logger_handle).await;

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
        _ = ctrl_c => tracing::info!("Received SIGINT, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
