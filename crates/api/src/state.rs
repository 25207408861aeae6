use std::sync::Arc;

use lipsync_pipeline::GenerationOrchestrator;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Owns the job lifecycle and the job store.
    pub orchestrator: Arc<GenerationOrchestrator>,
    pub config: Arc<ServerConfig>,
}
