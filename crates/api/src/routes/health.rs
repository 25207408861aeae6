use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Jobs currently held by the job store.
    pub jobs: usize,
    /// Jobs with a live poll loop.
    pub polling: usize,
}

/// GET /health -- liveness plus job counts.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let jobs = state.orchestrator.store().len().await;
    let polling = state.orchestrator.scheduler().active_count().await;

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        jobs,
        polling,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
