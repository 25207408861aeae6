use axum::routing::post;
use axum::Router;

use crate::handlers::audio;
use crate::state::AppState;

/// Routes mounted at `/audio`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/convert", post(audio::convert_audio))
        .route("/extract", post(audio::extract_audio))
}
