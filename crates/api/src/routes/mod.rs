pub mod audio;
pub mod costs;
pub mod health;
pub mod jobs;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /jobs                    list, submit
/// /jobs/{id}               detail
/// /jobs/{id}/save          save output to project or documents (POST)
/// /jobs/{id}/download      stream the output file (GET)
///
/// /costs/estimate          remote cost estimate (POST)
///
/// /audio/convert           convert a local audio file (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/jobs", jobs::router())
        .nest("/costs", costs::router())
        .nest("/audio", audio::router())
}
