use axum::routing::post;
use axum::Router;

use crate::handlers::costs;
use crate::state::AppState;

/// Routes mounted at `/costs`.
pub fn router() -> Router<AppState> {
    Router::new().route("/estimate", post(costs::estimate_cost))
}
