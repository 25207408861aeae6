use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use lipsync_pipeline::CostRequest;

use crate::error::AppResult;
use crate::handlers::key_or_header;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/costs/estimate
///
/// Local sources are uploaded first, exactly as on submit. Responds with the
/// list of estimates returned by the service.
pub async fn estimate_cost(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut input): Json<CostRequest>,
) -> AppResult<impl IntoResponse> {
    input.api_key = key_or_header(input.api_key, &headers);
    let estimate = state.orchestrator.estimate_cost(input).await?;
    Ok(Json(DataResponse { data: estimate }))
}
