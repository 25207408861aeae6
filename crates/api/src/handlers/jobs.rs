//! Handlers for the `/jobs` resource.
//!
//! Responses carry [`JobView`]s, never the stored credential.

use std::path::{Path as FsPath, PathBuf};

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use lipsync_core::error::CoreError;
use lipsync_core::job::{JobStatus, JobView};
use lipsync_core::paths::guess_mime;
use lipsync_core::validation::SubmitRequest;
use lipsync_pipeline::SaveTarget;
use serde::Serialize;
use tokio_util::io::ReaderStream;

use crate::error::{AppError, AppResult};
use crate::handlers::key_or_header;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub output_path: PathBuf,
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Uploads local sources, submits to the remote service and starts polling.
/// Returns 201 with the `processing` job.
pub async fn submit_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut input): Json<SubmitRequest>,
) -> AppResult<impl IntoResponse> {
    input.api_key = key_or_header(input.api_key, &headers);
    let job = state.orchestrator.submit(input).await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: JobView::from(&job),
        }),
    ))
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
pub async fn list_jobs(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let jobs: Vec<JobView> = state
        .orchestrator
        .list()
        .await
        .iter()
        .map(JobView::from)
        .collect();
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let job = state.orchestrator.get(&id).await?;
    Ok(Json(DataResponse {
        data: JobView::from(&job),
    }))
}

// ---------------------------------------------------------------------------
// Save / download
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/save
pub async fn save_job_output(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(mut target): Json<SaveTarget>,
) -> AppResult<impl IntoResponse> {
    let key = key_or_header(target.api_key.take().unwrap_or_default(), &headers);
    target.api_key = (!key.is_empty()).then_some(key);

    let output_path = state.orchestrator.save(&id, target).await?;
    Ok(Json(DataResponse {
        data: SaveResponse { output_path },
    }))
}

/// GET /api/v1/jobs/{id}/download
///
/// Streams the output of a completed job. Only files under the documents
/// directory, the uploads directory or the job's own output directory are
/// served.
pub async fn download_job_output(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let job = state.orchestrator.get(&id).await?;
    let path = job
        .output_location
        .clone()
        .filter(|_| job.status == JobStatus::Completed)
        .ok_or_else(|| CoreError::OutputNotReady(id.clone()))?;
    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Err(CoreError::OutputNotReady(id).into());
    }

    let config = state.orchestrator.config();
    let mut roots = vec![config.documents_dir.clone(), config.uploads_dir.clone()];
    roots.extend(job.output_dir.clone());
    if !is_under_any(&path, &roots).await {
        tracing::warn!(job_id = %id, path = %path.display(), "Refused download outside allowed roots");
        return Err(AppError::Forbidden(format!(
            "Output of job {id} is outside the served directories"
        )));
    }

    let file = tokio::fs::File::open(&path).await?;
    let len = file.metadata().await?.len();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{id}.mp4"));

    Response::builder()
        .header(CONTENT_TYPE, guess_mime(&path))
        .header(CONTENT_LENGTH, len)
        .header(CONTENT_DISPOSITION, format!("attachment; filename=\"{name}\""))
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| AppError::InternalError(e.to_string()))
}

/// Whether `path` resolves to somewhere inside one of `roots`.
async fn is_under_any(path: &FsPath, roots: &[PathBuf]) -> bool {
    let Ok(resolved) = tokio::fs::canonicalize(path).await else {
        return false;
    };
    for root in roots {
        if let Ok(root) = tokio::fs::canonicalize(root).await {
            if resolved.starts_with(&root) {
                return true;
            }
        }
    }
    false
}
