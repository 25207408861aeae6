use std::path::PathBuf;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use lipsync_core::ffmpeg::TargetFormat;
use lipsync_pipeline::ExtractSource;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ConvertAudioRequest {
    pub path: PathBuf,
    /// `wav` or `mp3`.
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_format() -> String {
    "wav".into()
}

#[derive(Debug, Serialize)]
pub struct ConvertAudioResponse {
    pub path: PathBuf,
    /// `false` when the source was already in the requested format.
    pub converted: bool,
}

#[derive(Debug, Deserialize)]
pub struct ExtractAudioRequest {
    pub video_path: Option<PathBuf>,
    pub video_url: Option<String>,
    /// `wav` or `mp3`.
    #[serde(default = "default_format")]
    pub format: String,
}

#[derive(Debug, Serialize)]
pub struct ExtractAudioResponse {
    pub audio_path: PathBuf,
}

fn parse_format(format: &str) -> Result<TargetFormat, AppError> {
    match format.trim().to_ascii_lowercase().as_str() {
        "wav" => Ok(TargetFormat::Wav),
        "mp3" => Ok(TargetFormat::Mp3),
        other => Err(AppError::BadRequest(format!(
            "Unsupported format '{other}', expected wav or mp3"
        ))),
    }
}

/// POST /api/v1/audio/convert
pub async fn convert_audio(
    State(state): State<AppState>,
    Json(input): Json<ConvertAudioRequest>,
) -> AppResult<impl IntoResponse> {
    let target = parse_format(&input.format)?;
    let result = state.orchestrator.convert_audio(&input.path, target).await?;
    Ok(Json(DataResponse {
        data: ConvertAudioResponse {
            path: result.path,
            converted: result.created,
        },
    }))
}

/// POST /api/v1/audio/extract
///
/// A local `video_path` wins over `video_url`.
pub async fn extract_audio(
    State(state): State<AppState>,
    Json(input): Json<ExtractAudioRequest>,
) -> AppResult<impl IntoResponse> {
    let target = parse_format(&input.format)?;
    let video_path = input.video_path.filter(|p| !p.as_os_str().is_empty());
    let video_url = input.video_url.filter(|u| !u.trim().is_empty());
    let source = match (video_path, video_url) {
        (Some(path), _) => ExtractSource::Path(path),
        (None, Some(url)) => ExtractSource::Url(url),
        (None, None) => {
            return Err(AppError::BadRequest(
                "video_path or video_url is required".into(),
            ))
        }
    };

    let audio_path = state.orchestrator.extract_audio(source, target).await?;
    Ok(Json(DataResponse {
        data: ExtractAudioResponse { audio_path },
    }))
}
