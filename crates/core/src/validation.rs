//! Submit-request validation.
//!
//! Pure checks only; file existence and size are checked by the
//! orchestrator, which owns the async filesystem access.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::CoreError;
use crate::job::ApiKey;

/// Panel-facing request to start a lipsync generation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitRequest {
    pub video_path: Option<PathBuf>,
    pub audio_path: Option<PathBuf>,
    pub video_url: Option<String>,
    pub audio_url: Option<String>,
    #[serde(default)]
    pub is_temp_video: bool,
    #[serde(default)]
    pub is_temp_audio: bool,
    pub model: Option<String>,
    #[serde(default)]
    pub options: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub api_key: ApiKey,
    pub output_dir: Option<PathBuf>,
}

/// Where one side of the request comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceInput {
    Url(String),
    Local { path: PathBuf, is_temp: bool },
}

impl SourceInput {
    pub fn local_path(&self) -> Option<&PathBuf> {
        match self {
            Self::Local { path, .. } => Some(path),
            Self::Url(_) => None,
        }
    }
}

/// A request that passed [`validate_submit`].
#[derive(Debug, Clone)]
pub struct ValidatedSubmit {
    pub video: SourceInput,
    pub audio: SourceInput,
    pub model: String,
    pub options: serde_json::Map<String, serde_json::Value>,
    pub api_key: ApiKey,
    pub output_dir: Option<PathBuf>,
}

/// Whether `value` looks like an `http://` or `https://` URL.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Trim a URL field, treating empty strings as missing.
fn clean_url(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Treat an empty path the same as a missing one.
fn clean_path(value: Option<PathBuf>) -> Option<PathBuf> {
    value.filter(|p| !p.as_os_str().is_empty())
}

fn resolve_side(
    name: &str,
    url: Option<String>,
    path: Option<PathBuf>,
    is_temp: bool,
    errors: &mut Vec<String>,
) -> Option<SourceInput> {
    if let Some(url) = url {
        if !is_http_url(&url) {
            errors.push(format!("{name}_url must be a valid http(s) URL"));
            return None;
        }
        return Some(SourceInput::Url(url));
    }
    let path = path?;
    if !path.is_absolute() {
        errors.push(format!("{name}_path must be an absolute path"));
        return None;
    }
    Some(SourceInput::Local { path, is_temp })
}

/// Validate a submit request.
///
/// Accepts a complete URL pair, a complete local pair, or a mix where the
/// side lacking a URL has a local file. All problems are reported together.
pub fn validate_submit(
    request: SubmitRequest,
    default_model: &str,
) -> Result<ValidatedSubmit, CoreError> {
    let mut errors = Vec::new();

    if request.api_key.is_empty() {
        errors.push("api_key is required".to_string());
    }

    let video_url = clean_url(request.video_url);
    let audio_url = clean_url(request.audio_url);
    let video_path = clean_path(request.video_path);
    let audio_path = clean_path(request.audio_path);
    let has_video = video_url.is_some() || video_path.is_some();
    let has_audio = audio_url.is_some() || audio_path.is_some();

    let video = resolve_side("video", video_url, video_path, request.is_temp_video, &mut errors);
    let audio = resolve_side("audio", audio_url, audio_path, request.is_temp_audio, &mut errors);

    if !has_video || !has_audio {
        errors.push(
            "Either (video_url and audio_url) or (video_path and audio_path) are required"
                .to_string(),
        );
    }

    if let Some(dir) = &request.output_dir {
        if !dir.is_absolute() {
            errors.push("output_dir must be an absolute path".to_string());
        }
    }

    let model = request
        .model
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| default_model.to_string());

    match (video, audio) {
        (Some(video), Some(audio)) if errors.is_empty() => Ok(ValidatedSubmit {
            video,
            audio,
            model,
            options: request.options,
            api_key: request.api_key,
            output_dir: request.output_dir,
        }),
        _ => Err(CoreError::Validation(errors.join(", "))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
