//! Generation job record and its status machine.
//!
//! A [`GenerationJob`] is created in [`JobStatus::Processing`] once the remote
//! service has assigned an id, and moves exactly once to either
//! [`JobStatus::Completed`] or [`JobStatus::Failed`]. The transition methods
//! on the record are the only way to change `status`, `output_location` and
//! `error`, so the invariants hold wherever a record is mutated.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// Caller-supplied API key for the remote generation service.
///
/// `Debug` and `Display` print a masked form; the plaintext is only
/// reachable through [`ApiKey::expose`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into().trim().to_string())
    }

    /// The plaintext key, for outbound request headers and the snapshot file.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First four characters followed by `****`.
    pub fn masked(&self) -> String {
        if self.0.is_empty() {
            return "<empty>".to_string();
        }
        let prefix: String = self.0.chars().take(4).collect();
        format!("{prefix}****")
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey({})", self.masked())
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Only `processing -> completed` and `processing -> failed` exist.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Processing, Self::Completed) | (Self::Processing, Self::Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of the failure recorded on a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobErrorKind {
    /// The remote service reported a failure or returned a non-success response.
    Upstream,
    /// The poll attempt budget or the overall polling deadline ran out.
    Timeout,
    /// Local read/write failure (e.g. while downloading the output).
    Io,
    /// The job could not be resumed (e.g. no credential after a restart).
    Orphaned,
}

/// Attempted an illegal status transition.
#[derive(Debug, thiserror::Error)]
#[error("Illegal job transition {from} -> {to}")]
pub struct TransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// One source media item of a job, after it has been handed to the remote
/// service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSource {
    /// URL the remote service fetches the media from.
    pub url: String,
    /// Local file the URL was produced from, cleared once a temporary file
    /// has been deleted.
    pub local_path: Option<PathBuf>,
    /// Whether the caller marked the local file as temporary.
    #[serde(default)]
    pub is_temp: bool,
}

impl MediaSource {
    pub fn remote(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            local_path: None,
            is_temp: false,
        }
    }

    pub fn uploaded(url: impl Into<String>, local_path: PathBuf, is_temp: bool) -> Self {
        Self {
            url: url.into(),
            local_path: Some(local_path),
            is_temp,
        }
    }
}

// ---------------------------------------------------------------------------
// Job record
// ---------------------------------------------------------------------------

/// One lipsync generation tracked by the job store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationJob {
    /// Id assigned by the remote service.
    pub id: JobId,
    pub source_video: MediaSource,
    pub source_audio: MediaSource,
    pub model: String,
    /// Passed through verbatim to the remote service.
    #[serde(default)]
    pub options: serde_json::Map<String, serde_json::Value>,
    pub status: JobStatus,
    pub created_at: Timestamp,
    /// Preferred directory for the downloaded output.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Set only when completed and the file existed at assignment time.
    #[serde(default)]
    pub output_location: Option<PathBuf>,
    /// Set only when failed.
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_kind: Option<JobErrorKind>,
    #[serde(default)]
    pub credential: ApiKey,
}

impl GenerationJob {
    /// Create a freshly submitted job in `processing` state.
    pub fn new(
        id: impl Into<JobId>,
        source_video: MediaSource,
        source_audio: MediaSource,
        model: impl Into<String>,
        options: serde_json::Map<String, serde_json::Value>,
        credential: ApiKey,
    ) -> Self {
        Self {
            id: id.into(),
            source_video,
            source_audio,
            model: model.into(),
            options,
            status: JobStatus::Processing,
            created_at: chrono::Utc::now(),
            output_dir: None,
            output_location: None,
            error: None,
            error_kind: None,
            credential,
        }
    }

    pub fn with_output_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.output_dir = dir;
        self
    }

    /// `processing -> completed`, recording the downloaded output.
    ///
    /// The caller must have confirmed `output` exists on disk.
    pub fn complete(&mut self, output: PathBuf) -> Result<(), TransitionError> {
        self.transition(JobStatus::Completed)?;
        self.output_location = Some(output);
        Ok(())
    }

    /// `processing -> failed` with a short human-readable message.
    pub fn fail(
        &mut self,
        kind: JobErrorKind,
        message: impl Into<String>,
    ) -> Result<(), TransitionError> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(message.into());
        self.error_kind = Some(kind);
        Ok(())
    }

    /// Point a completed job at a copy of its output made by an explicit save.
    pub fn relocate_output(&mut self, output: PathBuf) -> Result<(), TransitionError> {
        if self.status != JobStatus::Completed {
            return Err(TransitionError {
                from: self.status,
                to: JobStatus::Completed,
            });
        }
        self.output_location = Some(output);
        Ok(())
    }

    /// Forget a deleted temporary source file.
    pub fn clear_local_source(&mut self, path: &Path) {
        for source in [&mut self.source_video, &mut self.source_audio] {
            if source.local_path.as_deref() == Some(path) {
                source.local_path = None;
            }
        }
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

/// Caller-facing projection of a job; never carries the credential.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub id: JobId,
    pub status: JobStatus,
    pub model: String,
    pub options: serde_json::Map<String, serde_json::Value>,
    pub video_url: String,
    pub audio_url: String,
    pub created_at: Timestamp,
    pub output_dir: Option<PathBuf>,
    pub output_location: Option<PathBuf>,
    pub error: Option<String>,
    pub error_kind: Option<JobErrorKind>,
}

impl From<&GenerationJob> for JobView {
    fn from(job: &GenerationJob) -> Self {
        Self {
            id: job.id.clone(),
            status: job.status,
            model: job.model.clone(),
            options: job.options.clone(),
            video_url: job.source_video.url.clone(),
            audio_url: job.source_audio.url.clone(),
            created_at: job.created_at,
            output_dir: job.output_dir.clone(),
            output_location: job.output_location.clone(),
            error: job.error.clone(),
            error_kind: job.error_kind,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
