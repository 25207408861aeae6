//! The orchestrator handle shared with the HTTP layer.
//!
//! Submission, polling and saving live in their own modules as further
//! `impl GenerationOrchestrator` blocks.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lipsync_cloud::BlobStorage;
use lipsync_core::error::CoreError;
use lipsync_core::ffmpeg::TargetFormat;
use lipsync_core::job::{ApiKey, GenerationJob, JobErrorKind};
use lipsync_core::normalize::{Normalized, SourceNormalizer};
use lipsync_core::validation::{is_http_url, validate_submit, SubmitRequest};
use lipsync_events::bus::JOB_FAILED;
use lipsync_events::{EventBus, JobEvent};
use lipsync_remote::{CostEstimate, CreateGeneration, GenerationService};
use lipsync_store::JobStore;
use serde::Deserialize;

use crate::config::PipelineConfig;
use crate::scheduler::PollScheduler;

/// Request for `POST /costs/estimate`.
///
/// Sources follow the submit rules: URLs are used as given, local files are
/// normalized and uploaded first.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CostRequest {
    pub video_url: Option<String>,
    pub audio_url: Option<String>,
    pub video_path: Option<PathBuf>,
    pub audio_path: Option<PathBuf>,
    pub model: Option<String>,
    #[serde(default)]
    pub options: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub api_key: ApiKey,
}

/// Where the video for an audio extraction comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractSource {
    Path(PathBuf),
    Url(String),
}

/// Owns the job lifecycle: submit, poll, save.
///
/// Created once at startup via [`GenerationOrchestrator::new`]; the returned
/// `Arc` is cloned into request handlers.
pub struct GenerationOrchestrator {
    pub(crate) store: Arc<JobStore>,
    pub(crate) remote: Arc<dyn GenerationService>,
    pub(crate) storage: Arc<dyn BlobStorage>,
    pub(crate) normalizer: SourceNormalizer,
    pub(crate) events: Arc<EventBus>,
    pub(crate) scheduler: PollScheduler,
    pub(crate) config: PipelineConfig,
}

impl GenerationOrchestrator {
    pub fn new(
        config: PipelineConfig,
        store: Arc<JobStore>,
        remote: Arc<dyn GenerationService>,
        storage: Arc<dyn BlobStorage>,
        normalizer: SourceNormalizer,
        events: Arc<EventBus>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            remote,
            storage,
            normalizer,
            events,
            scheduler: PollScheduler::new(),
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    pub fn scheduler(&self) -> &PollScheduler {
        &self.scheduler
    }

    pub async fn get(&self, id: &str) -> Result<GenerationJob, CoreError> {
        self.store
            .get(id)
            .await
            .ok_or_else(|| CoreError::job_not_found(id))
    }

    /// All jobs in creation order.
    pub async fn list(&self) -> Vec<GenerationJob> {
        self.store.list().await
    }

    /// Restart poll loops for jobs left in `processing` by a previous run.
    ///
    /// Jobs without a stored credential cannot be polled and are failed.
    /// Returns the number of loops started.
    pub async fn resume_pending(self: &Arc<Self>) -> usize {
        let mut resumed = 0;
        for job in self.store.processing().await {
            if job.credential.is_empty() {
                self.record_failure(&job.id, JobErrorKind::Orphaned, "credential unavailable")
                    .await;
                continue;
            }
            self.schedule_poll(job.id.clone()).await;
            resumed += 1;
        }
        if resumed > 0 {
            tracing::info!(count = resumed, "Resumed polling for in-flight jobs");
        }
        resumed
    }

    /// Ask the remote service what a generation would cost.
    pub async fn estimate_cost(&self, request: CostRequest) -> Result<Vec<CostEstimate>, CoreError> {
        let submit = SubmitRequest {
            video_path: request.video_path,
            audio_path: request.audio_path,
            video_url: request.video_url,
            audio_url: request.audio_url,
            model: request.model,
            options: request.options,
            api_key: request.api_key,
            ..Default::default()
        };
        let mut validated = validate_submit(submit, &self.config.default_model)?;
        let (video, audio) = self.resolve_sources(&mut validated).await?;

        let mut options = validated.options;
        options
            .entry("sync_mode")
            .or_insert_with(|| serde_json::Value::from("loop"));

        let body = CreateGeneration::new(validated.model, video.url, audio.url, options);
        let estimates = self.remote.estimate_cost(&body, &validated.api_key).await?;
        tracing::debug!(
            estimates = estimates.len(),
            cost = estimates.iter().map(CostEstimate::cost).sum::<f64>(),
            key = %validated.api_key,
            "Cost estimated",
        );
        Ok(estimates)
    }

    /// Convert a local audio file to `target` next to the source.
    pub async fn convert_audio(
        &self,
        src: &Path,
        target: TargetFormat,
    ) -> Result<Normalized, CoreError> {
        if !src.is_absolute() {
            return Err(CoreError::Validation("path must be an absolute path".into()));
        }
        if !tokio::fs::try_exists(src).await.unwrap_or(false) {
            return Err(CoreError::NotFound {
                entity: "Source file",
                id: src.display().to_string(),
            });
        }
        let converted = self.normalizer.convert_audio(src, target).await?;
        tracing::info!(
            src = %src.display(),
            dest = %converted.path.display(),
            created = converted.created,
            "Audio converted",
        );
        Ok(converted)
    }

    /// Extract the audio track of a video into the uploads directory.
    ///
    /// A URL source is downloaded into the cache directory first and removed
    /// once the extraction finished.
    pub async fn extract_audio(
        &self,
        source: ExtractSource,
        target: TargetFormat,
    ) -> Result<PathBuf, CoreError> {
        match source {
            ExtractSource::Path(path) => {
                if !path.is_absolute() {
                    return Err(CoreError::Validation(
                        "video_path must be an absolute path".into(),
                    ));
                }
                if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    return Err(CoreError::NotFound {
                        entity: "Video file",
                        id: path.display().to_string(),
                    });
                }
                self.normalizer
                    .extract_audio(&path, target, &self.config.uploads_dir)
                    .await
            }
            ExtractSource::Url(url) => {
                let url = url.trim();
                if !is_http_url(url) {
                    return Err(CoreError::Validation(
                        "video_url must be a valid http(s) URL".into(),
                    ));
                }
                tokio::fs::create_dir_all(&self.config.cache_dir).await?;
                let video = tempfile::Builder::new()
                    .prefix("extract_")
                    .suffix(".mp4")
                    .tempfile_in(&self.config.cache_dir)?
                    .into_temp_path();
                let bytes = self.remote.download(url, &video).await?;
                tracing::debug!(path = %video.display(), bytes, "Downloaded video for extraction");

                self.normalizer
                    .extract_audio(&video, target, &self.config.uploads_dir)
                    .await
            }
        }
    }

    /// Cancel all poll loops. Jobs stay `processing` and resume on next start.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }

    // ---- crate helpers ----

    /// Directory downloads land in when no save target applies.
    pub(crate) fn cache_dir_for(&self, job: &GenerationJob) -> PathBuf {
        job.output_dir
            .clone()
            .unwrap_or_else(|| self.config.uploads_dir.clone())
    }

    /// Fail the job; a job that is already terminal is left alone.
    pub(crate) async fn record_failure(&self, id: &str, kind: JobErrorKind, message: &str) -> bool {
        match self.store.update(id, |job| job.fail(kind, message)).await {
            Ok(job) => {
                tracing::warn!(job_id = %id, kind = ?kind, error = %message, "Job failed");
                self.events.publish(
                    JobEvent::for_job(JOB_FAILED, &job)
                        .with_payload(serde_json::json!({ "error": message, "kind": kind })),
                );
                true
            }
            Err(e) => {
                tracing::debug!(job_id = %id, error = %e, "Failure not recorded");
                false
            }
        }
    }

    pub(crate) async fn schedule_poll(self: &Arc<Self>, id: String) {
        let this = Arc::clone(self);
        let job_id = id.clone();
        self.scheduler
            .schedule(id, move |cancel| async move {
                this.run_poll_loop(job_id, cancel).await;
            })
            .await;
    }
}
