//! Job submission: validate, normalize, upload, create, track.

use std::path::Path;
use std::sync::Arc;

use lipsync_core::error::CoreError;
use lipsync_core::job::{GenerationJob, MediaSource};
use lipsync_core::paths::stage_temporary_item;
use lipsync_core::validation::{validate_submit, SourceInput, SubmitRequest, ValidatedSubmit};
use lipsync_events::bus::{JOB_EVICTED, JOB_SUBMITTED};
use lipsync_events::JobEvent;
use lipsync_remote::CreateGeneration;

use crate::orchestrator::GenerationOrchestrator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    Video,
    Audio,
}

impl SourceKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

impl GenerationOrchestrator {
    /// Start a generation and return its `processing` record.
    ///
    /// Errors before the remote service assigns an id are returned here and
    /// leave no job behind. Completion is observed by reading the job.
    pub async fn submit(self: &Arc<Self>, request: SubmitRequest) -> Result<GenerationJob, CoreError> {
        let mut validated = validate_submit(request, &self.config.default_model)?;
        let (video, audio) = self.resolve_sources(&mut validated).await?;

        let body = CreateGeneration::new(
            validated.model.clone(),
            video.url.clone(),
            audio.url.clone(),
            validated.options.clone(),
        );
        let id = self
            .remote
            .create(&body, &validated.api_key)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, key = %validated.api_key, "Remote create failed");
                CoreError::from(e)
            })?;

        let job = GenerationJob::new(
            id,
            video,
            audio,
            validated.model,
            validated.options,
            validated.api_key,
        )
        .with_output_dir(validated.output_dir);

        let evicted = self.store.insert(job.clone()).await;
        for old in evicted {
            self.scheduler.cancel(&old.id).await;
            self.events.publish(JobEvent::for_job(JOB_EVICTED, &old));
        }
        self.schedule_poll(job.id.clone()).await;

        tracing::info!(
            job_id = %job.id,
            model = %job.model,
            key = %job.credential,
            "Job submitted",
        );
        self.events.publish(JobEvent::for_job(JOB_SUBMITTED, &job));
        Ok(job)
    }

    /// Stage, check and upload both sides of a validated request.
    ///
    /// Files under `TemporaryItems` are copied into the uploads directory
    /// first, so the copy is what gets checked, uploaded and recorded.
    pub(crate) async fn resolve_sources(
        &self,
        validated: &mut ValidatedSubmit,
    ) -> Result<(MediaSource, MediaSource), CoreError> {
        for input in [&mut validated.video, &mut validated.audio] {
            if let SourceInput::Local { path, .. } = input {
                *path = stage_temporary_item(path, &self.config.uploads_dir).await;
            }
        }

        for (kind, input) in [
            (SourceKind::Video, &validated.video),
            (SourceKind::Audio, &validated.audio),
        ] {
            if let Some(path) = input.local_path() {
                self.check_local_source(kind, path).await?;
            }
        }

        let video = self.prepare_source(SourceKind::Video, &validated.video).await?;
        let audio = self.prepare_source(SourceKind::Audio, &validated.audio).await?;
        Ok((video, audio))
    }

    async fn check_local_source(&self, kind: SourceKind, path: &Path) -> Result<(), CoreError> {
        let meta = tokio::fs::metadata(path).await.map_err(|_| {
            CoreError::Validation(format!("{}_path not found: {}", kind.as_str(), path.display()))
        })?;
        if !meta.is_file() {
            return Err(CoreError::Validation(format!(
                "{}_path is not a file: {}",
                kind.as_str(),
                path.display()
            )));
        }
        if meta.len() > self.config.max_source_bytes {
            return Err(CoreError::Validation(format!(
                "{} file exceeds {} bytes",
                kind.as_str(),
                self.config.max_source_bytes
            )));
        }
        Ok(())
    }

    /// Turn one side of the request into a URL the remote service can fetch.
    ///
    /// Local files are normalized and uploaded; conversion outputs and files
    /// marked temporary are deleted once the upload succeeded.
    async fn prepare_source(&self, kind: SourceKind, input: &SourceInput) -> Result<MediaSource, CoreError> {
        let (path, is_temp) = match input {
            SourceInput::Url(url) => return Ok(MediaSource::remote(url.clone())),
            SourceInput::Local { path, is_temp } => (path, *is_temp),
        };

        let normalized = match kind {
            SourceKind::Audio => self.normalizer.normalize_audio(path).await,
            SourceKind::Video => self.normalizer.normalize_video(path).await?,
        };

        let uploaded = self.storage.upload(&normalized.path).await;
        if normalized.created {
            remove_quietly(&normalized.path).await;
        }
        let url = uploaded.map_err(|e| {
            tracing::warn!(source = kind.as_str(), path = %path.display(), error = %e, "Upload failed");
            CoreError::from(e)
        })?;

        let mut source = MediaSource::uploaded(url, path.clone(), is_temp);
        if is_temp && remove_quietly(path).await {
            source.local_path = None;
        }
        tracing::debug!(source = kind.as_str(), path = %path.display(), "Source uploaded");
        Ok(source)
    }
}

/// Delete `path`, logging failures. Returns whether the file is gone.
async fn remove_quietly(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to delete file");
            false
        }
    }
}
