//! Explicit saves of a job's output to a caller-chosen location.
//!
//! Saving is idempotent: a job whose output already sits in the destination
//! directory returns that path without touching the disk or the network.

use std::path::{Path, PathBuf};

use lipsync_core::error::CoreError;
use lipsync_core::job::{ApiKey, GenerationJob, JobErrorKind, JobStatus, MediaSource};
use lipsync_core::paths::{is_directly_in, output_file_name};
use lipsync_events::bus::{JOB_EVICTED, JOB_SAVED};
use lipsync_events::JobEvent;
use lipsync_remote::RemoteSignal;
use serde::Deserialize;

use crate::orchestrator::GenerationOrchestrator;
use crate::poll::PollError;

/// Where a save should land.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveLocation {
    /// `target_dir`, else the job's output directory, else the uploads dir.
    #[default]
    Project,
    /// The user's documents directory.
    Documents,
}

/// Body of `POST /jobs/{id}/save`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaveTarget {
    #[serde(default)]
    pub location: SaveLocation,
    pub target_dir: Option<PathBuf>,
    /// Used when the job is unknown locally or to override its credential.
    pub api_key: Option<ApiKey>,
}

impl From<PollError> for CoreError {
    fn from(err: PollError) -> Self {
        match err.kind {
            JobErrorKind::Timeout => CoreError::Timeout(err.message),
            JobErrorKind::Io => CoreError::Io(std::io::Error::other(err.message)),
            JobErrorKind::Upstream | JobErrorKind::Orphaned => CoreError::Upstream(err.message),
        }
    }
}

impl GenerationOrchestrator {
    /// Place the output of `id` in the directory described by `target`.
    ///
    /// A local output is copied (the original stays where it is). Without
    /// one, the remote service is asked for the result and it is downloaded
    /// straight into the destination. Returns `OutputNotReady` when the
    /// generation has not produced anything yet.
    pub async fn save(&self, id: &str, target: SaveTarget) -> Result<PathBuf, CoreError> {
        if let Some(dir) = &target.target_dir {
            if !dir.is_absolute() {
                return Err(CoreError::Validation(
                    "target_dir must be an absolute path".into(),
                ));
            }
        }

        let override_key = target.api_key.clone().filter(|k| !k.is_empty());
        let job = self.store.get(id).await;
        let dest_dir = self.save_dir(job.as_ref(), &target);

        let Some(job) = job else {
            let Some(key) = override_key else {
                return Err(CoreError::job_not_found(id));
            };
            return self.save_unknown(id, key, &dest_dir).await;
        };

        if let Some(existing) = existing_output(&job).await {
            if is_directly_in(&existing, &dest_dir) {
                tracing::debug!(job_id = %id, path = %existing.display(), "Output already saved");
                return Ok(existing);
            }
            return self.copy_output(&job, &existing, &dest_dir).await;
        }

        let mut remote_job = job.clone();
        if let Some(key) = override_key {
            remote_job.credential = key;
        }
        if remote_job.credential.is_empty() {
            return Err(CoreError::OutputNotReady(id.to_string()));
        }

        let output_url = match self.check_remote(&remote_job).await? {
            RemoteSignal::Succeeded { output_url } => output_url,
            _ => return Err(CoreError::OutputNotReady(id.to_string())),
        };
        // The save takes over from the poll loop, which may be mid-download.
        if job.status == JobStatus::Processing {
            self.scheduler.cancel(id).await;
        }
        let path = self.download_output(&remote_job, &output_url, &dest_dir).await?;

        let completed = job.status == JobStatus::Processing
            && self.record_completion(id, path.clone()).await;
        if !completed {
            let relocated = path.clone();
            match self.store.update(id, |j| j.relocate_output(relocated)).await {
                Ok(_) => {}
                // Failed stays failed; the caller still gets the file.
                Err(e) if job.status == JobStatus::Failed => {
                    tracing::debug!(job_id = %id, error = %e, "Saved output of failed job");
                }
                Err(e) => {
                    tracing::warn!(job_id = %id, error = %e, "Failed to record saved output");
                }
            }
        }

        self.publish_saved(id, &path);
        Ok(path)
    }

    /// Destination directory for a save of `job`.
    fn save_dir(&self, job: Option<&GenerationJob>, target: &SaveTarget) -> PathBuf {
        match target.location {
            SaveLocation::Documents => self.config.documents_dir.clone(),
            SaveLocation::Project => target
                .target_dir
                .clone()
                .or_else(|| job.and_then(|j| j.output_dir.clone()))
                .unwrap_or_else(|| self.config.uploads_dir.clone()),
        }
    }

    async fn copy_output(
        &self,
        job: &GenerationJob,
        existing: &Path,
        dest_dir: &Path,
    ) -> Result<PathBuf, CoreError> {
        tokio::fs::create_dir_all(dest_dir).await?;
        let dest = dest_dir.join(output_file_name(&job.id));
        tokio::fs::copy(existing, &dest).await?;

        let relocated = dest.clone();
        self.store
            .update(&job.id, |j| j.relocate_output(relocated))
            .await?;

        tracing::info!(
            job_id = %job.id,
            from = %existing.display(),
            to = %dest.display(),
            "Output copied",
        );
        self.publish_saved(&job.id, &dest);
        Ok(dest)
    }

    /// Save a generation this process never tracked, using the caller's key.
    async fn save_unknown(&self, id: &str, key: ApiKey, dest_dir: &Path) -> Result<PathBuf, CoreError> {
        let placeholder = GenerationJob::new(
            id,
            MediaSource::remote(String::new()),
            MediaSource::remote(String::new()),
            self.config.default_model.clone(),
            serde_json::Map::new(),
            key,
        );

        let output_url = match self.check_remote(&placeholder).await? {
            RemoteSignal::Succeeded { output_url } => output_url,
            _ => return Err(CoreError::OutputNotReady(id.to_string())),
        };
        let path = self.download_output(&placeholder, &output_url, dest_dir).await?;

        let mut record = placeholder;
        record.complete(path.clone()).map_err(|e| CoreError::Validation(e.to_string()))?;
        for old in self.store.insert(record).await {
            self.scheduler.cancel(&old.id).await;
            self.events.publish(JobEvent::for_job(JOB_EVICTED, &old));
        }

        tracing::info!(job_id = %id, path = %path.display(), "Untracked job output saved");
        self.publish_saved(id, &path);
        Ok(path)
    }

    fn publish_saved(&self, id: &str, path: &Path) {
        self.events.publish(
            JobEvent::new(JOB_SAVED, id)
                .with_payload(serde_json::json!({ "output_location": path })),
        );
    }
}

/// The job's recorded output, if it is completed and the file still exists.
async fn existing_output(job: &GenerationJob) -> Option<PathBuf> {
    if job.status != JobStatus::Completed {
        return None;
    }
    let path = job.output_location.clone()?;
    tokio::fs::try_exists(&path)
        .await
        .unwrap_or(false)
        .then_some(path)
}
