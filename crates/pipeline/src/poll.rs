//! Per-job status polling.
//!
//! A poll loop waits `poll_interval`, checks the remote status, and repeats
//! until the job is terminal or `max_attempts` pending answers have been
//! seen. The whole loop runs under an overall deadline; missing it fails the
//! job with "Polling timeout". Any error while polling fails the job.

use std::path::{Path, PathBuf};

use lipsync_core::job::{GenerationJob, JobErrorKind};
use lipsync_core::paths::output_file_name;
use lipsync_events::bus::JOB_COMPLETED;
use lipsync_events::JobEvent;
use lipsync_remote::{RemoteError, RemoteSignal};
use tokio_util::sync::CancellationToken;

use crate::orchestrator::GenerationOrchestrator;

/// Result of one [`poll_once`](GenerationOrchestrator::poll_once) call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Still running remotely.
    Pending,
    Completed(PathBuf),
    Failed(String),
    /// The job is unknown or already terminal; nothing was done.
    Skipped,
}

/// A poll step that must end the job.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct PollError {
    pub kind: JobErrorKind,
    pub message: String,
}

impl PollError {
    pub fn new(kind: JobErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<RemoteError> for PollError {
    fn from(err: RemoteError) -> Self {
        let kind = match &err {
            e if e.is_timeout() => JobErrorKind::Timeout,
            RemoteError::Io(_) => JobErrorKind::Io,
            _ => JobErrorKind::Upstream,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<std::io::Error> for PollError {
    fn from(err: std::io::Error) -> Self {
        Self::new(JobErrorKind::Io, err.to_string())
    }
}

/// Message recorded when the attempt budget runs out.
pub const ATTEMPTS_EXHAUSTED: &str = "Timeout";
/// Message recorded when the overall deadline passes.
pub const DEADLINE_EXCEEDED: &str = "Polling timeout";

impl GenerationOrchestrator {
    /// Check the remote status of `id` once and apply the result.
    pub async fn poll_once(&self, id: &str) -> PollOutcome {
        let Some(job) = self.store.get(id).await else {
            return PollOutcome::Skipped;
        };
        if job.status.is_terminal() {
            return PollOutcome::Skipped;
        }

        let step = match self.check_remote(&job).await {
            Ok(RemoteSignal::Pending { status }) => {
                tracing::debug!(job_id = %id, remote_status = %status, "Generation pending");
                return PollOutcome::Pending;
            }
            Ok(RemoteSignal::Succeeded { output_url }) => {
                let dir = self.cache_dir_for(&job);
                self.download_output(&job, &output_url, &dir).await
            }
            Ok(RemoteSignal::Failed { message }) => Err(PollError::new(JobErrorKind::Upstream, message)),
            Err(e) => Err(e),
        };

        match step {
            Ok(path) => {
                self.record_completion(id, path.clone()).await;
                PollOutcome::Completed(path)
            }
            Err(e) => {
                self.record_failure(id, e.kind, &e.message).await;
                PollOutcome::Failed(e.message)
            }
        }
    }

    pub(crate) async fn check_remote(&self, job: &GenerationJob) -> Result<RemoteSignal, PollError> {
        let meta = self.remote.fetch(&job.id, &job.credential).await?;
        Ok(meta.signal())
    }

    /// Stream the output into `<dir>/<id>_output.mp4` via a `.part` file.
    ///
    /// Each call downloads into its own uniquely named part file, so a save
    /// and a poll loop fetching the same job never share one. The part file
    /// is removed if the download fails or this future is dropped.
    pub(crate) async fn download_output(
        &self,
        job: &GenerationJob,
        url: &str,
        dir: &Path,
    ) -> Result<PathBuf, PollError> {
        tokio::fs::create_dir_all(dir).await?;
        let name = output_file_name(&job.id);
        let dest = dir.join(&name);
        let part = tempfile::Builder::new()
            .prefix(&format!("{name}."))
            .suffix(".part")
            .tempfile_in(dir)?
            .into_temp_path();

        let bytes = self.remote.download(url, &part).await?;
        part.persist(&dest).map_err(|e| e.error)?;
        if !tokio::fs::try_exists(&dest).await.unwrap_or(false) {
            return Err(PollError::new(
                JobErrorKind::Io,
                format!("downloaded output missing at {}", dest.display()),
            ));
        }

        tracing::info!(job_id = %job.id, path = %dest.display(), bytes, "Output downloaded");
        Ok(dest)
    }

    pub(crate) async fn record_completion(&self, id: &str, path: PathBuf) -> bool {
        match self.store.update(id, |job| job.complete(path.clone())).await {
            Ok(job) => {
                tracing::info!(job_id = %id, path = %path.display(), "Job completed");
                self.events.publish(
                    JobEvent::for_job(JOB_COMPLETED, &job)
                        .with_payload(serde_json::json!({ "output_location": path })),
                );
                true
            }
            Err(e) => {
                tracing::debug!(job_id = %id, error = %e, "Completion not recorded");
                false
            }
        }
    }

    /// Poll `id` until it is terminal, the budget is spent, or `cancel` fires.
    pub(crate) async fn run_poll_loop(&self, id: String, cancel: CancellationToken) {
        let deadline = self.config.poll_deadline();
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(job_id = %id, "Poll loop stopped");
            }
            result = tokio::time::timeout(deadline, self.poll_until_terminal(&id)) => {
                if result.is_err() {
                    self.record_failure(&id, JobErrorKind::Timeout, DEADLINE_EXCEEDED).await;
                }
            }
        }
    }

    async fn poll_until_terminal(&self, id: &str) {
        let mut attempts: u32 = 0;
        loop {
            tokio::time::sleep(self.config.poll_interval).await;
            attempts += 1;

            match self.poll_once(id).await {
                PollOutcome::Pending if attempts < self.config.max_attempts => {}
                PollOutcome::Pending => {
                    tracing::warn!(job_id = %id, attempts, "Poll attempt budget exhausted");
                    self.record_failure(id, JobErrorKind::Timeout, ATTEMPTS_EXHAUSTED)
                        .await;
                    return;
                }
                _ => return,
            }
        }
    }
}
