//! In-memory job collection with a durable snapshot.
//!
//! All access goes through a single async mutex that also covers the
//! snapshot write, so concurrent poll loops never interleave writes.
//! Records are kept in creation order; when the collection grows past its
//! capacity the oldest records are evicted.

use std::path::{Path, PathBuf};

use lipsync_core::job::{GenerationJob, JobStatus, TransitionError};
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::snapshot;

/// Maximum number of retained jobs.
pub const DEFAULT_CAPACITY: usize = 500;

/// Owned, bounded job collection.
pub struct JobStore {
    jobs: Mutex<Vec<GenerationJob>>,
    snapshot_path: PathBuf,
    capacity: usize,
}

impl JobStore {
    /// Load the snapshot at `snapshot_path`, keeping at most `capacity` of the
    /// most recent records.
    pub async fn open(snapshot_path: impl Into<PathBuf>, capacity: usize) -> Self {
        let snapshot_path = snapshot_path.into();
        let capacity = capacity.max(1);
        let mut jobs = snapshot::load(&snapshot_path).await;
        let excess = jobs.len().saturating_sub(capacity);
        if excess > 0 {
            jobs.drain(..excess);
        }
        tracing::info!(
            path = %snapshot_path.display(),
            jobs = jobs.len(),
            "Job store loaded",
        );
        Self {
            jobs: Mutex::new(jobs),
            snapshot_path,
            capacity,
        }
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a job and persist.
    ///
    /// A record with the same id is replaced while it is still processing;
    /// a terminal record is kept and `job` is dropped. Returns the records
    /// evicted to stay within capacity, oldest first.
    pub async fn insert(&self, job: GenerationJob) -> Vec<GenerationJob> {
        let mut jobs = self.jobs.lock().await;
        if let Some(existing) = jobs.iter_mut().find(|j| j.id == job.id) {
            if existing.status.is_terminal() {
                tracing::debug!(job_id = %job.id, status = %existing.status, "Kept terminal record");
                return Vec::new();
            }
            *existing = job;
            self.persist(&jobs).await;
            return Vec::new();
        }

        jobs.push(job);
        let excess = jobs.len().saturating_sub(self.capacity);
        let evicted: Vec<GenerationJob> = jobs.drain(..excess).collect();
        if !evicted.is_empty() {
            tracing::debug!(count = evicted.len(), "Evicted oldest jobs");
        }
        self.persist(&jobs).await;
        evicted
    }

    pub async fn get(&self, id: &str) -> Option<GenerationJob> {
        self.jobs.lock().await.iter().find(|j| j.id == id).cloned()
    }

    /// All jobs in creation order.
    pub async fn list(&self) -> Vec<GenerationJob> {
        self.jobs.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }

    /// Jobs still in `processing`, in creation order.
    pub async fn processing(&self) -> Vec<GenerationJob> {
        self.jobs
            .lock()
            .await
            .iter()
            .filter(|j| j.status == JobStatus::Processing)
            .cloned()
            .collect()
    }

    /// Apply `mutate` to the job with `id` and persist the result.
    ///
    /// The mutation runs on a copy; if it fails the stored record is left
    /// untouched and nothing is written.
    pub async fn update<F>(&self, id: &str, mutate: F) -> Result<GenerationJob, StoreError>
    where
        F: FnOnce(&mut GenerationJob) -> Result<(), TransitionError>,
    {
        let mut jobs = self.jobs.lock().await;
        let slot = jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let mut updated = slot.clone();
        mutate(&mut updated)?;
        *slot = updated.clone();

        self.persist(&jobs).await;
        Ok(updated)
    }

    async fn persist(&self, jobs: &[GenerationJob]) {
        if let Err(e) = snapshot::write(&self.snapshot_path, jobs).await {
            tracing::error!(
                path = %self.snapshot_path.display(),
                error = %e,
                "Failed to write job snapshot",
            );
        }
    }
}
