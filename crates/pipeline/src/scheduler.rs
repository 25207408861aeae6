//! One cancellable poll task per job.
//!
//! [`PollScheduler`] owns the spawned poll loops keyed by job id. Scheduling
//! a job that already has a loop cancels the old one first, so at most one
//! loop exists per job. A loop removes its own entry when it finishes.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lipsync_core::types::JobId;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// How long shutdown waits for each loop to exit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

struct ScheduledPoll {
    /// Distinguishes this task from a later replacement under the same id.
    ticket: u64,
    cancel: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

pub struct PollScheduler {
    tasks: Arc<Mutex<HashMap<JobId, ScheduledPoll>>>,
    next_ticket: AtomicU64,
    /// Master token; every task token is a child of it.
    cancel: CancellationToken,
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl PollScheduler {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(Mutex::new(HashMap::new())),
            next_ticket: AtomicU64::new(0),
            cancel: CancellationToken::new(),
        }
    }

    /// Spawn `run` as the poll loop for `id`, replacing any existing loop.
    ///
    /// `run` receives the task's cancellation token. Ignored after
    /// [`shutdown`](Self::shutdown).
    pub async fn schedule<F, Fut>(&self, id: JobId, run: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.cancel.is_cancelled() {
            tracing::debug!(job_id = %id, "Scheduler shut down, poll not started");
            return;
        }

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let token = self.cancel.child_token();

        // Held across spawn + insert so the task cannot remove itself first.
        let mut tasks = self.tasks.lock().await;
        if let Some(previous) = tasks.remove(&id) {
            tracing::debug!(job_id = %id, "Replacing existing poll loop");
            previous.cancel.cancel();
        }

        let fut = run(token.clone());
        let registry = Arc::clone(&self.tasks);
        let task_id = id.clone();
        let handle = tokio::spawn(async move {
            fut.await;
            let mut tasks = registry.lock().await;
            if tasks.get(&task_id).is_some_and(|t| t.ticket == ticket) {
                tasks.remove(&task_id);
            }
        });

        tasks.insert(
            id,
            ScheduledPoll {
                ticket,
                cancel: token,
                handle,
            },
        );
    }

    /// Cancel the loop for `id`. Returns `false` when none was scheduled.
    pub async fn cancel(&self, id: &str) -> bool {
        match self.tasks.lock().await.remove(id) {
            Some(task) => {
                task.cancel.cancel();
                tracing::debug!(job_id = %id, "Poll loop cancelled");
                true
            }
            None => false,
        }
    }

    pub async fn is_scheduled(&self, id: &str) -> bool {
        self.tasks.lock().await.contains_key(id)
    }

    pub async fn active_count(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Cancel every loop and wait briefly for each to exit.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let drained: Vec<(JobId, ScheduledPoll)> = self.tasks.lock().await.drain().collect();
        tracing::info!(count = drained.len(), "Stopping poll loops");

        for (id, task) in drained {
            task.cancel.cancel();
            if tokio::time::timeout(SHUTDOWN_GRACE, task.handle).await.is_err() {
                tracing::warn!(job_id = %id, "Poll loop did not stop in time");
            }
        }
    }
}
