//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` between the orchestrator, which
//! publishes, and any number of subscribers.

use chrono::{DateTime, Utc};
use lipsync_core::job::{GenerationJob, JobStatus};
use lipsync_core::types::JobId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

pub const JOB_SUBMITTED: &str = "job.submitted";
pub const JOB_COMPLETED: &str = "job.completed";
pub const JOB_FAILED: &str = "job.failed";
pub const JOB_EVICTED: &str = "job.evicted";
pub const JOB_SAVED: &str = "job.saved";

// ---------------------------------------------------------------------------
// JobEvent
// ---------------------------------------------------------------------------

/// A lifecycle event for one generation job.
///
/// Built with [`JobEvent::new`] and enriched with
/// [`with_status`](JobEvent::with_status) and
/// [`with_payload`](JobEvent::with_payload). Never carries the credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    /// Dot-separated event name, e.g. `"job.completed"`.
    pub event_type: String,

    pub job_id: JobId,

    /// Job status at the time of the event.
    pub status: Option<JobStatus>,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    pub fn new(event_type: impl Into<String>, job_id: impl Into<JobId>) -> Self {
        Self {
            event_type: event_type.into(),
            job_id: job_id.into(),
            status: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Event for `job`, carrying its current status.
    pub fn for_job(event_type: impl Into<String>, job: &GenerationJob) -> Self {
        Self::new(event_type, job.id.clone()).with_status(job.status)
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// ```rust
/// use lipsync_events::bus::{EventBus, JobEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(JobEvent::new("job.submitted", "gen-1"));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// Slow receivers observe `RecvError::Lagged` once the buffer is full.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: JobEvent) {
        // A send error only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use lipsync_core::job::{ApiKey, MediaSource};

    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(
            JobEvent::new(JOB_FAILED, "gen-9")
                .with_status(JobStatus::Failed)
                .with_payload(serde_json::json!({"error": "Timeout"})),
        );

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, JOB_FAILED);
        assert_eq!(received.job_id, "gen-9");
        assert_eq!(received.status, Some(JobStatus::Failed));
        assert_eq!(received.payload["error"], "Timeout");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(JobEvent::new(JOB_SUBMITTED, "gen-1"));

        assert_eq!(rx1.recv().await.expect("rx1").job_id, "gen-1");
        assert_eq!(rx2.recv().await.expect("rx2").job_id, "gen-1");
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        EventBus::default().publish(JobEvent::new(JOB_EVICTED, "gen-0"));
    }

    #[test]
    fn event_for_job_never_serializes_the_credential() {
        let job = GenerationJob::new(
            "gen-2",
            MediaSource::remote("https://cdn/v.mp4"),
            MediaSource::remote("https://cdn/a.wav"),
            "lipsync-2-pro",
            Default::default(),
            ApiKey::new("sk-secret-value"),
        );
        let json = serde_json::to_string(&JobEvent::for_job(JOB_SUBMITTED, &job)).expect("json");
        assert!(!json.contains("sk-secret-value"));
        assert!(json.contains("\"processing\""));
    }
}
