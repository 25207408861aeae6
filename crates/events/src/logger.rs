//! Structured-log sink for job events.
//!
//! [`EventLogger`] subscribes to the [`EventBus`](crate::bus::EventBus) and
//! writes one log line per event. It runs as a long-lived background task and
//! stops when cancelled or when the bus is dropped.

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::bus::{JobEvent, JOB_FAILED};

pub struct EventLogger;

impl EventLogger {
    pub async fn run(mut receiver: broadcast::Receiver<JobEvent>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Event logger stopping");
                    break;
                }
                received = receiver.recv() => match received {
                    Ok(event) => Self::log(&event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Event logger lagged, some events were not logged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Event bus closed, event logger shutting down");
                        break;
                    }
                },
            }
        }
    }

    fn log(event: &JobEvent) {
        let status = event.status.map(|s| s.as_str()).unwrap_or("-");
        if event.event_type == JOB_FAILED {
            tracing::warn!(
                event_type = %event.event_type,
                job_id = %event.job_id,
                status,
                payload = %event.payload,
                "Job event",
            );
        } else {
            tracing::info!(
                event_type = %event.event_type,
                job_id = %event.job_id,
                status,
                payload = %event.payload,
                "Job event",
            );
        }
    }
}
