//! Job lifecycle event bus.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`JobEvent`]: the lifecycle event envelope (`job.submitted`,
//!   `job.completed`, `job.failed`, ...).
//! - [`EventLogger`]: background consumer writing every event to the log.

pub mod bus;
pub mod logger;

pub use bus::{EventBus, JobEvent};
pub use logger::EventLogger;
