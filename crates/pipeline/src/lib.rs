//! Generation job orchestration.
//!
//! [`GenerationOrchestrator`] turns a submit request into a remote generation,
//! tracks it in the [`JobStore`](lipsync_store::JobStore) and drives one poll
//! loop per in-flight job through the [`PollScheduler`].

pub mod config;
pub mod orchestrator;
pub mod poll;
pub mod save;
pub mod scheduler;
pub mod submit;

pub use config::PipelineConfig;
pub use orchestrator::{CostRequest, ExtractSource, GenerationOrchestrator};
pub use poll::{PollError, PollOutcome};
pub use save::{SaveLocation, SaveTarget};
pub use scheduler::PollScheduler;
