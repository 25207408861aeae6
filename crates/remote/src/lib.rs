//! Client for the remote lipsync generation service.
//!
//! - [`GenerationService`]: the seam the orchestrator talks to.
//! - [`SyncApiClient`]: the HTTP implementation.
//! - [`messages`]: request/response bodies and the status-to-signal mapping.

pub mod api;
pub mod messages;
pub mod service;

pub use api::SyncApiClient;
pub use messages::{CostEstimate, CreateGeneration, GenerationMetadata, RemoteSignal};
pub use service::{GenerationService, RemoteError};
