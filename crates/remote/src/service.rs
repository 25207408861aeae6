//! Generation service seam and its error type.

use std::path::Path;

use async_trait::async_trait;
use lipsync_core::error::CoreError;
use lipsync_core::job::ApiKey;

use crate::messages::{CostEstimate, CreateGeneration, GenerationMetadata};

/// Errors from the generation service layer.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Generation service error ({status}): {body}")]
    Api { status: u16, body: String },

    /// A success response was missing required fields.
    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RemoteError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Request(e) if e.is_timeout())
    }
}

impl From<RemoteError> for CoreError {
    fn from(err: RemoteError) -> Self {
        match err {
            e if e.is_timeout() => CoreError::Timeout(e.to_string()),
            RemoteError::Io(e) => CoreError::Io(e),
            other => CoreError::Upstream(other.to_string()),
        }
    }
}

/// Operations the orchestrator needs from the generation service.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Submit a generation, returning the id assigned by the service.
    async fn create(&self, request: &CreateGeneration, key: &ApiKey) -> Result<String, RemoteError>;

    async fn fetch(&self, id: &str, key: &ApiKey) -> Result<GenerationMetadata, RemoteError>;

    /// Stream the asset at `url` into `dest`, returning the bytes written.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, RemoteError>;

    /// Estimate what `request` would cost. The service may answer with
    /// several estimates; a single one comes back as a one-item list.
    async fn estimate_cost(
        &self,
        request: &CreateGeneration,
        key: &ApiKey,
    ) -> Result<Vec<CostEstimate>, RemoteError>;
}
