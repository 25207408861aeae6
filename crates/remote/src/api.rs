//! REST client for the Sync generation API.
//!
//! Every call carries the caller's key in the `x-api-key` header and its own
//! timeout. Status lookups retry once against the legacy
//! `/generations/{id}` path when `/generate/{id}` returns 404.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use lipsync_core::job::ApiKey;
use reqwest::StatusCode;
use tokio::io::AsyncWriteExt;

use crate::messages::{CostEstimate, CostResponse, CreateGeneration, CreateResponse, GenerationMetadata};
use crate::service::{GenerationService, RemoteError};

pub const DEFAULT_API_BASE: &str = "https://api.sync.so/v2";

const CREATE_TIMEOUT: Duration = Duration::from_secs(120);
const STATUS_TIMEOUT: Duration = Duration::from_secs(10);
const COST_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// HTTP client for the generation service.
#[derive(Debug, Clone)]
pub struct SyncApiClient {
    client: reqwest::Client,
    api_base: String,
}

impl SyncApiClient {
    /// * `api_base` - Base URL without trailing slash, e.g. `https://api.sync.so/v2`.
    pub fn new(api_base: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_base)
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(client: reqwest::Client, api_base: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    async fn get_metadata(&self, path: &str, key: &ApiKey) -> Result<reqwest::Response, RemoteError> {
        Ok(self
            .client
            .get(format!("{}{path}", self.api_base))
            .header("x-api-key", key.expose())
            .header("accept", "application/json")
            .timeout(STATUS_TIMEOUT)
            .send()
            .await?)
    }

    // ---- private helpers ----

    /// Return the response unchanged on success, or a
    /// [`RemoteError::Api`] with the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(RemoteError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, RemoteError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl GenerationService for SyncApiClient {
    async fn create(&self, request: &CreateGeneration, key: &ApiKey) -> Result<String, RemoteError> {
        tracing::debug!(model = %request.model, key = %key, "Creating generation");
        let response = self
            .client
            .post(format!("{}/generate", self.api_base))
            .header("x-api-key", key.expose())
            .header("accept", "application/json")
            .json(request)
            .timeout(CREATE_TIMEOUT)
            .send()
            .await?;

        let created: CreateResponse = Self::parse_response(response).await?;
        created
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| RemoteError::Malformed("create response has no id".to_string()))
    }

    async fn fetch(&self, id: &str, key: &ApiKey) -> Result<GenerationMetadata, RemoteError> {
        let mut response = self.get_metadata(&format!("/generate/{id}"), key).await?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(job_id = %id, "Status lookup 404, retrying legacy path");
            response = self.get_metadata(&format!("/generations/{id}"), key).await?;
        }
        Self::parse_response(response).await
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64, RemoteError> {
        let response = self
            .client
            .get(url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await?;
        let mut response = Self::ensure_success(response).await?;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }

    async fn estimate_cost(
        &self,
        request: &CreateGeneration,
        key: &ApiKey,
    ) -> Result<Vec<CostEstimate>, RemoteError> {
        let response = self
            .client
            .post(format!("{}/analyze/cost", self.api_base))
            .header("x-api-key", key.expose())
            .header("accept", "application/json")
            .json(request)
            .timeout(COST_TIMEOUT)
            .send()
            .await?;
        let parsed: CostResponse = Self::parse_response(response).await?;
        Ok(parsed.into_estimates())
    }
}
