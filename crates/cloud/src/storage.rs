//! Upload-and-presign against an S3-compatible bucket.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use lipsync_core::error::CoreError;
use lipsync_core::paths::guess_mime;
use rand::Rng;

use crate::config::R2Config;

/// Lifetime of the presigned GET URL handed to the generation service.
pub const PRESIGN_TTL: Duration = Duration::from_secs(3600);

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Errors from blob storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("blob storage not configured")]
    NotConfigured,

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("presign failed: {0}")]
    Presign(String),

    #[error("upload timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::FileNotFound(path) => CoreError::NotFound {
                entity: "Source file",
                id: path,
            },
            StorageError::Timeout(after) => {
                CoreError::Timeout(format!("upload timed out after {after:?}"))
            }
            StorageError::Io(e) => CoreError::Io(e),
            other => CoreError::Upstream(other.to_string()),
        }
    }
}

/// Makes a local file reachable by URL.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Upload `path` and return a URL the generation service can fetch.
    async fn upload(&self, path: &Path) -> Result<String, StorageError>;
}

/// `<prefix>uploads/<millis>-<6 random alphanumerics>-<basename>`
pub fn object_key(prefix: &str, path: &Path) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: String = rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    let basename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    format!("{prefix}uploads/{millis}-{suffix}-{basename}")
}

/// [`BlobStorage`] backed by Cloudflare R2 through the S3 API.
pub struct R2Storage {
    client: Option<aws_sdk_s3::Client>,
    bucket: String,
    prefix: String,
}

impl R2Storage {
    /// Build the client; without endpoint and credentials every upload fails
    /// with [`StorageError::NotConfigured`].
    pub async fn from_config(config: R2Config) -> Self {
        let client = match (&config.endpoint_url, &config.access_key, &config.secret_key) {
            (Some(endpoint), Some(access), Some(secret)) => {
                let credentials = aws_credential_types::Credentials::new(
                    access.clone(),
                    secret.clone(),
                    None,
                    None,
                    "r2-static",
                );
                let sdk = aws_config::defaults(aws_config::BehaviorVersion::latest())
                    .region(Region::new("auto"))
                    .endpoint_url(endpoint)
                    .credentials_provider(credentials)
                    .load()
                    .await;
                let s3_config = aws_sdk_s3::config::Builder::from(&sdk)
                    .force_path_style(true)
                    .build();
                tracing::info!(bucket = %config.bucket, prefix = %config.prefix, "Blob storage configured");
                Some(aws_sdk_s3::Client::from_conf(s3_config))
            }
            _ => {
                tracing::warn!("Blob storage credentials missing, local uploads will fail");
                None
            }
        };

        Self {
            client,
            bucket: config.bucket,
            prefix: config.prefix,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    async fn put_and_presign(
        &self,
        client: &aws_sdk_s3::Client,
        path: &Path,
        key: &str,
    ) -> Result<String, StorageError> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::Upload(e.to_string()))?;

        client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(guess_mime(path))
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::Upload(DisplayErrorContext(e).to_string()))?;

        let presign =
            PresigningConfig::expires_in(PRESIGN_TTL).map_err(|e| StorageError::Presign(e.to_string()))?;
        let request = client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign)
            .await
            .map_err(|e| StorageError::Presign(DisplayErrorContext(e).to_string()))?;

        Ok(request.uri().to_string())
    }
}

#[async_trait]
impl BlobStorage for R2Storage {
    async fn upload(&self, path: &Path) -> Result<String, StorageError> {
        let client = self.client.as_ref().ok_or(StorageError::NotConfigured)?;
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(StorageError::FileNotFound(path.display().to_string()));
        }

        let key = object_key(&self.prefix, path);
        tracing::info!(path = %path.display(), key = %key, "Uploading source to blob storage");

        let url = tokio::time::timeout(UPLOAD_TIMEOUT, self.put_and_presign(client, path, &key))
            .await
            .map_err(|_| StorageError::Timeout(UPLOAD_TIMEOUT))??;

        tracing::debug!(key = %key, "Upload complete");
        Ok(url)
    }
}
