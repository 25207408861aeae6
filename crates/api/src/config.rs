use std::path::PathBuf;

use lipsync_remote::api::DEFAULT_API_BASE;
use lipsync_store::DEFAULT_CAPACITY;

use crate::background::storage_cleanup::CleanupConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for running next to the panel on a
/// workstation.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `127.0.0.1`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `600`; submit includes uploads).
    pub request_timeout_secs: u64,
    /// Base directory holding `logs/`, `cache/`, `state/` and `uploads/`.
    pub data_dir: PathBuf,
    /// Target of saves with `location = documents`.
    pub documents_dir: PathBuf,
    /// Base URL of the remote generation service.
    pub sync_api_base: String,
    pub job_store_capacity: usize,
    /// Transcoding utility binary.
    pub ffmpeg_path: String,
    pub cleanup: CleanupConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                          |
    /// |-------------------------|----------------------------------|
    /// | `HOST`                  | `127.0.0.1`                      |
    /// | `PORT`                  | `3000`                           |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`          |
    /// | `REQUEST_TIMEOUT_SECS`  | `600`                            |
    /// | `LIPSYNC_DATA_DIR`      | platform data dir + `lipsync`    |
    /// | `LIPSYNC_DOCUMENTS_DIR` | `~/Documents/lipsync outputs`    |
    /// | `SYNC_API_BASE`         | `https://api.sync.so/v2`         |
    /// | `JOB_STORE_CAPACITY`    | `500`                            |
    /// | `FFMPEG_PATH`           | `ffmpeg`                         |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "600".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let data_dir = std::env::var("LIPSYNC_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir());

        let documents_dir = std::env::var("LIPSYNC_DOCUMENTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_documents_dir());

        let sync_api_base =
            std::env::var("SYNC_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.into());

        let job_store_capacity: usize = std::env::var("JOB_STORE_CAPACITY")
            .unwrap_or_else(|_| DEFAULT_CAPACITY.to_string())
            .parse()
            .expect("JOB_STORE_CAPACITY must be a valid usize");

        let ffmpeg_path = std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".into());

        let cleanup = CleanupConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            data_dir,
            documents_dir,
            sync_api_base,
            job_store_capacity: job_store_capacity.max(1),
            ffmpeg_path,
            cleanup,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("lipsync")
}

fn default_documents_dir() -> PathBuf {
    dirs::document_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Documents")))
        .unwrap_or_else(std::env::temp_dir)
        .join("lipsync outputs")
}
