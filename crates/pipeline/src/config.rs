use std::path::PathBuf;
use std::time::Duration;

use lipsync_core::paths::DataDirs;

pub const DEFAULT_MODEL: &str = "lipsync-2-pro";

/// Local sources larger than this are rejected (1 GiB).
pub const DEFAULT_MAX_SOURCE_BYTES: u64 = 1024 * 1024 * 1024;

/// Orchestrator tuning.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Model used when a request omits one.
    pub default_model: String,
    /// Fixed delay before each poll attempt.
    pub poll_interval: Duration,
    /// Pending responses tolerated before a job fails with `Timeout`.
    pub max_attempts: u32,
    /// Added to `poll_interval * max_attempts` for the overall poll deadline.
    pub poll_grace: Duration,
    pub max_source_bytes: u64,
    /// Outputs land here when the job has no preferred directory.
    pub uploads_dir: PathBuf,
    /// Target of saves with `location = documents`.
    pub documents_dir: PathBuf,
    /// Scratch space for videos fetched only to extract their audio.
    pub cache_dir: PathBuf,
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var              | Default          |
    /// |----------------------|------------------|
    /// | `DEFAULT_MODEL`      | `lipsync-2-pro`  |
    /// | `POLL_INTERVAL_SECS` | `5`              |
    /// | `POLL_MAX_ATTEMPTS`  | `120`            |
    /// | `POLL_GRACE_SECS`    | `30`             |
    /// | `MAX_SOURCE_BYTES`   | `1073741824`     |
    pub fn from_env(dirs: &DataDirs, documents_dir: PathBuf) -> Self {
        let default_model =
            std::env::var("DEFAULT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());

        let poll_interval_secs: u64 = std::env::var("POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("POLL_INTERVAL_SECS must be a valid u64");

        let max_attempts: u32 = std::env::var("POLL_MAX_ATTEMPTS")
            .unwrap_or_else(|_| "120".into())
            .parse()
            .expect("POLL_MAX_ATTEMPTS must be a valid u32");

        let poll_grace_secs: u64 = std::env::var("POLL_GRACE_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("POLL_GRACE_SECS must be a valid u64");

        let max_source_bytes: u64 = std::env::var("MAX_SOURCE_BYTES")
            .unwrap_or_else(|_| DEFAULT_MAX_SOURCE_BYTES.to_string())
            .parse()
            .expect("MAX_SOURCE_BYTES must be a valid u64");

        Self {
            default_model,
            poll_interval: Duration::from_secs(poll_interval_secs),
            max_attempts: max_attempts.max(1),
            poll_grace: Duration::from_secs(poll_grace_secs),
            max_source_bytes,
            uploads_dir: dirs.uploads.clone(),
            documents_dir,
            cache_dir: dirs.cache.clone(),
        }
    }

    /// Defaults rooted at `dirs`, without reading the environment.
    pub fn with_dirs(dirs: &DataDirs, documents_dir: PathBuf) -> Self {
        Self {
            default_model: DEFAULT_MODEL.into(),
            poll_interval: Duration::from_secs(5),
            max_attempts: 120,
            poll_grace: Duration::from_secs(30),
            max_source_bytes: DEFAULT_MAX_SOURCE_BYTES,
            uploads_dir: dirs.uploads.clone(),
            documents_dir,
            cache_dir: dirs.cache.clone(),
        }
    }

    /// `max_attempts * poll_interval + poll_grace`.
    pub fn poll_deadline(&self) -> Duration {
        self.poll_interval * self.max_attempts + self.poll_grace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_deadline_is_ten_minutes_plus_grace() {
        let dirs = DataDirs::under("/data");
        let config = PipelineConfig::with_dirs(&dirs, "/docs".into());
        assert_eq!(config.poll_deadline(), Duration::from_secs(630));
        assert_eq!(config.uploads_dir, PathBuf::from("/data/uploads"));
        assert_eq!(config.cache_dir, PathBuf::from("/data/cache"));
    }
}
