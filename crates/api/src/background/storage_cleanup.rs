//! Periodic removal of stale scratch files.
//!
//! Sweeps `uploads/` and `cache/` on their own intervals, using the age
//! threshold as the interval, plus one sweep of both shortly after startup.

use std::path::Path;
use std::time::Duration;

use lipsync_core::paths::DataDirs;
use lipsync_core::sweep::StorageSweeper;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Cleanup cadence and age thresholds.
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    pub uploads_max_age: Duration,
    pub cache_max_age: Duration,
    pub initial_delay: Duration,
}

impl CleanupConfig {
    /// Load cleanup settings from environment variables with defaults.
    ///
    /// | Env Var                         | Default |
    /// |---------------------------------|---------|
    /// | `CLEANUP_UPLOADS_MAX_AGE_HOURS` | `24`    |
    /// | `CLEANUP_CACHE_MAX_AGE_HOURS`   | `6`     |
    /// | `CLEANUP_INITIAL_DELAY_SECS`    | `60`    |
    pub fn from_env() -> Self {
        let uploads_hours: u64 = std::env::var("CLEANUP_UPLOADS_MAX_AGE_HOURS")
            .unwrap_or_else(|_| "24".into())
            .parse()
            .expect("CLEANUP_UPLOADS_MAX_AGE_HOURS must be a valid u64");

        let cache_hours: u64 = std::env::var("CLEANUP_CACHE_MAX_AGE_HOURS")
            .unwrap_or_else(|_| "6".into())
            .parse()
            .expect("CLEANUP_CACHE_MAX_AGE_HOURS must be a valid u64");

        let initial_delay_secs: u64 = std::env::var("CLEANUP_INITIAL_DELAY_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("CLEANUP_INITIAL_DELAY_SECS must be a valid u64");

        Self {
            uploads_max_age: Duration::from_secs(uploads_hours.max(1) * 3600),
            cache_max_age: Duration::from_secs(cache_hours.max(1) * 3600),
            initial_delay: Duration::from_secs(initial_delay_secs),
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            uploads_max_age: Duration::from_secs(24 * 3600),
            cache_max_age: Duration::from_secs(6 * 3600),
            initial_delay: Duration::from_secs(60),
        }
    }
}

/// Run the cleanup loop until `cancel` is triggered.
pub async fn run(dirs: DataDirs, config: CleanupConfig, cancel: CancellationToken) {
    let sweeper = StorageSweeper::new();

    tracing::info!(
        uploads_max_age_secs = config.uploads_max_age.as_secs(),
        cache_max_age_secs = config.cache_max_age.as_secs(),
        "Storage cleanup started"
    );

    let initial = tokio::time::sleep(config.initial_delay);
    tokio::pin!(initial);
    let mut initial_done = false;

    let mut uploads_tick = interval_at(
        Instant::now() + config.uploads_max_age,
        config.uploads_max_age,
    );
    uploads_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut cache_tick = interval_at(Instant::now() + config.cache_max_age, config.cache_max_age);
    cache_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Storage cleanup stopping");
                break;
            }
            _ = &mut initial, if !initial_done => {
                initial_done = true;
                sweep_one(&sweeper, "uploads", &dirs.uploads, config.uploads_max_age).await;
                sweep_one(&sweeper, "cache", &dirs.cache, config.cache_max_age).await;
            }
            _ = uploads_tick.tick() => {
                sweep_one(&sweeper, "uploads", &dirs.uploads, config.uploads_max_age).await;
            }
            _ = cache_tick.tick() => {
                sweep_one(&sweeper, "cache", &dirs.cache, config.cache_max_age).await;
            }
        }
    }
}

async fn sweep_one(sweeper: &StorageSweeper, name: &str, dir: &Path, max_age: Duration) {
    let report = sweeper.sweep(dir, max_age).await;
    if report.removed > 0 {
        tracing::info!(
            dir = name,
            scanned = report.scanned,
            removed = report.removed,
            "Storage cleanup: removed stale files"
        );
    } else {
        tracing::debug!(dir = name, scanned = report.scanned, "Storage cleanup: nothing to remove");
    }
}
