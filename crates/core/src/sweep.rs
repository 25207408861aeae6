//! Age-based deletion of scratch files.
//!
//! Only regular files directly inside the swept directory are considered.
//! Files vanishing mid-sweep (deleted by a job or another sweep) are ignored.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

/// Files handled between cooperative yields.
const SWEEP_BATCH_SIZE: usize = 10;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Regular files inspected.
    pub scanned: usize,
    pub removed: usize,
    /// The directory was already being swept.
    pub skipped: bool,
}

/// Sweeps directories, at most once concurrently per directory.
#[derive(Debug, Clone, Default)]
pub struct StorageSweeper {
    active: Arc<Mutex<HashSet<PathBuf>>>,
}

/// Marks a directory as being swept until dropped.
struct ActiveSweep {
    active: Arc<Mutex<HashSet<PathBuf>>>,
    dir: PathBuf,
}

impl Drop for ActiveSweep {
    fn drop(&mut self) {
        if let Ok(mut active) = self.active.lock() {
            active.remove(&self.dir);
        }
    }
}

impl StorageSweeper {
    pub fn new() -> Self {
        Self::default()
    }

    fn begin(&self, dir: &Path) -> Option<ActiveSweep> {
        let mut active = self.active.lock().ok()?;
        if !active.insert(dir.to_path_buf()) {
            return None;
        }
        Some(ActiveSweep {
            active: Arc::clone(&self.active),
            dir: dir.to_path_buf(),
        })
    }

    /// Delete files in `dir` whose modification time is older than `max_age`.
    pub async fn sweep(&self, dir: &Path, max_age: Duration) -> SweepReport {
        let Some(_active) = self.begin(dir) else {
            tracing::debug!(dir = %dir.display(), "Sweep already running, skipping");
            return SweepReport {
                skipped: true,
                ..SweepReport::default()
            };
        };

        let report = sweep_directory(dir, max_age).await;
        if report.removed > 0 {
            tracing::info!(
                dir = %dir.display(),
                scanned = report.scanned,
                removed = report.removed,
                "Storage sweep complete",
            );
        }
        report
    }
}

async fn sweep_directory(dir: &Path, max_age: Duration) -> SweepReport {
    let mut report = SweepReport::default();

    match tokio::fs::metadata(dir).await {
        Ok(meta) if meta.is_dir() => {}
        _ => {
            tracing::debug!(dir = %dir.display(), "Sweep target missing or not a directory");
            return report;
        }
    }

    let mut entries = Vec::new();
    let mut reader = match tokio::fs::read_dir(dir).await {
        Ok(reader) => reader,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "Failed to list sweep target");
            return report;
        }
    };
    loop {
        match reader.next_entry().await {
            Ok(Some(entry)) => entries.push(entry.path()),
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "Failed to read directory entry");
                break;
            }
        }
    }

    let now = SystemTime::now();
    for batch in entries.chunks(SWEEP_BATCH_SIZE) {
        for path in batch {
            match sweep_entry(path, now, max_age).await {
                Ok(EntryOutcome::Removed) => {
                    report.scanned += 1;
                    report.removed += 1;
                }
                Ok(EntryOutcome::Kept) => report.scanned += 1,
                Ok(EntryOutcome::Ignored) => {}
                Err(e) => {
                    report.scanned += 1;
                    tracing::warn!(path = %path.display(), error = %e, "Failed to sweep file");
                }
            }
        }
        tokio::task::yield_now().await;
    }

    report
}

enum EntryOutcome {
    Removed,
    Kept,
    /// Not a regular file, or already gone.
    Ignored,
}

async fn sweep_entry(
    path: &Path,
    now: SystemTime,
    max_age: Duration,
) -> std::io::Result<EntryOutcome> {
    let meta = match tokio::fs::symlink_metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(EntryOutcome::Ignored),
        Err(e) => return Err(e),
    };
    if !meta.is_file() {
        return Ok(EntryOutcome::Ignored);
    }

    let age = now
        .duration_since(meta.modified()?)
        .unwrap_or(Duration::ZERO);
    if age <= max_age {
        return Ok(EntryOutcome::Kept);
    }

    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!(
                path = %path.display(),
                age_secs = age.as_secs(),
                "Removed aged file",
            );
            Ok(EntryOutcome::Removed)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(EntryOutcome::Ignored),
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
