//! Whole-file JSON snapshot of the job collection.
//!
//! The snapshot is a pretty-printed JSON array of job records in creation
//! order. Writes go to a sibling `.tmp` file which is then renamed over the
//! snapshot, so a reader never observes a half-written file.

use std::io;
use std::path::{Path, PathBuf};

use lipsync_core::job::GenerationJob;

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Load the snapshot at `path`.
///
/// A missing file yields an empty collection. An unreadable or malformed file
/// is logged and also yields an empty collection.
pub async fn load(path: &Path) -> Vec<GenerationJob> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read job snapshot");
            return Vec::new();
        }
    };

    match serde_json::from_slice::<Vec<GenerationJob>>(&bytes) {
        Ok(jobs) => jobs,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Malformed job snapshot, starting empty");
            Vec::new()
        }
    }
}

/// Replace the snapshot at `path` with `jobs`.
pub async fn write(path: &Path, jobs: &[GenerationJob]) -> io::Result<()> {
    let json = serde_json::to_vec_pretty(jobs).map_err(io::Error::other)?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = temp_path(path);
    tokio::fs::write(&tmp, &json).await?;
    tokio::fs::rename(&tmp, path).await
}
