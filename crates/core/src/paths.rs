//! Data directory layout and small path helpers.

use std::path::{Path, PathBuf};

/// Snapshot file name inside `state/`.
pub const SNAPSHOT_FILE: &str = "jobs.json";

/// Working directories under the application data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDirs {
    pub base: PathBuf,
    pub logs: PathBuf,
    pub cache: PathBuf,
    pub state: PathBuf,
    pub uploads: PathBuf,
}

impl DataDirs {
    pub fn under(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        Self {
            logs: base.join("logs"),
            cache: base.join("cache"),
            state: base.join("state"),
            uploads: base.join("uploads"),
            base,
        }
    }

    /// Create every directory that does not exist yet.
    pub async fn ensure(&self) -> std::io::Result<()> {
        for dir in [&self.base, &self.logs, &self.cache, &self.state, &self.uploads] {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }

    pub fn snapshot_file(&self) -> PathBuf {
        self.state.join(SNAPSHOT_FILE)
    }
}

/// File name of a downloaded generation output.
pub fn output_file_name(job_id: &str) -> String {
    format!("{job_id}_output.mp4")
}

/// Content type for an upload, guessed from the file extension.
pub fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "aif" | "aiff" => "audio/aiff",
        "m4a" => "audio/mp4",
        "ogg" => "audio/ogg",
        _ => "application/octet-stream",
    }
}

/// Directory component macOS uses for short-lived files handed over by host
/// applications. Such files can vanish before an upload finishes.
pub const TEMPORARY_ITEMS_DIR: &str = "TemporaryItems";

/// Whether `path` lies inside a `TemporaryItems` directory.
pub fn is_temporary_item(path: &Path) -> bool {
    path.parent()
        .is_some_and(|dir| dir.components().any(|c| c.as_os_str() == TEMPORARY_ITEMS_DIR))
}

/// Copy a file living under `TemporaryItems` into `dir` and return the copy.
///
/// Any other path is returned unchanged. When the copy fails the original
/// path is returned and the failure is logged.
pub async fn stage_temporary_item(path: &Path, dir: &Path) -> PathBuf {
    if !is_temporary_item(path) {
        return path.to_path_buf();
    }
    let Some(name) = path.file_name() else {
        return path.to_path_buf();
    };
    let staged = dir.join(name);
    let copied = async {
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::copy(path, &staged).await
    };
    match copied.await {
        Ok(bytes) => {
            tracing::debug!(from = %path.display(), to = %staged.display(), bytes, "Staged temporary item");
            staged
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to stage temporary item");
            path.to_path_buf()
        }
    }
}

/// Whether `file` sits directly inside `dir`, resolving symlinks when both
/// paths exist.
pub fn is_directly_in(file: &Path, dir: &Path) -> bool {
    let Some(parent) = file.parent() else {
        return false;
    };
    match (std::fs::canonicalize(parent), std::fs::canonicalize(dir)) {
        (Ok(a), Ok(b)) => a == b,
        _ => parent == dir,
    }
}
