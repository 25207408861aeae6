//! Source normalization ahead of upload.
//!
//! Legacy AIFF audio is decoded in-process; every other conversion goes
//! through the [`Transcoder`]. Converted files are written next to the
//! source as `convert_<millis>_<rand>.<ext>`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::Rng;

use crate::aiff;
use crate::error::CoreError;
use crate::ffmpeg::{TargetFormat, Transcoder};

/// Result of a normalization step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub path: PathBuf,
    /// `true` when `path` is a new file owned by the caller.
    pub created: bool,
}

impl Normalized {
    fn unchanged(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            created: false,
        }
    }

    fn created(path: PathBuf) -> Self {
        Self {
            path,
            created: true,
        }
    }
}

/// Lower-cased extension of `path`, empty when there is none.
fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// Scratch file path next to `src` for a conversion output.
pub fn scratch_path(src: &Path, ext: &str) -> PathBuf {
    let dir = src.parent().unwrap_or_else(|| Path::new("."));
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: u32 = rand::rng().random_range(0..10_000);
    dir.join(format!("convert_{millis}_{suffix}.{ext}"))
}

/// Video containers audio can be extracted from.
pub const EXTRACTABLE_VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm"];

/// Converts caller-supplied media into formats the remote service accepts.
#[derive(Clone)]
pub struct SourceNormalizer {
    transcoder: Arc<dyn Transcoder>,
}

impl SourceNormalizer {
    pub fn new(transcoder: Arc<dyn Transcoder>) -> Self {
        Self { transcoder }
    }

    /// Convert an audio file to `target` (`Wav` or `Mp3`).
    ///
    /// A source already in the target format is returned unchanged.
    pub async fn convert_audio(
        &self,
        src: &Path,
        target: TargetFormat,
    ) -> Result<Normalized, CoreError> {
        let ext = extension(src);
        let legacy = aiff::is_legacy_container(src);

        match target {
            TargetFormat::Wav if ext == "wav" => Ok(Normalized::unchanged(src)),
            TargetFormat::Wav if legacy => {
                let dest = scratch_path(src, "wav");
                aiff::convert_aiff_to_wav(src, &dest).await?;
                Ok(Normalized::created(dest))
            }
            TargetFormat::Mp3 if ext == "mp3" => Ok(Normalized::unchanged(src)),
            TargetFormat::Mp3 if legacy => {
                let intermediate = scratch_path(src, "wav");
                aiff::convert_aiff_to_wav(src, &intermediate).await?;
                let dest = scratch_path(src, "mp3");
                let result = self
                    .transcoder
                    .transcode(&intermediate, TargetFormat::Mp3, &dest)
                    .await;
                let _ = tokio::fs::remove_file(&intermediate).await;
                result?;
                Ok(Normalized::created(dest))
            }
            TargetFormat::Wav | TargetFormat::Mp3 => {
                let dest = scratch_path(src, target.extension());
                self.transcoder.transcode(src, target, &dest).await?;
                Ok(Normalized::created(dest))
            }
            TargetFormat::Mp4 => Err(CoreError::Validation(format!(
                "Unsupported audio target format: {}",
                target.extension()
            ))),
        }
    }

    /// Decode legacy-container audio to WAV before upload.
    ///
    /// Falls back to the original file, with a warning, when decoding fails.
    pub async fn normalize_audio(&self, src: &Path) -> Normalized {
        if !aiff::is_legacy_container(src) {
            return Normalized::unchanged(src);
        }
        match self.convert_audio(src, TargetFormat::Wav).await {
            Ok(normalized) => {
                tracing::info!(
                    src = %src.display(),
                    dest = %normalized.path.display(),
                    "Normalized AIFF audio to WAV",
                );
                normalized
            }
            Err(e) => {
                tracing::warn!(
                    src = %src.display(),
                    error = %e,
                    "AIFF normalization failed, uploading original",
                );
                Normalized::unchanged(src)
            }
        }
    }

    /// Pull the audio track out of `video` into `<out_dir>/<stem>.<ext>`.
    ///
    /// Only MP4, MOV and WebM sources are accepted, and only `Wav` or `Mp3`
    /// targets.
    pub async fn extract_audio(
        &self,
        video: &Path,
        target: TargetFormat,
        out_dir: &Path,
    ) -> Result<PathBuf, CoreError> {
        let ext = extension(video);
        if !EXTRACTABLE_VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            return Err(CoreError::Validation(format!(
                "Unsupported video format '.{ext}', expected mp4, mov or webm"
            )));
        }
        if target == TargetFormat::Mp4 {
            return Err(CoreError::Validation(
                "Audio can only be extracted as wav or mp3".into(),
            ));
        }
        let stem = video
            .file_stem()
            .ok_or_else(|| CoreError::Validation(format!("no file name in {}", video.display())))?;

        let mut name = stem.to_os_string();
        name.push(".");
        name.push(target.extension());
        let dest = out_dir.join(name);

        tokio::fs::create_dir_all(out_dir).await?;
        self.transcoder.transcode(video, target, &dest).await?;
        tracing::info!(src = %video.display(), dest = %dest.display(), "Extracted audio track");
        Ok(dest)
    }

    /// Transcode `.webm` video to MP4; other containers pass through.
    pub async fn normalize_video(&self, src: &Path) -> Result<Normalized, CoreError> {
        if extension(src) != "webm" {
            return Ok(Normalized::unchanged(src));
        }
        let dest = scratch_path(src, TargetFormat::Mp4.extension());
        self.transcoder
            .transcode(src, TargetFormat::Mp4, &dest)
            .await?;
        tracing::info!(src = %src.display(), dest = %dest.display(), "Transcoded WebM video to MP4");
        Ok(Normalized::created(dest))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
