//! FFmpeg transcoding seam.
//!
//! Everything that is not an AIFF→WAV conversion is delegated to an external
//! `ffmpeg` binary behind the [`Transcoder`] trait, so tests can substitute a
//! fake.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::CoreError;

/// Error type for FFmpeg operations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("source file not found: {0}")]
    SourceNotFound(String),
}

impl From<FfmpegError> for CoreError {
    fn from(err: FfmpegError) -> Self {
        match err {
            FfmpegError::SourceNotFound(path) => CoreError::NotFound {
                entity: "Source file",
                id: path,
            },
            FfmpegError::IoError(e) => CoreError::Io(e),
            other => CoreError::Io(std::io::Error::other(other.to_string())),
        }
    }
}

/// Output container produced by a transcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    /// 16-bit little-endian PCM, 44.1 kHz mono.
    Wav,
    /// libmp3lame at 192 kbit/s, 44.1 kHz.
    Mp3,
    /// libx264 + AAC, preset `fast`, CRF 23.
    Mp4,
}

impl TargetFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::Mp4 => "mp4",
        }
    }

    /// Codec arguments placed between the input and the output path.
    fn codec_args(self) -> &'static [&'static str] {
        match self {
            Self::Wav => &["-vn", "-acodec", "pcm_s16le", "-ar", "44100", "-ac", "1"],
            Self::Mp3 => &["-vn", "-acodec", "libmp3lame", "-b:a", "192k", "-ar", "44100"],
            Self::Mp4 => &[
                "-vcodec", "libx264", "-acodec", "aac", "-preset", "fast", "-crf", "23",
            ],
        }
    }
}

/// Converts a media file into another container.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(
        &self,
        src: &Path,
        target: TargetFormat,
        dest: &Path,
    ) -> Result<(), FfmpegError>;
}

/// [`Transcoder`] backed by the `ffmpeg` command-line tool.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        src: &Path,
        target: TargetFormat,
        dest: &Path,
    ) -> Result<(), FfmpegError> {
        if !tokio::fs::try_exists(src).await.unwrap_or(false) {
            return Err(FfmpegError::SourceNotFound(src.display().to_string()));
        }

        tracing::debug!(
            src = %src.display(),
            dest = %dest.display(),
            target = target.extension(),
            "Running ffmpeg",
        );

        let output = tokio::process::Command::new(&self.binary)
            .args(["-y", "-hide_banner", "-loglevel", "error", "-i"])
            .arg(src)
            .args(target.codec_args())
            .arg(dest)
            .output()
            .await
            .map_err(FfmpegError::NotFound)?;

        if !output.status.success() {
            let _ = tokio::fs::remove_file(dest).await;
            return Err(FfmpegError::ExecutionFailed {
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
