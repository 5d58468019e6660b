//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Number of trailing stderr lines kept in failure messages.
const STDERR_TAIL_LINES: usize = 12;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}{}", format_stderr(.stderr))]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}{}", format_stderr(.stderr))]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Could not determine duration of {0}")]
    DurationUnknown(PathBuf),

    #[error("Clips cannot be stream-copied together: {0}")]
    IncompatibleClips(String),

    #[error("Fade-out of {fade:.3}s does not fit in a {video:.3}s video")]
    FadeLongerThanVideo { video: f64, fade: f64 },

    #[error("Nothing to concatenate")]
    NoClips,

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid media file: {0}")]
    InvalidMedia(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Model(#[from] reel_models::ModelError),
}

fn format_stderr(stderr: &Option<String>) -> String {
    match stderr.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => {
            let lines: Vec<&str> = s.lines().collect();
            let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
            format!(": {}", lines[start..].join(" | "))
        }
        _ => String::new(),
    }
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an FFprobe failure error.
    pub fn ffprobe_failed(message: impl Into<String>, stderr: Option<String>) -> Self {
        Self::FfprobeFailed {
            message: message.into(),
            stderr,
        }
    }

    /// Create an invalid media error.
    pub fn invalid_media(message: impl Into<String>) -> Self {
        Self::InvalidMedia(message.into())
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Whether the media engine itself reported the failure.
    pub fn is_engine_failure(&self) -> bool {
        matches!(
            self,
            MediaError::FfmpegFailed { .. } | MediaError::FfprobeFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffmpeg_failure_includes_diagnostics() {
        let err = MediaError::ffmpeg_failed(
            "concat exited with status 1",
            Some("[concat @ 0x1] Stream 0 codec mismatch\nConversion failed!".to_string()),
            Some(1),
        );
        let msg = err.to_string();
        assert!(msg.contains("concat exited with status 1"));
        assert!(msg.contains("codec mismatch"));
        assert!(msg.contains("Conversion failed!"));
        assert!(err.is_engine_failure());
    }

    #[test]
    fn test_stderr_tail_is_bounded() {
        let stderr: String = (0..40).map(|i| format!("line {i}\n")).collect();
        let err = MediaError::ffmpeg_failed("failed", Some(stderr), Some(1));
        let msg = err.to_string();
        assert!(msg.contains("line 39"));
        assert!(!msg.contains("line 0 "));
    }

    #[test]
    fn test_empty_stderr_omitted() {
        let err = MediaError::ffmpeg_failed("failed", Some("  ".to_string()), None);
        assert_eq!(err.to_string(), "FFmpeg command failed: failed");
    }
}
