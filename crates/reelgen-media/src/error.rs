//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    /// Encoder exited non-zero. `stderr` is the encoder's own output, untouched.
    #[error("FFmpeg command failed ({}): {stderr}", describe_exit(.exit_code))]
    FfmpegFailed {
        stderr: String,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {stderr}")]
    FfprobeFailed { stderr: String },

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

    #[error("Invalid mix plan: {0}")]
    InvalidPlan(#[from] reelgen_models::MixPlanError),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "killed by signal".to_string(),
    }
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(stderr: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self::FfmpegFailed {
            stderr: stderr.into(),
            exit_code,
        }
    }

    /// Create an invalid media error.
    pub fn invalid_media(message: impl Into<String>) -> Self {
        Self::InvalidMedia(message.into())
    }

    /// Raw encoder diagnostic, when this error came from the encoder.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::FfmpegFailed { stderr, .. } | Self::FfprobeFailed { stderr } => Some(stderr),
            _ => None,
        }
    }
}
