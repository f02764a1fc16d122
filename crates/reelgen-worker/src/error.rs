//! Pipeline error types.

use reelgen_media::MediaError;
use reelgen_models::{JobState, MixPlanError, Stage};
use reelgen_providers::ProviderError;
use reelgen_storage::StorageError;
use std::time::Duration;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Non-2xx or transport failure, with the provider's own message.
    #[error("{provider} request failed: {message}")]
    ProviderRequest { provider: String, message: String },

    #[error("{provider} rate limit persisted after {attempts} attempts: {message}")]
    RateLimited {
        provider: String,
        attempts: u32,
        message: String,
    },

    #[error("{provider} job {state}: {message}")]
    JobFailed {
        provider: String,
        state: JobState,
        message: String,
    },

    #[error("{provider} job {job_id} timed out after {}s", elapsed.as_secs())]
    JobTimeout {
        provider: String,
        job_id: String,
        elapsed: Duration,
    },

    #[error("Asset resolution failed for {asset}: {reason}")]
    AssetResolution { asset: String, reason: String },

    #[error("Asset {0} is empty")]
    EmptyAsset(String),

    /// Encoder exited non-zero; `stderr` is the encoder's raw output.
    #[error("Encoding failed: {stderr}")]
    Encoding { stderr: String, exit_code: Option<i32> },

    /// Text model output was not a brief. Handled inside drafting.
    #[error("Brief could not be parsed: {0}")]
    BriefParse(String),

    #[error("Speech synthesis produced an empty voice track")]
    EmptyVoiceTrack,

    #[error("Run cancelled")]
    Cancelled,

    #[error("Invalid mix plan: {0}")]
    MixPlan(#[from] MixPlanError),

    #[error("Media error: {0}")]
    Media(MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn asset_resolution(asset: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AssetResolution {
            asset: asset.into(),
            reason: reason.into(),
        }
    }

    pub fn brief_parse(msg: impl Into<String>) -> Self {
        Self::BriefParse(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled)
    }

    /// Attach the stage this error came from.
    pub fn at(self, stage: Stage) -> RunError {
        RunError::new(stage, self)
    }
}

impl From<ProviderError> for PipelineError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Request {
                provider, message, ..
            }
            | ProviderError::InvalidResponse { provider, message } => {
                Self::ProviderRequest { provider, message }
            }
            // A single rate-limited call that escaped the poller's retry loop.
            ProviderError::RateLimited {
                provider, message, ..
            } => Self::RateLimited {
                provider,
                attempts: 1,
                message,
            },
            ProviderError::RateLimitExhausted {
                provider,
                attempts,
                message,
            } => Self::RateLimited {
                provider,
                attempts,
                message,
            },
            ProviderError::JobFailed {
                provider,
                state,
                message,
            } => Self::JobFailed {
                provider,
                state,
                message,
            },
            ProviderError::JobTimeout {
                provider,
                job_id,
                elapsed,
            } => Self::JobTimeout {
                provider,
                job_id,
                elapsed,
            },
            ProviderError::Cancelled => Self::Cancelled,
            ProviderError::Config(msg) => Self::Config(msg),
            ProviderError::Network(e) => Self::ProviderRequest {
                provider: e
                    .url()
                    .and_then(|u| u.host_str())
                    .unwrap_or("provider")
                    .to_string(),
                message: e.to_string(),
            },
            ProviderError::Json(e) => Self::ProviderRequest {
                provider: "provider".to_string(),
                message: format!("malformed response: {}", e),
            },
            ProviderError::Storage(e) => Self::Storage(e),
        }
    }
}

impl From<MediaError> for PipelineError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::FfmpegFailed { stderr, exit_code } => Self::Encoding { stderr, exit_code },
            MediaError::Cancelled => Self::Cancelled,
            MediaError::InvalidPlan(e) => Self::MixPlan(e),
            other => Self::Media(other),
        }
    }
}

/// A pipeline error tagged with the stage that raised it.
#[derive(Debug, Error)]
#[error("{} failed: {source}", .stage.label())]
pub struct RunError {
    pub stage: Stage,
    #[source]
    pub source: PipelineError,
}

impl RunError {
    pub fn new(stage: Stage, source: impl Into<PipelineError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.source.is_cancelled()
    }
}

/// Tag any convertible error with a stage.
pub trait StageExt<T> {
    fn stage(self, stage: Stage) -> Result<T, RunError>;
}

impl<T, E: Into<PipelineError>> StageExt<T> for Result<T, E> {
    fn stage(self, stage: Stage) -> Result<T, RunError> {
        self.map_err(|e| RunError::new(stage, e))
    }
}
