//! Provider error types.

use std::time::Duration;

use reelgen_models::JobState;
use reelgen_storage::StorageError;
use thiserror::Error;

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// Non-2xx response. `message` is the provider body, verbatim.
    #[error("{provider} returned {status}: {message}")]
    Request {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("{provider} rate limited the request: {message}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
        message: String,
    },

    #[error("{provider} still rate limited after {attempts} attempts: {message}")]
    RateLimitExhausted {
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

    #[error("{provider} job {job_id} did not finish within {elapsed:?}")]
    JobTimeout {
        provider: String,
        job_id: String,
        elapsed: Duration,
    },

    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse { provider: String, message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ProviderError {
    pub fn request(provider: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Request {
            provider: provider.into(),
            status,
            message: message.into(),
        }
    }

    pub fn rate_limited(
        provider: impl Into<String>,
        retry_after: Option<Duration>,
        message: impl Into<String>,
    ) -> Self {
        Self::RateLimited {
            provider: provider.into(),
            retry_after,
            message: message.into(),
        }
    }

    pub fn invalid_response(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for a single rate-limit response (not the exhausted form).
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimited { .. })
    }

    /// Provider-supplied retry hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
