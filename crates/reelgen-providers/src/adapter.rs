//! Uniform provider contract.

use async_trait::async_trait;
use reelgen_models::{AssetRef, JobHandle, JobStatus};

use crate::error::{ProviderError, ProviderResult};

/// Outcome of a submit call.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Job accepted; poll the handle until it reaches a terminal state.
    Queued(JobHandle),
    /// Synchronous provider: the result is already available.
    Completed(AssetRef),
}

/// One external generation capability.
///
/// Synchronous providers return [`Submission::Completed`] from `submit` and
/// report every handle as succeeded, so callers never need to know which
/// kind of provider they are talking to.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Capability-specific request parameters.
    type Params: Send + Sync;

    /// Adapter name used in handles, logs and metrics.
    fn name(&self) -> &str;

    async fn submit(&self, params: &Self::Params) -> ProviderResult<Submission>;

    async fn poll(&self, handle: &JobHandle) -> ProviderResult<JobStatus>;

    async fn fetch_result(&self, handle: &JobHandle) -> ProviderResult<AssetRef>;

    /// Whether [`ProviderAdapter::cancel`] reaches the provider.
    fn supports_cancel(&self) -> bool {
        false
    }

    /// Best-effort upstream cancellation.
    async fn cancel(&self, _handle: &JobHandle) -> ProviderResult<()> {
        Ok(())
    }
}

/// `fetch_result` for adapters that never hand out job handles.
pub(crate) fn no_job_results(provider: &str, handle: &JobHandle) -> ProviderError {
    ProviderError::invalid_response(
        provider,
        format!("synchronous provider has no job {}", handle.id),
    )
}
