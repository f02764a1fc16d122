//! Async job poller.
//!
//! Submits a job, polls it at a fixed interval until it reaches a terminal
//! state and fetches the result. Rate-limited submits are retried with the
//! provider's `Retry-After` hint (or a fixed backoff) up to a bounded
//! number of attempts. Jobs that outlive `max_duration`, including a
//! status check that never answers, get a best-effort upstream cancel
//! that is never awaited.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reelgen_models::{AssetRef, JobHandle, JobState};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::adapter::{ProviderAdapter, Submission};
use crate::error::{ProviderError, ProviderResult};
use crate::metrics;

// =============================================================================
// Configuration
// =============================================================================

/// Default delay between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
/// Default backoff after a rate-limited submit without a retry hint.
pub const DEFAULT_RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(10);
/// Default total submit attempts while rate limited.
pub const DEFAULT_RATE_LIMIT_ATTEMPTS: u32 = 5;

/// Polling policy for one job.
#[derive(Debug, Clone, PartialEq)]
pub struct PollOptions {
    /// Delay before each poll
    pub interval: Duration,
    /// Give up (and cancel upstream) after this long
    pub max_duration: Duration,
    /// Backoff used when a rate-limited response carries no hint
    pub rate_limit_backoff: Duration,
    /// Total submit attempts before raising `RateLimitExhausted`
    pub rate_limit_max_attempts: u32,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self::for_video()
    }
}

impl PollOptions {
    pub fn new(interval: Duration, max_duration: Duration) -> Self {
        Self {
            interval,
            max_duration,
            rate_limit_backoff: DEFAULT_RATE_LIMIT_BACKOFF,
            rate_limit_max_attempts: DEFAULT_RATE_LIMIT_ATTEMPTS,
        }
    }

    /// Video jobs: 3 s interval, 10 min budget.
    pub fn for_video() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, Duration::from_secs(10 * 60))
    }

    /// Image and restoration jobs: 3 s interval, 5 min budget.
    pub fn for_image() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, Duration::from_secs(5 * 60))
    }

    pub fn with_rate_limit(mut self, backoff: Duration, max_attempts: u32) -> Self {
        self.rate_limit_backoff = backoff;
        self.rate_limit_max_attempts = max_attempts;
        self
    }

    /// Override defaults from `{PREFIX}_POLL_INTERVAL_MS`, `{PREFIX}_MAX_DURATION_SECS`,
    /// `RATE_LIMIT_BACKOFF_SECS` and `RATE_LIMIT_MAX_ATTEMPTS`.
    pub fn from_env(prefix: &str, defaults: PollOptions) -> Self {
        let read = |key: String| -> Option<u64> {
            std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
        };

        Self {
            interval: read(format!("{}_POLL_INTERVAL_MS", prefix))
                .map(Duration::from_millis)
                .unwrap_or(defaults.interval),
            max_duration: read(format!("{}_MAX_DURATION_SECS", prefix))
                .map(Duration::from_secs)
                .unwrap_or(defaults.max_duration),
            rate_limit_backoff: read("RATE_LIMIT_BACKOFF_SECS".to_string())
                .map(Duration::from_secs)
                .unwrap_or(defaults.rate_limit_backoff),
            rate_limit_max_attempts: read("RATE_LIMIT_MAX_ATTEMPTS".to_string())
                .map(|n| n as u32)
                .unwrap_or(defaults.rate_limit_max_attempts),
        }
    }
}

// =============================================================================
// Poller
// =============================================================================

/// Drives provider jobs to completion. One poller is scoped to one run.
#[derive(Clone, Default)]
pub struct JobPoller {
    cancel: Option<watch::Receiver<bool>>,
    in_flight: Arc<Mutex<HashSet<JobHandle>>>,
}

impl JobPoller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort waits (and cancel upstream) once `cancel` flips to `true`.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Jobs submitted but not yet terminal.
    pub fn in_flight(&self) -> Vec<JobHandle> {
        self.in_flight
            .lock()
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Submit, poll until terminal, fetch the result.
    pub async fn run_to_completion<A>(
        &self,
        adapter: Arc<A>,
        params: &A::Params,
        options: &PollOptions,
    ) -> ProviderResult<AssetRef>
    where
        A: ProviderAdapter + ?Sized + 'static,
    {
        let started = Instant::now();
        let handle = match self.submit_with_backoff(adapter.as_ref(), params, options).await? {
            Submission::Completed(asset) => {
                debug!(provider = %adapter.name(), "Provider answered synchronously");
                return Ok(asset);
            }
            Submission::Queued(handle) => handle,
        };

        info!(provider = %handle.provider, job_id = %handle.id, "Job submitted");
        self.track(&handle);
        let result = self.wait_for(&adapter, &handle, options, started).await;
        self.untrack(&handle);

        let outcome = match &result {
            Ok(_) => "succeeded",
            Err(ProviderError::JobFailed { .. }) => "failed",
            Err(ProviderError::JobTimeout { .. }) => "timeout",
            Err(ProviderError::Cancelled) => "cancelled",
            Err(_) => "error",
        };
        metrics::record_job_outcome(&handle.provider, outcome, started.elapsed().as_secs_f64());

        result
    }

    /// Submit, retrying only on rate-limit responses.
    async fn submit_with_backoff<A>(
        &self,
        adapter: &A,
        params: &A::Params,
        options: &PollOptions,
    ) -> ProviderResult<Submission>
    where
        A: ProviderAdapter + ?Sized,
    {
        let max_attempts = options.rate_limit_max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            if self.is_cancelled() {
                return Err(ProviderError::Cancelled);
            }

            match adapter.submit(params).await {
                Ok(submission) => return Ok(submission),
                Err(ProviderError::RateLimited {
                    provider,
                    retry_after,
                    message,
                }) => {
                    metrics::record_rate_limited(&provider);

                    if attempt >= max_attempts {
                        warn!(
                            provider = %provider,
                            attempts = attempt,
                            "Rate limit retries exhausted"
                        );
                        return Err(ProviderError::RateLimitExhausted {
                            provider,
                            attempts: attempt,
                            message,
                        });
                    }

                    let delay = retry_after.unwrap_or(options.rate_limit_backoff);
                    warn!(
                        provider = %provider,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Submit rate limited, backing off: {}",
                        message
                    );
                    self.sleep_or_cancel(delay).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn wait_for<A>(
        &self,
        adapter: &Arc<A>,
        handle: &JobHandle,
        options: &PollOptions,
        started: Instant,
    ) -> ProviderResult<AssetRef>
    where
        A: ProviderAdapter + ?Sized + 'static,
    {
        let mut polls: u32 = 0;

        loop {
            if let Err(e) = self.sleep_or_cancel(options.interval).await {
                info!(provider = %handle.provider, job_id = %handle.id, "Run cancelled while polling");
                spawn_cancel(Arc::clone(adapter), handle.clone());
                return Err(e);
            }

            polls += 1;
            metrics::record_poll(&handle.provider);

            let remaining = options.max_duration.saturating_sub(started.elapsed());
            let polled = match tokio::time::timeout(remaining, adapter.poll(handle)).await {
                Ok(polled) => polled,
                Err(_) => return Err(time_out(adapter, handle, polls, started)),
            };

            match polled {
                Ok(status) => {
                    debug!(
                        provider = %handle.provider,
                        job_id = %handle.id,
                        state = %status.state,
                        progress = ?status.progress,
                        polls,
                        "Polled job"
                    );
                    match status.state {
                        JobState::Succeeded => return adapter.fetch_result(handle).await,
                        JobState::Failed | JobState::Canceled => {
                            let message = status
                                .error
                                .unwrap_or_else(|| "provider reported no error detail".to_string());
                            warn!(
                                provider = %handle.provider,
                                job_id = %handle.id,
                                state = %status.state,
                                "Job ended without a result: {}",
                                message
                            );
                            return Err(ProviderError::JobFailed {
                                provider: handle.provider.clone(),
                                state: status.state,
                                message,
                            });
                        }
                        JobState::Pending | JobState::Running => {}
                    }
                }
                // A throttled status check is not a job failure
                Err(ProviderError::RateLimited { message, .. }) => {
                    metrics::record_rate_limited(&handle.provider);
                    warn!(provider = %handle.provider, job_id = %handle.id, "Poll rate limited: {}", message);
                }
                Err(e) => return Err(e),
            }

            if started.elapsed() >= options.max_duration {
                return Err(time_out(adapter, handle, polls, started));
            }
        }
    }

    /// Sleep for `duration`, returning `Cancelled` early if the run is cancelled.
    async fn sleep_or_cancel(&self, duration: Duration) -> ProviderResult<()> {
        let Some(cancel) = &self.cancel else {
            tokio::time::sleep(duration).await;
            return Ok(());
        };

        let mut cancel = cancel.clone();
        if *cancel.borrow_and_update() {
            return Err(ProviderError::Cancelled);
        }

        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return Ok(()),
                changed = cancel.changed() => match changed {
                    Ok(()) if *cancel.borrow_and_update() => return Err(ProviderError::Cancelled),
                    Ok(()) => {}
                    // Sender gone: nobody can cancel any more
                    Err(_) => {
                        (&mut sleep).await;
                        return Ok(());
                    }
                },
            }
        }
    }

    fn track(&self, handle: &JobHandle) {
        if let Ok(mut set) = self.in_flight.lock() {
            set.insert(handle.clone());
        }
    }

    fn untrack(&self, handle: &JobHandle) {
        if let Ok(mut set) = self.in_flight.lock() {
            set.remove(handle);
        }
    }
}

/// Give up on a job that outlived its budget.
fn time_out<A>(adapter: &Arc<A>, handle: &JobHandle, polls: u32, started: Instant) -> ProviderError
where
    A: ProviderAdapter + ?Sized + 'static,
{
    let elapsed = started.elapsed();
    warn!(
        provider = %handle.provider,
        job_id = %handle.id,
        polls,
        elapsed_ms = elapsed.as_millis() as u64,
        "Job exceeded max duration"
    );
    spawn_cancel(Arc::clone(adapter), handle.clone());
    ProviderError::JobTimeout {
        provider: handle.provider.clone(),
        job_id: handle.id.clone(),
        elapsed,
    }
}

/// Fire-and-forget upstream cancel.
fn spawn_cancel<A>(adapter: Arc<A>, handle: JobHandle)
where
    A: ProviderAdapter + ?Sized + 'static,
{
    if !adapter.supports_cancel() {
        return;
    }
    tokio::spawn(async move {
        match adapter.cancel(&handle).await {
            Ok(()) => {
                metrics::record_cancel(&handle.provider, true);
                info!(provider = %handle.provider, job_id = %handle.id, "Cancelled upstream job");
            }
            Err(e) => {
                metrics::record_cancel(&handle.provider, false);
                warn!(provider = %handle.provider, job_id = %handle.id, error = %e, "Upstream cancel failed");
            }
        }
    });
}

// =============================================================================
// Tests
// =============================================================================
