//! Provider and poller metrics.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const PROVIDER_SUBMITS_TOTAL: &str = "reelgen_provider_submits_total";
    pub const PROVIDER_POLLS_TOTAL: &str = "reelgen_provider_polls_total";
    pub const PROVIDER_RATE_LIMITED_TOTAL: &str = "reelgen_provider_rate_limited_total";
    pub const PROVIDER_JOBS_TOTAL: &str = "reelgen_provider_jobs_total";
    pub const PROVIDER_JOB_DURATION_SECONDS: &str = "reelgen_provider_job_duration_seconds";
    pub const PROVIDER_CANCELS_TOTAL: &str = "reelgen_provider_cancels_total";
}

/// Record an accepted submit.
pub fn record_submit(provider: &str) {
    let labels = [("provider", provider.to_string())];
    counter!(names::PROVIDER_SUBMITS_TOTAL, &labels).increment(1);
}

/// Record one status poll.
pub fn record_poll(provider: &str) {
    let labels = [("provider", provider.to_string())];
    counter!(names::PROVIDER_POLLS_TOTAL, &labels).increment(1);
}

/// Record a rate-limited response.
pub fn record_rate_limited(provider: &str) {
    let labels = [("provider", provider.to_string())];
    counter!(names::PROVIDER_RATE_LIMITED_TOTAL, &labels).increment(1);
}

/// Record a job outcome (`succeeded`, `failed`, `timeout`, `cancelled`, `error`).
pub fn record_job_outcome(provider: &str, outcome: &str, duration_secs: f64) {
    let labels = [
        ("provider", provider.to_string()),
        ("outcome", outcome.to_string()),
    ];
    counter!(names::PROVIDER_JOBS_TOTAL, &labels).increment(1);
    histogram!(names::PROVIDER_JOB_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record an upstream cancel request.
pub fn record_cancel(provider: &str, ok: bool) {
    let labels = [
        ("provider", provider.to_string()),
        ("ok", ok.to_string()),
    ];
    counter!(names::PROVIDER_CANCELS_TOTAL, &labels).increment(1);
}
