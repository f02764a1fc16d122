//! Pipeline metrics.

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const RUNS_TOTAL: &str = "reelgen_runs_total";
    pub const RUN_DURATION_SECONDS: &str = "reelgen_run_duration_seconds";
    pub const RUNS_ACTIVE: &str = "reelgen_runs_active";
    pub const STAGE_DURATION_SECONDS: &str = "reelgen_stage_duration_seconds";
    pub const BRIEF_FALLBACKS_TOTAL: &str = "reelgen_brief_fallbacks_total";
    pub const ASSET_UPLOADS_TOTAL: &str = "reelgen_asset_uploads_total";
}

/// Record a finished run (`done`, `failed`, `canceled`).
pub fn record_run(outcome: &str, flow: &str, duration_secs: f64) {
    let labels = [
        ("outcome", outcome.to_string()),
        ("flow", flow.to_string()),
    ];
    counter!(names::RUNS_TOTAL, &labels).increment(1);
    histogram!(names::RUN_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn set_active_runs(count: usize) {
    gauge!(names::RUNS_ACTIVE).set(count as f64);
}

pub fn record_stage(stage: &str, duration_secs: f64) {
    let labels = [("stage", stage.to_string())];
    histogram!(names::STAGE_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a heuristic brief (`unparseable`, `provider_error`).
pub fn record_brief_fallback(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::BRIEF_FALLBACKS_TOTAL, &labels).increment(1);
}

/// Record an asset rehost (`inline`, `local`, `loopback`).
pub fn record_upload(source: &str) {
    let labels = [("source", source.to_string())];
    counter!(names::ASSET_UPLOADS_TOTAL, &labels).increment(1);
}
