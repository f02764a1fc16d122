//! Encoder metrics.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const MIX_TOTAL: &str = "reelgen_mix_total";
    pub const MIX_DURATION_SECONDS: &str = "reelgen_mix_duration_seconds";
    pub const MIX_OUTPUT_SECONDS: &str = "reelgen_mix_output_seconds";
}

/// Record one mixing call (`success`, `failed`, `cancelled`, `timeout`).
pub fn record_mix(flow: &str, outcome: &str, elapsed_secs: f64) {
    let labels = [
        ("flow", flow.to_string()),
        ("outcome", outcome.to_string()),
    ];
    counter!(names::MIX_TOTAL, &labels).increment(1);
    histogram!(names::MIX_DURATION_SECONDS, &labels).record(elapsed_secs);
}

/// Record the media duration of a finished mix.
pub fn record_output_duration(flow: &str, seconds: f64) {
    let labels = [("flow", flow.to_string())];
    histogram!(names::MIX_OUTPUT_SECONDS, &labels).record(seconds);
}
