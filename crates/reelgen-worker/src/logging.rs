//! Structured run logging utilities.

use reelgen_models::{RunId, Stage};
use tracing::{error, info, warn, Span};

/// Run logger for consistent lifecycle events.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
}

impl RunLogger {
    pub fn new(run_id: &RunId) -> Self {
        Self {
            run_id: run_id.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(run_id = %self.run_id, "Run started: {}", message);
    }

    pub fn log_stage(&self, stage: Stage, message: &str) {
        info!(run_id = %self.run_id, stage = %stage, "{}", message);
    }

    pub fn log_warning(&self, stage: Stage, message: &str) {
        warn!(run_id = %self.run_id, stage = %stage, "Run warning: {}", message);
    }

    pub fn log_error(&self, stage: Stage, message: &str) {
        error!(run_id = %self.run_id, stage = %stage, "Run error: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(run_id = %self.run_id, "Run completed: {}", message);
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Span that tags every event inside a run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("run", run_id = %self.run_id)
    }
}
