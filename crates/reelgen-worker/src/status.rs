//! Shared run status.

use std::sync::{Arc, RwLock};

use reelgen_models::{FlowKind, RunId, RunPhase, RunStatus, Stage};

/// Write side of one run's status, shared with the registry.
#[derive(Debug, Clone)]
pub struct StatusHandle {
    status: Arc<RwLock<RunStatus>>,
}

impl StatusHandle {
    pub fn new(run_id: RunId) -> Self {
        Self {
            status: Arc::new(RwLock::new(RunStatus::new(run_id))),
        }
    }

    fn update(&self, f: impl FnOnce(&mut RunStatus)) {
        if let Ok(mut status) = self.status.write() {
            f(&mut status);
        }
    }

    pub fn snapshot(&self) -> Option<RunStatus> {
        self.status.read().ok().map(|s| s.clone())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.read().map(|s| s.is_terminal()).unwrap_or(true)
    }

    pub fn phase(&self, phase: RunPhase, step: &str) {
        self.update(|s| {
            s.set_phase(phase);
            if !s.is_terminal() {
                s.set_step(step);
            }
        });
    }

    pub fn progress(&self, progress: u8, step: &str) {
        self.update(|s| {
            if !s.is_terminal() {
                s.set_progress(progress);
                s.set_step(step);
            }
        });
    }

    pub fn flow(&self, flow: FlowKind) {
        self.update(|s| s.flow = Some(flow));
    }

    pub fn complete(&self, video_url: &str) {
        self.update(|s| {
            if !s.is_terminal() {
                s.complete(video_url);
            }
        });
    }

    pub fn fail(&self, stage: Option<Stage>, error: &str) {
        self.update(|s| {
            if !s.is_terminal() {
                s.fail(stage, error);
            }
        });
    }

    pub fn cancel(&self) {
        self.update(RunStatus::cancel);
    }
}
