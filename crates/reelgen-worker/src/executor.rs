//! Run registry.
//!
//! Accepts intents, bounds concurrent runs with a semaphore and keeps
//! status records queryable until they age out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use reelgen_models::{GenerationIntent, IntentError, RunId, RunStatus};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::logging::RunLogger;
use crate::metrics;
use crate::orchestrator::Orchestrator;
use crate::status::StatusHandle;

struct RunEntry {
    status: StatusHandle,
    cancel: watch::Sender<bool>,
}

/// In-memory registry of pipeline runs.
#[derive(Clone)]
pub struct RunRegistry {
    orchestrator: Arc<Orchestrator>,
    runs: Arc<RwLock<HashMap<RunId, RunEntry>>>,
    semaphore: Arc<Semaphore>,
    active: Arc<AtomicUsize>,
    retention: Duration,
}

impl RunRegistry {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        let config = orchestrator.config();
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_runs.max(1)));
        let retention = config.run_retention;
        Self {
            orchestrator,
            runs: Arc::new(RwLock::new(HashMap::new())),
            semaphore,
            active: Arc::new(AtomicUsize::new(0)),
            retention,
        }
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Validate the intent and start a run in the background.
    pub fn submit(&self, intent: GenerationIntent) -> Result<RunId, IntentError> {
        intent.validate()?;

        let run_id = RunId::new();
        let status = StatusHandle::new(run_id);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        if let Ok(mut runs) = self.runs.write() {
            runs.insert(
                run_id,
                RunEntry {
                    status: status.clone(),
                    cancel: cancel_tx,
                },
            );
        }

        info!(run_id = %run_id, "Run queued");
        let registry = self.clone();
        tokio::spawn(async move {
            registry.execute(run_id, intent, status, cancel_rx).await;
        });
        Ok(run_id)
    }

    async fn execute(
        &self,
        run_id: RunId,
        intent: GenerationIntent,
        status: StatusHandle,
        cancel: watch::Receiver<bool>,
    ) {
        let permit = tokio::select! {
            permit = Arc::clone(&self.semaphore).acquire_owned() => permit,
            _ = cancelled(cancel.clone()) => {
                debug!(run_id = %run_id, "Run cancelled while queued");
                return;
            }
        };
        let Ok(_permit) = permit else {
            status.fail(None, "Run registry is shutting down");
            return;
        };

        metrics::set_active_runs(self.active.fetch_add(1, Ordering::SeqCst) + 1);
        let started = Instant::now();
        let result = self.orchestrator.run(&run_id, &intent, &status, cancel).await;
        let flow = status
            .snapshot()
            .and_then(|s| s.flow)
            .map(|f| f.as_str())
            .unwrap_or("undecided");

        let outcome = match result {
            Ok(url) => {
                status.complete(&url);
                "succeeded"
            }
            Err(e) if e.is_cancelled() => {
                status.cancel();
                "cancelled"
            }
            Err(e) => {
                RunLogger::new(&run_id).log_error(e.stage, &e.to_string());
                status.fail(Some(e.stage), &e.to_string());
                "failed"
            }
        };
        metrics::record_run(outcome, flow, started.elapsed().as_secs_f64());
        metrics::set_active_runs(self.active.fetch_sub(1, Ordering::SeqCst).saturating_sub(1));
    }

    pub fn status(&self, run_id: &RunId) -> Option<RunStatus> {
        let runs = self.runs.read().ok()?;
        runs.get(run_id).and_then(|entry| entry.status.snapshot())
    }

    /// Request cancellation. Returns the updated status, or `None` for an
    /// unknown run.
    pub fn cancel(&self, run_id: &RunId) -> Option<RunStatus> {
        let runs = self.runs.read().ok()?;
        let entry = runs.get(run_id)?;
        if !entry.status.is_terminal() {
            info!(run_id = %run_id, "Cancelling run");
            entry.cancel.send_replace(true);
            entry.status.cancel();
        }
        entry.status.snapshot()
    }

    pub fn active_runs(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Drop finished runs older than the retention period.
    pub fn evict_expired(&self) -> usize {
        let Ok(retention) = chrono::Duration::from_std(self.retention) else {
            return 0;
        };
        let Ok(mut runs) = self.runs.write() else {
            return 0;
        };
        let before = runs.len();
        runs.retain(|_, entry| {
            entry
                .status
                .snapshot()
                .map(|s| !s.is_terminal() || s.age() < retention)
                .unwrap_or(false)
        });
        let evicted = before - runs.len();
        if evicted > 0 {
            debug!(evicted, "Evicted expired runs");
        }
        evicted
    }

    /// Periodically evict expired runs.
    pub fn spawn_reaper(&self, interval: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                registry.evict_expired();
            }
        })
    }
}

/// Resolves once the cancel flag is set.
async fn cancelled(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
