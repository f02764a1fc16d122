//! Provider status vocabularies.
//!
//! Each provider family gets one table mapping its native status strings
//! to [`JobState`]. Adding a provider means adding a table here; the
//! poller only ever sees [`JobState`].

use reelgen_models::JobState;

/// Native status string to [`JobState`] mapping for one provider family.
#[derive(Debug, Clone, Copy)]
pub struct StatusTable {
    family: &'static str,
    entries: &'static [(&'static str, JobState)],
}

impl StatusTable {
    pub const fn new(family: &'static str, entries: &'static [(&'static str, JobState)]) -> Self {
        Self { family, entries }
    }

    pub fn family(&self) -> &'static str {
        self.family
    }

    /// Case-insensitive lookup.
    pub fn lookup(&self, native: &str) -> Option<JobState> {
        let native = native.trim();
        self.entries
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(native))
            .map(|(_, state)| *state)
    }

    /// Map a native status, treating unknown values as still pending.
    pub fn map(&self, native: &str) -> JobState {
        self.lookup(native).unwrap_or_else(|| {
            tracing::warn!(
                family = self.family,
                status = %native,
                "Unknown provider status, treating as pending"
            );
            JobState::Pending
        })
    }
}

/// Prediction-style APIs (`starting` / `processing` / `succeeded`).
pub const PREDICTION_STATUSES: StatusTable = StatusTable::new(
    "predictions",
    &[
        ("starting", JobState::Pending),
        ("queued", JobState::Pending),
        ("processing", JobState::Running),
        ("succeeded", JobState::Succeeded),
        ("successful", JobState::Succeeded),
        ("failed", JobState::Failed),
        ("canceled", JobState::Canceled),
        ("cancelled", JobState::Canceled),
        ("aborted", JobState::Canceled),
    ],
);

/// Queue-style APIs (`IN_QUEUE` / `IN_PROGRESS` / `COMPLETED`).
pub const QUEUE_STATUSES: StatusTable = StatusTable::new(
    "queue",
    &[
        ("IN_QUEUE", JobState::Pending),
        ("IN_PROGRESS", JobState::Running),
        ("COMPLETED", JobState::Succeeded),
        ("OK", JobState::Succeeded),
        ("FAILED", JobState::Failed),
        ("ERROR", JobState::Failed),
        ("CANCELLED", JobState::Canceled),
        ("CANCELED", JobState::Canceled),
    ],
);
