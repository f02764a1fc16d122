//! Pipeline run status for polling.
//!
//! A [`RunStatus`] is kept in memory by the run registry and returned by
//! the status endpoint. It carries the current [`RunPhase`], a monotonic
//! progress value and, on failure, the [`Stage`] that failed.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::FlowKind;

/// Identifier of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Coarse pipeline state reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    #[default]
    Queued,
    Drafting,
    /// Branch decided: speech-driven.
    Dialogue,
    /// Branch decided: ambience only.
    Ambience,
    Synthesizing,
    Mixing,
    Done,
    Failed,
    Canceled,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Queued => "queued",
            RunPhase::Drafting => "drafting",
            RunPhase::Dialogue => "dialogue",
            RunPhase::Ambience => "ambience",
            RunPhase::Synthesizing => "synthesizing",
            RunPhase::Mixing => "mixing",
            RunPhase::Done => "done",
            RunPhase::Failed => "failed",
            RunPhase::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Done | RunPhase::Failed | RunPhase::Canceled)
    }

    /// Progress reached when the phase is entered.
    pub fn progress_floor(&self) -> u8 {
        match self {
            RunPhase::Queued => 0,
            RunPhase::Drafting => 5,
            RunPhase::Dialogue | RunPhase::Ambience => 15,
            RunPhase::Synthesizing => 20,
            RunPhase::Mixing => 85,
            RunPhase::Done => 100,
            RunPhase::Failed | RunPhase::Canceled => 0,
        }
    }

    pub fn for_flow(flow: FlowKind) -> Self {
        match flow {
            FlowKind::Dialogue => RunPhase::Dialogue,
            FlowKind::Ambience => RunPhase::Ambience,
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pipeline stage that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Drafting,
    ImageSynthesis,
    FaceRestoration,
    SpeechSynthesis,
    AmbienceSynthesis,
    AssetResolution,
    VideoSynthesis,
    Mixing,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Drafting => "drafting",
            Stage::ImageSynthesis => "image_synthesis",
            Stage::FaceRestoration => "face_restoration",
            Stage::SpeechSynthesis => "speech_synthesis",
            Stage::AmbienceSynthesis => "ambience_synthesis",
            Stage::AssetResolution => "asset_resolution",
            Stage::VideoSynthesis => "video_synthesis",
            Stage::Mixing => "mixing",
        }
    }

    /// Human-readable label for status messages.
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Drafting => "Drafting",
            Stage::ImageSynthesis => "Image synthesis",
            Stage::FaceRestoration => "Face restoration",
            Stage::SpeechSynthesis => "Speech synthesis",
            Stage::AmbienceSynthesis => "Ambience synthesis",
            Stage::AssetResolution => "Asset resolution",
            Stage::VideoSynthesis => "Video synthesis",
            Stage::Mixing => "Mixing",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of one run, as returned by the status operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RunStatus {
    pub run_id: RunId,
    /// Current phase
    #[serde(rename = "status")]
    pub phase: RunPhase,
    /// Progress percentage (0-100), never decreases
    pub progress: u8,
    /// Chosen branch, once drafting finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<FlowKind>,
    /// Current processing step description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    /// Public URL of the final clip
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    /// Error detail if the run failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Stage that failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RunStatus {
    pub fn new(run_id: RunId) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            phase: RunPhase::Queued,
            progress: 0,
            flow: None,
            current_step: None,
            video_url: None,
            error: None,
            stage: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Enter a phase. Terminal runs are not reopened.
    pub fn set_phase(&mut self, phase: RunPhase) {
        if self.is_terminal() {
            return;
        }
        self.phase = phase;
        self.progress = self.progress.max(phase.progress_floor());
        self.updated_at = Utc::now();
    }

    /// Raise progress; lower values are ignored.
    pub fn set_progress(&mut self, progress: u8) {
        if self.is_terminal() {
            return;
        }
        self.progress = self.progress.max(progress.min(100));
        self.updated_at = Utc::now();
    }

    pub fn set_step(&mut self, step: impl Into<String>) {
        self.current_step = Some(step.into());
        self.updated_at = Utc::now();
    }

    /// Mark the run as done with its final video URL.
    pub fn complete(&mut self, video_url: impl Into<String>) {
        self.phase = RunPhase::Done;
        self.progress = 100;
        self.video_url = Some(video_url.into());
        self.current_step = Some("Complete".into());
        self.updated_at = Utc::now();
    }

    /// Mark the run as failed at `stage`.
    pub fn fail(&mut self, stage: Option<Stage>, error: impl Into<String>) {
        self.phase = RunPhase::Failed;
        self.stage = stage;
        self.error = Some(error.into());
        self.updated_at = Utc::now();
    }

    pub fn cancel(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.phase = RunPhase::Canceled;
        self.error = Some("Run was canceled".into());
        self.updated_at = Utc::now();
    }

    /// Age of the record since its last update.
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_round_trip() {
        let id = RunId::new();
        let parsed: RunId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<RunId>().is_err());
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut status = RunStatus::new(RunId::new());
        status.set_phase(RunPhase::Drafting);
        status.set_progress(40);
        status.set_phase(RunPhase::Synthesizing);
        assert_eq!(status.progress, 40);
        status.set_progress(10);
        assert_eq!(status.progress, 40);
        status.set_phase(RunPhase::Mixing);
        assert_eq!(status.progress, 85);
    }

    #[test]
    fn test_terminal_status_is_sticky() {
        let mut status = RunStatus::new(RunId::new());
        status.fail(Some(Stage::VideoSynthesis), "job failed");
        status.set_phase(RunPhase::Mixing);
        status.cancel();
        assert_eq!(status.phase, RunPhase::Failed);
        assert_eq!(status.stage, Some(Stage::VideoSynthesis));
    }

    #[test]
    fn test_status_serialization() {
        let mut status = RunStatus::new(RunId::new());
        status.complete("https://cdn.example.com/videos/a.mp4");
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "done");
        assert_eq!(json["progress"], 100);
        assert_eq!(json["video_url"], "https://cdn.example.com/videos/a.mp4");
        assert!(json.get("error").is_none());
    }
}
