//! Shared data models for the reelgen pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Generation intents and persona references
//! - Creative briefs produced by the drafting stage
//! - Provider job handles and normalized job status
//! - Asset references exchanged between providers
//! - Mix plans consumed by the mixing engine
//! - Pipeline run status for polling

pub mod asset;
pub mod brief;
pub mod encoding;
pub mod intent;
pub mod job;
pub mod mix;
pub mod run;
pub mod style;

// Re-export common types
pub use asset::{AssetRef, MediaKind};
pub use brief::{CreativeBrief, FlowKind, VoiceCategory};
pub use encoding::EncodingConfig;
pub use intent::{GenerationIntent, IntentError, PersonaRef};
pub use job::{JobHandle, JobState, JobStatus};
pub use mix::{CaptionSpec, CtaSpec, MixGains, MixPlan, MixPlanError, OverlaySpec, TrackRole, TrackSpec};
pub use run::{RunId, RunPhase, RunStatus, Stage};
pub use style::{AspectRatio, AspectRatioParseError};
