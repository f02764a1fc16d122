//! Final composition plan.
//!
//! A [`MixPlan`] is built once per run from the brief and the resolved
//! intermediate assets, then handed by value to the mixing engine.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{AspectRatio, FlowKind};

/// Default gain applied to the voice track.
pub const DEFAULT_VOICE_GAIN: f32 = 1.0;
/// Default gain applied to the ambience bed.
pub const DEFAULT_BED_GAIN: f32 = 0.6;
/// Default level the ambience bed drops to while speech is present.
pub const DEFAULT_DUCKED_GAIN: f32 = 0.2;
/// Default gain for the synthesized video's own audio (0 disables it).
pub const DEFAULT_VIDEO_AUDIO_GAIN: f32 = 0.0;
/// Default words per caption chunk.
pub const DEFAULT_WORDS_PER_CHUNK: usize = 4;
/// Seconds the call-to-action banner stays on screen at the end of the clip.
pub const DEFAULT_CTA_SECONDS: f64 = 2.5;

/// Relative track levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MixGains {
    pub voice: f32,
    pub bed: f32,
    pub ducked: f32,
    pub video_audio: f32,
}

impl Default for MixGains {
    fn default() -> Self {
        Self {
            voice: DEFAULT_VOICE_GAIN,
            bed: DEFAULT_BED_GAIN,
            ducked: DEFAULT_DUCKED_GAIN,
            video_audio: DEFAULT_VIDEO_AUDIO_GAIN,
        }
    }
}

/// Role an audio track plays in the mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrackRole {
    Voice,
    Ambience,
    /// The audio stream embedded in the source video.
    VideoAudio,
}

impl TrackRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackRole::Voice => "voice",
            TrackRole::Ambience => "ambience",
            TrackRole::VideoAudio => "video_audio",
        }
    }
}

/// One audio track in the mix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrackSpec {
    pub role: TrackRole,
    /// Encoder input (local path). Empty for [`TrackRole::VideoAudio`].
    pub source: String,
    pub gain: f32,
}

/// Image composited over the video at a fixed corner offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OverlaySpec {
    pub source: String,
    /// Horizontal offset from the right edge (pixels).
    pub offset_x: u32,
    /// Vertical offset from the top edge (pixels).
    pub offset_y: u32,
    /// Target overlay width in pixels; height keeps the aspect ratio.
    pub width: u32,
    pub opacity: f32,
}

impl OverlaySpec {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            offset_x: 24,
            offset_y: 24,
            width: 180,
            opacity: 1.0,
        }
    }
}

/// Caption burn-in settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionSpec {
    pub text: String,
    pub words_per_chunk: usize,
}

/// Closing call-to-action banner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CtaSpec {
    pub text: String,
    pub visible_secs: f64,
}

/// Immutable description of the final composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MixPlan {
    pub flow: FlowKind,
    /// Source video (local path).
    pub video: String,
    pub tracks: Vec<TrackSpec>,
    /// Track whose amplitude drives sidechain ducking of the ambience bed.
    pub duck_trigger: Option<TrackRole>,
    /// Bed level while the trigger track is active.
    pub ducked_gain: f32,
    pub overlay: Option<OverlaySpec>,
    pub captions: Option<CaptionSpec>,
    pub cta: Option<CtaSpec>,
    pub aspect_ratio: AspectRatio,
}

impl MixPlan {
    pub fn builder(flow: FlowKind, video: impl Into<String>) -> MixPlanBuilder {
        MixPlanBuilder {
            plan: MixPlan {
                flow,
                video: video.into(),
                tracks: Vec::new(),
                duck_trigger: None,
                ducked_gain: DEFAULT_DUCKED_GAIN,
                overlay: None,
                captions: None,
                cta: None,
                aspect_ratio: AspectRatio::default(),
            },
        }
    }

    pub fn track(&self, role: TrackRole) -> Option<&TrackSpec> {
        self.tracks.iter().find(|t| t.role == role)
    }

    pub fn is_ducked(&self) -> bool {
        self.duck_trigger.is_some()
    }

    /// Check the structural invariants of the plan.
    pub fn validate(&self) -> Result<(), MixPlanError> {
        if self.video.trim().is_empty() {
            return Err(MixPlanError::MissingVideo);
        }
        if self.tracks.is_empty() {
            return Err(MixPlanError::NoAudio);
        }

        for (i, track) in self.tracks.iter().enumerate() {
            if self.tracks[..i].iter().any(|t| t.role == track.role) {
                return Err(MixPlanError::DuplicateTrack(track.role));
            }
            if !track.gain.is_finite() || track.gain < 0.0 {
                return Err(MixPlanError::InvalidGain(track.role, track.gain));
            }
            if track.role != TrackRole::VideoAudio && track.source.trim().is_empty() {
                return Err(MixPlanError::EmptySource(track.role));
            }
        }

        if self.flow == FlowKind::Dialogue && self.track(TrackRole::Voice).is_none() {
            return Err(MixPlanError::MissingTrack(TrackRole::Voice));
        }

        if let Some(trigger) = self.duck_trigger {
            if self.track(trigger).is_none() {
                return Err(MixPlanError::MissingTrack(trigger));
            }
            if self.track(TrackRole::Ambience).is_none() {
                return Err(MixPlanError::MissingTrack(TrackRole::Ambience));
            }
            if !self.ducked_gain.is_finite() || self.ducked_gain < 0.0 {
                return Err(MixPlanError::InvalidGain(TrackRole::Ambience, self.ducked_gain));
            }
        }

        if let Some(captions) = &self.captions {
            if captions.words_per_chunk == 0 {
                return Err(MixPlanError::InvalidCaptionChunk);
            }
        }

        Ok(())
    }
}

/// Builder that validates on [`MixPlanBuilder::build`].
#[derive(Debug, Clone)]
pub struct MixPlanBuilder {
    plan: MixPlan,
}

impl MixPlanBuilder {
    pub fn aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.plan.aspect_ratio = aspect_ratio;
        self
    }

    pub fn voice(mut self, source: impl Into<String>, gain: f32) -> Self {
        self.plan.tracks.push(TrackSpec {
            role: TrackRole::Voice,
            source: source.into(),
            gain,
        });
        self
    }

    pub fn ambience(mut self, source: impl Into<String>, gain: f32) -> Self {
        self.plan.tracks.push(TrackSpec {
            role: TrackRole::Ambience,
            source: source.into(),
            gain,
        });
        self
    }

    /// Keep the source video's own audio at `gain` (skipped when zero).
    pub fn video_audio(mut self, gain: f32) -> Self {
        if gain > 0.0 {
            self.plan.tracks.push(TrackSpec {
                role: TrackRole::VideoAudio,
                source: String::new(),
                gain,
            });
        }
        self
    }

    /// Sidechain-duck the ambience bed under the voice track.
    pub fn duck_under_voice(mut self, ducked_gain: f32) -> Self {
        self.plan.duck_trigger = Some(TrackRole::Voice);
        self.plan.ducked_gain = ducked_gain;
        self
    }

    pub fn overlay(mut self, overlay: OverlaySpec) -> Self {
        self.plan.overlay = Some(overlay);
        self
    }

    pub fn captions(mut self, text: impl Into<String>, words_per_chunk: usize) -> Self {
        self.plan.captions = Some(CaptionSpec {
            text: text.into(),
            words_per_chunk,
        });
        self
    }

    pub fn cta(mut self, text: impl Into<String>, visible_secs: f64) -> Self {
        self.plan.cta = Some(CtaSpec {
            text: text.into(),
            visible_secs,
        });
        self
    }

    pub fn build(self) -> Result<MixPlan, MixPlanError> {
        self.plan.validate()?;
        Ok(self.plan)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MixPlanError {
    #[error("Mix plan has no source video")]
    MissingVideo,
    #[error("Mix plan has no audio tracks")]
    NoAudio,
    #[error("Mix plan requires a {} track", .0.as_str())]
    MissingTrack(TrackRole),
    #[error("Mix plan has more than one {} track", .0.as_str())]
    DuplicateTrack(TrackRole),
    #[error("Mix plan {} track has no source", .0.as_str())]
    EmptySource(TrackRole),
    #[error("Invalid gain {gain} for {role} track", gain = .1, role = .0.as_str())]
    InvalidGain(TrackRole, f32),
    #[error("Caption chunk size must be at least one word")]
    InvalidCaptionChunk,
}
