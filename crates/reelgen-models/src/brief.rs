//! Creative brief produced by the drafting stage.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Which synthesis path a run takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    /// Speech-driven: avatar video conditioned on a synthesized voice.
    Dialogue,
    /// No speech: motion video with an ambience bed.
    #[default]
    #[serde(alias = "ambient", alias = "ambience_only")]
    Ambience,
}

impl FlowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowKind::Dialogue => "dialogue",
            FlowKind::Ambience => "ambience",
        }
    }
}

/// Broad voice category suggested for speech synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum VoiceCategory {
    Male,
    Female,
    #[default]
    Neutral,
    Child,
    Elderly,
    Narrator,
    #[serde(other)]
    Unknown,
}

impl VoiceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceCategory::Male => "male",
            VoiceCategory::Female => "female",
            VoiceCategory::Neutral => "neutral",
            VoiceCategory::Child => "child",
            VoiceCategory::Elderly => "elderly",
            VoiceCategory::Narrator => "narrator",
            VoiceCategory::Unknown => "unknown",
        }
    }
}

/// Per-stage generation parameters derived once from an intent.
///
/// Field aliases accept the camelCase keys text models commonly emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CreativeBrief {
    #[serde(default, alias = "flow", alias = "type")]
    pub mode: FlowKind,
    #[serde(alias = "visualDescription", alias = "visual")]
    pub visual_description: String,
    #[serde(default, alias = "spokenLine", alias = "dialogue", alias = "line")]
    pub spoken_line: Option<String>,
    #[serde(default, alias = "ambienceDescription", alias = "ambience", alias = "sfx")]
    pub ambience_description: String,
    #[serde(default, alias = "performanceNotes", alias = "motion", alias = "movement")]
    pub performance_notes: String,
    #[serde(default, alias = "voiceCategory", alias = "voice")]
    pub voice_category: VoiceCategory,
    /// ISO 639-1 language of the spoken line, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Emotion hint forwarded to speech synthesis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
    /// True when built by the heuristic fallback rather than the text model.
    #[serde(default)]
    pub synthetic: bool,
}

impl CreativeBrief {
    /// Trimmed spoken line, if any.
    pub fn spoken_line(&self) -> Option<&str> {
        self.spoken_line
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// A brief is usable when it describes something to render.
    pub fn is_usable(&self) -> bool {
        !self.visual_description.trim().is_empty()
    }
}
