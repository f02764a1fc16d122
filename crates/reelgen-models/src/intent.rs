//! Generation intent submitted by a caller.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{AspectRatio, AssetRef};

/// Maximum accepted prompt length in characters.
pub const MAX_PROMPT_CHARS: usize = 2000;

/// Maximum accepted dialogue override length in characters.
pub const MAX_DIALOGUE_CHARS: usize = 600;

/// Persona conditioning for identity-preserving generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PersonaRef {
    /// Trigger token the image model was tuned on (e.g. "ZETA").
    pub trigger: String,
    /// Reference image of the persona.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_image: Option<AssetRef>,
}

impl PersonaRef {
    pub fn new(trigger: impl Into<String>) -> Self {
        Self {
            trigger: trigger.into(),
            reference_image: None,
        }
    }

    pub fn with_reference_image(mut self, image: AssetRef) -> Self {
        self.reference_image = Some(image);
        self
    }
}

/// A user's request to generate one clip. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GenerationIntent {
    /// Free-text description of the clip.
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<PersonaRef>,
    /// Exact line to speak; bypasses the drafted spoken line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialogue_override: Option<String>,
    /// Speech provider voice identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    /// Text for the closing call-to-action banner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_to_action: Option<String>,
    /// Burn the spoken line in as captions (dialogue path only).
    #[serde(default = "default_captions")]
    pub captions: bool,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
}

fn default_captions() -> bool {
    true
}

impl GenerationIntent {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            persona: None,
            dialogue_override: None,
            voice_id: None,
            call_to_action: None,
            captions: true,
            aspect_ratio: AspectRatio::default(),
        }
    }

    pub fn with_persona(mut self, persona: PersonaRef) -> Self {
        self.persona = Some(persona);
        self
    }

    pub fn with_dialogue(mut self, line: impl Into<String>) -> Self {
        self.dialogue_override = Some(line.into());
        self
    }

    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = Some(voice_id.into());
        self
    }

    pub fn with_call_to_action(mut self, text: impl Into<String>) -> Self {
        self.call_to_action = Some(text.into());
        self
    }

    /// Trimmed dialogue override, if one was supplied and is non-blank.
    pub fn dialogue(&self) -> Option<&str> {
        self.dialogue_override
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Trimmed persona trigger token, if persona conditioning was requested.
    pub fn persona_trigger(&self) -> Option<&str> {
        self.persona
            .as_ref()
            .map(|p| p.trigger.trim())
            .filter(|s| !s.is_empty())
    }

    /// Validate the intent before a run is created.
    pub fn validate(&self) -> Result<(), IntentError> {
        let prompt = self.prompt.trim();
        if prompt.is_empty() {
            return Err(IntentError::EmptyPrompt);
        }
        if prompt.chars().count() > MAX_PROMPT_CHARS {
            return Err(IntentError::PromptTooLong(MAX_PROMPT_CHARS));
        }

        self.aspect_ratio
            .validate()
            .map_err(|e| IntentError::InvalidAspectRatio(e.to_string()))?;

        if let Some(persona) = &self.persona {
            if persona.trigger.trim().is_empty() {
                return Err(IntentError::BlankPersonaTrigger);
            }
            if persona.trigger.chars().any(char::is_whitespace) {
                return Err(IntentError::InvalidPersonaTrigger(persona.trigger.clone()));
            }
        }

        if let Some(line) = &self.dialogue_override {
            if line.chars().count() > MAX_DIALOGUE_CHARS {
                return Err(IntentError::DialogueTooLong(MAX_DIALOGUE_CHARS));
            }
        }

        if let Some(voice) = &self.voice_id {
            if voice.trim().is_empty() {
                return Err(IntentError::BlankVoiceId);
            }
        }

        Ok(())
    }
}

/// Intent validation failures (reported synchronously to the caller).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntentError {
    #[error("Prompt must not be empty")]
    EmptyPrompt,
    #[error("Prompt exceeds {0} characters")]
    PromptTooLong(usize),
    #[error("Persona trigger must not be blank")]
    BlankPersonaTrigger,
    #[error("Persona trigger must be a single token: {0:?}")]
    InvalidPersonaTrigger(String),
    #[error("Dialogue exceeds {0} characters")]
    DialogueTooLong(usize),
    #[error("Voice id must not be blank")]
    BlankVoiceId,
    #[error("Invalid aspect ratio: {0}")]
    InvalidAspectRatio(String),
}
