//! Per-capability request parameters.

use reelgen_models::AspectRatio;
use serde_json::{json, Map, Value};

/// Conversion of a request into a model's JSON input object.
pub trait ModelInput {
    fn to_input(&self) -> Value;
}

/// Reference image generation.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub prompt: String,
    /// Public URL of a persona reference image.
    pub reference_image_url: Option<String>,
    pub aspect_ratio: AspectRatio,
}

impl ModelInput for ImageRequest {
    fn to_input(&self) -> Value {
        let mut input = Map::new();
        input.insert("prompt".into(), json!(self.prompt));
        input.insert("aspect_ratio".into(), json!(self.aspect_ratio.to_string()));
        input.insert("output_format".into(), json!("png"));
        input.insert("num_images".into(), json!(1));
        if let Some(url) = &self.reference_image_url {
            input.insert("image_url".into(), json!(url));
        }
        Value::Object(input)
    }
}

/// Face restoration of a generated image.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreRequest {
    pub image_url: String,
}

impl ModelInput for RestoreRequest {
    fn to_input(&self) -> Value {
        json!({
            "image": self.image_url,
            "upscale": 1,
            "face_upsample": true,
        })
    }
}

/// Speech synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    pub voice_id: Option<String>,
    pub emotion: Option<String>,
    /// ISO 639-1 code.
    pub language: Option<String>,
}

/// Ambience / sound-effect synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct AmbienceRequest {
    pub description: String,
    pub duration_secs: f64,
}

/// Video synthesis.
///
/// With `audio_url` set this drives an audio-conditioned avatar model;
/// without it, a prompt-and-image motion model.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoRequest {
    pub image_url: String,
    pub audio_url: Option<String>,
    /// Performance or motion guidance.
    pub prompt: String,
    pub duration_secs: Option<u32>,
    pub aspect_ratio: AspectRatio,
}

impl ModelInput for VideoRequest {
    fn to_input(&self) -> Value {
        let mut input = Map::new();
        input.insert("image_url".into(), json!(self.image_url));
        input.insert("prompt".into(), json!(self.prompt));
        input.insert("aspect_ratio".into(), json!(self.aspect_ratio.to_string()));
        if let Some(audio) = &self.audio_url {
            input.insert("audio_url".into(), json!(audio));
        }
        if let Some(duration) = self.duration_secs {
            input.insert("duration".into(), json!(duration.to_string()));
        }
        Value::Object(input)
    }
}
