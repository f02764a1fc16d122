//! Synchronous speech and ambience synthesis.
//!
//! Both endpoints answer with raw audio bytes in a single round trip. The
//! bytes are written to the local asset store straight away so callers
//! hold a file reference instead of the payload.

use std::time::Duration;

use async_trait::async_trait;
use reelgen_models::{AssetRef, JobHandle, JobStatus, MediaKind};
use reelgen_storage::LocalAssetStore;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use crate::adapter::{no_job_results, ProviderAdapter, Submission};
use crate::error::{ProviderError, ProviderResult};
use crate::http::{build_client, check_response};
use crate::metrics;
use crate::requests::{AmbienceRequest, SpeechRequest};

/// Shortest and longest sound effect the provider accepts.
const MIN_AMBIENCE_SECS: f64 = 0.5;
const MAX_AMBIENCE_SECS: f64 = 22.0;

/// Shared configuration for the audio provider.
#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub base_url: String,
    pub api_key: String,
    /// Speech model identifier
    pub speech_model: String,
    /// Voice used when the intent does not pick one
    pub default_voice_id: String,
    /// Output format query parameter
    pub output_format: String,
    pub timeout: Duration,
}

impl AudioConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: "https://api.elevenlabs.io".to_string(),
            api_key: api_key.into(),
            speech_model: "eleven_multilingual_v2".to_string(),
            default_voice_id: "21m00Tcm4TlvDq8ikWAM".to_string(),
            output_format: "mp3_44100_128".to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
    style: f32,
}

impl VoiceSettings {
    /// Expressive delivery when an emotion is requested.
    fn for_emotion(emotion: Option<&str>) -> Self {
        match emotion.map(str::trim).filter(|e| !e.is_empty()) {
            Some(_) => Self {
                stability: 0.35,
                similarity_boost: 0.8,
                style: 0.6,
            },
            None => Self {
                stability: 0.5,
                similarity_boost: 0.75,
                style: 0.0,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct SpeechBody<'a> {
    text: &'a str,
    model_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    language_code: Option<&'a str>,
    voice_settings: VoiceSettings,
}

#[derive(Debug, Serialize)]
struct SoundBody<'a> {
    text: &'a str,
    duration_seconds: f64,
    prompt_influence: f32,
}

/// POST `body` and persist the returned audio bytes.
async fn synthesize<B: Serialize + Sync>(
    http: &Client,
    config: &AudioConfig,
    store: &LocalAssetStore,
    provider: &str,
    url: &str,
    body: &B,
) -> ProviderResult<AssetRef> {
    let response = http
        .post(url)
        .header("xi-api-key", &config.api_key)
        .query(&[("output_format", config.output_format.as_str())])
        .json(body)
        .send()
        .await?;
    let response = check_response(provider, response).await?;

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("audio/mpeg")
        .to_string();
    let bytes = response.bytes().await?;

    metrics::record_submit(provider);
    let extension = MediaKind::Audio.extension_for_mime(&content_type);
    let asset = store.persist(&bytes, MediaKind::Audio, extension).await?;
    info!(provider = %provider, size = bytes.len(), asset = %asset.describe(), "Synthesized audio");
    Ok(asset)
}

/// Text-to-speech adapter.
pub struct SpeechAdapter {
    http: Client,
    config: AudioConfig,
    store: LocalAssetStore,
}

impl SpeechAdapter {
    pub fn new(config: AudioConfig, store: LocalAssetStore) -> ProviderResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::config("speech: API key is empty"));
        }
        Ok(Self {
            http: build_client(config.timeout)?,
            config,
            store,
        })
    }
}

#[async_trait]
impl ProviderAdapter for SpeechAdapter {
    type Params = SpeechRequest;

    fn name(&self) -> &str {
        "speech"
    }

    async fn submit(&self, params: &SpeechRequest) -> ProviderResult<Submission> {
        let voice = params
            .voice_id
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(&self.config.default_voice_id);
        let url = format!("{}/v1/text-to-speech/{}", self.config.base(), voice);
        debug!(voice = %voice, chars = params.text.len(), "Synthesizing speech");

        let body = SpeechBody {
            text: &params.text,
            model_id: &self.config.speech_model,
            language_code: params.language.as_deref(),
            voice_settings: VoiceSettings::for_emotion(params.emotion.as_deref()),
        };
        let asset =
            synthesize(&self.http, &self.config, &self.store, self.name(), &url, &body).await?;
        Ok(Submission::Completed(asset))
    }

    async fn poll(&self, _handle: &JobHandle) -> ProviderResult<JobStatus> {
        Ok(JobStatus::succeeded())
    }

    async fn fetch_result(&self, handle: &JobHandle) -> ProviderResult<AssetRef> {
        Err(no_job_results(self.name(), handle))
    }
}

/// Sound-effect / ambience adapter.
pub struct AmbienceAdapter {
    http: Client,
    config: AudioConfig,
    store: LocalAssetStore,
}

impl AmbienceAdapter {
    pub fn new(config: AudioConfig, store: LocalAssetStore) -> ProviderResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::config("ambience: API key is empty"));
        }
        Ok(Self {
            http: build_client(config.timeout)?,
            config,
            store,
        })
    }
}

#[async_trait]
impl ProviderAdapter for AmbienceAdapter {
    type Params = AmbienceRequest;

    fn name(&self) -> &str {
        "ambience"
    }

    async fn submit(&self, params: &AmbienceRequest) -> ProviderResult<Submission> {
        let url = format!("{}/v1/sound-generation", self.config.base());
        let body = SoundBody {
            text: &params.description,
            duration_seconds: params.duration_secs.clamp(MIN_AMBIENCE_SECS, MAX_AMBIENCE_SECS),
            prompt_influence: 0.3,
        };
        let asset =
            synthesize(&self.http, &self.config, &self.store, self.name(), &url, &body).await?;
        Ok(Submission::Completed(asset))
    }

    async fn poll(&self, _handle: &JobHandle) -> ProviderResult<JobStatus> {
        Ok(JobStatus::succeeded())
    }

    async fn fetch_result(&self, handle: &JobHandle) -> ProviderResult<AssetRef> {
        Err(no_job_results(self.name(), handle))
    }
}
