//! Provider wiring for the orchestrator.

use std::sync::Arc;

use reelgen_providers::{
    AmbienceAdapter, AmbienceRequest, AudioConfig, FileLookup, GeminiConfig, GeminiTextGenerator,
    HttpFileLookup, ImageRequest, PredictionsAdapter, PredictionsConfig, ProviderAdapter,
    QueueAdapter, QueueConfig, RestoreRequest, SpeechAdapter, SpeechRequest, TextGenerator,
    VideoRequest,
};
use reelgen_storage::LocalAssetStore;
use tracing::{info, warn};

use crate::error::{PipelineError, PipelineResult};

pub type ImageProvider = Arc<dyn ProviderAdapter<Params = ImageRequest>>;
pub type RestoreProvider = Arc<dyn ProviderAdapter<Params = RestoreRequest>>;
pub type SpeechProvider = Arc<dyn ProviderAdapter<Params = SpeechRequest>>;
pub type AmbienceProvider = Arc<dyn ProviderAdapter<Params = AmbienceRequest>>;
pub type VideoProvider = Arc<dyn ProviderAdapter<Params = VideoRequest>>;

const DEFAULT_IMAGE_MODEL: &str = "fal-ai/flux/dev";
const DEFAULT_AVATAR_MODEL: &str = "fal-ai/kling-video/v1/pro/ai-avatar";
const DEFAULT_MOTION_MODEL: &str = "fal-ai/kling-video/v2.1/standard/image-to-video";
const DEFAULT_RESTORE_MODELS: &str = "sczhou/codeformer,tencentarc/gfpgan";
const DEFAULT_FAL_FILES_URL: &str = "https://rest.alpha.fal.ai/storage/files";

/// Every external capability one run needs.
#[derive(Clone)]
pub struct ProviderSet {
    /// Text model for brief drafting; heuristic briefs are used without one
    pub text: Option<Arc<dyn TextGenerator>>,
    pub image: ImageProvider,
    /// Face restoration backends, tried in order
    pub restorers: Vec<RestoreProvider>,
    pub speech: SpeechProvider,
    pub ambience: AmbienceProvider,
    /// Audio-driven avatar video
    pub avatar_video: VideoProvider,
    /// Prompt-and-image motion video
    pub motion_video: VideoProvider,
    /// File lookups for provider handles
    pub lookups: Vec<Arc<dyn FileLookup>>,
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn required(key: &str) -> PipelineResult<String> {
    env_string(key).ok_or_else(|| PipelineError::config(format!("{} not set", key)))
}

impl ProviderSet {
    /// Build the production provider set from environment variables.
    ///
    /// `FAL_KEY`, `ELEVENLABS_API_KEY` are required. Without
    /// `REPLICATE_API_TOKEN` face restoration is skipped; without
    /// `GEMINI_API_KEY` briefs are drafted heuristically.
    pub fn from_env(store: LocalAssetStore) -> PipelineResult<Self> {
        let fal_key = required("FAL_KEY")?;
        let queue = |name: &str, model_key: &str, default_model: &str| {
            let model = env_string(model_key).unwrap_or_else(|| default_model.to_string());
            let mut config = QueueConfig::new(name, &fal_key, model);
            if let Some(base) = env_string("FAL_QUEUE_URL") {
                config = config.with_base_url(base);
            }
            config
        };

        let image: ImageProvider = Arc::new(QueueAdapter::<ImageRequest>::new(queue(
            "fal-image",
            "FAL_IMAGE_MODEL",
            DEFAULT_IMAGE_MODEL,
        ))?);
        let avatar_video: VideoProvider = Arc::new(QueueAdapter::<VideoRequest>::new(queue(
            "fal-avatar",
            "FAL_AVATAR_MODEL",
            DEFAULT_AVATAR_MODEL,
        ))?);
        let motion_video: VideoProvider = Arc::new(QueueAdapter::<VideoRequest>::new(queue(
            "fal-motion",
            "FAL_MOTION_MODEL",
            DEFAULT_MOTION_MODEL,
        ))?);

        let files_url =
            env_string("FAL_FILES_URL").unwrap_or_else(|| DEFAULT_FAL_FILES_URL.to_string());
        let mut lookups: Vec<Arc<dyn FileLookup>> = Vec::new();
        for name in ["fal-image", "fal-avatar", "fal-motion"] {
            lookups.push(Arc::new(HttpFileLookup::new(
                name,
                files_url.as_str(),
                format!("Key {}", fal_key),
            )?));
        }

        let restorers = match env_string("REPLICATE_API_TOKEN") {
            Some(token) => {
                let models = env_string("RESTORE_MODELS")
                    .unwrap_or_else(|| DEFAULT_RESTORE_MODELS.to_string());
                let mut restorers: Vec<RestoreProvider> = Vec::new();
                for model in models.split(',').map(str::trim).filter(|m| !m.is_empty()) {
                    let name = model.rsplit('/').next().unwrap_or(model);
                    restorers.push(Arc::new(PredictionsAdapter::<RestoreRequest>::new(
                        PredictionsConfig::new(name, &token, model),
                    )?));
                }
                restorers
            }
            None => {
                warn!("REPLICATE_API_TOKEN not set, face restoration disabled");
                Vec::new()
            }
        };

        let mut audio = AudioConfig::new(required("ELEVENLABS_API_KEY")?);
        if let Some(voice) = env_string("ELEVENLABS_VOICE_ID") {
            audio.default_voice_id = voice;
        }
        if let Some(base) = env_string("ELEVENLABS_BASE_URL") {
            audio = audio.with_base_url(base);
        }
        let speech: SpeechProvider = Arc::new(SpeechAdapter::new(audio.clone(), store.clone())?);
        let ambience: AmbienceProvider = Arc::new(AmbienceAdapter::new(audio, store)?);

        let text: Option<Arc<dyn TextGenerator>> = match env_string("GEMINI_API_KEY") {
            Some(key) => {
                let models = env_string("GEMINI_MODELS")
                    .map(|s| s.split(',').map(|m| m.trim().to_string()).filter(|m| !m.is_empty()).collect())
                    .unwrap_or_default();
                Some(Arc::new(GeminiTextGenerator::new(
                    GeminiConfig::new(key).with_models(models),
                )?))
            }
            None => {
                warn!("GEMINI_API_KEY not set, briefs will be drafted heuristically");
                None
            }
        };

        info!(
            restorers = restorers.len(),
            text = text.is_some(),
            "Configured providers"
        );

        Ok(Self {
            text,
            image,
            restorers,
            speech,
            ambience,
            avatar_video,
            motion_video,
            lookups,
        })
    }
}
