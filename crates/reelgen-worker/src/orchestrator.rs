//! Pipeline orchestrator.
//!
//! One call to [`Orchestrator::run`] drives a run through
//! drafting, the branch decision, concurrent synthesis, video synthesis
//! and the final mix. Every failure leaves with the stage that raised it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use reelgen_media::{FfmpegMixer, Mixer};
use reelgen_models::{
    AssetRef, CreativeBrief, EncodingConfig, FlowKind, GenerationIntent, MediaKind, RunId,
    RunPhase, Stage,
};
use reelgen_providers::{
    AmbienceRequest, ImageRequest, JobPoller, ProviderAdapter, RestoreRequest, SpeechRequest,
    VideoRequest,
};
use reelgen_storage::{BlobStore, LocalAssetStore, R2Client};
use tokio::sync::watch;
use tracing::{info, warn, Instrument};

use crate::brief::{choose_flow, BriefDrafter, DEFAULT_AMBIENCE};
use crate::config::WorkerConfig;
use crate::error::{PipelineError, PipelineResult, RunError, StageExt};
use crate::logging::RunLogger;
use crate::metrics;
use crate::persona::anchor_persona;
use crate::plan::{build_mix_plan, MixInputs};
use crate::providers::ProviderSet;
use crate::resolver::{AssetResolver, RunAssets};
use crate::status::StatusHandle;

/// Per-run services shared by the stages.
struct RunScope<'a> {
    intent: &'a GenerationIntent,
    poller: JobPoller,
    assets: RunAssets,
    logger: RunLogger,
    cancel: watch::Receiver<bool>,
}

impl RunScope<'_> {
    fn ensure_live(&self, stage: Stage) -> Result<(), RunError> {
        if *self.cancel.borrow() {
            return Err(PipelineError::Cancelled.at(stage));
        }
        Ok(())
    }
}

/// A synthesized voice track and its local copy.
struct VoiceTrack {
    asset: AssetRef,
    path: PathBuf,
}

/// Runs the generation pipeline.
pub struct Orchestrator {
    config: WorkerConfig,
    providers: ProviderSet,
    resolver: Arc<AssetResolver>,
    mixer: Arc<dyn Mixer>,
    drafter: BriefDrafter,
}

impl Orchestrator {
    pub fn new(
        config: WorkerConfig,
        providers: ProviderSet,
        resolver: Arc<AssetResolver>,
        mixer: Arc<dyn Mixer>,
    ) -> Self {
        let drafter = BriefDrafter::new(providers.text.clone());
        Self {
            config,
            providers,
            resolver,
            mixer,
            drafter,
        }
    }

    /// Wire production providers, storage and the FFmpeg mixer from config
    /// and environment.
    pub async fn from_config(config: WorkerConfig) -> PipelineResult<Self> {
        let store = LocalAssetStore::new(&config.assets_root, &config.public_prefix);
        store.ensure_dirs().await?;

        let providers = ProviderSet::from_env(store.clone())?;

        let mut resolver = AssetResolver::new(store);
        match R2Client::from_env().await {
            Ok(client) => {
                let blob: Arc<dyn BlobStore> = Arc::new(client);
                resolver = resolver.with_blob_store(blob);
            }
            Err(e) => warn!(error = %e, "Blob store not configured, rehosting disabled"),
        }
        if let Some(base) = &config.public_base_url {
            resolver = resolver.with_public_base_url(base.as_str());
        }
        for provider in &config.same_origin_providers {
            resolver = resolver.with_same_origin_provider(provider.as_str());
        }
        for lookup in &providers.lookups {
            resolver = resolver.with_lookup(Arc::clone(lookup));
        }

        let mixer = FfmpegMixer::new(EncodingConfig::default())
            .with_long_edge(config.long_edge)
            .with_timeout(config.mix_timeout);

        Ok(Self::new(config, providers, Arc::new(resolver), Arc::new(mixer)))
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn local_store(&self) -> &LocalAssetStore {
        self.resolver.local_store()
    }

    /// Execute one run and return the public URL of the final clip.
    pub async fn run(
        &self,
        run_id: &RunId,
        intent: &GenerationIntent,
        status: &StatusHandle,
        cancel: watch::Receiver<bool>,
    ) -> Result<String, RunError> {
        let logger = RunLogger::new(run_id);
        let span = logger.create_span();
        let scope = RunScope {
            intent,
            poller: JobPoller::new().with_cancel(cancel.clone()),
            assets: self.resolver.for_run(),
            logger,
            cancel,
        };
        self.execute(&scope, status).instrument(span).await
    }

    async fn execute(&self, scope: &RunScope<'_>, status: &StatusHandle) -> Result<String, RunError> {
        let intent = scope.intent;
        scope.logger.log_start(&intent.prompt);

        // Drafting
        scope.ensure_live(Stage::Drafting)?;
        status.phase(RunPhase::Drafting, "Drafting creative brief");
        let started = Instant::now();
        let brief = self.drafter.draft(intent).await.stage(Stage::Drafting)?;
        metrics::record_stage(Stage::Drafting.as_str(), started.elapsed().as_secs_f64());

        let flow = choose_flow(intent, &brief);
        status.flow(flow);
        status.phase(RunPhase::for_flow(flow), &format!("{} path selected", flow.as_str()));
        scope.logger.log_stage(
            Stage::Drafting,
            &format!("flow={} synthetic_brief={}", flow.as_str(), brief.synthetic),
        );

        let visual = match intent.persona_trigger() {
            Some(trigger) => anchor_persona(&brief.visual_description, trigger),
            None => brief.visual_description.clone(),
        };

        // Synthesizing
        scope.ensure_live(Stage::ImageSynthesis)?;
        status.phase(RunPhase::Synthesizing, "Synthesizing image and audio");
        let started = Instant::now();
        let (image, voice, ambience) = tokio::try_join!(
            self.synthesize_image(scope, &visual, flow),
            self.synthesize_speech(scope, &brief, flow),
            self.synthesize_ambience(scope, &brief),
        )?;
        metrics::record_stage("synthesis", started.elapsed().as_secs_f64());
        status.progress(45, "Synthesis complete");

        // Video synthesis; every input must resolve first.
        scope.ensure_live(Stage::AssetResolution)?;
        let video_provider = match flow {
            FlowKind::Dialogue => &self.providers.avatar_video,
            FlowKind::Ambience => &self.providers.motion_video,
        };
        let target = video_provider.name().to_string();
        status.progress(50, "Resolving assets");
        let image_url = scope
            .assets
            .resolve(&image, &target)
            .await
            .stage(Stage::AssetResolution)?;
        let audio_url = match &voice {
            Some(track) => Some(
                scope
                    .assets
                    .resolve(&track.asset, &target)
                    .await
                    .stage(Stage::AssetResolution)?,
            ),
            None => None,
        };

        scope.ensure_live(Stage::VideoSynthesis)?;
        status.progress(55, "Synthesizing video");
        let motion = if brief.performance_notes.trim().is_empty() {
            visual.clone()
        } else {
            brief.performance_notes.clone()
        };
        let request = VideoRequest {
            image_url,
            duration_secs: match audio_url {
                Some(_) => None,
                None => self.config.video_duration_secs,
            },
            audio_url,
            prompt: motion,
            aspect_ratio: intent.aspect_ratio,
        };
        let started = Instant::now();
        let video = scope
            .poller
            .run_to_completion(Arc::clone(video_provider), &request, &self.config.video_poll)
            .await
            .stage(Stage::VideoSynthesis)?;
        let video_path = scope
            .assets
            .localize(&video, MediaKind::Video)
            .await
            .stage(Stage::VideoSynthesis)?;
        metrics::record_stage(Stage::VideoSynthesis.as_str(), started.elapsed().as_secs_f64());
        scope.logger.log_stage(Stage::VideoSynthesis, &format!("video ready: {}", video.describe()));

        // Mixing
        scope.ensure_live(Stage::Mixing)?;
        status.phase(RunPhase::Mixing, "Mixing final clip");
        let started = Instant::now();
        let ambience_path = scope
            .assets
            .localize(&ambience, MediaKind::Audio)
            .await
            .stage(Stage::Mixing)?;
        let inputs = MixInputs {
            video: video_path,
            voice: voice.map(|track| track.path),
            ambience: ambience_path,
        };
        let plan = build_mix_plan(&self.config, intent, &brief, flow, &inputs).stage(Stage::Mixing)?;

        let output = self
            .resolver
            .local_store()
            .allocate(MediaKind::Video, "mp4")
            .await
            .stage(Stage::Mixing)?;
        let mixed = self
            .mixer
            .mix(&plan, &output.path, Some(scope.cancel.clone()))
            .await
            .stage(Stage::Mixing)?;
        metrics::record_stage(Stage::Mixing.as_str(), started.elapsed().as_secs_f64());

        let url = match &self.config.public_base_url {
            Some(base) => format!("{}{}", base.trim_end_matches('/'), output.public_path),
            None => output.public_path,
        };
        scope.logger.log_completion(&format!(
            "{} ({:.2}s, {} uploads)",
            url,
            mixed.duration_secs,
            scope.assets.uploads()
        ));
        Ok(url)
    }

    async fn synthesize_image(
        &self,
        scope: &RunScope<'_>,
        visual: &str,
        flow: FlowKind,
    ) -> Result<AssetRef, RunError> {
        let image_provider = &self.providers.image;
        let reference_image_url = match scope
            .intent
            .persona
            .as_ref()
            .and_then(|p| p.reference_image.as_ref())
        {
            Some(reference) => Some(
                scope
                    .assets
                    .resolve(reference, image_provider.name())
                    .await
                    .stage(Stage::AssetResolution)?,
            ),
            None => None,
        };

        let request = ImageRequest {
            prompt: visual.to_string(),
            reference_image_url,
            aspect_ratio: scope.intent.aspect_ratio,
        };
        let started = Instant::now();
        let image = scope
            .poller
            .run_to_completion(Arc::clone(image_provider), &request, &self.config.image_poll)
            .await
            .stage(Stage::ImageSynthesis)?;
        metrics::record_stage(Stage::ImageSynthesis.as_str(), started.elapsed().as_secs_f64());
        scope.logger.log_stage(Stage::ImageSynthesis, &format!("image ready: {}", image.describe()));

        if flow == FlowKind::Dialogue || scope.intent.persona.is_some() {
            return self.restore_face(scope, image).await;
        }
        Ok(image)
    }

    /// Try each restoration backend in order; keep the original image if
    /// none succeeds.
    async fn restore_face(&self, scope: &RunScope<'_>, image: AssetRef) -> Result<AssetRef, RunError> {
        for restorer in &self.providers.restorers {
            let attempt = async {
                let image_url = scope.assets.resolve(&image, restorer.name()).await?;
                let restored = scope
                    .poller
                    .run_to_completion(
                        Arc::clone(restorer),
                        &RestoreRequest { image_url },
                        &self.config.image_poll,
                    )
                    .await?;
                Ok::<_, PipelineError>(restored)
            };

            match attempt.await {
                Ok(restored) => {
                    info!(restorer = %restorer.name(), "Face restoration succeeded");
                    return Ok(restored);
                }
                Err(e) if e.is_cancelled() => return Err(e.at(Stage::FaceRestoration)),
                Err(e) => scope.logger.log_warning(
                    Stage::FaceRestoration,
                    &format!("{} failed: {}", restorer.name(), e),
                ),
            }
        }

        if !self.providers.restorers.is_empty() {
            scope.logger.log_warning(
                Stage::FaceRestoration,
                "all restoration backends failed, using unrestored image",
            );
        }
        Ok(image)
    }

    async fn synthesize_speech(
        &self,
        scope: &RunScope<'_>,
        brief: &CreativeBrief,
        flow: FlowKind,
    ) -> Result<Option<VoiceTrack>, RunError> {
        if flow != FlowKind::Dialogue {
            return Ok(None);
        }
        let line = brief
            .spoken_line()
            .ok_or(PipelineError::EmptyVoiceTrack)
            .stage(Stage::SpeechSynthesis)?;

        let request = SpeechRequest {
            text: line.to_string(),
            voice_id: scope.intent.voice_id.clone(),
            emotion: brief.emotion.clone(),
            language: brief.language.clone(),
        };
        let started = Instant::now();
        let asset = scope
            .poller
            .run_to_completion(Arc::clone(&self.providers.speech), &request, &self.config.image_poll)
            .await
            .stage(Stage::SpeechSynthesis)?;

        // An empty voice track must never reach video synthesis or the mix.
        // Other localize failures keep their own message.
        let path = match scope.assets.localize(&asset, MediaKind::Audio).await {
            Ok(path) => path,
            Err(PipelineError::EmptyAsset(_)) => {
                return Err(PipelineError::EmptyVoiceTrack.at(Stage::SpeechSynthesis))
            }
            Err(e) => return Err(e.at(Stage::SpeechSynthesis)),
        };
        let size = tokio::fs::metadata(&path)
            .await
            .map(|m| m.len())
            .stage(Stage::SpeechSynthesis)?;
        if size == 0 {
            return Err(PipelineError::EmptyVoiceTrack.at(Stage::SpeechSynthesis));
        }

        metrics::record_stage(Stage::SpeechSynthesis.as_str(), started.elapsed().as_secs_f64());
        scope.logger.log_stage(Stage::SpeechSynthesis, &format!("voice ready: {} bytes", size));
        Ok(Some(VoiceTrack { asset, path }))
    }

    async fn synthesize_ambience(
        &self,
        scope: &RunScope<'_>,
        brief: &CreativeBrief,
    ) -> Result<AssetRef, RunError> {
        let description = match brief.ambience_description.trim() {
            "" => DEFAULT_AMBIENCE,
            d => d,
        };
        let request = AmbienceRequest {
            description: description.to_string(),
            duration_secs: self.config.ambience_secs,
        };
        let started = Instant::now();
        let asset = scope
            .poller
            .run_to_completion(Arc::clone(&self.providers.ambience), &request, &self.config.image_poll)
            .await
            .stage(Stage::AmbienceSynthesis)?;
        metrics::record_stage(Stage::AmbienceSynthesis.as_str(), started.elapsed().as_secs_f64());
        scope.logger.log_stage(Stage::AmbienceSynthesis, &format!("ambience ready: {}", asset.describe()));
        Ok(asset)
    }
}
