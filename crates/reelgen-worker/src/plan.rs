//! Mix plan construction.

use std::path::{Path, PathBuf};

use reelgen_models::{CreativeBrief, FlowKind, GenerationIntent, MixPlan, OverlaySpec};

use crate::config::WorkerConfig;
use crate::error::{PipelineError, PipelineResult};

/// Local files the encoder consumes.
#[derive(Debug, Clone)]
pub struct MixInputs {
    pub video: PathBuf,
    pub voice: Option<PathBuf>,
    pub ambience: PathBuf,
}

fn source(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Build the composition for one run.
pub fn build_mix_plan(
    config: &WorkerConfig,
    intent: &GenerationIntent,
    brief: &CreativeBrief,
    flow: FlowKind,
    inputs: &MixInputs,
) -> PipelineResult<MixPlan> {
    let gains = config.gains;
    let mut builder = MixPlan::builder(flow, source(&inputs.video)).aspect_ratio(intent.aspect_ratio);

    if flow == FlowKind::Dialogue {
        let voice = inputs.voice.as_deref().ok_or(PipelineError::EmptyVoiceTrack)?;
        builder = builder
            .voice(source(voice), gains.voice)
            .ambience(source(&inputs.ambience), gains.bed)
            .duck_under_voice(gains.ducked);

        if intent.captions {
            if let Some(line) = brief.spoken_line() {
                builder = builder.captions(line, config.words_per_chunk);
            }
        }
    } else {
        builder = builder.ambience(source(&inputs.ambience), gains.bed);
    }

    builder = builder.video_audio(gains.video_audio);

    if let Some(logo) = &config.logo_path {
        builder = builder.overlay(OverlaySpec::new(source(logo)));
    }

    if let Some(cta) = intent
        .call_to_action
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        builder = builder.cta(cta, config.cta_seconds);
    }

    Ok(builder.build()?)
}
