//! FFmpeg filter-graph construction for the final composition.
//!
//! Input numbering is fixed by the caller: input 0 is always the source
//! video, other inputs are passed in as indices.

use reelgen_models::{CtaSpec, OverlaySpec};

/// Voice compressor: gentle ratio with makeup gain for intelligibility.
pub const VOICE_COMPRESSOR: &str = "acompressor=threshold=0.125:ratio=4:attack=5:release=50:makeup=2";

/// Sidechain settings applied to the ambience bed.
pub const DUCK_THRESHOLD: f32 = 0.02;
pub const DUCK_RATIO: u32 = 20;
pub const DUCK_ATTACK_MS: u32 = 20;
pub const DUCK_RELEASE_MS: u32 = 300;

/// libass style for burned-in captions (script units, bottom centre).
pub const CAPTION_STYLE: &str = "Alignment=2,FontSize=14,Outline=2,BorderStyle=1,MarginV=48";

/// Common sample rate for every mixed stream.
const SAMPLE_RATE: u32 = 44_100;

/// Escape a path for use inside a single-quoted filter argument.
pub fn escape_filter_path(path: &str) -> String {
    path.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace(':', "\\:")
}

/// Fill the frame, cropping overflow, at exactly `width`x`height`.
pub fn scale_crop(width: u32, height: u32) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},setsar=1",
        w = width,
        h = height
    )
}

/// Wet/dry mix for the sidechain compressor so the bed settles near
/// `ducked_gain` while the trigger is active.
///
/// The bed enters the compressor already at `bed_gain`; with a hard ratio
/// the wet path is close to silent under speech, so the dry share sets the
/// ducked level.
pub fn duck_mix(bed_gain: f32, ducked_gain: f32) -> f32 {
    if bed_gain <= 0.0 || ducked_gain >= bed_gain {
        return 0.0;
    }
    (1.0 - ducked_gain.max(0.0) / bed_gain).clamp(0.0, 1.0)
}

/// A filter graph plus the labels to map into the output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterGraph {
    chains: Vec<String>,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chain: impl Into<String>) {
        self.chains.push(chain.into());
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Render as a single `-filter_complex` argument.
    pub fn render(&self) -> String {
        self.chains.join(";")
    }
}

/// Video steps applied after scale/crop, in order.
#[derive(Debug, Clone, Default)]
pub struct VideoSteps<'a> {
    /// Overlay image input index with its placement.
    pub overlay: Option<(usize, &'a OverlaySpec)>,
    /// Path of a rendered SRT file.
    pub subtitles: Option<&'a str>,
    /// CTA text file, banner settings and the clip duration it is timed against.
    pub cta: Option<(&'a str, &'a CtaSpec, f64)>,
}

/// Append the video chain to `graph` and return the output label.
pub fn build_video_graph(
    graph: &mut FilterGraph,
    frame: (u32, u32),
    fps: u32,
    steps: &VideoSteps<'_>,
) -> String {
    let (width, height) = frame;
    graph.push(format!(
        "[0:v]{},fps={}[vbase]",
        scale_crop(width, height),
        fps
    ));
    let mut label = "vbase".to_string();

    if let Some((input, overlay)) = steps.overlay {
        graph.push(format!(
            "[{}:v]scale={}:-1,format=rgba,colorchannelmixer=aa={:.2}[logo]",
            input,
            overlay.width,
            overlay.opacity.clamp(0.0, 1.0)
        ));
        graph.push(format!(
            "[{}][logo]overlay=W-w-{}:{}:format=auto[vlogo]",
            label, overlay.offset_x, overlay.offset_y
        ));
        label = "vlogo".to_string();
    }

    if let Some(srt) = steps.subtitles {
        graph.push(format!(
            "[{}]subtitles='{}':force_style='{}'[vsub]",
            label,
            escape_filter_path(srt),
            CAPTION_STYLE
        ));
        label = "vsub".to_string();
    }

    if let Some((text_file, cta, duration)) = steps.cta {
        let start = (duration - cta.visible_secs).max(0.0);
        graph.push(format!(
            "[{label}]drawbox=x=0:y=ih*0.78:w=iw:h=ih*0.1:color=black@0.6:t=fill:enable='gte(t,{start:.3})',\
             drawtext=textfile='{file}':fontcolor=white:fontsize=h/24:x=(w-text_w)/2:y=h*0.83-text_h/2:enable='gte(t,{start:.3})'[vcta]",
            label = label,
            start = start,
            file = escape_filter_path(text_file)
        ));
        label = "vcta".to_string();
    }

    label
}

/// Audio sources for [`build_audio_graph`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AudioSources {
    /// Voice input index and gain.
    pub voice: Option<(usize, f32)>,
    /// Ambience input index and bed gain.
    pub ambience: Option<(usize, f32)>,
    /// Gain for the source video's own audio.
    pub video_audio: Option<f32>,
    /// Ducked bed level; ducks the ambience under the voice when set.
    pub ducked_gain: Option<f32>,
}

/// Append the audio chain to `graph` and return the output label, or
/// `None` when there is nothing to mix.
///
/// Tracks are mixed without renormalization so the configured gains hold.
pub fn build_audio_graph(graph: &mut FilterGraph, sources: &AudioSources) -> Option<String> {
    let mut mixed: Vec<&str> = Vec::new();
    let ducking = sources.voice.is_some() && sources.ambience.is_some();
    let ducked_gain = sources.ducked_gain.filter(|_| ducking);

    if let Some((input, gain)) = sources.voice {
        let tail = if ducked_gain.is_some() {
            ",asplit=2[voice][voice_sc]"
        } else {
            "[voice]"
        };
        graph.push(format!(
            "[{}:a]aresample={},volume={:.3},{}{}",
            input, SAMPLE_RATE, gain, VOICE_COMPRESSOR, tail
        ));
        mixed.push("voice");
    }

    if let Some((input, bed_gain)) = sources.ambience {
        graph.push(format!(
            "[{}:a]aresample={},volume={:.3}[bed]",
            input, SAMPLE_RATE, bed_gain
        ));
        match ducked_gain {
            Some(ducked) => {
                graph.push(format!(
                    "[bed][voice_sc]sidechaincompress=threshold={}:ratio={}:attack={}:release={}:mix={:.3}[bed_ducked]",
                    DUCK_THRESHOLD,
                    DUCK_RATIO,
                    DUCK_ATTACK_MS,
                    DUCK_RELEASE_MS,
                    duck_mix(bed_gain, ducked)
                ));
                mixed.push("bed_ducked");
            }
            None => mixed.push("bed"),
        }
    }

    if let Some(gain) = sources.video_audio {
        graph.push(format!(
            "[0:a]aresample={},volume={:.3}[vaudio]",
            SAMPLE_RATE, gain
        ));
        mixed.push("vaudio");
    }

    match mixed.len() {
        0 => None,
        1 => Some(mixed[0].to_string()),
        n => {
            let inputs: String = mixed.iter().map(|l| format!("[{}]", l)).collect();
            graph.push(format!(
                "{}amix=inputs={}:duration=longest:dropout_transition=0:normalize=0[aout]",
                inputs, n
            ));
            Some("aout".to_string())
        }
    }
}
