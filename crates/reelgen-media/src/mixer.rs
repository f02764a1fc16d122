//! Media mixing engine.
//!
//! Turns a [`MixPlan`] into one FFmpeg invocation: the video is scaled and
//! cropped to the output frame, optionally branded, captioned and given a
//! closing call-to-action, while the audio tracks are mixed (with the
//! ambience bed ducked under the voice when requested) and muxed with
//! `-shortest`.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reelgen_models::style::DEFAULT_LONG_EDGE;
use reelgen_models::{EncodingConfig, MixPlan, TrackRole};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::captions::{chunk_captions, render_srt};
use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{build_audio_graph, build_video_graph, AudioSources, FilterGraph, VideoSteps};
use crate::metrics;
use crate::probe::probe_media;

/// Result of a successful mix.
#[derive(Debug, Clone, PartialEq)]
pub struct MixOutput {
    pub path: PathBuf,
    /// Duration the output was timed against (captions, CTA).
    pub duration_secs: f64,
}

/// Final composition step.
#[async_trait]
pub trait Mixer: Send + Sync {
    async fn mix(
        &self,
        plan: &MixPlan,
        output: &Path,
        cancel: Option<watch::Receiver<bool>>,
    ) -> MediaResult<MixOutput>;
}

/// Probed facts the command depends on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixTiming {
    pub video_duration: f64,
    pub video_has_audio: bool,
    /// Longest external audio track, if any.
    pub audio_duration: Option<f64>,
}

impl MixTiming {
    /// Output duration under `-shortest`: the video, cut to the audio.
    pub fn output_duration(&self) -> f64 {
        match self.audio_duration {
            Some(audio) if audio > 0.0 => self.video_duration.min(audio),
            _ => self.video_duration,
        }
    }
}

/// [`Mixer`] backed by the FFmpeg CLI.
#[derive(Debug, Clone)]
pub struct FfmpegMixer {
    encoding: EncodingConfig,
    long_edge: u32,
    timeout: Option<Duration>,
}

impl Default for FfmpegMixer {
    fn default() -> Self {
        Self::new(EncodingConfig::default())
    }
}

impl FfmpegMixer {
    pub fn new(encoding: EncodingConfig) -> Self {
        Self {
            encoding,
            long_edge: DEFAULT_LONG_EDGE,
            timeout: None,
        }
    }

    pub fn with_long_edge(mut self, long_edge: u32) -> Self {
        self.long_edge = long_edge;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    async fn probe_timing(&self, plan: &MixPlan) -> MediaResult<MixTiming> {
        let video = probe_media(&plan.video).await?;
        if !video.has_video {
            return Err(MediaError::invalid_media(format!(
                "{} has no video stream",
                plan.video
            )));
        }

        let mut audio_duration: Option<f64> = None;
        for track in plan.tracks.iter().filter(|t| t.role != TrackRole::VideoAudio) {
            let info = probe_media(&track.source).await?;
            if !info.has_audio {
                return Err(MediaError::invalid_media(format!(
                    "{} track {} has no audio stream",
                    track.role.as_str(),
                    track.source
                )));
            }
            audio_duration = Some(audio_duration.map_or(info.duration, |d| d.max(info.duration)));
        }

        Ok(MixTiming {
            video_duration: video.duration,
            video_has_audio: video.has_audio,
            audio_duration,
        })
    }

    /// Build the FFmpeg command for `plan`, writing caption and CTA side
    /// files next to `output`.
    pub async fn compose(
        &self,
        plan: &MixPlan,
        output: &Path,
        timing: &MixTiming,
    ) -> MediaResult<FfmpegCommand> {
        plan.validate()?;

        let duration = timing.output_duration();
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "mix".to_string());
        let side_dir = output.parent().unwrap_or_else(|| Path::new("."));

        let mut cmd = FfmpegCommand::new(output).input(&plan.video);
        let mut next_input = 1;
        let mut sources = AudioSources::default();

        if let Some(voice) = plan.track(TrackRole::Voice) {
            cmd = cmd.input(&voice.source);
            sources.voice = Some((next_input, voice.gain));
            next_input += 1;
        }
        if let Some(bed) = plan.track(TrackRole::Ambience) {
            cmd = cmd.input(&bed.source);
            sources.ambience = Some((next_input, bed.gain));
            next_input += 1;
        }
        if let Some(video_audio) = plan.track(TrackRole::VideoAudio) {
            if timing.video_has_audio {
                sources.video_audio = Some(video_audio.gain);
            } else {
                warn!(video = %plan.video, "Source video has no audio stream, skipping its track");
            }
        }
        if plan.duck_trigger == Some(TrackRole::Voice) {
            sources.ducked_gain = Some(plan.ducked_gain);
        }

        let srt_path = side_dir.join(format!("{}.srt", stem));
        let srt_path_str = srt_path.to_string_lossy().to_string();
        let cta_path = side_dir.join(format!("{}.cta.txt", stem));
        let cta_path_str = cta_path.to_string_lossy().to_string();

        let mut steps = VideoSteps::default();
        if let Some(overlay) = &plan.overlay {
            if !Path::new(&overlay.source).exists() {
                return Err(MediaError::FileNotFound(PathBuf::from(&overlay.source)));
            }
            cmd = cmd.input(&overlay.source);
            steps.overlay = Some((next_input, overlay));
        }

        if let Some(captions) = &plan.captions {
            let cues = chunk_captions(&captions.text, captions.words_per_chunk, duration);
            if !cues.is_empty() {
                tokio::fs::write(&srt_path, render_srt(&cues)).await?;
                debug!(cues = cues.len(), path = %srt_path.display(), "Wrote captions");
                steps.subtitles = Some(&srt_path_str);
            }
        }

        if let Some(cta) = plan.cta.as_ref().filter(|c| !c.text.trim().is_empty()) {
            tokio::fs::write(&cta_path, cta.text.trim()).await?;
            steps.cta = Some((&cta_path_str, cta, duration));
        }

        let mut graph = FilterGraph::new();
        let frame = plan.aspect_ratio.frame_size(self.long_edge);
        let video_label = build_video_graph(&mut graph, frame, self.encoding.fps, &steps);
        let audio_label = build_audio_graph(&mut graph, &sources);

        cmd = cmd
            .filter_complex(graph.render())
            .map(format!("[{}]", video_label));
        cmd = match audio_label {
            Some(label) => cmd.map(format!("[{}]", label)),
            None => cmd.output_arg("-an"),
        };

        Ok(cmd.output_args(self.encoding.to_ffmpeg_args()).shortest())
    }
}

#[async_trait]
impl Mixer for FfmpegMixer {
    async fn mix(
        &self,
        plan: &MixPlan,
        output: &Path,
        cancel: Option<watch::Receiver<bool>>,
    ) -> MediaResult<MixOutput> {
        let started = Instant::now();
        let flow = plan.flow.as_str();

        let timing = self.probe_timing(plan).await?;
        let cmd = self.compose(plan, output, &timing).await?;

        let mut runner = FfmpegRunner::new();
        if let Some(cancel) = cancel {
            runner = runner.with_cancel(cancel);
        }
        if let Some(timeout) = self.timeout {
            runner = runner.with_timeout(timeout);
        }

        info!(
            flow = %flow,
            output = %output.display(),
            tracks = plan.tracks.len(),
            ducked = plan.is_ducked(),
            "Mixing final video"
        );

        let result = runner.run(&cmd).await;
        let elapsed = started.elapsed().as_secs_f64();
        let outcome = match &result {
            Ok(()) => "success",
            Err(MediaError::Cancelled) => "cancelled",
            Err(MediaError::Timeout(_)) => "timeout",
            Err(_) => "failed",
        };
        metrics::record_mix(flow, outcome, elapsed);
        result?;

        let duration_secs = timing.output_duration();
        metrics::record_output_duration(flow, duration_secs);
        info!(flow = %flow, duration_secs, elapsed_secs = elapsed, "Mix complete");

        Ok(MixOutput {
            path: output.to_path_buf(),
            duration_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelgen_models::{FlowKind, OverlaySpec};
    use tempfile::TempDir;

    fn timing(video: f64, audio: Option<f64>) -> MixTiming {
        MixTiming {
            video_duration: video,
            video_has_audio: false,
            audio_duration: audio,
        }
    }

    fn filter_of(args: &[String]) -> &str {
        let i = args.iter().position(|a| a == "-filter_complex").unwrap();
        &args[i + 1]
    }

    #[test]
    fn test_output_duration_is_shortest() {
        assert_eq!(timing(5.0, Some(3.2)).output_duration(), 3.2);
        assert_eq!(timing(5.0, Some(8.0)).output_duration(), 5.0);
        assert_eq!(timing(5.0, None).output_duration(), 5.0);
    }

    #[tokio::test]
    async fn test_compose_ambience_only() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("final.mp4");
        let plan = MixPlan::builder(FlowKind::Ambience, "/tmp/video.mp4")
            .ambience("/tmp/bed.mp3", 0.6)
            .build()
            .unwrap();

        let cmd = FfmpegMixer::default()
            .compose(&plan, &output, &timing(5.0, Some(6.0)))
            .await
            .unwrap();
        let args = cmd.build_args();

        assert_eq!(cmd.input_count(), 2);
        let filter = filter_of(&args);
        assert!(filter.contains("[1:a]aresample=44100,volume=0.600[bed]"));
        assert!(!filter.contains("sidechaincompress"));
        assert!(args.windows(2).any(|w| w[0] == "-map" && w[1] == "[bed]"));
        assert!(args.contains(&"-shortest".to_string()));
        assert!(!dir.path().join("final.srt").exists());
    }

    #[tokio::test]
    async fn test_compose_dialogue_with_captions_and_cta() {
        let dir = TempDir::new().unwrap();
        let logo = dir.path().join("logo.png");
        tokio::fs::write(&logo, b"png").await.unwrap();
        let output = dir.path().join("final.mp4");

        let plan = MixPlan::builder(FlowKind::Dialogue, "/tmp/video.mp4")
            .voice("/tmp/voice.mp3", 1.0)
            .ambience("/tmp/bed.mp3", 0.6)
            .duck_under_voice(0.2)
            .overlay(OverlaySpec::new(logo.to_string_lossy()))
            .captions("Try our new espresso blend!", 4)
            .cta("Order today", 2.5)
            .build()
            .unwrap();

        let cmd = FfmpegMixer::default()
            .compose(&plan, &output, &timing(6.0, Some(4.0)))
            .await
            .unwrap();
        let args = cmd.build_args();

        assert_eq!(cmd.input_count(), 4);
        let filter = filter_of(&args);
        assert!(filter.contains("sidechaincompress"));
        assert!(filter.contains("[3:v]scale=180:-1"));
        assert!(filter.contains("enable='gte(t,1.500)'"));
        assert!(args.windows(2).any(|w| w[0] == "-map" && w[1] == "[vcta]"));
        assert!(args.windows(2).any(|w| w[0] == "-map" && w[1] == "[aout]"));

        let srt = tokio::fs::read_to_string(dir.path().join("final.srt"))
            .await
            .unwrap();
        assert!(srt.contains("00:00:04,000"));
        let cta = tokio::fs::read_to_string(dir.path().join("final.cta.txt"))
            .await
            .unwrap();
        assert_eq!(cta, "Order today");
    }

    #[tokio::test]
    async fn test_compose_missing_overlay_fails() {
        let dir = TempDir::new().unwrap();
        let plan = MixPlan::builder(FlowKind::Ambience, "/tmp/video.mp4")
            .ambience("/tmp/bed.mp3", 0.6)
            .overlay(OverlaySpec::new("/nonexistent/logo.png"))
            .build()
            .unwrap();

        let err = FfmpegMixer::default()
            .compose(&plan, &dir.path().join("out.mp4"), &timing(5.0, None))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_video_audio_skipped_when_absent() {
        let dir = TempDir::new().unwrap();
        let plan = MixPlan::builder(FlowKind::Ambience, "/tmp/video.mp4")
            .ambience("/tmp/bed.mp3", 0.6)
            .video_audio(0.3)
            .build()
            .unwrap();

        let cmd = FfmpegMixer::default()
            .compose(&plan, &dir.path().join("out.mp4"), &timing(5.0, None))
            .await
            .unwrap();
        assert!(!filter_of(&cmd.build_args()).contains("[0:a]"));
    }
}
