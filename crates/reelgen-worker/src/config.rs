//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use reelgen_models::mix::{DEFAULT_CTA_SECONDS, DEFAULT_WORDS_PER_CHUNK};
use reelgen_models::style::DEFAULT_LONG_EDGE;
use reelgen_models::MixGains;
use reelgen_providers::PollOptions;

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent pipeline runs
    pub max_concurrent_runs: usize,
    /// How long finished run records stay queryable
    pub run_retention: Duration,
    /// Directory served under `public_prefix`
    pub assets_root: PathBuf,
    /// URL path prefix of the public asset directory
    pub public_prefix: String,
    /// Absolute origin the asset directory is reachable at, if any
    pub public_base_url: Option<String>,
    /// Providers that share our origin and accept relative asset paths
    pub same_origin_providers: Vec<String>,
    /// Mix levels
    pub gains: MixGains,
    /// Words per caption chunk
    pub words_per_chunk: usize,
    /// Seconds the call-to-action stays on screen
    pub cta_seconds: f64,
    /// Long edge of the rendered frame
    pub long_edge: u32,
    /// Logo composited over every clip
    pub logo_path: Option<PathBuf>,
    /// Requested ambience length in seconds
    pub ambience_secs: f64,
    /// Requested clip length for video synthesis
    pub video_duration_secs: Option<u32>,
    /// Polling policy for image and restoration jobs
    pub image_poll: PollOptions,
    /// Polling policy for video jobs
    pub video_poll: PollOptions,
    /// Hard limit for one encoder invocation
    pub mix_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: 4,
            run_retention: Duration::from_secs(6 * 3600),
            assets_root: PathBuf::from("./public"),
            public_prefix: "/assets".to_string(),
            public_base_url: None,
            same_origin_providers: Vec::new(),
            gains: MixGains::default(),
            words_per_chunk: DEFAULT_WORDS_PER_CHUNK,
            cta_seconds: DEFAULT_CTA_SECONDS,
            long_edge: DEFAULT_LONG_EDGE,
            logo_path: None,
            ambience_secs: 10.0,
            video_duration_secs: Some(5),
            image_poll: PollOptions::for_image(),
            video_poll: PollOptions::for_video(),
            mix_timeout: Duration::from_secs(600),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let default_gains = MixGains::default();

        Self {
            max_concurrent_runs: env_parse("WORKER_MAX_RUNS").unwrap_or(defaults.max_concurrent_runs),
            run_retention: Duration::from_secs(
                env_parse("WORKER_RUN_RETENTION_SECS").unwrap_or(defaults.run_retention.as_secs()),
            ),
            assets_root: env_string("PUBLIC_ASSETS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.assets_root),
            public_prefix: env_string("PUBLIC_ASSETS_PREFIX").unwrap_or(defaults.public_prefix),
            public_base_url: env_string("PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
            same_origin_providers: env_string("SAME_ORIGIN_PROVIDERS")
                .map(|s| {
                    s.split(',')
                        .map(|p| p.trim().to_string())
                        .filter(|p| !p.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            gains: MixGains {
                voice: env_parse("MIX_VOICE_GAIN").unwrap_or(default_gains.voice),
                bed: env_parse("MIX_BED_GAIN").unwrap_or(default_gains.bed),
                ducked: env_parse("MIX_DUCKED_GAIN").unwrap_or(default_gains.ducked),
                video_audio: env_parse("MIX_VIDEO_AUDIO_GAIN").unwrap_or(default_gains.video_audio),
            },
            words_per_chunk: env_parse("CAPTION_WORDS_PER_CHUNK")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.words_per_chunk),
            cta_seconds: env_parse("CTA_SECONDS").unwrap_or(defaults.cta_seconds),
            long_edge: env_parse("OUTPUT_LONG_EDGE").unwrap_or(defaults.long_edge),
            logo_path: env_string("LOGO_PATH").map(PathBuf::from),
            ambience_secs: env_parse("AMBIENCE_SECS").unwrap_or(defaults.ambience_secs),
            video_duration_secs: env_parse("VIDEO_DURATION_SECS").or(defaults.video_duration_secs),
            image_poll: PollOptions::from_env("IMAGE", defaults.image_poll),
            video_poll: PollOptions::from_env("VIDEO", defaults.video_poll),
            mix_timeout: Duration::from_secs(
                env_parse("MIX_TIMEOUT_SECS").unwrap_or(defaults.mix_timeout.as_secs()),
            ),
        }
    }
}
