//! FFmpeg CLI wrapper and final mixing engine.
//!
//! This crate provides:
//! - Multi-input FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - Cancellation and timeouts via tokio
//! - Caption segmentation and SRT rendering
//! - The filter graphs used for the final composition

pub mod captions;
pub mod command;
pub mod error;
pub mod filters;
pub mod metrics;
pub mod mixer;
pub mod probe;
pub mod progress;

pub use captions::{chunk_captions, render_srt, CaptionCue};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use mixer::{FfmpegMixer, MixOutput, Mixer};
pub use probe::{probe_media, MediaInfo};
pub use progress::FfmpegProgress;
