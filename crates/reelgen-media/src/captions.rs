//! Caption segmentation and SRT rendering.
//!
//! Captions are split into fixed-size word chunks. Each chunk stays on
//! screen for its share of the total word count times the clip duration,
//! and the last chunk always ends exactly at the clip's end.

use std::fmt::Write;

/// One timed caption.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionCue {
    /// 1-based cue number
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl CaptionCue {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Split `text` into cues of `words_per_chunk` words spanning `total_duration`.
///
/// Returns no cues for blank text, a zero chunk size or a non-positive duration.
pub fn chunk_captions(text: &str, words_per_chunk: usize, total_duration: f64) -> Vec<CaptionCue> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || words_per_chunk == 0 || !total_duration.is_finite() || total_duration <= 0.0 {
        return Vec::new();
    }

    let total_words = words.len() as f64;
    let chunks: Vec<&[&str]> = words.chunks(words_per_chunk).collect();
    let last = chunks.len() - 1;

    let mut cues = Vec::with_capacity(chunks.len());
    let mut words_seen = 0usize;
    let mut start = 0.0;

    for (i, chunk) in chunks.into_iter().enumerate() {
        words_seen += chunk.len();
        // Cumulative boundaries keep rounding error from accumulating.
        let end = if i == last {
            total_duration
        } else {
            (words_seen as f64 / total_words) * total_duration
        };
        cues.push(CaptionCue {
            index: i + 1,
            start,
            end,
            text: chunk.join(" "),
        });
        start = end;
    }

    cues
}

/// Format seconds as an SRT timestamp (`HH:MM:SS,mmm`).
pub fn format_srt_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    format!(
        "{:02}:{:02}:{:02},{:03}",
        total_secs / 3600,
        (total_secs % 3600) / 60,
        total_secs % 60,
        ms
    )
}

/// Render cues as an SRT document.
pub fn render_srt(cues: &[CaptionCue]) -> String {
    let mut out = String::new();
    for cue in cues {
        let _ = write!(
            out,
            "{}\n{} --> {}\n{}\n\n",
            cue.index,
            format_srt_timestamp(cue.start),
            format_srt_timestamp(cue.end),
            cue.text
        );
    }
    out
}
