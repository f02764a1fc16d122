//! Output framing.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Long edge of rendered output in pixels.
pub const DEFAULT_LONG_EDGE: u32 = 1920;

/// Longest side may be at most this many times the shortest.
pub const MAX_SIDE_RATIO: u32 = 4;

/// Aspect ratio specification.
///
/// Deserializes from either `"9:16"` or `{"width": 9, "height": 16}`;
/// both forms go through [`AspectRatio::checked`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(try_from = "AspectRatioRepr")]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    /// Standard portrait (9:16) for TikTok/Reels
    pub const PORTRAIT: AspectRatio = AspectRatio {
        width: 9,
        height: 16,
    };

    /// Landscape (16:9)
    pub const LANDSCAPE: AspectRatio = AspectRatio {
        width: 16,
        height: 9,
    };

    /// Square (1:1)
    pub const SQUARE: AspectRatio = AspectRatio {
        width: 1,
        height: 1,
    };

    /// Instagram portrait (4:5)
    pub const INSTAGRAM_PORTRAIT: AspectRatio = AspectRatio {
        width: 4,
        height: 5,
    };

    /// Create a new aspect ratio.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Build a ratio, rejecting zero sides and extreme shapes.
    pub fn checked(width: u32, height: u32) -> Result<Self, AspectRatioParseError> {
        if width == 0 || height == 0 {
            return Err(AspectRatioParseError::ZeroValue);
        }
        let (long, short) = (width.max(height), width.min(height));
        if long > short.saturating_mul(MAX_SIDE_RATIO) {
            return Err(AspectRatioParseError::OutOfRange(format!("{}:{}", width, height)));
        }
        Ok(Self { width, height })
    }

    /// Check a ratio that was built without [`AspectRatio::checked`].
    pub fn validate(&self) -> Result<(), AspectRatioParseError> {
        Self::checked(self.width, self.height).map(|_| ())
    }

    /// Returns the aspect ratio as a decimal.
    pub fn as_f64(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// Pixel dimensions for this ratio with the given long edge.
    ///
    /// Both dimensions are rounded down to even numbers, which yuv420p
    /// encoders require.
    pub fn frame_size(&self, long_edge: u32) -> (u32, u32) {
        let (width, height) = (self.width.max(1) as u64, self.height.max(1) as u64);
        let (w, h) = if width >= height {
            (long_edge, (long_edge as u64 * height / width) as u32)
        } else {
            ((long_edge as u64 * width / height) as u32, long_edge)
        };
        (w & !1, h & !1)
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl FromStr for AspectRatio {
    type Err = AspectRatioParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(':')
            .ok_or_else(|| AspectRatioParseError::InvalidFormat(s.to_string()))?;

        let width = w
            .trim()
            .parse()
            .map_err(|_| AspectRatioParseError::InvalidNumber(w.to_string()))?;
        let height = h
            .trim()
            .parse()
            .map_err(|_| AspectRatioParseError::InvalidNumber(h.to_string()))?;

        AspectRatio::checked(width, height)
    }
}

/// Accepted wire forms of an aspect ratio.
#[derive(Deserialize)]
#[serde(untagged)]
enum AspectRatioRepr {
    Text(String),
    Parts { width: u32, height: u32 },
}

impl TryFrom<AspectRatioRepr> for AspectRatio {
    type Error = AspectRatioParseError;

    fn try_from(repr: AspectRatioRepr) -> Result<Self, Self::Error> {
        match repr {
            AspectRatioRepr::Text(text) => text.parse(),
            AspectRatioRepr::Parts { width, height } => AspectRatio::checked(width, height),
        }
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::PORTRAIT
    }
}

#[derive(Debug, Error)]
pub enum AspectRatioParseError {
    #[error("Invalid aspect ratio format: {0}, expected 'W:H'")]
    InvalidFormat(String),
    #[error("Invalid number in aspect ratio: {0}")]
    InvalidNumber(String),
    #[error("Aspect ratio cannot have zero values")]
    ZeroValue,
    #[error("Aspect ratio {0} is outside 1:4 to 4:1")]
    OutOfRange(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_ratio_parse() {
        assert_eq!("9:16".parse::<AspectRatio>().unwrap(), AspectRatio::PORTRAIT);
        assert_eq!("16 : 9".parse::<AspectRatio>().unwrap(), AspectRatio::LANDSCAPE);
        assert!("9x16".parse::<AspectRatio>().is_err());
        assert!(matches!(
            "0:16".parse::<AspectRatio>(),
            Err(AspectRatioParseError::ZeroValue)
        ));
        assert!(matches!(
            "1:10".parse::<AspectRatio>(),
            Err(AspectRatioParseError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_deserialize_checks_both_forms() {
        let parsed: AspectRatio = serde_json::from_str(r#""4:5""#).unwrap();
        assert_eq!(parsed, AspectRatio::INSTAGRAM_PORTRAIT);
        let parsed: AspectRatio = serde_json::from_str(r#"{"width": 16, "height": 9}"#).unwrap();
        assert_eq!(parsed, AspectRatio::LANDSCAPE);

        assert!(serde_json::from_str::<AspectRatio>(r#"{"width": 0, "height": 0}"#).is_err());
        assert!(serde_json::from_str::<AspectRatio>(r#"{"width": 0, "height": 16}"#).is_err());
        assert!(serde_json::from_str::<AspectRatio>(r#""1:100""#).is_err());
    }

    #[test]
    fn test_serialized_form_round_trips() {
        let json = serde_json::to_string(&AspectRatio::PORTRAIT).unwrap();
        assert_eq!(json, r#"{"width":9,"height":16}"#);
        assert_eq!(
            serde_json::from_str::<AspectRatio>(&json).unwrap(),
            AspectRatio::PORTRAIT
        );
    }

    #[test]
    fn test_frame_size_of_unchecked_ratio_does_not_panic() {
        let (w, h) = AspectRatio::new(0, 0).frame_size(1920);
        assert_eq!((w, h), (1920, 1920));
        assert!(AspectRatio::new(0, 16).validate().is_err());
        assert!(AspectRatio::PORTRAIT.validate().is_ok());
    }

    #[test]
    fn test_frame_size() {
        assert_eq!(AspectRatio::PORTRAIT.frame_size(1920), (1080, 1920));
        assert_eq!(AspectRatio::LANDSCAPE.frame_size(1920), (1920, 1080));
        assert_eq!(AspectRatio::SQUARE.frame_size(1080), (1080, 1080));
        // 4:5 at 1921 → odd dimensions are rounded down
        let (w, h) = AspectRatio::INSTAGRAM_PORTRAIT.frame_size(1921);
        assert_eq!(w % 2, 0);
        assert_eq!(h % 2, 0);
    }
}
