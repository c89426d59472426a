//! Geometric logo / scanned-document classification of one raster image.
//!
//! The heuristic looks only at `(width, height)`; pixel content and decoder
//! types never enter into it. The thresholds are empirical and must stay
//! exactly as in [`ClassifierThresholds::default`] unless a behaviour change
//! is intended.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What an embedded image most likely is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageClassification {
    /// Small or decorative: letterheads, icons, signatures.
    Logo,
    /// A page scan or photograph carrying substantive content.
    ScannedDocument,
}

impl fmt::Display for ImageClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageClassification::Logo => f.write_str("logo"),
            ImageClassification::ScannedDocument => f.write_str("scanned_document"),
        }
    }
}

/// Pixel-count and aspect-ratio thresholds for [`classify_with`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierThresholds {
    /// Below this many pixels an image counts as small.
    pub small_pixels: u64,
    /// Above this many pixels an image counts as large.
    pub large_pixels: u64,
    /// Fallback split for images that are neither clearly small nor clearly large.
    pub fallback_pixels: u64,
    /// Exclusive aspect-ratio band `(low, high)` considered square-ish.
    pub squareish_ratio: (f64, f64),
    /// Exclusive aspect-ratio band `(low, high)` outside of which an image is rectangular.
    pub rectangular_ratio: (f64, f64),
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            small_pixels: 100_000,
            large_pixels: 300_000,
            fallback_pixels: 200_000,
            squareish_ratio: (0.5, 2.0),
            rectangular_ratio: (0.8, 1.2),
        }
    }
}

/// Classify an image of the given size using the default thresholds.
pub fn classify(width: u32, height: u32) -> ImageClassification {
    classify_with(&ClassifierThresholds::default(), width, height)
}

/// Classify an image of the given size.
///
/// Total over every `(width, height)`: a zero height yields an infinite or
/// NaN ratio, which fails both ratio tests and lands in the pixel fallback.
pub fn classify_with(t: &ClassifierThresholds, width: u32, height: u32) -> ImageClassification {
    let pixels = u64::from(width) * u64::from(height);
    let ratio = f64::from(width) / f64::from(height);

    let is_small = pixels < t.small_pixels;
    let is_squareish = ratio > t.squareish_ratio.0 && ratio < t.squareish_ratio.1;
    let is_large = pixels > t.large_pixels;
    let is_rectangular = ratio > t.rectangular_ratio.1 || ratio < t.rectangular_ratio.0;

    if is_small && is_squareish {
        ImageClassification::Logo
    } else if is_large && is_rectangular {
        ImageClassification::ScannedDocument
    } else if pixels < t.fallback_pixels {
        ImageClassification::Logo
    } else {
        ImageClassification::ScannedDocument
    }
}
