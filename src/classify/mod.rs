//! Redaction-mark classification.
//!
//! A [`MarkClassifier`] looks at one painted path or one placed image and
//! decides whether it is an opaque overlay hiding content. The
//! [`HeuristicClassifier`] implements the solid near-black / near-white
//! rules; [`PassThroughClassifier`] keeps everything.

pub mod drawing;
pub mod heuristic;
pub mod raster;
pub mod strategy;

pub use heuristic::HeuristicClassifier;
pub use raster::{to_rgb_mean, PixelStats};
pub use strategy::{Classification, MarkClassifier, MarkKind, PassThroughClassifier};

/// Tunable limits of the heuristic rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierThresholds {
    /// Every color channel must be below this for a mark to count as black.
    pub dark_channel_max: f64,
    /// Every color channel must be above this for a mark to count as white.
    pub light_channel_min: f64,
    /// Filled shapes must be wider and taller than this.
    pub min_mark_extent: f64,
    /// Black strokes must be wider than this.
    pub min_stroke_width: f64,
    /// Images must be taller than this to be considered at all.
    pub min_image_height: f64,
    /// Mean sample value below which an image is black (0–255).
    pub dark_brightness_max: f64,
    /// Mean sample value above which an image is white (0–255).
    pub light_brightness_min: f64,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            dark_channel_max: 0.05,
            light_channel_min: 0.95,
            min_mark_extent: 5.0,
            min_stroke_width: 10.0,
            min_image_height: 10.0,
            dark_brightness_max: 15.0,
            light_brightness_min: 240.0,
        }
    }
}
