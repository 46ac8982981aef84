//! Raster image rules: brightness of the decoded samples.

use crate::error::DecodeError;
use crate::model::RasterPlacement;

use super::strategy::{Classification, MarkKind};
use super::ClassifierThresholds;

/// Brightness summary of one decoded image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelStats {
    /// Mean sample value on a 0–255 scale.
    pub mean: f64,
    pub pixels: usize,
}

impl PixelStats {
    /// Summarizes an interleaved 8-bit sample buffer. The buffer is only
    /// borrowed; callers drop it as soon as this returns.
    pub fn from_samples(
        samples: &[u8],
        channel_count: usize,
        has_alpha: bool,
    ) -> Result<Self, DecodeError> {
        if channel_count == 0 || samples.len() < channel_count {
            return Err(DecodeError::Empty);
        }
        Ok(Self {
            mean: to_rgb_mean(samples, channel_count, has_alpha),
            pixels: samples.len() / channel_count,
        })
    }
}

/// Mean sample value of an interleaved buffer on a 0–255 scale.
///
/// `channel_count` counts every sample of a pixel, alpha included. Buffers
/// with more than three channels or with alpha are converted to RGB first
/// (alpha is dropped, CMYK uses `255 - min(255, c + k)`), so the mean is
/// always over gray or RGB samples. Returns 0 for an empty buffer.
pub fn to_rgb_mean(samples: &[u8], channel_count: usize, has_alpha: bool) -> f64 {
    if channel_count == 0 || samples.len() < channel_count {
        return 0.0;
    }

    if channel_count <= 3 && !has_alpha {
        let total: u64 = samples.iter().map(|&s| u64::from(s)).sum();
        return total as f64 / samples.len() as f64;
    }

    let color_channels = channel_count - usize::from(has_alpha);
    let mut total: u64 = 0;
    let mut count: u64 = 0;
    for pixel in samples.chunks_exact(channel_count) {
        let [r, g, b] = pixel_to_rgb(&pixel[..color_channels]);
        total += u64::from(r) + u64::from(g) + u64::from(b);
        count += 3;
    }
    if count == 0 {
        return 0.0;
    }
    total as f64 / count as f64
}

fn pixel_to_rgb(color: &[u8]) -> [u8; 3] {
    match *color {
        [] => [0, 0, 0],
        [g] => [g, g, g],
        [r, g, b] => [r, g, b],
        [c, m, y, k] => {
            let ink = |v: u8| 255u16.saturating_sub((u16::from(v) + u16::from(k)).min(255)) as u8;
            [ink(c), ink(m), ink(y)]
        }
        _ => {
            let sum: u32 = color.iter().map(|&v| u32::from(v)).sum();
            let gray = (sum / color.len() as u32) as u8;
            [gray, gray, gray]
        }
    }
}

/// Thin placements (rule lines, banner strips) are never candidates.
pub fn is_raster_candidate(placement: &RasterPlacement<'_>, thresholds: &ClassifierThresholds) -> bool {
    placement.rect.height() > thresholds.min_image_height
}

/// Maps a mean brightness onto a verdict.
pub fn classify_brightness(mean: f64, thresholds: &ClassifierThresholds) -> Classification {
    if mean < thresholds.dark_brightness_max {
        Classification::Redaction(MarkKind::BlackImage)
    } else if mean > thresholds.light_brightness_min {
        Classification::Redaction(MarkKind::WhiteImage)
    } else {
        Classification::Keep
    }
}
