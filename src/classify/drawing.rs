//! Vector path rules.

use crate::model::DrawingPath;

use super::strategy::{Classification, MarkKind};
use super::ClassifierThresholds;

/// Classifies a painted path. Rules are evaluated in order; the first match
/// wins:
///
/// 1. near-black fill on a shape larger than the minimum extent;
/// 2. near-black stroke wider than the minimum stroke width;
/// 3. near-white fill on a shape larger than the minimum extent.
pub fn classify_drawing(path: &DrawingPath, thresholds: &ClassifierThresholds) -> Classification {
    let large_enough = path.rect.width() > thresholds.min_mark_extent
        && path.rect.height() > thresholds.min_mark_extent;

    if let Some(fill) = path.style.fill {
        if fill.all_channels(|c| c < thresholds.dark_channel_max) && large_enough {
            return Classification::Redaction(MarkKind::BlackVector);
        }
    }

    if let Some(stroke) = path.style.stroke {
        if stroke.color.all_channels(|c| c < thresholds.dark_channel_max)
            && stroke.width > thresholds.min_stroke_width
        {
            return Classification::Redaction(MarkKind::BlackVector);
        }
    }

    if let Some(fill) = path.style.fill {
        if fill.all_channels(|c| c > thresholds.light_channel_min) && large_enough {
            return Classification::Redaction(MarkKind::WhiteVector);
        }
    }

    Classification::Keep
}
