//! Classifier trait and supporting types.
//!
//! This module defines the seam between page reconstruction and the
//! decision of which marks are redactions, allowing the heuristic
//! classifier and the pass-through mode to be swapped.

use crate::error::DecodeError;
use crate::model::{DrawingPath, RasterPlacement};

use super::raster::PixelStats;

/// Which tally a removed mark counts towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkKind {
    BlackImage,
    WhiteImage,
    BlackVector,
    WhiteVector,
}

/// The verdict for a single path or image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Keep,
    Redaction(MarkKind),
}

/// Decides which marks on a page are redaction overlays.
///
/// Implementations must be pure: the same input always yields the same
/// verdict, and no state is carried between calls, so one classifier can be
/// shared across documents processed in parallel.
pub trait MarkClassifier: Send + Sync {
    /// Classifies one painted vector path.
    fn classify_path(&self, path: &DrawingPath) -> Classification;

    /// Classifies one image placement.
    ///
    /// `decode` produces the image's brightness statistics. It is only
    /// invoked when the placement is a candidate at all, so ineligible
    /// images never pay for decoding.
    fn classify_raster(
        &self,
        placement: &RasterPlacement<'_>,
        decode: &mut dyn FnMut() -> Result<PixelStats, DecodeError>,
    ) -> Result<Classification, DecodeError>;

    /// Whether page annotations are dropped from the output.
    fn strips_annotations(&self) -> bool;

    /// Returns a human-readable name for this classifier.
    fn name(&self) -> &str;
}

/// Re-renders a document without altering it: every mark is kept and
/// annotations survive.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughClassifier;

impl MarkClassifier for PassThroughClassifier {
    fn classify_path(&self, _path: &DrawingPath) -> Classification {
        Classification::Keep
    }

    fn classify_raster(
        &self,
        _placement: &RasterPlacement<'_>,
        _decode: &mut dyn FnMut() -> Result<PixelStats, DecodeError>,
    ) -> Result<Classification, DecodeError> {
        Ok(Classification::Keep)
    }

    fn strips_annotations(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "PassThrough"
    }
}
