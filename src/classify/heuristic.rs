//! Threshold-based redaction classifier.

use crate::error::DecodeError;
use crate::model::{DrawingPath, RasterPlacement};

use super::drawing::classify_drawing;
use super::raster::{classify_brightness, is_raster_candidate, PixelStats};
use super::strategy::{Classification, MarkClassifier};
use super::ClassifierThresholds;

/// Classifies solid near-black and near-white shapes and images as
/// redaction marks.
#[derive(Debug, Clone, Default)]
pub struct HeuristicClassifier {
    thresholds: ClassifierThresholds,
}

impl HeuristicClassifier {
    /// Creates a classifier with the default thresholds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the thresholds.
    pub fn with_thresholds(mut self, thresholds: ClassifierThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }
}

impl MarkClassifier for HeuristicClassifier {
    fn classify_path(&self, path: &DrawingPath) -> Classification {
        classify_drawing(path, &self.thresholds)
    }

    fn classify_raster(
        &self,
        placement: &RasterPlacement<'_>,
        decode: &mut dyn FnMut() -> Result<PixelStats, DecodeError>,
    ) -> Result<Classification, DecodeError> {
        if !is_raster_candidate(placement, &self.thresholds) {
            return Ok(Classification::Keep);
        }
        let stats = decode()?;
        Ok(classify_brightness(stats.mean, &self.thresholds))
    }

    fn strips_annotations(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "Heuristic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::MarkKind;
    use crate::geometry::{Matrix, Rect};
    use lopdf::{Dictionary, Stream};

    fn placement(stream: &Stream, height: f64) -> RasterPlacement<'_> {
        RasterPlacement {
            id: None,
            stream,
            matrix: Matrix::new(100.0, 0.0, 0.0, height, 0.0, 0.0),
            rect: Rect::new(0.0, 0.0, 100.0, height),
        }
    }

    fn stats(mean: f64) -> Result<PixelStats, DecodeError> {
        Ok(PixelStats { mean, pixels: 1 })
    }

    #[test]
    fn test_height_boundary() {
        let stream = Stream::new(Dictionary::new(), Vec::new());
        let classifier = HeuristicClassifier::new();

        let mut decoded = false;
        let verdict = classifier
            .classify_raster(&placement(&stream, 10.0), &mut || {
                decoded = true;
                stats(0.0)
            })
            .unwrap();
        assert_eq!(verdict, Classification::Keep);
        assert!(!decoded, "thin images must not be decoded");

        let verdict = classifier
            .classify_raster(&placement(&stream, 10.01), &mut || stats(0.0))
            .unwrap();
        assert_eq!(verdict, Classification::Redaction(MarkKind::BlackImage));
    }

    #[test]
    fn test_mid_brightness_keeps_regardless_of_size() {
        let stream = Stream::new(Dictionary::new(), Vec::new());
        let classifier = HeuristicClassifier::new();
        for mean in [15.5, 100.0, 239.9] {
            let verdict = classifier
                .classify_raster(&placement(&stream, 500.0), &mut || stats(mean))
                .unwrap();
            assert_eq!(verdict, Classification::Keep);
        }
    }

    #[test]
    fn test_decode_failure_is_returned() {
        let stream = Stream::new(Dictionary::new(), Vec::new());
        let classifier = HeuristicClassifier::new();
        let result = classifier.classify_raster(&placement(&stream, 50.0), &mut || {
            Err(DecodeError::UnsupportedFilter("JPXDecode".to_string()))
        });
        assert!(matches!(result, Err(DecodeError::UnsupportedFilter(_))));
    }

    #[test]
    fn test_custom_thresholds() {
        let stream = Stream::new(Dictionary::new(), Vec::new());
        let classifier = HeuristicClassifier::new().with_thresholds(ClassifierThresholds {
            min_image_height: 100.0,
            ..Default::default()
        });
        let verdict = classifier
            .classify_raster(&placement(&stream, 50.0), &mut || stats(0.0))
            .unwrap();
        assert_eq!(verdict, Classification::Keep);
    }
}
