//! Matching recovered text against the marks that covered it.

use crate::model::{RemovedRegion, TextRun};
use crate::report::RecoveredSpan;

/// Which runs of a page were covered, and the spans recorded for them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Correlation {
    /// One flag per input run, in input order.
    pub covered: Vec<bool>,
    pub spans: Vec<RecoveredSpan>,
}

/// A run counts as covered when its bbox intersects any removed region.
/// Each covered run yields exactly one span however many regions it touches.
pub fn correlate(page: u32, runs: &[TextRun], regions: &[RemovedRegion]) -> Correlation {
    let mut correlation = Correlation {
        covered: Vec::with_capacity(runs.len()),
        spans: Vec::new(),
    };
    for run in runs {
        let covered = regions.iter().any(|region| run.bbox.intersects(&region.rect));
        correlation.covered.push(covered);
        if covered {
            correlation.spans.push(RecoveredSpan {
                page,
                text: run.text.trim().to_string(),
                bbox: run.bbox.to_array(),
            });
        }
    }
    correlation
}
