//! PDF redaction-overlay detection and removal.
//!
//! Many "redacted" PDFs only paint an opaque box over text that is still
//! present in the content stream. This library finds those boxes (solid
//! near-black or near-white vector shapes and images), rebuilds every page
//! without them, and reports the text that was hidden underneath.
//!
//! # Architecture
//!
//! - [`geometry`] and [`model`]: page-space primitives and the interpreted
//!   page content
//! - [`pdf`]: content-stream interpretation, font and image decoding, output
//!   writing on top of lopdf
//! - [`classify`]: the [`MarkClassifier`] seam and its heuristic and
//!   pass-through implementations
//! - [`reconstruct`] and [`correlate`]: page rebuilding and recovered-text
//!   matching
//! - [`assembler`]: the [`Unredactor`] engine driving whole documents and
//!   batches
//! - [`report`] and [`error`]: outputs and failures
//!
//! # Quick Start
//!
//! ```no_run
//! use unredactor::{UnredactOptions, Unredactor};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Unredactor::new(UnredactOptions::default());
//! let outcome = engine.process_file(Path::new("filing.pdf"), Path::new("out"))?;
//!
//! println!(
//!     "{} spans recovered, written to {}",
//!     outcome.spans,
//!     outcome.output.display()
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom thresholds
//!
//! ```
//! use unredactor::{ClassifierThresholds, UnredactOptions, Unredactor};
//!
//! let thresholds = ClassifierThresholds {
//!     min_stroke_width: 6.0,
//!     ..Default::default()
//! };
//! let engine = Unredactor::new(UnredactOptions::default().with_thresholds(thresholds));
//! assert_eq!(engine.options().thresholds.min_stroke_width, 6.0);
//! ```

pub mod assembler;
pub mod classify;
pub mod correlate;
pub mod error;
pub mod geometry;
pub mod model;
pub mod pdf;
pub mod reconstruct;
pub mod report;

pub use assembler::{collect_pdfs, Analysis, DocumentOutcome, FileOutcome, UnredactOptions, Unredactor};
pub use classify::{
    ClassifierThresholds, Classification, HeuristicClassifier, MarkClassifier, MarkKind, PassThroughClassifier,
};
pub use error::{DecodeError, UnredactError, UnredactResult};
pub use report::{write_summary_csv, RecoveredSpan, Statistics, StatisticsRow, UnredactionReport};
