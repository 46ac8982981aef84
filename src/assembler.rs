//! Document assembly.
//!
//! [`Unredactor`] drives the page reconstructor over every page of a
//! document, sums the statistics, serializes the rebuilt PDF and collects the
//! recovered spans into a report. Batches run documents in parallel and never
//! abort because one document failed.

use std::fs;
use std::path::{Path, PathBuf};

use lopdf::Document;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::classify::{ClassifierThresholds, HeuristicClassifier, MarkClassifier, PassThroughClassifier};
use crate::error::{UnredactError, UnredactResult};
use crate::pdf::{ContentInterpreter, OutputDocument};
use crate::reconstruct::PageReconstructor;
use crate::report::{Statistics, UnredactionReport};

/// Suffix of default output names: `report.pdf` becomes
/// `report_UNREDACTED.pdf`.
pub const DEFAULT_OUTPUT_SUFFIX: &str = "_UNREDACTED";

/// Processing mode and naming options.
#[derive(Debug, Clone, PartialEq)]
pub struct UnredactOptions {
    /// Classify and strip redaction marks and annotations. When false the
    /// document is re-rendered unchanged.
    pub remove_redactions: bool,
    /// Draw recovered text in red.
    pub highlight_recovered: bool,
    /// Output file name for single-file input.
    pub output_name: Option<String>,
    pub thresholds: ClassifierThresholds,
}

impl Default for UnredactOptions {
    fn default() -> Self {
        Self {
            remove_redactions: true,
            highlight_recovered: true,
            output_name: None,
            thresholds: ClassifierThresholds::default(),
        }
    }
}

impl UnredactOptions {
    pub fn with_remove_redactions(mut self, remove: bool) -> Self {
        self.remove_redactions = remove;
        self
    }

    pub fn with_highlight_recovered(mut self, highlight: bool) -> Self {
        self.highlight_recovered = highlight;
        self
    }

    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }

    pub fn with_thresholds(mut self, thresholds: ClassifierThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }
}

/// The result of processing one document in memory.
#[derive(Debug)]
pub struct DocumentOutcome {
    pub pdf: Vec<u8>,
    pub report: UnredactionReport,
    pub statistics: Statistics,
    /// Recovered page and image failures, in page order.
    pub failures: Vec<UnredactError>,
}

/// Report and statistics of a document, without the rebuilt PDF.
#[derive(Debug, Serialize)]
pub struct Analysis {
    pub report: UnredactionReport,
    pub statistics: Statistics,
    #[serde(serialize_with = "failure_messages")]
    pub failures: Vec<UnredactError>,
}

#[allow(clippy::ptr_arg)]
fn failure_messages<S: serde::Serializer>(failures: &Vec<UnredactError>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(failures.iter().map(ToString::to_string))
}

/// The result of processing one file on disk.
#[derive(Debug)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    pub report_path: PathBuf,
    pub statistics: Statistics,
    pub spans: usize,
    pub failures: Vec<UnredactError>,
}

impl FileOutcome {
    /// File name of the input, as used in the report and summary.
    pub fn filename(&self) -> String {
        file_name(&self.input)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Appends `.pdf` unless the name already ends with it, in any case.
pub fn normalize_output_name(name: &str) -> String {
    if name.to_ascii_lowercase().ends_with(".pdf") {
        name.to_string()
    } else {
        format!("{}.pdf", name)
    }
}

/// Unredaction engine.
pub struct Unredactor {
    classifier: Box<dyn MarkClassifier>,
    options: UnredactOptions,
}

impl Default for Unredactor {
    fn default() -> Self {
        Self::new(UnredactOptions::default())
    }
}

impl Unredactor {
    /// Creates an engine whose classifier follows `options.remove_redactions`.
    pub fn new(options: UnredactOptions) -> Self {
        let classifier: Box<dyn MarkClassifier> = if options.remove_redactions {
            Box::new(HeuristicClassifier::new().with_thresholds(options.thresholds))
        } else {
            Box::new(PassThroughClassifier)
        };
        Self { classifier, options }
    }

    /// Creates an engine with a custom classifier.
    pub fn with_classifier(options: UnredactOptions, classifier: Box<dyn MarkClassifier>) -> Self {
        Self { classifier, options }
    }

    pub fn options(&self) -> &UnredactOptions {
        &self.options
    }

    /// Rebuilds a document held in memory.
    ///
    /// Page-level failures are recovered and listed in the outcome; only an
    /// unreadable container or a failed serialization is returned as an error.
    #[instrument(skip(self, bytes), fields(classifier = self.classifier.name()))]
    pub fn process_bytes(&self, original_file: &str, bytes: &[u8]) -> UnredactResult<DocumentOutcome> {
        let doc = Document::load_mem(bytes).map_err(|e| UnredactError::UnreadableDocument {
            name: original_file.to_string(),
            source: Some(Box::new(e)),
        })?;

        let reconstructor =
            PageReconstructor::new(self.classifier.as_ref()).with_highlight(self.options.highlight_recovered);
        let mut interpreter = ContentInterpreter::new(&doc);
        let mut output = OutputDocument::new();
        let mut report = UnredactionReport::new(original_file);
        let mut statistics = Statistics::default();
        let mut failures = Vec::new();

        for (page_number, page_id) in doc.get_pages() {
            let outcome = reconstructor
                .rebuild_page(&doc, &mut interpreter, page_id, page_number, &mut output)
                .map_err(|e| UnredactError::WriteFailure {
                    name: original_file.to_string(),
                    source: Some(Box::new(e)),
                })?;
            statistics.merge(&outcome.statistics);
            report.spans.extend(outcome.spans);
            failures.extend(outcome.failures);
        }

        let pdf = output.finish().map_err(|e| UnredactError::WriteFailure {
            name: original_file.to_string(),
            source: Some(Box::new(e)),
        })?;

        info!(
            pages = statistics.pages,
            black_images = statistics.black_img,
            white_images = statistics.white_img,
            black_vectors = statistics.black_vec,
            white_vectors = statistics.white_vec,
            annotations = statistics.annots,
            spans = report.spans.len(),
            failures = failures.len(),
            "Document rebuilt"
        );

        Ok(DocumentOutcome {
            pdf,
            report,
            statistics,
            failures,
        })
    }

    /// Computes the report and statistics of a document without keeping the
    /// rebuilt PDF.
    pub fn analyze(&self, original_file: &str, bytes: &[u8]) -> UnredactResult<Analysis> {
        let outcome = self.process_bytes(original_file, bytes)?;
        Ok(Analysis {
            report: outcome.report,
            statistics: outcome.statistics,
            failures: outcome.failures,
        })
    }

    /// Output PDF and report paths for `input` inside `output_dir`.
    pub fn output_paths(&self, input: &Path, output_dir: &Path, name: Option<&str>) -> (PathBuf, PathBuf) {
        let file = match name {
            Some(name) => normalize_output_name(name),
            None => {
                let stem = input
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "output".to_string());
                format!("{}{}.pdf", stem, DEFAULT_OUTPUT_SUFFIX)
            }
        };
        let pdf = output_dir.join(file);
        let report = pdf.with_extension("json");
        (pdf, report)
    }

    /// Processes one file, honoring `output_name`, and writes the rebuilt PDF
    /// and its JSON report into `output_dir`.
    pub fn process_file(&self, input: &Path, output_dir: &Path) -> UnredactResult<FileOutcome> {
        if let Some(name) = &self.options.output_name {
            if name.trim().is_empty() {
                return Err(UnredactError::InvalidInput {
                    parameter: "output_name".to_string(),
                    reason: "Output name cannot be empty".to_string(),
                });
            }
        }
        self.process_file_as(input, output_dir, self.options.output_name.as_deref())
    }

    #[instrument(skip(self, input, output_dir), fields(input = %input.display()))]
    fn process_file_as(&self, input: &Path, output_dir: &Path, name: Option<&str>) -> UnredactResult<FileOutcome> {
        let bytes = fs::read(input).map_err(|source| UnredactError::Io {
            path: input.to_path_buf(),
            source,
        })?;
        let original_file = file_name(input);
        let outcome = self.process_bytes(&original_file, &bytes)?;

        fs::create_dir_all(output_dir).map_err(|source| UnredactError::Io {
            path: output_dir.to_path_buf(),
            source,
        })?;
        let (output, report_path) = self.output_paths(input, output_dir, name);

        fs::write(&output, &outcome.pdf).map_err(|source| UnredactError::Io {
            path: output.clone(),
            source,
        })?;
        let json = outcome.report.to_json().map_err(|e| UnredactError::WriteFailure {
            name: original_file.clone(),
            source: Some(Box::new(e)),
        })?;
        fs::write(&report_path, json).map_err(|source| UnredactError::Io {
            path: report_path.clone(),
            source,
        })?;

        info!(output = %output.display(), "Wrote unredacted document");
        Ok(FileOutcome {
            input: input.to_path_buf(),
            output,
            report_path,
            statistics: outcome.statistics,
            spans: outcome.report.spans.len(),
            failures: outcome.failures,
        })
    }

    /// Processes several files in parallel with default output names.
    /// Results are returned in input order; one failure never stops the rest.
    pub fn process_batch(&self, inputs: &[PathBuf], output_dir: &Path) -> Vec<UnredactResult<FileOutcome>> {
        inputs
            .par_iter()
            .map(|input| {
                let result = self.process_file_as(input, output_dir, None);
                if let Err(e) = &result {
                    warn!(input = %input.display(), error = %e, "Document failed");
                }
                result
            })
            .collect()
    }
}

/// The `*.pdf` files of a directory, sorted by path.
pub fn collect_pdfs(dir: &Path) -> UnredactResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|source| UnredactError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut pdfs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map_or(false, |ext| ext.to_string_lossy().eq_ignore_ascii_case("pdf"))
        })
        .collect();
    pdfs.sort();
    Ok(pdfs)
}
