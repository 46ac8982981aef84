//! Page reconstruction.
//!
//! A page is interpreted, every graphic is put through the classifier, and
//! the survivors are drawn onto a fresh page together with all of the text.
//! Nothing of the original content stream is copied, so a removed mark
//! cannot survive in some hidden form.

use lopdf::{Document, Object, ObjectId};
use tracing::{debug, warn};

use crate::classify::{Classification, MarkClassifier};
use crate::correlate::correlate;
use crate::error::UnredactError;
use crate::geometry::Color;
use crate::model::{PageContent, PageElement, RemovedRegion, TextRun};
use crate::pdf::objects::{page_box, page_rotation, resolve, resolve_array};
use crate::pdf::{decode_pixel_stats, ContentInterpreter, OutputDocument};
use crate::report::{RecoveredSpan, Statistics};

/// The graphics that survive classification, and what was taken away.
#[derive(Debug, Default)]
pub struct ClassifiedPage<'a> {
    /// Kept paths and images, in content-stream order.
    pub kept: Vec<PageElement<'a>>,
    /// Every text run, in content-stream order.
    pub text_runs: Vec<TextRun>,
    pub removed_regions: Vec<RemovedRegion>,
    pub statistics: Statistics,
    pub failures: Vec<UnredactError>,
}

/// Splits a page's content into kept elements and removed regions.
///
/// Images that cannot be decoded are kept and reported as failures, as is
/// content the interpreter had to skip.
pub fn classify_page<'a>(
    doc: &'a Document,
    content: PageContent<'a>,
    classifier: &dyn MarkClassifier,
    page_number: u32,
) -> ClassifiedPage<'a> {
    let mut page = ClassifiedPage::default();

    if !content.skipped.is_empty() {
        page.statistics.incomplete_content = 1;
    }
    page.failures.extend(content.skipped.into_iter().map(|reason| UnredactError::IncompleteContent {
        page: page_number,
        reason,
    }));

    for element in content.elements {
        match element {
            PageElement::Text(run) => page.text_runs.push(run),
            PageElement::Path(path) => match classifier.classify_path(&path) {
                Classification::Redaction(kind) => {
                    page.statistics.record(kind);
                    page.removed_regions.push(RemovedRegion {
                        rect: path.painted_rect(),
                        kind,
                    });
                }
                Classification::Keep => page.kept.push(PageElement::Path(path)),
            },
            PageElement::Raster(placement) => {
                let stream = placement.stream;
                let verdict = classifier.classify_raster(&placement, &mut || decode_pixel_stats(doc, stream));
                match verdict {
                    Ok(Classification::Redaction(kind)) => {
                        page.statistics.record(kind);
                        page.removed_regions.push(RemovedRegion {
                            rect: placement.rect,
                            kind,
                        });
                    }
                    Ok(Classification::Keep) => page.kept.push(PageElement::Raster(placement)),
                    Err(source) => {
                        warn!(page = page_number, error = %source, "Keeping image that could not be decoded");
                        page.statistics.undecodable_images += 1;
                        page.failures.push(UnredactError::UndecodableImage {
                            page: page_number,
                            source,
                        });
                        page.kept.push(PageElement::Raster(placement));
                    }
                }
            }
        }
    }
    page
}

/// The annotation entries of a page.
pub fn page_annotations(doc: &Document, page_id: ObjectId) -> Vec<&Object> {
    doc.get_dictionary(page_id)
        .ok()
        .and_then(|page| page.get(b"Annots").ok())
        .and_then(|annots| resolve_array(doc, annots))
        .map(|items| {
            items
                .iter()
                .filter(|item| matches!(resolve(doc, item), Some((_, Object::Dictionary(_)))))
                .collect()
        })
        .unwrap_or_default()
}

/// What rebuilding one page produced.
#[derive(Debug, Default)]
pub struct PageOutcome {
    pub spans: Vec<RecoveredSpan>,
    pub removed_regions: Vec<RemovedRegion>,
    pub statistics: Statistics,
    pub failures: Vec<UnredactError>,
}

/// Rebuilds source pages into an output document.
pub struct PageReconstructor<'c> {
    classifier: &'c dyn MarkClassifier,
    highlight_recovered: bool,
}

impl<'c> PageReconstructor<'c> {
    pub fn new(classifier: &'c dyn MarkClassifier) -> Self {
        Self {
            classifier,
            highlight_recovered: true,
        }
    }

    /// Draw covered text in red instead of its own color.
    pub fn with_highlight(mut self, highlight: bool) -> Self {
        self.highlight_recovered = highlight;
        self
    }

    /// Rebuilds page `page_number` (1-based) of `source` onto `output`.
    ///
    /// A page whose content stream is malformed becomes a blank page of the
    /// same size; the failure is returned in the outcome. Only an error while
    /// encoding the new page is propagated.
    pub fn rebuild_page<'a>(
        &self,
        source: &'a Document,
        interpreter: &mut ContentInterpreter<'a>,
        page_id: ObjectId,
        page_number: u32,
        output: &mut OutputDocument,
    ) -> lopdf::Result<PageOutcome> {
        let visible = page_box(source, page_id);
        let rotation = page_rotation(source, page_id);
        let mut outcome = PageOutcome::default();
        outcome.statistics.pages = 1;

        let content = match interpreter.interpret_page(page_id) {
            Ok(content) => content,
            Err(e) => {
                warn!(page = page_number, error = %e, "Replacing unreadable page with a blank page");
                output.add_blank_page(visible, rotation);
                outcome.statistics.unreadable_pages = 1;
                outcome.failures.push(UnredactError::UnreadablePage {
                    page: page_number,
                    reason: e.to_string(),
                });
                return Ok(outcome);
            }
        };

        let classified = classify_page(source, content, self.classifier, page_number);
        let correlation = correlate(page_number, &classified.text_runs, &classified.removed_regions);

        let mut writer = output.begin_page(source, visible, rotation);
        for element in &classified.kept {
            match element {
                PageElement::Path(path) => writer.draw_path(path),
                PageElement::Raster(placement) => writer.draw_raster(placement),
                PageElement::Text(_) => {}
            }
        }
        for (run, covered) in classified.text_runs.iter().zip(&correlation.covered) {
            let color = if *covered && self.highlight_recovered {
                Color::RED
            } else {
                run.color
            };
            writer.draw_text(run, &color);
        }

        let mut statistics = classified.statistics;
        let annotations = page_annotations(source, page_id);
        if self.classifier.strips_annotations() {
            statistics.annots += annotations.len() as u32;
        } else {
            for annotation in annotations {
                writer.copy_annotation(annotation);
            }
        }
        writer.finish()?;

        debug!(
            page = page_number,
            kept = classified.kept.len(),
            removed = classified.removed_regions.len(),
            text_runs = classified.text_runs.len(),
            recovered = correlation.spans.len(),
            "Rebuilt page"
        );

        statistics.pages = 1;
        outcome.statistics = statistics;
        outcome.spans = correlation.spans;
        outcome.removed_regions = classified.removed_regions;
        outcome.failures = classified.failures;
        Ok(outcome)
    }
}
