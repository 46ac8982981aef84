//! End-to-end tests of the unredaction engine on synthetic documents.

use anyhow::Result;
use std::fs;
use tempfile::TempDir;
use unredactor::{
    RecoveredSpan, Statistics, UnredactError, UnredactOptions, UnredactionReport, Unredactor,
};

mod common;
use common::*;

fn engine() -> Unredactor {
    Unredactor::new(UnredactOptions::default())
}

fn assert_bbox(actual: [f64; 4], expected: [f64; 4]) {
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-6, "bbox {:?} should be {:?}", actual, expected);
    }
}

mod scenarios {
    use super::*;

    #[test]
    fn test_secret_under_black_box() -> Result<()> {
        let input = secret_document()?;
        let outcome = engine().process_bytes("secret.pdf", &input)?;

        assert_eq!(outcome.statistics.black_vec, 1);
        assert_eq!(outcome.statistics.removed(), 1);
        assert_eq!(outcome.report.original_file, "secret.pdf");
        assert_eq!(outcome.report.spans.len(), 1);
        let span = &outcome.report.spans[0];
        assert_eq!(span.page, 1);
        assert_eq!(span.text, "SECRET");
        assert_bbox(span.bbox, [20.0, 15.0, 90.0, 25.0]);

        assert_no_rectangles(&outcome.pdf, 1);
        assert_text_drawn(&outcome.pdf, 1, "SECRET", &[1.0, 0.0, 0.0]);
        assert_same_geometry(&input, &outcome.pdf);
        assert!(outcome.failures.is_empty());
        Ok(())
    }

    #[test]
    fn test_empty_black_box_recovers_nothing() -> Result<()> {
        let input = TestPdfBuilder::new()
            .with_text(300.0, 500.0, 12.0, "visible")
            .with_filled_rect(50.0, 50.0, 20.0, 20.0, 0.0)
            .to_bytes()?;
        let outcome = engine().process_bytes("empty.pdf", &input)?;

        assert_eq!(outcome.statistics.black_vec, 1);
        assert!(outcome.report.spans.is_empty());
        assert_text_drawn(&outcome.pdf, 1, "visible", &[0.0]);
        Ok(())
    }

    #[test]
    fn test_batch_with_one_unparsable_document() -> Result<()> {
        let dir = TempDir::new()?;
        let out = dir.path().join("out");
        let first = TestPdfBuilder::new().with_text(20.0, 700.0, 12.0, "one").build(&dir.path().join("a.pdf"))?;
        let second = TestPdfBuilder::new()
            .with_page_size(300.0, 400.0)
            .with_content_stream(b")))) ((((")
            .build(&dir.path().join("b.pdf"))?;
        let third = dir.path().join("c.pdf");
        fs::write(&third, secret_document()?)?;

        let inputs = vec![first, second, third];
        let results = engine().process_batch(&inputs, &out);
        assert_eq!(results.len(), 3);

        let outcomes: Vec<_> = results.into_iter().collect::<Result<Vec<_>, _>>()?;
        assert!(outcomes[0].failures.is_empty());
        assert_eq!(outcomes[1].failures.len(), 1);
        assert!(matches!(
            outcomes[1].failures[0],
            UnredactError::UnreadablePage { page: 1, .. }
        ));
        assert!(outcomes[2].failures.is_empty());
        assert_eq!(outcomes[2].statistics.black_vec, 1);

        let blank = fs::read(&outcomes[1].output)?;
        assert_eq!(page_sizes(&blank)?, vec![(300.0, 400.0)]);
        assert!(page_operations(&blank, 1)?.is_empty());
        for outcome in &outcomes {
            assert!(outcome.output.exists());
            assert!(outcome.report_path.exists());
        }
        Ok(())
    }
}

mod classification {
    use super::*;

    #[test]
    fn test_white_box_over_text() -> Result<()> {
        let input = TestPdfBuilder::new()
            .with_text(100.0, 400.0, 10.0, "hidden")
            .with_filled_rect(90.0, 390.0, 100.0, 30.0, 1.0)
            .to_bytes()?;
        let outcome = engine().process_bytes("white.pdf", &input)?;
        assert_eq!(outcome.statistics.white_vec, 1);
        assert_eq!(outcome.report.spans[0].text, "hidden");
        Ok(())
    }

    #[test]
    fn test_colored_box_is_kept() -> Result<()> {
        let input = TestPdfBuilder::new()
            .with_text(100.0, 400.0, 10.0, "label")
            .with_rgb_rect(90.0, 390.0, 100.0, 30.0, (0.5, 0.2, 0.2))
            .to_bytes()?;
        let outcome = engine().process_bytes("colored.pdf", &input)?;
        assert_eq!(outcome.statistics, Statistics { pages: 1, ..Default::default() });
        assert!(outcome.report.spans.is_empty());
        assert_eq!(count_operator(&outcome.pdf, 1, "re")?, 1);
        Ok(())
    }

    #[test]
    fn test_thick_black_stroke_is_removed_thin_is_kept() -> Result<()> {
        let input = TestPdfBuilder::new()
            .with_text(100.0, 400.0, 10.0, "struck")
            .with_black_line(90.0, 200.0, 403.0, 12.0)
            .with_black_line(90.0, 200.0, 300.0, 2.0)
            .to_bytes()?;
        let outcome = engine().process_bytes("lines.pdf", &input)?;
        assert_eq!(outcome.statistics.black_vec, 1);
        assert_eq!(count_operator(&outcome.pdf, 1, "S")?, 1);
        assert_eq!(outcome.report.spans.len(), 1);
        Ok(())
    }

    #[test]
    fn test_black_and_white_images() -> Result<()> {
        let input = TestPdfBuilder::new()
            .with_text(20.0, 100.0, 10.0, "under black")
            .with_image(10.0, 90.0, 200.0, 30.0, 0)
            .with_text(20.0, 300.0, 10.0, "under white")
            .with_image(10.0, 290.0, 200.0, 30.0, 255)
            .to_bytes()?;
        let outcome = engine().process_bytes("images.pdf", &input)?;
        assert_eq!(outcome.statistics.black_img, 1);
        assert_eq!(outcome.statistics.white_img, 1);
        assert_no_images(&outcome.pdf, 1);
        let texts: Vec<&str> = outcome.report.spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["under black", "under white"]);
        Ok(())
    }

    #[test]
    fn test_short_and_gray_images_are_kept() -> Result<()> {
        let input = TestPdfBuilder::new()
            .with_image(10.0, 90.0, 200.0, 10.0, 0)
            .with_image(10.0, 200.0, 200.0, 50.0, 128)
            .to_bytes()?;
        let outcome = engine().process_bytes("kept.pdf", &input)?;
        assert_eq!(outcome.statistics.removed(), 0);
        assert_eq!(count_operator(&outcome.pdf, 1, "Do")?, 2);
        Ok(())
    }

    #[test]
    fn test_annotations_are_stripped_and_counted() -> Result<()> {
        let input = TestPdfBuilder::new()
            .with_text(20.0, 700.0, 12.0, "annotated")
            .with_annotation()
            .with_annotation()
            .to_bytes()?;
        let outcome = engine().process_bytes("annots.pdf", &input)?;
        assert_eq!(outcome.statistics.annots, 2);
        assert_eq!(annotation_count(&outcome.pdf, 1)?, 0);
        Ok(())
    }
}

mod modes {
    use super::*;

    #[test]
    fn test_highlight_off_keeps_intrinsic_color() -> Result<()> {
        let input = secret_document()?;
        let engine = Unredactor::new(UnredactOptions::default().with_highlight_recovered(false));
        let outcome = engine.process_bytes("secret.pdf", &input)?;
        assert_eq!(outcome.report.spans.len(), 1);
        assert_text_drawn(&outcome.pdf, 1, "SECRET", &[0.0]);
        Ok(())
    }

    #[test]
    fn test_pass_through_keeps_everything() -> Result<()> {
        let input = TestPdfBuilder::new()
            .with_text(20.0, 17.0, 10.0, "SECRET")
            .with_filled_rect(10.0, 10.0, 100.0, 20.0, 0.0)
            .with_annotation()
            .to_bytes()?;
        let engine = Unredactor::new(UnredactOptions::default().with_remove_redactions(false));
        let outcome = engine.process_bytes("secret.pdf", &input)?;

        assert_eq!(outcome.statistics.removed(), 0);
        assert!(outcome.report.spans.is_empty());
        assert_eq!(count_operator(&outcome.pdf, 1, "re")?, 1);
        assert_eq!(annotation_count(&outcome.pdf, 1)?, 1);
        assert_text_drawn(&outcome.pdf, 1, "SECRET", &[0.0]);
        Ok(())
    }
}

mod properties {
    use super::*;

    #[test]
    fn test_second_pass_is_idempotent() -> Result<()> {
        let input = TestPdfBuilder::new()
            .with_text(20.0, 17.0, 10.0, "SECRET")
            .with_filled_rect(10.0, 10.0, 100.0, 20.0, 0.0)
            .with_image(10.0, 200.0, 200.0, 40.0, 255)
            .with_rgb_rect(300.0, 300.0, 50.0, 50.0, (0.1, 0.5, 0.9))
            .to_bytes()?;
        let first = engine().process_bytes("doc.pdf", &input)?;
        assert_eq!(first.statistics.removed(), 2);

        let second = engine().process_bytes("doc.pdf", &first.pdf)?;
        assert_eq!(second.statistics.removed(), 0);
        assert!(second.report.spans.is_empty());
        Ok(())
    }

    #[test]
    fn test_geometry_survives_unreadable_page() -> Result<()> {
        let input = TestPdfBuilder::new()
            .with_text(20.0, 700.0, 12.0, "first")
            .new_page(300.0, 400.0)
            .with_content_stream(b")))) ((((")
            .new_page(842.0, 595.0)
            .with_filled_rect(10.0, 10.0, 50.0, 50.0, 0.0)
            .to_bytes()?;
        let outcome = engine().process_bytes("mixed.pdf", &input)?;

        assert_same_geometry(&input, &outcome.pdf);
        assert_eq!(outcome.statistics.pages, 3);
        assert_eq!(outcome.statistics.unreadable_pages, 1);
        assert_eq!(outcome.statistics.black_vec, 1);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].page(), Some(2));
        Ok(())
    }

    #[test]
    fn test_rotation_is_preserved() -> Result<()> {
        let input = TestPdfBuilder::new().with_rotation(90).to_bytes()?;
        let outcome = engine().process_bytes("rotated.pdf", &input)?;
        let doc = load(&outcome.pdf)?;
        let page_id = *doc.get_pages().get(&1).expect("one page");
        let page = doc.get_dictionary(page_id)?;
        assert_eq!(page.get(b"Rotate")?.as_i64()?, 90);
        Ok(())
    }

    #[test]
    fn test_every_text_run_is_redrawn() -> Result<()> {
        let input = TestPdfBuilder::new()
            .with_text(20.0, 700.0, 12.0, "alpha")
            .with_text(20.0, 680.0, 12.0, "beta")
            .with_text(20.0, 17.0, 10.0, "SECRET")
            .with_filled_rect(10.0, 10.0, 100.0, 20.0, 0.0)
            .to_bytes()?;
        let outcome = engine().process_bytes("runs.pdf", &input)?;
        let shown: Vec<String> = shown_text(&outcome.pdf, 1)?.into_iter().map(|(t, _)| t).collect();
        assert_eq!(shown, vec!["alpha", "beta", "SECRET"]);
        assert!(outcome.report.spans.len() <= shown.len());
        Ok(())
    }
}

mod files {
    use super::*;

    #[test]
    fn test_process_file_writes_pdf_and_report() -> Result<()> {
        let dir = TempDir::new()?;
        let input = dir.path().join("memo.pdf");
        fs::write(&input, secret_document()?)?;
        let out = dir.path().join("nested").join("out");

        let outcome = engine().process_file(&input, &out)?;
        assert_eq!(outcome.output, out.join("memo_UNREDACTED.pdf"));
        assert_eq!(outcome.report_path, out.join("memo_UNREDACTED.json"));
        assert_eq!(outcome.spans, 1);

        let report: UnredactionReport = serde_json::from_str(&fs::read_to_string(&outcome.report_path)?)?;
        assert_eq!(report.original_file, "memo.pdf");
        assert_eq!(report.spans.len(), 1);
        let RecoveredSpan { page, text, .. } = &report.spans[0];
        assert_eq!((*page, text.as_str()), (1, "SECRET"));
        Ok(())
    }

    #[test]
    fn test_custom_output_name() -> Result<()> {
        let dir = TempDir::new()?;
        let input = dir.path().join("memo.pdf");
        fs::write(&input, secret_document()?)?;

        let engine = Unredactor::new(UnredactOptions::default().with_output_name("cleaned"));
        let outcome = engine.process_file(&input, dir.path())?;
        assert_eq!(outcome.output, dir.path().join("cleaned.pdf"));
        assert!(dir.path().join("cleaned.json").exists());
        Ok(())
    }

    #[test]
    fn test_missing_input_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = engine()
            .process_file(&dir.path().join("absent.pdf"), dir.path())
            .unwrap_err();
        assert!(matches!(err, UnredactError::Io { .. }));
    }

    #[test]
    fn test_analyze_matches_processing() -> Result<()> {
        let input = secret_document()?;
        let analysis = engine().analyze("secret.pdf", &input)?;
        assert_eq!(analysis.statistics.black_vec, 1);
        assert_eq!(analysis.report.spans.len(), 1);
        let json = serde_json::to_value(&analysis)?;
        assert_eq!(json["statistics"]["black_vec"], 1);
        assert_eq!(json["failures"].as_array().map(Vec::len), Some(0));
        Ok(())
    }

    #[test]
    fn test_printpdf_document_passes_through() -> Result<()> {
        let input = printpdf_document("Hello world")?;
        let outcome = engine().process_bytes("printed.pdf", &input)?;
        assert_eq!(outcome.statistics.removed(), 0);
        assert!(outcome.report.spans.is_empty());
        assert_same_geometry(&input, &outcome.pdf);
        assert!(count_operator(&outcome.pdf, 1, "Tj")? >= 1);
        Ok(())
    }
}
