//! Custom assertions for unredaction testing.
//!
//! Provide readable failures when an output document does not look the way
//! a test expects.

use super::pdf_helpers::{count_operator, page_sizes, shown_text};

/// Asserts that both documents have the same number of pages and the same
/// page dimensions.
///
/// # Panics
/// Panics if a page count or a page size differs.
pub fn assert_same_geometry(input: &[u8], output: &[u8]) {
    let before = page_sizes(input).expect("input should be a readable PDF");
    let after = page_sizes(output).expect("output should be a readable PDF");
    assert_eq!(
        before.len(),
        after.len(),
        "Output should have {} pages but has {}",
        before.len(),
        after.len()
    );
    for (i, (a, b)) in before.iter().zip(&after).enumerate() {
        assert!(
            (a.0 - b.0).abs() < 1e-3 && (a.1 - b.1).abs() < 1e-3,
            "Page {} should be {:?} but is {:?}",
            i + 1,
            a,
            b
        );
    }
}

/// Asserts that `text` is shown on the page in the given fill color.
///
/// # Panics
/// Panics if the text is missing or drawn in another color.
pub fn assert_text_drawn(output: &[u8], page: u32, text: &str, color: &[f64]) {
    let shown = shown_text(output, page).expect("output page should decode");
    let found = shown.iter().find(|(t, _)| t == text);
    match found {
        Some((_, actual)) => assert_eq!(
            actual.as_slice(),
            color,
            "Text '{}' should be drawn in {:?} but is drawn in {:?}",
            text,
            color,
            actual
        ),
        None => panic!("Text '{}' should be on page {} but was not found in {:?}", text, page, shown),
    }
}

/// Asserts that no rectangle is drawn on the page.
///
/// # Panics
/// Panics if an `re` operator is present.
pub fn assert_no_rectangles(output: &[u8], page: u32) {
    let count = count_operator(output, page, "re").expect("output page should decode");
    assert_eq!(count, 0, "Page {} should have no rectangles but has {}", page, count);
}

/// Asserts that the page draws no images.
///
/// # Panics
/// Panics if a `Do` operator is present.
pub fn assert_no_images(output: &[u8], page: u32) {
    let count = count_operator(output, page, "Do").expect("output page should decode");
    assert_eq!(count, 0, "Page {} should have no images but has {}", page, count);
}
