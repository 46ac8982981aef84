//! PDF inspection helpers.

use anyhow::{anyhow, Result};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object};

/// Loads a PDF from memory.
pub fn load(bytes: &[u8]) -> Result<Document> {
    Document::load_mem(bytes).map_err(|e| anyhow!("Failed to load PDF: {}", e))
}

fn number(object: &Object) -> f64 {
    match object {
        Object::Integer(i) => *i as f64,
        Object::Real(r) => f64::from(*r),
        other => panic!("expected a number, found {:?}", other),
    }
}

/// Width and height of every page's MediaBox, in page order.
pub fn page_sizes(bytes: &[u8]) -> Result<Vec<(f64, f64)>> {
    let doc = load(bytes)?;
    doc.get_pages()
        .values()
        .map(|id| -> Result<(f64, f64)> {
            let page = doc.get_dictionary(*id)?;
            let items = page.get(b"MediaBox")?.as_array()?;
            let v: Vec<f64> = items.iter().map(number).collect();
            Ok(((v[2] - v[0]).abs(), (v[3] - v[1]).abs()))
        })
        .collect()
}

/// Decoded operators of a 1-based page.
pub fn page_operations(bytes: &[u8], page: u32) -> Result<Vec<Operation>> {
    let doc = load(bytes)?;
    let page_id = *doc
        .get_pages()
        .get(&page)
        .ok_or_else(|| anyhow!("no page {}", page))?;
    let content = doc.get_page_content(page_id)?;
    Ok(Content::decode(&content)?.operations)
}

/// How many times `operator` occurs on a page.
pub fn count_operator(bytes: &[u8], page: u32, operator: &str) -> Result<usize> {
    Ok(page_operations(bytes, page)?
        .iter()
        .filter(|op| op.operator == operator)
        .count())
}

/// Strings shown with `Tj` on a page, with the fill color set before each.
pub fn shown_text(bytes: &[u8], page: u32) -> Result<Vec<(String, Vec<f64>)>> {
    let mut color = vec![0.0];
    let mut shown = Vec::new();
    for op in page_operations(bytes, page)? {
        match op.operator.as_str() {
            "g" | "rg" | "k" => color = op.operands.iter().map(number).collect(),
            "Tj" => {
                if let Some(Object::String(text, _)) = op.operands.first() {
                    shown.push((String::from_utf8_lossy(text).into_owned(), color.clone()));
                }
            }
            _ => {}
        }
    }
    Ok(shown)
}

/// Number of annotations on a page.
pub fn annotation_count(bytes: &[u8], page: u32) -> Result<usize> {
    let doc = load(bytes)?;
    let page_id = *doc
        .get_pages()
        .get(&page)
        .ok_or_else(|| anyhow!("no page {}", page))?;
    let page = doc.get_dictionary(page_id)?;
    Ok(match page.get(b"Annots") {
        Ok(Object::Array(items)) => items.len(),
        _ => 0,
    })
}
