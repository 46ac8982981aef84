//! Test fixtures and PDF builders.
//!
//! Documents are assembled with lopdf so every content stream is exactly
//! what the test wrote. Text is shown with a font whose metrics are fixed,
//! which makes text bounding boxes predictable:
//! ascent 0.8 em, descent 0.2 em, `C E R S` one em wide, `T` two ems wide,
//! every other character half an em.

use anyhow::Result;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::fs;
use std::path::{Path, PathBuf};

/// A solid single-color image to place on a page.
#[derive(Debug, Clone)]
struct TestImage {
    gray: u8,
    pixels: (i64, i64),
}

#[derive(Debug, Clone)]
struct TestPage {
    width: f64,
    height: f64,
    rotate: Option<i64>,
    content: Vec<u8>,
    images: Vec<TestImage>,
    annotations: usize,
}

impl TestPage {
    fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            rotate: None,
            content: Vec::new(),
            images: Vec::new(),
            annotations: 0,
        }
    }

    fn push(&mut self, ops: &str) {
        self.content.extend_from_slice(ops.as_bytes());
        self.content.push(b'\n');
    }
}

/// Builder for creating synthetic test PDFs.
///
/// # Example
///
/// ```no_run
/// # use anyhow::Result;
/// # fn main() -> Result<()> {
/// let bytes = TestPdfBuilder::new()
///     .with_text(20.0, 17.0, 10.0, "SECRET")
///     .with_filled_rect(10.0, 10.0, 100.0, 20.0, 0.0)
///     .to_bytes()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TestPdfBuilder {
    pages: Vec<TestPage>,
}

impl TestPdfBuilder {
    /// Creates a builder with one US Letter page.
    pub fn new() -> Self {
        Self {
            pages: vec![TestPage::new(612.0, 792.0)],
        }
    }

    /// Starts a new page; subsequent `with_*` calls draw on it.
    pub fn new_page(mut self, width: f64, height: f64) -> Self {
        self.pages.push(TestPage::new(width, height));
        self
    }

    /// Resizes the current page.
    pub fn with_page_size(mut self, width: f64, height: f64) -> Self {
        let page = self.current();
        page.width = width;
        page.height = height;
        self
    }

    pub fn with_rotation(mut self, degrees: i64) -> Self {
        self.current().rotate = Some(degrees);
        self
    }

    /// Shows `text` with its baseline origin at `(x, y)`.
    pub fn with_text(mut self, x: f64, y: f64, size: f64, text: &str) -> Self {
        let escaped = text.replace('\\', "\\\\").replace('(', "\\(").replace(')', "\\)");
        self.current().push(&format!(
            "BT /F1 {} Tf 1 0 0 1 {} {} Tm ({}) Tj ET",
            size, x, y, escaped
        ));
        self
    }

    /// Fills a rectangle with a gray level (0 black, 1 white).
    pub fn with_filled_rect(mut self, x: f64, y: f64, w: f64, h: f64, gray: f64) -> Self {
        self.current()
            .push(&format!("q {} g {} {} {} {} re f Q", gray, x, y, w, h));
        self
    }

    /// Fills a rectangle with an RGB color.
    pub fn with_rgb_rect(mut self, x: f64, y: f64, w: f64, h: f64, rgb: (f64, f64, f64)) -> Self {
        self.current().push(&format!(
            "q {} {} {} rg {} {} {} {} re f Q",
            rgb.0, rgb.1, rgb.2, x, y, w, h
        ));
        self
    }

    /// Strokes a black horizontal line.
    pub fn with_black_line(mut self, x0: f64, x1: f64, y: f64, width: f64) -> Self {
        self.current()
            .push(&format!("q 0 G {} w {} {} m {} {} l S Q", width, x0, y, x1, y));
        self
    }

    /// Places a solid gray image stretched over a rectangle.
    pub fn with_image(mut self, x: f64, y: f64, w: f64, h: f64, gray: u8) -> Self {
        let page = self.current();
        let name = format!("Im{}", page.images.len());
        page.images.push(TestImage {
            gray,
            pixels: (8, 8),
        });
        page.push(&format!("q {} 0 0 {} {} {} cm /{} Do Q", w, h, x, y, name));
        self
    }

    /// Adds a square annotation.
    pub fn with_annotation(mut self) -> Self {
        self.current().annotations += 1;
        self
    }

    /// Appends raw operators to the current page's content stream.
    pub fn with_raw_content(mut self, content: &[u8]) -> Self {
        self.current().content.extend_from_slice(content);
        self
    }

    /// Replaces the current page's content stream.
    pub fn with_content_stream(mut self, content: &[u8]) -> Self {
        self.current().content = content.to_vec();
        self
    }

    fn current(&mut self) -> &mut TestPage {
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    /// Serializes the document.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = add_metric_font(&mut doc);

        let mut kids = Vec::new();
        for page in &self.pages {
            kids.push(Object::Reference(add_page(&mut doc, pages_id, font_id, page)));
        }
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)?;
        Ok(bytes)
    }

    /// Builds the PDF and writes it to the specified path.
    pub fn build(&self, output_path: &Path) -> Result<PathBuf> {
        fs::write(output_path, self.to_bytes()?)?;
        Ok(output_path.to_path_buf())
    }
}

impl Default for TestPdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn add_metric_font(doc: &mut Document) -> ObjectId {
    let descriptor_id = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => "TestSans",
        "Ascent" => 800,
        "Descent" => -200,
        "Flags" => 32,
    });
    // codes 67 ('C') through 84 ('T')
    let widths: Vec<Object> = (67u8..=84)
        .map(|code| match code {
            b'C' | b'E' | b'R' | b'S' => Object::Integer(1000),
            b'T' => Object::Integer(2000),
            _ => Object::Integer(500),
        })
        .collect();
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "TestSans",
        "Encoding" => "WinAnsiEncoding",
        "FirstChar" => 67,
        "LastChar" => 84,
        "Widths" => widths,
        "FontDescriptor" => descriptor_id,
    })
}

fn add_page(doc: &mut Document, pages_id: ObjectId, font_id: ObjectId, page: &TestPage) -> ObjectId {
    let mut xobjects = Dictionary::new();
    for (i, image) in page.images.iter().enumerate() {
        let (w, h) = image.pixels;
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => w,
                "Height" => h,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![image.gray; (w * h) as usize],
        ));
        xobjects.set(format!("Im{}", i), image_id);
    }

    let annots: Vec<Object> = (0..page.annotations)
        .map(|i| {
            let offset = 50 + 30 * i as i64;
            Object::Reference(doc.add_object(dictionary! {
                "Type" => "Annot",
                "Subtype" => "Square",
                "Rect" => vec![offset.into(), offset.into(), (offset + 20).into(), (offset + 20).into()],
                "Contents" => Object::String(b"note".to_vec(), StringFormat::Literal),
            }))
        })
        .collect();

    let content_id = doc.add_object(Stream::new(dictionary! {}, page.content.clone()));
    let mut dict = dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), Object::Real(page.width as _), Object::Real(page.height as _)],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => font_id },
            "XObject" => xobjects,
        },
    };
    if let Some(rotate) = page.rotate {
        dict.set("Rotate", rotate);
    }
    if !annots.is_empty() {
        dict.set("Annots", annots);
    }
    doc.add_object(dict)
}

/// The one-page document with "SECRET" under a black box: the text's
/// bbox is `[20, 15, 90, 25]`, the box is `[10, 10, 110, 30]`.
pub fn secret_document() -> Result<Vec<u8>> {
    TestPdfBuilder::new()
        .with_text(20.0, 17.0, 10.0, "SECRET")
        .with_filled_rect(10.0, 10.0, 100.0, 20.0, 0.0)
        .to_bytes()
}

/// A text-only document produced by printpdf.
pub fn printpdf_document(text: &str) -> Result<Vec<u8>> {
    use printpdf::{BuiltinFont, Mm, PdfDocument};

    let (doc, page, layer) = PdfDocument::new("Fixture", Mm(210.0), Mm(297.0), "Layer 1");
    let font = doc.add_builtin_font(BuiltinFont::Helvetica)?;
    doc.get_page(page)
        .get_layer(layer)
        .use_text(text, 12.0, Mm(20.0), Mm(270.0), &font);
    Ok(doc.save_to_bytes()?)
}
