//! Output document construction.
//!
//! Rebuilt pages are drawn from scratch: the writer never copies a source
//! content stream, only the image XObjects and annotations that survive
//! classification, deep-copied with their dependencies.

use std::collections::HashMap;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::warn;

use crate::geometry::{Color, Point, Rect};
use crate::model::{DrawingPath, PathSegment, RasterPlacement, TextRun};

use super::encoding::encode_win_ansi_lossy;
use super::objects::{real, rect_to_array};

/// Resource name of the shared text font on every rebuilt page.
const TEXT_FONT: &str = "F1";

/// Deep-copies objects from one source document, memoized per source id so
/// shared resources are copied once.
#[derive(Debug, Default)]
struct ObjectCopier {
    copied: HashMap<ObjectId, ObjectId>,
}

impl ObjectCopier {
    fn copy_reference(&mut self, source: &Document, target: &mut Document, id: ObjectId) -> Object {
        if let Some(new_id) = self.copied.get(&id) {
            return Object::Reference(*new_id);
        }
        match source.get_object(id) {
            Ok(object) => {
                // reserve first so cycles resolve to the same id
                let new_id = target.new_object_id();
                self.copied.insert(id, new_id);
                let cloned = self.copy(source, target, object);
                target.objects.insert(new_id, cloned);
                Object::Reference(new_id)
            }
            Err(err) => {
                warn!(?id, %err, "Cannot resolve reference, using Null");
                Object::Null
            }
        }
    }

    fn copy_dict(&mut self, source: &Document, target: &mut Document, dict: &Dictionary) -> Dictionary {
        let mut new_dict = Dictionary::new();
        for (key, value) in dict.iter() {
            // back-references into the source page tree
            if key == b"Parent" || key == b"P" {
                continue;
            }
            new_dict.set(key.clone(), self.copy(source, target, value));
        }
        new_dict
    }

    fn copy(&mut self, source: &Document, target: &mut Document, object: &Object) -> Object {
        match object {
            Object::Reference(id) => self.copy_reference(source, target, *id),
            Object::Dictionary(dict) => Object::Dictionary(self.copy_dict(source, target, dict)),
            Object::Array(items) => Object::Array(items.iter().map(|o| self.copy(source, target, o)).collect()),
            Object::Stream(stream) => {
                let dict = self.copy_dict(source, target, &stream.dict);
                Object::Stream(Stream::new(dict, stream.content.clone()))
            }
            other => other.clone(),
        }
    }
}

/// A document under construction.
pub struct OutputDocument {
    doc: Document,
    pages_id: ObjectId,
    font_id: ObjectId,
    kids: Vec<ObjectId>,
    copier: ObjectCopier,
}

impl Default for OutputDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputDocument {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        Self {
            doc,
            pages_id,
            font_id,
            kids: Vec::new(),
            copier: ObjectCopier::default(),
        }
    }

    /// Starts a page with the given visible box and rotation.
    pub fn begin_page<'o, 's>(&'o mut self, source: &'s Document, page_box: Rect, rotation: i64) -> PageWriter<'o, 's> {
        PageWriter {
            out: self,
            source,
            page_box,
            rotation,
            operations: Vec::new(),
            xobjects: Dictionary::new(),
            ext_gstates: Dictionary::new(),
            images: HashMap::new(),
            annotations: Vec::new(),
            uses_font: false,
        }
    }

    /// Appends a page with no content.
    pub fn add_blank_page(&mut self, page_box: Rect, rotation: i64) -> ObjectId {
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => rect_to_array(&page_box),
            "CropBox" => rect_to_array(&page_box),
            "Rotate" => rotation,
            "Resources" => Dictionary::new(),
        });
        self.kids.push(page_id);
        page_id
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Serializes the document. Unreferenced objects are pruned; streams are
    /// written as they are, without further compression.
    pub fn finish(mut self) -> lopdf::Result<Vec<u8>> {
        let kids: Vec<Object> = self.kids.iter().map(|id| Object::Reference(*id)).collect();
        let count = kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.prune_objects();

        let mut bytes = Vec::new();
        self.doc.save_to(&mut bytes)?;
        Ok(bytes)
    }
}

/// Accumulates the operators and resources of one rebuilt page.
pub struct PageWriter<'o, 's> {
    out: &'o mut OutputDocument,
    source: &'s Document,
    page_box: Rect,
    rotation: i64,
    operations: Vec<Operation>,
    xobjects: Dictionary,
    ext_gstates: Dictionary,
    images: HashMap<ObjectId, String>,
    annotations: Vec<Object>,
    uses_font: bool,
}

fn set_color_ops(color: &Color, stroking: bool) -> Operation {
    let operator = match (color, stroking) {
        (Color::Gray(_), false) => "g",
        (Color::Gray(_), true) => "G",
        (Color::Rgb(..), false) => "rg",
        (Color::Rgb(..), true) => "RG",
        (Color::Cmyk(..), false) => "k",
        (Color::Cmyk(..), true) => "K",
    };
    Operation::new(operator, color.channels().into_iter().map(real).collect())
}

fn point_operands(points: &[Point]) -> Vec<Object> {
    points.iter().flat_map(|p| [real(p.x), real(p.y)]).collect()
}

impl<'o, 's> PageWriter<'o, 's> {
    /// Draws an image XObject at its original placement.
    pub fn draw_raster(&mut self, placement: &RasterPlacement<'_>) {
        let name = match placement.id {
            Some(id) => match self.images.get(&id) {
                Some(name) => name.clone(),
                None => {
                    let name = format!("Im{}", self.xobjects.len());
                    let copied = self.out.copier.copy_reference(self.source, &mut self.out.doc, id);
                    self.xobjects.set(name.clone(), copied);
                    self.images.insert(id, name.clone());
                    name
                }
            },
            None => {
                let name = format!("Im{}", self.xobjects.len());
                let copied = self
                    .out
                    .copier
                    .copy(self.source, &mut self.out.doc, &Object::Stream(placement.stream.clone()));
                let id = self.out.doc.add_object(copied);
                self.xobjects.set(name.clone(), id);
                name
            }
        };
        self.operations.push(Operation::new("q", vec![]));
        self.operations.push(Operation::new(
            "cm",
            placement.matrix.to_array().iter().map(|v| real(*v)).collect(),
        ));
        self.operations
            .push(Operation::new("Do", vec![Object::Name(name.into_bytes())]));
        self.operations.push(Operation::new("Q", vec![]));
    }

    /// Draws a vector path with its original fill, stroke and opacity.
    pub fn draw_path(&mut self, path: &DrawingPath) {
        let style = &path.style;
        self.operations.push(Operation::new("q", vec![]));

        if style.fill.is_some() && style.fill_opacity < 1.0 {
            let name = format!("GS{}", self.ext_gstates.len());
            self.ext_gstates.set(
                name.clone(),
                dictionary! {
                    "Type" => "ExtGState",
                    "ca" => real(style.fill_opacity),
                },
            );
            self.operations
                .push(Operation::new("gs", vec![Object::Name(name.into_bytes())]));
        }
        if let Some(fill) = &style.fill {
            self.operations.push(set_color_ops(fill, false));
        }
        if let Some(stroke) = &style.stroke {
            self.operations.push(set_color_ops(&stroke.color, true));
            self.operations.push(Operation::new("w", vec![real(stroke.width)]));
        }

        let mut pen: Option<Point> = None;
        for segment in &path.segments {
            match segment {
                PathSegment::Rect(r) => {
                    self.operations.push(Operation::new(
                        "re",
                        vec![real(r.x0), real(r.y0), real(r.width()), real(r.height())],
                    ));
                    pen = Some(Point::new(r.x0, r.y0));
                }
                PathSegment::Quad(q) => {
                    self.operations.push(Operation::new("m", point_operands(&q[..1])));
                    for p in &q[1..] {
                        self.operations.push(Operation::new("l", point_operands(&[*p])));
                    }
                    self.operations.push(Operation::new("h", vec![]));
                    pen = Some(q[0]);
                }
                PathSegment::Line(a, b) => {
                    if pen != Some(*a) {
                        self.operations.push(Operation::new("m", point_operands(&[*a])));
                    }
                    self.operations.push(Operation::new("l", point_operands(&[*b])));
                    pen = Some(*b);
                }
                PathSegment::Curve(a, c1, c2, b) => {
                    if pen != Some(*a) {
                        self.operations.push(Operation::new("m", point_operands(&[*a])));
                    }
                    self.operations
                        .push(Operation::new("c", point_operands(&[*c1, *c2, *b])));
                    pen = Some(*b);
                }
            }
        }
        if path.closed {
            self.operations.push(Operation::new("h", vec![]));
        }

        let paint = match (style.fill.is_some(), style.stroke.is_some(), style.even_odd) {
            (true, true, false) => "B",
            (true, true, true) => "B*",
            (true, false, false) => "f",
            (true, false, true) => "f*",
            (false, true, _) => "S",
            (false, false, _) => "n",
        };
        self.operations.push(Operation::new(paint, vec![]));
        self.operations.push(Operation::new("Q", vec![]));
    }

    /// Writes a text run horizontally at its origin in the given color.
    pub fn draw_text(&mut self, run: &TextRun, color: &Color) {
        self.uses_font = true;
        let encoded = encode_win_ansi_lossy(&run.text);
        self.operations.extend([
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(TEXT_FONT.as_bytes().to_vec()), real(run.font_size)],
            ),
            set_color_ops(color, false),
            Operation::new(
                "Tm",
                vec![
                    1.into(),
                    0.into(),
                    0.into(),
                    1.into(),
                    real(run.origin.x),
                    real(run.origin.y),
                ],
            ),
            Operation::new("Tj", vec![Object::String(encoded, StringFormat::Literal)]),
            Operation::new("ET", vec![]),
        ]);
    }

    /// Copies a source annotation onto the rebuilt page.
    pub fn copy_annotation(&mut self, annotation: &Object) {
        let copied = self.out.copier.copy(self.source, &mut self.out.doc, annotation);
        let reference = match copied {
            Object::Reference(_) => copied,
            Object::Dictionary(_) => Object::Reference(self.out.doc.add_object(copied)),
            _ => return,
        };
        self.annotations.push(reference);
    }

    /// Encodes the page content and appends the page to the document.
    pub fn finish(self) -> lopdf::Result<ObjectId> {
        let content = Content {
            operations: self.operations,
        };
        let bytes = content.encode()?;
        let doc = &mut self.out.doc;
        let content_id = doc.add_object(Stream::new(dictionary! {}, bytes));

        let mut resources = Dictionary::new();
        if self.uses_font {
            resources.set("Font", dictionary! { TEXT_FONT => self.out.font_id });
        }
        if !self.xobjects.is_empty() {
            resources.set("XObject", self.xobjects);
        }
        if !self.ext_gstates.is_empty() {
            resources.set("ExtGState", self.ext_gstates);
        }

        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => self.out.pages_id,
            "MediaBox" => rect_to_array(&self.page_box),
            "CropBox" => rect_to_array(&self.page_box),
            "Rotate" => self.rotation,
            "Contents" => content_id,
            "Resources" => resources,
        };
        if !self.annotations.is_empty() {
            page.set("Annots", self.annotations);
        }
        let page_id = self.out.doc.add_object(page);
        self.out.kids.push(page_id);
        Ok(page_id)
    }
}
