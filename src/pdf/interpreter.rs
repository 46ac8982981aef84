//! Content stream interpreter.
//!
//! Walks a page's operators with a graphics-state stack and records every
//! painted path, placed image and shown text run in page space. Form
//! XObjects are entered recursively so marks drawn inside them are seen like
//! page-level marks.

use std::collections::HashMap;
use std::rc::Rc;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, warn};

use crate::geometry::{Color, Matrix, Point, Rect};
use crate::model::{DrawingPath, PageContent, PageElement, PathSegment, PathStyle, RasterPlacement, Stroke, TextRun};

use super::font::FontDecoder;
use super::objects::{get, get_name, get_number, inherited, name, number, resolve, resolve_array, resolve_dict, resolve_stream, stream_bytes};

/// Nesting limit for form XObjects.
const MAX_FORM_DEPTH: usize = 16;

/// Why a page's content could not be interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentError(pub String);

impl std::fmt::Display for ContentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Color space family selected by `cs`/`CS`.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ColorFamily {
    Gray,
    Rgb,
    Cmyk,
    /// Separation or single-colorant DeviceN: one tint, 1 = full ink.
    Tint,
    /// Pattern, Indexed and anything else without a direct device color.
    Opaque,
}

impl ColorFamily {
    fn color(&self, components: &[f64]) -> Option<Color> {
        match (self, components) {
            (ColorFamily::Gray, [g]) => Some(Color::Gray(*g)),
            (ColorFamily::Rgb, [r, g, b]) => Some(Color::Rgb(*r, *g, *b)),
            (ColorFamily::Cmyk, [c, m, y, k]) => Some(Color::Cmyk(*c, *m, *y, *k)),
            (ColorFamily::Tint, [t]) => Some(Color::Gray(1.0 - t)),
            _ => None,
        }
    }

    fn initial_color(&self) -> Option<Color> {
        match self {
            ColorFamily::Gray | ColorFamily::Tint => Some(Color::Gray(0.0)),
            ColorFamily::Rgb => Some(Color::Rgb(0.0, 0.0, 0.0)),
            ColorFamily::Cmyk => Some(Color::Cmyk(0.0, 0.0, 0.0, 1.0)),
            ColorFamily::Opaque => None,
        }
    }
}

#[derive(Debug, Clone)]
struct TextState {
    font: Rc<FontDecoder>,
    size: f64,
    char_spacing: f64,
    word_spacing: f64,
    horizontal_scale: f64,
    leading: f64,
    rise: f64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: Rc::new(FontDecoder::fallback()),
            size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    fill: Option<Color>,
    stroke: Option<Color>,
    fill_family: ColorFamily,
    stroke_family: ColorFamily,
    line_width: f64,
    fill_alpha: f64,
    text: TextState,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::identity(),
            fill: Some(Color::BLACK),
            stroke: Some(Color::BLACK),
            fill_family: ColorFamily::Gray,
            stroke_family: ColorFamily::Gray,
            line_width: 1.0,
            fill_alpha: 1.0,
            text: TextState::default(),
        }
    }
}

/// The path under construction.
#[derive(Debug, Default)]
struct PathBuilder {
    segments: Vec<PathSegment>,
    current: Option<Point>,
    start: Option<Point>,
    closed: bool,
}

impl PathBuilder {
    fn take(&mut self) -> (Vec<PathSegment>, bool) {
        let closed = self.closed;
        let segments = std::mem::take(&mut self.segments);
        *self = Self::default();
        (segments, closed)
    }
}

/// Interprets page content streams of one document.
pub struct ContentInterpreter<'a> {
    doc: &'a Document,
    fonts: HashMap<ObjectId, Rc<FontDecoder>>,
}

impl<'a> ContentInterpreter<'a> {
    pub fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            fonts: HashMap::new(),
        }
    }

    /// Interprets one page. Fails only when the page's own content stream
    /// cannot be parsed; nested content that has to be dropped is listed in
    /// [`PageContent::skipped`].
    pub fn interpret_page(&mut self, page_id: ObjectId) -> Result<PageContent<'a>, ContentError> {
        let doc = self.doc;
        let bytes = doc
            .get_page_content(page_id)
            .map_err(|e| ContentError(format!("cannot read content stream: {}", e)))?;
        let content = decode_content(&bytes)?;
        let resources = inherited(doc, page_id, b"Resources").and_then(|o| resolve_dict(doc, o));

        let mut run = PageRun {
            doc,
            fonts: &mut self.fonts,
            state: GraphicsState::default(),
            stack: Vec::new(),
            path: PathBuilder::default(),
            text_matrix: Matrix::identity(),
            line_matrix: Matrix::identity(),
            forms: Vec::new(),
            content: PageContent::default(),
        };
        run.execute(&content.operations, resources);
        debug!(
            operations = content.operations.len(),
            elements = run.content.elements.len(),
            skipped = run.content.skipped.len(),
            "Interpreted page content"
        );
        Ok(run.content)
    }
}

/// Decodes operators, rejecting streams that hold data but yield nothing.
pub fn decode_content(bytes: &[u8]) -> Result<Content, ContentError> {
    let content = Content::decode(bytes).map_err(|e| ContentError(format!("malformed content stream: {}", e)))?;
    let has_data = bytes.iter().any(|b| !b.is_ascii_whitespace());
    if content.operations.is_empty() && has_data {
        return Err(ContentError(
            "malformed content stream: no operators could be parsed".to_string(),
        ));
    }
    Ok(content)
}

/// Mutable state of one page interpretation.
struct PageRun<'a, 'f> {
    doc: &'a Document,
    fonts: &'f mut HashMap<ObjectId, Rc<FontDecoder>>,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    path: PathBuilder,
    text_matrix: Matrix,
    line_matrix: Matrix,
    forms: Vec<ObjectId>,
    content: PageContent<'a>,
}

fn operand(op: &Operation, index: usize) -> Option<f64> {
    op.operands.get(index).and_then(number)
}

fn operands<const N: usize>(op: &Operation) -> Option<[f64; N]> {
    if op.operands.len() < N {
        return None;
    }
    let mut values = [0.0; N];
    let offset = op.operands.len() - N;
    for (i, slot) in values.iter_mut().enumerate() {
        *slot = number(&op.operands[offset + i])?;
    }
    Some(values)
}

impl<'a, 'f> PageRun<'a, 'f> {
    fn execute(&mut self, operations: &[Operation], resources: Option<&'a Dictionary>) {
        for op in operations {
            self.apply(op, resources);
        }
    }

    fn point(&self, x: f64, y: f64) -> Point {
        self.state.ctm.apply(Point::new(x, y))
    }

    fn apply(&mut self, op: &Operation, resources: Option<&'a Dictionary>) {
        match op.operator.as_str() {
            "q" => self.stack.push(self.state.clone()),
            "Q" => {
                if let Some(saved) = self.stack.pop() {
                    self.state = saved;
                }
            }
            "cm" => {
                if let Some([a, b, c, d, e, f]) = operands::<6>(op) {
                    self.state.ctm = Matrix::new(a, b, c, d, e, f).then(&self.state.ctm);
                }
            }
            "w" => {
                if let Some(width) = operand(op, 0) {
                    self.state.line_width = width;
                }
            }
            "gs" => self.apply_ext_gstate(op, resources),

            // color
            "g" | "G" | "rg" | "RG" | "k" | "K" => self.set_device_color(op),
            "cs" | "CS" => self.set_color_space(op, resources),
            "sc" | "scn" | "SC" | "SCN" => self.set_color(op),

            // path construction
            "m" => {
                if let Some([x, y]) = operands::<2>(op) {
                    let p = self.point(x, y);
                    self.path.current = Some(p);
                    self.path.start = Some(p);
                }
            }
            "l" => {
                if let (Some([x, y]), Some(from)) = (operands::<2>(op), self.path.current) {
                    let to = self.point(x, y);
                    self.path.segments.push(PathSegment::Line(from, to));
                    self.path.current = Some(to);
                }
            }
            "c" => {
                if let (Some([x1, y1, x2, y2, x3, y3]), Some(from)) = (operands::<6>(op), self.path.current) {
                    let end = self.point(x3, y3);
                    self.path.segments.push(PathSegment::Curve(
                        from,
                        self.point(x1, y1),
                        self.point(x2, y2),
                        end,
                    ));
                    self.path.current = Some(end);
                }
            }
            "v" => {
                if let (Some([x2, y2, x3, y3]), Some(from)) = (operands::<4>(op), self.path.current) {
                    let end = self.point(x3, y3);
                    self.path
                        .segments
                        .push(PathSegment::Curve(from, from, self.point(x2, y2), end));
                    self.path.current = Some(end);
                }
            }
            "y" => {
                if let (Some([x1, y1, x3, y3]), Some(from)) = (operands::<4>(op), self.path.current) {
                    let end = self.point(x3, y3);
                    self.path
                        .segments
                        .push(PathSegment::Curve(from, self.point(x1, y1), end, end));
                    self.path.current = Some(end);
                }
            }
            "re" => {
                if let Some([x, y, w, h]) = operands::<4>(op) {
                    let local = Rect::from_origin_size(x, y, w, h);
                    let ctm = self.state.ctm;
                    let segment = if ctm.preserves_axes() {
                        PathSegment::Rect(ctm.transform_rect(&local))
                    } else {
                        PathSegment::Quad([
                            self.point(x, y),
                            self.point(x + w, y),
                            self.point(x + w, y + h),
                            self.point(x, y + h),
                        ])
                    };
                    self.path.segments.push(segment);
                    let origin = self.point(x, y);
                    self.path.current = Some(origin);
                    self.path.start = Some(origin);
                }
            }
            "h" => {
                self.path.closed = true;
                self.path.current = self.path.start;
            }

            // path painting
            "S" => self.paint(false, true, false, false),
            "s" => self.paint(false, true, false, true),
            "f" | "F" => self.paint(true, false, false, false),
            "f*" => self.paint(true, false, true, false),
            "B" => self.paint(true, true, false, false),
            "B*" => self.paint(true, true, true, false),
            "b" => self.paint(true, true, false, true),
            "b*" => self.paint(true, true, true, true),
            "n" => {
                self.path.take();
            }

            // text objects and state
            "BT" => {
                self.text_matrix = Matrix::identity();
                self.line_matrix = Matrix::identity();
            }
            "Tf" => self.set_font(op, resources),
            "Tc" => {
                if let Some(v) = operand(op, 0) {
                    self.state.text.char_spacing = v;
                }
            }
            "Tw" => {
                if let Some(v) = operand(op, 0) {
                    self.state.text.word_spacing = v;
                }
            }
            "Tz" => {
                if let Some(v) = operand(op, 0) {
                    self.state.text.horizontal_scale = v / 100.0;
                }
            }
            "TL" => {
                if let Some(v) = operand(op, 0) {
                    self.state.text.leading = v;
                }
            }
            "Ts" => {
                if let Some(v) = operand(op, 0) {
                    self.state.text.rise = v;
                }
            }
            "Td" => {
                if let Some([tx, ty]) = operands::<2>(op) {
                    self.move_text(tx, ty);
                }
            }
            "TD" => {
                if let Some([tx, ty]) = operands::<2>(op) {
                    self.state.text.leading = -ty;
                    self.move_text(tx, ty);
                }
            }
            "Tm" => {
                if let Some([a, b, c, d, e, f]) = operands::<6>(op) {
                    self.text_matrix = Matrix::new(a, b, c, d, e, f);
                    self.line_matrix = self.text_matrix;
                }
            }
            "T*" => self.next_line(),

            // text showing
            "Tj" => {
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    self.show_text(&[TextPiece::Bytes(bytes)]);
                }
            }
            "'" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    self.show_text(&[TextPiece::Bytes(bytes)]);
                }
            }
            "\"" => {
                if let (Some(aw), Some(ac)) = (operand(op, 0), operand(op, 1)) {
                    self.state.text.word_spacing = aw;
                    self.state.text.char_spacing = ac;
                }
                self.next_line();
                if let Some(Object::String(bytes, _)) = op.operands.get(2) {
                    self.show_text(&[TextPiece::Bytes(bytes)]);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    let pieces: Vec<TextPiece<'_>> = items
                        .iter()
                        .filter_map(|item| match item {
                            Object::String(bytes, _) => Some(TextPiece::Bytes(bytes)),
                            other => number(other).map(TextPiece::Adjust),
                        })
                        .collect();
                    self.show_text(&pieces);
                }
            }

            // external objects
            "Do" => self.invoke_xobject(op, resources),

            _ => {}
        }
    }

    fn apply_ext_gstate(&mut self, op: &Operation, resources: Option<&'a Dictionary>) {
        let Some(key) = op.operands.first().and_then(name) else { return };
        let Some(params) = self.resource(resources, b"ExtGState", key).and_then(|(_, o)| match o {
            Object::Dictionary(d) => Some(d),
            _ => None,
        }) else {
            return;
        };
        if let Some(lw) = get_number(self.doc, params, b"LW") {
            self.state.line_width = lw;
        }
        if let Some(ca) = get_number(self.doc, params, b"ca") {
            self.state.fill_alpha = ca.clamp(0.0, 1.0);
        }
    }

    fn set_device_color(&mut self, op: &Operation) {
        let (family, count) = match op.operator.as_str() {
            "g" | "G" => (ColorFamily::Gray, 1),
            "rg" | "RG" => (ColorFamily::Rgb, 3),
            _ => (ColorFamily::Cmyk, 4),
        };
        let components: Option<Vec<f64>> = op.operands.iter().take(count).map(number).collect();
        let color = components.and_then(|c| family.color(&c));
        if op.operator.chars().all(|c| c.is_ascii_lowercase()) {
            self.state.fill_family = family;
            self.state.fill = color;
        } else {
            self.state.stroke_family = family;
            self.state.stroke = color;
        }
    }

    fn set_color_space(&mut self, op: &Operation, resources: Option<&'a Dictionary>) {
        let Some(key) = op.operands.first().and_then(name) else { return };
        let family = match key {
            b"DeviceGray" | b"CalGray" | b"G" => ColorFamily::Gray,
            b"DeviceRGB" | b"CalRGB" | b"RGB" => ColorFamily::Rgb,
            b"DeviceCMYK" | b"CMYK" => ColorFamily::Cmyk,
            b"Pattern" => ColorFamily::Opaque,
            other => self
                .resource(resources, b"ColorSpace", other)
                .map(|(_, cs)| self.color_family(cs))
                .unwrap_or(ColorFamily::Opaque),
        };
        if op.operator == "cs" {
            self.state.fill_family = family;
            self.state.fill = family.initial_color();
        } else {
            self.state.stroke_family = family;
            self.state.stroke = family.initial_color();
        }
    }

    fn color_family(&self, cs: &Object) -> ColorFamily {
        let doc = self.doc;
        let family = match cs {
            Object::Name(n) => n.as_slice(),
            _ => match resolve_array(doc, cs)
                .and_then(|items| items.first())
                .and_then(|o| resolve(doc, o))
                .and_then(|(_, o)| name(o))
            {
                Some(n) => n,
                None => return ColorFamily::Opaque,
            },
        };
        match family {
            b"DeviceGray" | b"CalGray" => ColorFamily::Gray,
            b"DeviceRGB" | b"CalRGB" | b"Lab" => ColorFamily::Rgb,
            b"DeviceCMYK" => ColorFamily::Cmyk,
            b"Separation" => ColorFamily::Tint,
            b"DeviceN" => {
                let colorants = resolve_array(doc, cs)
                    .and_then(|items| items.get(1))
                    .and_then(|o| resolve_array(doc, o))
                    .map_or(0, Vec::len);
                if colorants == 1 {
                    ColorFamily::Tint
                } else {
                    ColorFamily::Opaque
                }
            }
            b"ICCBased" => {
                let n = resolve_array(doc, cs)
                    .and_then(|items| items.get(1))
                    .and_then(|o| resolve_stream(doc, o))
                    .and_then(|(_, s)| get_number(doc, &s.dict, b"N"));
                match n.map(|n| n as i64) {
                    Some(1) => ColorFamily::Gray,
                    Some(3) => ColorFamily::Rgb,
                    Some(4) => ColorFamily::Cmyk,
                    _ => ColorFamily::Opaque,
                }
            }
            _ => ColorFamily::Opaque,
        }
    }

    fn set_color(&mut self, op: &Operation) {
        let components: Vec<f64> = op.operands.iter().filter_map(number).collect();
        let has_pattern = op.operands.iter().any(|o| matches!(o, Object::Name(_)));
        let fill = op.operator.starts_with('s');
        let family = if fill {
            self.state.fill_family
        } else {
            self.state.stroke_family
        };
        let color = if has_pattern {
            None
        } else {
            family.color(&components)
        };
        if fill {
            self.state.fill = color;
        } else {
            self.state.stroke = color;
        }
    }

    fn paint(&mut self, fill: bool, stroke: bool, even_odd: bool, close: bool) {
        if close {
            self.path.closed = true;
        }
        let (segments, closed) = self.path.take();
        if segments.is_empty() {
            return;
        }
        let style = PathStyle {
            fill: if fill { self.state.fill } else { None },
            stroke: if stroke {
                self.state.stroke.map(|color| Stroke {
                    color,
                    width: self.state.line_width * self.state.ctm.scale(),
                })
            } else {
                None
            },
            fill_opacity: self.state.fill_alpha,
            even_odd,
        };
        self.content
            .elements
            .push(PageElement::Path(DrawingPath::new(segments, style, closed)));
    }

    fn set_font(&mut self, op: &Operation, resources: Option<&'a Dictionary>) {
        if let Some(size) = operand(op, 1) {
            self.state.text.size = size;
        }
        let Some(key) = op.operands.first().and_then(name) else { return };
        let doc = self.doc;
        let decoder = match self.resource(resources, b"Font", key) {
            Some((Some(id), Object::Dictionary(font))) => self
                .fonts
                .entry(id)
                .or_insert_with(|| Rc::new(FontDecoder::from_dict(doc, font)))
                .clone(),
            Some((None, Object::Dictionary(font))) => Rc::new(FontDecoder::from_dict(doc, font)),
            _ => {
                warn!(font = %String::from_utf8_lossy(key), "Font resource not found, using fallback metrics");
                Rc::new(FontDecoder::fallback())
            }
        };
        self.state.text.font = decoder;
    }

    fn move_text(&mut self, tx: f64, ty: f64) {
        self.line_matrix = Matrix::translation(tx, ty).then(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = self.state.text.leading;
        self.move_text(0.0, -leading);
    }

    fn show_text(&mut self, pieces: &[TextPiece<'_>]) {
        let text_state = self.state.text.clone();
        let start = self.text_matrix;
        let mut advance = 0.0;
        let mut text = String::new();

        for piece in pieces {
            match piece {
                TextPiece::Bytes(bytes) => {
                    for glyph in text_state.font.decode(bytes) {
                        let mut tx = glyph.width / 1000.0 * text_state.size + text_state.char_spacing;
                        if glyph.is_word_space {
                            tx += text_state.word_spacing;
                        }
                        advance += tx * text_state.horizontal_scale;
                        text.push_str(&glyph.text);
                    }
                }
                TextPiece::Adjust(amount) => {
                    advance -= amount / 1000.0 * text_state.size * text_state.horizontal_scale;
                }
            }
        }
        self.text_matrix = Matrix::translation(advance, 0.0).then(&self.text_matrix);

        if text.trim().is_empty() {
            return;
        }

        let to_page = start.then(&self.state.ctm);
        let size = text_state.size;
        let local = Rect::new(
            0.0,
            text_state.rise + text_state.font.descent() * size,
            advance,
            text_state.rise + text_state.font.ascent() * size,
        );
        self.content.elements.push(PageElement::Text(TextRun {
            text,
            origin: to_page.apply(Point::new(0.0, text_state.rise)),
            font_size: size * to_page.vertical_scale(),
            bbox: to_page.transform_rect(&local),
            color: self.state.fill.unwrap_or(Color::BLACK),
        }));
    }

    fn skip(&mut self, reason: String) {
        self.content.skipped.push(reason);
    }

    fn invoke_xobject(&mut self, op: &Operation, resources: Option<&'a Dictionary>) {
        let Some(key) = op.operands.first().and_then(name) else { return };
        let doc = self.doc;
        let Some((id, stream)) = self.resource(resources, b"XObject", key).and_then(|(id, o)| match o {
            Object::Stream(stream) => Some((id, stream)),
            _ => None,
        }) else {
            warn!(xobject = %String::from_utf8_lossy(key), "XObject not found");
            self.skip(format!("XObject /{} not found", String::from_utf8_lossy(key)));
            return;
        };

        match get_name(doc, &stream.dict, b"Subtype") {
            Some(b"Image") => {
                let matrix = self.state.ctm;
                self.content.elements.push(PageElement::Raster(RasterPlacement {
                    id,
                    stream,
                    matrix,
                    rect: matrix.transform_rect(&Rect::new(0.0, 0.0, 1.0, 1.0)),
                }));
            }
            Some(b"Form") => {
                if self.forms.len() >= MAX_FORM_DEPTH || id.is_some_and(|id| self.forms.contains(&id)) {
                    warn!(xobject = %String::from_utf8_lossy(key), "Form XObject nesting too deep, skipped");
                    self.skip(format!("form XObject /{} nested too deep", String::from_utf8_lossy(key)));
                    return;
                }
                let bytes = match stream_bytes(doc, stream) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!(xobject = %String::from_utf8_lossy(key), error = %e, "Cannot decode form XObject");
                        self.skip(format!("form XObject /{}: {e}", String::from_utf8_lossy(key)));
                        return;
                    }
                };
                let content = match decode_content(&bytes) {
                    Ok(content) => content,
                    Err(e) => {
                        warn!(xobject = %String::from_utf8_lossy(key), error = %e, "Skipping malformed form XObject");
                        self.skip(format!("form XObject /{}: {e}", String::from_utf8_lossy(key)));
                        return;
                    }
                };
                let matrix = get(doc, &stream.dict, b"Matrix")
                    .and_then(|o| resolve_array(doc, o))
                    .and_then(|items| {
                        let values: Option<Vec<f64>> = items.iter().map(number).collect();
                        match values.as_deref() {
                            Some(&[a, b, c, d, e, f]) => Some(Matrix::new(a, b, c, d, e, f)),
                            _ => None,
                        }
                    })
                    .unwrap_or_default();
                let form_resources = get(doc, &stream.dict, b"Resources")
                    .and_then(|o| resolve_dict(doc, o))
                    .or(resources);

                self.stack.push(self.state.clone());
                self.state.ctm = matrix.then(&self.state.ctm);
                let saved_path = std::mem::take(&mut self.path);
                self.forms.push(id.unwrap_or((0, 0)));
                self.execute(&content.operations, form_resources);
                self.forms.pop();
                self.path = saved_path;
                if let Some(saved) = self.stack.pop() {
                    self.state = saved;
                }
            }
            _ => {}
        }
    }

    /// Looks up a named entry of a resource category.
    fn resource(
        &self,
        resources: Option<&'a Dictionary>,
        category: &[u8],
        key: &[u8],
    ) -> Option<(Option<ObjectId>, &'a Object)> {
        let doc = self.doc;
        let entries = resources.and_then(|r| get(doc, r, category)).and_then(|o| match o {
            Object::Dictionary(d) => Some(d),
            _ => None,
        })?;
        let value = entries.get(key).ok()?;
        resolve(doc, value)
    }
}

/// A piece of a `TJ` array.
#[derive(Debug, Clone, Copy)]
enum TextPiece<'b> {
    Bytes(&'b [u8]),
    Adjust(f64),
}
