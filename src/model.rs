//! Page content as seen by the classifiers and the reconstructor.
//!
//! These values are produced by the content interpreter and never mutated
//! afterwards; classification decisions are computed *from* them.

use lopdf::{ObjectId, Stream};

use crate::geometry::{Color, Matrix, Point, Rect};

/// One segment of a vector path, already transformed into page space.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    Line(Point, Point),
    Rect(Rect),
    /// A rectangle drawn under a rotating or skewing CTM.
    Quad([Point; 4]),
    Curve(Point, Point, Point, Point),
}

impl PathSegment {
    /// Every point that defines the segment, control points included.
    pub fn points(&self) -> Vec<Point> {
        match self {
            PathSegment::Line(a, b) => vec![*a, *b],
            PathSegment::Rect(r) => r.corners().to_vec(),
            PathSegment::Quad(q) => q.to_vec(),
            PathSegment::Curve(a, b, c, d) => vec![*a, *b, *c, *d],
        }
    }
}

/// Stroke parameters of a path painted with a stroking operator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: Color,
    /// Line width in page space.
    pub width: f64,
}

/// How a path is painted. A missing `fill` or `stroke` means the painting
/// operator did not fill or stroke, or that the color could not be resolved
/// to a device color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathStyle {
    pub fill: Option<Color>,
    pub stroke: Option<Stroke>,
    pub fill_opacity: f64,
    pub even_odd: bool,
}

impl Default for PathStyle {
    fn default() -> Self {
        Self {
            fill: None,
            stroke: None,
            fill_opacity: 1.0,
            even_odd: false,
        }
    }
}

/// A painted vector shape.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawingPath {
    pub segments: Vec<PathSegment>,
    pub rect: Rect,
    pub style: PathStyle,
    pub closed: bool,
}

impl DrawingPath {
    /// Builds a path and computes its bounding rectangle from the segments.
    pub fn new(segments: Vec<PathSegment>, style: PathStyle, closed: bool) -> Self {
        let rect = Rect::bounding(segments.iter().flat_map(PathSegment::points)).unwrap_or_default();
        Self {
            segments,
            rect,
            style,
            closed,
        }
    }

    /// The area the path covers on the page: its bounding rect grown by
    /// half the stroke width when stroked.
    pub fn painted_rect(&self) -> Rect {
        match self.style.stroke {
            Some(stroke) if stroke.width > 0.0 => {
                let half = stroke.width / 2.0;
                Rect::new(
                    self.rect.x0 - half,
                    self.rect.y0 - half,
                    self.rect.x1 + half,
                    self.rect.y1 + half,
                )
            }
            _ => self.rect,
        }
    }
}

/// An image XObject drawn on the page.
#[derive(Debug, Clone)]
pub struct RasterPlacement<'a> {
    /// Object id of the image stream; `None` for a direct stream.
    pub id: Option<ObjectId>,
    pub stream: &'a Stream,
    /// Maps the unit square onto the page.
    pub matrix: Matrix,
    pub rect: Rect,
}

/// A run of glyphs shown by one text operator.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub origin: Point,
    /// Rendered size in page space.
    pub font_size: f64,
    pub bbox: Rect,
    pub color: Color,
}

/// One element of a page's content, in content-stream order.
#[derive(Debug, Clone)]
pub enum PageElement<'a> {
    Path(DrawingPath),
    Raster(RasterPlacement<'a>),
    Text(TextRun),
}

/// Everything the interpreter recovered from one page.
#[derive(Debug, Clone, Default)]
pub struct PageContent<'a> {
    pub elements: Vec<PageElement<'a>>,
    /// Content that could not be interpreted and is missing from `elements`.
    pub skipped: Vec<String>,
}

impl<'a> PageContent<'a> {
    pub fn text_runs(&self) -> impl Iterator<Item = &TextRun> {
        self.elements.iter().filter_map(|e| match e {
            PageElement::Text(run) => Some(run),
            _ => None,
        })
    }

    pub fn paths(&self) -> impl Iterator<Item = &DrawingPath> {
        self.elements.iter().filter_map(|e| match e {
            PageElement::Path(path) => Some(path),
            _ => None,
        })
    }

    pub fn rasters(&self) -> impl Iterator<Item = &RasterPlacement<'a>> {
        self.elements.iter().filter_map(|e| match e {
            PageElement::Raster(raster) => Some(raster),
            _ => None,
        })
    }
}

/// The rectangle of a mark removed from a page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemovedRegion {
    pub rect: Rect,
    pub kind: crate::classify::MarkKind,
}
