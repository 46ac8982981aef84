//! Geometry and color primitives shared by every stage of the pipeline.
//!
//! All coordinates are PDF user-space points of the page (origin bottom-left,
//! y growing upwards) after the content stream's CTM has been applied.

use serde::{Deserialize, Serialize};

/// A point in page space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle, normalized so that `x0 <= x1` and `y0 <= y1`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    /// Builds a rectangle from two corners in any order.
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// Rectangle given by the PDF `re` convention: origin plus signed extents.
    pub fn from_origin_size(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    /// Smallest rectangle enclosing all points, or `None` for an empty set.
    pub fn bounding(points: impl IntoIterator<Item = Point>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut rect = Self::new(first.x, first.y, first.x, first.y);
        for p in iter {
            rect.x0 = rect.x0.min(p.x);
            rect.y0 = rect.y0.min(p.y);
            rect.x1 = rect.x1.max(p.x);
            rect.y1 = rect.y1.max(p.y);
        }
        Some(rect)
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// A rectangle with no interior (zero width or height).
    pub fn is_empty(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }

    /// True when the two rectangles share interior area. Touching edges and
    /// empty rectangles never intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x0 < other.x1
            && other.x0 < self.x1
            && self.y0 < other.y1
            && other.y0 < self.y1
    }

    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.x0, self.y0),
            Point::new(self.x1, self.y0),
            Point::new(self.x1, self.y1),
            Point::new(self.x0, self.y1),
        ]
    }

    /// `[x0, y0, x1, y1]`, the order used in reports.
    pub fn to_array(&self) -> [f64; 4] {
        [self.x0, self.y0, self.x1, self.y1]
    }
}

/// A PDF transformation matrix `[a b c d e f]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix {
    pub const fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub const fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    pub const fn translation(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// `self × other`: apply `self` first, then `other`.
    pub fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, p: Point) -> Point {
        Point {
            x: self.a * p.x + self.c * p.y + self.e,
            y: self.b * p.x + self.d * p.y + self.f,
        }
    }

    /// Bounding box of a rectangle after transformation.
    pub fn transform_rect(&self, rect: &Rect) -> Rect {
        let corners = rect.corners().map(|p| self.apply(p));
        Rect::bounding(corners).unwrap_or_default()
    }

    /// Mean scale factor, used for line widths under a non-uniform CTM.
    pub fn scale(&self) -> f64 {
        let det = (self.a * self.d - self.b * self.c).abs();
        det.sqrt()
    }

    /// Length of the transformed unit y-vector, i.e. the rendered height of
    /// one text-space unit.
    pub fn vertical_scale(&self) -> f64 {
        (self.c * self.c + self.d * self.d).sqrt()
    }

    /// True when the matrix maps axis-aligned rectangles to axis-aligned
    /// rectangles.
    pub fn preserves_axes(&self) -> bool {
        (self.b.abs() < f64::EPSILON && self.c.abs() < f64::EPSILON)
            || (self.a.abs() < f64::EPSILON && self.d.abs() < f64::EPSILON)
    }

    pub fn to_array(&self) -> [f64; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }
}

/// A device color with components on a 0–1 scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Color {
    Gray(f64),
    Rgb(f64, f64, f64),
    Cmyk(f64, f64, f64, f64),
}

impl Color {
    pub const BLACK: Color = Color::Gray(0.0);
    pub const RED: Color = Color::Rgb(1.0, 0.0, 0.0);

    /// Builds a color from a component list by channel count (1, 3 or 4).
    pub fn from_components(components: &[f64]) -> Option<Self> {
        match *components {
            [g] => Some(Color::Gray(g)),
            [r, g, b] => Some(Color::Rgb(r, g, b)),
            [c, m, y, k] => Some(Color::Cmyk(c, m, y, k)),
            _ => None,
        }
    }

    pub fn channels(&self) -> Vec<f64> {
        match *self {
            Color::Gray(g) => vec![g],
            Color::Rgb(r, g, b) => vec![r, g, b],
            Color::Cmyk(c, m, y, k) => vec![c, m, y, k],
        }
    }

    /// True when every channel, whatever the channel count, satisfies `pred`.
    pub fn all_channels(&self, pred: impl Fn(f64) -> bool) -> bool {
        self.channels().into_iter().all(pred)
    }
}
