//! Glyph outline primitives

use crate::geometry::{Matrix2x3, Rect, Vec2};

/// Outline point in font units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlinePoint {
    pub x: f64,
    pub y: f64,
    /// Off-curve (Bezier control) point
    pub is_control: bool,
}

impl OutlinePoint {
    pub const fn new(x: f64, y: f64, is_control: bool) -> Self {
        Self { x, y, is_control }
    }

    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// One closed contour as stored in the font
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outline {
    pub points: Vec<OutlinePoint>,
}

impl Outline {
    pub fn new(points: Vec<OutlinePoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Control-point bounds
    pub fn bounds(&self) -> Option<Rect> {
        Rect::from_points(self.points.iter().map(OutlinePoint::position))
    }
}

/// How the outline points of a glyph are to be read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutlineType {
    /// Quadratic `glyf` outlines with implicit on-curve points
    #[default]
    TrueType,
    /// Cubic charstring outlines
    Cff,
}

/// Piece of a segmented outline
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutlineSegment {
    Line(Vec2, Vec2),
    Quad(Vec2, Vec2, Vec2),
    Cubic(Vec2, Vec2, Vec2, Vec2),
}

impl OutlineSegment {
    pub fn start(&self) -> Vec2 {
        match *self {
            OutlineSegment::Line(p0, _)
            | OutlineSegment::Quad(p0, _, _)
            | OutlineSegment::Cubic(p0, _, _, _) => p0,
        }
    }

    pub fn end(&self) -> Vec2 {
        match *self {
            OutlineSegment::Line(_, p1) => p1,
            OutlineSegment::Quad(_, _, p2) => p2,
            OutlineSegment::Cubic(_, _, _, p3) => p3,
        }
    }

    /// All defining points, 2 to 4
    pub fn points(&self) -> Vec<Vec2> {
        match *self {
            OutlineSegment::Line(p0, p1) => vec![p0, p1],
            OutlineSegment::Quad(p0, p1, p2) => vec![p0, p1, p2],
            OutlineSegment::Cubic(p0, p1, p2, p3) => vec![p0, p1, p2, p3],
        }
    }

    /// Point at parameter `t` in `0..=1`
    pub fn point_at(&self, t: f64) -> Vec2 {
        let u = 1.0 - t;
        match *self {
            OutlineSegment::Line(p0, p1) => p0.lerp(p1, t),
            OutlineSegment::Quad(p0, p1, p2) => p0 * (u * u) + p1 * (2.0 * u * t) + p2 * (t * t),
            OutlineSegment::Cubic(p0, p1, p2, p3) => {
                p0 * (u * u * u) + p1 * (3.0 * u * u * t) + p2 * (3.0 * u * t * t) + p3 * (t * t * t)
            }
        }
    }
}

/// Outline flattened to a closed polyline
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampledOutline {
    pub points: Vec<Vec2>,
}

impl SampledOutline {
    /// Copy with every point mapped through `matrix`
    pub fn transformed(&self, matrix: &Matrix2x3) -> SampledOutline {
        SampledOutline {
            points: self.points.iter().map(|&p| matrix.transform(p)).collect(),
        }
    }
}

/// Reference from a composite glyph to another glyph
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeComponent {
    pub glyph_index: u32,
    /// Component placement; the offset is already in `m31`/`m32`
    pub transform: Matrix2x3,
    pub flags: u16,
}
