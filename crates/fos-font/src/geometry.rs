//! 2D geometry primitives for outline processing
//!
//! All glyph geometry runs in font units as `f64`.

use std::ops::{Add, Mul, Neg, Sub};

// ============================================================================
// Vector
// ============================================================================

/// 2D point / vector
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn dot(self, other: Vec2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Z component of the 3D cross product
    pub fn cross(self, other: Vec2) -> f64 {
        self.x * other.y - self.y * other.x
    }

    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn distance(self, other: Vec2) -> f64 {
        (other - self).length()
    }

    /// Unit vector, or zero for a zero-length input
    pub fn normalized(self) -> Vec2 {
        let len = self.length();
        if len > 0.0 {
            Vec2::new(self.x / len, self.y / len)
        } else {
            Vec2::ZERO
        }
    }

    /// Round both components to `decimals` places (half away from zero)
    pub fn rounded(self, decimals: i32) -> Vec2 {
        let factor = 10f64.powi(decimals);
        Vec2::new(
            (self.x * factor).round() / factor,
            (self.y * factor).round() / factor,
        )
    }

    pub fn lerp(self, other: Vec2, t: f64) -> Vec2 {
        self + (other - self) * t
    }

    pub fn midpoint(self, other: Vec2) -> Vec2 {
        Vec2::new((self.x + other.x) * 0.5, (self.y + other.y) * 0.5)
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;
    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

/// Angle in degrees (0..=180) between the directions `a0 -> a1` and `b0 -> b1`
pub fn angle_degrees(a0: Vec2, a1: Vec2, b0: Vec2, b1: Vec2) -> f64 {
    let a = (a1 - a0).normalized();
    let b = (b1 - b0).normalized();
    a.dot(b).clamp(-1.0, 1.0).acos().to_degrees()
}

// ============================================================================
// Line Segment
// ============================================================================

/// Straight segment between two points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSegment {
    pub start: Vec2,
    pub end: Vec2,
}

impl LineSegment {
    pub const fn new(start: Vec2, end: Vec2) -> Self {
        Self { start, end }
    }

    pub fn direction(&self) -> Vec2 {
        self.end - self.start
    }

    pub fn direction_normalized(&self) -> Vec2 {
        self.direction().normalized()
    }

    pub fn reversed(&self) -> LineSegment {
        LineSegment::new(self.end, self.start)
    }

    pub fn length(&self) -> f64 {
        self.direction().length()
    }

    pub fn is_degenerate(&self) -> bool {
        self.start == self.end
    }

    /// Whether the two segments share any endpoint
    pub fn is_connected(&self, other: &LineSegment) -> bool {
        self.end == other.start
            || other.end == self.start
            || self.start == other.start
            || self.end == other.end
    }

    /// Euclidean distance from `point` to the closest point of the segment
    pub fn distance_to(&self, point: Vec2) -> f64 {
        let dir = self.direction();
        let len_sq = dir.dot(dir);
        if len_sq == 0.0 {
            return self.start.distance(point);
        }
        let t = ((point - self.start).dot(dir) / len_sq).clamp(0.0, 1.0);
        (self.start + dir * t).distance(point)
    }

    /// Distance from `point` to the infinite line through the segment
    pub fn line_distance_to(&self, point: Vec2) -> f64 {
        let dir = self.direction();
        let len = dir.length();
        if len == 0.0 {
            return self.start.distance(point);
        }
        (dir.cross(point - self.start) / len).abs()
    }

    /// Which side of the segment `point` lies on: negative when the cross
    /// product of the direction and the start-to-point vector is negative
    pub fn side_of(&self, point: Vec2) -> f64 {
        self.direction_normalized()
            .cross((point - self.start).normalized())
    }

    /// Intersection point of two segments, if they cross or touch
    ///
    /// Parallel (including collinear) segments report no intersection.
    pub fn intersection(&self, other: &LineSegment) -> Option<Vec2> {
        let p = self.start;
        let r = self.direction();
        let q = other.start;
        let s = other.direction();

        let denom = r.cross(s);
        if denom.abs() < 1e-12 {
            return None;
        }

        let qp = q - p;
        let t = qp.cross(s) / denom;
        let u = qp.cross(r) / denom;
        if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
            Some(p + r * t)
        } else {
            None
        }
    }
}

// ============================================================================
// Affine Matrix
// ============================================================================

/// 2x3 affine transform in row-vector form
///
/// `x' = x * m11 + y * m21 + m31`, `y' = x * m12 + y * m22 + m32`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix2x3 {
    pub m11: f64,
    pub m12: f64,
    pub m21: f64,
    pub m22: f64,
    pub m31: f64,
    pub m32: f64,
}

impl Matrix2x3 {
    pub const IDENTITY: Matrix2x3 = Matrix2x3 {
        m11: 1.0,
        m12: 0.0,
        m21: 0.0,
        m22: 1.0,
        m31: 0.0,
        m32: 0.0,
    };

    pub const fn translation(dx: f64, dy: f64) -> Self {
        Matrix2x3 {
            m31: dx,
            m32: dy,
            ..Self::IDENTITY
        }
    }

    pub fn transform(&self, point: Vec2) -> Vec2 {
        Vec2::new(
            point.x * self.m11 + point.y * self.m21 + self.m31,
            point.x * self.m12 + point.y * self.m22 + self.m32,
        )
    }

    /// Apply only the 2x2 linear part
    pub fn transform_vector(&self, v: Vec2) -> Vec2 {
        Vec2::new(v.x * self.m11 + v.y * self.m21, v.x * self.m12 + v.y * self.m22)
    }

    /// `self` applied first, then `next`
    pub fn then(&self, next: &Matrix2x3) -> Matrix2x3 {
        let origin = next.transform(Vec2::new(self.m31, self.m32));
        Matrix2x3 {
            m11: self.m11 * next.m11 + self.m12 * next.m21,
            m12: self.m11 * next.m12 + self.m12 * next.m22,
            m21: self.m21 * next.m11 + self.m22 * next.m21,
            m22: self.m21 * next.m12 + self.m22 * next.m22,
            m31: origin.x,
            m32: origin.y,
        }
    }
}

impl Default for Matrix2x3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

// ============================================================================
// Rectangle
// ============================================================================

/// Axis-aligned rectangle (y up, font units)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl Rect {
    pub const fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self { x_min, y_min, x_max, y_max }
    }

    /// Bounding box of a point set, `None` when empty
    pub fn from_points<I: IntoIterator<Item = Vec2>>(points: I) -> Option<Rect> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut rect = Rect::new(first.x, first.y, first.x, first.y);
        for p in iter {
            rect.x_min = rect.x_min.min(p.x);
            rect.y_min = rect.y_min.min(p.y);
            rect.x_max = rect.x_max.max(p.x);
            rect.y_max = rect.y_max.max(p.y);
        }
        Some(rect)
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new((self.x_min + self.x_max) * 0.5, (self.y_min + self.y_max) * 0.5)
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 && self.height() <= 0.0
    }
}
