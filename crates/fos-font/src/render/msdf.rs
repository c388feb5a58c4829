//! Multi-channel signed distance field generation
//!
//! Segments are grouped into contours and then into edges split at sharp
//! corners. Edges get channel colors so that a corner is always seen by two
//! channels with different nearest edges; the median of the three channels
//! then reproduces the corner when the texture is sampled.

use crate::config::AtlasConfig;
use crate::geometry::{angle_degrees, LineSegment, Rect, Vec2};
use crate::model::Glyph;

use super::{Color, GlyphGenerator, GlyphTexture};

const RED: u8 = 0b001;
const GREEN: u8 = 0b010;
const BLUE: u8 = 0b100;

const MAGENTA: u8 = RED | BLUE;
const YELLOW: u8 = RED | GREEN;
const CYAN: u8 = GREEN | BLUE;

/// Byte value of a zero distance
const MIDPOINT: f64 = 127.5;

#[derive(Debug, Clone, Copy)]
struct ColoredSegment {
    segment: LineSegment,
    color: u8,
}

/// Raw signed distances of one pixel
#[derive(Debug, Clone, Copy, Default)]
struct Distances {
    r: f64,
    g: f64,
    b: f64,
    a: f64,
}

impl Distances {
    fn median(&self) -> f64 {
        self.r.min(self.g).max(self.r.max(self.g).min(self.b))
    }
}

/// MSDF tile generator
#[derive(Debug, Clone)]
pub struct MsdfGenerator {
    /// Canvas side relative to the larger glyph bbox dimension
    pub canvas_margin: f64,
    /// Joints with an angle below this (degrees) split edges
    pub angle_threshold: f64,
    /// Channel difference (byte units) treated as an artifact
    pub artifact_threshold: f64,
}

impl Default for MsdfGenerator {
    fn default() -> Self {
        Self {
            canvas_margin: 1.3,
            angle_threshold: 135.0,
            artifact_threshold: 50.0,
        }
    }
}

impl MsdfGenerator {
    pub fn from_config(config: &AtlasConfig) -> Self {
        Self {
            canvas_margin: config.canvas_margin,
            angle_threshold: config.angle_threshold,
            artifact_threshold: config.artifact_threshold,
        }
    }

    /// Distance field of a resolved segment list
    pub fn generate_from_segments(&self, segments: &[LineSegment], size: u32) -> GlyphTexture {
        let Some(bounds) = Rect::from_points(segments.iter().flat_map(|s| [s.start, s.end])) else {
            return GlyphTexture::transparent(size);
        };
        if size == 0 {
            return GlyphTexture::transparent(0);
        }

        let colored = self.color_segments(segments);
        let canvas = Canvas::around(&bounds, self.canvas_margin, size);

        let distances: Vec<Distances> = (0..size)
            .flat_map(|y| (0..size).map(move |x| (x, y)))
            .map(|(x, y)| pixel_distances(&colored, canvas.sample_point(x, y)))
            .collect();

        let pixels = self.fix_artifacts(&normalize(&distances), size);
        GlyphTexture { size, pixels }
    }

    /// Contours, then edges, then colors
    fn color_segments(&self, segments: &[LineSegment]) -> Vec<ColoredSegment> {
        let mut colored = Vec::with_capacity(segments.len());
        for contour in split_contours(segments) {
            let edges = split_edges(&contour, self.angle_threshold);
            let single = edges.len() == 1;
            for (i, edge) in edges.into_iter().enumerate() {
                let color = if single {
                    MAGENTA
                } else if i % 2 == 0 {
                    YELLOW
                } else {
                    CYAN
                };
                colored.extend(edge.into_iter().map(|segment| ColoredSegment { segment, color }));
            }
        }
        colored
    }

    /// Replace pixels that clash with a neighbour by their median
    ///
    /// Reads the uncorrected field so the result does not depend on the
    /// visiting order. Border pixels are left alone.
    fn fix_artifacts(&self, field: &[Color], size: u32) -> Vec<Color> {
        let mut fixed = field.to_vec();
        if size < 3 {
            return fixed;
        }

        let at = |x: u32, y: u32| field[(y * size + x) as usize];
        for y in 1..size - 1 {
            for x in 1..size - 1 {
                let pixel = at(x, y);
                let clashes = NEIGHBOURS.iter().any(|&(dx, dy)| {
                    let other = at(x.wrapping_add_signed(dx), y.wrapping_add_signed(dy));
                    clashing_channels(pixel, other, self.artifact_threshold) >= 2
                });
                if clashes {
                    let median = pixel.median();
                    fixed[(y * size + x) as usize] = Color::new(median, median, median, pixel.a);
                }
            }
        }
        fixed
    }
}

impl GlyphGenerator for MsdfGenerator {
    fn generate(&self, glyph: &Glyph, _units_per_em: u16, size: u32, sample_rate: u32) -> GlyphTexture {
        let sampled = glyph.sample(sample_rate);
        self.generate_from_segments(&sampled.segments, size)
    }
}

const NEIGHBOURS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

fn clashing_channels(a: Color, b: Color, threshold: f64) -> usize {
    [(a.r, b.r), (a.g, b.g), (a.b, b.b)]
        .into_iter()
        .filter(|&(p, q)| {
            let (p, q) = (f64::from(p), f64::from(q));
            (p > MIDPOINT) != (q > MIDPOINT) && (p - q).abs() > threshold
        })
        .count()
}

/// Square sampling area centred on the glyph
#[derive(Debug, Clone, Copy)]
struct Canvas {
    x: f64,
    y: f64,
    side: f64,
    size: u32,
}

impl Canvas {
    fn around(bounds: &Rect, margin: f64, size: u32) -> Self {
        let mut side = bounds.width().max(bounds.height()) * margin;
        if side <= 0.0 {
            side = 1.0;
        }
        let center = bounds.center();
        Self {
            x: center.x - side / 2.0,
            y: center.y - side / 2.0,
            side,
            size,
        }
    }

    /// Font-space centre of pixel (x, y); row 0 is the top of the canvas
    fn sample_point(&self, x: u32, y: u32) -> Vec2 {
        let step = self.side / f64::from(self.size);
        Vec2::new(
            self.x + step * (f64::from(x) + 0.5),
            self.y + self.side - step * (f64::from(y) + 0.5),
        )
    }
}

/// Split wherever consecutive segments stop sharing an endpoint
fn split_contours(segments: &[LineSegment]) -> Vec<Vec<LineSegment>> {
    let mut contours: Vec<Vec<LineSegment>> = Vec::new();
    let mut current: Vec<LineSegment> = Vec::new();
    for segment in segments {
        if let Some(last) = current.last() {
            if !last.is_connected(segment) {
                contours.push(std::mem::take(&mut current));
            }
        }
        current.push(*segment);
    }
    if !current.is_empty() {
        contours.push(current);
    }
    contours
}

/// Angle between the reversed `current` and `next`; 180 for a straight joint
fn is_sharp_corner(current: &LineSegment, next: &LineSegment, threshold: f64) -> bool {
    angle_degrees(current.end, current.start, next.start, next.end) < threshold
}

/// Split a contour into edges at its sharp corners
///
/// The contour is treated as closed, so the joint between the last and the
/// first segment counts too. Without any sharp corner the contour is one edge.
fn split_edges(contour: &[LineSegment], threshold: f64) -> Vec<Vec<LineSegment>> {
    let count = contour.len();
    let sharp_after = |i: usize| is_sharp_corner(&contour[i], &contour[(i + 1) % count], threshold);

    let Some(first_corner) = (0..count).find(|&i| sharp_after(i)) else {
        return vec![contour.to_vec()];
    };

    let start = (first_corner + 1) % count;
    let mut edges = Vec::new();
    let mut edge = Vec::new();
    for step in 0..count {
        let i = (start + step) % count;
        edge.push(contour[i]);
        if sharp_after(i) {
            edges.push(std::mem::take(&mut edge));
        }
    }
    if !edge.is_empty() {
        edges.push(edge);
    }
    edges
}

/// Nearest segment plus the first segment tied with it
#[derive(Debug, Default)]
struct Nearest {
    distance: f64,
    first: Option<LineSegment>,
    tied: Option<LineSegment>,
}

impl Nearest {
    fn search<'a>(segments: impl Iterator<Item = &'a LineSegment>, point: Vec2) -> Self {
        let mut nearest = Nearest {
            distance: f64::INFINITY,
            ..Default::default()
        };
        for segment in segments {
            let distance = segment.distance_to(point);
            if distance < nearest.distance {
                nearest = Nearest {
                    distance,
                    first: Some(*segment),
                    tied: None,
                };
            } else if distance == nearest.distance && nearest.tied.is_none() {
                nearest.tied = Some(*segment);
            }
        }
        nearest
    }

    /// Signed distance at a joint between two nearest segments
    ///
    /// Both segments are equally near only when the point faces their shared
    /// endpoint. The bisector of the joint decides which segment's side test
    /// applies.
    fn signed_distance(&self, point: Vec2, pseudo: bool) -> Option<f64> {
        let first = self.first?;
        let Some(tied) = self.tied.filter(|t| first.is_connected(t)) else {
            return Some(signed_distance(&first, point, pseudo));
        };

        let (incoming, outgoing) = if first.end == tied.start {
            (first, tied)
        } else {
            (tied, first)
        };
        let back = incoming.reversed().direction_normalized();
        let bisector = (back + outgoing.direction_normalized()).normalized();
        let bisection_cross = bisector.cross((point - incoming.end).normalized());
        let incoming_cross = incoming
            .direction_normalized()
            .cross((bisector - back).normalized());

        let chosen = if (bisection_cross < 0.0) == (incoming_cross < 0.0) {
            incoming
        } else {
            outgoing
        };
        Some(signed_distance(&chosen, point, pseudo))
    }
}

/// Distance to the segment (or its line, for pseudo distances), negative on
/// the segment's right-hand side
fn signed_distance(segment: &LineSegment, point: Vec2, pseudo: bool) -> f64 {
    let distance = if pseudo {
        segment.line_distance_to(point)
    } else {
        segment.distance_to(point)
    };
    if segment.side_of(point) < 0.0 {
        -distance
    } else {
        distance
    }
}

fn pixel_distances(segments: &[ColoredSegment], point: Vec2) -> Distances {
    let alpha = Nearest::search(segments.iter().map(|s| &s.segment), point)
        .signed_distance(point, false)
        .unwrap_or(0.0);

    // A channel without any edge (every contour magenta) mirrors alpha
    let channel = |mask: u8| {
        Nearest::search(
            segments.iter().filter(|s| s.color & mask != 0).map(|s| &s.segment),
            point,
        )
        .signed_distance(point, true)
        .unwrap_or(alpha)
    };

    Distances {
        r: channel(RED),
        g: channel(GREEN),
        b: channel(BLUE),
        a: alpha,
    }
}

/// Map raw distances into bytes; 127.5 is the outline
fn normalize(distances: &[Distances]) -> Vec<Color> {
    let color_range = distances.iter().map(|d| d.median().abs()).fold(0.0, f64::max);
    let alpha_range = distances.iter().map(|d| d.a.abs()).fold(0.0, f64::max);
    distances
        .iter()
        .map(|d| {
            Color::new(
                to_byte(d.r, color_range),
                to_byte(d.g, color_range),
                to_byte(d.b, color_range),
                to_byte(d.a, alpha_range),
            )
        })
        .collect()
}

fn to_byte(distance: f64, range: f64) -> u8 {
    if range <= 0.0 {
        return MIDPOINT.round() as u8;
    }
    let d = distance.clamp(-range, range);
    ((d / (2.0 * range) + 0.5) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn polygon(points: &[(f64, f64)]) -> Vec<LineSegment> {
        let points: Vec<Vec2> = points.iter().map(|&(x, y)| Vec2::new(x, y)).collect();
        (0..points.len())
            .map(|i| LineSegment::new(points[i], points[(i + 1) % points.len()]))
            .collect()
    }

    /// Clockwise in y-up space, like a TrueType outer contour
    fn square() -> Vec<LineSegment> {
        polygon(&[(0.0, 0.0), (0.0, 100.0), (100.0, 100.0), (100.0, 0.0)])
    }

    #[test]
    fn test_split_contours() {
        let mut segments = square();
        segments.extend(polygon(&[(200.0, 0.0), (200.0, 50.0), (250.0, 0.0)]));
        let contours = split_contours(&segments);
        assert_eq!(contours.len(), 2);
        assert_eq!(contours[0].len(), 4);
        assert_eq!(contours[1].len(), 3);
    }

    #[test]
    fn test_square_edges_and_colors() {
        let edges = split_edges(&square(), 135.0);
        assert_eq!(edges.len(), 4);
        assert!(edges.iter().all(|e| e.len() == 1));
        // First edge starts right after the first sharp corner
        assert_eq!(edges[0][0], square()[1]);

        let colored = MsdfGenerator::default().color_segments(&square());
        let colors: Vec<u8> = colored.iter().map(|s| s.color).collect();
        assert_eq!(colors, vec![YELLOW, CYAN, YELLOW, CYAN]);
    }

    #[test]
    fn test_smooth_contour_is_one_magenta_edge() {
        let circle: Vec<(f64, f64)> = (0..32)
            .map(|i| {
                let t = -(i as f64) / 32.0 * std::f64::consts::TAU;
                (50.0 * t.cos(), 50.0 * t.sin())
            })
            .collect();
        let segments = polygon(&circle);
        assert_eq!(split_edges(&segments, 135.0).len(), 1);

        let colored = MsdfGenerator::default().color_segments(&segments);
        assert!(colored.iter().all(|s| s.color == MAGENTA));
    }

    #[test]
    fn test_signed_distance_sides() {
        let segment = LineSegment::new(Vec2::new(0.0, 0.0), Vec2::new(0.0, 100.0));
        assert_eq!(signed_distance(&segment, Vec2::new(10.0, 50.0), false), -10.0);
        assert_eq!(signed_distance(&segment, Vec2::new(-10.0, 50.0), false), 10.0);
        // Pseudo distance extends the line past the endpoint
        assert_eq!(signed_distance(&segment, Vec2::new(10.0, 150.0), true), -10.0);
    }

    #[test]
    fn test_byte_mapping() {
        assert_eq!(to_byte(0.0, 10.0), 128);
        assert_eq!(to_byte(10.0, 10.0), 255);
        assert_eq!(to_byte(-25.0, 10.0), 0);
        assert_eq!(to_byte(3.0, 0.0), 128);

        let range = 40.0;
        for d in [-40.0, -13.7, 0.0, 2.5, 31.0] {
            let byte = to_byte(d, range);
            let decoded = (f64::from(byte) / 255.0 - 0.5) * 2.0 * range;
            assert!((decoded - d).abs() <= 2.0 * range / 255.0, "{d} -> {byte} -> {decoded}");
        }
    }

    #[test]
    fn test_square_field() {
        let texture = MsdfGenerator::default().generate_from_segments(&square(), 32);
        assert_eq!(texture.pixels.len(), 32 * 32);

        let center = texture.pixel(16, 16).unwrap();
        let corner = texture.pixel(0, 0).unwrap();
        // Inside is below the midpoint, the margin outside above it
        assert!(center.median() < 128, "{center:?}");
        assert!(center.a < 128);
        assert!(corner.median() > 128, "{corner:?}");
        assert!(corner.a > 128);
    }

    #[test]
    fn test_field_is_symmetric_for_a_square() {
        let texture = MsdfGenerator::default().generate_from_segments(&square(), 16);
        for y in 0..16 {
            for x in 0..16 {
                let a = texture.pixel(x, y).unwrap().a;
                let b = texture.pixel(15 - x, y).unwrap().a;
                assert!(a.abs_diff(b) <= 1, "({x}, {y}): {a} vs {b}");
            }
        }
    }

    #[test]
    fn test_empty_segments_are_transparent() {
        let texture = MsdfGenerator::default().generate_from_segments(&[], 8);
        assert_eq!(texture, GlyphTexture::transparent(8));
    }

    #[test]
    fn test_artifact_fix() {
        let generator = MsdfGenerator::default();
        let inside = Color::new(20, 20, 20, 20);
        let mut field = vec![inside; 9];
        field[4] = Color::new(250, 250, 10, 90);

        let fixed = generator.fix_artifacts(&field, 3);
        assert_eq!(fixed[4], Color::new(250, 250, 250, 90));
        assert_eq!(fixed[0], inside);

        // A single clashing channel is not an artifact
        field[4] = Color::new(250, 20, 20, 90);
        assert_eq!(generator.fix_artifacts(&field, 3)[4], field[4]);
    }
}
