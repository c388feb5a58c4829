//! Outline segmentation
//!
//! Turns a raw point list into a contiguous chain of line, quadratic and
//! cubic segments that closes back on its start point.

use crate::geometry::Vec2;
use crate::model::{Outline, OutlinePoint, OutlineSegment, OutlineType};

/// Split `outline` into segments according to its outline flavor
pub fn segment_outline(outline: &Outline, outline_type: OutlineType) -> Vec<OutlineSegment> {
    if outline.points.len() < 2 {
        return Vec::new();
    }
    let points = rotate_to_on_curve(&outline.points);
    match outline_type {
        OutlineType::TrueType => segment_quadratic(&points),
        OutlineType::Cff => segment_cubic(&points),
    }
}

/// Reorder so the first point is on-curve
///
/// When every point is a control point, the midpoint of the first two is
/// inserted as the start and the original first point moves to the end.
fn rotate_to_on_curve(points: &[OutlinePoint]) -> Vec<OutlinePoint> {
    match points.iter().position(|p| !p.is_control) {
        Some(0) => points.to_vec(),
        Some(first) => points[first..].iter().chain(&points[..first]).copied().collect(),
        None => {
            let mid = points[0].position().midpoint(points[1].position());
            let mut rotated = Vec::with_capacity(points.len() + 1);
            rotated.push(OutlinePoint::new(mid.x, mid.y, false));
            rotated.extend_from_slice(&points[1..]);
            rotated.push(points[0]);
            rotated
        }
    }
}

fn push_line(segments: &mut Vec<OutlineSegment>, from: Vec2, to: Vec2) {
    if from != to {
        segments.push(OutlineSegment::Line(from, to));
    }
}

fn segment_quadratic(points: &[OutlinePoint]) -> Vec<OutlineSegment> {
    let start = points[0].position();
    let mut segments = Vec::with_capacity(points.len());
    let mut current = start;
    let mut control: Option<Vec2> = None;

    // Walk every point once more, closing on the start point
    for point in points[1..].iter().chain(std::iter::once(&points[0])) {
        let p = point.position();
        if point.is_control {
            if let Some(c) = control {
                // Implicit on-curve point between two controls
                let mid = c.midpoint(p);
                segments.push(OutlineSegment::Quad(current, c, mid));
                current = mid;
            }
            control = Some(p);
        } else {
            match control.take() {
                Some(c) => segments.push(OutlineSegment::Quad(current, c, p)),
                None => push_line(&mut segments, current, p),
            }
            current = p;
        }
    }
    segments
}

fn segment_cubic(points: &[OutlinePoint]) -> Vec<OutlineSegment> {
    let start = points[0].position();
    let mut segments = Vec::with_capacity(points.len() / 3 + 1);
    let mut current = start;
    let mut controls: Vec<Vec2> = Vec::with_capacity(2);

    for point in &points[1..] {
        let p = point.position();
        if point.is_control {
            controls.push(p);
            continue;
        }
        segments.push(curve(current, &controls, p));
        controls.clear();
        current = p;
    }

    if !controls.is_empty() {
        segments.push(curve(current, &controls, start));
    } else {
        push_line(&mut segments, current, start);
    }
    segments
}

fn curve(from: Vec2, controls: &[Vec2], to: Vec2) -> OutlineSegment {
    match controls {
        [] => OutlineSegment::Line(from, to),
        [c] => OutlineSegment::Quad(from, *c, to),
        [c1, .., c2] => OutlineSegment::Cubic(from, *c1, *c2, to),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn on(x: f64, y: f64) -> OutlinePoint {
        OutlinePoint::new(x, y, false)
    }

    fn off(x: f64, y: f64) -> OutlinePoint {
        OutlinePoint::new(x, y, true)
    }

    fn assert_contiguous(segments: &[OutlineSegment]) {
        for pair in segments.windows(2) {
            assert_eq!(pair[0].end(), pair[1].start());
        }
        let (first, last) = (segments[0], segments[segments.len() - 1]);
        assert_eq!(last.end(), first.start());
    }

    #[test]
    fn test_square_is_four_lines() {
        let outline = Outline::new(vec![on(0.0, 0.0), on(10.0, 0.0), on(10.0, 10.0), on(0.0, 10.0)]);
        let segments = segment_outline(&outline, OutlineType::TrueType);
        assert_eq!(segments.len(), 4);
        assert!(segments.iter().all(|s| matches!(s, OutlineSegment::Line(..))));
        assert_contiguous(&segments);
    }

    #[test]
    fn test_rotation_to_on_curve() {
        // Starts with a control point
        let outline = Outline::new(vec![off(5.0, 10.0), on(10.0, 0.0), on(0.0, 0.0)]);
        let segments = segment_outline(&outline, OutlineType::TrueType);
        assert_eq!(segments[0].start(), Vec2::new(10.0, 0.0));
        assert_eq!(
            segments.last().copied(),
            Some(OutlineSegment::Quad(Vec2::new(0.0, 0.0), Vec2::new(5.0, 10.0), Vec2::new(10.0, 0.0)))
        );
        assert_contiguous(&segments);
    }

    #[test]
    fn test_implicit_midpoints() {
        // Four controls only: a circle-like contour
        let outline = Outline::new(vec![
            off(0.0, 10.0),
            off(10.0, 10.0),
            off(10.0, 0.0),
            off(0.0, 0.0),
        ]);
        let segments = segment_outline(&outline, OutlineType::TrueType);
        assert_eq!(segments.len(), 4);
        assert_eq!(segments[0].start(), Vec2::new(5.0, 10.0));
        assert!(segments.iter().all(|s| matches!(s, OutlineSegment::Quad(..))));
        assert_contiguous(&segments);
    }

    #[test]
    fn test_cff_cubics() {
        let outline = Outline::new(vec![
            on(0.0, 0.0),
            off(0.0, 10.0),
            off(10.0, 10.0),
            on(10.0, 0.0),
        ]);
        let segments = segment_outline(&outline, OutlineType::Cff);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].points().len(), 4);
        assert_eq!(segments[1], OutlineSegment::Line(Vec2::new(10.0, 0.0), Vec2::ZERO));

        // Already closed: no extra line
        let closed = Outline::new(vec![on(0.0, 0.0), on(10.0, 0.0), on(10.0, 10.0), on(0.0, 0.0)]);
        assert_eq!(segment_outline(&closed, OutlineType::Cff).len(), 3);
    }

    #[test]
    fn test_degenerate_outlines() {
        assert!(segment_outline(&Outline::default(), OutlineType::TrueType).is_empty());
        assert!(segment_outline(&Outline::new(vec![on(1.0, 1.0)]), OutlineType::Cff).is_empty());
    }
}
