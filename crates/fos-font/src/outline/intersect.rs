//! Self-intersection removal for flattened glyphs
//!
//! Overlapping contours (common in variable and composite glyphs) confuse the
//! distance field. Each segment is cut at its crossings with later segments
//! and alternate pieces are dropped, toggling an inside flag at every hit.

use crate::geometry::{LineSegment, Vec2};
use crate::model::SampledOutline;

/// Hits closer than this to a segment endpoint are the shared joint itself
const ENDPOINT_EPSILON: f64 = 1e-9;

/// Consecutive polyline points as segments, zero-length ones dropped
pub fn polyline_segments(outlines: &[SampledOutline]) -> Vec<LineSegment> {
    outlines
        .iter()
        .flat_map(|outline| outline.points.windows(2))
        .map(|pair| LineSegment::new(pair[0], pair[1]))
        .filter(|segment| !segment.is_degenerate())
        .collect()
}

/// Cut every segment at its crossings with later segments and keep the
/// pieces outside the toggled regions
pub fn resolve_self_intersections(segments: &[LineSegment]) -> Vec<LineSegment> {
    let mut resolved = Vec::with_capacity(segments.len());

    for (i, segment) in segments.iter().enumerate() {
        let mut hits: Vec<(f64, Vec2)> = segments[i + 1..]
            .iter()
            .filter_map(|other| segment.intersection(other))
            .filter(|hit| {
                hit.distance(segment.start) > ENDPOINT_EPSILON
                    && hit.distance(segment.end) > ENDPOINT_EPSILON
            })
            .map(|hit| (hit.distance(segment.start), hit))
            .collect();

        if hits.is_empty() {
            resolved.push(*segment);
            continue;
        }

        // Stable: equal distances keep segment order
        hits.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut inside = false;
        let mut cursor = segment.start;
        for (_, hit) in hits {
            if !inside {
                push_piece(&mut resolved, cursor, hit);
            }
            cursor = hit;
            inside = !inside;
        }
        if !inside {
            push_piece(&mut resolved, cursor, segment.end);
        }
    }

    resolved
}

fn push_piece(out: &mut Vec<LineSegment>, from: Vec2, to: Vec2) {
    let piece = LineSegment::new(from, to);
    if !piece.is_degenerate() {
        out.push(piece);
    }
}
