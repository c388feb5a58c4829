//! Bezier flattening

use crate::model::{OutlineSegment, SampledOutline};

/// Decimal places kept on sampled coordinates
const SAMPLE_PRECISION: i32 = 4;

/// Flatten a closed segment chain into a polyline
///
/// Curves contribute `rate` points each (at `t = k / rate`), lines only their
/// end point. The polyline starts at the first segment's start, so for a
/// closed chain the first and last points coincide. A rate of 0 samples as 1.
pub fn sample_segments(segments: &[OutlineSegment], rate: u32) -> SampledOutline {
    let Some(first) = segments.first() else {
        return SampledOutline::default();
    };
    let rate = rate.max(1);

    let mut points = Vec::with_capacity(segments.len() * rate as usize + 1);
    points.push(first.start().rounded(SAMPLE_PRECISION));
    for segment in segments {
        match segment {
            OutlineSegment::Line(_, end) => points.push(end.rounded(SAMPLE_PRECISION)),
            curve => {
                for k in 1..=rate {
                    let t = k as f64 / rate as f64;
                    points.push(curve.point_at(t).rounded(SAMPLE_PRECISION));
                }
            }
        }
    }
    SampledOutline { points }
}
