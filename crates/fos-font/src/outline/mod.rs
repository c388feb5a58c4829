//! Outline processing
//!
//! Raw glyph contours go through three steps before rasterization:
//! segmentation into line/quadratic/cubic pieces, flattening at a sample
//! rate, and removal of self-intersections from the flattened segments.

pub mod intersect;
pub mod sampler;
pub mod segment;

pub use intersect::{polyline_segments, resolve_self_intersections};
pub use sampler::sample_segments;
pub use segment::segment_outline;
