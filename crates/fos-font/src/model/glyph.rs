//! Glyph model and per-glyph sample cache

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::geometry::{LineSegment, Rect};
use crate::outline::{polyline_segments, resolve_self_intersections, sample_segments, segment_outline};

use super::outline::{CompositeComponent, Outline, OutlineType, SampledOutline};

/// Glyph flattened at one sample rate
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampledGlyph {
    pub rate: u32,
    pub outlines: Vec<SampledOutline>,
    /// Polyline segments with self-intersections removed
    pub segments: Vec<LineSegment>,
    /// Bounds of the sampled points, `None` for a blank glyph
    pub bounds: Option<Rect>,
}

/// One glyph of a font
///
/// Everything except the sample cache is fixed after the font is loaded.
#[derive(Debug, Default)]
pub struct Glyph {
    pub index: u32,
    pub name: Option<String>,
    /// Code points mapping to this glyph, ascending
    pub unicodes: Vec<u32>,
    pub outline_type: OutlineType,
    /// Contours of a simple glyph; empty for composites
    pub outlines: Vec<Outline>,
    /// Components of a composite glyph
    pub components: Vec<CompositeComponent>,
    pub advance_width: u16,
    pub lsb: i16,
    pub advance_height: u16,
    pub tsb: i16,
    pub bounds: Rect,
    pub invalid: bool,
    /// GDEF glyph class (1 base, 2 ligature, 3 mark, 4 component)
    pub glyph_class: Option<u16>,
    /// Component glyphs in `components` order, linked after load
    parts: Vec<Arc<Glyph>>,
    cache: Mutex<HashMap<u32, Arc<SampledGlyph>>>,
}

impl Glyph {
    pub fn new(index: u32, outline_type: OutlineType) -> Self {
        Self {
            index,
            outline_type,
            ..Default::default()
        }
    }

    pub fn is_invalid(&self) -> bool {
        self.invalid
    }

    /// No outline to draw, neither own contours nor linked components
    pub fn is_empty(&self) -> bool {
        self.outlines.iter().all(Outline::is_empty) && self.parts.iter().all(|part| part.is_empty())
    }

    pub fn is_composite(&self) -> bool {
        !self.components.is_empty()
    }

    /// Glyphs referenced by a composite, in component order
    pub fn parts(&self) -> &[Arc<Glyph>] {
        &self.parts
    }

    /// Flattened outlines and resolved segments at `rate`
    ///
    /// Computed once per rate and shared afterwards. Callers on other
    /// threads block until the first computation for a rate finishes.
    /// Composites sample each part at the same rate and transform the
    /// part's cached polylines.
    pub fn sample(&self, rate: u32) -> Arc<SampledGlyph> {
        let rate = rate.max(1);
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sampled) = cache.get(&rate) {
            return Arc::clone(sampled);
        }

        let sampled = Arc::new(self.flatten(rate));
        cache.insert(rate, Arc::clone(&sampled));
        sampled
    }

    /// Number of sample rates currently cached
    pub fn cached_rates(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn flatten(&self, rate: u32) -> SampledGlyph {
        if self.invalid {
            return SampledGlyph {
                rate,
                ..Default::default()
            };
        }

        let outlines: Vec<SampledOutline> = if self.parts.is_empty() {
            self.outlines
                .iter()
                .map(|outline| sample_segments(&segment_outline(outline, self.outline_type), rate))
                .filter(|sampled| !sampled.points.is_empty())
                .collect()
        } else {
            let mut outlines = Vec::new();
            for (component, part) in self.components.iter().zip(&self.parts) {
                let sampled = part.sample(rate);
                outlines.extend(sampled.outlines.iter().map(|o| o.transformed(&component.transform)));
            }
            outlines
        };
        let segments = resolve_self_intersections(&polyline_segments(&outlines));
        let bounds = Rect::from_points(outlines.iter().flat_map(|o| o.points.iter().copied()));

        SampledGlyph {
            rate,
            outlines,
            segments,
            bounds,
        }
    }
}

/// Share glyphs behind `Arc`s and link every composite to its parts
///
/// Parts are linked before the composites using them. A composite whose
/// parts cannot be linked (missing index, reference cycle) is marked
/// invalid; load-time validation reports those cases first.
pub(crate) fn link_components(glyphs: Vec<Glyph>) -> Vec<Arc<Glyph>> {
    let mut pending: Vec<Option<Glyph>> = glyphs.into_iter().map(Some).collect();
    let mut linked: Vec<Option<Arc<Glyph>>> = vec![None; pending.len()];
    for index in 0..pending.len() {
        link_glyph(index, &mut pending, &mut linked);
    }
    linked.into_iter().flatten().collect()
}

fn link_glyph(
    index: usize,
    pending: &mut [Option<Glyph>],
    linked: &mut [Option<Arc<Glyph>>],
) -> Option<Arc<Glyph>> {
    if let Some(glyph) = linked.get(index)? {
        return Some(Arc::clone(glyph));
    }
    // Already taken means the glyph is being linked further up: a cycle
    let mut glyph = pending.get_mut(index)?.take()?;
    if glyph.is_composite() && !glyph.invalid {
        let parts: Option<Vec<Arc<Glyph>>> = glyph
            .components
            .iter()
            .map(|component| link_glyph(component.glyph_index as usize, pending, linked))
            .collect();
        match parts {
            Some(parts) => glyph.parts = parts,
            None => glyph.invalid = true,
        }
    }
    let glyph = Arc::new(glyph);
    linked[index] = Some(Arc::clone(&glyph));
    Some(glyph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Matrix2x3;
    use crate::model::OutlinePoint;

    fn triangle_glyph() -> Glyph {
        let mut glyph = Glyph::new(0, OutlineType::TrueType);
        glyph.outlines = vec![Outline::new(vec![
            OutlinePoint::new(0.0, 0.0, false),
            OutlinePoint::new(100.0, 0.0, false),
            OutlinePoint::new(50.0, 80.0, false),
        ])];
        glyph
    }

    #[test]
    fn test_sample_is_cached_per_rate() {
        let glyph = triangle_glyph();
        let a = glyph.sample(4);
        let b = glyph.sample(4);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.segments.len(), 3);
        assert_eq!(a.bounds, Some(Rect::new(0.0, 0.0, 100.0, 80.0)));

        glyph.sample(0);
        assert_eq!(glyph.cached_rates(), 2);
    }

    #[test]
    fn test_invalid_and_empty_glyphs() {
        let mut glyph = triangle_glyph();
        glyph.invalid = true;
        assert!(glyph.sample(8).segments.is_empty());

        let space = Glyph::new(3, OutlineType::TrueType);
        assert!(space.is_empty());
        assert!(space.sample(8).bounds.is_none());
    }

    #[test]
    fn test_concurrent_sampling() {
        let glyph = triangle_glyph();
        let results: Vec<Arc<SampledGlyph>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4).map(|_| s.spawn(|| glyph.sample(8))).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    fn composite(index: u32, parts: &[(u32, Matrix2x3)]) -> Glyph {
        let mut glyph = Glyph::new(index, OutlineType::TrueType);
        glyph.components = parts
            .iter()
            .map(|&(glyph_index, transform)| CompositeComponent {
                glyph_index,
                transform,
                flags: 0,
            })
            .collect();
        glyph
    }

    #[test]
    fn test_composite_samples_through_parts() {
        let shift = Matrix2x3 {
            m11: 0.5,
            m22: 0.5,
            m31: 200.0,
            m32: 10.0,
            ..Matrix2x3::IDENTITY
        };
        let glyphs = link_components(vec![
            triangle_glyph(),
            composite(1, &[(0, Matrix2x3::IDENTITY), (0, shift)]),
        ]);
        let (triangle, combo) = (&glyphs[0], &glyphs[1]);
        assert!(Arc::ptr_eq(&combo.parts()[0], triangle));
        assert!(combo.outlines.is_empty());
        assert!(!combo.is_empty());

        let sampled = combo.sample(4);
        assert_eq!(triangle.cached_rates(), 1);
        let part = triangle.sample(4);
        assert_eq!(sampled.outlines.len(), 2);
        assert_eq!(sampled.outlines[0], part.outlines[0]);
        for (moved, original) in sampled.outlines[1].points.iter().zip(&part.outlines[0].points) {
            assert!(moved.distance(shift.transform(*original)) < 1e-5);
        }
        assert_eq!(sampled.bounds, Some(Rect::new(0.0, 0.0, 250.0, 80.0)));
    }

    #[test]
    fn test_link_marks_unlinkable_composites() {
        let id = Matrix2x3::IDENTITY;
        let glyphs = link_components(vec![
            composite(0, &[(1, id)]),
            composite(1, &[(0, id)]),
            composite(2, &[(7, id)]),
            triangle_glyph(),
        ]);
        assert_eq!(glyphs.len(), 4);
        assert!(glyphs[2].is_invalid());
        assert!(glyphs[2].sample(2).segments.is_empty());
        // One side of the cycle is cut where the other is still being linked
        assert!(glyphs[0].is_invalid() || glyphs[1].is_invalid());
    }
}
