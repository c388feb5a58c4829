//! LCD subpixel rasterization
//!
//! The glyph is filled into a coverage mask three times wider than the tile,
//! one column per color subpixel. A 5-tap filter spreads energy across
//! neighbouring subpixels to tame color fringes before every three columns
//! are collapsed into one RGB pixel.

use tiny_skia::{FillRule, Paint, PathBuilder, Pixmap, Transform};

use crate::geometry::Rect;
use crate::model::{Glyph, SampledOutline};

use super::{Color, GlyphGenerator, GlyphTexture};

/// Filter taps, normalized by their sum
const FILTER: [u32; 5] = [1, 2, 3, 2, 1];
const FILTER_SUM: u32 = 9;

/// Black-on-white subpixel renderer
#[derive(Debug, Clone, Copy, Default)]
pub struct SubpixelRasterizer;

impl SubpixelRasterizer {
    /// Render sampled outlines into a `size`×`size` tile
    ///
    /// The em square is centred on the glyph, so glyphs of one font share a
    /// scale.
    pub fn rasterize(&self, outlines: &[SampledOutline], units_per_em: u16, size: u32) -> GlyphTexture {
        let Some(mask) = coverage_mask(outlines, units_per_em, size) else {
            return GlyphTexture::transparent(size);
        };

        let width = (size * 3) as usize;
        let mut pixels = Vec::with_capacity((size * size) as usize);
        for row in mask.chunks_exact(width) {
            let filtered = filter_row(row);
            pixels.extend(filtered.chunks_exact(3).map(|sub| {
                let alpha = if sub.iter().all(|&v| v == 255) { 0 } else { 255 };
                Color::new(sub[0], sub[1], sub[2], alpha)
            }));
        }
        GlyphTexture { size, pixels }
    }
}

impl GlyphGenerator for SubpixelRasterizer {
    fn generate(&self, glyph: &Glyph, units_per_em: u16, size: u32, sample_rate: u32) -> GlyphTexture {
        let sampled = glyph.sample(sample_rate);
        self.rasterize(&sampled.outlines, units_per_em, size)
    }
}

/// Per-subpixel energy: 0 where the glyph covers, 255 elsewhere
///
/// `None` when there is nothing to draw.
fn coverage_mask(outlines: &[SampledOutline], units_per_em: u16, size: u32) -> Option<Vec<u8>> {
    let bounds = Rect::from_points(outlines.iter().flat_map(|o| o.points.iter().copied()))?;
    let em = f64::from(units_per_em.max(1));
    let center = bounds.center();
    let em_x = (center.x - em / 2.0).floor();
    let em_y = (center.y - em / 2.0).floor();

    let scale_x = f64::from(size * 3) / em;
    let scale_y = f64::from(size) / em;

    // Font units (y up) to subpixel grid (y down)
    let mut builder = PathBuilder::new();
    for outline in outlines {
        let mut points = outline.points.iter().map(|p| {
            (
                ((p.x - em_x) * scale_x) as f32,
                ((em_y + em - p.y) * scale_y) as f32,
            )
        });
        let Some((x, y)) = points.next() else {
            continue;
        };
        builder.move_to(x, y);
        for (x, y) in points {
            builder.line_to(x, y);
        }
        builder.close();
    }
    let path = builder.finish()?;

    let mut pixmap = Pixmap::new(size * 3, size)?;
    let mut paint = Paint::default();
    paint.set_color(tiny_skia::Color::BLACK);
    paint.anti_alias = false;
    pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);

    Some(
        pixmap
            .pixels()
            .iter()
            .map(|p| if p.alpha() > 0 { 0 } else { 255 })
            .collect(),
    )
}

/// Apply the 5-tap filter along one row, clamping at the ends
fn filter_row(row: &[u8]) -> Vec<u8> {
    let last = row.len() as isize - 1;
    (0..row.len() as isize)
        .map(|i| {
            let sum: u32 = FILTER
                .iter()
                .zip(-2isize..=2)
                .map(|(&weight, offset)| weight * u32::from(row[(i + offset).clamp(0, last) as usize]))
                .sum();
            ((sum as f64) / f64::from(FILTER_SUM)).round() as u8
        })
        .collect()
}
