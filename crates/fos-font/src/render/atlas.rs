//! Glyph texture atlas
//!
//! Tiles are laid out on a near-square grid in glyph index order, so a
//! glyph's place in the atlas follows from its index alone.

use crate::config::AtlasConfig;
use crate::model::TypeFace;
use crate::parallel;
use crate::{FontError, Result};

use super::{Color, GeneratorKind, GlyphGenerator, GlyphTexture, MsdfGenerator, SubpixelRasterizer};

/// Normalized texture coordinates of one tile, origin top-left
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvRect {
    pub u0: f32,
    pub v0: f32,
    pub u1: f32,
    pub v1: f32,
}

/// Grid placement of a consecutive glyph range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasLayout {
    pub start_glyph_index: u32,
    pub glyph_count: u32,
    pub tile_size: u32,
    pub columns: u32,
    pub rows: u32,
}

impl AtlasLayout {
    pub fn new(start_glyph_index: u32, glyph_count: u32, tile_size: u32) -> Self {
        let columns = grid_columns(glyph_count);
        let rows = if columns == 0 { 0 } else { glyph_count.div_ceil(columns) };
        Self {
            start_glyph_index,
            glyph_count,
            tile_size,
            columns,
            rows,
        }
    }

    pub fn width(&self) -> u32 {
        self.columns.saturating_mul(self.tile_size)
    }

    pub fn height(&self) -> u32 {
        self.rows.saturating_mul(self.tile_size)
    }

    /// Atlas area in pixels, `None` when it does not fit in `u32`
    pub fn pixel_count(&self) -> Option<u32> {
        let width = self.columns.checked_mul(self.tile_size)?;
        let height = self.rows.checked_mul(self.tile_size)?;
        width.checked_mul(height)
    }

    pub fn contains(&self, glyph_index: u32) -> bool {
        glyph_index >= self.start_glyph_index && glyph_index - self.start_glyph_index < self.glyph_count
    }

    /// Grid cell (column, row) of a glyph
    pub fn tile_position(&self, glyph_index: u32) -> Option<(u32, u32)> {
        if !self.contains(glyph_index) {
            return None;
        }
        let offset = glyph_index - self.start_glyph_index;
        Some((offset % self.columns, offset / self.columns))
    }

    /// Pixel coordinates of a glyph's top-left corner
    pub fn tile_origin(&self, glyph_index: u32) -> Option<(u32, u32)> {
        self.tile_position(glyph_index)
            .map(|(column, row)| (column * self.tile_size, row * self.tile_size))
    }

    pub fn uv_rect(&self, glyph_index: u32) -> Option<UvRect> {
        let (x, y) = self.tile_origin(glyph_index)?;
        let width = self.width() as f32;
        let height = self.height() as f32;
        let tile = self.tile_size as f32;
        Some(UvRect {
            u0: x as f32 / width,
            v0: y as f32 / height,
            u1: (x as f32 + tile) / width,
            v1: (y as f32 + tile) / height,
        })
    }
}

/// Smallest column count whose square holds `count` tiles
fn grid_columns(count: u32) -> u32 {
    if count == 0 {
        return 0;
    }
    let mut columns = f64::from(count).sqrt().ceil() as u32;
    while columns * columns < count {
        columns += 1;
    }
    while columns > 1 && (columns - 1) * (columns - 1) >= count {
        columns -= 1;
    }
    columns
}

/// Packed atlas pixels, row-major from the top
#[derive(Debug, Clone, PartialEq)]
pub struct TextureAtlasData {
    pub pixels: Vec<Color>,
    pub width: u32,
    pub height: u32,
    pub layout: AtlasLayout,
}

impl TextureAtlasData {
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get((y * self.width + x) as usize).copied()
    }

    pub fn uv_rect(&self, glyph_index: u32) -> Option<UvRect> {
        self.layout.uv_rect(glyph_index)
    }

    /// Copy of one glyph's tile
    pub fn tile(&self, glyph_index: u32) -> Option<GlyphTexture> {
        let (x0, y0) = self.layout.tile_origin(glyph_index)?;
        let size = self.layout.tile_size;
        let mut pixels = Vec::with_capacity((size * size) as usize);
        for y in y0..y0 + size {
            let row = (y * self.width + x0) as usize;
            pixels.extend_from_slice(&self.pixels[row..row + size as usize]);
        }
        Some(GlyphTexture { size, pixels })
    }

    fn blit(&mut self, tile: &GlyphTexture, x0: u32, y0: u32) {
        let size = tile.size as usize;
        for (row, src) in tile.pixels.chunks_exact(size).enumerate() {
            let start = ((y0 as usize + row) * self.width as usize) + x0 as usize;
            self.pixels[start..start + size].copy_from_slice(src);
        }
    }
}

/// Render a glyph range of one font into an atlas
///
/// Tiles are generated in parallel. Empty and invalid glyphs leave a
/// transparent tile.
pub fn generate_texture_atlas(typeface: &TypeFace, font_index: usize, config: &AtlasConfig) -> Result<TextureAtlasData> {
    if config.glyph_count == 0 {
        return Err(FontError::InvalidAtlasRequest("glyph count must be positive".into()));
    }
    if config.tile_size == 0 {
        return Err(FontError::InvalidAtlasRequest("tile size must be positive".into()));
    }
    let font = typeface.font(font_index).ok_or_else(|| {
        FontError::InvalidAtlasRequest(format!(
            "font index {font_index} out of range ({} fonts loaded)",
            typeface.fonts().len()
        ))
    })?;

    let count = font.glyph_count() as u32;
    let start = config.start_glyph_index;
    let end = start
        .checked_add(config.glyph_count)
        .filter(|&end| end <= count)
        .ok_or(FontError::GlyphOutOfRange {
            index: start.saturating_add(config.glyph_count - 1),
            count,
        })?;

    let layout = AtlasLayout::new(start, config.glyph_count, config.tile_size);
    let pixel_count = layout.pixel_count().ok_or_else(|| {
        FontError::InvalidAtlasRequest(format!(
            "{}x{} grid of {}px tiles is too large",
            layout.columns, layout.rows, layout.tile_size
        ))
    })?;

    let generator: Box<dyn GlyphGenerator> = match config.generator {
        GeneratorKind::Msdf => Box::new(MsdfGenerator::from_config(config)),
        GeneratorKind::Subpixel => Box::new(SubpixelRasterizer),
    };
    let generator = generator.as_ref();

    let indices: Vec<u32> = (start..end).collect();
    let tiles = parallel::try_map(&indices, |&index| {
        let glyph = font
            .glyph_by_index(index)
            .ok_or(FontError::GlyphOutOfRange { index, count })?;
        Ok::<_, FontError>(generator.generate(
            glyph,
            font.units_per_em(),
            config.tile_size,
            config.sample_rate,
        ))
    })?;

    let mut atlas = TextureAtlasData {
        pixels: vec![Color::TRANSPARENT; pixel_count as usize],
        width: layout.width(),
        height: layout.height(),
        layout,
    };
    for (index, tile) in (start..end).zip(&tiles) {
        if let Some((x, y)) = layout.tile_origin(index) {
            atlas.blit(tile, x, y);
        }
    }

    tracing::info!(
        "Generated {}x{} {:?} atlas: glyphs {start}..{end}, {}px tiles in a {}x{} grid",
        atlas.width,
        atlas.height,
        config.generator,
        layout.tile_size,
        layout.columns,
        layout.rows
    );
    Ok(atlas)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_columns() {
        assert_eq!(grid_columns(0), 0);
        assert_eq!(grid_columns(1), 1);
        assert_eq!(grid_columns(2), 2);
        assert_eq!(grid_columns(4), 2);
        assert_eq!(grid_columns(5), 3);
        assert_eq!(grid_columns(10), 4);
        assert_eq!(grid_columns(10_000), 100);
    }

    #[test]
    fn test_layout() {
        let layout = AtlasLayout::new(10, 5, 16);
        assert_eq!((layout.columns, layout.rows), (3, 2));
        assert_eq!((layout.width(), layout.height()), (48, 32));
        assert_eq!(layout.tile_position(10), Some((0, 0)));
        assert_eq!(layout.tile_position(13), Some((0, 1)));
        assert_eq!(layout.tile_origin(14), Some((16, 16)));
        assert_eq!(layout.tile_position(9), None);
        assert_eq!(layout.tile_position(15), None);
        assert_eq!(layout.pixel_count(), Some(48 * 32));
    }

    #[test]
    fn test_oversized_layout() {
        let layout = AtlasLayout::new(0, 2, 70_000);
        assert_eq!(layout.width(), 140_000);
        assert_eq!(layout.pixel_count(), None);
        assert_eq!(AtlasLayout::new(0, 70_000, u32::MAX).width(), u32::MAX);
    }

    #[test]
    fn test_uv_rects() {
        let layout = AtlasLayout::new(0, 2, 32);
        assert_eq!(
            layout.uv_rect(0),
            Some(UvRect {
                u0: 0.0,
                v0: 0.0,
                u1: 0.5,
                v1: 1.0
            })
        );
        assert_eq!(
            layout.uv_rect(1),
            Some(UvRect {
                u0: 0.5,
                v0: 0.0,
                u1: 1.0,
                v1: 1.0
            })
        );
        assert_eq!(layout.uv_rect(2), None);
    }

    #[test]
    fn test_blit_and_tile() {
        let layout = AtlasLayout::new(0, 3, 2);
        let mut atlas = TextureAtlasData {
            pixels: vec![Color::TRANSPARENT; (layout.width() * layout.height()) as usize],
            width: layout.width(),
            height: layout.height(),
            layout,
        };
        let red = Color::new(255, 0, 0, 255);
        let tile = GlyphTexture {
            size: 2,
            pixels: vec![red; 4],
        };
        atlas.blit(&tile, 0, 2);

        assert_eq!(atlas.pixel(1, 3), Some(red));
        assert_eq!(atlas.pixel(2, 2), Some(Color::TRANSPARENT));
        assert_eq!(atlas.tile(2), Some(tile));
        assert!(atlas.tile(1).is_some_and(|t| t.is_blank()));
    }
}
