//! Pipeline Configuration

use crate::render::GeneratorKind;

/// Font loading options
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Maximum nesting of composite glyph references before a glyph is
    /// marked invalid
    pub max_composite_depth: usize,

    /// Minimum number of composite glyphs before resolution fans out to
    /// worker threads
    pub parallel_threshold: usize,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            max_composite_depth: 16,
            parallel_threshold: 32,
        }
    }
}

/// Texture atlas generation options
#[derive(Debug, Clone)]
pub struct AtlasConfig {
    /// First glyph index placed in the atlas
    pub start_glyph_index: u32,

    /// Number of consecutive glyphs placed in the atlas
    pub glyph_count: u32,

    /// Width and height of one glyph tile in pixels
    pub tile_size: u32,

    /// Bezier flattening rate (points per curve segment)
    pub sample_rate: u32,

    /// Bitmap generator used for every tile
    pub generator: GeneratorKind,

    /// MSDF canvas side relative to the larger glyph bbox dimension
    pub canvas_margin: f64,

    /// Angle (degrees) below which a contour joint splits MSDF edges
    pub angle_threshold: f64,

    /// Channel difference (byte units) counted as an MSDF artifact
    pub artifact_threshold: f64,
}

impl AtlasConfig {
    /// Atlas covering `glyph_count` glyphs starting at `start_glyph_index`
    pub fn new(start_glyph_index: u32, glyph_count: u32) -> Self {
        Self {
            start_glyph_index,
            glyph_count,
            ..Self::default()
        }
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_generator(mut self, generator: GeneratorKind) -> Self {
        self.generator = generator;
        self
    }
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            start_glyph_index: 0,
            glyph_count: 0,
            tile_size: 64,
            sample_rate: 8,
            generator: GeneratorKind::Msdf,
            canvas_margin: 1.3,
            angle_threshold: 135.0,
            artifact_threshold: 50.0,
        }
    }
}
