//! Glyph bitmap generation and atlas packing

mod atlas;
mod msdf;
mod subpixel;

pub use atlas::{generate_texture_atlas, AtlasLayout, TextureAtlasData, UvRect};
pub use msdf::MsdfGenerator;
pub use subpixel::SubpixelRasterizer;

use crate::model::Glyph;

/// RGBA8 pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Median of the three color channels
    pub fn median(&self) -> u8 {
        let (r, g, b) = (self.r, self.g, self.b);
        r.min(g).max(r.max(g).min(b))
    }
}

/// Square glyph bitmap, rows top to bottom
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphTexture {
    pub size: u32,
    pub pixels: Vec<Color>,
}

impl GlyphTexture {
    /// Fully transparent tile
    pub fn transparent(size: u32) -> Self {
        Self {
            size,
            pixels: vec![Color::TRANSPARENT; (size as usize) * (size as usize)],
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.size || y >= self.size {
            return None;
        }
        self.pixels.get((y * self.size + x) as usize).copied()
    }

    /// Whether every pixel has zero alpha
    pub fn is_blank(&self) -> bool {
        self.pixels.iter().all(|p| p.a == 0)
    }
}

/// Bitmap generator selected for an atlas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GeneratorKind {
    /// Multi-channel signed distance field
    #[default]
    Msdf,
    /// LCD subpixel coverage
    Subpixel,
}

/// Turns one glyph into a `size`×`size` tile
pub trait GlyphGenerator: Send + Sync {
    fn generate(&self, glyph: &Glyph, units_per_em: u16, size: u32, sample_rate: u32) -> GlyphTexture;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_median() {
        assert_eq!(Color::new(10, 200, 90, 0).median(), 90);
        assert_eq!(Color::new(255, 0, 0, 0).median(), 0);
        assert_eq!(Color::new(7, 7, 200, 0).median(), 7);
    }

    #[test]
    fn test_texture_access() {
        let mut texture = GlyphTexture::transparent(4);
        assert!(texture.is_blank());
        texture.pixels[4 * 2 + 3] = Color::new(1, 2, 3, 255);
        assert_eq!(texture.pixel(3, 2), Some(Color::new(1, 2, 3, 255)));
        assert_eq!(texture.pixel(4, 0), None);
        assert!(!texture.is_blank());
    }
}
