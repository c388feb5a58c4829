//! fOS Font - Font Ingestion and Glyph Atlas Generation
//!
//! This crate turns font files into GPU-ready glyph textures:
//! - Container detection and parsing (TrueType, OpenType/CFF, WOFF, WOFF2)
//! - Font model: `TypeFace` -> `Font` -> `Glyph` with metrics, names and cmap
//! - Outline segmentation, Bezier sampling and self-intersection removal
//! - MSDF and subpixel glyph rasterization
//! - Grid texture atlas packing with index-derived UV rectangles

pub mod config;
pub mod detect;
pub mod diagnostics;
pub mod font;
pub mod geometry;
pub mod model;
pub mod outline;
pub mod parallel;
pub mod render;

pub use config::{AtlasConfig, LoadConfig};
pub use detect::{detect, FontFormat};
pub use diagnostics::{Message, ParseOutcome, Severity};
pub use font::reader::{FontReader, StringEncoding};
pub use geometry::{LineSegment, Matrix2x3, Rect, Vec2};
pub use model::{
    CompositeComponent, Font, Glyph, InstanceRecord, NameId, Outline, OutlinePoint,
    OutlineSegment, OutlineType, SampledGlyph, SampledOutline, TypeFace, VariationAxisRecord,
};
pub use render::{
    generate_texture_atlas, AtlasLayout, Color, GeneratorKind, GlyphGenerator, GlyphTexture,
    MsdfGenerator, SubpixelRasterizer, TextureAtlasData, UvRect,
};

/// Font pipeline error types
///
/// Only structural problems surface here; per-glyph and decompression problems
/// are recorded as [`Message`]s on the loaded [`TypeFace`].
#[derive(Debug, thiserror::Error)]
pub enum FontError {
    #[error("Truncated stream: needed {needed} bytes at offset {offset}, {available} available")]
    TruncatedStream {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Unsupported font format")]
    UnsupportedFontFormat,

    #[error("Missing mandatory table '{0}'")]
    MissingTable(String),

    #[error("Unsupported cmap subtable format {0}")]
    UnsupportedCmapFormat(u16),

    #[error("Invalid '{tag}' table: {reason}")]
    InvalidTable { tag: String, reason: String },

    #[error("Glyph index {index} out of range (font has {count} glyphs)")]
    GlyphOutOfRange { index: u32, count: u32 },

    #[error("Invalid atlas request: {0}")]
    InvalidAtlasRequest(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FontError {
    /// Shorthand for an [`FontError::InvalidTable`] error
    pub fn invalid(tag: &str, reason: impl Into<String>) -> Self {
        FontError::InvalidTable {
            tag: tag.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FontError>;
