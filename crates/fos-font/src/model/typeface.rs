//! Loaded font file: one or more fonts plus the load log

use std::path::Path;

use crate::config::LoadConfig;
use crate::detect::FontFormat;
use crate::diagnostics::{Message, Severity};
use crate::Result;

use super::font::Font;
use super::glyph::Glyph;

/// Result of loading one font file
///
/// Collections (`.ttc`, WOFF2 collections) hold one [`Font`] per face. A file
/// whose container could not be decompressed loads with no fonts and an
/// error message instead of failing.
#[derive(Debug)]
pub struct TypeFace {
    fonts: Vec<Font>,
    messages: Vec<Message>,
    format: FontFormat,
}

impl TypeFace {
    pub(crate) fn new(fonts: Vec<Font>, messages: Vec<Message>, format: FontFormat) -> Self {
        Self {
            fonts,
            messages,
            format,
        }
    }

    /// Load a font from memory; `extension` is used only when the signature
    /// is not recognized
    pub fn load(data: &[u8], extension: Option<&str>) -> Result<TypeFace> {
        Self::load_with_config(data, extension, &LoadConfig::default())
    }

    pub fn load_with_config(
        data: &[u8],
        extension: Option<&str>,
        config: &LoadConfig,
    ) -> Result<TypeFace> {
        crate::font::load_typeface(data, extension, config)
    }

    /// Read and load a font file
    pub fn load_file(path: impl AsRef<Path>) -> Result<TypeFace> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let extension = path.extension().and_then(|ext| ext.to_str());
        Self::load(&data, extension)
    }

    pub fn format(&self) -> FontFormat {
        self.format
    }

    pub fn fonts(&self) -> &[Font] {
        &self.fonts
    }

    pub fn font(&self, index: usize) -> Option<&Font> {
        self.fonts.get(index)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Message> {
        self.messages
            .iter()
            .filter(|m| m.severity == Severity::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.is_error())
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    // Lookups on the first font

    pub fn glyph_by_index(&self, index: u32) -> Option<&Glyph> {
        self.fonts.first()?.glyph_by_index(index)
    }

    pub fn glyph_by_name(&self, name: &str) -> Option<&Glyph> {
        self.fonts.first()?.glyph_by_name(name)
    }

    pub fn glyph_by_unicode(&self, codepoint: u32) -> Option<&Glyph> {
        self.fonts.first()?.glyph_by_unicode(codepoint)
    }

    pub fn glyph_by_char(&self, c: char) -> Option<&Glyph> {
        self.fonts.first()?.glyph_by_char(c)
    }

    pub fn translate_into_glyphs(&self, text: &str) -> Vec<&Glyph> {
        self.fonts
            .first()
            .map(|font| font.translate_into_glyphs(text))
            .unwrap_or_default()
    }
}
