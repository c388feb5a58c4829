//! One font (sub-font of a collection) with its glyphs and lookup tables

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::font::sfnt::cmap::CmapTable;
use crate::font::sfnt::kern::pair_key;
use crate::font::sfnt::layout::LayoutTable;
use crate::font::sfnt::name::{NameId, NameTable};
use crate::font::sfnt::post::PostTable;
use crate::font::sfnt::tables::{HeadTable, HheaTable, MaxpTable, Os2Table};

use super::glyph::{Glyph, SampledGlyph};
use super::outline::OutlineType;
use super::{InstanceRecord, VariationAxisRecord};

/// A loaded font
#[derive(Debug, Default)]
pub struct Font {
    pub head: HeadTable,
    pub maxp: MaxpTable,
    pub hhea: HheaTable,
    /// Vertical header, same layout as `hhea`
    pub vhea: Option<HheaTable>,
    pub os2: Option<Os2Table>,
    pub post: Option<PostTable>,
    pub names: NameTable,
    pub outline_type: OutlineType,
    /// Glyphs by index; composites hold `Arc`s to their parts
    pub glyphs: Vec<Arc<Glyph>>,
    pub cmap: CmapTable,
    pub axes: Vec<VariationAxisRecord>,
    pub instances: Vec<InstanceRecord>,
    pub gpos: Option<LayoutTable>,
    pub gsub: Option<LayoutTable>,
    pub(crate) name_map: HashMap<String, u32>,
    pub(crate) kerning: HashMap<u32, i16>,
}

impl Font {
    pub fn units_per_em(&self) -> u16 {
        self.head.units_per_em
    }

    pub fn ascender(&self) -> i16 {
        self.hhea.ascender
    }

    pub fn descender(&self) -> i16 {
        self.hhea.descender
    }

    pub fn line_gap(&self) -> i16 {
        self.hhea.line_gap
    }

    /// `ascender - descender + line_gap`
    pub fn line_space(&self) -> i32 {
        self.hhea.line_space()
    }

    pub fn family_name(&self) -> Option<&str> {
        self.names.get(NameId::FontFamily)
    }

    pub fn subfamily_name(&self) -> Option<&str> {
        self.names.get(NameId::FontSubfamily)
    }

    pub fn full_name(&self) -> Option<&str> {
        self.names.get(NameId::FullName)
    }

    pub fn post_script_name(&self) -> Option<&str> {
        self.names.get(NameId::PostScriptName)
    }

    pub fn glyph_count(&self) -> usize {
        self.glyphs.len()
    }

    /// Whether the font has `fvar` axes
    pub fn is_variable(&self) -> bool {
        !self.axes.is_empty()
    }

    pub fn glyph_by_index(&self, index: u32) -> Option<&Glyph> {
        self.glyphs.get(index as usize).map(Arc::as_ref)
    }

    /// Sample a glyph by index, see [`Glyph::sample`]
    pub fn sample_glyph(&self, index: u32, rate: u32) -> Option<Arc<SampledGlyph>> {
        self.glyph_by_index(index).map(|glyph| glyph.sample(rate))
    }

    pub fn glyph_by_name(&self, name: &str) -> Option<&Glyph> {
        self.name_map
            .get(name)
            .and_then(|&index| self.glyph_by_index(index))
    }

    pub fn glyph_by_unicode(&self, codepoint: u32) -> Option<&Glyph> {
        self.cmap
            .glyph_for(codepoint)
            .and_then(|index| self.glyph_by_index(index))
    }

    pub fn glyph_by_char(&self, c: char) -> Option<&Glyph> {
        self.glyph_by_unicode(c as u32)
    }

    /// Glyph for a base character followed by a variation selector
    ///
    /// Falls back to the plain mapping for default sequences and for
    /// selectors the font does not list.
    pub fn glyph_by_variation(&self, base: u32, selector: u32) -> Option<&Glyph> {
        let sequence = self
            .cmap
            .variation_sequences
            .iter()
            .find(|seq| seq.base == base && seq.selector == selector);
        match sequence.and_then(|seq| seq.glyph) {
            Some(index) => self.glyph_by_index(index),
            None => self.glyph_by_unicode(base),
        }
    }

    /// Map each character to its glyph, `.notdef` (glyph 0) when unmapped
    pub fn translate_into_glyphs(&self, text: &str) -> Vec<&Glyph> {
        text.chars()
            .filter_map(|c| self.glyph_by_char(c).or_else(|| self.glyph_by_index(0)))
            .collect()
    }

    /// `kern` adjustment for a glyph pair, 0 when absent
    pub fn kerning_value(&self, left: u32, right: u32) -> i16 {
        match (u16::try_from(left), u16::try_from(right)) {
            (Ok(l), Ok(r)) => self.kerning.get(&pair_key(l, r)).copied().unwrap_or(0),
            _ => 0,
        }
    }

    pub fn kerning_pairs(&self) -> usize {
        self.kerning.len()
    }

    /// Code point to glyph index map
    pub fn unicode_map(&self) -> &BTreeMap<u32, u32> {
        &self.cmap.unicode_to_glyph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_font() -> Font {
        let mut font = Font::default();
        font.glyphs = (0..3).map(|i| Arc::new(Glyph::new(i, OutlineType::TrueType))).collect();
        font.cmap.unicode_to_glyph.insert('A' as u32, 1);
        font.cmap.unicode_to_glyph.insert('B' as u32, 2);
        font.name_map.insert("A".to_string(), 1);
        font.kerning.insert(pair_key(1, 2), -40);
        font
    }

    #[test]
    fn test_lookups() {
        let font = sample_font();
        assert_eq!(font.glyph_by_char('A').map(|g| g.index), Some(1));
        assert_eq!(font.glyph_by_name("A").map(|g| g.index), Some(1));
        assert!(font.glyph_by_unicode(0x20).is_none());
        assert!(font.glyph_by_index(3).is_none());
        assert!(font.sample_glyph(3, 8).is_none());
        assert!(font.sample_glyph(1, 8).is_some_and(|s| s.segments.is_empty()));
    }

    #[test]
    fn test_translate_uses_notdef() {
        let font = sample_font();
        let indices: Vec<u32> = font.translate_into_glyphs("AxB").iter().map(|g| g.index).collect();
        assert_eq!(indices, vec![1, 0, 2]);
    }

    #[test]
    fn test_kerning_value() {
        let font = sample_font();
        assert_eq!(font.kerning_value(1, 2), -40);
        assert_eq!(font.kerning_value(2, 1), 0);
        assert_eq!(font.kerning_value(70_000, 1), 0);
    }
}
