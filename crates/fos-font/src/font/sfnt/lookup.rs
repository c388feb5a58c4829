//! GPOS and GSUB lookup subtables
//!
//! Subtables are decoded into plain data with their coverage resolved.
//! Extension subtables are unwrapped so callers only ever see the
//! wrapped lookup type.

use std::collections::BTreeMap;

use crate::font::reader::FontReader;
use crate::{FontError, Result};

use super::layout::read_class_def;

/// Which layout table a lookup list belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
    Gpos,
    Gsub,
}

impl LayoutKind {
    pub fn tag(self) -> &'static str {
        match self {
            LayoutKind::Gpos => "GPOS",
            LayoutKind::Gsub => "GSUB",
        }
    }

    /// Lookup type that wraps another subtable behind a 32-bit offset
    pub fn extension_type(self) -> u16 {
        match self {
            LayoutKind::Gpos => 9,
            LayoutKind::Gsub => 7,
        }
    }
}

/// Coverage table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Coverage {
    /// Format 1: sorted glyph array
    Glyphs(Vec<u16>),
    /// Format 2: glyph ranges
    Ranges(Vec<CoverageRange>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverageRange {
    pub start: u16,
    pub end: u16,
    pub start_index: u16,
}

impl Coverage {
    pub fn parse(data: &[u8], offset: usize, tag: &str) -> Result<Self> {
        let mut r = FontReader::at(data, offset);
        let format = r.read_u16()?;
        let count = r.read_u16()?;
        match format {
            1 => {
                let glyphs = (0..count).map(|_| r.read_u16()).collect::<Result<Vec<_>>>()?;
                Ok(Coverage::Glyphs(glyphs))
            }
            2 => {
                let mut ranges = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    ranges.push(CoverageRange {
                        start: r.read_u16()?,
                        end: r.read_u16()?,
                        start_index: r.read_u16()?,
                    });
                }
                Ok(Coverage::Ranges(ranges))
            }
            other => Err(FontError::invalid(tag, format!("Coverage format {other}"))),
        }
    }

    /// Coverage index of a glyph
    pub fn index(&self, glyph: u16) -> Option<u16> {
        match self {
            Coverage::Glyphs(glyphs) => glyphs.binary_search(&glyph).ok().map(|i| i as u16),
            Coverage::Ranges(ranges) => ranges
                .iter()
                .find(|range| range.start <= glyph && glyph <= range.end)
                .map(|range| range.start_index.wrapping_add(glyph - range.start)),
        }
    }

    pub fn contains(&self, glyph: u16) -> bool {
        self.index(glyph).is_some()
    }
}

/// Positioning adjustment; device table offsets are kept but not resolved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValueRecord {
    pub x_placement: i16,
    pub y_placement: i16,
    pub x_advance: i16,
    pub y_advance: i16,
    pub x_pla_device: u16,
    pub y_pla_device: u16,
    pub x_adv_device: u16,
    pub y_adv_device: u16,
}

impl ValueRecord {
    pub fn parse(r: &mut FontReader, format: u16) -> Result<Self> {
        let mut record = ValueRecord::default();
        if format & 0x0001 != 0 {
            record.x_placement = r.read_i16()?;
        }
        if format & 0x0002 != 0 {
            record.y_placement = r.read_i16()?;
        }
        if format & 0x0004 != 0 {
            record.x_advance = r.read_i16()?;
        }
        if format & 0x0008 != 0 {
            record.y_advance = r.read_i16()?;
        }
        if format & 0x0010 != 0 {
            record.x_pla_device = r.read_u16()?;
        }
        if format & 0x0020 != 0 {
            record.y_pla_device = r.read_u16()?;
        }
        if format & 0x0040 != 0 {
            record.x_adv_device = r.read_u16()?;
        }
        if format & 0x0080 != 0 {
            record.y_adv_device = r.read_u16()?;
        }
        Ok(record)
    }

    /// Bytes taken by a record of this format
    pub fn size(format: u16) -> usize {
        (format & 0x00FF).count_ones() as usize * 2
    }

    pub fn is_empty(&self) -> bool {
        self.x_placement == 0 && self.y_placement == 0 && self.x_advance == 0 && self.y_advance == 0
    }
}

/// GPOS type 1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinglePos {
    pub coverage: Coverage,
    pub values: SinglePosValues,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinglePosValues {
    /// Format 1: one adjustment for every covered glyph
    Shared(ValueRecord),
    /// Format 2: one adjustment per coverage index
    PerGlyph(Vec<ValueRecord>),
}

impl SinglePos {
    fn parse(data: &[u8], base: usize, tag: &str) -> Result<Self> {
        let mut r = FontReader::at(data, base);
        let format = r.read_u16()?;
        let coverage = Coverage::parse(data, base + r.read_u16()? as usize, tag)?;
        let value_format = r.read_u16()?;
        let values = match format {
            1 => SinglePosValues::Shared(ValueRecord::parse(&mut r, value_format)?),
            2 => {
                let count = r.read_u16()?;
                let values = (0..count)
                    .map(|_| ValueRecord::parse(&mut r, value_format))
                    .collect::<Result<Vec<_>>>()?;
                SinglePosValues::PerGlyph(values)
            }
            other => return Err(FontError::invalid(tag, format!("SinglePos format {other}"))),
        };
        Ok(Self { coverage, values })
    }

    pub fn value(&self, glyph: u16) -> Option<ValueRecord> {
        let index = self.coverage.index(glyph)?;
        match &self.values {
            SinglePosValues::Shared(value) => Some(*value),
            SinglePosValues::PerGlyph(values) => values.get(index as usize).copied(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairValue {
    pub second_glyph: u16,
    pub first: ValueRecord,
    pub second: ValueRecord,
}

/// GPOS type 2
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairPos {
    /// Format 1: explicit pairs, one set per covered first glyph
    Glyphs {
        coverage: Coverage,
        pair_sets: Vec<Vec<PairValue>>,
    },
    /// Format 2: class pairs
    Classes {
        coverage: Coverage,
        first_classes: BTreeMap<u32, u16>,
        second_classes: BTreeMap<u32, u16>,
        second_class_count: u16,
        records: Vec<(ValueRecord, ValueRecord)>,
    },
}

impl PairPos {
    fn parse(data: &[u8], base: usize, tag: &str) -> Result<Self> {
        let mut r = FontReader::at(data, base);
        let format = r.read_u16()?;
        let coverage = Coverage::parse(data, base + r.read_u16()? as usize, tag)?;
        let format1 = r.read_u16()?;
        let format2 = r.read_u16()?;

        match format {
            1 => {
                let set_count = r.read_u16()?;
                let mut pair_sets = Vec::with_capacity(set_count as usize);
                for _ in 0..set_count {
                    let mut s = FontReader::at(data, base + r.read_u16()? as usize);
                    let count = s.read_u16()?;
                    let mut pairs = Vec::with_capacity(count as usize);
                    for _ in 0..count {
                        pairs.push(PairValue {
                            second_glyph: s.read_u16()?,
                            first: ValueRecord::parse(&mut s, format1)?,
                            second: ValueRecord::parse(&mut s, format2)?,
                        });
                    }
                    pair_sets.push(pairs);
                }
                Ok(PairPos::Glyphs { coverage, pair_sets })
            }
            2 => {
                let first_classes = read_class_def(data, base + r.read_u16()? as usize, tag)?;
                let second_classes = read_class_def(data, base + r.read_u16()? as usize, tag)?;
                let first_class_count = r.read_u16()?;
                let second_class_count = r.read_u16()?;

                let total = first_class_count as usize * second_class_count as usize;
                let record_size = ValueRecord::size(format1) + ValueRecord::size(format2);
                // Zero-sized records carry no adjustment at all
                let mut records = Vec::new();
                if record_size > 0 {
                    if total.saturating_mul(record_size) > r.remaining() {
                        return Err(FontError::invalid(
                            tag,
                            format!("{first_class_count}x{second_class_count} class records overrun the subtable"),
                        ));
                    }
                    records.reserve(total);
                    for _ in 0..total {
                        let first = ValueRecord::parse(&mut r, format1)?;
                        let second = ValueRecord::parse(&mut r, format2)?;
                        records.push((first, second));
                    }
                }
                Ok(PairPos::Classes {
                    coverage,
                    first_classes,
                    second_classes,
                    second_class_count,
                    records,
                })
            }
            other => Err(FontError::invalid(tag, format!("PairPos format {other}"))),
        }
    }

    /// Adjustments for the pair `(first, second)`
    pub fn adjustment(&self, first: u16, second: u16) -> Option<(ValueRecord, ValueRecord)> {
        match self {
            PairPos::Glyphs { coverage, pair_sets } => {
                let set = pair_sets.get(coverage.index(first)? as usize)?;
                set.iter()
                    .find(|pair| pair.second_glyph == second)
                    .map(|pair| (pair.first, pair.second))
            }
            PairPos::Classes {
                coverage,
                first_classes,
                second_classes,
                second_class_count,
                records,
            } => {
                coverage.index(first)?;
                let class1 = first_classes.get(&(first as u32)).copied().unwrap_or(0) as usize;
                let class2 = second_classes.get(&(second as u32)).copied().unwrap_or(0) as usize;
                if class2 >= *second_class_count as usize {
                    return None;
                }
                records.get(class1 * *second_class_count as usize + class2).copied()
            }
        }
    }
}

/// GSUB type 1
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SingleSubst {
    /// Format 1: add a delta to the glyph ID
    Delta { coverage: Coverage, delta: i16 },
    /// Format 2: substitute per coverage index
    Substitutes { coverage: Coverage, glyphs: Vec<u16> },
}

impl SingleSubst {
    fn parse(data: &[u8], base: usize, tag: &str) -> Result<Self> {
        let mut r = FontReader::at(data, base);
        let format = r.read_u16()?;
        let coverage = Coverage::parse(data, base + r.read_u16()? as usize, tag)?;
        match format {
            1 => Ok(SingleSubst::Delta {
                coverage,
                delta: r.read_i16()?,
            }),
            2 => {
                let count = r.read_u16()?;
                let glyphs = (0..count).map(|_| r.read_u16()).collect::<Result<Vec<_>>>()?;
                Ok(SingleSubst::Substitutes { coverage, glyphs })
            }
            other => Err(FontError::invalid(tag, format!("SingleSubst format {other}"))),
        }
    }

    pub fn substitute(&self, glyph: u16) -> Option<u16> {
        match self {
            SingleSubst::Delta { coverage, delta } => {
                coverage.index(glyph)?;
                Some((glyph as i32 + *delta as i32) as u16)
            }
            SingleSubst::Substitutes { coverage, glyphs } => {
                glyphs.get(coverage.index(glyph)? as usize).copied()
            }
        }
    }
}

/// GSUB type 2 (sequences) and type 3 (alternate sets) share one layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlyphSequences {
    pub coverage: Coverage,
    pub sequences: Vec<Vec<u16>>,
}

impl GlyphSequences {
    fn parse(data: &[u8], base: usize, tag: &str) -> Result<Self> {
        let mut r = FontReader::at(data, base);
        let format = r.read_u16()?;
        if format != 1 {
            return Err(FontError::invalid(tag, format!("sequence subtable format {format}")));
        }
        let coverage = Coverage::parse(data, base + r.read_u16()? as usize, tag)?;
        let count = r.read_u16()?;
        let mut sequences = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let mut s = FontReader::at(data, base + r.read_u16()? as usize);
            let len = s.read_u16()?;
            sequences.push((0..len).map(|_| s.read_u16()).collect::<Result<Vec<_>>>()?);
        }
        Ok(Self { coverage, sequences })
    }

    pub fn sequence(&self, glyph: u16) -> Option<&[u16]> {
        self.sequences
            .get(self.coverage.index(glyph)? as usize)
            .map(Vec::as_slice)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ligature {
    pub glyph: u16,
    /// Components after the first (covered) glyph
    pub components: Vec<u16>,
}

/// GSUB type 4
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LigatureSubst {
    pub coverage: Coverage,
    pub ligature_sets: Vec<Vec<Ligature>>,
}

impl LigatureSubst {
    fn parse(data: &[u8], base: usize, tag: &str) -> Result<Self> {
        let mut r = FontReader::at(data, base);
        let format = r.read_u16()?;
        if format != 1 {
            return Err(FontError::invalid(tag, format!("LigatureSubst format {format}")));
        }
        let coverage = Coverage::parse(data, base + r.read_u16()? as usize, tag)?;
        let set_count = r.read_u16()?;
        let mut ligature_sets = Vec::with_capacity(set_count as usize);
        for _ in 0..set_count {
            let set_base = base + r.read_u16()? as usize;
            let mut s = FontReader::at(data, set_base);
            let count = s.read_u16()?;
            let mut ligatures = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let mut l = FontReader::at(data, set_base + s.read_u16()? as usize);
                let glyph = l.read_u16()?;
                let component_count = l.read_u16()?;
                let components = (1..component_count)
                    .map(|_| l.read_u16())
                    .collect::<Result<Vec<_>>>()?;
                ligatures.push(Ligature { glyph, components });
            }
            ligature_sets.push(ligatures);
        }
        Ok(Self { coverage, ligature_sets })
    }

    /// First ligature whose components match the start of `glyphs`,
    /// with the number of glyphs it consumes
    pub fn ligature(&self, glyphs: &[u16]) -> Option<(u16, usize)> {
        let (&first, rest) = glyphs.split_first()?;
        let set = self.ligature_sets.get(self.coverage.index(first)? as usize)?;
        set.iter()
            .find(|lig| rest.starts_with(&lig.components))
            .map(|lig| (lig.glyph, lig.components.len() + 1))
    }
}

/// Decoded lookup subtable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupSubtable {
    SinglePos(SinglePos),
    PairPos(PairPos),
    SingleSubst(SingleSubst),
    MultipleSubst(GlyphSequences),
    AlternateSubst(GlyphSequences),
    LigatureSubst(LigatureSubst),
    /// Lookup type the loader keeps undecoded
    Unsupported { lookup_type: u16 },
}

/// Decode the subtable at `base`, following an extension wrapper first
pub fn parse_subtable(
    data: &[u8],
    base: usize,
    lookup_type: u16,
    kind: LayoutKind,
) -> Result<LookupSubtable> {
    let tag = kind.tag();
    let (lookup_type, base) = if lookup_type == kind.extension_type() {
        let mut r = FontReader::at(data, base);
        let format = r.read_u16()?;
        let wrapped = r.read_u16()?;
        let offset = r.read_u32()? as usize;
        if format != 1 || wrapped == kind.extension_type() {
            return Err(FontError::invalid(
                tag,
                format!("extension format {format} wrapping type {wrapped}"),
            ));
        }
        (wrapped, base + offset)
    } else {
        (lookup_type, base)
    };

    let subtable = match (kind, lookup_type) {
        (LayoutKind::Gpos, 1) => LookupSubtable::SinglePos(SinglePos::parse(data, base, tag)?),
        (LayoutKind::Gpos, 2) => LookupSubtable::PairPos(PairPos::parse(data, base, tag)?),
        (LayoutKind::Gsub, 1) => LookupSubtable::SingleSubst(SingleSubst::parse(data, base, tag)?),
        (LayoutKind::Gsub, 2) => LookupSubtable::MultipleSubst(GlyphSequences::parse(data, base, tag)?),
        (LayoutKind::Gsub, 3) => LookupSubtable::AlternateSubst(GlyphSequences::parse(data, base, tag)?),
        (LayoutKind::Gsub, 4) => LookupSubtable::LigatureSubst(LigatureSubst::parse(data, base, tag)?),
        _ => LookupSubtable::Unsupported { lookup_type },
    };
    Ok(subtable)
}
