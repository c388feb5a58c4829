//! Character to glyph mapping (cmap) table
//!
//! Every encoding record is decoded and merged into a single map. Unicode
//! encodings (platform 0, and Windows BMP / full repertoire) are visited first
//! so that a Macintosh single-byte subtable never shadows a real Unicode
//! mapping.

use std::collections::{BTreeMap, BTreeSet};

use crate::font::reader::FontReader;
use crate::{FontError, Result};

const MAX_CODEPOINT: u32 = 0x10FFFF;

/// Encoding record from the cmap header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingRecord {
    pub platform_id: u16,
    pub encoding_id: u16,
    pub offset: u32,
}

impl EncodingRecord {
    fn rank(&self) -> u8 {
        match (self.platform_id, self.encoding_id) {
            (3, 10) => 0,
            (0, 4) | (0, 6) => 1,
            (3, 1) => 2,
            (0, _) => 3,
            (3, _) => 4,
            _ => 5,
        }
    }
}

/// Unicode variation sequence from a format 14 subtable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariationSequence {
    pub base: u32,
    pub selector: u32,
    /// `None` when the sequence uses the base character's default glyph
    pub glyph: Option<u32>,
}

/// Merged character map
#[derive(Debug, Clone, Default)]
pub struct CmapTable {
    pub encodings: Vec<EncodingRecord>,
    pub unicode_to_glyph: BTreeMap<u32, u32>,
    pub variation_sequences: Vec<VariationSequence>,
}

impl CmapTable {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = FontReader::new(data);
        let _version = r.read_u16()?;
        let num_tables = r.read_u16()?;

        let mut encodings = Vec::with_capacity(num_tables as usize);
        for _ in 0..num_tables {
            encodings.push(EncodingRecord {
                platform_id: r.read_u16()?,
                encoding_id: r.read_u16()?,
                offset: r.read_u32()?,
            });
        }

        let mut ordered = encodings.clone();
        ordered.sort_by_key(EncodingRecord::rank);

        let mut table = CmapTable {
            encodings,
            ..Default::default()
        };
        let mut visited = BTreeSet::new();
        for record in ordered {
            // Several records commonly share one subtable
            if !visited.insert(record.offset) {
                continue;
            }
            table.parse_subtable(data, record.offset as usize)?;
        }

        tracing::debug!(
            "cmap: {} records, {} mapped codepoints",
            table.encodings.len(),
            table.unicode_to_glyph.len()
        );
        Ok(table)
    }

    fn parse_subtable(&mut self, data: &[u8], offset: usize) -> Result<()> {
        let mut r = FontReader::at(data, offset);
        let format = r.read_u16()?;
        match format {
            0 => self.parse_format0(&mut r),
            2 => self.parse_format2(&mut r, offset),
            4 => self.parse_format4(&mut r),
            6 => self.parse_format6(&mut r),
            8 => self.parse_format8(&mut r),
            10 => self.parse_format10(&mut r),
            12 => self.parse_groups(&mut r, false),
            13 => self.parse_groups(&mut r, true),
            14 => self.parse_format14(&mut r, offset),
            other => Err(FontError::UnsupportedCmapFormat(other)),
        }
    }

    fn map(&mut self, codepoint: u32, glyph: u32) {
        if glyph != 0 && codepoint <= MAX_CODEPOINT {
            self.unicode_to_glyph.entry(codepoint).or_insert(glyph);
        }
    }

    fn parse_format0(&mut self, r: &mut FontReader) -> Result<()> {
        r.skip(4)?; // length, language
        let glyphs = r.read_bytes(256)?;
        for (code, &glyph) in glyphs.iter().enumerate() {
            self.map(code as u32, glyph as u32);
        }
        Ok(())
    }

    /// High-byte mapping through sub-headers (CJK double-byte encodings)
    fn parse_format2(&mut self, r: &mut FontReader, offset: usize) -> Result<()> {
        r.skip(4)?; // length, language
        let mut keys = [0u16; 256];
        for key in keys.iter_mut() {
            *key = r.read_u16()? / 8;
        }
        let sub_headers = offset + 6 + 512;

        for (high, &key) in keys.iter().enumerate() {
            let header_pos = sub_headers + key as usize * 8;
            let mut h = FontReader::at(r.data(), header_pos);
            let first_code = h.read_u16()? as u32;
            let entry_count = h.read_u16()? as u32;
            let id_delta = h.read_i16()?;
            let range_pos = h.pos();
            let id_range_offset = h.read_u16()? as usize;

            let lookup = |j: u32| -> Result<u32> {
                let pos = range_pos + id_range_offset + j as usize * 2;
                let glyph = FontReader::at(r.data(), pos).read_u16()?;
                Ok(if glyph == 0 {
                    0
                } else {
                    glyph.wrapping_add(id_delta as u16) as u32
                })
            };

            if key == 0 {
                // Single-byte character, looked up through sub-header 0
                let code = high as u32;
                if code >= first_code && code < first_code + entry_count {
                    let glyph = lookup(code - first_code)?;
                    self.map(code, glyph);
                }
            } else {
                for j in 0..entry_count {
                    let code = ((high as u32) << 8) | (first_code + j);
                    let glyph = lookup(j)?;
                    self.map(code, glyph);
                }
            }
        }
        Ok(())
    }

    /// Segment mapping to delta values (BMP)
    fn parse_format4(&mut self, r: &mut FontReader) -> Result<()> {
        r.skip(4)?; // length, language
        let seg_count = (r.read_u16()? / 2) as usize;
        r.skip(6)?; // searchRange, entrySelector, rangeShift

        let end_pos = r.pos();
        let start_pos = end_pos + seg_count * 2 + 2;
        let delta_pos = start_pos + seg_count * 2;
        let range_pos = delta_pos + seg_count * 2;
        let data = r.data();

        for seg in 0..seg_count {
            let end = FontReader::at(data, end_pos + seg * 2).read_u16()? as u32;
            let start = FontReader::at(data, start_pos + seg * 2).read_u16()? as u32;
            let delta = FontReader::at(data, delta_pos + seg * 2).read_u16()?;
            let range_field = range_pos + seg * 2;
            let range_offset = FontReader::at(data, range_field).read_u16()? as usize;
            if start > end {
                continue;
            }

            for code in start..=end {
                if code == 0xFFFF {
                    break;
                }
                let glyph = if range_offset == 0 {
                    (code as u16).wrapping_add(delta)
                } else {
                    let pos = range_field + range_offset + (code - start) as usize * 2;
                    match FontReader::at(data, pos).read_u16()? {
                        0 => 0,
                        g => g.wrapping_add(delta),
                    }
                };
                self.map(code, glyph as u32);
            }
        }
        Ok(())
    }

    /// Trimmed table mapping
    fn parse_format6(&mut self, r: &mut FontReader) -> Result<()> {
        r.skip(4)?; // length, language
        let first_code = r.read_u16()? as u32;
        let entry_count = r.read_u16()? as u32;
        for i in 0..entry_count {
            let glyph = r.read_u16()? as u32;
            self.map(first_code + i, glyph);
        }
        Ok(())
    }

    /// Mixed 16/32-bit coverage
    fn parse_format8(&mut self, r: &mut FontReader) -> Result<()> {
        r.skip(2 + 8)?; // reserved, length, language
        r.skip(8192)?; // is32 bitmap; group codes are already full 32-bit values
        self.read_groups(r, false)
    }

    /// Trimmed array (32-bit)
    fn parse_format10(&mut self, r: &mut FontReader) -> Result<()> {
        r.skip(2 + 8)?; // reserved, length, language
        let start = r.read_u32()?;
        let num_chars = r.read_u32()?;
        for i in 0..num_chars {
            let glyph = r.read_u16()? as u32;
            self.map(start.saturating_add(i), glyph);
        }
        Ok(())
    }

    /// Segmented coverage (format 12) and many-to-one range mappings (format 13)
    fn parse_groups(&mut self, r: &mut FontReader, constant: bool) -> Result<()> {
        r.skip(2 + 8)?; // reserved, length, language
        self.read_groups(r, constant)
    }

    fn read_groups(&mut self, r: &mut FontReader, constant: bool) -> Result<()> {
        let num_groups = r.read_u32()?;
        for _ in 0..num_groups {
            let start = r.read_u32()?;
            let end = r.read_u32()?.min(MAX_CODEPOINT);
            let start_glyph = r.read_u32()?;
            if start > end {
                continue;
            }
            for code in start..=end {
                let glyph = if constant {
                    start_glyph
                } else {
                    start_glyph.wrapping_add(code - start)
                };
                self.map(code, glyph);
            }
        }
        Ok(())
    }

    /// Unicode variation sequences
    fn parse_format14(&mut self, r: &mut FontReader, offset: usize) -> Result<()> {
        r.skip(4)?; // length
        let num_records = r.read_u32()?;
        let data = r.data();

        for _ in 0..num_records {
            let selector = r.read_u24()?;
            let default_offset = r.read_u32()? as usize;
            let non_default_offset = r.read_u32()? as usize;

            if default_offset != 0 {
                let mut d = FontReader::at(data, offset + default_offset);
                let ranges = d.read_u32()?;
                for _ in 0..ranges {
                    let start = d.read_u24()?;
                    let additional = d.read_u8()? as u32;
                    for base in start..=start + additional {
                        self.variation_sequences.push(VariationSequence {
                            base,
                            selector,
                            glyph: None,
                        });
                    }
                }
            }

            if non_default_offset != 0 {
                let mut d = FontReader::at(data, offset + non_default_offset);
                let mappings = d.read_u32()?;
                for _ in 0..mappings {
                    let base = d.read_u24()?;
                    let glyph = d.read_u16()? as u32;
                    self.variation_sequences.push(VariationSequence {
                        base,
                        selector,
                        glyph: Some(glyph),
                    });
                    // The base character gains this glyph only if nothing else maps it
                    self.map(base, glyph);
                }
            }
        }
        Ok(())
    }

    /// Glyph for a codepoint
    pub fn glyph_for(&self, codepoint: u32) -> Option<u32> {
        self.unicode_to_glyph.get(&codepoint).copied()
    }

    /// Ordered, duplicate-free codepoints per glyph
    pub fn glyph_to_unicodes(&self) -> BTreeMap<u32, Vec<u32>> {
        let mut out: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
        for (&code, &glyph) in &self.unicode_to_glyph {
            out.entry(glyph).or_default().push(code);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn be16(values: &[u16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_be_bytes()).collect()
    }

    fn wrap(platform: u16, encoding: u16, subtable: Vec<u8>) -> Vec<u8> {
        let mut data = be16(&[0, 1, platform, encoding]);
        data.extend_from_slice(&12u32.to_be_bytes());
        data.extend(subtable);
        data
    }

    fn format4(segments: &[(u16, u16, i16)]) -> Vec<u8> {
        let seg_count = segments.len() as u16 + 1;
        let mut ends: Vec<u16> = segments.iter().map(|s| s.1).collect();
        ends.push(0xFFFF);
        let mut starts: Vec<u16> = segments.iter().map(|s| s.0).collect();
        starts.push(0xFFFF);
        let mut deltas: Vec<u16> = segments.iter().map(|s| s.2 as u16).collect();
        deltas.push(1);

        let mut data = be16(&[4, 0, 0, seg_count * 2, 0, 0, 0]);
        data.extend(be16(&ends));
        data.extend(be16(&[0]));
        data.extend(be16(&starts));
        data.extend(be16(&deltas));
        data.extend(be16(&vec![0; seg_count as usize]));
        data
    }

    #[test]
    fn test_format4_delta_mapping() {
        // 'A'..='C' -> 1..=3
        let cmap = CmapTable::parse(&wrap(3, 1, format4(&[(0x41, 0x43, -0x40)]))).unwrap();
        assert_eq!(cmap.glyph_for(0x41), Some(1));
        assert_eq!(cmap.glyph_for(0x43), Some(3));
        assert_eq!(cmap.glyph_for(0x44), None);
        assert_eq!(cmap.glyph_to_unicodes()[&2], vec![0x42]);
    }

    #[test]
    fn test_format4_range_offset() {
        // One segment 0x30..=0x31 using glyphIdArray, plus terminator
        let mut data = be16(&[4, 0, 0, 4, 0, 0, 0]);
        data.extend(be16(&[0x31, 0xFFFF, 0, 0x30, 0xFFFF, 0, 1]));
        // idRangeOffset[0] = 4 points past both range offsets into the array
        data.extend(be16(&[4, 0]));
        data.extend(be16(&[7, 9]));

        let cmap = CmapTable::parse(&wrap(3, 1, data)).unwrap();
        assert_eq!(cmap.glyph_for(0x30), Some(7));
        assert_eq!(cmap.glyph_for(0x31), Some(9));
    }

    #[test]
    fn test_format0() {
        let mut data = be16(&[0, 262, 0]);
        let mut glyphs = [0u8; 256];
        glyphs[b'a' as usize] = 5;
        data.extend_from_slice(&glyphs);

        let cmap = CmapTable::parse(&wrap(1, 0, data)).unwrap();
        assert_eq!(cmap.glyph_for(b'a' as u32), Some(5));
        assert_eq!(cmap.unicode_to_glyph.len(), 1);
    }

    #[test]
    fn test_format6() {
        let data = be16(&[6, 0, 0, 0x20, 3, 4, 0, 6]);
        let cmap = CmapTable::parse(&wrap(0, 3, data)).unwrap();
        assert_eq!(cmap.glyph_for(0x20), Some(4));
        assert_eq!(cmap.glyph_for(0x21), None);
        assert_eq!(cmap.glyph_for(0x22), Some(6));
    }

    #[test]
    fn test_format12_and_13() {
        let mut f12 = be16(&[12, 0]);
        for v in [0u32, 0, 1, 0x1F600, 0x1F602, 10] {
            f12.extend_from_slice(&v.to_be_bytes());
        }
        let cmap = CmapTable::parse(&wrap(3, 10, f12)).unwrap();
        assert_eq!(cmap.glyph_for(0x1F601), Some(11));

        let mut f13 = be16(&[13, 0]);
        for v in [0u32, 0, 1, 0x100, 0x1FF, 3] {
            f13.extend_from_slice(&v.to_be_bytes());
        }
        let cmap = CmapTable::parse(&wrap(3, 10, f13)).unwrap();
        assert_eq!(cmap.glyph_for(0x100), Some(3));
        assert_eq!(cmap.glyph_for(0x1FF), Some(3));
        assert_eq!(cmap.glyph_to_unicodes()[&3].len(), 0x100);
    }

    #[test]
    fn test_unicode_record_wins_over_mac() {
        // Mac format 0 maps 'A' -> 9, Windows format 4 maps 'A' -> 1
        let mut mac = be16(&[0, 262, 0]);
        let mut glyphs = [0u8; 256];
        glyphs[0x41] = 9;
        mac.extend_from_slice(&glyphs);
        let win = format4(&[(0x41, 0x41, -0x40)]);

        let mut data = be16(&[0, 2, 1, 0]);
        data.extend_from_slice(&20u32.to_be_bytes());
        data.extend(be16(&[3, 1]));
        data.extend_from_slice(&(20 + mac.len() as u32).to_be_bytes());
        data.extend(mac);
        data.extend(win);

        let cmap = CmapTable::parse(&data).unwrap();
        assert_eq!(cmap.glyph_for(0x41), Some(1));
    }

    #[test]
    fn test_unsupported_format() {
        let err = CmapTable::parse(&wrap(3, 1, be16(&[7, 0, 0]))).unwrap_err();
        assert!(matches!(err, FontError::UnsupportedCmapFormat(7)));
    }
}
