//! Fixed-layout OpenType tables: head, maxp, hhea, hmtx, vhea, vmtx, OS/2

use crate::font::reader::FontReader;
use crate::{FontError, Result};

/// Seconds between 1904-01-01 (LONGDATETIME epoch) and 1970-01-01
pub const MAC_EPOCH_OFFSET: i64 = 2_082_844_800;

/// Head table (font header)
#[derive(Debug, Clone, Default)]
pub struct HeadTable {
    pub version: f64,
    pub font_revision: f64,
    pub checksum_adjustment: u32,
    pub magic_number: u32,
    pub flags: u16,
    pub units_per_em: u16,
    /// Seconds since 1904-01-01
    pub created: i64,
    /// Seconds since 1904-01-01
    pub modified: i64,
    pub x_min: i16,
    pub y_min: i16,
    pub x_max: i16,
    pub y_max: i16,
    pub mac_style: u16,
    pub lowest_rec_ppem: u16,
    pub font_direction_hint: i16,
    pub index_to_loc_format: i16,
    pub glyph_data_format: i16,
}

impl HeadTable {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = FontReader::new(data);
        let head = Self {
            version: r.read_fixed()?,
            font_revision: r.read_fixed()?,
            checksum_adjustment: r.read_u32()?,
            magic_number: r.read_u32()?,
            flags: r.read_u16()?,
            units_per_em: r.read_u16()?,
            created: r.read_long_datetime()?,
            modified: r.read_long_datetime()?,
            x_min: r.read_i16()?,
            y_min: r.read_i16()?,
            x_max: r.read_i16()?,
            y_max: r.read_i16()?,
            mac_style: r.read_u16()?,
            lowest_rec_ppem: r.read_u16()?,
            font_direction_hint: r.read_i16()?,
            index_to_loc_format: r.read_i16()?,
            glyph_data_format: r.read_i16()?,
        };

        if head.units_per_em == 0 {
            return Err(FontError::invalid("head", "unitsPerEm is zero"));
        }
        Ok(head)
    }

    /// Creation time as Unix seconds
    pub fn created_unix(&self) -> i64 {
        self.created - MAC_EPOCH_OFFSET
    }

    /// Modification time as Unix seconds
    pub fn modified_unix(&self) -> i64 {
        self.modified - MAC_EPOCH_OFFSET
    }
}

/// Maxp table (maximum profile)
#[derive(Debug, Clone, Default)]
pub struct MaxpTable {
    pub version: f64,
    pub num_glyphs: u16,
}

impl MaxpTable {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = FontReader::new(data);
        let version = r.read_fixed()?;
        let num_glyphs = r.read_u16()?;
        Ok(Self { version, num_glyphs })
    }
}

/// Hhea / vhea table (horizontal or vertical header)
#[derive(Debug, Clone, Default)]
pub struct HheaTable {
    pub version: f64,
    pub ascender: i16,
    pub descender: i16,
    pub line_gap: i16,
    pub advance_max: u16,
    pub min_leading_side_bearing: i16,
    pub min_trailing_side_bearing: i16,
    pub max_extent: i16,
    pub caret_slope_rise: i16,
    pub caret_slope_run: i16,
    pub caret_offset: i16,
    pub metric_data_format: i16,
    pub number_of_metrics: u16,
}

impl HheaTable {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = FontReader::new(data);
        let version = r.read_fixed()?;
        let ascender = r.read_i16()?;
        let descender = r.read_i16()?;
        let line_gap = r.read_i16()?;
        let advance_max = r.read_u16()?;
        let min_leading_side_bearing = r.read_i16()?;
        let min_trailing_side_bearing = r.read_i16()?;
        let max_extent = r.read_i16()?;
        let caret_slope_rise = r.read_i16()?;
        let caret_slope_run = r.read_i16()?;
        let caret_offset = r.read_i16()?;
        r.skip(8)?; // reserved
        let metric_data_format = r.read_i16()?;
        let number_of_metrics = r.read_u16()?;

        Ok(Self {
            version,
            ascender,
            descender,
            line_gap,
            advance_max,
            min_leading_side_bearing,
            min_trailing_side_bearing,
            max_extent,
            caret_slope_rise,
            caret_slope_run,
            caret_offset,
            metric_data_format,
            number_of_metrics,
        })
    }

    /// Baseline-to-baseline distance
    pub fn line_space(&self) -> i32 {
        self.ascender as i32 - self.descender as i32 + self.line_gap as i32
    }
}

/// One glyph's advance and side bearing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metric {
    pub advance: u16,
    pub side_bearing: i16,
}

/// Parse hmtx/vmtx: `number_of_metrics` full records, then bare side bearings
///
/// Glyphs past the full records reuse the last advance. A table shorter than
/// required is a structural error.
pub fn parse_metrics(data: &[u8], number_of_metrics: u16, num_glyphs: u16) -> Result<Vec<Metric>> {
    let full = number_of_metrics.min(num_glyphs) as usize;
    if full == 0 && num_glyphs > 0 {
        return Err(FontError::invalid("hmtx", "numberOfHMetrics is zero"));
    }

    let mut r = FontReader::new(data);
    let mut metrics = Vec::with_capacity(num_glyphs as usize);
    for _ in 0..full {
        metrics.push(Metric {
            advance: r.read_u16()?,
            side_bearing: r.read_i16()?,
        });
    }

    let last_advance = metrics.last().map(|m| m.advance).unwrap_or(0);
    for _ in full..num_glyphs as usize {
        metrics.push(Metric {
            advance: last_advance,
            side_bearing: r.read_i16()?,
        });
    }
    Ok(metrics)
}

/// OS/2 table (font metadata)
#[derive(Debug, Clone, Default)]
pub struct Os2Table {
    pub version: u16,
    pub x_avg_char_width: i16,
    pub weight_class: u16,
    pub width_class: u16,
    pub fs_type: u16,
    pub vendor_id: [u8; 4],
    pub fs_selection: u16,
    pub first_char_index: u16,
    pub last_char_index: u16,
    pub typo_ascender: i16,
    pub typo_descender: i16,
    pub typo_line_gap: i16,
    pub win_ascent: u16,
    pub win_descent: u16,
}

impl Os2Table {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = FontReader::new(data);
        let version = r.read_u16()?;
        let x_avg_char_width = r.read_i16()?;
        let weight_class = r.read_u16()?;
        let width_class = r.read_u16()?;
        let fs_type = r.read_u16()?;
        r.set_pos(58); // sub/superscript, strikeout, family class, panose, unicode ranges
        let vendor_id = r.read_tag()?;
        let fs_selection = r.read_u16()?;
        let first_char_index = r.read_u16()?;
        let last_char_index = r.read_u16()?;
        let typo_ascender = r.read_i16()?;
        let typo_descender = r.read_i16()?;
        let typo_line_gap = r.read_i16()?;
        let win_ascent = r.read_u16()?;
        let win_descent = r.read_u16()?;

        Ok(Self {
            version,
            x_avg_char_width,
            weight_class,
            width_class,
            fs_type,
            vendor_id,
            fs_selection,
            first_char_index,
            last_char_index,
            typo_ascender,
            typo_descender,
            typo_line_gap,
            win_ascent,
            win_descent,
        })
    }
}
