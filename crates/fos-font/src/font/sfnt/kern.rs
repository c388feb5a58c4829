//! Legacy kerning (kern) table, version 0

use std::collections::HashMap;

use crate::diagnostics::ParseOutcome;
use crate::font::reader::FontReader;
use crate::Result;

/// Pack a glyph pair into the kerning map key
pub fn pair_key(left: u16, right: u16) -> u32 {
    ((left as u32) << 16) | right as u32
}

/// Horizontal kerning pairs from format 0 subtables
///
/// Subtables in any other format are skipped with a warning.
pub fn parse_kern(data: &[u8]) -> Result<ParseOutcome<HashMap<u32, i16>>> {
    let mut r = FontReader::new(data);
    let _version = r.read_u16()?;
    let n_tables = r.read_u16()?;

    let mut outcome = ParseOutcome::clean(HashMap::new());
    for _ in 0..n_tables {
        let start = r.pos();
        let _sub_version = r.read_u16()?;
        let length = r.read_u16()? as usize;
        let coverage = r.read_u16()?;
        let format = coverage >> 8;

        if format == 0 {
            let n_pairs = r.read_u16()?;
            r.skip(6)?; // searchRange, entrySelector, rangeShift
            for _ in 0..n_pairs {
                let left = r.read_u16()?;
                let right = r.read_u16()?;
                let value = r.read_i16()?;
                outcome.value.insert(pair_key(left, right), value);
            }
        } else {
            outcome.warn(format!("kern: skipping subtable format {format}"));
        }

        if length < 6 {
            break;
        }
        r.set_pos(start + length);
    }
    Ok(outcome)
}
