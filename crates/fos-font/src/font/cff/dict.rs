//! CFF DICT data: operand/operator pairs

use crate::font::reader::FontReader;
use crate::{FontError, Result};

// Top DICT
pub const CHARSET: u16 = 15;
pub const CHAR_STRINGS: u16 = 17;
pub const PRIVATE: u16 = 18;
pub const VSTORE: u16 = 24;
pub const ROS: u16 = 1230;
pub const FD_ARRAY: u16 = 1236;
pub const FD_SELECT: u16 = 1237;

// Private DICT
pub const SUBRS: u16 = 19;
pub const VSINDEX: u16 = 22;
pub const BLEND: u16 = 23;

/// Decoded DICT
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dict {
    entries: Vec<(u16, Vec<f64>)>,
}

impl Dict {
    /// Parse DICT bytes
    ///
    /// `region_counts` resolves CFF2 `blend` operands to their default
    /// values; pass an empty slice for CFF.
    pub fn parse(data: &[u8], region_counts: &[usize]) -> Result<Self> {
        let mut r = FontReader::new(data);
        let mut entries = Vec::new();
        let mut operands: Vec<f64> = Vec::new();
        let mut vsindex = 0usize;

        while r.remaining() > 0 {
            let b0 = r.read_u8()?;
            match b0 {
                0..=21 | 24 => {
                    let op = if b0 == 12 {
                        1200 + r.read_u8()? as u16
                    } else {
                        b0 as u16
                    };
                    entries.push((op, std::mem::take(&mut operands)));
                }
                VSINDEX_BYTE => {
                    vsindex = operands.pop().unwrap_or(0.0) as usize;
                    entries.push((VSINDEX, vec![vsindex as f64]));
                    operands.clear();
                }
                BLEND_BYTE => {
                    let regions = region_counts.get(vsindex).copied().unwrap_or(0);
                    apply_blend(&mut operands, regions)?;
                }
                28 => operands.push(r.read_i16()? as f64),
                29 => operands.push(r.read_i32()? as f64),
                30 => operands.push(read_real(&mut r)?),
                32..=254 => operands.push(read_short_int(b0, &mut r)? as f64),
                other => {
                    return Err(FontError::invalid("CFF", format!("reserved DICT byte {other}")));
                }
            }
        }
        Ok(Self { entries })
    }

    /// Operands of the last occurrence of `op`
    pub fn get(&self, op: u16) -> Option<&[f64]> {
        self.entries
            .iter()
            .rev()
            .find(|(o, _)| *o == op)
            .map(|(_, v)| v.as_slice())
    }

    /// First operand of `op` as an offset or count
    pub fn get_usize(&self, op: u16) -> Option<usize> {
        self.get(op)?.first().map(|&v| v.max(0.0) as usize)
    }

    /// Two-operand entry (e.g. Private: size, offset)
    pub fn get_pair(&self, op: u16) -> Option<(usize, usize)> {
        match self.get(op)? {
            [a, b, ..] => Some((a.max(0.0) as usize, b.max(0.0) as usize)),
            _ => None,
        }
    }

    pub fn contains(&self, op: u16) -> bool {
        self.get(op).is_some()
    }
}

const VSINDEX_BYTE: u8 = 22;
const BLEND_BYTE: u8 = 23;

/// Collapse `n` blended values plus their deltas to the default values
pub(crate) fn apply_blend(stack: &mut Vec<f64>, regions: usize) -> Result<()> {
    let n = stack.pop().unwrap_or(0.0).max(0.0) as usize;
    let deltas = n * regions;
    if stack.len() < n + deltas {
        return Err(FontError::invalid(
            "CFF2",
            format!("blend needs {} operands, {} available", n + deltas, stack.len()),
        ));
    }
    let len = stack.len() - deltas;
    stack.truncate(len);
    Ok(())
}

/// Integer encodings shared by DICT and charstring data (bytes 32..=254)
pub(crate) fn read_short_int(b0: u8, r: &mut FontReader) -> Result<i32> {
    Ok(match b0 {
        32..=246 => b0 as i32 - 139,
        247..=250 => (b0 as i32 - 247) * 256 + r.read_u8()? as i32 + 108,
        _ => -(b0 as i32 - 251) * 256 - r.read_u8()? as i32 - 108,
    })
}

fn read_real(r: &mut FontReader) -> Result<f64> {
    let mut text = String::new();
    'outer: loop {
        let byte = r.read_u8()?;
        for nibble in [byte >> 4, byte & 0x0F] {
            match nibble {
                0..=9 => text.push((b'0' + nibble) as char),
                0xA => text.push('.'),
                0xB => text.push('E'),
                0xC => text.push_str("E-"),
                0xE => text.push('-'),
                0xF => break 'outer,
                _ => return Err(FontError::invalid("CFF", "reserved nibble in real number")),
            }
        }
    }
    text.parse::<f64>()
        .map_err(|_| FontError::invalid("CFF", format!("malformed real '{text}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_operands() {
        // 0 (139), 108 (247 0), -108 (251 0), 1000 (28 0x03 0xE8), CharStrings
        let data = [139, 247, 0, 251, 0, 28, 0x03, 0xE8, 17];
        let dict = Dict::parse(&data, &[]).unwrap();
        assert_eq!(dict.get(CHAR_STRINGS), Some(&[0.0, 108.0, -108.0, 1000.0][..]));
    }

    #[test]
    fn test_escaped_operator_and_pair() {
        // Private: 20 100, then FDArray (12 36): 400
        let data = [159, 239, 18, 29, 0, 0, 1, 0x90, 12, 36];
        let dict = Dict::parse(&data, &[]).unwrap();
        assert_eq!(dict.get_pair(PRIVATE), Some((20, 100)));
        assert_eq!(dict.get_usize(FD_ARRAY), Some(400));
        assert!(!dict.contains(FD_SELECT));
    }

    #[test]
    fn test_real_operand() {
        // -2.25 -> nibbles e 2 a 2 5 f
        let data = [30, 0xE2, 0xA2, 0x5F, 15];
        let dict = Dict::parse(&data, &[]).unwrap();
        assert_eq!(dict.get(CHARSET), Some(&[-2.25][..]));
    }

    #[test]
    fn test_blend_keeps_defaults() {
        // 10 20 <4 deltas for 2 regions> 2 blend -> 10 20
        let mut stack = vec![10.0, 20.0, 1.0, 2.0, 3.0, 4.0, 2.0];
        apply_blend(&mut stack, 2).unwrap();
        assert_eq!(stack, vec![10.0, 20.0]);

        let mut short = vec![1.0, 3.0];
        assert!(apply_blend(&mut short, 1).is_err());
    }
}
