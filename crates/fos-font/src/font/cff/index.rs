//! CFF INDEX structure

use crate::font::reader::FontReader;
use crate::{FontError, Result};

/// Array of variable-length objects
///
/// CFF uses a u16 count, CFF2 a u32 count. Offsets are 1-based relative to
/// the byte preceding the object data.
#[derive(Debug, Clone, Default)]
pub struct CffIndex<'a> {
    items: Vec<&'a [u8]>,
}

impl<'a> CffIndex<'a> {
    /// Parse an INDEX at the reader's cursor, leaving the cursor after it
    pub fn parse(r: &mut FontReader<'a>, wide_count: bool) -> Result<Self> {
        let count = if wide_count {
            r.read_u32()? as usize
        } else {
            r.read_u16()? as usize
        };
        if count == 0 {
            return Ok(Self::default());
        }

        let off_size = r.read_u8()?;
        if !(1..=4).contains(&off_size) {
            return Err(FontError::invalid("CFF", format!("INDEX offSize {off_size}")));
        }

        let mut offsets = Vec::with_capacity(count + 1);
        for _ in 0..=count {
            let offset = match off_size {
                1 => r.read_u8()? as usize,
                2 => r.read_u16()? as usize,
                3 => r.read_u24()? as usize,
                _ => r.read_u32()? as usize,
            };
            offsets.push(offset);
        }

        // Offset 1 addresses the first data byte
        let base = r.pos() - 1;
        let mut items = Vec::with_capacity(count);
        for pair in offsets.windows(2) {
            if pair[0] == 0 || pair[1] < pair[0] {
                return Err(FontError::invalid(
                    "CFF",
                    format!("INDEX offsets {} -> {} out of order", pair[0], pair[1]),
                ));
            }
            items.push(r.slice(base + pair[0], pair[1] - pair[0])?);
        }

        let end = base + offsets[count];
        if end > r.len() {
            return Err(FontError::TruncatedStream {
                offset: r.pos(),
                needed: end - r.pos(),
                available: r.remaining(),
            });
        }
        r.set_pos(end);
        Ok(Self { items })
    }

    /// Parse an INDEX starting at absolute `offset`
    pub fn parse_at(data: &'a [u8], offset: usize, wide_count: bool) -> Result<Self> {
        Self::parse(&mut FontReader::at(data, offset), wide_count)
    }

    pub fn get(&self, index: usize) -> Option<&'a [u8]> {
        self.items.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Bias added to subroutine numbers before indexing
pub fn subr_bias(count: usize) -> i32 {
    if count < 1240 {
        107
    } else if count < 33900 {
        1131
    } else {
        32768
    }
}
