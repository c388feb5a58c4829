//! sfnt container reconstruction for WOFF and WOFF2
//!
//! Decoded tables are written back into a plain OpenType buffer so every
//! container goes through the same sfnt pipeline.

/// `checksumAdjustment` target for the whole font
const CHECKSUM_MAGIC: u32 = 0xB1B0_AFBA;

/// Byte offset of `checksumAdjustment` inside `head`
const HEAD_CHECKSUM_OFFSET: usize = 8;

/// One decoded table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SfntTable {
    pub tag: [u8; 4],
    pub data: Vec<u8>,
}

impl SfntTable {
    pub fn new(tag: [u8; 4], data: Vec<u8>) -> Self {
        Self { tag, data }
    }
}

/// Write an sfnt buffer with a fresh table directory
///
/// Records are sorted by tag, table data is 4-byte aligned, and checksums
/// plus `head.checksumAdjustment` are recomputed.
pub fn build_sfnt(flavor: u32, tables: &[SfntTable]) -> Vec<u8> {
    let mut order: Vec<&SfntTable> = tables.iter().collect();
    order.sort_by_key(|table| table.tag);

    let num_tables = order.len() as u16;
    let header_size = 12 + order.len() * 16;
    let total_size = order
        .iter()
        .fold(header_size, |size, table| size + padded_len(table.data.len()));

    let mut output = Vec::with_capacity(total_size);
    output.extend_from_slice(&flavor.to_be_bytes());
    output.extend_from_slice(&num_tables.to_be_bytes());

    let entry_selector = num_tables.max(1).ilog2() as u16;
    let search_range = (1u16 << entry_selector) * 16;
    let range_shift = num_tables.saturating_mul(16).saturating_sub(search_range);
    output.extend_from_slice(&search_range.to_be_bytes());
    output.extend_from_slice(&entry_selector.to_be_bytes());
    output.extend_from_slice(&range_shift.to_be_bytes());

    let mut table_offset = header_size;
    let mut head_offset = None;
    for table in &order {
        if &table.tag == b"head" {
            head_offset = Some(table_offset);
        }
        output.extend_from_slice(&table.tag);
        output.extend_from_slice(&calculate_checksum(&table.data).to_be_bytes());
        output.extend_from_slice(&(table_offset as u32).to_be_bytes());
        output.extend_from_slice(&(table.data.len() as u32).to_be_bytes());
        table_offset += padded_len(table.data.len());
    }

    for table in &order {
        output.extend_from_slice(&table.data);
        output.resize(padded_len(output.len()), 0);
    }

    if let Some(offset) = head_offset {
        update_head_checksum(&mut output, offset);
    }
    output
}

fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

/// Sum of big-endian u32 words, zero padded
pub fn calculate_checksum(data: &[u8]) -> u32 {
    data.chunks(4).fold(0u32, |sum, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(u32::from_be_bytes(word))
    })
}

fn update_head_checksum(sfnt: &mut [u8], head_offset: usize) {
    let field = head_offset + HEAD_CHECKSUM_OFFSET..head_offset + HEAD_CHECKSUM_OFFSET + 4;
    if field.end > sfnt.len() {
        tracing::warn!("head table too short for checksumAdjustment");
        return;
    }
    sfnt[field.clone()].fill(0);
    let adjustment = CHECKSUM_MAGIC.wrapping_sub(calculate_checksum(sfnt));
    sfnt[field].copy_from_slice(&adjustment.to_be_bytes());
}
