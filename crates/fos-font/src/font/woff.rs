//! WOFF (Web Open Font Format 1.0) decoder
//!
//! Each table is stored either raw or as its own zlib stream. Tables are
//! inflated with flate2 and written back into a plain sfnt buffer, which then
//! goes through the regular sfnt pipeline.

use std::io::Read;

use flate2::read::ZlibDecoder;

use crate::detect::WOFF_SIGNATURE;
use crate::diagnostics::ParseOutcome;
use crate::font::reader::FontReader;
use crate::font::sfnt::tag_name;
use crate::font::sfnt::writer::{build_sfnt, calculate_checksum, SfntTable};
use crate::{FontError, Result};

/// WOFF1 header (44 bytes)
#[derive(Debug)]
struct WoffHeader {
    flavor: u32,
    length: u32,
    num_tables: u16,
    total_sfnt_size: u32,
    major_version: u16,
    minor_version: u16,
    meta_length: u32,
    priv_length: u32,
}

impl WoffHeader {
    fn parse(r: &mut FontReader) -> Result<Self> {
        if r.read_u32()? != WOFF_SIGNATURE {
            return Err(FontError::UnsupportedFontFormat);
        }
        let flavor = r.read_u32()?;
        let length = r.read_u32()?;
        let num_tables = r.read_u16()?;
        let _reserved = r.read_u16()?;
        let total_sfnt_size = r.read_u32()?;
        let major_version = r.read_u16()?;
        let minor_version = r.read_u16()?;
        let _meta_offset = r.read_u32()?;
        let meta_length = r.read_u32()?;
        let _meta_orig_length = r.read_u32()?;
        let _priv_offset = r.read_u32()?;
        let priv_length = r.read_u32()?;
        Ok(Self {
            flavor,
            length,
            num_tables,
            total_sfnt_size,
            major_version,
            minor_version,
            meta_length,
            priv_length,
        })
    }
}

/// WOFF table directory entry
#[derive(Debug)]
struct WoffTableEntry {
    tag: [u8; 4],
    offset: u32,
    comp_length: u32,
    orig_length: u32,
    orig_checksum: u32,
}

impl WoffTableEntry {
    fn parse(r: &mut FontReader) -> Result<Self> {
        Ok(Self {
            tag: r.read_tag()?,
            offset: r.read_u32()?,
            comp_length: r.read_u32()?,
            orig_length: r.read_u32()?,
            orig_checksum: r.read_u32()?,
        })
    }

    /// Table bytes, inflated unless stored raw
    fn decode(&self, stored: &[u8]) -> std::result::Result<Vec<u8>, String> {
        if self.comp_length == self.orig_length {
            return Ok(stored.to_vec());
        }
        if self.comp_length > self.orig_length {
            return Err(format!(
                "compressed length {} exceeds original length {}",
                self.comp_length, self.orig_length
            ));
        }

        let mut table = Vec::with_capacity(self.orig_length as usize);
        ZlibDecoder::new(stored)
            .take(self.orig_length as u64 + 1)
            .read_to_end(&mut table)
            .map_err(|e| format!("zlib: {e}"))?;
        if table.len() != self.orig_length as usize {
            return Err(format!(
                "inflated to {} bytes, expected {}",
                table.len(),
                self.orig_length
            ));
        }
        Ok(table)
    }
}

/// Decode a WOFF file into an sfnt buffer
///
/// A broken header or directory is a structural error. A table that fails
/// to inflate yields `None` plus an error message.
pub fn decode_woff(data: &[u8]) -> Result<ParseOutcome<Option<Vec<u8>>>> {
    let mut r = FontReader::new(data);
    let header = WoffHeader::parse(&mut r)?;
    tracing::debug!(
        "WOFF {}.{}: {} tables, flavor {:#010x}, {} bytes (metadata {}, private {})",
        header.major_version,
        header.minor_version,
        header.num_tables,
        header.flavor,
        header.length,
        header.meta_length,
        header.priv_length
    );

    let entries = (0..header.num_tables)
        .map(|_| WoffTableEntry::parse(&mut r))
        .collect::<Result<Vec<_>>>()?;

    let mut outcome = ParseOutcome::clean(None);
    let mut tables = Vec::with_capacity(entries.len());
    for entry in &entries {
        let stored = r.slice(entry.offset as usize, entry.comp_length as usize)?;
        let table = match entry.decode(stored) {
            Ok(table) => table,
            Err(reason) => {
                outcome.error(format!("WOFF table '{}': {reason}", tag_name(&entry.tag)));
                return Ok(outcome);
            }
        };
        if &entry.tag != b"head" && calculate_checksum(&table) != entry.orig_checksum {
            tracing::debug!("WOFF table '{}': checksum mismatch", tag_name(&entry.tag));
        }
        tables.push(SfntTable::new(entry.tag, table));
    }

    let sfnt = build_sfnt(header.flavor, &tables);
    if sfnt.len() != header.total_sfnt_size as usize {
        tracing::debug!(
            "WOFF totalSfntSize {} differs from rebuilt size {}",
            header.total_sfnt_size,
            sfnt.len()
        );
    }
    outcome.value = Some(sfnt);
    Ok(outcome)
}
