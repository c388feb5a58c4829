//! TrueType / OpenType (sfnt) container
//!
//! The table directory is read first, mandatory tables are checked, and then
//! every known table is visited in a fixed priority order so that each
//! handler finds the tables it depends on already decoded (`loca` needs
//! `head` and `maxp`, `hmtx` needs `hhea`, `fvar` needs `name`).

pub mod cmap;
pub mod fvar;
pub mod glyf;
pub mod kern;
pub mod layout;
pub mod lookup;
pub mod name;
pub mod post;
pub mod tables;
pub mod writer;

mod pipeline;

pub use pipeline::{CffOutlines, GlyfOutlines, OutlineStrategy, SfntPipeline, TableState};

use crate::detect::TTC_TAG;
use crate::font::reader::FontReader;
use crate::{FontError, Result};

/// Visiting order of known tables; anything else is skipped
pub const TABLE_PRIORITY: [([u8; 4], u16); 19] = [
    (*b"head", 0),
    (*b"maxp", 10),
    (*b"name", 20),
    (*b"loca", 30),
    (*b"glyf", 40),
    (*b"CFF ", 50),
    (*b"CFF2", 60),
    (*b"cmap", 70),
    (*b"hhea", 80),
    (*b"hmtx", 90),
    (*b"fvar", 91),
    (*b"vhea", 100),
    (*b"vmtx", 110),
    (*b"OS/2", 120),
    (*b"post", 130),
    (*b"GDEF", 150),
    (*b"GPOS", 160),
    (*b"GSUB", 170),
    (*b"kern", 340),
];

/// Tables every font must carry besides its outlines
const REQUIRED_TABLES: [[u8; 4]; 6] = [*b"head", *b"maxp", *b"hhea", *b"hmtx", *b"cmap", *b"name"];

/// Priority of a table tag, `None` for tables the loader ignores
pub fn table_priority(tag: &[u8; 4]) -> Option<u16> {
    TABLE_PRIORITY
        .iter()
        .find(|(known, _)| known == tag)
        .map(|&(_, priority)| priority)
}

/// Printable form of a tag
pub fn tag_name(tag: &[u8; 4]) -> String {
    String::from_utf8_lossy(tag).into_owned()
}

/// Table directory record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableRecord {
    pub tag: [u8; 4],
    pub checksum: u32,
    pub offset: u32,
    pub length: u32,
}

/// Table directory of one font, borrowing the file bytes
#[derive(Debug, Clone)]
pub struct TableDirectory<'a> {
    data: &'a [u8],
    pub sfnt_version: u32,
    pub records: Vec<TableRecord>,
}

impl<'a> TableDirectory<'a> {
    /// Parse the directory at `offset` (0 for plain fonts, the per-font
    /// offset inside a collection)
    pub fn parse(data: &'a [u8], offset: usize) -> Result<Self> {
        let mut r = FontReader::at(data, offset);
        let sfnt_version = r.read_u32()?;
        let num_tables = r.read_u16()?;
        let _search_range = r.read_u16()?;
        let _entry_selector = r.read_u16()?;
        let _range_shift = r.read_u16()?;

        let mut records = Vec::with_capacity(num_tables as usize);
        for _ in 0..num_tables {
            let record = TableRecord {
                tag: r.read_tag()?,
                checksum: r.read_u32()?,
                offset: r.read_u32()?,
                length: r.read_u32()?,
            };
            let end = record.offset as u64 + record.length as u64;
            if end > data.len() as u64 {
                return Err(FontError::invalid(
                    &tag_name(&record.tag),
                    format!(
                        "table record {}+{} outside the {}-byte buffer",
                        record.offset,
                        record.length,
                        data.len()
                    ),
                ));
            }
            records.push(record);
        }

        Ok(Self {
            data,
            sfnt_version,
            records,
        })
    }

    pub fn record(&self, tag: &[u8; 4]) -> Option<&TableRecord> {
        self.records.iter().find(|record| &record.tag == tag)
    }

    pub fn contains(&self, tag: &[u8; 4]) -> bool {
        self.record(tag).is_some()
    }

    /// Bytes of a table
    pub fn table(&self, tag: &[u8; 4]) -> Option<&'a [u8]> {
        let record = self.record(tag)?;
        let start = record.offset as usize;
        self.data.get(start..start + record.length as usize)
    }

    /// Whether outlines come from `CFF `/`CFF2` rather than `glyf`
    pub fn has_cff_outlines(&self) -> bool {
        !self.contains(b"glyf") && (self.contains(b"CFF ") || self.contains(b"CFF2"))
    }

    /// Check the tables the loader cannot do without
    pub fn validate_mandatory(&self) -> Result<()> {
        if let Some(missing) = REQUIRED_TABLES.iter().find(|tag| !self.contains(tag)) {
            return Err(FontError::MissingTable(tag_name(missing)));
        }
        if self.has_cff_outlines() {
            return Ok(());
        }
        for tag in [b"glyf", b"loca"] {
            if !self.contains(tag) {
                return Err(FontError::MissingTable(tag_name(tag)));
            }
        }
        Ok(())
    }

    /// Known tables in visiting order; first record wins for repeated tags
    pub fn ordered_records(&self) -> Vec<TableRecord> {
        let mut ordered: Vec<(u16, TableRecord)> = Vec::with_capacity(self.records.len());
        for record in &self.records {
            let Some(priority) = table_priority(&record.tag) else {
                continue;
            };
            if ordered.iter().all(|(_, seen)| seen.tag != record.tag) {
                ordered.push((priority, *record));
            }
        }
        ordered.sort_by_key(|&(priority, _)| priority);
        ordered.into_iter().map(|(_, record)| record).collect()
    }
}

/// Directories of every font in the buffer: one for a plain font, one per
/// face for a `ttcf` collection
pub fn parse_directories(data: &[u8]) -> Result<Vec<TableDirectory<'_>>> {
    let mut r = FontReader::new(data);
    if r.read_u32()? != TTC_TAG {
        return Ok(vec![TableDirectory::parse(data, 0)?]);
    }

    let major = r.read_u16()?;
    let _minor = r.read_u16()?;
    let num_fonts = r.read_u32()?;
    tracing::debug!("Font collection v{major}: {num_fonts} fonts");

    let mut directories = Vec::with_capacity(num_fonts.min(1024) as usize);
    for _ in 0..num_fonts {
        let offset = r.read_u32()? as usize;
        directories.push(TableDirectory::parse(data, offset)?);
    }
    Ok(directories)
}
