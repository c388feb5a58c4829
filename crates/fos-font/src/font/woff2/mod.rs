//! WOFF2 (Web Open Font Format 2.0) decoder
//!
//! - Container and table directory parsing, including collections
//! - One Brotli stream covering every table (brotli-decompressor)
//! - Inverse `glyf`/`loca`/`hmtx` transforms ([`transform`])
//! - sfnt reconstruction, one buffer per font

mod transform;

use std::io::Read;

use brotli_decompressor::Decompressor;

use crate::detect::{TTC_TAG, WOFF2_SIGNATURE};
use crate::diagnostics::ParseOutcome;
use crate::font::reader::FontReader;
use crate::font::sfnt::tag_name;
use crate::font::sfnt::writer::{build_sfnt, SfntTable};
use crate::{FontError, Result};

use transform::{reconstruct_glyf, reconstruct_hmtx, RebuiltGlyf};

/// Known table tags in WOFF2 (index -> tag)
const KNOWN_TAGS: [[u8; 4]; 63] = [
    *b"cmap", *b"head", *b"hhea", *b"hmtx", *b"maxp", *b"name", *b"OS/2", *b"post",
    *b"cvt ", *b"fpgm", *b"glyf", *b"loca", *b"prep", *b"CFF ", *b"VORG", *b"EBDT",
    *b"EBLC", *b"gasp", *b"hdmx", *b"kern", *b"LTSH", *b"PCLT", *b"VDMX", *b"vhea",
    *b"vmtx", *b"BASE", *b"GDEF", *b"GPOS", *b"GSUB", *b"EBSC", *b"JSTF", *b"MATH",
    *b"CBDT", *b"CBLC", *b"COLR", *b"CPAL", *b"SVG ", *b"sbix", *b"acnt", *b"avar",
    *b"bdat", *b"bloc", *b"bsln", *b"cvar", *b"fdsc", *b"feat", *b"fmtx", *b"fvar",
    *b"gvar", *b"hsty", *b"just", *b"lcar", *b"mort", *b"morx", *b"opbd", *b"prop",
    *b"trak", *b"Zapf", *b"Silf", *b"Glat", *b"Gloc", *b"Feat", *b"Sill",
];

/// Tag index meaning "explicit tag follows"
const ARBITRARY_TAG: u8 = 0x3F;

/// Upper bound for buffers sized from header fields
const MAX_PREALLOCATION: usize = 64 << 20;

/// WOFF2 header (48 bytes)
#[derive(Debug)]
struct Woff2Header {
    flavor: u32,
    length: u32,
    num_tables: u16,
    total_sfnt_size: u32,
    total_compressed_size: u32,
    major_version: u16,
    minor_version: u16,
}

impl Woff2Header {
    fn parse(r: &mut FontReader) -> Result<Self> {
        if r.read_u32()? != WOFF2_SIGNATURE {
            return Err(FontError::UnsupportedFontFormat);
        }
        let flavor = r.read_u32()?;
        let length = r.read_u32()?;
        let num_tables = r.read_u16()?;
        let _reserved = r.read_u16()?;
        let total_sfnt_size = r.read_u32()?;
        let total_compressed_size = r.read_u32()?;
        let major_version = r.read_u16()?;
        let minor_version = r.read_u16()?;
        // metaOffset, metaLength, metaOrigLength, privOffset, privLength
        r.skip(20)?;
        Ok(Self {
            flavor,
            length,
            num_tables,
            total_sfnt_size,
            total_compressed_size,
            major_version,
            minor_version,
        })
    }
}

/// WOFF2 table directory entry
#[derive(Debug, Clone)]
struct Woff2TableEntry {
    tag: [u8; 4],
    flags: u8,
    orig_length: u32,
    transform_length: Option<u32>,
}

impl Woff2TableEntry {
    fn parse(r: &mut FontReader) -> Result<Self> {
        let flags = r.read_u8()?;
        let tag = match flags & ARBITRARY_TAG {
            ARBITRARY_TAG => r.read_tag()?,
            index => KNOWN_TAGS[index as usize],
        };
        let orig_length = r.read_uint_base128()?;

        let mut entry = Self {
            tag,
            flags,
            orig_length,
            transform_length: None,
        };
        if entry.is_transformed() {
            entry.transform_length = Some(r.read_uint_base128()?);
        }
        Ok(entry)
    }

    fn transform_version(&self) -> u8 {
        (self.flags >> 6) & 0x03
    }

    /// glyf/loca use version 0 for the transform and 3 for none; every other
    /// table uses 0 for none
    fn is_transformed(&self) -> bool {
        match &self.tag {
            b"glyf" | b"loca" => self.transform_version() == 0,
            _ => self.transform_version() != 0,
        }
    }

    /// Bytes the table occupies in the decompressed stream
    fn stored_length(&self) -> usize {
        self.transform_length.unwrap_or(self.orig_length) as usize
    }
}

/// One font of the file: its flavor and the directory entries it uses
#[derive(Debug, Clone)]
struct FontEntry {
    flavor: u32,
    table_indices: Vec<u16>,
}

fn parse_collection_directory(r: &mut FontReader, num_tables: usize) -> Result<Vec<FontEntry>> {
    let version = r.read_u32()?;
    let num_fonts = r.read_255_uint16()?;
    tracing::debug!("WOFF2 collection {version:#010x}: {num_fonts} fonts");

    let mut fonts = Vec::with_capacity(num_fonts as usize);
    for font in 0..num_fonts {
        let count = r.read_255_uint16()?;
        let flavor = r.read_u32()?;
        let table_indices = (0..count)
            .map(|_| {
                let index = r.read_255_uint16()?;
                if index as usize >= num_tables {
                    return Err(FontError::invalid(
                        "woff2",
                        format!("font {font} references table {index} of {num_tables}"),
                    ));
                }
                Ok(index)
            })
            .collect::<Result<Vec<_>>>()?;
        fonts.push(FontEntry { flavor, table_indices });
    }
    Ok(fonts)
}

/// Decode a WOFF2 file into one sfnt buffer per font
///
/// A broken header or directory is a structural error. A malformed Brotli
/// stream or a failed transform yields no fonts plus an error message.
pub fn decode_woff2(data: &[u8]) -> Result<ParseOutcome<Vec<Vec<u8>>>> {
    let mut r = FontReader::new(data);
    let header = Woff2Header::parse(&mut r)?;
    tracing::debug!(
        "WOFF2 {}.{}: {} tables, flavor {:#010x}, {} bytes, sfnt {} bytes",
        header.major_version,
        header.minor_version,
        header.num_tables,
        header.flavor,
        header.length,
        header.total_sfnt_size
    );

    let entries = (0..header.num_tables)
        .map(|_| Woff2TableEntry::parse(&mut r))
        .collect::<Result<Vec<_>>>()?;
    let fonts = if header.flavor == TTC_TAG {
        parse_collection_directory(&mut r, entries.len())?
    } else {
        vec![FontEntry {
            flavor: header.flavor,
            table_indices: (0..header.num_tables).collect(),
        }]
    };
    let compressed = r.read_bytes(header.total_compressed_size as usize)?;

    let mut outcome = ParseOutcome::clean(Vec::new());
    match rebuild_fonts(&entries, &fonts, compressed) {
        Ok(sfnts) => outcome.value = sfnts,
        Err(e) => outcome.error(format!("WOFF2 decode failed: {e}")),
    }
    Ok(outcome)
}

fn decompress(compressed: &[u8], expected: usize) -> Result<Vec<u8>> {
    let mut stream = Vec::with_capacity(expected.min(MAX_PREALLOCATION));
    Decompressor::new(compressed, 4096)
        .read_to_end(&mut stream)
        .map_err(|e| FontError::invalid("woff2", format!("Brotli stream: {e}")))?;
    if stream.len() < expected {
        return Err(FontError::invalid(
            "woff2",
            format!("Brotli stream holds {} bytes, directory needs {expected}", stream.len()),
        ));
    }
    Ok(stream)
}

fn rebuild_fonts(entries: &[Woff2TableEntry], fonts: &[FontEntry], compressed: &[u8]) -> Result<Vec<Vec<u8>>> {
    let expected = entries.iter().map(Woff2TableEntry::stored_length).sum();
    let stream = decompress(compressed, expected)?;

    let mut offset = 0;
    let mut stored = Vec::with_capacity(entries.len());
    for entry in entries {
        let end = offset + entry.stored_length();
        stored.push(&stream[offset..end]);
        offset = end;
    }

    fonts
        .iter()
        .map(|font| {
            let members: Vec<(&Woff2TableEntry, &[u8])> = font
                .table_indices
                .iter()
                .map(|&index| (&entries[index as usize], stored[index as usize]))
                .collect();
            rebuild_font(font.flavor, &members)
        })
        .collect()
}

/// Undo the transforms of one font and write its sfnt
fn rebuild_font(flavor: u32, members: &[(&Woff2TableEntry, &[u8])]) -> Result<Vec<u8>> {
    let find = |tag: &[u8; 4]| members.iter().find(|(entry, _)| &entry.tag == tag);

    let glyf: Option<RebuiltGlyf> = match find(b"glyf") {
        Some((entry, data)) if entry.is_transformed() => Some(reconstruct_glyf(data)?),
        _ => None,
    };

    let mut tables = Vec::with_capacity(members.len());
    for (entry, data) in members {
        if !entry.is_transformed() {
            tables.push(SfntTable::new(entry.tag, data.to_vec()));
            continue;
        }
        let table = match (&entry.tag, glyf.as_ref()) {
            (b"glyf", Some(rebuilt)) => rebuilt.glyf.clone(),
            (b"loca", Some(rebuilt)) => rebuilt.loca.clone(),
            (b"hmtx", Some(rebuilt)) if entry.transform_version() == 1 => {
                let num_h_metrics = table_u16(find(b"hhea"), b"hhea", 34)?;
                reconstruct_hmtx(data, rebuilt.num_glyphs, num_h_metrics, &rebuilt.x_mins)?
            }
            (tag, _) => {
                return Err(FontError::invalid(
                    &tag_name(tag),
                    format!("unsupported transform version {}", entry.transform_version()),
                ));
            }
        };
        tables.push(SfntTable::new(entry.tag, table));
    }

    if let (Some(rebuilt), Ok(num_glyphs)) = (glyf.as_ref(), table_u16(find(b"maxp"), b"maxp", 4)) {
        if rebuilt.num_glyphs != num_glyphs {
            tracing::warn!(
                "WOFF2 glyf holds {} glyphs, maxp declares {num_glyphs}",
                rebuilt.num_glyphs
            );
        }
    }
    Ok(build_sfnt(flavor, &tables))
}

/// Read a u16 field of an untransformed table
fn table_u16(table: Option<&(&Woff2TableEntry, &[u8])>, tag: &[u8; 4], offset: usize) -> Result<u16> {
    let (_, data) = table.ok_or_else(|| FontError::MissingTable(tag_name(tag)))?;
    FontReader::at(data, offset).read_u16()
}
