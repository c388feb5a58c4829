//! Compact Font Format outlines (`CFF ` and `CFF2` tables)
//!
//! Only the first font of a CFF FontSet is used, matching how OpenType
//! embeds CFF. Charstrings are interpreted on the scoped worker pool; a
//! charstring that fails to run marks its glyph invalid and the rest of the
//! font loads normally.

pub mod charstring;
pub mod dict;
pub mod index;
pub mod strings;

use crate::diagnostics::ParseOutcome;
use crate::font::reader::{decode_string, FontReader, StringEncoding};
use crate::model::Outline;
use crate::parallel;
use crate::{FontError, Result};

use charstring::{interpret, CharstringContext};
use dict::Dict;
use index::CffIndex;
use strings::{STANDARD_STRINGS, STANDARD_STRING_COUNT};

/// Charset offsets with predefined meaning
const CHARSET_ISO_ADOBE: usize = 0;
const CHARSET_EXPERT_SUBSET: usize = 2;

/// One decoded charstring
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CffGlyph {
    pub outlines: Vec<Outline>,
    pub name: Option<String>,
    pub invalid: bool,
}

/// Glyph outlines and names from a CFF or CFF2 table
#[derive(Debug, Clone, Default)]
pub struct CffFont {
    pub name: Option<String>,
    pub is_cid: bool,
    pub is_cff2: bool,
    pub glyphs: Vec<CffGlyph>,
}

/// Private DICT data needed to run charstrings
#[derive(Debug, Default)]
struct PrivateData<'a> {
    local_subrs: Option<CffIndex<'a>>,
    vsindex: usize,
}

/// Parse a `CFF ` table
pub fn parse_cff(data: &[u8]) -> Result<ParseOutcome<CffFont>> {
    let mut r = FontReader::new(data);
    let major = r.read_u8()?;
    let _minor = r.read_u8()?;
    let header_size = r.read_u8()?;
    let _off_size = r.read_u8()?;
    if major != 1 {
        return Err(FontError::invalid("CFF", format!("unsupported major version {major}")));
    }

    r.set_pos(header_size as usize);
    let names = CffIndex::parse(&mut r, false)?;
    let top_dicts = CffIndex::parse(&mut r, false)?;
    let string_index = CffIndex::parse(&mut r, false)?;
    let global_subrs = CffIndex::parse(&mut r, false)?;

    let mut outcome = ParseOutcome::clean(CffFont::default());
    if top_dicts.len() > 1 {
        outcome.warn(format!("CFF: FontSet holds {} fonts, using the first", top_dicts.len()));
    }
    let top_data = top_dicts
        .get(0)
        .ok_or_else(|| FontError::invalid("CFF", "empty Top DICT INDEX"))?;
    let top = Dict::parse(top_data, &[])?;

    let charstrings = charstrings_index(data, &top, false)?;
    let num_glyphs = charstrings.len();
    let is_cid = top.contains(dict::ROS);

    let (privates, fd_select) = if is_cid {
        let fd_array = top
            .get_usize(dict::FD_ARRAY)
            .ok_or_else(|| FontError::invalid("CFF", "CID font without FDArray"))?;
        let fd_select = top
            .get_usize(dict::FD_SELECT)
            .ok_or_else(|| FontError::invalid("CFF", "CID font without FDSelect"))?;
        (
            parse_fd_array(data, fd_array, false, &[])?,
            parse_fd_select(data, fd_select, num_glyphs)?,
        )
    } else {
        (vec![parse_private(data, &top, false, &[])?], Vec::new())
    };

    let charset = top.get_usize(dict::CHARSET).unwrap_or(CHARSET_ISO_ADOBE);
    let sids = parse_charset(data, charset, num_glyphs)?;

    let glyphs = interpret_all(&charstrings, &global_subrs, &privates, &fd_select, false, &[]);
    let mut glyphs = glyphs.drain_into(&mut outcome.messages);
    for (glyph, sid) in glyphs.iter_mut().zip(&sids) {
        glyph.name = if is_cid {
            Some(format!("cid{sid:05}"))
        } else {
            sid_string(*sid, &string_index)
        };
    }

    outcome.value = CffFont {
        name: names.get(0).map(|n| decode_string(n, StringEncoding::Utf8)),
        is_cid,
        is_cff2: false,
        glyphs,
    };
    tracing::debug!("CFF: {num_glyphs} charstrings, cid={is_cid}");
    Ok(outcome)
}

/// Parse a `CFF2` table
///
/// Variation deltas are dropped: blended values resolve to the default
/// instance.
pub fn parse_cff2(data: &[u8]) -> Result<ParseOutcome<CffFont>> {
    let mut r = FontReader::new(data);
    let major = r.read_u8()?;
    let _minor = r.read_u8()?;
    let header_size = r.read_u8()? as usize;
    let top_length = r.read_u16()? as usize;
    if major != 2 {
        return Err(FontError::invalid("CFF2", format!("unsupported major version {major}")));
    }

    let top = Dict::parse(r.slice(header_size, top_length)?, &[])?;
    r.set_pos(header_size + top_length);
    let global_subrs = CffIndex::parse(&mut r, true)?;

    let regions = match top.get_usize(dict::VSTORE) {
        Some(offset) => parse_region_counts(data, offset)?,
        None => Vec::new(),
    };

    let charstrings = charstrings_index(data, &top, true)?;
    let num_glyphs = charstrings.len();
    let fd_array = top
        .get_usize(dict::FD_ARRAY)
        .ok_or_else(|| FontError::invalid("CFF2", "missing FDArray"))?;
    let privates = parse_fd_array(data, fd_array, true, &regions)?;
    let fd_select = match top.get_usize(dict::FD_SELECT) {
        Some(offset) => parse_fd_select(data, offset, num_glyphs)?,
        None => Vec::new(),
    };

    let mut outcome = ParseOutcome::clean(CffFont::default());
    let glyphs = interpret_all(&charstrings, &global_subrs, &privates, &fd_select, true, &regions)
        .drain_into(&mut outcome.messages);

    outcome.value = CffFont {
        name: None,
        is_cid: false,
        is_cff2: true,
        glyphs,
    };
    tracing::debug!("CFF2: {num_glyphs} charstrings, {} font dicts", privates.len());
    Ok(outcome)
}

fn charstrings_index<'a>(data: &'a [u8], top: &Dict, wide: bool) -> Result<CffIndex<'a>> {
    let offset = top
        .get_usize(dict::CHAR_STRINGS)
        .ok_or_else(|| FontError::invalid("CFF", "Top DICT has no CharStrings"))?;
    CffIndex::parse_at(data, offset, wide)
}

fn parse_private<'a>(
    data: &'a [u8],
    font_dict: &Dict,
    wide: bool,
    regions: &[usize],
) -> Result<PrivateData<'a>> {
    let Some((size, offset)) = font_dict.get_pair(dict::PRIVATE) else {
        return Ok(PrivateData::default());
    };
    let private = Dict::parse(FontReader::new(data).slice(offset, size)?, regions)?;
    let local_subrs = match private.get_usize(dict::SUBRS) {
        Some(relative) => Some(CffIndex::parse_at(data, offset + relative, wide)?),
        None => None,
    };
    Ok(PrivateData {
        local_subrs,
        vsindex: private.get_usize(dict::VSINDEX).unwrap_or(0),
    })
}

fn parse_fd_array<'a>(
    data: &'a [u8],
    offset: usize,
    wide: bool,
    regions: &[usize],
) -> Result<Vec<PrivateData<'a>>> {
    let fd_array = CffIndex::parse_at(data, offset, wide)?;
    (0..fd_array.len())
        .filter_map(|i| fd_array.get(i))
        .map(|font_dict| parse_private(data, &Dict::parse(font_dict, regions)?, wide, regions))
        .collect()
}

/// Font DICT index per glyph
fn parse_fd_select(data: &[u8], offset: usize, num_glyphs: usize) -> Result<Vec<usize>> {
    let mut r = FontReader::at(data, offset);
    let format = r.read_u8()?;
    match format {
        0 => (0..num_glyphs).map(|_| Ok(r.read_u8()? as usize)).collect(),
        3 | 4 => {
            let wide = format == 4;
            let n_ranges = if wide { r.read_u32()? } else { r.read_u16()? as u32 };
            let mut ranges = Vec::with_capacity(n_ranges as usize);
            for _ in 0..n_ranges {
                let first = if wide { r.read_u32()? } else { r.read_u16()? as u32 };
                let fd = if wide { r.read_u16()? as usize } else { r.read_u8()? as usize };
                ranges.push((first as usize, fd));
            }
            let sentinel = if wide { r.read_u32()? } else { r.read_u16()? as u32 } as usize;

            let mut select = vec![0; num_glyphs];
            for (i, &(first, fd)) in ranges.iter().enumerate() {
                let end = ranges.get(i + 1).map_or(sentinel, |next| next.0);
                for slot in select.iter_mut().take(end.min(num_glyphs)).skip(first) {
                    *slot = fd;
                }
            }
            Ok(select)
        }
        other => Err(FontError::invalid("CFF", format!("FDSelect format {other}"))),
    }
}

/// SID (or CID) per glyph; glyph 0 is always `.notdef`
fn parse_charset(data: &[u8], offset: usize, num_glyphs: usize) -> Result<Vec<u16>> {
    if num_glyphs == 0 {
        return Ok(Vec::new());
    }
    if offset == CHARSET_ISO_ADOBE {
        return Ok((0..num_glyphs).map(|i| i.min(228) as u16).collect());
    }
    if offset <= CHARSET_EXPERT_SUBSET {
        // Expert charsets carry no names worth exposing
        return Ok(Vec::new());
    }

    let mut r = FontReader::at(data, offset);
    let format = r.read_u8()?;
    let mut sids = Vec::with_capacity(num_glyphs);
    sids.push(0);
    match format {
        0 => {
            while sids.len() < num_glyphs {
                sids.push(r.read_u16()?);
            }
        }
        1 | 2 => {
            while sids.len() < num_glyphs {
                let first = r.read_u16()?;
                let left = if format == 1 {
                    r.read_u8()? as u16
                } else {
                    r.read_u16()?
                };
                for sid in first..=first.saturating_add(left) {
                    if sids.len() == num_glyphs {
                        break;
                    }
                    sids.push(sid);
                }
            }
        }
        other => return Err(FontError::invalid("CFF", format!("charset format {other}"))),
    }
    Ok(sids)
}

fn sid_string(sid: u16, string_index: &CffIndex) -> Option<String> {
    let sid = sid as usize;
    match STANDARD_STRINGS.get(sid) {
        Some(name) => Some(name.to_string()),
        None => string_index
            .get(sid - STANDARD_STRING_COUNT)
            .map(|bytes| decode_string(bytes, StringEncoding::Utf8)),
    }
}

/// Region count of every ItemVariationData in the CFF2 variation store
fn parse_region_counts(data: &[u8], offset: usize) -> Result<Vec<usize>> {
    // u16 length prefix, then an ItemVariationStore
    let store = offset + 2;
    let mut r = FontReader::at(data, store);
    let _format = r.read_u16()?;
    let _region_list = r.read_u32()?;
    let count = r.read_u16()?;
    let mut counts = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let item_data = store + r.read_u32()? as usize;
        let mut d = FontReader::at(data, item_data);
        let _item_count = d.read_u16()?;
        let _word_delta_count = d.read_u16()?;
        counts.push(d.read_u16()? as usize);
    }
    Ok(counts)
}

fn interpret_all(
    charstrings: &CffIndex,
    global_subrs: &CffIndex,
    privates: &[PrivateData],
    fd_select: &[usize],
    is_cff2: bool,
    regions: &[usize],
) -> ParseOutcome<Vec<CffGlyph>> {
    let indices: Vec<usize> = (0..charstrings.len()).collect();
    let results = parallel::map_ref(&indices, |&i| {
        let private = privates.get(fd_select.get(i).copied().unwrap_or(0));
        let ctx = CharstringContext {
            global_subrs,
            local_subrs: private.and_then(|p| p.local_subrs.as_ref()),
            is_cff2,
            region_counts: regions,
            default_vsindex: private.map_or(0, |p| p.vsindex),
        };
        match charstrings.get(i) {
            Some(data) => interpret(data, &ctx),
            None => Err(FontError::invalid("CFF", "missing charstring")),
        }
    });

    let mut outcome = ParseOutcome::clean(Vec::with_capacity(results.len()));
    for (i, result) in results.into_iter().enumerate() {
        match result {
            Ok(cs) => outcome.value.push(CffGlyph {
                outlines: cs.outlines,
                name: None,
                invalid: false,
            }),
            Err(e) => {
                outcome.error(format!("glyph {i}: {e}"));
                outcome.value.push(CffGlyph {
                    invalid: true,
                    ..Default::default()
                });
            }
        }
    }
    outcome
}
