//! OpenType layout tables: GPOS, GSUB and GDEF glyph classes
//!
//! Tables are decoded as data. Nothing here applies positioning or
//! substitution.

use std::collections::BTreeMap;

use crate::font::reader::FontReader;
use crate::{FontError, Result};

use super::lookup::{parse_subtable, LayoutKind, LookupSubtable};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRecord {
    pub tag: [u8; 4],
    pub has_default_lang_sys: bool,
    pub lang_sys_tags: Vec<[u8; 4]>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureRecord {
    pub tag: [u8; 4],
    pub lookup_indices: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRecord {
    /// Declared type; extension lookups keep their extension type here
    pub lookup_type: u16,
    pub flags: u16,
    pub subtable_count: u16,
    pub mark_filtering_set: Option<u16>,
    pub subtables: Vec<LookupSubtable>,
}

/// GPOS or GSUB with its decoded lookups
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutTable {
    pub kind: LayoutKind,
    pub major_version: u16,
    pub minor_version: u16,
    pub scripts: Vec<ScriptRecord>,
    pub features: Vec<FeatureRecord>,
    pub lookups: Vec<LookupRecord>,
}

impl LayoutTable {
    pub fn parse(data: &[u8], kind: LayoutKind) -> Result<Self> {
        let mut r = FontReader::new(data);
        let major_version = r.read_u16()?;
        let minor_version = r.read_u16()?;
        if major_version != 1 {
            return Err(FontError::invalid(
                kind.tag(),
                format!("unsupported version {major_version}.{minor_version}"),
            ));
        }
        let script_list = r.read_u16()? as usize;
        let feature_list = r.read_u16()? as usize;
        let lookup_list = r.read_u16()? as usize;

        Ok(Self {
            kind,
            major_version,
            minor_version,
            scripts: parse_scripts(data, script_list)?,
            features: parse_features(data, feature_list)?,
            lookups: parse_lookups(data, lookup_list, kind)?,
        })
    }

    /// Tag of every feature, in list order
    pub fn feature_tags(&self) -> impl Iterator<Item = &[u8; 4]> {
        self.features.iter().map(|f| &f.tag)
    }

    /// Lookups referenced by a feature tag, in lookup list order
    pub fn feature_lookups(&self, tag: &[u8; 4]) -> Vec<&LookupRecord> {
        let mut indices: Vec<u16> = self
            .features
            .iter()
            .filter(|f| &f.tag == tag)
            .flat_map(|f| f.lookup_indices.iter().copied())
            .collect();
        indices.sort_unstable();
        indices.dedup();
        indices
            .into_iter()
            .filter_map(|i| self.lookups.get(i as usize))
            .collect()
    }
}

fn parse_scripts(data: &[u8], offset: usize) -> Result<Vec<ScriptRecord>> {
    if offset == 0 {
        return Ok(Vec::new());
    }
    let mut r = FontReader::at(data, offset);
    let count = r.read_u16()?;
    let mut scripts = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let tag = r.read_tag()?;
        let script_offset = offset + r.read_u16()? as usize;

        let mut s = FontReader::at(data, script_offset);
        let default_lang_sys = s.read_u16()?;
        let lang_sys_count = s.read_u16()?;
        let mut lang_sys_tags = Vec::with_capacity(lang_sys_count as usize);
        for _ in 0..lang_sys_count {
            lang_sys_tags.push(s.read_tag()?);
            s.skip(2)?;
        }
        scripts.push(ScriptRecord {
            tag,
            has_default_lang_sys: default_lang_sys != 0,
            lang_sys_tags,
        });
    }
    Ok(scripts)
}

fn parse_features(data: &[u8], offset: usize) -> Result<Vec<FeatureRecord>> {
    if offset == 0 {
        return Ok(Vec::new());
    }
    let mut r = FontReader::at(data, offset);
    let count = r.read_u16()?;
    let mut features = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let tag = r.read_tag()?;
        let mut f = FontReader::at(data, offset + r.read_u16()? as usize);
        let _params = f.read_u16()?;
        let index_count = f.read_u16()?;
        let lookup_indices = (0..index_count)
            .map(|_| f.read_u16())
            .collect::<Result<Vec<_>>>()?;
        features.push(FeatureRecord { tag, lookup_indices });
    }
    Ok(features)
}

fn parse_lookups(data: &[u8], offset: usize, kind: LayoutKind) -> Result<Vec<LookupRecord>> {
    if offset == 0 {
        return Ok(Vec::new());
    }
    let mut r = FontReader::at(data, offset);
    let count = r.read_u16()?;
    let mut lookups = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let base = offset + r.read_u16()? as usize;
        let mut l = FontReader::at(data, base);
        let lookup_type = l.read_u16()?;
        let flags = l.read_u16()?;
        let subtable_count = l.read_u16()?;
        let offsets = (0..subtable_count)
            .map(|_| l.read_u16())
            .collect::<Result<Vec<_>>>()?;
        let mark_filtering_set = if flags & USE_MARK_FILTERING_SET != 0 {
            Some(l.read_u16()?)
        } else {
            None
        };
        let subtables = offsets
            .into_iter()
            .map(|subtable| parse_subtable(data, base + subtable as usize, lookup_type, kind))
            .collect::<Result<Vec<_>>>()?;
        lookups.push(LookupRecord {
            lookup_type,
            flags,
            subtable_count,
            mark_filtering_set,
            subtables,
        });
    }
    Ok(lookups)
}

const USE_MARK_FILTERING_SET: u16 = 0x0010;

/// GDEF glyph classes (1 base, 2 ligature, 3 mark, 4 component)
pub fn parse_gdef_glyph_classes(data: &[u8]) -> Result<BTreeMap<u32, u16>> {
    let mut r = FontReader::new(data);
    let _major = r.read_u16()?;
    let _minor = r.read_u16()?;
    let class_def = r.read_u16()? as usize;
    if class_def == 0 {
        return Ok(BTreeMap::new());
    }
    parse_class_def(data, class_def)
}

/// ClassDef table, formats 1 and 2
pub fn parse_class_def(data: &[u8], offset: usize) -> Result<BTreeMap<u32, u16>> {
    read_class_def(data, offset, "GDEF")
}

/// ClassDef table; class 0 glyphs are left out of the map
pub(crate) fn read_class_def(data: &[u8], offset: usize, tag: &str) -> Result<BTreeMap<u32, u16>> {
    let mut r = FontReader::at(data, offset);
    let format = r.read_u16()?;
    let mut classes = BTreeMap::new();
    match format {
        1 => {
            let start = r.read_u16()? as u32;
            let count = r.read_u16()? as u32;
            for i in 0..count {
                let class = r.read_u16()?;
                if class != 0 {
                    classes.insert(start + i, class);
                }
            }
        }
        2 => {
            let ranges = r.read_u16()?;
            for _ in 0..ranges {
                let start = r.read_u16()? as u32;
                let end = r.read_u16()? as u32;
                let class = r.read_u16()?;
                if class != 0 && start <= end {
                    for glyph in start..=end {
                        classes.insert(glyph, class);
                    }
                }
            }
        }
        other => {
            return Err(FontError::invalid(tag, format!("ClassDef format {other}")));
        }
    }
    Ok(classes)
}
