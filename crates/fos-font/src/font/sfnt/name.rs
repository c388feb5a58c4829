//! Name table

use std::collections::BTreeMap;

use crate::font::reader::{decode_string, FontReader, StringEncoding};
use crate::Result;

/// Well-known name IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum NameId {
    Copyright = 0,
    FontFamily = 1,
    FontSubfamily = 2,
    UniqueId = 3,
    FullName = 4,
    Version = 5,
    PostScriptName = 6,
    Trademark = 7,
    Manufacturer = 8,
    Designer = 9,
    Description = 10,
    VendorUrl = 11,
    DesignerUrl = 12,
    LicenseDescription = 13,
    LicenseInfoUrl = 14,
    Reserved = 15,
    TypographicFamily = 16,
    TypographicSubfamily = 17,
    CompatibleFull = 18,
    SampleText = 19,
    PostScriptCid = 20,
    WwsFamily = 21,
    WwsSubfamily = 22,
    LightBackgroundPalette = 23,
    DarkBackgroundPalette = 24,
    VariationsPostScriptPrefix = 25,
}

impl NameId {
    const ALL: [NameId; 26] = [
        NameId::Copyright,
        NameId::FontFamily,
        NameId::FontSubfamily,
        NameId::UniqueId,
        NameId::FullName,
        NameId::Version,
        NameId::PostScriptName,
        NameId::Trademark,
        NameId::Manufacturer,
        NameId::Designer,
        NameId::Description,
        NameId::VendorUrl,
        NameId::DesignerUrl,
        NameId::LicenseDescription,
        NameId::LicenseInfoUrl,
        NameId::Reserved,
        NameId::TypographicFamily,
        NameId::TypographicSubfamily,
        NameId::CompatibleFull,
        NameId::SampleText,
        NameId::PostScriptCid,
        NameId::WwsFamily,
        NameId::WwsSubfamily,
        NameId::LightBackgroundPalette,
        NameId::DarkBackgroundPalette,
        NameId::VariationsPostScriptPrefix,
    ];

    pub fn from_u16(id: u16) -> Option<NameId> {
        Self::ALL.get(id as usize).copied()
    }
}

const PLATFORM_UNICODE: u16 = 0;
const PLATFORM_WINDOWS: u16 = 3;
const WINDOWS_ENGLISH_US: u16 = 0x0409;

/// Name table entry
#[derive(Debug, Clone)]
pub struct NameRecord {
    pub platform_id: u16,
    pub encoding_id: u16,
    pub language_id: u16,
    pub name_id: u16,
    pub name: String,
}

impl NameRecord {
    fn preferred(&self) -> bool {
        self.platform_id == PLATFORM_WINDOWS && self.language_id == WINDOWS_ENGLISH_US
    }
}

/// Decoded name strings keyed by name ID
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    pub records: Vec<NameRecord>,
    strings: BTreeMap<u16, String>,
}

impl NameTable {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = FontReader::new(data);
        let _format = r.read_u16()?;
        let count = r.read_u16()?;
        let string_offset = r.read_u16()? as usize;

        let mut records = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let platform_id = r.read_u16()?;
            let encoding_id = r.read_u16()?;
            let language_id = r.read_u16()?;
            let name_id = r.read_u16()?;
            let length = r.read_u16()? as usize;
            let offset = r.read_u16()? as usize;

            let bytes = r.slice(string_offset + offset, length)?;
            let encoding = match platform_id {
                PLATFORM_UNICODE | PLATFORM_WINDOWS => StringEncoding::Utf16Be,
                _ => StringEncoding::Latin1,
            };

            records.push(NameRecord {
                platform_id,
                encoding_id,
                language_id,
                name_id,
                name: decode_string(bytes, encoding),
            });
        }

        // Windows English wins, otherwise the first record for an id
        let mut strings = BTreeMap::new();
        for record in &records {
            if record.preferred() {
                strings.insert(record.name_id, record.name.clone());
            }
        }
        for record in &records {
            strings
                .entry(record.name_id)
                .or_insert_with(|| record.name.clone());
        }

        Ok(Self { records, strings })
    }

    /// String for a well-known name ID
    pub fn get(&self, id: NameId) -> Option<&str> {
        self.get_by_id(id as u16)
    }

    /// String for any name ID (including font-specific IDs >= 256)
    pub fn get_by_id(&self, id: u16) -> Option<&str> {
        self.strings.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}
