//! Container format detection

use crate::font::reader::FontReader;
use crate::{FontError, Result};

/// TrueType outlines (`\0\1\0\0`)
pub const SFNT_VERSION_TRUETYPE: u32 = 0x0001_0000;
/// Legacy Apple TrueType signature
pub const SFNT_VERSION_APPLE: u32 = u32::from_be_bytes(*b"true");
/// CFF outlines
pub const SFNT_VERSION_OTTO: u32 = u32::from_be_bytes(*b"OTTO");
/// TrueType / OpenType collection
pub const TTC_TAG: u32 = u32::from_be_bytes(*b"ttcf");
/// WOFF 1.0
pub const WOFF_SIGNATURE: u32 = u32::from_be_bytes(*b"wOFF");
/// WOFF 2.0
pub const WOFF2_SIGNATURE: u32 = u32::from_be_bytes(*b"wOF2");

/// Font container format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontFormat {
    /// Plain sfnt or collection; outline flavor is decided by its tables
    OpenType,
    Woff,
    Woff2,
}

impl FontFormat {
    pub fn name(&self) -> &'static str {
        match self {
            FontFormat::OpenType => "OpenType",
            FontFormat::Woff => "WOFF",
            FontFormat::Woff2 => "WOFF2",
        }
    }
}

/// Classify font bytes by their first four bytes
///
/// When the signature is unknown, an `extension` of `ttf` or `otf` falls back
/// to the OpenType parser.
pub fn detect(data: &[u8], extension: Option<&str>) -> Result<FontFormat> {
    let signature = FontReader::new(data).read_u32()?;

    match signature {
        SFNT_VERSION_TRUETYPE | SFNT_VERSION_APPLE | SFNT_VERSION_OTTO | TTC_TAG => {
            Ok(FontFormat::OpenType)
        }
        WOFF_SIGNATURE => Ok(FontFormat::Woff),
        WOFF2_SIGNATURE => Ok(FontFormat::Woff2),
        _ => match extension.map(|ext| ext.trim_start_matches('.').to_ascii_lowercase()) {
            Some(ext) if ext == "ttf" || ext == "otf" => {
                tracing::debug!("Unknown signature {signature:#010x}, falling back to OpenType by extension");
                Ok(FontFormat::OpenType)
            }
            _ => Err(FontError::UnsupportedFontFormat),
        },
    }
}
