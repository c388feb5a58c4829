//! Post table and the standard Macintosh glyph name set

use crate::font::reader::FontReader;
use crate::Result;

/// The 258 standard Macintosh glyph names, in glyph-name-index order
pub const MAC_GLYPH_NAMES: [&str; 258] = [
    ".notdef", ".null", "nonmarkingreturn", "space", "exclam", "quotedbl", "numbersign",
    "dollar", "percent", "ampersand", "quotesingle", "parenleft", "parenright", "asterisk",
    "plus", "comma", "hyphen", "period", "slash", "zero", "one", "two", "three", "four",
    "five", "six", "seven", "eight", "nine", "colon", "semicolon", "less", "equal",
    "greater", "question", "at", "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L",
    "M", "N", "O", "P", "Q", "R", "S", "T", "U", "V", "W", "X", "Y", "Z", "bracketleft",
    "backslash", "bracketright", "asciicircum", "underscore", "grave", "a", "b", "c", "d",
    "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r", "s", "t", "u", "v",
    "w", "x", "y", "z", "braceleft", "bar", "braceright", "asciitilde", "Adieresis",
    "Aring", "Ccedilla", "Eacute", "Ntilde", "Odieresis", "Udieresis", "aacute", "agrave",
    "acircumflex", "adieresis", "atilde", "aring", "ccedilla", "eacute", "egrave",
    "ecircumflex", "edieresis", "iacute", "igrave", "icircumflex", "idieresis", "ntilde",
    "oacute", "ograve", "ocircumflex", "odieresis", "otilde", "uacute", "ugrave",
    "ucircumflex", "udieresis", "dagger", "degree", "cent", "sterling", "section",
    "bullet", "paragraph", "germandbls", "registered", "copyright", "trademark", "acute",
    "dieresis", "notequal", "AE", "Oslash", "infinity", "plusminus", "lessequal",
    "greaterequal", "yen", "mu", "partialdiff", "summation", "product", "pi", "integral",
    "ordfeminine", "ordmasculine", "Omega", "ae", "oslash", "questiondown", "exclamdown",
    "logicalnot", "radical", "florin", "approxequal", "Delta", "guillemotleft",
    "guillemotright", "ellipsis", "nonbreakingspace", "Agrave", "Atilde", "Otilde", "OE",
    "oe", "endash", "emdash", "quotedblleft", "quotedblright", "quoteleft", "quoteright",
    "divide", "lozenge", "ydieresis", "Ydieresis", "fraction", "currency", "guilsinglleft",
    "guilsinglright", "fi", "fl", "daggerdbl", "periodcentered", "quotesinglbase",
    "quotedblbase", "perthousand", "Acircumflex", "Ecircumflex", "Aacute", "Edieresis",
    "Egrave", "Iacute", "Icircumflex", "Idieresis", "Igrave", "Oacute", "Ocircumflex",
    "apple", "Ograve", "Uacute", "Ucircumflex", "Ugrave", "dotlessi", "circumflex", "tilde",
    "macron", "breve", "dotaccent", "ring", "cedilla", "hungarumlaut", "ogonek", "caron",
    "Lslash", "lslash", "Scaron", "scaron", "Zcaron", "zcaron", "brokenbar", "Eth", "eth",
    "Yacute", "yacute", "Thorn", "thorn", "minus", "multiply", "onesuperior", "twosuperior",
    "threesuperior", "onehalf", "onequarter", "threequarters", "franc", "Gbreve", "gbreve",
    "Idotaccent", "Scedilla", "scedilla", "Cacute", "cacute", "Ccaron", "ccaron", "dcroat",
];

/// Post table summary plus glyph names
#[derive(Debug, Clone, Default)]
pub struct PostTable {
    pub version: f64,
    pub italic_angle: f64,
    pub underline_position: i16,
    pub underline_thickness: i16,
    pub is_fixed_pitch: bool,
    /// Glyph names by glyph index; empty when the version carries no names
    pub glyph_names: Vec<String>,
}

impl PostTable {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = FontReader::new(data);
        let version = r.read_fixed()?;
        let italic_angle = r.read_fixed()?;
        let underline_position = r.read_i16()?;
        let underline_thickness = r.read_i16()?;
        let is_fixed_pitch = r.read_u32()? != 0;
        r.skip(16)?; // memory usage hints

        let glyph_names = if version == 1.0 {
            MAC_GLYPH_NAMES.iter().map(|name| name.to_string()).collect()
        } else if version == 2.0 {
            Self::parse_v2_names(&mut r)?
        } else {
            Vec::new()
        };

        Ok(Self {
            version,
            italic_angle,
            underline_position,
            underline_thickness,
            is_fixed_pitch,
            glyph_names,
        })
    }

    fn parse_v2_names(r: &mut FontReader) -> Result<Vec<String>> {
        let num_glyphs = r.read_u16()? as usize;
        let mut indices = Vec::with_capacity(num_glyphs);
        for _ in 0..num_glyphs {
            indices.push(r.read_u16()? as usize);
        }

        let custom_count = indices
            .iter()
            .filter(|&&i| i >= MAC_GLYPH_NAMES.len())
            .map(|&i| i - MAC_GLYPH_NAMES.len() + 1)
            .max()
            .unwrap_or(0);
        let mut custom = Vec::with_capacity(custom_count);
        for _ in 0..custom_count {
            custom.push(r.read_pascal_string()?);
        }

        Ok(indices
            .into_iter()
            .map(|i| match MAC_GLYPH_NAMES.get(i) {
                Some(name) => name.to_string(),
                None => custom[i - MAC_GLYPH_NAMES.len()].clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(version: u32) -> Vec<u8> {
        let mut data = version.to_be_bytes().to_vec();
        data.extend_from_slice(&(-12i32 * 65536).to_be_bytes());
        data.extend_from_slice(&(-100i16).to_be_bytes());
        data.extend_from_slice(&50i16.to_be_bytes());
        data.extend_from_slice(&1u32.to_be_bytes());
        data.extend_from_slice(&[0u8; 16]);
        data
    }

    #[test]
    fn test_mac_names() {
        assert_eq!(MAC_GLYPH_NAMES[0], ".notdef");
        assert_eq!(MAC_GLYPH_NAMES[36], "A");
        assert_eq!(MAC_GLYPH_NAMES[257], "dcroat");
    }

    #[test]
    fn test_post_v1() {
        let post = PostTable::parse(&header(0x0001_0000)).unwrap();
        assert_eq!(post.italic_angle, -12.0);
        assert_eq!(post.underline_position, -100);
        assert!(post.is_fixed_pitch);
        assert_eq!(post.glyph_names.len(), 258);
    }

    #[test]
    fn test_post_v2_custom_names() {
        let mut data = header(0x0002_0000);
        data.extend_from_slice(&3u16.to_be_bytes());
        for index in [0u16, 259, 258] {
            data.extend_from_slice(&index.to_be_bytes());
        }
        data.push(3);
        data.extend_from_slice(b"foo");
        data.push(4);
        data.extend_from_slice(b"bars");

        let post = PostTable::parse(&data).unwrap();
        assert_eq!(post.glyph_names, vec![".notdef", "bars", "foo"]);
    }

    #[test]
    fn test_post_v3_has_no_names() {
        let post = PostTable::parse(&header(0x0003_0000)).unwrap();
        assert!(post.glyph_names.is_empty());
    }
}
