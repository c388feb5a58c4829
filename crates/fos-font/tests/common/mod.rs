//! Hand-built TrueType and CFF fixtures shared by the integration tests

#![allow(dead_code)]

use fos_font::font::sfnt::writer::{build_sfnt, SfntTable};

pub const UNITS_PER_EM: u16 = 1000;

/// One fixture glyph
#[derive(Debug, Clone)]
pub enum TestGlyph {
    /// No outline data (equal loca entries)
    Empty,
    /// Contours of (x, y, on_curve) points; off-curve points are quadratic
    /// controls in `glyf` and come in cubic pairs in `CFF `
    Simple(Vec<Vec<(i16, i16, bool)>>),
    /// Components as (glyph index, dx, dy, uniform scale)
    Composite(Vec<(u16, i16, i16, Option<f32>)>),
    /// Raw glyf bytes, or a raw charstring for CFF fonts
    Raw(Vec<u8>),
}

/// Axis-aligned square contour, clockwise like an outer TrueType contour
pub fn square_contour(x: i16, y: i16, size: i16) -> Vec<(i16, i16, bool)> {
    vec![
        (x, y, true),
        (x, y + size, true),
        (x + size, y + size, true),
        (x + size, y, true),
    ]
}

/// Builds a minimal but complete TrueType or CFF-flavored font
pub struct FontBuilder {
    family: String,
    glyphs: Vec<(TestGlyph, u16, Option<String>)>,
    mappings: Vec<(u16, u16)>,
    post: bool,
    cff: bool,
    declared_glyphs: Option<u16>,
    extra: Vec<SfntTable>,
}

impl Default for FontBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FontBuilder {
    /// Font with `.notdef` as glyph 0
    pub fn new() -> Self {
        Self {
            family: "Fixture Sans".to_string(),
            glyphs: vec![(TestGlyph::Empty, 500, Some(".notdef".to_string()))],
            mappings: Vec::new(),
            post: true,
            cff: false,
            declared_glyphs: None,
            extra: Vec::new(),
        }
    }

    pub fn family(mut self, family: &str) -> Self {
        self.family = family.to_string();
        self
    }

    /// Append a glyph; returns its index through `glyph_count() - 1`
    pub fn glyph(mut self, glyph: TestGlyph, advance: u16, name: &str) -> Self {
        self.glyphs.push((glyph, advance, Some(name.to_string())));
        self
    }

    pub fn map(mut self, c: char, glyph: u16) -> Self {
        self.mappings.push((c as u32 as u16, glyph));
        self
    }

    pub fn without_post(mut self) -> Self {
        self.post = false;
        self
    }

    /// Store outlines as Type 2 charstrings in a `CFF ` table instead of
    /// `glyf`/`loca`
    pub fn cff(mut self) -> Self {
        self.cff = true;
        self
    }

    /// Glyph count written to `maxp`, when it should differ from the glyphs
    pub fn declared_glyphs(mut self, count: u16) -> Self {
        self.declared_glyphs = Some(count);
        self
    }

    pub fn table(mut self, tag: &[u8; 4], data: Vec<u8>) -> Self {
        self.extra.push(SfntTable::new(*tag, data));
        self
    }

    pub fn glyph_count(&self) -> usize {
        self.glyphs.len()
    }

    /// Tables before container packing, sorted by tag on write
    pub fn tables(&self) -> Vec<SfntTable> {
        let mut tables = vec![
            SfntTable::new(*b"head", self.head()),
            SfntTable::new(*b"maxp", self.maxp()),
            SfntTable::new(*b"hhea", self.hhea()),
            SfntTable::new(*b"hmtx", self.hmtx()),
            SfntTable::new(*b"cmap", self.cmap()),
            SfntTable::new(*b"name", self.name()),
        ];
        if self.cff {
            tables.push(SfntTable::new(*b"CFF ", self.cff_table()));
        } else {
            let (glyf, loca) = self.glyf_and_loca();
            tables.push(SfntTable::new(*b"loca", loca));
            tables.push(SfntTable::new(*b"glyf", glyf));
        }
        if self.post {
            tables.push(SfntTable::new(*b"post", self.post_table()));
        }
        tables.extend(self.extra.iter().cloned());
        tables
    }

    pub fn build(&self) -> Vec<u8> {
        let version = if self.cff { 0x4F54_544F } else { 0x0001_0000 };
        build_sfnt(version, &self.tables())
    }

    fn head(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0x0001_0000u32.to_be_bytes());
        out.extend_from_slice(&0x0001_0000u32.to_be_bytes());
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(&0x5F0F_3CF5u32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&UNITS_PER_EM.to_be_bytes());
        out.extend_from_slice(&[0; 16]); // created, modified
        for v in [0i16, -200, 1000, 800] {
            out.extend_from_slice(&v.to_be_bytes());
        }
        out.extend_from_slice(&0u16.to_be_bytes()); // macStyle
        out.extend_from_slice(&8u16.to_be_bytes()); // lowestRecPPEM
        out.extend_from_slice(&2i16.to_be_bytes()); // fontDirectionHint
        out.extend_from_slice(&1i16.to_be_bytes()); // long loca
        out.extend_from_slice(&0i16.to_be_bytes());
        out
    }

    fn maxp(&self) -> Vec<u8> {
        let mut out = 0x0000_5000u32.to_be_bytes().to_vec();
        let count = self.declared_glyphs.unwrap_or(self.glyphs.len() as u16);
        out.extend_from_slice(&count.to_be_bytes());
        out
    }

    fn hhea(&self) -> Vec<u8> {
        let mut out = 0x0001_0000u32.to_be_bytes().to_vec();
        let max_advance = self.glyphs.iter().map(|g| g.1).max().unwrap_or(0);
        for v in [800i16, -200, 90] {
            out.extend_from_slice(&v.to_be_bytes());
        }
        out.extend_from_slice(&max_advance.to_be_bytes());
        for v in [0i16, 0, 1000, 1, 0, 0, 0, 0, 0, 0, 0] {
            out.extend_from_slice(&v.to_be_bytes());
        }
        out.extend_from_slice(&(self.glyphs.len() as u16).to_be_bytes());
        out
    }

    fn hmtx(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (glyph, advance, _) in &self.glyphs {
            out.extend_from_slice(&advance.to_be_bytes());
            let lsb = match glyph {
                TestGlyph::Simple(contours) => contours.iter().flatten().map(|p| p.0).min().unwrap_or(0),
                _ => 0,
            };
            out.extend_from_slice(&lsb.to_be_bytes());
        }
        out
    }

    /// Windows Unicode BMP table with a format 4 subtable
    fn cmap(&self) -> Vec<u8> {
        let mut mappings = self.mappings.clone();
        mappings.sort();

        let seg_count = mappings.len() as u16 + 1;
        let mut ends: Vec<u16> = mappings.iter().map(|m| m.0).collect();
        ends.push(0xFFFF);
        let mut starts = ends.clone();
        starts.truncate(mappings.len());
        starts.push(0xFFFF);
        let mut deltas: Vec<u16> = mappings.iter().map(|&(code, glyph)| glyph.wrapping_sub(code)).collect();
        deltas.push(1);

        let length = 16 + seg_count * 8;
        let entry_selector = seg_count.ilog2() as u16;
        let search_range = 2 * (1u16 << entry_selector);
        let mut subtable = Vec::new();
        for v in [4, length, 0, seg_count * 2, search_range, entry_selector, seg_count * 2 - search_range] {
            subtable.extend_from_slice(&v.to_be_bytes());
        }
        for v in ends.iter().chain(&[0]).chain(&starts).chain(&deltas) {
            subtable.extend_from_slice(&v.to_be_bytes());
        }
        subtable.extend(std::iter::repeat_n(0u8, seg_count as usize * 2));

        let mut out = Vec::new();
        for v in [0u16, 1, 3, 1] {
            out.extend_from_slice(&v.to_be_bytes());
        }
        out.extend_from_slice(&12u32.to_be_bytes());
        out.extend(subtable);
        out
    }

    fn name(&self) -> Vec<u8> {
        let full = format!("{} Regular", self.family);
        let post_script = self.family.replace(' ', "") + "-Regular";
        let strings: [(u16, &str); 4] = [
            (1, &self.family),
            (2, "Regular"),
            (4, &full),
            (6, &post_script),
        ];

        let mut storage = Vec::new();
        let mut records = Vec::new();
        for (id, text) in strings {
            let encoded: Vec<u8> = text.encode_utf16().flat_map(u16::to_be_bytes).collect();
            for v in [3u16, 1, 0x409, id, encoded.len() as u16, storage.len() as u16] {
                records.extend_from_slice(&v.to_be_bytes());
            }
            storage.extend(encoded);
        }

        let mut out = Vec::new();
        for v in [0u16, strings.len() as u16, 6 + records.len() as u16] {
            out.extend_from_slice(&v.to_be_bytes());
        }
        out.extend(records);
        out.extend(storage);
        out
    }

    fn post_table(&self) -> Vec<u8> {
        let names: Vec<Option<&str>> = self.glyphs.iter().map(|g| g.2.as_deref()).collect();
        post_v2(&names)
    }

    /// CFF FontSet with one font: charset format 0 naming every glyph with a
    /// custom string, no Private DICT
    fn cff_table(&self) -> Vec<u8> {
        let post_script = self.family.replace(' ', "") + "-Regular";
        let custom: Vec<String> = self
            .glyphs
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, g)| g.2.clone().unwrap_or_else(|| format!("glyph{i}")))
            .collect();
        let charstrings: Vec<Vec<u8>> = self.glyphs.iter().map(|g| encode_charstring(&g.0)).collect();

        let names = cff_index(&[post_script.as_bytes()]);
        let strings = cff_index(&custom.iter().map(|s| s.as_bytes()).collect::<Vec<_>>());
        let global_subrs = cff_index(&[]);
        // Top DICT: two 5-byte integers, each followed by a 1-byte operator
        let top_index_len = cff_index(&[&[0; 12]]).len();

        let charset_offset = 4 + names.len() + top_index_len + strings.len() + global_subrs.len();
        let mut charset = vec![0u8];
        for k in 0..custom.len() {
            charset.extend_from_slice(&(391 + k as u16).to_be_bytes());
        }
        let charstrings_offset = charset_offset + charset.len();

        let mut top = dict_int(charset_offset as i32);
        top.push(15);
        top.extend(dict_int(charstrings_offset as i32));
        top.push(17);

        let mut out = vec![1, 0, 4, 4];
        out.extend(names);
        out.extend(cff_index(&[&top]));
        out.extend(strings);
        out.extend(global_subrs);
        out.extend(charset);
        out.extend(cff_index(&charstrings.iter().map(Vec::as_slice).collect::<Vec<_>>()));
        out
    }

    fn glyf_and_loca(&self) -> (Vec<u8>, Vec<u8>) {
        let mut glyf = Vec::new();
        let mut loca = 0u32.to_be_bytes().to_vec();
        for (glyph, _, _) in &self.glyphs {
            glyf.extend(encode_glyph(glyph));
            while glyf.len() % 4 != 0 {
                glyf.push(0);
            }
            loca.extend_from_slice(&(glyf.len() as u32).to_be_bytes());
        }
        (glyf, loca)
    }
}

/// Version 2 post table; every name except `.notdef` is a custom name
pub fn post_v2(names: &[Option<&str>]) -> Vec<u8> {
    let mut out = 0x0002_0000u32.to_be_bytes().to_vec();
    out.extend_from_slice(&[0; 4]); // italicAngle
    out.extend_from_slice(&(-100i16).to_be_bytes());
    out.extend_from_slice(&50i16.to_be_bytes());
    out.extend_from_slice(&[0; 20]); // isFixedPitch, memory hints
    out.extend_from_slice(&(names.len() as u16).to_be_bytes());

    let mut custom = Vec::new();
    for name in names {
        let index = match name {
            Some(".notdef") | None => 0u16,
            Some(name) => {
                custom.push(name.to_string());
                257 + custom.len() as u16
            }
        };
        out.extend_from_slice(&index.to_be_bytes());
    }
    for name in custom {
        out.push(name.len() as u8);
        out.extend_from_slice(name.as_bytes());
    }
    out
}

/// CFF INDEX with 4-byte offsets
fn cff_index(items: &[&[u8]]) -> Vec<u8> {
    let mut out = (items.len() as u16).to_be_bytes().to_vec();
    if items.is_empty() {
        return out;
    }
    out.push(4);
    let mut offset = 1u32;
    out.extend_from_slice(&offset.to_be_bytes());
    for item in items {
        offset += item.len() as u32;
        out.extend_from_slice(&offset.to_be_bytes());
    }
    for item in items {
        out.extend_from_slice(item);
    }
    out
}

/// Fixed-width DICT integer so offsets can be computed up front
fn dict_int(value: i32) -> Vec<u8> {
    let mut out = vec![29];
    out.extend_from_slice(&value.to_be_bytes());
    out
}

fn charstring_int(out: &mut Vec<u8>, value: i32) {
    match value {
        -107..=107 => out.push((value + 139) as u8),
        108..=1131 => {
            let v = value - 108;
            out.extend_from_slice(&[(v / 256 + 247) as u8, (v % 256) as u8]);
        }
        -1131..=-108 => {
            let v = -value - 108;
            out.extend_from_slice(&[(v / 256 + 251) as u8, (v % 256) as u8]);
        }
        _ => {
            out.push(28);
            out.extend_from_slice(&(value as i16).to_be_bytes());
        }
    }
}

/// Type 2 charstring: rmoveto per contour, rlineto to on-curve points and
/// rrcurveto through each pair of off-curve points, then endchar
fn encode_charstring(glyph: &TestGlyph) -> Vec<u8> {
    let mut out = Vec::new();
    match glyph {
        TestGlyph::Raw(bytes) => return bytes.clone(),
        TestGlyph::Simple(contours) => {
            let mut pen = (0i32, 0i32);
            let mut delta = |out: &mut Vec<u8>, (x, y, _): (i16, i16, bool)| {
                let (x, y) = (i32::from(x), i32::from(y));
                charstring_int(out, x - pen.0);
                charstring_int(out, y - pen.1);
                pen = (x, y);
            };
            for contour in contours {
                let Some((&first, rest)) = contour.split_first() else {
                    continue;
                };
                delta(&mut out, first);
                out.push(21);
                let mut i = 0;
                while i < rest.len() {
                    if rest[i].2 {
                        delta(&mut out, rest[i]);
                        out.push(5);
                        i += 1;
                    } else {
                        for &point in &rest[i..(i + 3).min(rest.len())] {
                            delta(&mut out, point);
                        }
                        out.push(8);
                        i += 3;
                    }
                }
            }
        }
        TestGlyph::Empty | TestGlyph::Composite(_) => {}
    }
    out.push(14);
    out
}

fn encode_glyph(glyph: &TestGlyph) -> Vec<u8> {
    match glyph {
        TestGlyph::Empty => Vec::new(),
        TestGlyph::Raw(bytes) => bytes.clone(),
        TestGlyph::Simple(contours) => encode_simple(contours),
        TestGlyph::Composite(components) => encode_composite(components),
    }
}

fn encode_simple(contours: &[Vec<(i16, i16, bool)>]) -> Vec<u8> {
    let points: Vec<(i16, i16, bool)> = contours.iter().flatten().copied().collect();
    let x_min = points.iter().map(|p| p.0).min().unwrap_or(0);
    let y_min = points.iter().map(|p| p.1).min().unwrap_or(0);
    let x_max = points.iter().map(|p| p.0).max().unwrap_or(0);
    let y_max = points.iter().map(|p| p.1).max().unwrap_or(0);

    let mut out = Vec::new();
    for v in [contours.len() as i16, x_min, y_min, x_max, y_max] {
        out.extend_from_slice(&v.to_be_bytes());
    }
    let mut end = 0u16;
    for contour in contours {
        end += contour.len() as u16;
        out.extend_from_slice(&(end - 1).to_be_bytes());
    }
    out.extend_from_slice(&0u16.to_be_bytes()); // instructions

    // Long deltas only: flag bit 0 is the on-curve marker
    out.extend(points.iter().map(|p| u8::from(p.2)));
    let mut previous = 0i16;
    for p in &points {
        out.extend_from_slice(&(p.0 - previous).to_be_bytes());
        previous = p.0;
    }
    previous = 0;
    for p in &points {
        out.extend_from_slice(&(p.1 - previous).to_be_bytes());
        previous = p.1;
    }
    out
}

fn encode_composite(components: &[(u16, i16, i16, Option<f32>)]) -> Vec<u8> {
    let mut out = Vec::new();
    // Header bounds are left at zero
    for v in [-1i16, 0, 0, 0, 0] {
        out.extend_from_slice(&v.to_be_bytes());
    }
    for (i, &(glyph, dx, dy, scale)) in components.iter().enumerate() {
        let mut flags: u16 = 0x0001 | 0x0002; // word args, xy values
        if i + 1 < components.len() {
            flags |= 0x0020;
        }
        if scale.is_some() {
            flags |= 0x0008;
        }
        out.extend_from_slice(&flags.to_be_bytes());
        out.extend_from_slice(&glyph.to_be_bytes());
        out.extend_from_slice(&dx.to_be_bytes());
        out.extend_from_slice(&dy.to_be_bytes());
        if let Some(scale) = scale {
            out.extend_from_slice(&((scale * 16384.0).round() as i16).to_be_bytes());
        }
    }
    out
}

/// Square, triangle, composite, empty and a broken glyph
///
/// | index | glyph                         | char |
/// |-------|-------------------------------|------|
/// | 0     | .notdef (empty)               |      |
/// | 1     | square 100..700               | A    |
/// | 2     | triangle                      | B    |
/// | 3     | composite: square + triangle  | C    |
/// | 4     | space (empty)                 | ' '  |
/// | 5     | composite pointing at 99      | D    |
pub fn sample_font() -> FontBuilder {
    FontBuilder::new()
        .glyph(TestGlyph::Simple(vec![square_contour(100, 0, 600)]), 800, "square")
        .glyph(
            TestGlyph::Simple(vec![vec![(0, 0, true), (250, 500, true), (500, 0, true)]]),
            600,
            "triangle",
        )
        .glyph(
            TestGlyph::Composite(vec![(1, 0, 0, None), (2, 100, 700, Some(0.5))]),
            800,
            "combo",
        )
        .glyph(TestGlyph::Empty, 250, "space")
        .glyph(TestGlyph::Composite(vec![(99, 0, 0, None)]), 500, "dangling")
        .map('A', 1)
        .map('B', 2)
        .map('C', 3)
        .map(' ', 4)
        .map('D', 5)
}

/// CFF-flavored font
///
/// | index | glyph                              | char |
/// |-------|------------------------------------|------|
/// | 0     | .notdef (empty)                    |      |
/// | 1     | square 100..700                    | A    |
/// | 2     | bowl: one cubic plus closing line  | B    |
/// | 3     | broken charstring (callsubr)       | D    |
/// | 4     | space (empty)                      | ' '  |
pub fn cff_font() -> FontBuilder {
    FontBuilder::new()
        .cff()
        .glyph(TestGlyph::Simple(vec![square_contour(100, 0, 600)]), 800, "square")
        .glyph(
            TestGlyph::Simple(vec![vec![
                (100, 0, true),
                (100, 300, false),
                (500, 300, false),
                (500, 0, true),
            ]]),
            600,
            "bowl",
        )
        .glyph(TestGlyph::Raw(vec![139, 10, 14]), 500, "broken")
        .glyph(TestGlyph::Empty, 250, "space")
        .map('A', 1)
        .map('B', 2)
        .map('D', 3)
        .map(' ', 4)
}

/// Font with two glyphs only, used for atlas geometry checks
pub fn two_glyph_font() -> FontBuilder {
    FontBuilder::new().glyph(TestGlyph::Simple(vec![square_contour(100, 100, 500)]), 700, "box")
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
