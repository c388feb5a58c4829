//! WOFF and WOFF2 containers built around the plain TrueType fixture
//!
//! Every container must load to the same model as the sfnt it wraps.

mod common;

use std::io::Write;

use common::sample_font;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use fos_font::font::sfnt::writer::{calculate_checksum, SfntTable};
use fos_font::{Font, FontError, FontFormat, TypeFace};

// ============================================================================
// ENCODERS
// ============================================================================

fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn brotli_compress(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut writer = brotli::CompressorWriter::new(&mut out, 4096, 9, 22);
        writer.write_all(data).unwrap();
    }
    out
}

fn pad4(out: &mut Vec<u8>) {
    while out.len() % 4 != 0 {
        out.push(0);
    }
}

/// WOFF 1.0 with every table zlib-compressed when that saves space
fn woff(tables: &[SfntTable]) -> Vec<u8> {
    let stored: Vec<Vec<u8>> = tables
        .iter()
        .map(|t| {
            let compressed = zlib(&t.data);
            if compressed.len() < t.data.len() { compressed } else { t.data.clone() }
        })
        .collect();

    let mut directory = Vec::new();
    let mut body = Vec::new();
    let body_start = 44 + 20 * tables.len();
    for (table, stored) in tables.iter().zip(&stored) {
        directory.extend_from_slice(&table.tag);
        directory.extend_from_slice(&((body_start + body.len()) as u32).to_be_bytes());
        directory.extend_from_slice(&(stored.len() as u32).to_be_bytes());
        directory.extend_from_slice(&(table.data.len() as u32).to_be_bytes());
        directory.extend_from_slice(&calculate_checksum(&table.data).to_be_bytes());
        body.extend_from_slice(stored);
        pad4(&mut body);
    }

    let total_sfnt: usize = 12 + 16 * tables.len() + tables.iter().map(|t| t.data.len().div_ceil(4) * 4).sum::<usize>();
    let mut out = Vec::new();
    out.extend_from_slice(b"wOFF");
    out.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    out.extend_from_slice(&((body_start + body.len()) as u32).to_be_bytes());
    out.extend_from_slice(&(tables.len() as u16).to_be_bytes());
    out.extend_from_slice(&[0; 2]);
    out.extend_from_slice(&(total_sfnt as u32).to_be_bytes());
    out.extend_from_slice(&[0, 1, 0, 0]);
    out.extend_from_slice(&[0; 20]);
    out.extend(directory);
    out.extend(body);
    out
}

fn base128(mut value: u32) -> Vec<u8> {
    let mut bytes = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        bytes.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
    bytes.reverse();
    bytes
}

const WOFF2_TAGS: [&[u8; 4]; 12] = [
    b"cmap", b"head", b"hhea", b"hmtx", b"maxp", b"name", b"OS/2", b"post", b"cvt ", b"fpgm", b"glyf", b"loca",
];

/// WOFF2 with all tables untransformed (glyf/loca use transform version 3)
fn woff2(tables: &[SfntTable]) -> Vec<u8> {
    woff2_with(tables, brotli_compress)
}

fn woff2_with(tables: &[SfntTable], compress: impl Fn(&[u8]) -> Vec<u8>) -> Vec<u8> {
    let mut directory = Vec::new();
    let mut stream = Vec::new();
    for table in tables {
        let index = WOFF2_TAGS.iter().position(|tag| **tag == table.tag);
        let version = if &table.tag == b"glyf" || &table.tag == b"loca" { 0xC0 } else { 0 };
        match index {
            Some(index) => directory.push(index as u8 | version),
            None => {
                directory.push(0x3F | version);
                directory.extend_from_slice(&table.tag);
            }
        }
        directory.extend(base128(table.data.len() as u32));
        stream.extend_from_slice(&table.data);
    }
    let compressed = compress(&stream);

    let mut out = Vec::new();
    out.extend_from_slice(b"wOF2");
    out.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    out.extend_from_slice(&((48 + directory.len() + compressed.len()) as u32).to_be_bytes());
    out.extend_from_slice(&(tables.len() as u16).to_be_bytes());
    out.extend_from_slice(&[0; 2]);
    out.extend_from_slice(&0u32.to_be_bytes());
    out.extend_from_slice(&(compressed.len() as u32).to_be_bytes());
    out.extend_from_slice(&[0, 1, 0, 0]);
    out.extend_from_slice(&[0; 20]);
    out.extend(directory);
    out.extend(compressed);
    out
}

// ============================================================================
// HELPERS
// ============================================================================

fn summary(font: &Font) -> Vec<(u32, Option<String>, u16, Vec<(f64, f64)>)> {
    (0..font.glyph_count() as u32)
        .filter_map(|i| font.glyph_by_index(i))
        .map(|g| {
            let points = g.outlines.iter().flat_map(|o| o.points.iter().map(|p| (p.x, p.y))).collect();
            (g.index, g.name.clone(), g.advance_width, points)
        })
        .collect()
}

fn assert_same_model(container: &TypeFace, reference: &TypeFace) {
    assert_eq!(container.fonts().len(), 1);
    let (a, b) = (container.font(0).unwrap(), reference.font(0).unwrap());
    assert_eq!(a.family_name(), b.family_name());
    assert_eq!(a.units_per_em(), b.units_per_em());
    assert_eq!(a.unicode_map(), b.unicode_map());
    assert_eq!(summary(a), summary(b));
}

// ============================================================================
// WOFF
// ============================================================================

#[test]
fn test_woff_matches_sfnt() {
    common::init_tracing();
    let builder = sample_font();
    let reference = TypeFace::load(&builder.build(), None).unwrap();
    let typeface = TypeFace::load(&woff(&builder.tables()), None).unwrap();

    assert_eq!(typeface.format(), FontFormat::Woff);
    assert_same_model(&typeface, &reference);
}

#[test]
fn test_woff_corrupt_table() {
    let mut data = woff(&sample_font().tables());
    let num_tables = u16::from_be_bytes([data[12], data[13]]) as usize;
    let field = |data: &[u8], at: usize| u32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]) as usize;

    // Zero out the body of the first compressed table
    let entry = (0..num_tables)
        .map(|i| 44 + i * 20)
        .find(|&at| field(&data, at + 8) < field(&data, at + 12))
        .expect("fixture has a compressed table");
    let (offset, length) = (field(&data, entry + 4), field(&data, entry + 8));
    data[offset..offset + length].fill(0);

    let typeface = TypeFace::load(&data, None).unwrap();
    assert!(typeface.fonts().is_empty());
    assert!(typeface.errors().any(|m| m.text.starts_with("WOFF table")));
}

#[test]
fn test_woff_truncated_directory() {
    let data = woff(&sample_font().tables());
    assert!(matches!(TypeFace::load(&data[..60], None), Err(FontError::TruncatedStream { .. })));
}

// ============================================================================
// WOFF2
// ============================================================================

#[test]
fn test_woff2_matches_sfnt() {
    common::init_tracing();
    let builder = sample_font();
    let reference = TypeFace::load(&builder.build(), None).unwrap();
    let typeface = TypeFace::load(&woff2(&builder.tables()), None).unwrap();

    assert_eq!(typeface.format(), FontFormat::Woff2);
    assert!(!typeface.errors().any(|m| m.text.contains("WOFF2")));
    assert_same_model(&typeface, &reference);
}

#[test]
fn test_woff2_arbitrary_tag() {
    let builder = sample_font().table(b"Zzzz", vec![1, 2, 3, 4, 5]);
    let typeface = TypeFace::load(&woff2(&builder.tables()), None).unwrap();
    assert_eq!(typeface.font(0).unwrap().glyph_count(), builder.glyph_count());
}

#[test]
fn test_woff2_corrupt_stream_is_logged() {
    common::init_tracing();
    // Only the first half of the Brotli stream
    let data = woff2_with(&sample_font().tables(), |stream| {
        let compressed = brotli_compress(stream);
        compressed[..compressed.len() / 2].to_vec()
    });

    let typeface = TypeFace::load(&data, None).unwrap();
    assert!(typeface.fonts().is_empty());
    assert!(typeface.has_errors());
    assert!(typeface.errors().any(|m| m.text.starts_with("WOFF2 decode failed")));
}

#[test]
fn test_woff2_bad_signature_by_extension() {
    let mut data = woff2(&sample_font().tables());
    data[0..4].copy_from_slice(b"abcd");
    assert!(matches!(TypeFace::load(&data, Some("woff2")), Err(FontError::UnsupportedFontFormat)));
}
