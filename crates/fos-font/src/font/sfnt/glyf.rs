//! TrueType glyph data: loca offsets and glyf records

use crate::diagnostics::ParseOutcome;
use crate::font::reader::FontReader;
use crate::geometry::{Matrix2x3, Rect, Vec2};
use crate::model::{CompositeComponent, Outline, OutlinePoint};
use crate::{FontError, Result};

// Simple glyph flags
const ON_CURVE_POINT: u8 = 0x01;
const X_SHORT_VECTOR: u8 = 0x02;
const Y_SHORT_VECTOR: u8 = 0x04;
const REPEAT_FLAG: u8 = 0x08;
const X_IS_SAME_OR_POSITIVE: u8 = 0x10;
const Y_IS_SAME_OR_POSITIVE: u8 = 0x20;

// Composite glyph flags
pub const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
pub const ARGS_ARE_XY_VALUES: u16 = 0x0002;
pub const WE_HAVE_A_SCALE: u16 = 0x0008;
pub const MORE_COMPONENTS: u16 = 0x0020;
pub const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
pub const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;
pub const WE_HAVE_INSTRUCTIONS: u16 = 0x0100;
pub const SCALED_COMPONENT_OFFSET: u16 = 0x0800;

/// Decoded glyf entry
#[derive(Debug, Clone, PartialEq)]
pub enum GlyfRecord {
    /// No outline data (e.g. space)
    Empty,
    Simple { outlines: Vec<Outline>, bounds: Rect },
    Composite {
        components: Vec<CompositeComponent>,
        bounds: Rect,
    },
    /// Malformed entry; the glyph renders blank
    Invalid,
}

/// Parse `loca` into `num_glyphs + 1` byte offsets
pub fn parse_loca(data: &[u8], num_glyphs: u16, index_to_loc_format: i16) -> Result<Vec<u32>> {
    let mut r = FontReader::new(data);
    let count = num_glyphs as usize + 1;
    let mut offsets = Vec::with_capacity(count);
    for _ in 0..count {
        let offset = if index_to_loc_format == 0 {
            r.read_u16()? as u32 * 2
        } else {
            r.read_u32()?
        };
        offsets.push(offset);
    }
    Ok(offsets)
}

/// Decode glyph `index` from `glyf` using `loca` offsets
///
/// Never fails: malformed entries produce [`GlyfRecord::Invalid`] and an
/// error message, empty entries produce [`GlyfRecord::Empty`] and a warning.
pub fn parse_glyph(glyf: &[u8], loca: &[u32], index: usize) -> ParseOutcome<GlyfRecord> {
    let mut outcome = ParseOutcome::clean(GlyfRecord::Invalid);
    let (Some(&start), Some(&end), Some(&table_end)) =
        (loca.get(index), loca.get(index + 1), loca.last())
    else {
        outcome.error(format!("glyph {index}: no loca entry"));
        return outcome;
    };

    if start == end {
        outcome.value = GlyfRecord::Empty;
        outcome.warn(format!("glyph {index}: empty outline"));
        return outcome;
    }
    if start == table_end {
        outcome.error(format!("glyph {index}: offset {start} points at end of glyf"));
        return outcome;
    }
    if start > end || end as usize > glyf.len() {
        outcome.error(format!(
            "glyph {index}: range {start}..{end} outside glyf ({} bytes)",
            glyf.len()
        ));
        return outcome;
    }

    let data = &glyf[start as usize..end as usize];
    match parse_record(data) {
        Ok(record) => outcome.value = record,
        Err(e) => outcome.error(format!("glyph {index}: {e}")),
    }
    outcome
}

fn parse_record(data: &[u8]) -> Result<GlyfRecord> {
    let mut r = FontReader::new(data);
    let number_of_contours = r.read_i16()?;
    let bounds = Rect::new(
        r.read_i16()? as f64,
        r.read_i16()? as f64,
        r.read_i16()? as f64,
        r.read_i16()? as f64,
    );

    if number_of_contours >= 0 {
        let outlines = parse_simple(&mut r, number_of_contours as usize)?;
        Ok(GlyfRecord::Simple { outlines, bounds })
    } else {
        let components = parse_composite(&mut r)?;
        Ok(GlyfRecord::Composite { components, bounds })
    }
}

fn parse_simple(r: &mut FontReader, num_contours: usize) -> Result<Vec<Outline>> {
    let mut end_points = Vec::with_capacity(num_contours);
    for _ in 0..num_contours {
        let end = r.read_u16()? as usize;
        if end_points.last().is_some_and(|&prev| end <= prev) {
            return Err(FontError::invalid("glyf", "endPtsOfContours not increasing"));
        }
        end_points.push(end);
    }
    let num_points = match end_points.last() {
        Some(&last) => last + 1,
        None => return Ok(Vec::new()),
    };

    let instruction_length = r.read_u16()? as usize;
    r.skip(instruction_length)?;

    let mut flags = Vec::with_capacity(num_points);
    while flags.len() < num_points {
        let flag = r.read_u8()?;
        flags.push(flag);
        if flag & REPEAT_FLAG != 0 {
            let repeat = r.read_u8()?;
            for _ in 0..repeat {
                flags.push(flag);
            }
        }
    }
    flags.truncate(num_points);

    let xs = read_coordinates(r, &flags, X_SHORT_VECTOR, X_IS_SAME_OR_POSITIVE)?;
    let ys = read_coordinates(r, &flags, Y_SHORT_VECTOR, Y_IS_SAME_OR_POSITIVE)?;

    let mut outlines = Vec::with_capacity(num_contours);
    let mut first = 0;
    for end in end_points {
        let points = (first..=end)
            .map(|i| OutlinePoint::new(xs[i] as f64, ys[i] as f64, flags[i] & ON_CURVE_POINT == 0))
            .collect();
        outlines.push(Outline::new(points));
        first = end + 1;
    }
    Ok(outlines)
}

fn read_coordinates(
    r: &mut FontReader,
    flags: &[u8],
    short_flag: u8,
    same_or_positive: u8,
) -> Result<Vec<i32>> {
    let mut coords = Vec::with_capacity(flags.len());
    let mut value = 0i32;
    for &flag in flags {
        if flag & short_flag != 0 {
            let delta = r.read_u8()? as i32;
            value += if flag & same_or_positive != 0 { delta } else { -delta };
        } else if flag & same_or_positive == 0 {
            value += r.read_i16()? as i32;
        }
        coords.push(value);
    }
    Ok(coords)
}

fn parse_composite(r: &mut FontReader) -> Result<Vec<CompositeComponent>> {
    let mut components = Vec::new();
    loop {
        let flags = r.read_u16()?;
        let glyph_index = r.read_u16()? as u32;

        if flags & ARGS_ARE_XY_VALUES == 0 {
            return Err(FontError::invalid(
                "glyf",
                format!("component {glyph_index} uses matched-point arguments"),
            ));
        }

        let (dx, dy) = if flags & ARG_1_AND_2_ARE_WORDS != 0 {
            (r.read_i16()? as f64, r.read_i16()? as f64)
        } else {
            (r.read_i8()? as f64, r.read_i8()? as f64)
        };

        let mut transform = Matrix2x3::IDENTITY;
        if flags & WE_HAVE_A_SCALE != 0 {
            let scale = r.read_f2dot14()?;
            transform.m11 = scale;
            transform.m22 = scale;
        } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            transform.m11 = r.read_f2dot14()?;
            transform.m22 = r.read_f2dot14()?;
        } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
            transform.m11 = r.read_f2dot14()?;
            transform.m12 = r.read_f2dot14()?;
            transform.m21 = r.read_f2dot14()?;
            transform.m22 = r.read_f2dot14()?;
        }

        let offset = Vec2::new(dx, dy);
        let offset = if flags & SCALED_COMPONENT_OFFSET != 0 {
            transform.transform_vector(offset)
        } else {
            offset
        };
        transform.m31 = offset.x;
        transform.m32 = offset.y;

        components.push(CompositeComponent {
            glyph_index,
            transform,
            flags,
        });

        if flags & MORE_COMPONENTS == 0 {
            break;
        }
    }
    Ok(components)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn be16(values: &[i16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_be_bytes()).collect()
    }

    /// Triangle: (0,0) (100,0) (50,80), all long coordinates
    fn triangle() -> Vec<u8> {
        let mut data = be16(&[1, 0, 0, 100, 80, 2, 0]);
        data.extend_from_slice(&[ON_CURVE_POINT; 3]);
        data.extend(be16(&[0, 100, -50]));
        data.extend(be16(&[0, 0, 80]));
        data
    }

    #[test]
    fn test_loca_formats() {
        let short = [0x00, 0x00, 0x00, 0x0A, 0x00, 0x0A];
        assert_eq!(parse_loca(&short, 2, 0).unwrap(), vec![0, 20, 20]);

        let long = [0, 0, 0, 0, 0, 0, 0, 20];
        assert_eq!(parse_loca(&long, 1, 1).unwrap(), vec![0, 20]);
        assert!(parse_loca(&long, 2, 1).is_err());
    }

    #[test]
    fn test_simple_glyph() {
        let glyf = triangle();
        let loca = [0, glyf.len() as u32];
        let outcome = parse_glyph(&glyf, &loca, 0);
        assert!(outcome.messages.is_empty());

        let GlyfRecord::Simple { outlines, bounds } = outcome.value else {
            panic!("expected simple glyph");
        };
        assert_eq!(bounds, Rect::new(0.0, 0.0, 100.0, 80.0));
        assert_eq!(outlines.len(), 1);
        let points = &outlines[0].points;
        assert_eq!(points.len(), 3);
        assert_eq!((points[2].x, points[2].y), (50.0, 80.0));
        assert!(points.iter().all(|p| !p.is_control));
    }

    #[test]
    fn test_short_and_repeated_flags() {
        // Four points, flags: on+short+positive x/y repeated 3 times, then off-curve same
        let mut data = be16(&[1, 0, 0, 10, 10, 3, 0]);
        let flag = ON_CURVE_POINT | X_SHORT_VECTOR | Y_SHORT_VECTOR | X_IS_SAME_OR_POSITIVE;
        data.extend_from_slice(&[flag | REPEAT_FLAG, 2, X_IS_SAME_OR_POSITIVE | Y_IS_SAME_OR_POSITIVE]);
        data.extend_from_slice(&[5, 3, 2]); // x deltas
        data.extend_from_slice(&[1, 1, 1]); // y deltas (negative)
        let loca = [0, data.len() as u32];

        let GlyfRecord::Simple { outlines, .. } = parse_glyph(&data, &loca, 0).value else {
            panic!("expected simple glyph");
        };
        let xs: Vec<f64> = outlines[0].points.iter().map(|p| p.x).collect();
        let ys: Vec<f64> = outlines[0].points.iter().map(|p| p.y).collect();
        assert_eq!(xs, vec![5.0, 8.0, 10.0, 10.0]);
        assert_eq!(ys, vec![-1.0, -2.0, -3.0, -3.0]);
        assert!(outlines[0].points[3].is_control);
    }

    #[test]
    fn test_empty_and_invalid_offsets() {
        let glyf = triangle();
        let len = glyf.len() as u32;

        let outcome = parse_glyph(&glyf, &[0, 0, len], 0);
        assert_eq!(outcome.value, GlyfRecord::Empty);
        assert!(!outcome.has_errors());
        assert_eq!(outcome.messages.len(), 1);

        // Entry pointing at the end of the table
        let outcome = parse_glyph(&glyf, &[0, len, len + 4, len], 1);
        assert_eq!(outcome.value, GlyfRecord::Invalid);
        assert!(outcome.has_errors());

        // Entry beyond the table
        let outcome = parse_glyph(&glyf, &[0, len + 100, len + 200], 0);
        assert_eq!(outcome.value, GlyfRecord::Invalid);
        assert!(outcome.has_errors());
    }

    #[test]
    fn test_composite_transform() {
        let mut data = be16(&[-1, 0, 0, 0, 0]);
        let flags = ARG_1_AND_2_ARE_WORDS | ARGS_ARE_XY_VALUES | WE_HAVE_A_TWO_BY_TWO;
        data.extend(be16(&[flags as i16, 3, 10, -20]));
        // 2x2: [0.5, 0.25, -0.25, 1.0] in F2Dot14
        data.extend(be16(&[0x2000, 0x1000, -0x1000, 0x4000]));
        let loca = [0, data.len() as u32];

        let GlyfRecord::Composite { components, .. } = parse_glyph(&data, &loca, 0).value else {
            panic!("expected composite glyph");
        };
        assert_eq!(components.len(), 1);
        let c = &components[0];
        assert_eq!(c.glyph_index, 3);
        assert_eq!(c.transform.m11, 0.5);
        assert_eq!(c.transform.m12, 0.25);
        assert_eq!(c.transform.m21, -0.25);
        assert_eq!(c.transform.m22, 1.0);
        assert_eq!((c.transform.m31, c.transform.m32), (10.0, -20.0));
    }

    #[test]
    fn test_scaled_component_offset() {
        let mut data = be16(&[-1, 0, 0, 0, 0]);
        let flags = ARGS_ARE_XY_VALUES | WE_HAVE_A_SCALE | SCALED_COMPONENT_OFFSET;
        data.extend(be16(&[flags as i16, 1]));
        data.extend_from_slice(&[10, 4]);
        data.extend(be16(&[0x2000]));
        let loca = [0, data.len() as u32];

        let GlyfRecord::Composite { components, .. } = parse_glyph(&data, &loca, 0).value else {
            panic!("expected composite glyph");
        };
        assert_eq!((components[0].transform.m31, components[0].transform.m32), (5.0, 2.0));
    }

    #[test]
    fn test_matched_points_invalid() {
        let mut data = be16(&[-1, 0, 0, 0, 0]);
        data.extend(be16(&[0, 1]));
        data.extend_from_slice(&[0, 1]);
        let loca = [0, data.len() as u32];

        let outcome = parse_glyph(&data, &loca, 0);
        assert_eq!(outcome.value, GlyfRecord::Invalid);
        assert!(outcome.has_errors());
    }
}
