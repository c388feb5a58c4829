//! WOFF2 table transforms
//!
//! - glyf: split into seven streams with triplet-encoded point deltas; rebuilt
//!   into standard `glyf` bytes plus the matching `loca`
//! - hmtx: left side bearings that equal the glyph's xMin are dropped
//! - loca: carries no data; regenerated from the rebuilt `glyf` offsets

use crate::font::reader::FontReader;
use crate::font::sfnt::glyf::{
    ARG_1_AND_2_ARE_WORDS, MORE_COMPONENTS, WE_HAVE_AN_X_AND_Y_SCALE, WE_HAVE_A_SCALE,
    WE_HAVE_A_TWO_BY_TWO, WE_HAVE_INSTRUCTIONS,
};
use crate::{FontError, Result};

// Simple glyph flags of the rebuilt `glyf`
const ON_CURVE_POINT: u8 = 0x01;
const X_SHORT_VECTOR: u8 = 0x02;
const Y_SHORT_VECTOR: u8 = 0x04;
const REPEAT_FLAG: u8 = 0x08;
const X_IS_SAME_OR_POSITIVE: u8 = 0x10;
const Y_IS_SAME_OR_POSITIVE: u8 = 0x20;
const OVERLAP_SIMPLE: u8 = 0x40;

/// optionFlags bit: an overlapSimple bitmap follows the streams
const OPTION_OVERLAP_SIMPLE_BITMAP: u16 = 0x0001;

fn transform_error(reason: impl Into<String>) -> FontError {
    FontError::invalid("glyf", reason)
}

/// `glyf` and `loca` rebuilt from the transformed stream
#[derive(Debug)]
pub struct RebuiltGlyf {
    pub glyf: Vec<u8>,
    pub loca: Vec<u8>,
    /// Offset of each glyph plus the end offset
    pub offsets: Vec<u32>,
    /// Per-glyph xMin, used for the `hmtx` side bearings
    pub x_mins: Vec<i16>,
    pub num_glyphs: u16,
}

/// Decoded point in absolute coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Point {
    x: i32,
    y: i32,
    on_curve: bool,
}

/// The seven glyph streams plus the optional overlap bitmap
struct GlyfStreams<'a> {
    n_contours: FontReader<'a>,
    n_points: FontReader<'a>,
    flags: FontReader<'a>,
    glyphs: FontReader<'a>,
    composites: FontReader<'a>,
    bbox_bitmap: &'a [u8],
    bboxes: FontReader<'a>,
    instructions: FontReader<'a>,
    overlap_bitmap: Option<&'a [u8]>,
}

/// Test a bit of an MSB-first glyph bitmap
fn bitmap_bit(bitmap: &[u8], index: usize) -> bool {
    bitmap
        .get(index >> 3)
        .is_some_and(|byte| byte & (0x80 >> (index & 7)) != 0)
}

/// Rebuild `glyf` and `loca` from a transformed `glyf` table
pub fn reconstruct_glyf(data: &[u8]) -> Result<RebuiltGlyf> {
    let mut r = FontReader::new(data);
    let _reserved = r.read_u16()?;
    let option_flags = r.read_u16()?;
    let num_glyphs = r.read_u16()?;
    let index_format = r.read_u16()?;

    let mut sizes = [0usize; 7];
    for size in &mut sizes {
        *size = r.read_u32()? as usize;
    }
    let [n_contour_size, n_points_size, flag_size, glyph_size, composite_size, bbox_size, instruction_size] =
        sizes;

    let n_contours = r.read_bytes(n_contour_size)?;
    let n_points = r.read_bytes(n_points_size)?;
    let flags = r.read_bytes(flag_size)?;
    let glyphs = r.read_bytes(glyph_size)?;
    let composites = r.read_bytes(composite_size)?;
    let bbox = r.read_bytes(bbox_size)?;
    let instructions = r.read_bytes(instruction_size)?;
    let overlap_bitmap = if option_flags & OPTION_OVERLAP_SIMPLE_BITMAP != 0 {
        Some(r.read_bytes((num_glyphs as usize).div_ceil(8))?)
    } else {
        None
    };

    let bitmap_len = 4 * ((num_glyphs as usize + 31) / 32);
    if bbox.len() < bitmap_len {
        return Err(transform_error(format!(
            "bbox stream of {} bytes is shorter than its {bitmap_len}-byte bitmap",
            bbox.len()
        )));
    }
    let (bbox_bitmap, bboxes) = bbox.split_at(bitmap_len);

    let mut streams = GlyfStreams {
        n_contours: FontReader::new(n_contours),
        n_points: FontReader::new(n_points),
        flags: FontReader::new(flags),
        glyphs: FontReader::new(glyphs),
        composites: FontReader::new(composites),
        bbox_bitmap,
        bboxes: FontReader::new(bboxes),
        instructions: FontReader::new(instructions),
        overlap_bitmap,
    };

    let mut glyf = Vec::new();
    let mut offsets = Vec::with_capacity(num_glyphs as usize + 1);
    let mut x_mins = Vec::with_capacity(num_glyphs as usize);
    for index in 0..num_glyphs as usize {
        offsets.push(glyf.len() as u32);
        let x_min = streams.write_glyph(index, &mut glyf)?;
        x_mins.push(x_min);
        glyf.resize((glyf.len() + 3) & !3, 0);
    }
    offsets.push(glyf.len() as u32);

    let use_short = index_format == 0;
    if use_short && !can_use_short_loca(&offsets) {
        return Err(transform_error(format!(
            "glyf of {} bytes does not fit a short loca",
            glyf.len()
        )));
    }
    let loca = generate_loca(&offsets, use_short);

    tracing::debug!(
        "Rebuilt WOFF2 glyf: {num_glyphs} glyphs, {} bytes, {} loca",
        glyf.len(),
        if use_short { "short" } else { "long" }
    );
    Ok(RebuiltGlyf {
        glyf,
        loca,
        offsets,
        x_mins,
        num_glyphs,
    })
}

impl GlyfStreams<'_> {
    /// Append one glyph in standard form; returns its xMin
    fn write_glyph(&mut self, index: usize, out: &mut Vec<u8>) -> Result<i16> {
        let n_contours = self.n_contours.read_i16()?;
        let has_bbox = bitmap_bit(self.bbox_bitmap, index);
        match n_contours {
            0 => {
                if has_bbox {
                    return Err(transform_error(format!("empty glyph {index} has an explicit bbox")));
                }
                Ok(0)
            }
            -1 => {
                if !has_bbox {
                    return Err(transform_error(format!("composite glyph {index} has no explicit bbox")));
                }
                self.write_composite(out)
            }
            n if n > 0 => self.write_simple(index, n as u16, has_bbox, out),
            n => Err(transform_error(format!("glyph {index} has contour count {n}"))),
        }
    }

    fn write_simple(&mut self, index: usize, n_contours: u16, has_bbox: bool, out: &mut Vec<u8>) -> Result<i16> {
        let mut end_points = Vec::with_capacity(n_contours as usize);
        let mut total: u32 = 0;
        for _ in 0..n_contours {
            total += self.n_points.read_255_uint16()? as u32;
            let end = total
                .checked_sub(1)
                .and_then(|end| u16::try_from(end).ok())
                .ok_or_else(|| transform_error(format!("glyph {index} has an invalid point count")))?;
            end_points.push(end);
        }

        let mut points = Vec::with_capacity(total as usize);
        let (mut x, mut y) = (0i32, 0i32);
        for _ in 0..total {
            let flag = self.flags.read_u8()?;
            let (dx, dy) = decode_triplet(flag, &mut self.glyphs)?;
            x += dx;
            y += dy;
            points.push(Point {
                x,
                y,
                on_curve: flag & 0x80 == 0,
            });
        }

        let instruction_len = self.glyphs.read_255_uint16()?;
        let instructions = self.instructions.read_bytes(instruction_len as usize)?;

        let bbox = if has_bbox {
            self.read_bbox()?
        } else {
            compute_bbox(&points)
        };

        out.extend_from_slice(&(n_contours as i16).to_be_bytes());
        for value in bbox {
            out.extend_from_slice(&value.to_be_bytes());
        }
        for end in &end_points {
            out.extend_from_slice(&end.to_be_bytes());
        }
        out.extend_from_slice(&instruction_len.to_be_bytes());
        out.extend_from_slice(instructions);

        let overlap = self
            .overlap_bitmap
            .is_some_and(|bitmap| bitmap_bit(bitmap, index));
        encode_points(&points, overlap, out)?;
        Ok(bbox[0])
    }

    fn write_composite(&mut self, out: &mut Vec<u8>) -> Result<i16> {
        let start = self.composites.pos();
        let mut have_instructions = false;
        loop {
            let flags = self.composites.read_u16()?;
            let _glyph_index = self.composites.read_u16()?;
            let mut arg_size = if flags & ARG_1_AND_2_ARE_WORDS != 0 { 4 } else { 2 };
            if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
                arg_size += 8;
            } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
                arg_size += 4;
            } else if flags & WE_HAVE_A_SCALE != 0 {
                arg_size += 2;
            }
            self.composites.skip(arg_size)?;
            have_instructions |= flags & WE_HAVE_INSTRUCTIONS != 0;
            if flags & MORE_COMPONENTS == 0 {
                break;
            }
        }
        let components = self
            .composites
            .slice(start, self.composites.pos() - start)?;

        let bbox = self.read_bbox()?;
        out.extend_from_slice(&(-1i16).to_be_bytes());
        for value in bbox {
            out.extend_from_slice(&value.to_be_bytes());
        }
        out.extend_from_slice(components);

        if have_instructions {
            let instruction_len = self.glyphs.read_255_uint16()?;
            let instructions = self.instructions.read_bytes(instruction_len as usize)?;
            out.extend_from_slice(&instruction_len.to_be_bytes());
            out.extend_from_slice(instructions);
        }
        Ok(bbox[0])
    }

    fn read_bbox(&mut self) -> Result<[i16; 4]> {
        Ok([
            self.bboxes.read_i16()?,
            self.bboxes.read_i16()?,
            self.bboxes.read_i16()?,
            self.bboxes.read_i16()?,
        ])
    }
}

fn compute_bbox(points: &[Point]) -> [i16; 4] {
    let Some(first) = points.first() else {
        return [0; 4];
    };
    let mut bbox = [first.x, first.y, first.x, first.y];
    for p in &points[1..] {
        bbox[0] = bbox[0].min(p.x);
        bbox[1] = bbox[1].min(p.y);
        bbox[2] = bbox[2].max(p.x);
        bbox[3] = bbox[3].max(p.y);
    }
    bbox.map(|v| v as i16)
}

// ============================================================================
// Triplet encoding
// ============================================================================

fn with_sign(flag: i32, value: i32) -> i32 {
    if flag & 1 != 0 { value } else { -value }
}

/// Decode one point delta; data bytes come from the glyph stream
fn decode_triplet(flag: u8, r: &mut FontReader) -> Result<(i32, i32)> {
    let flag = (flag & 0x7F) as i32;
    let mut byte = || -> Result<i32> { Ok(r.read_u8()? as i32) };

    let delta = if flag < 10 {
        (0, with_sign(flag, ((flag & 14) << 7) + byte()?))
    } else if flag < 20 {
        (with_sign(flag, (((flag - 10) & 14) << 7) + byte()?), 0)
    } else if flag < 84 {
        let b0 = flag - 20;
        let b1 = byte()?;
        (
            with_sign(flag, 1 + (b0 & 0x30) + (b1 >> 4)),
            with_sign(flag >> 1, 1 + ((b0 & 0x0C) << 2) + (b1 & 0x0F)),
        )
    } else if flag < 120 {
        let b0 = flag - 84;
        let (in0, in1) = (byte()?, byte()?);
        (
            with_sign(flag, 1 + ((b0 / 12) << 8) + in0),
            with_sign(flag >> 1, 1 + (((b0 % 12) >> 2) << 8) + in1),
        )
    } else if flag < 124 {
        let (in0, in1, in2) = (byte()?, byte()?, byte()?);
        (
            with_sign(flag, (in0 << 4) + (in1 >> 4)),
            with_sign(flag >> 1, ((in1 & 0x0F) << 8) + in2),
        )
    } else {
        let (in0, in1, in2, in3) = (byte()?, byte()?, byte()?, byte()?);
        (
            with_sign(flag, (in0 << 8) + in1),
            with_sign(flag >> 1, (in2 << 8) + in3),
        )
    };
    Ok(delta)
}

/// Write flags (run-length encoded), then x and y deltas
fn encode_points(points: &[Point], overlap: bool, out: &mut Vec<u8>) -> Result<()> {
    let mut flags = Vec::with_capacity(points.len());
    let mut xs = Vec::with_capacity(points.len() * 2);
    let mut ys = Vec::with_capacity(points.len() * 2);

    let mut last_flag = None;
    let mut repeat: u8 = 0;
    let (mut last_x, mut last_y) = (0i32, 0i32);
    for (i, point) in points.iter().enumerate() {
        let mut flag = if point.on_curve { ON_CURVE_POINT } else { 0 };
        if overlap && i == 0 {
            flag |= OVERLAP_SIMPLE;
        }
        flag |= encode_delta(point.x - last_x, X_SHORT_VECTOR, X_IS_SAME_OR_POSITIVE, &mut xs)?;
        flag |= encode_delta(point.y - last_y, Y_SHORT_VECTOR, Y_IS_SAME_OR_POSITIVE, &mut ys)?;
        last_x = point.x;
        last_y = point.y;

        if last_flag == Some(flag) && repeat != u8::MAX {
            if let Some(previous) = flags.last_mut() {
                *previous |= REPEAT_FLAG;
            }
            repeat += 1;
        } else {
            if repeat != 0 {
                flags.push(repeat);
            }
            flags.push(flag);
            repeat = 0;
        }
        last_flag = Some(flag);
    }
    if repeat != 0 {
        flags.push(repeat);
    }

    out.extend_from_slice(&flags);
    out.extend_from_slice(&xs);
    out.extend_from_slice(&ys);
    Ok(())
}

/// Encode one coordinate delta, returning its flag bits
fn encode_delta(delta: i32, short: u8, same_or_positive: u8, out: &mut Vec<u8>) -> Result<u8> {
    if delta == 0 {
        return Ok(same_or_positive);
    }
    if delta.abs() < 256 {
        out.push(delta.unsigned_abs() as u8);
        return Ok(if delta > 0 { short | same_or_positive } else { short });
    }
    let word = i16::try_from(delta)
        .map_err(|_| transform_error(format!("coordinate delta {delta} out of range")))?;
    out.extend_from_slice(&word.to_be_bytes());
    Ok(0)
}

// ============================================================================
// loca
// ============================================================================

/// Serialize glyph offsets as a short (offset / 2) or long loca
pub fn generate_loca(offsets: &[u32], use_short: bool) -> Vec<u8> {
    let mut output = Vec::with_capacity(offsets.len() * if use_short { 2 } else { 4 });
    for &offset in offsets {
        if use_short {
            output.extend_from_slice(&((offset / 2) as u16).to_be_bytes());
        } else {
            output.extend_from_slice(&offset.to_be_bytes());
        }
    }
    output
}

/// Whether every offset is even and fits a short loca
pub fn can_use_short_loca(offsets: &[u32]) -> bool {
    offsets.iter().all(|&o| o <= 0x1FFFE && o % 2 == 0)
}

// ============================================================================
// hmtx
// ============================================================================

/// flags bit: proportional LSBs omitted
const HMTX_NO_PROPORTIONAL_LSBS: u8 = 0x01;
/// flags bit: monospaced LSBs omitted
const HMTX_NO_MONOSPACED_LSBS: u8 = 0x02;

/// Rebuild `hmtx`; omitted side bearings are the glyph xMin values
pub fn reconstruct_hmtx(data: &[u8], num_glyphs: u16, num_h_metrics: u16, x_mins: &[i16]) -> Result<Vec<u8>> {
    let mut r = FontReader::new(data);
    let flags = r.read_u8()?;
    if flags & !(HMTX_NO_PROPORTIONAL_LSBS | HMTX_NO_MONOSPACED_LSBS) != 0 {
        return Err(FontError::invalid("hmtx", format!("reserved transform flags {flags:#04x}")));
    }
    if num_h_metrics == 0 || num_h_metrics > num_glyphs {
        return Err(FontError::invalid(
            "hmtx",
            format!("{num_h_metrics} metrics for {num_glyphs} glyphs"),
        ));
    }
    if x_mins.len() < num_glyphs as usize {
        return Err(FontError::invalid(
            "hmtx",
            format!("{} glyph bounds for {num_glyphs} glyphs", x_mins.len()),
        ));
    }

    let (metrics, glyphs) = (num_h_metrics as usize, num_glyphs as usize);
    let advances = (0..metrics).map(|_| r.read_u16()).collect::<Result<Vec<_>>>()?;
    let proportional = if flags & HMTX_NO_PROPORTIONAL_LSBS == 0 {
        (0..metrics).map(|_| r.read_i16()).collect::<Result<Vec<_>>>()?
    } else {
        x_mins[..metrics].to_vec()
    };
    let monospaced = if flags & HMTX_NO_MONOSPACED_LSBS == 0 {
        (metrics..glyphs).map(|_| r.read_i16()).collect::<Result<Vec<_>>>()?
    } else {
        x_mins[metrics..glyphs].to_vec()
    };

    let mut output = Vec::with_capacity(metrics * 4 + (glyphs - metrics) * 2);
    for (advance, lsb) in advances.iter().zip(&proportional) {
        output.extend_from_slice(&advance.to_be_bytes());
        output.extend_from_slice(&lsb.to_be_bytes());
    }
    for lsb in &monospaced {
        output.extend_from_slice(&lsb.to_be_bytes());
    }
    Ok(output)
}
