//! Type 2 charstring interpreter
//!
//! Produces outlines directly: every moveto opens a contour that starts on an
//! on-curve point, lines add on-curve points, and curves add two control
//! points followed by the on-curve end point. Hint operators only advance the
//! hint-mask byte count.

use crate::font::cff::dict::{apply_blend, read_short_int};
use crate::font::cff::index::{subr_bias, CffIndex};
use crate::font::reader::FontReader;
use crate::geometry::Vec2;
use crate::model::{Outline, OutlinePoint};
use crate::{FontError, Result};

const MAX_CFF_STACK: usize = 48;
const MAX_CFF2_STACK: usize = 513;
const MAX_SUBR_DEPTH: usize = 10;
const TRANSIENT_SIZE: usize = 32;

// One-byte operators
const HSTEM: u8 = 1;
const VSTEM: u8 = 3;
const VMOVETO: u8 = 4;
const RLINETO: u8 = 5;
const HLINETO: u8 = 6;
const VLINETO: u8 = 7;
const RRCURVETO: u8 = 8;
const CALLSUBR: u8 = 10;
const RETURN: u8 = 11;
const ESCAPE: u8 = 12;
const ENDCHAR: u8 = 14;
const VSINDEX: u8 = 15;
const BLEND: u8 = 16;
const HSTEMHM: u8 = 18;
const HINTMASK: u8 = 19;
const CNTRMASK: u8 = 20;
const RMOVETO: u8 = 21;
const HMOVETO: u8 = 22;
const VSTEMHM: u8 = 23;
const RCURVELINE: u8 = 24;
const RLINECURVE: u8 = 25;
const VVCURVETO: u8 = 26;
const HHCURVETO: u8 = 27;
const SHORTINT: u8 = 28;
const CALLGSUBR: u8 = 29;
const VHCURVETO: u8 = 30;
const HVCURVETO: u8 = 31;
const FIXED16_16: u8 = 255;

// Escaped operators (12 x)
const AND: u8 = 3;
const OR: u8 = 4;
const NOT: u8 = 5;
const ABS: u8 = 9;
const ADD: u8 = 10;
const SUB: u8 = 11;
const DIV: u8 = 12;
const NEG: u8 = 14;
const EQ: u8 = 15;
const DROP: u8 = 18;
const PUT: u8 = 20;
const GET: u8 = 21;
const IFELSE: u8 = 22;
const RANDOM: u8 = 23;
const MUL: u8 = 24;
const SQRT: u8 = 26;
const DUP: u8 = 27;
const EXCH: u8 = 28;
const INDEX: u8 = 29;
const ROLL: u8 = 30;
const HFLEX: u8 = 34;
const FLEX: u8 = 35;
const HFLEX1: u8 = 36;
const FLEX1: u8 = 37;

/// Subroutines and variation data a charstring may reference
#[derive(Debug, Clone, Copy)]
pub struct CharstringContext<'a, 'b> {
    pub global_subrs: &'b CffIndex<'a>,
    pub local_subrs: Option<&'b CffIndex<'a>>,
    pub is_cff2: bool,
    /// Region count per ItemVariationData, indexed by vsindex
    pub region_counts: &'b [usize],
    /// vsindex from the Private DICT
    pub default_vsindex: usize,
}

/// Interpreter result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Charstring {
    pub outlines: Vec<Outline>,
    /// Advance width delta from nominalWidthX, when present (CFF only)
    pub width: Option<f64>,
}

/// Run one glyph's charstring
pub fn interpret(data: &[u8], ctx: &CharstringContext) -> Result<Charstring> {
    let mut interp = Interpreter::new(ctx);
    interp.run(data, 0)?;
    interp.close_contour();
    Ok(Charstring {
        outlines: interp.outlines,
        width: interp.width,
    })
}

struct Interpreter<'c, 'a, 'b> {
    ctx: &'c CharstringContext<'a, 'b>,
    stack: Vec<f64>,
    transient: [f64; TRANSIENT_SIZE],
    pos: Vec2,
    stem_count: usize,
    width_parsed: bool,
    width: Option<f64>,
    vsindex: usize,
    current: Vec<OutlinePoint>,
    outlines: Vec<Outline>,
    finished: bool,
}

impl<'c, 'a, 'b> Interpreter<'c, 'a, 'b> {
    fn new(ctx: &'c CharstringContext<'a, 'b>) -> Self {
        Self {
            ctx,
            stack: Vec::new(),
            transient: [0.0; TRANSIENT_SIZE],
            pos: Vec2::ZERO,
            stem_count: 0,
            // CFF2 charstrings never carry a width
            width_parsed: ctx.is_cff2,
            width: None,
            vsindex: ctx.default_vsindex,
            current: Vec::new(),
            outlines: Vec::new(),
            finished: false,
        }
    }

    fn error(&self, reason: impl Into<String>) -> FontError {
        FontError::invalid(if self.ctx.is_cff2 { "CFF2" } else { "CFF" }, reason)
    }

    fn push(&mut self, value: f64) -> Result<()> {
        let limit = if self.ctx.is_cff2 {
            MAX_CFF2_STACK
        } else {
            MAX_CFF_STACK
        };
        if self.stack.len() >= limit {
            return Err(self.error("argument stack overflow"));
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<f64> {
        self.stack
            .pop()
            .ok_or_else(|| self.error("argument stack underflow"))
    }

    fn require(&self, n: usize, op: &str) -> Result<()> {
        if self.stack.len() < n {
            return Err(self.error(format!("{op}: {} operands, need {n}", self.stack.len())));
        }
        Ok(())
    }

    /// Strip the optional leading width operand of the first stack-clearing operator
    fn take_width(&mut self, has_extra: bool) {
        if !self.width_parsed {
            self.width_parsed = true;
            if has_extra && !self.stack.is_empty() {
                self.width = Some(self.stack.remove(0));
            }
        }
    }

    fn close_contour(&mut self) {
        if !self.current.is_empty() {
            let points = std::mem::take(&mut self.current);
            self.outlines.push(Outline::new(points));
        }
    }

    fn move_to(&mut self, dx: f64, dy: f64) {
        self.close_contour();
        self.pos = self.pos + Vec2::new(dx, dy);
        self.current.push(OutlinePoint::new(self.pos.x, self.pos.y, false));
    }

    fn line_to(&mut self, dx: f64, dy: f64) {
        self.pos = self.pos + Vec2::new(dx, dy);
        self.current.push(OutlinePoint::new(self.pos.x, self.pos.y, false));
    }

    fn curve_to(&mut self, d: [f64; 6]) {
        let c1 = self.pos + Vec2::new(d[0], d[1]);
        let c2 = c1 + Vec2::new(d[2], d[3]);
        let end = c2 + Vec2::new(d[4], d[5]);
        self.current.push(OutlinePoint::new(c1.x, c1.y, true));
        self.current.push(OutlinePoint::new(c2.x, c2.y, true));
        self.current.push(OutlinePoint::new(end.x, end.y, false));
        self.pos = end;
    }

    fn stems(&mut self) {
        let odd = self.stack.len() % 2 == 1;
        self.take_width(odd);
        self.stem_count += self.stack.len() / 2;
        self.stack.clear();
    }

    fn run(&mut self, data: &[u8], depth: usize) -> Result<()> {
        if depth > MAX_SUBR_DEPTH {
            return Err(self.error("subroutine nesting too deep"));
        }
        let mut r = FontReader::new(data);

        while r.remaining() > 0 && !self.finished {
            let b0 = r.read_u8()?;
            match b0 {
                HSTEM | VSTEM | HSTEMHM | VSTEMHM => self.stems(),
                HINTMASK | CNTRMASK => {
                    // Pending operands are implicit vstem hints
                    self.stems();
                    r.skip(self.stem_count.div_ceil(8))?;
                }
                RMOVETO => {
                    let extra = self.stack.len() > 2;
                    self.take_width(extra);
                    self.require(2, "rmoveto")?;
                    let (dx, dy) = (self.stack[0], self.stack[1]);
                    self.move_to(dx, dy);
                    self.stack.clear();
                }
                HMOVETO | VMOVETO => {
                    let extra = self.stack.len() > 1;
                    self.take_width(extra);
                    self.require(1, "hmoveto/vmoveto")?;
                    let d = self.stack[0];
                    if b0 == HMOVETO {
                        self.move_to(d, 0.0);
                    } else {
                        self.move_to(0.0, d);
                    }
                    self.stack.clear();
                }
                RLINETO => {
                    let args = std::mem::take(&mut self.stack);
                    for pair in args.chunks_exact(2) {
                        self.line_to(pair[0], pair[1]);
                    }
                }
                HLINETO | VLINETO => {
                    let mut horizontal = b0 == HLINETO;
                    for d in std::mem::take(&mut self.stack) {
                        if horizontal {
                            self.line_to(d, 0.0);
                        } else {
                            self.line_to(0.0, d);
                        }
                        horizontal = !horizontal;
                    }
                }
                RRCURVETO => {
                    let args = std::mem::take(&mut self.stack);
                    for c in args.chunks_exact(6) {
                        self.curve_to([c[0], c[1], c[2], c[3], c[4], c[5]]);
                    }
                }
                RCURVELINE => {
                    self.require(2, "rcurveline")?;
                    let args = std::mem::take(&mut self.stack);
                    let (curves, line) = args.split_at(args.len() - 2);
                    for c in curves.chunks_exact(6) {
                        self.curve_to([c[0], c[1], c[2], c[3], c[4], c[5]]);
                    }
                    self.line_to(line[0], line[1]);
                }
                RLINECURVE => {
                    self.require(6, "rlinecurve")?;
                    let args = std::mem::take(&mut self.stack);
                    let (lines, c) = args.split_at(args.len() - 6);
                    for pair in lines.chunks_exact(2) {
                        self.line_to(pair[0], pair[1]);
                    }
                    self.curve_to([c[0], c[1], c[2], c[3], c[4], c[5]]);
                }
                HHCURVETO => {
                    let args = std::mem::take(&mut self.stack);
                    let (mut dy1, rest) = if args.len() % 2 == 1 {
                        (args[0], &args[1..])
                    } else {
                        (0.0, &args[..])
                    };
                    for c in rest.chunks_exact(4) {
                        self.curve_to([c[0], dy1, c[1], c[2], c[3], 0.0]);
                        dy1 = 0.0;
                    }
                }
                VVCURVETO => {
                    let args = std::mem::take(&mut self.stack);
                    let (mut dx1, rest) = if args.len() % 2 == 1 {
                        (args[0], &args[1..])
                    } else {
                        (0.0, &args[..])
                    };
                    for c in rest.chunks_exact(4) {
                        self.curve_to([dx1, c[0], c[1], c[2], 0.0, c[3]]);
                        dx1 = 0.0;
                    }
                }
                HVCURVETO | VHCURVETO => {
                    let args = std::mem::take(&mut self.stack);
                    let mut horizontal = b0 == HVCURVETO;
                    let mut i = 0;
                    while i + 4 <= args.len() {
                        let last = if args.len() - i == 5 { args[i + 4] } else { 0.0 };
                        let c = &args[i..i + 4];
                        if horizontal {
                            self.curve_to([c[0], 0.0, c[1], c[2], last, c[3]]);
                        } else {
                            self.curve_to([0.0, c[0], c[1], c[2], c[3], last]);
                        }
                        horizontal = !horizontal;
                        i += 4;
                    }
                }
                CALLSUBR | CALLGSUBR => {
                    let number = self.pop()? as i32;
                    let subrs = if b0 == CALLSUBR {
                        self.ctx
                            .local_subrs
                            .ok_or_else(|| self.error("callsubr without local subroutines"))?
                    } else {
                        self.ctx.global_subrs
                    };
                    let index = number + subr_bias(subrs.len());
                    let subr = usize::try_from(index)
                        .ok()
                        .and_then(|i| subrs.get(i))
                        .ok_or_else(|| self.error(format!("subroutine {number} out of range")))?;
                    self.run(subr, depth + 1)?;
                }
                RETURN => {
                    if depth > 0 {
                        return Ok(());
                    }
                }
                ENDCHAR => {
                    // Four extra operands would be the deprecated seac accent form
                    let extra = self.stack.len() == 1 || self.stack.len() == 5;
                    self.take_width(extra);
                    self.close_contour();
                    self.stack.clear();
                    self.finished = true;
                }
                VSINDEX if self.ctx.is_cff2 => {
                    self.vsindex = self.pop()?.max(0.0) as usize;
                }
                BLEND if self.ctx.is_cff2 => {
                    let regions = self.ctx.region_counts.get(self.vsindex).copied().unwrap_or(0);
                    apply_blend(&mut self.stack, regions)?;
                }
                ESCAPE => {
                    let b1 = r.read_u8()?;
                    self.escaped(b1)?;
                }
                SHORTINT => {
                    let v = r.read_i16()? as f64;
                    self.push(v)?;
                }
                FIXED16_16 => {
                    let v = r.read_fixed()?;
                    self.push(v)?;
                }
                32..=254 => {
                    let v = read_short_int(b0, &mut r)? as f64;
                    self.push(v)?;
                }
                other => return Err(self.error(format!("reserved operator {other}"))),
            }
        }
        Ok(())
    }

    fn escaped(&mut self, op: u8) -> Result<()> {
        match op {
            AND | OR | EQ | ADD | SUB | DIV | MUL => {
                let b = self.pop()?;
                let a = self.pop()?;
                let v = match op {
                    AND => flag(a != 0.0 && b != 0.0),
                    OR => flag(a != 0.0 || b != 0.0),
                    EQ => flag(a == b),
                    ADD => a + b,
                    SUB => a - b,
                    DIV => {
                        if b == 0.0 {
                            return Err(self.error("division by zero"));
                        }
                        a / b
                    }
                    _ => a * b,
                };
                self.push(v)
            }
            NOT | ABS | NEG | SQRT => {
                let a = self.pop()?;
                let v = match op {
                    NOT => flag(a == 0.0),
                    ABS => a.abs(),
                    NEG => -a,
                    _ => a.max(0.0).sqrt(),
                };
                self.push(v)
            }
            DROP => self.pop().map(|_| ()),
            PUT => {
                let i = self.pop()? as usize;
                let v = self.pop()?;
                let slot = self
                    .transient
                    .get_mut(i)
                    .ok_or_else(|| FontError::invalid("CFF", format!("transient index {i}")))?;
                *slot = v;
                Ok(())
            }
            GET => {
                let i = self.pop()? as usize;
                let v = *self
                    .transient
                    .get(i)
                    .ok_or_else(|| self.error(format!("transient index {i}")))?;
                self.push(v)
            }
            IFELSE => {
                let v2 = self.pop()?;
                let v1 = self.pop()?;
                let s2 = self.pop()?;
                let s1 = self.pop()?;
                self.push(if v1 <= v2 { s1 } else { s2 })
            }
            // Deterministic so repeated loads produce identical outlines
            RANDOM => self.push(0.5),
            DUP => {
                let a = self.pop()?;
                self.push(a)?;
                self.push(a)
            }
            EXCH => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(b)?;
                self.push(a)
            }
            INDEX => {
                let i = self.pop()?;
                let len = self.stack.len();
                if len == 0 {
                    return Err(self.error("index on empty stack"));
                }
                let i = if i < 0.0 { 0 } else { i as usize };
                let v = self.stack[len - 1 - i.min(len - 1)];
                self.push(v)
            }
            ROLL => {
                let j = self.pop()? as i64;
                let n = self.pop()?.max(0.0) as usize;
                self.require(n, "roll")?;
                if n > 0 {
                    let len = self.stack.len();
                    let slice = &mut self.stack[len - n..];
                    let shift = j.rem_euclid(n as i64) as usize;
                    slice.rotate_right(shift);
                }
                Ok(())
            }
            HFLEX => {
                self.require(7, "hflex")?;
                let a = std::mem::take(&mut self.stack);
                self.curve_to([a[0], 0.0, a[1], a[2], a[3], 0.0]);
                self.curve_to([a[4], 0.0, a[5], -a[2], a[6], 0.0]);
                Ok(())
            }
            FLEX => {
                self.require(13, "flex")?;
                let a = std::mem::take(&mut self.stack);
                self.curve_to([a[0], a[1], a[2], a[3], a[4], a[5]]);
                self.curve_to([a[6], a[7], a[8], a[9], a[10], a[11]]);
                Ok(())
            }
            HFLEX1 => {
                self.require(9, "hflex1")?;
                let a = std::mem::take(&mut self.stack);
                let dy6 = -(a[1] + a[3] + a[7]);
                self.curve_to([a[0], a[1], a[2], a[3], a[4], 0.0]);
                self.curve_to([a[5], 0.0, a[6], a[7], a[8], dy6]);
                Ok(())
            }
            FLEX1 => {
                self.require(11, "flex1")?;
                let a = std::mem::take(&mut self.stack);
                let dx: f64 = a[0] + a[2] + a[4] + a[6] + a[8];
                let dy: f64 = a[1] + a[3] + a[5] + a[7] + a[9];
                let (dx6, dy6) = if dx.abs() > dy.abs() {
                    (a[10], -dy)
                } else {
                    (-dx, a[10])
                };
                self.curve_to([a[0], a[1], a[2], a[3], a[4], a[5]]);
                self.curve_to([a[6], a[7], a[8], a[9], dx6, dy6]);
                Ok(())
            }
            other => Err(self.error(format!("reserved operator 12 {other}"))),
        }
    }
}

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(data: &[u8]) -> Result<Charstring> {
        let globals = CffIndex::default();
        let ctx = CharstringContext {
            global_subrs: &globals,
            local_subrs: None,
            is_cff2: false,
            region_counts: &[],
            default_vsindex: 0,
        };
        interpret(data, &ctx)
    }

    fn num(v: i32) -> u8 {
        (v + 139) as u8
    }

    fn coords(outline: &Outline) -> Vec<(f64, f64, bool)> {
        outline.points.iter().map(|p| (p.x, p.y, p.is_control)).collect()
    }

    #[test]
    fn test_square_with_width() {
        // width 50, rmoveto 10 10, hlineto 20, vlineto 20, hlineto -20, endchar
        let data = [
            num(50), num(10), num(10), RMOVETO,
            num(20), HLINETO, num(20), VLINETO, num(-20), HLINETO, ENDCHAR,
        ];
        let cs = run(&data).unwrap();
        assert_eq!(cs.width, Some(50.0));
        assert_eq!(cs.outlines.len(), 1);
        assert_eq!(
            coords(&cs.outlines[0]),
            vec![
                (10.0, 10.0, false),
                (30.0, 10.0, false),
                (30.0, 30.0, false),
                (10.0, 30.0, false),
            ]
        );
    }

    #[test]
    fn test_curve_points() {
        // rmoveto 0 0, rrcurveto 10 0 10 10 0 10, endchar
        let data = [
            num(0), num(0), RMOVETO,
            num(10), num(0), num(10), num(10), num(0), num(10), RRCURVETO, ENDCHAR,
        ];
        let cs = run(&data).unwrap();
        assert_eq!(cs.width, None);
        assert_eq!(
            coords(&cs.outlines[0]),
            vec![
                (0.0, 0.0, false),
                (10.0, 0.0, true),
                (20.0, 10.0, true),
                (20.0, 20.0, false),
            ]
        );
    }

    #[test]
    fn test_two_contours() {
        let data = [
            num(0), num(0), RMOVETO, num(5), num(5), RLINETO,
            num(100), HMOVETO, num(5), VLINETO, ENDCHAR,
        ];
        let cs = run(&data).unwrap();
        assert_eq!(cs.outlines.len(), 2);
        assert_eq!(coords(&cs.outlines[1])[0], (105.0, 5.0, false));
    }

    #[test]
    fn test_hintmask_skips_mask_bytes() {
        // hstemhm with 2 stems, hintmask (1 mask byte whose value looks like an operator)
        let data = [
            num(0), num(10), num(20), num(10), HSTEMHM,
            HINTMASK, ENDCHAR,
            num(1), num(2), RMOVETO, ENDCHAR,
        ];
        let cs = run(&data).unwrap();
        assert_eq!(coords(&cs.outlines[0]), vec![(1.0, 2.0, false)]);
    }

    #[test]
    fn test_arithmetic() {
        // (3 + 4) * 2 -> 14, used as hmoveto
        let data = [
            num(3), num(4), ESCAPE, ADD, num(2), ESCAPE, MUL, num(0), ESCAPE, EXCH,
            ESCAPE, EXCH, ESCAPE, DROP, HMOVETO, ENDCHAR,
        ];
        let cs = run(&data).unwrap();
        assert_eq!(coords(&cs.outlines[0]), vec![(14.0, 0.0, false)]);
    }

    #[test]
    fn test_global_subroutine() {
        // Subr 0 (biased -107): rlineto 5 0, return
        let subr = [num(5), num(0), RLINETO, RETURN];
        let mut index_bytes = vec![0, 1, 1, 1, 1 + subr.len() as u8];
        index_bytes.extend_from_slice(&subr);
        let globals = CffIndex::parse_at(&index_bytes, 0, false).unwrap();
        let ctx = CharstringContext {
            global_subrs: &globals,
            local_subrs: None,
            is_cff2: false,
            region_counts: &[],
            default_vsindex: 0,
        };

        let data = [num(0), num(0), RMOVETO, num(-107), CALLGSUBR, ENDCHAR];
        let cs = interpret(&data, &ctx).unwrap();
        assert_eq!(coords(&cs.outlines[0])[1], (5.0, 0.0, false));

        // Local subr call without local subrs is an error
        let data = [num(0), CALLSUBR];
        assert!(interpret(&data, &ctx).is_err());
    }

    #[test]
    fn test_stack_overflow() {
        let data = vec![num(1); 49];
        assert!(run(&data).is_err());
    }

    #[test]
    fn test_hvcurveto_alternation() {
        // hvcurveto dx1 dx2 dy2 dy3 | dy4 dx5 dy5 dx6 dy6(final extra)
        let data = [
            num(0), num(0), RMOVETO,
            num(10), num(5), num(5), num(10), num(10), num(-5), num(5), num(-10), num(3),
            HVCURVETO, ENDCHAR,
        ];
        let cs = run(&data).unwrap();
        let pts = coords(&cs.outlines[0]);
        assert_eq!(pts.len(), 7);
        assert_eq!(pts[3], (15.0, 15.0, false));
        assert_eq!(pts[6], (0.0, 33.0, false));
    }
}
