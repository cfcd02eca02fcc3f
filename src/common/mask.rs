use std::ops::Deref;

use super::error::{QRError, QRResult};
use super::metadata::Shade;
use crate::builder::QR;

#[derive(Debug, PartialEq, Eq, Copy, Clone, PartialOrd, Ord)]
pub struct MaskPattern(u8);

impl MaskPattern {
    pub fn new(pattern: u8) -> QRResult<Self> {
        if pattern >= 8 {
            return Err(QRError::InvalidMaskingPattern);
        }
        Ok(Self(pattern))
    }

    pub fn all() -> impl Iterator<Item = MaskPattern> {
        (0..8).map(MaskPattern)
    }
}

impl Deref for MaskPattern {
    type Target = u8;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// x is the column, y is the row
mod mask_functions {
    pub fn checkerboard(x: i16, y: i16) -> bool {
        (x + y) & 1 == 0
    }

    pub fn horizontal_lines(_: i16, y: i16) -> bool {
        y & 1 == 0
    }

    pub fn vertical_lines(x: i16, _: i16) -> bool {
        x % 3 == 0
    }

    pub fn diagonal_lines(x: i16, y: i16) -> bool {
        (x + y) % 3 == 0
    }

    pub fn large_checkerboard(x: i16, y: i16) -> bool {
        ((y >> 1) + (x / 3)) & 1 == 0
    }

    pub fn fields(x: i16, y: i16) -> bool {
        let p = x as i32 * y as i32;
        (p & 1) + (p % 3) == 0
    }

    pub fn diamonds(x: i16, y: i16) -> bool {
        let p = x as i32 * y as i32;
        ((p & 1) + (p % 3)) & 1 == 0
    }

    pub fn meadow(x: i16, y: i16) -> bool {
        let (x, y) = (x as i32, y as i32);
        (((x + y) & 1) + ((x * y) % 3)) & 1 == 0
    }
}

impl MaskPattern {
    pub fn mask_function(self) -> fn(i16, i16) -> bool {
        match self.0 & 0b111 {
            0b000 => mask_functions::checkerboard,
            0b001 => mask_functions::horizontal_lines,
            0b010 => mask_functions::vertical_lines,
            0b011 => mask_functions::diagonal_lines,
            0b100 => mask_functions::large_checkerboard,
            0b101 => mask_functions::fields,
            0b110 => mask_functions::diamonds,
            _ => mask_functions::meadow,
        }
    }
}

// Tries all 8 patterns on copies and keeps the lowest penalty. Ties go to the
// lower pattern number.
pub fn apply_best_mask(qr: &mut QR) -> MaskPattern {
    let mut best = (MaskPattern(0), u32::MAX);
    for m in MaskPattern::all() {
        let mut candidate = qr.clone();
        candidate.apply_mask(m);
        let pen = compute_total_penalty(&candidate);
        if pen < best.1 {
            best = (m, pen);
        }
    }
    qr.apply_mask(best.0);
    best.0
}

pub fn compute_total_penalty(qr: &QR) -> u32 {
    let adj_pen = compute_adjacent_penalty(qr);
    let blk_pen = compute_block_penalty(qr);
    let fp_pen_h = compute_finder_pattern_penalty(qr, true);
    let fp_pen_v = compute_finder_pattern_penalty(qr, false);
    let bal_pen = compute_balance_penalty(qr);
    adj_pen + blk_pen + fp_pen_h + fp_pen_v + bal_pen
}

fn compute_adjacent_penalty(qr: &QR) -> u32 {
    let mut pen = 0;
    let w = qr.width();
    let mut cols = vec![(Shade::Dark, 0); w];
    for r in 0..w {
        let mut last = Shade::Dark;
        let mut consec_row_len = 0;
        for (c, col) in cols.iter_mut().enumerate() {
            let clr = qr.shade(r as i16, c as i16);
            if last != clr {
                last = clr;
                consec_row_len = 0;
            }
            consec_row_len += 1;
            if consec_row_len >= 5 {
                pen += if consec_row_len == 5 { 3 } else { 1 };
            }
            if col.0 != clr {
                col.0 = clr;
                col.1 = 0;
            }
            col.1 += 1;
            if col.1 >= 5 {
                pen += if col.1 == 5 { 3 } else { 1 };
            }
        }
    }
    pen
}

fn compute_block_penalty(qr: &QR) -> u32 {
    let mut pen = 0;
    let w = qr.width() as i16;
    for r in 0..w - 1 {
        for c in 0..w - 1 {
            let clr = qr.shade(r, c);
            if clr == qr.shade(r + 1, c)
                && clr == qr.shade(r, c + 1)
                && clr == qr.shade(r + 1, c + 1)
            {
                pen += 3;
            }
        }
    }
    pen
}

fn compute_finder_pattern_penalty(qr: &QR, is_hor: bool) -> u32 {
    static PATTERN: [Shade; 7] =
        [Shade::Dark, Shade::Light, Shade::Dark, Shade::Dark, Shade::Dark, Shade::Light, Shade::Dark];

    let mut pen = 0;
    let w = qr.width() as i16;
    for i in 0..w {
        let get = |j: i16| if is_hor { qr.shade(i, j) } else { qr.shade(j, i) };
        // Cells outside the symbol count as light quiet zone
        let is_light = |j: i16| j < 0 || j >= w || get(j) == Shade::Light;
        for j in 0..w - 6 {
            if (j..j + 7).map(get).eq(PATTERN.iter().copied())
                && ((j - 4..j).all(is_light) || (j + 7..j + 11).all(is_light))
            {
                pen += 40;
            }
        }
    }
    pen
}

fn compute_balance_penalty(qr: &QR) -> u32 {
    let dark_cnt = qr.count_dark_modules();
    let w = qr.width();
    let tot = w * w;
    // Penalty of 10 per full 5% deviation from an even split
    let k = (dark_cnt * 20).abs_diff(tot * 10).div_ceil(tot);
    (k.saturating_sub(1) * 10) as u32
}
