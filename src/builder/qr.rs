use std::ops::Deref;

use crate::common::{
    bitstream::BitStream,
    iter::EncRegionIter,
    mask::MaskPattern,
    metadata::{ECLevel, Shade, Version},
};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Module {
    Empty,
    Finder(Shade),
    Timing(Shade),
    Alignment(Shade),
    Format(Shade),
    Version(Shade),
    Data(Shade),
}

impl Deref for Module {
    type Target = Shade;
    fn deref(&self) -> &Self::Target {
        match self {
            Module::Empty => &Shade::Light,
            Module::Finder(s) => s,
            Module::Timing(s) => s,
            Module::Alignment(s) => s,
            Module::Format(s) => s,
            Module::Version(s) => s,
            Module::Data(s) => s,
        }
    }
}

/// Square module matrix of a QR symbol, without quiet zone.
///
/// Coordinates are `(row, column)`. Negative indices wrap from the opposite
/// edge, so `(-1, -1)` is the bottom right module.
#[derive(Debug, Clone)]
pub struct QR {
    grid: Vec<Module>,
    w: usize,
    ver: Version,
    ecl: ECLevel,
    mask: Option<MaskPattern>,
}

// QR type for builder
//------------------------------------------------------------------------------

impl QR {
    pub fn new(ver: Version, ecl: ECLevel) -> Self {
        let w = ver.width();
        Self { grid: vec![Module::Empty; w * w], w, ver, ecl, mask: None }
    }

    pub fn version(&self) -> Version {
        self.ver
    }

    pub fn width(&self) -> usize {
        self.w
    }

    pub fn ec_level(&self) -> ECLevel {
        self.ecl
    }

    pub fn mask(&self) -> Option<MaskPattern> {
        self.mask
    }

    pub fn module(&self, r: i16, c: i16) -> Module {
        self.grid[self.coord_to_index(r, c)]
    }

    pub fn shade(&self, r: i16, c: i16) -> Shade {
        *self.module(r, c)
    }

    pub fn is_dark(&self, r: i16, c: i16) -> bool {
        self.shade(r, c) == Shade::Dark
    }

    /// Whether the module belongs to one of the three finder patterns,
    /// separators included.
    pub fn is_finder(&self, r: i16, c: i16) -> bool {
        matches!(self.module(r, c), Module::Finder(_))
    }

    pub fn count_dark_modules(&self) -> usize {
        self.grid.iter().filter(|m| ***m == Shade::Dark).count()
    }

    #[cfg(test)]
    pub fn to_debug_str(&self) -> String {
        let w = self.w as i16;
        let mut res = String::with_capacity((w * (w + 1)) as usize);
        res.push('\n');
        for i in 0..w {
            for j in 0..w {
                let c = match self.module(i, j) {
                    Module::Empty => '.',
                    Module::Finder(Shade::Dark) => 'f',
                    Module::Finder(Shade::Light) => 'F',
                    Module::Timing(Shade::Dark) => 't',
                    Module::Timing(Shade::Light) => 'T',
                    Module::Alignment(Shade::Dark) => 'a',
                    Module::Alignment(Shade::Light) => 'A',
                    Module::Version(Shade::Dark) => 'v',
                    Module::Version(Shade::Light) => 'V',
                    Module::Format(Shade::Dark) => 'm',
                    Module::Format(Shade::Light) => 'M',
                    Module::Data(Shade::Dark) => 'd',
                    Module::Data(Shade::Light) => 'D',
                };
                res.push(c);
            }
            res.push('\n');
        }
        res
    }

    fn coord_to_index(&self, r: i16, c: i16) -> usize {
        let w = self.w as i16;
        debug_assert!(-w <= r && r < w, "row should be greater than or equal to w");
        debug_assert!(-w <= c && c < w, "column should be greater than or equal to w");

        let r = if r < 0 { r + w } else { r };
        let c = if c < 0 { c + w } else { c };
        (r as usize) * self.w + c as usize
    }

    fn set(&mut self, r: i16, c: i16, module: Module) {
        let index = self.coord_to_index(r, c);
        self.grid[index] = module;
    }
}


// Finder pattern
//------------------------------------------------------------------------------

impl QR {
    fn draw_finder_patterns(&mut self) {
        self.draw_finder_pattern_at(3, 3);
        self.draw_finder_pattern_at(3, -4);
        self.draw_finder_pattern_at(-4, 3);
    }

    // Draws the 7x7 pattern and its one module light separator
    fn draw_finder_pattern_at(&mut self, r: i16, c: i16) {
        let (dr_left, dr_right) = if r > 0 { (-3, 4) } else { (-4, 3) };
        let (dc_top, dc_bottom) = if c > 0 { (-3, 4) } else { (-4, 3) };
        for i in dr_left..=dr_right {
            for j in dc_top..=dc_bottom {
                self.set(
                    r + i,
                    c + j,
                    match (i, j) {
                        (4 | -4, _) | (_, 4 | -4) => Module::Finder(Shade::Light),
                        (3 | -3, _) | (_, 3 | -3) => Module::Finder(Shade::Dark),
                        (2 | -2, _) | (_, 2 | -2) => Module::Finder(Shade::Light),
                        _ => Module::Finder(Shade::Dark),
                    },
                );
            }
        }
    }
}

#[cfg(test)]
mod finder_pattern_tests {
    use super::QR;
    use crate::common::metadata::{ECLevel, Version};

    #[test]
    fn test_finder_pattern_qr() {
        let mut qr = QR::new(Version::new(1).unwrap(), ECLevel::L);
        qr.draw_finder_patterns();
        assert_eq!(
            qr.to_debug_str(),
            "\n\
             fffffffF.....Ffffffff\n\
             fFFFFFfF.....FfFFFFFf\n\
             fFfffFfF.....FfFfffFf\n\
             fFfffFfF.....FfFfffFf\n\
             fFfffFfF.....FfFfffFf\n\
             fFFFFFfF.....FfFFFFFf\n\
             fffffffF.....Ffffffff\n\
             FFFFFFFF.....FFFFFFFF\n\
             .....................\n\
             .....................\n\
             .....................\n\
             .....................\n\
             .....................\n\
             FFFFFFFF.............\n\
             fffffffF.............\n\
             fFFFFFfF.............\n\
             fFfffFfF.............\n\
             fFfffFfF.............\n\
             fFfffFfF.............\n\
             fFFFFFfF.............\n\
             fffffffF.............\n"
        );
    }

    #[test]
    fn test_is_finder() {
        let mut qr = QR::new(Version::new(1).unwrap(), ECLevel::L);
        qr.draw_finder_patterns();
        assert!(qr.is_finder(0, 0));
        assert!(qr.is_finder(7, 7));
        assert!(qr.is_finder(-1, 0));
        assert!(!qr.is_finder(8, 8));
        assert!(!qr.is_finder(-1, -1));
    }
}

// Timing pattern
//------------------------------------------------------------------------------

impl QR {
    fn draw_timing_pattern(&mut self) {
        let w = self.w as i16;
        self.draw_line(6, 8, 6, w - 9);
        self.draw_line(8, 6, w - 9, 6);
    }

    fn draw_line(&mut self, r1: i16, c1: i16, r2: i16, c2: i16) {
        debug_assert!(r1 == r2 || c1 == c2, "Line is neither vertical nor horizontal");

        let timing = |i: i16| Module::Timing(Shade::from(i & 1 == 0));
        if r1 == r2 {
            for j in c1..=c2 {
                self.set(r1, j, timing(j));
            }
        } else {
            for i in r1..=r2 {
                self.set(i, c1, timing(i));
            }
        }
    }
}


// Alignment pattern
//------------------------------------------------------------------------------

impl QR {
    fn draw_alignment_patterns(&mut self) {
        let poses = self.ver.alignment_pattern();
        for &r in &poses {
            for &c in &poses {
                self.draw_alignment_pattern_at(r, c)
            }
        }
    }

    fn draw_alignment_pattern_at(&mut self, r: i16, c: i16) {
        let w = self.w as i16;
        if (r == 6 && (c == 6 || c - w == -7)) || (r - w == -7 && c == 6) {
            return;
        }
        for i in -2..=2 {
            for j in -2..=2 {
                self.set(
                    r + i,
                    c + j,
                    match (i, j) {
                        (-2 | 2, _) | (_, -2 | 2) | (0, 0) => Module::Alignment(Shade::Dark),
                        _ => Module::Alignment(Shade::Light),
                    },
                )
            }
        }
    }
}


// All function patterns
//------------------------------------------------------------------------------

impl QR {
    pub fn draw_all_function_patterns(&mut self) {
        self.draw_finder_patterns();
        self.draw_timing_pattern();
        self.draw_alignment_patterns();
    }
}

// Format & version info
//------------------------------------------------------------------------------

// 15 bit format info: 2 bit ec level and 3 bit mask, 10 bit BCH remainder,
// xored with 0x5412
pub fn generate_format_info(ecl: ECLevel, mask: MaskPattern) -> u32 {
    let data = (ecl.format_bits() as u32) << 3 | *mask as u32;
    let mut rem = data;
    for _ in 0..10 {
        rem = (rem << 1) ^ ((rem >> 9) * 0x537);
    }
    (data << 10 | rem) ^ 0x5412
}

impl QR {
    fn reserve_format_area(&mut self) {
        self.draw_format_info((1 << FORMAT_INFO_BIT_LEN) - 1);
    }

    fn draw_format_info(&mut self, format_info: u32) {
        self.draw_number(
            format_info,
            Module::Format(Shade::Light),
            Module::Format(Shade::Dark),
            &FORMAT_INFO_COORDS_MAIN,
        );
        self.draw_number(
            format_info,
            Module::Format(Shade::Light),
            Module::Format(Shade::Dark),
            &FORMAT_INFO_COORDS_SIDE,
        );
        self.set(-8, 8, Module::Format(Shade::Dark));
    }

    fn draw_version_info(&mut self) {
        if *self.ver < 7 {
            return;
        }
        let ver_info = self.ver.info();
        for i in 0..VERSION_INFO_BIT_LEN as i16 {
            let module = Module::Version(Shade::from((ver_info >> i) & 1 == 1));
            let a = -11 + i % 3;
            let b = i / 3;
            self.set(b, a, module);
            self.set(a, b, module);
        }
    }

    // Least significant bit goes to the first coordinate
    fn draw_number(&mut self, number: u32, off_clr: Module, on_clr: Module, coords: &[(i16, i16)]) {
        for (i, (r, c)) in coords.iter().enumerate() {
            if (number >> i) & 1 == 0 {
                self.set(*r, *c, off_clr);
            } else {
                self.set(*r, *c, on_clr);
            }
        }
    }
}


// Encoding region
//------------------------------------------------------------------------------

impl QR {
    pub fn draw_encoding_region(&mut self, payload: &BitStream) {
        self.reserve_format_area();
        self.draw_version_info();

        // Remainder bits past the payload are light
        let mut i = 0;
        for (r, c) in EncRegionIter::new(self.ver) {
            if matches!(self.module(r, c), Module::Empty) {
                self.set(r, c, Module::Data(Shade::from(payload.get(i))));
                i += 1;
            }
        }

        debug_assert!(!self.grid.contains(&Module::Empty), "Empty module found after drawing");
    }

    pub fn apply_mask(&mut self, pattern: MaskPattern) {
        if let Some(prev) = self.mask {
            // Masks are involutions, undo before reapplying
            self.flip_data(prev);
        }
        self.flip_data(pattern);
        self.mask = Some(pattern);
        let format_info = generate_format_info(self.ecl, pattern);
        self.draw_format_info(format_info);
    }

    fn flip_data(&mut self, pattern: MaskPattern) {
        let mask_fn = pattern.mask_function();
        let w = self.w as i16;
        for r in 0..w {
            for c in 0..w {
                if let Module::Data(clr) = self.module(r, c) {
                    if mask_fn(c, r) {
                        self.set(r, c, Module::Data(!clr))
                    }
                }
            }
        }
    }
}


// Global constants
//------------------------------------------------------------------------------

const FORMAT_INFO_BIT_LEN: usize = 15;

const VERSION_INFO_BIT_LEN: usize = 18;

static FORMAT_INFO_COORDS_MAIN: [(i16, i16); 15] = [
    (0, 8),
    (1, 8),
    (2, 8),
    (3, 8),
    (4, 8),
    (5, 8),
    (7, 8),
    (8, 8),
    (8, 7),
    (8, 5),
    (8, 4),
    (8, 3),
    (8, 2),
    (8, 1),
    (8, 0),
];

static FORMAT_INFO_COORDS_SIDE: [(i16, i16); 15] = [
    (8, -1),
    (8, -2),
    (8, -3),
    (8, -4),
    (8, -5),
    (8, -6),
    (8, -7),
    (8, -8),
    (-7, 8),
    (-6, 8),
    (-5, 8),
    (-4, 8),
    (-3, 8),
    (-2, 8),
    (-1, 8),
];
