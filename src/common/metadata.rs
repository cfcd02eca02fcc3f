use std::fmt::{Display, Formatter};
use std::ops::Deref;

use super::error::{QRError, QRResult};

// Shade
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Shade {
    Light,
    Dark,
}

impl From<bool> for Shade {
    fn from(dark: bool) -> Self {
        if dark {
            Shade::Dark
        } else {
            Shade::Light
        }
    }
}

impl std::ops::Not for Shade {
    type Output = Self;
    fn not(self) -> Self::Output {
        match self {
            Shade::Light => Shade::Dark,
            Shade::Dark => Shade::Light,
        }
    }
}

// Error correction level
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum ECLevel {
    L = 0,
    M = 1,
    Q = 2,
    H = 3,
}

impl ECLevel {
    // Two bit indicator stored in format info
    pub fn format_bits(self) -> u16 {
        match self {
            Self::L => 0b01,
            Self::M => 0b00,
            Self::Q => 0b11,
            Self::H => 0b10,
        }
    }
}

// Version
//------------------------------------------------------------------------------

pub const MIN_VERSION: usize = 1;
pub const MAX_VERSION: usize = 40;

#[derive(Debug, PartialEq, Eq, Copy, Clone, PartialOrd, Ord)]
pub struct Version(usize);

impl Deref for Version {
    type Target = usize;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Version {
    pub fn new(ver: usize) -> QRResult<Self> {
        if !(MIN_VERSION..=MAX_VERSION).contains(&ver) {
            return Err(QRError::InvalidVersion);
        }
        Ok(Self(ver))
    }

    pub fn all() -> impl Iterator<Item = Version> {
        (MIN_VERSION..=MAX_VERSION).map(Version)
    }

    pub const fn width(self) -> usize {
        self.0 * 4 + 17
    }

    // Row/column centers of alignment patterns. Combinations overlapping the
    // finders are skipped by the caller.
    pub fn alignment_pattern(self) -> Vec<i16> {
        let v = self.0 as i16;
        if v == 1 {
            return Vec::new();
        }
        let w = self.width() as i16;
        let count = v / 7 + 2;
        let step = if v == 32 { 26 } else { (v * 4 + count * 2 + 1) / (count * 2 - 2) * 2 };
        let mut res = (0..count - 1).map(|i| w - 7 - i * step).collect::<Vec<_>>();
        res.push(6);
        res.reverse();
        res
    }

    // Number of modules available for data and ecc after all function
    // patterns and info areas are reserved
    pub fn raw_data_modules(self) -> usize {
        let v = self.0;
        let mut res = (16 * v + 128) * v + 64;
        if v >= 2 {
            let count = v / 7 + 2;
            res -= (25 * count - 10) * count - 55;
            if v >= 7 {
                res -= 36;
            }
        }
        res
    }

    pub fn total_codewords(self) -> usize {
        self.raw_data_modules() >> 3
    }

    pub fn ecc_per_block(self, ecl: ECLevel) -> usize {
        ECC_PER_BLOCK[ecl as usize][self.0]
    }

    pub fn block_count(self, ecl: ECLevel) -> usize {
        EC_BLOCK_COUNT[ecl as usize][self.0]
    }

    pub fn data_codewords(self, ecl: ECLevel) -> usize {
        self.total_codewords() - self.ecc_per_block(ecl) * self.block_count(ecl)
    }

    pub fn data_bit_capacity(self, ecl: ECLevel) -> usize {
        self.data_codewords(ecl) << 3
    }

    // Returns (block1_size, block1_count, block2_size, block2_count) where
    // sizes count data codewords only. Group 2 blocks hold one extra codeword.
    pub fn data_codewords_per_block(self, ecl: ECLevel) -> (usize, usize, usize, usize) {
        let total = self.total_codewords();
        let blocks = self.block_count(ecl);
        let ecc = self.ecc_per_block(ecl);

        let long_count = total % blocks;
        let short_count = blocks - long_count;
        let short_size = total / blocks - ecc;
        let long_size = if long_count > 0 { short_size + 1 } else { 0 };
        (short_size, short_count, long_size, long_count)
    }

    // 18 bit version info: 6 bit version followed by 12 bit BCH remainder
    pub fn info(self) -> u32 {
        debug_assert!(self.0 >= 7, "Version info is only present from version 7");
        let ver = self.0 as u32;
        let mut rem = ver;
        for _ in 0..12 {
            rem = (rem << 1) ^ ((rem >> 11) * 0x1F25);
        }
        ver << 12 | rem
    }
}

#[cfg(test)]
mod version_tests {
    use test_case::test_case;

    use super::{ECLevel, Version};

    #[test_case(1, ECLevel::H, 9)]
    #[test_case(1, ECLevel::M, 16)]
    #[test_case(5, ECLevel::Q, 62)]
    #[test_case(6, ECLevel::H, 60)]
    #[test_case(10, ECLevel::H, 122)]
    #[test_case(40, ECLevel::L, 2956)]
    #[test_case(40, ECLevel::H, 1276)]
    fn test_data_codewords(ver: usize, ecl: ECLevel, exp: usize) {
        assert_eq!(Version::new(ver).unwrap().data_codewords(ecl), exp);
    }

    #[test_case(1, 26)]
    #[test_case(7, 196)]
    #[test_case(40, 3706)]
    fn test_total_codewords(ver: usize, exp: usize) {
        assert_eq!(Version::new(ver).unwrap().total_codewords(), exp);
    }

    #[test]
    fn test_blocks_cover_data_codewords() {
        for ver in Version::all() {
            for ecl in [ECLevel::L, ECLevel::M, ECLevel::Q, ECLevel::H] {
                let (s1, c1, s2, c2) = ver.data_codewords_per_block(ecl);
                assert_eq!(s1 * c1 + s2 * c2, ver.data_codewords(ecl), "Version {ver} {ecl:?}");
            }
        }
    }

    #[test_case(5, ECLevel::Q, (15, 2, 16, 2))]
    #[test_case(13, ECLevel::H, (11, 12, 12, 4))]
    #[test_case(40, ECLevel::L, (118, 19, 119, 6))]
    #[test_case(40, ECLevel::H, (15, 20, 16, 61))]
    fn test_block_split(ver: usize, ecl: ECLevel, exp: (usize, usize, usize, usize)) {
        let ver = Version::new(ver).unwrap();
        assert_eq!(ver.data_codewords_per_block(ecl), exp);
    }

    #[test]
    fn test_high_ec_block_counts() {
        let counts = Version::all().map(|v| v.block_count(ECLevel::H)).collect::<Vec<_>>();
        assert_eq!(counts[35..], [66, 70, 74, 77, 81]);
        assert_eq!(counts.iter().sum::<usize>(), 1242);
    }

    #[test_case(1, vec![])]
    #[test_case(2, vec![6, 18])]
    #[test_case(7, vec![6, 22, 38])]
    #[test_case(32, vec![6, 34, 60, 86, 112, 138])]
    #[test_case(40, vec![6, 30, 58, 86, 114, 142, 170])]
    fn test_alignment_pattern(ver: usize, exp: Vec<i16>) {
        assert_eq!(Version::new(ver).unwrap().alignment_pattern(), exp);
    }

    #[test]
    fn test_version_info() {
        assert_eq!(Version::new(7).unwrap().info(), 0x07C94);
        assert_eq!(Version::new(40).unwrap().info(), 0x28C69);
    }

    #[test]
    fn test_invalid_version() {
        assert!(Version::new(0).is_err());
        assert!(Version::new(41).is_err());
    }
}

// Global constants
//------------------------------------------------------------------------------

// Indexed by [ECLevel][version], version 0 unused
static ECC_PER_BLOCK: [[usize; 41]; 4] = [
    [
        0, 7, 10, 15, 20, 26, 18, 20, 24, 30, 18, 20, 24, 26, 30, 22, 24, 28, 30, 28, 28, 28, 28,
        30, 30, 26, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ],
    [
        0, 10, 16, 26, 18, 24, 16, 18, 22, 22, 26, 30, 22, 22, 24, 24, 28, 28, 26, 26, 26, 26, 28,
        28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28,
    ],
    [
        0, 13, 22, 18, 26, 18, 24, 18, 22, 20, 24, 28, 26, 24, 20, 30, 24, 28, 28, 26, 30, 28, 30,
        30, 30, 30, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ],
    [
        0, 17, 28, 22, 16, 22, 28, 26, 26, 24, 28, 24, 28, 22, 24, 24, 30, 28, 28, 26, 28, 30, 24,
        30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ],
];

static EC_BLOCK_COUNT: [[usize; 41]; 4] = [
    [
        0, 1, 1, 1, 1, 1, 2, 2, 2, 2, 4, 4, 4, 4, 4, 6, 6, 6, 6, 7, 8, 8, 9, 9, 10, 12, 12, 12, 13,
        14, 15, 16, 17, 18, 19, 19, 20, 21, 22, 24, 25,
    ],
    [
        0, 1, 1, 1, 2, 2, 4, 4, 4, 5, 5, 5, 8, 9, 9, 10, 10, 11, 13, 14, 16, 17, 17, 18, 20, 21,
        23, 25, 26, 28, 29, 31, 33, 35, 37, 38, 40, 43, 45, 47, 49,
    ],
    [
        0, 1, 1, 2, 2, 4, 4, 6, 6, 8, 8, 8, 10, 12, 16, 12, 17, 16, 18, 21, 20, 23, 23, 25, 27, 29,
        34, 34, 35, 38, 40, 43, 45, 48, 51, 53, 56, 59, 62, 65, 68,
    ],
    [
        0, 1, 1, 2, 4, 4, 4, 5, 6, 8, 8, 11, 11, 16, 16, 18, 16, 19, 21, 25, 25, 25, 34, 30, 32,
        35, 37, 40, 42, 45, 48, 51, 54, 57, 60, 63, 66, 70, 74, 77, 81,
    ],
];
