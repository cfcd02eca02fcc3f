use std::cmp::Ordering;

use super::{
    bitstream::BitStream,
    error::{QRError, QRResult},
    metadata::{ECLevel, Version},
};

// Mode
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Mode {
    Numeric = 0b0001,
    Alphanumeric = 0b0010,
    Byte = 0b0100,
}

impl PartialOrd for Mode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Mode {
    fn cmp(&self, other: &Self) -> Ordering {
        match (*self, *other) {
            (a, b) if a == b => Ordering::Equal,
            (Self::Numeric, _) | (_, Self::Byte) => Ordering::Less,
            _ => Ordering::Greater,
        }
    }
}

impl Mode {
    pub fn contains(&self, byte: u8) -> bool {
        match self {
            Self::Numeric => byte.is_ascii_digit(),
            Self::Alphanumeric => {
                byte.is_ascii_digit()
                    || byte.is_ascii_uppercase()
                    || matches!(byte, b' ' | b'$' | b'%' | b'*' | b'+' | b'-' | b'.' | b'/' | b':')
            }
            Self::Byte => true,
        }
    }

    // Narrowest mode able to hold the entire payload
    pub fn select(data: &[u8]) -> Self {
        MODES
            .iter()
            .copied()
            .find(|m| data.iter().all(|b| m.contains(*b)))
            .unwrap_or(Self::Byte)
    }

    #[inline]
    fn numeric_digit(char: u8) -> u32 {
        debug_assert!(Mode::Numeric.contains(char), "Invalid numeric data: {char}");
        (char - b'0') as u32
    }

    #[inline]
    fn alphanumeric_digit(char: u8) -> u32 {
        debug_assert!(Mode::Alphanumeric.contains(char), "Invalid alphanumeric data: {char}");
        match char {
            b'0'..=b'9' => (char - b'0') as u32,
            b'A'..=b'Z' => (char - b'A' + 10) as u32,
            b' ' => 36,
            b'$' => 37,
            b'%' => 38,
            b'*' => 39,
            b'+' => 40,
            b'-' => 41,
            b'.' => 42,
            b'/' => 43,
            _ => 44,
        }
    }

    // Chunk width in bytes and encoded bit length of a full chunk
    fn chunk_size(&self) -> usize {
        match self {
            Self::Numeric => 3,
            Self::Alphanumeric => 2,
            Self::Byte => 1,
        }
    }

    fn encoded_chunk_len(&self, chunk_len: usize) -> usize {
        match (self, chunk_len) {
            (Self::Numeric, 3) => 10,
            (Self::Numeric, 2) => 7,
            (Self::Numeric, _) => 4,
            (Self::Alphanumeric, 2) => 11,
            (Self::Alphanumeric, _) => 6,
            (Self::Byte, _) => 8,
        }
    }

    pub fn encode_chunk(&self, data: &[u8]) -> u32 {
        let len = data.len();
        match self {
            Self::Numeric => {
                debug_assert!(len <= 3, "Data is too long for numeric conversion: {len}");
                data.iter().fold(0, |n, b| n * 10 + Self::numeric_digit(*b))
            }
            Self::Alphanumeric => {
                debug_assert!(len <= 2, "Data is too long for alphanumeric conversion: {len}");
                data.iter().fold(0, |n, b| n * 45 + Self::alphanumeric_digit(*b))
            }
            Self::Byte => {
                debug_assert!(len == 1, "Data is too long for byte conversion: {len}");
                data[0] as u32
            }
        }
    }

    pub fn char_count_bits(&self, ver: Version) -> usize {
        let tier = match *ver {
            1..=9 => 0,
            10..=26 => 1,
            _ => 2,
        };
        match self {
            Self::Numeric => [10, 12, 14][tier],
            Self::Alphanumeric => [9, 11, 13][tier],
            Self::Byte => [8, 16, 16][tier],
        }
    }

    // Total bits for a single segment holding `len` characters
    pub fn segment_bits(&self, len: usize, ver: Version) -> usize {
        let size = self.chunk_size();
        let full = len / size * self.encoded_chunk_len(size);
        let rem = len % size;
        let tail = if rem > 0 { self.encoded_chunk_len(rem) } else { 0 };
        4 + self.char_count_bits(ver) + full + tail
    }
}


// Encoder
//------------------------------------------------------------------------------

// Picks the smallest version able to hold the data
pub fn encode(data: &[u8], ecl: ECLevel) -> QRResult<(BitStream, Version)> {
    if data.is_empty() {
        return Err(QRError::EmptyData);
    }

    let mode = Mode::select(data);
    let ver = Version::all()
        .find(|v| fits(mode, data.len(), *v, ecl))
        .ok_or(QRError::DataTooLong)?;
    Ok((encode_with_version(data, ecl, ver)?, ver))
}

pub fn encode_with_version(data: &[u8], ecl: ECLevel, ver: Version) -> QRResult<BitStream> {
    if data.is_empty() {
        return Err(QRError::EmptyData);
    }

    let mode = Mode::select(data);
    if !fits(mode, data.len(), ver, ecl) {
        return Err(QRError::DataTooLong);
    }

    let capacity = ver.data_bit_capacity(ecl);
    let mut bs = BitStream::new(capacity);

    bs.push_bits(mode as u32, 4);
    bs.push_bits(data.len() as u32, mode.char_count_bits(ver));
    for chunk in data.chunks(mode.chunk_size()) {
        bs.push_bits(mode.encode_chunk(chunk), mode.encoded_chunk_len(chunk.len()));
    }

    // Terminator, byte alignment & padding codewords
    let terminator = std::cmp::min(4, capacity - bs.len());
    bs.push_bits(0, terminator);
    let align = (8 - (bs.len() & 7)) & 7;
    bs.push_bits(0, align);
    for pad in PADDING_CODEWORDS.iter().cycle().take((capacity - bs.len()) >> 3) {
        bs.push_bits(*pad as u32, 8);
    }

    debug_assert!(bs.len() == capacity, "Encoded length {} != capacity {capacity}", bs.len());
    Ok(bs)
}

fn fits(mode: Mode, len: usize, ver: Version, ecl: ECLevel) -> bool {
    len < (1 << mode.char_count_bits(ver)) && mode.segment_bits(len, ver) <= ver.data_bit_capacity(ecl)
}

#[cfg(test)]
mod encode_tests {
    use test_case::test_case;

    use super::{encode, encode_with_version};
    use crate::common::{
        error::QRError,
        metadata::{ECLevel, Version},
    };

    #[test]
    fn test_hello_world_1m() {
        let bs = encode_with_version(b"HELLO WORLD", ECLevel::M, Version::new(1).unwrap()).unwrap();
        assert_eq!(
            bs.data(),
            [32, 91, 11, 120, 209, 114, 220, 77, 67, 64, 236, 17, 236, 17, 236, 17]
        );
    }

    #[test]
    fn test_empty() {
        assert_eq!(encode(b"", ECLevel::H).unwrap_err(), QRError::EmptyData);
    }

    #[test_case("https://example.com", 3)]
    #[test_case("https://shop.example.com/product?id=123&ref=qr", 6)]
    fn test_smallest_version(data: &str, exp: usize) {
        let (_, ver) = encode(data.as_bytes(), ECLevel::H).unwrap();
        assert_eq!(*ver, exp);
    }

    #[test_case("1".repeat(3057), "1".repeat(3058))]
    #[test_case("A".repeat(1852), "A".repeat(1853))]
    #[test_case("a".repeat(1273), "a".repeat(1274))]
    fn test_capacity_boundary(max: String, over: String) {
        let (bs, ver) = encode(max.as_bytes(), ECLevel::H).unwrap();
        assert_eq!(*ver, 40);
        assert_eq!(bs.len(), ver.data_bit_capacity(ECLevel::H));
        assert_eq!(encode(over.as_bytes(), ECLevel::H).unwrap_err(), QRError::DataTooLong);
    }
}

// Global constants
//------------------------------------------------------------------------------

pub static PADDING_CODEWORDS: [u8; 2] = [0b1110_1100, 0b0001_0001];

pub static MODES: [Mode; 3] = [Mode::Numeric, Mode::Alphanumeric, Mode::Byte];
