// Growable bit buffer, MSB first within each byte
//------------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BitStream {
    data: Vec<u8>,
    // Bit length
    len: usize,
    // Max bit capacity
    capacity: usize,
}

impl BitStream {
    pub fn new(capacity: usize) -> Self {
        Self { data: Vec::with_capacity((capacity + 7) >> 3), len: 0, capacity }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn push(&mut self, bit: bool) {
        debug_assert!(
            self.len < self.capacity,
            "Insufficient capacity: Capacity {}, Size {}",
            self.capacity,
            self.len + 1
        );

        let offset = self.len & 7;
        if offset == 0 {
            self.data.push(0);
        }
        if bit {
            let pos = self.len >> 3;
            self.data[pos] |= 0b1000_0000 >> offset;
        }
        self.len += 1;
    }

    pub fn push_bits(&mut self, bits: u32, size: usize) {
        debug_assert!(size <= 32, "Cannot push more than 32 bits at once: {size}");
        debug_assert!(
            size == 32 || bits >> size == 0,
            "Bit count shouldn't exceed bit length: Length {size}, Bits {bits}"
        );

        for i in (0..size).rev() {
            self.push((bits >> i) & 1 == 1);
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        bytes.iter().for_each(|b| self.push_bits(*b as u32, 8));
    }

    // Bit at position i, false beyond the written length
    pub fn get(&self, i: usize) -> bool {
        if i >= self.len {
            return false;
        }
        (self.data[i >> 3] >> (7 - (i & 7))) & 1 == 1
    }
}
