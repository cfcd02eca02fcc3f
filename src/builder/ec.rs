use crate::common::metadata::{ECLevel, Version};

// Galois field GF(256) with primitive polynomial x^8 + x^4 + x^3 + x^2 + 1
//------------------------------------------------------------------------------

const fn build_tables() -> ([u8; 256], [u8; 256]) {
    let mut exp = [0u8; 256];
    let mut log = [0u8; 256];
    let mut x: u16 = 1;
    let mut i = 0;
    while i < 255 {
        exp[i] = x as u8;
        log[x as usize] = i as u8;
        x <<= 1;
        if x & 0x100 != 0 {
            x ^= 0x11D;
        }
        i += 1;
    }
    exp[255] = exp[0];
    (exp, log)
}

static TABLES: ([u8; 256], [u8; 256]) = build_tables();

fn gf_mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    let (exp, log) = &TABLES;
    let sum = log[a as usize] as usize + log[b as usize] as usize;
    exp[sum % 255]
}

// Coefficients of prod(x - a^i) for i in 0..degree, highest power first with
// the leading 1 dropped
fn generator_polynomial(degree: usize) -> Vec<u8> {
    let (exp, _) = &TABLES;
    let mut poly = vec![1u8];
    for &root in exp.iter().take(degree) {
        let mut next = vec![0u8; poly.len() + 1];
        for (j, &c) in poly.iter().enumerate() {
            next[j] ^= c;
            next[j + 1] ^= gf_mul(c, root);
        }
        poly = next;
    }
    poly.split_off(1)
}

// ECC: Error Correction Codeword generator
//------------------------------------------------------------------------------

pub fn ecc(data: &[u8], ver: Version, ecl: ECLevel) -> (Vec<&[u8]>, Vec<Vec<u8>>) {
    let data_blocks = blockify(data, ver, ecl);

    let ecc_size_per_block = ver.ecc_per_block(ecl);
    let gen_poly = generator_polynomial(ecc_size_per_block);
    let ecc_blocks =
        data_blocks.iter().map(|b| ecc_per_block(b, &gen_poly)).collect::<Vec<_>>();

    (data_blocks, ecc_blocks)
}

pub fn blockify(data: &[u8], ver: Version, ecl: ECLevel) -> Vec<&[u8]> {
    let (block1_size, block1_count, block2_size, block2_count) =
        ver.data_codewords_per_block(ecl);

    let total_blocks = block1_count + block2_count;
    let total_block1_size = block1_size * block1_count;
    let total_size = total_block1_size + block2_size * block2_count;

    debug_assert!(
        total_size == data.len(),
        "Data len doesn't match total size of blocks: Data len {}, Total block size {}",
        data.len(),
        total_size
    );

    let mut data_blocks = Vec::with_capacity(total_blocks);
    data_blocks.extend(data[..total_block1_size].chunks(block1_size));
    if block2_size > 0 {
        data_blocks.extend(data[total_block1_size..].chunks(block2_size));
    }
    data_blocks
}

// Performs polynomial long division with data polynomial(num)
// and generator polynomial(den) to compute remainder polynomial,
// the coefficients of which are the ecc
fn ecc_per_block(block: &[u8], gen_poly: &[u8]) -> Vec<u8> {
    let len = block.len();

    let mut res = block.to_vec();
    res.resize(len + gen_poly.len(), 0);

    for i in 0..len {
        let lead_coeff = res[i];
        if lead_coeff == 0 {
            continue;
        }
        for (u, v) in res[i + 1..].iter_mut().zip(gen_poly.iter()) {
            *u ^= gf_mul(*v, lead_coeff);
        }
    }

    res.split_off(len)
}

pub fn interleave<T: Copy, V: AsRef<[T]>>(blocks: &[V]) -> Vec<T> {
    let max_block_size = blocks.iter().map(|b| b.as_ref().len()).max().unwrap_or(0);
    let total_size = blocks.iter().map(|b| b.as_ref().len()).sum::<usize>();
    let mut res = Vec::with_capacity(total_size);
    for i in 0..max_block_size {
        for b in blocks {
            if let Some(v) = b.as_ref().get(i) {
                res.push(*v);
            }
        }
    }
    res
}
