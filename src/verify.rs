//! Post-hoc scannability check. Decoding is advisory: any failure to find or
//! decode a symbol is reported as `false`, never as an error.

use image::{imageops, imageops::FilterType, GrayImage, Luma, RgbaImage};
use tracing::debug;

/// Longest side the verifier decodes at. Larger rasters are downscaled.
pub const VERIFY_MAX_DIM: u32 = 768;

/// Decodes every QR symbol found in the raster.
pub fn scan(img: &RgbaImage) -> Vec<String> {
    if img.width() == 0 || img.height() == 0 {
        return Vec::new();
    }

    let mut gray = flatten_to_luma(img);
    let longest = gray.width().max(gray.height());
    if longest > VERIFY_MAX_DIM {
        let scale = VERIFY_MAX_DIM as f32 / longest as f32;
        let w = ((gray.width() as f32 * scale).round() as u32).max(1);
        let h = ((gray.height() as f32 * scale).round() as u32).max(1);
        gray = imageops::resize(&gray, w, h, FilterType::Triangle);
    }

    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        gray.width() as usize,
        gray.height() as usize,
        |x, y| gray.get_pixel(x as u32, y as u32)[0],
    );
    let grids = prepared.detect_grids();
    debug!(grids = grids.len(), width = gray.width(), "Scanning raster");

    grids
        .iter()
        .filter_map(|g| match g.decode() {
            Ok((_, content)) => Some(content),
            Err(e) => {
                debug!(error = %e, "Grid failed to decode");
                None
            }
        })
        .collect()
}

/// True when a decoded symbol matches `expected` exactly.
pub fn verify(img: &RgbaImage, expected: &str) -> bool {
    let decoded = scan(img);
    let ok = decoded.iter().any(|s| s == expected);
    debug!(verified = ok, symbols = decoded.len(), "Verification finished");
    ok
}

// Composites onto white, then Rec.601 luma
fn flatten_to_luma(img: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let p = img.get_pixel(x, y);
        let a = p[3] as f32 / 255.0;
        let ch = |i: usize| p[i] as f32 * a + 255.0 * (1.0 - a);
        let l = 0.299 * ch(0) + 0.587 * ch(1) + 0.114 * ch(2);
        Luma([l.round().clamp(0.0, 255.0) as u8])
    })
}
