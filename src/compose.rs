//! Places a styled QR raster onto a background canvas.

use image::{imageops, imageops::FilterType, DynamicImage, Rgba, RgbaImage};
use imageproc::filter::gaussian_blur_f32;
use tracing::debug;

use crate::error::ArtError;

pub const CANVAS_SIZE: u32 = 1024;

const FROST_PADDING: f32 = 0.04;
const FROST_PANEL_ALPHA: f32 = 0.85;
const FROST_BLUR_SIGMA: f32 = 12.0;
const FROST_BRIGHTEN: f32 = 20.0;
const FROST_SATURATION: f32 = 0.6;
const HYBRID_UNDERLAY_ALPHA: f32 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipe {
    /// Plain alpha composite of the QR over the background.
    DirectOverlay,
    /// Blurred, brightened and desaturated panel under an opaque QR.
    FrostedGlass,
    /// Transparent QR over the untouched background. Provider input only.
    TransparentBlend,
    /// White underlay, then the QR multiplied onto it.
    Hybrid,
}

impl Recipe {
    /// QR side as a fraction of the canvas side.
    pub fn qr_ratio(self) -> f32 {
        match self {
            Self::DirectOverlay => 0.80,
            Self::FrostedGlass => 0.70,
            Self::TransparentBlend => 0.85,
            Self::Hybrid => 0.75,
        }
    }

    /// Side and top-left offset of the QR footprint on the canvas.
    pub fn footprint(self) -> (u32, u32) {
        let side = (CANVAS_SIZE as f32 * self.qr_ratio()).round() as u32;
        (side, (CANVAS_SIZE - side) / 2)
    }
}

pub fn compose(
    recipe: Recipe,
    background: &RgbaImage,
    styled_qr: &RgbaImage,
) -> Result<RgbaImage, ArtError> {
    if background.width() == 0 || background.height() == 0 {
        return Err(ArtError::InvalidRaster("empty background".to_string()));
    }
    let (qw, qh) = styled_qr.dimensions();
    if qw == 0 || qw != qh {
        return Err(ArtError::InvalidRaster(format!("QR raster must be square, got {qw}x{qh}")));
    }

    let mut canvas = DynamicImage::ImageRgba8(background.clone())
        .resize_to_fill(CANVAS_SIZE, CANVAS_SIZE, FilterType::Triangle)
        .to_rgba8();
    let (side, off) = recipe.footprint();
    let qr = imageops::resize(styled_qr, side, side, FilterType::Nearest);
    debug!(?recipe, qr_side = side, "Compositing");

    match recipe {
        Recipe::DirectOverlay | Recipe::TransparentBlend => {
            imageops::overlay(&mut canvas, &qr, off as i64, off as i64);
        }
        Recipe::FrostedGlass => {
            frost(&mut canvas, off, side);
            imageops::overlay(&mut canvas, &flatten_on_white(qr), off as i64, off as i64);
        }
        Recipe::Hybrid => {
            for y in off..off + side {
                for x in off..off + side {
                    let p = canvas.get_pixel_mut(x, y);
                    *p = lerp_to_white(*p, HYBRID_UNDERLAY_ALPHA);
                }
            }
            multiply(&mut canvas, &qr, off);
        }
    }
    Ok(canvas)
}

// Frosted glass
//------------------------------------------------------------------------------

fn frost(canvas: &mut RgbaImage, off: u32, side: u32) {
    let pad = (CANVAS_SIZE as f32 * FROST_PADDING).round() as u32;
    // Square and centered, so both axes share the origin
    let x0 = off.saturating_sub(pad);
    let panel = (side + 2 * pad).min(CANVAS_SIZE - x0);
    let radius = pad;

    let region = imageops::crop_imm(canvas, x0, x0, panel, panel).to_image();
    let blurred = gaussian_blur_f32(&region, FROST_BLUR_SIGMA);

    for (x, y, p) in blurred.enumerate_pixels() {
        if !in_rounded_rect(x, y, panel, radius) {
            continue;
        }
        let frosted = lerp_to_white(desaturate(brighten(*p)), FROST_PANEL_ALPHA);
        canvas.put_pixel(x0 + x, x0 + y, frosted);
    }
}

fn brighten(p: Rgba<u8>) -> Rgba<u8> {
    let [r, g, b, a] = p.0;
    let up = |c: u8| (c as f32 + FROST_BRIGHTEN).min(255.0) as u8;
    Rgba([up(r), up(g), up(b), a])
}

fn desaturate(p: Rgba<u8>) -> Rgba<u8> {
    let [r, g, b, a] = p.0;
    let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
    let pull = |c: u8| (luma + (c as f32 - luma) * FROST_SATURATION).round().clamp(0.0, 255.0) as u8;
    Rgba([pull(r), pull(g), pull(b), a])
}

fn in_rounded_rect(x: u32, y: u32, side: u32, radius: u32) -> bool {
    if side <= 2 * radius {
        return x < side && y < side;
    }
    let near = |v: u32| v.clamp(radius, side - 1 - radius);
    let (dx, dy) = (x as f32 - near(x) as f32, y as f32 - near(y) as f32);
    dx * dx + dy * dy <= (radius * radius) as f32
}

// Blending
//------------------------------------------------------------------------------

fn lerp_to_white(p: Rgba<u8>, alpha: f32) -> Rgba<u8> {
    let [r, g, b, _] = p.0;
    let mix = |c: u8| (c as f32 * (1.0 - alpha) + 255.0 * alpha).round() as u8;
    Rgba([mix(r), mix(g), mix(b), 255])
}

fn flatten_on_white(mut img: RgbaImage) -> RgbaImage {
    for p in img.pixels_mut() {
        let a = p[3] as f32 / 255.0;
        *p = lerp_to_white(*p, 1.0 - a);
    }
    img
}

// Multiply blend weighted by the top layer's alpha
fn multiply(canvas: &mut RgbaImage, top: &RgbaImage, off: u32) {
    for (x, y, q) in top.enumerate_pixels() {
        let p = canvas.get_pixel_mut(off + x, off + y);
        let a = q[3] as f32 / 255.0;
        for ch in 0..3 {
            let base = p[ch] as f32;
            let product = base * q[ch] as f32 / 255.0;
            p[ch] = (base * (1.0 - a) + product * a).round() as u8;
        }
        p[3] = 255;
    }
}

#[cfg(test)]
mod compose_tests {
    use image::{Rgba, RgbaImage};
    use test_case::test_case;

    use super::{compose, in_rounded_rect, Recipe, CANVAS_SIZE};
    use crate::builder::encode;
    use crate::common::ECLevel;
    use crate::error::ArtError;
    use crate::style::{RenderOptions, Style};
    use crate::verify::verify;

    const URL: &str = "https://example.com";
    const BLUE: Rgba<u8> = Rgba([20, 60, 200, 255]);

    fn checker(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            if (x / 40 + y / 40) % 2 == 0 {
                Rgba([30, 30, 30, 255])
            } else {
                Rgba([240, 200, 40, 255])
            }
        })
    }

    fn qr_raster(style: Style) -> RgbaImage {
        style.render(&encode(URL, ECLevel::H).unwrap(), RenderOptions::default())
    }

    #[test_case(Recipe::DirectOverlay)]
    #[test_case(Recipe::FrostedGlass)]
    #[test_case(Recipe::TransparentBlend)]
    #[test_case(Recipe::Hybrid)]
    fn test_canvas_is_square(recipe: Recipe) {
        let out = compose(recipe, &checker(640, 480), &qr_raster(Style::Plain)).unwrap();
        assert_eq!(out.dimensions(), (CANVAS_SIZE, CANVAS_SIZE));
    }

    #[test]
    fn test_rejects_bad_rasters() {
        let bg = checker(100, 100);
        let wide = RgbaImage::new(20, 10);
        assert!(matches!(compose(Recipe::Hybrid, &bg, &wide), Err(ArtError::InvalidRaster(_))));
        let empty = RgbaImage::new(0, 0);
        let qr = qr_raster(Style::Plain);
        assert!(matches!(
            compose(Recipe::DirectOverlay, &empty, &qr),
            Err(ArtError::InvalidRaster(_))
        ));
    }

    #[test]
    fn test_direct_overlay_is_centered() {
        let bg = RgbaImage::from_pixel(64, 64, BLUE);
        let qr = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]));
        let out = compose(Recipe::DirectOverlay, &bg, &qr).unwrap();
        let (side, off) = Recipe::DirectOverlay.footprint();
        assert_eq!(*out.get_pixel(off, off), Rgba([0, 0, 0, 255]));
        assert_eq!(*out.get_pixel(off + side - 1, off + side - 1), Rgba([0, 0, 0, 255]));
        assert_eq!(*out.get_pixel(off - 1, off - 1), BLUE);
        assert_eq!(*out.get_pixel(0, 0), BLUE);
    }

    #[test]
    fn test_frosted_panel_is_bright() {
        let bg = RgbaImage::from_pixel(64, 64, Rgba([0, 0, 0, 255]));
        let out = compose(Recipe::FrostedGlass, &bg, &qr_raster(Style::Plain)).unwrap();
        let (_, off) = Recipe::FrostedGlass.footprint();
        // Inside the padding band, left of the QR
        let p = out.get_pixel(off - 10, CANVAS_SIZE / 2);
        assert!(p.0[..3].iter().all(|c| *c >= 216), "{p:?}");
        assert_eq!(*out.get_pixel(2, 2), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_hybrid_keeps_dark_modules_dark() {
        let bg = RgbaImage::from_pixel(64, 64, BLUE);
        let out = compose(Recipe::Hybrid, &bg, &qr_raster(Style::Plain)).unwrap();
        let (side, off) = Recipe::Hybrid.footprint();
        // Top-left finder ring sits just inside the quiet zone
        let module = side as f32 / 37.0;
        let x = off + (module * 4.5) as u32;
        assert_eq!(*out.get_pixel(x, x), Rgba([0, 0, 0, 255]));
        // Quiet zone is tinted white over blue, not pure white
        let q = out.get_pixel(off + 2, off + 2);
        assert!(q[2] > q[0] && q[0] >= 190, "{q:?}");
    }

    #[test_case(Recipe::DirectOverlay, Style::Plain)]
    #[test_case(Recipe::FrostedGlass, Style::Plain)]
    #[test_case(Recipe::FrostedGlass, Style::Rounded)]
    #[test_case(Recipe::Hybrid, Style::Plain)]
    fn test_composite_verifies(recipe: Recipe, style: Style) {
        let out = compose(recipe, &checker(800, 800), &qr_raster(style)).unwrap();
        assert!(verify(&out, URL));
    }

    #[test]
    fn test_rounded_rect_corners() {
        assert!(!in_rounded_rect(0, 0, 100, 10));
        assert!(in_rounded_rect(10, 0, 100, 10));
        assert!(in_rounded_rect(50, 50, 100, 10));
        assert!(!in_rounded_rect(99, 99, 100, 10));
    }
}
