//! Styled renderers for a QR module matrix.
//!
//! Every renderer draws the same quiet zone and finder geometry. Only the
//! fill of each dark module changes between styles.

pub mod color;
mod shapes;

pub use color::{extract_dominant, extract_palette, Color, Hsl, Palette};

use image::{Rgba, RgbaImage};

use crate::builder::QR;

/// Quiet zone width in modules.
pub const QUIET_ZONE: u32 = 4;
pub const DEFAULT_MODULE_PX: u32 = 16;
pub const MIN_MODULE_PX: u32 = 4;
pub const DEFAULT_OVERLAY_OPACITY: f32 = 0.8;

// Channel floor for a pixel to count as background in transparent overlays
const NEAR_WHITE: u8 = 200;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Style {
    Plain,
    Dotted,
    Rounded,
    Bubble { color: Color },
    Pseudo3d { color: Color },
    Tricolor { colors: [Color; 3] },
    /// Background becomes fully transparent. Dark modules keep `opacity`, or
    /// full opacity when `blend` is set.
    TransparentOverlay { opacity: f32, blend: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    module_px: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { module_px: DEFAULT_MODULE_PX }
    }
}

impl RenderOptions {
    pub fn new(module_px: u32) -> Self {
        Self { module_px: module_px.max(MIN_MODULE_PX) }
    }

    pub fn module_px(&self) -> u32 {
        self.module_px
    }

    /// Side of the rendered raster for a symbol of width `w` modules.
    pub fn canvas_size(&self, w: usize) -> u32 {
        (w as u32 + 2 * QUIET_ZONE) * self.module_px
    }
}

impl Style {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Dotted => "dotted",
            Self::Rounded => "rounded",
            Self::Bubble { .. } => "bubble",
            Self::Pseudo3d { .. } => "pseudo3d",
            Self::Tricolor { .. } => "tricolor",
            Self::TransparentOverlay { .. } => "transparent-overlay",
        }
    }

    pub fn render(&self, qr: &QR, opts: RenderOptions) -> RgbaImage {
        if let Self::TransparentOverlay { opacity, blend } = *self {
            let alpha = if blend { 255 } else { (opacity.clamp(0.0, 1.0) * 255.0).round() as u8 };
            return to_transparent(Style::Plain.render(qr, opts), alpha);
        }

        let px = opts.module_px();
        let size = opts.canvas_size(qr.width());
        let mut img = RgbaImage::from_pixel(size, size, Color::WHITE.to_rgba(255));

        let w = qr.width() as i16;
        for r in 0..w {
            for c in 0..w {
                if !qr.is_dark(r, c) {
                    continue;
                }
                let x = (c as u32 + QUIET_ZONE) * px;
                let y = (r as u32 + QUIET_ZONE) * px;
                let fill = self.fill(r, c);
                if qr.is_finder(r, c) {
                    shapes::square(&mut img, x, y, px, fill);
                    continue;
                }
                match self {
                    Self::Dotted => shapes::dot(&mut img, x, y, px, fill),
                    Self::Rounded | Self::Bubble { .. } => {
                        shapes::rounded_square(&mut img, x, y, px, fill)
                    }
                    Self::Pseudo3d { color } => {
                        // Shadow offset down-right, module on top, both inside the cell
                        let off = (px / 6).max(1);
                        let shadow = color.darken(SHADOW_DARKEN).to_rgba(255);
                        shapes::square(&mut img, x + off, y + off, px - off, shadow);
                        shapes::square(&mut img, x, y, px - off, fill);
                    }
                    _ => shapes::square(&mut img, x, y, px, fill),
                }
            }
        }
        img
    }

    fn fill(&self, r: i16, c: i16) -> Rgba<u8> {
        match self {
            Self::Bubble { color } | Self::Pseudo3d { color } => color.to_rgba(255),
            Self::Tricolor { colors } => colors[(r + c) as usize % 3].to_rgba(255),
            _ => Color::BLACK.to_rgba(255),
        }
    }
}

const SHADOW_DARKEN: f32 = 15.0;

fn to_transparent(mut img: RgbaImage, alpha: u8) -> RgbaImage {
    for p in img.pixels_mut() {
        *p = if p.0[..3].iter().all(|ch| *ch >= NEAR_WHITE) {
            Rgba([255, 255, 255, 0])
        } else {
            Rgba([p[0], p[1], p[2], alpha])
        };
    }
    img
}
