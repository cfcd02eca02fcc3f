use image::{imageops::FilterType, DynamicImage, Rgba};
use num_traits::clamp;

// Hue, saturation & lightness
//------------------------------------------------------------------------------

/// Hue in degrees `[0, 360)`, saturation and lightness in percent.
#[derive(Debug, PartialEq, Copy, Clone)]
pub struct Hsl {
    pub h: f32,
    pub s: f32,
    pub l: f32,
}

impl Hsl {
    pub fn new(h: f32, s: f32, l: f32) -> Self {
        Self { h: h.rem_euclid(360.0), s: clamp(s, 0.0, 100.0), l: clamp(l, 0.0, 100.0) }
    }

    pub fn from_rgb([r, g, b]: [u8; 3]) -> Self {
        let (r, g, b) = (r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let l = (max + min) / 2.0;
        if max == min {
            return Self::new(0.0, 0.0, l * 100.0);
        }

        let d = max - min;
        let s = if l > 0.5 { d / (2.0 - max - min) } else { d / (max + min) };
        let h = if max == r {
            (g - b) / d + if g < b { 6.0 } else { 0.0 }
        } else if max == g {
            (b - r) / d + 2.0
        } else {
            (r - g) / d + 4.0
        };
        Self::new(h * 60.0, s * 100.0, l * 100.0)
    }

    pub fn to_rgb(self) -> [u8; 3] {
        let s = self.s / 100.0;
        let l = self.l / 100.0;
        let a = s * l.min(1.0 - l);
        let f = |n: f32| {
            let k = (n + self.h / 30.0) % 12.0;
            let v = l - a * clamp((k - 3.0).min(9.0 - k), -1.0, 1.0);
            (v * 255.0).round() as u8
        };
        [f(0.0), f(8.0), f(4.0)]
    }
}

// Color
//------------------------------------------------------------------------------

/// RGB colour paired with the HSL it was derived from. The HSL view is
/// authoritative so lightness bounds hold exactly after rounding.
#[derive(Debug, PartialEq, Copy, Clone)]
pub struct Color {
    hsl: Hsl,
    rgb: [u8; 3],
}

pub const SAFE_LIGHTNESS_MIN: f32 = 20.0;
pub const SAFE_LIGHTNESS_MAX: f32 = 45.0;
pub const NEAR_GRAY_SATURATION: f32 = 15.0;
pub const GRAY_REPLACEMENT_SATURATION: f32 = 60.0;
const BOOST_BELOW_SATURATION: f32 = 50.0;
const BOOST_FACTOR: f32 = 1.5;
const BOOST_CEILING: f32 = 85.0;
const MAX_LUMA: f32 = 110.0;
const SAMPLE_SIZE: u32 = 50;

impl Color {
    pub const BLACK: Color = Color { hsl: Hsl { h: 0.0, s: 0.0, l: 0.0 }, rgb: [0, 0, 0] };
    pub const WHITE: Color = Color { hsl: Hsl { h: 0.0, s: 0.0, l: 100.0 }, rgb: [255, 255, 255] };

    pub fn from_hsl(hsl: Hsl) -> Self {
        Self { hsl, rgb: hsl.to_rgb() }
    }

    pub fn from_rgb(rgb: [u8; 3]) -> Self {
        Self { hsl: Hsl::from_rgb(rgb), rgb }
    }

    /// Clamps lightness into the scan-safe band, then lowers it further
    /// until the colour is dark enough to contrast with white.
    pub fn scan_safe(hsl: Hsl) -> Self {
        let mut hsl = Hsl::new(hsl.h, hsl.s, clamp(hsl.l, SAFE_LIGHTNESS_MIN, SAFE_LIGHTNESS_MAX));
        while luma(hsl.to_rgb()) > MAX_LUMA && hsl.l > SAFE_LIGHTNESS_MIN {
            hsl.l = (hsl.l - 1.0).max(SAFE_LIGHTNESS_MIN);
        }
        Self::from_hsl(hsl)
    }

    pub fn hsl(&self) -> Hsl {
        self.hsl
    }

    pub fn rgb(&self) -> [u8; 3] {
        self.rgb
    }

    pub fn to_rgba(&self, alpha: u8) -> Rgba<u8> {
        let [r, g, b] = self.rgb;
        Rgba([r, g, b, alpha])
    }

    pub fn darken(&self, points: f32) -> Self {
        Self::from_hsl(Hsl::new(self.hsl.h, self.hsl.s, self.hsl.l - points))
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::scan_safe(Hsl::new(212.0, 70.0, 35.0))
    }
}

// Rec.601 luma on the 0-255 scale
fn luma([r, g, b]: [u8; 3]) -> f32 {
    0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
}

// Palette
//------------------------------------------------------------------------------

/// Primary, +120°, +240°, complement. Order is stable.
#[derive(Debug, PartialEq, Copy, Clone)]
pub struct Palette([Color; 4]);

impl Palette {
    pub fn from_dominant(primary: Color) -> Self {
        let Hsl { h, s, l } = primary.hsl();
        let complement_l = (l - 10.0).max(SAFE_LIGHTNESS_MIN);
        Self([
            primary,
            Color::scan_safe(Hsl::new(h + 120.0, s, l)),
            Color::scan_safe(Hsl::new(h + 240.0, s, l)),
            Color::scan_safe(Hsl::new(h + 180.0, s, complement_l)),
        ])
    }

    pub fn primary(&self) -> Color {
        self.0[0]
    }

    pub fn colors(&self) -> &[Color; 4] {
        &self.0
    }

    pub fn triad(&self) -> [Color; 3] {
        [self.0[0], self.0[1], self.0[2]]
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::from_dominant(Color::default())
    }
}

// Extraction
//------------------------------------------------------------------------------

pub fn extract_dominant(img: &DynamicImage) -> Color {
    let sample = img.resize_exact(SAMPLE_SIZE, SAMPLE_SIZE, FilterType::Triangle).to_rgb8();

    let mut sum = [0u64; 3];
    let mut max = [0u8; 3];
    for p in sample.pixels() {
        for ch in 0..3 {
            sum[ch] += p[ch] as u64;
            max[ch] = max[ch].max(p[ch]);
        }
    }
    let n = (sample.width() * sample.height()).max(1) as u64;
    let avg = sum.map(|s| (s / n) as u8);

    let Hsl { mut h, mut s, l } = Hsl::from_rgb(avg);
    if s < NEAR_GRAY_SATURATION {
        // Averaged hue is meaningless for gray, pick the strongest channel
        h = if max[0] >= max[1] && max[0] >= max[2] {
            0.0
        } else if max[1] >= max[2] {
            120.0
        } else {
            240.0
        };
        s = GRAY_REPLACEMENT_SATURATION;
    } else if s < BOOST_BELOW_SATURATION {
        s = (s * BOOST_FACTOR).min(BOOST_CEILING);
    }

    Color::scan_safe(Hsl::new(h, s, l))
}

pub fn extract_palette(img: &DynamicImage) -> (Color, Palette) {
    let dominant = extract_dominant(img);
    (dominant, Palette::from_dominant(dominant))
}

#[cfg(test)]
mod color_tests {
    use image::{DynamicImage, Rgb, RgbImage};
    use proptest::prelude::*;
    use test_case::test_case;

    use super::*;

    fn solid(rgb: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, Rgb(rgb)))
    }

    fn hue_distance(a: f32, b: f32) -> f32 {
        let d = (a - b).rem_euclid(360.0);
        d.min(360.0 - d)
    }

    #[test_case([255, 0, 0], 0.0, 100.0, 50.0)]
    #[test_case([0, 255, 0], 120.0, 100.0, 50.0)]
    #[test_case([0, 0, 255], 240.0, 100.0, 50.0)]
    #[test_case([128, 128, 128], 0.0, 0.0, 50.2)]
    fn test_rgb_to_hsl(rgb: [u8; 3], h: f32, s: f32, l: f32) {
        let hsl = Hsl::from_rgb(rgb);
        assert!((hsl.h - h).abs() < 0.5, "{hsl:?}");
        assert!((hsl.s - s).abs() < 0.5, "{hsl:?}");
        assert!((hsl.l - l).abs() < 0.5, "{hsl:?}");
    }

    #[test]
    fn test_hsl_to_rgb() {
        assert_eq!(Hsl::new(0.0, 100.0, 50.0).to_rgb(), [255, 0, 0]);
        assert_eq!(Hsl::new(240.0, 100.0, 25.0).to_rgb(), [0, 0, 128]);
        assert_eq!(Hsl::new(0.0, 0.0, 100.0).to_rgb(), [255, 255, 255]);
    }

    #[test]
    fn test_gray_source_gets_hue_bucket() {
        let c = extract_dominant(&solid([200, 200, 200]));
        assert_eq!(c.hsl().h, 0.0);
        assert_eq!(c.hsl().s, GRAY_REPLACEMENT_SATURATION);
        assert!(c.hsl().l <= SAFE_LIGHTNESS_MAX);
    }

    #[test]
    fn test_yellow_is_darkened() {
        let c = extract_dominant(&solid([250, 240, 20]));
        assert!(luma(c.rgb()) <= MAX_LUMA);
        assert!(c.hsl().l >= SAFE_LIGHTNESS_MIN);
    }

    #[test]
    fn test_low_saturation_is_boosted() {
        // Muted blue, saturation ~ 20%
        let src = Hsl::from_rgb([90, 100, 130]);
        let c = extract_dominant(&solid([90, 100, 130]));
        assert!(c.hsl().s > src.s);
        assert!(c.hsl().s <= BOOST_CEILING);
    }

    #[test]
    fn test_default_color() {
        let c = Color::default();
        assert_eq!(c.hsl(), Hsl::new(212.0, 70.0, 35.0));
    }

    #[test]
    fn test_palette_order() {
        let p = Palette::from_dominant(Color::scan_safe(Hsl::new(30.0, 70.0, 35.0)));
        let hues = p.colors().map(|c| c.hsl().h);
        assert_eq!(hues, [30.0, 150.0, 270.0, 210.0]);
        assert!(p.colors()[3].hsl().l <= p.colors()[0].hsl().l);
    }

    proptest! {
        #[test]
        fn proptest_extracted_lightness_is_safe(r: u8, g: u8, b: u8) {
            let (dominant, palette) = extract_palette(&solid([r, g, b]));
            for c in std::iter::once(&dominant).chain(palette.colors()) {
                let l = c.hsl().l;
                prop_assert!((SAFE_LIGHTNESS_MIN..=SAFE_LIGHTNESS_MAX).contains(&l), "{c:?}");
            }
        }

        #[test]
        fn proptest_near_gray_saturation_floor(v in 64u8..=200, dr in 0u8..4, dg in 0u8..4) {
            let c = extract_dominant(&solid([v.saturating_sub(dr), v.saturating_sub(dg), v]));
            prop_assert!(c.hsl().s >= GRAY_REPLACEMENT_SATURATION);
        }

        #[test]
        fn proptest_palette_hues_distinct(r: u8, g: u8, b: u8) {
            let (_, palette) = extract_palette(&solid([r, g, b]));
            let hues = palette.colors().map(|c| c.hsl().h);
            for i in 0..4 {
                for j in i + 1..4 {
                    prop_assert!(hue_distance(hues[i], hues[j]) >= 59.0, "{hues:?}");
                }
            }
        }

        #[test]
        fn proptest_extraction_is_deterministic(r: u8, g: u8, b: u8) {
            let img = solid([r, g, b]);
            prop_assert_eq!(extract_palette(&img), extract_palette(&img));
        }
    }
}
