//! Heatmap rendering: colorized change mask blended over the after
//! image.

use image::{GrayImage, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

/// Default overlay opacity used by the pipeline
pub const DEFAULT_OPACITY: f64 = 0.6;

/// Color ramp applied to the change mask
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatmapPalette {
    /// Subtle -> moderate -> dramatic
    #[default]
    YellowOrangeRed,
    BlueCyanGreen,
    Grayscale,
}

impl HeatmapPalette {
    fn colorize(&self, value: u8) -> Rgb<u8> {
        let v = value as u32;
        match self {
            // Hot ramp: red rises first, then green, then blue
            HeatmapPalette::YellowOrangeRed => Rgb([
                (3 * v).min(255) as u8,
                (3 * v).saturating_sub(255).min(255) as u8,
                (3 * v).saturating_sub(510).min(255) as u8,
            ]),
            // Cold ramp: blue rises first, then green
            HeatmapPalette::BlueCyanGreen => Rgb([
                0,
                (3 * v).saturating_sub(255).min(255) as u8,
                (3 * v).min(255) as u8,
            ]),
            HeatmapPalette::Grayscale => Rgb([value, value, value]),
        }
    }
}

/// Alpha-blend the colorized mask over the after image.
pub fn render(mask: &GrayImage, after: &RgbImage, palette: HeatmapPalette, opacity: f64) -> RgbImage {
    let opacity = opacity.clamp(0.0, 1.0);
    let (width, height) = after.dimensions();
    let mut overlay = RgbImage::new(width, height);

    for y in 0..height {
        for x in 0..width {
            let heat = palette.colorize(mask.get_pixel(x, y).0[0]);
            let base = after.get_pixel(x, y);
            let mut blended = [0u8; 3];
            for c in 0..3 {
                let value =
                    base.0[c] as f64 * (1.0 - opacity) + heat.0[c] as f64 * opacity;
                blended[c] = value.round().min(255.0) as u8;
            }
            overlay.put_pixel(x, y, Rgb(blended));
        }
    }

    overlay
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};

    #[test]
    fn unchanged_pixels_darken_toward_palette_zero() {
        let mask = GrayImage::new(4, 4);
        let after: RgbImage = ImageBuffer::from_pixel(4, 4, Rgb([200, 200, 200]));
        let overlay = render(&mask, &after, HeatmapPalette::YellowOrangeRed, 0.5);
        // 200 * 0.5 + 0 * 0.5
        assert_eq!(overlay.get_pixel(0, 0), &Rgb([100, 100, 100]));
    }

    #[test]
    fn changed_pixels_take_palette_color() {
        let mut mask = GrayImage::new(2, 2);
        mask.put_pixel(0, 0, Luma([255]));
        let after: RgbImage = ImageBuffer::from_pixel(2, 2, Rgb([0, 0, 0]));

        let hot = render(&mask, &after, HeatmapPalette::YellowOrangeRed, 1.0);
        assert_eq!(hot.get_pixel(0, 0), &Rgb([255, 255, 255]));

        let cold = render(&mask, &after, HeatmapPalette::BlueCyanGreen, 1.0);
        assert_eq!(cold.get_pixel(0, 0).0[2], 255);
        assert_eq!(cold.get_pixel(0, 0).0[0], 0);
    }

    #[test]
    fn opacity_is_clamped() {
        let mask = GrayImage::new(1, 1);
        let after: RgbImage = ImageBuffer::from_pixel(1, 1, Rgb([100, 100, 100]));
        let overlay = render(&mask, &after, HeatmapPalette::Grayscale, 2.0);
        assert_eq!(overlay.get_pixel(0, 0), &Rgb([0, 0, 0]));
    }
}
