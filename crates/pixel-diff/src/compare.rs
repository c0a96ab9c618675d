//! Pixel comparator: decode, normalize, mask, count.

use image::{imageops::FilterType, GrayImage, Luma, RgbImage};
use imageproc::filter::gaussian_blur_f32;
use tracing::{debug, warn};
use vigil_core_types::{BoundingBox, ComparisonConfig, PixelDiffResult};

use crate::errors::DiffError;
use crate::heatmap::{self, HeatmapPalette};
use crate::regions;

/// Default minimum area (in pixels) for a reported change region
pub const DEFAULT_MIN_REGION_SIZE: u32 = 100;

/// Normalized image pair plus the thresholded change mask
pub(crate) struct DiffMask {
    pub mask: GrayImage,
    pub after: RgbImage,
}

/// Deterministic screenshot comparator
pub struct PixelComparator {
    config: ComparisonConfig,
}

impl PixelComparator {
    pub fn new(config: ComparisonConfig) -> Self {
        Self { config }
    }

    /// Compare two encoded images and count changed pixels.
    pub fn compare(
        &self,
        before: &[u8],
        after: &[u8],
        threshold: u8,
    ) -> Result<PixelDiffResult, DiffError> {
        let diff = self.diff_mask(before, after, threshold)?;
        let (width, height) = diff.mask.dimensions();

        let changed_pixels = diff
            .mask
            .pixels()
            .filter(|pixel| pixel.0[0] != 0)
            .count() as u64;
        let total_pixels = width as u64 * height as u64;
        let changed_percentage = changed_pixels as f64 / total_pixels as f64 * 100.0;

        debug!(
            changed_pixels,
            total_pixels, changed_percentage, "pixel comparison complete"
        );

        Ok(PixelDiffResult {
            threshold,
            changed_pixels,
            total_pixels,
            changed_percentage,
            regions: Vec::new(),
        })
    }

    /// Extract bounding boxes of contiguous changed regions, filtered
    /// by a minimum area.
    pub fn find_change_regions(
        &self,
        before: &[u8],
        after: &[u8],
        threshold: u8,
        min_region_size: u32,
    ) -> Result<Vec<BoundingBox>, DiffError> {
        let diff = self.diff_mask(before, after, threshold)?;
        let found = regions::regions_from_mask(&diff.mask, min_region_size);
        debug!(count = found.len(), "change regions extracted");
        Ok(found)
    }

    /// Render the change mask over the after image and write a PNG
    /// artifact. Returns the written path.
    pub fn create_heatmap(
        &self,
        before: &[u8],
        after: &[u8],
        threshold: u8,
        palette: HeatmapPalette,
        opacity: f64,
        output: &std::path::Path,
    ) -> Result<std::path::PathBuf, DiffError> {
        let diff = self.diff_mask(before, after, threshold)?;
        let overlay = heatmap::render(&diff.mask, &diff.after, palette, opacity);

        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        overlay
            .save(output)
            .map_err(|err| DiffError::Image(format!("failed to write heatmap: {}", err)))?;
        Ok(output.to_path_buf())
    }

    /// Decode both images, normalize dimensions, optionally blur, and
    /// produce the binary change mask.
    pub(crate) fn diff_mask(
        &self,
        before: &[u8],
        after: &[u8],
        threshold: u8,
    ) -> Result<DiffMask, DiffError> {
        let before = decode(before, "before")?;
        let mut after = decode(after, "after")?;

        // Dimension mismatch is a declared lossy normalization, not
        // an error: the after image is resampled to the baseline.
        if after.dimensions() != before.dimensions() {
            let (width, height) = before.dimensions();
            warn!(
                before_dims = ?before.dimensions(),
                after_dims = ?after.dimensions(),
                "image size mismatch, resizing after to baseline"
            );
            after = image::imageops::resize(&after, width, height, FilterType::Triangle);
        }

        let (before, after) = if self.config.enable_anti_aliasing_filter {
            let sigma = kernel_sigma(self.config.effective_kernel_size());
            (
                gaussian_blur_f32(&before, sigma),
                gaussian_blur_f32(&after, sigma),
            )
        } else {
            (before, after)
        };

        let (width, height) = before.dimensions();
        let mut mask = GrayImage::new(width, height);

        for y in 0..height {
            for x in 0..width {
                let a = before.get_pixel(x, y);
                let b = after.get_pixel(x, y);

                // Per-channel absolute difference reduced to one
                // intensity channel by luma weighting.
                let dr = (a.0[0] as f32 - b.0[0] as f32).abs();
                let dg = (a.0[1] as f32 - b.0[1] as f32).abs();
                let db = (a.0[2] as f32 - b.0[2] as f32).abs();
                let intensity = 0.299 * dr + 0.587 * dg + 0.114 * db;

                let value = if intensity > threshold as f32 { 255 } else { 0 };
                mask.put_pixel(x, y, Luma([value]));
            }
        }

        Ok(DiffMask { mask, after })
    }
}

fn decode(bytes: &[u8], role: &str) -> Result<RgbImage, DiffError> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgb8())
        .map_err(|err| DiffError::Load(format!("{} image: {}", role, err)))
}

/// Gaussian sigma for a given odd kernel size, matching the sigma
/// OpenCV derives when none is supplied.
fn kernel_sigma(kernel_size: u32) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use std::io::Cursor;

    fn encode_png(img: &RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageOutputFormat::Png)
            .unwrap();
        buf
    }

    fn solid(width: u32, height: u32, color: [u8; 3]) -> RgbImage {
        ImageBuffer::from_pixel(width, height, Rgb(color))
    }

    fn comparator_plain() -> PixelComparator {
        let mut config = ComparisonConfig::default();
        config.enable_anti_aliasing_filter = false;
        PixelComparator::new(config)
    }

    #[test]
    fn identical_images_have_zero_diff_at_all_thresholds() {
        let png = encode_png(&solid(64, 64, [200, 50, 50]));
        let comparator = comparator_plain();
        for threshold in 1..=3u8 {
            let result = comparator.compare(&png, &png, threshold).unwrap();
            assert_eq!(result.changed_pixels, 0);
            assert_eq!(result.changed_percentage, 0.0);
            assert_eq!(result.total_pixels, 64 * 64);
        }
    }

    #[test]
    fn fully_different_images_change_every_pixel() {
        let before = encode_png(&solid(32, 32, [0, 0, 0]));
        let after = encode_png(&solid(32, 32, [255, 255, 255]));
        let result = comparator_plain().compare(&before, &after, 2).unwrap();
        assert_eq!(result.changed_pixels, 32 * 32);
        assert_eq!(result.changed_percentage, 100.0);
    }

    #[test]
    fn size_mismatch_resizes_after_to_baseline() {
        let before = encode_png(&solid(40, 40, [10, 10, 10]));
        let after = encode_png(&solid(80, 80, [10, 10, 10]));
        let result = comparator_plain().compare(&before, &after, 2).unwrap();
        assert_eq!(result.total_pixels, 40 * 40);
        assert_eq!(result.changed_pixels, 0);
    }

    #[test]
    fn inserted_block_is_counted_and_localized() {
        let base = solid(200, 200, [255, 255, 255]);
        let mut changed = base.clone();
        for y in 30..80 {
            for x in 60..110 {
                changed.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
        let before = encode_png(&base);
        let after = encode_png(&changed);
        let comparator = comparator_plain();

        let result = comparator.compare(&before, &after, 2).unwrap();
        assert_eq!(result.changed_pixels, 2500);

        let regions = comparator
            .find_change_regions(&before, &after, 2, DEFAULT_MIN_REGION_SIZE)
            .unwrap();
        assert_eq!(regions.len(), 1);
        let region = regions[0];
        assert_eq!((region.x, region.y), (60, 30));
        assert_eq!((region.width, region.height), (50, 50));
    }

    #[test]
    fn corrupt_bytes_are_a_load_error() {
        let err = comparator_plain()
            .compare(b"not a png", b"also not a png", 2)
            .unwrap_err();
        assert!(matches!(err, DiffError::Load(_)));
    }

    #[test]
    fn blur_suppresses_single_pixel_noise() {
        let base = solid(50, 50, [128, 128, 128]);
        let mut noisy = base.clone();
        noisy.put_pixel(25, 25, Rgb([131, 131, 131]));

        let before = encode_png(&base);
        let after = encode_png(&noisy);

        let mut config = ComparisonConfig::default();
        config.enable_anti_aliasing_filter = true;
        config.anti_aliasing_kernel_size = 3;
        let blurred = PixelComparator::new(config).compare(&before, &after, 2).unwrap();
        let plain = comparator_plain().compare(&before, &after, 2).unwrap();
        assert!(blurred.changed_pixels <= plain.changed_pixels);
    }
}
