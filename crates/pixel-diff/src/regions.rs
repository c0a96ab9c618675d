//! Connected-component extraction over the thresholded change mask.

use std::collections::BTreeMap;

use image::GrayImage;
use imageproc::region_labelling::{connected_components, Connectivity};
use vigil_core_types::BoundingBox;

struct Extent {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

/// Bounding boxes of contiguous changed areas with area >=
/// `min_region_size`, in stable label order.
pub fn regions_from_mask(mask: &GrayImage, min_region_size: u32) -> Vec<BoundingBox> {
    let labelled = connected_components(mask, Connectivity::Eight, image::Luma([0u8]));

    // BTreeMap keeps label order deterministic across runs.
    let mut extents: BTreeMap<u32, Extent> = BTreeMap::new();
    for (x, y, pixel) in labelled.enumerate_pixels() {
        let label = pixel.0[0];
        if label == 0 {
            continue;
        }
        extents
            .entry(label)
            .and_modify(|e| {
                e.min_x = e.min_x.min(x);
                e.min_y = e.min_y.min(y);
                e.max_x = e.max_x.max(x);
                e.max_y = e.max_y.max(y);
            })
            .or_insert(Extent {
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
            });
    }

    extents
        .values()
        .map(|e| {
            BoundingBox::new(
                e.min_x,
                e.min_y,
                e.max_x - e.min_x + 1,
                e.max_y - e.min_y + 1,
            )
        })
        .filter(|bbox| bbox.area() >= min_region_size as u64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn mask_with_block(x0: u32, y0: u32, side: u32) -> GrayImage {
        let mut mask = GrayImage::new(100, 100);
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        mask
    }

    #[test]
    fn single_block_yields_single_region() {
        let mask = mask_with_block(10, 20, 30);
        let regions = regions_from_mask(&mask, 100);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0], BoundingBox::new(10, 20, 30, 30));
    }

    #[test]
    fn small_regions_are_filtered() {
        let mask = mask_with_block(5, 5, 3);
        assert!(regions_from_mask(&mask, 100).is_empty());
        assert_eq!(regions_from_mask(&mask, 9).len(), 1);
    }

    #[test]
    fn disjoint_blocks_yield_separate_regions() {
        let mut mask = mask_with_block(0, 0, 20);
        for y in 60..80 {
            for x in 60..80 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        let regions = regions_from_mask(&mask, 100);
        assert_eq!(regions.len(), 2);
    }

    #[test]
    fn empty_mask_has_no_regions() {
        let mask = GrayImage::new(50, 50);
        assert!(regions_from_mask(&mask, 1).is_empty());
    }
}
