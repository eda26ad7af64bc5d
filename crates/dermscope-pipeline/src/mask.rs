//! Binary mask helpers.
//!
//! Masks are `GrayImage`s with the same dimensions as the photograph
//! they were derived from: `255` marks foreground (lesion, hair, coin),
//! `0` marks background. Every non-zero value is treated as foreground
//! on input.

use image::GrayImage;

/// Pixel value written for foreground.
pub const FOREGROUND: u8 = 255;

/// Axis-aligned bounding box of the foreground, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    /// Leftmost foreground column.
    pub x_min: u32,
    /// Topmost foreground row.
    pub y_min: u32,
    /// Rightmost foreground column.
    pub x_max: u32,
    /// Bottom foreground row.
    pub y_max: u32,
}

impl BoundingBox {
    /// Box width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.x_max - self.x_min + 1
    }

    /// Box height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.y_max - self.y_min + 1
    }
}

/// Threshold a single-channel image: values strictly above `threshold`
/// become [`FOREGROUND`], everything else `0`.
#[must_use = "returns the binary mask"]
pub fn binarize(image: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        image::Luma([if image.get_pixel(x, y).0[0] > threshold {
            FOREGROUND
        } else {
            0
        }])
    })
}

/// Zero every pixel of `mask` that is foreground in `exclusion`.
///
/// The two masks must share dimensions; pixels of `mask` outside the
/// exclusion's extent are left untouched.
#[must_use = "returns the mask with the excluded region cleared"]
pub fn exclude_region(mask: &GrayImage, exclusion: &GrayImage) -> GrayImage {
    debug_assert_eq!(mask.dimensions(), exclusion.dimensions());
    let mut out = mask.clone();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        if x < exclusion.width() && y < exclusion.height() && exclusion.get_pixel(x, y).0[0] > 0 {
            pixel.0[0] = 0;
        }
    }
    out
}

/// Number of foreground pixels.
#[must_use]
pub fn count_foreground(mask: &GrayImage) -> u64 {
    mask.pixels().map(|p| u64::from(p.0[0] > 0)).sum()
}

/// Number of pixels that are foreground in both masks.
#[must_use]
pub fn overlap_count(a: &GrayImage, b: &GrayImage) -> u64 {
    a.pixels()
        .zip(b.pixels())
        .map(|(pa, pb)| u64::from(pa.0[0] > 0 && pb.0[0] > 0))
        .sum()
}

/// Whether the mask contains no foreground at all.
#[must_use]
pub fn is_empty(mask: &GrayImage) -> bool {
    mask.pixels().all(|p| p.0[0] == 0)
}

/// Bounding box of the foreground, or `None` for an empty mask.
#[must_use]
pub fn bounding_box(mask: &GrayImage) -> Option<BoundingBox> {
    let mut bbox: Option<BoundingBox> = None;
    for (x, y, pixel) in mask.enumerate_pixels() {
        if pixel.0[0] == 0 {
            continue;
        }
        bbox = Some(match bbox {
            None => BoundingBox {
                x_min: x,
                y_min: y,
                x_max: x,
                y_max: y,
            },
            Some(b) => BoundingBox {
                x_min: b.x_min.min(x),
                y_min: b.y_min.min(y),
                x_max: b.x_max.max(x),
                y_max: b.y_max.max(y),
            },
        });
    }
    bbox
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn square_mask(size: u32, from: u32, to: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            image::Luma([if (from..to).contains(&x) && (from..to).contains(&y) {
                FOREGROUND
            } else {
                0
            }])
        })
    }

    #[test]
    fn binarize_is_strictly_greater() {
        let img = GrayImage::from_fn(3, 1, |x, _| image::Luma([[9, 10, 11][x as usize]]));
        let mask = binarize(&img, 10);
        assert_eq!(mask.as_raw(), &vec![0, 0, FOREGROUND]);
    }

    #[test]
    fn exclude_region_clears_overlap_only() {
        let mask = square_mask(10, 0, 10);
        let exclusion = square_mask(10, 2, 5);
        let out = exclude_region(&mask, &exclusion);
        assert_eq!(count_foreground(&out), 100 - 9);
        assert_eq!(overlap_count(&out, &exclusion), 0);
        assert_eq!(out.get_pixel(0, 0).0[0], FOREGROUND);
    }

    #[test]
    fn empty_mask_has_no_bounding_box() {
        let mask = GrayImage::new(8, 8);
        assert!(is_empty(&mask));
        assert!(bounding_box(&mask).is_none());
    }

    #[test]
    fn bounding_box_is_inclusive() {
        let mask = square_mask(10, 3, 7);
        let bbox = bounding_box(&mask).unwrap();
        assert_eq!(
            bbox,
            BoundingBox {
                x_min: 3,
                y_min: 3,
                x_max: 6,
                y_max: 6
            }
        );
        assert_eq!(bbox.width(), 4);
        assert_eq!(bbox.height(), 4);
    }

    #[test]
    fn nonzero_values_count_as_foreground() {
        let mut mask = GrayImage::new(4, 4);
        mask.put_pixel(1, 1, image::Luma([1]));
        assert_eq!(count_foreground(&mask), 1);
        assert!(!is_empty(&mask));
    }
}
