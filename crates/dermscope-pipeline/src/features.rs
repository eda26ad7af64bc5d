//! ABCD lesion descriptors.
//!
//! - **A**symmetry: mirror disagreement of the mask about both axes.
//! - **B**order irregularity: one minus the circularity of the outline.
//! - **C**olor variation: spread of the Lab chroma channels inside the
//!   lesion.
//! - **D**iameter: diameter of the circle with the lesion's calibrated
//!   area.

use std::f64::consts::PI;

use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

use crate::color::srgb_to_lab;
use crate::contour::largest_external_contour;
use crate::mask::{bounding_box, count_foreground};
use crate::risk::abcd_risk;

/// The four descriptors of one lesion.
///
/// Serialized under the single-letter keys used in measurement
/// records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbcdFeatures {
    /// Mirror disagreement, in `[0, 1]`.
    #[serde(rename = "A")]
    pub asymmetry: f64,
    /// `1 - circularity`, `>= 0`.
    #[serde(rename = "B")]
    pub border_irregularity: f64,
    /// Sum of the a* and b* standard deviations, `>= 0`.
    #[serde(rename = "C")]
    pub color_variation: f64,
    /// Equivalent diameter in millimeters.
    #[serde(rename = "D")]
    pub diameter_mm: f64,
}

impl AbcdFeatures {
    /// Weighted ABCD risk of these descriptors.
    #[must_use]
    pub fn risk(&self) -> f64 {
        abcd_risk(self)
    }
}

/// Mirror asymmetry of a mask.
///
/// The mask is cropped to its bounding box and trimmed to even
/// dimensions so the mirrored halves align. Pixels that disagree with
/// the horizontal mirror and with the vertical mirror are counted,
/// summed, and divided by twice the lesion area. Empty masks score 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn asymmetry(mask: &GrayImage) -> f64 {
    let area = count_foreground(mask);
    let Some(bbox) = bounding_box(mask) else {
        return 0.0;
    };
    let w = bbox.width() - bbox.width() % 2;
    let h = bbox.height() - bbox.height() % 2;
    let inside = |x: u32, y: u32| mask.get_pixel(bbox.x_min + x, bbox.y_min + y).0[0] > 0;

    let mut diff = 0u64;
    for y in 0..h {
        for x in 0..w {
            let here = inside(x, y);
            diff += u64::from(here != inside(w - 1 - x, y));
            diff += u64::from(here != inside(x, h - 1 - y));
        }
    }
    (diff as f64 / (2 * area) as f64).clamp(0.0, 1.0)
}

/// One minus the circularity `4πA / P²` of the largest outline,
/// floored at 0. Masks without a usable outline score 0.
#[must_use]
pub fn border_irregularity(mask: &GrayImage) -> f64 {
    let Some(contour) = largest_external_contour(mask) else {
        return 0.0;
    };
    let perimeter = contour.perimeter();
    if perimeter <= 0.0 {
        return 0.0;
    }
    (1.0 - 4.0 * PI * contour.area() / (perimeter * perimeter)).max(0.0)
}

/// Sum of the population standard deviations of the a* and b* channels
/// over lesion pixels. No lesion pixels scores 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn color_variation(image: &RgbImage, mask: &GrayImage) -> f64 {
    let mut n = 0u64;
    let mut sum = [0.0f64; 2];
    let mut sum_sq = [0.0f64; 2];
    for (pixel, m) in image.pixels().zip(mask.pixels()) {
        if m.0[0] == 0 {
            continue;
        }
        let [_, a, b] = srgb_to_lab(pixel.0);
        for (i, v) in [f64::from(a), f64::from(b)].into_iter().enumerate() {
            sum[i] += v;
            sum_sq[i] += v * v;
        }
        n += 1;
    }
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    (0..2)
        .map(|i| {
            let mean = sum[i] / n;
            (sum_sq[i] / n - mean * mean).max(0.0).sqrt()
        })
        .sum()
}

/// Diameter of the circle whose area is `area_mm2`.
#[must_use]
pub fn equivalent_diameter(area_mm2: f64) -> f64 {
    2.0 * (area_mm2.max(0.0) / PI).sqrt()
}

/// Compute all four descriptors of a calibrated lesion.
///
/// `image` is the original photograph, `mask` the final lesion mask.
#[must_use]
pub fn extract_features(image: &RgbImage, mask: &GrayImage, area_mm2: f64) -> AbcdFeatures {
    AbcdFeatures {
        asymmetry: asymmetry(mask),
        border_irregularity: border_irregularity(mask),
        color_variation: color_variation(image, mask),
        diameter_mm: equivalent_diameter(area_mm2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::FOREGROUND;

    fn disk(size: u32, r: i64) -> GrayImage {
        let c = i64::from(size / 2);
        GrayImage::from_fn(size, size, |x, y| {
            let (dx, dy) = (i64::from(x) - c, i64::from(y) - c);
            image::Luma([if dx * dx + dy * dy <= r * r { FOREGROUND } else { 0 }])
        })
    }

    fn rect(w: u32, h: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            image::Luma([if (x0..x1).contains(&x) && (y0..y1).contains(&y) {
                FOREGROUND
            } else {
                0
            }])
        })
    }

    #[test]
    fn symmetric_mask_has_zero_asymmetry() {
        assert!(asymmetry(&rect(50, 50, 10, 12, 30, 40)).abs() < 1e-12);
        assert!(asymmetry(&disk(80, 25)) < 0.1);
    }

    #[test]
    fn empty_mask_scores_zero() {
        let empty = GrayImage::new(20, 20);
        assert!(asymmetry(&empty).abs() < 1e-12);
        assert!(border_irregularity(&empty).abs() < 1e-12);
        let img = RgbImage::from_pixel(20, 20, image::Rgb([100, 50, 40]));
        assert!(color_variation(&img, &empty).abs() < 1e-12);
    }

    #[test]
    fn triangle_is_asymmetric_but_bounded() {
        let mask = GrayImage::from_fn(60, 60, |x, y| {
            image::Luma([if x >= 10 && y >= 10 && x < 50 && y < 50 && x - 10 <= y - 10 {
                FOREGROUND
            } else {
                0
            }])
        });
        let a = asymmetry(&mask);
        assert!(a > 0.3, "A = {a}");
        assert!(a <= 1.0);
    }

    #[test]
    fn disk_is_nearly_circular() {
        for r in [20, 40, 80] {
            let size = u32::try_from(2 * r + 20).unwrap_or(200);
            let b = border_irregularity(&disk(size, r));
            assert!(b < 0.2, "r = {r}, B = {b}");
        }
    }

    #[test]
    fn thin_rectangle_is_irregular() {
        let b_rect = border_irregularity(&rect(140, 40, 20, 15, 120, 25));
        let b_disk = border_irregularity(&disk(100, 30));
        assert!(b_rect > 0.6, "B = {b_rect}");
        assert!(b_rect > b_disk);
    }

    #[test]
    fn uniform_color_has_no_variation() {
        let img = RgbImage::from_pixel(30, 30, image::Rgb([120, 70, 50]));
        let c = color_variation(&img, &disk(30, 10));
        assert!(c < 1e-3, "C = {c}");
    }

    #[test]
    fn two_tone_lesion_varies() {
        let img = RgbImage::from_fn(30, 30, |x, _| {
            image::Rgb(if x < 15 { [120, 70, 50] } else { [60, 40, 90] })
        });
        let c = color_variation(&img, &disk(30, 10));
        assert!(c > 5.0, "C = {c}");
    }

    #[test]
    fn equivalent_diameter_round_trips() {
        for d in [1.0, 6.0, 12.5] {
            let area = PI * (d / 2.0) * (d / 2.0);
            assert!((equivalent_diameter(area) - d).abs() < 1e-9);
        }
        assert!(equivalent_diameter(0.0).abs() < 1e-12);
    }

    #[test]
    fn equivalent_diameter_is_monotonic() {
        let ds: Vec<f64> = [0.5, 1.0, 10.0, 28.27, 100.0]
            .iter()
            .map(|&a| equivalent_diameter(a))
            .collect();
        assert!(ds.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn extract_features_combines_descriptors() {
        let img = RgbImage::from_pixel(80, 80, image::Rgb([90, 60, 50]));
        let mask = disk(80, 25);
        let f = extract_features(&img, &mask, 28.274_333_882_308_138);
        assert!(f.asymmetry < 0.1);
        assert!(f.border_irregularity < 0.2);
        assert!(f.color_variation < 1e-3);
        assert!((f.diameter_mm - 6.0).abs() < 1e-9);
    }

    #[test]
    fn serialized_with_letter_keys() {
        let f = AbcdFeatures {
            asymmetry: 0.1,
            border_irregularity: 0.2,
            color_variation: 3.0,
            diameter_mm: 4.0,
        };
        let json = serde_json::to_value(f).unwrap_or_default();
        assert_eq!(json["A"], 0.1);
        assert_eq!(json["D"], 4.0);
    }
}
