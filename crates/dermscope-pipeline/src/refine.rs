//! Lesion mask cleanup.
//!
//! The raw cluster mask is ragged: pores, residual hair, glare streaks.
//! Cleanup smooths it morphologically, drops noise and thin streaks,
//! and replaces the largest surviving region by its convex hull.

use image::GrayImage;

use crate::config::RefinementConfig;
use crate::contour::{Contour, external_contours, fill_polygon};
use crate::morphology::{close, dilate, ellipse_kernel, open, rect_kernel};

/// Output of [`clean_lesion_mask`].
#[derive(Debug, Clone)]
pub struct Refinement {
    /// Final lesion mask: a single convex region, or empty.
    pub mask: GrayImage,
    /// External contours found after smoothing.
    pub contours_found: usize,
    /// Contours that passed the area and elongation filters.
    pub contours_kept: usize,
}

/// Whether a contour is plausible lesion tissue.
///
/// Rejects regions smaller than `min_area`, and thin streaks: bounding
/// box more elongated than `max_aspect_ratio` while smaller than
/// `elongated_area_limit`. Large elongated regions are kept.
#[must_use]
pub fn keep_contour(contour: &Contour, config: &RefinementConfig) -> bool {
    let area = contour.area();
    if area < config.min_area {
        return false;
    }
    !(contour.aspect_ratio() > config.max_aspect_ratio && area < config.elongated_area_limit)
}

/// Clean a raw lesion mask down to one convex region.
///
/// Returns an empty mask (same dimensions) when every contour is
/// filtered out. Never fails.
#[must_use]
pub fn clean_lesion_mask(mask: &GrayImage, config: &RefinementConfig) -> Refinement {
    let (w, h) = mask.dimensions();
    let square = rect_kernel(config.kernel_size);
    let smoothed = open(
        &close(mask, &square, config.close_iterations),
        &square,
        config.open_iterations,
    );

    let contours = external_contours(&smoothed);
    let contours_found = contours.len();
    let kept: Vec<Contour> = contours
        .into_iter()
        .filter(|c| keep_contour(c, config))
        .collect();
    let contours_kept = kept.len();

    let mask = kept
        .iter()
        .max_by(|a, b| a.area().total_cmp(&b.area()))
        .map_or_else(
            || GrayImage::new(w, h),
            |main| {
                let hull = fill_polygon(w, h, &main.convex_hull());
                dilate(&hull, &ellipse_kernel(config.dilate_size), 1)
            },
        );

    Refinement {
        mask,
        contours_found,
        contours_kept,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::contour::largest_external_contour;
    use crate::mask::{FOREGROUND, bounding_box, count_foreground, is_empty};

    fn draw_rect(mask: &mut GrayImage, x0: u32, y0: u32, x1: u32, y1: u32) {
        for y in y0..y1 {
            for x in x0..x1 {
                mask.put_pixel(x, y, image::Luma([FOREGROUND]));
            }
        }
    }

    fn draw_disk(mask: &mut GrayImage, cx: i64, cy: i64, r: i64) {
        for (x, y, p) in mask.enumerate_pixels_mut() {
            let (dx, dy) = (i64::from(x) - cx, i64::from(y) - cy);
            if dx * dx + dy * dy <= r * r {
                p.0[0] = FOREGROUND;
            }
        }
    }

    #[test]
    fn empty_input_stays_empty() {
        let out = clean_lesion_mask(&GrayImage::new(50, 50), &RefinementConfig::default());
        assert!(is_empty(&out.mask));
        assert_eq!(out.contours_found, 0);
        assert_eq!(out.contours_kept, 0);
    }

    #[test]
    fn small_specks_are_noise() {
        let mut mask = GrayImage::new(100, 100);
        draw_rect(&mut mask, 10, 10, 25, 25); // 225 px
        draw_rect(&mut mask, 60, 60, 72, 72); // 144 px
        let out = clean_lesion_mask(&mask, &RefinementConfig::default());
        assert_eq!(out.contours_found, 2);
        assert_eq!(out.contours_kept, 0);
        assert!(is_empty(&out.mask));
    }

    #[test]
    fn thin_small_streak_is_discarded() {
        // 20:1 streak of about 1000 px, like a residual hair.
        let mut mask = GrayImage::new(200, 40);
        draw_rect(&mut mask, 20, 16, 160, 23);
        let out = clean_lesion_mask(&mask, &RefinementConfig::default());
        assert_eq!(out.contours_found, 1);
        assert_eq!(out.contours_kept, 0);
        assert!(is_empty(&out.mask));
    }

    #[test]
    fn large_elongated_region_is_kept() {
        // Same 20:1 proportions but over 5000 px.
        let mut mask = GrayImage::new(440, 50);
        draw_rect(&mut mask, 20, 17, 420, 33);
        let out = clean_lesion_mask(&mask, &RefinementConfig::default());
        assert_eq!(out.contours_kept, 1);
        assert!(count_foreground(&out.mask) >= 400 * 16);
    }

    #[test]
    fn streak_next_to_lesion_is_dropped() {
        let mut mask = GrayImage::new(200, 200);
        draw_disk(&mut mask, 60, 100, 30);
        draw_rect(&mut mask, 120, 20, 190, 24);
        let out = clean_lesion_mask(&mask, &RefinementConfig::default());
        let bbox = bounding_box(&out.mask).unwrap();
        assert!(bbox.x_max < 110, "{bbox:?}");
    }

    #[test]
    fn largest_region_becomes_convex() {
        // A C-shaped region: the hull closes the opening.
        let mut mask = GrayImage::new(120, 120);
        draw_disk(&mut mask, 60, 60, 35);
        draw_rect(&mut mask, 55, 40, 100, 80);
        for (x, y, p) in mask.enumerate_pixels_mut() {
            if (60..100).contains(&x) && (50..70).contains(&y) {
                p.0[0] = 0;
            }
        }
        let out = clean_lesion_mask(&mask, &RefinementConfig::default());
        assert_eq!(out.mask.get_pixel(80, 60).0[0], FOREGROUND);
        let region = largest_external_contour(&out.mask).unwrap();
        assert!(region.convex_hull().area() - region.area() < 0.05 * region.area());
    }

    #[test]
    fn keep_contour_thresholds() {
        let config = RefinementConfig::default();
        let mut mask = GrayImage::new(100, 100);
        draw_rect(&mut mask, 10, 10, 40, 40);
        let square = largest_external_contour(&mask).unwrap();
        assert!(keep_contour(&square, &config));

        let strict = RefinementConfig {
            min_area: 10_000.0,
            ..config
        };
        assert!(!keep_contour(&square, &strict));
    }
}
