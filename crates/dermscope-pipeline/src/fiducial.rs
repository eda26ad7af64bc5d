//! Reference coin detection and metric calibration.
//!
//! A coin of known diameter lying next to the lesion fixes the
//! photograph's scale. The strongest circle within the configured
//! radius range is taken as the coin.

use image::{GrayImage, RgbImage};

use crate::blur::gaussian_blur;
use crate::config::FiducialConfig;
use crate::decode::to_gray;
use crate::hough::{HoughParams, detect_circles};
use crate::mask::FOREGROUND;
use crate::types::ScaleCalibration;

/// Pixels per millimeter implied by a coin of `radius_px` whose real
/// diameter is `diameter_mm`.
#[must_use]
pub fn pixels_per_mm(radius_px: f64, diameter_mm: f64) -> f64 {
    2.0 * radius_px / diameter_mm
}

/// Filled disk of `radius` pixels around `center`, clipped to the image.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn exclusion_mask(width: u32, height: u32, center: (u32, u32), radius: u32) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    imageproc::drawing::draw_filled_circle_mut(
        &mut mask,
        (center.0 as i32, center.1 as i32),
        radius as i32,
        image::Luma([FOREGROUND]),
    );
    mask
}

/// Locate the coin and derive the photograph's scale.
///
/// Returns `None` when no circle passes detection, which callers must
/// treat as "scale unknown" rather than as an error.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn locate_fiducial(image: &RgbImage, config: &FiducialConfig) -> Option<ScaleCalibration> {
    let (w, h) = image.dimensions();
    let gray = gaussian_blur(&to_gray(image), config.blur_sigma);
    let params = HoughParams {
        dp: config.dp,
        min_dist: config.min_center_distance(w, h),
        canny_high: config.canny_high,
        accumulator_threshold: config.accumulator_threshold,
        min_radius: config.min_radius,
        max_radius: config.resolved_max_radius(w, h),
    };

    let circle = detect_circles(&gray, &params).into_iter().next()?;
    let radius = circle.radius.round();
    if radius < 1.0 {
        return None;
    }
    let center = (
        circle.x.round().clamp(0.0, (w - 1) as f32) as u32,
        circle.y.round().clamp(0.0, (h - 1) as f32) as u32,
    );
    let radius = f64::from(radius);
    let exclusion_radius = (radius * config.exclusion_scale) as u32;

    Some(ScaleCalibration {
        pixels_per_mm: pixels_per_mm(radius, config.diameter_mm),
        fiducial_radius_px: radius,
        fiducial_center: center,
        fiducial_mask: exclusion_mask(w, h, center, exclusion_radius),
    })
}
