//! Overlay rendering.

use image::{GrayImage, RgbImage};

use crate::config::OverlayConfig;

/// Blend a solid highlight layer over the photograph.
///
/// Every pixel becomes `(1 - alpha)·image + alpha·layer`, where the
/// layer is `config.color` on mask pixels and black elsewhere. The
/// whole photograph is therefore dimmed slightly and the lesion tinted.
#[must_use = "returns the overlay image"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn overlay_mask(image: &RgbImage, mask: &GrayImage, config: &OverlayConfig) -> RgbImage {
    let alpha = config.alpha.clamp(0.0, 1.0);
    let keep = 1.0 - alpha;
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let pixel = image.get_pixel(x, y).0;
        let on = mask.get_pixel_checked(x, y).is_some_and(|m| m.0[0] > 0);
        image::Rgb(std::array::from_fn(|c| {
            let layer = if on { f32::from(config.color[c]) } else { 0.0 };
            keep.mul_add(f32::from(pixel[c]), alpha * layer)
                .round()
                .clamp(0.0, 255.0) as u8
        }))
    })
}
