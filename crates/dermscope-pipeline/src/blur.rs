//! Gaussian smoothing ahead of clustering and circle detection.
//!
//! Coin detection smooths the grayscale photograph so skin texture does
//! not produce spurious edges; segmentation smooths the color image so
//! pores and specular dots do not form their own clusters.

use image::{GrayImage, RgbImage};

/// Blur a grayscale image with a Gaussian of standard deviation `sigma`.
///
/// A non-positive `sigma` is a no-op (`imageproc` rejects it).
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, sigma: f32) -> GrayImage {
    if sigma > 0.0 {
        imageproc::filter::gaussian_blur_f32(image, sigma)
    } else {
        image.clone()
    }
}

/// Blur each channel of an RGB image; see [`gaussian_blur`].
#[must_use = "returns the blurred image"]
pub fn gaussian_blur_rgb(image: &RgbImage, sigma: f32) -> RgbImage {
    if sigma > 0.0 {
        imageproc::filter::gaussian_blur_f32(image, sigma)
    } else {
        image.clone()
    }
}
