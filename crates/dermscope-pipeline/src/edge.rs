//! Edge map and gradient field for circle detection.
//!
//! Wraps [`imageproc::edges::canny`] for the binary edge map and
//! [`imageproc::gradients`] Scharr filters for per-pixel gradient
//! direction, which edge pixels follow when voting for circle centers.

use image::{GrayImage, ImageBuffer, Luma};

/// Minimum allowed Canny threshold.
///
/// A zero threshold turns every pixel with any gradient into a
/// candidate edge, which floods the center accumulator.
pub const MIN_THRESHOLD: f32 = 1.0;
const _: () = assert!(MIN_THRESHOLD > 0.0);

/// Canny edge map of `image` (255 on edges, 0 elsewhere).
///
/// `high` is raised to at least [`MIN_THRESHOLD`] and `low` is kept
/// between that floor and `high`.
#[must_use = "returns the binary edge map"]
pub fn edge_map(image: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    let high = high_threshold.max(MIN_THRESHOLD);
    let low = low_threshold.max(MIN_THRESHOLD).min(high);
    imageproc::edges::canny(image, low, high)
}

/// Horizontal and vertical derivatives of a grayscale image.
#[derive(Debug, Clone)]
pub struct GradientField {
    gx: ImageBuffer<Luma<i16>, Vec<i16>>,
    gy: ImageBuffer<Luma<i16>, Vec<i16>>,
}

impl GradientField {
    /// Scharr derivatives of `image`.
    #[must_use]
    pub fn of(image: &GrayImage) -> Self {
        Self {
            gx: imageproc::gradients::horizontal_scharr(image),
            gy: imageproc::gradients::vertical_scharr(image),
        }
    }

    /// Unit gradient direction at `(x, y)`, or `None` on flat ground.
    #[must_use]
    pub fn direction(&self, x: u32, y: u32) -> Option<(f32, f32)> {
        let gx = f32::from(self.gx.get_pixel(x, y).0[0]);
        let gy = f32::from(self.gy.get_pixel(x, y).0[0]);
        let magnitude = gx.hypot(gy);
        (magnitude > f32::EPSILON).then(|| (gx / magnitude, gy / magnitude))
    }
}
