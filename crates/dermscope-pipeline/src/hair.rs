//! Hair suppression.
//!
//! Hairs are thin dark filaments that would otherwise split the lesion
//! into fragments or get clustered with it. They are located with a
//! black-hat filter on the luminance channel and painted over from the
//! surrounding skin.

use image::{GrayImage, RgbImage};

use crate::config::HairConfig;
use crate::decode::to_gray;
use crate::inpaint::inpaint_telea;
use crate::mask::{binarize, is_empty};
use crate::morphology::{black_hat, dilate, ellipse_kernel, rect_kernel};

/// Output of [`suppress_hair`].
#[derive(Debug, Clone)]
pub struct ArtifactSuppression {
    /// Photograph with hair pixels filled in. Same dimensions as the
    /// input.
    pub cleaned: RgbImage,
    /// Dilated hair mask (255 = filled pixel). All zero when nothing
    /// hair-like was found.
    pub artifact_mask: GrayImage,
}

/// Detect thin dark structures and return their (dilated) mask.
#[must_use = "returns the hair mask"]
pub fn hair_mask(image: &RgbImage, config: &HairConfig) -> GrayImage {
    let gray = to_gray(image);
    let response = black_hat(&gray, &rect_kernel(config.kernel_size));
    let candidates = binarize(&response, config.threshold);
    dilate(&candidates, &ellipse_kernel(config.dilate_size), 1)
}

/// Remove hair from the photograph.
///
/// Never fails. When no hair is detected the returned image equals the
/// input and the mask is empty.
#[must_use = "returns the cleaned photograph and hair mask"]
pub fn suppress_hair(image: &RgbImage, config: &HairConfig) -> ArtifactSuppression {
    let artifact_mask = hair_mask(image, config);
    let cleaned = if is_empty(&artifact_mask) {
        image.clone()
    } else {
        inpaint_telea(image, &artifact_mask, config.inpaint_radius)
    };
    ArtifactSuppression {
        cleaned,
        artifact_mask,
    }
}
