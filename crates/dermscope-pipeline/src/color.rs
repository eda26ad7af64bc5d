//! CIE L*a*b* conversion.
//!
//! Lab separates lightness from chroma, so pigmented skin and healthy
//! skin fall into distinct clusters even under uneven lighting.
//!
//! Channels are stored on the 8-bit Lab scale so distances and
//! thresholds are comparable to byte-valued images: `L` is mapped from
//! `0..=100` to `0..=255` and `a`/`b` are offset by 128.

use image::{Rgb32FImage, RgbImage};
use palette::{FromColor, Lab, Srgb, white_point::D65};

/// Per-pixel Lab image on the 8-bit scale (`[L, a, b]`).
pub type LabImage = Rgb32FImage;

/// Convert one sRGB byte triple to 8-bit-scaled Lab.
#[must_use]
pub fn srgb_to_lab(rgb: [u8; 3]) -> [f32; 3] {
    let srgb = Srgb::new(
        f32::from(rgb[0]) / 255.0,
        f32::from(rgb[1]) / 255.0,
        f32::from(rgb[2]) / 255.0,
    );
    let lab: Lab<D65, f32> = Lab::from_color(srgb);
    [lab.l * 255.0 / 100.0, lab.a + 128.0, lab.b + 128.0]
}

/// Convert a whole photograph to Lab.
#[must_use = "returns the Lab image"]
pub fn to_lab(image: &RgbImage) -> LabImage {
    LabImage::from_fn(image.width(), image.height(), |x, y| {
        image::Rgb(srgb_to_lab(image.get_pixel(x, y).0))
    })
}
