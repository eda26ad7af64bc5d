//! Morphological operators with explicit structuring elements.
//!
//! Thin layer over [`imageproc::morphology`]'s grayscale operators.
//! Adds the elliptical element shape, iteration counts, and the
//! black-hat transform used for hair detection.
//!
//! "Iterations" follow the usual convention: closing with `n`
//! iterations is `n` dilations followed by `n` erosions (not `n`
//! successive closings), and opening is the reverse.

use image::GrayImage;
use imageproc::morphology::Mask;

/// Square structuring element of side `size` (odd), centered.
#[must_use]
pub fn rect_kernel(size: u8) -> Mask {
    Mask::square(size / 2)
}

/// Elliptical structuring element inscribed in a `size x size` square.
///
/// Row `i` spans `c - dx ..= c + dx` where `c = r = size / 2` and
/// `dx = round(c * sqrt((r² - dy²) / r²))`. For `size = 5` this yields a
/// single pixel on the top and bottom rows and full width elsewhere.
#[must_use]
pub fn ellipse_kernel(size: u8) -> Mask {
    let side = u32::from(size.max(1));
    let r = i32::from(size / 2);
    let c = r;
    let elements = GrayImage::from_fn(side, side, |x, y| {
        #[allow(clippy::cast_possible_wrap)]
        let (x, y) = (x as i32, y as i32);
        let dy = y - r;
        let inside = if r == 0 {
            true
        } else {
            let ratio = f64::from(r * r - dy * dy) / f64::from(r * r);
            #[allow(clippy::cast_possible_truncation)]
            let dx = (f64::from(c) * ratio.sqrt()).round() as i32;
            (c - dx..=c + dx).contains(&x)
        };
        image::Luma([if inside { 255 } else { 0 }])
    });
    Mask::from_image(&elements, size / 2, size / 2)
}

/// Dilate `iterations` times.
#[must_use = "returns the dilated image"]
pub fn dilate(image: &GrayImage, kernel: &Mask, iterations: u32) -> GrayImage {
    (0..iterations).fold(image.clone(), |acc, _| {
        imageproc::morphology::grayscale_dilate(&acc, kernel)
    })
}

/// Erode `iterations` times.
#[must_use = "returns the eroded image"]
pub fn erode(image: &GrayImage, kernel: &Mask, iterations: u32) -> GrayImage {
    (0..iterations).fold(image.clone(), |acc, _| {
        imageproc::morphology::grayscale_erode(&acc, kernel)
    })
}

/// Morphological closing: fills gaps narrower than the element.
#[must_use = "returns the closed image"]
pub fn close(image: &GrayImage, kernel: &Mask, iterations: u32) -> GrayImage {
    erode(&dilate(image, kernel, iterations), kernel, iterations)
}

/// Morphological opening: removes specks smaller than the element.
#[must_use = "returns the opened image"]
pub fn open(image: &GrayImage, kernel: &Mask, iterations: u32) -> GrayImage {
    dilate(&erode(image, kernel, iterations), kernel, iterations)
}

/// Black-hat transform: `close(image) - image`.
///
/// Highlights structures darker than their surroundings and narrower
/// than the element, such as hairs on skin.
#[must_use = "returns the black-hat response"]
pub fn black_hat(image: &GrayImage, kernel: &Mask) -> GrayImage {
    let closed = close(image, kernel, 1);
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        image::Luma([closed
            .get_pixel(x, y)
            .0[0]
            .saturating_sub(image.get_pixel(x, y).0[0])])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_pixel(size: u32) -> GrayImage {
        let mut img = GrayImage::new(size, size);
        img.put_pixel(size / 2, size / 2, image::Luma([255]));
        img
    }

    fn rows(img: &GrayImage, from: u32, to: u32) -> Vec<Vec<u8>> {
        (from..to)
            .map(|y| (from..to).map(|x| u8::from(img.get_pixel(x, y).0[0] > 0)).collect())
            .collect()
    }

    #[test]
    fn ellipse_5_has_expected_shape() {
        let dilated = dilate(&single_pixel(9), &ellipse_kernel(5), 1);
        assert_eq!(
            rows(&dilated, 2, 7),
            vec![
                vec![0, 0, 1, 0, 0],
                vec![1, 1, 1, 1, 1],
                vec![1, 1, 1, 1, 1],
                vec![1, 1, 1, 1, 1],
                vec![0, 0, 1, 0, 0],
            ]
        );
    }

    #[test]
    fn ellipse_9_has_expected_rows() {
        let dilated = dilate(&single_pixel(13), &ellipse_kernel(9), 1);
        let widths: Vec<usize> = rows(&dilated, 2, 11)
            .iter()
            .map(|r| r.iter().filter(|&&v| v == 1).count())
            .collect();
        assert_eq!(widths, vec![1, 7, 7, 9, 9, 9, 7, 7, 1]);
    }

    #[test]
    fn rect_kernel_dilates_to_square() {
        let dilated = dilate(&single_pixel(9), &rect_kernel(5), 1);
        let count = dilated.pixels().filter(|p| p.0[0] > 0).count();
        assert_eq!(count, 25);
    }

    #[test]
    fn zero_iterations_is_identity() {
        let img = single_pixel(7);
        assert_eq!(dilate(&img, &rect_kernel(3), 0), img);
        assert_eq!(erode(&img, &rect_kernel(3), 0), img);
    }

    #[test]
    fn open_removes_specks_and_close_fills_gaps() {
        let speck = single_pixel(9);
        assert!(open(&speck, &rect_kernel(3), 1).pixels().all(|p| p.0[0] == 0));

        // A 7x7 block with a one-pixel hole in the middle.
        let mut holed = GrayImage::new(11, 11);
        for y in 2..9 {
            for x in 2..9 {
                holed.put_pixel(x, y, image::Luma([255]));
            }
        }
        holed.put_pixel(5, 5, image::Luma([0]));
        let closed = close(&holed, &rect_kernel(3), 1);
        assert_eq!(closed.get_pixel(5, 5).0[0], 255);
    }

    #[test]
    fn black_hat_highlights_thin_dark_line() {
        // Bright skin with a 2-pixel dark vertical line.
        let img = GrayImage::from_fn(30, 30, |x, _| {
            image::Luma([if x == 14 || x == 15 { 40 } else { 200 }])
        });
        let response = black_hat(&img, &rect_kernel(9));
        assert!(response.get_pixel(14, 15).0[0] >= 150);
        assert_eq!(response.get_pixel(3, 15).0[0], 0);
    }

    #[test]
    fn black_hat_ignores_uniform_image() {
        let img = GrayImage::from_pixel(20, 20, image::Luma([120]));
        assert!(black_hat(&img, &rect_kernel(9)).pixels().all(|p| p.0[0] == 0));
    }
}
