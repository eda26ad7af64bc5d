//! Fast-marching inpainting (Telea).
//!
//! Masked pixels are filled in order of their distance from the mask
//! boundary. The distance field `T` is advanced with a fast-marching
//! solve of `|grad T| = 1`; each newly reached pixel takes a weighted
//! average of already known pixels within `radius`, favouring pixels
//! that are close, lie along the marching direction, and sit on a
//! similar level set.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use image::{GrayImage, RgbImage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flag {
    Known,
    Band,
    Inside,
}

/// Heap entry ordered so the smallest arrival time pops first.
#[derive(Debug, Clone, Copy)]
struct Front {
    t: f32,
    index: usize,
}

impl PartialEq for Front {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Front {}

impl PartialOrd for Front {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Front {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .t
            .total_cmp(&self.t)
            .then_with(|| other.index.cmp(&self.index))
    }
}

struct Field {
    width: usize,
    height: usize,
    flags: Vec<Flag>,
    t: Vec<f32>,
}

impl Field {
    fn neighbor(&self, index: usize, dx: i64, dy: i64) -> Option<usize> {
        #[allow(clippy::cast_possible_wrap)]
        let (x, y) = ((index % self.width) as i64 + dx, (index / self.width) as i64 + dy);
        #[allow(clippy::cast_possible_wrap)]
        let inside = x >= 0 && y >= 0 && x < self.width as i64 && y < self.height as i64;
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        inside.then(|| y as usize * self.width + x as usize)
    }

    /// Arrival time usable for the eikonal solve.
    fn settled(&self, index: Option<usize>) -> Option<f32> {
        index.filter(|&i| self.flags[i] != Flag::Inside).map(|i| self.t[i])
    }

    /// Upwind solve from one vertical and one horizontal neighbor.
    fn solve(&self, a: Option<usize>, b: Option<usize>) -> f32 {
        match (self.settled(a), self.settled(b)) {
            (Some(t1), Some(t2)) => {
                let disc = 2.0 - (t1 - t2) * (t1 - t2);
                if disc < 0.0 {
                    return 1.0 + t1.min(t2);
                }
                let r = disc.sqrt();
                let s = (t1 + t2 - r) / 2.0;
                if s >= t1 && s >= t2 {
                    s
                } else if s + r >= t1 && s + r >= t2 {
                    s + r
                } else {
                    1.0 + t1.min(t2)
                }
            }
            (Some(t), None) | (None, Some(t)) => 1.0 + t,
            (None, None) => f32::INFINITY,
        }
    }

    fn arrival_time(&self, index: usize) -> f32 {
        let up = self.neighbor(index, 0, -1);
        let down = self.neighbor(index, 0, 1);
        let left = self.neighbor(index, -1, 0);
        let right = self.neighbor(index, 1, 0);
        [
            self.solve(up, left),
            self.solve(down, left),
            self.solve(up, right),
            self.solve(down, right),
        ]
        .into_iter()
        .fold(f32::INFINITY, f32::min)
    }

    /// Central-difference gradient of `T`, one-sided where a neighbor
    /// is still unknown.
    fn gradient(&self, index: usize) -> (f32, f32) {
        let axis = |minus: Option<usize>, plus: Option<usize>| {
            let here = self.t[index];
            match (self.settled(minus), self.settled(plus)) {
                (Some(m), Some(p)) => (p - m) / 2.0,
                (Some(m), None) => here - m,
                (None, Some(p)) => p - here,
                (None, None) => 0.0,
            }
        };
        (
            axis(self.neighbor(index, -1, 0), self.neighbor(index, 1, 0)),
            axis(self.neighbor(index, 0, -1), self.neighbor(index, 0, 1)),
        )
    }
}

/// Fill every foreground pixel of `mask` from its surroundings.
///
/// Pixels outside the mask are copied unchanged. A mask without
/// foreground returns a copy of `image`.
#[must_use = "returns the inpainted image"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn inpaint_telea(image: &RgbImage, mask: &GrayImage, radius: f32) -> RgbImage {
    debug_assert_eq!(image.dimensions(), mask.dimensions());
    let (w, h) = image.dimensions();
    let (width, height) = (w as usize, h as usize);
    let mut out = image.clone();

    let flags: Vec<Flag> = mask
        .pixels()
        .map(|p| if p.0[0] > 0 { Flag::Inside } else { Flag::Known })
        .collect();
    if flags.iter().all(|&f| f == Flag::Known) {
        return out;
    }
    let t = flags
        .iter()
        .map(|&f| if f == Flag::Inside { f32::INFINITY } else { 0.0 })
        .collect();
    let mut field = Field {
        width,
        height,
        flags,
        t,
    };

    // Known pixels touching the mask form the initial front.
    let mut heap = BinaryHeap::new();
    for index in 0..width * height {
        if field.flags[index] != Flag::Known {
            continue;
        }
        let touches = [(0, -1), (0, 1), (-1, 0), (1, 0)].iter().any(|&(dx, dy)| {
            field
                .neighbor(index, dx, dy)
                .is_some_and(|n| field.flags[n] == Flag::Inside)
        });
        if touches {
            field.flags[index] = Flag::Band;
            heap.push(Front { t: 0.0, index });
        }
    }

    let reach = radius.max(1.0).ceil() as i64;
    while let Some(Front { index, .. }) = heap.pop() {
        if field.flags[index] == Flag::Known {
            continue;
        }
        field.flags[index] = Flag::Known;

        for (dx, dy) in [(0, -1), (0, 1), (-1, 0), (1, 0)] {
            let Some(n) = field.neighbor(index, dx, dy) else {
                continue;
            };
            if field.flags[n] != Flag::Inside {
                continue;
            }
            let arrival = field.arrival_time(n);
            field.t[n] = arrival;
            let color = fill_pixel(&field, &out, n, reach, radius);
            out.put_pixel((n % width) as u32, (n / width) as u32, image::Rgb(color));
            field.flags[n] = Flag::Band;
            heap.push(Front { t: arrival, index: n });
        }
    }

    out
}

/// Weighted average of settled pixels around `index`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss
)]
fn fill_pixel(field: &Field, image: &RgbImage, index: usize, reach: i64, radius: f32) -> [u8; 3] {
    let (gx, gy) = field.gradient(index);
    let t_here = field.t[index];
    let mut sum = [0.0f32; 3];
    let mut total = 0.0f32;

    for dy in -reach..=reach {
        for dx in -reach..=reach {
            if dx == 0 && dy == 0 {
                continue;
            }
            let Some(k) = field.neighbor(index, dx, dy) else {
                continue;
            };
            if field.flags[k] == Flag::Inside {
                continue;
            }
            // Vector from the sample towards the pixel being filled.
            let (rx, ry) = (-dx as f32, -dy as f32);
            let len2 = rx.mul_add(rx, ry * ry);
            if len2 > radius * radius {
                continue;
            }
            let len = len2.sqrt();
            let mut dir = (rx * gx + ry * gy) / len;
            if dir.abs() <= 0.01 {
                dir = 1e-6;
            }
            let dst = 1.0 / len2;
            let lev = 1.0 / (1.0 + (field.t[k] - t_here).abs());
            let weight = (dir * dst * lev).abs();
            let pixel = image.get_pixel((k % field.width) as u32, (k / field.width) as u32);
            for (acc, &v) in sum.iter_mut().zip(pixel.0.iter()) {
                *acc += weight * f32::from(v);
            }
            total += weight;
        }
    }

    if total <= 0.0 {
        return image
            .get_pixel((index % field.width) as u32, (index / field.width) as u32)
            .0;
    }
    sum.map(|s| (s / total).round().clamp(0.0, 255.0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disk_mask(w: u32, h: u32, cx: i64, cy: i64, r: i64) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            let (dx, dy) = (i64::from(x) - cx, i64::from(y) - cy);
            image::Luma([if dx * dx + dy * dy <= r * r { 255 } else { 0 }])
        })
    }

    #[test]
    fn empty_mask_is_identity() {
        let img = RgbImage::from_fn(10, 10, |x, y| image::Rgb([x as u8 * 10, y as u8 * 10, 7]));
        assert_eq!(inpaint_telea(&img, &GrayImage::new(10, 10), 3.0), img);
    }

    #[test]
    fn uniform_surroundings_fill_uniformly() {
        let mut img = RgbImage::from_pixel(30, 30, image::Rgb([180, 140, 120]));
        let mask = disk_mask(30, 30, 15, 15, 4);
        for (x, y, p) in mask.enumerate_pixels() {
            if p.0[0] > 0 {
                img.put_pixel(x, y, image::Rgb([0, 0, 0]));
            }
        }
        let out = inpaint_telea(&img, &mask, 3.0);
        for pixel in out.pixels() {
            assert_eq!(pixel.0, [180, 140, 120]);
        }
    }

    #[test]
    fn pixels_outside_mask_untouched() {
        let img = RgbImage::from_fn(20, 20, |x, _| image::Rgb([x as u8 * 12, 50, 90]));
        let mask = disk_mask(20, 20, 10, 10, 3);
        let out = inpaint_telea(&img, &mask, 3.0);
        for (x, y, p) in mask.enumerate_pixels() {
            if p.0[0] == 0 {
                assert_eq!(out.get_pixel(x, y), img.get_pixel(x, y));
            }
        }
    }

    #[test]
    fn fill_stays_within_surrounding_range() {
        // Horizontal ramp with a dark vertical "hair" through it.
        let mut img = RgbImage::from_fn(40, 20, |x, _| image::Rgb([100 + x as u8 * 2, 120, 140]));
        let mut mask = GrayImage::new(40, 20);
        for y in 0..20 {
            for x in 19..22 {
                img.put_pixel(x, y, image::Rgb([10, 10, 10]));
                mask.put_pixel(x, y, image::Luma([255]));
            }
        }
        let out = inpaint_telea(&img, &mask, 3.0);
        for y in 0..20 {
            for x in 19..22 {
                let r = out.get_pixel(x, y).0[0];
                assert!((130..=150).contains(&r), "({x},{y}) red = {r}");
                assert_eq!(out.get_pixel(x, y).0[1], 120);
            }
        }
    }

    #[test]
    fn fully_masked_image_is_returned_unchanged() {
        let img = RgbImage::from_pixel(5, 5, image::Rgb([9, 9, 9]));
        let mask = GrayImage::from_pixel(5, 5, image::Luma([255]));
        assert_eq!(inpaint_telea(&img, &mask, 3.0), img);
    }
}
