//! Contour extraction and polygon geometry on binary masks.
//!
//! Border following via [`imageproc::contours::find_contours`]. Only
//! outermost borders are of interest here: holes inside a lesion and
//! islands inside those holes belong to the same lesion.

use image::GrayImage;
use imageproc::point::Point;

use crate::mask::{BoundingBox, FOREGROUND};

/// Closed outer border of one connected region, in pixel coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contour {
    /// Border pixels in tracing order. The closing edge back to the
    /// first point is implicit.
    pub points: Vec<Point<i32>>,
}

impl Contour {
    /// Wrap a point list.
    #[must_use]
    pub const fn new(points: Vec<Point<i32>>) -> Self {
        Self { points }
    }

    /// Enclosed polygon area (shoelace formula), always `>= 0`.
    ///
    /// Measured on the border pixel centers, so a region of `n` pixels
    /// reports slightly less than `n`. Single pixels and lines report 0.
    #[must_use]
    pub fn area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let twice: i64 = (0..n)
            .map(|i| {
                let (a, b) = (self.points[i], self.points[(i + 1) % n]);
                i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y)
            })
            .sum();
        #[allow(clippy::cast_precision_loss)]
        let area = twice.unsigned_abs() as f64 / 2.0;
        area
    }

    /// Closed perimeter length.
    #[must_use]
    pub fn perimeter(&self) -> f64 {
        if self.points.len() < 2 {
            return 0.0;
        }
        imageproc::geometry::arc_length(&self.points, true)
    }

    /// Inclusive bounding box, `None` for an empty contour.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let first = self.points.first()?;
        let init = (first.x, first.y, first.x, first.y);
        let (x_min, y_min, x_max, y_max) =
            self.points.iter().fold(init, |(x0, y0, x1, y1), p| {
                (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y))
            });
        Some(BoundingBox {
            x_min: x_min.max(0) as u32,
            y_min: y_min.max(0) as u32,
            x_max: x_max.max(0) as u32,
            y_max: y_max.max(0) as u32,
        })
    }

    /// Long side over short side of the bounding box (`>= 1`).
    #[must_use]
    pub fn aspect_ratio(&self) -> f64 {
        self.bounding_box().map_or(1.0, |b| {
            let (w, h) = (f64::from(b.width()), f64::from(b.height()));
            w.max(h) / w.min(h).max(1.0)
        })
    }

    /// Convex hull of the border points.
    #[must_use]
    pub fn convex_hull(&self) -> Self {
        if self.points.len() < 3 {
            return self.clone();
        }
        Self::new(imageproc::geometry::convex_hull(&self.points[..]))
    }
}

/// Outermost borders of every foreground region.
#[must_use]
pub fn external_contours(mask: &GrayImage) -> Vec<Contour> {
    imageproc::contours::find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.parent.is_none() && !c.points.is_empty())
        .map(|c| Contour::new(c.points))
        .collect()
}

/// Largest outer border by enclosed area.
#[must_use]
pub fn largest_external_contour(mask: &GrayImage) -> Option<Contour> {
    external_contours(mask)
        .into_iter()
        .max_by(|a, b| a.area().total_cmp(&b.area()))
}

/// Rasterize a contour as a filled polygon (border included).
#[must_use = "returns the filled mask"]
pub fn fill_polygon(width: u32, height: u32, contour: &Contour) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    let color = image::Luma([FOREGROUND]);
    let mut points = contour.points.clone();
    points.dedup();
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }

    match points.as_slice() {
        [] => return mask,
        #[allow(clippy::cast_sign_loss)]
        [p] => {
            if p.x >= 0 && p.y >= 0 && (p.x as u32) < width && (p.y as u32) < height {
                mask.put_pixel(p.x as u32, p.y as u32, color);
            }
            return mask;
        }
        [_, _] => {}
        _ => imageproc::drawing::draw_polygon_mut(&mut mask, &points, color),
    }
    // Outline pass: covers degenerate polygons and the right/bottom
    // border pixels the scanline fill may leave out.
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        #[allow(clippy::cast_precision_loss)]
        imageproc::drawing::draw_line_segment_mut(
            &mut mask,
            (a.x as f32, a.y as f32),
            (b.x as f32, b.y as f32),
            color,
        );
    }
    mask
}
