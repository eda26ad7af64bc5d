//! Gradient Hough transform for circles.
//!
//! Every Canny edge pixel votes along its gradient line, in both
//! directions, for centers at distances within the radius range.
//! Circle boundaries produce converging votes, so accumulator peaks
//! mark centers. For each accepted center the radius is the distance
//! most edge pixels agree on.

use image::GrayImage;

use crate::edge::{GradientField, edge_map};

/// Circle detection parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoughParams {
    /// Inverse accumulator resolution: one cell spans `dp` pixels.
    pub dp: f32,
    /// Minimum distance between accepted centers in pixels.
    pub min_dist: f32,
    /// Upper Canny threshold; the lower one is half of it.
    pub canny_high: f32,
    /// Votes a center needs (strictly more), and edge support a radius
    /// needs (at least).
    pub accumulator_threshold: u32,
    /// Smallest radius considered.
    pub min_radius: u32,
    /// Largest radius considered.
    pub max_radius: u32,
}

/// A detected circle in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    /// Center column.
    pub x: f32,
    /// Center row.
    pub y: f32,
    /// Radius in pixels.
    pub radius: f32,
    /// Accumulator votes for the center.
    pub votes: u32,
}

struct Accumulator {
    width: usize,
    height: usize,
    cells: Vec<u32>,
}

impl Accumulator {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn new(width: u32, height: u32, dp: f32) -> Self {
        let width = (width as f32 / dp).ceil() as usize + 1;
        let height = (height as f32 / dp).ceil() as usize + 1;
        Self {
            width,
            height,
            cells: vec![0; width * height],
        }
    }

    fn at(&self, cx: usize, cy: usize) -> u32 {
        self.cells[cy * self.width + cx]
    }

    /// Cells with more than `threshold` votes that dominate their
    /// 4-neighborhood, strongest first.
    fn peaks(&self, threshold: u32) -> Vec<(usize, usize, u32)> {
        let mut peaks = Vec::new();
        for cy in 1..self.height.saturating_sub(1) {
            for cx in 1..self.width.saturating_sub(1) {
                let v = self.at(cx, cy);
                if v > threshold
                    && v > self.at(cx - 1, cy)
                    && v >= self.at(cx + 1, cy)
                    && v > self.at(cx, cy - 1)
                    && v >= self.at(cx, cy + 1)
                {
                    peaks.push((cx, cy, v));
                }
            }
        }
        peaks.sort_by(|a, b| b.2.cmp(&a.2).then((a.1, a.0).cmp(&(b.1, b.0))));
        peaks
    }
}

/// Detect circles in a (pre-blurred) grayscale image.
///
/// Returns circles strongest first. Empty when nothing circular within
/// the radius range collects enough support.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_possible_wrap
)]
pub fn detect_circles(gray: &GrayImage, params: &HoughParams) -> Vec<Circle> {
    let (w, h) = gray.dimensions();
    if w < 3 || h < 3 || params.max_radius < params.min_radius || params.max_radius == 0 {
        return Vec::new();
    }
    let dp = params.dp.max(1.0);

    let edges = edge_map(gray, params.canny_high / 2.0, params.canny_high);
    let gradients = GradientField::of(gray);
    let mut acc = Accumulator::new(w, h, dp);
    let mut edge_points = Vec::new();

    for (x, y, pixel) in edges.enumerate_pixels() {
        if pixel.0[0] == 0 {
            continue;
        }
        let Some((dx, dy)) = gradients.direction(x, y) else {
            continue;
        };
        edge_points.push((x as f32, y as f32));

        for sign in [-1.0f32, 1.0] {
            let mut previous = None;
            for r in params.min_radius..=params.max_radius {
                let vx = sign.mul_add(dx * r as f32, x as f32) / dp;
                let vy = sign.mul_add(dy * r as f32, y as f32) / dp;
                if vx < 0.0 || vy < 0.0 {
                    break;
                }
                let (cx, cy) = (vx as usize, vy as usize);
                if cx >= acc.width || cy >= acc.height {
                    break;
                }
                if previous == Some((cx, cy)) {
                    continue;
                }
                previous = Some((cx, cy));
                acc.cells[cy * acc.width + cx] += 1;
            }
        }
    }

    let mut circles: Vec<Circle> = Vec::new();
    let min_dist2 = params.min_dist * params.min_dist;
    for (cx, cy, votes) in acc.peaks(params.accumulator_threshold) {
        let x = (cx as f32 + 0.5) * dp;
        let y = (cy as f32 + 0.5) * dp;
        let crowded = circles.iter().any(|c| {
            let (ddx, ddy) = (c.x - x, c.y - y);
            ddx.mul_add(ddx, ddy * ddy) < min_dist2
        });
        if crowded {
            continue;
        }
        if let Some(radius) = best_radius((x, y), &edge_points, params) {
            circles.push(Circle {
                x,
                y,
                radius,
                votes,
            });
        }
    }
    circles
}

/// Radius supported by the most edge pixels around `center`.
///
/// Distances are binned per pixel and scored over a three-bin window so
/// a slightly blurred rim still counts as one radius.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn best_radius(center: (f32, f32), edge_points: &[(f32, f32)], params: &HoughParams) -> Option<f32> {
    let min_r = params.min_radius as usize;
    let max_r = params.max_radius as usize;
    let mut bins = vec![0u32; max_r + 2];
    let mut sums = vec![0.0f64; max_r + 2];
    for &(px, py) in edge_points {
        let d = (px - center.0).hypot(py - center.1);
        let bin = d.round() as usize;
        if bin + 1 < min_r || bin > max_r + 1 {
            continue;
        }
        bins[bin] += 1;
        sums[bin] += f64::from(d);
    }

    let (best, support) = (min_r.max(1)..=max_r)
        .map(|r| (r, bins[r - 1] + bins[r] + bins[r + 1]))
        .fold((0, 0), |best, cur| if cur.1 > best.1 { cur } else { best });
    if best == 0 || support < params.accumulator_threshold {
        return None;
    }
    let total = sums[best - 1] + sums[best] + sums[best + 1];
    Some((total / f64::from(support)) as f32)
}
