//! Color segmentation of the lesion candidate.
//!
//! The hair-free photograph is blurred, converted to Lab and clustered.
//! Clusters are visited from darkest to lightest; the first one whose
//! share of the image is plausible for a lesion wins. When none
//! qualifies the darkest cluster is taken anyway.

use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

use crate::blur::gaussian_blur_rgb;
use crate::color::to_lab;
use crate::config::SegmentationConfig;
use crate::kmeans::{KMeansParams, kmeans};
use crate::mask::FOREGROUND;
use crate::morphology::{dilate, ellipse_kernel};

/// One color cluster found in the photograph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    /// Cluster center in 8-bit-scaled Lab (`[L, a, b]`).
    pub center: [f32; 3],
    /// Pixels assigned to the cluster.
    pub pixels: u64,
    /// `pixels` divided by the image's pixel count.
    pub fraction: f64,
}

/// Which cluster was taken as the lesion and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterChoice {
    /// Index into [`Segmentation::clusters`].
    pub cluster: usize,
    /// Position in darkest-first order (0 = darkest).
    pub rank: usize,
    /// `true` when no cluster passed the fraction gate and the darkest
    /// one was used.
    pub fallback: bool,
}

/// Output of [`segment_lesion`].
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Raw lesion candidate (255 = lesion), already dilated.
    pub mask: GrayImage,
    /// Every cluster, indexed by k-means label.
    pub clusters: Vec<ClusterSummary>,
    /// `None` only for an image without pixels.
    pub choice: Option<ClusterChoice>,
}

/// Cluster indices sorted darkest first by center lightness.
#[must_use]
pub fn order_by_lightness(clusters: &[ClusterSummary]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..clusters.len()).collect();
    order.sort_by(|&a, &b| clusters[a].center[0].total_cmp(&clusters[b].center[0]));
    order
}

/// Pick the lesion cluster.
///
/// The first cluster in darkest-first order whose fraction lies
/// strictly between the configured bounds is chosen; otherwise the
/// darkest cluster is returned with `fallback` set.
#[must_use]
pub fn select_lesion_cluster(
    clusters: &[ClusterSummary],
    config: &SegmentationConfig,
) -> Option<ClusterChoice> {
    let order = order_by_lightness(clusters);
    order
        .iter()
        .enumerate()
        .find(|&(_, &i)| {
            let f = clusters[i].fraction;
            f > config.min_fraction && f < config.max_fraction
        })
        .map(|(rank, &cluster)| ClusterChoice {
            cluster,
            rank,
            fallback: false,
        })
        .or_else(|| {
            order.first().map(|&cluster| ClusterChoice {
                cluster,
                rank: 0,
                fallback: true,
            })
        })
}

/// Produce the raw lesion candidate mask.
///
/// Never fails; a fallback selection is flagged in the returned
/// [`ClusterChoice`].
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn segment_lesion(image: &RgbImage, config: &SegmentationConfig) -> Segmentation {
    let (w, h) = image.dimensions();
    let lab = to_lab(&gaussian_blur_rgb(image, config.blur_sigma));
    let samples: Vec<[f32; 3]> = lab.pixels().map(|p| p.0).collect();

    let clustering = kmeans(
        &samples,
        &KMeansParams {
            k: config.clusters,
            attempts: config.attempts,
            max_iterations: config.max_iterations,
            epsilon: config.epsilon,
            seed: config.seed,
        },
    );

    let total = samples.len().max(1) as f64;
    let clusters: Vec<ClusterSummary> = clustering
        .centers
        .iter()
        .zip(clustering.sizes())
        .map(|(&center, size)| ClusterSummary {
            center,
            pixels: size as u64,
            fraction: size as f64 / total,
        })
        .collect();

    let choice = select_lesion_cluster(&clusters, config);
    let mask = choice.map_or_else(
        || GrayImage::new(w, h),
        |c| {
            let mut selected = GrayImage::new(w, h);
            for (pixel, &label) in selected.pixels_mut().zip(&clustering.labels) {
                if label == c.cluster {
                    pixel.0[0] = FOREGROUND;
                }
            }
            dilate(&selected, &ellipse_kernel(config.dilate_size), 1)
        },
    );

    Segmentation {
        mask,
        clusters,
        choice,
    }
}
