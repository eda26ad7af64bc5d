//! Seeded k-means clustering over three-channel samples.
//!
//! k-means++ initialisation, Lloyd iterations, several restarts with
//! the most compact run kept. The RNG is seeded from the parameters, so
//! identical input always yields identical labels.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Clustering parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KMeansParams {
    /// Requested cluster count. Clamped to the number of samples.
    pub k: usize,
    /// Independent restarts.
    pub attempts: u32,
    /// Iteration cap per restart.
    pub max_iterations: u32,
    /// A restart stops early once no center moves further than this.
    pub epsilon: f32,
    /// RNG seed.
    pub seed: u64,
}

/// Result of [`kmeans`].
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// Cluster index of every sample, in input order.
    pub labels: Vec<usize>,
    /// Cluster centers; `centers.len()` is the effective `k`.
    pub centers: Vec<[f32; 3]>,
    /// Sum of squared distances from each sample to its center.
    pub compactness: f64,
}

impl Clustering {
    /// Number of samples assigned to each cluster.
    #[must_use]
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centers.len()];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }
}

fn distance2(a: [f32; 3], b: [f32; 3]) -> f32 {
    let d = [a[0] - b[0], a[1] - b[1], a[2] - b[2]];
    d[2].mul_add(d[2], d[0].mul_add(d[0], d[1] * d[1]))
}

fn nearest(sample: [f32; 3], centers: &[[f32; 3]]) -> (usize, f32) {
    centers
        .iter()
        .enumerate()
        .map(|(i, &c)| (i, distance2(sample, c)))
        .fold((0, f32::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
}

/// k-means++ seeding: each new center is drawn with probability
/// proportional to its squared distance from the nearest chosen one.
fn seed_centers(samples: &[[f32; 3]], k: usize, rng: &mut StdRng) -> Vec<[f32; 3]> {
    let mut centers = Vec::with_capacity(k);
    centers.push(samples[rng.random_range(0..samples.len())]);
    let mut d2: Vec<f64> = samples
        .iter()
        .map(|&s| f64::from(distance2(s, centers[0])))
        .collect();

    while centers.len() < k {
        let total: f64 = d2.iter().sum();
        let next = if total <= 0.0 {
            // Every sample coincides with a center already.
            rng.random_range(0..samples.len())
        } else {
            let mut target = rng.random::<f64>() * total;
            d2.iter()
                .position(|&d| {
                    target -= d;
                    target <= 0.0
                })
                .unwrap_or(samples.len() - 1)
        };
        let center = samples[next];
        centers.push(center);
        for (d, &s) in d2.iter_mut().zip(samples) {
            *d = d.min(f64::from(distance2(s, center)));
        }
    }
    centers
}

fn lloyd(samples: &[[f32; 3]], mut centers: Vec<[f32; 3]>, params: &KMeansParams) -> Clustering {
    let k = centers.len();
    let mut labels = vec![0; samples.len()];

    for _ in 0..params.max_iterations {
        for (label, &s) in labels.iter_mut().zip(samples) {
            *label = nearest(s, &centers).0;
        }

        let mut sums = vec![[0.0f64; 3]; k];
        let mut counts = vec![0usize; k];
        for (&label, s) in labels.iter().zip(samples) {
            counts[label] += 1;
            for c in 0..3 {
                sums[label][c] += f64::from(s[c]);
            }
        }

        let mut max_shift = 0.0f32;
        for j in 0..k {
            #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
            let updated = if counts[j] == 0 {
                // Re-seed an empty cluster with the worst-fitting sample.
                let far = samples
                    .iter()
                    .zip(&labels)
                    .map(|(&s, &l)| distance2(s, centers[l]))
                    .enumerate()
                    .fold((0, f32::NEG_INFINITY), |best, cur| {
                        if cur.1 > best.1 { cur } else { best }
                    })
                    .0;
                samples[far]
            } else {
                let n = counts[j] as f64;
                [
                    (sums[j][0] / n) as f32,
                    (sums[j][1] / n) as f32,
                    (sums[j][2] / n) as f32,
                ]
            };
            max_shift = max_shift.max(distance2(updated, centers[j]).sqrt());
            centers[j] = updated;
        }

        if max_shift <= params.epsilon {
            break;
        }
    }

    let mut compactness = 0.0;
    for (label, &s) in labels.iter_mut().zip(samples) {
        let (nearest_label, d2) = nearest(s, &centers);
        *label = nearest_label;
        compactness += f64::from(d2);
    }

    Clustering {
        labels,
        centers,
        compactness,
    }
}

/// Partition `samples` into at most `params.k` clusters.
///
/// Returns an empty clustering for empty input.
#[must_use]
pub fn kmeans(samples: &[[f32; 3]], params: &KMeansParams) -> Clustering {
    let k = params.k.min(samples.len());
    if k == 0 {
        return Clustering {
            labels: Vec::new(),
            centers: Vec::new(),
            compactness: 0.0,
        };
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut best: Option<Clustering> = None;
    for _ in 0..params.attempts.max(1) {
        let initial = seed_centers(samples, k, &mut rng);
        let run = lloyd(samples, initial, params);
        if best
            .as_ref()
            .is_none_or(|b| run.compactness < b.compactness)
        {
            best = Some(run);
        }
    }
    best.unwrap_or_else(|| Clustering {
        labels: vec![0; samples.len()],
        centers: vec![samples[0]],
        compactness: 0.0,
    })
}
