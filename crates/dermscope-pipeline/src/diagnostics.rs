//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! parameter tuning on real photographs. Every call to
//! [`analyze_with_diagnostics`](crate::analyze_with_diagnostics)
//! collects them alongside the analysis result.
//!
//! Time is read through the [`Clock`] trait so the pipeline itself never
//! touches the system clock. Front ends pass a real clock; tests and
//! [`analyze`](crate::analyze) use [`ZeroClock`].
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Monotonic time source.
///
/// Abstracts over the platform clock so the pipeline never reads system
/// time itself.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// Current reading.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since an earlier reading.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// A clock that never advances. Every stage reports a zero duration.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroClock;

impl Clock for ZeroClock {
    type Instant = ();

    fn now(&self) {}

    fn elapsed(&self, _since: &()) -> Duration {
        Duration::ZERO
    }
}

/// Diagnostics collected from a single pipeline run.
///
/// Each field captures metrics for one logical stage of the pipeline.
/// Feature extraction only runs on calibrated photographs, so its field
/// is `None` when no reference coin was found.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 1: image decoding.
    pub decode: StageDiagnostics,
    /// Stage 2: hair detection and inpainting.
    pub hair: StageDiagnostics,
    /// Stage 3: Lab k-means segmentation.
    pub segmentation: StageDiagnostics,
    /// Stage 4: reference coin detection.
    pub fiducial: StageDiagnostics,
    /// Stage 5: mask cleanup and coin exclusion.
    pub refinement: StageDiagnostics,
    /// Stage 6: ABCD descriptors (only when calibrated).
    pub features: Option<StageDiagnostics>,
    /// Stage 7: overlay rendering.
    pub overlay: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics (counts, sizes, etc.).
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding metrics.
    Decode {
        /// Size of the input image bytes.
        input_bytes: usize,
        /// Decoded image width in pixels.
        width: u32,
        /// Decoded image height in pixels.
        height: u32,
        /// Total pixel count (`width * height`).
        pixel_count: u64,
    },
    /// Hair suppression metrics.
    Hair {
        /// Pixels flagged as hair and inpainted.
        artifact_pixel_count: u64,
        /// Total pixel count for computing coverage.
        total_pixel_count: u64,
    },
    /// Color clustering metrics.
    Segmentation {
        /// Share of the image held by each cluster, by label.
        cluster_fractions: Vec<f64>,
        /// Label of the chosen cluster, `None` for an empty image.
        chosen: Option<usize>,
        /// Position of the chosen cluster in darkest-first order.
        rank: Option<usize>,
        /// Whether the darkest cluster was taken because none passed
        /// the fraction gate.
        fallback: bool,
        /// Pixels in the raw candidate mask.
        candidate_pixel_count: u64,
    },
    /// Reference coin detection metrics.
    Fiducial {
        /// Whether a coin was found.
        found: bool,
        /// Detected radius in pixels.
        radius_px: Option<f64>,
        /// Detected center.
        center: Option<(u32, u32)>,
        /// Resulting scale.
        pixels_per_mm: Option<f64>,
        /// Candidate pixels removed by the coin exclusion disk.
        excluded_pixel_count: u64,
    },
    /// Mask cleanup metrics.
    Refinement {
        /// External contours found after smoothing.
        contours_found: usize,
        /// Contours that passed the area and elongation filters.
        contours_kept: usize,
        /// Final lesion area in pixels.
        area_px: u64,
    },
    /// ABCD descriptor metrics.
    Features {
        /// Asymmetry.
        asymmetry: f64,
        /// Border irregularity.
        border_irregularity: f64,
        /// Color variation.
        color_variation: f64,
        /// Equivalent diameter in millimeters.
        diameter_mm: f64,
        /// ABCD risk.
        risk: f64,
    },
    /// Overlay metrics.
    Overlay {
        /// Blend weight of the highlight layer.
        alpha: f32,
    },
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Whether a reference coin was found.
    pub calibrated: bool,
    /// Final lesion area in pixels.
    pub area_px: u64,
}

impl PipelineDiagnostics {
    /// Stages in execution order with their display names.
    #[must_use]
    pub fn stages(&self) -> Vec<(&'static str, &StageDiagnostics)> {
        let mut stages = vec![
            ("Decode", &self.decode),
            ("Hair Suppression", &self.hair),
            ("Segmentation", &self.segmentation),
            ("Fiducial", &self.fiducial),
            ("Refinement", &self.refinement),
        ];
        if let Some(ref f) = self.features {
            stages.push(("Features", f));
        }
        stages.push(("Overlay", &self.overlay));
        stages
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Calibrated: {}  |  Lesion area: {} px",
            if self.summary.calibrated { "yes" } else { "no" },
            self.summary.area_px,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
#[allow(clippy::cast_precision_loss)]
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            ..
        } => format!("{input_bytes} bytes -> {width}x{height}"),
        StageMetrics::Hair {
            artifact_pixel_count,
            total_pixel_count,
        } => {
            let coverage = if *total_pixel_count > 0 {
                *artifact_pixel_count as f64 / *total_pixel_count as f64 * 100.0
            } else {
                0.0
            };
            format!("hair={artifact_pixel_count} ({coverage:.1}%)")
        }
        StageMetrics::Segmentation {
            cluster_fractions,
            chosen,
            rank,
            fallback,
            candidate_pixel_count,
        } => {
            let fractions = cluster_fractions
                .iter()
                .map(|f| format!("{f:.3}"))
                .collect::<Vec<_>>()
                .join("/");
            let chosen = match (chosen, rank) {
                (Some(c), Some(r)) => format!("#{c} (rank {r})"),
                _ => "none".to_string(),
            };
            let fallback = if *fallback { " fallback" } else { "" };
            format!("k={fractions} chosen={chosen}{fallback} candidate={candidate_pixel_count}")
        }
        StageMetrics::Fiducial {
            found: false,
            excluded_pixel_count,
            ..
        } => format!("no coin (excluded={excluded_pixel_count})"),
        StageMetrics::Fiducial {
            radius_px,
            center,
            pixels_per_mm,
            excluded_pixel_count,
            ..
        } => {
            let (cx, cy) = center.unwrap_or_default();
            format!(
                "r={:.0} at ({cx},{cy}) ppm={:.3} excluded={excluded_pixel_count}",
                radius_px.unwrap_or_default(),
                pixels_per_mm.unwrap_or_default(),
            )
        }
        StageMetrics::Refinement {
            contours_found,
            contours_kept,
            area_px,
        } => format!("contours={contours_kept}/{contours_found} area={area_px}px"),
        StageMetrics::Features {
            asymmetry,
            border_irregularity,
            color_variation,
            diameter_mm,
            risk,
        } => format!(
            "A={asymmetry:.3} B={border_irregularity:.3} C={color_variation:.2} \
             D={diameter_mm:.2}mm risk={risk:.2}"
        ),
        StageMetrics::Overlay { alpha } => format!("alpha={alpha:.2}"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn stage(ms: u64, metrics: StageMetrics) -> StageDiagnostics {
        StageDiagnostics {
            duration: Duration::from_millis(ms),
            metrics,
        }
    }

    fn sample(features: bool) -> PipelineDiagnostics {
        PipelineDiagnostics {
            decode: stage(
                10,
                StageMetrics::Decode {
                    input_bytes: 1000,
                    width: 100,
                    height: 100,
                    pixel_count: 10_000,
                },
            ),
            hair: stage(
                20,
                StageMetrics::Hair {
                    artifact_pixel_count: 250,
                    total_pixel_count: 10_000,
                },
            ),
            segmentation: stage(
                40,
                StageMetrics::Segmentation {
                    cluster_fractions: vec![0.6, 0.3, 0.1],
                    chosen: Some(2),
                    rank: Some(0),
                    fallback: false,
                    candidate_pixel_count: 1200,
                },
            ),
            fiducial: stage(
                15,
                StageMetrics::Fiducial {
                    found: true,
                    radius_px: Some(50.0),
                    center: Some((70, 30)),
                    pixels_per_mm: Some(4.255),
                    excluded_pixel_count: 40,
                },
            ),
            refinement: stage(
                5,
                StageMetrics::Refinement {
                    contours_found: 3,
                    contours_kept: 1,
                    area_px: 1100,
                },
            ),
            features: features.then(|| {
                stage(
                    5,
                    StageMetrics::Features {
                        asymmetry: 0.1,
                        border_irregularity: 0.12,
                        color_variation: 8.0,
                        diameter_mm: 8.8,
                        risk: 3.1,
                    },
                )
            }),
            overlay: stage(5, StageMetrics::Overlay { alpha: 0.3 }),
            total_duration: Duration::from_millis(100),
            summary: PipelineSummary {
                image_width: 100,
                image_height: 100,
                pixel_count: 10_000,
                calibrated: features,
                area_px: 1100,
            },
        }
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_micros(1500);
        assert!((duration_ms(d) - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_clock_never_advances() {
        let clock = ZeroClock;
        let start = clock.now();
        assert_eq!(clock.elapsed(&start), Duration::ZERO);
    }

    #[test]
    fn stages_skip_missing_features() {
        assert_eq!(sample(true).stages().len(), 7);
        let names: Vec<&str> = sample(false).stages().iter().map(|s| s.0).collect();
        assert!(!names.contains(&"Features"));
        assert_eq!(names.last(), Some(&"Overlay"));
    }

    #[test]
    fn report_produces_nonempty_string() {
        let report = sample(true).report();
        assert!(report.contains("Pipeline Diagnostics Report"));
        assert!(report.contains("Hair Suppression"));
        assert!(report.contains("hair=250 (2.5%)"));
        assert!(report.contains("chosen=#2 (rank 0)"));
        assert!(report.contains("ppm=4.255"));
        assert!(report.contains("contours=1/3"));
        assert!(report.contains("Calibrated: yes"));
    }

    #[test]
    fn report_without_coin() {
        let mut diag = sample(false);
        diag.fiducial.metrics = StageMetrics::Fiducial {
            found: false,
            radius_px: None,
            center: None,
            pixels_per_mm: None,
            excluded_pixel_count: 0,
        };
        let report = diag.report();
        assert!(report.contains("no coin"));
        assert!(report.contains("Calibrated: no"));
        assert!(!report.contains("risk="));
    }

    #[test]
    fn zero_total_duration_reports_zero_percent() {
        let mut diag = sample(true);
        diag.total_duration = Duration::ZERO;
        assert!(diag.report().contains("0.0%"));
    }

    #[test]
    fn serde_round_trip() {
        let diag = sample(true);
        let json = serde_json::to_string(&diag).unwrap();
        let back: PipelineDiagnostics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.total_duration, diag.total_duration);
        assert_eq!(back.segmentation.metrics, diag.segmentation.metrics);
        assert_eq!(back.summary, diag.summary);
    }

    #[test]
    fn negative_duration_is_rejected() {
        let json = r#"{"duration":-1.0,"metrics":{"Overlay":{"alpha":0.3}}}"#;
        assert!(serde_json::from_str::<StageDiagnostics>(json).is_err());
    }
}
