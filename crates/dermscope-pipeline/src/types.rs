//! Shared types for the dermscope lesion analysis pipeline.

use serde::{Deserialize, Serialize};

use crate::features::AbcdFeatures;
use crate::risk::RiskScore;

/// Re-export `GrayImage` so downstream crates can reference binary
/// masks without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` so downstream crates can reference the decoded
/// photograph and overlay without depending on `image` directly.
pub use image::RgbImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an image buffer.
    #[must_use]
    pub fn of<P: image::Pixel>(image: &image::ImageBuffer<P, Vec<P::Subpixel>>) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Total pixel count (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Metric calibration derived from the reference coin.
///
/// Produced at most once per photograph. Its absence means the
/// photograph has no reliable scale: every physical quantity derived
/// from it is reported as unavailable instead of being defaulted.
#[derive(Debug, Clone)]
pub struct ScaleCalibration {
    /// Scale factor, always `> 0`.
    pub pixels_per_mm: f64,
    /// Radius of the detected coin in pixels (rounded to whole pixels).
    pub fiducial_radius_px: f64,
    /// Center of the detected coin `(x, y)` in pixels.
    pub fiducial_center: (u32, u32),
    /// Filled disk covering the coin footprint (255 inside), oversized
    /// relative to the detected radius. Same dimensions as the source.
    pub fiducial_mask: GrayImage,
}

impl ScaleCalibration {
    /// Convert a pixel area into square millimeters.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn area_mm2(&self, area_px: u64) -> f64 {
        area_px as f64 / (self.pixels_per_mm * self.pixels_per_mm)
    }
}

/// Recoverable conditions reported alongside a successful analysis.
///
/// Neither is a failure: the caller decides whether to ask for a retake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisWarning {
    /// No reference coin was found, so area in mm², diameter and the
    /// risk score are unavailable.
    CalibrationUnavailable,
    /// Mask refinement discarded every candidate region.
    EmptyLesionMask,
}

impl std::fmt::Display for AnalysisWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CalibrationUnavailable => {
                f.write_str("reference coin not found; physical size unavailable")
            }
            Self::EmptyLesionMask => f.write_str("no lesion detected"),
        }
    }
}

/// Final output of one pipeline invocation.
///
/// Constructed once, never mutated, handed to the caller.
///
/// Note: does not derive `Serialize` because the raster fields
/// (`mask`, `overlay`) do not implement serde traits. Use
/// [`summary`](Self::summary) for a serializable view.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// Dimensions of the source photograph.
    pub dimensions: Dimensions,
    /// Final lesion mask (255 = lesion).
    pub mask: GrayImage,
    /// Photograph with the lesion mask blended in green.
    pub overlay: RgbImage,
    /// Lesion area in pixels.
    pub area_px: u64,
    /// Coin calibration, `None` when no coin was detected.
    pub calibration: Option<ScaleCalibration>,
    /// Lesion area in mm², `None` if and only if `calibration` is `None`.
    pub area_mm2: Option<f64>,
    /// ABCD descriptors, `None` if and only if `calibration` is `None`.
    pub features: Option<AbcdFeatures>,
}

impl AnalysisResult {
    /// Whether a reference coin was detected.
    #[must_use]
    pub const fn is_calibrated(&self) -> bool {
        self.calibration.is_some()
    }

    /// Whether the final mask contains any lesion pixels.
    #[must_use]
    pub const fn lesion_detected(&self) -> bool {
        self.area_px > 0
    }

    /// ABCD risk score, or [`RiskScore::Incomplete`] when the diameter
    /// term cannot be evaluated.
    #[must_use]
    pub fn risk(&self) -> RiskScore {
        self.features
            .as_ref()
            .map_or(RiskScore::Incomplete, |f| RiskScore::Scored(f.risk()))
    }

    /// Recoverable conditions encountered during the run.
    #[must_use]
    pub fn warnings(&self) -> Vec<AnalysisWarning> {
        let mut warnings = Vec::new();
        if !self.is_calibrated() {
            warnings.push(AnalysisWarning::CalibrationUnavailable);
        }
        if !self.lesion_detected() {
            warnings.push(AnalysisWarning::EmptyLesionMask);
        }
        warnings
    }

    /// Numbers-only view of the result, suitable for JSON output.
    #[must_use]
    pub fn summary(&self) -> AnalysisSummary {
        AnalysisSummary {
            dimensions: self.dimensions,
            area_px: self.area_px,
            pixels_per_mm: self.calibration.as_ref().map(|c| c.pixels_per_mm),
            fiducial_radius_px: self.calibration.as_ref().map(|c| c.fiducial_radius_px),
            fiducial_center: self.calibration.as_ref().map(|c| c.fiducial_center),
            area_mm2: self.area_mm2,
            features: self.features,
            risk: self.risk(),
            warnings: self.warnings(),
        }
    }
}

/// Serializable summary of an [`AnalysisResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    /// Source image dimensions.
    pub dimensions: Dimensions,
    /// Lesion area in pixels.
    pub area_px: u64,
    /// Calibration scale, if a coin was found.
    pub pixels_per_mm: Option<f64>,
    /// Detected coin radius in pixels.
    pub fiducial_radius_px: Option<f64>,
    /// Detected coin center.
    pub fiducial_center: Option<(u32, u32)>,
    /// Lesion area in mm².
    pub area_mm2: Option<f64>,
    /// ABCD descriptors.
    pub features: Option<AbcdFeatures>,
    /// ABCD risk score.
    pub risk: RiskScore,
    /// Recoverable conditions.
    pub warnings: Vec<AnalysisWarning>,
}

/// Errors that can occur during pipeline processing.
///
/// Only an undecodable photograph or an invalid configuration fails an
/// analysis. A missing coin or an empty lesion mask are reported through
/// [`AnalysisResult::warnings`].
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits. The `ImageDecode` variant is
/// serialized as its `Display` string.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}

/// Serde-compatible proxy for `PipelineError`.
#[derive(Serialize, Deserialize)]
enum PipelineErrorProxy {
    ImageDecode(String),
    EmptyInput,
    InvalidConfig(String),
}

impl Serialize for PipelineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::ImageDecode(e) => PipelineErrorProxy::ImageDecode(e.to_string()),
            Self::EmptyInput => PipelineErrorProxy::EmptyInput,
            Self::InvalidConfig(s) => PipelineErrorProxy::InvalidConfig(s.clone()),
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PipelineError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = PipelineErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            // The typed image error cannot be rebuilt; keep its message.
            PipelineErrorProxy::ImageDecode(msg) => {
                Self::InvalidConfig(format!("image decode error: {msg}"))
            }
            PipelineErrorProxy::EmptyInput => Self::EmptyInput,
            PipelineErrorProxy::InvalidConfig(s) => Self::InvalidConfig(s),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn blank_result(calibrated: bool, area_px: u64) -> AnalysisResult {
        let calibration = calibrated.then(|| ScaleCalibration {
            pixels_per_mm: 4.0,
            fiducial_radius_px: 47.0,
            fiducial_center: (10, 10),
            fiducial_mask: GrayImage::new(4, 4),
        });
        let area_mm2 = calibration.as_ref().map(|c| c.area_mm2(area_px));
        let features = area_mm2.map(|a| AbcdFeatures {
            asymmetry: 0.0,
            border_irregularity: 0.0,
            color_variation: 0.0,
            diameter_mm: crate::features::equivalent_diameter(a),
        });
        AnalysisResult {
            dimensions: Dimensions {
                width: 4,
                height: 4,
            },
            mask: GrayImage::new(4, 4),
            overlay: RgbImage::new(4, 4),
            area_px,
            calibration,
            area_mm2,
            features,
        }
    }

    #[test]
    fn dimensions_pixel_count() {
        let d = Dimensions {
            width: 640,
            height: 480,
        };
        assert_eq!(d.pixel_count(), 307_200);
    }

    #[test]
    fn calibration_converts_area() {
        let result = blank_result(true, 160);
        let cal = result.calibration.unwrap();
        assert!((cal.area_mm2(160) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn uncalibrated_result_reports_incomplete_risk() {
        let result = blank_result(false, 100);
        assert!(result.area_mm2.is_none());
        assert_eq!(result.risk(), RiskScore::Incomplete);
        assert_eq!(
            result.warnings(),
            vec![AnalysisWarning::CalibrationUnavailable]
        );
    }

    #[test]
    fn empty_mask_is_a_warning_not_an_error() {
        let result = blank_result(true, 0);
        assert!(!result.lesion_detected());
        assert_eq!(result.warnings(), vec![AnalysisWarning::EmptyLesionMask]);
        assert!(matches!(result.risk(), RiskScore::Scored(r) if r.abs() < 1e-12));
    }

    #[test]
    fn summary_mirrors_result() {
        let result = blank_result(true, 160);
        let summary = result.summary();
        assert_eq!(summary.area_px, 160);
        assert_eq!(summary.pixels_per_mm, Some(4.0));
        assert_eq!(summary.fiducial_center, Some((10, 10)));
        assert!(summary.warnings.is_empty());
    }

    #[test]
    fn summary_serde_round_trip() {
        let summary = blank_result(false, 12).summary();
        let json = serde_json::to_string(&summary).unwrap();
        let back: AnalysisSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(summary, back);
    }

    #[test]
    fn error_display() {
        assert_eq!(
            PipelineError::EmptyInput.to_string(),
            "input image data is empty"
        );
        assert_eq!(
            PipelineError::InvalidConfig("k = 0".to_string()).to_string(),
            "invalid pipeline configuration: k = 0",
        );
    }

    #[test]
    fn error_serde_round_trip() {
        let json = serde_json::to_string(&PipelineError::EmptyInput).unwrap();
        let back: PipelineError = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, PipelineError::EmptyInput));

        let err = PipelineError::InvalidConfig("bad".to_string());
        let json = serde_json::to_string(&err).unwrap();
        let back: PipelineError = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, PipelineError::InvalidConfig(ref s) if s == "bad"));
    }
}
