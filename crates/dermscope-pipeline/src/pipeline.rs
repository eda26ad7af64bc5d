//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::analyze`] which runs the entire analysis in one call,
//! [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use dermscope_pipeline::{AnalysisConfig, Pipeline, PipelineError};
//! # fn run(png: Vec<u8>) -> Result<(), PipelineError> {
//! let staged = Pipeline::new(png, AnalysisConfig::default())
//!     .decode()?
//!     .suppress_hair()
//!     .segment()
//!     .locate_fiducial()
//!     .refine()
//!     .measure()
//!     .render()
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state,
//! carrying all previously computed intermediates. Only decoding can
//! fail. The caller can inspect the current stage's output via accessor
//! methods at any point.
//!
//! # Ordering
//!
//! Segmentation reads the hair-free photograph. Coin detection and
//! feature extraction read the original one: inpainting can soften the
//! coin rim and would bias the color statistics. The coin footprint is
//! removed from the candidate mask both before and after cleanup, since
//! the convex hull and final dilation can grow back over it.

use image::{GrayImage, RgbImage};

use crate::cluster::{Segmentation, segment_lesion};
use crate::config::AnalysisConfig;
use crate::diagnostics::StageMetrics;
use crate::features::{AbcdFeatures, extract_features};
use crate::fiducial::locate_fiducial;
use crate::hair::{ArtifactSuppression, suppress_hair};
use crate::mask::{count_foreground, exclude_region};
use crate::overlay::overlay_mask;
use crate::refine::{Refinement, clean_lesion_mask};
use crate::types::{AnalysisResult, Dimensions, PipelineError, ScaleCalibration};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// The source image bytes and config are stored but not yet touched.
/// Call [`decode`](Self::decode) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing, call .decode() to continue"]
pub struct Pending {
    config: AnalysisConfig,
    source: Vec<u8>,
}

impl Pending {
    /// The raw source image bytes.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Decode the source image and advance to the [`Decoded`] stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`] if the source bytes are
    /// empty. Returns [`PipelineError::ImageDecode`] if the image
    /// format is unrecognized or the data is corrupt.
    pub fn decode(self) -> Result<Decoded, PipelineError> {
        let source_len = self.source.len();
        let original = crate::decode::decode(&self.source)?;
        Ok(Decoded {
            config: self.config,
            original,
            source_len,
        })
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Pipeline state after decoding the source photograph.
#[must_use = "pipeline stages are consumed by advancing, call .suppress_hair() to continue"]
pub struct Decoded {
    config: AnalysisConfig,
    original: RgbImage,
    source_len: usize,
}

impl Decoded {
    /// The decoded photograph.
    #[must_use]
    pub const fn original(&self) -> &RgbImage {
        &self.original
    }

    /// Detect hair and paint it over.
    pub fn suppress_hair(self) -> HairSuppressed {
        let hair = suppress_hair(&self.original, &self.config.hair);
        HairSuppressed {
            config: self.config,
            original: self.original,
            hair,
        }
    }
}

// ───────────────────────── Stage 2: HairSuppressed ───────────────────

/// Pipeline state after hair suppression.
#[must_use = "pipeline stages are consumed by advancing, call .segment() to continue"]
pub struct HairSuppressed {
    config: AnalysisConfig,
    original: RgbImage,
    hair: ArtifactSuppression,
}

impl HairSuppressed {
    /// The photograph with hair pixels filled in.
    #[must_use]
    pub const fn cleaned(&self) -> &RgbImage {
        &self.hair.cleaned
    }

    /// The dilated hair mask.
    #[must_use]
    pub const fn artifact_mask(&self) -> &GrayImage {
        &self.hair.artifact_mask
    }

    /// Cluster the hair-free photograph and pick the lesion cluster.
    pub fn segment(self) -> Segmented {
        let segmentation = segment_lesion(&self.hair.cleaned, &self.config.segmentation);
        Segmented {
            config: self.config,
            original: self.original,
            hair: self.hair,
            segmentation,
        }
    }
}

// ───────────────────────── Stage 3: Segmented ────────────────────────

/// Pipeline state after color segmentation.
#[must_use = "pipeline stages are consumed by advancing, call .locate_fiducial() to continue"]
pub struct Segmented {
    config: AnalysisConfig,
    original: RgbImage,
    hair: ArtifactSuppression,
    segmentation: Segmentation,
}

impl Segmented {
    /// Cluster statistics and the raw candidate mask.
    #[must_use]
    pub const fn segmentation(&self) -> &Segmentation {
        &self.segmentation
    }

    /// Look for the reference coin and erase its footprint from the
    /// candidate mask.
    pub fn locate_fiducial(self) -> Located {
        let calibration = locate_fiducial(&self.original, &self.config.fiducial);
        let candidate = calibration.as_ref().map_or_else(
            || self.segmentation.mask.clone(),
            |c| exclude_region(&self.segmentation.mask, &c.fiducial_mask),
        );
        let excluded_pixel_count =
            count_foreground(&self.segmentation.mask) - count_foreground(&candidate);
        Located {
            config: self.config,
            original: self.original,
            hair: self.hair,
            segmentation: self.segmentation,
            calibration,
            candidate,
            excluded_pixel_count,
        }
    }
}

// ───────────────────────── Stage 4: Located ──────────────────────────

/// Pipeline state after coin detection.
#[must_use = "pipeline stages are consumed by advancing, call .refine() to continue"]
pub struct Located {
    config: AnalysisConfig,
    original: RgbImage,
    hair: ArtifactSuppression,
    segmentation: Segmentation,
    calibration: Option<ScaleCalibration>,
    candidate: GrayImage,
    excluded_pixel_count: u64,
}

impl Located {
    /// Coin calibration, `None` when no coin was found.
    #[must_use]
    pub const fn calibration(&self) -> Option<&ScaleCalibration> {
        self.calibration.as_ref()
    }

    /// Raw candidate mask with the coin footprint removed.
    #[must_use]
    pub const fn candidate(&self) -> &GrayImage {
        &self.candidate
    }

    /// Clean the candidate mask down to one convex region.
    pub fn refine(self) -> Refined {
        let refinement = clean_lesion_mask(&self.candidate, &self.config.refinement);
        let mask = self.calibration.as_ref().map_or_else(
            || refinement.mask.clone(),
            |c| exclude_region(&refinement.mask, &c.fiducial_mask),
        );
        let area_px = count_foreground(&mask);
        Refined {
            config: self.config,
            original: self.original,
            hair: self.hair,
            segmentation: self.segmentation,
            calibration: self.calibration,
            candidate: self.candidate,
            refinement,
            mask,
            area_px,
        }
    }
}

// ───────────────────────── Stage 5: Refined ──────────────────────────

/// Pipeline state after mask cleanup.
#[must_use = "pipeline stages are consumed by advancing, call .measure() to continue"]
pub struct Refined {
    config: AnalysisConfig,
    original: RgbImage,
    hair: ArtifactSuppression,
    segmentation: Segmentation,
    calibration: Option<ScaleCalibration>,
    candidate: GrayImage,
    refinement: Refinement,
    mask: GrayImage,
    area_px: u64,
}

impl Refined {
    /// Final lesion mask.
    #[must_use]
    pub const fn mask(&self) -> &GrayImage {
        &self.mask
    }

    /// Lesion area in pixels.
    #[must_use]
    pub const fn area_px(&self) -> u64 {
        self.area_px
    }

    /// Convert the area to mm² and extract ABCD descriptors. Both are
    /// skipped when no coin was found.
    pub fn measure(self) -> Measured {
        let area_mm2 = self.calibration.as_ref().map(|c| c.area_mm2(self.area_px));
        let features = area_mm2.map(|a| extract_features(&self.original, &self.mask, a));
        Measured {
            refined: self,
            area_mm2,
            features,
        }
    }
}

// ───────────────────────── Stage 6: Measured ─────────────────────────

/// Pipeline state after measurement.
#[must_use = "pipeline stages are consumed by advancing, call .render() to continue"]
pub struct Measured {
    refined: Refined,
    area_mm2: Option<f64>,
    features: Option<AbcdFeatures>,
}

impl Measured {
    /// Lesion area in mm², if calibrated.
    #[must_use]
    pub const fn area_mm2(&self) -> Option<f64> {
        self.area_mm2
    }

    /// ABCD descriptors, if calibrated.
    #[must_use]
    pub const fn features(&self) -> Option<&AbcdFeatures> {
        self.features.as_ref()
    }

    /// Blend the final mask over the original photograph.
    pub fn render(self) -> Rendered {
        let overlay = overlay_mask(
            &self.refined.original,
            &self.refined.mask,
            &self.refined.config.overlay,
        );
        Rendered {
            measured: self,
            overlay,
        }
    }
}

// ───────────────────────── Stage 7: Rendered ─────────────────────────

/// Final pipeline state.
#[must_use = "call .into_result() to obtain the analysis"]
pub struct Rendered {
    measured: Measured,
    overlay: RgbImage,
}

impl Rendered {
    /// The overlay image.
    #[must_use]
    pub const fn overlay(&self) -> &RgbImage {
        &self.overlay
    }

    /// Consume the pipeline and return every intermediate together with
    /// the final [`AnalysisResult`].
    #[must_use]
    pub fn into_result(self) -> StagedAnalysis {
        let Measured {
            refined,
            area_mm2,
            features,
        } = self.measured;
        let result = AnalysisResult {
            dimensions: Dimensions::of(&refined.original),
            mask: refined.mask,
            overlay: self.overlay,
            area_px: refined.area_px,
            calibration: refined.calibration,
            area_mm2,
            features,
        };
        StagedAnalysis {
            original: refined.original,
            cleaned: refined.hair.cleaned,
            artifact_mask: refined.hair.artifact_mask,
            segmentation: refined.segmentation,
            candidate: refined.candidate,
            refinement: refined.refinement,
            result,
        }
    }
}

/// Every intermediate of one analysis plus the final result.
#[derive(Debug, Clone)]
pub struct StagedAnalysis {
    /// Decoded photograph.
    pub original: RgbImage,
    /// Photograph with hair inpainted.
    pub cleaned: RgbImage,
    /// Dilated hair mask.
    pub artifact_mask: GrayImage,
    /// Cluster statistics, choice and raw candidate mask.
    pub segmentation: Segmentation,
    /// Raw candidate mask with the coin footprint removed.
    pub candidate: GrayImage,
    /// Cleanup output before the second coin exclusion.
    pub refinement: Refinement,
    /// Final result.
    pub result: AnalysisResult,
}

// ─────────────────────────── Stage metrics ───────────────────────────

/// Trait implemented by every pipeline stage that performed work.
///
/// Gives the diagnostics runner a uniform way to name a stage and read
/// the metrics describing the work done to reach it.
pub trait PipelineStage {
    /// Human-readable name of this stage (e.g. `"decode"`).
    const NAME: &str;

    /// Zero-based index of this stage in execution order.
    const INDEX: usize;

    /// Stage-specific metrics for diagnostics.
    fn metrics(&self) -> StageMetrics;
}

/// Total number of stages after [`Pending`].
pub const STAGE_COUNT: usize = 7;

impl PipelineStage for Decoded {
    const NAME: &str = "decode";
    const INDEX: usize = 0;

    fn metrics(&self) -> StageMetrics {
        let dimensions = Dimensions::of(&self.original);
        StageMetrics::Decode {
            input_bytes: self.source_len,
            width: dimensions.width,
            height: dimensions.height,
            pixel_count: dimensions.pixel_count(),
        }
    }
}

impl PipelineStage for HairSuppressed {
    const NAME: &str = "hair";
    const INDEX: usize = 1;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Hair {
            artifact_pixel_count: count_foreground(&self.hair.artifact_mask),
            total_pixel_count: Dimensions::of(&self.original).pixel_count(),
        }
    }
}

impl PipelineStage for Segmented {
    const NAME: &str = "segmentation";
    const INDEX: usize = 2;

    fn metrics(&self) -> StageMetrics {
        let choice = self.segmentation.choice;
        StageMetrics::Segmentation {
            cluster_fractions: self
                .segmentation
                .clusters
                .iter()
                .map(|c| c.fraction)
                .collect(),
            chosen: choice.map(|c| c.cluster),
            rank: choice.map(|c| c.rank),
            fallback: choice.is_some_and(|c| c.fallback),
            candidate_pixel_count: count_foreground(&self.segmentation.mask),
        }
    }
}

impl PipelineStage for Located {
    const NAME: &str = "fiducial";
    const INDEX: usize = 3;

    fn metrics(&self) -> StageMetrics {
        let cal = self.calibration.as_ref();
        StageMetrics::Fiducial {
            found: cal.is_some(),
            radius_px: cal.map(|c| c.fiducial_radius_px),
            center: cal.map(|c| c.fiducial_center),
            pixels_per_mm: cal.map(|c| c.pixels_per_mm),
            excluded_pixel_count: self.excluded_pixel_count,
        }
    }
}

impl PipelineStage for Refined {
    const NAME: &str = "refinement";
    const INDEX: usize = 4;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Refinement {
            contours_found: self.refinement.contours_found,
            contours_kept: self.refinement.contours_kept,
            area_px: self.area_px,
        }
    }
}

impl Measured {
    /// Feature metrics, `None` when the photograph was not calibrated.
    #[must_use]
    pub fn feature_metrics(&self) -> Option<StageMetrics> {
        self.features.map(|f| StageMetrics::Features {
            asymmetry: f.asymmetry,
            border_irregularity: f.border_irregularity,
            color_variation: f.color_variation,
            diameter_mm: f.diameter_mm,
            risk: f.risk(),
        })
    }
}

impl PipelineStage for Rendered {
    const NAME: &str = "overlay";
    const INDEX: usize = 6;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Overlay {
            alpha: self.measured.refined.config.overlay.alpha,
        }
    }
}

/// Entry point for the incremental pipeline.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from source image bytes and config.
    ///
    /// No processing is performed; the bytes and config are simply
    /// stored. Call [`.decode()`](Pending::decode) to begin processing.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(image_bytes: Vec<u8>, config: AnalysisConfig) -> Pending {
        Pending {
            config,
            source: image_bytes,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mask::FOREGROUND;

    const SKIN: [u8; 3] = [225, 190, 170];
    const LESION: [u8; 3] = [90, 55, 40];

    fn encode_png(img: &RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgb8,
        )
        .unwrap();
        buf
    }

    /// Skin with one dark round lesion and no coin.
    fn lesion_png() -> Vec<u8> {
        let img = RgbImage::from_fn(160, 120, |x, y| {
            let (dx, dy) = (i64::from(x) - 80, i64::from(y) - 60);
            image::Rgb(if dx * dx + dy * dy <= 30 * 30 {
                LESION
            } else {
                SKIN
            })
        });
        encode_png(&img)
    }

    fn run(bytes: Vec<u8>) -> StagedAnalysis {
        Pipeline::new(bytes, AnalysisConfig::default())
            .decode()
            .unwrap()
            .suppress_hair()
            .segment()
            .locate_fiducial()
            .refine()
            .measure()
            .render()
            .into_result()
    }

    #[test]
    fn empty_input_fails_to_decode() {
        let result = Pipeline::new(Vec::new(), AnalysisConfig::default()).decode();
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn corrupt_input_fails_to_decode() {
        let result = Pipeline::new(vec![0xFF, 0x00, 0x12], AnalysisConfig::default()).decode();
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn pending_keeps_source() {
        let pending = Pipeline::new(vec![1, 2, 3], AnalysisConfig::default());
        assert_eq!(pending.source(), &[1, 2, 3]);
    }

    #[test]
    fn uncalibrated_lesion_is_segmented_but_not_measured() {
        let staged = run(lesion_png());
        let result = &staged.result;
        assert_eq!(result.dimensions, Dimensions { width: 160, height: 120 });
        assert!(result.calibration.is_none());
        assert!(result.area_mm2.is_none());
        assert!(result.features.is_none());
        assert!(result.lesion_detected());
        assert_eq!(result.mask.get_pixel(80, 60).0[0], FOREGROUND);
        assert_eq!(result.mask.get_pixel(5, 5).0[0], 0);
        // Without a coin nothing is excluded.
        assert_eq!(staged.candidate, staged.segmentation.mask);
    }

    #[test]
    fn intermediates_share_dimensions() {
        let staged = run(lesion_png());
        assert_eq!(staged.original.dimensions(), (160, 120));
        assert_eq!(staged.cleaned.dimensions(), (160, 120));
        assert_eq!(staged.artifact_mask.dimensions(), (160, 120));
        assert_eq!(staged.segmentation.mask.dimensions(), (160, 120));
        assert_eq!(staged.result.overlay.dimensions(), (160, 120));
    }

    #[test]
    fn stage_metrics_follow_the_run() {
        let decoded = Pipeline::new(lesion_png(), AnalysisConfig::default())
            .decode()
            .unwrap();
        assert!(matches!(
            decoded.metrics(),
            StageMetrics::Decode { width: 160, height: 120, pixel_count: 19_200, .. }
        ));
        let segmented = decoded.suppress_hair().segment();
        let metrics = segmented.metrics();
        assert!(matches!(
            metrics,
            StageMetrics::Segmentation { ref cluster_fractions, chosen: Some(_), .. }
                if cluster_fractions.len() == 3
        ));
        let located = segmented.locate_fiducial();
        assert!(matches!(
            located.metrics(),
            StageMetrics::Fiducial { found: false, excluded_pixel_count: 0, .. }
        ));
        let measured = located.refine().measure();
        assert!(measured.feature_metrics().is_none());
        assert_eq!(Rendered::INDEX + 1, STAGE_COUNT);
    }
}
