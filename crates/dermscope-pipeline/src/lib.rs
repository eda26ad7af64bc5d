//! dermscope-pipeline: Pure lesion analysis pipeline (sans-IO).
//!
//! Estimates ABCD shape and color descriptors of a skin lesion from a
//! photograph that also contains a reference coin:
//! decode -> hair suppression -> Lab k-means segmentation ->
//! coin detection -> mask cleanup -> area and ABCD features -> overlay.
//!
//! This crate has **no I/O dependencies**: it operates on in-memory
//! byte slices and returns structured data. Measurement history lives in
//! `dermscope-history`, file and terminal handling in `dermscope-cli`.
//!
//! The descriptors are a screening aid, not a diagnosis.

pub mod blur;
pub mod cluster;
pub mod color;
pub mod config;
pub mod contour;
pub mod decode;
pub mod diagnostics;
pub mod edge;
pub mod features;
pub mod fiducial;
pub mod hair;
pub mod hough;
pub mod inpaint;
pub mod kmeans;
pub mod mask;
pub mod morphology;
pub mod overlay;
pub mod pipeline;
pub mod refine;
pub mod risk;
pub mod types;

pub use config::{
    AnalysisConfig, FiducialConfig, HairConfig, OverlayConfig, RefinementConfig,
    SegmentationConfig,
};
pub use diagnostics::{Clock, PipelineDiagnostics, ZeroClock};
pub use features::AbcdFeatures;
pub use pipeline::{Pipeline, StagedAnalysis};
pub use risk::{GrowthTier, RiskLevel, RiskScore, total_risk};
pub use types::{
    AnalysisResult, AnalysisSummary, AnalysisWarning, Dimensions, GrayImage, PipelineError,
    RgbImage, ScaleCalibration,
};

use diagnostics::{PipelineSummary, StageDiagnostics};
use pipeline::PipelineStage;

/// Run the full lesion analysis.
///
/// Takes raw image bytes (PNG, JPEG, BMP, WebP) and a configuration and
/// returns the final mask, overlay, calibration and descriptors.
///
/// A missing reference coin or an empty lesion mask are not errors; see
/// [`AnalysisResult::warnings`].
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if the configuration is
/// rejected by [`AnalysisConfig::validate`].
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is unrecognized.
pub fn analyze(
    image_bytes: &[u8],
    config: &AnalysisConfig,
) -> Result<AnalysisResult, PipelineError> {
    Ok(analyze_staged(image_bytes, config)?.result)
}

/// Run the full analysis and keep every intermediate.
///
/// # Errors
///
/// Same as [`analyze`].
pub fn analyze_staged(
    image_bytes: &[u8],
    config: &AnalysisConfig,
) -> Result<StagedAnalysis, PipelineError> {
    Ok(analyze_with_diagnostics(image_bytes, config, &ZeroClock)?.0)
}

/// Run the full analysis, timing each stage with `clock`.
///
/// # Errors
///
/// Same as [`analyze`].
pub fn analyze_with_diagnostics<C: Clock>(
    image_bytes: &[u8],
    config: &AnalysisConfig,
    clock: &C,
) -> Result<(StagedAnalysis, PipelineDiagnostics), PipelineError> {
    config.validate()?;
    let start = clock.now();

    let t = clock.now();
    let decoded = Pipeline::new(image_bytes.to_vec(), config.clone()).decode()?;
    let decode = timed(clock, &t, decoded.metrics());

    let t = clock.now();
    let hair_free = decoded.suppress_hair();
    let hair = timed(clock, &t, hair_free.metrics());

    let t = clock.now();
    let segmented = hair_free.segment();
    let segmentation = timed(clock, &t, segmented.metrics());

    let t = clock.now();
    let located = segmented.locate_fiducial();
    let fiducial = timed(clock, &t, located.metrics());

    let t = clock.now();
    let refined = located.refine();
    let refinement = timed(clock, &t, refined.metrics());

    let t = clock.now();
    let measured = refined.measure();
    let features = measured
        .feature_metrics()
        .map(|metrics| timed(clock, &t, metrics));

    let t = clock.now();
    let rendered = measured.render();
    let overlay = timed(clock, &t, rendered.metrics());

    let staged = rendered.into_result();
    let total_duration = clock.elapsed(&start);

    let dimensions = staged.result.dimensions;
    let diagnostics = PipelineDiagnostics {
        decode,
        hair,
        segmentation,
        fiducial,
        refinement,
        features,
        overlay,
        total_duration,
        summary: PipelineSummary {
            image_width: dimensions.width,
            image_height: dimensions.height,
            pixel_count: dimensions.pixel_count(),
            calibrated: staged.result.is_calibrated(),
            area_px: staged.result.area_px,
        },
    };
    Ok((staged, diagnostics))
}

fn timed<C: Clock>(
    clock: &C,
    start: &C::Instant,
    metrics: diagnostics::StageMetrics,
) -> StageDiagnostics {
    StageDiagnostics {
        duration: clock.elapsed(start),
        metrics,
    }
}
