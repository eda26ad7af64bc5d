//! Pipeline configuration.
//!
//! Every parameter has a default matching the empirically tuned values
//! the analysis was calibrated with. Each stage owns a sub-config so a
//! caller can override one stage from JSON without restating the rest.

use serde::{Deserialize, Serialize};

use crate::types::PipelineError;

/// Complete configuration for [`analyze`](crate::analyze).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Hair (thin dark filament) suppression.
    pub hair: HairConfig,
    /// Color clustering segmentation.
    pub segmentation: SegmentationConfig,
    /// Reference coin detection.
    pub fiducial: FiducialConfig,
    /// Candidate mask cleanup.
    pub refinement: RefinementConfig,
    /// Overlay rendering.
    pub overlay: OverlayConfig,
}

impl AnalysisConfig {
    /// Check every sub-config for values the stages cannot honor.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] describing the first
    /// offending field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.hair.validate()?;
        self.segmentation.validate()?;
        self.fiducial.validate()?;
        self.refinement.validate()?;
        self.overlay.validate()
    }
}

/// Parameters for black-hat hair detection and inpainting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HairConfig {
    /// Side of the square black-hat structuring element (odd). Should
    /// exceed the thickness of the hairs to highlight.
    pub kernel_size: u8,
    /// Black-hat responses strictly above this value are hair.
    pub threshold: u8,
    /// Diameter of the elliptical element used to grow the hair mask
    /// over antialiased edges (odd).
    pub dilate_size: u8,
    /// Neighborhood radius in pixels used when filling hair pixels.
    pub inpaint_radius: f32,
}

impl HairConfig {
    /// Default black-hat kernel side.
    pub const DEFAULT_KERNEL_SIZE: u8 = 9;
    /// Default black-hat threshold.
    pub const DEFAULT_THRESHOLD: u8 = 10;
    /// Default hair-mask dilation diameter.
    pub const DEFAULT_DILATE_SIZE: u8 = 5;
    /// Default inpainting radius.
    pub const DEFAULT_INPAINT_RADIUS: f32 = 3.0;

    fn validate(&self) -> Result<(), PipelineError> {
        check_kernel("hair.kernel_size", self.kernel_size)?;
        check_kernel("hair.dilate_size", self.dilate_size)?;
        if !(self.inpaint_radius.is_finite() && self.inpaint_radius >= 1.0) {
            return Err(invalid(format!(
                "hair.inpaint_radius must be >= 1, got {}",
                self.inpaint_radius
            )));
        }
        Ok(())
    }
}

impl Default for HairConfig {
    fn default() -> Self {
        Self {
            kernel_size: Self::DEFAULT_KERNEL_SIZE,
            threshold: Self::DEFAULT_THRESHOLD,
            dilate_size: Self::DEFAULT_DILATE_SIZE,
            inpaint_radius: Self::DEFAULT_INPAINT_RADIUS,
        }
    }
}

/// Parameters for Lab k-means segmentation and lesion cluster selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Gaussian sigma applied before clustering. The default is the
    /// sigma implied by a 5x5 kernel.
    pub blur_sigma: f32,
    /// Number of color clusters.
    pub clusters: usize,
    /// Independent k-means restarts; the most compact is kept.
    pub attempts: u32,
    /// Iteration cap per restart.
    pub max_iterations: u32,
    /// Convergence threshold on the largest center shift.
    pub epsilon: f32,
    /// Seed for k-means++ initialisation.
    pub seed: u64,
    /// A cluster qualifies as lesion only if its pixel fraction is
    /// strictly greater than this.
    pub min_fraction: f64,
    /// ... and strictly less than this.
    pub max_fraction: f64,
    /// Diameter of the elliptical element used to grow the chosen
    /// cluster (odd).
    pub dilate_size: u8,
}

impl SegmentationConfig {
    /// Default pre-clustering blur sigma.
    pub const DEFAULT_BLUR_SIGMA: f32 = 1.1;
    /// Default cluster count.
    pub const DEFAULT_CLUSTERS: usize = 3;
    /// Default seed.
    pub const DEFAULT_SEED: u64 = 0x00d3_7a5c_0e5e_ed00;

    fn validate(&self) -> Result<(), PipelineError> {
        if self.clusters == 0 {
            return Err(invalid("segmentation.clusters must be at least 1"));
        }
        if self.attempts == 0 || self.max_iterations == 0 {
            return Err(invalid(
                "segmentation.attempts and segmentation.max_iterations must be at least 1",
            ));
        }
        if !(self.epsilon.is_finite() && self.epsilon >= 0.0) {
            return Err(invalid("segmentation.epsilon must be finite and >= 0"));
        }
        if !(0.0..1.0).contains(&self.min_fraction)
            || !(0.0..=1.0).contains(&self.max_fraction)
            || self.min_fraction >= self.max_fraction
        {
            return Err(invalid(format!(
                "segmentation fraction gate ({}, {}) is empty",
                self.min_fraction, self.max_fraction
            )));
        }
        check_kernel("segmentation.dilate_size", self.dilate_size)
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            blur_sigma: Self::DEFAULT_BLUR_SIGMA,
            clusters: Self::DEFAULT_CLUSTERS,
            attempts: 5,
            max_iterations: 20,
            epsilon: 1.0,
            seed: Self::DEFAULT_SEED,
            min_fraction: 0.01,
            max_fraction: 0.8,
            dilate_size: 9,
        }
    }
}

/// Parameters for reference coin detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FiducialConfig {
    /// Physical diameter of the reference coin in millimeters.
    pub diameter_mm: f64,
    /// Gaussian sigma applied before circle detection.
    pub blur_sigma: f32,
    /// Inverse accumulator resolution (1.0 = one cell per pixel).
    pub dp: f32,
    /// Minimum center separation as a fraction of the smaller image side.
    pub min_dist_fraction: f64,
    /// Upper Canny threshold; the lower one is half of it.
    pub canny_high: f32,
    /// Minimum center votes, and minimum edge support of a radius.
    pub accumulator_threshold: u32,
    /// Smallest accepted radius in pixels.
    pub min_radius: u32,
    /// Largest accepted radius in pixels. `None` means half the smaller
    /// image side.
    pub max_radius: Option<u32>,
    /// Exclusion disk radius relative to the detected radius. Values
    /// above 1 also cover the rim and shadow of the coin.
    pub exclusion_scale: f64,
}

impl FiducialConfig {
    /// Default coin diameter (10 hryvnia coin).
    pub const DEFAULT_DIAMETER_MM: f64 = 23.5;
    /// Default smallest coin radius in pixels.
    pub const DEFAULT_MIN_RADIUS: u32 = 50;
    /// Default exclusion scale.
    pub const DEFAULT_EXCLUSION_SCALE: f64 = 1.15;
    /// Default minimum center separation: a third of the smaller side.
    ///
    /// The separation is not truncated to whole pixels, so it can exceed
    /// an integer `min(w, h) / 3` by less than one pixel.
    pub const DEFAULT_MIN_DIST_FRACTION: f64 = 1.0 / 3.0;

    /// Resolve the maximum radius for an image of the given size.
    #[must_use]
    pub fn resolved_max_radius(&self, width: u32, height: u32) -> u32 {
        self.max_radius.unwrap_or(width.min(height) / 2)
    }

    /// Minimum distance between detected centers for an image of the
    /// given size, in pixels.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn min_center_distance(&self, width: u32, height: u32) -> f32 {
        (f64::from(width.min(height)) * self.min_dist_fraction) as f32
    }

    fn validate(&self) -> Result<(), PipelineError> {
        if !(self.diameter_mm.is_finite() && self.diameter_mm > 0.0) {
            return Err(invalid(format!(
                "fiducial.diameter_mm must be > 0, got {}",
                self.diameter_mm
            )));
        }
        if !(self.dp.is_finite() && self.dp >= 1.0) {
            return Err(invalid(format!("fiducial.dp must be >= 1, got {}", self.dp)));
        }
        if !(self.canny_high.is_finite() && self.canny_high > 0.0) {
            return Err(invalid("fiducial.canny_high must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.min_dist_fraction) {
            return Err(invalid("fiducial.min_dist_fraction must be within [0, 1]"));
        }
        if let Some(max) = self.max_radius
            && max < self.min_radius
        {
            return Err(invalid(format!(
                "fiducial.max_radius ({max}) is below fiducial.min_radius ({})",
                self.min_radius
            )));
        }
        if !(self.exclusion_scale.is_finite() && self.exclusion_scale >= 1.0) {
            return Err(invalid("fiducial.exclusion_scale must be >= 1"));
        }
        Ok(())
    }
}

impl Default for FiducialConfig {
    fn default() -> Self {
        Self {
            diameter_mm: Self::DEFAULT_DIAMETER_MM,
            blur_sigma: 2.0,
            dp: 1.2,
            min_dist_fraction: Self::DEFAULT_MIN_DIST_FRACTION,
            canny_high: 100.0,
            accumulator_threshold: 30,
            min_radius: Self::DEFAULT_MIN_RADIUS,
            max_radius: None,
            exclusion_scale: Self::DEFAULT_EXCLUSION_SCALE,
        }
    }
}

/// Parameters for morphological cleanup and contour filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinementConfig {
    /// Side of the square element used for close/open (odd).
    pub kernel_size: u8,
    /// Close iterations (n dilations followed by n erosions).
    pub close_iterations: u32,
    /// Open iterations (n erosions followed by n dilations).
    pub open_iterations: u32,
    /// Contours with a smaller area (px²) are noise.
    pub min_area: f64,
    /// Bounding-box aspect ratio above which a contour counts as elongated.
    pub max_aspect_ratio: f64,
    /// Elongated contours below this area (px²) are discarded.
    pub elongated_area_limit: f64,
    /// Diameter of the elliptical element applied after the hull (odd).
    pub dilate_size: u8,
}

impl RefinementConfig {
    fn validate(&self) -> Result<(), PipelineError> {
        check_kernel("refinement.kernel_size", self.kernel_size)?;
        check_kernel("refinement.dilate_size", self.dilate_size)?;
        if !(self.min_area >= 0.0 && self.elongated_area_limit >= 0.0) {
            return Err(invalid("refinement areas must be >= 0"));
        }
        if self.max_aspect_ratio.is_nan() || self.max_aspect_ratio < 1.0 {
            return Err(invalid("refinement.max_aspect_ratio must be >= 1"));
        }
        Ok(())
    }
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            kernel_size: 5,
            close_iterations: 2,
            open_iterations: 1,
            min_area: 300.0,
            max_aspect_ratio: 6.0,
            elongated_area_limit: 5000.0,
            dilate_size: 5,
        }
    }
}

/// Overlay blending parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Weight of the highlight layer; the photograph gets `1 - alpha`.
    pub alpha: f32,
    /// Highlight color painted over lesion pixels.
    pub color: [u8; 3],
}

impl OverlayConfig {
    fn validate(&self) -> Result<(), PipelineError> {
        if (0.0..=1.0).contains(&self.alpha) {
            Ok(())
        } else {
            Err(invalid(format!(
                "overlay.alpha must be within [0, 1], got {}",
                self.alpha
            )))
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            alpha: 0.3,
            color: [0, 255, 0],
        }
    }
}

fn invalid(message: impl Into<String>) -> PipelineError {
    PipelineError::InvalidConfig(message.into())
}

/// Structuring elements are centered, so their side must be odd.
fn check_kernel(name: &str, size: u8) -> Result<(), PipelineError> {
    if size % 2 == 1 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be odd, got {size}")))
    }
}
