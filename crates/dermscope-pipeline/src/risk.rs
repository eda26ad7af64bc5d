//! Risk aggregation.
//!
//! A fixed linear combination of the ABCD descriptors plus a boolean
//! diameter term, optionally raised by a longitudinal growth tier. The
//! weights are empirical and deliberately not configurable. The score
//! is descriptive, not diagnostic.

use serde::{Deserialize, Serialize};

use crate::features::AbcdFeatures;

/// Weight of asymmetry.
pub const ASYMMETRY_WEIGHT: f64 = 2.0;
/// Weight of border irregularity.
pub const BORDER_WEIGHT: f64 = 1.8;
/// Weight of color variation, applied after dividing by
/// [`COLOR_SCALE`].
pub const COLOR_WEIGHT: f64 = 1.2;
/// Color variation is divided by this before weighting.
pub const COLOR_SCALE: f64 = 50.0;
/// Added when the diameter exceeds [`DIAMETER_THRESHOLD_MM`].
pub const DIAMETER_WEIGHT: f64 = 2.5;
/// Diameter threshold in millimeters (strictly greater).
pub const DIAMETER_THRESHOLD_MM: f64 = 6.0;
/// Weight of the growth tier in the total score.
pub const EVOLUTION_WEIGHT: f64 = 3.0;

/// `2.0·A + 1.8·B + 1.2·(C/50) + 2.5·[D > 6]`.
#[must_use]
pub fn abcd_risk(features: &AbcdFeatures) -> f64 {
    let large = if features.diameter_mm > DIAMETER_THRESHOLD_MM {
        DIAMETER_WEIGHT
    } else {
        0.0
    };
    COLOR_WEIGHT.mul_add(
        features.color_variation / COLOR_SCALE,
        ASYMMETRY_WEIGHT.mul_add(
            features.asymmetry,
            BORDER_WEIGHT * features.border_irregularity,
        ),
    ) + large
}

/// ABCD risk of one analysis.
///
/// The diameter term needs a metric scale; without one the score is
/// reported as incomplete instead of silently dropping the term.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum RiskScore {
    /// All four terms were evaluated.
    Scored(f64),
    /// Calibration was unavailable.
    Incomplete,
}

impl RiskScore {
    /// The score, if complete.
    #[must_use]
    pub const fn value(self) -> Option<f64> {
        match self {
            Self::Scored(v) => Some(v),
            Self::Incomplete => None,
        }
    }
}

impl std::fmt::Display for RiskScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scored(v) => write!(f, "{v:.2}"),
            Self::Incomplete => f.write_str("incomplete (no scale reference)"),
        }
    }
}

/// Growth tier between the earliest and latest measurement of a lesion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthTier {
    /// Below 2 mm² per month, or not enough history.
    Stable,
    /// 2 to 10 mm² per month.
    Moderate,
    /// 10 mm² per month or more.
    Rapid,
}

impl GrowthTier {
    /// Numeric evolution term `E` in `{0, 1, 2}`.
    #[must_use]
    pub const fn score(self) -> u8 {
        match self {
            Self::Stable => 0,
            Self::Moderate => 1,
            Self::Rapid => 2,
        }
    }

    /// Tier of an area growth rate in mm² per month.
    #[must_use]
    pub fn from_rate(rate_mm2_per_month: f64) -> Self {
        if rate_mm2_per_month < 2.0 {
            Self::Stable
        } else if rate_mm2_per_month < 10.0 {
            Self::Moderate
        } else {
            Self::Rapid
        }
    }
}

/// `risk_abcd + 3.0·E`.
#[must_use]
pub fn total_risk(risk_abcd: f64, tier: GrowthTier) -> f64 {
    EVOLUTION_WEIGHT.mul_add(f64::from(tier.score()), risk_abcd)
}

/// Coarse banding of a total risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Below 3.
    Low,
    /// 3 up to (excluding) 6.
    Moderate,
    /// 6 and above.
    High,
}

impl RiskLevel {
    /// Band a score.
    #[must_use]
    pub fn of(score: f64) -> Self {
        if score < 3.0 {
            Self::Low
        } else if score < 6.0 {
            Self::Moderate
        } else {
            Self::High
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
        })
    }
}
