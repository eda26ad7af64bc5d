//! One stored measurement of a lesion.

use chrono::{DateTime, Utc};
use dermscope_pipeline::{AbcdFeatures, AnalysisResult};
use serde::{Deserialize, Serialize};

use crate::HistoryError;

/// Serde support for record timestamps.
///
/// Written as RFC 3339 UTC. Older history files store naive ISO 8601
/// local timestamps without an offset; those are read as UTC.
mod date_serde {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        date.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if let Ok(date) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(date.with_timezone(&Utc));
        }
        raw.parse::<NaiveDateTime>()
            .map(|naive| naive.and_utc())
            .map_err(|e| serde::de::Error::custom(format!("invalid date {raw:?}: {e}")))
    }
}

/// A calibrated measurement, rounded as stored.
///
/// Field names on disk are `user_id`, `lesion_id`, `date`, `area_mm2`,
/// `diameter_mm`, `A`, `B`, `C` and `risk`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LesionRecord {
    /// Owner of the lesion.
    pub user_id: String,
    /// Lesion identifier, unique per user.
    pub lesion_id: String,
    /// When the photograph was analyzed.
    #[serde(with = "date_serde")]
    pub date: DateTime<Utc>,
    /// Area in mm², 2 decimals.
    pub area_mm2: f64,
    /// Equivalent diameter in mm, 2 decimals.
    pub diameter_mm: f64,
    /// Asymmetry, 3 decimals.
    #[serde(rename = "A")]
    pub asymmetry: f64,
    /// Border irregularity, 3 decimals.
    #[serde(rename = "B")]
    pub border_irregularity: f64,
    /// Color variation, 2 decimals.
    #[serde(rename = "C")]
    pub color_variation: f64,
    /// ABCD risk, 2 decimals.
    pub risk: f64,
}

impl LesionRecord {
    /// Build a record from measured values, rounding each to its stored
    /// precision.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::InvalidRecord`] if an identifier is empty
    /// or the area is negative or not finite.
    pub fn new(
        user_id: impl Into<String>,
        lesion_id: impl Into<String>,
        date: DateTime<Utc>,
        area_mm2: f64,
        features: &AbcdFeatures,
    ) -> Result<Self, HistoryError> {
        let user_id = user_id.into();
        let lesion_id = lesion_id.into();
        if user_id.trim().is_empty() {
            return Err(HistoryError::InvalidRecord("user id is empty".to_string()));
        }
        if lesion_id.trim().is_empty() {
            return Err(HistoryError::InvalidRecord("lesion id is empty".to_string()));
        }
        if !(area_mm2.is_finite() && area_mm2 >= 0.0) {
            return Err(HistoryError::InvalidRecord(format!(
                "area must be finite and >= 0, got {area_mm2}"
            )));
        }
        Ok(Self {
            user_id,
            lesion_id,
            date,
            area_mm2: round_to(area_mm2, 2),
            diameter_mm: round_to(features.diameter_mm, 2),
            asymmetry: round_to(features.asymmetry, 3),
            border_irregularity: round_to(features.border_irregularity, 3),
            color_variation: round_to(features.color_variation, 2),
            risk: round_to(features.risk(), 2),
        })
    }

    /// Record a finished analysis.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::InvalidRecord`] when the analysis has no
    /// calibration: an unscaled measurement cannot be compared over time.
    pub fn from_analysis(
        user_id: impl Into<String>,
        lesion_id: impl Into<String>,
        date: DateTime<Utc>,
        result: &AnalysisResult,
    ) -> Result<Self, HistoryError> {
        match (result.area_mm2, result.features.as_ref()) {
            (Some(area_mm2), Some(features)) => {
                Self::new(user_id, lesion_id, date, area_mm2, features)
            }
            _ => Err(HistoryError::InvalidRecord(
                "analysis is not calibrated".to_string(),
            )),
        }
    }

    /// Whether this record belongs to the given user and lesion filters.
    /// `None` matches anything.
    #[must_use]
    pub fn matches(&self, user_id: Option<&str>, lesion_id: Option<&str>) -> bool {
        user_id.is_none_or(|u| self.user_id == u) && lesion_id.is_none_or(|l| self.lesion_id == l)
    }
}

/// Round half away from zero to `decimals` places.
fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}
