//! Lesion evolution: area growth between the earliest and latest
//! measurement of one lesion.

use chrono::{DateTime, Utc};
use dermscope_pipeline::GrowthTier;
use serde::{Deserialize, Serialize};

use crate::HistoryError;
use crate::record::LesionRecord;
use crate::store::RecordStore;

/// Mean month length used to convert elapsed days into months.
pub const DAYS_PER_MONTH: f64 = 30.44;

/// Outcome of an evolution check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvolutionStatus {
    /// Fewer than two measurements.
    InsufficientData,
    /// The measurements are less than a whole day apart.
    InsufficientTime,
    /// Growth below 2 mm² per month.
    Stable,
    /// Growth from 2 up to 10 mm² per month.
    SlowGrowth,
    /// Growth of 10 mm² per month or more.
    RapidGrowth,
}

impl From<GrowthTier> for EvolutionStatus {
    fn from(tier: GrowthTier) -> Self {
        match tier {
            GrowthTier::Stable => Self::Stable,
            GrowthTier::Moderate => Self::SlowGrowth,
            GrowthTier::Rapid => Self::RapidGrowth,
        }
    }
}

impl std::fmt::Display for EvolutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::InsufficientData => "insufficient data",
            Self::InsufficientTime => "insufficient time",
            Self::Stable => "stable",
            Self::SlowGrowth => "slow growth",
            Self::RapidGrowth => "rapid growth",
        })
    }
}

/// Growth of one lesion over its recorded history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evolution {
    /// Growth tier, `None` when there is not enough history.
    pub tier: Option<GrowthTier>,
    /// Human-readable outcome.
    pub status: EvolutionStatus,
    /// Area change per month between the first and last record, rounded
    /// to 2 decimals. Zero without enough history.
    pub rate_mm2_per_month: f64,
    /// Months between the first and last record, rounded to 2 decimals.
    pub months_between: Option<f64>,
}

impl Evolution {
    const fn insufficient(status: EvolutionStatus) -> Self {
        Self {
            tier: None,
            status,
            rate_mm2_per_month: 0.0,
            months_between: None,
        }
    }

    /// Evolution term `E` in `{0, 1, 2}`.
    #[must_use]
    pub fn score(&self) -> u8 {
        self.tier.map_or(0, GrowthTier::score)
    }

    /// Growth tier for the total risk, stable when unknown.
    #[must_use]
    pub fn tier_or_stable(&self) -> GrowthTier {
        self.tier.unwrap_or(GrowthTier::Stable)
    }

    /// Compare the earliest and latest of `records`.
    ///
    /// The records are expected to belong to a single lesion; their
    /// order does not matter.
    #[must_use]
    pub fn from_records(records: &[LesionRecord]) -> Self {
        let (Some(first), Some(last)) = (
            records.iter().min_by_key(|r| r.date),
            records.iter().max_by_key(|r| r.date),
        ) else {
            return Self::insufficient(EvolutionStatus::InsufficientData);
        };
        if records.len() < 2 {
            return Self::insufficient(EvolutionStatus::InsufficientData);
        }

        if (last.date - first.date).num_days() == 0 {
            return Self::insufficient(EvolutionStatus::InsufficientTime);
        }
        let months = months_between(first.date, last.date);

        let rate = (last.area_mm2 - first.area_mm2) / months;
        let tier = GrowthTier::from_rate(rate);
        Self {
            tier: Some(tier),
            status: tier.into(),
            rate_mm2_per_month: round2(rate),
            months_between: Some(round2(months)),
        }
    }
}

/// Whole days elapsed between two timestamps, in months.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn months_between(a: DateTime<Utc>, b: DateTime<Utc>) -> f64 {
    (b - a).num_days().unsigned_abs() as f64 / DAYS_PER_MONTH
}

/// Evolution of one lesion from the records in `store`.
///
/// # Errors
///
/// Returns [`HistoryError`] if the store cannot be read.
pub fn evolution_score<S: RecordStore + ?Sized>(
    store: &S,
    user_id: &str,
    lesion_id: &str,
) -> Result<Evolution, HistoryError> {
    let records = store.query(Some(user_id), Some(lesion_id))?;
    Ok(Evolution::from_records(&records))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
