//! dermscope-history: Measurement history and lesion evolution.
//!
//! Persists one [`LesionRecord`] per calibrated analysis and derives the
//! evolution term `E` from the growth of a lesion's area over time.
//! Storage sits behind the [`RecordStore`] trait so callers can swap the
//! JSON file for an in-memory store in tests.

pub mod evolution;
pub mod record;
pub mod store;

pub use evolution::{Evolution, EvolutionStatus, evolution_score};
pub use record::LesionRecord;
pub use store::{JsonFileStore, MemoryStore, RecordStore};

/// Errors raised while reading or writing the measurement history.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// The history file could not be read or written.
    #[error("history I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The history file is not valid JSON, or a record is malformed.
    #[error("history file is corrupt: {0}")]
    Json(#[from] serde_json::Error),

    /// A record was rejected before being stored.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}
