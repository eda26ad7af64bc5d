//! Record storage.

use std::path::{Path, PathBuf};

use crate::HistoryError;
use crate::record::LesionRecord;

/// Append-only store of lesion measurements.
pub trait RecordStore {
    /// Persist one record.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError`] if the backing storage fails.
    fn append(&mut self, record: LesionRecord) -> Result<(), HistoryError>;

    /// Every stored record, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError`] if the backing storage cannot be read.
    fn records(&self) -> Result<Vec<LesionRecord>, HistoryError>;

    /// Records matching the filters (`None` matches anything), oldest
    /// first. Records with equal timestamps keep insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError`] if the backing storage cannot be read.
    fn query(
        &self,
        user_id: Option<&str>,
        lesion_id: Option<&str>,
    ) -> Result<Vec<LesionRecord>, HistoryError> {
        let mut matching: Vec<LesionRecord> = self
            .records()?
            .into_iter()
            .filter(|r| r.matches(user_id, lesion_id))
            .collect();
        matching.sort_by_key(|r| r.date);
        Ok(matching)
    }

    /// Most recent record of one lesion.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError`] if the backing storage cannot be read.
    fn last(&self, user_id: &str, lesion_id: &str) -> Result<Option<LesionRecord>, HistoryError> {
        Ok(self.query(Some(user_id), Some(lesion_id))?.pop())
    }
}

/// In-memory store, for tests and one-off sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Vec<LesionRecord>,
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl RecordStore for MemoryStore {
    fn append(&mut self, record: LesionRecord) -> Result<(), HistoryError> {
        self.records.push(record);
        Ok(())
    }

    fn records(&self) -> Result<Vec<LesionRecord>, HistoryError> {
        Ok(self.records.clone())
    }
}

/// History kept in a pretty-printed JSON array on disk.
///
/// A missing file is an empty history. A file that does not parse is an
/// error: it is never overwritten, so no measurements are lost.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store backed by `path`. Nothing is read until first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Vec<LesionRecord>, HistoryError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(Vec::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write through a sibling temporary file so a crash mid-write
    /// leaves the previous history intact.
    fn save(&self, records: &[LesionRecord]) -> Result<(), HistoryError> {
        let json = serde_json::to_string_pretty(records)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl RecordStore for JsonFileStore {
    fn append(&mut self, record: LesionRecord) -> Result<(), HistoryError> {
        let mut records = self.load()?;
        records.push(record);
        self.save(&records)
    }

    fn records(&self) -> Result<Vec<LesionRecord>, HistoryError> {
        self.load()
    }
}
