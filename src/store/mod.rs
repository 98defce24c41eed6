//! Persistence for settings and timer records.
//!
//! Two storage traits are consumed by the rest of the crate:
//! - [`SettingsStore`]: one row per settings key with a JSON-encoded value
//! - [`RecordStore`]: completed intervals, newest first
//!
//! [`SqliteStore`] implements both on top of SQLite; the memory stores back
//! tests and can simulate failures.

mod error;
mod memory;
mod sqlite;

pub use error::StoreError;
pub use memory::{MemoryRecordStore, MemorySettingsStore};
pub use sqlite::{default_db_path, SqliteStore};

use crate::types::TimerRecord;

/// Key/value storage for application settings.
///
/// Values are JSON-encoded strings; decoding is the caller's concern.
pub trait SettingsStore: Send + Sync {
    /// Returns every stored `(key, json_value)` pair.
    fn get_all(&self) -> Result<Vec<(String, String)>, StoreError>;

    /// Inserts or replaces a single key.
    fn save_one(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Inserts or replaces several keys at once.
    fn save_batch(&self, entries: &[(String, String)]) -> Result<(), StoreError>;

    /// Removes every stored key.
    fn clear(&self) -> Result<(), StoreError>;
}

/// Storage for completed timer records.
pub trait RecordStore: Send + Sync {
    fn add(&self, record: &TimerRecord) -> Result<(), StoreError>;

    /// Replaces the user-editable fields of a record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no record has the given id.
    fn update_details(
        &self,
        id: &str,
        name: Option<&str>,
        category: Option<&str>,
    ) -> Result<(), StoreError>;

    fn delete(&self, id: &str) -> Result<(), StoreError>;

    fn clear(&self) -> Result<(), StoreError>;

    /// Returns records ordered by end time, newest first.
    fn list(&self, limit: Option<usize>) -> Result<Vec<TimerRecord>, StoreError>;
}
