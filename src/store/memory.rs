//! In-memory stores.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{RecordStore, SettingsStore, StoreError};
use crate::types::TimerRecord;

// ============================================================================
// MemorySettingsStore
// ============================================================================

/// Settings store kept in memory.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    entries: Mutex<BTreeMap<String, String>>,
    should_fail: AtomicBool,
    write_count: AtomicUsize,
}

impl MemorySettingsStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-filled with raw `(key, json_value)` pairs.
    #[must_use]
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();
        if let Ok(mut map) = store.entries.lock() {
            map.extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
        }
        store
    }

    /// Makes every subsequent call fail.
    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    /// Number of successful write calls (`save_one` or `save_batch`).
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.write_count.load(Ordering::SeqCst)
    }

    /// Returns the raw JSON value stored for `key`.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("simulated failure".to_string()));
        }
        Ok(())
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get_all(&self) -> Result<Vec<(String, String)>, StoreError> {
        self.check()?;
        let map = self.entries.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    fn save_one(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check()?;
        let mut map = self.entries.lock().map_err(|_| StoreError::LockPoisoned)?;
        map.insert(key.to_string(), value.to_string());
        self.write_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn save_batch(&self, entries: &[(String, String)]) -> Result<(), StoreError> {
        self.check()?;
        let mut map = self.entries.lock().map_err(|_| StoreError::LockPoisoned)?;
        for (key, value) in entries {
            map.insert(key.clone(), value.clone());
        }
        self.write_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.check()?;
        self.entries
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?
            .clear();
        Ok(())
    }
}

// ============================================================================
// MemoryRecordStore
// ============================================================================

/// Record store kept in memory.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<Vec<TimerRecord>>,
    should_fail: AtomicBool,
}

impl MemoryRecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail.
    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    /// Returns every record in insertion order.
    #[must_use]
    pub fn records(&self) -> Vec<TimerRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("simulated failure".to_string()));
        }
        Ok(())
    }
}

impl RecordStore for MemoryRecordStore {
    fn add(&self, record: &TimerRecord) -> Result<(), StoreError> {
        self.check()?;
        self.records
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?
            .push(record.clone());
        Ok(())
    }

    fn update_details(
        &self,
        id: &str,
        name: Option<&str>,
        category: Option<&str>,
    ) -> Result<(), StoreError> {
        self.check()?;
        let mut records = self.records.lock().map_err(|_| StoreError::LockPoisoned)?;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.name = name.map(str::to_string);
        record.category = category.map(str::to_string);
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.check()?;
        self.records
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?
            .retain(|r| r.id != id);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.check()?;
        self.records
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?
            .clear();
        Ok(())
    }

    fn list(&self, limit: Option<usize>) -> Result<Vec<TimerRecord>, StoreError> {
        self.check()?;
        let mut records = self
            .records
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?
            .clone();
        records.sort_by(|a, b| b.end_time.cmp(&a.end_time));
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RecordPhase, RecordType};

    fn record(end_time: i64) -> TimerRecord {
        TimerRecord::completed(RecordType::Countdown, RecordPhase::Work, end_time, 100)
    }

    mod settings_store_tests {
        use super::*;

        #[test]
        fn test_save_and_get() {
            let store = MemorySettingsStore::new();
            store.save_one("theme", "\"light\"").unwrap();
            store
                .save_batch(&[("sounds".to_string(), "false".to_string())])
                .unwrap();

            let all = store.get_all().unwrap();
            assert_eq!(all.len(), 2);
            assert_eq!(store.raw("theme").as_deref(), Some("\"light\""));
            assert_eq!(store.write_count(), 2);
        }

        #[test]
        fn test_should_fail() {
            let store = MemorySettingsStore::new();
            store.set_should_fail(true);
            assert!(store.get_all().is_err());
            assert!(store.save_one("k", "1").is_err());
            assert_eq!(store.write_count(), 0);
        }

        #[test]
        fn test_clear() {
            let store = MemorySettingsStore::with_entries([("a", "1"), ("b", "2")]);
            store.clear().unwrap();
            assert!(store.get_all().unwrap().is_empty());
        }
    }

    mod record_store_tests {
        use super::*;

        #[test]
        fn test_list_newest_first_with_limit() {
            let store = MemoryRecordStore::new();
            store.add(&record(10)).unwrap();
            store.add(&record(30)).unwrap();
            store.add(&record(20)).unwrap();

            let listed = store.list(Some(2)).unwrap();
            let ends: Vec<i64> = listed.iter().map(|r| r.end_time).collect();
            assert_eq!(ends, vec![30, 20]);
        }

        #[test]
        fn test_update_details() {
            let store = MemoryRecordStore::new();
            let r = record(10);
            store.add(&r).unwrap();
            store
                .update_details(&r.id, Some("Writing"), Some("study"))
                .unwrap();

            let saved = &store.records()[0];
            assert_eq!(saved.name.as_deref(), Some("Writing"));
            assert_eq!(saved.category.as_deref(), Some("study"));
        }

        #[test]
        fn test_update_details_missing() {
            let store = MemoryRecordStore::new();
            let err = store.update_details("missing", None, None).unwrap_err();
            assert!(err.is_not_found());
        }

        #[test]
        fn test_delete_and_clear() {
            let store = MemoryRecordStore::new();
            let a = record(1);
            store.add(&a).unwrap();
            store.add(&record(2)).unwrap();
            store.delete(&a.id).unwrap();
            assert_eq!(store.len(), 1);
            store.clear().unwrap();
            assert!(store.is_empty());
        }
    }
}
