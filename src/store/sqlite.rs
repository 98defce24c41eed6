//! SQLite-backed stores.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{RecordStore, SettingsStore, StoreError};
use crate::types::{RecordPhase, RecordType, TimerRecord};

/// Database file name inside the data directory.
const DB_FILE_NAME: &str = "pomodoro-reminder.db";

/// Returns the default database path inside the user's data directory.
/// Falls back to `./pomodoro-reminder.db` when no data dir is found.
pub fn default_db_path() -> PathBuf {
    match dirs::data_local_dir() {
        Some(data_dir) => data_dir.join("pomodoro-reminder").join(DB_FILE_NAME),
        None => PathBuf::from(DB_FILE_NAME),
    }
}

/// Settings and record storage in a single SQLite database.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path` and runs migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Open(format!("{}: {}", parent.display(), e)))?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        run_migrations(&conn)?;
        tracing::debug!("データベースを初期化しました");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

/// Creates the schema if it doesn't exist yet.
fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS settings (
            key         TEXT    PRIMARY KEY,
            value       TEXT    NOT NULL,
            updated_at  INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS timer_records (
            id          TEXT    PRIMARY KEY,
            record_type TEXT    NOT NULL,
            mode        TEXT,
            name        TEXT,
            start_time  INTEGER NOT NULL,
            end_time    INTEGER NOT NULL,
            duration    INTEGER NOT NULL,
            created_at  INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_timer_records_end_time
            ON timer_records(end_time DESC);
        ",
    )?;
    migrate_records_add_category(conn)?;
    Ok(())
}

fn migrate_records_add_category(conn: &Connection) -> Result<(), StoreError> {
    let mut stmt = conn.prepare("PRAGMA table_info(timer_records)")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for row in rows {
        if row? == "category" {
            return Ok(());
        }
    }

    conn.execute("ALTER TABLE timer_records ADD COLUMN category TEXT", [])?;
    Ok(())
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<TimerRecord> {
    let record_type: String = row.get(1)?;
    let mode: Option<String> = row.get(2)?;
    Ok(TimerRecord {
        id: row.get(0)?,
        record_type: RecordType::parse(&record_type).unwrap_or(RecordType::Countdown),
        phase: mode.as_deref().and_then(RecordPhase::parse),
        name: row.get(3)?,
        category: row.get(4)?,
        start_time: row.get(5)?,
        end_time: row.get(6)?,
        duration: row.get(7)?,
    })
}

// ============================================================================
// SettingsStore
// ============================================================================

impl SettingsStore for SqliteStore {
    fn get_all(&self) -> Result<Vec<(String, String)>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT key, value FROM settings ORDER BY key")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    fn save_one(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, now_ms()],
        )?;
        Ok(())
    }

    fn save_batch(&self, entries: &[(String, String)]) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = now_ms();
        for (key, value) in entries {
            tx.execute(
                "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
                params![key, value, now],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.lock()?.execute("DELETE FROM settings", [])?;
        Ok(())
    }
}

// ============================================================================
// RecordStore
// ============================================================================

impl RecordStore for SqliteStore {
    fn add(&self, record: &TimerRecord) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO timer_records
                (id, record_type, mode, name, category, start_time, end_time, duration, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.id,
                record.record_type.as_str(),
                record.phase.map(|p| p.as_str()),
                record.name,
                record.category,
                record.start_time,
                record.end_time,
                record.duration,
                now_ms(),
            ],
        )?;
        Ok(())
    }

    fn update_details(
        &self,
        id: &str,
        name: Option<&str>,
        category: Option<&str>,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE timer_records SET name = ?1, category = ?2 WHERE id = ?3",
            params![name, category, id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.lock()?
            .execute("DELETE FROM timer_records WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.lock()?.execute("DELETE FROM timer_records", [])?;
        Ok(())
    }

    fn list(&self, limit: Option<usize>) -> Result<Vec<TimerRecord>, StoreError> {
        let conn = self.lock()?;
        // SQLite treats a negative LIMIT as "no limit"
        let limit = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
        let mut stmt = conn.prepare(
            "SELECT id, record_type, mode, name, category, start_time, end_time, duration
             FROM timer_records ORDER BY end_time DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], record_from_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

impl SqliteStore {
    /// Looks up a single record by id.
    pub fn get_record(&self, id: &str) -> Result<Option<TimerRecord>, StoreError> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                "SELECT id, record_type, mode, name, category, start_time, end_time, duration
                 FROM timer_records WHERE id = ?1",
                params![id],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }
}

// ============================================================================
// Tests
// ============================================================================
