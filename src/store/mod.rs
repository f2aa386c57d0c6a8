//! SQLite-backed persistence
//!
//! One embedded database holds the append-only posture records and the
//! user accounts. The store is synchronous; callers that need request
//! concurrency share a [`RecordStore`] behind its internal lock.
//!
//! Records are written exactly once, read by `(user_id, created_at)`
//! range, and deleted only through the account-deletion cascade.

mod records;
mod users;

pub use records::{NewRecord, DEFAULT_QUERY_LIMIT};
pub use users::{NewUser, StoredUser, UserChanges};

use crate::error::EngineError;
use chrono::{DateTime, SecondsFormat, Utc};
use log::info;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;

/// Persistence handle for records and accounts.
///
/// Wraps a single SQLite connection behind a mutex; rusqlite connections
/// are not `Sync` and the engine's write volume is one insert per
/// measurement, so a single serialized connection is sufficient.
pub struct RecordStore {
    conn: Mutex<Connection>,
}

impl RecordStore {
    /// Open (or create) the database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                EngineError::Validation(format!(
                    "cannot create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        init_schema(&conn)?;

        info!("record store opened at {}", path.as_ref().display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an ephemeral in-memory database. Used by tests and the
    /// CLI's stateless commands.
    pub fn open_in_memory() -> Result<Self, EngineError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run a closure against the connection, serializing access.
    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let guard = match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&guard)
    }
}

/// Create tables if they don't exist. Idempotent.
fn init_schema(conn: &Connection) -> Result<(), EngineError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            reset_token TEXT,
            reset_token_expires TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS posture_records (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            session_id TEXT NOT NULL,
            device_info TEXT,
            neck_angle REAL NOT NULL,
            shoulder_slope REAL NOT NULL,
            head_forward REAL NOT NULL,
            shoulder_height_diff REAL NOT NULL,
            score REAL NOT NULL,
            cervical_lordosis REAL NOT NULL,
            forward_head_distance REAL NOT NULL,
            head_tilt REAL NOT NULL,
            left_shoulder_height_diff REAL NOT NULL,
            left_scapular_winging REAL NOT NULL,
            right_scapular_winging REAL NOT NULL,
            shoulder_forward_movement REAL NOT NULL,
            head_rotation REAL NOT NULL,
            issues TEXT NOT NULL DEFAULT '[]',
            is_neck_angle_normal INTEGER NOT NULL,
            is_forward_head_normal INTEGER NOT NULL,
            is_head_tilt_normal INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_posture_records_user_created
            ON posture_records(user_id, created_at);",
    )?;

    Ok(())
}

/// Timestamps persist as fixed-width RFC3339 UTC text so that SQL string
/// comparison matches chronological order.
pub(crate) fn to_ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(value: &str) -> Result<DateTime<Utc>, EngineError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| EngineError::Validation(format!("invalid stored timestamp '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creation_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
    }

    #[test]
    fn open_on_disk_creates_parent_dirs() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("posture.sqlite3");
        let store = RecordStore::open(&path).unwrap();
        drop(store);
        assert!(path.exists());
    }

    #[test]
    fn timestamp_roundtrip_preserves_instant() {
        let now = Utc::now();
        let parsed = parse_ts(&to_ts(now)).unwrap();
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
    }

    #[test]
    fn timestamp_text_ordering_matches_chronology() {
        let base = Utc::now();
        let earlier = to_ts(base - chrono::Duration::milliseconds(500));
        let later = to_ts(base);
        assert!(earlier < later);
    }
}
