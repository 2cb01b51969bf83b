// src/store/mod.rs

//! Metadata store: the embedded database of installed modules
//!
//! Three key/value buckets live in a single SQLite file:
//!
//! - `modules` - keyed by the raw 32-byte SHA-256 of the module name, one
//!   record per module regardless of version (an update naturally replaces
//!   the previous install).
//! - `dependencies` - keyed by the UTF-8 module name, the flat top-level
//!   dependency list stored separately so large trees can be skipped.
//! - `indexes_by_time` - keyed by the 20-digit zero-padded decimal of the
//!   record's nanosecond timestamp; lexicographic order equals chronological
//!   order. The value is the module name.
//!
//! Every mutation maintains the time index inside the same transaction:
//! an upsert deletes the stale index entry of the replaced record, a delete
//! removes the module, its index entry, and its dependencies record
//! atomically. The store is the exclusive owner of the file; writes
//! serialize through the connection, readers see complete pre- or
//! post-states only.

use crate::api::{DependenciesRecord, ModuleRecord};
use crate::error::{Error, Result};
use crate::hash::module_key;
use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// How long to wait for the database file before giving up with `StoreLocked`
const OPEN_TIMEOUT: Duration = Duration::from_secs(1);

static LAST_TIMESTAMP: AtomicI64 = AtomicI64::new(0);

/// A strictly increasing wall-clock timestamp in nanoseconds.
///
/// Successive calls never return the same value, so every upsert gets a
/// distinct time-index key even within one nanosecond tick.
pub fn next_timestamp_nanos() -> i64 {
    let now = chrono::Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
    let mut prev = LAST_TIMESTAMP.load(Ordering::Relaxed);
    loop {
        let next = now.max(prev + 1);
        match LAST_TIMESTAMP.compare_exchange_weak(
            prev,
            next,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return next,
            Err(actual) => prev = actual,
        }
    }
}

/// Render a timestamp as the 20-digit zero-padded time-index key
fn time_key(timestamp_unix_nano: i64) -> String {
    format!("{:020}", timestamp_unix_nano)
}

/// The embedded module database
pub struct Storage {
    conn: Mutex<Option<Connection>>,
    path: PathBuf,
}

impl Storage {
    /// Open (creating if necessary) the database at `path` and initialize
    /// the buckets. Fails with [`Error::StoreLocked`] when the file cannot
    /// be acquired within one second.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path).map_err(map_locked)?;
        conn.busy_timeout(OPEN_TIMEOUT).map_err(map_locked)?;

        let storage = Self {
            conn: Mutex::new(Some(conn)),
            path,
        };
        storage.init_buckets()?;
        Ok(storage)
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the store. Idempotent; later operations fail with `StoreClosed`.
    pub fn close(&self) {
        if let Ok(mut guard) = self.conn.lock() {
            guard.take();
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Connection>>> {
        self.conn
            .lock()
            .map_err(|_| Error::Internal("storage mutex poisoned".to_string()))
    }

    fn init_buckets(&self) -> Result<()> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(Error::StoreClosed)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS modules (
                 key   BLOB PRIMARY KEY,
                 value BLOB NOT NULL
             );
             CREATE TABLE IF NOT EXISTS dependencies (
                 key   TEXT PRIMARY KEY,
                 value BLOB NOT NULL
             );
             CREATE TABLE IF NOT EXISTS indexes_by_time (
                 key   TEXT PRIMARY KEY,
                 value TEXT NOT NULL
             );",
        )
        .map_err(map_locked)?;
        Ok(())
    }

    /// Insert or replace the record for `module.name`.
    ///
    /// Runs in a single transaction: the stale time-index entry of any
    /// existing record is removed, then the new value and its index entry
    /// are written. Post-condition: exactly one modules entry and exactly
    /// one index entry for the name.
    pub fn upsert_module(&self, module: &ModuleRecord) -> Result<()> {
        let mut guard = self.lock()?;
        let conn = guard.as_mut().ok_or(Error::StoreClosed)?;
        let tx = conn.transaction()?;

        let key = module_key(&module.name);
        let existing: Option<Vec<u8>> = tx
            .query_row("SELECT value FROM modules WHERE key = ?1", [key.as_slice()], |row| {
                row.get(0)
            })
            .optional()?;
        if let Some(blob) = existing {
            if let Ok(old) = serde_json::from_slice::<ModuleRecord>(&blob) {
                tx.execute(
                    "DELETE FROM indexes_by_time WHERE key = ?1",
                    [time_key(old.timestamp_unix_nano)],
                )?;
            }
        }

        let value = serde_json::to_vec(module)?;
        tx.execute(
            "INSERT INTO modules (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key.as_slice(), value],
        )?;
        tx.execute(
            "INSERT INTO indexes_by_time (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![time_key(module.timestamp_unix_nano), module.name],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Fetch the record for `name`. The stored version is whatever the last
    /// upsert wrote (latest-wins), so no version parameter exists.
    pub fn get_module(&self, name: &str) -> Result<ModuleRecord> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(Error::StoreClosed)?;

        let key = module_key(name);
        let blob: Option<Vec<u8>> = conn
            .query_row("SELECT value FROM modules WHERE key = ?1", [key.as_slice()], |row| {
                row.get(0)
            })
            .optional()?;

        match blob {
            Some(blob) => Ok(serde_json::from_slice(&blob)?),
            None => Err(Error::NotFound(format!("module {}", name))),
        }
    }

    /// All records, newest first, driven by the time index.
    ///
    /// Dangling index entries (no corresponding module) are skipped.
    pub fn list_modules(&self) -> Result<Vec<ModuleRecord>> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(Error::StoreClosed)?;

        let mut stmt =
            conn.prepare("SELECT value FROM indexes_by_time ORDER BY key DESC")?;
        let names: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut modules = Vec::with_capacity(names.len());
        for name in names {
            let key = module_key(&name);
            let blob: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT value FROM modules WHERE key = ?1",
                    [key.as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(blob) = blob else {
                continue;
            };
            modules.push(serde_json::from_slice(&blob)?);
        }
        Ok(modules)
    }

    /// Delete the record for `name` along with its time-index entry and its
    /// dependencies record, atomically.
    pub fn delete_module(&self, name: &str) -> Result<()> {
        let mut guard = self.lock()?;
        let conn = guard.as_mut().ok_or(Error::StoreClosed)?;
        let tx = conn.transaction()?;

        let key = module_key(name);
        let blob: Option<Vec<u8>> = tx
            .query_row("SELECT value FROM modules WHERE key = ?1", [key.as_slice()], |row| {
                row.get(0)
            })
            .optional()?;
        let Some(blob) = blob else {
            return Err(Error::NotFound(format!("module {}", name)));
        };
        let module: ModuleRecord = serde_json::from_slice(&blob)?;

        tx.execute("DELETE FROM modules WHERE key = ?1", [key.as_slice()])?;
        tx.execute(
            "DELETE FROM indexes_by_time WHERE key = ?1",
            [time_key(module.timestamp_unix_nano)],
        )?;
        tx.execute("DELETE FROM dependencies WHERE key = ?1", [name])?;

        tx.commit()?;
        Ok(())
    }

    /// Number of stored modules
    pub fn count_modules(&self) -> Result<i64> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(Error::StoreClosed)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM modules", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Store the dependencies record for `name`
    pub fn upsert_dependencies(&self, name: &str, deps: &DependenciesRecord) -> Result<()> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(Error::StoreClosed)?;
        let value = serde_json::to_vec(deps)?;
        conn.execute(
            "INSERT INTO dependencies (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![name, value],
        )?;
        Ok(())
    }

    /// Fetch the dependencies record for `name`
    pub fn get_dependencies(&self, name: &str) -> Result<DependenciesRecord> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(Error::StoreClosed)?;
        let blob: Option<Vec<u8>> = conn
            .query_row("SELECT value FROM dependencies WHERE key = ?1", [name], |row| {
                row.get(0)
            })
            .optional()?;
        match blob {
            Some(blob) => Ok(serde_json::from_slice(&blob)?),
            None => Err(Error::NotFound(format!("dependencies for module {}", name))),
        }
    }
}

/// Map a SQLite busy/locked failure onto `StoreLocked`
fn map_locked(err: rusqlite::Error) -> Error {
    if let rusqlite::Error::SqliteFailure(code, _) = &err {
        if matches!(
            code.code,
            rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
        ) {
            return Error::StoreLocked;
        }
    }
    Error::Database(err)
}
