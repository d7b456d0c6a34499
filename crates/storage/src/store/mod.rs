#![forbid(unsafe_code)]

mod backfill;
mod error;
mod ledger;
mod normalize;
mod patch;
mod probe;
mod reconcile;
mod support;
mod types;

pub use error::StoreError;
pub use types::*;

use support::*;

use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Handle on a Django-managed SQLite database.
///
/// All mutating operations take `&mut self`: one store is the single writer for
/// the tables it migrates. Callers keep application traffic away from those
/// tables for the duration of a run.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    db_path: Option<PathBuf>,
}

impl SqliteStore {
    /// Opens an existing database file. A missing file is an error rather than a
    /// fresh empty database.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref().to_path_buf();
        if !db_path.is_file() {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("database file not found: {}", db_path.display()),
            )));
        }

        let conn = Connection::open_with_flags(
            &db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        configure(&conn)?;
        tracing::debug!(path = %db_path.display(), "opened database");

        Ok(Self {
            conn,
            db_path: Some(db_path),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        configure(&conn)?;
        Ok(Self {
            conn,
            db_path: None,
        })
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Runs raw SQL against the database. Intended for fixtures and operator scripts.
    pub fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }
}

fn configure(conn: &Connection) -> Result<(), StoreError> {
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(())
}
