#![forbid(unsafe_code)]

use super::*;
use r1d3_core::ids::{MigrationKey, SqlIdent};
use rusqlite::{OptionalExtension, params};

const LEDGER_TABLE: &str = "django_migrations";

const LEDGER_DDL: &str = r#"CREATE TABLE IF NOT EXISTS "django_migrations" (
    "id" integer NOT NULL PRIMARY KEY AUTOINCREMENT,
    "app" varchar(255) NOT NULL,
    "name" varchar(255) NOT NULL,
    "applied" datetime NOT NULL
)"#;

impl SqliteStore {
    /// A missing ledger table means nothing has been applied; it is not created here.
    pub fn is_applied(&self, key: &MigrationKey) -> Result<bool, StoreError> {
        is_applied(&self.conn, key)
    }

    /// Inserts the ledger row unless one already exists. Returns whether a row was inserted.
    pub fn record_applied(&mut self, key: &MigrationKey) -> Result<bool, StoreError> {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let inserted = record_applied(&tx, key)?;
        tx.commit()?;
        Ok(inserted)
    }

    pub fn list_applied(&self, app: Option<&str>) -> Result<Vec<MigrationRecord>, StoreError> {
        if !ledger_exists(&self.conn)? {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(
            "SELECT id, app, name, applied FROM django_migrations \
             WHERE ?1 IS NULL OR app=?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![app], |row| {
                Ok(MigrationRecord {
                    id: row.get(0)?,
                    app: row.get(1)?,
                    name: row.get(2)?,
                    applied: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn ledger_exists(conn: &Connection) -> Result<bool, StoreError> {
    let table = SqlIdent::try_new(LEDGER_TABLE)
        .map_err(|_| StoreError::InvalidInput("ledger table name is not an identifier"))?;
    probe::table_exists(conn, &table)
}

pub(super) fn is_applied(conn: &Connection, key: &MigrationKey) -> Result<bool, StoreError> {
    if !ledger_exists(conn)? {
        return Ok(false);
    }
    Ok(conn
        .query_row(
            "SELECT 1 FROM django_migrations WHERE app=?1 AND name=?2 LIMIT 1",
            params![key.app(), key.name()],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

pub(super) fn record_applied(conn: &Connection, key: &MigrationKey) -> Result<bool, StoreError> {
    conn.execute_batch(LEDGER_DDL)?;
    if is_applied(conn, key)? {
        return Ok(false);
    }
    conn.execute(
        "INSERT INTO django_migrations(app, name, applied) VALUES (?1, ?2, ?3)",
        params![key.app(), key.name(), now_timestamp()],
    )?;
    tracing::info!(migration = %key, "recorded in ledger");
    Ok(true)
}
