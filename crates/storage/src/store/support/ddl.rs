#![forbid(unsafe_code)]

use super::super::StoreError;
use r1d3_core::ColumnSpec;
use r1d3_core::ids::SqlIdent;
use rusqlite::Connection;

/// Adds `column` with its explicit default. Returns `false` when the column already exists.
/// SQLite applies each `ALTER TABLE` atomically, so a failure never leaves a half-added column.
pub(in crate::store) fn add_column_if_missing(
    conn: &Connection,
    table: &SqlIdent,
    column: &ColumnSpec,
) -> Result<bool, StoreError> {
    let sql = format!(
        "ALTER TABLE {} ADD COLUMN {}",
        table.quoted(),
        column.column_definition()
    );
    tracing::debug!(%table, column = %column.name(), %sql, "add column");
    match conn.execute(&sql, []) {
        Ok(_) => Ok(true),
        Err(err) if is_duplicate_column(&err) => Ok(false),
        Err(source) => Err(StoreError::ColumnAdd {
            table: table.to_string(),
            column: column.name().to_string(),
            source,
        }),
    }
}

fn is_duplicate_column(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => {
            message.contains("duplicate column name")
        }
        _ => false,
    }
}
