#![forbid(unsafe_code)]

use super::*;
use r1d3_core::ids::SqlIdent;
use rusqlite::{OptionalExtension, params};

impl SqliteStore {
    /// Reads the live column set of `table`. Read-only; never alters the schema.
    pub fn describe(&self, table: &SqlIdent) -> Result<SchemaDescriptor, StoreError> {
        describe_table(&self.conn, table)
    }

    pub fn table_exists(&self, table: &SqlIdent) -> Result<bool, StoreError> {
        table_exists(&self.conn, table)
    }

    pub fn has_column(&self, table: &SqlIdent, column: &SqlIdent) -> Result<bool, StoreError> {
        Ok(self.describe(table)?.has_column(column))
    }
}

pub(super) fn table_exists(conn: &Connection, table: &SqlIdent) -> Result<bool, StoreError> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1 COLLATE NOCASE",
            params![table.as_str()],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

pub(super) fn describe_table(
    conn: &Connection,
    table: &SqlIdent,
) -> Result<SchemaDescriptor, StoreError> {
    if !table_exists(conn, table)? {
        return Err(StoreError::SchemaNotFound {
            table: table.to_string(),
        });
    }

    let mut stmt = conn.prepare(
        "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid",
    )?;
    let columns = stmt
        .query_map(params![table.as_str()], |row| {
            Ok(ColumnInfo {
                name: row.get(0)?,
                decl_type: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                nullable: row.get::<_, i64>(2)? == 0,
                default_sql: row.get(3)?,
                primary_key: row.get::<_, i64>(4)? > 0,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SchemaDescriptor {
        table: table.to_string(),
        columns,
    })
}
