#![forbid(unsafe_code)]

use super::*;
use r1d3_core::ColumnSpec;
use r1d3_core::ids::SqlIdent;

impl SqliteStore {
    /// Adds one column with its explicit default. Returns `false` if it already existed.
    pub fn add_column(
        &mut self,
        table: &SqlIdent,
        column: &ColumnSpec,
    ) -> Result<bool, StoreError> {
        if !probe::table_exists(&self.conn, table)? {
            return Err(StoreError::SchemaNotFound {
                table: table.to_string(),
            });
        }
        add_column_if_missing(&self.conn, table, column)
    }
}
