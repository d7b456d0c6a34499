#![forbid(unsafe_code)]

use r1d3_core::ColumnSpec;
use r1d3_core::ids::SqlIdent;

/// One row of `PRAGMA table_info`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub decl_type: String,
    pub nullable: bool,
    pub default_sql: Option<String>,
    pub primary_key: bool,
}

/// Columns of one table as observed at probe time. Never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaDescriptor {
    pub table: String,
    pub columns: Vec<ColumnInfo>,
}

impl SchemaDescriptor {
    /// SQLite resolves column names case-insensitively, so lookups do too.
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns
            .iter()
            .find(|column| column.name.eq_ignore_ascii_case(name))
    }

    pub fn has_column(&self, name: &SqlIdent) -> bool {
        self.column(name.as_str()).is_some()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }

    /// Expected columns absent from the table, in declaration order.
    pub fn missing(&self, expected: &[ColumnSpec]) -> Vec<SqlIdent> {
        expected
            .iter()
            .filter(|spec| !self.has_column(spec.name()))
            .map(|spec| spec.name().clone())
            .collect()
    }
}
