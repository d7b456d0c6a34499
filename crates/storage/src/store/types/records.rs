#![forbid(unsafe_code)]

use r1d3_core::status::Status;
use rusqlite::ToSql;
use rusqlite::types::{ToSqlOutput, Value};

/// Opaque primary-key value of a tracked row, bound back verbatim in updates.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordKey(Value);

impl RecordKey {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }
}

impl From<i64> for RecordKey {
    fn from(value: i64) -> Self {
        Self(Value::Integer(value))
    }
}

impl From<&str> for RecordKey {
    fn from(value: &str) -> Self {
        Self(Value::Text(value.to_string()))
    }
}

impl ToSql for RecordKey {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        self.0.to_sql()
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Value::Null => f.write_str("NULL"),
            Value::Integer(value) => write!(f, "{value}"),
            Value::Real(value) => write!(f, "{value}"),
            Value::Text(value) => f.write_str(value),
            Value::Blob(bytes) => {
                f.write_str("x'")?;
                for byte in bytes {
                    write!(f, "{byte:02x}")?;
                }
                f.write_str("'")
            }
        }
    }
}

/// A milestone or task row as the backfiller sees it.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackedRecord {
    pub key: RecordKey,
    pub legacy: Option<bool>,
    /// Raw stored value; may be NULL or outside the enumeration before migration.
    pub status: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub records_examined: usize,
    pub records_changed: usize,
    /// Only non-zero for planning runs; a real run aborts on the first failure.
    pub records_failed: usize,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NormalizeReport {
    pub groups_examined: usize,
    pub records_demoted: Vec<RecordKey>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub not_started: usize,
    pub in_progress: usize,
    pub completed: usize,
    /// NULL or outside the enumeration.
    pub invalid: usize,
}

impl StatusCounts {
    pub(in crate::store) fn bump(&mut self, status: Option<Status>, rows: usize) {
        match status {
            Some(Status::NotStarted) => self.not_started += rows,
            Some(Status::InProgress) => self.in_progress += rows,
            Some(Status::Completed) => self.completed += rows,
            None => self.invalid += rows,
        }
    }
}
