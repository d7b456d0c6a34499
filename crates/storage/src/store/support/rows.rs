#![forbid(unsafe_code)]

use super::super::{RecordKey, SchemaDescriptor, StoreError, TrackedRecord};
use r1d3_core::MigrationPlan;
use r1d3_core::ids::SqlIdent;
use r1d3_core::status::Status;
use rusqlite::Connection;
use rusqlite::types::Value;

/// A tracked row before its legacy flag has been interpreted.
pub(in crate::store) struct LoadedRow {
    pub(in crate::store) key: RecordKey,
    pub(in crate::store) legacy: Value,
    pub(in crate::store) status: Option<String>,
}

impl LoadedRow {
    pub(in crate::store) fn into_tracked(
        self,
        table: &SqlIdent,
    ) -> Result<TrackedRecord, StoreError> {
        let legacy = parse_legacy_flag(&self.legacy).map_err(|reason| StoreError::Backfill {
            table: table.to_string(),
            record: self.key.to_string(),
            reason,
        })?;
        Ok(TrackedRecord {
            key: self.key,
            legacy,
            status: self.status,
        })
    }
}

/// Reads key, legacy flag, and status for every row, ordered by key. Columns the
/// table lacks read as NULL.
pub(in crate::store) fn load_rows(
    conn: &Connection,
    plan: &MigrationPlan,
    schema: &SchemaDescriptor,
) -> Result<Vec<LoadedRow>, StoreError> {
    require_key_column(plan, schema)?;
    let legacy = if schema.has_column(plan.legacy_column()) {
        plan.legacy_column().quoted()
    } else {
        "NULL".to_string()
    };
    let status = if schema.has_column(plan.status_column()) {
        plan.status_column().quoted()
    } else {
        "NULL".to_string()
    };
    let key = plan.key_column().quoted();
    let sql = format!(
        "SELECT {key}, {legacy}, {status} FROM {} ORDER BY {key}",
        plan.table().quoted()
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(LoadedRow {
            key: RecordKey::new(row.get::<_, Value>(0)?),
            legacy: row.get::<_, Value>(1)?,
            status: value_to_text(row.get::<_, Value>(2)?),
        });
    }
    Ok(out)
}

/// Rows are addressed by the key column. SQLite reads an unknown double-quoted name as a
/// string literal, so a missing key would make every `WHERE key=?` match the whole table.
pub(in crate::store) fn require_key_column(
    plan: &MigrationPlan,
    schema: &SchemaDescriptor,
) -> Result<(), StoreError> {
    if schema.has_column(plan.key_column()) {
        return Ok(());
    }
    Err(StoreError::KeyColumnNotFound {
        table: plan.table().to_string(),
        column: plan.key_column().to_string(),
    })
}

/// Django stores booleans as 0/1, but hand-patched rows also carry text flags.
pub(in crate::store) fn parse_legacy_flag(value: &Value) -> Result<Option<bool>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Integer(0) => Ok(Some(false)),
        Value::Integer(1) => Ok(Some(true)),
        Value::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "" => Ok(None),
            "1" | "true" | "t" | "yes" => Ok(Some(true)),
            "0" | "false" | "f" | "no" => Ok(Some(false)),
            _ => Err(format!("legacy flag {text:?} is not a boolean")),
        },
        Value::Integer(other) => Err(format!("legacy flag {other} is not a boolean")),
        Value::Real(other) => Err(format!("legacy flag {other} is not a boolean")),
        Value::Blob(_) => Err("legacy flag is a blob".to_string()),
    }
}

pub(in crate::store) fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Text(text) => Some(text),
        Value::Integer(value) => Some(value.to_string()),
        Value::Real(value) => Some(value.to_string()),
        Value::Blob(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

/// The plan's touch column, if the table actually has it.
pub(in crate::store) fn touch_column<'a>(
    plan: &'a MigrationPlan,
    schema: &SchemaDescriptor,
) -> Option<&'a SqlIdent> {
    plan.touch_column()
        .filter(|column| schema.has_column(column))
}

/// Exact match against the enumeration. Stored values are not trimmed: `" completed"`
/// is invalid and gets rewritten.
pub(in crate::store) fn exact_status(raw: Option<&str>) -> Option<Status> {
    let raw = raw?;
    Status::ALL.into_iter().find(|status| status.as_str() == raw)
}
