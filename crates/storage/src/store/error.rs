#![forbid(unsafe_code)]

use r1d3_core::PlanError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("invalid plan: {0}")]
    InvalidPlan(#[from] PlanError),
    #[error("table {table} does not exist")]
    SchemaNotFound { table: String },
    #[error("table {table} has no key column {column}")]
    KeyColumnNotFound { table: String, column: String },
    #[error("failed to add column {table}.{column}: {source}")]
    ColumnAdd {
        table: String,
        column: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("backfill of {table} aborted at record {record}: {reason}")]
    Backfill {
        table: String,
        record: String,
        reason: String,
    },
    #[error(
        "{table} did not converge (missing columns: [{}], offending rows: {offending_total} [{}])",
        .missing_columns.join(", "),
        .offending_records.join(", ")
    )]
    Verification {
        table: String,
        missing_columns: Vec<String>,
        offending_records: Vec<String>,
        offending_total: usize,
    },
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "IO",
            Self::Sql(_) => "SQLITE",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::InvalidPlan(_) => "INVALID_PLAN",
            Self::SchemaNotFound { .. } => "SCHEMA_NOT_FOUND",
            Self::KeyColumnNotFound { .. } => "KEY_COLUMN_NOT_FOUND",
            Self::ColumnAdd { .. } => "COLUMN_ADD_FAILED",
            Self::Backfill { .. } => "BACKFILL_FAILED",
            Self::Verification { .. } => "VERIFICATION_FAILED",
        }
    }

    /// Whether re-running the reconciler after fixing the environment can succeed.
    /// A missing table needs an operator; a verification failure means a logic bug.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::ColumnAdd { .. } | Self::Backfill { .. } | Self::Io(_) | Self::Sql(_) => true,
            Self::SchemaNotFound { .. }
            | Self::KeyColumnNotFound { .. }
            | Self::Verification { .. }
            | Self::InvalidInput(_)
            | Self::InvalidPlan(_) => false,
        }
    }

    /// Record identifiers named by the error, if any.
    pub fn offending_records(&self) -> Vec<String> {
        match self {
            Self::Backfill { record, .. } => vec![record.clone()],
            Self::Verification {
                offending_records, ..
            } => offending_records.clone(),
            _ => Vec::new(),
        }
    }
}
