#![forbid(unsafe_code)]

use super::BackfillReport;
use crate::StoreError;
use r1d3_core::StatusPolicy;
use r1d3_core::ids::MigrationKey;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReconcilePhase {
    Probing,
    Patching,
    Backfilling,
    Recording,
    Verified,
    Failed,
}

impl ReconcilePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Probing => "PROBING",
            Self::Patching => "PATCHING",
            Self::Backfilling => "BACKFILLING",
            Self::Recording => "RECORDING",
            Self::Verified => "VERIFIED",
            Self::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for ReconcilePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Probe and compute, but issue no DDL, row writes, or ledger insert.
    pub dry_run: bool,
    /// Overrides the plan's own mapping policy.
    pub policy: Option<StatusPolicy>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReconcileReport {
    pub migration: MigrationKey,
    pub table: String,
    pub trace: Vec<ReconcilePhase>,
    pub dry_run: bool,
    pub short_circuited: bool,
    /// Columns added, or that would be added on a dry run, in patch order.
    pub columns_added: Vec<String>,
    pub backfill: Option<BackfillReport>,
    pub rows_defaulted: usize,
    pub recorded: bool,
}

impl ReconcileReport {
    pub(in crate::store) fn new(migration: MigrationKey, table: String, dry_run: bool) -> Self {
        Self {
            migration,
            table,
            trace: Vec::new(),
            dry_run,
            short_circuited: false,
            columns_added: Vec::new(),
            backfill: None,
            rows_defaulted: 0,
            recorded: false,
        }
    }

    pub fn final_phase(&self) -> Option<ReconcilePhase> {
        self.trace.last().copied()
    }

    pub fn is_verified(&self) -> bool {
        self.final_phase() == Some(ReconcilePhase::Verified)
    }

    /// DDL statements, row updates, and ledger inserts issued by this run.
    pub fn writes(&self) -> usize {
        if self.dry_run {
            return 0;
        }
        self.columns_added.len()
            + self.backfill.map_or(0, |report| report.records_changed)
            + self.rows_defaulted
            + usize::from(self.recorded)
    }
}

#[derive(Debug, Error)]
#[error("migration {migration} on {table} failed in {phase}: {source}")]
pub struct ReconcileError {
    pub migration: MigrationKey,
    pub table: String,
    pub phase: ReconcilePhase,
    /// Phases entered before failing; always ends with `FAILED`.
    pub trace: Vec<ReconcilePhase>,
    #[source]
    pub source: StoreError,
}

impl ReconcileError {
    pub fn code(&self) -> &'static str {
        self.source.code()
    }

    pub fn is_recoverable(&self) -> bool {
        self.source.is_recoverable()
    }
}
