#![forbid(unsafe_code)]

use super::*;
use r1d3_core::{MappingRule, MigrationPlan};
use rusqlite::TransactionBehavior;

/// Offending record keys listed in a verification failure; the total is always reported.
const VERIFY_SAMPLE: usize = 20;

impl SqliteStore {
    /// Converges the plan's table onto its status column:
    /// `PROBING -> PATCHING -> BACKFILLING -> RECORDING -> VERIFIED`.
    ///
    /// Re-running after success short-circuits from `PROBING` to `VERIFIED` without
    /// writing. Re-running after a failure resumes safely, since every completed step is
    /// idempotent and the ledger row is written last.
    pub fn reconcile(
        &mut self,
        plan: &MigrationPlan,
        options: ReconcileOptions,
    ) -> Result<ReconcileReport, ReconcileError> {
        let policy = options.policy.unwrap_or(plan.policy());
        self.reconcile_with(plan, &policy, options.dry_run)
    }

    /// Same as [`SqliteStore::reconcile`] with a caller-supplied mapping rule.
    pub fn reconcile_with(
        &mut self,
        plan: &MigrationPlan,
        rule: &dyn MappingRule,
        dry_run: bool,
    ) -> Result<ReconcileReport, ReconcileError> {
        let mut run = Run::start(plan, dry_run);

        run.enter(ReconcilePhase::Probing);
        let schema = run.check(probe::describe_table(&self.conn, plan.table()))?;
        run.check(require_key_column(plan, &schema))?;
        let missing = schema.missing(plan.columns());
        let applied = run.check(ledger::is_applied(&self.conn, plan.key()))?;

        if missing.is_empty() && applied {
            run.check(verify(&self.conn, plan))?;
            run.report.short_circuited = true;
            run.enter(ReconcilePhase::Verified);
            return Ok(run.report);
        }

        run.enter(ReconcilePhase::Patching);
        let order = run.check(plan.patch_order(&missing).map_err(StoreError::from))?;
        for column in order {
            if dry_run {
                run.report.columns_added.push(column.name().to_string());
                continue;
            }
            if run.check(add_column_if_missing(&self.conn, plan.table(), column))? {
                run.report.columns_added.push(column.name().to_string());
            }
        }

        run.enter(ReconcilePhase::Backfilling);
        let has_legacy = schema.has_column(plan.legacy_column());
        if dry_run {
            if has_legacy {
                run.report.backfill = Some(run.check(self.plan_backfill(plan, rule))?);
            } else if schema.has_column(plan.status_column()) {
                run.report.rows_defaulted =
                    run.check(backfill::status_counts(&self.conn, plan))?.invalid;
            } else if plan.status_column_default().is_none() {
                run.report.rows_defaulted =
                    run.check(load_rows(&self.conn, plan, &schema))?.len();
            }
            run.report.recorded = !applied;
            tracing::info!(
                migration = %plan.key(),
                columns = ?run.report.columns_added,
                backfill = ?run.report.backfill,
                rows_defaulted = run.report.rows_defaulted,
                "dry run; nothing written"
            );
            return Ok(run.report);
        }

        let backfilled = self.in_immediate_tx(|tx| {
            if has_legacy {
                backfill::backfill_table_tx(tx, plan, rule).map(Backfilled::Mapped)
            } else {
                backfill::default_missing_tx(tx, plan).map(Backfilled::Defaulted)
            }
        });
        match run.check(backfilled)? {
            Backfilled::Mapped(report) => run.report.backfill = Some(report),
            Backfilled::Defaulted(rows) => run.report.rows_defaulted = rows,
        }

        run.enter(ReconcilePhase::Recording);
        let recorded = self.in_immediate_tx(|tx| ledger::record_applied(tx, plan.key()));
        run.report.recorded = run.check(recorded)?;

        run.check_in(ReconcilePhase::Verified, verify(&self.conn, plan))?;
        run.enter(ReconcilePhase::Verified);
        Ok(run.report)
    }

    /// Records the ledger row for a table that was already converged by hand. Refuses
    /// unless every expected column exists and every status is valid.
    pub fn mark_applied(
        &mut self,
        plan: &MigrationPlan,
    ) -> Result<ReconcileReport, ReconcileError> {
        let mut run = Run::start(plan, false);

        run.enter(ReconcilePhase::Probing);
        run.check(verify(&self.conn, plan))?;

        run.enter(ReconcilePhase::Recording);
        let recorded = self.in_immediate_tx(|tx| ledger::record_applied(tx, plan.key()));
        run.report.recorded = run.check(recorded)?;

        run.enter(ReconcilePhase::Verified);
        Ok(run.report)
    }

    /// Reconciles `plans` in order. The first failure ends the run and is the last entry.
    pub fn reconcile_all(
        &mut self,
        plans: &[MigrationPlan],
        options: ReconcileOptions,
    ) -> Vec<Result<ReconcileReport, ReconcileError>> {
        let mut outcomes = Vec::with_capacity(plans.len());
        for plan in plans {
            let outcome = self.reconcile(plan, options);
            let failed = outcome.is_err();
            outcomes.push(outcome);
            if failed {
                break;
            }
        }
        outcomes
    }

    fn in_immediate_tx<T>(
        &mut self,
        body: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = body(&*tx)?;
        tx.commit()?;
        Ok(value)
    }
}

enum Backfilled {
    Mapped(BackfillReport),
    Defaulted(usize),
}

struct Run {
    report: ReconcileReport,
}

impl Run {
    fn start(plan: &MigrationPlan, dry_run: bool) -> Self {
        Self {
            report: ReconcileReport::new(plan.key().clone(), plan.table().to_string(), dry_run),
        }
    }

    fn enter(&mut self, phase: ReconcilePhase) {
        self.report.trace.push(phase);
        tracing::info!(
            migration = %self.report.migration,
            table = %self.report.table,
            %phase,
            dry_run = self.report.dry_run,
            "reconcile"
        );
    }

    fn check<T>(&mut self, result: Result<T, StoreError>) -> Result<T, ReconcileError> {
        let phase = self.report.final_phase().unwrap_or(ReconcilePhase::Probing);
        self.check_in(phase, result)
    }

    /// Fails the run in `phase`, which may be the phase about to be entered.
    fn check_in<T>(
        &mut self,
        phase: ReconcilePhase,
        result: Result<T, StoreError>,
    ) -> Result<T, ReconcileError> {
        result.map_err(|source| {
            let mut trace = self.report.trace.clone();
            trace.push(ReconcilePhase::Failed);
            tracing::warn!(
                migration = %self.report.migration,
                table = %self.report.table,
                %phase,
                code = source.code(),
                recoverable = source.is_recoverable(),
                error = %source,
                "reconcile failed"
            );
            ReconcileError {
                migration: self.report.migration.clone(),
                table: self.report.table.clone(),
                phase,
                trace,
                source,
            }
        })
    }
}

/// Read-only post-condition: every expected column exists and every status is valid.
fn verify(conn: &Connection, plan: &MigrationPlan) -> Result<(), StoreError> {
    let schema = probe::describe_table(conn, plan.table())?;
    require_key_column(plan, &schema)?;
    let missing = schema.missing(plan.columns());
    let (offending, offending_total) = if schema.has_column(plan.status_column()) {
        (
            backfill::invalid_status_records(conn, plan, VERIFY_SAMPLE)?,
            backfill::status_counts(conn, plan)?.invalid,
        )
    } else {
        (Vec::new(), 0)
    };

    if missing.is_empty() && offending_total == 0 {
        return Ok(());
    }
    Err(StoreError::Verification {
        table: plan.table().to_string(),
        missing_columns: missing.iter().map(ToString::to_string).collect(),
        offending_records: offending.iter().map(ToString::to_string).collect(),
        offending_total,
    })
}
