#![forbid(unsafe_code)]

use super::*;
use r1d3_core::status::Status;
use r1d3_core::{MappingRule, MigrationPlan};
use rusqlite::{TransactionBehavior, params};

impl SqliteStore {
    /// Loads every tracked row of the plan's table. Fails on the first legacy flag that
    /// is not a boolean.
    pub fn tracked_records(&self, plan: &MigrationPlan) -> Result<Vec<TrackedRecord>, StoreError> {
        let schema = probe::describe_table(&self.conn, plan.table())?;
        load_rows(&self.conn, plan, &schema)?
            .into_iter()
            .map(|row| row.into_tracked(plan.table()))
            .collect()
    }

    /// Rewrites the status of every record whose stored value differs from the rule's
    /// target. All or nothing: any failing record rolls back the whole batch.
    pub fn backfill(
        &mut self,
        plan: &MigrationPlan,
        records: &[TrackedRecord],
        rule: &dyn MappingRule,
    ) -> Result<BackfillReport, StoreError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let schema = probe::describe_table(&tx, plan.table())?;
        let report = write_statuses(&tx, plan, &schema, records, rule)?;
        tx.commit()?;
        Ok(report)
    }

    /// Loads and backfills in one transaction, so no row can change in between.
    pub fn backfill_table(
        &mut self,
        plan: &MigrationPlan,
        rule: &dyn MappingRule,
    ) -> Result<BackfillReport, StoreError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let report = backfill_table_tx(&tx, plan, rule)?;
        tx.commit()?;
        Ok(report)
    }

    /// What [`SqliteStore::backfill_table`] would do, without writing. A missing status
    /// column is treated as holding its declared default on every row.
    pub fn plan_backfill(
        &self,
        plan: &MigrationPlan,
        rule: &dyn MappingRule,
    ) -> Result<BackfillReport, StoreError> {
        let schema = probe::describe_table(&self.conn, plan.table())?;
        let assumed = (!schema.has_column(plan.status_column()))
            .then(|| plan.status_column_default().map(Status::as_str));

        let mut report = BackfillReport::default();
        for row in load_rows(&self.conn, plan, &schema)? {
            report.records_examined += 1;
            let Ok(legacy) = parse_legacy_flag(&row.legacy) else {
                report.records_failed += 1;
                continue;
            };
            let current = match assumed {
                Some(default) => default,
                None => row.status.as_deref(),
            };
            if current != Some(rule.status_for(legacy).as_str()) {
                report.records_changed += 1;
            }
        }
        Ok(report)
    }

    /// Sets NULL or out-of-enumeration statuses to `not_started`. Used for tables with
    /// no legacy flag to map from.
    pub fn default_missing_statuses(&mut self, plan: &MigrationPlan) -> Result<usize, StoreError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = default_missing_tx(&tx, plan)?;
        tx.commit()?;
        Ok(changed)
    }

    /// Keys of rows whose status is NULL or outside the enumeration, at most `limit`.
    pub fn invalid_status_records(
        &self,
        plan: &MigrationPlan,
        limit: usize,
    ) -> Result<Vec<RecordKey>, StoreError> {
        invalid_status_records(&self.conn, plan, limit)
    }

    pub fn status_counts(&self, plan: &MigrationPlan) -> Result<StatusCounts, StoreError> {
        status_counts(&self.conn, plan)
    }
}

pub(super) fn backfill_table_tx(
    conn: &Connection,
    plan: &MigrationPlan,
    rule: &dyn MappingRule,
) -> Result<BackfillReport, StoreError> {
    let schema = probe::describe_table(conn, plan.table())?;
    let records = load_rows(conn, plan, &schema)?
        .into_iter()
        .map(|row| row.into_tracked(plan.table()))
        .collect::<Result<Vec<_>, _>>()?;
    write_statuses(conn, plan, &schema, &records, rule)
}

fn write_statuses(
    conn: &Connection,
    plan: &MigrationPlan,
    schema: &SchemaDescriptor,
    records: &[TrackedRecord],
    rule: &dyn MappingRule,
) -> Result<BackfillReport, StoreError> {
    if !schema.has_column(plan.status_column()) {
        return Err(StoreError::InvalidInput(
            "status column is missing; patch the table before backfilling",
        ));
    }

    require_key_column(plan, schema)?;
    let touch = touch_column(plan, schema);
    let sql = match touch {
        Some(touch) => format!(
            "UPDATE {} SET {}=?1, {}=?3 WHERE {}=?2",
            plan.table().quoted(),
            plan.status_column().quoted(),
            touch.quoted(),
            plan.key_column().quoted()
        ),
        None => format!(
            "UPDATE {} SET {}=?1 WHERE {}=?2",
            plan.table().quoted(),
            plan.status_column().quoted(),
            plan.key_column().quoted()
        ),
    };
    let mut stmt = conn.prepare(&sql)?;
    let now = now_timestamp();

    let mut report = BackfillReport::default();
    for record in records {
        report.records_examined += 1;
        let target = rule.status_for(record.legacy);
        if record.status.as_deref() == Some(target.as_str()) {
            continue;
        }

        let updated = match touch {
            Some(_) => stmt.execute(params![target.as_str(), &record.key, &now]),
            None => stmt.execute(params![target.as_str(), &record.key]),
        };
        let fail = |reason: String| StoreError::Backfill {
            table: plan.table().to_string(),
            record: record.key.to_string(),
            reason,
        };
        match updated {
            Ok(0) => return Err(fail("record no longer exists".to_string())),
            Ok(1) => report.records_changed += 1,
            Ok(rows) => return Err(fail(format!("key matched {rows} rows"))),
            Err(err) => return Err(fail(err.to_string())),
        }
    }

    tracing::debug!(
        table = %plan.table(),
        examined = report.records_examined,
        changed = report.records_changed,
        "backfill written"
    );
    Ok(report)
}

pub(super) fn default_missing_tx(
    conn: &Connection,
    plan: &MigrationPlan,
) -> Result<usize, StoreError> {
    let schema = probe::describe_table(conn, plan.table())?;
    if !schema.has_column(plan.status_column()) {
        return Err(StoreError::InvalidInput(
            "status column is missing; patch the table before defaulting",
        ));
    }

    let status = plan.status_column().quoted();
    let filter = format!("{status} IS NULL OR {status} NOT IN ({})", Status::sql_list());
    let changed = match touch_column(plan, &schema) {
        Some(touch) => conn.execute(
            &format!(
                "UPDATE {} SET {status}=?1, {}=?2 WHERE {filter}",
                plan.table().quoted(),
                touch.quoted()
            ),
            params![Status::NotStarted.as_str(), now_timestamp()],
        )?,
        None => conn.execute(
            &format!("UPDATE {} SET {status}=?1 WHERE {filter}", plan.table().quoted()),
            params![Status::NotStarted.as_str()],
        )?,
    };
    Ok(changed)
}

pub(super) fn invalid_status_records(
    conn: &Connection,
    plan: &MigrationPlan,
    limit: usize,
) -> Result<Vec<RecordKey>, StoreError> {
    let status = plan.status_column().quoted();
    let sql = format!(
        "SELECT {key} FROM {table} WHERE {status} IS NULL OR {status} NOT IN ({list}) \
         ORDER BY {key} LIMIT ?1",
        key = plan.key_column().quoted(),
        table = plan.table().quoted(),
        list = Status::sql_list(),
    );
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut stmt = conn.prepare(&sql)?;
    let keys = stmt
        .query_map(params![limit], |row| row.get::<_, rusqlite::types::Value>(0))?
        .map(|value| value.map(RecordKey::new))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(keys)
}

pub(super) fn status_counts(
    conn: &Connection,
    plan: &MigrationPlan,
) -> Result<StatusCounts, StoreError> {
    let sql = format!(
        "SELECT {status}, COUNT(*) FROM {table} GROUP BY {status}",
        status = plan.status_column().quoted(),
        table = plan.table().quoted(),
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    let mut counts = StatusCounts::default();
    while let Some(row) = rows.next()? {
        let raw = value_to_text(row.get(0)?);
        let rows_in_group = usize::try_from(row.get::<_, i64>(1)?).unwrap_or(0);
        counts.bump(exact_status(raw.as_deref()), rows_in_group);
    }
    Ok(counts)
}
