#![forbid(unsafe_code)]

use super::*;
use r1d3_core::MigrationPlan;
use r1d3_core::ids::SqlIdent;
use r1d3_core::status::Status;
use rusqlite::types::Value;
use rusqlite::{TransactionBehavior, params};

impl SqliteStore {
    /// Leaves at most one `in_progress` row per value of `group_column`: the lowest key
    /// keeps it, the rest drop to `not_started`. Rows with a NULL group are untouched.
    pub fn normalize_in_progress(
        &mut self,
        plan: &MigrationPlan,
        group_column: &SqlIdent,
    ) -> Result<NormalizeReport, StoreError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let schema = probe::describe_table(&tx, plan.table())?;
        require_key_column(plan, &schema)?;
        if !schema.has_column(group_column) {
            return Err(StoreError::InvalidInput("group column does not exist"));
        }
        if !schema.has_column(plan.status_column()) {
            return Err(StoreError::InvalidInput("status column does not exist"));
        }

        let table = plan.table().quoted();
        let key = plan.key_column().quoted();
        let status = plan.status_column().quoted();
        let group = group_column.quoted();

        let active: Vec<(RecordKey, Value)> = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {key}, {group} FROM {table} \
                 WHERE {status}=?1 AND {group} IS NOT NULL ORDER BY {group}, {key}"
            ))?;
            stmt.query_map(params![Status::InProgress.as_str()], |row| {
                Ok((RecordKey::new(row.get(0)?), row.get::<_, Value>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?
        };

        let mut report = NormalizeReport::default();
        let mut current_group: Option<&Value> = None;
        let mut demote = Vec::new();
        for (record, group_value) in &active {
            if current_group == Some(group_value) {
                demote.push(record.clone());
            } else {
                current_group = Some(group_value);
                report.groups_examined += 1;
            }
        }

        let touch = touch_column(plan, &schema);
        let now = now_timestamp();
        for record in &demote {
            match touch {
                Some(touch) => tx.execute(
                    &format!(
                        "UPDATE {table} SET {status}=?1, {}=?3 WHERE {key}=?2",
                        touch.quoted()
                    ),
                    params![Status::NotStarted.as_str(), record, &now],
                )?,
                None => tx.execute(
                    &format!("UPDATE {table} SET {status}=?1 WHERE {key}=?2"),
                    params![Status::NotStarted.as_str(), record],
                )?,
            };
        }
        tx.commit()?;

        tracing::info!(
            table = %plan.table(),
            group = %group_column,
            groups = report.groups_examined,
            demoted = demote.len(),
            "normalized in_progress rows"
        );
        report.records_demoted = demote;
        Ok(report)
    }
}
