#![forbid(unsafe_code)]

//! Human text goes to stdout, one JSON document per line with `--json`. Logs and
//! errors go to stderr.

use crate::commands::CliError;
use r1d3_core::MigrationPlan;
use r1d3_core::ids::{MigrationKey, SqlIdent};
use r1d3_storage::{
    MigrationRecord, NormalizeReport, ReconcilePhase, ReconcileReport, SchemaDescriptor,
    StatusCounts,
};
use serde_json::{Value, json};

fn trace_json(trace: &[ReconcilePhase]) -> Value {
    json!(trace.iter().map(|phase| phase.as_str()).collect::<Vec<_>>())
}

fn trace_text(trace: &[ReconcilePhase]) -> String {
    trace
        .iter()
        .map(|phase| phase.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn counts_json(counts: &StatusCounts) -> Value {
    json!({
        "not_started": counts.not_started,
        "in_progress": counts.in_progress,
        "completed": counts.completed,
        "invalid": counts.invalid,
    })
}

pub(crate) fn report_json(report: &ReconcileReport) -> Value {
    json!({
        "ok": true,
        "migration": report.migration.to_string(),
        "table": report.table,
        "phase": report.final_phase().map(ReconcilePhase::as_str),
        "trace": trace_json(&report.trace),
        "dry_run": report.dry_run,
        "short_circuited": report.short_circuited,
        "columns_added": report.columns_added,
        "backfill": report.backfill.map(|backfill| json!({
            "records_examined": backfill.records_examined,
            "records_changed": backfill.records_changed,
            "records_failed": backfill.records_failed,
        })),
        "rows_defaulted": report.rows_defaulted,
        "recorded": report.recorded,
        "writes": report.writes(),
    })
}

pub(crate) fn report(report: &ReconcileReport, json: bool) {
    if json {
        println!("{}", report_json(report));
        return;
    }

    let verb = if report.dry_run { "would add" } else { "added" };
    println!(
        "{} on {}: {}",
        report.migration,
        report.table,
        trace_text(&report.trace)
    );
    if report.short_circuited {
        println!("  already applied; nothing to do");
        return;
    }
    if !report.columns_added.is_empty() {
        println!("  columns {verb}: {}", report.columns_added.join(", "));
    }
    if let Some(backfill) = report.backfill {
        println!(
            "  backfill: {} examined, {} changed, {} failed",
            backfill.records_examined, backfill.records_changed, backfill.records_failed
        );
    }
    if report.rows_defaulted > 0 {
        println!("  rows defaulted to not_started: {}", report.rows_defaulted);
    }
    match (report.dry_run, report.recorded) {
        (true, true) => println!("  ledger: would record"),
        (false, true) => println!("  ledger: recorded"),
        (_, false) => println!("  ledger: already recorded"),
    }
    if report.dry_run {
        println!("  dry run: nothing written");
    } else {
        println!("  writes: {}", report.writes());
    }
}

pub(crate) fn plans(plans: &[MigrationPlan], json: bool) {
    for plan in plans {
        let columns: Vec<String> = plan
            .columns()
            .iter()
            .map(|column| column.column_definition())
            .collect();
        if json {
            println!(
                "{}",
                json!({
                    "migration": plan.key().to_string(),
                    "table": plan.table().as_str(),
                    "key_column": plan.key_column().as_str(),
                    "legacy_column": plan.legacy_column().as_str(),
                    "status_column": plan.status_column().as_str(),
                    "touch_column": plan.touch_column().map(SqlIdent::as_str),
                    "policy": plan.policy().as_str(),
                    "columns": columns,
                })
            );
            continue;
        }
        println!(
            "{} -> {} (legacy {}, policy {})",
            plan.key(),
            plan.table(),
            plan.legacy_column(),
            plan.policy()
        );
        for column in columns {
            println!("  {column}");
        }
    }
}

pub(crate) fn schema(
    schema: &SchemaDescriptor,
    counts: &[(MigrationKey, StatusCounts)],
    json: bool,
) {
    if json {
        let columns: Vec<Value> = schema
            .columns
            .iter()
            .map(|column| {
                json!({
                    "name": column.name,
                    "type": column.decl_type,
                    "nullable": column.nullable,
                    "default": column.default_sql,
                    "primary_key": column.primary_key,
                })
            })
            .collect();
        let statuses: Vec<Value> = counts
            .iter()
            .map(|(key, counts)| {
                json!({ "migration": key.to_string(), "counts": counts_json(counts) })
            })
            .collect();
        println!(
            "{}",
            json!({ "table": schema.table, "columns": columns, "statuses": statuses })
        );
        return;
    }

    println!("{}", schema.table);
    for column in &schema.columns {
        let mut line = format!("  {} {}", column.name, column.decl_type);
        if !column.nullable {
            line.push_str(" NOT NULL");
        }
        if let Some(default) = &column.default_sql {
            line.push_str(&format!(" DEFAULT {default}"));
        }
        if column.primary_key {
            line.push_str(" PRIMARY KEY");
        }
        println!("{line}");
    }
    for (key, counts) in counts {
        println!(
            "  {key}: {} not_started, {} in_progress, {} completed, {} invalid",
            counts.not_started, counts.in_progress, counts.completed, counts.invalid
        );
    }
}

pub(crate) fn history(records: &[MigrationRecord], json: bool) {
    for record in records {
        if json {
            println!(
                "{}",
                json!({
                    "id": record.id,
                    "app": record.app,
                    "name": record.name,
                    "applied": record.applied,
                })
            );
        } else {
            println!("{:>5}  {}  {}", record.id, record.applied, record.label());
        }
    }
}

pub(crate) fn normalized(
    plan: &MigrationPlan,
    group: &SqlIdent,
    report: &NormalizeReport,
    json: bool,
) {
    let demoted: Vec<String> = report
        .records_demoted
        .iter()
        .map(ToString::to_string)
        .collect();
    if json {
        println!(
            "{}",
            json!({
                "ok": true,
                "table": plan.table().as_str(),
                "group_by": group.as_str(),
                "groups_examined": report.groups_examined,
                "records_demoted": demoted,
            })
        );
        return;
    }
    println!(
        "{} grouped by {}: {} groups, {} demoted to not_started",
        plan.table(),
        group,
        report.groups_examined,
        demoted.len()
    );
    if !demoted.is_empty() {
        println!("  {}", demoted.join(", "));
    }
}

pub(crate) fn error_json(err: &CliError) -> Value {
    let mut doc = json!({
        "ok": false,
        "code": err.code(),
        "error": err.to_string(),
    });
    if let CliError::Reconcile(failure) = err {
        doc["migration"] = json!(failure.migration.to_string());
        doc["table"] = json!(failure.table);
        doc["phase"] = json!(failure.phase.as_str());
        doc["trace"] = trace_json(&failure.trace);
        doc["recoverable"] = json!(failure.is_recoverable());
        doc["offending_records"] = json!(failure.source.offending_records());
    }
    doc
}

pub(crate) fn emit_error(err: &CliError, json: bool) {
    if json {
        println!("{}", error_json(err));
    }
    eprintln!("r1d3-migrate: {err}");
    if let CliError::Reconcile(failure) = err {
        eprintln!("  trace: {}", trace_text(&failure.trace));
        let hint = if failure.is_recoverable() {
            "fix the cause and re-run; completed steps are skipped"
        } else {
            "needs operator attention before re-running"
        };
        eprintln!("  {}: {hint}", failure.code());
    }
}
