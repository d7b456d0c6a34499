#![forbid(unsafe_code)]

use crate::config::{self, ConfigError};
use crate::output;
use crate::{Cli, Command, PolicyArg};
use r1d3_core::MigrationPlan;
use r1d3_core::ids::{MigrationKey, SqlIdent};
use r1d3_storage::{ReconcileError, ReconcileOptions, SqliteStore, StoreError};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Reconcile(#[from] Box<ReconcileError>),
    #[error("unknown migration {0}; `r1d3-migrate plans` lists the known ones")]
    UnknownMigration(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<ReconcileError> for CliError {
    fn from(value: ReconcileError) -> Self {
        Self::Reconcile(Box::new(value))
    }
}

impl CliError {
    pub(crate) fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "INVALID_CONFIG",
            Self::Store(err) => err.code(),
            Self::Reconcile(err) => err.code(),
            Self::UnknownMigration(_) => "UNKNOWN_MIGRATION",
            Self::InvalidArgument(_) => "INVALID_INPUT",
        }
    }
}

pub(crate) fn run(cli: Cli) -> Result<(), CliError> {
    let plans = config::load_plans(cli.plans.as_deref())?;
    let json = cli.json;

    match cli.command {
        Command::Plans => {
            output::plans(&plans, json);
            Ok(())
        }
        Command::Describe { table } => {
            let table = ident(&table)?;
            let store = SqliteStore::open(&cli.db)?;
            let schema = store.describe(&table)?;
            let mut counts = Vec::new();
            for plan in plans.iter().filter(|plan| plan.table() == &table) {
                if schema.has_column(plan.status_column()) {
                    counts.push((plan.key().clone(), store.status_counts(plan)?));
                }
            }
            output::schema(&schema, &counts, json);
            Ok(())
        }
        Command::History { app } => {
            let store = SqliteStore::open(&cli.db)?;
            output::history(&store.list_applied(app.as_deref())?, json);
            Ok(())
        }
        Command::Reconcile {
            migration,
            dry_run,
            policy,
        } => {
            let plan = find_plan(&plans, &migration)?;
            let mut store = open_for_write(&cli.db)?;
            let report = store.reconcile(plan, options(dry_run, policy))?;
            output::report(&report, json);
            Ok(())
        }
        Command::ReconcileAll { dry_run, policy } => {
            let mut store = open_for_write(&cli.db)?;
            for outcome in store.reconcile_all(&plans, options(dry_run, policy)) {
                output::report(&outcome?, json);
            }
            Ok(())
        }
        Command::MarkApplied { migration } => {
            let plan = find_plan(&plans, &migration)?;
            let mut store = open_for_write(&cli.db)?;
            let report = store.mark_applied(plan)?;
            output::report(&report, json);
            Ok(())
        }
        Command::Normalize {
            migration,
            group_by,
        } => {
            let plan = find_plan(&plans, &migration)?;
            let group = ident(&group_by)?;
            let mut store = open_for_write(&cli.db)?;
            let report = store.normalize_in_progress(plan, &group)?;
            output::normalized(plan, &group, &report, json);
            Ok(())
        }
    }
}

fn options(dry_run: bool, policy: Option<PolicyArg>) -> ReconcileOptions {
    ReconcileOptions {
        dry_run,
        policy: policy.map(Into::into),
    }
}

fn open_for_write(db: &Path) -> Result<SqliteStore, CliError> {
    let store = SqliteStore::open(db)?;
    tracing::info!(db = %db.display(), "opened database for migration");
    Ok(store)
}

fn find_plan<'a>(plans: &'a [MigrationPlan], raw: &str) -> Result<&'a MigrationPlan, CliError> {
    let key = MigrationKey::parse(raw)
        .map_err(|err| CliError::InvalidArgument(format!("migration {raw:?}: {err}")))?;
    r1d3_core::catalog::find(plans, &key).ok_or_else(|| CliError::UnknownMigration(key.to_string()))
}

fn ident(raw: &str) -> Result<SqlIdent, CliError> {
    SqlIdent::try_new(raw).map_err(|err| CliError::InvalidArgument(format!("{raw:?}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use r1d3_core::catalog;

    #[test]
    fn plans_are_found_by_either_separator() {
        let plans = catalog::builtin();
        let plan = find_plan(&plans, "strategy/add_status").expect("found");
        assert_eq!(plan.table().as_str(), "strategy_strategymilestone");

        let err = find_plan(&plans, "strategy.add_nothing").expect_err("unknown");
        assert_eq!(err.code(), "UNKNOWN_MIGRATION");
        let err = find_plan(&plans, "no-separator").expect_err("malformed");
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    #[test]
    fn reconcile_failures_keep_their_code() {
        let dir = tempfile::tempdir().expect("temp dir");
        let db = dir.path().join("db.sqlite3");
        std::fs::write(&db, b"").expect("empty database file");

        let cli = Cli {
            db,
            plans: None,
            json: true,
            verbose: 0,
            command: Command::Reconcile {
                migration: "strategy.add_status".to_string(),
                dry_run: false,
                policy: None,
            },
        };
        let err = run(cli).expect_err("table is missing");
        assert_eq!(err.code(), "SCHEMA_NOT_FOUND");
        assert!(matches!(err, CliError::Reconcile(_)));
    }
}
