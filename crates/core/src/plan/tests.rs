use super::*;
use crate::ids::{MigrationKey, MigrationKeyError, SqlIdent, SqlIdentError};
use crate::status::Status;

fn names(columns: &[&ColumnSpec]) -> Vec<String> {
    columns.iter().map(|column| column.name().to_string()).collect()
}

fn ident(value: &str) -> SqlIdent {
    SqlIdent::try_new(value).unwrap()
}

#[test]
fn sql_ident_validation() {
    assert_eq!(SqlIdent::try_new("").unwrap_err(), SqlIdentError::Empty);
    assert_eq!(
        SqlIdent::try_new("1table").unwrap_err(),
        SqlIdentError::InvalidFirstChar
    );
    assert_eq!(
        SqlIdent::try_new("bad;drop").unwrap_err(),
        SqlIdentError::InvalidChar { ch: ';', index: 3 }
    );
    assert_eq!(
        SqlIdent::try_new("x".repeat(65)).unwrap_err(),
        SqlIdentError::TooLong
    );
    assert_eq!(
        SqlIdent::try_new("strategy_strategymilestone")
            .unwrap()
            .quoted(),
        "\"strategy_strategymilestone\""
    );
}

#[test]
fn migration_key_parses_dot_and_slash() {
    let dotted = MigrationKey::parse("strategy.add_status").unwrap();
    let slashed = MigrationKey::parse(" strategy/add_status ").unwrap();
    assert_eq!(dotted, slashed);
    assert_eq!(dotted.app(), "strategy");
    assert_eq!(dotted.name(), "add_status");
    assert_eq!(dotted.to_string(), "strategy.add_status");

    assert_eq!(
        MigrationKey::parse("strategy").unwrap_err(),
        MigrationKeyError::MissingSeparator
    );
    assert_eq!(
        MigrationKey::parse("Strategy.add").unwrap_err(),
        MigrationKeyError::InvalidAppChar('S')
    );
    assert_eq!(
        MigrationKey::parse("strategy.").unwrap_err(),
        MigrationKeyError::EmptyName
    );
}

#[test]
fn status_wire_names_are_closed() {
    for status in Status::ALL {
        assert_eq!(Status::parse(status.as_str()), Some(status));
        assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
    }
    assert_eq!(Status::parse(" completed "), Some(Status::Completed));
    assert_eq!(Status::parse("Completed"), None);
    assert_eq!(Status::parse("done"), None);
    assert!("".parse::<Status>().is_err());
    assert_eq!(
        Status::sql_list(),
        "'not_started', 'in_progress', 'completed'"
    );
}

#[test]
fn default_policy_maps_false_to_in_progress() {
    let rule = StatusPolicy::default();
    assert_eq!(rule.status_for(Some(true)), Status::Completed);
    assert_eq!(rule.status_for(Some(false)), Status::InProgress);
    assert_eq!(rule.status_for(None), Status::NotStarted);
}

#[test]
fn alternative_policy_maps_false_to_not_started() {
    let rule = StatusPolicy::FalseNotStarted;
    assert_eq!(rule.status_for(Some(true)), Status::Completed);
    assert_eq!(rule.status_for(Some(false)), Status::NotStarted);
    assert_eq!(rule.status_for(None), Status::NotStarted);
    assert_eq!(StatusPolicy::parse("false-not-started"), Some(rule));
    assert_eq!(StatusPolicy::parse("bogus"), None);
}

#[test]
fn closures_are_mapping_rules() {
    let everything_done = |_: Option<bool>| Status::Completed;
    assert_eq!(everything_done.status_for(None), Status::Completed);
}

#[test]
fn default_literals_are_escaped() {
    assert_eq!(DefaultValue::Null.sql_literal(), "NULL");
    assert_eq!(DefaultValue::Bool(true).sql_literal(), "1");
    assert_eq!(DefaultValue::Integer(-4).sql_literal(), "-4");
    assert_eq!(
        DefaultValue::Text("it's".to_string()).sql_literal(),
        "'it''s'"
    );
}

#[test]
fn column_spec_rejects_not_null_without_default() {
    assert_eq!(
        ColumnSpec::try_new("status", "varchar(20)", false, DefaultValue::Null).unwrap_err(),
        PlanError::NotNullWithoutDefault("status".to_string())
    );
    assert!(matches!(
        ColumnSpec::try_new("status", "text; drop", true, DefaultValue::Null),
        Err(PlanError::InvalidDeclType(_))
    ));
    assert_eq!(
        ColumnSpec::status("status")
            .unwrap()
            .column_definition(),
        "\"status\" varchar(20) NOT NULL DEFAULT 'not_started'"
    );
    assert_eq!(
        ColumnSpec::try_new("note", "text", true, DefaultValue::Null)
            .unwrap()
            .column_definition(),
        "\"note\" text DEFAULT NULL"
    );
}

#[test]
fn plan_requires_status_column() {
    let key = MigrationKey::parse("strategy.add_status").unwrap();
    let err = MigrationPlan::builder(key, "strategy_strategymilestone")
        .unwrap()
        .build()
        .unwrap_err();
    assert_eq!(err, PlanError::StatusColumnNotExpected("status".to_string()));
}

#[test]
fn plan_rejects_unknown_status_default() {
    let key = MigrationKey::parse("strategy.add_status").unwrap();
    let column = ColumnSpec::try_new(
        "status",
        "varchar(20)",
        false,
        DefaultValue::Text("done".to_string()),
    )
    .unwrap();
    let err = MigrationPlan::builder(key, "milestones")
        .unwrap()
        .with_column(column)
        .build()
        .unwrap_err();
    assert_eq!(err, PlanError::InvalidStatusDefault("done".to_string()));
}

#[test]
fn plan_rejects_adding_the_legacy_column() {
    let key = MigrationKey::parse("strategy.add_status").unwrap();
    let err = MigrationPlan::builder(key, "milestones")
        .unwrap()
        .with_column(ColumnSpec::status("status").unwrap())
        .with_column(
            ColumnSpec::try_new("is_completed", "bool", false, DefaultValue::Bool(false)).unwrap(),
        )
        .build()
        .unwrap_err();
    assert_eq!(err, PlanError::ReservedColumn("is_completed".to_string()));
}

#[test]
fn patch_order_puts_dependencies_first() {
    let plan = catalog::strategy_phase_status().unwrap();
    let missing = vec![ident("status"), ident("is_current")];
    let ordered = plan.patch_order(&missing).unwrap();
    assert_eq!(names(&ordered), vec!["is_current", "status"]);

    // A dependency that already exists imposes no order.
    let ordered = plan.patch_order(&[ident("status")]).unwrap();
    assert_eq!(names(&ordered), vec!["status"]);
}

#[test]
fn patch_order_detects_cycles() {
    let key = MigrationKey::parse("app.cycle").unwrap();
    let err = MigrationPlan::builder(key, "t")
        .unwrap()
        .with_column(ColumnSpec::status("status").unwrap().after("a").unwrap())
        .with_column(
            ColumnSpec::try_new("a", "integer", true, DefaultValue::Null)
                .unwrap()
                .after("status")
                .unwrap(),
        )
        .build()
        .unwrap_err();
    assert!(matches!(err, PlanError::DependencyCycle(columns) if columns.len() == 2));

    assert_eq!(
        ColumnSpec::status("status").unwrap().after("status").unwrap_err(),
        PlanError::SelfDependency("status".to_string())
    );
}

#[test]
fn builtin_catalog_is_complete() {
    let plans = catalog::builtin();
    assert_eq!(plans.len(), 3);

    let key = MigrationKey::parse(catalog::STRATEGY_MILESTONE_STATUS).unwrap();
    let plan = catalog::find(&plans, &key).unwrap();
    assert_eq!(plan.table().as_str(), "strategy_strategymilestone");
    assert_eq!(plan.legacy_column().as_str(), "is_completed");
    assert_eq!(plan.status_column().as_str(), "status");
    assert_eq!(plan.touch_column().map(SqlIdent::as_str), Some("updated_at"));
    assert_eq!(plan.policy(), StatusPolicy::FalseInProgress);
    assert_eq!(plan.status_column_default(), Some(Status::NotStarted));
}

#[test]
fn nullable_status_column_without_default_starts_out_null() {
    let key = MigrationKey::parse("strategy.0002_status").unwrap();
    let plan = MigrationPlan::builder(key, "milestones")
        .unwrap()
        .with_column(
            ColumnSpec::try_new("status", "varchar(20)", true, DefaultValue::Null).unwrap(),
        )
        .build()
        .unwrap();
    assert_eq!(plan.status_column_default(), None);

    let key = MigrationKey::parse("strategy.0003_status").unwrap();
    let plan = MigrationPlan::builder(key, "milestones")
        .unwrap()
        .with_column(
            ColumnSpec::try_new(
                "status",
                "varchar(20)",
                true,
                DefaultValue::Text("completed".to_string()),
            )
            .unwrap(),
        )
        .build()
        .unwrap();
    assert_eq!(plan.status_column_default(), Some(Status::Completed));
}
