#![forbid(unsafe_code)]

use r1d3_core::catalog;
use r1d3_core::ids::{MigrationKey, SqlIdent};
use r1d3_storage::{RecordKey, SqliteStore};
use rusqlite::Connection;

fn key(value: &str) -> MigrationKey {
    MigrationKey::parse(value).expect("migration key")
}

fn ident(value: &str) -> SqlIdent {
    SqlIdent::try_new(value).expect("ident")
}

#[test]
fn ledger_is_created_on_first_record_and_insert_once() {
    let mut store = SqliteStore::open_in_memory().expect("open store");
    let migration = key("strategy.add_status");

    assert!(!store.is_applied(&migration).expect("lookup"));
    assert!(store.list_applied(None).expect("list").is_empty());
    assert!(
        !store
            .table_exists(&ident("django_migrations"))
            .expect("exists")
    );

    assert!(store.record_applied(&migration).expect("record"));
    assert!(!store.record_applied(&migration).expect("record again"));
    store
        .record_applied(&key("projects/add_gamemilestone_status"))
        .expect("record other app");

    assert!(store.is_applied(&migration).expect("lookup"));
    let all = store.list_applied(None).expect("list");
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].label(), "strategy.add_status");
    // Django's datetime text: `YYYY-MM-DD HH:MM:SS.ffffff`.
    assert_eq!(all[0].applied.len(), 26);

    let projects = store.list_applied(Some("projects")).expect("filtered");
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].name, "add_gamemilestone_status");
}

#[test]
fn existing_django_ledger_rows_are_respected() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("db.sqlite3");
    let conn = Connection::open(&path).expect("create db");
    conn.execute_batch(
        r#"
        CREATE TABLE "django_migrations" (
            "id" integer NOT NULL PRIMARY KEY AUTOINCREMENT,
            "app" varchar(255) NOT NULL,
            "name" varchar(255) NOT NULL,
            "applied" datetime NOT NULL
        );
        INSERT INTO django_migrations(app, name, applied)
            VALUES ('strategy', 'add_status', '2024-05-01 10:00:00.000000');
        "#,
    )
    .expect("fixture");
    drop(conn);

    let mut store = SqliteStore::open(&path).expect("open store");
    assert!(store.is_applied(&key("strategy.add_status")).expect("lookup"));
    assert!(!store.record_applied(&key("strategy.add_status")).expect("record"));
    let rows = store.list_applied(Some("strategy")).expect("list");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].applied, "2024-05-01 10:00:00.000000");
}

#[test]
fn describe_reports_table_info() {
    let store = SqliteStore::open_in_memory().expect("open store");
    store
        .execute_batch(
            r#"CREATE TABLE "projects_gamemilestone" (
                "id" integer NOT NULL PRIMARY KEY AUTOINCREMENT,
                "Title" varchar(200) NOT NULL,
                "status" varchar(20) NOT NULL DEFAULT 'not_started'
            );"#,
        )
        .expect("fixture");

    let schema = store
        .describe(&ident("projects_gamemilestone"))
        .expect("describe");
    assert_eq!(schema.column_names(), vec!["id", "Title", "status"]);
    let id = schema.column("id").expect("id");
    assert!(id.primary_key);
    assert!(!id.nullable);
    let title = schema.column("title").expect("case-insensitive lookup");
    assert_eq!(title.decl_type, "varchar(200)");
    let status = schema.column("status").expect("status");
    assert_eq!(status.default_sql.as_deref(), Some("'not_started'"));

    let plan = catalog::game_milestone_status().expect("plan");
    assert!(schema.missing(plan.columns()).is_empty());

    let err = store
        .describe(&ident("strategy_strategyphase"))
        .expect_err("missing table");
    assert_eq!(err.code(), "SCHEMA_NOT_FOUND");
}

#[test]
fn normalize_keeps_lowest_key_in_progress_per_group() {
    let mut store = SqliteStore::open_in_memory().expect("open store");
    store
        .execute_batch(
            r#"
            CREATE TABLE "strategy_strategymilestone" (
                "id" integer NOT NULL PRIMARY KEY AUTOINCREMENT,
                "strategy_id" integer NULL,
                "is_completed" bool NULL,
                "status" varchar(20) NOT NULL DEFAULT 'not_started'
            );
            INSERT INTO strategy_strategymilestone(id, strategy_id, status) VALUES
                (1, 10, 'completed'),
                (2, 10, 'in_progress'),
                (3, 10, 'in_progress'),
                (4, 20, 'in_progress'),
                (5, NULL, 'in_progress'),
                (6, NULL, 'in_progress'),
                (7, 20, 'not_started'),
                (8, 10, 'in_progress');
            "#,
        )
        .expect("fixture");

    let plan = catalog::strategy_milestone_status().expect("plan");
    let report = store
        .normalize_in_progress(&plan, &ident("strategy_id"))
        .expect("normalize");
    assert_eq!(report.groups_examined, 2);
    assert_eq!(
        report.records_demoted,
        vec![RecordKey::from(3), RecordKey::from(8)]
    );

    let counts = store.status_counts(&plan).expect("counts");
    assert_eq!(counts.in_progress, 4);
    assert_eq!(counts.not_started, 3);
    assert_eq!(counts.completed, 1);

    let again = store
        .normalize_in_progress(&plan, &ident("strategy_id"))
        .expect("second normalize");
    assert!(again.records_demoted.is_empty());

    let err = store
        .normalize_in_progress(&plan, &ident("project_id"))
        .expect_err("unknown group column");
    assert_eq!(err.code(), "INVALID_INPUT");
}

#[test]
fn add_column_is_idempotent_and_keeps_existing_rows() {
    let mut store = SqliteStore::open_in_memory().expect("open store");
    store
        .execute_batch(
            "CREATE TABLE projects_gamemilestone (id integer PRIMARY KEY, title text NOT NULL);
             INSERT INTO projects_gamemilestone(id, title) VALUES (1, 'Alpha'), (2, 'Beta');",
        )
        .expect("fixture");
    let table = ident("projects_gamemilestone");
    let status = r1d3_core::ColumnSpec::status("status").expect("spec");

    assert!(store.add_column(&table, &status).expect("first add"));
    assert!(!store.add_column(&table, &status).expect("second add"));
    assert!(store.has_column(&table, status.name()).expect("has column"));

    let plan = catalog::game_milestone_status().expect("plan");
    let counts = store.status_counts(&plan).expect("counts");
    assert_eq!(counts.not_started, 2);

    let err = store
        .add_column(&ident("strategy_strategyphase"), &status)
        .expect_err("missing table");
    assert_eq!(err.code(), "SCHEMA_NOT_FOUND");
}

#[test]
fn normalize_refuses_a_table_without_its_key_column() {
    let mut store = SqliteStore::open_in_memory().expect("open store");
    store
        .execute_batch(
            r#"
            CREATE TABLE "strategy_strategymilestone" (
                "pk" integer PRIMARY KEY,
                "strategy_id" integer NULL,
                "status" varchar(20) NOT NULL DEFAULT 'not_started'
            );
            INSERT INTO strategy_strategymilestone(pk, strategy_id, status) VALUES
                (1, 10, 'in_progress'),
                (2, 10, 'in_progress');
            "#,
        )
        .expect("fixture");

    let plan = catalog::strategy_milestone_status().expect("plan");
    let err = store
        .normalize_in_progress(&plan, &ident("strategy_id"))
        .expect_err("rows cannot be addressed without the key column");
    assert_eq!(err.code(), "KEY_COLUMN_NOT_FOUND");
    assert_eq!(store.status_counts(&plan).expect("counts").in_progress, 2);
}
