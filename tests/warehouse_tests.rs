//! Integration tests for the dataset warehouse
//!
//! Exercises the system of record against a file-backed store: identity,
//! version immutability, derived activeness, and the peripheral CRUD.

use tempfile::TempDir;

use dataset_workbench::frame::{Column, Frame, Value};
use dataset_workbench::warehouse::{Warehouse, WarehouseError};

fn open_warehouse(dir: &TempDir) -> Warehouse {
    let path = dir.path().join("workspace.duckdb");
    let wh = Warehouse::open(&path).expect("open warehouse");
    wh.init().expect("init warehouse");
    wh
}

fn frame(rows: &[(i64, &str)]) -> Frame {
    Frame::new(vec![
        Column::new("id", rows.iter().map(|(i, _)| Value::Int(*i)).collect()),
        Column::new(
            "city",
            rows.iter().map(|(_, c)| Value::Text(c.to_string())).collect(),
        ),
    ])
    .expect("frame")
}

#[test]
fn test_register_and_list_newest_first() {
    let dir = TempDir::new().unwrap();
    let wh = open_warehouse(&dir);

    let first = wh.register_dataset("first").unwrap();
    let second = wh.register_dataset("second").unwrap();
    assert!(second > first);

    let datasets = wh.list_datasets().unwrap();
    assert_eq!(datasets.len(), 2);
    assert_eq!(datasets[0].name, "second");
    assert_eq!(datasets[1].name, "first");
}

#[test]
fn test_version_immutability_across_siblings() {
    let dir = TempDir::new().unwrap();
    let wh = open_warehouse(&dir);
    let ds = wh.register_dataset("sales").unwrap();

    let v1 = wh
        .create_version(ds, &frame(&[(1, "Oslo"), (2, "Bergen")]), "sales.csv", "[]")
        .unwrap();
    let v1_table = wh.version_table(ds, v1).unwrap();
    let before = wh.read_table(&v1_table, 100).unwrap();

    // Creating sibling versions must not change what v1's table returns.
    wh.create_version(ds, &frame(&[(3, "Trondheim")]), "(cleaned)", "[]")
        .unwrap();
    wh.create_version(ds, &frame(&[(4, "Stavanger")]), "(features)", "[]")
        .unwrap();

    for _ in 0..3 {
        let again = wh.read_table(&v1_table, 100).unwrap();
        assert_eq!(again, before);
    }
}

#[test]
fn test_active_version_is_newest() {
    let dir = TempDir::new().unwrap();
    let wh = open_warehouse(&dir);
    let ds = wh.register_dataset("sales").unwrap();

    wh.create_version(ds, &frame(&[(1, "a")]), "v1.csv", "[]").unwrap();
    wh.create_version(ds, &frame(&[(2, "b")]), "v2.csv", "[]").unwrap();
    let v3 = wh.create_version(ds, &frame(&[(3, "c")]), "v3.csv", "[]").unwrap();

    assert_eq!(wh.active_table(ds).unwrap(), format!("ds{ds}_v{v3}"));

    let versions = wh.list_versions(ds).unwrap();
    assert_eq!(versions.len(), 3);
    assert_eq!(versions[0].version_id, v3);
    assert_eq!(versions[0].source_filename, "v3.csv");
}

#[test]
fn test_explicit_version_selection_is_read_only() {
    let dir = TempDir::new().unwrap();
    let wh = open_warehouse(&dir);
    let ds = wh.register_dataset("sales").unwrap();

    let v1 = wh.create_version(ds, &frame(&[(1, "a")]), "v1.csv", "[]").unwrap();
    let v2 = wh.create_version(ds, &frame(&[(2, "b")]), "v2.csv", "[]").unwrap();

    let chosen = wh.version_table(ds, v1).unwrap();
    assert_eq!(chosen, format!("ds{ds}_v{v1}"));

    // Selecting an older version does not change which one is active.
    assert_eq!(wh.active_table(ds).unwrap(), format!("ds{ds}_v{v2}"));
}

#[test]
fn test_table_references_unique_across_datasets() {
    let dir = TempDir::new().unwrap();
    let wh = open_warehouse(&dir);

    let mut references = std::collections::HashSet::new();
    for name in ["a", "b", "c"] {
        let ds = wh.register_dataset(name).unwrap();
        for _ in 0..2 {
            let v = wh.create_version(ds, &frame(&[(1, "x")]), "f.csv", "[]").unwrap();
            assert!(references.insert(wh.version_table(ds, v).unwrap()));
        }
    }
    assert_eq!(references.len(), 6);
}

#[test]
fn test_failed_version_rolls_back_completely() {
    let dir = TempDir::new().unwrap();
    let wh = open_warehouse(&dir);
    let ds = wh.register_dataset("sales").unwrap();

    // A zero-length identifier is rejected by the store mid-materialization,
    // after the version id and table DDL work has begun.
    let bad = Frame::new(vec![Column::new("", vec![Value::Int(1)])]).unwrap();
    assert!(wh.create_version(ds, &bad, "bad.csv", "[]").is_err());

    assert!(wh.list_versions(ds).unwrap().is_empty());
    assert!(matches!(
        wh.active_table(ds),
        Err(WarehouseError::NotFound(_))
    ));

    // No orphan physical table either.
    let orphans = wh
        .query(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_name LIKE 'ds%_v%'",
        )
        .unwrap();
    assert_eq!(orphans.row_count(), 0);

    // The store still accepts a well-formed version afterwards.
    let v = wh
        .create_version(ds, &frame(&[(1, "Oslo")]), "sales.csv", "[]")
        .unwrap();
    assert_eq!(wh.version_table(ds, v).unwrap(), wh.active_table(ds).unwrap());
}

#[test]
fn test_col_count_reflects_materialized_columns() {
    let dir = TempDir::new().unwrap();
    let wh = open_warehouse(&dir);
    let ds = wh.register_dataset("sales").unwrap();

    // Two columns collide on the same name; only one survives in the table,
    // and the stored count must agree with it.
    let collided = Frame::new(vec![
        Column::new("amount", vec![Value::Int(1)]),
        Column::new("amount", vec![Value::Int(2)]),
    ])
    .unwrap();
    wh.create_version(ds, &collided, "sales.csv", "[]").unwrap();

    let versions = wh.list_versions(ds).unwrap();
    assert_eq!(versions[0].col_count, 1);

    let stored = wh.read_table(&versions[0].table_reference, 10).unwrap();
    assert_eq!(stored.column_count(), 1);
    assert_eq!(stored.columns()[0].values, vec![Value::Int(2)]);
}

#[test]
fn test_not_found_paths() {
    let dir = TempDir::new().unwrap();
    let wh = open_warehouse(&dir);
    let ds = wh.register_dataset("empty").unwrap();

    assert!(matches!(wh.active_table(ds), Err(WarehouseError::NotFound(_))));
    assert!(matches!(wh.version_table(ds, 42), Err(WarehouseError::NotFound(_))));
    assert!(matches!(
        wh.create_version(999, &frame(&[(1, "x")]), "f.csv", "[]"),
        Err(WarehouseError::NotFound(_))
    ));
    assert!(wh.list_versions(999).unwrap().is_empty());
}

#[test]
fn test_query_aggregation_round_trip() {
    let dir = TempDir::new().unwrap();
    let wh = open_warehouse(&dir);
    let ds = wh.register_dataset("sales").unwrap();
    wh.create_version(
        ds,
        &frame(&[(1, "Oslo"), (2, "Oslo"), (3, "Bergen")]),
        "sales.csv",
        "[]",
    )
    .unwrap();

    let table = wh.active_table(ds).unwrap();
    let out = wh
        .query(&format!(
            "SELECT city, COUNT(*) AS n FROM {table} GROUP BY city ORDER BY n DESC"
        ))
        .unwrap();
    assert_eq!(out.row_count(), 2);
    assert_eq!(out.column("city").unwrap().values[0], Value::Text("Oslo".into()));
    assert_eq!(out.column("n").unwrap().values[0], Value::Int(2));
}

#[test]
fn test_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("workspace.duckdb");

    let ds = {
        let wh = Warehouse::open(&path).unwrap();
        wh.init().unwrap();
        let ds = wh.register_dataset("persistent").unwrap();
        wh.create_version(ds, &frame(&[(1, "x")]), "f.csv", "[]").unwrap();
        ds
    };

    let wh = Warehouse::open(&path).unwrap();
    let datasets = wh.list_datasets().unwrap();
    assert_eq!(datasets.len(), 1);
    let table = wh.active_table(ds).unwrap();
    assert_eq!(wh.read_table(&table, 10).unwrap().row_count(), 1);
}

#[test]
fn test_projects_crud() {
    let dir = TempDir::new().unwrap();
    let wh = open_warehouse(&dir);
    let ds = wh.register_dataset("sales").unwrap();

    let p1 = wh.create_project("churn", "reduce churn", Some(ds)).unwrap();
    let p2 = wh.create_project("forecast", "12-month forecast", None).unwrap();
    assert!(p2 > p1);

    wh.update_project(p1, "churn v2", "reduce churn faster", Some(ds)).unwrap();
    let projects = wh.list_projects().unwrap();
    assert_eq!(projects.len(), 2);
    // Most recently updated first.
    assert_eq!(projects[0].name, "churn v2");

    assert!(matches!(
        wh.update_project(999, "x", "y", None),
        Err(WarehouseError::NotFound(_))
    ));
}

#[test]
fn test_reports_crud() {
    let dir = TempDir::new().unwrap();
    let wh = open_warehouse(&dir);
    let p = wh.create_project("study", "look at data", None).unwrap();

    let r1 = wh.save_report(p, "first pass", "# Findings\nnothing yet").unwrap();
    let r2 = wh.save_report(p, "second pass", "# Findings\nsomething").unwrap();

    let reports = wh.list_reports(p).unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].report_id, r2);

    let report = wh.get_report(r1).unwrap().expect("report exists");
    assert_eq!(report.title, "first pass");
    assert!(report.markdown.contains("nothing yet"));

    assert!(wh.get_report(999).unwrap().is_none());
    assert!(matches!(
        wh.save_report(999, "t", "m"),
        Err(WarehouseError::NotFound(_))
    ));
}
