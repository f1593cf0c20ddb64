//! Dataset warehouse
//!
//! The system of record: sole authority for dataset/version identity and the
//! only component permitted to create or query physical tables. Every
//! version is backed by its own physically materialized table, named from
//! both the dataset and version ids; versions are never mutated after
//! creation, and the "active" version of a dataset is derived from creation
//! order rather than stored as a mutable pointer.
//!
//! Connections are scoped per operation for file-backed stores: each call
//! opens, works, and releases before returning, on every exit path. An
//! in-memory store keeps its single connection alive since the database has
//! no identity without it; that mode exists for tests.

mod error;
mod schema;

pub use error::WarehouseError;
pub use schema::WorkbenchSchema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use duckdb::types::TimeUnit;
use duckdb::types::Value as DbValue;
use duckdb::{params, params_from_iter, Connection};
use serde::Serialize;

use crate::frame::{Column, DataType, Frame, Value};

/// A registered dataset.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub dataset_id: i64,
    pub name: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

/// One immutable materialization of a dataset.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetVersion {
    pub version_id: i64,
    pub dataset_id: i64,
    /// Name of the physical table backing this version.
    pub table_reference: String,
    /// Upload name, or a synthetic marker like "(cleaned)" for derived versions.
    pub source_filename: String,
    /// Serialized recipe that produced this version; "[]" for raw uploads.
    pub recipe_descriptor: String,
    pub row_count: i64,
    pub col_count: i64,
    pub created_at: String,
}

/// A project binding a name and objective to a dataset.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub project_id: i64,
    pub name: String,
    pub objective: String,
    pub dataset_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

/// A markdown report bound to a project.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub report_id: i64,
    pub project_id: i64,
    pub title: String,
    pub markdown: String,
    pub created_at: String,
}

enum Store {
    File(PathBuf),
    Memory(Connection),
}

/// Handle to the workbench store.
pub struct Warehouse {
    store: Store,
}

impl Warehouse {
    /// Open (or create) a file-backed store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WarehouseError> {
        // Verify the store is reachable before handing out the handle.
        let _probe = Connection::open(path.as_ref())?;
        Ok(Self {
            store: Store::File(path.as_ref().to_path_buf()),
        })
    }

    /// Open an in-memory store (for testing).
    pub fn memory() -> Result<Self, WarehouseError> {
        Ok(Self {
            store: Store::Memory(Connection::open_in_memory()?),
        })
    }

    /// Create the metadata tables and id sequences.
    pub fn init(&self) -> Result<(), WarehouseError> {
        self.with_conn(|conn| {
            conn.execute_batch(WorkbenchSchema::create_tables())?;
            Ok(())
        })
    }

    /// Scoped connection acquisition: opened per operation for file stores,
    /// released on all exit paths when the closure returns.
    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, WarehouseError>,
    ) -> Result<T, WarehouseError> {
        match &self.store {
            Store::File(path) => {
                let conn = Connection::open(path)?;
                f(&conn)
            }
            Store::Memory(conn) => f(conn),
        }
    }

    // ---- datasets & versions ----

    /// Register a new dataset and return its id.
    pub fn register_dataset(&self, name: &str) -> Result<i64, WarehouseError> {
        self.with_conn(|conn| {
            let dataset_id = next_id(conn, "dataset_id_seq")?;
            conn.execute(
                "INSERT INTO datasets (dataset_id, name, created_at) VALUES (?1, ?2, ?3)",
                params![dataset_id, name, now_rfc3339()],
            )?;
            tracing::debug!(dataset_id, name, "registered dataset");
            Ok(dataset_id)
        })
    }

    /// Materialize a frame as a new immutable version of a dataset.
    ///
    /// The physical table and its metadata row are written in one
    /// transaction: either both exist afterwards or neither does.
    pub fn create_version(
        &self,
        dataset_id: i64,
        frame: &Frame,
        source_filename: &str,
        recipe_descriptor: &str,
    ) -> Result<i64, WarehouseError> {
        self.with_conn(|conn| {
            let known: i64 = conn.query_row(
                "SELECT COUNT(*) FROM datasets WHERE dataset_id = ?1",
                params![dataset_id],
                |row| row.get(0),
            )?;
            if known == 0 {
                return Err(WarehouseError::NotFound(format!("dataset {dataset_id}")));
            }

            conn.execute_batch("BEGIN TRANSACTION")?;
            let result = (|| {
                let version_id = next_id(conn, "version_id_seq")?;
                let table_reference = format!("ds{dataset_id}_v{version_id}");
                // Collided column names are deduplicated at materialization,
                // so the stored count must come from the physical table.
                let physical_cols = materialize(conn, &table_reference, frame)?;
                conn.execute(
                    "INSERT INTO dataset_versions
                     (version_id, dataset_id, table_reference, source_filename,
                      recipe_descriptor, row_count, col_count, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        version_id,
                        dataset_id,
                        table_reference,
                        source_filename,
                        recipe_descriptor,
                        frame.row_count() as i64,
                        physical_cols as i64,
                        now_rfc3339(),
                    ],
                )?;
                Ok(version_id)
            })();

            match result {
                Ok(version_id) => {
                    conn.execute_batch("COMMIT")?;
                    tracing::debug!(dataset_id, version_id, "created dataset version");
                    Ok(version_id)
                }
                Err(err) => {
                    // Leave no half-written version behind.
                    let _ = conn.execute_batch("ROLLBACK");
                    Err(err)
                }
            }
        })
    }

    /// All datasets, newest first.
    pub fn list_datasets(&self) -> Result<Vec<Dataset>, WarehouseError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT dataset_id, name, created_at FROM datasets ORDER BY dataset_id DESC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(Dataset {
                    dataset_id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })?;
            let mut datasets = Vec::new();
            for row in rows {
                datasets.push(row?);
            }
            Ok(datasets)
        })
    }

    /// All versions of a dataset, newest first.
    pub fn list_versions(&self, dataset_id: i64) -> Result<Vec<DatasetVersion>, WarehouseError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT version_id, dataset_id, table_reference, source_filename,
                        recipe_descriptor, row_count, col_count, created_at
                 FROM dataset_versions
                 WHERE dataset_id = ?1
                 ORDER BY version_id DESC",
            )?;
            let rows = stmt.query_map(params![dataset_id], |row| {
                Ok(DatasetVersion {
                    version_id: row.get(0)?,
                    dataset_id: row.get(1)?,
                    table_reference: row.get(2)?,
                    source_filename: row.get(3)?,
                    recipe_descriptor: row.get(4)?,
                    row_count: row.get(5)?,
                    col_count: row.get(6)?,
                    created_at: row.get(7)?,
                })
            })?;
            let mut versions = Vec::new();
            for row in rows {
                versions.push(row?);
            }
            Ok(versions)
        })
    }

    /// Table reference of the most recently created version. Version ids
    /// come from one sequence, so id order is creation order.
    pub fn active_table(&self, dataset_id: i64) -> Result<String, WarehouseError> {
        self.with_conn(|conn| {
            let result = conn.query_row(
                "SELECT table_reference FROM dataset_versions
                 WHERE dataset_id = ?1
                 ORDER BY version_id DESC
                 LIMIT 1",
                params![dataset_id],
                |row| row.get(0),
            );
            match result {
                Ok(table) => Ok(table),
                Err(duckdb::Error::QueryReturnedNoRows) => Err(WarehouseError::NotFound(format!(
                    "no versions for dataset {dataset_id}"
                ))),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Table reference for an explicitly chosen version. A read-only
    /// selection: it does not change which version is active.
    pub fn version_table(
        &self,
        dataset_id: i64,
        version_id: i64,
    ) -> Result<String, WarehouseError> {
        self.with_conn(|conn| {
            let result = conn.query_row(
                "SELECT table_reference FROM dataset_versions
                 WHERE dataset_id = ?1 AND version_id = ?2",
                params![dataset_id, version_id],
                |row| row.get(0),
            );
            match result {
                Ok(table) => Ok(table),
                Err(duckdb::Error::QueryReturnedNoRows) => Err(WarehouseError::NotFound(format!(
                    "version {version_id} of dataset {dataset_id}"
                ))),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Execute a read query and materialize the result.
    ///
    /// The single privileged choke point: query text originating outside the
    /// core must pass the safety gate before it reaches this method.
    /// Warehouse-controlled text (a `SELECT * FROM <reference> LIMIT n`
    /// built from our own table references) may call it directly.
    pub fn query(&self, sql: &str) -> Result<Frame, WarehouseError> {
        self.with_conn(|conn| {
            tracing::debug!(sql, "executing warehouse query");
            let mut stmt = conn
                .prepare(sql)
                .map_err(|e| WarehouseError::Query(e.to_string()))?;
            let mut rows = stmt
                .query([])
                .map_err(|e| WarehouseError::Query(e.to_string()))?;

            let column_count = rows.as_ref().map(|r| r.column_count()).unwrap_or(0);
            let column_names: Vec<String> = (0..column_count)
                .map(|i| {
                    rows.as_ref()
                        .and_then(|r| r.column_name(i).ok())
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| format!("col{i}"))
                })
                .collect();

            let mut columns: Vec<Vec<Value>> = vec![Vec::new(); column_count];
            while let Some(row) = rows
                .next()
                .map_err(|e| WarehouseError::Query(e.to_string()))?
            {
                for (i, column) in columns.iter_mut().enumerate() {
                    let value: DbValue = row
                        .get(i)
                        .map_err(|e| WarehouseError::Query(e.to_string()))?;
                    column.push(from_db_value(value));
                }
            }

            Ok(Frame::from_columns(
                column_names
                    .into_iter()
                    .zip(columns)
                    .map(|(name, values)| Column::new(name, values))
                    .collect(),
            ))
        })
    }

    /// Convenience read of an entire version table, bounded by `limit`.
    pub fn read_table(&self, table_reference: &str, limit: usize) -> Result<Frame, WarehouseError> {
        self.query(&format!(
            "SELECT * FROM {table_reference} LIMIT {limit}"
        ))
    }

    // ---- projects ----

    /// Create a project and return its id.
    pub fn create_project(
        &self,
        name: &str,
        objective: &str,
        dataset_id: Option<i64>,
    ) -> Result<i64, WarehouseError> {
        self.with_conn(|conn| {
            let project_id = next_id(conn, "project_id_seq")?;
            let now = now_rfc3339();
            conn.execute(
                "INSERT INTO projects (project_id, name, objective, dataset_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![project_id, name, objective, dataset_id, now, now],
            )?;
            Ok(project_id)
        })
    }

    /// All projects, most recently updated first.
    pub fn list_projects(&self) -> Result<Vec<Project>, WarehouseError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT project_id, name, objective, dataset_id, created_at, updated_at
                 FROM projects ORDER BY updated_at DESC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(Project {
                    project_id: row.get(0)?,
                    name: row.get(1)?,
                    objective: row.get(2)?,
                    dataset_id: row.get(3)?,
                    created_at: row.get(4)?,
                    updated_at: row.get(5)?,
                })
            })?;
            let mut projects = Vec::new();
            for row in rows {
                projects.push(row?);
            }
            Ok(projects)
        })
    }

    /// Update a project in place (last write wins).
    pub fn update_project(
        &self,
        project_id: i64,
        name: &str,
        objective: &str,
        dataset_id: Option<i64>,
    ) -> Result<(), WarehouseError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE projects SET name = ?2, objective = ?3, dataset_id = ?4, updated_at = ?5
                 WHERE project_id = ?1",
                params![project_id, name, objective, dataset_id, now_rfc3339()],
            )?;
            if changed == 0 {
                return Err(WarehouseError::NotFound(format!("project {project_id}")));
            }
            Ok(())
        })
    }

    // ---- reports ----

    /// Save a markdown report under a project and return its id.
    pub fn save_report(
        &self,
        project_id: i64,
        title: &str,
        markdown: &str,
    ) -> Result<i64, WarehouseError> {
        self.with_conn(|conn| {
            let known: i64 = conn.query_row(
                "SELECT COUNT(*) FROM projects WHERE project_id = ?1",
                params![project_id],
                |row| row.get(0),
            )?;
            if known == 0 {
                return Err(WarehouseError::NotFound(format!("project {project_id}")));
            }
            let report_id = next_id(conn, "report_id_seq")?;
            conn.execute(
                "INSERT INTO reports (report_id, project_id, title, markdown, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![report_id, project_id, title, markdown, now_rfc3339()],
            )?;
            Ok(report_id)
        })
    }

    /// Reports under a project, newest first.
    pub fn list_reports(&self, project_id: i64) -> Result<Vec<Report>, WarehouseError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT report_id, project_id, title, markdown, created_at
                 FROM reports WHERE project_id = ?1 ORDER BY report_id DESC",
            )?;
            let rows = stmt.query_map(params![project_id], |row| {
                Ok(Report {
                    report_id: row.get(0)?,
                    project_id: row.get(1)?,
                    title: row.get(2)?,
                    markdown: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?;
            let mut reports = Vec::new();
            for row in rows {
                reports.push(row?);
            }
            Ok(reports)
        })
    }

    /// Fetch a single report.
    pub fn get_report(&self, report_id: i64) -> Result<Option<Report>, WarehouseError> {
        self.with_conn(|conn| {
            let result = conn.query_row(
                "SELECT report_id, project_id, title, markdown, created_at
                 FROM reports WHERE report_id = ?1",
                params![report_id],
                |row| {
                    Ok(Report {
                        report_id: row.get(0)?,
                        project_id: row.get(1)?,
                        title: row.get(2)?,
                        markdown: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            );
            match result {
                Ok(report) => Ok(Some(report)),
                Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }
}

/// Fixed-width RFC 3339 timestamp, so lexicographic order is time order.
fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Draw the next id from a storage-side sequence (atomic, never reused).
fn next_id(conn: &Connection, sequence: &str) -> Result<i64, WarehouseError> {
    let id: i64 = conn.query_row(&format!("SELECT nextval('{sequence}')"), [], |row| {
        row.get(0)
    })?;
    Ok(id)
}

/// Create and fill the physical table backing a version.
fn materialize(
    conn: &Connection,
    table_reference: &str,
    frame: &Frame,
) -> Result<usize, WarehouseError> {
    // Names that collided after normalization materialize as the last
    // occurrence, matching the frame's schema-read policy.
    let mut kept: Vec<&Column> = Vec::new();
    for column in frame.columns() {
        if let Some(pos) = kept.iter().position(|k| k.name == column.name) {
            kept[pos] = column;
        } else {
            kept.push(column);
        }
    }

    let column_defs: Vec<String> = kept
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), sql_type(c.dtype())))
        .collect();
    conn.execute_batch(&format!(
        "CREATE TABLE {table_reference} ({})",
        column_defs.join(", ")
    ))?;

    if kept.is_empty() || frame.row_count() == 0 {
        return Ok(kept.len());
    }

    let placeholders: Vec<String> = (1..=kept.len()).map(|i| format!("?{i}")).collect();
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {table_reference} VALUES ({})",
        placeholders.join(", ")
    ))?;
    for i in 0..frame.row_count() {
        let row: Vec<DbValue> = kept.iter().map(|c| to_db_value(&c.values[i])).collect();
        stmt.execute(params_from_iter(row))?;
    }
    Ok(kept.len())
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sql_type(dtype: DataType) -> &'static str {
    match dtype {
        DataType::Bool => "BOOLEAN",
        DataType::Int => "BIGINT",
        DataType::Float => "DOUBLE",
        DataType::Timestamp => "TIMESTAMP",
        DataType::Text | DataType::Null => "VARCHAR",
    }
}

fn to_db_value(value: &Value) -> DbValue {
    match value {
        Value::Null => DbValue::Null,
        Value::Bool(b) => DbValue::Boolean(*b),
        Value::Int(v) => DbValue::BigInt(*v),
        Value::Float(v) => DbValue::Double(*v),
        Value::Text(s) => DbValue::Text(s.clone()),
        Value::Timestamp(ts) => {
            DbValue::Timestamp(TimeUnit::Microsecond, ts.and_utc().timestamp_micros())
        }
    }
}

fn from_db_value(value: DbValue) -> Value {
    match value {
        DbValue::Null => Value::Null,
        DbValue::Boolean(b) => Value::Bool(b),
        DbValue::TinyInt(v) => Value::Int(v as i64),
        DbValue::SmallInt(v) => Value::Int(v as i64),
        DbValue::Int(v) => Value::Int(v as i64),
        DbValue::BigInt(v) => Value::Int(v),
        DbValue::HugeInt(v) => i64::try_from(v)
            .map(Value::Int)
            .unwrap_or(Value::Float(v as f64)),
        DbValue::UTinyInt(v) => Value::Int(v as i64),
        DbValue::USmallInt(v) => Value::Int(v as i64),
        DbValue::UInt(v) => Value::Int(v as i64),
        DbValue::UBigInt(v) => i64::try_from(v)
            .map(Value::Int)
            .unwrap_or(Value::Float(v as f64)),
        DbValue::Float(v) => Value::Float(v as f64),
        DbValue::Double(v) => Value::Float(v),
        DbValue::Decimal(d) => d
            .to_string()
            .parse::<f64>()
            .map(Value::Float)
            .unwrap_or(Value::Null),
        DbValue::Text(s) => Value::Text(s),
        DbValue::Timestamp(unit, v) => timestamp_from(unit, v)
            .map(Value::Timestamp)
            .unwrap_or(Value::Null),
        DbValue::Date32(days) => DateTime::from_timestamp(days as i64 * 86_400, 0)
            .map(|dt| Value::Timestamp(dt.naive_utc()))
            .unwrap_or(Value::Null),
        other => Value::Text(format!("{other:?}")),
    }
}

fn timestamp_from(unit: TimeUnit, v: i64) -> Option<chrono::NaiveDateTime> {
    let (secs, nanos) = match unit {
        TimeUnit::Second => (v, 0u32),
        TimeUnit::Millisecond => (v.div_euclid(1_000), (v.rem_euclid(1_000) * 1_000_000) as u32),
        TimeUnit::Microsecond => (v.div_euclid(1_000_000), (v.rem_euclid(1_000_000) * 1_000) as u32),
        TimeUnit::Nanosecond => (v.div_euclid(1_000_000_000), v.rem_euclid(1_000_000_000) as u32),
    };
    DateTime::from_timestamp(secs, nanos).map(|dt| dt.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame::new(vec![
            Column::new("id", vec![Value::Int(1), Value::Int(2)]),
            Column::new(
                "city",
                vec![Value::Text("Oslo".into()), Value::Null],
            ),
            Column::new("score", vec![Value::Float(1.5), Value::Float(2.5)]),
        ])
        .unwrap()
    }

    #[test]
    fn test_register_and_list() {
        let wh = Warehouse::memory().unwrap();
        wh.init().unwrap();
        let a = wh.register_dataset("first").unwrap();
        let b = wh.register_dataset("second").unwrap();
        assert!(b > a);
        let datasets = wh.list_datasets().unwrap();
        assert_eq!(datasets.len(), 2);
        assert_eq!(datasets[0].name, "second");
    }

    #[test]
    fn test_version_round_trip() {
        let wh = Warehouse::memory().unwrap();
        wh.init().unwrap();
        let ds = wh.register_dataset("sales").unwrap();
        let v = wh.create_version(ds, &frame(), "sales.csv", "[]").unwrap();

        let table = wh.active_table(ds).unwrap();
        assert_eq!(table, format!("ds{ds}_v{v}"));

        let out = wh.read_table(&table, 100).unwrap();
        assert_eq!(out.row_count(), 2);
        assert_eq!(out.column("id").unwrap().values[0], Value::Int(1));
        assert_eq!(out.column("city").unwrap().values[1], Value::Null);
        assert_eq!(out.column("score").unwrap().values[1], Value::Float(2.5));
    }

    #[test]
    fn test_create_version_unknown_dataset() {
        let wh = Warehouse::memory().unwrap();
        wh.init().unwrap();
        let err = wh.create_version(999, &frame(), "x.csv", "[]");
        assert!(matches!(err, Err(WarehouseError::NotFound(_))));
    }

    #[test]
    fn test_active_table_requires_versions() {
        let wh = Warehouse::memory().unwrap();
        wh.init().unwrap();
        let ds = wh.register_dataset("empty").unwrap();
        assert!(matches!(
            wh.active_table(ds),
            Err(WarehouseError::NotFound(_))
        ));
    }

    #[test]
    fn test_timestamp_round_trip() {
        let ts = chrono::NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        let wh = Warehouse::memory().unwrap();
        wh.init().unwrap();
        let ds = wh.register_dataset("events").unwrap();
        let f = Frame::new(vec![Column::new(
            "event_time",
            vec![Value::Timestamp(ts), Value::Null],
        )])
        .unwrap();
        let v = wh.create_version(ds, &f, "events.csv", "[]").unwrap();
        let out = wh
            .read_table(&wh.version_table(ds, v).unwrap(), 10)
            .unwrap();
        assert_eq!(out.column("event_time").unwrap().values[0], Value::Timestamp(ts));
        assert_eq!(out.column("event_time").unwrap().values[1], Value::Null);
    }

    #[test]
    fn test_query_error_surfaces() {
        let wh = Warehouse::memory().unwrap();
        wh.init().unwrap();
        assert!(matches!(
            wh.query("SELECT * FROM nope"),
            Err(WarehouseError::Query(_))
        ));
    }
}
