//! Metadata schema for the workbench store

/// DDL for the workbench metadata tables (DuckDB syntax).
///
/// Identifiers come from sequences, never from `max + 1`: a sequence never
/// hands out a previously issued value, so table references derived from
/// dataset and version ids cannot collide even if metadata rows were
/// removed out of band. Per-version physical tables are created dynamically
/// and are not part of this DDL.
pub struct WorkbenchSchema;

impl WorkbenchSchema {
    pub fn create_tables() -> &'static str {
        r#"
-- Registered datasets
CREATE TABLE IF NOT EXISTS datasets (
    dataset_id BIGINT PRIMARY KEY,
    name VARCHAR NOT NULL,
    created_at VARCHAR NOT NULL
);

-- Immutable dataset versions; activeness is derived from creation order,
-- never stored as a mutable pointer
CREATE TABLE IF NOT EXISTS dataset_versions (
    version_id BIGINT PRIMARY KEY,
    dataset_id BIGINT NOT NULL,
    table_reference VARCHAR NOT NULL UNIQUE,
    source_filename VARCHAR NOT NULL,
    recipe_descriptor VARCHAR NOT NULL,
    row_count BIGINT NOT NULL,
    col_count BIGINT NOT NULL,
    created_at VARCHAR NOT NULL
);

-- Workbench projects
CREATE TABLE IF NOT EXISTS projects (
    project_id BIGINT PRIMARY KEY,
    name VARCHAR NOT NULL,
    objective VARCHAR NOT NULL,
    dataset_id BIGINT,
    created_at VARCHAR NOT NULL,
    updated_at VARCHAR NOT NULL
);

-- Markdown reports bound to projects
CREATE TABLE IF NOT EXISTS reports (
    report_id BIGINT PRIMARY KEY,
    project_id BIGINT NOT NULL,
    title VARCHAR NOT NULL,
    markdown VARCHAR NOT NULL,
    created_at VARCHAR NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_versions_dataset ON dataset_versions(dataset_id);
CREATE INDEX IF NOT EXISTS idx_reports_project ON reports(project_id);

-- Atomic identifier allocation
CREATE SEQUENCE IF NOT EXISTS dataset_id_seq START 1;
CREATE SEQUENCE IF NOT EXISTS version_id_seq START 1;
CREATE SEQUENCE IF NOT EXISTS project_id_seq START 1;
CREATE SEQUENCE IF NOT EXISTS report_id_seq START 1;
"#
    }
}
