//! Error types for warehouse operations

use thiserror::Error;

/// Errors that can occur against the system of record.
#[derive(Error, Debug)]
pub enum WarehouseError {
    /// Referenced dataset/version/project/report does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The embedded store could not be opened or written
    #[error("storage error: {0}")]
    Storage(String),

    /// A query failed to execute
    #[error("query error: {0}")]
    Query(String),
}

impl From<duckdb::Error> for WarehouseError {
    fn from(err: duckdb::Error) -> Self {
        WarehouseError::Storage(err.to_string())
    }
}
