//! CSV ingestion boundary
//!
//! Decodes delimited text into a [`Frame`] with inferred per-column types.
//! Malformed input fails here, before anything reaches the warehouse; the
//! core never sees a partially parsed table. Spreadsheet decoding is handled
//! by a separate collaborator and is not part of this boundary.

use std::io::Read;

use thiserror::Error;

use crate::frame::{Column, DataType, Frame, Value};

/// Errors raised while decoding an upload.
#[derive(Error, Debug)]
pub enum IngestError {
    /// CSV decoding error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Input had no header row
    #[error("input has no header row")]
    EmptyInput,
}

/// Read delimited text into a frame.
///
/// Headers are required. Cell types are inferred per column by widening
/// across all values: Int widens to Float on a mix, anything else collapses
/// to Text. Empty cells become nulls. Timestamps are left as text here;
/// date detection is a recipe operation with its own rule.
pub fn read_csv<R: Read>(reader: R) -> Result<Frame, IngestError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::None)
        .from_reader(reader);

    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
    if headers.is_empty() {
        return Err(IngestError::EmptyInput);
    }

    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in rdr.records() {
        let record = record?;
        for (i, cell) in cells.iter_mut().enumerate() {
            cell.push(record.get(i).unwrap_or("").to_string());
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, raw)| {
            let dtype = infer_column_type(&raw);
            let values = raw.iter().map(|cell| coerce(cell, dtype)).collect();
            Column::new(name, values)
        })
        .collect();

    Ok(Frame::from_columns(columns))
}

/// Widen over every non-empty cell to pick the column type.
fn infer_column_type(raw: &[String]) -> DataType {
    let mut dtype = DataType::Null;
    for cell in raw {
        if cell.is_empty() {
            continue;
        }
        let observed = if cell.parse::<i64>().is_ok() {
            DataType::Int
        } else if cell.parse::<f64>().is_ok() {
            DataType::Float
        } else if cell.eq_ignore_ascii_case("true") || cell.eq_ignore_ascii_case("false") {
            DataType::Bool
        } else {
            DataType::Text
        };
        dtype = merge(dtype, observed);
    }
    dtype
}

fn merge(a: DataType, b: DataType) -> DataType {
    match (a, b) {
        (x, y) if x == y => x,
        (DataType::Null, y) => y,
        (x, DataType::Null) => x,
        (DataType::Int, DataType::Float) | (DataType::Float, DataType::Int) => DataType::Float,
        _ => DataType::Text,
    }
}

fn coerce(cell: &str, dtype: DataType) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    match dtype {
        DataType::Int => cell.parse::<i64>().map(Value::Int).unwrap_or(Value::Null),
        DataType::Float => cell.parse::<f64>().map(Value::Float).unwrap_or(Value::Null),
        DataType::Bool => Value::Bool(cell.eq_ignore_ascii_case("true")),
        _ => Value::Text(cell.to_string()),
    }
}
