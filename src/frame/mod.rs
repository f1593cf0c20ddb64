//! In-memory table abstraction
//!
//! Every component of the workbench operates on a [`Frame`]: an ordered list
//! of named columns holding loosely typed values. Column order is
//! authoritative and stable, which is what makes recipe application
//! byte-for-byte reproducible. Frames are value types; transforms read one
//! frame and build a new one, nothing edits in place.

use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Whether this cell is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the cell, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Render the cell the way it appears in a CSV sample.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Text(s) => s.clone(),
            Value::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// Column type derived by scanning values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Null,
    Bool,
    Int,
    Float,
    Text,
    Timestamp,
}

impl DataType {
    /// JSON-facing type name.
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Null => "null",
            DataType::Bool => "bool",
            DataType::Int => "int",
            DataType::Float => "float",
            DataType::Text => "text",
            DataType::Timestamp => "timestamp",
        }
    }

    fn of(value: &Value) -> DataType {
        match value {
            Value::Null => DataType::Null,
            Value::Bool(_) => DataType::Bool,
            Value::Int(_) => DataType::Int,
            Value::Float(_) => DataType::Float,
            Value::Text(_) => DataType::Text,
            Value::Timestamp(_) => DataType::Timestamp,
        }
    }

    /// Widen two observed cell types into one column type. Int widens to
    /// Float on a mix; any other disagreement collapses to Text.
    fn merge(self, other: DataType) -> DataType {
        match (self, other) {
            (a, b) if a == b => a,
            (DataType::Null, b) => b,
            (a, DataType::Null) => a,
            (DataType::Int, DataType::Float) | (DataType::Float, DataType::Int) => DataType::Float,
            _ => DataType::Text,
        }
    }
}

/// A named column of values.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Column type, widened across all non-null values.
    pub fn dtype(&self) -> DataType {
        self.values
            .iter()
            .map(DataType::of)
            .fold(DataType::Null, DataType::merge)
    }

    /// Whether the column carries Int or Float values.
    pub fn is_numeric(&self) -> bool {
        matches!(self.dtype(), DataType::Int | DataType::Float)
    }

    /// Count of null cells.
    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }
}

/// Errors raised when assembling a frame from raw parts.
#[derive(Error, Debug)]
pub enum FrameError {
    /// Columns of unequal length cannot form a table
    #[error("column '{name}' has {len} values, expected {expected}")]
    RaggedColumns {
        name: String,
        len: usize,
        expected: usize,
    },
}

/// An ordered collection of equal-length columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    columns: Vec<Column>,
}

impl Frame {
    /// Build a frame, checking that every column has the same length.
    pub fn new(columns: Vec<Column>) -> Result<Self, FrameError> {
        if let Some(first) = columns.first() {
            let expected = first.values.len();
            for col in &columns {
                if col.values.len() != expected {
                    return Err(FrameError::RaggedColumns {
                        name: col.name.clone(),
                        len: col.values.len(),
                        expected,
                    });
                }
            }
        }
        Ok(Self { columns })
    }

    /// Build a frame from columns already known to be equal length.
    pub(crate) fn from_columns(columns: Vec<Column>) -> Self {
        debug_assert!(
            columns
                .windows(2)
                .all(|w| w[0].values.len() == w[1].values.len())
        );
        Self { columns }
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Look up a column by name. Duplicate names resolve to the last
    /// occurrence (the schema-read policy after column normalization).
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().rev().find(|c| c.name == name)
    }

    /// Column names in order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// First `n` rows as a new frame.
    pub fn head(&self, n: usize) -> Frame {
        Frame::from_columns(
            self.columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.values.iter().take(n).cloned().collect()))
                .collect(),
        )
    }

    /// One row as a vector of cell references.
    pub fn row(&self, index: usize) -> Vec<&Value> {
        self.columns.iter().map(|c| &c.values[index]).collect()
    }

    /// Stable textual signature of a row, used for duplicate detection.
    /// Debug formatting keeps NaN floats comparable to themselves.
    pub(crate) fn row_signature(&self, index: usize) -> String {
        let mut sig = String::new();
        for col in &self.columns {
            sig.push_str(&format!("{:?}\u{1f}", col.values[index]));
        }
        sig
    }

    /// Render up to `n` rows as CSV (header included), the sample shape the
    /// reasoning-service bridge sends outbound.
    pub fn to_sample_csv(&self, n: usize) -> String {
        let mut out = String::new();
        let header: Vec<String> = self.columns.iter().map(|c| csv_escape(&c.name)).collect();
        out.push_str(&header.join(","));
        out.push('\n');
        for i in 0..self.row_count().min(n) {
            let row: Vec<String> = self
                .columns
                .iter()
                .map(|c| csv_escape(&c.values[i].render()))
                .collect();
            out.push_str(&row.join(","));
            out.push('\n');
        }
        out
    }
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
