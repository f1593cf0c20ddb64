//! Transform operation implementations
//!
//! Each function reads one frame and builds a new one. Per-cell problems
//! (an unparseable date, a non-numeric cell in a numeric column) degrade to
//! nulls so a best-effort transform completes instead of aborting.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

use crate::frame::{Column, DataType, Frame, Value};

/// Suffix for missing-flag companion columns.
pub const MISSING_SUFFIX: &str = "__is_missing";
/// Suffix for log1p companion columns.
pub const LOG1P_SUFFIX: &str = "__log1p";
/// Suffix for z-score companion columns.
pub const ZSCORE_SUFFIX: &str = "__z";

/// How many non-null values the date detector samples per column.
const DATE_SAMPLE: usize = 200;

pub(super) fn normalize_columns(frame: &Frame) -> Frame {
    Frame::from_columns(
        frame
            .columns()
            .iter()
            .map(|c| {
                let name: String = c
                    .name
                    .trim()
                    .to_lowercase()
                    .chars()
                    .map(|ch| if ch.is_whitespace() { '_' } else { ch })
                    .collect();
                Column::new(name, c.values.clone())
            })
            .collect(),
    )
}

pub(super) fn trim_strings(frame: &Frame) -> Frame {
    Frame::from_columns(
        frame
            .columns()
            .iter()
            .map(|c| {
                if c.dtype() != DataType::Text {
                    return c.clone();
                }
                let values = c
                    .values
                    .iter()
                    .map(|v| match v {
                        Value::Text(s) => Value::Text(s.trim().to_string()),
                        other => other.clone(),
                    })
                    .collect();
                Column::new(c.name.clone(), values)
            })
            .collect(),
    )
}

pub(super) fn drop_duplicate_rows(frame: &Frame) -> Frame {
    let mut seen = HashSet::new();
    let mut keep = Vec::new();
    for i in 0..frame.row_count() {
        if seen.insert(frame.row_signature(i)) {
            keep.push(i);
        }
    }
    Frame::from_columns(
        frame
            .columns()
            .iter()
            .map(|c| {
                Column::new(
                    c.name.clone(),
                    keep.iter().map(|&i| c.values[i].clone()).collect(),
                )
            })
            .collect(),
    )
}

pub(super) fn parse_dates_best_effort(frame: &Frame) -> Frame {
    Frame::from_columns(
        frame
            .columns()
            .iter()
            .map(|c| {
                if !looks_like_date_column(&c.name) || c.dtype() == DataType::Timestamp {
                    return c.clone();
                }
                let sample: Vec<&Value> = c
                    .values
                    .iter()
                    .filter(|v| !v.is_null())
                    .take(DATE_SAMPLE)
                    .collect();
                if sample.is_empty() {
                    return c.clone();
                }
                let parsed = sample.iter().filter(|v| parse_cell(v).is_some()).count();
                // Convert only when at least half of the sample parses.
                if parsed * 2 < sample.len() {
                    return c.clone();
                }
                let values = c
                    .values
                    .iter()
                    .map(|v| {
                        if v.is_null() {
                            Value::Null
                        } else {
                            parse_cell(v).map(Value::Timestamp).unwrap_or(Value::Null)
                        }
                    })
                    .collect();
                Column::new(c.name.clone(), values)
            })
            .collect(),
    )
}

pub(super) fn expand_date_parts(frame: &Frame) -> Frame {
    let mut columns: Vec<Column> = frame.columns().to_vec();
    for c in frame.columns() {
        if c.dtype() != DataType::Timestamp {
            continue;
        }
        let part = |f: fn(&NaiveDateTime) -> i64| -> Vec<Value> {
            c.values
                .iter()
                .map(|v| match v {
                    Value::Timestamp(ts) => Value::Int(f(ts)),
                    _ => Value::Null,
                })
                .collect()
        };
        columns.push(Column::new(
            format!("{}__year", c.name),
            part(|ts| ts.year() as i64),
        ));
        columns.push(Column::new(
            format!("{}__month", c.name),
            part(|ts| ts.month() as i64),
        ));
        // 0 = Monday, matching ISO weekday numbering shifted to zero-based.
        columns.push(Column::new(
            format!("{}__dow", c.name),
            part(|ts| ts.weekday().num_days_from_monday() as i64),
        ));
    }
    Frame::from_columns(columns)
}

pub(super) fn add_missing_flags(frame: &Frame) -> Frame {
    let mut columns: Vec<Column> = frame.columns().to_vec();
    for c in frame.columns() {
        columns.push(Column::new(
            format!("{}{}", c.name, MISSING_SUFFIX),
            c.values.iter().map(|v| Value::Bool(v.is_null())).collect(),
        ));
    }
    Frame::from_columns(columns)
}

pub(super) fn add_simple_numeric_features(frame: &Frame) -> Frame {
    let mut columns: Vec<Column> = frame.columns().to_vec();
    for c in frame.columns() {
        if !c.is_numeric() {
            continue;
        }
        let numeric: Vec<Option<f64>> = c.values.iter().map(|v| v.as_f64()).collect();
        let present: Vec<f64> = numeric.iter().filter_map(|v| *v).collect();
        if present.is_empty() {
            continue;
        }

        if present.iter().all(|&v| v > 0.0) {
            columns.push(Column::new(
                format!("{}{}", c.name, LOG1P_SUFFIX),
                numeric
                    .iter()
                    .map(|v| v.map(|x| Value::Float(x.ln_1p())).unwrap_or(Value::Null))
                    .collect(),
            ));
        }

        let mean = present.iter().sum::<f64>() / present.len() as f64;
        let std = sample_std(&present, mean);
        // Zero spread leaves the z-score undefined; skip rather than divide.
        if std > 0.0 {
            columns.push(Column::new(
                format!("{}{}", c.name, ZSCORE_SUFFIX),
                numeric
                    .iter()
                    .map(|v| {
                        v.map(|x| Value::Float((x - mean) / std))
                            .unwrap_or(Value::Null)
                    })
                    .collect(),
            ));
        }
    }
    Frame::from_columns(columns)
}

/// Sample standard deviation (ddof = 1), 0.0 below two observations.
fn sample_std(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Date detection rule: the column name must contain "date" or "time",
/// case-insensitive. Content alone never qualifies a column.
fn looks_like_date_column(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("date") || lower.contains("time")
}

fn parse_cell(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Text(s) => parse_timestamp(s.trim()),
        Value::Timestamp(ts) => Some(*ts),
        _ => None,
    }
}

/// Best-effort timestamp parsing over the formats uploads carry in practice.
pub(crate) fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in ["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}
