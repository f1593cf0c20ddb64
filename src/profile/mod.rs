//! Read-only profiling and quality analysis
//!
//! Statistical summaries over a frame; nothing here mutates its input. The
//! report structs serialize so the presentation layer can render them
//! directly.

use std::collections::HashSet;

use serde::Serialize;

use crate::frame::{Column, Frame};

/// Outlier scanning is bounded to the first N numeric columns so wide
/// tables stay cheap to check.
const OUTLIER_COLUMN_CAP: usize = 10;

/// Per-column slice of a [`TableProfile`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnProfile {
    pub name: String,
    pub dtype: &'static str,
    pub missing_pct: f64,
    pub distinct_count: usize,
}

/// Lightweight table summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableProfile {
    pub row_count: usize,
    pub column_count: usize,
    pub columns: Vec<ColumnProfile>,
}

/// Missingness detail for one column.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnQuality {
    pub name: String,
    pub missing_count: usize,
    pub missing_pct: f64,
}

/// IQR outlier count for one numeric column.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlierCount {
    pub column: String,
    pub count: usize,
}

/// Quality checks: duplicates, missingness, and IQR outliers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityReport {
    pub row_count: usize,
    pub column_count: usize,
    pub duplicate_row_count: usize,
    pub columns: Vec<ColumnQuality>,
    pub outliers: Vec<OutlierCount>,
}

/// Summarize row/column counts, per-column missingness, dtypes, and
/// cardinality. An empty table profiles as zero rows with 0.0 missing
/// everywhere rather than failing.
pub fn basic_profile(frame: &Frame) -> TableProfile {
    let rows = frame.row_count();
    let columns = frame
        .columns()
        .iter()
        .map(|c| ColumnProfile {
            name: c.name.clone(),
            dtype: c.dtype().name(),
            missing_pct: missing_pct(c.null_count(), rows),
            distinct_count: distinct_count(c),
        })
        .collect();
    TableProfile {
        row_count: rows,
        column_count: frame.column_count(),
        columns,
    }
}

/// Duplicate rows, per-column missing detail, and an IQR outlier scan over
/// the first ten numeric columns in column order.
pub fn quality_report(frame: &Frame) -> QualityReport {
    let rows = frame.row_count();
    let columns = frame
        .columns()
        .iter()
        .map(|c| {
            let missing = c.null_count();
            ColumnQuality {
                name: c.name.clone(),
                missing_count: missing,
                missing_pct: missing_pct(missing, rows),
            }
        })
        .collect();

    let outliers = frame
        .columns()
        .iter()
        .filter(|c| c.is_numeric())
        .take(OUTLIER_COLUMN_CAP)
        .filter_map(|c| {
            iqr_outlier_count(c).map(|count| OutlierCount {
                column: c.name.clone(),
                count,
            })
        })
        .collect();

    QualityReport {
        row_count: rows,
        column_count: frame.column_count(),
        duplicate_row_count: duplicate_row_count(frame),
        columns,
        outliers,
    }
}

fn missing_pct(nulls: usize, rows: usize) -> f64 {
    if rows == 0 {
        0.0
    } else {
        nulls as f64 / rows as f64 * 100.0
    }
}

fn distinct_count(column: &Column) -> usize {
    let mut seen = HashSet::new();
    for v in &column.values {
        if !v.is_null() {
            seen.insert(format!("{v:?}"));
        }
    }
    seen.len()
}

fn duplicate_row_count(frame: &Frame) -> usize {
    let mut seen = HashSet::new();
    let mut duplicates = 0;
    for i in 0..frame.row_count() {
        if !seen.insert(frame.row_signature(i)) {
            duplicates += 1;
        }
    }
    duplicates
}

/// Count values outside [Q1 - 1.5·IQR, Q3 + 1.5·IQR]. Returns None when the
/// column has no non-null values or when the IQR is zero (no outliers are
/// defined when the middle half is a single value).
fn iqr_outlier_count(column: &Column) -> Option<usize> {
    let mut values: Vec<f64> = column.values.iter().filter_map(|v| v.as_f64()).collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let q1 = quantile(&values, 0.25);
    let q3 = quantile(&values, 0.75);
    let iqr = q3 - q1;
    if iqr == 0.0 {
        return None;
    }
    let low = q1 - 1.5 * iqr;
    let high = q3 + 1.5 * iqr;
    Some(values.iter().filter(|&&v| v < low || v > high).count())
}

/// Quantile by linear interpolation between closest ranks, over sorted
/// input.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let rank = q * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let frac = rank - lower as f64;
    sorted[lower] + frac * (sorted[upper] - sorted[lower])
}
