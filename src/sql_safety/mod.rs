//! SQL safety gate
//!
//! The last line of defense between an externally generated query string and
//! the warehouse's execution engine. A query is allowed through only when it
//! is read-only in shape: it must start with SELECT or WITH and must not
//! contain any mutating or DDL keyword anywhere. Keyword matching uses word
//! boundaries, so an identifier that merely contains a forbidden word (a
//! column named `created_ts`, say) does not trip the gate.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Default row ceiling applied to unbounded queries.
pub const DEFAULT_ROW_LIMIT: usize = 5000;

static FORBIDDEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(DROP|DELETE|UPDATE|INSERT|ALTER|TRUNCATE|CREATE|ATTACH|DETACH)\b")
        .expect("forbidden-keyword pattern is valid")
});

static HAS_LIMIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bLIMIT\s+\d+").expect("limit pattern is valid"));

/// Gate rejections, each naming the violation.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum UnsafeQuery {
    /// Empty or whitespace-only input
    #[error("empty SQL")]
    Empty,

    /// A mutating or DDL keyword was found
    #[error("forbidden SQL keyword: {keyword}")]
    Forbidden { keyword: String },

    /// The statement is not SELECT/WITH shaped
    #[error("only SELECT/WITH queries are allowed")]
    NotReadOnly,
}

/// Classify a query string. `Ok(())` means the statement is read-only in
/// shape and safe to hand to the warehouse (after limit enforcement).
pub fn check_sql(sql: &str) -> Result<(), UnsafeQuery> {
    let trimmed = sql.trim().trim_end_matches(';').trim();
    if trimmed.is_empty() {
        return Err(UnsafeQuery::Empty);
    }

    if let Some(m) = FORBIDDEN.find(trimmed) {
        return Err(UnsafeQuery::Forbidden {
            keyword: m.as_str().to_uppercase(),
        });
    }

    let upper = trimmed.to_uppercase();
    if !upper.starts_with("SELECT") && !upper.starts_with("WITH") {
        return Err(UnsafeQuery::NotReadOnly);
    }

    Ok(())
}

/// Append a `LIMIT` clause unless the query already carries one.
///
/// Heuristic guard against unbounded result materialization, not a
/// correctness guarantee: a LIMIT inside a subquery satisfies the check even
/// when the outer query is unbounded (known limitation).
pub fn enforce_limit(sql: &str, limit: usize) -> String {
    let trimmed = sql.trim().trim_end_matches(';').trim();
    if HAS_LIMIT.is_match(trimmed) {
        trimmed.to_string()
    } else {
        format!("{trimmed} LIMIT {limit}")
    }
}
