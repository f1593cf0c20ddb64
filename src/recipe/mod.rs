//! Declarative transform recipes
//!
//! A recipe is an ordered list of operations drawn from a closed registry.
//! The registry is an exhaustively matched enum, so a statically built
//! recipe can never name an unknown operation; [`RecipeError::UnknownOperation`]
//! can only come out of [`Recipe::from_json`] when a descriptor loaded from
//! storage names an operation this build does not know.
//!
//! Applied recipes are persisted verbatim alongside the version they
//! produced (the `[{"op":"normalize_columns"}, ...]` descriptor shape), so
//! any version's provenance is reproducible from its ancestor plus its
//! recipe.

mod ops;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frame::Frame;

/// Errors raised while decoding a stored recipe descriptor.
#[derive(Error, Debug)]
pub enum RecipeError {
    /// Descriptor names an operation outside the registry
    #[error("unknown recipe operation: {0}")]
    UnknownOperation(String),

    /// Descriptor is not a valid operation list
    #[error("malformed recipe descriptor: {0}")]
    Malformed(String),
}

/// One transform operation. Each is a pure table-to-table function;
/// data-shape problems inside a column degrade to nulls, never to errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    /// Lower-case, trim, and underscore-join column names. Names that
    /// collide after normalization are kept; schema reads resolve to the
    /// last occurrence (known limitation).
    NormalizeColumns,
    /// Strip leading/trailing whitespace in every text-typed column.
    TrimStrings,
    /// Drop rows that exactly duplicate an earlier row, keeping the first.
    DropDuplicateRows,
    /// Convert date-named columns to timestamps when at least half of a
    /// sample parses; unparseable cells become null.
    ParseDatesBestEffort,
    /// Append year/month/day-of-week companions for timestamp columns.
    ExpandDateParts,
    /// Append a boolean `__is_missing` companion for every column.
    AddMissingFlags,
    /// Append `__log1p` (all-positive columns) and `__z` (nonzero spread)
    /// companions for numeric columns.
    AddSimpleNumericFeatures,
}

impl Op {
    /// Apply this operation to a frame, producing a new frame.
    pub fn apply(&self, frame: &Frame) -> Frame {
        match self {
            Op::NormalizeColumns => ops::normalize_columns(frame),
            Op::TrimStrings => ops::trim_strings(frame),
            Op::DropDuplicateRows => ops::drop_duplicate_rows(frame),
            Op::ParseDatesBestEffort => ops::parse_dates_best_effort(frame),
            Op::ExpandDateParts => ops::expand_date_parts(frame),
            Op::AddMissingFlags => ops::add_missing_flags(frame),
            Op::AddSimpleNumericFeatures => ops::add_simple_numeric_features(frame),
        }
    }

    /// Registry name of this operation, as stored in descriptors.
    pub fn name(&self) -> &'static str {
        match self {
            Op::NormalizeColumns => "normalize_columns",
            Op::TrimStrings => "trim_strings",
            Op::DropDuplicateRows => "drop_duplicate_rows",
            Op::ParseDatesBestEffort => "parse_dates_best_effort",
            Op::ExpandDateParts => "expand_date_parts",
            Op::AddMissingFlags => "add_missing_flags",
            Op::AddSimpleNumericFeatures => "add_simple_numeric_features",
        }
    }
}

/// An ordered sequence of operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Recipe {
    steps: Vec<Op>,
}

impl Recipe {
    /// Build a recipe from explicit steps.
    pub fn new(steps: Vec<Op>) -> Self {
        Self { steps }
    }

    /// Empty recipe, the descriptor of a raw (uploaded) version.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Cleaning preset: normalize → trim → dedupe → parse dates.
    pub fn default_cleaning() -> Self {
        Self::new(vec![
            Op::NormalizeColumns,
            Op::TrimStrings,
            Op::DropDuplicateRows,
            Op::ParseDatesBestEffort,
        ])
    }

    /// Modeling-prep preset: normalize → parse dates → calendar parts →
    /// missing flags → derived numeric features.
    pub fn feature_prep() -> Self {
        Self::new(vec![
            Op::NormalizeColumns,
            Op::ParseDatesBestEffort,
            Op::ExpandDateParts,
            Op::AddMissingFlags,
            Op::AddSimpleNumericFeatures,
        ])
    }

    pub fn steps(&self) -> &[Op] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Execute each step in order, threading the output of one into the
    /// next. Deterministic: the same frame and recipe always produce the
    /// same output, column order included.
    pub fn apply(&self, frame: &Frame) -> Frame {
        let mut out = frame.clone();
        for step in &self.steps {
            tracing::debug!(op = step.name(), "applying recipe step");
            out = step.apply(&out);
        }
        out
    }

    /// Serialized descriptor, persisted alongside the version a recipe
    /// produced. Unit-variant tags cannot fail to serialize.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.steps).unwrap_or_else(|_| "[]".to_string())
    }

    /// Decode a stored descriptor. Fails closed: a step naming an operation
    /// outside the registry is an error, never a silent skip, since stored
    /// provenance depends on every named step actually having run.
    pub fn from_json(descriptor: &str) -> Result<Self, RecipeError> {
        match serde_json::from_str::<Vec<Op>>(descriptor) {
            Ok(steps) => Ok(Self { steps }),
            Err(err) => {
                // Name the offending operation when the shape is otherwise fine.
                if let Ok(raw) = serde_json::from_str::<Vec<serde_json::Value>>(descriptor) {
                    for step in raw {
                        if serde_json::from_value::<Op>(step.clone()).is_err() {
                            if let Some(name) = step.get("op").and_then(|v| v.as_str()) {
                                return Err(RecipeError::UnknownOperation(name.to_string()));
                            }
                        }
                    }
                }
                Err(RecipeError::Malformed(err.to_string()))
            }
        }
    }
}
