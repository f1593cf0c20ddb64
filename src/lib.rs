//! Dataset workbench core
//!
//! Provides the pieces behind a tabular-data workbench:
//! - An in-memory table abstraction (frames) and a CSV ingestion boundary
//! - A versioned dataset warehouse on an embedded analytical store
//! - Declarative cleaning/feature recipes with persisted provenance
//! - Read-only profiling and quality analysis
//! - A SQL safety gate for externally generated query text
//! - A never-failing natural-language-to-query bridge
//!
//! Control flow for a typical interaction: ingest a file into a frame,
//! register a dataset and create its raw version, apply a recipe and create
//! a derived version, profile the active version, and answer questions by
//! running bridge-produced queries through the safety gate before the
//! warehouse executes them.

pub mod bridge;
pub mod frame;
pub mod ingest;
pub mod profile;
pub mod recipe;
pub mod sql_safety;
pub mod warehouse;

// Re-export commonly used types
pub use bridge::{ChartKind, ChartSpec, ChatClient, Plan, ReasoningClient};
pub use frame::{Column, DataType, Frame, FrameError, Value};
pub use ingest::{read_csv, IngestError};
pub use profile::{basic_profile, quality_report, QualityReport, TableProfile};
pub use recipe::{Op, Recipe, RecipeError};
pub use sql_safety::{check_sql, enforce_limit, UnsafeQuery, DEFAULT_ROW_LIMIT};
pub use warehouse::{Dataset, DatasetVersion, Project, Report, Warehouse, WarehouseError};
