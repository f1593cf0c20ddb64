//! Error types for the reasoning-service bridge
//!
//! These never escape [`plan`](super::plan): every variant is absorbed into
//! a degraded plan whose `error` field carries the machine-readable cause.

use thiserror::Error;

/// Failures while obtaining a completion from the reasoning service.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Missing or invalid client configuration (no API key, bad URL)
    #[error("bridge configuration error: {0}")]
    Config(String),

    /// Failed to reach the reasoning service
    #[error("failed to reach reasoning service: {0}")]
    Connection(String),

    /// Request timed out
    #[error("reasoning request timed out after {0} seconds")]
    Timeout(u64),

    /// Service answered with a non-success status
    #[error("reasoning service error (HTTP {status}): {body}")]
    Http { status: u16, body: String },

    /// Response body was not the expected shape
    #[error("failed to parse reasoning response: {0}")]
    Parse(String),
}

impl BridgeError {
    /// Stable cause code surfaced in a degraded plan's `error` field.
    pub fn cause(&self) -> &'static str {
        match self {
            BridgeError::Config(_) => "config",
            BridgeError::Connection(_) => "connection",
            BridgeError::Timeout(_) => "timeout",
            BridgeError::Http { .. } => "http_error",
            BridgeError::Parse(_) => "parse_error",
        }
    }
}
