//! Structured error types for kd-observer
//!
//! Uses thiserror for ergonomic error definitions with automatic Display
//! and Error trait implementations. Only environmental failures live here:
//! malformed log content never produces an error.

use std::path::PathBuf;
use thiserror::Error;

/// All possible errors in kd-observer
#[derive(Error, Debug)]
pub enum KdError {
    /// Reading the event log failed for a reason other than "not found"
    #[error("Failed to read event log '{}': {source}", path.display())]
    EventLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Appending to the event log failed
    #[error("Failed to append to event log '{}': {source}", path.display())]
    Append {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A single bind attempt failed with something other than "address in use"
    #[error("Failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// Every port in the retry window was already taken
    #[error("No free port in {first}..={last} ({attempts} attempts)")]
    PortExhausted { first: u16, last: u16, attempts: u16 },

    /// The HTTP server stopped with an I/O error
    #[error("Web server error: {0}")]
    Serve(#[source] std::io::Error),

    /// Observer state store could not be written
    #[error("State store error at '{}': {reason}", path.display())]
    StateStore { path: PathBuf, reason: String },

    /// Terminal setup or restoration error
    #[error("Terminal error: {0}")]
    Terminal(#[source] std::io::Error),
}

/// Convenience Result type using KdError
pub type Result<T> = std::result::Result<T, KdError>;
