//! Error types for pgcompat operations.
//!
//! This module defines [`CompatError`], the primary error type used throughout
//! the harness, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Use `CompatError` for failures that stop a command or a runner
//! - A failed compatibility check is NOT an error: checks produce a
//!   [`CheckOutcome`](crate::checks::CheckOutcome) value instead
//! - Use `anyhow::Error` (via `CompatError::Other`) for unexpected errors

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for pgcompat operations.
#[derive(Debug, Error)]
pub enum CompatError {
    /// The container runtime is missing or its daemon cannot be reached.
    #[error("Container runtime unavailable ({runtime}): {message}")]
    RuntimeUnavailable { runtime: String, message: String },

    /// An external command ran but exited unsuccessfully.
    #[error("Command failed with exit code {code:?}: {command}{}", stderr_suffix(.stderr))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// An external command could not be started at all.
    #[error("Could not start '{program}': {message}")]
    CommandSpawn { program: String, message: String },

    /// The database rejected a connection or a query.
    #[error("Database error: {message}")]
    Database { message: String },

    /// A service did not become ready in time.
    #[error("{service} was not ready after {waited_secs}s")]
    ReadinessTimeout { service: String, waited_secs: u64 },

    /// Expectations file not found at the given location.
    #[error("Expectations file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse the expectations file.
    #[error("Failed to parse expectations at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// A runner tried to move its lifecycle backwards.
    #[error("Invalid run phase transition: {from} -> {to}")]
    InvalidPhaseTransition { from: String, to: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<postgres::Error> for CompatError {
    fn from(err: postgres::Error) -> Self {
        let message = match err.as_db_error() {
            Some(db) => format!("{}: {}", db.severity(), db.message()),
            None => err.to_string(),
        };
        CompatError::Database { message }
    }
}

impl From<reqwest::Error> for CompatError {
    fn from(err: reqwest::Error) -> Self {
        CompatError::Other(anyhow::Error::new(err))
    }
}

fn stderr_suffix(stderr: &str) -> String {
    match stderr.lines().last() {
        Some(line) if !line.trim().is_empty() => format!(" ({})", line.trim()),
        _ => String::new(),
    }
}

/// Result type alias for pgcompat operations.
pub type Result<T> = std::result::Result<T, CompatError>;
