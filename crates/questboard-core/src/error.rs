//! Core error types for questboard-core.
//!
//! This module defines the error hierarchy using thiserror. Gesture
//! operations themselves never fail: a rejected press or release comes
//! back as a transition with no events. Errors surface only from the
//! store, the configuration layer and the commit channel.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for questboard-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Durable commit errors
    #[error("Commit error: {0}")]
    Commit(#[from] CommitError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// A stored row could not be decoded
    #[error("Corrupt row in {table}: {message}")]
    CorruptRow { table: String, message: String },

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key does not exist in the configuration tree
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Phase thresholds must satisfy 0 < low < mid < high < critical < 1
    #[error(
        "Phase thresholds out of order: low={low}, mid={mid}, high={high}, critical={critical}"
    )]
    ThresholdOrder {
        low: f64,
        mid: f64,
        high: f64,
        critical: f64,
    },

    /// A hold or decay duration of zero
    #[error("Duration for '{0}' must be greater than zero")]
    ZeroDuration(String),
}

/// Errors returned by a commit channel.
///
/// A failed commit never reverts a confirmed gesture. Retryable failures
/// are re-sent with the same idempotency key.
#[derive(Error, Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum CommitError {
    /// Backing store could not be reached
    #[error("Store unreachable: {0}")]
    Unreachable(String),

    /// The call took too long and its outcome is unknown
    #[error("Commit timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    /// The store refused the action (not retryable)
    #[error("Commit rejected: {0}")]
    Rejected(String),

    /// Transient store failure (busy, locked)
    #[error("Store failure: {0}")]
    Store(String),
}

impl CommitError {
    /// Whether re-sending the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, CommitError::Rejected(_))
    }
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

impl From<DatabaseError> for CommitError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::OpenFailed { .. } => CommitError::Unreachable(err.to_string()),
            DatabaseError::CorruptRow { .. } => CommitError::Rejected(err.to_string()),
            other => CommitError::Store(other.to_string()),
        }
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CoreError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        CoreError::Custom(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
