//! Core error types for pomotask-core.
//!
//! Every fallible operation in the library returns [`CoreError`]. The
//! sub-enums keep the cause specific enough for callers to react to it
//! (show a validation message, prompt for sign-in, explain a permission
//! problem) without parsing strings.

use std::path::PathBuf;
use thiserror::Error;

use crate::timer::TimerPhase;

/// Core error type for pomotask-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Input rejected before any store call was made.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Referenced record is absent or belongs to another user.
    #[error("{collection} '{id}' not found")]
    NotFound { collection: String, id: String },

    /// No user identity is available.
    #[error("Not authenticated: sign in before using this command")]
    Unauthenticated,

    /// Backend failure, with the original message attached.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Timer command issued in a phase that does not accept it.
    #[error("Timer error: {0}")]
    Timer(#[from] TimerError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// True when the backend refused the operation on access-rule grounds.
    ///
    /// Usually means the store's access rules are misconfigured, so the UI
    /// should say so instead of showing a generic failure.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, CoreError::Store(StoreError::PermissionDenied(_)))
    }
}

/// Record store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the backing database
    #[error("Failed to open store at {path}: {message}")]
    OpenFailed { path: PathBuf, message: String },

    /// Access rules rejected the operation
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Update/delete addressed a record that does not exist
    #[error("No {collection} record with id '{id}'")]
    MissingRecord { collection: String, id: String },

    /// A stored document could not be decoded
    #[error("Corrupt {collection} record '{id}': {message}")]
    Corrupt {
        collection: String,
        id: String,
        message: String,
    },

    /// Schema migration failed
    #[error("Store migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Store is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Data directory could not be determined or created
    #[error("Failed to prepare data directory {path}: {message}")]
    DataDir { path: PathBuf, message: String },

    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("unknown config key: {0}")]
    UnknownKey(String),
}

/// Validation errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("task title must not be empty")]
    EmptyTitle,

    #[error("task title must be at most {max} characters (got {len})")]
    TitleTooLong { len: usize, max: usize },

    #[error("invalid priority '{0}' (expected high, medium or low)")]
    InvalidPriority(String),

    #[error("invalid status '{0}' (expected pending, in_progress or completed)")]
    InvalidStatus(String),

    #[error("pomodoro target must be between 1 and 100 (got {0})")]
    InvalidPomodoroTarget(i64),

    /// Empty collection
    #[error("Empty collection: {0}")]
    EmptyCollection(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Timer command errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TimerError {
    #[error("cannot {action} while the timer is {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: TimerPhase,
    },

    #[error("duration must be at least one minute")]
    ZeroDuration,

    #[error("no completed pomodoro is waiting to be recorded")]
    NothingPending,
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => match e.code {
                rusqlite::ErrorCode::DatabaseLocked | rusqlite::ErrorCode::DatabaseBusy => {
                    StoreError::Locked
                }
                rusqlite::ErrorCode::PermissionDenied
                | rusqlite::ErrorCode::ReadOnly
                | rusqlite::ErrorCode::AuthorizationForStatementDenied => {
                    StoreError::PermissionDenied(err.to_string())
                }
                _ => StoreError::QueryFailed(err.to_string()),
            },
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
