//! Error types for veolog.
//!
//! This module defines all error types used throughout the veolog crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for veolog operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Logging Pipeline Errors ===
    /// The log file could not be opened for writing.
    #[error("failed to open log file {path}: {source}")]
    LogFileOpen {
        /// Path to the log file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The tracing filter could not be built.
    #[error("invalid log filter '{directive}': {message}")]
    LogFilter {
        /// The directive that was rejected.
        directive: String,
        /// Description of what went wrong.
        message: String,
    },

    // === Log Inspection Errors ===
    /// The log directory does not exist.
    #[error("log directory not found: {path}")]
    LogDirMissing {
        /// Path that was searched.
        path: PathBuf,
    },

    /// No log files were found in the log directory.
    #[error("no log files found in {path}")]
    NoLogFiles {
        /// Directory that was searched.
        path: PathBuf,
    },

    /// A tag name was not recognized.
    #[error("unknown log tag '{0}'")]
    UnknownTag(String),

    /// A level name was not recognized.
    #[error("unknown log level '{0}' (expected DEBUG, INFO, WARNING, ERROR or CRITICAL)")]
    UnknownLevel(String),

    /// A time bound could not be parsed.
    #[error("invalid time '{0}' (expected YYYY-MM-DD, YYYY-MM-DD HH:MM:SS or a relative age like 2h)")]
    InvalidTime(String),

    /// A search pattern was not a valid regex.
    #[error("invalid search pattern: {0}")]
    Pattern(#[from] regex::Error),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to remove a log file.
    #[error("failed to remove {path}: {source}")]
    FileRemove {
        /// Path that couldn't be removed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for veolog operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a configuration validation error.
    #[must_use]
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Create a log filter error.
    #[must_use]
    pub fn log_filter(directive: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LogFilter {
            directive: directive.into(),
            message: message.into(),
        }
    }

    /// Check if this error means there is nothing to inspect yet.
    #[must_use]
    pub fn is_missing_logs(&self) -> bool {
        matches!(self, Self::LogDirMissing { .. } | Self::NoLogFiles { .. })
    }
}
