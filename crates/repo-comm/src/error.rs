//! Error types for the repository comm layer.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for comm operations.
#[derive(Debug, Error)]
pub enum CommError {
    // Transport errors
    #[error("Bind failed on {endpoint}: {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Connect failed to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Send to {endpoint} failed: {message}")]
    Send { endpoint: String, message: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Path is not a directory: {0}")]
    NotADirectory(PathBuf),

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Wire-format errors
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Invalid file key: {0}")]
    InvalidFileKey(String),

    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // Lifecycle errors
    #[error("Comm service is not started")]
    NotStarted,

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for comm operations.
pub type Result<T> = std::result::Result<T, CommError>;

impl From<std::io::Error> for CommError {
    fn from(err: std::io::Error) -> Self {
        CommError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for CommError {
    fn from(err: serde_json::Error) -> Self {
        CommError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}
