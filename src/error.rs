use thiserror::Error;

use crate::storage::StorageKind;

/// I/O errors that can occur when talking to a storage backend
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Error from S3 or S3-compatible storage
    #[error("S3 error: {0}")]
    S3(String),

    /// Error from the local filesystem
    #[error("Filesystem error on {path}: {message}")]
    File { path: String, message: String },

    /// Object or file not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// No client configured for the requested backend kind
    #[error("Backend {kind} unavailable: {message}")]
    BackendUnavailable { kind: StorageKind, message: String },

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),
}

/// Errors reported by the pyramid addressing and index layer.
///
/// Every failure is synchronous and carries a human-readable cause; nothing
/// in this crate retries internally or aborts the process.
#[derive(Debug, Error)]
pub enum PyramidError {
    /// Missing or malformed required field
    #[error("Validation error: {0}")]
    Validation(String),

    /// No identifiable storage backend, or mixed backend kinds
    #[error("Storage type error: {0}")]
    StorageType(String),

    /// Level id absent from the supplied tile matrix set
    #[error("Level '{level}' has no matching tile matrix in set '{tms}'")]
    Binding { level: String, tms: String },

    /// Backend fetch/store/copy failure
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Malformed descriptor or list content
    #[error("Format error: {0}")]
    Format(String),

    /// Operation invalid for the current mode or lifecycle state
    #[error("State error: {0}")]
    State(String),
}

impl PyramidError {
    /// Shorthand for a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        PyramidError::Validation(message.into())
    }

    /// Shorthand for a format failure.
    pub fn format(message: impl Into<String>) -> Self {
        PyramidError::Format(message.into())
    }

    /// Shorthand for a lifecycle/state failure.
    pub fn state(message: impl Into<String>) -> Self {
        PyramidError::State(message.into())
    }
}
