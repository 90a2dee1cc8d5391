//! Error types for pushci-archive

use pushci_core::{PushCiError, RecordLocator, ValidationError};
use thiserror::Error;

/// Errors that can occur in the log archive
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// No record exists for the locator
    #[error("record not found: {locator}")]
    NotFound { locator: String },

    /// Locator or namespace failed validation
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Record could not be (de)serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    pub fn not_found(locator: &RecordLocator) -> Self {
        ArchiveError::NotFound {
            locator: locator.to_string(),
        }
    }
}

impl From<ArchiveError> for PushCiError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::NotFound { locator } => PushCiError::NotFound(locator),
            ArchiveError::Validation(e) => PushCiError::Validation(e),
            ArchiveError::Serialization(e) => PushCiError::Serialization(e),
            ArchiveError::Io(e) => PushCiError::Filesystem(e.to_string()),
        }
    }
}

/// Result type for archive operations
pub type ArchiveResult<T> = std::result::Result<T, ArchiveError>;
