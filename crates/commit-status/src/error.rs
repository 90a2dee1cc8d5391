//! Error types for commit-status

use pushci_core::PushCiError;
use thiserror::Error;

/// Errors that can occur while reporting a commit status
#[derive(Error, Debug)]
pub enum StatusError {
    /// The API answered with something other than 200 or 201
    #[error("GitHub rejected the status update with HTTP {status}: {body}")]
    RemoteRejected { status: u16, body: String },

    /// Transport-level failure (DNS, TLS, timeout, ...)
    #[error("HTTP error: {0}")]
    Http(String),

    /// The secret source has no usable token
    #[error("no GitHub token: {0}")]
    MissingToken(String),

    /// The secret source could not be read or parsed
    #[error("failed to read token source: {0}")]
    TokenSource(String),

    /// The commit identifier cannot be used in an API path
    #[error("invalid commit sha: {0:?}")]
    InvalidCommit(String),
}

impl From<reqwest::Error> for StatusError {
    fn from(err: reqwest::Error) -> Self {
        StatusError::Http(err.to_string())
    }
}

impl From<StatusError> for PushCiError {
    fn from(err: StatusError) -> Self {
        match err {
            StatusError::RemoteRejected { status, .. } => PushCiError::RemoteRejected { status },
            StatusError::Http(msg) => PushCiError::Remote(msg),
            e @ (StatusError::MissingToken(_)
            | StatusError::TokenSource(_)
            | StatusError::InvalidCommit(_)) => PushCiError::Config(e.to_string()),
        }
    }
}

/// Result type for status reporting
pub type Result<T> = std::result::Result<T, StatusError>;
