//! Domain-level error taxonomy for PushCI.

/// Errors produced while validating externally supplied identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid repository name {name:?}: {reason}")]
    InvalidRepoName { name: String, reason: String },

    #[error("ref {reference:?} is not a branch (expected prefix {prefix:?})")]
    NotABranch { reference: String, prefix: String },

    #[error("branch name must not be empty")]
    BlankBranch,

    #[error("commit sha must not be empty")]
    BlankCommit,

    #[error("invalid record locator {locator:?}: {reason}")]
    InvalidLocator { locator: String, reason: String },
}

/// PushCI domain errors.
#[derive(Debug, thiserror::Error)]
pub enum PushCiError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("process error: {0}")]
    Process(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("status update rejected with HTTP {status}")]
    RemoteRejected { status: u16 },

    #[error("status service unreachable: {0}")]
    Remote(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for PushCI domain operations.
pub type Result<T> = std::result::Result<T, PushCiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::InvalidRepoName {
            name: "../etc".to_string(),
            reason: "parent directory segment".to_string(),
        };
        assert!(err.to_string().contains("invalid repository name"));
        assert!(err.to_string().contains("parent directory segment"));

        let err = ValidationError::NotABranch {
            reference: "refs/tags/v1".to_string(),
            prefix: "refs/heads/".to_string(),
        };
        assert!(err.to_string().contains("refs/tags/v1"));
    }

    #[test]
    fn test_remote_rejected_carries_status() {
        let err = PushCiError::RemoteRejected { status: 422 };
        assert!(err.to_string().contains("422"));
    }

    #[test]
    fn test_validation_converts_into_domain_error() {
        let err: PushCiError = ValidationError::BlankBranch.into();
        assert!(matches!(err, PushCiError::Validation(ValidationError::BlankBranch)));
    }
}
