//! Commit status updates reported to the hosting service.

use serde::{Deserialize, Serialize};

/// Commit status state accepted by the GitHub statuses API.
///
/// Deliberately separate from [`OutcomeKind`](super::OutcomeKind): a build
/// failure and a commit status of `failure` are related but not the same
/// thing (a successful build is still reported as `pending`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CommitState {
    Pending,
    Success,
    Failure,
    Error,
}

impl CommitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitState::Pending => "pending",
            CommitState::Success => "success",
            CommitState::Failure => "failure",
            CommitState::Error => "error",
        }
    }
}

impl std::fmt::Display for CommitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status update for one commit. Sent, never persisted locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStatus {
    pub state: CommitState,
    /// Short human-readable text.
    pub description: String,
    /// Link to the archived run log, if one exists.
    pub target_url: Option<String>,
    /// Label distinguishing this reporter from other checks on the commit.
    pub context: String,
}

impl CommitStatus {
    pub fn new(state: CommitState, description: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            state,
            description: description.into(),
            target_url: None,
            context: context.into(),
        }
    }

    /// Attach a link to the archived log.
    pub fn with_target_url(mut self, url: impl Into<String>) -> Self {
        self.target_url = Some(url.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_state_wire_names() {
        assert_eq!(serde_json::to_string(&CommitState::Pending).unwrap(), "\"pending\"");
        assert_eq!(serde_json::to_string(&CommitState::Failure).unwrap(), "\"failure\"");
        assert_eq!(CommitState::Error.to_string(), "error");
    }

    #[test]
    fn test_commit_status_builder() {
        let status = CommitStatus::new(CommitState::Failure, "build failed", "ci")
            .with_target_url("http://localhost/logs/a/b/c");
        assert_eq!(status.state, CommitState::Failure);
        assert_eq!(status.target_url.as_deref(), Some("http://localhost/logs/a/b/c"));
        assert_eq!(status.context, "ci");
    }
}
