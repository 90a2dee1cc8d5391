//! In-memory [`StatusReporter`] for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use pushci_core::{CommitState, CommitStatus, RepoName};

use crate::error::{Result, StatusError};
use crate::StatusReporter;

/// One attempted report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportCall {
    pub repo: RepoName,
    pub sha: String,
    pub status: CommitStatus,
    pub accepted: bool,
}

/// Records every report; selected calls can be made to fail.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    calls: Mutex<Vec<ReportCall>>,
    rejections: Mutex<HashMap<usize, u16>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `index`-th call (zero-based) fail with HTTP `status`.
    pub fn reject_call(self, index: usize, status: u16) -> Self {
        self.rejections.lock().unwrap().insert(index, status);
        self
    }

    /// Every attempted call, in order.
    pub fn calls(&self) -> Vec<ReportCall> {
        self.calls.lock().unwrap().clone()
    }

    /// States of the accepted calls, in order.
    pub fn accepted_states(&self) -> Vec<CommitState> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.accepted)
            .map(|c| c.status.state)
            .collect()
    }
}

#[async_trait]
impl StatusReporter for RecordingReporter {
    async fn report(&self, repo: &RepoName, sha: &str, status: &CommitStatus) -> Result<()> {
        let mut calls = self.calls.lock().unwrap();
        let rejected = self.rejections.lock().unwrap().get(&calls.len()).copied();
        calls.push(ReportCall {
            repo: repo.clone(),
            sha: sha.to_string(),
            status: status.clone(),
            accepted: rejected.is_none(),
        });
        match rejected {
            Some(code) => Err(StatusError::RemoteRejected {
                status: code,
                body: "rejected by test".to_string(),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_only_the_selected_call() {
        let reporter = RecordingReporter::new().reject_call(1, 500);
        let repo = RepoName::parse("octo/hello").unwrap();
        let status = CommitStatus::new(CommitState::Pending, "x", "ci");

        assert!(reporter.report(&repo, "abc", &status).await.is_ok());
        assert!(matches!(
            reporter.report(&repo, "abc", &status).await,
            Err(StatusError::RemoteRejected { status: 500, .. })
        ));
        assert!(reporter.report(&repo, "abc", &status).await.is_ok());

        assert_eq!(reporter.calls().len(), 3);
        assert_eq!(reporter.accepted_states().len(), 2);
    }
}
