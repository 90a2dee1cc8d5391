//! Push event received from the hosting service.

use serde::{Deserialize, Serialize};

use super::error::ValidationError;
use super::repo::RepoName;

/// Ref namespace for branches. Only pushes to branches trigger a run.
pub const BRANCH_PREFIX: &str = "refs/heads/";

/// A push notification, as delivered in the GitHub `push` webhook payload.
///
/// Only the fields the pipeline needs are kept; everything else in the
/// payload is ignored on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PushPayload", into = "PushPayload")]
pub struct PushEvent {
    /// Full ref, e.g. `refs/heads/main`.
    pub branch_ref: String,
    /// Head commit after the push.
    pub commit_sha: String,
    /// Unvalidated `owner/name`; see [`PushEvent::repo_name`].
    pub repo_full_name: String,
    /// URL to clone the repository from.
    pub clone_url: String,
}

impl PushEvent {
    pub fn new(
        branch_ref: impl Into<String>,
        commit_sha: impl Into<String>,
        repo_full_name: impl Into<String>,
        clone_url: impl Into<String>,
    ) -> Self {
        Self {
            branch_ref: branch_ref.into(),
            commit_sha: commit_sha.into(),
            repo_full_name: repo_full_name.into(),
            clone_url: clone_url.into(),
        }
    }

    /// Branch name with the [`BRANCH_PREFIX`] stripped from the start.
    ///
    /// The prefix is only removed when the ref begins with it, so a branch
    /// like `feature/refs/heads/x` keeps its full name.
    pub fn branch_name(&self) -> Result<&str, ValidationError> {
        let branch = self
            .branch_ref
            .strip_prefix(BRANCH_PREFIX)
            .ok_or_else(|| ValidationError::NotABranch {
                reference: self.branch_ref.clone(),
                prefix: BRANCH_PREFIX.to_string(),
            })?;
        if branch.trim().is_empty() {
            return Err(ValidationError::BlankBranch);
        }
        Ok(branch)
    }

    /// Validated repository name.
    pub fn repo_name(&self) -> Result<RepoName, ValidationError> {
        RepoName::parse(&self.repo_full_name)
    }

    /// Non-blank head commit SHA.
    pub fn commit(&self) -> Result<&str, ValidationError> {
        if self.commit_sha.trim().is_empty() {
            return Err(ValidationError::BlankCommit);
        }
        Ok(&self.commit_sha)
    }
}

/// Wire shape of the push payload subset we consume.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PushPayload {
    #[serde(rename = "ref")]
    git_ref: String,
    after: String,
    repository: PayloadRepository,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PayloadRepository {
    full_name: String,
    clone_url: String,
}

impl From<PushPayload> for PushEvent {
    fn from(p: PushPayload) -> Self {
        Self {
            branch_ref: p.git_ref,
            commit_sha: p.after,
            repo_full_name: p.repository.full_name,
            clone_url: p.repository.clone_url,
        }
    }
}

impl From<PushEvent> for PushPayload {
    fn from(e: PushEvent) -> Self {
        Self {
            git_ref: e.branch_ref,
            after: e.commit_sha,
            repository: PayloadRepository {
                full_name: e.repo_full_name,
                clone_url: e.clone_url,
            },
        }
    }
}
