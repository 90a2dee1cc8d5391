//! Commit-Status: reporting pipeline progress to the hosting service
//!
//! The [`StatusReporter`] trait is the seam the pipeline depends on.
//! [`GitHubStatusReporter`] implements it against the GitHub REST
//! statuses endpoint; [`fakes::RecordingReporter`] records calls for tests.
//!
//! Authentication uses a personal access token read lazily from a local
//! properties file (see [`token::TokenProvider`]).

pub mod error;
pub mod fakes;
pub mod github;
pub mod token;

use async_trait::async_trait;
use pushci_core::{CommitStatus, RepoName};

pub use error::{Result, StatusError};
pub use fakes::{RecordingReporter, ReportCall};
pub use github::{GitHubConfig, GitHubStatusReporter, StatusBody, DEFAULT_API_URL};
pub use token::{TokenProvider, TOKEN_PROPERTY};

/// Posts commit status updates.
///
/// Implementations must treat any response other than an explicit
/// acceptance as an error; the pipeline stops when a report fails.
#[async_trait]
pub trait StatusReporter: Send + Sync {
    /// Attach `status` to commit `sha` of `repo`.
    async fn report(&self, repo: &RepoName, sha: &str, status: &CommitStatus) -> Result<()>;
}
