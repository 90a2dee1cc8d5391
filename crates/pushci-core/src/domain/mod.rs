//! Domain models for PushCI.
//!
//! Canonical definitions for the core entities:
//! - `PushEvent`: the push notification that triggers a run
//! - `RepoName`: path-safe `owner/name` repository identifier
//! - `CommandOutcome`: result of one external process invocation
//! - `CommitStatus`: status update sent to the hosting service
//! - `RunRecord`: archived outcome of one pipeline run

pub mod error;
pub mod outcome;
pub mod push;
pub mod record;
pub mod repo;
pub mod status;

pub use error::{PushCiError, Result, ValidationError};
pub use outcome::{CommandOutcome, OutcomeKind};
pub use push::{PushEvent, BRANCH_PREFIX};
pub use record::{RecordLocator, RecordStatus, RunRecord};
pub use repo::RepoName;
pub use status::{CommitState, CommitStatus};
