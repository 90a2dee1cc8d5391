//! PushCI CI - push-triggered build and test pipeline
//!
//! Provides a pipeline orchestrator that:
//! - Clones and checks out the pushed branch into a per-repository workspace
//! - Runs the build and test commands as external processes
//! - Reports each concluded stage as a commit status
//! - Archives a run record and links it from the final status
//! - Removes the workspace on every exit path

pub mod fakes;
pub mod lock;
pub mod pipeline;
pub mod runner;
pub mod stage;
pub mod workspace;

// Re-export key types
pub use fakes::{Invocation, ScriptedRunner};
pub use lock::{RepoGuard, RepoLocks};
pub use pipeline::{Pipeline, PipelineConfig, PipelineDeps, PipelineReport, PipelineState, Terminal};
pub use runner::{CommandRunner, ProcessRunner};
pub use stage::{BuiltinStage, StageConfig, Toolchain};
pub use workspace::{WorkspaceError, WorkspaceManager};
