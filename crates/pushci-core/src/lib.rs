//! PushCI Core Library
//!
//! Domain types shared by every PushCI crate: the incoming push event, the
//! validated repository name used to build filesystem paths, command
//! outcomes, commit statuses and archived run records. Also hosts the
//! tracing setup and the structured lifecycle events emitted by the
//! pipeline.

pub mod domain;
pub mod obs;
pub mod telemetry;

pub use domain::{
    CommandOutcome, CommitState, CommitStatus, OutcomeKind, PushCiError, PushEvent,
    RecordLocator, RecordStatus, RepoName, Result, RunRecord, ValidationError, BRANCH_PREFIX,
};

pub use obs::{
    emit_cleanup_failed, emit_command_finished, emit_record_archived, emit_run_finished,
    emit_run_started, emit_stage_transition, emit_status_reported, run_span,
};
pub use telemetry::init_tracing;
