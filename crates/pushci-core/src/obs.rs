//! Structured observability hooks for the pipeline lifecycle.
//!
//! This module provides:
//! - The run-scoped `pushci.run` tracing span
//! - Emission functions for key lifecycle events: run start, stage
//!   transitions, command completion, status reports, archival, run finish
//!
//! Events are emitted at `info!` level (cleanup failures at `warn!`).
//! Verbosity follows `RUST_LOG`; see [`crate::telemetry::init_tracing`].

use tracing::{info, warn};

/// The `pushci.run` span tagged with the run id, repository and commit.
///
/// Attach it to a run's future with `tracing::Instrument`.
pub fn run_span(run_id: &str, repo: &str, commit: &str) -> tracing::Span {
    tracing::info_span!("pushci.run", run_id = %run_id, repo = %repo, commit = %commit)
}

/// Emit event: run started for a push to `branch_ref`.
pub fn emit_run_started(run_id: &str, repo: &str, branch_ref: &str) {
    info!(event = "run.started", run_id = %run_id, repo = %repo, branch_ref = %branch_ref);
}

/// Emit event: the orchestrator moved from one state to the next.
pub fn emit_stage_transition(run_id: &str, from: &str, to: &str) {
    info!(event = "stage.transition", run_id = %run_id, from = %from, to = %to);
}

/// Emit event: an external command finished.
pub fn emit_command_finished(run_id: &str, stage: &str, outcome: &str, duration_ms: u64) {
    info!(
        event = "stage.command",
        run_id = %run_id,
        stage = %stage,
        outcome = %outcome,
        duration_ms = duration_ms,
    );
}

/// Emit event: a commit status was accepted by the hosting service.
pub fn emit_status_reported(run_id: &str, state: &str, description: &str) {
    info!(event = "status.reported", run_id = %run_id, state = %state, description = %description);
}

/// Emit event: a run record was archived.
pub fn emit_record_archived(run_id: &str, locator: &str) {
    info!(event = "record.archived", run_id = %run_id, locator = %locator);
}

/// Emit event: run reached a terminal state.
pub fn emit_run_finished(run_id: &str, terminal: &str, duration_ms: u64) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        terminal = %terminal,
        duration_ms = duration_ms,
    );
}

/// Emit event: the workspace could not be removed (warning level).
pub fn emit_cleanup_failed(run_id: &str, path: &str, error: &dyn std::fmt::Display) {
    warn!(event = "cleanup.failed", run_id = %run_id, path = %path, error = %error);
}
