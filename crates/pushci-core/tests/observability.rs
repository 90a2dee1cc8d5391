//! Observability tests for pipeline lifecycle tracing.

use pushci_core::{
    emit_cleanup_failed, emit_command_finished, emit_record_archived, emit_run_finished,
    emit_run_started, emit_stage_transition, emit_status_reported, run_span,
};
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_emit_run_started_logs_repo_and_ref() {
    emit_run_started("run-123", "octo/hello", "refs/heads/main");
    assert!(logs_contain("run.started"));
    assert!(logs_contain("octo/hello"));
}

#[traced_test]
#[test]
fn test_emit_stage_transition_logs_both_states() {
    emit_stage_transition("run-123", "building", "reporting_build_status");
    assert!(logs_contain("stage.transition"));
    assert!(logs_contain("reporting_build_status"));
}

#[traced_test]
#[test]
fn test_emit_command_and_status_events() {
    emit_command_finished("run-1", "build", "failure", 1234);
    emit_status_reported("run-1", "failure", "build failed");
    assert!(logs_contain("stage.command"));
    assert!(logs_contain("status.reported"));
    assert!(logs_contain("build failed"));
}

#[traced_test]
#[test]
fn test_emit_archive_and_finish_events() {
    emit_record_archived("run-2", "octo/hello/2026-02-09T13:17:20.000000+01:00");
    emit_run_finished("run-2", "done", 42);
    assert!(logs_contain("record.archived"));
    assert!(logs_contain("run.finished"));
}

#[traced_test]
#[test]
fn test_emit_cleanup_failed_logs_warning() {
    let error_msg = "permission denied";
    emit_cleanup_failed("run-err-001", "repos/octo/hello", &error_msg);
    assert!(logs_contain("WARN"));
    assert!(logs_contain("permission denied"));
}

#[traced_test]
#[test]
fn test_run_span_tags_events() {
    let span = run_span("test-span-run", "octo/hello", "abc").entered();
    tracing::info!("inside span");
    drop(span);
    assert!(logs_contain("pushci.run"));
}
