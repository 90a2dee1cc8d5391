//! Outcome of a single external process invocation.

use serde::{Deserialize, Serialize};

/// How a command invocation ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Exit code 0.
    Success,
    /// Non-zero exit code.
    Failure,
    /// Could not be spawned, timed out, or output capture failed.
    Error,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::Failure => "failure",
            OutcomeKind::Error => "error",
        }
    }
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one command invocation.
///
/// Created once per invocation and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    /// Classification of the outcome.
    pub kind: OutcomeKind,

    /// Combined stdout + stderr, possibly empty.
    pub log: String,

    /// Why the command could not complete (only for `Error`).
    pub message: Option<String>,

    /// Exit code, when the process exited normally.
    pub exit_code: Option<i32>,

    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl CommandOutcome {
    /// Classify a finished process by its exit code.
    pub fn exited(exit_code: i32, log: String, duration_ms: u64) -> Self {
        let kind = if exit_code == 0 {
            OutcomeKind::Success
        } else {
            OutcomeKind::Failure
        };
        Self {
            kind,
            log,
            message: None,
            exit_code: Some(exit_code),
            duration_ms,
        }
    }

    /// A command that could not run to completion.
    pub fn error(message: impl Into<String>, log: String, duration_ms: u64) -> Self {
        Self {
            kind: OutcomeKind::Error,
            log,
            message: Some(message.into()),
            exit_code: None,
            duration_ms,
        }
    }

    pub fn success(log: impl Into<String>) -> Self {
        Self::exited(0, log.into(), 0)
    }

    pub fn failure(exit_code: i32, log: impl Into<String>) -> Self {
        Self::exited(exit_code, log.into(), 0)
    }

    /// Whether the command exited with code 0.
    pub fn passed(&self) -> bool {
        self.kind == OutcomeKind::Success
    }

    /// The log, with the error message appended for `Error` outcomes.
    pub fn full_log(&self) -> String {
        match (&self.message, self.log.is_empty()) {
            (Some(msg), true) => msg.clone(),
            (Some(msg), false) => format!("{}\n{}", self.log, msg),
            (None, _) => self.log.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exited_classifies_by_exit_code() {
        let ok = CommandOutcome::exited(0, "done".to_string(), 10);
        assert_eq!(ok.kind, OutcomeKind::Success);
        assert!(ok.passed());

        let failed = CommandOutcome::exited(3, "boom".to_string(), 10);
        assert_eq!(failed.kind, OutcomeKind::Failure);
        assert_eq!(failed.exit_code, Some(3));
        assert!(!failed.passed());
    }

    #[test]
    fn test_error_outcome() {
        let err = CommandOutcome::error("timed out after 5s", String::new(), 5000);
        assert_eq!(err.kind, OutcomeKind::Error);
        assert!(err.exit_code.is_none());
        assert_eq!(err.full_log(), "timed out after 5s");
    }

    #[test]
    fn test_full_log_appends_message() {
        let err = CommandOutcome::error("killed", "partial output".to_string(), 1);
        assert_eq!(err.full_log(), "partial output\nkilled");
        assert_eq!(CommandOutcome::success("plain").full_log(), "plain");
    }
}
