//! Pipeline orchestration for one push event.
//!
//! A run moves through
//! `Start → Cloning → CheckingOut → ReportingPending → Building →
//! ReportingBuildStatus → Testing → ReportingTestStatus → CleaningUp → Done`,
//! with `Archiving` entered right before the status report that links the
//! archived record. Any fatal error ends in `Aborted`. `CleaningUp` runs
//! exactly once on every path.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use commit_status::StatusReporter;
use pushci_archive::LogArchive;
use pushci_core::{
    emit_cleanup_failed, emit_command_finished, emit_record_archived, emit_run_finished,
    emit_run_started, emit_stage_transition, emit_status_reported, CommandOutcome, CommitState,
    CommitStatus, OutcomeKind, PushEvent, RecordLocator, RepoName, RunRecord, run_span,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::lock::RepoLocks;
use crate::runner::CommandRunner;
use crate::stage::{StageConfig, Toolchain};
use crate::workspace::WorkspaceManager;

/// Default status context.
pub const DEFAULT_CONTEXT: &str = "continuous integration";

/// Orchestrator states.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Start,
    Cloning,
    CheckingOut,
    ReportingPending,
    Building,
    ReportingBuildStatus,
    Testing,
    ReportingTestStatus,
    Archiving,
    CleaningUp,
    Done,
    Aborted,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Start => "start",
            PipelineState::Cloning => "cloning",
            PipelineState::CheckingOut => "checking_out",
            PipelineState::ReportingPending => "reporting_pending",
            PipelineState::Building => "building",
            PipelineState::ReportingBuildStatus => "reporting_build_status",
            PipelineState::Testing => "testing",
            PipelineState::ReportingTestStatus => "reporting_test_status",
            PipelineState::Archiving => "archiving",
            PipelineState::CleaningUp => "cleaning_up",
            PipelineState::Done => "done",
            PipelineState::Aborted => "aborted",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "terminal", rename_all = "snake_case")]
pub enum Terminal {
    Done,
    Aborted { stage: PipelineState, reason: String },
}

impl Terminal {
    pub fn state(&self) -> PipelineState {
        match self {
            Terminal::Done => PipelineState::Done,
            Terminal::Aborted { .. } => PipelineState::Aborted,
        }
    }
}

/// Everything that happened during one run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: String,
    pub repo: String,
    pub commit_sha: String,
    /// Visited states in order, from `Start` to the terminal state.
    pub trace: Vec<PipelineState>,
    pub terminal: Terminal,
    pub build: Option<CommandOutcome>,
    pub test: Option<CommandOutcome>,
    /// Statuses accepted by the hosting service, in order.
    pub statuses: Vec<CommitStatus>,
    #[serde(serialize_with = "serialize_locator")]
    pub locator: Option<RecordLocator>,
    pub cleanup_error: Option<String>,
    pub duration_ms: u64,
}

fn serialize_locator<S: serde::Serializer>(locator: &Option<RecordLocator>, s: S) -> Result<S::Ok, S::Error> {
    match locator {
        Some(l) => s.serialize_some(&l.to_string()),
        None => s.serialize_none(),
    }
}

impl PipelineReport {
    pub fn is_aborted(&self) -> bool {
        matches!(self.terminal, Terminal::Aborted { .. })
    }

    /// State of the last accepted status.
    pub fn final_state(&self) -> Option<CommitState> {
        self.statuses.last().map(|s| s.state)
    }

    /// Completed and the last reported state is `success`.
    pub fn succeeded(&self) -> bool {
        !self.is_aborted() && self.final_state() == Some(CommitState::Success)
    }
}

/// Commands, labels and links used by a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub build: StageConfig,
    pub test: StageConfig,
    /// Status context shown on the commit.
    pub context: String,
    /// Base URL under which `/logs/<locator>` is served.
    pub public_url: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::for_toolchain(Toolchain::default(), "http://localhost:8019")
    }
}

impl PipelineConfig {
    pub fn for_toolchain(toolchain: Toolchain, public_url: impl Into<String>) -> Self {
        Self {
            build: toolchain.build_stage(),
            test: toolchain.test_stage(),
            context: DEFAULT_CONTEXT.to_string(),
            public_url: public_url.into(),
        }
    }

    /// Link to an archived record.
    pub fn target_url(&self, locator: &RecordLocator) -> String {
        format!("{}/logs/{}", self.public_url.trim_end_matches('/'), locator)
    }
}

/// Collaborators of a pipeline.
pub struct PipelineDeps {
    pub runner: Arc<dyn CommandRunner>,
    pub workspaces: WorkspaceManager,
    pub reporter: Arc<dyn StatusReporter>,
    pub archive: Arc<dyn LogArchive>,
    pub locks: RepoLocks,
}

impl PipelineDeps {
    /// Wire a workspace manager rooted at `workspace_root` to `runner`.
    pub fn new(
        workspace_root: impl Into<std::path::PathBuf>,
        runner: Arc<dyn CommandRunner>,
        git_timeout: Duration,
        reporter: Arc<dyn StatusReporter>,
        archive: Arc<dyn LogArchive>,
    ) -> Self {
        Self {
            workspaces: WorkspaceManager::new(workspace_root, runner.clone(), git_timeout),
            runner,
            reporter,
            archive,
            locks: RepoLocks::new(),
        }
    }
}

/// The push pipeline orchestrator.
pub struct Pipeline {
    deps: PipelineDeps,
    config: PipelineConfig,
}

/// Fatal error: which state it happened in and why.
struct Abort {
    stage: PipelineState,
    reason: String,
}

struct RunContext {
    run_id: String,
    current: PipelineState,
    trace: Vec<PipelineState>,
    build: Option<CommandOutcome>,
    test: Option<CommandOutcome>,
    statuses: Vec<CommitStatus>,
    locator: Option<RecordLocator>,
    cleanup_error: Option<String>,
}

impl RunContext {
    fn new(run_id: String) -> Self {
        Self {
            run_id,
            current: PipelineState::Start,
            trace: vec![PipelineState::Start],
            build: None,
            test: None,
            statuses: Vec::new(),
            locator: None,
            cleanup_error: None,
        }
    }

    fn enter(&mut self, next: PipelineState) {
        emit_stage_transition(&self.run_id, self.current.as_str(), next.as_str());
        self.current = next;
        self.trace.push(next);
    }

    fn abort(&self, reason: impl fmt::Display) -> Abort {
        Abort {
            stage: self.current,
            reason: reason.to_string(),
        }
    }
}

impl Pipeline {
    pub fn new(deps: PipelineDeps, config: PipelineConfig) -> Self {
        Self { deps, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn deps(&self) -> &PipelineDeps {
        &self.deps
    }

    /// Run the pipeline for one push event.
    ///
    /// Never fails: the outcome, including aborts, is described by the
    /// returned report.
    pub async fn run(&self, event: &PushEvent) -> PipelineReport {
        let run_id = Uuid::new_v4().to_string();
        let span = run_span(&run_id, &event.repo_full_name, &event.commit_sha);
        self.run_with_id(run_id, event).instrument(span).await
    }

    async fn run_with_id(&self, run_id: String, event: &PushEvent) -> PipelineReport {
        let started = Instant::now();
        emit_run_started(&run_id, &event.repo_full_name, &event.branch_ref);

        let mut run = RunContext::new(run_id);
        run.enter(PipelineState::Cloning);

        let repo = event.repo_name();
        let guard = match &repo {
            Ok(repo) => Some(self.deps.locks.acquire(repo).await),
            Err(_) => None,
        };

        let result = match &repo {
            Ok(repo) => self.drive(&mut run, event, repo).await,
            Err(e) => Err(run.abort(e)),
        };

        run.enter(PipelineState::CleaningUp);
        if let Ok(repo) = &repo {
            self.clean_up(&mut run, &self.deps.workspaces.workspace_path(repo)).await;
        }
        drop(guard);

        let terminal = match result {
            Ok(()) => Terminal::Done,
            Err(Abort { stage, reason }) => {
                warn!(stage = %stage, reason = %reason, "run aborted");
                Terminal::Aborted { stage, reason }
            }
        };
        run.enter(terminal.state());

        let duration_ms = started.elapsed().as_millis() as u64;
        emit_run_finished(&run.run_id, terminal.state().as_str(), duration_ms);

        PipelineReport {
            run_id: run.run_id,
            repo: event.repo_full_name.clone(),
            commit_sha: event.commit_sha.clone(),
            trace: run.trace,
            terminal,
            build: run.build,
            test: run.test,
            statuses: run.statuses,
            locator: run.locator,
            cleanup_error: run.cleanup_error,
            duration_ms,
        }
    }

    async fn drive(&self, run: &mut RunContext, event: &PushEvent, repo: &RepoName) -> Result<(), Abort> {
        let branch = event.branch_name().map_err(|e| run.abort(e))?;
        let sha = event.commit().map_err(|e| run.abort(e))?;
        let path = self
            .deps
            .workspaces
            .prepare_repo(repo, &event.clone_url)
            .await
            .map_err(|e| run.abort(e))?;

        run.enter(PipelineState::CheckingOut);
        self.deps
            .workspaces
            .checkout(&path, branch)
            .await
            .map_err(|e| run.abort(e))?;

        run.enter(PipelineState::ReportingPending);
        self.report(run, repo, sha, CommitState::Pending, "cloned and checked out", None)
            .await?;

        run.enter(PipelineState::Building);
        let build = self.run_stage(run, &self.config.build, &path).await;
        run.build = Some(build.clone());

        match build.kind {
            OutcomeKind::Failure => {
                run.enter(PipelineState::Archiving);
                let url = self.archive(run, repo, sha, &build, None).await?;
                run.enter(PipelineState::ReportingBuildStatus);
                return self
                    .report(run, repo, sha, CommitState::Failure, "build failed", Some(url))
                    .await;
            }
            OutcomeKind::Error => {
                run.enter(PipelineState::ReportingBuildStatus);
                return self.report(run, repo, sha, CommitState::Error, "build error", None).await;
            }
            OutcomeKind::Success => {
                run.enter(PipelineState::ReportingBuildStatus);
                self.report(run, repo, sha, CommitState::Pending, "build succeeded", None)
                    .await?;
            }
        }

        run.enter(PipelineState::Testing);
        let test = self.run_stage(run, &self.config.test, &path).await;
        run.test = Some(test.clone());

        let (state, description) = match test.kind {
            OutcomeKind::Success => (CommitState::Success, "tests passed"),
            OutcomeKind::Failure => (CommitState::Failure, "tests failed"),
            OutcomeKind::Error => (CommitState::Error, "test error"),
        };
        let target_url = if test.kind == OutcomeKind::Error {
            None
        } else {
            run.enter(PipelineState::Archiving);
            Some(self.archive(run, repo, sha, &build, Some(&test)).await?)
        };

        run.enter(PipelineState::ReportingTestStatus);
        self.report(run, repo, sha, state, description, target_url).await
    }

    async fn run_stage(&self, run: &RunContext, stage: &StageConfig, path: &Path) -> CommandOutcome {
        info!(stage = %stage.name, "running stage");
        let outcome = self.deps.runner.run(path, &stage.command, stage.timeout()).await;
        emit_command_finished(&run.run_id, &stage.name, outcome.kind.as_str(), outcome.duration_ms);
        outcome
    }

    async fn report(
        &self,
        run: &mut RunContext,
        repo: &RepoName,
        sha: &str,
        state: CommitState,
        description: &str,
        target_url: Option<String>,
    ) -> Result<(), Abort> {
        let mut status = CommitStatus::new(state, description, &self.config.context);
        if let Some(url) = target_url {
            status = status.with_target_url(url);
        }
        match self.deps.reporter.report(repo, sha, &status).await {
            Ok(()) => {
                emit_status_reported(&run.run_id, state.as_str(), description);
                run.statuses.push(status);
                Ok(())
            }
            Err(e) => Err(run.abort(format!("status report failed: {e}"))),
        }
    }

    /// Archive a record and return the link to it.
    ///
    /// On failure a best-effort `error` status is reported before the run
    /// aborts.
    async fn archive(
        &self,
        run: &mut RunContext,
        repo: &RepoName,
        sha: &str,
        build: &CommandOutcome,
        test: Option<&CommandOutcome>,
    ) -> Result<String, Abort> {
        let record = RunRecord::new(sha, build, test);
        let archive = self.deps.archive.clone();
        let namespace = repo.clone();
        let archived = match tokio::task::spawn_blocking(move || archive.archive(&namespace, record)).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        match archived {
            Ok(locator) => {
                emit_record_archived(&run.run_id, &locator.to_string());
                let url = self.config.target_url(&locator);
                run.locator = Some(locator);
                Ok(url)
            }
            Err(reason) => {
                let abort = run.abort(format!("log archival failed: {reason}"));
                let status = CommitStatus::new(CommitState::Error, "log archival failed", &self.config.context);
                match self.deps.reporter.report(repo, sha, &status).await {
                    Ok(()) => {
                        emit_status_reported(&run.run_id, status.state.as_str(), &status.description);
                        run.statuses.push(status);
                    }
                    Err(e) => warn!(error = %e, "could not report archival failure"),
                }
                Err(abort)
            }
        }
    }

    async fn clean_up(&self, run: &mut RunContext, path: &Path) {
        if let Err(e) = self.deps.workspaces.release(path).await {
            emit_cleanup_failed(&run.run_id, &path.display().to_string(), &e);
            run.cleanup_error = Some(e.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_state() {
        assert_eq!(Terminal::Done.state(), PipelineState::Done);
        let aborted = Terminal::Aborted {
            stage: PipelineState::Cloning,
            reason: "bad name".to_string(),
        };
        assert_eq!(aborted.state(), PipelineState::Aborted);
    }

    #[test]
    fn test_target_url_joins_public_url_and_locator() {
        let config = PipelineConfig::for_toolchain(Toolchain::Gradle, "http://ci.local:8019/");
        let locator: RecordLocator = "octo/hello/2026-02-09T13:17:20.000001+01:00".parse().unwrap();
        assert_eq!(
            config.target_url(&locator),
            "http://ci.local:8019/logs/octo/hello/2026-02-09T13:17:20.000001+01:00"
        );
    }

    #[test]
    fn test_default_config_uses_gradle_and_ci_context() {
        let config = PipelineConfig::default();
        assert_eq!(config.build.command[0], "./gradlew");
        assert_eq!(config.context, "continuous integration");
    }

    #[test]
    fn test_report_success_requires_done_and_success_state() {
        let mut report = PipelineReport {
            run_id: "r".to_string(),
            repo: "octo/hello".to_string(),
            commit_sha: "abc".to_string(),
            trace: vec![PipelineState::Start, PipelineState::CleaningUp, PipelineState::Done],
            terminal: Terminal::Done,
            build: None,
            test: None,
            statuses: vec![CommitStatus::new(CommitState::Success, "tests passed", "ci")],
            locator: None,
            cleanup_error: None,
            duration_ms: 0,
        };
        assert!(report.succeeded());

        report.statuses.push(CommitStatus::new(CommitState::Failure, "x", "ci"));
        assert!(!report.succeeded());
        assert_eq!(report.final_state(), Some(CommitState::Failure));
    }
}
