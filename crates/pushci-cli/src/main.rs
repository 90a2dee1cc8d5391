//! PushCI - push-triggered build and test pipeline CLI
//!
//! The `pushci` command runs the pipeline outside the daemon and inspects
//! what the daemon left behind.
//!
//! ## Commands
//!
//! - `run`: run one pipeline for a saved push payload
//! - `logs`: list and show archived run records
//! - `workspace`: remove a repository workspace

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commit_status::{GitHubConfig, GitHubStatusReporter, DEFAULT_API_URL};
use pushci_archive::{FsLogArchive, LogArchive};
use pushci_ci::pipeline::DEFAULT_CONTEXT;
use pushci_ci::workspace::DEFAULT_GIT_TIMEOUT_SECS;
use pushci_ci::{
    Pipeline, PipelineConfig, PipelineDeps, PipelineReport, ProcessRunner, Terminal, Toolchain,
    WorkspaceManager,
};
use pushci_core::{PushEvent, RecordLocator, RepoName};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "pushci")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Push-triggered build and test pipeline", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline once for a push payload file
    Run {
        /// GitHub push webhook payload (JSON)
        #[arg(short, long)]
        payload: PathBuf,

        /// Directory holding per-repository checkouts
        #[arg(long, env = "PUSHCI_WORKSPACE_ROOT", default_value = "repos")]
        workspace_root: PathBuf,

        /// Directory holding archived run records
        #[arg(long, env = "PUSHCI_ARCHIVE_ROOT", default_value = "logs")]
        archive_root: PathBuf,

        /// Properties file containing GITHUB_TOKEN
        #[arg(long, env = "PUSHCI_TOKEN_FILE", default_value = "config.properties")]
        token_file: PathBuf,

        /// GitHub REST API root
        #[arg(long, env = "PUSHCI_API_URL", default_value = DEFAULT_API_URL)]
        api_url: String,

        /// Build tool (gradle or cargo)
        #[arg(long, env = "PUSHCI_TOOLCHAIN", default_value = "gradle")]
        toolchain: Toolchain,

        /// Base URL used in commit status links
        #[arg(long, env = "PUSHCI_PUBLIC_URL", default_value = "http://localhost:8019")]
        public_url: String,

        /// Commit status context
        #[arg(long, env = "PUSHCI_CONTEXT", default_value = DEFAULT_CONTEXT)]
        context: String,
    },

    /// Inspect archived run records
    Logs {
        /// Directory holding archived run records
        #[arg(long, env = "PUSHCI_ARCHIVE_ROOT", default_value = "logs")]
        archive_root: PathBuf,

        #[command(subcommand)]
        action: LogsAction,
    },

    /// Manage repository workspaces
    Workspace {
        /// Directory holding per-repository checkouts
        #[arg(long, env = "PUSHCI_WORKSPACE_ROOT", default_value = "repos")]
        workspace_root: PathBuf,

        #[command(subcommand)]
        action: WorkspaceAction,
    },
}

#[derive(Subcommand)]
enum LogsAction {
    /// List repositories with archived runs
    Repos,

    /// List the records of one repository, oldest first
    List {
        /// Repository (owner/name)
        repo: String,
    },

    /// Print one record
    Show {
        /// Record locator (owner/name/timestamp)
        locator: String,
    },
}

#[derive(Subcommand)]
enum WorkspaceAction {
    /// Delete the workspace of a repository
    Rm {
        /// Repository (owner/name)
        repo: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    pushci_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            payload,
            workspace_root,
            archive_root,
            token_file,
            api_url,
            toolchain,
            public_url,
            context,
        } => {
            let archive = Arc::new(FsLogArchive::new(&archive_root).context("Failed to open archive")?);
            let reporter = GitHubStatusReporter::new(GitHubConfig::new(api_url, token_file))
                .context("Failed to build GitHub client")?;
            let deps = PipelineDeps::new(
                workspace_root,
                Arc::new(ProcessRunner::new()),
                Duration::from_secs(DEFAULT_GIT_TIMEOUT_SECS),
                Arc::new(reporter),
                archive,
            );
            let config = PipelineConfig {
                context,
                ..PipelineConfig::for_toolchain(toolchain, public_url)
            };
            cmd_run(&Pipeline::new(deps, config), &payload).await
        }
        Commands::Logs { archive_root, action } => {
            let archive = FsLogArchive::new(&archive_root).context("Failed to open archive")?;
            match action {
                LogsAction::Repos => cmd_logs_repos(&archive),
                LogsAction::List { repo } => cmd_logs_list(&archive, &repo),
                LogsAction::Show { locator } => cmd_logs_show(&archive, &locator),
            }
        }
        Commands::Workspace { workspace_root, action } => match action {
            WorkspaceAction::Rm { repo } => cmd_workspace_rm(&workspace_root, &repo),
        },
    }
}

fn load_payload(path: &Path) -> Result<PushEvent> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid push payload in {}", path.display()))
}

async fn cmd_run(pipeline: &Pipeline, payload: &Path) -> Result<()> {
    let event = load_payload(payload)?;
    info!(repo = %event.repo_full_name, branch_ref = %event.branch_ref, "running pipeline");

    let report = pipeline.run(&event).await;
    print_report(pipeline, &report);

    if report.succeeded() {
        println!("\n✓ Build and tests passed");
        Ok(())
    } else {
        anyhow::bail!("Pipeline did not succeed")
    }
}

fn print_report(pipeline: &Pipeline, report: &PipelineReport) {
    println!("Run ID:     {}", report.run_id);
    println!("Repository: {}", report.repo);
    println!("Commit:     {}", report.commit_sha);
    let trace: Vec<&str> = report.trace.iter().map(|s| s.as_str()).collect();
    println!("Trace:      {}", trace.join(" → "));
    println!("Duration:   {}ms", report.duration_ms);
    println!();

    for (name, outcome) in [("build", &report.build), ("test", &report.test)] {
        match outcome {
            Some(o) => println!("  {name}: {} ({}ms)", o.kind, o.duration_ms),
            None => println!("  {name}: not run"),
        }
    }
    for status in &report.statuses {
        println!("  status: {} - {}", status.state, status.description);
    }
    if let Some(locator) = &report.locator {
        println!("  record: {}", pipeline.config().target_url(locator));
    }
    if let Terminal::Aborted { stage, reason } = &report.terminal {
        println!("  aborted in {stage}: {reason}");
    }
    if let Some(err) = &report.cleanup_error {
        println!("  cleanup failed: {err}");
    }
}

fn cmd_logs_repos(archive: &dyn LogArchive) -> Result<()> {
    let repos = archive.repositories()?;
    if repos.is_empty() {
        println!("No archived runs.");
    }
    for repo in repos {
        println!("{repo}");
    }
    Ok(())
}

fn cmd_logs_list(archive: &dyn LogArchive, repo: &str) -> Result<()> {
    let repo = RepoName::parse(repo)?;
    let locators = archive.list(&repo)?;
    if locators.is_empty() {
        println!("No archived runs for {repo}.");
    }
    for locator in locators {
        let record = archive.lookup(&locator)?;
        println!("{locator}  build={} test={}", record.build_status, record.test_status);
    }
    Ok(())
}

fn cmd_logs_show(archive: &dyn LogArchive, locator: &str) -> Result<()> {
    let locator: RecordLocator = locator.parse()?;
    let record = archive.lookup(&locator)?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn cmd_workspace_rm(workspace_root: &Path, repo: &str) -> Result<()> {
    let repo = RepoName::parse(repo)?;
    // Deletion only; the runner is never invoked.
    let manager = WorkspaceManager::new(
        workspace_root,
        Arc::new(ProcessRunner::new()),
        Duration::from_secs(DEFAULT_GIT_TIMEOUT_SECS),
    );
    let path = manager.workspace_path(&repo);
    manager
        .destroy(&path)
        .with_context(|| format!("Failed to remove workspace of {repo}"))?;
    println!("Removed {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use commit_status::RecordingReporter;
    use pushci_ci::ScriptedRunner;
    use pushci_core::{CommandOutcome, RunRecord};
    use serde_json::json;

    fn payload_file(dir: &Path) -> PathBuf {
        let path = dir.join("push.json");
        let payload = json!({
            "ref": "refs/heads/main",
            "after": "abc123",
            "repository": { "full_name": "octo/hello", "clone_url": "https://github.com/octo/hello.git" }
        });
        std::fs::write(&path, payload.to_string()).unwrap();
        path
    }

    fn scripted_pipeline(dir: &Path, runner: ScriptedRunner) -> (Pipeline, Arc<FsLogArchive>) {
        let archive = Arc::new(FsLogArchive::new(dir.join("logs")).unwrap());
        let deps = PipelineDeps::new(
            dir.join("repos"),
            Arc::new(runner),
            Duration::from_secs(60),
            Arc::new(RecordingReporter::new()),
            archive.clone(),
        );
        let pipeline = Pipeline::new(deps, PipelineConfig::for_toolchain(Toolchain::Gradle, "http://ci.local"));
        (pipeline, archive)
    }

    #[tokio::test]
    async fn test_run_succeeds_for_passing_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, archive) = scripted_pipeline(dir.path(), ScriptedRunner::new());

        cmd_run(&pipeline, &payload_file(dir.path())).await.unwrap();
        assert_eq!(archive.list(&RepoName::parse("octo/hello").unwrap()).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_run_fails_for_failing_build() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new().on(&["./gradlew", "build"], CommandOutcome::failure(1, "nope"));
        let (pipeline, _archive) = scripted_pipeline(dir.path(), runner);

        assert!(cmd_run(&pipeline, &payload_file(dir.path())).await.is_err());
    }

    #[tokio::test]
    async fn test_run_rejects_bad_payload() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, _archive) = scripted_pipeline(dir.path(), ScriptedRunner::new());
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{").unwrap();

        let err = cmd_run(&pipeline, &path).await.unwrap_err();
        assert!(err.to_string().contains("Invalid push payload"));
    }

    #[test]
    fn test_logs_commands() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FsLogArchive::new(dir.path()).unwrap();
        let repo = RepoName::parse("octo/hello").unwrap();
        let locator = archive
            .archive(&repo, RunRecord::new("abc123", &CommandOutcome::success("ok"), None))
            .unwrap();

        cmd_logs_repos(&archive).unwrap();
        cmd_logs_list(&archive, "octo/hello").unwrap();
        cmd_logs_show(&archive, &locator.to_string()).unwrap();

        assert!(cmd_logs_list(&archive, "../etc").is_err());
        assert!(cmd_logs_show(&archive, "octo/hello/2020-01-01T00:00:00.000000+00:00").is_err());
    }

    #[test]
    fn test_workspace_rm() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path().join("octo").join("hello");
        std::fs::create_dir_all(ws.join(".git")).unwrap();

        cmd_workspace_rm(dir.path(), "octo/hello").unwrap();
        assert!(!ws.exists());

        // Explicit removal of something absent is an error.
        assert!(cmd_workspace_rm(dir.path(), "octo/hello").is_err());
        assert!(cmd_workspace_rm(dir.path(), "octo/../..").is_err());
    }
}
