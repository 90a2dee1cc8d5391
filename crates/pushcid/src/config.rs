//! Daemon configuration: command-line flags with environment fallbacks.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use commit_status::{GitHubConfig, GitHubStatusReporter, DEFAULT_API_URL};
use pushci_archive::FsLogArchive;
use pushci_ci::pipeline::DEFAULT_CONTEXT;
use pushci_ci::workspace::DEFAULT_GIT_TIMEOUT_SECS;
use pushci_ci::{Pipeline, PipelineConfig, PipelineDeps, ProcessRunner, Toolchain};

use crate::routes::AppState;

#[derive(Debug, Clone, Parser)]
#[command(name = "pushcid")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Push-triggered build and test daemon", long_about = None)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "PUSHCI_LISTEN", default_value = "0.0.0.0:8019")]
    pub listen: SocketAddr,

    /// Directory holding per-repository checkouts
    #[arg(long, env = "PUSHCI_WORKSPACE_ROOT", default_value = "repos")]
    pub workspace_root: PathBuf,

    /// Directory holding archived run records
    #[arg(long, env = "PUSHCI_ARCHIVE_ROOT", default_value = "logs")]
    pub archive_root: PathBuf,

    /// Base URL used in commit status links (default: http://localhost:<port>)
    #[arg(long, env = "PUSHCI_PUBLIC_URL")]
    pub public_url: Option<String>,

    /// Properties file containing GITHUB_TOKEN
    #[arg(long, env = "PUSHCI_TOKEN_FILE", default_value = "config.properties")]
    pub token_file: PathBuf,

    /// GitHub REST API root
    #[arg(long, env = "PUSHCI_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Build tool of the repositories (gradle or cargo)
    #[arg(long, env = "PUSHCI_TOOLCHAIN", default_value = "gradle")]
    pub toolchain: Toolchain,

    /// Commit status context
    #[arg(long, env = "PUSHCI_CONTEXT", default_value = DEFAULT_CONTEXT)]
    pub context: String,

    /// Timeout for git clone/checkout, in seconds
    #[arg(long, env = "PUSHCI_GIT_TIMEOUT_SECS", default_value_t = DEFAULT_GIT_TIMEOUT_SECS)]
    pub git_timeout_secs: u64,

    /// Timeout for one commit status request, in seconds
    #[arg(long, env = "PUSHCI_STATUS_TIMEOUT_SECS", default_value_t = 30)]
    pub status_timeout_secs: u64,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    pub json: bool,
}

impl Config {
    pub fn public_url(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.listen.port()))
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            context: self.context.clone(),
            ..PipelineConfig::for_toolchain(self.toolchain, self.public_url())
        }
    }

    /// Wire the production collaborators into the router state.
    pub fn build_state(&self) -> Result<AppState> {
        let archive = Arc::new(
            FsLogArchive::new(&self.archive_root)
                .with_context(|| format!("Failed to open archive at {}", self.archive_root.display()))?,
        );
        let reporter = GitHubStatusReporter::new(
            GitHubConfig::new(&self.api_url, &self.token_file)
                .with_timeout(Duration::from_secs(self.status_timeout_secs)),
        )
        .context("Failed to build GitHub client")?;

        let deps = PipelineDeps::new(
            &self.workspace_root,
            Arc::new(ProcessRunner::new()),
            Duration::from_secs(self.git_timeout_secs),
            Arc::new(reporter),
            archive.clone(),
        );
        let pipeline = Pipeline::new(deps, self.pipeline_config());
        Ok(AppState::new(Arc::new(pipeline), archive))
    }
}
