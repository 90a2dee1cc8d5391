//! GitHub REST implementation of [`StatusReporter`].

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use pushci_core::{CommitStatus, RepoName};
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, StatusError};
use crate::token::TokenProvider;
use crate::StatusReporter;

/// Public GitHub API root.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const API_VERSION: &str = "2022-11-28";
const MEDIA_TYPE: &str = "application/vnd.github+json";

/// Configuration for [`GitHubStatusReporter`].
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// API root, without trailing slash. Overridable for GitHub Enterprise and tests.
    pub api_url: String,
    /// Properties file holding the token.
    pub token_file: PathBuf,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token_file: PathBuf::from("config.properties"),
            timeout: Duration::from_secs(30),
        }
    }
}

impl GitHubConfig {
    pub fn new(api_url: impl Into<String>, token_file: impl Into<PathBuf>) -> Self {
        Self {
            api_url: api_url.into(),
            token_file: token_file.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// JSON body of a status update. Absent fields are sent as empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBody {
    pub state: String,
    pub target_url: String,
    pub description: String,
    pub context: String,
}

impl From<&CommitStatus> for StatusBody {
    fn from(status: &CommitStatus) -> Self {
        Self {
            state: status.state.as_str().to_string(),
            target_url: status.target_url.clone().unwrap_or_default(),
            description: status.description.clone(),
            context: status.context.clone(),
        }
    }
}

/// Posts to `POST {api}/repos/{owner}/{repo}/statuses/{sha}`.
pub struct GitHubStatusReporter {
    api_url: String,
    token: TokenProvider,
    http: reqwest::Client,
}

impl GitHubStatusReporter {
    /// Build a reporter that reads its token from `config.token_file`.
    pub fn new(config: GitHubConfig) -> Result<Self> {
        let token = TokenProvider::from_file(&config.token_file);
        Self::with_token_provider(config, token)
    }

    pub fn with_token_provider(config: GitHubConfig, token: TokenProvider) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("pushci/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token,
            http,
        })
    }

    fn statuses_url(&self, repo: &RepoName, sha: &str) -> String {
        format!("{}/repos/{}/{}/statuses/{}", self.api_url, repo.owner(), repo.name(), sha)
    }
}

/// Commit identifiers are interpolated into the request path.
fn check_sha(sha: &str) -> Result<()> {
    if sha.is_empty() || !sha.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(StatusError::InvalidCommit(sha.to_string()));
    }
    Ok(())
}

#[async_trait]
impl StatusReporter for GitHubStatusReporter {
    async fn report(&self, repo: &RepoName, sha: &str, status: &CommitStatus) -> Result<()> {
        check_sha(sha)?;
        let token = self.token.token().await?;
        let url = self.statuses_url(repo, sha);
        let body = StatusBody::from(status);

        debug!(%url, state = %status.state, "posting commit status");
        let response = self
            .http
            .post(&url)
            .header(ACCEPT, MEDIA_TYPE)
            .header("X-GitHub-Api-Version", API_VERSION)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let code = response.status().as_u16();
        if code == 200 || code == 201 {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!(repo = %repo, sha, status = code, "commit status rejected");
        Err(StatusError::RemoteRejected { status: code, body })
    }
}
