//! HTTP routes.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use pushci_archive::LogArchive;
use pushci_ci::Pipeline;
use pushci_core::{PushEvent, RecordLocator, RepoName, RunRecord};
use serde_json::{json, Value};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::error::ApiError;

/// Header naming the webhook event type.
pub const EVENT_HEADER: &str = "x-github-event";

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    archive: Arc<dyn LogArchive>,
    runs: TaskTracker,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, archive: Arc<dyn LogArchive>) -> Self {
        Self {
            pipeline,
            archive,
            runs: TaskTracker::new(),
        }
    }

    /// Number of pipelines still running.
    pub fn running(&self) -> usize {
        self.runs.len()
    }

    /// Stop accepting runs and wait for the running ones to finish.
    pub async fn drain(&self) {
        self.runs.close();
        if !self.runs.is_empty() {
            info!(running = self.runs.len(), "waiting for running pipelines");
        }
        self.runs.wait().await;
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(webhook))
        .route("/logs", get(list_repositories))
        .route("/logs/{owner}/{name}", get(list_records))
        .route("/logs/{owner}/{name}/{timestamp}", get(get_record))
        .route("/health", get(health))
        .with_state(state)
}

fn ignored(reason: &str) -> (StatusCode, Json<Value>) {
    debug!(reason, "webhook ignored");
    (StatusCode::OK, Json(json!({ "status": "ignored", "reason": reason })))
}

async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let event_type = headers.get(EVENT_HEADER).and_then(|v| v.to_str().ok());
    if event_type != Some("push") {
        return Ok(ignored("not a push event"));
    }
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ignored("empty payload"));
    }

    let event: PushEvent =
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(format!("malformed push payload: {e}")))?;
    info!(repo = %event.repo_full_name, branch_ref = %event.branch_ref, commit = %event.commit_sha, "push received");

    let response = json!({
        "status": "accepted",
        "repository": event.repo_full_name,
        "commit": event.commit_sha,
    });

    if state.runs.is_closed() {
        return Err(ApiError::Unavailable("shutting down".to_string()));
    }
    let pipeline = state.pipeline.clone();
    state.runs.spawn(async move {
        let report = pipeline.run(&event).await;
        if report.is_aborted() {
            warn!(run_id = %report.run_id, terminal = ?report.terminal, "pipeline aborted");
        }
    });

    Ok((StatusCode::ACCEPTED, Json(response)))
}

async fn list_repositories(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    let repos = state.archive.repositories()?;
    Ok(Json(repos.iter().map(RepoName::to_string).collect()))
}

async fn list_records(
    State(state): State<AppState>,
    Path((owner, name)): Path<(String, String)>,
) -> Result<Json<Vec<String>>, ApiError> {
    let repo = RepoName::parse(&format!("{owner}/{name}"))?;
    let locators = state.archive.list(&repo)?;
    Ok(Json(locators.iter().map(RecordLocator::to_string).collect()))
}

async fn get_record(
    State(state): State<AppState>,
    Path((owner, name, timestamp)): Path<(String, String, String)>,
) -> Result<Json<RunRecord>, ApiError> {
    let locator: RecordLocator = format!("{owner}/{name}/{timestamp}").parse()?;
    Ok(Json(state.archive.lookup(&locator)?))
}

async fn health() -> &'static str {
    "ok"
}
