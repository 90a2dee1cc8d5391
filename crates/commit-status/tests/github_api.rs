//! Exercises GitHubStatusReporter against a local stand-in for the API.

use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use commit_status::{GitHubConfig, GitHubStatusReporter, StatusError, StatusReporter, TokenProvider};
use pushci_core::{CommitState, CommitStatus, RepoName};
use serde_json::Value;

#[derive(Debug, Clone)]
struct Captured {
    path: (String, String, String),
    headers: HeaderMap,
    body: Value,
}

#[derive(Clone)]
struct FakeApi {
    reply: StatusCode,
    seen: Arc<Mutex<Vec<Captured>>>,
}

async fn statuses(
    State(api): State<FakeApi>,
    Path(path): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, &'static str) {
    api.seen.lock().unwrap().push(Captured { path, headers, body });
    (api.reply, "{}")
}

/// Serve the fake API on an ephemeral port; returns its base URL.
async fn spawn_api(reply: StatusCode) -> (String, Arc<Mutex<Vec<Captured>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/repos/{owner}/{repo}/statuses/{sha}", post(statuses))
        .with_state(FakeApi {
            reply,
            seen: seen.clone(),
        });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), seen)
}

fn reporter(base: &str) -> GitHubStatusReporter {
    GitHubStatusReporter::with_token_provider(GitHubConfig::new(base, "unused"), TokenProvider::fixed("ghp_test"))
        .unwrap()
}

fn repo() -> RepoName {
    RepoName::parse("octo/hello").unwrap()
}

#[tokio::test]
async fn created_status_is_success() {
    let (base, seen) = spawn_api(StatusCode::CREATED).await;
    let status = CommitStatus::new(CommitState::Failure, "build failed", "continuous integration")
        .with_target_url("http://ci.local/logs/octo/hello/2026-02-09T13:17:20.000000+01:00");

    reporter(&base).report(&repo(), "abc123", &status).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let call = &seen[0];
    assert_eq!(call.path, ("octo".into(), "hello".into(), "abc123".into()));
    assert_eq!(call.headers["authorization"], "Bearer ghp_test");
    assert_eq!(call.headers["accept"], "application/vnd.github+json");
    assert_eq!(call.headers["x-github-api-version"], "2022-11-28");
    assert!(call.headers["user-agent"].to_str().unwrap().starts_with("pushci/"));
    assert_eq!(call.body["state"], "failure");
    assert_eq!(call.body["description"], "build failed");
    assert_eq!(call.body["context"], "continuous integration");
    assert_eq!(
        call.body["target_url"],
        "http://ci.local/logs/octo/hello/2026-02-09T13:17:20.000000+01:00"
    );
}

#[tokio::test]
async fn absent_target_url_is_sent_as_empty_string() {
    let (base, seen) = spawn_api(StatusCode::CREATED).await;
    let status = CommitStatus::new(CommitState::Pending, "build started", "continuous integration");

    reporter(&base).report(&repo(), "abc123", &status).await.unwrap();

    let body = seen.lock().unwrap()[0].body.clone();
    assert_eq!(body["target_url"], "");
    assert_eq!(body.as_object().unwrap().len(), 4);
}

#[tokio::test]
async fn ok_is_also_accepted() {
    let (base, _seen) = spawn_api(StatusCode::OK).await;
    let status = CommitStatus::new(CommitState::Success, "tests passed", "ci");
    assert!(reporter(&base).report(&repo(), "abc123", &status).await.is_ok());
}

#[tokio::test]
async fn other_responses_are_rejections() {
    for code in [StatusCode::ACCEPTED, StatusCode::UNPROCESSABLE_ENTITY, StatusCode::INTERNAL_SERVER_ERROR] {
        let (base, _seen) = spawn_api(code).await;
        let status = CommitStatus::new(CommitState::Pending, "build started", "ci");
        match reporter(&base).report(&repo(), "abc123", &status).await {
            Err(StatusError::RemoteRejected { status, .. }) => assert_eq!(status, code.as_u16()),
            other => panic!("expected rejection for {code}, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn unreachable_api_is_http_error() {
    // Bind then drop to get a port nobody listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let status = CommitStatus::new(CommitState::Pending, "build started", "ci");
    assert!(matches!(
        reporter(&base).report(&repo(), "abc123", &status).await,
        Err(StatusError::Http(_))
    ));
}

#[tokio::test]
async fn missing_token_file_fails_before_sending() {
    let (base, seen) = spawn_api(StatusCode::CREATED).await;
    let dir = tempfile::tempdir().unwrap();
    let reporter = GitHubStatusReporter::new(GitHubConfig::new(&base, dir.path().join("config.properties"))).unwrap();

    let status = CommitStatus::new(CommitState::Pending, "build started", "ci");
    assert!(matches!(
        reporter.report(&repo(), "abc123", &status).await,
        Err(StatusError::MissingToken(_))
    ));
    assert!(seen.lock().unwrap().is_empty());
}
