//! PushCI daemon
//!
//! Receives GitHub push webhooks, runs one pipeline per push on its own
//! task, and serves the archived run records.
//!
//! ## Endpoints
//!
//! - `POST /webhook`: push notifications (`X-GitHub-Event: push`)
//! - `GET /logs`: repositories with archived runs
//! - `GET /logs/{owner}/{name}`: record locators of one repository
//! - `GET /logs/{owner}/{name}/{timestamp}`: one run record
//! - `GET /health`: liveness

pub mod config;
pub mod error;
pub mod routes;

pub use config::Config;
pub use error::ApiError;
pub use routes::{router, AppState};
