//! Lazily loaded API token.
//!
//! The token lives in a `KEY=value` properties file under [`TOKEN_PROPERTY`].
//! It is read on first use and cached for the life of the provider; a failed
//! load is not cached, so fixing the file takes effect on the next report.

use std::path::{Path, PathBuf};

use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::{Result, StatusError};

/// Property holding the personal access token.
pub const TOKEN_PROPERTY: &str = "GITHUB_TOKEN";

#[derive(Debug)]
pub struct TokenProvider {
    source: Option<PathBuf>,
    cached: OnceCell<String>,
}

impl TokenProvider {
    /// Read the token from `path` on first use.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            source: Some(path.into()),
            cached: OnceCell::new(),
        }
    }

    /// Use a token supplied directly.
    pub fn fixed(token: impl Into<String>) -> Self {
        Self {
            source: None,
            cached: OnceCell::new_with(Some(token.into())),
        }
    }

    /// The token, loading it if this is the first call.
    pub async fn token(&self) -> Result<&str> {
        let token = self
            .cached
            .get_or_try_init(|| async {
                match &self.source {
                    Some(path) => load_token(path),
                    None => Err(StatusError::MissingToken("no token source configured".to_string())),
                }
            })
            .await?;
        Ok(token.as_str())
    }
}

fn load_token(path: &Path) -> Result<String> {
    let entries = dotenvy::from_path_iter(path).map_err(|e| {
        if e.not_found() {
            StatusError::MissingToken(format!("{} does not exist", path.display()))
        } else {
            StatusError::TokenSource(format!("{}: {e}", path.display()))
        }
    })?;

    for entry in entries {
        let (key, value) = entry.map_err(|e| StatusError::TokenSource(format!("{}: {e}", path.display())))?;
        if key != TOKEN_PROPERTY {
            continue;
        }
        let value = value.trim();
        if value.is_empty() {
            return Err(StatusError::MissingToken(format!(
                "{TOKEN_PROPERTY} is blank in {}",
                path.display()
            )));
        }
        debug!(source = %path.display(), "loaded API token");
        return Ok(value.to_string());
    }

    Err(StatusError::MissingToken(format!(
        "{TOKEN_PROPERTY} not set in {}",
        path.display()
    )))
}
