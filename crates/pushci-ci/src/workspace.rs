//! Per-repository checkout directories.
//!
//! A workspace lives at `<root>/<owner>/<name>`. The repository name is
//! validated with [`RepoName::parse`] before any path is built, so nothing
//! outside `root` is ever touched.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use pushci_core::{PushCiError, RepoName, ValidationError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::runner::CommandRunner;

/// Default timeout for `git clone` / `git checkout`.
pub const DEFAULT_GIT_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("invalid repository name: {0}")]
    InvalidName(#[from] ValidationError),

    #[error("clone of {url} failed: {log}")]
    CloneFailed { url: String, log: String },

    #[error("{} is not a git repository", .0.display())]
    NotARepository(PathBuf),

    #[error("checkout of branch {branch:?} failed: {log}")]
    CheckoutFailed { branch: String, log: String },

    #[error("{} does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl WorkspaceError {
    fn io(path: &Path, source: io::Error) -> Self {
        WorkspaceError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl From<WorkspaceError> for PushCiError {
    fn from(err: WorkspaceError) -> Self {
        match err {
            WorkspaceError::InvalidName(e) => PushCiError::Validation(e),
            e @ (WorkspaceError::CloneFailed { .. } | WorkspaceError::CheckoutFailed { .. }) => {
                PushCiError::Process(e.to_string())
            }
            e => PushCiError::Filesystem(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkspaceError>;

/// Clones, checks out and deletes repository workspaces.
#[derive(Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
    runner: Arc<dyn CommandRunner>,
    git_timeout: Duration,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>, git_timeout: Duration) -> Self {
        Self {
            root: root.into(),
            runner,
            git_timeout,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<owner>/<name>`.
    pub fn workspace_path(&self, repo: &RepoName) -> PathBuf {
        self.root.join(repo.relative_path())
    }

    /// Validate `repo_full_name`, then clone `clone_url` into its workspace.
    ///
    /// Fails with [`WorkspaceError::InvalidName`] before touching the
    /// filesystem when the name is not path-safe.
    pub async fn prepare(&self, repo_full_name: &str, clone_url: &str) -> Result<PathBuf> {
        let repo = RepoName::parse(repo_full_name)?;
        self.prepare_repo(&repo, clone_url).await
    }

    /// Clone `clone_url` into the workspace of an already validated repository.
    ///
    /// A leftover directory from an earlier run is removed first.
    pub async fn prepare_repo(&self, repo: &RepoName, clone_url: &str) -> Result<PathBuf> {
        let path = self.workspace_path(repo);

        match fs::symlink_metadata(&path) {
            Ok(meta) if meta.is_dir() => {
                warn!(path = %path.display(), "removing stale workspace");
                self.destroy(&path)?;
            }
            Ok(_) => fs::remove_file(&path).map_err(|e| WorkspaceError::io(&path, e))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(WorkspaceError::io(&path, e)),
        }

        let parent = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent).map_err(|e| WorkspaceError::io(parent, e))?;

        let argv = vec![
            "git".to_string(),
            "clone".to_string(),
            "--".to_string(),
            clone_url.to_string(),
            path.to_string_lossy().into_owned(),
        ];
        info!(repo = %repo, url = %clone_url, "cloning");
        let outcome = self.runner.run(parent, &argv, self.git_timeout).await;
        if !outcome.passed() {
            return Err(WorkspaceError::CloneFailed {
                url: clone_url.to_string(),
                log: outcome.full_log(),
            });
        }
        Ok(path)
    }

    /// Check out `branch` in an existing clone.
    pub async fn checkout(&self, path: &Path, branch: &str) -> Result<()> {
        if !path.join(".git").exists() {
            return Err(WorkspaceError::NotARepository(path.to_path_buf()));
        }
        // Git would take these as options.
        if branch.starts_with('-') {
            return Err(WorkspaceError::CheckoutFailed {
                branch: branch.to_string(),
                log: "branch name looks like an option".to_string(),
            });
        }

        let argv = vec!["git".to_string(), "checkout".to_string(), branch.to_string()];
        let outcome = self.runner.run(path, &argv, self.git_timeout).await;
        if !outcome.passed() {
            return Err(WorkspaceError::CheckoutFailed {
                branch: branch.to_string(),
                log: outcome.full_log(),
            });
        }
        debug!(path = %path.display(), branch, "checked out");
        Ok(())
    }

    /// Delete a workspace directory tree.
    ///
    /// Walks post-order, removing files before their directories, and keeps
    /// going past individual failures; the first failure is returned once
    /// everything removable is gone. Symlinks are removed, never followed.
    pub fn destroy(&self, path: &Path) -> Result<()> {
        let meta = fs::symlink_metadata(path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                WorkspaceError::NotFound(path.to_path_buf())
            } else {
                WorkspaceError::io(path, e)
            }
        })?;
        if !meta.is_dir() {
            return Err(WorkspaceError::NotADirectory(path.to_path_buf()));
        }

        let mut first_error = None;
        remove_tree(path, &mut first_error);
        match first_error {
            Some(e) => Err(e),
            None => {
                debug!(path = %path.display(), "workspace removed");
                Ok(())
            }
        }
    }

    /// [`destroy`](Self::destroy) that treats an absent path as done.
    ///
    /// Returns whether anything was removed.
    pub fn destroy_if_exists(&self, path: &Path) -> Result<bool> {
        match self.destroy(path) {
            Ok(()) => Ok(true),
            Err(WorkspaceError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// [`destroy_if_exists`](Self::destroy_if_exists) on the blocking pool.
    pub async fn release(&self, path: &Path) -> Result<bool> {
        let manager = self.clone();
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || manager.destroy_if_exists(&owned))
            .await
            .map_err(|e| WorkspaceError::io(path, io::Error::new(io::ErrorKind::Other, e)))?
    }
}

fn remove_tree(dir: &Path, first_error: &mut Option<WorkspaceError>) {
    match fs::read_dir(dir) {
        Ok(entries) => {
            for entry in entries {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        note(dir, Err(e), first_error);
                        continue;
                    }
                };
                let path = entry.path();
                match entry.file_type() {
                    Ok(ft) if ft.is_dir() => remove_tree(&path, first_error),
                    Ok(_) => note(&path, fs::remove_file(&path), first_error),
                    Err(e) => note(&path, Err(e), first_error),
                }
            }
        }
        Err(e) => note(dir, Err(e), first_error),
    }

    note(dir, fs::remove_dir(dir), first_error);
}

fn note(path: &Path, result: io::Result<()>, first_error: &mut Option<WorkspaceError>) {
    if let Err(e) = result {
        warn!(path = %path.display(), error = %e, "failed to remove");
        first_error.get_or_insert_with(|| WorkspaceError::io(path, e));
    }
}
