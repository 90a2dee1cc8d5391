//! Per-repository mutual exclusion.
//!
//! Every run for a repository uses the same workspace path, so runs for one
//! repository are serialised while runs for different repositories proceed
//! concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use pushci_core::RepoName;
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

type LockMap = HashMap<RepoName, Arc<tokio::sync::Mutex<()>>>;

/// Named locks keyed by repository. Cheap to clone; clones share the map.
#[derive(Debug, Clone, Default)]
pub struct RepoLocks {
    inner: Arc<Mutex<LockMap>>,
}

/// Held for the duration of a run. Releases the lock on drop and prunes the
/// map entry when nobody else is waiting for it.
#[derive(Debug)]
pub struct RepoGuard {
    guard: Option<OwnedMutexGuard<()>>,
    repo: RepoName,
    locks: RepoLocks,
}

impl RepoLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other run holds `repo`, then take it.
    pub async fn acquire(&self, repo: &RepoName) -> RepoGuard {
        let lock = self.map().entry(repo.clone()).or_default().clone();
        if lock.try_lock().is_err() {
            debug!(repo = %repo, "waiting for running pipeline on same repository");
        }
        let guard = lock.lock_owned().await;
        RepoGuard {
            guard: Some(guard),
            repo: repo.clone(),
            locks: self.clone(),
        }
    }

    /// Number of repositories with a held or awaited lock.
    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }

    fn map(&self) -> MutexGuard<'_, LockMap> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RepoGuard {
    pub fn repo(&self) -> &RepoName {
        &self.repo
    }
}

impl Drop for RepoGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut map = self.locks.map();
        // Only the map itself still references an idle lock.
        if map.get(&self.repo).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            map.remove(&self.repo);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn repo(name: &str) -> RepoName {
        RepoName::parse(name).unwrap()
    }

    #[tokio::test]
    async fn same_repository_is_serialised() {
        let locks = RepoLocks::new();
        let first = locks.acquire(&repo("octo/hello")).await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.acquire(&repo("octo/hello")).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(first);
        let second = tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert_eq!(second.repo(), &repo("octo/hello"));
    }

    #[tokio::test]
    async fn different_repositories_do_not_block() {
        let locks = RepoLocks::new();
        let _a = locks.acquire(&repo("octo/hello")).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire(&repo("octo/world"))).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn idle_entries_are_pruned() {
        let locks = RepoLocks::new();
        {
            let _guard = locks.acquire(&repo("octo/hello")).await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }
}
