//! In-memory fake for the archive trait (testing only)
//!
//! Provides `MemoryLogArchive`, which satisfies the `LogArchive` contract
//! without touching the filesystem.

use std::collections::BTreeMap;
use std::sync::Mutex;

use pushci_core::{RecordLocator, RepoName, RunRecord};

use crate::error::{ArchiveError, ArchiveResult};
use crate::storage_traits::LogArchive;

/// In-memory archive backed by a `BTreeMap<RepoName, BTreeMap<key, record>>`.
#[derive(Debug, Default)]
pub struct MemoryLogArchive {
    records: Mutex<BTreeMap<RepoName, BTreeMap<String, RunRecord>>>,
}

impl MemoryLogArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored records across all repositories.
    pub fn len(&self) -> usize {
        let records = self.records.lock().unwrap();
        records.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogArchive for MemoryLogArchive {
    fn archive(&self, repo: &RepoName, mut record: RunRecord) -> ArchiveResult<RecordLocator> {
        let mut records = self.records.lock().unwrap();
        let ns = records.entry(repo.clone()).or_default();
        while ns.contains_key(&record.key()) {
            record.timestamp += chrono::Duration::microseconds(1);
        }
        let locator = RecordLocator::for_record(repo, &record);
        ns.insert(record.key(), record);
        Ok(locator)
    }

    fn lookup(&self, locator: &RecordLocator) -> ArchiveResult<RunRecord> {
        let records = self.records.lock().unwrap();
        records
            .get(&locator.repo)
            .and_then(|ns| ns.get(&locator.key()))
            .cloned()
            .ok_or_else(|| ArchiveError::not_found(locator))
    }

    fn list(&self, repo: &RepoName) -> ArchiveResult<Vec<RecordLocator>> {
        let records = self.records.lock().unwrap();
        let mut locators: Vec<RecordLocator> = records
            .get(repo)
            .map(|ns| {
                ns.values()
                    .map(|r| RecordLocator::for_record(repo, r))
                    .collect()
            })
            .unwrap_or_default();
        locators.sort_by_key(|l| l.timestamp);
        Ok(locators)
    }

    fn repositories(&self) -> ArchiveResult<Vec<RepoName>> {
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .filter(|(_, ns)| !ns.is_empty())
            .map(|(repo, _)| repo.clone())
            .collect())
    }
}
