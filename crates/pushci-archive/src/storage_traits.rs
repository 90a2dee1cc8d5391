//! Storage trait definition for the run log archive.

use pushci_core::{RecordLocator, RepoName, RunRecord};

use crate::error::ArchiveResult;

/// Archive of run records, namespaced by repository.
///
/// Guarantees:
/// - `archive` is atomic: either the complete record becomes visible or an
///   error is returned and nothing is visible.
/// - Records are never overwritten. If a record with the same timestamp
///   already exists the new record's timestamp is advanced until it is
///   unique, and the returned locator reflects the stored timestamp.
/// - `lookup` returns exactly the record that was archived.
/// - `list` is ordered by timestamp, oldest first.
pub trait LogArchive: Send + Sync {
    /// Persist `record` under `repo` and return its locator.
    fn archive(&self, repo: &RepoName, record: RunRecord) -> ArchiveResult<RecordLocator>;

    /// Retrieve a record. Returns `ArchiveError::NotFound` if absent.
    fn lookup(&self, locator: &RecordLocator) -> ArchiveResult<RunRecord>;

    /// Locators of every record archived for `repo`. Empty if none.
    fn list(&self, repo: &RepoName) -> ArchiveResult<Vec<RecordLocator>>;

    /// Repositories with at least one archived record, sorted.
    fn repositories(&self) -> ArchiveResult<Vec<RepoName>>;
}
