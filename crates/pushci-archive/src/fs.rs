use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use pushci_core::{RecordLocator, RepoName, RunRecord};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{ArchiveError, ArchiveResult};
use crate::storage_traits::LogArchive;

/// Attempts at finding a free timestamp before giving up.
const MAX_KEY_ATTEMPTS: u32 = 1000;

/// Filesystem-backed run archive.
///
/// Layout: `<root>/<owner>/<name>/<timestamp>.json`, one pretty-printed JSON
/// object per run.
pub struct FsLogArchive {
    root: PathBuf,
}

impl FsLogArchive {
    /// Create a new `FsLogArchive` rooted at `root`. Creates `root` if needed.
    pub fn new(root: impl AsRef<Path>) -> ArchiveResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn repo_dir(&self, repo: &RepoName) -> PathBuf {
        self.root.join(repo.relative_path())
    }

    /// On-disk location of the record a locator refers to.
    pub fn record_path(&self, locator: &RecordLocator) -> PathBuf {
        self.repo_dir(&locator.repo).join(locator.file_name())
    }
}

impl LogArchive for FsLogArchive {
    fn archive(&self, repo: &RepoName, mut record: RunRecord) -> ArchiveResult<RecordLocator> {
        let dir = self.repo_dir(repo);
        fs::create_dir_all(&dir)?;

        for _ in 0..MAX_KEY_ATTEMPTS {
            let locator = RecordLocator::for_record(repo, &record);
            let json = serde_json::to_vec_pretty(&record)?;

            // Atomic write: fully write a temp file in the same directory,
            // then link it into place without replacing an existing record.
            let mut tmp = NamedTempFile::new_in(&dir)?;
            tmp.write_all(&json)?;
            tmp.as_file().sync_all()?;

            match tmp.persist_noclobber(self.record_path(&locator)) {
                Ok(_) => {
                    debug!(locator = %locator, "record archived");
                    return Ok(locator);
                }
                Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                    record.timestamp += chrono::Duration::microseconds(1);
                }
                Err(e) => return Err(ArchiveError::Io(e.error)),
            }
        }

        Err(ArchiveError::Io(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("no free record key for {repo}"),
        )))
    }

    fn lookup(&self, locator: &RecordLocator) -> ArchiveResult<RunRecord> {
        let path = self.record_path(locator);
        let json = fs::read(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ArchiveError::not_found(locator)
            } else {
                ArchiveError::Io(e)
            }
        })?;
        Ok(serde_json::from_slice(&json)?)
    }

    fn list(&self, repo: &RepoName) -> ArchiveResult<Vec<RecordLocator>> {
        let read_dir = match fs::read_dir(self.repo_dir(repo)) {
            Ok(rd) => rd,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ArchiveError::Io(e)),
        };

        let mut locators = Vec::new();
        for entry in read_dir {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if !name.ends_with(".json") {
                continue;
            }
            // Anything that does not parse as a timestamp key is not ours.
            if let Ok(timestamp) = RecordLocator::parse_key(name) {
                locators.push(RecordLocator::new(repo.clone(), timestamp));
            }
        }

        locators.sort_by_key(|l| l.timestamp);
        Ok(locators)
    }

    fn repositories(&self) -> ArchiveResult<Vec<RepoName>> {
        let mut repos = Vec::new();
        for owner in fs::read_dir(&self.root)? {
            let owner = owner?;
            if !owner.file_type()?.is_dir() {
                continue;
            }
            for name in fs::read_dir(owner.path())? {
                let name = name?;
                if !name.file_type()?.is_dir() {
                    continue;
                }
                let full = format!(
                    "{}/{}",
                    owner.file_name().to_string_lossy(),
                    name.file_name().to_string_lossy()
                );
                if let Ok(repo) = RepoName::parse(&full) {
                    repos.push(repo);
                }
            }
        }
        repos.sort();
        Ok(repos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pushci_core::{CommandOutcome, RecordStatus};

    fn make_archive() -> (tempfile::TempDir, FsLogArchive) {
        let dir = tempfile::tempdir().unwrap();
        let archive = FsLogArchive::new(dir.path().join("logs")).unwrap();
        (dir, archive)
    }

    fn repo() -> RepoName {
        RepoName::parse("octo/hello").unwrap()
    }

    fn record() -> RunRecord {
        RunRecord::new(
            "abc123",
            &CommandOutcome::success("build ok"),
            Some(&CommandOutcome::failure(1, "1 failed")),
        )
    }

    #[test]
    fn record_lands_at_namespaced_path() {
        let (_dir, archive) = make_archive();
        let rec = record();
        let locator = archive.archive(&repo(), rec.clone()).unwrap();

        let path = archive.record_path(&locator);
        assert!(path.starts_with(archive.root().join("octo").join("hello")));
        assert_eq!(path.file_name().unwrap().to_string_lossy(), format!("{}.json", rec.key()));

        let on_disk: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(on_disk["commitIdentifier"], "abc123");
        assert_eq!(on_disk["testStatus"], "FAILURE");
    }

    #[test]
    fn no_temp_files_left_behind() {
        let (_dir, archive) = make_archive();
        archive.archive(&repo(), record()).unwrap();
        archive.archive(&repo(), record()).unwrap();

        let names: Vec<String> = fs::read_dir(archive.root().join("octo").join("hello"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|n| n.ends_with(".json")), "{names:?}");
    }

    #[test]
    fn colliding_timestamps_get_distinct_keys() {
        let (_dir, archive) = make_archive();
        let rec = record();
        let first = archive.archive(&repo(), rec.clone()).unwrap();
        let second = archive.archive(&repo(), rec.clone()).unwrap();

        assert_ne!(first, second);
        assert!(second.timestamp > first.timestamp);
        assert_eq!(archive.lookup(&first).unwrap(), rec);
        let stored = archive.lookup(&second).unwrap();
        assert_eq!(stored.key(), second.key());
        assert_eq!(stored.build_status, RecordStatus::Success);
    }

    #[test]
    fn list_ignores_foreign_files() {
        let (_dir, archive) = make_archive();
        let locator = archive.archive(&repo(), record()).unwrap();
        let dir = archive.root().join("octo").join("hello");
        fs::write(dir.join("notes.txt"), b"x").unwrap();
        fs::write(dir.join("garbage.json"), b"{}").unwrap();
        fs::create_dir(dir.join("sub")).unwrap();

        assert_eq!(archive.list(&repo()).unwrap(), vec![locator]);
    }

    #[test]
    fn lookup_missing_is_not_found() {
        let (_dir, archive) = make_archive();
        let locator: RecordLocator = "octo/hello/2026-02-09T13:17:20.000000+01:00".parse().unwrap();
        match archive.lookup(&locator) {
            Err(ArchiveError::NotFound { locator: l }) => assert!(l.contains("octo/hello")),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn lookup_corrupt_record_is_serialization_error() {
        let (_dir, archive) = make_archive();
        let locator: RecordLocator = "octo/hello/2026-02-09T13:17:20.000000+01:00".parse().unwrap();
        let path = archive.record_path(&locator);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"{ not json").unwrap();
        assert!(matches!(archive.lookup(&locator), Err(ArchiveError::Serialization(_))));
    }

    #[test]
    fn repositories_skips_invalid_directories() {
        let (_dir, archive) = make_archive();
        archive.archive(&repo(), record()).unwrap();
        archive.archive(&RepoName::parse("acme/widgets").unwrap(), record()).unwrap();
        fs::create_dir_all(archive.root().join("bad owner").join("x")).unwrap();

        let repos: Vec<String> = archive.repositories().unwrap().iter().map(|r| r.to_string()).collect();
        assert_eq!(repos, vec!["acme/widgets", "octo/hello"]);
    }
}
