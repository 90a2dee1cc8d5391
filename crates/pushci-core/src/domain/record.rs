//! Archived run records and their locators.
//!
//! A [`RunRecord`] is written once per pipeline run that needs archiving and
//! is read-only afterwards. Its timestamp, rendered at microsecond precision
//! with an explicit offset, is both the sort key and the identity of the
//! record within its repository namespace.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Local, SecondsFormat, SubsecRound};
use serde::{Deserialize, Serialize};

use super::error::ValidationError;
use super::outcome::{CommandOutcome, OutcomeKind};
use super::repo::RepoName;

/// Stage status as stored in the archive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    Success,
    Failure,
    Error,
    /// The stage never ran (tests after a failed build).
    NotRun,
}

impl From<OutcomeKind> for RecordStatus {
    fn from(kind: OutcomeKind) -> Self {
        match kind {
            OutcomeKind::Success => RecordStatus::Success,
            OutcomeKind::Failure => RecordStatus::Failure,
            OutcomeKind::Error => RecordStatus::Error,
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordStatus::Success => "SUCCESS",
            RecordStatus::Failure => "FAILURE",
            RecordStatus::Error => "ERROR",
            RecordStatus::NotRun => "NOT_RUN",
        };
        f.write_str(s)
    }
}

/// Persisted outcome of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    #[serde(with = "timestamp_format")]
    pub timestamp: DateTime<FixedOffset>,
    #[serde(rename = "commitIdentifier")]
    pub commit_sha: String,
    pub build_status: RecordStatus,
    pub build_log: String,
    pub test_status: RecordStatus,
    /// `None` when the test stage never ran.
    pub test_log: Option<String>,
}

impl RunRecord {
    /// Build a record stamped with the current local time.
    ///
    /// Pass `test = None` when the test stage did not run.
    pub fn new(commit_sha: impl Into<String>, build: &CommandOutcome, test: Option<&CommandOutcome>) -> Self {
        Self {
            timestamp: now_timestamp(),
            commit_sha: commit_sha.into(),
            build_status: build.kind.into(),
            build_log: build.full_log(),
            test_status: test.map_or(RecordStatus::NotRun, |t| t.kind.into()),
            test_log: test.map(CommandOutcome::full_log),
        }
    }

    /// Identity key of this record within its repository.
    pub fn key(&self) -> String {
        format_timestamp(&self.timestamp)
    }
}

/// Current local time truncated to the precision of record keys.
pub fn now_timestamp() -> DateTime<FixedOffset> {
    Local::now().fixed_offset().trunc_subsecs(6)
}

/// RFC 3339 rendering used for record keys and the `timestamp` field.
pub fn format_timestamp(ts: &DateTime<FixedOffset>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, false)
}

mod timestamp_format {
    use chrono::{DateTime, FixedOffset};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<FixedOffset>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<FixedOffset>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw).map_err(serde::de::Error::custom)
    }
}

/// Stable reference to an archived record: `owner/name/<timestamp>`.
///
/// Parsing validates the repository with [`RepoName::parse`] and the key as
/// an RFC 3339 timestamp, so a locator can never address anything outside
/// its repository namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordLocator {
    pub repo: RepoName,
    pub timestamp: DateTime<FixedOffset>,
}

impl RecordLocator {
    pub fn new(repo: RepoName, timestamp: DateTime<FixedOffset>) -> Self {
        Self { repo, timestamp }
    }

    /// Locator for a record stored under `repo`.
    pub fn for_record(repo: &RepoName, record: &RunRecord) -> Self {
        Self::new(repo.clone(), record.timestamp)
    }

    /// Timestamp key (last locator segment).
    pub fn key(&self) -> String {
        format_timestamp(&self.timestamp)
    }

    /// File name of the record inside its repository directory.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.key())
    }

    /// Parse a timestamp key, with or without a trailing `.json`.
    pub fn parse_key(key: &str) -> Result<DateTime<FixedOffset>, ValidationError> {
        let key = key.strip_suffix(".json").unwrap_or(key);
        DateTime::parse_from_rfc3339(key).map_err(|e| ValidationError::InvalidLocator {
            locator: key.to_string(),
            reason: format!("timestamp is not RFC 3339: {e}"),
        })
    }
}

impl fmt::Display for RecordLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.repo, self.key())
    }
}

impl FromStr for RecordLocator {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| ValidationError::InvalidLocator {
            locator: s.to_string(),
            reason,
        };
        let (repo, key) = s
            .trim_start_matches('/')
            .rsplit_once('/')
            .ok_or_else(|| invalid("expected owner/name/timestamp".to_string()))?;
        let repo = RepoName::parse(repo).map_err(|e| invalid(e.to_string()))?;
        let timestamp = Self::parse_key(key).map_err(|e| invalid(e.to_string()))?;
        Ok(Self { repo, timestamp })
    }
}
