//! Path-safe repository identifiers.
//!
//! `repository.full_name` is the only externally controlled string that ends
//! up in a filesystem path (both the workspace checkout and the log archive
//! are keyed by it), so it is parsed exactly once into a [`RepoName`] and
//! every path is built from the validated segments.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::ValidationError;

/// Maximum length of a single `owner` or `name` segment.
pub const MAX_SEGMENT_LEN: usize = 100;

/// A validated `owner/name` repository identifier.
///
/// Both segments are non-empty, at most [`MAX_SEGMENT_LEN`] characters long,
/// and consist of ASCII alphanumerics, `-`, `_` and `.`. Segments equal to
/// `.` or containing `..` are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoName {
    owner: String,
    name: String,
}

impl RepoName {
    /// Parse and validate an `owner/name` string.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidRepoName` when the string does not
    /// contain exactly one `/`, or when either segment is unsafe to use as a
    /// path component.
    pub fn parse(full_name: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidRepoName {
            name: full_name.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = full_name.split('/');
        let (owner, name) = match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(name), None) => (owner, name),
            _ => return Err(invalid("expected exactly one '/' separating owner and name")),
        };

        validate_segment(owner).map_err(|reason| invalid(&format!("owner {reason}")))?;
        validate_segment(name).map_err(|reason| invalid(&format!("name {reason}")))?;

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    /// Repository owner (user or organisation).
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Repository name without the owner.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `owner/name` as a relative path, for joining under a root directory.
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(&self.owner).join(&self.name)
    }
}

fn validate_segment(segment: &str) -> Result<(), &'static str> {
    if segment.is_empty() {
        return Err("segment is empty");
    }
    if segment.len() > MAX_SEGMENT_LEN {
        return Err("segment is too long");
    }
    if segment == "." || segment.contains("..") {
        return Err("segment must not reference a parent or current directory");
    }
    if !segment
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err("segment contains characters outside [A-Za-z0-9._-]");
    }
    Ok(())
}

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RepoName {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<RepoName> for String {
    fn from(repo: RepoName) -> Self {
        repo.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_parse_valid_names() {
        for name in ["octo/hello", "my-org/repo.rs", "A_b/c-D.e", "x/y"] {
            let repo = RepoName::parse(name).expect(name);
            assert_eq!(repo.to_string(), name);
        }
    }

    #[test]
    fn test_accessors_and_relative_path() {
        let repo = RepoName::parse("octo/hello").unwrap();
        assert_eq!(repo.owner(), "octo");
        assert_eq!(repo.name(), "hello");
        assert_eq!(repo.relative_path(), Path::new("octo").join("hello"));
    }

    #[test]
    fn test_rejects_traversal() {
        for name in ["../etc", "octo/..", "octo/a..b", "./x", "octo/."] {
            assert!(RepoName::parse(name).is_err(), "{name} should be rejected");
        }
    }

    #[test]
    fn test_rejects_wrong_separator_count() {
        for name in ["octo", "octo/hello/extra", "/hello", "octo/", "/", ""] {
            assert!(RepoName::parse(name).is_err(), "{name:?} should be rejected");
        }
    }

    #[test]
    fn test_rejects_separators_and_odd_chars() {
        for name in ["oc\\to/hello", "octo/hel lo", "octo/hé", "octo/a:b", "octo/a\0b"] {
            assert!(RepoName::parse(name).is_err(), "{name:?} should be rejected");
        }
    }

    #[test]
    fn test_rejects_overlong_segment() {
        let long = format!("octo/{}", "a".repeat(MAX_SEGMENT_LEN + 1));
        assert!(RepoName::parse(&long).is_err());
        let ok = format!("octo/{}", "a".repeat(MAX_SEGMENT_LEN));
        assert!(RepoName::parse(&ok).is_ok());
    }

    #[test]
    fn test_serde_validates() {
        let repo: RepoName = serde_json::from_str("\"octo/hello\"").unwrap();
        assert_eq!(repo.name(), "hello");
        assert!(serde_json::from_str::<RepoName>("\"../x\"").is_err());
        assert_eq!(serde_json::to_string(&repo).unwrap(), "\"octo/hello\"");
    }
}
