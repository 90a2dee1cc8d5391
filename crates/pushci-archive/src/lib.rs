//! PushCI Archive: persistence for run records.
//!
//! Run records are stored per repository under a namespace derived from the
//! validated `owner/name`, keyed by their creation timestamp. Records are
//! written once and are read-only afterwards.
//!
//! - [`storage_traits::LogArchive`]: the archive contract
//! - [`fs::FsLogArchive`]: `<root>/<owner>/<name>/<timestamp>.json`
//! - [`fakes::MemoryLogArchive`]: in-memory implementation for tests

pub mod error;
pub mod fakes;
pub mod fs;
pub mod storage_traits;

pub use error::{ArchiveError, ArchiveResult};
pub use fakes::MemoryLogArchive;
pub use fs::FsLogArchive;
pub use storage_traits::LogArchive;
