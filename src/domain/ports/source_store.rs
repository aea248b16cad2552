//! SourceStore port - read access to a versioned, snapshot-capable store
//!
//! Paths are absolute within the store (`/`, `/www/index.html`).

use std::collections::BTreeMap;
use std::io::Read;

use thiserror::Error;

use crate::domain::entities::VersionedNode;
use crate::domain::value_objects::Version;

pub type StoreResult<T> = Result<T, StoreError>;

/// Byte stream of a file's content at a fixed version
pub type ContentReader = Box<dyn Read + Send>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{path} not found at version {version}")]
    NotFound { path: String, version: Version },

    #[error("unknown version {0}")]
    UnknownVersion(Version),

    #[error("{0} is not a file")]
    NotAFile(String),

    #[error("unknown store '{0}'")]
    UnknownStore(String),

    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("snapshot failed: {0}")]
    Snapshot(String),
}

/// Read side of a versioned store.
///
/// Implementations must be safe for concurrent use: transfer workers open
/// content streams in parallel while the walking thread lists directories.
pub trait SourceStore: Send + Sync {
    /// Name of this store, as used in `store:/path`
    fn name(&self) -> &str;

    /// Freeze the current state into a new version
    fn create_snapshot(&self, label: &str) -> StoreResult<Version>;

    /// The node at `path`, or `None` when absent
    fn lookup(&self, version: Version, path: &str) -> StoreResult<Option<VersionedNode>>;

    /// Children of the directory at `path`, keyed and ordered by name
    fn list(&self, version: Version, path: &str) -> StoreResult<BTreeMap<String, VersionedNode>>;

    /// Content of the file at `path`
    fn open_content(&self, version: Version, path: &str) -> StoreResult<ContentReader>;

    /// Whether the node is a layered reference whose target is unreachable
    fn is_stale(&self, version: Version, node: &VersionedNode) -> bool;
}
