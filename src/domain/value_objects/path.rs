//! Repository path value objects
//!
//! Node paths are `/`-separated and absolute within their store or target
//! (`/`, `/www`, `/www/index.html`). A `StorePath` adds the store name in
//! front, written `store:/path`.

use std::fmt;
use std::str::FromStr;

/// Error when a store path cannot be parsed or validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorePathError {
    /// Missing the `store:` prefix
    MissingStore(String),
    /// Store name is empty
    EmptyStore,
    /// Path contains traversal components (`..` or `.`)
    ContainsTraversal(String),
}

impl fmt::Display for StorePathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorePathError::MissingStore(raw) => {
                write!(f, "'{}' is not a store path (expected store:/path)", raw)
            }
            StorePathError::EmptyStore => write!(f, "store name is empty"),
            StorePathError::ContainsTraversal(raw) => {
                write!(f, "path '{}' contains traversal components", raw)
            }
        }
    }
}

impl std::error::Error for StorePathError {}

/// A path inside a named store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorePath {
    store: String,
    path: String,
}

impl StorePath {
    pub fn new(store: impl Into<String>, path: &str) -> Result<Self, StorePathError> {
        let store = store.into();
        if store.is_empty() {
            return Err(StorePathError::EmptyStore);
        }
        if has_traversal(path) {
            return Err(StorePathError::ContainsTraversal(path.to_string()));
        }
        Ok(Self {
            store,
            path: normalize_path(path),
        })
    }

    pub fn store(&self) -> &str {
        &self.store
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl FromStr for StorePath {
    type Err = StorePathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (store, path) = s
            .split_once(':')
            .ok_or_else(|| StorePathError::MissingStore(s.to_string()))?;
        Self::new(store, path)
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.store, self.path)
    }
}

/// Normalize a node path: leading `/`, no trailing `/`, no empty segments.
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Append a child name to a directory path.
pub fn extend_path(path: &str, name: &str) -> String {
    if path.ends_with('/') {
        format!("{}{}", path, name)
    } else {
        format!("{}/{}", path, name)
    }
}

/// Split a path into its parent directory and final name.
///
/// Returns `None` for the root.
pub fn split_parent(path: &str) -> Option<(String, String)> {
    let normalized = normalize_path(path);
    if normalized == "/" {
        return None;
    }
    let (parent, name) = normalized.rsplit_once('/')?;
    let parent = if parent.is_empty() { "/" } else { parent };
    Some((parent.to_string(), name.to_string()))
}

/// Every proper prefix of a path plus the path itself, shallowest first.
///
/// `/a/b/c` yields `/a`, `/a/b`, `/a/b/c`. The root yields nothing.
pub fn ancestors(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        current.push('/');
        current.push_str(segment);
        out.push(current.clone());
    }
    out
}

fn has_traversal(path: &str) -> bool {
    path.split('/').any(|s| s == ".." || s == ".")
}
