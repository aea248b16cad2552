//! VersionedNode entity - a source node read at a fixed version

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::Guid;

/// Whether a node is a file or a directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Directory,
}

impl NodeKind {
    pub fn is_directory(self) -> bool {
        matches!(self, NodeKind::Directory)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::File => "file",
            NodeKind::Directory => "directory",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aspects and properties carried with a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetadata {
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub aspects: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl NodeMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_aspect(mut self, aspect: impl Into<String>) -> Self {
        self.aspects.insert(aspect.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.aspects.is_empty() && self.properties.is_empty()
    }
}

/// Content description of a file node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentInfo {
    pub encoding: String,
    pub mime_type: String,
    pub size: u64,
}

impl ContentInfo {
    pub fn new(encoding: impl Into<String>, mime_type: impl Into<String>, size: u64) -> Self {
        Self {
            encoding: encoding.into(),
            mime_type: mime_type.into(),
            size,
        }
    }
}

impl Default for ContentInfo {
    fn default() -> Self {
        Self::new("UTF-8", "application/octet-stream", 0)
    }
}

/// A node read from the source store at a fixed version.
///
/// The content bytes are not held here; they are opened through the
/// `SourceStore` port when a transfer runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedNode {
    path: String,
    name: String,
    guid: Guid,
    kind: NodeKind,
    metadata: NodeMetadata,
    content: Option<ContentInfo>,
    indirection: Option<String>,
}

impl VersionedNode {
    pub fn directory(path: impl Into<String>, name: impl Into<String>, guid: Guid) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            guid,
            kind: NodeKind::Directory,
            metadata: NodeMetadata::default(),
            content: None,
            indirection: None,
        }
    }

    pub fn file(
        path: impl Into<String>,
        name: impl Into<String>,
        guid: Guid,
        content: ContentInfo,
    ) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            guid,
            kind: NodeKind::File,
            metadata: NodeMetadata::default(),
            content: Some(content),
            indirection: None,
        }
    }

    pub fn with_metadata(mut self, metadata: NodeMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Mark this node as a layered reference to another path
    pub fn with_indirection(mut self, target: impl Into<String>) -> Self {
        self.indirection = Some(target.into());
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn guid(&self) -> &Guid {
        &self.guid
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_directory(&self) -> bool {
        self.kind.is_directory()
    }

    pub fn metadata(&self) -> &NodeMetadata {
        &self.metadata
    }

    pub fn content(&self) -> Option<&ContentInfo> {
        self.content.as_ref()
    }

    pub fn indirection(&self) -> Option<&str> {
        self.indirection.as_deref()
    }

    pub fn encoding(&self) -> &str {
        self.content
            .as_ref()
            .map(|c| c.encoding.as_str())
            .unwrap_or("UTF-8")
    }

    pub fn mime_type(&self) -> &str {
        self.content
            .as_ref()
            .map(|c| c.mime_type.as_str())
            .unwrap_or("application/octet-stream")
    }
}
