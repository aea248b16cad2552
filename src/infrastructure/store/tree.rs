//! Flat path-keyed node tree shared by the in-memory store and receiver

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::entities::{ContentInfo, NodeKind, NodeMetadata, VersionedNode};
use crate::domain::value_objects::{extend_path, split_parent, Guid};

/// One stored node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub guid: Guid,
    pub kind: NodeKind,
    pub metadata: NodeMetadata,
    pub encoding: String,
    pub mime_type: String,
    pub content: Arc<Vec<u8>>,
    /// Layered reference to another path in the same tree
    pub indirection: Option<String>,
}

impl TreeEntry {
    pub fn directory(guid: Guid, metadata: NodeMetadata) -> Self {
        Self {
            guid,
            kind: NodeKind::Directory,
            metadata,
            encoding: String::new(),
            mime_type: String::new(),
            content: Arc::new(Vec::new()),
            indirection: None,
        }
    }

    pub fn file(
        guid: Guid,
        content: Vec<u8>,
        encoding: impl Into<String>,
        mime_type: impl Into<String>,
        metadata: NodeMetadata,
    ) -> Self {
        Self {
            guid,
            kind: NodeKind::File,
            metadata,
            encoding: encoding.into(),
            mime_type: mime_type.into(),
            content: Arc::new(content),
            indirection: None,
        }
    }

    pub fn to_node(&self, path: &str) -> VersionedNode {
        let name = split_parent(path).map(|(_, name)| name).unwrap_or_default();
        let node = match self.kind {
            NodeKind::Directory => VersionedNode::directory(path, name, self.guid.clone()),
            NodeKind::File => VersionedNode::file(
                path,
                name,
                self.guid.clone(),
                ContentInfo::new(
                    self.encoding.clone(),
                    self.mime_type.clone(),
                    self.content.len() as u64,
                ),
            ),
        };
        let node = node.with_metadata(self.metadata.clone());
        match &self.indirection {
            Some(target) => node.with_indirection(target.clone()),
            None => node,
        }
    }
}

/// Normalized absolute paths to entries. The root `/` is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    entries: BTreeMap<String, TreeEntry>,
}

impl Tree {
    pub fn new(root_guid: Guid) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            "/".to_string(),
            TreeEntry::directory(root_guid, NodeMetadata::default()),
        );
        Self { entries }
    }

    pub fn get(&self, path: &str) -> Option<&TreeEntry> {
        self.entries.get(path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut TreeEntry> {
        self.entries.get_mut(path)
    }

    pub fn is_directory(&self, path: &str) -> bool {
        self.get(path).is_some_and(|e| e.kind.is_directory())
    }

    /// Direct children of `path`, ordered by name
    pub fn children(&self, path: &str) -> Vec<(String, &TreeEntry)> {
        let prefix = extend_path(path, "");
        self.entries
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(key, entry)| {
                let rest = &key[prefix.len()..];
                (!rest.is_empty() && !rest.contains('/')).then(|| (rest.to_string(), entry))
            })
            .collect()
    }

    pub fn insert(&mut self, path: &str, entry: TreeEntry) {
        self.entries.insert(path.to_string(), entry);
    }

    /// Remove `path` and everything under it
    pub fn remove_subtree(&mut self, path: &str) -> bool {
        if path == "/" {
            return false;
        }
        let prefix = extend_path(path, "");
        let doomed: Vec<String> = self
            .entries
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in doomed {
            self.entries.remove(&key);
        }
        self.entries.remove(path).is_some()
    }

    /// Every entry, paths in byte order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &TreeEntry)> {
        self.entries.iter()
    }
}
