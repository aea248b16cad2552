//! In-memory versioned store
//!
//! Authoring calls change the head tree and give the touched node and every
//! ancestor a fresh GUID, the way a copy-on-write store does. Snapshots
//! freeze the head; reads always name a snapshot version.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use super::tree::{Tree, TreeEntry};
use crate::domain::entities::{NodeKind, NodeMetadata, VersionedNode};
use crate::domain::ports::{ContentReader, SourceStore, StoreError, StoreResult};
use crate::domain::value_objects::{
    ancestors, extend_path, normalize_path, split_parent, Guid, Version,
};

struct State {
    head: Tree,
    snapshots: Vec<(String, Arc<Tree>)>,
}

struct Shared {
    name: String,
    state: RwLock<State>,
    next_guid: AtomicU64,
}

/// Clones share the same store
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let root = Guid::new(format!("{}-0", name));
        Self {
            shared: Arc::new(Shared {
                name,
                state: RwLock::new(State {
                    head: Tree::new(root),
                    snapshots: Vec::new(),
                }),
                next_guid: AtomicU64::new(1),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.shared
            .state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.shared
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn fresh_guid(&self) -> Guid {
        let n = self.shared.next_guid.fetch_add(1, Ordering::SeqCst);
        Guid::new(format!("{}-{}", self.shared.name, n))
    }

    /// Give `path` and all its ancestors (and the root) new GUIDs
    fn touch(&self, head: &mut Tree, path: &str) {
        let mut chain = vec!["/".to_string()];
        chain.extend(ancestors(path));
        for p in chain {
            let guid = self.fresh_guid();
            if let Some(entry) = head.get_mut(&p) {
                entry.guid = guid;
            }
        }
    }

    fn ensure_directories(&self, head: &mut Tree, path: &str) {
        for dir in ancestors(path) {
            if head.get(&dir).is_none() {
                let guid = self.fresh_guid();
                head.insert(&dir, TreeEntry::directory(guid, NodeMetadata::default()));
            }
        }
    }

    /// Create a directory and any missing ancestors
    pub fn put_directory(&self, path: &str) -> Guid {
        let path = normalize_path(path);
        let mut state = self.write();
        self.ensure_directories(&mut state.head, &path);
        self.touch(&mut state.head, &path);
        head_guid(&state.head, &path)
    }

    /// Write a file, creating missing parent directories
    pub fn put_file(&self, path: &str, content: impl Into<Vec<u8>>) -> Guid {
        self.put_file_with(path, content, "text/plain", NodeMetadata::default())
    }

    pub fn put_file_with(
        &self,
        path: &str,
        content: impl Into<Vec<u8>>,
        mime_type: &str,
        metadata: NodeMetadata,
    ) -> Guid {
        let path = normalize_path(path);
        let mut state = self.write();
        if let Some((parent, _)) = split_parent(&path) {
            self.ensure_directories(&mut state.head, &parent);
        }
        state.head.remove_subtree(&path);
        let entry = TreeEntry::file(
            self.fresh_guid(),
            content.into(),
            "UTF-8",
            mime_type,
            metadata,
        );
        state.head.insert(&path, entry);
        self.touch(&mut state.head, &path);
        head_guid(&state.head, &path)
    }

    /// A file that reads through to `target`; stale when `target` is absent
    pub fn put_layered(&self, path: &str, target: &str) -> Guid {
        let path = normalize_path(path);
        let mut state = self.write();
        if let Some((parent, _)) = split_parent(&path) {
            self.ensure_directories(&mut state.head, &parent);
        }
        let mut entry = TreeEntry::file(
            self.fresh_guid(),
            Vec::new(),
            "UTF-8",
            "application/octet-stream",
            NodeMetadata::default(),
        );
        entry.indirection = Some(normalize_path(target));
        state.head.insert(&path, entry);
        self.touch(&mut state.head, &path);
        head_guid(&state.head, &path)
    }

    /// Replace a node's aspects and properties
    pub fn set_metadata(&self, path: &str, metadata: NodeMetadata) -> bool {
        let path = normalize_path(path);
        let mut state = self.write();
        let Some(entry) = state.head.get_mut(&path) else {
            return false;
        };
        entry.metadata = metadata;
        self.touch(&mut state.head, &path);
        true
    }

    /// Remove a node and everything under it
    pub fn remove(&self, path: &str) -> bool {
        let path = normalize_path(path);
        let mut state = self.write();
        let removed = state.head.remove_subtree(&path);
        if removed {
            if let Some((parent, _)) = split_parent(&path) {
                self.touch(&mut state.head, &parent);
            }
        }
        removed
    }

    /// Version of the most recent snapshot
    pub fn latest_version(&self) -> Option<Version> {
        let count = self.read().snapshots.len() as u64;
        (count > 0).then(|| Version::new(count))
    }

    /// Label given to a snapshot
    pub fn snapshot_label(&self, version: Version) -> Option<String> {
        let state = self.read();
        snapshot_index(&state, version).map(|i| state.snapshots[i].0.clone())
    }

    /// The head tree, for receivers that mutate it directly
    pub(crate) fn head(&self) -> Tree {
        self.read().head.clone()
    }

    pub(crate) fn replace_head(&self, tree: Tree) {
        self.write().head = tree;
    }

    pub(crate) fn with_head<T>(&self, f: impl FnOnce(&mut Tree) -> T) -> T {
        f(&mut self.write().head)
    }

    /// Every path at `version` with its kind and GUID
    pub fn manifest(&self, version: Version) -> StoreResult<BTreeMap<String, (NodeKind, Guid)>> {
        let tree = self.tree(version)?;
        Ok(tree
            .iter()
            .map(|(path, entry)| (path.clone(), (entry.kind, entry.guid.clone())))
            .collect())
    }

    /// Every path in the head tree with its kind and GUID
    pub fn head_manifest(&self) -> BTreeMap<String, (NodeKind, Guid)> {
        self.read()
            .head
            .iter()
            .map(|(path, entry)| (path.clone(), (entry.kind, entry.guid.clone())))
            .collect()
    }

    /// File bytes in the head tree
    pub fn head_content(&self, path: &str) -> Option<Vec<u8>> {
        let state = self.read();
        state
            .head
            .get(&normalize_path(path))
            .filter(|e| e.kind == NodeKind::File)
            .map(|e| e.content.as_ref().clone())
    }

    fn tree(&self, version: Version) -> StoreResult<Arc<Tree>> {
        let state = self.read();
        snapshot_index(&state, version)
            .map(|i| state.snapshots[i].1.clone())
            .ok_or(StoreError::UnknownVersion(version))
    }
}

fn snapshot_index(state: &State, version: Version) -> Option<usize> {
    let n = version.get() as usize;
    (n >= 1 && n <= state.snapshots.len()).then(|| n - 1)
}

fn head_guid(head: &Tree, path: &str) -> Guid {
    head.get(path)
        .map(|e| e.guid.clone())
        .unwrap_or_else(|| Guid::new(""))
}

impl SourceStore for MemoryStore {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn create_snapshot(&self, label: &str) -> StoreResult<Version> {
        let mut state = self.write();
        let frozen = Arc::new(state.head.clone());
        state.snapshots.push((label.to_string(), frozen));
        let version = Version::new(state.snapshots.len() as u64);
        debug!(store = %self.shared.name, %version, label, "snapshot created");
        Ok(version)
    }

    fn lookup(&self, version: Version, path: &str) -> StoreResult<Option<VersionedNode>> {
        let path = normalize_path(path);
        let tree = self.tree(version)?;
        Ok(tree.get(&path).map(|entry| entry.to_node(&path)))
    }

    fn list(&self, version: Version, path: &str) -> StoreResult<BTreeMap<String, VersionedNode>> {
        let path = normalize_path(path);
        let tree = self.tree(version)?;
        match tree.get(&path) {
            None => Err(StoreError::NotFound { path, version }),
            Some(entry) if !entry.kind.is_directory() => Ok(BTreeMap::new()),
            Some(_) => Ok(tree
                .children(&path)
                .into_iter()
                .map(|(name, entry)| {
                    let child = extend_path(&path, &name);
                    let node = entry.to_node(&child);
                    (name, node)
                })
                .collect()),
        }
    }

    fn open_content(&self, version: Version, path: &str) -> StoreResult<ContentReader> {
        let path = normalize_path(path);
        let tree = self.tree(version)?;
        let mut entry = tree.get(&path).ok_or_else(|| StoreError::NotFound {
            path: path.clone(),
            version,
        })?;
        if let Some(target) = &entry.indirection {
            entry = tree.get(target).ok_or_else(|| StoreError::NotFound {
                path: target.clone(),
                version,
            })?;
        }
        if entry.kind != NodeKind::File {
            return Err(StoreError::NotAFile(path));
        }
        Ok(Box::new(Cursor::new(entry.content.as_ref().clone())))
    }

    fn is_stale(&self, version: Version, node: &VersionedNode) -> bool {
        let Some(target) = node.indirection() else {
            return false;
        };
        match self.tree(version) {
            Ok(tree) => tree.get(target).is_none(),
            Err(_) => true,
        }
    }
}
