//! A local directory read as a source store
//!
//! File GUIDs are the SHA-256 of the content; a directory's GUID is derived
//! from its children's names, kinds and GUIDs, so it changes whenever
//! anything beneath it changes. The file system keeps no history: every
//! snapshot version reads the live tree, and `create_snapshot` only resets
//! the GUID cache.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::domain::entities::{ContentInfo, NodeKind, VersionedNode};
use crate::domain::ports::{ContentReader, SourceStore, StoreError, StoreResult};
use crate::domain::value_objects::{extend_path, normalize_path, split_parent, Guid, Version};

pub struct FsSourceStore {
    name: String,
    root: PathBuf,
    snapshots: AtomicU64,
    guids: Mutex<HashMap<String, Guid>>,
}

impl FsSourceStore {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            snapshots: AtomicU64::new(0),
            guids: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn fs_path(&self, path: &str) -> PathBuf {
        let relative = path.trim_start_matches('/');
        if relative.is_empty() {
            self.root.clone()
        } else {
            self.root.join(relative)
        }
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<String, Guid>> {
        self.guids
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_version(&self, version: Version) -> StoreResult<()> {
        let current = self.snapshots.load(Ordering::Acquire);
        if version.get() == 0 || version.get() > current {
            return Err(StoreError::UnknownVersion(version));
        }
        Ok(())
    }

    fn read_error(path: &str, err: io::Error) -> StoreError {
        StoreError::Read {
            path: path.to_string(),
            message: err.to_string(),
        }
    }

    /// Build the node at `path`, or `None` when nothing is there
    fn node_at(&self, path: &str) -> StoreResult<Option<VersionedNode>> {
        let fs_path = self.fs_path(path);
        let meta = match fs::symlink_metadata(&fs_path) {
            Ok(meta) => meta,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(Self::read_error(path, err)),
        };
        let name = split_parent(path).map(|(_, name)| name).unwrap_or_default();

        let link_target = if meta.file_type().is_symlink() {
            let target = fs::read_link(&fs_path).map_err(|e| Self::read_error(path, e))?;
            Some(target.to_string_lossy().into_owned())
        } else {
            None
        };

        // symlinks are followed; a broken one becomes a stale file node
        let followed = match &link_target {
            Some(target) => match fs::metadata(&fs_path) {
                Ok(meta) => meta,
                Err(_) => {
                    let guid = Guid::derived(["link", target.as_str()]);
                    let node = VersionedNode::file(path, name, guid, ContentInfo::default())
                        .with_indirection(target.clone());
                    return Ok(Some(node));
                }
            },
            None => meta,
        };

        let node = if followed.is_dir() {
            VersionedNode::directory(path, name, self.directory_guid(path)?)
        } else {
            VersionedNode::file(
                path,
                name.clone(),
                self.file_guid(path)?,
                ContentInfo::new("UTF-8", guess_mime_type(&name), followed.len()),
            )
        };
        Ok(Some(match link_target {
            Some(target) => node.with_indirection(target),
            None => node,
        }))
    }

    fn file_guid(&self, path: &str) -> StoreResult<Guid> {
        if let Some(guid) = self.cache().get(path) {
            return Ok(guid.clone());
        }
        let mut file = fs::File::open(self.fs_path(path)).map_err(|e| Self::read_error(path, e))?;
        let mut hasher = Sha256::new();
        io::copy(&mut file, &mut hasher).map_err(|e| Self::read_error(path, e))?;
        let guid = Guid::new(format!("{:x}", hasher.finalize()));
        self.cache().insert(path.to_string(), guid.clone());
        Ok(guid)
    }

    fn directory_guid(&self, path: &str) -> StoreResult<Guid> {
        if let Some(guid) = self.cache().get(path) {
            return Ok(guid.clone());
        }
        let children = self.children(path)?;
        let mut parts = vec!["dir".to_string()];
        for (name, node) in &children {
            parts.push(name.clone());
            parts.push(node.kind().to_string());
            parts.push(node.guid().to_string());
        }
        let guid = Guid::derived(parts);
        self.cache().insert(path.to_string(), guid.clone());
        Ok(guid)
    }

    fn children(&self, path: &str) -> StoreResult<BTreeMap<String, VersionedNode>> {
        let entries = fs::read_dir(self.fs_path(path)).map_err(|e| Self::read_error(path, e))?;
        let mut children = BTreeMap::new();
        for entry in entries {
            let entry = entry.map_err(|e| Self::read_error(path, e))?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                warn!(dir = path, "skipping entry with a non UTF-8 name");
                continue;
            };
            let child = extend_path(path, &name);
            if let Some(node) = self.node_at(&child)? {
                children.insert(name, node);
            }
        }
        Ok(children)
    }
}

impl SourceStore for FsSourceStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn create_snapshot(&self, label: &str) -> StoreResult<Version> {
        self.cache().clear();
        let version = Version::new(self.snapshots.fetch_add(1, Ordering::AcqRel) + 1);
        debug!(root = %self.root.display(), %version, label, "snapshot created");
        Ok(version)
    }

    fn lookup(&self, version: Version, path: &str) -> StoreResult<Option<VersionedNode>> {
        self.check_version(version)?;
        self.node_at(&normalize_path(path))
    }

    fn list(&self, version: Version, path: &str) -> StoreResult<BTreeMap<String, VersionedNode>> {
        self.check_version(version)?;
        let path = normalize_path(path);
        match self.node_at(&path)? {
            None => Err(StoreError::NotFound { path, version }),
            Some(node) if !node.is_directory() => Ok(BTreeMap::new()),
            Some(_) => self.children(&path),
        }
    }

    fn open_content(&self, version: Version, path: &str) -> StoreResult<ContentReader> {
        self.check_version(version)?;
        let path = normalize_path(path);
        let fs_path = self.fs_path(&path);
        if fs_path.is_dir() {
            return Err(StoreError::NotAFile(path));
        }
        match fs::File::open(&fs_path) {
            Ok(file) => Ok(Box::new(file)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(StoreError::NotFound { path, version })
            }
            Err(err) => Err(Self::read_error(&path, err)),
        }
    }

    fn is_stale(&self, _version: Version, node: &VersionedNode) -> bool {
        node.indirection().is_some() && fs::metadata(self.fs_path(node.path())).is_err()
    }
}

/// MIME type from a file name's extension
pub(crate) fn guess_mime_type(name: &str) -> &'static str {
    let extension = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("html" | "htm") => "text/html",
        Some("css") => "text/css",
        Some("js" | "mjs") => "text/javascript",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("txt" | "md") => "text/plain",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("pdf") => "application/pdf",
        Some("woff2") => "font/woff2",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;

    fn store_with(files: &[(&str, &str)]) -> (tempfile::TempDir, FsSourceStore) {
        let dir = tempdir().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        let store = FsSourceStore::new("local", dir.path());
        (dir, store)
    }

    #[test]
    fn file_guid_is_content_hash() {
        let (_dir, store) = store_with(&[("a.txt", "same"), ("b.txt", "same")]);
        let v = store.create_snapshot("").unwrap();
        let listing = store.list(v, "/").unwrap();
        assert_eq!(listing["a.txt"].guid(), listing["b.txt"].guid());
        assert_eq!(listing["a.txt"].guid(), &Guid::from_content(b"same"));
        assert_eq!(listing["a.txt"].mime_type(), "text/plain");
    }

    #[test]
    fn directory_guid_tracks_descendants() {
        let (dir, store) = store_with(&[("www/css/site.css", "a"), ("www/index.html", "i")]);
        let v1 = store.create_snapshot("").unwrap();
        let before = store.lookup(v1, "/www").unwrap().unwrap();

        fs::write(dir.path().join("www/css/site.css"), "b").unwrap();
        let v2 = store.create_snapshot("").unwrap();
        let after = store.lookup(v2, "/www").unwrap().unwrap();

        assert!(after.is_directory());
        assert_ne!(before.guid(), after.guid());
    }

    #[test]
    fn reads_content() {
        let (_dir, store) = store_with(&[("index.html", "<html/>")]);
        let v = store.create_snapshot("").unwrap();
        let mut text = String::new();
        store
            .open_content(v, "/index.html")
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "<html/>");
        assert!(matches!(
            store.open_content(v, "/nope"),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn version_must_exist() {
        let (_dir, store) = store_with(&[]);
        assert!(matches!(
            store.lookup(Version::new(1), "/"),
            Err(StoreError::UnknownVersion(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn broken_symlink_is_stale() {
        let (dir, store) = store_with(&[("real.txt", "x")]);
        std::os::unix::fs::symlink(dir.path().join("real.txt"), dir.path().join("good")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("missing.txt"), dir.path().join("bad"))
            .unwrap();
        let v = store.create_snapshot("").unwrap();

        let listing = store.list(v, "/").unwrap();
        assert!(!store.is_stale(v, &listing["good"]));
        assert!(store.is_stale(v, &listing["bad"]));
    }

    #[test]
    fn mime_types() {
        assert_eq!(guess_mime_type("INDEX.HTML"), "text/html");
        assert_eq!(guess_mime_type("data.bin"), "application/octet-stream");
        assert_eq!(guess_mime_type("Makefile"), "application/octet-stream");
    }
}
