//! File-system receiver
//!
//! Each target is a directory under the receiver root. Under a ticket,
//! file content is written into a staging directory and structural
//! operations are appended to a journal; nothing under the target changes
//! until commit. `prepare` replays the journal against the committed tree
//! to check that every operation will apply, and `commit` applies it and
//! rewrites the target's manifest of GUIDs and metadata.
//!
//! Listings always show the committed tree.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, info};

use crate::domain::entities::{NodeKind, NodeMetadata, RemoteEntry};
use crate::domain::ports::{
    ContentSink, Credentials, RemoteSession, TransportError, TransportResult, WriteRequest,
};
use crate::domain::value_objects::{
    ancestors, normalize_path, split_parent, Guid, Ticket, Version,
};

const STATE_DIR: &str = ".treeship";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ManifestEntry {
    guid: Guid,
    kind: NodeKind,
    #[serde(default, skip_serializing_if = "NodeMetadata::is_empty")]
    metadata: NodeMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mime_type: Option<String>,
}

type Manifest = BTreeMap<String, ManifestEntry>;

#[derive(Debug)]
enum JournalOp {
    CreateDirectory {
        path: String,
        entry: ManifestEntry,
    },
    UpdateDirectory {
        path: String,
        entry: ManifestEntry,
    },
    Delete {
        path: String,
    },
    Write {
        path: String,
        create: bool,
        staged: PathBuf,
        entry: ManifestEntry,
    },
}

impl JournalOp {
    fn path(&self) -> &str {
        match self {
            JournalOp::CreateDirectory { path, .. }
            | JournalOp::UpdateDirectory { path, .. }
            | JournalOp::Delete { path }
            | JournalOp::Write { path, .. } => path,
        }
    }
}

struct Txn {
    target: String,
    staging: TempDir,
    journal: Vec<JournalOp>,
    prepared: bool,
}

struct Shared {
    root: PathBuf,
    credentials: Option<Credentials>,
    sessions: Mutex<HashMap<Ticket, Txn>>,
    next_ticket: AtomicU64,
}

pub struct FsReceiver {
    shared: Arc<Shared>,
}

fn lock(shared: &Shared) -> MutexGuard<'_, HashMap<Ticket, Txn>> {
    shared
        .sessions
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn io_err(operation: &str, path: &str, err: io::Error) -> TransportError {
    TransportError::rejected(operation, path, err.to_string())
}

impl FsReceiver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            shared: Arc::new(Shared {
                root: root.into(),
                credentials: None,
                sessions: Mutex::new(HashMap::new()),
                next_ticket: AtomicU64::new(1),
            }),
        }
    }

    /// Require these credentials at `begin`
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.credentials = Some(credentials);
        }
        self
    }

    pub fn root(&self) -> &Path {
        &self.shared.root
    }

    /// Directory holding a target's files
    pub fn target_dir(&self, target: &str) -> PathBuf {
        self.shared.root.join(target)
    }

    fn state_dir(&self) -> PathBuf {
        self.shared.root.join(STATE_DIR)
    }

    fn manifest_path(&self, target: &str) -> PathBuf {
        self.state_dir().join(format!("{}.manifest.json", target))
    }

    fn load_manifest(&self, target: &str) -> TransportResult<Manifest> {
        let path = self.manifest_path(target);
        match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                TransportError::rejected("read manifest", &path.display().to_string(), e.to_string())
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Manifest::new()),
            Err(err) => Err(io_err("read manifest", &path.display().to_string(), err)),
        }
    }

    fn save_manifest(&self, target: &str, manifest: &Manifest) -> TransportResult<()> {
        let path = self.manifest_path(target);
        let label = path.display().to_string();
        let content = serde_json::to_string_pretty(manifest)
            .map_err(|e| TransportError::rejected("write manifest", &label, e.to_string()))?;
        let mut tmp = NamedTempFile::new_in(self.state_dir())
            .map_err(|e| io_err("write manifest", &label, e))?;
        tmp.write_all(content.as_bytes())
            .map_err(|e| io_err("write manifest", &label, e))?;
        tmp.persist(&path)
            .map_err(|e| io_err("write manifest", &label, e.error))?;
        Ok(())
    }

    fn target_of(&self, ticket: &Ticket) -> TransportResult<String> {
        lock(&self.shared)
            .get(ticket)
            .map(|txn| txn.target.clone())
            .ok_or_else(|| TransportError::InvalidTicket(ticket.clone()))
    }

    fn journal(&self, ticket: &Ticket, op: JournalOp) -> TransportResult<()> {
        append(&self.shared, ticket, op)
    }
}

fn append(shared: &Shared, ticket: &Ticket, op: JournalOp) -> TransportResult<()> {
    let mut sessions = lock(shared);
    let txn = sessions
        .get_mut(ticket)
        .ok_or_else(|| TransportError::InvalidTicket(ticket.clone()))?;
    if txn.prepared {
        return Err(TransportError::rejected(
            "modify",
            op.path(),
            "session already prepared",
        ));
    }
    txn.journal.push(op);
    Ok(())
}

/// Reject anything that could escape the target directory
fn checked_path(operation: &str, path: &str) -> TransportResult<String> {
    let normalized = normalize_path(path);
    if normalized
        .split('/')
        .any(|segment| segment == ".." || segment == "." || segment.contains('\\'))
    {
        return Err(TransportError::rejected(
            operation,
            path,
            "path escapes the target",
        ));
    }
    Ok(normalized)
}

fn valid_target(target: &str) -> bool {
    !target.is_empty()
        && target != STATE_DIR
        && !target.starts_with('.')
        && target
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn disk_path(base: &Path, path: &str) -> PathBuf {
    let relative = path.trim_start_matches('/');
    if relative.is_empty() {
        base.to_path_buf()
    } else {
        base.join(relative)
    }
}

fn disk_kind(base: &Path, path: &str) -> Option<NodeKind> {
    fs::symlink_metadata(disk_path(base, path))
        .ok()
        .map(|meta| {
            if meta.is_dir() {
                NodeKind::Directory
            } else {
                NodeKind::File
            }
        })
}

/// The committed tree with the journal applied on top, for `prepare`
struct View<'a> {
    base: &'a Path,
    overlay: BTreeMap<String, Option<NodeKind>>,
}

impl View<'_> {
    fn kind(&self, path: &str) -> Option<NodeKind> {
        for candidate in ancestors(path).iter().rev() {
            if let Some(state) = self.overlay.get(candidate) {
                // anything under a node replaced in this session is gone
                return if candidate == path { *state } else { None };
            }
        }
        disk_kind(self.base, path)
    }

    fn set(&mut self, path: &str, kind: Option<NodeKind>) {
        let prefix = format!("{}/", path);
        self.overlay.retain(|key, _| !key.starts_with(&prefix));
        self.overlay.insert(path.to_string(), kind);
    }

    fn check(&mut self, op: &JournalOp) -> Result<(), String> {
        let parent_is_dir = |view: &Self, path: &str| match split_parent(path) {
            Some((parent, _)) => view.kind(&parent) == Some(NodeKind::Directory),
            None => false,
        };
        match op {
            JournalOp::CreateDirectory { path, .. } => {
                if !parent_is_dir(self, path) {
                    return Err("parent is not a directory".to_string());
                }
                if self.kind(path).is_some() {
                    return Err("already exists".to_string());
                }
                self.set(path, Some(NodeKind::Directory));
            }
            JournalOp::UpdateDirectory { path, .. } => {
                if self.kind(path) != Some(NodeKind::Directory) {
                    return Err("not a directory".to_string());
                }
            }
            JournalOp::Delete { path } => {
                if self.kind(path).is_none() {
                    return Err("does not exist".to_string());
                }
                self.set(path, None);
            }
            JournalOp::Write { path, create, .. } => {
                if !parent_is_dir(self, path) {
                    return Err("parent is not a directory".to_string());
                }
                match (create, self.kind(path)) {
                    (true, Some(_)) => return Err("already exists".to_string()),
                    (false, None) => return Err("does not exist".to_string()),
                    (false, Some(NodeKind::Directory)) => {
                        return Err("is a directory".to_string())
                    }
                    _ => {}
                }
                self.set(path, Some(NodeKind::File));
            }
        }
        Ok(())
    }
}

fn remove_from_manifest(manifest: &mut Manifest, path: &str) {
    let prefix = format!("{}/", path);
    manifest.retain(|key, _| key != path && !key.starts_with(&prefix));
}

impl RemoteSession for FsReceiver {
    fn begin(
        &self,
        target: &str,
        store: &str,
        version: Version,
        credentials: &Credentials,
    ) -> TransportResult<Ticket> {
        if let Some(required) = &self.shared.credentials {
            if required != credentials {
                return Err(TransportError::Authentication {
                    user: credentials.user.clone(),
                });
            }
        }
        if !valid_target(target) {
            return Err(TransportError::rejected(
                "begin",
                target,
                "target must be a plain directory name",
            ));
        }
        let target_dir = self.target_dir(target);
        fs::create_dir_all(&target_dir)
            .map_err(|e| io_err("begin", &target_dir.display().to_string(), e))?;
        fs::create_dir_all(self.state_dir())
            .map_err(|e| io_err("begin", &self.state_dir().display().to_string(), e))?;
        let staging = tempfile::Builder::new()
            .prefix("stage-")
            .tempdir_in(self.state_dir())
            .map_err(|e| io_err("begin", target, e))?;

        let ticket = Ticket::new(format!(
            "fs-{}-{}",
            std::process::id(),
            self.shared.next_ticket.fetch_add(1, Ordering::SeqCst)
        ));
        lock(&self.shared).insert(
            ticket.clone(),
            Txn {
                target: target.to_string(),
                staging,
                journal: Vec::new(),
                prepared: false,
            },
        );
        debug!(%ticket, target, store, %version, "session opened");
        Ok(ticket)
    }

    fn prepare(&self, ticket: &Ticket) -> TransportResult<()> {
        let mut sessions = lock(&self.shared);
        let txn = sessions
            .get_mut(ticket)
            .ok_or_else(|| TransportError::InvalidTicket(ticket.clone()))?;
        let base = self.target_dir(&txn.target);
        let mut view = View {
            base: &base,
            overlay: BTreeMap::new(),
        };
        for op in &txn.journal {
            if let Err(message) = view.check(op) {
                return Err(TransportError::rejected("prepare", op.path(), message));
            }
        }
        txn.prepared = true;
        Ok(())
    }

    fn commit(&self, ticket: &Ticket) -> TransportResult<()> {
        let txn = {
            let mut sessions = lock(&self.shared);
            match sessions.get(ticket) {
                None => return Err(TransportError::InvalidTicket(ticket.clone())),
                Some(txn) if !txn.prepared => {
                    return Err(TransportError::rejected(
                        "commit",
                        ticket.as_str(),
                        "session not prepared",
                    ))
                }
                Some(_) => {}
            }
            match sessions.remove(ticket) {
                Some(txn) => txn,
                None => return Err(TransportError::InvalidTicket(ticket.clone())),
            }
        };

        let base = self.target_dir(&txn.target);
        let mut manifest = self.load_manifest(&txn.target)?;
        let count = txn.journal.len();
        for op in txn.journal {
            match op {
                JournalOp::CreateDirectory { path, entry } => {
                    fs::create_dir(disk_path(&base, &path))
                        .map_err(|e| io_err("create_directory", &path, e))?;
                    manifest.insert(path, entry);
                }
                JournalOp::UpdateDirectory { path, entry } => {
                    manifest.insert(path, entry);
                }
                JournalOp::Delete { path } => {
                    let full = disk_path(&base, &path);
                    let removed = if full.is_dir() && !full.is_symlink() {
                        fs::remove_dir_all(&full)
                    } else {
                        fs::remove_file(&full)
                    };
                    removed.map_err(|e| io_err("delete", &path, e))?;
                    remove_from_manifest(&mut manifest, &path);
                }
                JournalOp::Write {
                    path,
                    staged,
                    entry,
                    ..
                } => {
                    let full = disk_path(&base, &path);
                    if full.is_file() {
                        fs::remove_file(&full).map_err(|e| io_err("write", &path, e))?;
                    }
                    fs::rename(&staged, &full).map_err(|e| io_err("write", &path, e))?;
                    manifest.insert(path, entry);
                }
            }
        }
        self.save_manifest(&txn.target, &manifest)?;
        info!(%ticket, target = %txn.target, operations = count, "session committed");
        Ok(())
    }

    fn abort(&self, ticket: &Ticket) -> TransportResult<()> {
        match lock(&self.shared).remove(ticket) {
            Some(txn) => {
                debug!(%ticket, target = %txn.target, discarded = txn.journal.len(), "session aborted");
                Ok(())
            }
            None => Err(TransportError::InvalidTicket(ticket.clone())),
        }
    }

    fn list(&self, ticket: &Ticket, path: &str) -> TransportResult<Vec<RemoteEntry>> {
        let path = checked_path("list", path)?;
        let target = self.target_of(ticket)?;
        let base = self.target_dir(&target);
        let dir = disk_path(&base, &path);
        if !dir.is_dir() {
            return Err(TransportError::NotFound(path));
        }
        let manifest = self.load_manifest(&target)?;

        let mut entries = Vec::new();
        let listing = fs::read_dir(&dir).map_err(|e| io_err("list", &path, e))?;
        for item in listing {
            let item = item.map_err(|e| io_err("list", &path, e))?;
            let Some(name) = item.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let child = crate::domain::value_objects::extend_path(&path, &name);
            let kind = disk_kind(&base, &child).unwrap_or(NodeKind::File);
            let guid = manifest
                .get(&child)
                .filter(|entry| entry.kind == kind)
                .map(|entry| entry.guid.clone())
                .unwrap_or_else(|| Guid::new(""));
            entries.push(RemoteEntry::new(name, guid, kind));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn create_directory(
        &self,
        ticket: &Ticket,
        path: &str,
        guid: &Guid,
        metadata: &NodeMetadata,
    ) -> TransportResult<()> {
        let path = checked_path("create_directory", path)?;
        let entry = ManifestEntry {
            guid: guid.clone(),
            kind: NodeKind::Directory,
            metadata: metadata.clone(),
            mime_type: None,
        };
        self.journal(ticket, JournalOp::CreateDirectory { path, entry })
    }

    fn update_directory(
        &self,
        ticket: &Ticket,
        path: &str,
        guid: &Guid,
        metadata: &NodeMetadata,
    ) -> TransportResult<()> {
        let path = checked_path("update_directory", path)?;
        let entry = ManifestEntry {
            guid: guid.clone(),
            kind: NodeKind::Directory,
            metadata: metadata.clone(),
            mime_type: None,
        };
        self.journal(ticket, JournalOp::UpdateDirectory { path, entry })
    }

    fn delete(&self, ticket: &Ticket, path: &str) -> TransportResult<()> {
        let path = checked_path("delete", path)?;
        if path == "/" {
            return Err(TransportError::rejected("delete", &path, "cannot delete the target root"));
        }
        self.journal(ticket, JournalOp::Delete { path })
    }

    fn open_write(
        &self,
        ticket: &Ticket,
        request: &WriteRequest,
    ) -> TransportResult<Box<dyn ContentSink>> {
        let path = checked_path("write", &request.path)?;
        let staging = lock(&self.shared)
            .get(ticket)
            .map(|txn| txn.staging.path().to_path_buf())
            .ok_or_else(|| TransportError::InvalidTicket(ticket.clone()))?;
        let file = NamedTempFile::new_in(&staging).map_err(|e| io_err("write", &path, e))?;
        Ok(Box::new(FsSink {
            shared: self.shared.clone(),
            ticket: ticket.clone(),
            path,
            create: request.create,
            entry: ManifestEntry {
                guid: request.guid.clone(),
                kind: NodeKind::File,
                metadata: request.metadata.clone(),
                mime_type: Some(request.mime_type.clone()),
            },
            file,
        }))
    }
}

struct FsSink {
    shared: Arc<Shared>,
    ticket: Ticket,
    path: String,
    create: bool,
    entry: ManifestEntry,
    file: NamedTempFile,
}

impl Write for FsSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl ContentSink for FsSink {
    fn close(self: Box<Self>) -> io::Result<()> {
        let FsSink {
            shared,
            ticket,
            path,
            create,
            entry,
            mut file,
        } = *self;
        file.flush()?;
        let (_, staged) = file.keep().map_err(|e| e.error)?;
        append(
            &shared,
            &ticket,
            JournalOp::Write {
                path,
                create,
                staged,
                entry,
            },
        )
        .map_err(|e| io::Error::other(e.to_string()))
    }
}
