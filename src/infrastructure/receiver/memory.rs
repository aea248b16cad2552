//! In-memory receiver
//!
//! The destination tree lives in a `MemoryStore`, so the receiver can
//! snapshot itself and serve its history for rollback. In transactional
//! mode each ticket works on a private copy of the tree that replaces the
//! committed tree on commit. In direct mode every operation lands
//! immediately and abort discards nothing.

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::domain::entities::{NodeKind, NodeMetadata, RemoteEntry};
use crate::domain::ports::{
    ContentSink, Credentials, DestinationSnapshots, RemoteSession, SourceStore, StoreResult,
    TransportError, TransportResult, WriteRequest,
};
use crate::domain::value_objects::{normalize_path, split_parent, Guid, Ticket, Version};
use crate::infrastructure::store::tree::{Tree, TreeEntry};
use crate::infrastructure::store::MemoryStore;

/// One call that reached the receiver, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverOp {
    Begin { target: String },
    AttachWorker,
    CreateDirectory(String),
    UpdateDirectory(String),
    Delete(String),
    Write { path: String, create: bool },
    Prepare,
    Commit,
    Abort,
}

impl ReceiverOp {
    /// Path of a node operation
    pub fn path(&self) -> Option<&str> {
        match self {
            ReceiverOp::CreateDirectory(p)
            | ReceiverOp::UpdateDirectory(p)
            | ReceiverOp::Delete(p)
            | ReceiverOp::Write { path: p, .. } => Some(p),
            _ => None,
        }
    }

    /// Whether this op changes the tree
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            ReceiverOp::CreateDirectory(_)
                | ReceiverOp::UpdateDirectory(_)
                | ReceiverOp::Delete(_)
                | ReceiverOp::Write { .. }
        )
    }
}

#[derive(Default)]
struct Faults {
    fail_begin: Option<TransportError>,
    fail_write_on: HashMap<String, TransportError>,
    fail_delete_on: HashMap<String, TransportError>,
    fail_create_on: HashMap<String, TransportError>,
    fail_prepare: Option<TransportError>,
    fail_commit: Option<TransportError>,
    fail_abort: Option<TransportError>,
}

struct Txn {
    /// Private working tree in transactional mode
    work: Option<Tree>,
    prepared: bool,
}

struct Inner {
    store: MemoryStore,
    transactional: bool,
    credentials: Option<Credentials>,
    latency: Duration,
    sessions: Mutex<HashMap<Ticket, Txn>>,
    log: Mutex<Vec<ReceiverOp>>,
    faults: Mutex<Faults>,
    next_ticket: AtomicU64,
}

/// Clones share the same destination
#[derive(Clone)]
pub struct MemoryReceiver {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryReceiver {
    /// Transactional receiver: nothing is visible before commit
    pub fn new() -> Self {
        Self::build(true)
    }

    /// Every operation lands immediately; abort keeps partial progress
    pub fn non_transactional() -> Self {
        Self::build(false)
    }

    fn build(transactional: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: MemoryStore::new("receiver"),
                transactional,
                credentials: None,
                latency: Duration::ZERO,
                sessions: Mutex::new(HashMap::new()),
                log: Mutex::new(Vec::new()),
                faults: Mutex::new(Faults::default()),
                next_ticket: AtomicU64::new(1),
            }),
        }
    }

    fn configure(mut self, f: impl FnOnce(&mut Inner)) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => f(inner),
            None => debug!("receiver already shared; configuration ignored"),
        }
        self
    }

    /// Require these credentials at `begin`
    pub fn with_credentials(self, credentials: Credentials) -> Self {
        self.configure(|inner| inner.credentials = Some(credentials))
    }

    /// Sleep this long in every node operation
    pub fn with_latency(self, latency: Duration) -> Self {
        self.configure(|inner| inner.latency = latency)
    }

    /// The committed destination tree
    pub fn store(&self) -> &MemoryStore {
        &self.inner.store
    }

    /// Seed committed content directly, bypassing sessions
    pub fn seed_directory(&self, path: &str, guid: &str) {
        let path = normalize_path(path);
        self.inner.store.with_head(|tree| {
            tree.insert(
                &path,
                TreeEntry::directory(Guid::new(guid), NodeMetadata::default()),
            )
        });
    }

    pub fn seed_file(&self, path: &str, guid: &str, content: &[u8]) {
        let path = normalize_path(path);
        self.inner.store.with_head(|tree| {
            tree.insert(
                &path,
                TreeEntry::file(
                    Guid::new(guid),
                    content.to_vec(),
                    "UTF-8",
                    "text/plain",
                    NodeMetadata::default(),
                ),
            )
        });
    }

    pub fn fail_begin(&self, error: TransportError) {
        lock(&self.inner.faults).fail_begin = Some(error);
    }

    pub fn fail_write_on(&self, path: &str, error: TransportError) {
        lock(&self.inner.faults)
            .fail_write_on
            .insert(normalize_path(path), error);
    }

    pub fn fail_delete_on(&self, path: &str, error: TransportError) {
        lock(&self.inner.faults)
            .fail_delete_on
            .insert(normalize_path(path), error);
    }

    pub fn fail_create_on(&self, path: &str, error: TransportError) {
        lock(&self.inner.faults)
            .fail_create_on
            .insert(normalize_path(path), error);
    }

    pub fn fail_prepare(&self, error: TransportError) {
        lock(&self.inner.faults).fail_prepare = Some(error);
    }

    pub fn fail_commit(&self, error: TransportError) {
        lock(&self.inner.faults).fail_commit = Some(error);
    }

    pub fn fail_abort(&self, error: TransportError) {
        lock(&self.inner.faults).fail_abort = Some(error);
    }

    pub fn clear_faults(&self) {
        *lock(&self.inner.faults) = Faults::default();
    }

    /// Operations received so far
    pub fn ops(&self) -> Vec<ReceiverOp> {
        lock(&self.inner.log).clone()
    }

    pub fn clear_ops(&self) {
        lock(&self.inner.log).clear();
    }

    /// Node operations received so far
    pub fn mutations(&self) -> Vec<ReceiverOp> {
        self.ops().into_iter().filter(|op| op.is_mutation()).collect()
    }

    /// Number of tickets not yet committed or aborted
    pub fn open_sessions(&self) -> usize {
        lock(&self.inner.sessions).len()
    }

    /// Committed file bytes
    pub fn content(&self, path: &str) -> Option<Vec<u8>> {
        self.inner.store.head_content(path)
    }

    /// Committed GUID and kind at `path`
    pub fn entry(&self, path: &str) -> Option<(NodeKind, Guid)> {
        self.inner.store.head_manifest().remove(&normalize_path(path))
    }

    /// Committed metadata at `path`
    pub fn metadata(&self, path: &str) -> Option<NodeMetadata> {
        self.inner
            .store
            .head()
            .get(&normalize_path(path))
            .map(|e| e.metadata.clone())
    }

    fn record(&self, op: ReceiverOp) {
        lock(&self.inner.log).push(op);
    }

    fn pause(&self) {
        if !self.inner.latency.is_zero() {
            thread::sleep(self.inner.latency);
        }
    }

    /// Run `f` against the tree a ticket writes to
    fn mutate<T>(
        &self,
        ticket: &Ticket,
        f: impl FnOnce(&mut Tree) -> TransportResult<T>,
    ) -> TransportResult<T> {
        let mut sessions = lock(&self.inner.sessions);
        let txn = sessions
            .get_mut(ticket)
            .ok_or_else(|| TransportError::InvalidTicket(ticket.clone()))?;
        if txn.prepared {
            return Err(TransportError::rejected(
                "modify",
                "",
                "session already prepared",
            ));
        }
        match txn.work.as_mut() {
            Some(work) => f(work),
            None => self.inner.store.with_head(f),
        }
    }

    fn read<T>(&self, ticket: &Ticket, f: impl FnOnce(&Tree) -> T) -> TransportResult<T> {
        let sessions = lock(&self.inner.sessions);
        let txn = sessions
            .get(ticket)
            .ok_or_else(|| TransportError::InvalidTicket(ticket.clone()))?;
        Ok(match txn.work.as_ref() {
            Some(work) => f(work),
            None => f(&self.inner.store.head()),
        })
    }

    fn injected(&self, pick: impl FnOnce(&Faults) -> Option<TransportError>) -> TransportResult<()> {
        let faults = lock(&self.inner.faults);
        match pick(&*faults) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Default for MemoryReceiver {
    fn default() -> Self {
        Self::new()
    }
}

fn require_parent_directory(tree: &Tree, op: &str, path: &str) -> TransportResult<()> {
    let Some((parent, _)) = split_parent(path) else {
        return Err(TransportError::rejected(op, path, "cannot replace the root"));
    };
    if !tree.is_directory(&parent) {
        return Err(TransportError::rejected(
            op,
            path,
            format!("parent {} is not a directory", parent),
        ));
    }
    Ok(())
}

impl RemoteSession for MemoryReceiver {
    fn begin(
        &self,
        target: &str,
        _store: &str,
        _version: Version,
        credentials: &Credentials,
    ) -> TransportResult<Ticket> {
        self.injected(|f| f.fail_begin.clone())?;
        if let Some(required) = &self.inner.credentials {
            if required != credentials {
                return Err(TransportError::Authentication {
                    user: credentials.user.clone(),
                });
            }
        }
        let ticket = Ticket::new(format!(
            "mem-{}",
            self.inner.next_ticket.fetch_add(1, Ordering::SeqCst)
        ));
        let work = self.inner.transactional.then(|| self.inner.store.head());
        lock(&self.inner.sessions).insert(
            ticket.clone(),
            Txn {
                work,
                prepared: false,
            },
        );
        self.record(ReceiverOp::Begin {
            target: target.to_string(),
        });
        Ok(ticket)
    }

    fn attach_worker(&self, ticket: &Ticket) -> TransportResult<()> {
        if !lock(&self.inner.sessions).contains_key(ticket) {
            return Err(TransportError::InvalidTicket(ticket.clone()));
        }
        self.record(ReceiverOp::AttachWorker);
        Ok(())
    }

    fn prepare(&self, ticket: &Ticket) -> TransportResult<()> {
        self.injected(|f| f.fail_prepare.clone())?;
        let mut sessions = lock(&self.inner.sessions);
        let txn = sessions
            .get_mut(ticket)
            .ok_or_else(|| TransportError::InvalidTicket(ticket.clone()))?;
        txn.prepared = true;
        drop(sessions);
        self.record(ReceiverOp::Prepare);
        Ok(())
    }

    fn commit(&self, ticket: &Ticket) -> TransportResult<()> {
        self.injected(|f| f.fail_commit.clone())?;
        let mut sessions = lock(&self.inner.sessions);
        match sessions.get(ticket) {
            None => return Err(TransportError::InvalidTicket(ticket.clone())),
            Some(txn) if !txn.prepared => {
                return Err(TransportError::rejected("commit", "", "session not prepared"))
            }
            Some(_) => {}
        }
        if let Some(txn) = sessions.remove(ticket) {
            if let Some(work) = txn.work {
                self.inner.store.replace_head(work);
            }
        }
        drop(sessions);
        self.record(ReceiverOp::Commit);
        Ok(())
    }

    fn abort(&self, ticket: &Ticket) -> TransportResult<()> {
        self.injected(|f| f.fail_abort.clone())?;
        if lock(&self.inner.sessions).remove(ticket).is_none() {
            return Err(TransportError::InvalidTicket(ticket.clone()));
        }
        self.record(ReceiverOp::Abort);
        Ok(())
    }

    fn list(&self, ticket: &Ticket, path: &str) -> TransportResult<Vec<RemoteEntry>> {
        self.pause();
        let path = normalize_path(path);
        self.read(ticket, |tree| {
            if !tree.is_directory(&path) {
                return Err(TransportError::NotFound(path.clone()));
            }
            Ok(tree
                .children(&path)
                .into_iter()
                .map(|(name, entry)| RemoteEntry::new(name, entry.guid.clone(), entry.kind))
                .collect())
        })?
    }

    fn create_directory(
        &self,
        ticket: &Ticket,
        path: &str,
        guid: &Guid,
        metadata: &NodeMetadata,
    ) -> TransportResult<()> {
        self.pause();
        let path = normalize_path(path);
        self.injected(|f| f.fail_create_on.get(&path).cloned())?;
        self.mutate(ticket, |tree| {
            require_parent_directory(tree, "create_directory", &path)?;
            if tree.get(&path).is_some() {
                return Err(TransportError::rejected(
                    "create_directory",
                    &path,
                    "already exists",
                ));
            }
            tree.insert(&path, TreeEntry::directory(guid.clone(), metadata.clone()));
            Ok(())
        })?;
        self.record(ReceiverOp::CreateDirectory(path));
        Ok(())
    }

    fn update_directory(
        &self,
        ticket: &Ticket,
        path: &str,
        guid: &Guid,
        metadata: &NodeMetadata,
    ) -> TransportResult<()> {
        self.pause();
        let path = normalize_path(path);
        self.mutate(ticket, |tree| match tree.get_mut(&path) {
            Some(entry) if entry.kind.is_directory() => {
                entry.guid = guid.clone();
                entry.metadata = metadata.clone();
                Ok(())
            }
            _ => Err(TransportError::rejected(
                "update_directory",
                &path,
                "not a directory",
            )),
        })?;
        self.record(ReceiverOp::UpdateDirectory(path));
        Ok(())
    }

    fn delete(&self, ticket: &Ticket, path: &str) -> TransportResult<()> {
        self.pause();
        let path = normalize_path(path);
        self.injected(|f| f.fail_delete_on.get(&path).cloned())?;
        self.mutate(ticket, |tree| {
            if tree.remove_subtree(&path) {
                Ok(())
            } else {
                Err(TransportError::NotFound(path.clone()))
            }
        })?;
        self.record(ReceiverOp::Delete(path));
        Ok(())
    }

    fn open_write(
        &self,
        ticket: &Ticket,
        request: &WriteRequest,
    ) -> TransportResult<Box<dyn ContentSink>> {
        self.pause();
        let path = normalize_path(&request.path);
        self.injected(|f| f.fail_write_on.get(&path).cloned())?;
        self.read(ticket, |tree| {
            require_parent_directory(tree, "write", &path)?;
            match (request.create, tree.get(&path)) {
                (true, Some(_)) => Err(TransportError::rejected("create", &path, "already exists")),
                (false, Some(entry)) if entry.kind.is_directory() => Err(
                    TransportError::rejected("update", &path, "is a directory"),
                ),
                (false, None) => Err(TransportError::NotFound(path.clone())),
                _ => Ok(()),
            }
        })??;
        Ok(Box::new(MemorySink {
            receiver: self.clone(),
            ticket: ticket.clone(),
            request: WriteRequest {
                path,
                ..request.clone()
            },
            buffer: Vec::new(),
        }))
    }
}

struct MemorySink {
    receiver: MemoryReceiver,
    ticket: Ticket,
    request: WriteRequest,
    buffer: Vec<u8>,
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ContentSink for MemorySink {
    fn close(self: Box<Self>) -> io::Result<()> {
        let MemorySink {
            receiver,
            ticket,
            request,
            buffer,
        } = *self;
        let entry = TreeEntry::file(
            request.guid.clone(),
            buffer,
            request.encoding.clone(),
            request.mime_type.clone(),
            request.metadata.clone(),
        );
        receiver
            .mutate(&ticket, |tree| {
                tree.insert(&request.path, entry);
                Ok(())
            })
            .map_err(|e| io::Error::other(e.to_string()))?;
        receiver.record(ReceiverOp::Write {
            path: request.path,
            create: request.create,
        });
        Ok(())
    }
}

impl DestinationSnapshots for MemoryReceiver {
    fn create_snapshot(&self, label: &str) -> StoreResult<Version> {
        self.inner.store.create_snapshot(label)
    }

    fn history(&self) -> Arc<dyn SourceStore> {
        Arc::new(self.inner.store.clone())
    }
}
