//! Tree walk
//!
//! Applies the merge-join decisions of every directory pair, depth first.
//! Directory operations always run on the walking thread, before any of
//! the directory's children are touched. What happens to file content and
//! deletes depends on the `Apply` mode.

use tracing::trace;

use crate::domain::entities::{
    DeploymentEvent, DeploymentWork, EventKind, EventSource, RemoteEntry, VersionedNode,
};
use crate::domain::ports::{NameMatcher, RemoteSession, SourceStore};
use crate::domain::services::{merge_join, sort_entries, sort_nodes, Decision};
use crate::domain::value_objects::{extend_path, Ticket, Version};
use crate::error::{DeployError, DeployResult};
use crate::lease::LeaseProbe;
use crate::transfer::{ContentCopier, EventSender, WorkQueue};

/// How decisions reach the destination
pub(super) enum Apply<'a> {
    /// Every remote call happens here, in walk order
    Direct(&'a ContentCopier),
    /// File transfers and deletes go to the transfer workers
    Queued(WorkQueue),
    /// Events only; no mutating remote call
    DryRun,
}

pub(super) struct TreeWalker<'a> {
    pub store: &'a dyn SourceStore,
    pub session: &'a dyn RemoteSession,
    pub ticket: &'a Ticket,
    pub version: Version,
    pub apply: Apply<'a>,
    pub events: Option<&'a EventSender>,
    pub probe: Option<&'a LeaseProbe>,
    pub matcher: Option<&'a dyn NameMatcher>,
    pub dont_delete: bool,
}

impl TreeWalker<'_> {
    /// Reconcile the destination directory `dest_root` with the source
    /// directory `source_root`. When `dest_exists` is false the destination
    /// side is treated as empty without listing it.
    pub fn walk(&self, source_root: &str, dest_root: &str, dest_exists: bool) -> DeployResult<()> {
        self.reconcile(source_root, dest_root, dest_exists)
    }

    /// Stop once the lease is lost or queued transfers have stopped
    fn checkpoint(&self) -> DeployResult<()> {
        if let Apply::Queued(queue) = &self.apply {
            if queue.is_stopped() {
                return Err(DeployError::PipelineStopped);
            }
        }
        match self.probe {
            Some(probe) => probe.check_live(),
            None => Ok(()),
        }
    }

    fn is_dry_run(&self) -> bool {
        matches!(self.apply, Apply::DryRun)
    }

    fn excluded(&self, source: Option<&str>, dest: Option<&str>, is_directory: bool) -> bool {
        self.matcher
            .is_some_and(|m| m.excludes(source, dest, is_directory))
    }

    fn emit(&self, event: DeploymentEvent) {
        if let Some(events) = self.events {
            events.send(event);
        }
    }

    fn event(&self, kind: EventKind, source_path: &str, dest: &str) -> DeploymentEvent {
        DeploymentEvent::new(
            kind,
            Some(EventSource::new(self.version, source_path)),
            dest,
        )
    }

    /// Live, non-stale children of a source directory in name order
    fn source_children(&self, path: &str) -> DeployResult<Vec<VersionedNode>> {
        let mut children: Vec<VersionedNode> = self
            .store
            .list(self.version, path)?
            .into_values()
            .filter(|node| {
                let stale = self.store.is_stale(self.version, node);
                if stale {
                    trace!(path = node.path(), "skipping stale node");
                }
                !stale
            })
            .collect();
        sort_nodes(&mut children);
        Ok(children)
    }

    fn dest_children(&self, path: &str) -> DeployResult<Vec<RemoteEntry>> {
        let mut entries = self.session.list(self.ticket, path)?;
        sort_entries(&mut entries);
        Ok(entries)
    }

    fn reconcile(&self, source_dir: &str, dest_dir: &str, dest_exists: bool) -> DeployResult<()> {
        self.checkpoint()?;
        let source = self.source_children(source_dir)?;
        let dest = if dest_exists {
            self.dest_children(dest_dir)?
        } else {
            Vec::new()
        };

        for decision in merge_join(&source, &dest) {
            let dest_path = extend_path(dest_dir, decision.name());
            match decision {
                Decision::Unchanged { .. } => {}
                Decision::Create(node) => {
                    if !self.excluded(Some(node.path()), Some(&dest_path), node.is_directory()) {
                        self.materialize(node, &dest_path)?;
                    }
                }
                Decision::Update { source, dest } => {
                    if self.excluded(Some(source.path()), Some(&dest_path), false) {
                        continue;
                    }
                    // a file replacing a directory is one UPDATED event
                    let create = dest.is_directory();
                    if create {
                        self.delete_now(&dest_path)?;
                    }
                    self.transfer(source, &dest_path, create, EventKind::Updated)?;
                }
                Decision::Descend { source, .. } => {
                    if self.excluded(Some(source.path()), Some(&dest_path), true) {
                        continue;
                    }
                    if !self.is_dry_run() {
                        self.session.update_directory(
                            self.ticket,
                            &dest_path,
                            source.guid(),
                            source.metadata(),
                        )?;
                    }
                    self.reconcile(source.path(), &dest_path, true)?;
                }
                Decision::Replace { source, .. } => {
                    if self.excluded(Some(source.path()), Some(&dest_path), true) {
                        continue;
                    }
                    self.delete_now(&dest_path)?;
                    self.materialize(source, &dest_path)?;
                }
                Decision::Delete(entry) => {
                    if self.dont_delete
                        || self.excluded(None, Some(&dest_path), entry.is_directory())
                    {
                        continue;
                    }
                    let source_path = extend_path(source_dir, &entry.name);
                    self.delete(&source_path, &dest_path)?;
                }
            }
        }
        Ok(())
    }

    /// Create `node` and everything under it at `dest`
    fn materialize(&self, node: &VersionedNode, dest: &str) -> DeployResult<()> {
        if !node.is_directory() {
            return self.transfer(node, dest, true, EventKind::Created);
        }

        if !self.is_dry_run() {
            self.session
                .create_directory(self.ticket, dest, node.guid(), node.metadata())?;
        }
        self.emit(self.event(EventKind::Created, node.path(), dest));

        self.checkpoint()?;
        for child in self.source_children(node.path())? {
            let child_dest = extend_path(dest, child.name());
            if self.excluded(Some(child.path()), Some(&child_dest), child.is_directory()) {
                continue;
            }
            self.materialize(&child, &child_dest)?;
        }
        Ok(())
    }

    fn transfer(
        &self,
        node: &VersionedNode,
        dest: &str,
        create: bool,
        kind: EventKind,
    ) -> DeployResult<()> {
        let event = self.event(kind, node.path(), dest);
        match &self.apply {
            Apply::Direct(copier) => {
                copier.copy(self.ticket, self.version, node, dest, create)?;
                self.emit(event);
            }
            Apply::Queued(queue) => {
                queue.push(DeploymentWork::transfer(
                    event,
                    self.ticket.clone(),
                    node.clone(),
                    self.version,
                    create,
                ))?;
            }
            Apply::DryRun => self.emit(event),
        }
        Ok(())
    }

    fn delete(&self, source_path: &str, dest: &str) -> DeployResult<()> {
        let event = self.event(EventKind::Deleted, source_path, dest);
        match &self.apply {
            Apply::Direct(_) => {
                self.session.delete(self.ticket, dest)?;
                self.emit(event);
            }
            Apply::Queued(queue) => {
                queue.push(DeploymentWork::delete(event, self.ticket.clone()))?;
            }
            Apply::DryRun => self.emit(event),
        }
        Ok(())
    }

    /// Remove a node of the wrong type before its replacement is written.
    /// Runs on this thread in every mode and emits no event of its own.
    fn delete_now(&self, dest: &str) -> DeployResult<()> {
        if !self.is_dry_run() {
            self.session.delete(self.ticket, dest)?;
        }
        Ok(())
    }
}
