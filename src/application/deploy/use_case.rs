//! Deploy Use Case
//!
//! Orchestrates one deployment:
//! 1. Acquire the destination lease
//! 2. Resolve the source version and emit START
//! 3. Open a session and make sure the destination root exists
//! 4. Walk the trees (direct, queued or dry run)
//! 5. Prepare and commit, or abort and roll back
//! 6. Release the lease, always last
//!
//! The walk itself lives in `walker`; this type only sequences the steps
//! and converges every failure on the same abort path.

use std::sync::Arc;

use tracing::{debug, info, info_span, warn};

use crate::domain::entities::{
    DeploymentEvent, DeploymentReport, EventKind, EventSource, NodeKind, NodeMetadata,
};
use crate::domain::ports::{
    Clock, DeploymentCallback, DestinationSnapshots, FilterChain, LockProvider, NoopCallback,
    RemoteSession, SourceStore, StoreError, SystemClock,
};
use crate::domain::value_objects::{ancestors, DeployMode, Guid, Ticket, Version, VersionRequest};
use crate::error::{DeployError, DeployResult};
use crate::lease::{LeaseProbe, LockLease};
use crate::transfer::{ContentCopier, EventDispatcher, EventSender, TransferPipeline};

use super::options::{DeploymentRequest, EngineSettings};
use super::state::{DeployState, StateTracker};
use super::walker::{Apply, TreeWalker};

/// Deploy use case - deploys source store trees onto one receiver
///
/// Parameterized by its ports so tests can run it against in-memory
/// stores, receivers and lock tables.
pub struct DeployUseCase {
    store: Arc<dyn SourceStore>,
    session: Arc<dyn RemoteSession>,
    locks: Arc<dyn LockProvider>,
    snapshots: Option<Arc<dyn DestinationSnapshots>>,
    filters: FilterChain,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
}

impl DeployUseCase {
    pub fn new(
        store: Arc<dyn SourceStore>,
        session: Arc<dyn RemoteSession>,
        locks: Arc<dyn LockProvider>,
    ) -> Self {
        Self {
            store,
            session,
            locks,
            snapshots: None,
            filters: FilterChain::new(),
            clock: Arc::new(SystemClock::new()),
            settings: EngineSettings::default(),
        }
    }

    /// Destination history used for pre-deployment snapshots and rollback
    pub fn with_snapshots(mut self, snapshots: Arc<dyn DestinationSnapshots>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    pub fn with_filters(mut self, filters: FilterChain) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Execute the deploy use case
    pub fn execute(&self, request: &DeploymentRequest) -> DeployResult<DeploymentReport> {
        self.execute_with_callback(request, Arc::new(NoopCallback))
    }

    /// Execute the deploy use case, delivering every event to `callback`
    pub fn execute_with_callback(
        &self,
        request: &DeploymentRequest,
        callback: Arc<dyn DeploymentCallback>,
    ) -> DeployResult<DeploymentReport> {
        let mut states = StateTracker::new();
        self.execute_tracked(request, callback, &mut states)
    }

    /// Like `execute_with_callback`, recording state transitions in `states`
    pub fn execute_tracked(
        &self,
        request: &DeploymentRequest,
        callback: Arc<dyn DeploymentCallback>,
        states: &mut StateTracker,
    ) -> DeployResult<DeploymentReport> {
        let span = info_span!(
            "deploy",
            source = %request.source,
            destination = %request.destination,
            mode = %request.mode,
        );
        let _enter = span.enter();

        if request.source.store() != self.store.name() {
            return Err(StoreError::UnknownStore(request.source.store().to_string()).into());
        }

        states.advance(DeployState::LockAcquiring);
        let mut lease = match LockLease::acquire(
            self.locks.clone(),
            request.destination.lock_name(),
            &self.settings.lease,
            self.clock.clone(),
        ) {
            Ok(lease) => lease,
            Err(err) => {
                warn!(error = %err, "could not lock destination");
                states.advance(DeployState::Done);
                return Err(err);
            }
        };
        states.advance(DeployState::Locked);

        let outcome = self.run_locked(request, callback, &lease, states);

        if let Err(err) = lease.release() {
            warn!(lock = %lease.name(), error = %err, "failed to release lock");
        }
        states.advance(DeployState::Released);
        states.advance(DeployState::Done);

        match &outcome {
            Ok(report) => info!(
                created = report.created(),
                updated = report.updated(),
                deleted = report.deleted(),
                "deployment finished"
            ),
            Err(err) => warn!(error = %err, "deployment failed"),
        }
        outcome
    }

    fn run_locked(
        &self,
        request: &DeploymentRequest,
        callback: Arc<dyn DeploymentCallback>,
        lease: &LockLease,
        states: &mut StateTracker,
    ) -> DeployResult<DeploymentReport> {
        let dispatcher = match EventDispatcher::start(callback, self.settings.poll_interval) {
            Ok(dispatcher) => dispatcher,
            Err(err) => {
                states.advance(DeployState::Aborting);
                return Err(err.into());
            }
        };

        let mut run = Run {
            use_case: self,
            request,
            probe: lease.probe(),
            events: dispatcher.sender(),
            states,
            version: None,
            ticket: None,
            pre_snapshot: None,
        };
        let outcome = match run.execute() {
            Ok(()) => Ok(()),
            Err(cause) => Err(run.fail(cause)),
        };
        let version = run.version;
        drop(run);

        let mut report = dispatcher.finish();
        if let Some(version) = version {
            report.set_version(version);
        }
        outcome.map(|()| report)
    }
}

/// State of one deployment while the lease is held
struct Run<'a> {
    use_case: &'a DeployUseCase,
    request: &'a DeploymentRequest,
    probe: LeaseProbe,
    events: EventSender,
    states: &'a mut StateTracker,
    version: Option<Version>,
    /// Open ticket that still needs commit or abort
    ticket: Option<Ticket>,
    pre_snapshot: Option<Version>,
}

impl Run<'_> {
    fn dest_root(&self) -> &str {
        &self.request.destination.path
    }

    fn bracket(&self, kind: EventKind, version: Version) -> DeploymentEvent {
        DeploymentEvent::new(
            kind,
            Some(EventSource::new(version, self.request.source.path())),
            self.dest_root(),
        )
    }

    fn execute(&mut self) -> DeployResult<()> {
        let use_case = self.use_case;
        let store = use_case.store.as_ref();
        let session = use_case.session.as_ref();

        let version = match self.request.version {
            VersionRequest::NewSnapshot => {
                store.create_snapshot(&format!("deploy to {}", self.request.destination))?
            }
            VersionRequest::At(version) => version,
        };
        self.version = Some(version);
        info!(%version, "deploying");
        self.events.send(self.bracket(EventKind::Start, version));

        self.probe.check_live()?;
        let source_root = self.request.source.path();
        match store.lookup(version, source_root)? {
            None => {
                return Err(StoreError::NotFound {
                    path: source_root.to_string(),
                    version,
                }
                .into())
            }
            Some(node) if !node.is_directory() => {
                return Err(DeployError::StructuralMismatch {
                    path: source_root.to_string(),
                    expected: NodeKind::Directory,
                    found: node.kind(),
                })
            }
            Some(_) => {}
        }

        if self.request.mode == DeployMode::Direct && !self.request.dry_run {
            if let Some(snapshots) = &use_case.snapshots {
                let label = format!("pre-deploy {}@{}", self.request.source, version);
                let snapshot = snapshots.create_snapshot(&label)?;
                debug!(%snapshot, "destination snapshot taken");
                self.pre_snapshot = Some(snapshot);
            }
        }

        let ticket = session.begin(
            &self.request.destination.target,
            store.name(),
            version,
            &self.request.credentials,
        )?;
        self.ticket = Some(ticket.clone());
        self.states.advance(DeployState::SessionOpen);

        let dest_exists = self.prepare_destination(&ticket)?;

        self.states.advance(DeployState::Diffing);
        self.walk(&ticket, version, dest_exists)?;
        self.probe.check_live()?;

        if self.request.dry_run {
            self.states.advance(DeployState::Aborting);
            self.ticket = None;
            self.abort_quietly(&ticket);
        } else {
            self.states.advance(DeployState::Committing);
            session.prepare(&ticket)?;
            session.commit(&ticket)?;
            self.ticket = None;
        }

        self.events.send(self.bracket(EventKind::End, version));
        Ok(())
    }

    /// Check the destination root, creating missing ancestors when asked.
    ///
    /// Returns whether the root can be listed under the ticket.
    fn prepare_destination(&self, ticket: &Ticket) -> DeployResult<bool> {
        let session = self.use_case.session.as_ref();
        let root = self.dest_root();

        match session.lookup(ticket, root)? {
            Some(entry) if entry.is_directory() => return Ok(true),
            Some(_) => {
                return Err(DeployError::StructuralMismatch {
                    path: root.to_string(),
                    expected: NodeKind::Directory,
                    found: NodeKind::File,
                })
            }
            None if !self.request.create_destination => {
                return Err(DeployError::DestinationNotFound {
                    path: root.to_string(),
                })
            }
            None => {}
        }

        let mut missing = false;
        for path in ancestors(root) {
            if !missing {
                match session.lookup(ticket, &path)? {
                    Some(entry) if entry.is_directory() => continue,
                    Some(_) => {
                        return Err(DeployError::StructuralMismatch {
                            path,
                            expected: NodeKind::Directory,
                            found: NodeKind::File,
                        })
                    }
                    None => missing = true,
                }
            }
            if !self.request.dry_run {
                session.create_directory(
                    ticket,
                    &path,
                    &Guid::derived(["treeship-destination", path.as_str()]),
                    &NodeMetadata::default(),
                )?;
            }
            debug!(path = %path, "created destination directory");
            self.events
                .send(DeploymentEvent::new(EventKind::Created, None, path));
        }
        Ok(false)
    }

    fn walker<'w>(&'w self, ticket: &'w Ticket, version: Version, apply: Apply<'w>) -> TreeWalker<'w> {
        TreeWalker {
            store: self.use_case.store.as_ref(),
            session: self.use_case.session.as_ref(),
            ticket,
            version,
            apply,
            events: Some(&self.events),
            probe: Some(&self.probe),
            matcher: self.request.matcher.as_deref(),
            dont_delete: self.request.dont_delete,
        }
    }

    fn walk(&mut self, ticket: &Ticket, version: Version, dest_exists: bool) -> DeployResult<()> {
        let use_case = self.use_case;
        let request = self.request;
        let copier = Arc::new(ContentCopier::new(
            use_case.store.clone(),
            use_case.session.clone(),
            use_case.filters.clone(),
            use_case.settings.buffer_size,
        ));
        let (source_root, dest_root) = (request.source.path(), request.destination.path.as_str());

        if request.dry_run {
            return self
                .walker(ticket, version, Apply::DryRun)
                .walk(source_root, dest_root, dest_exists);
        }
        if request.mode == DeployMode::Direct {
            return self
                .walker(ticket, version, Apply::Direct(copier.as_ref()))
                .walk(source_root, dest_root, dest_exists);
        }

        let pipeline = TransferPipeline::start(
            copier.clone(),
            ticket,
            &self.events,
            use_case.settings.workers,
            use_case.settings.poll_interval,
        )?;
        // the walker's queue handle must be dropped before `finish` can drain
        let walked = self
            .walker(ticket, version, Apply::Queued(pipeline.queue()))
            .walk(source_root, dest_root, dest_exists);
        if walked.is_err() {
            pipeline.cancel();
        }

        self.states.advance(DeployState::Transferring);
        let outcome = pipeline.finish();
        debug!(stats = ?outcome.stats, errors = outcome.errors.len(), "transfers drained");
        match (walked, outcome.errors.into_iter().next()) {
            // the walk only stopped because a transfer failed first
            (Err(DeployError::PipelineStopped), Some(first)) => Err(first),
            (Err(err), _) => Err(err),
            (Ok(()), Some(first)) => Err(first),
            (Ok(()), None) => Ok(()),
        }
    }

    fn abort_quietly(&self, ticket: &Ticket) {
        if let Err(err) = self.use_case.session.abort(ticket) {
            warn!(%ticket, error = %err, "abort failed");
        }
    }

    /// Converge a failure: FAILED event, abort, rollback. The lease is
    /// released by the caller afterwards.
    fn fail(&mut self, cause: DeployError) -> DeployError {
        self.states.advance(DeployState::Aborting);
        if let Some(version) = self.version {
            self.events.send(
                self.bracket(EventKind::Failed, version)
                    .with_message(cause.to_string()),
            );
        }
        if let Some(ticket) = self.ticket.take() {
            self.abort_quietly(&ticket);
        }

        let rollback = match self.rollback() {
            Ok(()) => None,
            Err(err) => {
                warn!(error = %err, "rollback failed");
                Some(Box::new(err))
            }
        };

        DeployError::Failed {
            destination: self.request.destination.to_string(),
            source_path: self.request.source.to_string(),
            version: self.version,
            cause: Box::new(cause),
            rollback,
        }
    }

    /// Re-deploy the pre-deployment snapshot onto the destination
    fn rollback(&self) -> DeployResult<()> {
        let (Some(snapshots), Some(snapshot)) = (&self.use_case.snapshots, self.pre_snapshot)
        else {
            return Ok(());
        };
        info!(%snapshot, "rolling back destination");
        let history = snapshots.history();
        let session = self.use_case.session.as_ref();

        let replayed = session
            .begin(
                &self.request.destination.target,
                history.name(),
                snapshot,
                &self.request.credentials,
            )
            .map_err(DeployError::from)
            .and_then(|ticket| {
                let result = self.replay(&ticket, &history, snapshot);
                if result.is_err() {
                    self.abort_quietly(&ticket);
                }
                result
            });
        replayed.map_err(|cause| DeployError::Rollback {
            version: snapshot,
            cause: Box::new(cause),
        })
    }

    fn replay(
        &self,
        ticket: &Ticket,
        history: &Arc<dyn SourceStore>,
        snapshot: Version,
    ) -> DeployResult<()> {
        let session = self.use_case.session.as_ref();
        let root = self.dest_root();

        // destination directories created by the failed run
        for path in ancestors(root) {
            if history.lookup(snapshot, &path)?.is_none() {
                if session.lookup(ticket, &path)?.is_some() {
                    session.delete(ticket, &path)?;
                }
                session.prepare(ticket)?;
                return Ok(session.commit(ticket)?);
            }
        }

        let copier = ContentCopier::new(
            history.clone(),
            self.use_case.session.clone(),
            FilterChain::new(),
            self.use_case.settings.buffer_size,
        );
        let walker = TreeWalker {
            store: history.as_ref(),
            session,
            ticket,
            version: snapshot,
            apply: Apply::Direct(&copier),
            events: None,
            probe: None,
            matcher: None,
            dont_delete: false,
        };
        walker.walk(root, root, true)?;
        session.prepare(ticket)?;
        session.commit(ticket)?;
        Ok(())
    }
}
