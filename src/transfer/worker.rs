//! Transfer workers and the state they share

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError};
use tracing::{debug, info_span, warn};

use super::{ContentCopier, EventSender};
use crate::domain::entities::{DeploymentWork, WorkAction};
use crate::domain::value_objects::Ticket;
use crate::error::{DeployError, DeployResult};

/// Error list and stop flags shared by the workers and the orchestrator.
///
/// An error is pushed before `failed` is set, so a worker that sees the
/// flag also sees at least one recorded error.
#[derive(Debug, Default)]
pub struct TransferControl {
    errors: Mutex<Vec<DeployError>>,
    failed: AtomicBool,
    cancelled: AtomicBool,
}

impl TransferControl {
    pub fn new() -> Self {
        Self::default()
    }

    fn errors(&self) -> MutexGuard<'_, Vec<DeployError>> {
        self.errors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, error: DeployError) {
        self.errors().push(error);
        self.failed.store(true, Ordering::Release);
    }

    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Skip everything still queued
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Recorded errors, first recorded first
    pub fn take_errors(&self) -> Vec<DeployError> {
        std::mem::take(&mut *self.errors())
    }
}

/// What one worker did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub transferred: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub bytes: u64,
}

impl WorkerStats {
    pub fn merge(&mut self, other: WorkerStats) {
        self.transferred += other.transferred;
        self.deleted += other.deleted;
        self.skipped += other.skipped;
        self.bytes += other.bytes;
    }
}

pub(super) struct TransferWorker {
    pub id: usize,
    pub queue: Receiver<DeploymentWork>,
    pub copier: Arc<ContentCopier>,
    pub ticket: Ticket,
    pub events: EventSender,
    pub control: Arc<TransferControl>,
    pub poll: Duration,
}

impl TransferWorker {
    /// Drain the queue until every producer has hung up.
    ///
    /// Once any worker has failed, remaining items are received and
    /// dropped without touching the destination.
    pub fn run(self) -> WorkerStats {
        let span = info_span!("transfer_worker", worker = self.id);
        let _enter = span.enter();
        let mut stats = WorkerStats::default();

        if let Err(err) = self.copier.session().attach_worker(&self.ticket) {
            warn!(error = %err, "worker could not attach to session");
            self.control.record(err.into());
        }

        loop {
            let work = match self.queue.recv_timeout(self.poll) {
                Ok(work) => work,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            if self.control.has_failed() || self.control.is_cancelled() {
                stats.skipped += 1;
                continue;
            }
            match self.process(&work, &mut stats) {
                Ok(()) => self.events.send(work.into_event()),
                Err(err) => {
                    warn!(path = work.destination(), error = %err, "transfer failed");
                    self.control.record(err);
                }
            }
        }

        debug!(?stats, "worker finished");
        stats
    }

    fn process(&self, work: &DeploymentWork, stats: &mut WorkerStats) -> DeployResult<()> {
        match work.action() {
            WorkAction::Write {
                node,
                version,
                create,
            } => {
                let bytes =
                    self.copier
                        .copy(work.ticket(), version, node, work.destination(), create)?;
                stats.transferred += 1;
                stats.bytes += bytes;
            }
            WorkAction::Delete => {
                self.copier
                    .session()
                    .delete(work.ticket(), work.destination())?;
                stats.deleted += 1;
            }
        }
        Ok(())
    }
}
