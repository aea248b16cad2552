//! Worker pool lifecycle

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Sender};
use tracing::{debug, warn};

use super::worker::{TransferControl, TransferWorker, WorkerStats};
use super::{ContentCopier, EventSender};
use crate::domain::entities::DeploymentWork;
use crate::domain::value_objects::Ticket;
use crate::error::{DeployError, DeployResult};

/// Producer handle onto the work queue
#[derive(Clone)]
pub struct WorkQueue {
    tx: Sender<DeploymentWork>,
    control: Arc<TransferControl>,
}

impl WorkQueue {
    /// Fails once the pipeline has stopped or every worker has exited
    pub fn push(&self, work: DeploymentWork) -> DeployResult<()> {
        if self.is_stopped() {
            return Err(DeployError::PipelineStopped);
        }
        self.tx.send(work).map_err(|_| DeployError::PipelineStopped)
    }

    /// Whether queued work will no longer be transferred
    pub fn is_stopped(&self) -> bool {
        self.control.has_failed() || self.control.is_cancelled()
    }
}

/// Errors and totals once every worker has stopped
#[derive(Debug, Default)]
pub struct PipelineOutcome {
    pub errors: Vec<DeployError>,
    pub stats: WorkerStats,
}

pub struct TransferPipeline {
    queue: WorkQueue,
    control: Arc<TransferControl>,
    workers: Vec<(usize, JoinHandle<WorkerStats>)>,
}

impl TransferPipeline {
    pub fn start(
        copier: Arc<ContentCopier>,
        ticket: &Ticket,
        events: &EventSender,
        workers: usize,
        poll: Duration,
    ) -> DeployResult<Self> {
        let (tx, rx) = channel::unbounded();
        let control = Arc::new(TransferControl::new());
        let mut pipeline = Self {
            queue: WorkQueue {
                tx,
                control: control.clone(),
            },
            control: control.clone(),
            workers: Vec::new(),
        };

        for id in 0..workers.max(1) {
            let worker = TransferWorker {
                id,
                queue: rx.clone(),
                copier: copier.clone(),
                ticket: ticket.clone(),
                events: events.clone(),
                control: control.clone(),
                poll,
            };
            let spawned = thread::Builder::new()
                .name(format!("treeship-transfer-{}", id))
                .spawn(move || worker.run());
            match spawned {
                Ok(handle) => pipeline.workers.push((id, handle)),
                Err(err) => {
                    pipeline.cancel();
                    pipeline.finish();
                    return Err(err.into());
                }
            }
        }
        debug!(workers = pipeline.workers.len(), "transfer pipeline started");
        Ok(pipeline)
    }

    pub fn queue(&self) -> WorkQueue {
        self.queue.clone()
    }

    pub fn control(&self) -> &Arc<TransferControl> {
        &self.control
    }

    /// Drop whatever is still queued instead of transferring it
    pub fn cancel(&self) {
        self.control.cancel();
    }

    /// Close the queue, wait for every worker, and collect their errors.
    ///
    /// All other `WorkQueue` clones must be dropped first, or the workers
    /// never see the queue close.
    pub fn finish(self) -> PipelineOutcome {
        let Self {
            queue,
            control,
            workers,
        } = self;
        drop(queue);

        let mut stats = WorkerStats::default();
        for (id, handle) in workers {
            match handle.join() {
                Ok(worker_stats) => stats.merge(worker_stats),
                Err(_) => {
                    warn!(worker = id, "transfer worker panicked");
                    control.record(DeployError::WorkerPanicked { worker: id });
                }
            }
        }

        PipelineOutcome {
            errors: control.take_errors(),
            stats,
        }
    }
}
