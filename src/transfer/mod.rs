//! Transfer pipeline
//!
//! Queued-mode deployments hand file content transfers and deletes to a
//! fixed pool of worker threads through an unbounded work queue. Events from
//! the walking thread and the workers go through a separate event queue to
//! one consumer thread that runs the user callbacks.
//!
//! Shutdown order matters: the walk finishes feeding the work queue, the
//! pipeline drains and joins its workers, and only then is the dispatcher
//! stopped, so every event enqueued reaches the callback.

mod copy;
mod dispatcher;
mod pipeline;
mod worker;

pub use copy::ContentCopier;
pub use dispatcher::{EventDispatcher, EventSender};
pub use pipeline::{PipelineOutcome, TransferPipeline, WorkQueue};
pub use worker::{TransferControl, WorkerStats};
