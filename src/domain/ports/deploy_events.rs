//! Deployment Event Port
//!
//! Callbacks receive every `DeploymentEvent` in delivery order, on the
//! single event-consumer thread.

use crate::domain::entities::DeploymentEvent;

/// Receiver of deployment events
///
/// Implementations can be:
/// - ConsoleEventCallback: one line per event in the terminal
/// - JsonEventCallback: NDJSON event stream for CI
/// - NoopCallback: silent operation
/// - any `Fn(&DeploymentEvent)` closure
///
/// A panicking callback loses only the event it was handling.
pub trait DeploymentCallback: Send + Sync {
    fn on_event(&self, event: &DeploymentEvent);
}

impl<F> DeploymentCallback for F
where
    F: Fn(&DeploymentEvent) + Send + Sync,
{
    fn on_event(&self, event: &DeploymentEvent) {
        self(event)
    }
}

/// No-op callback for silent operation
pub struct NoopCallback;

impl DeploymentCallback for NoopCallback {
    fn on_event(&self, _event: &DeploymentEvent) {}
}
