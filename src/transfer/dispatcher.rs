//! Event queue and its single consumer thread

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use tracing::warn;

use crate::domain::entities::{DeploymentEvent, DeploymentReport};
use crate::domain::ports::DeploymentCallback;

/// Producer handle onto the event queue
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<DeploymentEvent>,
}

impl EventSender {
    pub fn send(&self, event: DeploymentEvent) {
        if let Err(err) = self.tx.send(event) {
            warn!(event = %err.0, "event dropped: dispatcher already stopped");
        }
    }
}

/// Owns the consumer thread that invokes the callback in arrival order.
///
/// A panicking callback loses only the event it was handling; delivery
/// continues with the next one.
pub struct EventDispatcher {
    sender: EventSender,
    stop: Sender<()>,
    handle: JoinHandle<DeploymentReport>,
}

impl EventDispatcher {
    pub fn start(callback: Arc<dyn DeploymentCallback>, poll: Duration) -> std::io::Result<Self> {
        let (tx, rx) = channel::unbounded();
        let (stop, stopped) = channel::bounded(1);
        let handle = thread::Builder::new()
            .name("treeship-events".to_string())
            .spawn(move || consume(rx, stopped, callback, poll))?;
        Ok(Self {
            sender: EventSender { tx },
            stop,
            handle,
        })
    }

    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// Stop once every queued event has been delivered.
    ///
    /// Producers must have finished enqueuing before this is called.
    pub fn finish(self) -> DeploymentReport {
        let Self {
            sender,
            stop,
            handle,
        } = self;
        drop(sender);
        let _ = stop.send(());
        match handle.join() {
            Ok(report) => report,
            Err(_) => {
                warn!("event consumer thread panicked");
                DeploymentReport::new()
            }
        }
    }
}

fn consume(
    events: Receiver<DeploymentEvent>,
    stopped: Receiver<()>,
    callback: Arc<dyn DeploymentCallback>,
    poll: Duration,
) -> DeploymentReport {
    let mut report = DeploymentReport::new();
    loop {
        channel::select! {
            recv(events) -> msg => match msg {
                Ok(event) => deliver(callback.as_ref(), event, &mut report),
                Err(_) => break,
            },
            recv(stopped) -> _ => {
                while let Ok(event) = events.try_recv() {
                    deliver(callback.as_ref(), event, &mut report);
                }
                break;
            },
            default(poll) => {},
        }
    }
    report
}

fn deliver(callback: &dyn DeploymentCallback, event: DeploymentEvent, report: &mut DeploymentReport) {
    if panic::catch_unwind(AssertUnwindSafe(|| callback.on_event(&event))).is_err() {
        warn!(event = %event, "deployment callback panicked");
    }
    report.push(event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::EventKind;
    use std::sync::Mutex;

    fn event(kind: EventKind, path: &str) -> DeploymentEvent {
        DeploymentEvent::new(kind, None, path)
    }

    #[test]
    fn delivers_in_arrival_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let dispatcher = EventDispatcher::start(
            Arc::new(move |e: &DeploymentEvent| {
                sink.lock().unwrap().push(e.destination().to_string())
            }),
            Duration::from_millis(10),
        )
        .unwrap();

        let sender = dispatcher.sender();
        for i in 0..50 {
            sender.send(event(EventKind::Created, &format!("/n{}", i)));
        }
        drop(sender);
        let report = dispatcher.finish();

        let expected: Vec<String> = (0..50).map(|i| format!("/n{}", i)).collect();
        assert_eq!(*seen.lock().unwrap(), expected);
        assert_eq!(report.created(), 50);
    }

    #[test]
    fn panicking_callback_does_not_stop_delivery() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let dispatcher = EventDispatcher::start(
            Arc::new(move |e: &DeploymentEvent| {
                if e.destination() == "/bad" {
                    panic!("callback failure");
                }
                sink.lock().unwrap().push(e.destination().to_string());
            }),
            Duration::from_millis(10),
        )
        .unwrap();

        let sender = dispatcher.sender();
        sender.send(event(EventKind::Created, "/a"));
        sender.send(event(EventKind::Created, "/bad"));
        sender.send(event(EventKind::Created, "/b"));
        let report = dispatcher.finish();

        assert_eq!(*seen.lock().unwrap(), vec!["/a", "/b"]);
        assert_eq!(report.events().len(), 3);
    }

    #[test]
    fn events_from_cloned_senders_on_other_threads_are_delivered() {
        let dispatcher =
            EventDispatcher::start(Arc::new(|_: &DeploymentEvent| {}), Duration::from_millis(5))
                .unwrap();

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let sender = dispatcher.sender();
                thread::spawn(move || {
                    for i in 0..25 {
                        sender.send(event(EventKind::Updated, &format!("/t{}/{}", t, i)));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let report = dispatcher.finish();
        assert_eq!(report.updated(), 100);
    }
}
