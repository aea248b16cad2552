//! Scenario: several deployments race for the same destination.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use treeship::domain::ports::LockProvider;
use treeship::{DeployError, DeployMode, DeployUseCase, Destination, EventKind};

use crate::common::*;

fn patient_use_case(harness: &Harness) -> DeployUseCase {
    let mut settings = fast_settings();
    settings.lease.retry_count = 1_000;
    settings.lease.retry_wait = Duration::from_millis(2);
    DeployUseCase::new(
        Arc::new(harness.store.clone()),
        Arc::new(harness.receiver.clone()),
        Arc::new(harness.locks.clone()),
    )
    .with_settings(settings)
}

#[test]
fn deployments_to_one_destination_never_overlap() {
    let harness = Arc::new(Harness::new());
    for i in 0..20 {
        harness
            .store
            .put_file(&format!("/www/pages/{i}.html"), format!("page {i}"));
    }
    let recorder = Recorder::new();

    let handles: Vec<_> = [DeployMode::Direct, DeployMode::Queued, DeployMode::Queued]
        .into_iter()
        .map(|mode| {
            let harness = harness.clone();
            let recorder = recorder.clone();
            thread::spawn(move || {
                patient_use_case(&harness)
                    .execute_with_callback(&harness.request(mode), recorder)
                    .map(|report| report.has_changes())
            })
        })
        .collect();

    let mut changed = 0;
    for handle in handles {
        if handle.join().unwrap().unwrap() {
            changed += 1;
        }
    }

    let mut open = 0;
    for kind in recorder.kinds() {
        match kind {
            EventKind::Start => {
                open += 1;
                assert_eq!(open, 1, "two deployments held the destination at once");
            }
            EventKind::End | EventKind::Failed => open -= 1,
            _ => assert_eq!(open, 1, "event outside a deployment"),
        }
    }
    assert_eq!(open, 0);
    assert_eq!(changed, 1, "only the first deployment has anything to do");
    assert_eq!(harness.destination_tree(), harness.source_tree());
    assert_eq!(harness.locks.acquisition_count(), 3);
    assert_eq!(harness.locks.release_count(), 3);
}

#[test]
fn busy_destination_times_out_without_touching_the_receiver() {
    let harness = Harness::new();
    harness.store.put_file("/www/index.html", "home");
    let request = harness.request(DeployMode::Queued);
    let holder = harness
        .locks
        .try_acquire(&request.destination.lock_name(), Duration::from_secs(60))
        .unwrap()
        .unwrap();

    let err = harness.use_case().execute(&request).unwrap_err();

    assert!(matches!(err, DeployError::LockTimeout { attempts: 2, .. }), "{err}");
    assert!(err.is_lock_failure());
    assert!(harness.receiver.ops().is_empty());

    harness
        .locks
        .release(&request.destination.lock_name(), &holder)
        .unwrap();
    harness.use_case().execute(&request).unwrap();
    assert_eq!(harness.destination_tree(), harness.source_tree());
}

#[test]
fn other_targets_are_not_blocked() {
    let harness = Harness::new();
    harness.store.put_file("/www/index.html", "home");
    let live = harness.request(DeployMode::Direct);
    let _held = harness
        .locks
        .try_acquire(&live.destination.lock_name(), Duration::from_secs(60))
        .unwrap()
        .unwrap();

    let mut staging = harness.request(DeployMode::Direct);
    staging.destination = Destination::new("web01", 44100, "staging", "/");

    let report = harness.use_case().execute(&staging).unwrap();
    assert_eq!(report.created(), 1);
}
