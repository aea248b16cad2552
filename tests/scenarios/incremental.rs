//! Scenario: the source changes between deployments and only the
//! differences travel.

use treeship::{EventKind, Version};

use crate::common::*;

fn seed(harness: &Harness) {
    harness.store.put_file("/www/index.html", "v1");
    harness.store.put_file("/www/about.html", "about");
    harness.store.put_file("/www/old.html", "legacy");
    harness.store.put_file("/www/docs/guide.md", "guide");
}

#[test]
fn only_changed_entries_are_reported() {
    for mode in BOTH_MODES {
        let harness = Harness::new();
        seed(&harness);
        let use_case = harness.use_case();
        let first = use_case.execute(&harness.request(mode)).unwrap();

        harness.store.put_file("/www/index.html", "v2");
        harness.store.remove("/www/old.html");
        harness.store.put_file("/www/new.html", "fresh");

        let recorder = Recorder::new();
        let second = use_case
            .execute_with_callback(&harness.request(mode), recorder.clone())
            .unwrap();

        let mut changes = recorder.structural();
        changes.sort_by(|a, b| a.1.cmp(&b.1));
        assert_eq!(
            changes,
            vec![
                (EventKind::Updated, "/index.html".to_string()),
                (EventKind::Created, "/new.html".to_string()),
                (EventKind::Deleted, "/old.html".to_string()),
            ],
            "{mode}"
        );
        assert_eq!(harness.destination_tree(), harness.source_tree());
        assert_eq!(harness.receiver.content("/index.html").as_deref(), Some(&b"v2"[..]));
        assert!(second.version() > first.version());
    }
}

#[test]
fn keeping_destination_only_entries() {
    for mode in BOTH_MODES {
        let harness = Harness::new();
        seed(&harness);
        let use_case = harness.use_case();
        use_case.execute(&harness.request(mode)).unwrap();

        harness.store.remove("/www/docs");
        let report = use_case
            .execute(&harness.request(mode).with_dont_delete(true))
            .unwrap();

        assert_eq!(report.deleted(), 0, "{mode}");
        assert!(harness.receiver.entry("/docs/guide.md").is_some());
    }
}

#[test]
fn redeploying_an_earlier_version_restores_it() {
    for mode in BOTH_MODES {
        let harness = Harness::new();
        seed(&harness);
        let use_case = harness.use_case();
        let first = use_case.execute(&harness.request(mode)).unwrap();
        let v1 = first.version().unwrap();

        harness.store.put_file("/www/index.html", "v2");
        harness.store.remove("/www/docs");
        use_case.execute(&harness.request(mode)).unwrap();

        let restore = use_case
            .execute(&harness.request(mode).with_version(v1))
            .unwrap();

        assert_eq!(restore.version(), Some(v1));
        let expected = subtree(&harness.store.manifest(v1).unwrap(), "/www");
        assert_eq!(harness.destination_tree(), expected, "{mode}");
        assert_eq!(harness.receiver.content("/index.html").as_deref(), Some(&b"v1"[..]));
        assert_eq!(v1, Version::new(1));
    }
}

#[test]
fn dry_run_reports_without_touching_the_receiver() {
    let harness = Harness::new();
    seed(&harness);
    let use_case = harness.use_case();
    use_case
        .execute(&harness.request(treeship::DeployMode::Direct))
        .unwrap();
    let before = harness.destination_tree();
    harness.store.put_file("/www/index.html", "draft");
    harness.receiver.clear_ops();

    let report = use_case
        .execute(&harness.request(treeship::DeployMode::Queued).with_dry_run(true))
        .unwrap();

    assert_eq!(report.updated(), 1);
    assert_eq!(harness.destination_tree(), before);
    assert!(harness.receiver.mutations().is_empty());
}
