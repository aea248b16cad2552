//! Scenario: a site is published to an empty receiver, then redeployed
//! unchanged.

use treeship::EventKind;

use crate::common::*;

fn publish_site(harness: &Harness) {
    harness.store.put_file("/www/index.html", "<h1>home</h1>");
    harness.store.put_file("/www/css/site.css", "body { margin: 0 }");
    harness.store.put_file("/www/img/icons/logo.svg", "<svg/>");
    harness.store.put_directory("/www/empty");
}

#[test]
fn first_deploy_mirrors_the_source_tree() {
    for mode in BOTH_MODES {
        let harness = Harness::new();
        publish_site(&harness);
        let recorder = Recorder::new();

        let report = harness
            .use_case()
            .execute_with_callback(&harness.request(mode), recorder.clone())
            .unwrap();

        assert_eq!(harness.destination_tree(), harness.source_tree(), "{mode}");
        assert_eq!(
            harness.receiver.content("/css/site.css").as_deref(),
            Some(&b"body { margin: 0 }"[..])
        );
        assert_eq!(report.created(), 7, "{mode}");
        assert_eq!(report.deleted(), 0);

        let kinds = recorder.kinds();
        assert_eq!(kinds.first(), Some(&EventKind::Start));
        assert_eq!(kinds.last(), Some(&EventKind::End));
        assert_eq!(harness.receiver.open_sessions(), 0);
    }
}

#[test]
fn directories_are_reported_before_their_contents() {
    for mode in BOTH_MODES {
        let harness = Harness::new();
        publish_site(&harness);
        let recorder = Recorder::new();

        harness
            .use_case()
            .execute_with_callback(&harness.request(mode), recorder.clone())
            .unwrap();

        let created: Vec<String> = recorder
            .structural()
            .into_iter()
            .filter(|(kind, _)| *kind == EventKind::Created)
            .map(|(_, path)| path)
            .collect();
        for (i, path) in created.iter().enumerate() {
            let parent = match path.rsplit_once('/') {
                Some(("", _)) | None => continue,
                Some((parent, _)) => parent,
            };
            let parent_at = created
                .iter()
                .position(|p| p == parent)
                .unwrap_or_else(|| panic!("{mode}: no CREATED for {parent}"));
            assert!(parent_at < i, "{mode}: {parent} reported after {path}");
        }
    }
}

#[test]
fn redeploying_an_unchanged_source_changes_nothing() {
    for mode in BOTH_MODES {
        let harness = Harness::new();
        publish_site(&harness);
        let use_case = harness.use_case();
        use_case.execute(&harness.request(mode)).unwrap();
        harness.receiver.clear_ops();

        let recorder = Recorder::new();
        let report = use_case
            .execute_with_callback(&harness.request(mode), recorder.clone())
            .unwrap();

        assert!(!report.has_changes(), "{mode}");
        assert_eq!(recorder.kinds(), vec![EventKind::Start, EventKind::End]);
        assert!(harness.receiver.mutations().is_empty(), "{mode}");
    }
}
