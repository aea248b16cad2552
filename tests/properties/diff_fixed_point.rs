//! Property tests for the deployment engine as a whole.

use proptest::prelude::*;
use treeship::{DeployMode, EventKind};

use crate::common::*;

/// Relative file paths; directory and file names never collide.
fn file_path() -> impl Strategy<Value = String> {
    (
        proptest::collection::vec(prop_oneof![Just("a"), Just("b"), Just("c")], 0..=3),
        prop_oneof![Just("x.txt"), Just("y.txt"), Just("z.bin")],
    )
        .prop_map(|(dirs, file)| {
            let mut path = String::new();
            for dir in dirs {
                path.push('/');
                path.push_str(dir);
            }
            path.push('/');
            path.push_str(file);
            path
        })
}

fn tree() -> impl Strategy<Value = Vec<(String, String)>> {
    proptest::collection::vec((file_path(), "[a-z]{0,12}"), 0..=12)
}

fn mode() -> impl Strategy<Value = DeployMode> {
    prop_oneof![Just(DeployMode::Direct), Just(DeployMode::Queued)]
}

fn load(harness: &Harness, files: &[(String, String)]) {
    harness.store.remove("/www");
    harness.store.put_directory("/www");
    for (path, content) in files {
        harness
            .store
            .put_file(&format!("/www{}", path), content.as_bytes());
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: after any deployment the destination mirrors the source
    /// version, whatever the destination held before.
    #[test]
    fn property_destination_mirrors_source(
        before in tree(),
        after in tree(),
        first_mode in mode(),
        second_mode in mode(),
    ) {
        let harness = Harness::new();
        let use_case = harness.use_case();

        load(&harness, &before);
        use_case.execute(&harness.request(first_mode)).unwrap();
        prop_assert_eq!(harness.destination_tree(), harness.source_tree());

        load(&harness, &after);
        use_case.execute(&harness.request(second_mode)).unwrap();
        prop_assert_eq!(harness.destination_tree(), harness.source_tree());
        for (path, _) in &after {
            prop_assert_eq!(
                harness.receiver.content(path),
                harness.store.head_content(&format!("/www{}", path))
            );
        }
    }

    /// PROPERTY: deploying the same version twice is a no-op the second time.
    #[test]
    fn property_second_deploy_is_quiet(files in tree(), mode in mode()) {
        let harness = Harness::new();
        load(&harness, &files);
        let use_case = harness.use_case();
        use_case.execute(&harness.request(mode)).unwrap();
        harness.receiver.clear_ops();

        let recorder = Recorder::new();
        use_case
            .execute_with_callback(&harness.request(mode), recorder.clone())
            .unwrap();

        prop_assert_eq!(recorder.kinds(), vec![EventKind::Start, EventKind::End]);
        prop_assert!(harness.receiver.mutations().is_empty());
    }
}
