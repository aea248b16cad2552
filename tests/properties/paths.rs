//! Property tests for node path handling.

use proptest::prelude::*;
use treeship::domain::value_objects::{ancestors, extend_path, normalize_path, split_parent};

fn raw_path() -> impl Strategy<Value = String> {
    proptest::string::string_regex("/{0,2}([a-z0-9._-]{1,6}/{1,2}){0,4}[a-z0-9._-]{0,6}/?").unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: normalizing twice changes nothing.
    #[test]
    fn property_normalize_is_idempotent(path in raw_path()) {
        let once = normalize_path(&path);
        prop_assert_eq!(normalize_path(&once), once.clone());
        prop_assert!(once.starts_with('/'));
        prop_assert!(once == "/" || !once.ends_with('/'));
    }

    /// PROPERTY: a path is its parent extended by its name.
    #[test]
    fn property_split_parent_inverts_extend(path in raw_path()) {
        let path = normalize_path(&path);
        match split_parent(&path) {
            None => prop_assert_eq!(path, "/"),
            Some((parent, name)) => prop_assert_eq!(extend_path(&parent, &name), path),
        }
    }

    /// PROPERTY: ancestors run shallowest first and end at the path itself.
    #[test]
    fn property_ancestors_end_at_path(path in raw_path()) {
        let path = normalize_path(&path);
        let chain = ancestors(&path);
        if path == "/" {
            prop_assert!(chain.is_empty());
        } else {
            prop_assert_eq!(chain.last(), Some(&path));
            for pair in chain.windows(2) {
                let prefix = format!("{}/", pair[0]);
                prop_assert!(pair[1].starts_with(&prefix));
            }
        }
    }
}
