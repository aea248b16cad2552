#![no_main]

use libfuzzer_sys::fuzz_target;
use treeship::domain::value_objects::{ancestors, normalize_path, split_parent};
use treeship::StorePath;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if let Ok(path) = input.parse::<StorePath>() {
            let reparsed: StorePath = path.to_string().parse().expect("display must reparse");
            assert_eq!(reparsed, path);
        }

        let normalized = normalize_path(input);
        assert_eq!(normalize_path(&normalized), normalized);
        let _ = split_parent(input);
        let _ = ancestors(input);
    }
});
