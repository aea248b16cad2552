#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        // Parsing and validating a config file must never panic
        if let Ok(config) = toml::from_str::<treeship::Config>(content) {
            let _ = config.validate(Path::new("fuzz.toml"));
            let _ = config.to_toml();
        }
    }
});
