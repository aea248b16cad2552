#![no_main]

use libfuzzer_sys::fuzz_target;
use treeship::domain::ports::NameMatcher;
use treeship::infrastructure::GlobMatcher;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let mut lines = input.lines();
        let probe = lines.next().unwrap_or_default();
        if let Ok(matcher) = GlobMatcher::new(lines) {
            let _ = matcher.matches(probe, false);
            let _ = matcher.matches(probe, true);
        }
    }
});
