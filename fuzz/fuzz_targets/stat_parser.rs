#![no_main]

use libfuzzer_sys::fuzz_target;
use rtstats::procfs::parse_stat;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Malformed stat lines must be rejected, never panic
        let _ = parse_stat(input);
    }
});
