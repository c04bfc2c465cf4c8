#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // parse and validate; errors are fine, panics are not
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = perfpair_config::QueueConfig::from_toml_str(s);
    }
});
