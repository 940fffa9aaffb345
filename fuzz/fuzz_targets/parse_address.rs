#![no_main]

use driftdb_client::Config;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Fuzz address parsing
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(config) = Config::from_address(s) {
            let _ = config.address();
            let _ = config.validate();
        }
    }
});
