#![no_main]

use certstore::tls::{MAX_KEY_BITS, MIN_KEY_BITS};
use certstore::Config;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let input = match std::str::from_utf8(data) {
        Ok(s) => s,
        Err(_) => return,
    };

    // Errors are fine; accepted configs must be within bounds
    if let Ok(config) = Config::parse(input) {
        assert!((MIN_KEY_BITS..=MAX_KEY_BITS).contains(&config.ca.key_bits));
    }
});
