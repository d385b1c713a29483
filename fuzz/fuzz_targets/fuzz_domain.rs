#![no_main]

use certstore::domain;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let name = match std::str::from_utf8(data) {
        Ok(s) => s,
        Err(_) => return,
    };

    if domain::validate(name) {
        // Accepted names must be safe to use as a file name component
        assert!(name.is_ascii());
        assert!(!name.contains('/'));
        assert!(!name.contains(".."));
    }
});
