#![no_main]

use certstore::tls::general_name::{decode_general_names, dns_names, GeneralName, MAX_GENERAL_NAMES};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let names = dns_names(data);

    match decode_general_names(data) {
        Ok(decoded) => {
            assert!(!decoded.is_empty() && decoded.len() <= MAX_GENERAL_NAMES);
            let dns: Vec<&str> = decoded
                .iter()
                .filter_map(|name| match name {
                    GeneralName::DnsName(dns) => Some(*dns),
                    _ => None,
                })
                .collect();
            assert_eq!(names, dns);
        }
        Err(_) => assert!(names.is_empty()),
    }
});
