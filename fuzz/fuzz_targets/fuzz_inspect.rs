#![no_main]

use certstore::tls::ParsedCertificate;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Malformed certificates must fail cleanly, parsed ones must be readable
    if let Ok(cert) = ParsedCertificate::from_der(data) {
        let _ = cert.common_name();
        let _ = cert.subject_alt_names();
        let _ = cert.not_before();
        let _ = cert.not_after();
        let _ = cert.key_info();
        let _ = cert.digest("sha256");
    }
});
