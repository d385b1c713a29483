//! Hostname sanitization for store paths
//!
//! A hostname handed to the certificate store becomes a file name inside the
//! store directory. [`validate`] is the only gate between an attacker-chosen
//! SNI value and that path, so every store lookup goes through it.

/// Check whether `name` is safe to use as a store key.
///
/// The name must be plain ASCII without control characters, decode cleanly
/// as IDNA (so `xn--` labels must hold valid punycode), and contain neither
/// `..` nor `/`.
pub fn validate(name: &str) -> bool {
    if !name.is_ascii() || name.bytes().any(|b| b.is_ascii_control()) {
        return false;
    }

    let (_, decoded) = idna::domain_to_unicode(name);
    if decoded.is_err() {
        return false;
    }

    !(name.contains("..") || name.contains('/'))
}
