//! Certificate issuance, caching and inspection

mod ca;
pub mod der;
pub mod extensions;
pub mod general_name;
mod inspect;
mod resolver;
mod store;

pub use ca::{
    issue, CaExportPaths, CaSettings, CertificateAuthority, Digest, GeneratedCa, LeafCertificate,
    CA_VALIDITY, DEFAULT_CA_NAME, LEAF_BACKDATE, LEAF_VALIDITY, MAX_KEY_BITS, MIN_KEY_BITS,
};
pub use inspect::{
    parse_timestamp, CertificateEncoding, KeyAlgorithm, NameAttributes, ParsedCertificate,
};
pub use resolver::StoreCertResolver;
pub use store::CertStore;
