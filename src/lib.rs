//! Certstore - on-demand X.509 leaf certificates for TLS interception
//!
//! A locally generated root authority signs a leaf for whatever hostname a
//! client asks for, and the leaves are cached on disk, one PEM file per
//! hostname.
//!
//! # Features
//!
//! - **Root CA generation**: RSA root with the extensions clients expect, exported
//!   as PEM bundle, `.pem`/`.cer` certificate and PKCS#12
//! - **Leaf issuance**: CN plus optional DNS SANs, signed with the root key
//! - **Certificate store**: lazy fill, hostname validation before any path is built,
//!   atomic publish
//! - **Inspection**: subject/issuer, validity, serial, key info and DNS SANs of any
//!   certificate, including one fetched from a live TLS server
//!
//! # Example
//!
//! ```no_run
//! use certstore::{CaSettings, CertStore, GeneratedCa};
//!
//! fn main() -> certstore::Result<()> {
//!     let ca = GeneratedCa::generate(&CaSettings::default())?;
//!     let paths = ca.export("/tmp/certstore/mitmproxy-ca.pem")?;
//!
//!     let store = CertStore::temporary()?;
//!     let leaf = store.get_certificate(
//!         "example.com",
//!         &["example.com".to_string()],
//!         Some(paths.bundle.as_path()),
//!     )?;
//!     println!("{:?}", leaf);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod remote;
pub mod tls;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use error::{Error, Result};
pub use remote::{get_remote_certificate, RemoteCertificateFetcher};
pub use tls::{
    CaSettings, CertStore, CertificateAuthority, Digest, GeneratedCa, ParsedCertificate,
    StoreCertResolver,
};
