//! Error types for certstore

use std::io;

/// Main error type for certificate issuance, caching and inspection
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed certificate data: {0}")]
    CertificateFormat(String),

    #[error("Certificate signing failed: {0}")]
    CertificateSigning(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("TLS handshake error: {0}")]
    TlsHandshake(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn certificate_format(msg: impl Into<String>) -> Self {
        Error::CertificateFormat(msg.into())
    }

    pub fn certificate_signing(msg: impl Into<String>) -> Self {
        Error::CertificateSigning(msg.into())
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        Error::Connection(msg.into())
    }

    pub fn tls_handshake(msg: impl Into<String>) -> Self {
        Error::TlsHandshake(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
