//! Shared fixtures for integration tests.

#![allow(dead_code)]

use certstore::tls::{CaExportPaths, CaSettings, GeneratedCa};
use std::path::Path;
use std::sync::OnceLock;
use tempfile::TempDir;

/// One root CA per test binary; RSA key generation is the slow part.
pub fn shared_ca() -> &'static GeneratedCa {
    static CA: OnceLock<GeneratedCa> = OnceLock::new();
    CA.get_or_init(|| {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
        GeneratedCa::generate(&CaSettings::default()).unwrap()
    })
}

/// The shared CA exported into a private scratch directory.
pub struct TestCa {
    pub dir: TempDir,
    pub paths: CaExportPaths,
}

impl TestCa {
    pub fn export() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let paths = shared_ca()
            .export(dir.path().join("mitmproxy-ca.pem"))
            .unwrap();
        Self { dir, paths }
    }

    pub fn bundle(&self) -> &Path {
        &self.paths.bundle
    }

    pub fn generated(&self) -> &'static GeneratedCa {
        shared_ca()
    }
}
