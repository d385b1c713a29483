//! Filesystem-backed certificate store
//!
//! Leaves live at `<dir>/<hostname>.pem` and are never evicted or refreshed.
//! A file is only ever published by renaming a fully written temporary file
//! from the same directory into place.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tempfile::{NamedTempFile, TempDir};

use super::ca::{CertificateAuthority, Digest};
use crate::config::Config;
use crate::domain;
use crate::error::Result;

const TEMP_DIR_PREFIX: &str = "certstore";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cache of issued leaf certificates, one PEM file per hostname.
pub struct CertStore {
    root: PathBuf,
    /// Present while the store owns its directory.
    owned: Mutex<Option<TempDir>>,
    digest: Digest,
    host_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    leaves_issued: AtomicU64,
}

impl std::fmt::Debug for CertStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertStore")
            .field("root", &self.root)
            .field("owned", &self.is_owned())
            .field("leaves_issued", &self.leaves_issued())
            .finish()
    }
}

impl CertStore {
    fn with_root(root: PathBuf, owned: Option<TempDir>) -> Self {
        Self {
            root,
            owned: Mutex::new(owned),
            digest: Digest::default(),
            host_locks: Mutex::new(HashMap::new()),
            leaves_issued: AtomicU64::new(0),
        }
    }

    /// A store in a fresh temporary directory that it owns and removes on
    /// [`cleanup`](Self::cleanup) or drop.
    pub fn temporary() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(TEMP_DIR_PREFIX)
            .tempdir()?;
        let root = dir.path().to_path_buf();
        tracing::debug!(path = %root.display(), "Created temporary certificate store");
        Ok(Self::with_root(root, Some(dir)))
    }

    /// A store in a caller supplied directory, created when missing. The
    /// directory is never removed by the store.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let root = dir.into();
        if !root.exists() {
            std::fs::create_dir_all(&root)?;
        }
        Ok(Self::with_root(root, None))
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let store = match &config.store.directory {
            Some(dir) => Self::open(dir)?,
            None => Self::temporary()?,
        };
        Ok(store.with_digest(config.ca.digest))
    }

    /// Signing digest for leaves issued by this store.
    pub fn with_digest(mut self, digest: Digest) -> Self {
        self.digest = digest;
        self
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn is_owned(&self) -> bool {
        lock(&self.owned).is_some()
    }

    /// Number of leaves this store has signed.
    pub fn leaves_issued(&self) -> u64 {
        self.leaves_issued.load(Ordering::Relaxed)
    }

    /// Where the certificate for `common_name` lives, or `None` when the
    /// name must not become a path.
    pub fn certificate_path(&self, common_name: &str) -> Option<PathBuf> {
        if !domain::validate(common_name) {
            return None;
        }
        Some(self.root.join(format!("{}.pem", common_name)))
    }

    fn host_lock(&self, common_name: &str) -> Arc<Mutex<()>> {
        lock(&self.host_locks)
            .entry(common_name.to_string())
            .or_default()
            .clone()
    }

    /// Forget the lock for `common_name` once no other caller holds it.
    /// Must be called after the guard is dropped.
    fn release_host_lock(&self, common_name: &str, host_lock: Arc<Mutex<()>>) {
        let mut locks = lock(&self.host_locks);
        // The map's reference and ours
        if Arc::strong_count(&host_lock) == 2 {
            locks.remove(common_name);
        }
    }

    /// Path to a certificate for `common_name`, issuing one on a miss.
    ///
    /// Returns `Ok(None)` when the name fails validation, or when nothing is
    /// cached and no CA bundle was given. An existing file is returned
    /// without any freshness check. Concurrent callers for one hostname
    /// sign at most one leaf between them.
    pub fn get_certificate(
        &self,
        common_name: &str,
        sans: &[String],
        ca_bundle: Option<&Path>,
    ) -> Result<Option<PathBuf>> {
        let Some(path) = self.certificate_path(common_name) else {
            tracing::debug!(hostname = %common_name, "Rejected hostname");
            return Ok(None);
        };

        let host_lock = self.host_lock(common_name);
        let result = {
            let _guard = lock(&host_lock);
            self.lookup_or_issue(common_name, path, sans, ca_bundle)
        };
        self.release_host_lock(common_name, host_lock);
        result
    }

    fn lookup_or_issue(
        &self,
        common_name: &str,
        path: PathBuf,
        sans: &[String],
        ca_bundle: Option<&Path>,
    ) -> Result<Option<PathBuf>> {
        if path.exists() {
            tracing::debug!(hostname = %common_name, path = %path.display(), "Certificate cache hit");
            return Ok(Some(path));
        }

        let Some(ca_bundle) = ca_bundle else {
            tracing::debug!(hostname = %common_name, "Certificate cache miss without CA");
            return Ok(None);
        };

        tracing::debug!(hostname = %common_name, "Certificate cache miss");
        let ca = CertificateAuthority::from_bundle_file(ca_bundle, self.digest)?;
        let leaf = ca.issue_leaf(common_name, sans)?;

        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(leaf.pem.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&path).map_err(|e| e.error)?;

        self.leaves_issued.fetch_add(1, Ordering::Relaxed);
        tracing::info!(hostname = %common_name, path = %path.display(), "Issued certificate");
        Ok(Some(path))
    }

    /// Remove the store directory if the store owns it. Calling this again,
    /// or on a store over a caller supplied directory, does nothing.
    pub fn cleanup(&self) -> Result<()> {
        if let Some(dir) = lock(&self.owned).take() {
            tracing::debug!(path = %self.root.display(), "Removing certificate store");
            dir.close()?;
        }
        Ok(())
    }
}
