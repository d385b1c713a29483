//! SNI-driven certificate resolution backed by a [`CertStore`]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::{CertifiedKey, SigningKey};
use rustls::ServerConfig;

use super::ca::CertificateAuthority;
use super::store::CertStore;
use crate::error::{Error, Result};

/// Serves `[leaf, ca]` for the SNI of each handshake, issuing leaves
/// through the store on first use.
pub struct StoreCertResolver {
    store: Arc<CertStore>,
    ca_bundle: PathBuf,
    ca_cert: CertificateDer<'static>,
    /// Every leaf shares the CA key, so one signing key serves them all.
    signing_key: Arc<dyn SigningKey>,
}

impl std::fmt::Debug for StoreCertResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreCertResolver")
            .field("store", &self.store.path())
            .field("ca_bundle", &self.ca_bundle)
            .finish_non_exhaustive()
    }
}

impl StoreCertResolver {
    pub fn new(store: Arc<CertStore>, ca_bundle: impl Into<PathBuf>) -> Result<Self> {
        let ca_bundle = ca_bundle.into();
        let ca = CertificateAuthority::from_bundle_file(&ca_bundle, Default::default())?;
        let key = PrivateKeyDer::Pkcs8(ca.key_der().clone_key());
        let signing_key = rustls::crypto::aws_lc_rs::sign::any_supported_type(&key)
            .map_err(|e| Error::certificate_format(format!("Unusable CA key for TLS: {}", e)))?;

        Ok(Self {
            store,
            ca_bundle,
            ca_cert: ca.cert_der().clone(),
            signing_key,
        })
    }

    pub fn ca_bundle(&self) -> &Path {
        &self.ca_bundle
    }

    /// Path of the leaf for `sni`, issued with `sni` as its only SAN when
    /// missing. `None` for names the store refuses.
    pub fn certificate_path(&self, sni: &str) -> Result<Option<PathBuf>> {
        self.store
            .get_certificate(sni, &[sni.to_string()], Some(self.ca_bundle.as_path()))
    }

    fn certified_key(&self, sni: &str) -> Result<Option<CertifiedKey>> {
        let Some(path) = self.certificate_path(sni)? else {
            return Ok(None);
        };
        let pem = std::fs::read(&path)?;
        let leaf = rustls_pemfile::certs(&mut pem.as_slice())
            .next()
            .ok_or_else(|| {
                Error::certificate_format(format!("No certificate in {}", path.display()))
            })?
            .map_err(|e| Error::certificate_format(format!("Invalid PEM in {}: {}", path.display(), e)))?;

        Ok(Some(CertifiedKey::new(
            vec![leaf, self.ca_cert.clone()],
            self.signing_key.clone(),
        )))
    }

    /// A server config that picks certificates through this resolver.
    pub fn into_server_config(self) -> ServerConfig {
        ServerConfig::builder()
            .with_no_client_auth()
            .with_cert_resolver(Arc::new(self))
    }
}

impl ResolvesServerCert for StoreCertResolver {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        let Some(sni) = client_hello.server_name() else {
            tracing::warn!("Client sent no SNI, no certificate to serve");
            return None;
        };

        match self.certified_key(sni) {
            Ok(Some(key)) => Some(Arc::new(key)),
            Ok(None) => {
                tracing::warn!(hostname = %sni, "Refusing to serve certificate for hostname");
                None
            }
            Err(e) => {
                tracing::warn!(hostname = %sni, error = %e, "Failed to resolve certificate");
                None
            }
        }
    }
}
