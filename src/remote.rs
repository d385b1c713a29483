//! Fetching the certificate a remote TLS server presents
//!
//! The peer certificate is accepted without any verification: the point is
//! to look at it, not to trust it.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use crate::error::{Error, Result};
use crate::tls::ParsedCertificate;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
struct AcceptAnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Connects to TLS servers and returns their leaf certificate.
#[derive(Debug, Clone)]
pub struct RemoteCertificateFetcher {
    timeout: Duration,
}

impl Default for RemoteCertificateFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl RemoteCertificateFetcher {
    /// `timeout` bounds the TCP connect and the TLS handshake separately.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn client_config(send_sni: bool) -> Result<ClientConfig> {
        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let mut config = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(|e| Error::tls_handshake(format!("TLS client setup failed: {}", e)))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert { provider }))
            .with_no_client_auth();
        config.enable_sni = send_sni;
        Ok(config)
    }

    /// Connect to `host:port` and return the certificate the server presents.
    ///
    /// `sni` is sent as the Server Name Indication; with `None` the SNI
    /// extension is left out entirely.
    pub async fn fetch(&self, host: &str, port: u16, sni: Option<&str>) -> Result<ParsedCertificate> {
        let server_name = match sni {
            Some(name) => ServerName::try_from(name.to_string())
                .map_err(|e| Error::tls_handshake(format!("Invalid SNI '{}': {}", name, e)))?,
            // Only used for verification, which is skipped
            None => ServerName::IpAddress(
                host.parse::<IpAddr>()
                    .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
                    .into(),
            ),
        };

        tracing::debug!(host = %host, port, sni = ?sni, "Fetching remote certificate");

        let tcp = tokio::time::timeout(self.timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| Error::connection(format!("Timed out connecting to {}:{}", host, port)))?
            .map_err(|e| Error::connection(format!("Failed to connect to {}:{}: {}", host, port, e)))?;

        let connector = TlsConnector::from(Arc::new(Self::client_config(sni.is_some())?));
        let tls = tokio::time::timeout(self.timeout, connector.connect(server_name, tcp))
            .await
            .map_err(|_| Error::tls_handshake(format!("Timed out in handshake with {}:{}", host, port)))?
            .map_err(|e| Error::tls_handshake(format!("Handshake with {}:{} failed: {}", host, port, e)))?;

        let (_, connection) = tls.get_ref();
        let leaf = connection
            .peer_certificates()
            .and_then(|certs| certs.first())
            .ok_or_else(|| Error::tls_handshake(format!("{}:{} presented no certificate", host, port)))?;

        ParsedCertificate::from_der(leaf.as_ref())
    }
}

/// [`RemoteCertificateFetcher::fetch`] with the default timeout.
pub async fn get_remote_certificate(host: &str, port: u16, sni: Option<&str>) -> Result<ParsedCertificate> {
    RemoteCertificateFetcher::default().fetch(host, port, sni).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_report;

    #[tokio::test]
    async fn test_connection_refused() {
        let t = test_report!("Connecting to a closed port is a connection error");
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = RemoteCertificateFetcher::new(Duration::from_secs(2))
            .fetch("127.0.0.1", port, None)
            .await;
        t.assert_true("connection error", matches!(result, Err(Error::Connection(_))));
    }

    #[tokio::test]
    async fn test_non_tls_peer() {
        let t = test_report!("A peer that closes without TLS fails the handshake");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((stream, _)) = listener.accept().await {
                drop(stream);
            }
        });

        let result = RemoteCertificateFetcher::new(Duration::from_secs(2))
            .fetch("127.0.0.1", port, Some("example.com"))
            .await;
        t.assert_true("handshake error", matches!(result, Err(Error::TlsHandshake(_))));
    }

    #[tokio::test]
    async fn test_silent_peer_times_out() {
        let t = test_report!("A peer that never answers the handshake times out");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _server = tokio::spawn(async move {
            let accepted = listener.accept().await;
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(accepted);
        });

        let result = RemoteCertificateFetcher::new(Duration::from_millis(200))
            .fetch("127.0.0.1", port, None)
            .await;
        t.assert_true("handshake error", matches!(result, Err(Error::TlsHandshake(_))));
    }

    #[test]
    fn test_invalid_sni_rejected() {
        let t = test_report!("An SNI that is not a DNS name is rejected");
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let result = rt.block_on(
            RemoteCertificateFetcher::default().fetch("127.0.0.1", 1, Some("not a name")),
        );
        t.assert_true("handshake error", matches!(result, Err(Error::TlsHandshake(_))));
    }
}
