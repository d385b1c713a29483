//! Certificate Authority management

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use rcgen::{
    CertificateParams, DistinguishedName, DnType, IsCa, Issuer, KeyPair, SerialNumber,
    SignatureAlgorithm,
};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use rustls::pki_types::{CertificateDer, PrivatePkcs8KeyDer};
use rustls_pemfile::Item;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::extensions::{leaf_san_extension, root_ca_extensions};
use crate::error::{Error, Result};

/// Validity of the root authority.
pub const CA_VALIDITY: time::Duration = time::Duration::days(720);
/// Validity of leaf certificates.
pub const LEAF_VALIDITY: time::Duration = time::Duration::days(30);
/// Leaves are backdated to tolerate client clock skew.
pub const LEAF_BACKDATE: time::Duration = time::Duration::hours(1);

/// Smallest and largest RSA modulus the signing backend accepts.
pub const MIN_KEY_BITS: usize = 2048;
pub const MAX_KEY_BITS: usize = 4096;

pub const DEFAULT_CA_NAME: &str = "mitmproxy";

/// Hash used when signing certificates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Digest {
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl Digest {
    fn signature_algorithm(self) -> &'static SignatureAlgorithm {
        match self {
            Digest::Sha256 => &rcgen::PKCS_RSA_SHA256,
            Digest::Sha384 => &rcgen::PKCS_RSA_SHA384,
            Digest::Sha512 => &rcgen::PKCS_RSA_SHA512,
        }
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Digest::Sha256 => "sha256",
            Digest::Sha384 => "sha384",
            Digest::Sha512 => "sha512",
        };
        f.write_str(name)
    }
}

impl FromStr for Digest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" => Ok(Digest::Sha256),
            "sha384" => Ok(Digest::Sha384),
            "sha512" => Ok(Digest::Sha512),
            other => Err(Error::config(format!(
                "Unsupported signing digest '{}' (expected sha256, sha384 or sha512)",
                other
            ))),
        }
    }
}

/// Parameters of a new root authority
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaSettings {
    /// RSA modulus size in bits
    pub key_bits: usize,
    /// Signing hash
    pub digest: Digest,
    pub common_name: String,
    pub organization: String,
}

impl Default for CaSettings {
    fn default() -> Self {
        Self {
            key_bits: MIN_KEY_BITS,
            digest: Digest::default(),
            common_name: DEFAULT_CA_NAME.to_string(),
            organization: DEFAULT_CA_NAME.to_string(),
        }
    }
}

impl CaSettings {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_KEY_BITS..=MAX_KEY_BITS).contains(&self.key_bits) {
            return Err(Error::config(format!(
                "RSA key size {} outside supported range {}..={}",
                self.key_bits, MIN_KEY_BITS, MAX_KEY_BITS
            )));
        }
        if self.common_name.is_empty() {
            return Err(Error::config("CA common name must not be empty"));
        }
        Ok(())
    }
}

/// Serial numbers are the current time in units of 100µs, so certificates
/// minted in the same second still differ.
fn epoch_serial() -> SerialNumber {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let serial = now.as_secs() * 10_000 + u64::from(now.subsec_micros() / 100);
    SerialNumber::from(serial)
}

fn signing_key(key_der: &PrivatePkcs8KeyDer<'_>, digest: Digest) -> Result<KeyPair> {
    KeyPair::from_pkcs8_der_and_sign_algo(key_der, digest.signature_algorithm())
        .map_err(|e| Error::certificate_format(format!("Unusable CA private key: {}", e)))
}

/// Paths written by [`GeneratedCa::export`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaExportPaths {
    /// Private key followed by certificate
    pub bundle: PathBuf,
    pub cert_pem: PathBuf,
    /// Same bytes as `cert_pem`; Android picks its import handler by extension.
    pub cert_cer: PathBuf,
    /// PKCS#12 with an empty passphrase, for Windows
    pub cert_p12: PathBuf,
}

impl CaExportPaths {
    pub fn for_base(base: &Path) -> Self {
        let dir = base.parent().unwrap_or_else(|| Path::new(""));
        let stem = if base.extension().is_some_and(|ext| ext == "pem") {
            base.file_stem()
        } else {
            base.file_name()
        };
        let stem = stem.map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();

        Self {
            bundle: base.to_path_buf(),
            cert_pem: dir.join(format!("{}-cert.pem", stem)),
            cert_cer: dir.join(format!("{}-cert.cer", stem)),
            cert_p12: dir.join(format!("{}-cert.p12", stem)),
        }
    }
}

/// A generated root certificate and its key pair
pub struct GeneratedCa {
    /// PEM-encoded PKCS#8 private key
    pub key_pem: String,
    /// DER-encoded PKCS#8 private key
    pub key_der: Vec<u8>,
    /// PEM-encoded certificate
    pub cert_pem: String,
    /// DER-encoded certificate
    pub cert_der: Vec<u8>,
    pub digest: Digest,
    pub common_name: String,
}

impl fmt::Debug for GeneratedCa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedCa")
            .field("common_name", &self.common_name)
            .field("digest", &self.digest)
            .finish_non_exhaustive()
    }
}

impl GeneratedCa {
    /// Generate a new self-signed root authority. No I/O.
    pub fn generate(settings: &CaSettings) -> Result<Self> {
        settings.validate()?;

        let rsa_key = RsaPrivateKey::new(&mut rand::thread_rng(), settings.key_bits)
            .map_err(|e| Error::certificate_signing(format!("RSA key generation failed: {}", e)))?;
        let key_doc = rsa_key
            .to_pkcs8_der()
            .map_err(|e| Error::certificate_signing(format!("Failed to encode CA key: {}", e)))?;
        let key_pem = rsa_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| Error::certificate_signing(format!("Failed to encode CA key: {}", e)))?;
        let key_der = key_doc.as_bytes().to_vec();

        let key_pair = signing_key(&PrivatePkcs8KeyDer::from(key_der.as_slice()), settings.digest)?;

        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, settings.common_name.as_str());
        dn.push(DnType::OrganizationName, settings.organization.as_str());
        params.distinguished_name = dn;
        params.is_ca = IsCa::NoCa;
        params.serial_number = Some(epoch_serial());
        params.not_before = OffsetDateTime::now_utc();
        params.not_after = params.not_before + CA_VALIDITY;
        for extension in root_ca_extensions(key_pair.public_key_raw()) {
            extension.apply(&mut params)?;
        }

        let cert = params
            .self_signed(&key_pair)
            .map_err(|e| Error::certificate_signing(format!("Failed to self-sign CA: {}", e)))?;

        Ok(Self {
            key_pem: key_pem.to_string(),
            key_der,
            cert_pem: cert.pem(),
            cert_der: cert.der().to_vec(),
            digest: settings.digest,
            common_name: settings.common_name.clone(),
        })
    }

    /// Key PEM immediately followed by certificate PEM.
    pub fn bundle_pem(&self) -> String {
        let mut bundle = self.key_pem.clone();
        if !bundle.ends_with('\n') {
            bundle.push('\n');
        }
        bundle.push_str(&self.cert_pem);
        bundle
    }

    /// PKCS#12 archive of the certificate and key, no passphrase.
    pub fn pkcs12_der(&self) -> Result<Vec<u8>> {
        p12::PFX::new(&self.cert_der, &self.key_der, None, "", &self.common_name)
            .map(|pfx| pfx.to_der())
            .ok_or_else(|| Error::certificate_signing("Failed to build PKCS#12 archive"))
    }

    /// Write the bundle, the certificate as `.pem` and `.cer`, and a PKCS#12
    /// archive next to `base_path`. Filesystem errors are returned as is.
    pub fn export(&self, base_path: impl AsRef<Path>) -> Result<CaExportPaths> {
        let paths = CaExportPaths::for_base(base_path.as_ref());
        if let Some(dir) = paths.bundle.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                std::fs::create_dir_all(dir)?;
            }
        }

        let p12 = self.pkcs12_der()?;

        std::fs::write(&paths.bundle, self.bundle_pem())?;
        std::fs::write(&paths.cert_pem, &self.cert_pem)?;
        std::fs::write(&paths.cert_cer, &self.cert_pem)?;
        std::fs::write(&paths.cert_p12, p12)?;

        // Both the bundle and the archive carry the private key
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            for path in [&paths.bundle, &paths.cert_p12] {
                let mut perms = std::fs::metadata(path)?.permissions();
                perms.set_mode(0o600);
                std::fs::set_permissions(path, perms)?;
            }
        }

        tracing::info!(
            path = %paths.bundle.display(),
            common_name = %self.common_name,
            "Exported root CA"
        );
        Ok(paths)
    }

    /// Load this authority for signing.
    pub fn authority(&self) -> Result<CertificateAuthority> {
        CertificateAuthority::from_bundle_pem(&self.bundle_pem(), self.digest)
    }
}

/// A freshly signed leaf certificate
#[derive(Debug, Clone)]
pub struct LeafCertificate {
    pub pem: String,
    pub der: Vec<u8>,
}

/// A loaded Certificate Authority for signing leaf certificates
pub struct CertificateAuthority {
    issuer: Issuer<'static, KeyPair>,
    /// The CA key again, as the public key every leaf carries.
    leaf_key: KeyPair,
    key_der: PrivatePkcs8KeyDer<'static>,
    cert_der: CertificateDer<'static>,
    digest: Digest,
}

impl fmt::Debug for CertificateAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateAuthority")
            .field("digest", &self.digest)
            .finish_non_exhaustive()
    }
}

impl CertificateAuthority {
    /// Load a CA from a PEM bundle holding the private key (PKCS#8 or
    /// PKCS#1) and the certificate.
    pub fn from_bundle_pem(bundle: &str, digest: Digest) -> Result<Self> {
        let mut key: Option<Vec<u8>> = None;
        let mut cert: Option<CertificateDer<'static>> = None;

        for item in rustls_pemfile::read_all(&mut bundle.as_bytes()) {
            let item = item
                .map_err(|e| Error::certificate_format(format!("Invalid PEM in CA bundle: {}", e)))?;
            match item {
                Item::Pkcs8Key(k) if key.is_none() => key = Some(k.secret_pkcs8_der().to_vec()),
                Item::Pkcs1Key(k) if key.is_none() => {
                    let rsa_key = RsaPrivateKey::from_pkcs1_der(k.secret_pkcs1_der()).map_err(
                        |e| Error::certificate_format(format!("Invalid RSA private key: {}", e)),
                    )?;
                    let doc = rsa_key.to_pkcs8_der().map_err(|e| {
                        Error::certificate_format(format!("Invalid RSA private key: {}", e))
                    })?;
                    key = Some(doc.as_bytes().to_vec());
                }
                Item::X509Certificate(c) if cert.is_none() => cert = Some(c),
                _ => {}
            }
        }

        let key = key.ok_or_else(|| Error::certificate_format("No private key found in CA bundle"))?;
        let cert_der =
            cert.ok_or_else(|| Error::certificate_format("No certificate found in CA bundle"))?;
        let key_der = PrivatePkcs8KeyDer::from(key);

        let issuer = Issuer::from_ca_cert_der(&cert_der, signing_key(&key_der, digest)?)
            .map_err(|e| Error::certificate_format(format!("Invalid CA certificate: {}", e)))?;
        let leaf_key = signing_key(&key_der, digest)?;

        Ok(Self {
            issuer,
            leaf_key,
            key_der,
            cert_der,
            digest,
        })
    }

    /// Load a CA bundle file.
    pub fn from_bundle_file(path: impl AsRef<Path>, digest: Digest) -> Result<Self> {
        let bundle = std::fs::read_to_string(path.as_ref())?;
        Self::from_bundle_pem(&bundle, digest)
    }

    /// Sign a leaf certificate for `common_name`.
    ///
    /// The leaf carries the CA's own public key: minting needs no key
    /// generation, and whoever holds the CA key can serve any leaf. Callers
    /// must not expect leaves to have distinct keys.
    ///
    /// With an empty `sans` the certificate has no subjectAltName extension
    /// at all.
    pub fn issue_leaf(&self, common_name: &str, sans: &[String]) -> Result<LeafCertificate> {
        let mut params = leaf_request(common_name);

        let now = OffsetDateTime::now_utc();
        params.serial_number = Some(epoch_serial());
        params.not_before = now - LEAF_BACKDATE;
        params.not_after = now + LEAF_VALIDITY;
        if let Some(san) = leaf_san_extension(sans) {
            san.apply(&mut params)?;
        }

        let cert = params
            .signed_by(&self.leaf_key, &self.issuer)
            .map_err(|e| {
                Error::certificate_signing(format!(
                    "Failed to sign certificate for '{}': {}",
                    common_name, e
                ))
            })?;

        tracing::debug!(
            hostname = %common_name,
            sans = sans.len(),
            "Signed leaf certificate"
        );
        Ok(LeafCertificate {
            pem: cert.pem(),
            der: cert.der().to_vec(),
        })
    }

    /// Get the CA certificate in DER format
    pub fn cert_der(&self) -> &CertificateDer<'static> {
        &self.cert_der
    }

    /// The CA private key, which is also every leaf's key.
    pub fn key_der(&self) -> &PrivatePkcs8KeyDer<'static> {
        &self.key_der
    }

    pub fn digest(&self) -> Digest {
        self.digest
    }
}

/// Subject of a leaf: the common name only.
fn leaf_request(common_name: &str) -> CertificateParams {
    let mut params = CertificateParams::default();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    params.distinguished_name = dn;
    params.is_ca = IsCa::NoCa;
    params
}

/// Load the CA bundle at `ca_bundle`, sign a leaf and write its PEM to `dest`.
pub fn issue<W: Write>(
    ca_bundle: impl AsRef<Path>,
    common_name: &str,
    sans: &[String],
    digest: Digest,
    mut dest: W,
) -> Result<()> {
    let ca = CertificateAuthority::from_bundle_file(ca_bundle, digest)?;
    let leaf = ca.issue_leaf(common_name, sans)?;
    dest.write_all(leaf.pem.as_bytes())?;
    dest.flush()?;
    Ok(())
}
