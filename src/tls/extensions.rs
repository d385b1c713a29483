//! Typed X.509v3 extensions.
//!
//! rcgen fixes the criticality of its built-in extensions, so every
//! extension here is encoded by hand and attached as a custom extension with
//! the criticality asked for.

use rcgen::{CertificateParams, CustomExtension};
use sha1::{Digest, Sha1};

use super::der;
use crate::error::{Error, Result};

const OID_SUBJECT_KEY_IDENTIFIER: &[u64] = &[2, 5, 29, 14];
const OID_KEY_USAGE: &[u64] = &[2, 5, 29, 15];
const OID_SUBJECT_ALT_NAME: &[u64] = &[2, 5, 29, 17];
const OID_BASIC_CONSTRAINTS: &[u64] = &[2, 5, 29, 19];
const OID_EXTENDED_KEY_USAGE: &[u64] = &[2, 5, 29, 37];
const OID_NETSCAPE_CERT_TYPE: &[u64] = &[2, 16, 840, 1, 113730, 1, 1];

/// Context tag of `dNSName` within `GeneralName`.
const TAG_DNS_NAME: u8 = 0x82;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyUsage {
    DigitalSignature,
    KeyEncipherment,
    KeyCertSign,
    CrlSign,
}

impl KeyUsage {
    fn bit(self) -> u8 {
        match self {
            KeyUsage::DigitalSignature => 0,
            KeyUsage::KeyEncipherment => 2,
            KeyUsage::KeyCertSign => 5,
            KeyUsage::CrlSign => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendedKeyUsage {
    ServerAuth,
    ClientAuth,
    EmailProtection,
    TimeStamping,
    MsCodeInd,
    MsCodeCom,
    MsCtlSign,
    MsSgc,
    MsEfs,
    NsSgc,
}

impl ExtendedKeyUsage {
    pub fn oid(self) -> &'static [u64] {
        match self {
            ExtendedKeyUsage::ServerAuth => &[1, 3, 6, 1, 5, 5, 7, 3, 1],
            ExtendedKeyUsage::ClientAuth => &[1, 3, 6, 1, 5, 5, 7, 3, 2],
            ExtendedKeyUsage::EmailProtection => &[1, 3, 6, 1, 5, 5, 7, 3, 4],
            ExtendedKeyUsage::TimeStamping => &[1, 3, 6, 1, 5, 5, 7, 3, 8],
            ExtendedKeyUsage::MsCodeInd => &[1, 3, 6, 1, 4, 1, 311, 2, 1, 21],
            ExtendedKeyUsage::MsCodeCom => &[1, 3, 6, 1, 4, 1, 311, 2, 1, 22],
            ExtendedKeyUsage::MsCtlSign => &[1, 3, 6, 1, 4, 1, 311, 10, 3, 1],
            ExtendedKeyUsage::MsSgc => &[1, 3, 6, 1, 4, 1, 311, 10, 3, 3],
            ExtendedKeyUsage::MsEfs => &[1, 3, 6, 1, 4, 1, 311, 10, 3, 4],
            ExtendedKeyUsage::NsSgc => &[2, 16, 840, 1, 113730, 4, 1],
        }
    }
}

/// Netscape certificate type bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetscapeCertType {
    SslClient,
    SslServer,
    SslCa,
}

impl NetscapeCertType {
    fn bit(self) -> u8 {
        match self {
            NetscapeCertType::SslClient => 0,
            NetscapeCertType::SslServer => 1,
            NetscapeCertType::SslCa => 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionKind {
    BasicConstraints { ca: bool },
    KeyUsage(Vec<KeyUsage>),
    ExtendedKeyUsage(Vec<ExtendedKeyUsage>),
    NetscapeCertType(Vec<NetscapeCertType>),
    /// Key identifier, see [`key_identifier`].
    SubjectKeyIdentifier(Vec<u8>),
    /// DNS names, in order.
    SubjectAltName(Vec<String>),
}

/// An extension and its critical flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub kind: ExtensionKind,
    pub critical: bool,
}

impl Extension {
    pub fn new(kind: ExtensionKind, critical: bool) -> Self {
        Self { kind, critical }
    }

    pub fn critical(kind: ExtensionKind) -> Self {
        Self::new(kind, true)
    }

    pub fn non_critical(kind: ExtensionKind) -> Self {
        Self::new(kind, false)
    }

    /// The DER `extnValue` contents.
    pub fn value_der(&self) -> Result<Vec<u8>> {
        let value = match &self.kind {
            ExtensionKind::BasicConstraints { ca } => {
                if *ca {
                    der::sequence([der::boolean(true)])
                } else {
                    der::sequence([])
                }
            }
            ExtensionKind::KeyUsage(usages) => {
                let bits: Vec<u8> = usages.iter().map(|u| u.bit()).collect();
                der::named_bits(&bits)
            }
            ExtensionKind::ExtendedKeyUsage(purposes) => {
                der::sequence(purposes.iter().map(|p| der::oid(p.oid())))
            }
            ExtensionKind::NetscapeCertType(types) => {
                let bits: Vec<u8> = types.iter().map(|t| t.bit()).collect();
                der::named_bits(&bits)
            }
            ExtensionKind::SubjectKeyIdentifier(id) => der::tlv(der::TAG_OCTET_STRING, id),
            ExtensionKind::SubjectAltName(names) => {
                let mut entries = Vec::with_capacity(names.len());
                for name in names {
                    if !name.is_ascii() {
                        return Err(Error::certificate_signing(format!(
                            "subjectAltName entry '{}' is not an IA5String",
                            name
                        )));
                    }
                    entries.push(der::tlv(TAG_DNS_NAME, name.as_bytes()));
                }
                der::sequence(entries)
            }
        };
        Ok(value)
    }

    fn oid(&self) -> &'static [u64] {
        match &self.kind {
            ExtensionKind::BasicConstraints { .. } => OID_BASIC_CONSTRAINTS,
            ExtensionKind::KeyUsage(_) => OID_KEY_USAGE,
            ExtensionKind::ExtendedKeyUsage(_) => OID_EXTENDED_KEY_USAGE,
            ExtensionKind::NetscapeCertType(_) => OID_NETSCAPE_CERT_TYPE,
            ExtensionKind::SubjectKeyIdentifier(_) => OID_SUBJECT_KEY_IDENTIFIER,
            ExtensionKind::SubjectAltName(_) => OID_SUBJECT_ALT_NAME,
        }
    }

    /// Attach this extension to certificate parameters.
    pub fn apply(&self, params: &mut CertificateParams) -> Result<()> {
        let mut custom = CustomExtension::from_oid_content(self.oid(), self.value_der()?);
        custom.set_criticality(self.critical);
        params.custom_extensions.push(custom);
        Ok(())
    }
}

/// SHA-1 of the `subjectPublicKey` bit string contents (RFC 5280 4.2.1.2,
/// method 1).
pub fn key_identifier(subject_public_key: &[u8]) -> Vec<u8> {
    Sha1::digest(subject_public_key).to_vec()
}

/// Extensions of the root authority whose `subjectPublicKey` is
/// `subject_public_key`.
pub fn root_ca_extensions(subject_public_key: &[u8]) -> Vec<Extension> {
    vec![
        Extension::critical(ExtensionKind::BasicConstraints { ca: true }),
        Extension::critical(ExtensionKind::NetscapeCertType(vec![NetscapeCertType::SslCa])),
        Extension::critical(ExtensionKind::ExtendedKeyUsage(vec![
            ExtendedKeyUsage::ServerAuth,
            ExtendedKeyUsage::ClientAuth,
            ExtendedKeyUsage::EmailProtection,
            ExtendedKeyUsage::TimeStamping,
            ExtendedKeyUsage::MsCodeInd,
            ExtendedKeyUsage::MsCodeCom,
            ExtendedKeyUsage::MsCtlSign,
            ExtendedKeyUsage::MsSgc,
            ExtendedKeyUsage::MsEfs,
            ExtendedKeyUsage::NsSgc,
        ])),
        Extension::non_critical(ExtensionKind::KeyUsage(vec![
            KeyUsage::KeyCertSign,
            KeyUsage::CrlSign,
        ])),
        Extension::non_critical(ExtensionKind::SubjectKeyIdentifier(key_identifier(
            subject_public_key,
        ))),
    ]
}

/// The SAN extension for a leaf, or `None` when there are no names.
///
/// An absent SAN makes clients fall back to the subject CN, so an empty list
/// must not turn into an empty extension.
pub fn leaf_san_extension(sans: &[String]) -> Option<Extension> {
    if sans.is_empty() {
        None
    } else {
        Some(Extension::critical(ExtensionKind::SubjectAltName(
            sans.to_vec(),
        )))
    }
}
