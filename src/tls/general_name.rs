//! Decoding of `GeneralNames` (RFC 5280 §4.2.1.6).
//!
//! ```text
//! GeneralNames ::= SEQUENCE SIZE (1..MAX) OF GeneralName
//! GeneralName ::= CHOICE {
//!      otherName                 [0] OtherName,
//!      rfc822Name                [1] IA5String,
//!      dNSName                   [2] IA5String,
//!      x400Address               [3] ORAddress,
//!      directoryName             [4] Name,
//!      ediPartyName              [5] EDIPartyName,
//!      uniformResourceIdentifier [6] IA5String,
//!      iPAddress                 [7] OCTET STRING,
//!      registeredID              [8] OBJECT IDENTIFIER }
//! ```
//!
//! Only `dNSName` is interpreted. Every other choice is kept as its raw
//! contents so the caller can skip it without losing track of ordering.

use super::der::{DerReader, DerError, CLASS_CONTEXT, CLASS_MASK, CONSTRUCTED, TAG_SEQUENCE};

/// Upper bound on the number of names accepted in one extension.
pub const MAX_GENERAL_NAMES: usize = 1024;

/// One `GeneralName` choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneralName<'a> {
    OtherName(&'a [u8]),
    Rfc822Name(&'a [u8]),
    DnsName(&'a str),
    X400Address(&'a [u8]),
    DirectoryName(&'a [u8]),
    EdiPartyName(&'a [u8]),
    UniformResourceIdentifier(&'a [u8]),
    IpAddress(&'a [u8]),
    RegisteredId(&'a [u8]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GeneralNamesError {
    #[error(transparent)]
    Der(#[from] DerError),
    #[error("expected a SEQUENCE of general names")]
    NotASequence,
    #[error("trailing data after general names")]
    TrailingData,
    #[error("general names count {0} outside 1..=1024")]
    Size(usize),
    #[error("unknown general name tag {0:#04x}")]
    UnknownChoice(u8),
    #[error("dNSName is not an IA5String")]
    InvalidDnsName,
}

/// Decode a DER `GeneralNames` value, as carried in the subjectAltName
/// extension's OCTET STRING.
pub fn decode_general_names(der: &[u8]) -> Result<Vec<GeneralName<'_>>, GeneralNamesError> {
    let mut outer = DerReader::new(der);
    let seq = outer.read_tlv()?;
    if seq.tag != TAG_SEQUENCE {
        return Err(GeneralNamesError::NotASequence);
    }
    if !outer.is_empty() {
        return Err(GeneralNamesError::TrailingData);
    }

    let mut names = Vec::new();
    let mut reader = DerReader::new(seq.value);
    while !reader.is_empty() {
        if names.len() == MAX_GENERAL_NAMES {
            return Err(GeneralNamesError::Size(names.len() + 1));
        }
        let element = reader.read_tlv()?;
        names.push(decode_choice(element.tag, element.value)?);
    }

    if names.is_empty() {
        return Err(GeneralNamesError::Size(0));
    }
    Ok(names)
}

fn decode_choice(tag: u8, value: &[u8]) -> Result<GeneralName<'_>, GeneralNamesError> {
    if tag & CLASS_MASK != CLASS_CONTEXT {
        return Err(GeneralNamesError::UnknownChoice(tag));
    }

    // [2], [1], [6] and [7] are primitive; [0], [3], [4], [5] wrap
    // structures and so are constructed (explicit for directoryName).
    let name = match tag & !CLASS_MASK {
        0x02 => {
            if !value.is_ascii() {
                return Err(GeneralNamesError::InvalidDnsName);
            }
            let text =
                std::str::from_utf8(value).map_err(|_| GeneralNamesError::InvalidDnsName)?;
            GeneralName::DnsName(text)
        }
        0x01 => GeneralName::Rfc822Name(value),
        0x06 => GeneralName::UniformResourceIdentifier(value),
        0x07 => GeneralName::IpAddress(value),
        0x08 => GeneralName::RegisteredId(value),
        n if n == CONSTRUCTED => GeneralName::OtherName(value),
        n if n == CONSTRUCTED | 0x03 => GeneralName::X400Address(value),
        n if n == CONSTRUCTED | 0x04 => GeneralName::DirectoryName(value),
        n if n == CONSTRUCTED | 0x05 => GeneralName::EdiPartyName(value),
        _ => return Err(GeneralNamesError::UnknownChoice(tag)),
    };
    Ok(name)
}

/// DNS names from a subjectAltName payload, in encoded order.
///
/// Non-DNS choices are skipped. A payload that does not decode yields an
/// empty list rather than an error.
pub fn dns_names(der: &[u8]) -> Vec<String> {
    match decode_general_names(der) {
        Ok(names) => names
            .into_iter()
            .filter_map(|name| match name {
                GeneralName::DnsName(dns) => Some(dns.to_string()),
                _ => None,
            })
            .collect(),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring undecodable subjectAltName");
            Vec::new()
        }
    }
}
