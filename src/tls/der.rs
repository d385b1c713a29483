//! Minimal DER reading and writing.
//!
//! Just enough ASN.1 for the extension payloads this crate builds and for
//! walking a `GeneralNames` sequence. Everything else goes through
//! `x509-parser` or `rcgen`.

pub const TAG_BOOLEAN: u8 = 0x01;
pub const TAG_INTEGER: u8 = 0x02;
pub const TAG_BIT_STRING: u8 = 0x03;
pub const TAG_OCTET_STRING: u8 = 0x04;
pub const TAG_OID: u8 = 0x06;
pub const TAG_IA5_STRING: u8 = 0x16;
pub const TAG_SEQUENCE: u8 = 0x30;

/// Mask selecting the class bits of an identifier octet.
pub const CLASS_MASK: u8 = 0xC0;
pub const CLASS_CONTEXT: u8 = 0x80;
/// Set on constructed encodings.
pub const CONSTRUCTED: u8 = 0x20;
/// Low-tag-number bits; `0x1F` announces a multi-byte tag.
pub const TAG_NUMBER_MASK: u8 = 0x1F;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DerError {
    #[error("unexpected end of DER data")]
    Truncated,
    #[error("indefinite length is not allowed in DER")]
    IndefiniteLength,
    #[error("DER length does not fit")]
    LengthOverflow,
    #[error("non-minimal DER length encoding")]
    NonMinimalLength,
}

/// A decoded tag-length-value element.
#[derive(Debug, Clone, Copy)]
pub struct Tlv<'a> {
    pub tag: u8,
    pub value: &'a [u8],
}

/// Zero-copy cursor over DER bytes.
#[derive(Debug, Clone)]
pub struct DerReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> DerReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn next_byte(&mut self) -> Result<u8, DerError> {
        let byte = *self.data.get(self.pos).ok_or(DerError::Truncated)?;
        self.pos += 1;
        Ok(byte)
    }

    /// Read the next element. Multi-byte tag numbers are not supported and
    /// are surfaced as their leading identifier octet for the caller to reject.
    pub fn read_tlv(&mut self) -> Result<Tlv<'a>, DerError> {
        let tag = self.next_byte()?;
        let length = self.read_length()?;
        let end = self
            .pos
            .checked_add(length)
            .ok_or(DerError::LengthOverflow)?;
        let value = self.data.get(self.pos..end).ok_or(DerError::Truncated)?;
        self.pos = end;
        Ok(Tlv { tag, value })
    }

    fn read_length(&mut self) -> Result<usize, DerError> {
        let first = self.next_byte()?;
        if first < 0x80 {
            return Ok(usize::from(first));
        }
        if first == 0x80 {
            return Err(DerError::IndefiniteLength);
        }

        let count = usize::from(first & 0x7F);
        if count > std::mem::size_of::<u32>() {
            return Err(DerError::LengthOverflow);
        }

        let mut length: usize = 0;
        for _ in 0..count {
            length = (length << 8) | usize::from(self.next_byte()?);
        }
        if length < 0x80 || (count > 1 && length >> ((count - 1) * 8) == 0) {
            return Err(DerError::NonMinimalLength);
        }
        Ok(length)
    }
}

fn encode_length(len: usize, out: &mut Vec<u8>) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    out.push(0x80 | (bytes.len() - skip) as u8);
    out.extend_from_slice(&bytes[skip..]);
}

/// Encode one element.
pub fn tlv(tag: u8, value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len() + 6);
    out.push(tag);
    encode_length(value.len(), &mut out);
    out.extend_from_slice(value);
    out
}

/// Encode a SEQUENCE from already-encoded members.
pub fn sequence<I>(members: I) -> Vec<u8>
where
    I: IntoIterator<Item = Vec<u8>>,
{
    let body: Vec<u8> = members.into_iter().flatten().collect();
    tlv(TAG_SEQUENCE, &body)
}

pub fn boolean(value: bool) -> Vec<u8> {
    tlv(TAG_BOOLEAN, &[if value { 0xFF } else { 0x00 }])
}

/// Encode an OBJECT IDENTIFIER from its arcs.
pub fn oid(arcs: &[u64]) -> Vec<u8> {
    let mut body = Vec::new();
    if let [first, second, rest @ ..] = arcs {
        push_base128(first * 40 + second, &mut body);
        for arc in rest {
            push_base128(*arc, &mut body);
        }
    }
    tlv(TAG_OID, &body)
}

fn push_base128(mut value: u64, out: &mut Vec<u8>) {
    let mut groups = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        groups.push(0x80 | (value & 0x7F) as u8);
        value >>= 7;
    }
    out.extend(groups.iter().rev());
}

/// Encode a named-bit BIT STRING. `bits` are bit positions as numbered in
/// ASN.1 (bit 0 is the most significant bit of the first octet). Trailing
/// zero bits are dropped as DER requires.
pub fn named_bits(bits: &[u8]) -> Vec<u8> {
    let Some(highest) = bits.iter().copied().max() else {
        return tlv(TAG_BIT_STRING, &[0]);
    };
    let mut octets = vec![0u8; usize::from(highest / 8) + 1];
    for bit in bits {
        octets[usize::from(bit / 8)] |= 0x80 >> (bit % 8);
    }
    let unused = 7 - (highest % 8);
    let mut body = Vec::with_capacity(octets.len() + 1);
    body.push(unused);
    body.extend_from_slice(&octets);
    tlv(TAG_BIT_STRING, &body)
}
