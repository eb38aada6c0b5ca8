//! # The TLV engine
//!
//! Identifier and length octets, owning PDU buffers, and the read, peek,
//! and write operations over complete TLVs.

pub(crate) mod parser;
mod pdu;
mod tlv;

pub use pdu::Pdu;
pub use tlv::{Length, Tlv};

/// Encodes `number` as a big-endian base-128 chain, the continuation bit
/// set on all but the last octet.
pub(crate) fn encode_base128(number: u32, buffer: &mut Vec<u8>) {
    let mut groups = [0u8; 5];
    let mut count = 0;
    let mut remaining = number;

    // Low seven bits first, reversed on emission; zero still needs one
    // octet.
    loop {
        groups[count] = (remaining & 0x7F) as u8;
        count += 1;
        remaining >>= 7;
        if remaining == 0 {
            break;
        }
    }

    for index in (0..count).rev() {
        let continuation = if index == 0 { 0 } else { 0x80 };
        buffer.push(continuation | groups[index]);
    }
}

/// The arbitrary-precision form of [`encode_base128`], used for OBJECT
/// IDENTIFIER arcs that exceed the machine word.
pub(crate) fn encode_base128_uint(number: &num_bigint::BigUint, buffer: &mut Vec<u8>) {
    use num_traits::{ToPrimitive, Zero};

    if let Some(small) = number.to_u32() {
        encode_base128(small, buffer);
        return;
    }

    let mut groups = Vec::new();
    let mut remaining = number.clone();
    let mask = num_bigint::BigUint::from(0x7Fu8);
    while !remaining.is_zero() {
        let group = (&remaining & &mask).to_u8().unwrap_or(0);
        groups.push(group);
        remaining >>= 7u8;
    }

    for (index, group) in groups.iter().enumerate().rev() {
        let continuation = if index == 0 { 0 } else { 0x80 };
        buffer.push(continuation | group);
    }
}

/// Emits definite-form length octets for `len`: short form below 128,
/// otherwise the minimal number of big-endian octets prefixed by
/// `0x80 | count`.
pub(crate) fn encode_definite_length(len: usize, buffer: &mut Vec<u8>) {
    if len <= 127 {
        buffer.push(len as u8);
    } else {
        let be = len.to_be_bytes();
        let first = be.iter().position(|&b| b != 0).unwrap_or(be.len() - 1);
        let octets = &be[first..];
        buffer.push(0x80 | octets.len() as u8);
        buffer.extend_from_slice(octets);
    }
}
