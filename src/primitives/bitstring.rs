//! BIT STRING content codec, including the CER constructed-segment form.

use crate::error::{PrimitiveErrorKind, Result, TlvErrorKind};
use crate::identifier::Identifier;
use crate::options::Options;
use crate::tag::Tag;
use crate::types::BitString;
use crate::wire::{Pdu, Tlv};

/// Packs the bits big-endian within each byte, padded low with zeros.
/// Returns the packed bytes and the unused-bit count of the final byte.
fn pack(bits: &BitString) -> (Vec<u8>, u8) {
    let mut bytes = vec![0u8; bits.len().div_ceil(8)];
    for (index, bit) in bits.iter().enumerate() {
        if *bit {
            bytes[index / 8] |= 0x80 >> (index % 8);
        }
    }
    let unused = ((8 - bits.len() % 8) % 8) as u8;
    (bytes, unused)
}

/// Writes a BIT STRING under `tag`.
///
/// The primitive content is the unused-bit count followed by the packed
/// bits. When that content would exceed the rule's primitive cap the value
/// becomes a constructed encoding of primitive BIT STRING segments; every
/// segment but the last carries a zero unused-bit count.
pub(crate) fn encode_bit_string(
    pdu: &mut Pdu,
    tag: Tag,
    bits: &BitString,
    overlay: &Options,
) -> Result<usize> {
    let (bytes, unused) = pack(bits);
    let max = pdu.rule().max_primitive_string_length();

    if bytes.len() + 1 > max {
        // Each segment carries its own unused-bit octet, so a full segment
        // holds one byte less of packed data than the cap.
        let data_per_segment = max - 1;
        let mut segments = Pdu::new(pdu.rule());
        let chunks: Vec<&[u8]> = bytes.chunks(data_per_segment).collect();
        for (index, chunk) in chunks.iter().enumerate() {
            let last = index == chunks.len() - 1;
            let mut contents = Vec::with_capacity(chunk.len() + 1);
            contents.push(if last { unused } else { 0 });
            contents.extend_from_slice(chunk);
            segments.write_tlv(
                Identifier::from_tag(Tag::BIT_STRING, false),
                &contents,
                &Options::default(),
            )?;
        }
        pdu.write_tlv(Identifier::from_tag(tag, true), segments.as_bytes(), overlay)
    } else {
        let mut contents = Vec::with_capacity(bytes.len() + 1);
        contents.push(unused);
        contents.extend_from_slice(&bytes);
        pdu.write_tlv(Identifier::from_tag(tag, false), &contents, overlay)
    }
}

fn unpack(contents: &[u8], canonical: bool) -> Result<BitString> {
    let unused = match contents.first() {
        Some(&unused) => unused,
        None => {
            return Err(PrimitiveErrorKind::MismatchedLength {
                expected: 1,
                actual: 0,
            }
            .into())
        }
    };

    if unused > 7 || (contents.len() == 1 && unused != 0) {
        return Err(PrimitiveErrorKind::InvalidBitString { bits: unused }.into());
    }

    let data = &contents[1..];
    if canonical && unused > 0 {
        let mask = (1u8 << unused) - 1;
        if data.last().map_or(false, |last| last & mask != 0) {
            return Err(PrimitiveErrorKind::NonZeroPadding.into());
        }
    }

    let mut bits = BitString::new();
    let bit_count = data.len() * 8 - usize::from(unused);
    for index in 0..bit_count {
        bits.push(data[index / 8] & (0x80 >> (index % 8)) != 0);
    }
    Ok(bits)
}

/// Decodes a BIT STRING from either the primitive form or a constructed
/// encoding of segments. DER admits only the primitive form; only the
/// final segment may carry a nonzero unused-bit count.
pub(crate) fn decode_bit_string(tlv: &Tlv<'_>) -> Result<BitString> {
    let canonical = !tlv.rule.is_ber();

    if tlv.is_primitive() {
        return unpack(tlv.contents, canonical);
    }

    if tlv.rule.is_der() {
        return Err(TlvErrorKind::ConstructedProhibited.into());
    }

    let mut segments = Pdu::from_bytes(tlv.rule, tlv.contents);
    let mut bits = BitString::new();
    while !segments.is_exhausted() {
        let segment = segments.read_tlv(&Options::default())?;
        let segment_is_primitive = segment.is_primitive();
        let segment_first_byte = segment.contents.first().copied();
        let mut decoded = decode_bit_string(&segment)?;
        let more = !segments.is_exhausted();
        if more && segment_is_primitive && segment_first_byte != Some(0) {
            return Err(PrimitiveErrorKind::InvalidBitString {
                bits: segment_first_byte.unwrap_or(0),
            }
            .into());
        }
        bits.append(&mut decoded);
    }
    Ok(bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::EncodingRules;
    use bitvec::prelude::*;

    fn from_bytes(bytes: &[u8]) -> BitString {
        BitString::from_slice(bytes)
    }

    #[test]
    fn primitive_with_unused_bits() {
        let mut bits = from_bytes(&[0x86]);
        bits.truncate(6);

        let mut pdu = Pdu::new(EncodingRules::Der);
        encode_bit_string(&mut pdu, Tag::BIT_STRING, &bits, &Options::default()).unwrap();
        assert_eq!(&[0x03, 0x02, 0x02, 0x84], pdu.as_bytes());
    }

    #[test]
    fn empty_bit_string() {
        let bits = BitString::new();
        let mut pdu = Pdu::new(EncodingRules::Der);
        encode_bit_string(&mut pdu, Tag::BIT_STRING, &bits, &Options::default()).unwrap();
        assert_eq!(&[0x03, 0x01, 0x00], pdu.as_bytes());

        let mut reader = Pdu::from_bytes(EncodingRules::Der, pdu.as_bytes());
        let tlv = reader.read_tlv(&Options::default()).unwrap();
        assert_eq!(bits, decode_bit_string(&tlv).unwrap());
    }

    #[test]
    fn decode_checks_unused_count() {
        let mut pdu = Pdu::from_bytes(EncodingRules::Ber, &[0x03, 0x02, 0x08, 0xFF]);
        let tlv = pdu.read_tlv(&Options::default()).unwrap();
        assert!(matches!(
            *decode_bit_string(&tlv).unwrap_err().kind,
            crate::error::ErrorKind::Primitive {
                inner: PrimitiveErrorKind::InvalidBitString { bits: 8 }
            }
        ));
    }

    #[test]
    fn canonical_rules_reject_dirty_padding() {
        // Two unused bits, lowest bit set.
        let data = &[0x03, 0x02, 0x02, 0x85];

        let mut pdu = Pdu::from_bytes(EncodingRules::Ber, data);
        let tlv = pdu.read_tlv(&Options::default()).unwrap();
        assert!(decode_bit_string(&tlv).is_ok());

        let mut pdu = Pdu::from_bytes(EncodingRules::Der, data);
        let tlv = pdu.read_tlv(&Options::default()).unwrap();
        assert!(matches!(
            *decode_bit_string(&tlv).unwrap_err().kind,
            crate::error::ErrorKind::Primitive {
                inner: PrimitiveErrorKind::NonZeroPadding
            }
        ));
    }

    #[test]
    fn constructed_decode_under_ber() {
        let data = &[
            0x23, 0x80, // constructed, indefinite
            0x03, 0x03, 0x00, 0x0A, 0x3B, // segment 1
            0x03, 0x05, 0x04, 0x5F, 0x29, 0x1C, 0xD0, // segment 2, 4 unused
            0x00, 0x00, // EOC
        ];
        let mut pdu = Pdu::from_bytes(EncodingRules::Ber, data);
        let tlv = pdu.read_tlv(&Options::default()).unwrap();

        let mut expected = from_bytes(&[0x0A, 0x3B, 0x5F, 0x29, 0x1C, 0xD0]);
        expected.truncate(44);
        assert_eq!(expected, decode_bit_string(&tlv).unwrap());
    }

    #[test]
    fn cer_segments_large_values() {
        let bits = from_bytes(&vec![0xA5; 1200]);

        let mut pdu = Pdu::new(EncodingRules::Cer);
        encode_bit_string(&mut pdu, Tag::BIT_STRING, &bits, &Options::default()).unwrap();

        let bytes = pdu.as_bytes();
        // Outer constructed BIT STRING, indefinite.
        assert_eq!(&[0x23, 0x80], &bytes[..2]);
        // First segment: 999 data bytes plus the unused-bit octet.
        assert_eq!(&[0x03, 0x82, 0x03, 0xE8, 0x00], &bytes[2..7]);

        let mut reader = Pdu::from_bytes(EncodingRules::Cer, bytes);
        let tlv = reader.read_tlv(&Options::default()).unwrap();
        assert_eq!(bits, decode_bit_string(&tlv).unwrap());
    }

    #[test]
    fn nonfinal_segment_with_unused_bits_is_rejected() {
        let data = &[
            0x23, 0x08, 0x03, 0x02, 0x04, 0xA0, // unused bits on a non-final segment
            0x03, 0x02, 0x00, 0x55,
        ];
        let mut pdu = Pdu::from_bytes(EncodingRules::Ber, data);
        let tlv = pdu.read_tlv(&Options::default()).unwrap();
        assert!(decode_bit_string(&tlv).is_err());
    }
}
