//! OCTET STRING and restricted-string content handling, including the CER
//! constructed-segment form.

use crate::error::{Result, TlvErrorKind};
use crate::identifier::Identifier;
use crate::options::Options;
use crate::tag::Tag;
use crate::wire::{Pdu, Tlv};

/// Writes a string-like value under `tag`.
///
/// When the content exceeds the rule's primitive cap (1000 octets under
/// CER) the value becomes a constructed encoding of primitive OCTET STRING
/// segments, each at most the cap.
pub(crate) fn encode_string_value(
    pdu: &mut Pdu,
    tag: Tag,
    contents: &[u8],
    overlay: &Options,
) -> Result<usize> {
    let max = pdu.rule().max_primitive_string_length();

    if contents.len() > max {
        let mut segments = Pdu::new(pdu.rule());
        for chunk in contents.chunks(max) {
            segments.write_tlv(
                Identifier::from_tag(Tag::OCTET_STRING, false),
                chunk,
                &Options::default(),
            )?;
        }
        pdu.write_tlv(Identifier::from_tag(tag, true), segments.as_bytes(), overlay)
    } else {
        pdu.write_tlv(Identifier::from_tag(tag, false), contents, overlay)
    }
}

/// Collects a string value's bytes from either the primitive form or a
/// constructed encoding of segments. DER admits only the primitive form.
pub(crate) fn decode_string_value(tlv: &Tlv<'_>) -> Result<Vec<u8>> {
    if tlv.is_primitive() {
        return Ok(tlv.contents.to_vec());
    }

    if tlv.rule.is_der() {
        return Err(TlvErrorKind::ConstructedProhibited.into());
    }

    let mut buffer = Vec::new();
    collect_segments(tlv.rule, tlv.contents, &mut buffer)?;
    Ok(buffer)
}

fn collect_segments(
    rule: crate::rules::EncodingRules,
    bytes: &[u8],
    buffer: &mut Vec<u8>,
) -> Result<()> {
    let mut pdu = Pdu::from_bytes(rule, bytes);
    while !pdu.is_exhausted() {
        let segment = pdu.read_tlv(&Options::default())?;
        if segment.is_primitive() {
            buffer.extend_from_slice(segment.contents);
        } else {
            let contents = segment.contents.to_vec();
            collect_segments(rule, &contents, buffer)?;
        }
    }
    Ok(())
}

/// Writes textual content under a restricted-string `tag`, converting to
/// the tag's wire form (UTF-16BE for BMPString, UTF-32BE for
/// UniversalString, raw bytes otherwise).
pub(crate) fn encode_character_string(
    pdu: &mut Pdu,
    tag: Tag,
    text: &str,
    overlay: &Options,
) -> Result<usize> {
    let bytes: Vec<u8> = match tag {
        Tag::BMP_STRING => text
            .encode_utf16()
            .flat_map(|unit| unit.to_be_bytes())
            .collect(),
        Tag::UNIVERSAL_STRING => text
            .chars()
            .flat_map(|ch| (ch as u32).to_be_bytes())
            .collect(),
        _ => text.as_bytes().to_vec(),
    };
    encode_string_value(pdu, tag, &bytes, overlay)
}

/// Reassembles and validates textual content for `tag`, returning it as a
/// Rust string.
pub(crate) fn decode_character_string(tlv: &Tlv<'_>, tag: Tag) -> Result<String> {
    let bytes = decode_string_value(tlv)?;
    match tag {
        Tag::BMP_STRING => crate::types::strings::decode_utf16_be(&bytes),
        Tag::UNIVERSAL_STRING => crate::types::strings::decode_utf32_be(&bytes),
        _ => {
            crate::types::strings::validator_for(tag)(&bytes)?;
            String::from_utf8(bytes).map_err(|_| {
                crate::error::PrimitiveErrorKind::StringConversion {
                    tag,
                    msg: crate::error::intern("content is not valid UTF-8"),
                }
                .into()
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::EncodingRules;

    #[test]
    fn primitive_below_the_cap() {
        let mut pdu = Pdu::new(EncodingRules::Cer);
        encode_string_value(&mut pdu, Tag::UTF8_STRING, b"Hello", &Options::default()).unwrap();
        assert_eq!(&[0x0C, 0x05, 0x48, 0x65, 0x6C, 0x6C, 0x6F], pdu.as_bytes());
    }

    #[test]
    fn cer_segments_above_the_cap() {
        let contents = vec![b'X'; 2001];
        let mut pdu = Pdu::new(EncodingRules::Cer);
        encode_string_value(&mut pdu, Tag::OCTET_STRING, &contents, &Options::default()).unwrap();

        let bytes = pdu.as_bytes();
        // Constructed outer with indefinite length.
        assert_eq!(&[0x24, 0x80, 0x04, 0x82, 0x03, 0xE8], &bytes[..6]);
        // Two full segments, a one-byte tail, then EOC.
        assert_eq!(2 + (4 + 1000) * 2 + 3 + 2, bytes.len());
        let tail = &bytes[bytes.len() - 5..];
        assert_eq!(&[0x04, 0x01, b'X', 0x00, 0x00], tail);
    }

    #[test]
    fn ber_keeps_primitive_form() {
        let contents = vec![b'X'; 2001];
        let mut pdu = Pdu::new(EncodingRules::Ber);
        encode_string_value(&mut pdu, Tag::OCTET_STRING, &contents, &Options::default()).unwrap();
        assert_eq!(&[0x04, 0x82, 0x07, 0xD1], &pdu.as_bytes()[..4]);
    }

    #[test]
    fn constructed_decode_reassembles() {
        let data = &[
            0x24, 0x80, 0x04, 0x04, 1, 2, 3, 4, 0x04, 0x02, 5, 6, 0x00, 0x00,
        ];
        let mut pdu = Pdu::from_bytes(EncodingRules::Ber, data);
        let tlv = pdu.read_tlv(&Options::default()).unwrap();
        assert_eq!(vec![1, 2, 3, 4, 5, 6], decode_string_value(&tlv).unwrap());
    }

    #[test]
    fn der_rejects_constructed_strings() {
        // Definite constructed form, parsed under DER.
        let data = &[0x24, 0x08, 0x04, 0x02, 1, 2, 0x04, 0x02, 3, 4];
        let mut pdu = Pdu::from_bytes(EncodingRules::Der, data);
        let tlv = pdu.read_tlv(&Options::default()).unwrap();
        let err = decode_string_value(&tlv).unwrap_err();
        assert!(matches!(
            *err.kind,
            crate::error::ErrorKind::Tlv {
                inner: TlvErrorKind::ConstructedProhibited
            }
        ));
    }

    #[test]
    fn round_trip_segmentation() {
        let contents = vec![0xAB; 2500];
        let mut pdu = Pdu::new(EncodingRules::Cer);
        encode_string_value(&mut pdu, Tag::OCTET_STRING, &contents, &Options::default()).unwrap();

        let mut reader = Pdu::from_bytes(EncodingRules::Cer, pdu.as_bytes());
        let tlv = reader.read_tlv(&Options::default()).unwrap();
        assert_eq!(contents, decode_string_value(&tlv).unwrap());
    }
}
