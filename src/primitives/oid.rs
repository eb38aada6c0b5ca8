//! OBJECT IDENTIFIER and RELATIVE-OID content codecs.

use num_bigint::BigUint;
use num_traits::Zero;

use crate::error::{intern, Error, PrimitiveErrorKind, Result};
use crate::types::oid::{ObjectIdentifier, RelativeOid, MAX_OID_SECOND_ARC};
use crate::wire::encode_base128_uint;

fn invalid(msg: &str) -> Error {
    PrimitiveErrorKind::InvalidObjectIdentifier { msg: intern(msg) }.into()
}

/// Encodes the arcs with the first two combined as `40·arc0 + arc1`.
pub(crate) fn encode_object_identifier(oid: &ObjectIdentifier) -> Vec<u8> {
    let arcs = oid.arcs();
    let combined = &arcs[0] * 40u32 + &arcs[1];

    let mut bytes = Vec::new();
    encode_base128_uint(&combined, &mut bytes);
    for arc in &arcs[2..] {
        encode_base128_uint(arc, &mut bytes);
    }
    bytes
}

/// Encodes the arcs without first-arc compression.
pub(crate) fn encode_relative_oid(oid: &RelativeOid) -> Vec<u8> {
    let mut bytes = Vec::new();
    for arc in oid.arcs() {
        encode_base128_uint(arc, &mut bytes);
    }
    bytes
}

/// Splits `contents` into base-128 sub-identifiers, preserving arbitrary
/// precision.
fn parse_subidentifiers(contents: &[u8]) -> Result<Vec<BigUint>> {
    let mut arcs = Vec::new();
    let mut current = BigUint::zero();
    let mut in_progress = false;

    for byte in contents {
        if !in_progress && *byte == 0x80 {
            return Err(invalid("sub-identifier has a padded leading octet"));
        }
        current = (current << 7u8) | BigUint::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            arcs.push(core::mem::take(&mut current));
            in_progress = false;
        } else {
            in_progress = true;
        }
    }

    if in_progress {
        return Err(invalid("truncated sub-identifier"));
    }

    Ok(arcs)
}

/// Decodes OBJECT IDENTIFIER content, expanding the combined first
/// sub-identifier at the 40 and 80 boundaries.
pub(crate) fn decode_object_identifier(contents: &[u8]) -> Result<ObjectIdentifier> {
    if contents.is_empty() {
        return Err(invalid("empty content octets"));
    }

    let raw = parse_subidentifiers(contents)?;
    let combined = &raw[0];

    let eighty = BigUint::from(80u32);
    let forty = BigUint::from(MAX_OID_SECOND_ARC + 1);
    let (first, second) = if *combined >= eighty {
        (BigUint::from(2u32), combined - &eighty)
    } else if *combined >= forty {
        (BigUint::from(1u32), combined - &forty)
    } else {
        (BigUint::zero(), combined.clone())
    };

    let mut arcs = Vec::with_capacity(raw.len() + 1);
    arcs.push(first);
    arcs.push(second);
    arcs.extend(raw.into_iter().skip(1));

    ObjectIdentifier::new(arcs)
}

/// Decodes RELATIVE-OID content; at least one arc is required.
pub(crate) fn decode_relative_oid(contents: &[u8]) -> Result<RelativeOid> {
    if contents.is_empty() {
        return Err(invalid("empty content octets"));
    }
    RelativeOid::new(parse_subidentifiers(contents)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(text: &str) -> ObjectIdentifier {
        text.parse().unwrap()
    }

    #[test]
    fn known_encodings() {
        assert_eq!(
            vec![0x2B, 0x06, 0x01, 0x05, 0x05, 0x07, 0x30, 0x01],
            encode_object_identifier(&oid("1.3.6.1.5.5.7.48.1"))
        );
        assert_eq!(
            vec![0x2B, 0x06, 0x01, 0x04, 0x01, 0x83, 0xB9, 0x49],
            encode_object_identifier(&oid("1.3.6.1.4.1.56521"))
        );
        assert_eq!(vec![0x55, 0x04, 0x03], encode_object_identifier(&oid("2.5.4.3")));
        assert_eq!(vec![0x88, 0x37, 0x01], encode_object_identifier(&oid("2.999.1")));
    }

    #[test]
    fn round_trips() {
        for text in ["0.39", "1.2.840.113549", "2.999.1", "2.5.4.3"] {
            let value = oid(text);
            let bytes = encode_object_identifier(&value);
            assert_eq!(value, decode_object_identifier(&bytes).unwrap());
        }
    }

    #[test]
    fn first_subidentifier_expansion() {
        assert_eq!(oid("0.39"), decode_object_identifier(&[0x27]).unwrap());
        assert_eq!(oid("1.0"), decode_object_identifier(&[0x28]).unwrap());
        assert_eq!(oid("1.39"), decode_object_identifier(&[0x4F]).unwrap());
        assert_eq!(oid("2.0"), decode_object_identifier(&[0x50]).unwrap());
        assert_eq!(oid("2.40"), decode_object_identifier(&[0x78]).unwrap());
    }

    #[test]
    fn arbitrary_precision_arcs_survive() {
        let huge: BigUint = "987654321987654321987654321".parse().unwrap();
        let value = ObjectIdentifier::new(vec![
            BigUint::from(2u32),
            BigUint::from(25u32),
            huge.clone(),
        ])
        .unwrap();

        let bytes = encode_object_identifier(&value);
        let back = decode_object_identifier(&bytes).unwrap();
        assert_eq!(huge, back.arcs()[2]);
    }

    #[test]
    fn rejects_malformed_content() {
        assert!(decode_object_identifier(&[]).is_err());
        // Trailing continuation octet.
        assert!(decode_object_identifier(&[0x2B, 0x86]).is_err());
        // Padded leading octet.
        assert!(decode_object_identifier(&[0x80, 0x01]).is_err());
    }

    #[test]
    fn relative_oid_round_trip() {
        let value = RelativeOid::try_from([8571u32, 3, 2]).unwrap();
        let bytes = encode_relative_oid(&value);
        assert_eq!(vec![0xC2, 0x7B, 0x03, 0x02], bytes);
        assert_eq!(value, decode_relative_oid(&bytes).unwrap());
        assert!(decode_relative_oid(&[]).is_err());
    }
}
