//! Reading and writing complete TLVs against a [`Pdu`].

use crate::error::{ClassErrorKind, Result, TlvErrorKind};
use crate::identifier::Identifier;
use crate::options::Options;
use crate::rules::EncodingRules;
use crate::wire::{encode_base128, encode_definite_length, parser, Pdu};

/// The length field of a TLV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    /// A definite number of content octets.
    Definite(usize),
    /// The indefinite form, closed by end-of-contents octets. Only legal
    /// for constructed encodings under BER.
    Indefinite,
}

impl Length {
    pub fn is_indefinite(self) -> bool {
        matches!(self, Self::Indefinite)
    }
}

/// One tag-length-value unit, with its content octets borrowed from the
/// producing PDU's buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tlv<'a> {
    /// Tag and primitive/constructed bit.
    pub identifier: Identifier,
    /// The parsed length field.
    pub length: Length,
    /// The content octets. For the indefinite form this excludes the
    /// closing end-of-contents octets.
    pub contents: &'a [u8],
    /// The rule the producing PDU was created under.
    pub rule: EncodingRules,
}

impl<'a> Tlv<'a> {
    pub fn is_constructed(&self) -> bool {
        self.identifier.is_constructed()
    }

    pub fn is_primitive(&self) -> bool {
        self.identifier.is_primitive()
    }
}

/// Parse results expressed as buffer ranges, so that reading can update the
/// cursor without fighting the borrow on the contents slice.
struct RawTlv {
    identifier: Identifier,
    length: Length,
    contents: core::ops::Range<usize>,
    next: usize,
}

impl Pdu {
    fn parse_tlv_at(&self, offset: usize, overlay: &Options) -> Result<RawTlv> {
        let input = &self.as_bytes()[offset..];

        let (rest, mut identifier) = parser::parse_identifier(input)?;
        let (rest, length) = parser::parse_length(rest, self.rule(), identifier.is_constructed())?;
        let header = input.len() - rest.len();

        if overlay.explicit && identifier.is_primitive() {
            return Err(TlvErrorKind::ExpectedConstructedForExplicit.into());
        }

        // Implicit/explicit overrides substitute after the structural
        // checks; the parsed identifier must carry the overridden tag.
        if let Some(tag) = overlay.tag {
            let class = overlay.effective_class().unwrap_or(identifier.tag.class);
            if identifier.tag.class != class {
                return Err(ClassErrorKind::Mismatched {
                    expected: class,
                    actual: identifier.tag.class,
                }
                .into());
            }
            if identifier.tag.value != tag {
                return Err(TlvErrorKind::MismatchedTag {
                    expected: identifier.tag.set_value(tag),
                    actual: identifier.tag,
                }
                .into());
            }
            identifier = identifier.tag_number(tag);
        } else if let Some(class) = overlay.class {
            if identifier.tag.class != class {
                return Err(ClassErrorKind::Mismatched {
                    expected: class,
                    actual: identifier.tag.class,
                }
                .into());
            }
        }

        let value_start = offset + header;

        match length {
            Length::Definite(len) => {
                let value_end = value_start + len;
                if value_end > self.len() {
                    return Err(TlvErrorKind::Truncated.into());
                }
                Ok(RawTlv {
                    identifier,
                    length,
                    contents: value_start..value_end,
                    next: value_end,
                })
            }
            Length::Indefinite => {
                let eoc = parser::scan_end_of_contents(&self.as_bytes()[value_start..])?;
                Ok(RawTlv {
                    identifier,
                    length,
                    contents: value_start..value_start + eoc,
                    next: value_start + eoc + 2,
                })
            }
        }
    }

    /// Reads the TLV at the cursor and advances past it.
    pub fn read_tlv(&mut self, overlay: &Options) -> Result<Tlv<'_>> {
        let raw = self.parse_tlv_at(self.offset(), overlay)?;
        self.seek(raw.next);
        Ok(Tlv {
            identifier: raw.identifier,
            length: raw.length,
            contents: &self.as_bytes()[raw.contents],
            rule: self.rule(),
        })
    }

    /// Reads the TLV at the cursor without consuming it.
    pub fn peek_tlv(&self, overlay: &Options) -> Result<Tlv<'_>> {
        let raw = self.parse_tlv_at(self.offset(), overlay)?;
        Ok(Tlv {
            identifier: raw.identifier,
            length: raw.length,
            contents: &self.as_bytes()[raw.contents],
            rule: self.rule(),
        })
    }

    /// Writes a complete TLV: identifier octets for `identifier` adjusted
    /// by `overlay`, length octets per the PDU's rule, then `contents`.
    ///
    /// For an EXPLICIT overlay the caller supplies the already-encoded
    /// inner TLV as `contents`; the wrapper is forced constructed. Under
    /// CER every constructed value takes the indefinite form; under BER it
    /// does so when the overlay requests it.
    ///
    /// Returns the number of bytes appended.
    pub fn write_tlv(
        &mut self,
        identifier: Identifier,
        contents: &[u8],
        overlay: &Options,
    ) -> Result<usize> {
        let mut identifier = identifier;
        if let Some(class) = overlay.effective_class() {
            identifier = identifier.class(class);
        }
        if let Some(tag) = overlay.tag {
            identifier = identifier.tag_number(tag);
        }
        if overlay.explicit {
            identifier = identifier.constructed();
        }

        let start = self.len();
        let rule = self.rule();
        let indefinite = identifier.is_constructed()
            && (rule.is_cer() || (overlay.indefinite && rule.allows_indefinite()));

        {
            let buffer = self.buffer_mut();
            encode_identifier(identifier, buffer);
            if indefinite {
                buffer.push(0x80);
                buffer.extend_from_slice(contents);
                buffer.extend_from_slice(&[0x00, 0x00]);
            } else {
                encode_definite_length(contents.len(), buffer);
                buffer.extend_from_slice(contents);
            }
        }
        self.sync_offset_to_end();

        Ok(self.len() - start)
    }
}

/// Emits the identifier octets: class bits, constructed bit, and the tag
/// number inline or in the high-tag-number form.
fn encode_identifier(identifier: Identifier, buffer: &mut Vec<u8>) {
    const FIVE_BITS: u32 = (1 << 5) - 1;
    let mut tag_byte = identifier.tag.class as u8;
    let tag_number = identifier.tag.value;

    tag_byte <<= 1;
    tag_byte |= u8::from(identifier.is_constructed());
    tag_byte <<= 5;

    if tag_number >= FIVE_BITS {
        buffer.push(tag_byte | FIVE_BITS as u8);
        encode_base128(tag_number, buffer);
    } else {
        buffer.push(tag_byte | tag_number as u8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::{Class, Tag};

    fn plain() -> Options {
        Options::default()
    }

    #[test]
    fn read_definite() {
        let mut pdu = Pdu::from_bytes(EncodingRules::Ber, &[0x02, 0x01, 0x2A]);
        let tlv = pdu.read_tlv(&plain()).unwrap();
        assert_eq!(Tag::INTEGER, tlv.identifier.tag);
        assert_eq!(Length::Definite(1), tlv.length);
        assert_eq!(&[0x2A], tlv.contents);
        assert!(pdu.is_exhausted());
    }

    #[test]
    fn read_indefinite() {
        let mut pdu = Pdu::from_bytes(
            EncodingRules::Ber,
            &[0x30, 0x80, 0x01, 0x01, 0xFF, 0x00, 0x00],
        );
        let tlv = pdu.read_tlv(&plain()).unwrap();
        assert!(tlv.length.is_indefinite());
        assert_eq!(&[0x01, 0x01, 0xFF], tlv.contents);
        assert!(pdu.is_exhausted());
    }

    #[test]
    fn peek_restores_cursor() {
        let pdu = Pdu::from_bytes(EncodingRules::Der, &[0x05, 0x00]);
        let before = pdu.offset();
        let tlv = pdu.peek_tlv(&plain()).unwrap();
        assert_eq!(Tag::NULL, tlv.identifier.tag);
        assert_eq!(before, pdu.offset());
    }

    #[test]
    fn explicit_overlay_requires_constructed() {
        let mut overlay = Options::default();
        overlay.explicit = true;
        overlay.tag = Some(0);

        let mut pdu = Pdu::from_bytes(EncodingRules::Ber, &[0x80, 0x01, 0xFF]);
        let err = pdu.read_tlv(&overlay).unwrap_err();
        assert!(matches!(
            *err.kind,
            crate::error::ErrorKind::Tlv {
                inner: TlvErrorKind::ExpectedConstructedForExplicit
            }
        ));
    }

    #[test]
    fn implicit_override_checks_wire_tag() {
        let mut overlay = Options::default();
        overlay.tag = Some(3);

        // Wire carries [1] where [3] is expected.
        let mut pdu = Pdu::from_bytes(EncodingRules::Ber, &[0x81, 0x01, 0x00]);
        assert!(pdu.read_tlv(&overlay).is_err());

        let mut pdu = Pdu::from_bytes(EncodingRules::Ber, &[0x83, 0x01, 0x00]);
        let tlv = pdu.read_tlv(&overlay).unwrap();
        assert_eq!(Class::Context, tlv.identifier.tag.class);
        assert_eq!(3, tlv.identifier.tag.value);
    }

    #[test]
    fn write_primitive() {
        let mut pdu = Pdu::new(EncodingRules::Der);
        let written = pdu
            .write_tlv(
                Identifier::from_tag(Tag::INTEGER, false),
                &[0x2A],
                &plain(),
            )
            .unwrap();
        assert_eq!(3, written);
        assert_eq!(&[0x02, 0x01, 0x2A], pdu.as_bytes());
    }

    #[test]
    fn write_high_tag() {
        let mut pdu = Pdu::new(EncodingRules::Ber);
        pdu.write_tlv(
            Identifier::new(Class::Private, true, 127),
            &[],
            &plain(),
        )
        .unwrap();
        assert_eq!(&[0xFF, 0x7F, 0x00], pdu.as_bytes());
    }

    #[test]
    fn write_indefinite_on_request() {
        let mut overlay = Options::default();
        overlay.indefinite = true;

        let mut pdu = Pdu::new(EncodingRules::Ber);
        pdu.write_tlv(
            Identifier::from_tag(Tag::SEQUENCE, true),
            &[0x01, 0x01, 0xFF],
            &overlay,
        )
        .unwrap();
        assert_eq!(
            &[0x30, 0x80, 0x01, 0x01, 0xFF, 0x00, 0x00],
            pdu.as_bytes()
        );
    }

    #[test]
    fn cer_constructed_is_always_indefinite() {
        let mut pdu = Pdu::new(EncodingRules::Cer);
        pdu.write_tlv(
            Identifier::from_tag(Tag::SEQUENCE, true),
            &[0x05, 0x00],
            &plain(),
        )
        .unwrap();
        assert_eq!(&[0x30, 0x80, 0x05, 0x00, 0x00, 0x00], pdu.as_bytes());
    }

    #[test]
    fn implicit_write_override() {
        let mut overlay = Options::default();
        overlay.tag = Some(0);

        let mut pdu = Pdu::new(EncodingRules::Der);
        pdu.write_tlv(Identifier::from_tag(Tag::INTEGER, false), &[0x2A], &overlay)
            .unwrap();
        assert_eq!(&[0x80, 0x01, 0x2A], pdu.as_bytes());
    }
}
