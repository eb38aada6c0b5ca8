//! Parsers for identifier and length octets.

use nom::bytes::complete::{take, take_while};

use crate::error::{intern, Error, Result, TlvErrorKind};
use crate::identifier::Identifier;
use crate::rules::EncodingRules;
use crate::tag::Class;
use crate::wire::Length;

/// The maximum number of continuation octets in the high-tag-number form.
const MAX_TAG_OCTETS: usize = 5;

/// Parses the identifier octets, including the high-tag-number form.
///
/// Leading octet layout: bits 7-6 class, bit 5 the constructed flag, bits
/// 4-0 the tag field, where all five set means the tag number follows in
/// base-128.
pub(crate) fn parse_identifier(input: &[u8]) -> Result<(&[u8], Identifier)> {
    let (input, leading) = take(1usize)(input).map_err(Error::map_nom::<&[u8]>)?;
    let leading = leading[0];

    let tag_field = u32::from(leading & 0x1F);
    let constructed = leading & 0x20 == 0x20;
    let class = Class::from_u8(leading >> 6);

    if tag_field < 0x1F {
        return Ok((input, Identifier::new(class, constructed, tag_field)));
    }

    let (input, body) =
        take_while::<_, _, nom::error::Error<&[u8]>>(|i: u8| i & 0x80 != 0)(input)
            .map_err(Error::map_nom)?;
    let (input, end) = take::<_, _, nom::error::Error<&[u8]>>(1usize)(input)
        .map_err(|_: nom::Err<nom::error::Error<&[u8]>>| {
            Error::from(TlvErrorKind::TruncatedTagNumber)
        })?;

    if body.len() + 1 > MAX_TAG_OCTETS {
        return Err(TlvErrorKind::TagTooLong.into());
    }

    let mut number: u64 = 0;
    for byte in body {
        number = (number << 7) | u64::from(byte & 0x7F);
    }
    // The end octet needs no mask: its MSB is known to be zero.
    number = (number << 7) | u64::from(end[0]);

    let number = u32::try_from(number).map_err(|_| Error::from(TlvErrorKind::TagTooLong))?;

    Ok((input, Identifier::new(class, constructed, number)))
}

/// Parses the length octets, applying the canonical-form checks of `rule`.
pub(crate) fn parse_length(
    input: &[u8],
    rule: EncodingRules,
    is_constructed: bool,
) -> Result<(&[u8], Length)> {
    let (input, octet) = take(1usize)(input).map_err(Error::map_nom::<&[u8]>)?;
    let first = octet[0];

    if first < 0x80 {
        return Ok((input, Length::Definite(first as usize)));
    }

    if first == 0x80 {
        if !rule.allows_indefinite() || !is_constructed {
            return Err(TlvErrorKind::IndefiniteProhibited.into());
        }
        return Ok((input, Length::Indefinite));
    }

    let count = (first & 0x7F) as usize;
    if count == 0x7F {
        return Err(TlvErrorKind::MalformedLength {
            msg: intern("reserved length octet 0xFF"),
        }
        .into());
    }
    if count > 4 {
        return Err(TlvErrorKind::MalformedLength {
            msg: intern("length of length exceeds four octets"),
        }
        .into());
    }

    let (input, octets) = take(count)(input).map_err(Error::map_nom::<&[u8]>)?;

    if rule.requires_minimal_length() && octets[0] == 0 {
        return Err(TlvErrorKind::LeadingZeroLength.into());
    }

    let mut length: usize = 0;
    for byte in octets {
        length = (length << 8) | usize::from(*byte);
    }

    if rule.requires_minimal_length() && length < 0x80 {
        return Err(TlvErrorKind::NonMinimalLength { length }.into());
    }

    Ok((input, Length::Definite(length)))
}

/// Scans `input` for the end-of-contents octets closing the indefinite
/// encoding that began immediately before `input`, honoring nested
/// indefinite bodies. Returns the offset of the outermost closing EOC.
pub(crate) fn scan_end_of_contents(input: &[u8]) -> Result<usize> {
    let mut offset = 0usize;
    let mut depth = 0usize;

    loop {
        let remaining = &input[offset..];

        if remaining.len() >= 2 && remaining[0] == 0 && remaining[1] == 0 {
            if depth == 0 {
                return Ok(offset);
            }
            depth -= 1;
            offset += 2;
            continue;
        }

        if remaining.is_empty() {
            return Err(TlvErrorKind::MissingEndOfContents.into());
        }

        let (rest, identifier) =
            parse_identifier(remaining).map_err(|_| Error::from(TlvErrorKind::MissingEndOfContents))?;
        let (rest, length) = parse_length(rest, EncodingRules::Ber, identifier.is_constructed())
            .map_err(|_| Error::from(TlvErrorKind::MissingEndOfContents))?;
        let header = remaining.len() - rest.len();

        match length {
            Length::Definite(len) => {
                let next = offset + header + len;
                if next > input.len() {
                    return Err(TlvErrorKind::MissingEndOfContents.into());
                }
                offset = next;
            }
            Length::Indefinite => {
                depth += 1;
                offset += header;
            }
        }
    }
}
