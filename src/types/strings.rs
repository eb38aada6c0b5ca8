//! Restricted-character string types and their byte-set validators.
//!
//! Every subtype validates its repertoire when constructed from bytes and
//! again during decode. Membership is fixed by the tables in this module,
//! never by host-locale character classes.

use crate::error::{intern, PrimitiveErrorKind, Result};
use crate::tag::Tag;

fn conversion_error(tag: Tag, msg: &str) -> crate::error::Error {
    PrimitiveErrorKind::StringConversion {
        tag,
        msg: intern(msg),
    }
    .into()
}

/// `NumericString`: digits and space.
pub(crate) fn validate_numeric(bytes: &[u8]) -> Result<()> {
    for byte in bytes {
        if !matches!(byte, b'0'..=b'9' | b' ') {
            return Err(conversion_error(
                Tag::NUMERIC_STRING,
                "only digits and space are permitted",
            ));
        }
    }
    Ok(())
}

/// `PrintableString`: Latin letters, digits, space, and `'()+,-./:=?`.
pub(crate) fn validate_printable(bytes: &[u8]) -> Result<()> {
    for byte in bytes {
        if !matches!(
            byte,
            b'A'..=b'Z'
                | b'a'..=b'z'
                | b'0'..=b'9'
                | b' '
                | b'\''
                | b'('
                | b')'
                | b'+'
                | b','
                | b'-'
                | b'.'
                | b'/'
                | b':'
                | b'='
                | b'?'
        ) {
            return Err(conversion_error(
                Tag::PRINTABLE_STRING,
                "byte outside the PrintableString repertoire",
            ));
        }
    }
    Ok(())
}

/// `IA5String`: the 128 characters of ISO 646 / ASCII.
pub(crate) fn validate_ia5(bytes: &[u8]) -> Result<()> {
    if bytes.iter().any(|byte| *byte > 0x7F) {
        return Err(conversion_error(
            Tag::IA5_STRING,
            "byte outside 7-bit ASCII",
        ));
    }
    Ok(())
}

/// `VisibleString`: printable ASCII, 0x20 through 0x7E.
pub(crate) fn validate_visible(bytes: &[u8]) -> Result<()> {
    if bytes.iter().any(|byte| !(0x20..=0x7E).contains(byte)) {
        return Err(conversion_error(
            Tag::VISIBLE_STRING,
            "byte outside printable ASCII",
        ));
    }
    Ok(())
}

/// `TeletexString` (T61String): the T.61 repertoire as a fixed table.
///
/// ASCII graphics minus the code points T.61 leaves undefined, a small set
/// of format effectors, and the accent/extended rows 0xA0..=0xFF.
pub(crate) fn validate_t61(bytes: &[u8]) -> Result<()> {
    fn allowed(byte: u8) -> bool {
        match byte {
            0x08 | 0x0A | 0x0B | 0x0D | 0x0E | 0x0F | 0x19 | 0x1A | 0x1B | 0x1D | 0x1F => true,
            0x23 | 0x24 | 0x5C | 0x5E | 0x60 | 0x7B | 0x7D | 0x7E => false,
            0x20..=0x7E => true,
            0xA0..=0xFF => true,
            _ => false,
        }
    }

    if bytes.iter().any(|byte| !allowed(*byte)) {
        return Err(conversion_error(
            Tag::TELETEX_STRING,
            "byte outside the T.61 repertoire",
        ));
    }
    Ok(())
}

/// `GraphicString`: graphic (non-control) characters.
pub(crate) fn validate_graphic(bytes: &[u8]) -> Result<()> {
    if bytes
        .iter()
        .any(|byte| *byte < 0x20 || *byte == 0x7F || (0x80..=0x9F).contains(byte))
    {
        return Err(conversion_error(
            Tag::GRAPHIC_STRING,
            "control byte in GraphicString",
        ));
    }
    Ok(())
}

/// `GeneralString`: any byte.
pub(crate) fn validate_general(_bytes: &[u8]) -> Result<()> {
    Ok(())
}

/// `UTF8String`: well-formed UTF-8.
pub(crate) fn validate_utf8(bytes: &[u8]) -> Result<()> {
    core::str::from_utf8(bytes)
        .map(drop)
        .map_err(|_| conversion_error(Tag::UTF8_STRING, "malformed UTF-8"))
}

/// `BMPString`: big-endian UTF-16 code units with valid surrogate pairing.
pub(crate) fn validate_bmp(bytes: &[u8]) -> Result<()> {
    decode_utf16_be(bytes).map(drop)
}

pub(crate) fn decode_utf16_be(bytes: &[u8]) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(conversion_error(
            Tag::BMP_STRING,
            "odd number of UTF-16 bytes",
        ));
    }

    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();

    char::decode_utf16(units.iter().copied())
        .collect::<Result<String, _>>()
        .map_err(|_| conversion_error(Tag::BMP_STRING, "unpaired surrogate"))
}

/// `UniversalString`: big-endian UTF-32 code units that are Unicode scalar
/// values.
pub(crate) fn validate_universal(bytes: &[u8]) -> Result<()> {
    decode_utf32_be(bytes).map(drop)
}

pub(crate) fn decode_utf32_be(bytes: &[u8]) -> Result<String> {
    if bytes.len() % 4 != 0 {
        return Err(conversion_error(
            Tag::UNIVERSAL_STRING,
            "UTF-32 content not a multiple of four bytes",
        ));
    }

    bytes
        .chunks_exact(4)
        .map(|quad| {
            let unit = u32::from_be_bytes([quad[0], quad[1], quad[2], quad[3]]);
            char::from_u32(unit)
                .ok_or_else(|| conversion_error(Tag::UNIVERSAL_STRING, "invalid Unicode scalar"))
        })
        .collect()
}

/// The decode-time byte-set validator for a restricted-string tag.
/// Unknown string tags validate as UTF-8.
pub(crate) fn validator_for(tag: Tag) -> fn(&[u8]) -> Result<()> {
    match tag {
        Tag::NUMERIC_STRING => validate_numeric,
        Tag::PRINTABLE_STRING => validate_printable,
        Tag::IA5_STRING => validate_ia5,
        Tag::VISIBLE_STRING => validate_visible,
        Tag::TELETEX_STRING => validate_t61,
        Tag::GRAPHIC_STRING => validate_graphic,
        Tag::GENERAL_STRING => validate_general,
        Tag::BMP_STRING => validate_bmp,
        Tag::UNIVERSAL_STRING => validate_universal,
        _ => validate_utf8,
    }
}

macro_rules! ascii_string {
    ($(#[$doc:meta])* $name:ident, $validator:path) => {
        $(#[$doc])*
        #[derive(Debug, Default, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            /// Constructs the string from raw bytes, validating the
            /// repertoire.
            pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
                $validator(bytes)?;
                // The validator admits ASCII only, so UTF-8 holds.
                Ok(Self(String::from_utf8(bytes.to_vec()).expect("validated ASCII")))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn as_bytes(&self) -> &[u8] {
                self.0.as_bytes()
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl TryFrom<&str> for $name {
            type Error = crate::error::Error;

            fn try_from(value: &str) -> Result<Self> {
                Self::from_bytes(value.as_bytes())
            }
        }

        impl TryFrom<String> for $name {
            type Error = crate::error::Error;

            fn try_from(value: String) -> Result<Self> {
                $validator(value.as_bytes())?;
                Ok(Self(value))
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

ascii_string! {
    /// A string of digits and spaces.
    NumericString, validate_numeric
}

ascii_string! {
    /// A string restricted to the characters of X.680 table 10.
    PrintableString, validate_printable
}

ascii_string! {
    /// A string of ISO 646 (ASCII) characters.
    Ia5String, validate_ia5
}

ascii_string! {
    /// A string of printable ASCII characters.
    VisibleString, validate_visible
}

macro_rules! byte_string {
    ($(#[$doc:meta])* $name:ident, $validator:path) => {
        $(#[$doc])*
        #[derive(Debug, Default, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
        pub struct $name(Vec<u8>);

        impl $name {
            pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
                $validator(bytes)?;
                Ok(Self(bytes.to_vec()))
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            pub fn into_bytes(self) -> Vec<u8> {
                self.0
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = crate::error::Error;

            fn try_from(value: &[u8]) -> Result<Self> {
                Self::from_bytes(value)
            }
        }

        impl TryFrom<Vec<u8>> for $name {
            type Error = crate::error::Error;

            fn try_from(value: Vec<u8>) -> Result<Self> {
                $validator(&value)?;
                Ok(Self(value))
            }
        }
    };
}

byte_string! {
    /// A string over the T.61 (Teletex) repertoire.
    TeletexString, validate_t61
}

byte_string! {
    /// A string of graphic (non-control) characters.
    GraphicString, validate_graphic
}

byte_string! {
    /// An unrestricted byte string with a string tag.
    GeneralString, validate_general
}

/// A string of Basic Multilingual Plane characters, carried on the wire as
/// big-endian UTF-16.
#[derive(Debug, Default, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct BmpString(String);

impl BmpString {
    pub fn from_utf16_be(bytes: &[u8]) -> Result<Self> {
        decode_utf16_be(bytes).map(Self)
    }

    pub fn to_utf16_be(&self) -> Vec<u8> {
        self.0
            .encode_utf16()
            .flat_map(|unit| unit.to_be_bytes())
            .collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BmpString {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl core::fmt::Display for BmpString {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A string of Unicode scalar values, carried on the wire as big-endian
/// UTF-32.
#[derive(Debug, Default, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct UniversalString(String);

impl UniversalString {
    pub fn from_utf32_be(bytes: &[u8]) -> Result<Self> {
        decode_utf32_be(bytes).map(Self)
    }

    pub fn to_utf32_be(&self) -> Vec<u8> {
        self.0
            .chars()
            .flat_map(|ch| (ch as u32).to_be_bytes())
            .collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UniversalString {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl core::fmt::Display for UniversalString {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}
