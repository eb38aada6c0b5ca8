//! # Primitive content codecs
//!
//! One module per ASN.1 primitive family. Each converts between a typed
//! value and the content octets of its TLV; tagging, length octets, and
//! CER segmentation are layered on by the callers in this module and the
//! codec dispatch layer.

pub(crate) mod bitstring;
pub(crate) mod octets;
pub(crate) mod oid;
pub(crate) mod real;
pub(crate) mod temporal;

use crate::error::{PrimitiveErrorKind, Result};
use crate::rules::EncodingRules;

/// BOOLEAN content octets: `0x00` for FALSE, `0xFF` for TRUE.
pub(crate) fn encode_boolean(value: bool) -> [u8; 1] {
    [if value { 0xFF } else { 0x00 }]
}

/// Decodes BOOLEAN content. BER accepts any non-zero octet as TRUE; CER
/// and DER require exactly `0xFF`.
pub(crate) fn decode_boolean(contents: &[u8], rule: EncodingRules) -> Result<bool> {
    crate::error::Error::assert_length(1, contents.len())?;
    match contents[0] {
        0x00 => Ok(false),
        0xFF => Ok(true),
        _ if rule.is_ber() => Ok(true),
        value => Err(PrimitiveErrorKind::InvalidBool { value }.into()),
    }
}

/// Decodes NULL content, which must be empty.
pub(crate) fn decode_null(contents: &[u8]) -> Result<()> {
    crate::error::Error::assert_length(0, contents.len())
}
