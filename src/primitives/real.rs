//! REAL content codec: the X.690 binary form (bases 2, 8, 16 on decode,
//! canonical base 2 on encode) and the ISO 6093 decimal forms NR1–NR3.

use crate::error::{intern, Error, PrimitiveErrorKind, Result};
use crate::types::Integer;

const PLUS_INFINITY: u8 = 0x40;
const MINUS_INFINITY: u8 = 0x41;
const NOT_A_NUMBER: u8 = 0x42;
const MINUS_ZERO: u8 = 0x43;

fn invalid(msg: &str) -> Error {
    PrimitiveErrorKind::InvalidReal { msg: intern(msg) }.into()
}

/// Which content representation [`encode_real`] produces for finite,
/// nonzero values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RealForm {
    /// X.690 §8.5 base-2 binary form; canonical and the default.
    #[default]
    Binary,
    /// ISO 6093 NR1: an integer such as `42`.
    Nr1,
    /// ISO 6093 NR2: a decimal such as `42.5`.
    Nr2,
    /// ISO 6093 NR3: an exponent form such as `4.25E1`.
    Nr3,
}

/// Encodes `value` as REAL content octets.
pub(crate) fn encode_real(value: f64, form: RealForm) -> Result<Vec<u8>> {
    if value.is_nan() {
        return Ok(vec![NOT_A_NUMBER]);
    }
    if value.is_infinite() {
        return Ok(vec![if value > 0.0 { PLUS_INFINITY } else { MINUS_INFINITY }]);
    }
    if value == 0.0 {
        return Ok(if value.is_sign_negative() {
            vec![MINUS_ZERO]
        } else {
            Vec::new()
        });
    }

    match form {
        RealForm::Binary => Ok(encode_binary(value)),
        RealForm::Nr1 => encode_nr1(value),
        RealForm::Nr2 => encode_nr2(value),
        RealForm::Nr3 => Ok(encode_nr3(value)),
    }
}

/// Base-2 mantissa and exponent with the mantissa shifted until odd, the
/// canonical form required by CER and DER.
fn encode_binary(value: f64) -> Vec<u8> {
    let bits = value.to_bits();
    let negative = bits >> 63 == 1;
    let biased = ((bits >> 52) & 0x7FF) as i64;
    let fraction = bits & ((1u64 << 52) - 1);

    let (mut mantissa, mut exponent) = if biased == 0 {
        // Subnormal.
        (fraction, -1074i64)
    } else {
        (fraction | (1 << 52), biased - 1075)
    };

    while mantissa & 1 == 0 {
        mantissa >>= 1;
        exponent += 1;
    }

    let exponent_octets = Integer::from(exponent).to_signed_bytes_be();
    debug_assert!(exponent_octets.len() <= 2);

    let mut first = 0x80u8;
    if negative {
        first |= 0x40;
    }
    first |= (exponent_octets.len() as u8) - 1;

    let mut contents = vec![first];
    contents.extend_from_slice(&exponent_octets);

    let mantissa_octets = mantissa.to_be_bytes();
    let start = mantissa_octets
        .iter()
        .position(|&byte| byte != 0)
        .unwrap_or(mantissa_octets.len() - 1);
    contents.extend_from_slice(&mantissa_octets[start..]);
    contents
}

fn encode_nr1(value: f64) -> Result<Vec<u8>> {
    if value.fract() != 0.0 {
        return Err(invalid("value is not an integer, NR1 cannot represent it"));
    }
    let mut contents = vec![0x01];
    contents.extend_from_slice(format!("{}", value as i64).as_bytes());
    Ok(contents)
}

fn encode_nr2(value: f64) -> Result<Vec<u8>> {
    let text = format!("{value}");
    if text.contains('e') || text.contains('E') {
        return Err(invalid("value needs an exponent, NR2 cannot represent it"));
    }
    let mut contents = vec![0x02];
    contents.extend_from_slice(text.as_bytes());
    if !text.contains('.') {
        contents.extend_from_slice(b".0");
    }
    Ok(contents)
}

fn encode_nr3(value: f64) -> Vec<u8> {
    let mut contents = vec![0x03];
    contents.extend_from_slice(format!("{value:E}").as_bytes());
    contents
}

/// Decodes REAL content octets in any of the wire forms.
pub(crate) fn decode_real(contents: &[u8]) -> Result<f64> {
    let first = match contents.first() {
        None => return Ok(0.0),
        Some(&first) => first,
    };

    if first & 0x80 != 0 {
        return decode_binary(first, &contents[1..]);
    }

    match first & 0xC0 {
        0x40 => match first {
            PLUS_INFINITY => Ok(f64::INFINITY),
            MINUS_INFINITY => Ok(f64::NEG_INFINITY),
            NOT_A_NUMBER => Ok(f64::NAN),
            MINUS_ZERO => Ok(-0.0),
            _ => Err(invalid("reserved special value")),
        },
        0x00 => decode_decimal(first, &contents[1..]),
        _ => Err(invalid("reserved first content octet")),
    }
}

fn decode_binary(first: u8, rest: &[u8]) -> Result<f64> {
    let sign = if first & 0x40 != 0 { -1.0 } else { 1.0 };
    let base_bits_per_unit = match (first >> 4) & 0x3 {
        0 => 1, // base 2
        1 => 3, // base 8
        2 => 4, // base 16
        _ => return Err(invalid("reserved base")),
    };
    let scale = i64::from((first >> 2) & 0x3);

    let (exponent_octets, mantissa_octets) = match first & 0x3 {
        code @ 0..=2 => {
            let count = usize::from(code) + 1;
            if rest.len() < count {
                return Err(invalid("truncated exponent"));
            }
            rest.split_at(count)
        }
        _ => {
            let count = usize::from(*rest.first().ok_or_else(|| invalid("truncated exponent"))?);
            if count == 0 || rest.len() < count + 1 {
                return Err(invalid("malformed exponent length"));
            }
            rest[1..].split_at(count)
        }
    };

    if exponent_octets.len() > 8 {
        return Err(invalid("exponent wider than supported"));
    }
    let exponent = Integer::from_signed_bytes_be(exponent_octets)
        .map_err(|_| invalid("malformed exponent"))?
        .to_i64()
        .ok_or_else(|| invalid("exponent wider than supported"))?;

    if mantissa_octets.is_empty() {
        return Err(invalid("missing mantissa"));
    }
    let mut mantissa = 0.0f64;
    for byte in mantissa_octets {
        mantissa = mantissa * 256.0 + f64::from(*byte);
    }

    let power = exponent
        .checked_mul(base_bits_per_unit)
        .and_then(|scaled| scaled.checked_add(scale))
        .ok_or_else(|| invalid("exponent wider than supported"))?;
    let power = i32::try_from(power).map_err(|_| invalid("exponent wider than supported"))?;

    Ok(sign * mantissa * 2f64.powi(power))
}

fn decode_decimal(first: u8, rest: &[u8]) -> Result<f64> {
    if !matches!(first & 0x3F, 1..=3) {
        return Err(invalid("reserved decimal representation"));
    }

    let text = core::str::from_utf8(rest).map_err(|_| invalid("decimal content is not ASCII"))?;
    let normalised: String = text
        .trim_matches(' ')
        .chars()
        .map(|ch| if ch == ',' { '.' } else { ch })
        .collect();

    normalised
        .parse::<f64>()
        .map_err(|_| invalid("malformed decimal content"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary(value: f64) -> Vec<u8> {
        encode_real(value, RealForm::Binary).unwrap()
    }

    #[test]
    fn zero_and_specials() {
        assert!(binary(0.0).is_empty());
        assert_eq!(vec![MINUS_ZERO], binary(-0.0));
        assert_eq!(vec![PLUS_INFINITY], binary(f64::INFINITY));
        assert_eq!(vec![MINUS_INFINITY], binary(f64::NEG_INFINITY));
        assert_eq!(vec![NOT_A_NUMBER], binary(f64::NAN));

        assert_eq!(0.0, decode_real(&[]).unwrap());
        assert!(decode_real(&[MINUS_ZERO]).unwrap().is_sign_negative());
        assert!(decode_real(&[NOT_A_NUMBER]).unwrap().is_nan());
    }

    #[test]
    fn canonical_binary_vectors() {
        // 10.0 = 5 × 2¹
        assert_eq!(vec![0x80, 0x01, 0x05], binary(10.0));
        // -0.5 = -1 × 2⁻¹
        assert_eq!(vec![0xC0, 0xFF, 0x01], binary(-0.5));
        // 1.0 = 1 × 2⁰
        assert_eq!(vec![0x80, 0x00, 0x01], binary(1.0));
    }

    #[test]
    fn binary_round_trip() {
        for value in [
            1.0, -1.0, 0.5, 10.0, 0.1, -123.456, 3.14159265358979, 1e100, -1e-100,
            f64::MIN_POSITIVE, f64::MAX,
        ] {
            let bytes = binary(value);
            assert_eq!(value, decode_real(&bytes).unwrap(), "value {value}");
        }
    }

    #[test]
    fn decodes_other_bases() {
        // 16¹ with base-16 bits set.
        assert_eq!(16.0, decode_real(&[0xA0, 0x01, 0x01]).unwrap());
        // 8¹ with base-8 bits set.
        assert_eq!(8.0, decode_real(&[0x90, 0x01, 0x01]).unwrap());
        // Scale factor of 2 doubles twice: 1 × 2² × 2¹.
        assert_eq!(8.0, decode_real(&[0x88, 0x01, 0x01]).unwrap());
    }

    #[test]
    fn decimal_forms() {
        assert_eq!(vec![0x01, b'4', b'2'], encode_real(42.0, RealForm::Nr1).unwrap());
        assert!(encode_real(42.5, RealForm::Nr1).is_err());

        assert_eq!(
            b"\x0242.5".to_vec(),
            encode_real(42.5, RealForm::Nr2).unwrap()
        );

        let nr3 = encode_real(4250.0, RealForm::Nr3).unwrap();
        assert_eq!(0x03, nr3[0]);
        assert_eq!(4250.0, decode_real(&nr3).unwrap());

        assert_eq!(42.0, decode_real(b"\x0142").unwrap());
        assert_eq!(-3.25, decode_real(b"\x02-3,25").unwrap());
        assert_eq!(1500.0, decode_real(b"\x031.5E3").unwrap());
        assert!(decode_real(b"\x05bogus").is_err());
    }

    #[test]
    fn malformed_binary_rejected() {
        // Reserved base bits.
        assert!(decode_real(&[0xB0, 0x01, 0x01]).is_err());
        // Truncated exponent.
        assert!(decode_real(&[0x81]).is_err());
        // Missing mantissa.
        assert!(decode_real(&[0x80, 0x01]).is_err());
    }
}
