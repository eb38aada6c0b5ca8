use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::error::{PrimitiveErrorKind, Result};

/// An `INTEGER` value, stored as a machine integer while it fits and
/// promoted to an arbitrary-precision integer beyond that. Round-trips
/// preserve sign and magnitude either way.
#[derive(Debug, Clone)]
pub enum Integer {
    Native(i64),
    Unbounded(BigInt),
}

impl Integer {
    /// The shortest two's-complement big-endian encoding of the value.
    ///
    /// The top octet is never a redundant `0x00` before a clear MSB nor a
    /// redundant `0xFF` before a set MSB, and zero encodes as a single
    /// `0x00` octet.
    pub fn to_signed_bytes_be(&self) -> Vec<u8> {
        let mut bytes = match self {
            Self::Native(value) => BigInt::from(*value).to_signed_bytes_be(),
            Self::Unbounded(value) => value.to_signed_bytes_be(),
        };

        if bytes.is_empty() {
            bytes.push(0);
        }

        while bytes.len() > 1
            && ((bytes[0] == 0x00 && bytes[1] & 0x80 == 0)
                || (bytes[0] == 0xFF && bytes[1] & 0x80 != 0))
        {
            bytes.remove(0);
        }

        bytes
    }

    /// Decodes a two's-complement big-endian encoding, rejecting empty and
    /// non-minimal content octets.
    pub fn from_signed_bytes_be(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(PrimitiveErrorKind::EmptyInteger.into());
        }

        if bytes.len() > 1
            && ((bytes[0] == 0x00 && bytes[1] & 0x80 == 0)
                || (bytes[0] == 0xFF && bytes[1] & 0x80 != 0))
        {
            return Err(PrimitiveErrorKind::NonMinimalInteger.into());
        }

        if bytes.len() <= 8 {
            let negative = bytes[0] & 0x80 != 0;
            let mut value: i64 = if negative { -1 } else { 0 };
            for byte in bytes {
                value = (value << 8) | i64::from(*byte);
            }
            Ok(Self::Native(value))
        } else {
            Ok(Self::Unbounded(BigInt::from_signed_bytes_be(bytes)))
        }
    }

    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Self::Native(value) => Some(*value),
            Self::Unbounded(value) => value.to_i64(),
        }
    }

    pub fn to_big(&self) -> BigInt {
        match self {
            Self::Native(value) => BigInt::from(*value),
            Self::Unbounded(value) => value.clone(),
        }
    }

    pub fn is_negative(&self) -> bool {
        match self {
            Self::Native(value) => *value < 0,
            Self::Unbounded(value) => value.sign() == num_bigint::Sign::Minus,
        }
    }
}

impl Default for Integer {
    fn default() -> Self {
        Self::Native(0)
    }
}

impl PartialEq for Integer {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Native(lhs), Self::Native(rhs)) => lhs == rhs,
            (lhs, rhs) => lhs.to_big() == rhs.to_big(),
        }
    }
}

impl Eq for Integer {}

impl PartialOrd for Integer {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Integer {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        match (self, other) {
            (Self::Native(lhs), Self::Native(rhs)) => lhs.cmp(rhs),
            (lhs, rhs) => lhs.to_big().cmp(&rhs.to_big()),
        }
    }
}

impl core::fmt::Display for Integer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Native(value) => write!(f, "{value}"),
            Self::Unbounded(value) => write!(f, "{value}"),
        }
    }
}

macro_rules! from_machine {
    ($($int:ty),+ $(,)?) => {
        $(
            impl From<$int> for Integer {
                fn from(value: $int) -> Self {
                    Self::Native(value as i64)
                }
            }
        )+
    }
}

from_machine!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for Integer {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(native) => Self::Native(native),
            Err(_) => Self::Unbounded(BigInt::from(value)),
        }
    }
}

impl From<BigInt> for Integer {
    fn from(value: BigInt) -> Self {
        match value.to_i64() {
            Some(native) => Self::Native(native),
            None => Self::Unbounded(value),
        }
    }
}

/// An `ENUMERATED` value: INTEGER content under tag 10.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Enumerated(pub Integer);

impl Enumerated {
    pub fn to_i64(&self) -> Option<i64> {
        self.0.to_i64()
    }
}

impl<T: Into<Integer>> From<T> for Enumerated {
    fn from(value: T) -> Self {
        Self(value.into())
    }
}

impl core::fmt::Display for Enumerated {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, PrimitiveErrorKind};

    #[test]
    fn minimal_encodings() {
        assert_eq!(vec![0x00], Integer::from(0).to_signed_bytes_be());
        assert_eq!(vec![0x7F], Integer::from(127).to_signed_bytes_be());
        assert_eq!(vec![0x00, 0x80], Integer::from(128).to_signed_bytes_be());
        assert_eq!(vec![0x80], Integer::from(-128).to_signed_bytes_be());
        assert_eq!(vec![0xFF, 0x7F], Integer::from(-129).to_signed_bytes_be());
        assert_eq!(vec![0x01, 0x00], Integer::from(256).to_signed_bytes_be());
    }

    #[test]
    fn decode_sign_extension() {
        assert_eq!(
            Integer::from(-1),
            Integer::from_signed_bytes_be(&[0xFF]).unwrap()
        );
        assert_eq!(
            Integer::from(255),
            Integer::from_signed_bytes_be(&[0x00, 0xFF]).unwrap()
        );
        assert_eq!(
            Integer::from(i64::MIN),
            Integer::from_signed_bytes_be(&[0x80, 0, 0, 0, 0, 0, 0, 0]).unwrap()
        );
    }

    #[test]
    fn rejects_empty_and_padded() {
        assert!(matches!(
            *Integer::from_signed_bytes_be(&[]).unwrap_err().kind,
            ErrorKind::Primitive {
                inner: PrimitiveErrorKind::EmptyInteger
            }
        ));
        assert!(matches!(
            *Integer::from_signed_bytes_be(&[0x00, 0x7F]).unwrap_err().kind,
            ErrorKind::Primitive {
                inner: PrimitiveErrorKind::NonMinimalInteger
            }
        ));
        assert!(matches!(
            *Integer::from_signed_bytes_be(&[0xFF, 0x80]).unwrap_err().kind,
            ErrorKind::Primitive {
                inner: PrimitiveErrorKind::NonMinimalInteger
            }
        ));
    }

    #[test]
    fn promotes_past_machine_width() {
        let mut big = BigInt::from(1);
        big <<= 96;
        let value = Integer::from(big.clone());
        assert!(matches!(value, Integer::Unbounded(_)));

        let bytes = value.to_signed_bytes_be();
        let back = Integer::from_signed_bytes_be(&bytes).unwrap();
        assert_eq!(value, back);
        assert_eq!(big, back.to_big());
    }

    #[test]
    fn numeric_equality_across_representations() {
        assert_eq!(
            Integer::Native(42),
            Integer::Unbounded(BigInt::from(42)),
        );
    }
}
