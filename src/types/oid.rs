use core::str::FromStr;

use num_bigint::BigUint;

use crate::error::{intern, Error, PrimitiveErrorKind, Result};

pub(crate) const MAX_OID_FIRST_ARC: u32 = 2;
pub(crate) const MAX_OID_SECOND_ARC: u32 = 39;

fn invalid(msg: &str) -> Error {
    PrimitiveErrorKind::InvalidObjectIdentifier { msg: intern(msg) }.into()
}

/// An `OBJECT IDENTIFIER`: two or more non-negative arcs, preserved at
/// arbitrary precision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectIdentifier(Vec<BigUint>);

impl ObjectIdentifier {
    /// Creates a new object identifier from `arcs`.
    ///
    /// The root arc must be 0, 1, or 2, and beneath roots 0 and 1 the
    /// second arc must be below 40.
    pub fn new(arcs: Vec<BigUint>) -> Result<Self> {
        if arcs.len() < 2 {
            return Err(invalid("at least two arcs are required"));
        }

        let first = &arcs[0];
        if *first > BigUint::from(MAX_OID_FIRST_ARC) {
            return Err(invalid("the root arc must be 0, 1, or 2"));
        }
        if *first < BigUint::from(2u32) && arcs[1] > BigUint::from(MAX_OID_SECOND_ARC) {
            return Err(invalid("the second arc must be below 40 under roots 0 and 1"));
        }

        Ok(Self(arcs))
    }

    pub fn arcs(&self) -> &[BigUint] {
        &self.0
    }
}

impl Default for ObjectIdentifier {
    /// The placeholder identifier `0.0`.
    fn default() -> Self {
        Self(vec![BigUint::default(), BigUint::default()])
    }
}

impl TryFrom<&[u32]> for ObjectIdentifier {
    type Error = Error;

    fn try_from(arcs: &[u32]) -> Result<Self> {
        Self::new(arcs.iter().copied().map(BigUint::from).collect())
    }
}

impl<const N: usize> TryFrom<[u32; N]> for ObjectIdentifier {
    type Error = Error;

    fn try_from(arcs: [u32; N]) -> Result<Self> {
        Self::try_from(&arcs[..])
    }
}

impl FromStr for ObjectIdentifier {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        Self::new(parse_dotted(text)?)
    }
}

impl core::fmt::Display for ObjectIdentifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        display_dotted(&self.0, f)
    }
}

/// A `RELATIVE-OID`: one or more non-negative arcs with no root
/// restrictions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelativeOid(Vec<BigUint>);

impl RelativeOid {
    pub fn new(arcs: Vec<BigUint>) -> Result<Self> {
        if arcs.is_empty() {
            return Err(invalid("at least one arc is required"));
        }
        Ok(Self(arcs))
    }

    pub fn arcs(&self) -> &[BigUint] {
        &self.0
    }
}

impl Default for RelativeOid {
    /// The placeholder identifier `0`.
    fn default() -> Self {
        Self(vec![BigUint::default()])
    }
}

impl TryFrom<&[u32]> for RelativeOid {
    type Error = Error;

    fn try_from(arcs: &[u32]) -> Result<Self> {
        Self::new(arcs.iter().copied().map(BigUint::from).collect())
    }
}

impl<const N: usize> TryFrom<[u32; N]> for RelativeOid {
    type Error = Error;

    fn try_from(arcs: [u32; N]) -> Result<Self> {
        Self::try_from(&arcs[..])
    }
}

impl FromStr for RelativeOid {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        Self::new(parse_dotted(text)?)
    }
}

impl core::fmt::Display for RelativeOid {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        display_dotted(&self.0, f)
    }
}

fn parse_dotted(text: &str) -> Result<Vec<BigUint>> {
    text.split('.')
        .map(|arc| {
            BigUint::from_str(arc).map_err(|_| invalid("arcs must be non-negative integers"))
        })
        .collect()
}

fn display_dotted(arcs: &[BigUint], f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    for (index, arc) in arcs.iter().enumerate() {
        if index > 0 {
            write!(f, ".")?;
        }
        write!(f, "{arc}")?;
    }
    Ok(())
}
