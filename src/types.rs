//! # ASN.1 Data Types
//!
//! Rust representations of the ASN.1 value set handled by the codec,
//! renamed to use ASN.1's terminology.

mod any;
pub(crate) mod date;
pub(crate) mod integer;
pub(crate) mod oid;
pub(crate) mod strings;

pub use self::{
    any::Any,
    date::Duration,
    integer::{Enumerated, Integer},
    oid::{ObjectIdentifier, RelativeOid},
    strings::{
        BmpString, GeneralString, GraphicString, Ia5String, NumericString, PrintableString,
        TeletexString, UniversalString, VisibleString,
    },
};

/// The `BIT STRING` type.
pub type BitString = bitvec::vec::BitVec<u8, bitvec::order::Msb0>;
/// The `OCTET STRING` type.
pub type OctetString = Vec<u8>;
/// The `UTF8String` type.
pub type Utf8String = String;
/// The `UTCTime` type.
pub type UtcTime = chrono::DateTime<chrono::Utc>;
/// The `GeneralizedTime` type.
pub type GeneralizedTime = chrono::DateTime<chrono::FixedOffset>;
/// The `DATE` type.
pub type Date = chrono::NaiveDate;
/// The `DATE-TIME` type.
pub type DateTime = chrono::NaiveDateTime;
/// The `TIME-OF-DAY` type.
pub type TimeOfDay = chrono::NaiveTime;
