//! Error types shared by every layer of the codec.
//!
//! All fallible operations in this crate return [`Error`]. The error kind
//! taxonomy is closed: every failure belongs to exactly one of the ten
//! variants of [`ErrorKind`], and enclosing operations propagate errors
//! unchanged so the originating kind reaches the caller.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use snafu::Snafu;

use crate::tag::{Class, Tag};

/// Detail strings are interned so that identical messages share a single
/// allocation for the lifetime of the process.
static MESSAGES: Lazy<Mutex<HashSet<Arc<str>>>> = Lazy::new(|| Mutex::new(HashSet::new()));

pub(crate) fn intern(message: &str) -> Arc<str> {
    let mut table = MESSAGES.lock().expect("message interner poisoned");
    if let Some(existing) = table.get(message) {
        return existing.clone();
    }
    let entry: Arc<str> = Arc::from(message);
    table.insert(entry.clone());
    entry
}

/// The error type for every encode, decode, and registration operation.
#[derive(Debug, Clone)]
pub struct Error {
    /// The kind of error received.
    pub kind: Box<ErrorKind>,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for Error {}

impl Error {
    #[must_use]
    pub fn from_kind(kind: ErrorKind) -> Self {
        Self {
            kind: Box::new(kind),
        }
    }

    /// An uncategorised failure with a free-form message.
    #[must_use]
    pub fn custom(msg: impl AsRef<str>) -> Self {
        Self::from_kind(ErrorKind::General {
            msg: intern(msg.as_ref()),
        })
    }

    /// A constraint violation raised by a [`crate::constraints::Constraint`].
    #[must_use]
    pub fn constraint_violation(name: impl AsRef<str>, msg: impl AsRef<str>) -> Self {
        Self::from_kind(ErrorKind::Constraint {
            name: intern(name.as_ref()),
            msg: intern(msg.as_ref()),
        })
    }

    /// Checks that a primitive's content length matches, and fails with a
    /// `Primitive` kind if not.
    pub fn assert_length(expected: usize, actual: usize) -> Result<(), Error> {
        if expected == actual {
            Ok(())
        } else {
            Err(PrimitiveErrorKind::MismatchedLength { expected, actual }.into())
        }
    }

    /// Checks that a parsed tag matches the expected tag.
    pub fn assert_tag(expected: Tag, actual: Tag) -> Result<(), Error> {
        if expected.value == actual.value {
            if expected.class == actual.class {
                Ok(())
            } else {
                Err(ClassErrorKind::Mismatched {
                    expected: expected.class,
                    actual: actual.class,
                }
                .into())
            }
        } else {
            Err(TlvErrorKind::MismatchedTag { expected, actual }.into())
        }
    }

    pub(crate) fn map_nom<T>(error: nom::Err<nom::error::Error<T>>) -> Error {
        match error {
            nom::Err::Incomplete(_) => TlvErrorKind::Truncated.into(),
            _ => TlvErrorKind::Parser.into(),
        }
    }
}

/// The closed taxonomy of error kinds. Each variant wraps the detail of one
/// subsystem; the taxonomy survives across the public API unchanged.
#[derive(Snafu, Debug, Clone)]
#[snafu(visibility(pub))]
#[non_exhaustive]
pub enum ErrorKind {
    /// A native-type adapter failed to project or construct a value.
    #[snafu(display("adapter error: {inner}"))]
    Adapter {
        /// The adapter-specific failure.
        inner: AdapterErrorKind,
    },

    /// A CHOICE could not resolve an alternative.
    #[snafu(display("choice error: {inner}"))]
    Choice {
        /// The choice-specific failure.
        inner: ChoiceErrorKind,
    },

    /// A tag class was invalid or did not match.
    #[snafu(display("class error: {inner}"))]
    Class {
        /// The class-specific failure.
        inner: ClassErrorKind,
    },

    /// Codec dispatch failed: no codec is registered for a type, or a value
    /// of the wrong dynamic type was supplied.
    #[snafu(display("codec error: {inner}"))]
    Codec {
        /// The dispatch-specific failure.
        inner: CodecErrorKind,
    },

    /// A SEQUENCE, SET, SEQUENCE OF, SET OF, or extension decode failed.
    #[snafu(display("composite error: {inner}"))]
    Composite {
        /// The composite-specific failure.
        inner: CompositeErrorKind,
    },

    /// A constraint predicate rejected a value.
    #[snafu(display("constraint `{name}` violated: {msg}"))]
    Constraint {
        /// The name of the violated constraint.
        name: Arc<str>,
        /// Why the value was rejected.
        msg: Arc<str>,
    },

    /// An uncategorised failure.
    #[snafu(display("{msg}"))]
    General {
        /// The error's message.
        msg: Arc<str>,
    },

    /// A field annotation could not be parsed into `Options`.
    #[snafu(display("options error: {inner}"))]
    Options {
        /// The options-specific failure.
        inner: OptionsErrorKind,
    },

    /// A primitive value's content octets were malformed.
    #[snafu(display("primitive error: {inner}"))]
    Primitive {
        /// The primitive-specific failure.
        inner: PrimitiveErrorKind,
    },

    /// The TLV layer rejected identifier or length octets.
    #[snafu(display("TLV error: {inner}"))]
    Tlv {
        /// The TLV-specific failure.
        inner: TlvErrorKind,
    },
}

macro_rules! impl_from {
    ($variant:ident, $kind:ty) => {
        impl From<$kind> for Error {
            fn from(inner: $kind) -> Self {
                Error::from_kind(ErrorKind::$variant { inner })
            }
        }

        impl From<$kind> for ErrorKind {
            fn from(inner: $kind) -> Self {
                ErrorKind::$variant { inner }
            }
        }
    };
}

impl_from!(Adapter, AdapterErrorKind);
impl_from!(Choice, ChoiceErrorKind);
impl_from!(Class, ClassErrorKind);
impl_from!(Codec, CodecErrorKind);
impl_from!(Composite, CompositeErrorKind);
impl_from!(Options, OptionsErrorKind);
impl_from!(Primitive, PrimitiveErrorKind);
impl_from!(Tlv, TlvErrorKind);

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::from_kind(kind)
    }
}

/// Failures raised while parsing or emitting identifier and length octets.
#[derive(Snafu, Debug, Clone, PartialEq, Eq)]
#[snafu(visibility(pub))]
#[non_exhaustive]
pub enum TlvErrorKind {
    /// The input ended before a complete TLV was available.
    #[snafu(display("unexpected end of input"))]
    Truncated,

    /// A high-tag-number continuation chain ended without a final octet.
    #[snafu(display("truncated high tag number: continuation chain never terminates"))]
    TruncatedTagNumber,

    /// A high-tag-number form used more continuation octets than supported.
    #[snafu(display("tag number requires more than five continuation octets"))]
    TagTooLong,

    /// Long-form length octets were structurally invalid.
    #[snafu(display("malformed length octets: {msg}"))]
    MalformedLength {
        /// What was wrong with the length.
        msg: Arc<str>,
    },

    /// A definite length under CER/DER used the long form where the short
    /// form suffices.
    #[snafu(display("non-minimal length octets: value {length} must use the short form"))]
    NonMinimalLength {
        /// The offending length value.
        length: usize,
    },

    /// A long-form length under CER/DER began with a zero octet.
    #[snafu(display("long form length octets have a leading zero"))]
    LeadingZeroLength,

    /// The indefinite form appeared where the rule or the primitive
    /// encoding forbids it.
    #[snafu(display("indefinite length prohibited here"))]
    IndefiniteProhibited,

    /// An indefinite-length value was never closed.
    #[snafu(display("missing end-of-contents octets"))]
    MissingEndOfContents,

    /// An EXPLICIT overlay requires a constructed wrapper TLV.
    #[snafu(display("expected a constructed encoding for an EXPLICIT tag"))]
    ExpectedConstructedForExplicit,

    /// A constructed string encoding appeared under DER.
    #[snafu(display("constructed string encoding prohibited under DER"))]
    ConstructedProhibited,

    /// The tag did not match what was expected.
    #[snafu(display("expected {expected} tag, actual tag: {actual}"))]
    MismatchedTag {
        /// The expected tag.
        expected: Tag,
        /// The parsed tag.
        actual: Tag,
    },

    /// Trailing bytes remained after a complete value.
    #[snafu(display("unexpected extra data: {length} bytes"))]
    UnexpectedExtraData {
        /// The number of surplus bytes.
        length: usize,
    },

    /// A nom-level parse failure with no more specific classification.
    #[snafu(display("malformed TLV input"))]
    Parser,
}

/// Failures raised by primitive content codecs.
#[derive(Snafu, Debug, Clone, PartialEq, Eq)]
#[snafu(visibility(pub))]
#[non_exhaustive]
pub enum PrimitiveErrorKind {
    /// BOOLEAN content was not one octet, or not canonical where required.
    #[snafu(display("BOOLEAN value is not `0x00` or `0xFF` as the canonical rules require: {value:#04x}"))]
    InvalidBool {
        /// The offending content octet.
        value: u8,
    },

    /// The content length does not match what the type requires.
    #[snafu(display("expected {expected} content octets, actual: {actual}"))]
    MismatchedLength {
        /// The expected length.
        expected: usize,
        /// The actual length.
        actual: usize,
    },

    /// INTEGER content used a redundant leading octet.
    #[snafu(display("INTEGER content octets are not minimal"))]
    NonMinimalInteger,

    /// INTEGER content was empty.
    #[snafu(display("INTEGER content is empty"))]
    EmptyInteger,

    /// An OBJECT IDENTIFIER or RELATIVE-OID was structurally invalid.
    #[snafu(display("invalid object identifier: {msg}"))]
    InvalidObjectIdentifier {
        /// Which arc rule was broken.
        msg: Arc<str>,
    },

    /// BIT STRING carried an unused-bit count outside 0..=7, or nonzero
    /// padding bits under the canonical rules.
    #[snafu(display("BIT STRING contains an invalid amount of unused bits: {bits}"))]
    InvalidBitString {
        /// The unused-bit count.
        bits: u8,
    },

    /// Padding bits below the unused-bit boundary were set.
    #[snafu(display("BIT STRING padding bits must be zero under the canonical rules"))]
    NonZeroPadding,

    /// A restricted-character string contained a byte outside its set.
    #[snafu(display("invalid {tag} string content: {msg}"))]
    StringConversion {
        /// The universal tag of the string type.
        tag: Tag,
        /// What was rejected.
        msg: Arc<str>,
    },

    /// A time value did not match its layout.
    #[snafu(display("invalid time value: {msg}"))]
    InvalidDate {
        /// The reason as a string.
        msg: Arc<str>,
    },

    /// A DURATION was not a well-formed ISO 8601 duration.
    #[snafu(display("invalid duration: {msg}"))]
    InvalidDuration {
        /// The reason as a string.
        msg: Arc<str>,
    },

    /// A REAL's content octets were malformed.
    #[snafu(display("invalid REAL encoding: {msg}"))]
    InvalidReal {
        /// The reason as a string.
        msg: Arc<str>,
    },

    /// An integer was wider than the destination type.
    #[snafu(display("integer larger than expected {max_width} bits"))]
    IntegerOverflow {
        /// The destination's width in bits.
        max_width: u32,
    },
}

/// Failures raised by constructed-type codecs.
#[derive(Snafu, Debug, Clone)]
#[snafu(visibility(pub))]
#[non_exhaustive]
pub enum CompositeErrorKind {
    /// A non-OPTIONAL field had no matching child TLV.
    #[snafu(display("missing mandatory field `{name}`"))]
    MissingMandatoryField {
        /// The field's name.
        name: Arc<str>,
    },

    /// A child TLV matched no declared field and no extension marker was
    /// present.
    #[snafu(display("unknown field at index {index} with tag {tag}"))]
    UnknownField {
        /// Position of the stray child.
        index: usize,
        /// Tag of the stray child.
        tag: Tag,
    },

    /// COMPONENTS OF may only embed an anonymous sub-sequence.
    #[snafu(display("COMPONENTS OF field `{name}` must be anonymous"))]
    NonAnonymousComponentsOf {
        /// The offending field's name.
        name: Arc<str>,
    },

    /// A WITH COMPONENTS presence rule was broken.
    #[snafu(display("WITH COMPONENTS rule for `{field}` requires the component to be {requirement}"))]
    WithComponents {
        /// The governed field.
        field: Arc<str>,
        /// "PRESENT" or "ABSENT".
        requirement: Arc<str>,
    },

    /// SET OF elements were not in ascending order of their encodings.
    #[snafu(display("SET OF elements are not in canonical order"))]
    SetOrdering,

    /// No sequence descriptor is registered for a type.
    #[snafu(display("no composite descriptor registered for `{type_name}`"))]
    UnregisteredComposite {
        /// The Rust type name.
        type_name: Arc<str>,
    },
}

/// Failures raised while resolving CHOICE alternatives.
#[derive(Snafu, Debug, Clone)]
#[snafu(visibility(pub))]
#[non_exhaustive]
pub enum ChoiceErrorKind {
    /// The decoded `(class, tag)` matched no registered alternative.
    #[snafu(display("no alternative registered for class {class}, tag {tag}"))]
    NoMatchingAlternative {
        /// The decoded class.
        class: Class,
        /// The decoded tag number.
        tag: u32,
    },

    /// The value's dynamic type matched no registered alternative.
    #[snafu(display("no alternative accepts values of type `{type_name}`"))]
    NoMatchingType {
        /// The Rust type name.
        type_name: Arc<str>,
    },

    /// Two alternatives accept the same dynamic type.
    #[snafu(display("ambiguous alternative: more than one accepts `{type_name}`"))]
    AmbiguousAlternative {
        /// The Rust type name.
        type_name: Arc<str>,
    },

    /// The named registry exists but holds no alternatives.
    #[snafu(display("no alternatives registered under `{name}`"))]
    NoAlternativesRegistered {
        /// The registry key.
        name: Arc<str>,
    },
}

/// Failures raised when a tag class is invalid or mismatched.
#[derive(Snafu, Debug, Clone, PartialEq, Eq)]
#[snafu(visibility(pub))]
#[non_exhaustive]
pub enum ClassErrorKind {
    /// The parsed class did not match the expected class.
    #[snafu(display("expected class {expected}, actual class: {actual}"))]
    Mismatched {
        /// The expected class.
        expected: Class,
        /// The parsed class.
        actual: Class,
    },

    /// A class keyword was not one of the four ASN.1 classes.
    #[snafu(display("`{word}` is not a tag class"))]
    Invalid {
        /// The offending keyword.
        word: Arc<str>,
    },
}

/// Failures raised by codec dispatch and the type registry.
#[derive(Snafu, Debug, Clone)]
#[snafu(visibility(pub))]
#[non_exhaustive]
pub enum CodecErrorKind {
    /// No factories are registered for the requested type.
    #[snafu(display("no codec registered for type `{type_name}`"))]
    UnregisteredType {
        /// The Rust type name.
        type_name: Arc<str>,
    },

    /// `set_value` was handed a value of the wrong dynamic type.
    #[snafu(display("value has the wrong dynamic type for codec `{expected}`"))]
    ValueMismatch {
        /// The type the codec expected.
        expected: Arc<str>,
    },

    /// A byte-level override hook failed.
    #[snafu(display("codec override failed: {msg}"))]
    OverrideFailed {
        /// The hook's reported reason.
        msg: Arc<str>,
    },
}

/// Failures raised while parsing field annotations.
#[derive(Snafu, Debug, Clone)]
#[snafu(visibility(pub))]
#[non_exhaustive]
pub enum OptionsErrorKind {
    /// A token was not part of the annotation grammar.
    #[snafu(display("unidentified keyword `{word}`"))]
    UnidentifiedKeyword {
        /// The offending token.
        word: Arc<str>,
    },

    /// `set` and `sequence` appeared together.
    #[snafu(display("`set` and `sequence` are mutually exclusive"))]
    ConflictingStructure,

    /// A `tag:N` argument was not a non-negative integer.
    #[snafu(display("invalid tag number `{text}`"))]
    InvalidTagNumber {
        /// The argument text.
        text: Arc<str>,
    },

    /// EXPLICIT cannot be combined with AUTOMATIC tagging.
    #[snafu(display("`explicit` conflicts with automatic tagging"))]
    ExplicitUnderAutomatic,

    /// A keyword argument was empty.
    #[snafu(display("keyword `{word}` requires an argument"))]
    MissingArgument {
        /// The keyword missing its argument.
        word: Arc<str>,
    },
}

/// Failures raised by the native-type adapter layer.
#[derive(Snafu, Debug, Clone)]
#[snafu(visibility(pub))]
#[non_exhaustive]
pub enum AdapterErrorKind {
    /// No adapter is registered for the `(type, keyword)` pair.
    #[snafu(display("no adapter for type `{type_name}` under keyword `{keyword}`"))]
    NotFound {
        /// The native Rust type.
        type_name: Arc<str>,
        /// The requested keyword (empty for the default adapter).
        keyword: Arc<str>,
    },

    /// Every candidate adapter in the chain rejected the value.
    #[snafu(display("adapter projection failed: {msg}"))]
    ProjectionFailed {
        /// Why the final candidate rejected the value.
        msg: Arc<str>,
    },
}

pub(crate) type Result<T, E = Error> = core::result::Result<T, E>;
