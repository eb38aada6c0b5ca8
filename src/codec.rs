//! # Codec dispatch and the type registry
//!
//! A process-wide table maps a type identity to a pair of factories
//! producing values that implement the [`Codec`] capability. Primitive
//! families register user aliases through the `register_*_alias` functions,
//! each binding a tag, optional byte-level hooks, and constraints; the
//! crate's own value types are registered with identity projections on
//! first use.

use std::any::{Any, TypeId};
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::constraints::{Constraint, ConstraintGroup, Phase};
use crate::error::{intern, CodecErrorKind, Error, Result, TlvErrorKind};
use crate::identifier::Identifier;
use crate::options::Options;
use crate::primitives::real::RealForm;
use crate::primitives::{self, bitstring, octets, oid, real, temporal};
use crate::registry::VersionedRegistry;
use crate::tag::Tag;
use crate::types::{
    BitString, BmpString, Date, DateTime, Duration, GeneralString, GeneralizedTime, GraphicString,
    Ia5String, Integer, NumericString, ObjectIdentifier, PrintableString, RelativeOid,
    TeletexString, TimeOfDay, UniversalString, UtcTime, VisibleString,
};
use crate::wire::{Pdu, Tlv};

/// The capability implemented by every codec. One codec instance exists
/// per encode or decode of a single value.
pub trait Codec: Any {
    /// The effective tag of the value this codec handles.
    fn tag(&self) -> Tag;

    /// Whether the value uses primitive encoding.
    fn is_primitive(&self) -> bool {
        true
    }

    /// Materialises the held value from a TLV.
    fn read(&mut self, tlv: &Tlv<'_>, options: &Options) -> Result<()>;

    /// Appends the held value's TLV to `pdu`, returning the bytes written.
    fn write(&self, pdu: &mut Pdu, options: &Options) -> Result<usize>;

    /// Replaces the held value. Fails when the dynamic type is wrong.
    fn set_value(&mut self, value: Box<dyn Any>) -> Result<()>;

    /// A copy of the held value, if one is present.
    fn value(&self) -> Option<Box<dyn Any>>;
}

/// Non-projection knobs a family's wire functions may consult.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct WireConfig {
    pub(crate) real_form: RealForm,
}

fn require_primitive(tlv: &Tlv<'_>) -> Result<()> {
    if tlv.is_primitive() {
        Ok(())
    } else {
        Err(TlvErrorKind::ConstructedProhibited.into())
    }
}

/// A primitive family's wire representation: a tag plus content
/// conversions in both directions.
pub(crate) trait Asn1Primitive: Any + Clone + Send + Sync {
    const TAG: Tag;

    fn encode_value(
        &self,
        pdu: &mut Pdu,
        tag: Tag,
        overlay: &Options,
        config: &WireConfig,
    ) -> Result<usize>;

    fn decode_value(tlv: &Tlv<'_>, tag: Tag, config: &WireConfig) -> Result<Self>;
}

macro_rules! content_primitive {
    ($type:ty, $tag:expr, |$enc_self:ident| $encode:expr, |$contents:ident| $decode:expr) => {
        impl Asn1Primitive for $type {
            const TAG: Tag = $tag;

            fn encode_value(
                &self,
                pdu: &mut Pdu,
                tag: Tag,
                overlay: &Options,
                _config: &WireConfig,
            ) -> Result<usize> {
                let $enc_self = self;
                let contents: Vec<u8> = $encode;
                pdu.write_tlv(Identifier::from_tag(tag, false), &contents, overlay)
            }

            fn decode_value(tlv: &Tlv<'_>, _tag: Tag, _config: &WireConfig) -> Result<Self> {
                require_primitive(tlv)?;
                let $contents = tlv.contents;
                $decode
            }
        }
    };
}

impl Asn1Primitive for bool {
    const TAG: Tag = Tag::BOOL;

    fn encode_value(
        &self,
        pdu: &mut Pdu,
        tag: Tag,
        overlay: &Options,
        _config: &WireConfig,
    ) -> Result<usize> {
        pdu.write_tlv(
            Identifier::from_tag(tag, false),
            &primitives::encode_boolean(*self),
            overlay,
        )
    }

    fn decode_value(tlv: &Tlv<'_>, _tag: Tag, _config: &WireConfig) -> Result<Self> {
        require_primitive(tlv)?;
        primitives::decode_boolean(tlv.contents, tlv.rule)
    }
}

impl Asn1Primitive for () {
    const TAG: Tag = Tag::NULL;

    fn encode_value(
        &self,
        pdu: &mut Pdu,
        tag: Tag,
        overlay: &Options,
        _config: &WireConfig,
    ) -> Result<usize> {
        pdu.write_tlv(Identifier::from_tag(tag, false), &[], overlay)
    }

    fn decode_value(tlv: &Tlv<'_>, _tag: Tag, _config: &WireConfig) -> Result<Self> {
        require_primitive(tlv)?;
        primitives::decode_null(tlv.contents)
    }
}

content_primitive!(
    Integer,
    Tag::INTEGER,
    |value| value.to_signed_bytes_be(),
    |contents| Integer::from_signed_bytes_be(contents)
);

content_primitive!(
    ObjectIdentifier,
    Tag::OBJECT_IDENTIFIER,
    |value| oid::encode_object_identifier(value),
    |contents| oid::decode_object_identifier(contents)
);

content_primitive!(
    RelativeOid,
    Tag::RELATIVE_OID,
    |value| oid::encode_relative_oid(value),
    |contents| oid::decode_relative_oid(contents)
);

content_primitive!(
    UtcTime,
    Tag::UTC_TIME,
    |value| temporal::encode_utc_time(value),
    |contents| temporal::decode_utc_time(contents)
);

content_primitive!(
    GeneralizedTime,
    Tag::GENERALIZED_TIME,
    |value| temporal::encode_generalized_time(value),
    |contents| temporal::decode_generalized_time(contents)
);

content_primitive!(
    Date,
    Tag::DATE,
    |value| temporal::encode_date(value),
    |contents| temporal::decode_date(contents)
);

content_primitive!(
    DateTime,
    Tag::DATE_TIME,
    |value| temporal::encode_date_time(value),
    |contents| temporal::decode_date_time(contents)
);

content_primitive!(
    TimeOfDay,
    Tag::TIME_OF_DAY,
    |value| temporal::encode_time_of_day(value),
    |contents| temporal::decode_time_of_day(contents)
);

content_primitive!(
    Duration,
    Tag::DURATION,
    |value| value.to_string().into_bytes(),
    |contents| {
        core::str::from_utf8(contents)
            .map_err(|_| {
                Error::from(crate::error::PrimitiveErrorKind::InvalidDuration {
                    msg: intern("duration is not ASCII"),
                })
            })?
            .parse()
    }
);

impl Asn1Primitive for f64 {
    const TAG: Tag = Tag::REAL;

    fn encode_value(
        &self,
        pdu: &mut Pdu,
        tag: Tag,
        overlay: &Options,
        config: &WireConfig,
    ) -> Result<usize> {
        let contents = real::encode_real(*self, config.real_form)?;
        pdu.write_tlv(Identifier::from_tag(tag, false), &contents, overlay)
    }

    fn decode_value(tlv: &Tlv<'_>, _tag: Tag, _config: &WireConfig) -> Result<Self> {
        require_primitive(tlv)?;
        real::decode_real(tlv.contents)
    }
}

impl Asn1Primitive for BitString {
    const TAG: Tag = Tag::BIT_STRING;

    fn encode_value(
        &self,
        pdu: &mut Pdu,
        tag: Tag,
        overlay: &Options,
        _config: &WireConfig,
    ) -> Result<usize> {
        bitstring::encode_bit_string(pdu, tag, self, overlay)
    }

    fn decode_value(tlv: &Tlv<'_>, _tag: Tag, _config: &WireConfig) -> Result<Self> {
        bitstring::decode_bit_string(tlv)
    }
}

impl Asn1Primitive for Vec<u8> {
    const TAG: Tag = Tag::OCTET_STRING;

    fn encode_value(
        &self,
        pdu: &mut Pdu,
        tag: Tag,
        overlay: &Options,
        _config: &WireConfig,
    ) -> Result<usize> {
        octets::encode_string_value(pdu, tag, self, overlay)
    }

    fn decode_value(tlv: &Tlv<'_>, _tag: Tag, _config: &WireConfig) -> Result<Self> {
        octets::decode_string_value(tlv)
    }
}

impl Asn1Primitive for String {
    const TAG: Tag = Tag::UTF8_STRING;

    fn encode_value(
        &self,
        pdu: &mut Pdu,
        tag: Tag,
        overlay: &Options,
        _config: &WireConfig,
    ) -> Result<usize> {
        octets::encode_character_string(pdu, tag, self, overlay)
    }

    fn decode_value(tlv: &Tlv<'_>, tag: Tag, _config: &WireConfig) -> Result<Self> {
        octets::decode_character_string(tlv, tag)
    }
}

macro_rules! restricted_string_primitive {
    ($($type:ty, $tag:expr, |$value:ident| $to_bytes:expr, |$bytes:ident| $from_bytes:expr);+ $(;)?) => {
        $(
            impl Asn1Primitive for $type {
                const TAG: Tag = $tag;

                fn encode_value(
                    &self,
                    pdu: &mut Pdu,
                    tag: Tag,
                    overlay: &Options,
                    _config: &WireConfig,
                ) -> Result<usize> {
                    let $value = self;
                    let bytes: Vec<u8> = $to_bytes;
                    octets::encode_string_value(pdu, tag, &bytes, overlay)
                }

                fn decode_value(tlv: &Tlv<'_>, _tag: Tag, _config: &WireConfig) -> Result<Self> {
                    let $bytes = octets::decode_string_value(tlv)?;
                    $from_bytes
                }
            }
        )+
    }
}

restricted_string_primitive! {
    NumericString, Tag::NUMERIC_STRING, |value| value.as_bytes().to_vec(), |bytes| Self::from_bytes(&bytes);
    PrintableString, Tag::PRINTABLE_STRING, |value| value.as_bytes().to_vec(), |bytes| Self::from_bytes(&bytes);
    Ia5String, Tag::IA5_STRING, |value| value.as_bytes().to_vec(), |bytes| Self::from_bytes(&bytes);
    VisibleString, Tag::VISIBLE_STRING, |value| value.as_bytes().to_vec(), |bytes| Self::from_bytes(&bytes);
    TeletexString, Tag::TELETEX_STRING, |value| value.as_bytes().to_vec(), |bytes| Self::from_bytes(&bytes);
    GraphicString, Tag::GRAPHIC_STRING, |value| value.as_bytes().to_vec(), |bytes| Self::from_bytes(&bytes);
    GeneralString, Tag::GENERAL_STRING, |value| value.as_bytes().to_vec(), |bytes| Self::from_bytes(&bytes);
    BmpString, Tag::BMP_STRING, |value| value.to_utf16_be(), |bytes| Self::from_utf16_be(&bytes);
    UniversalString, Tag::UNIVERSAL_STRING, |value| value.to_utf32_be(), |bytes| Self::from_utf32_be(&bytes);
}

/// A pre-parse check over raw content octets.
pub type DecodeVerifier = Arc<dyn Fn(&[u8]) -> Result<()> + Send + Sync>;

type ProjectFn<T, P> = Arc<dyn Fn(&T) -> Result<P> + Send + Sync>;
type EmbedFn<T, P> = Arc<dyn Fn(P) -> Result<T> + Send + Sync>;
type EncodeOverrideFn<T> = Arc<dyn Fn(&T) -> Result<Vec<u8>> + Send + Sync>;
type DecodeOverrideFn<T> = Arc<dyn Fn(&[u8]) -> Result<T> + Send + Sync>;

/// Registration parameters binding a user type `T` to a primitive family
/// whose wire representation is `P`.
pub struct AliasConfig<T, P> {
    tag: Option<Tag>,
    project: ProjectFn<T, P>,
    embed: EmbedFn<T, P>,
    verifier: Option<DecodeVerifier>,
    encode_override: Option<EncodeOverrideFn<T>>,
    decode_override: Option<DecodeOverrideFn<T>>,
    constraints: Vec<Constraint>,
    phase: Phase,
    real_form: RealForm,
}

impl<T, P> AliasConfig<T, P> {
    /// A configuration from the two projections between the user type and
    /// the family's wire representation.
    pub fn new(
        project: impl Fn(&T) -> Result<P> + Send + Sync + 'static,
        embed: impl Fn(P) -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            tag: None,
            project: Arc::new(project),
            embed: Arc::new(embed),
            verifier: None,
            encode_override: None,
            decode_override: None,
            constraints: Vec::new(),
            phase: Phase::default(),
            real_form: RealForm::default(),
        }
    }

    /// Overrides the family's universal tag.
    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tag = Some(tag);
        self
    }

    /// A byte-level check run before any parsing on decode.
    pub fn with_verifier(
        mut self,
        verifier: impl Fn(&[u8]) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.verifier = Some(Arc::new(verifier));
        self
    }

    /// A byte-level hook producing the content octets, bypassing the
    /// family's serialisation.
    pub fn with_encode_override(
        mut self,
        hook: impl Fn(&T) -> Result<Vec<u8>> + Send + Sync + 'static,
    ) -> Self {
        self.encode_override = Some(Arc::new(hook));
        self
    }

    /// A byte-level hook materialising the value from content octets,
    /// bypassing the family's parsing.
    pub fn with_decode_override(
        mut self,
        hook: impl Fn(&[u8]) -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        self.decode_override = Some(Arc::new(hook));
        self
    }

    /// Adds a user constraint evaluated at the configured phase.
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Selects when constraints run.
    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    /// Selects the REAL content representation (binary by default).
    pub fn with_real_form(mut self, form: RealForm) -> Self {
        self.real_form = form;
        self
    }
}

impl<P: Asn1Primitive> AliasConfig<P, P> {
    /// The identity configuration used for the crate's own value types.
    pub fn identity() -> Self {
        Self::new(|value: &P| Ok(value.clone()), Ok)
    }
}

struct AliasProfile<T, P> {
    tag: Tag,
    project: ProjectFn<T, P>,
    embed: EmbedFn<T, P>,
    verifier: Option<DecodeVerifier>,
    encode_override: Option<EncodeOverrideFn<T>>,
    decode_override: Option<DecodeOverrideFn<T>>,
    constraints: ConstraintGroup,
    phase: Phase,
    config: WireConfig,
}

/// The codec for every registered primitive alias: an optional value plus
/// the alias's shared profile.
struct AliasCodec<T, P> {
    value: Option<T>,
    profile: Arc<AliasProfile<T, P>>,
}

impl<T, P> AliasCodec<T, P>
where
    T: Any + Clone + Send + Sync,
    P: Asn1Primitive,
{
    fn held(&self) -> Result<&T> {
        self.value.as_ref().ok_or_else(|| {
            CodecErrorKind::ValueMismatch {
                expected: intern(core::any::type_name::<T>()),
            }
            .into()
        })
    }
}

impl<T, P> Codec for AliasCodec<T, P>
where
    T: Any + Clone + Send + Sync,
    P: Asn1Primitive,
{
    fn tag(&self) -> Tag {
        self.profile.tag
    }

    fn read(&mut self, tlv: &Tlv<'_>, options: &Options) -> Result<()> {
        if !options.overrides_identifier() && !options.explicit {
            Error::assert_tag(self.profile.tag, tlv.identifier.tag)?;
        }

        if let Some(verifier) = &self.profile.verifier {
            verifier(tlv.contents)?;
        }

        let value = match &self.profile.decode_override {
            Some(hook) => hook(tlv.contents)?,
            None => {
                let wire = P::decode_value(tlv, self.profile.tag, &self.profile.config)?;
                (self.profile.embed)(wire)?
            }
        };

        if self.profile.phase.applies(false) {
            self.profile.constraints.check(&value)?;
        }

        self.value = Some(value);
        Ok(())
    }

    fn write(&self, pdu: &mut Pdu, options: &Options) -> Result<usize> {
        let value = self.held()?;

        if self.profile.phase.applies(true) {
            self.profile.constraints.check(value)?;
        }

        if options.explicit && options.tag.is_some() {
            let mut inner = Pdu::new(pdu.rule());
            self.write_plain(value, &mut inner, &Options::default())?;
            return pdu.write_tlv(
                Identifier::from_tag(self.profile.tag, false),
                inner.as_bytes(),
                options,
            );
        }

        self.write_plain(value, pdu, options)
    }

    fn set_value(&mut self, value: Box<dyn Any>) -> Result<()> {
        match value.downcast::<T>() {
            Ok(value) => {
                self.value = Some(*value);
                Ok(())
            }
            Err(_) => Err(CodecErrorKind::ValueMismatch {
                expected: intern(core::any::type_name::<T>()),
            }
            .into()),
        }
    }

    fn value(&self) -> Option<Box<dyn Any>> {
        self.value
            .as_ref()
            .map(|value| Box::new(value.clone()) as Box<dyn Any>)
    }
}

impl<T, P> AliasCodec<T, P>
where
    T: Any + Clone + Send + Sync,
    P: Asn1Primitive,
{
    fn write_plain(&self, value: &T, pdu: &mut Pdu, options: &Options) -> Result<usize> {
        if let Some(hook) = &self.profile.encode_override {
            let contents = hook(value)?;
            return pdu.write_tlv(
                Identifier::from_tag(self.profile.tag, false),
                &contents,
                options,
            );
        }

        let wire = (self.profile.project)(value)?;
        wire.encode_value(pdu, self.profile.tag, options, &self.profile.config)
    }
}

/// The factory pair registered for every type: one producing an empty
/// codec, one seeding a codec from an existing value.
#[derive(Clone)]
pub struct Factories {
    new_empty: Arc<dyn Fn() -> Box<dyn Codec> + Send + Sync>,
    new_with: Arc<dyn Fn(&dyn Any) -> Result<Box<dyn Codec>> + Send + Sync>,
}

impl Factories {
    pub(crate) fn from_fns(
        new_empty: impl Fn() -> Box<dyn Codec> + Send + Sync + 'static,
        new_with: impl Fn(&dyn Any) -> Result<Box<dyn Codec>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            new_empty: Arc::new(new_empty),
            new_with: Arc::new(new_with),
        }
    }

    pub fn empty(&self) -> Box<dyn Codec> {
        (self.new_empty)()
    }

    pub fn with_value(&self, value: &dyn Any) -> Result<Box<dyn Codec>> {
        (self.new_with)(value)
    }
}

static TYPES: Lazy<VersionedRegistry<TypeId, Factories>> = Lazy::new(VersionedRegistry::new);

fn register_alias_with<T, P>(config: AliasConfig<T, P>)
where
    T: Any + Clone + Send + Sync,
    P: Asn1Primitive,
{
    let profile = Arc::new(AliasProfile {
        tag: config.tag.unwrap_or(P::TAG),
        project: config.project,
        embed: config.embed,
        verifier: config.verifier,
        encode_override: config.encode_override,
        decode_override: config.decode_override,
        constraints: config.constraints.into_iter().collect(),
        phase: config.phase,
        config: WireConfig {
            real_form: config.real_form,
        },
    });

    let empty_profile = profile.clone();
    let factories = Factories::from_fns(
        move || {
            Box::new(AliasCodec::<T, P> {
                value: None,
                profile: empty_profile.clone(),
            })
        },
        move |value| {
            let value = value.downcast_ref::<T>().ok_or_else(|| {
                Error::from(CodecErrorKind::ValueMismatch {
                    expected: intern(core::any::type_name::<T>()),
                })
            })?;
            Ok(Box::new(AliasCodec::<T, P> {
                value: Some(value.clone()),
                profile: profile.clone(),
            }))
        },
    );

    TYPES.insert(TypeId::of::<T>(), factories);
}

macro_rules! alias_families {
    ($($(#[$doc:meta])* $fn_name:ident, $wire:ty);+ $(;)?) => {
        $(
            $(#[$doc])*
            pub fn $fn_name<T>(config: AliasConfig<T, $wire>)
            where
                T: Any + Clone + Send + Sync,
            {
                register_alias_with(config);
            }
        )+
    }
}

alias_families! {
    /// Binds `T` to a restricted-character-string codec. The configured
    /// tag selects the repertoire validator (UTF8String by default).
    register_text_alias, String;
    /// Binds `T` to the INTEGER codec (pass `Tag::ENUMERATED` for
    /// ENUMERATED semantics).
    register_integer_alias, Integer;
    /// Binds `T` to the BOOLEAN codec.
    register_boolean_alias, bool;
    /// Binds `T` to the OBJECT IDENTIFIER codec.
    register_oid_alias, ObjectIdentifier;
    /// Binds `T` to the RELATIVE-OID codec.
    register_relative_oid_alias, RelativeOid;
    /// Binds `T` to the BIT STRING codec.
    register_bitstring_alias, BitString;
    /// Binds `T` to the GeneralizedTime codec (pass `Tag::UTC_TIME` &c.
    /// to select a different temporal tag).
    register_temporal_alias, GeneralizedTime;
    /// Binds `T` to the DURATION codec.
    register_duration_alias, Duration;
    /// Binds `T` to the REAL codec.
    register_real_alias, f64;
}

/// Registers prebuilt factories for a composite or choice type.
pub(crate) fn register_factories(type_id: TypeId, factories: Factories) {
    TYPES.insert(type_id, factories);
}

macro_rules! register_identities {
    ($($type:ty),+ $(,)?) => {
        $(register_alias_with::<$type, $type>(AliasConfig::<$type, $type>::identity());)+
    }
}

static BUILTINS: Lazy<()> = Lazy::new(|| {
    register_identities!(
        bool,
        (),
        Integer,
        ObjectIdentifier,
        RelativeOid,
        BitString,
        Vec<u8>,
        String,
        NumericString,
        PrintableString,
        Ia5String,
        VisibleString,
        TeletexString,
        GraphicString,
        GeneralString,
        BmpString,
        UniversalString,
        UtcTime,
        GeneralizedTime,
        Date,
        DateTime,
        TimeOfDay,
        Duration,
        f64,
    );

    register_alias_with::<crate::types::Enumerated, Integer>(
        AliasConfig::new(
            |value: &crate::types::Enumerated| Ok(value.0.clone()),
            |wire| Ok(crate::types::Enumerated(wire)),
        )
        .with_tag(Tag::ENUMERATED),
    );

    macro_rules! register_containers {
        ($($element:ty),+ $(,)?) => {
            $(
                crate::composite::register_sequence_of::<$element>();
                crate::composite::register_set_of::<$element>();
            )+
        }
    }

    register_containers!(
        bool,
        Integer,
        String,
        Vec<u8>,
        ObjectIdentifier,
        RelativeOid,
        f64,
        PrintableString,
        Ia5String,
        UtcTime,
        GeneralizedTime,
    );
});

pub(crate) fn ensure_builtins() {
    Lazy::force(&BUILTINS);
}

/// The registered factories for a type identity, if any.
pub(crate) fn factories_for(type_id: TypeId) -> Option<Factories> {
    ensure_builtins();
    TYPES.get(&type_id)
}

/// Reads one value into `codec` from `pdu`, honoring an EXPLICIT overlay
/// by unwrapping the outer constructed TLV first.
pub(crate) fn decode_with_codec(
    codec: &mut dyn Codec,
    pdu: &mut Pdu,
    options: &Options,
) -> Result<()> {
    if options.explicit && options.tag.is_some() {
        let (contents, rule) = {
            let outer = pdu.read_tlv(options)?;
            (outer.contents.to_vec(), outer.rule)
        };
        let mut inner = Pdu::from_bytes(rule, &contents);
        let tlv = inner.read_tlv(&Options::default())?;
        codec.read(&tlv, &Options::default())?;
        if !inner.is_exhausted() {
            return Err(TlvErrorKind::UnexpectedExtraData {
                length: inner.remaining().len(),
            }
            .into());
        }
        Ok(())
    } else {
        let tlv = pdu.read_tlv(options)?;
        codec.read(&tlv, options)
    }
}
