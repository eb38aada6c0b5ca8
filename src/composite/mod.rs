//! # Structural codecs
//!
//! SEQUENCE, SET, SEQUENCE OF, SET OF, and CHOICE, built over explicit
//! field descriptors and the primitive codec registry.

pub mod choice;
pub mod fields;
mod of;
mod sequence;

pub use choice::{register_choices, unregister_choices, Choice, ChoicesDescriptor};
pub use fields::Field;
pub use of::{register_sequence_of, register_set_of, SetOf};
pub use sequence::{register_sequence, register_set};

use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::adapters;
use crate::codec::{self, Codec};
use crate::error::{intern, ChoiceErrorKind, Error, Result};
use crate::options::Options;
use crate::tag::Tag;
use crate::wire::{Pdu, Tlv};

/// Builds an encoding codec for any value: a registered type directly, a
/// CHOICE through its named alternative registry, or a native scalar
/// through the adapter chain.
pub(crate) fn encode_value_codec(
    value: &dyn Any,
    type_id: TypeId,
    type_name: &'static str,
    options: &Options,
) -> Result<Box<dyn Codec>> {
    if type_id == TypeId::of::<Choice>() {
        let name = options.choices.as_deref().ok_or_else(|| {
            Error::from(ChoiceErrorKind::NoAlternativesRegistered {
                name: intern(""),
            })
        })?;
        let choice = value.downcast_ref::<Choice>().ok_or_else(|| {
            Error::from(crate::error::CodecErrorKind::ValueMismatch {
                expected: intern("Choice"),
            })
        })?;
        return Ok(Box::new(choice::ChoiceCodec::with_value(
            name,
            choice.clone(),
        )?));
    }

    // A type keyword steers the value through the adapter layer even when
    // the type itself is registered, so `printable` on a `String` field
    // selects the restricted codec.
    let keyword = options.keyword.as_deref().unwrap_or("");
    if !keyword.is_empty() && adapters::has_chain(type_id, keyword) {
        return adapters::encode_codec_for(value, type_id, type_name, keyword);
    }

    match codec::factories_for(type_id) {
        Some(factories) => factories.with_value(value),
        None => adapters::encode_codec_for(value, type_id, type_name, keyword),
    }
}

/// The decoding counterpart of [`encode_value_codec`]: an empty codec plus
/// the knowledge of how to surface the decoded value afterwards.
pub(crate) enum ValueDecoder {
    Direct(Box<dyn Codec>),
    Adapted(adapters::DecodeAdapter),
    Choice(choice::ChoiceCodec),
}

impl ValueDecoder {
    pub(crate) fn for_type(
        type_id: TypeId,
        type_name: &'static str,
        options: &Options,
    ) -> Result<Self> {
        if type_id == TypeId::of::<Choice>() {
            let name = options.choices.as_deref().ok_or_else(|| {
                Error::from(ChoiceErrorKind::NoAlternativesRegistered {
                    name: intern(""),
                })
            })?;
            return Ok(Self::Choice(choice::ChoiceCodec::new(name)?));
        }

        let keyword = options.keyword.as_deref().unwrap_or("");
        if !keyword.is_empty() && adapters::has_chain(type_id, keyword) {
            return Ok(Self::Adapted(adapters::decode_adapter_for(
                type_id, type_name, keyword,
            )?));
        }

        match codec::factories_for(type_id) {
            Some(factories) => Ok(Self::Direct(factories.empty())),
            None => Ok(Self::Adapted(adapters::decode_adapter_for(
                type_id, type_name, keyword,
            )?)),
        }
    }

    fn codec_mut(&mut self) -> &mut dyn Codec {
        match self {
            Self::Direct(codec) => codec.as_mut(),
            Self::Adapted(adapter) => adapter.codec.as_mut(),
            Self::Choice(codec) => codec,
        }
    }

    /// Reads one value from the cursor of `pdu`.
    pub(crate) fn decode(&mut self, pdu: &mut Pdu, options: &Options) -> Result<()> {
        codec::decode_with_codec(self.codec_mut(), pdu, options)
    }

    /// Reads the value from an already-consumed TLV.
    pub(crate) fn read_tlv_into(&mut self, tlv: &Tlv<'_>, options: &Options) -> Result<()> {
        self.codec_mut().read(tlv, options)
    }

    /// Whether the peeked identifier belongs to this decoder's value,
    /// given the field overlay.
    pub(crate) fn matches(&self, tag: Tag, options: &Options) -> bool {
        if let Some(expected) = options.tag {
            let class = options
                .effective_class()
                .unwrap_or(crate::tag::Class::Context);
            return tag.value == expected && tag.class == class;
        }

        match self {
            Self::Direct(codec) => codec.tag() == tag,
            Self::Adapted(adapter) => adapter.codec.tag() == tag,
            Self::Choice(codec) => codec.matches(tag),
        }
    }

    /// Surrenders the decoded value, boxed as the field's value type.
    pub(crate) fn into_value(self) -> Result<Box<dyn Any>> {
        match self {
            Self::Direct(codec) => codec
                .value()
                .ok_or_else(|| Error::custom("codec holds no value")),
            Self::Adapted(adapter) => adapter.project(),
            Self::Choice(codec) => codec
                .value()
                .ok_or_else(|| Error::custom("choice codec holds no value")),
        }
    }

    /// The decoded value as shared storage, for CHOICE wrapping.
    pub(crate) fn into_any_arc(self) -> Result<Arc<dyn Any>> {
        self.into_value().map(Arc::from)
    }
}
