//! SEQUENCE OF and SET OF: homogeneous containers.

use std::any::{Any, TypeId};

use crate::codec::{self, Codec, Factories};
use crate::error::{intern, CodecErrorKind, CompositeErrorKind, Error, Result, TlvErrorKind};
use crate::identifier::Identifier;
use crate::options::Options;
use crate::tag::Tag;
use crate::wire::{Pdu, Tlv};

/// A `SET OF` container. Distinct from `Vec` so that the two container
/// kinds can coexist in the type registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SetOf<T>(pub Vec<T>);

impl<T> SetOf<T> {
    pub fn new() -> Self {
        Self(Vec::new())
    }
}

impl<T> From<Vec<T>> for SetOf<T> {
    fn from(items: Vec<T>) -> Self {
        Self(items)
    }
}

impl<T> core::ops::Deref for SetOf<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> core::ops::DerefMut for SetOf<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

struct OfCodec<T> {
    items: Option<Vec<T>>,
    is_set: bool,
}

impl<T> OfCodec<T>
where
    T: Any + Clone,
{
    fn encode_elements(&self, items: &[T], rule: crate::rules::EncodingRules) -> Result<Vec<u8>> {
        let mut chunks = Vec::with_capacity(items.len());
        for item in items {
            let codec = super::encode_value_codec(
                item,
                TypeId::of::<T>(),
                core::any::type_name::<T>(),
                &Options::default(),
            )?;
            let mut scratch = Pdu::new(rule);
            codec.write(&mut scratch, &Options::default())?;
            chunks.push(scratch.into_bytes());
        }

        if self.is_set && rule.canonical_ordering() {
            chunks.sort();
        }

        Ok(chunks.concat())
    }

    fn decode_elements(&self, tlv: &Tlv<'_>) -> Result<Vec<T>> {
        let mut sub = Pdu::from_bytes(tlv.rule, tlv.contents);
        let mut items = Vec::new();
        let mut previous: Option<Vec<u8>> = None;
        let check_order = self.is_set && tlv.rule.canonical_ordering();

        while !sub.is_exhausted() {
            let start = sub.offset();
            let mut decoder = super::ValueDecoder::for_type(
                TypeId::of::<T>(),
                core::any::type_name::<T>(),
                &Options::default(),
            )?;
            decoder.decode(&mut sub, &Options::default())?;

            if check_order {
                let raw = sub.as_bytes()[start..sub.offset()].to_vec();
                if previous.as_ref().is_some_and(|previous| *previous > raw) {
                    return Err(CompositeErrorKind::SetOrdering.into());
                }
                previous = Some(raw);
            }

            let value = decoder.into_value()?;
            items.push(*value.downcast::<T>().map_err(|_| {
                Error::from(CodecErrorKind::ValueMismatch {
                    expected: intern(core::any::type_name::<T>()),
                })
            })?);
        }

        Ok(items)
    }
}

impl<T> Codec for OfCodec<T>
where
    T: Any + Clone,
{
    fn tag(&self) -> Tag {
        if self.is_set {
            Tag::SET
        } else {
            Tag::SEQUENCE
        }
    }

    fn is_primitive(&self) -> bool {
        false
    }

    fn read(&mut self, tlv: &Tlv<'_>, options: &Options) -> Result<()> {
        if !options.overrides_identifier() && !options.explicit {
            Error::assert_tag(self.tag(), tlv.identifier.tag)?;
        }
        if tlv.is_primitive() {
            return Err(TlvErrorKind::ExpectedConstructedForExplicit.into());
        }
        self.items = Some(self.decode_elements(tlv)?);
        Ok(())
    }

    fn write(&self, pdu: &mut Pdu, options: &Options) -> Result<usize> {
        let items = self.items.as_ref().ok_or_else(|| {
            Error::from(CodecErrorKind::ValueMismatch {
                expected: intern(core::any::type_name::<Vec<T>>()),
            })
        })?;

        let contents = self.encode_elements(items, pdu.rule())?;

        if options.explicit && options.tag.is_some() {
            let mut inner = Pdu::new(pdu.rule());
            inner.write_tlv(
                Identifier::from_tag(self.tag(), true),
                &contents,
                &Options::default(),
            )?;
            return pdu.write_tlv(
                Identifier::from_tag(self.tag(), true),
                inner.as_bytes(),
                options,
            );
        }

        pdu.write_tlv(Identifier::from_tag(self.tag(), true), &contents, options)
    }

    fn set_value(&mut self, value: Box<dyn Any>) -> Result<()> {
        let items = if self.is_set {
            value.downcast::<SetOf<T>>().map(|set| set.0)
        } else {
            value.downcast::<Vec<T>>().map(|items| *items)
        };
        match items {
            Ok(items) => {
                self.items = Some(items);
                Ok(())
            }
            Err(_) => Err(CodecErrorKind::ValueMismatch {
                expected: intern(core::any::type_name::<Vec<T>>()),
            }
            .into()),
        }
    }

    fn value(&self) -> Option<Box<dyn Any>> {
        self.items.as_ref().map(|items| {
            if self.is_set {
                Box::new(SetOf(items.clone())) as Box<dyn Any>
            } else {
                Box::new(items.clone()) as Box<dyn Any>
            }
        })
    }
}

/// Registers `Vec<T>` as a SEQUENCE OF `T`.
pub fn register_sequence_of<T>()
where
    T: Any + Clone + Send + Sync,
{
    codec::register_factories(
        TypeId::of::<Vec<T>>(),
        Factories::from_fns(
            || {
                Box::new(OfCodec::<T> {
                    items: None,
                    is_set: false,
                })
            },
            |value| {
                let items = value.downcast_ref::<Vec<T>>().ok_or_else(|| {
                    Error::from(CodecErrorKind::ValueMismatch {
                        expected: intern(core::any::type_name::<Vec<T>>()),
                    })
                })?;
                Ok(Box::new(OfCodec {
                    items: Some(items.clone()),
                    is_set: false,
                }))
            },
        ),
    );
}

/// Registers `SetOf<T>` as a SET OF `T`.
pub fn register_set_of<T>()
where
    T: Any + Clone + Send + Sync,
{
    codec::register_factories(
        TypeId::of::<SetOf<T>>(),
        Factories::from_fns(
            || {
                Box::new(OfCodec::<T> {
                    items: None,
                    is_set: true,
                })
            },
            |value| {
                let items = value.downcast_ref::<SetOf<T>>().ok_or_else(|| {
                    Error::from(CodecErrorKind::ValueMismatch {
                        expected: intern(core::any::type_name::<SetOf<T>>()),
                    })
                })?;
                Ok(Box::new(OfCodec {
                    items: Some(items.0.clone()),
                    is_set: true,
                }))
            },
        ),
    );
}
