//! CHOICE values and their alternative registries.

use std::any::{Any, TypeId};
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::codec::Codec;
use crate::error::{intern, ChoiceErrorKind, Result};
use crate::options::Options;
use crate::registry::VersionedRegistry;
use crate::tag::{Class, Tag};
use crate::wire::{Pdu, Tlv};

/// A CHOICE value: one concrete inner value plus an optional tag-number
/// hint used to disambiguate alternatives sharing a type.
#[derive(Clone)]
pub struct Choice {
    value: Arc<dyn Any>,
    tag: Option<u32>,
}

impl Choice {
    pub fn new<T: Any>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            tag: None,
        }
    }

    /// Pins the alternative's tag number.
    pub fn with_tag(mut self, tag: u32) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn tag_number(&self) -> Option<u32> {
        self.tag
    }

    /// The inner value, if it is a `T`.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.value.as_ref().downcast_ref::<T>()
    }

    pub(crate) fn inner_type_id(&self) -> TypeId {
        self.value.as_ref().type_id()
    }

    pub(crate) fn inner(&self) -> &dyn Any {
        self.value.as_ref()
    }
}

impl core::fmt::Debug for Choice {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Choice").field("tag", &self.tag).finish()
    }
}

// Equality is only meaningful for DEFAULT comparisons, which CHOICE fields
// do not participate in; two choices are equal when they share storage.
impl PartialEq for Choice {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value) && self.tag == other.tag
    }
}

/// One registered alternative of a named CHOICE.
#[derive(Clone)]
pub(crate) struct Alternative {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) class: Class,
    pub(crate) tag: u32,
    pub(crate) explicit: bool,
}

/// The alternatives of a named CHOICE, in registration order.
#[derive(Clone, Default)]
pub struct ChoicesDescriptor {
    alternatives: Vec<Alternative>,
}

impl ChoicesDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an alternative binding `T` to `(class, tag)`. `explicit`
    /// wraps the inner value rather than replacing its identifier.
    pub fn with_alternative<T: Any>(mut self, class: Class, tag: u32, explicit: bool) -> Self {
        self.alternatives.push(Alternative {
            type_id: TypeId::of::<T>(),
            type_name: core::any::type_name::<T>(),
            class,
            tag,
            explicit,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty()
    }

    pub fn len(&self) -> usize {
        self.alternatives.len()
    }
}

static CHOICES: Lazy<VersionedRegistry<String, Arc<ChoicesDescriptor>>> =
    Lazy::new(VersionedRegistry::new);

/// Registers the alternatives of a named CHOICE. Names are case-folded.
pub fn register_choices(name: &str, descriptor: ChoicesDescriptor) {
    CHOICES.insert(name.to_ascii_lowercase(), Arc::new(descriptor));
}

/// Removes a named CHOICE registry.
pub fn unregister_choices(name: &str) {
    CHOICES.remove(&name.to_ascii_lowercase());
}

fn descriptor_for(name: &str) -> Result<Arc<ChoicesDescriptor>> {
    CHOICES
        .get(&name.to_ascii_lowercase())
        .filter(|descriptor| !descriptor.is_empty())
        .ok_or_else(|| {
            ChoiceErrorKind::NoAlternativesRegistered {
                name: intern(name),
            }
            .into()
        })
}

/// The codec for CHOICE values, bound to one named alternative registry.
pub(crate) struct ChoiceCodec {
    descriptor: Arc<ChoicesDescriptor>,
    value: Option<Choice>,
}

impl ChoiceCodec {
    pub(crate) fn new(name: &str) -> Result<Self> {
        Ok(Self {
            descriptor: descriptor_for(name)?,
            value: None,
        })
    }

    pub(crate) fn with_value(name: &str, value: Choice) -> Result<Self> {
        Ok(Self {
            descriptor: descriptor_for(name)?,
            value: Some(value),
        })
    }

    /// Locates the unique alternative accepting the value's dynamic type,
    /// consulting the value's tag hint when several share the type.
    fn choose(&self, value: &Choice) -> Result<&Alternative> {
        let candidates: Vec<&Alternative> = self
            .descriptor
            .alternatives
            .iter()
            .filter(|alternative| alternative.type_id == value.inner_type_id())
            .collect();

        match (candidates.len(), value.tag_number()) {
            (0, _) => Err(ChoiceErrorKind::NoMatchingType {
                type_name: intern("the value's dynamic type"),
            }
            .into()),
            (1, _) => Ok(candidates[0]),
            (_, Some(tag)) => {
                let narrowed: Vec<&&Alternative> = candidates
                    .iter()
                    .filter(|alternative| alternative.tag == tag)
                    .collect();
                match narrowed.len() {
                    1 => Ok(narrowed[0]),
                    0 => Err(ChoiceErrorKind::NoMatchingAlternative {
                        class: Class::Context,
                        tag,
                    }
                    .into()),
                    _ => Err(ChoiceErrorKind::AmbiguousAlternative {
                        type_name: intern(candidates[0].type_name),
                    }
                    .into()),
                }
            }
            (_, None) => Err(ChoiceErrorKind::AmbiguousAlternative {
                type_name: intern(candidates[0].type_name),
            }
            .into()),
        }
    }

    /// Whether any alternative claims the identifier.
    pub(crate) fn matches(&self, tag: Tag) -> bool {
        self.descriptor
            .alternatives
            .iter()
            .any(|alternative| alternative.class == tag.class && alternative.tag == tag.value)
    }
}

impl Codec for ChoiceCodec {
    fn tag(&self) -> Tag {
        // The effective tag is per-alternative; EOC stands in for "any".
        Tag::EOC
    }

    fn is_primitive(&self) -> bool {
        false
    }

    fn read(&mut self, tlv: &Tlv<'_>, _options: &Options) -> Result<()> {
        let alternative = self
            .descriptor
            .alternatives
            .iter()
            .find(|alternative| {
                alternative.class == tlv.identifier.tag.class
                    && alternative.tag == tlv.identifier.tag.value
            })
            .ok_or_else(|| {
                crate::error::Error::from(ChoiceErrorKind::NoMatchingAlternative {
                    class: tlv.identifier.tag.class,
                    tag: tlv.identifier.tag.value,
                })
            })?
            .clone();

        let mut decoder = super::ValueDecoder::for_type(
            alternative.type_id,
            alternative.type_name,
            &Options::default(),
        )?;

        if alternative.explicit {
            let mut inner = Pdu::from_bytes(tlv.rule, tlv.contents);
            decoder.decode(&mut inner, &Options::default())?;
            if !inner.is_exhausted() {
                return Err(crate::error::TlvErrorKind::UnexpectedExtraData {
                    length: inner.remaining().len(),
                }
                .into());
            }
        } else {
            let mut overlay = Options::default();
            overlay.tag = Some(alternative.tag);
            overlay.class = Some(alternative.class);
            decoder.read_tlv_into(tlv, &overlay)?;
        }

        let inner_value = decoder.into_any_arc()?;
        self.value = Some(Choice {
            value: inner_value,
            tag: Some(alternative.tag),
        });
        Ok(())
    }

    fn write(&self, pdu: &mut Pdu, _options: &Options) -> Result<usize> {
        let value = self.value.as_ref().ok_or_else(|| {
            crate::error::Error::custom("choice codec holds no value")
        })?;
        let alternative = self.choose(value)?;

        let codec = super::encode_value_codec(
            value.inner(),
            value.inner_type_id(),
            alternative.type_name,
            &Options::default(),
        )?;

        let mut overlay = Options::default();
        overlay.tag = Some(alternative.tag);
        overlay.class = Some(alternative.class);
        overlay.explicit = alternative.explicit;
        codec.write(pdu, &overlay)
    }

    fn set_value(&mut self, value: Box<dyn Any>) -> Result<()> {
        match value.downcast::<Choice>() {
            Ok(value) => {
                self.value = Some(*value);
                Ok(())
            }
            Err(_) => Err(crate::error::CodecErrorKind::ValueMismatch {
                expected: intern("Choice"),
            }
            .into()),
        }
    }

    fn value(&self) -> Option<Box<dyn Any>> {
        self.value.clone().map(|value| Box::new(value) as Box<dyn Any>)
    }
}
