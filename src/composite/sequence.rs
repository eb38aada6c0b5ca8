//! SEQUENCE and SET codecs driven by registered field descriptors.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;

use super::fields::Field;
use super::ValueDecoder;
use crate::codec::{self, Codec, Factories};
use crate::error::{
    intern, CodecErrorKind, CompositeErrorKind, Error, OptionsErrorKind, Result, TlvErrorKind,
};
use crate::identifier::Identifier;
use crate::options::Options;
use crate::registry::{self, Presence, VersionedRegistry};
use crate::tag::{Class, Tag};
use crate::types::Any as RawTlv;
use crate::wire::{Pdu, Tlv};

#[derive(Clone)]
pub(crate) struct CompositeDescriptor {
    type_name: &'static str,
    options: Options,
    fields: Arc<Vec<Field>>,
    is_set: bool,
    new_value: Arc<dyn Fn() -> Box<dyn Any> + Send + Sync>,
    clone_value: Arc<dyn Fn(&dyn Any) -> Result<Box<dyn Any>> + Send + Sync>,
}

static DESCRIPTORS: Lazy<VersionedRegistry<TypeId, CompositeDescriptor>> =
    Lazy::new(VersionedRegistry::new);

fn descriptor_of(type_id: TypeId, type_name: &str) -> Result<CompositeDescriptor> {
    DESCRIPTORS.get(&type_id).ok_or_else(|| {
        CompositeErrorKind::UnregisteredComposite {
            type_name: intern(type_name),
        }
        .into()
    })
}

fn register_composite<S>(annotation: &str, fields: Vec<Field>, is_set: bool) -> Result<()>
where
    S: Any + Clone + Default,
{
    let mut options = Options::parse(annotation)?;
    options.set |= is_set;
    options.sequence |= !is_set;

    let descriptor = CompositeDescriptor {
        type_name: core::any::type_name::<S>(),
        options,
        fields: Arc::new(fields),
        is_set,
        new_value: Arc::new(|| Box::new(S::default()) as Box<dyn Any>),
        clone_value: Arc::new(|value: &dyn Any| {
            value
                .downcast_ref::<S>()
                .map(|value| Box::new(value.clone()) as Box<dyn Any>)
                .ok_or_else(|| {
                    Error::from(CodecErrorKind::ValueMismatch {
                        expected: intern(core::any::type_name::<S>()),
                    })
                })
        }),
    };

    DESCRIPTORS.insert(TypeId::of::<S>(), descriptor.clone());

    let empty_descriptor = descriptor.clone();
    let with_descriptor = descriptor;
    codec::register_factories(
        TypeId::of::<S>(),
        Factories::from_fns(
            move || {
                Box::new(CompositeCodec {
                    descriptor: empty_descriptor.clone(),
                    value: None,
                })
            },
            move |value| {
                let value = (with_descriptor.clone_value)(value)?;
                Ok(Box::new(CompositeCodec {
                    descriptor: with_descriptor.clone(),
                    value: Some(value),
                }))
            },
        ),
    );

    Ok(())
}

/// Registers `S` as a SEQUENCE with the given component list. The
/// annotation holds type-level tokens (`automatic`, `with-components:NAME`,
/// tagging overrides).
pub fn register_sequence<S>(annotation: &str, fields: Vec<Field>) -> Result<()>
where
    S: Any + Clone + Default,
{
    register_composite::<S>(annotation, fields, false)
}

/// Registers `S` as a SET with the given component list.
pub fn register_set<S>(annotation: &str, fields: Vec<Field>) -> Result<()>
where
    S: Any + Clone + Default,
{
    register_composite::<S>(annotation, fields, true)
}

struct CompositeCodec {
    descriptor: CompositeDescriptor,
    value: Option<Box<dyn Any>>,
}

/// Derives the per-field overlay, applying AUTOMATIC tagging by position.
fn child_options(field: &Field, automatic: bool, position: u32) -> Result<Options> {
    let mut child = field.options.clone();
    if automatic {
        if child.explicit && child.tag.is_none() {
            return Err(OptionsErrorKind::ExplicitUnderAutomatic.into());
        }
        if child.tag.is_none() {
            child.tag = Some(position);
            child.class = Some(Class::Context);
        }
    }
    Ok(child)
}

fn missing(field: &Field) -> Error {
    CompositeErrorKind::MissingMandatoryField {
        name: intern(field.name),
    }
    .into()
}

/// Encodes the component list into one byte chunk per emitted element.
fn encode_fields(
    descriptor: &CompositeDescriptor,
    value: &dyn Any,
    rule: crate::rules::EncodingRules,
    automatic: bool,
    chunks: &mut Vec<Vec<u8>>,
) -> Result<()> {
    let mut position: u32 = 0;

    for field in descriptor.fields.iter() {
        if field.is_extension_marker() {
            continue;
        }

        let child = child_options(field, automatic, position)?;
        position += 1;

        if child.components_of {
            if !field.name.is_empty() {
                return Err(CompositeErrorKind::NonAnonymousComponentsOf {
                    name: intern(field.name),
                }
                .into());
            }
            let embedded = (field.get)(value)?.ok_or_else(|| missing(field))?;
            let inner = descriptor_of(field.value_type, field.type_name)?;
            encode_fields(
                &inner,
                embedded.as_ref(),
                rule,
                inner.options.automatic,
                chunks,
            )?;
            continue;
        }

        let field_value = match (field.get)(value)? {
            Some(field_value) => field_value,
            None => {
                if child.optional || child.default_value.is_some() {
                    continue;
                }
                return Err(missing(field));
            }
        };

        // A value equal to its DEFAULT produces no bytes.
        if let Some(default) = field.default_value()? {
            if (field.eq)(field_value.as_ref(), default.as_ref()) {
                continue;
            }
        }

        crate::constraints::check_named(&child.constraints, field_value.as_ref())?;

        let codec = super::encode_value_codec(
            field_value.as_ref(),
            field.value_type,
            field.type_name,
            &child,
        )?;
        let mut scratch = Pdu::new(rule);
        codec.write(&mut scratch, &child)?;
        chunks.push(scratch.into_bytes());
    }

    // Extensions are raw TLVs appended verbatim.
    for field in descriptor.fields.iter() {
        if !field.is_extension_marker() {
            continue;
        }
        if let Some(raw_list) = (field.get)(value)? {
            let raw_list = raw_list
                .downcast::<Vec<RawTlv>>()
                .map_err(|_| Error::custom("extension field must hold raw TLVs"))?;
            for raw in raw_list.iter() {
                chunks.push(raw.contents.clone());
            }
        }
    }

    Ok(())
}

type PresenceMap = HashMap<&'static str, bool>;

fn apply_default_or_skip(field: &Field, dest: &mut dyn Any, child: &Options) -> Result<()> {
    if let Some(default) = field.default_value()? {
        (field.set)(dest, default)
    } else if child.optional {
        Ok(())
    } else {
        Err(missing(field))
    }
}

fn absorb_extensions(sub: &mut Pdu, raw_list: &mut Vec<RawTlv>) -> Result<()> {
    while !sub.is_exhausted() {
        let start = sub.offset();
        {
            sub.read_tlv(&Options::default())?;
        }
        let end = sub.offset();
        raw_list.push(RawTlv::new(sub.as_bytes()[start..end].to_vec()));
    }
    Ok(())
}

fn decode_fields(
    descriptor: &CompositeDescriptor,
    dest: &mut dyn Any,
    sub: &mut Pdu,
    automatic: bool,
    presence: &mut PresenceMap,
) -> Result<()> {
    if descriptor.is_set {
        decode_set_fields(descriptor, dest, sub, automatic, presence)
    } else {
        decode_sequence_fields(descriptor, dest, sub, automatic, presence)
    }
}

fn decode_sequence_fields(
    descriptor: &CompositeDescriptor,
    dest: &mut dyn Any,
    sub: &mut Pdu,
    automatic: bool,
    presence: &mut PresenceMap,
) -> Result<()> {
    let mut position: u32 = 0;
    let mut extension_field: Option<&Field> = None;

    for field in descriptor.fields.iter() {
        if field.is_extension_marker() {
            extension_field = Some(field);
            continue;
        }

        let child = child_options(field, automatic, position)?;
        position += 1;

        if child.components_of {
            if !field.name.is_empty() {
                return Err(CompositeErrorKind::NonAnonymousComponentsOf {
                    name: intern(field.name),
                }
                .into());
            }
            let inner = descriptor_of(field.value_type, field.type_name)?;
            let mut embedded = (inner.new_value)();
            let mut inner_presence = PresenceMap::new();
            decode_fields(
                &inner,
                embedded.as_mut(),
                sub,
                inner.options.automatic,
                &mut inner_presence,
            )?;
            (field.set)(dest, embedded)?;
            continue;
        }

        if sub.is_exhausted() {
            presence.insert(field.name, false);
            apply_default_or_skip(field, dest, &child)?;
            continue;
        }

        let peeked = sub.peek_tlv(&Options::default())?.identifier;
        let mut decoder = ValueDecoder::for_type(field.value_type, field.type_name, &child)?;

        if decoder.matches(peeked.tag, &child) {
            decoder.decode(sub, &child)?;
            let decoded = decoder.into_value()?;
            crate::constraints::check_named(&child.constraints, decoded.as_ref())?;
            (field.set)(dest, decoded)?;
            presence.insert(field.name, true);
        } else {
            presence.insert(field.name, false);
            apply_default_or_skip(field, dest, &child)?;
        }
    }

    finish_children(dest, sub, extension_field)
}

fn decode_set_fields(
    descriptor: &CompositeDescriptor,
    dest: &mut dyn Any,
    sub: &mut Pdu,
    automatic: bool,
    presence: &mut PresenceMap,
) -> Result<()> {
    let fields = &descriptor.fields;
    let mut seen = vec![false; fields.len()];
    let mut extension_field: Option<&Field> = None;
    let mut raw_extensions: Vec<RawTlv> = Vec::new();

    let children: Vec<(usize, Options)> = {
        let mut position: u32 = 0;
        let mut list = Vec::new();
        for (index, field) in fields.iter().enumerate() {
            if field.is_extension_marker() {
                extension_field = Some(field);
                continue;
            }
            list.push((index, child_options(field, automatic, position)?));
            position += 1;
        }
        list
    };

    'children: while !sub.is_exhausted() {
        let peeked = sub.peek_tlv(&Options::default())?.identifier;

        for (index, child) in &children {
            if seen[*index] {
                continue;
            }
            let field = &fields[*index];
            let mut decoder = ValueDecoder::for_type(field.value_type, field.type_name, child)?;
            if decoder.matches(peeked.tag, child) {
                decoder.decode(sub, child)?;
                let decoded = decoder.into_value()?;
                crate::constraints::check_named(&child.constraints, decoded.as_ref())?;
                (field.set)(dest, decoded)?;
                presence.insert(field.name, true);
                seen[*index] = true;
                continue 'children;
            }
        }

        if extension_field.is_some() {
            let start = sub.offset();
            sub.read_tlv(&Options::default())?;
            let end = sub.offset();
            raw_extensions.push(RawTlv::new(sub.as_bytes()[start..end].to_vec()));
            continue;
        }

        return Err(CompositeErrorKind::UnknownField {
            index: sub.offset(),
            tag: peeked.tag,
        }
        .into());
    }

    for (index, child) in &children {
        if seen[*index] {
            continue;
        }
        let field = &fields[*index];
        presence.insert(field.name, false);
        apply_default_or_skip(field, dest, child)?;
    }

    if let Some(field) = extension_field {
        (field.set)(dest, Box::new(raw_extensions))?;
    }

    Ok(())
}

fn finish_children(
    dest: &mut dyn Any,
    sub: &mut Pdu,
    extension_field: Option<&Field>,
) -> Result<()> {
    match extension_field {
        Some(field) => {
            let mut raw_list = Vec::new();
            absorb_extensions(sub, &mut raw_list)?;
            (field.set)(dest, Box::new(raw_list))
        }
        None => {
            if sub.is_exhausted() {
                Ok(())
            } else {
                let peeked = sub.peek_tlv(&Options::default())?.identifier;
                Err(CompositeErrorKind::UnknownField {
                    index: sub.offset(),
                    tag: peeked.tag,
                }
                .into())
            }
        }
    }
}

fn enforce_with_components(
    descriptor: &CompositeDescriptor,
    overlay: &Options,
    presence: &PresenceMap,
) -> Result<()> {
    let names = descriptor
        .options
        .with_components
        .iter()
        .chain(overlay.with_components.iter());

    for name in names {
        let rules = registry::with_components_rules(name).ok_or_else(|| {
            Error::custom(format!("no WITH COMPONENTS rules registered under `{name}`"))
        })?;
        for (component, requirement) in rules.iter() {
            let present = presence.get(component.as_str()).copied().unwrap_or(false);
            let satisfied = match requirement {
                Presence::Present => present,
                Presence::Absent => !present,
            };
            if !satisfied {
                return Err(CompositeErrorKind::WithComponents {
                    field: intern(component),
                    requirement: intern(match requirement {
                        Presence::Present => "PRESENT",
                        Presence::Absent => "ABSENT",
                    }),
                }
                .into());
            }
        }
    }

    Ok(())
}

impl Codec for CompositeCodec {
    fn tag(&self) -> Tag {
        if self.descriptor.is_set {
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

        let automatic = self.descriptor.options.automatic || options.automatic;
        let mut sub = Pdu::from_bytes(tlv.rule, tlv.contents);
        let mut value = (self.descriptor.new_value)();
        let mut presence = PresenceMap::new();

        decode_fields(
            &self.descriptor,
            value.as_mut(),
            &mut sub,
            automatic,
            &mut presence,
        )?;
        enforce_with_components(&self.descriptor, options, &presence)?;

        self.value = Some(value);
        Ok(())
    }

    fn write(&self, pdu: &mut Pdu, options: &Options) -> Result<usize> {
        let value = self.value.as_ref().ok_or_else(|| {
            Error::from(CodecErrorKind::ValueMismatch {
                expected: intern(self.descriptor.type_name),
            })
        })?;

        let automatic = self.descriptor.options.automatic || options.automatic;
        let mut chunks = Vec::new();
        encode_fields(
            &self.descriptor,
            value.as_ref(),
            pdu.rule(),
            automatic,
            &mut chunks,
        )?;

        if self.descriptor.is_set && pdu.rule().canonical_ordering() {
            chunks.sort();
        }

        let contents: Vec<u8> = chunks.concat();

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
        let value = (self.descriptor.clone_value)(value.as_ref())?;
        self.value = Some(value);
        Ok(())
    }

    fn value(&self) -> Option<Box<dyn Any>> {
        self.value
            .as_ref()
            .and_then(|value| (self.descriptor.clone_value)(value.as_ref()).ok())
    }
}
