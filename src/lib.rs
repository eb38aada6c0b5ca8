//! # x690
//!
//! An ASN.1 codec for the X.690 family of encoding rules: Basic (BER),
//! Canonical (CER), and Distinguished (DER).
//!
//! The crate is registry-driven: every encodable type is bound at runtime
//! to a pair of codec factories, either as one of the built-in value types
//! in [`types`], through a `register_*_alias` call binding a user type to a
//! primitive family, through [`register_sequence`]/[`register_set`] with
//! explicit field descriptors, or through the adapter layer bridging
//! native scalars.
//!
//! ```
//! use x690::{marshal_with, unmarshal, Options};
//!
//! let options = Options::parse("der").unwrap();
//! let pdu = marshal_with(&x690::types::Integer::from(42), &options).unwrap();
//! assert_eq!(&[0x02, 0x01, 0x2A], pdu.as_bytes());
//!
//! let mut decoded = x690::types::Integer::default();
//! let mut reader = x690::Pdu::from_bytes(x690::EncodingRules::Der, pdu.as_bytes());
//! unmarshal(&mut reader, &mut decoded).unwrap();
//! assert_eq!(x690::types::Integer::from(42), decoded);
//! ```

mod adapters;
mod codec;
mod composite;
pub mod constraints;
pub mod error;
mod identifier;
mod options;
mod primitives;
mod registry;
mod rules;
mod tag;
pub mod types;
mod wire;

pub use crate::{
    adapters::register_adapter,
    codec::{
        register_bitstring_alias, register_boolean_alias, register_duration_alias,
        register_integer_alias, register_oid_alias, register_real_alias,
        register_relative_oid_alias, register_temporal_alias, register_text_alias, AliasConfig,
        Codec, DecodeVerifier, Factories,
    },
    composite::{
        register_choices, register_sequence, register_sequence_of, register_set, register_set_of,
        unregister_choices, Choice, ChoicesDescriptor, Field, SetOf,
    },
    constraints::{
        register_constraint_group, unregister_constraint_group, Constraint, ConstraintGroup, Phase,
    },
    error::{Error, ErrorKind},
    identifier::Identifier,
    options::{DefaultSpec, Options},
    primitives::real::RealForm,
    registry::{
        register_default_value, register_override_options, register_with_components,
        unregister_default_value, unregister_with_components, Presence, WithComponentsRules,
    },
    rules::EncodingRules,
    tag::{Class, Tag},
    wire::{Length, Pdu, Tlv},
};

use std::any::{Any, TypeId};

use crate::error::Result;

/// A prelude containing the registration surface and value types.
pub mod prelude {
    pub use crate::types::*;
    pub use crate::{
        marshal, marshal_with, register_adapter, register_choices, register_default_value,
        register_sequence, register_sequence_of, register_set, register_set_of,
        register_with_components, unmarshal, unmarshal_with, Choice, ChoicesDescriptor, Class,
        EncodingRules, Error, Field, Options, Pdu, SetOf, Tag,
    };
}

/// The options in effect for one top-level call: the per-call overlay, or
/// the type's registered override options when the overlay carries nothing
/// beyond a rule selection.
fn effective_options<T: Any>(options: &Options) -> Options {
    let mut rule_stripped = options.clone();
    rule_stripped.rule = None;

    if rule_stripped == Options::default() {
        if let Some(registered) = registry::override_options(TypeId::of::<T>()) {
            let mut merged = (*registered).clone();
            merged.rule = options.rule.or(merged.rule);
            return merged;
        }
    }

    options.clone()
}

/// Encodes `value` under BER into a fresh [`Pdu`].
pub fn marshal<T: Any>(value: &T) -> Result<Pdu> {
    marshal_with(value, &Options::default())
}

/// Encodes `value` into a fresh [`Pdu`], honoring the option overlay
/// (including its rule selection; BER is the default).
///
/// On error no partial PDU is surfaced.
pub fn marshal_with<T: Any>(value: &T, options: &Options) -> Result<Pdu> {
    let options = effective_options::<T>(options);
    let rule = options.rule.unwrap_or(EncodingRules::Ber);

    constraints::check_named(&options.constraints, value)?;

    let codec = composite::encode_value_codec(
        value,
        TypeId::of::<T>(),
        core::any::type_name::<T>(),
        &options,
    )?;

    let mut pdu = Pdu::new(rule);
    codec.write(&mut pdu, &options)?;
    Ok(pdu)
}

/// Decodes the value at the PDU's cursor into `dest`.
pub fn unmarshal<T: Any>(pdu: &mut Pdu, dest: &mut T) -> Result<()> {
    unmarshal_with(pdu, dest, &Options::default())
}

/// Decodes the value at the PDU's cursor into `dest`, honoring the option
/// overlay.
///
/// On error `dest` is left in its pre-call state.
pub fn unmarshal_with<T: Any>(pdu: &mut Pdu, dest: &mut T, options: &Options) -> Result<()> {
    let options = effective_options::<T>(options);

    let mut decoder = composite::ValueDecoder::for_type(
        TypeId::of::<T>(),
        core::any::type_name::<T>(),
        &options,
    )?;
    decoder.decode(pdu, &options)?;

    let value = decoder.into_value()?;
    constraints::check_named(&options.constraints, value.as_ref())?;
    match value.downcast::<T>() {
        Ok(value) => {
            *dest = *value;
            Ok(())
        }
        Err(_) => Err(error::CodecErrorKind::ValueMismatch {
            expected: error::intern(core::any::type_name::<T>()),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use pretty_assertions::assert_eq;

    fn rule_options(rule: &str) -> Options {
        Options::parse(rule).unwrap()
    }

    #[track_caller]
    fn round_trip<T>(rule: &str, value: &T, expected: &[u8])
    where
        T: std::any::Any + Default + PartialEq + core::fmt::Debug,
    {
        let options = rule_options(rule);
        let pdu = marshal_with(value, &options).unwrap();
        assert_eq!(expected, pdu.as_bytes());

        let mut decoded = T::default();
        let mut reader = Pdu::from_bytes(pdu.rule(), pdu.as_bytes());
        unmarshal_with(&mut reader, &mut decoded, &options).unwrap();
        assert_eq!(value, &decoded);
    }

    #[test]
    fn integer_boundaries() {
        round_trip("der", &Integer::from(0), &[0x02, 0x01, 0x00]);
        round_trip("der", &Integer::from(-128), &[0x02, 0x01, 0x80]);
        round_trip("der", &Integer::from(128), &[0x02, 0x02, 0x00, 0x80]);
        round_trip("der", &Integer::from(-129), &[0x02, 0x02, 0xFF, 0x7F]);
    }

    #[test]
    fn booleans() {
        round_trip("der", &true, &[0x01, 0x01, 0xFF]);
        round_trip("der", &false, &[0x01, 0x01, 0x00]);

        // BER accepts any non-zero octet as TRUE on decode.
        let mut decoded = false;
        let mut reader = Pdu::from_bytes(EncodingRules::Ber, &[0x01, 0x01, 0x01]);
        unmarshal(&mut reader, &mut decoded).unwrap();
        assert!(decoded);
    }

    #[test]
    fn null() {
        round_trip("der", &(), &[0x05, 0x00]);
    }

    #[test]
    fn object_identifier_vector() {
        let oid: ObjectIdentifier = "1.3.6.1.4.1.56521".parse().unwrap();
        round_trip(
            "der",
            &oid,
            &[0x06, 0x08, 0x2B, 0x06, 0x01, 0x04, 0x01, 0x83, 0xB9, 0x49],
        );
    }

    #[test]
    fn utf8_hello() {
        round_trip(
            "der",
            &String::from("Hello"),
            &[0x0C, 0x05, 0x48, 0x65, 0x6C, 0x6C, 0x6F],
        );
        round_trip(
            "cer",
            &String::from("Hello"),
            &[0x0C, 0x05, 0x48, 0x65, 0x6C, 0x6C, 0x6F],
        );
    }

    #[test]
    fn machine_integers_through_adapters() {
        round_trip("der", &42i32, &[0x02, 0x01, 0x2A]);
        round_trip("ber", &-1i64, &[0x02, 0x01, 0xFF]);
        round_trip("der", &65535u32, &[0x02, 0x03, 0x00, 0xFF, 0xFF]);
    }

    #[test]
    fn sequence_of_round_trip() {
        let values = vec![Integer::from(1), Integer::from(2)];
        round_trip(
            "der",
            &values,
            &[0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02],
        );
    }

    #[test]
    fn set_of_orders_canonically() {
        let values = SetOf::from(vec![Integer::from(300), Integer::from(2)]);
        // 2 encodes shorter, so it sorts first under DER.
        let pdu = marshal_with(&values, &rule_options("der")).unwrap();
        assert_eq!(
            &[0x31, 0x07, 0x02, 0x01, 0x02, 0x02, 0x02, 0x01, 0x2C],
            pdu.as_bytes()
        );

        // Decoding yields the canonical order.
        let mut decoded = SetOf::<Integer>::new();
        let mut reader = Pdu::from_bytes(EncodingRules::Der, pdu.as_bytes());
        unmarshal(&mut reader, &mut decoded).unwrap();
        assert_eq!(
            SetOf::from(vec![Integer::from(2), Integer::from(300)]),
            decoded
        );
    }

    #[test]
    fn set_of_decode_rejects_disorder_under_der() {
        let mut decoded = SetOf::<Integer>::new();
        let mut reader = Pdu::from_bytes(
            EncodingRules::Der,
            &[0x31, 0x07, 0x02, 0x02, 0x01, 0x2C, 0x02, 0x01, 0x02],
        );
        assert!(unmarshal(&mut reader, &mut decoded).is_err());

        // BER imposes no ordering.
        let mut reader = Pdu::from_bytes(
            EncodingRules::Ber,
            &[0x31, 0x07, 0x02, 0x02, 0x01, 0x2C, 0x02, 0x01, 0x02],
        );
        unmarshal(&mut reader, &mut decoded).unwrap();
        assert_eq!(2, decoded.len());
    }

    #[test]
    fn decode_failure_leaves_destination_untouched() {
        let mut decoded = Integer::from(7);
        let mut reader = Pdu::from_bytes(EncodingRules::Der, &[0x01, 0x01, 0xFF]);
        assert!(unmarshal(&mut reader, &mut decoded).is_err());
        assert_eq!(Integer::from(7), decoded);
    }

    #[test]
    fn override_options_apply_when_no_overlay_given() {
        #[derive(Debug, Clone, Default, PartialEq)]
        struct Wrapped(i64);

        crate::register_integer_alias::<Wrapped>(crate::AliasConfig::new(
            |value: &Wrapped| Ok(Integer::from(value.0)),
            |wire| {
                wire.to_i64()
                    .map(Wrapped)
                    .ok_or_else(|| Error::custom("out of range"))
            },
        ));
        crate::register_override_options::<Wrapped>(Options::parse("tag:7").unwrap());

        let pdu = marshal_with(&Wrapped(3), &Options::parse("der").unwrap()).unwrap();
        assert_eq!(&[0x87, 0x01, 0x03], pdu.as_bytes());

        let mut decoded = Wrapped::default();
        let mut reader = Pdu::from_bytes(EncodingRules::Der, pdu.as_bytes());
        unmarshal(&mut reader, &mut decoded).unwrap();
        assert_eq!(Wrapped(3), decoded);
    }

    #[test]
    fn indefinite_length_under_ber() {
        let options = Options::parse("ber, indefinite").unwrap();
        let values = vec![Integer::from(1)];
        let pdu = marshal_with(&values, &options).unwrap();
        assert_eq!(
            &[0x30, 0x80, 0x02, 0x01, 0x01, 0x00, 0x00],
            pdu.as_bytes()
        );

        let mut decoded: Vec<Integer> = Vec::new();
        let mut reader = Pdu::from_bytes(EncodingRules::Ber, pdu.as_bytes());
        unmarshal(&mut reader, &mut decoded).unwrap();
        assert_eq!(values, decoded);
    }
}
