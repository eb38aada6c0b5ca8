//! # Native-type adapters
//!
//! Bridges between platform-native scalar types and the registered ASN.1
//! value types. An adapter is looked up by `(type, keyword)`; the empty
//! keyword names the default adapter for a type, and a chain of candidates
//! is tried in order at encode time — the first successful projection wins.

use std::any::{Any, TypeId};
use std::sync::Arc;
use std::time::SystemTime;

use num_bigint::{BigInt, BigUint};
use once_cell::sync::Lazy;

use crate::codec::{self, Codec};
use crate::error::{intern, AdapterErrorKind, Error, PrimitiveErrorKind, Result};
use crate::registry::VersionedRegistry;
use crate::types::{
    BitString, BmpString, Enumerated, GeneralString, GeneralizedTime, GraphicString, Ia5String,
    Integer, NumericString, PrintableString, TeletexString, UniversalString, UtcTime,
    VisibleString,
};

/// One native-to-ASN.1 binding: the target type's identity plus the two
/// projections.
#[derive(Clone)]
pub(crate) struct Adapter {
    target: TypeId,
    wrap: Arc<dyn Fn(&dyn Any) -> Result<Box<dyn Any>> + Send + Sync>,
    unwrap: Arc<dyn Fn(Box<dyn Any>) -> Result<Box<dyn Any>> + Send + Sync>,
}

static ADAPTERS: Lazy<VersionedRegistry<(TypeId, String), Vec<Adapter>>> =
    Lazy::new(VersionedRegistry::new);

/// Binds native type `T` to registered ASN.1 type `A` under each keyword
/// in `aliases` (the empty list registers the default adapter). `ctor`
/// builds the ASN.1 value at encode time; `projector` recovers the native
/// value after decode. Later registrations under the same keyword are
/// tried first.
pub fn register_adapter<T, A>(
    ctor: impl Fn(&T) -> Result<A> + Send + Sync + 'static,
    projector: impl Fn(&A) -> Result<T> + Send + Sync + 'static,
    aliases: &[&str],
) where
    T: Any,
    A: Any + Clone + Send + Sync,
{
    let ctor = Arc::new(ctor);
    let projector = Arc::new(projector);

    let adapter = Adapter {
        target: TypeId::of::<A>(),
        wrap: Arc::new({
            let ctor = ctor.clone();
            move |value: &dyn Any| {
                let value = value.downcast_ref::<T>().ok_or_else(type_mismatch::<T>)?;
                Ok(Box::new(ctor(value)?) as Box<dyn Any>)
            }
        }),
        unwrap: Arc::new(move |value: Box<dyn Any>| {
            let value = value.downcast::<A>().map_err(|_| type_mismatch::<A>())?;
            Ok(Box::new(projector(&value)?) as Box<dyn Any>)
        }),
    };

    let keywords: Vec<String> = if aliases.is_empty() {
        vec![String::new()]
    } else {
        aliases.iter().map(|alias| alias.to_ascii_lowercase()).collect()
    };

    for keyword in keywords {
        let key = (TypeId::of::<T>(), keyword);
        let mut chain = ADAPTERS.get(&key).unwrap_or_default();
        chain.insert(0, adapter.clone());
        ADAPTERS.insert(key, chain);
    }
}

fn type_mismatch<T>() -> Error {
    AdapterErrorKind::ProjectionFailed {
        msg: intern(&format!(
            "value is not a `{}`",
            core::any::type_name::<T>()
        )),
    }
    .into()
}

fn chain_for(type_id: TypeId, keyword: &str) -> Option<Vec<Adapter>> {
    ensure_builtin_adapters();
    ADAPTERS.get(&(type_id, keyword.to_ascii_lowercase()))
}

/// Whether any adapter is registered for the pair.
pub(crate) fn has_chain(type_id: TypeId, keyword: &str) -> bool {
    chain_for(type_id, keyword).is_some()
}

fn not_found(type_name: &'static str, keyword: &str) -> Error {
    AdapterErrorKind::NotFound {
        type_name: intern(type_name),
        keyword: intern(keyword),
    }
    .into()
}

/// Builds a codec for a native value by trying the adapter chain in order.
pub(crate) fn encode_codec_for(
    value: &dyn Any,
    type_id: TypeId,
    type_name: &'static str,
    keyword: &str,
) -> Result<Box<dyn Codec>> {
    let chain = chain_for(type_id, keyword).ok_or_else(|| not_found(type_name, keyword))?;

    let mut last_error = None;
    for adapter in &chain {
        match (adapter.wrap)(value) {
            Ok(asn_value) => {
                let factories = codec::factories_for(adapter.target)
                    .ok_or_else(|| not_found(type_name, keyword))?;
                return factories.with_value(asn_value.as_ref());
            }
            Err(error) => last_error = Some(error),
        }
    }

    Err(last_error.unwrap_or_else(|| not_found(type_name, keyword)))
}

/// The decode half: an empty codec for the adapter's target type plus the
/// projection that fills the native destination afterwards.
pub(crate) struct DecodeAdapter {
    pub(crate) codec: Box<dyn Codec>,
    adapter: Adapter,
}

impl DecodeAdapter {
    /// The decoded value projected back to the native type, boxed.
    pub(crate) fn project(&self) -> Result<Box<dyn Any>> {
        let value = self
            .codec
            .value()
            .ok_or_else(|| Error::custom("adapter target codec holds no value"))?;
        (self.adapter.unwrap)(value)
    }

    /// Projects the decoded value into a statically-typed destination.
    pub(crate) fn project_into<T: Any>(self, dest: &mut T) -> Result<()> {
        let projected = self.project()?;
        match projected.downcast::<T>() {
            Ok(value) => {
                *dest = *value;
                Ok(())
            }
            Err(_) => Err(type_mismatch::<T>()),
        }
    }
}

pub(crate) fn decode_adapter_for(
    type_id: TypeId,
    type_name: &'static str,
    keyword: &str,
) -> Result<DecodeAdapter> {
    let chain = chain_for(type_id, keyword).ok_or_else(|| not_found(type_name, keyword))?;
    let adapter = chain
        .first()
        .cloned()
        .ok_or_else(|| not_found(type_name, keyword))?;
    let codec = codec::factories_for(adapter.target)
        .ok_or_else(|| not_found(type_name, keyword))?
        .empty();
    Ok(DecodeAdapter { codec, adapter })
}

fn overflow(width: u32) -> Error {
    PrimitiveErrorKind::IntegerOverflow { max_width: width }.into()
}

macro_rules! integer_adapters {
    ($($int:ty => $width:expr),+ $(,)?) => {
        $(
            register_adapter::<$int, Integer>(
                |value| Ok(Integer::from(BigInt::from(*value))),
                |wire| {
                    <$int>::try_from(wire.to_big()).map_err(|_| overflow($width))
                },
                &["integer"],
            );
            register_adapter::<$int, Integer>(
                |value| Ok(Integer::from(BigInt::from(*value))),
                |wire| {
                    <$int>::try_from(wire.to_big()).map_err(|_| overflow($width))
                },
                &[],
            );
            register_adapter::<$int, Enumerated>(
                |value| Ok(Enumerated(Integer::from(BigInt::from(*value)))),
                |wire| {
                    <$int>::try_from(wire.0.to_big()).map_err(|_| overflow($width))
                },
                &["enumerated"],
            );
        )+
    }
}

macro_rules! text_adapters {
    ($($target:ty => $keyword:literal),+ $(,)?) => {
        $(
            register_adapter::<String, $target>(
                |value| <$target>::from_bytes(value.as_bytes()),
                |wire| Ok(String::from_utf8_lossy(wire.as_bytes()).into_owned()),
                &[$keyword],
            );
        )+
    }
}

static BUILTIN_ADAPTERS: Lazy<()> = Lazy::new(|| {
    integer_adapters! {
        i8 => 8, i16 => 16, i32 => 32, i64 => 64,
        u8 => 8, u16 => 16, u32 => 32, u64 => 64,
        isize => 64, usize => 64,
    }

    register_adapter::<BigInt, Integer>(
        |value| Ok(Integer::from(value.clone())),
        |wire| Ok(wire.to_big()),
        &["integer"],
    );
    register_adapter::<BigInt, Integer>(
        |value| Ok(Integer::from(value.clone())),
        |wire| Ok(wire.to_big()),
        &[],
    );
    register_adapter::<BigUint, Integer>(
        |value| Ok(Integer::from(BigInt::from(value.clone()))),
        |wire| {
            BigUint::try_from(wire.to_big())
                .map_err(|_| Error::custom("INTEGER is negative, expected unsigned"))
        },
        &[],
    );

    // The default String binding is the direct UTF8String codec; keywords
    // select a restricted repertoire instead.
    register_adapter::<String, String>(|value| Ok(value.clone()), |wire| Ok(wire.clone()), &[
        "utf8",
    ]);
    register_adapter::<String, String>(|value| Ok(value.clone()), |wire| Ok(wire.clone()), &[]);

    text_adapters! {
        NumericString => "numeric",
        PrintableString => "printable",
        Ia5String => "ia5",
        VisibleString => "visible",
        TeletexString => "t61",
        GraphicString => "graphic",
        GeneralString => "general",
    }

    register_adapter::<String, BmpString>(
        |value| Ok(BmpString::from(value.as_str())),
        |wire| Ok(wire.as_str().to_owned()),
        &["bmp"],
    );
    register_adapter::<String, UniversalString>(
        |value| Ok(UniversalString::from(value.as_str())),
        |wire| Ok(wire.as_str().to_owned()),
        &["universal-string"],
    );

    register_adapter::<Vec<u8>, Vec<u8>>(
        |value| Ok(value.clone()),
        |wire| Ok(wire.clone()),
        &["octet-string"],
    );
    register_adapter::<Vec<u8>, BitString>(
        |value| Ok(BitString::from_slice(value)),
        |wire| {
            let mut bytes = vec![0u8; wire.len().div_ceil(8)];
            for (index, bit) in wire.iter().enumerate() {
                if *bit {
                    bytes[index / 8] |= 0x80 >> (index % 8);
                }
            }
            Ok(bytes)
        },
        &["bit-string"],
    );

    register_adapter::<f32, f64>(
        |value| Ok(f64::from(*value)),
        |wire| Ok(*wire as f32),
        &["real"],
    );
    register_adapter::<f32, f64>(
        |value| Ok(f64::from(*value)),
        |wire| Ok(*wire as f32),
        &[],
    );

    register_adapter::<SystemTime, GeneralizedTime>(
        |value| {
            let utc: chrono::DateTime<chrono::Utc> = (*value).into();
            Ok(utc.fixed_offset())
        },
        |wire| Ok(SystemTime::from(*wire)),
        &["generalized-time"],
    );
    register_adapter::<SystemTime, GeneralizedTime>(
        |value| {
            let utc: chrono::DateTime<chrono::Utc> = (*value).into();
            Ok(utc.fixed_offset())
        },
        |wire| Ok(SystemTime::from(*wire)),
        &[],
    );
    register_adapter::<SystemTime, UtcTime>(
        |value| Ok((*value).into()),
        |wire| Ok(SystemTime::from(*wire)),
        &["utc-time"],
    );
});

pub(crate) fn ensure_builtin_adapters() {
    Lazy::force(&BUILTIN_ADAPTERS);
}
