//! Field descriptors for SEQUENCE and SET types.
//!
//! Rust has no runtime field reflection, so composite registration supplies
//! one descriptor per field: accessor closures over the containing struct,
//! plus the field's annotation parsed into [`Options`].

use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::error::{intern, CodecErrorKind, Error, Result};
use crate::options::Options;
use crate::types::Any as RawTlv;

type GetFn = Arc<dyn Fn(&dyn Any) -> Result<Option<Box<dyn Any>>> + Send + Sync>;
type SetFn = Arc<dyn Fn(&mut dyn Any, Box<dyn Any>) -> Result<()> + Send + Sync>;
type EqFn = Arc<dyn Fn(&dyn Any, &dyn Any) -> bool + Send + Sync>;
type LiteralFn = Arc<dyn Fn(&str) -> Result<Box<dyn Any>> + Send + Sync>;

fn struct_mismatch<S>() -> Error {
    CodecErrorKind::ValueMismatch {
        expected: intern(core::any::type_name::<S>()),
    }
    .into()
}

/// One component of a SEQUENCE or SET.
#[derive(Clone)]
pub struct Field {
    pub(crate) name: &'static str,
    pub(crate) options: Options,
    pub(crate) value_type: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) get: GetFn,
    pub(crate) set: SetFn,
    pub(crate) eq: EqFn,
    pub(crate) parse_literal: Option<LiteralFn>,
}

impl Field {
    /// A field of `S` holding a `V`, with its annotation text.
    ///
    /// `get` returns `None` when an OPTIONAL field is absent; for
    /// mandatory fields it always returns `Some`.
    pub fn new<S, V>(
        name: &'static str,
        annotation: &str,
        get: impl Fn(&S) -> Option<V> + Send + Sync + 'static,
        set: impl Fn(&mut S, V) + Send + Sync + 'static,
    ) -> Result<Self>
    where
        S: Any,
        V: Any + Clone + PartialEq,
    {
        let options = Options::parse(annotation)?;
        Ok(Self {
            name,
            options,
            value_type: TypeId::of::<V>(),
            type_name: core::any::type_name::<V>(),
            get: Arc::new(move |container: &dyn Any| {
                let container = container.downcast_ref::<S>().ok_or_else(struct_mismatch::<S>)?;
                Ok(get(container).map(|value| Box::new(value) as Box<dyn Any>))
            }),
            set: Arc::new(move |container: &mut dyn Any, value: Box<dyn Any>| {
                let container = container.downcast_mut::<S>().ok_or_else(struct_mismatch::<S>)?;
                let value = value.downcast::<V>().map_err(|_| struct_mismatch::<V>())?;
                set(container, *value);
                Ok(())
            }),
            eq: Arc::new(|lhs: &dyn Any, rhs: &dyn Any| {
                match (lhs.downcast_ref::<V>(), rhs.downcast_ref::<V>()) {
                    (Some(lhs), Some(rhs)) => lhs == rhs,
                    _ => false,
                }
            }),
            parse_literal: None,
        })
    }

    /// The trailing extensions field, declared by the `...` marker: a list
    /// of raw TLVs appended verbatim on encode and absorbed on decode.
    pub fn extensions<S>(
        get: impl Fn(&S) -> Vec<RawTlv> + Send + Sync + 'static,
        set: impl Fn(&mut S, Vec<RawTlv>) + Send + Sync + 'static,
    ) -> Result<Self>
    where
        S: Any,
    {
        Self::new::<S, Vec<RawTlv>>("...", "...", move |container| Some(get(container)), set)
    }

    /// Installs the parser consulted for an inline `default:LITERAL`
    /// annotation on this field.
    pub fn with_literal_parser<V>(
        mut self,
        parse: impl Fn(&str) -> Result<V> + Send + Sync + 'static,
    ) -> Self
    where
        V: Any,
    {
        self.parse_literal = Some(Arc::new(move |text: &str| {
            Ok(Box::new(parse(text)?) as Box<dyn Any>)
        }));
        self
    }

    pub(crate) fn is_extension_marker(&self) -> bool {
        self.options.extension
    }

    /// Resolves this field's DEFAULT value, if one is declared.
    pub(crate) fn default_value(&self) -> Result<Option<Box<dyn Any>>> {
        match &self.options.default_value {
            None => Ok(None),
            Some(crate::options::DefaultSpec::Named(name)) => {
                crate::registry::default_value(name)
                    .map(Some)
                    .ok_or_else(|| {
                        Error::custom(format!("no default value registered under `{name}`"))
                    })
            }
            Some(crate::options::DefaultSpec::Literal(literal)) => {
                let parse = self.parse_literal.as_ref().ok_or_else(|| {
                    Error::custom(format!(
                        "field `{}` has a literal default but no literal parser",
                        self.name
                    ))
                })?;
                parse(literal).map(Some)
            }
        }
    }
}

impl core::fmt::Debug for Field {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("type", &self.type_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Sample {
        count: i64,
        label: Option<String>,
    }

    #[test]
    fn accessors_round_trip() {
        let field = Field::new::<Sample, i64>(
            "count",
            "tag:0",
            |sample| Some(sample.count),
            |sample, value| sample.count = value,
        )
        .unwrap();

        let mut sample = Sample::default();
        field
            .set
            .as_ref()(&mut sample, Box::new(9i64))
            .unwrap();
        assert_eq!(9, sample.count);

        let fetched = (field.get)(&sample).unwrap().unwrap();
        assert_eq!(Some(&9i64), fetched.downcast_ref::<i64>());
        assert_eq!(Some(0), field.options.tag);
    }

    #[test]
    fn optional_absence() {
        let field = Field::new::<Sample, String>(
            "label",
            "optional",
            |sample| sample.label.clone(),
            |sample, value| sample.label = Some(value),
        )
        .unwrap();

        let sample = Sample::default();
        assert!((field.get)(&sample).unwrap().is_none());
        assert!(field.options.optional);
    }

    #[test]
    fn literal_defaults() {
        let field = Field::new::<Sample, i64>(
            "count",
            "optional, default:5",
            |sample| Some(sample.count),
            |sample, value| sample.count = value,
        )
        .unwrap()
        .with_literal_parser(|text| {
            text.parse::<i64>().map_err(|_| Error::custom("bad default"))
        });

        let value = field.default_value().unwrap().unwrap();
        assert_eq!(Some(&5i64), value.downcast_ref::<i64>());
    }

    #[test]
    fn deep_equality() {
        let field = Field::new::<Sample, i64>(
            "count",
            "",
            |sample| Some(sample.count),
            |sample, value| sample.count = value,
        )
        .unwrap();

        assert!((field.eq)(&7i64, &7i64));
        assert!(!(field.eq)(&7i64, &8i64));
        assert!(!(field.eq)(&7i64, &String::from("7")));
    }
}
