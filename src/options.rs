//! # Field options
//!
//! Per-field tagging and behaviour modifiers, parsed from a comma-separated
//! annotation string. A parsed [`Options`] value overlays the defaults of a
//! codec for the duration of one field's encode or decode.

use crate::error::{intern, Error, OptionsErrorKind, Result};
use crate::rules::EncodingRules;
use crate::tag::Class;

/// How a `default:` annotation names its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultSpec {
    /// `default:LITERAL` — the literal text, parsed by the field's codec.
    Literal(String),
    /// `default::NAME` — a key into the process-wide default-value registry.
    Named(String),
}

/// Type keywords understood by the adapter layer. A bare annotation token
/// must be one of these to be accepted.
pub(crate) const TYPE_KEYWORDS: &[&str] = &[
    "any",
    "bit-string",
    "bmp",
    "boolean",
    "date",
    "date-time",
    "duration",
    "enumerated",
    "general",
    "generalized-time",
    "graphic",
    "ia5",
    "integer",
    "null",
    "numeric",
    "octet-string",
    "oid",
    "printable",
    "real",
    "relative-oid",
    "t61",
    "time-of-day",
    "universal-string",
    "utc-time",
    "utf8",
    "visible",
];

/// An overlay of parsed field modifiers.
///
/// One `Options` exists per field per operation; children of a constructed
/// value receive a fresh overlay via [`Options::child`] carrying only the
/// inheritable subset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    /// Encoding rule selected by a `ber`/`cer`/`der` token, if any.
    pub rule: Option<EncodingRules>,
    /// Tag number override from `tag:N`.
    pub tag: Option<u32>,
    /// Class override from `application`/`context-specific`/`private`/`universal`.
    pub class: Option<Class>,
    /// Wrap the value in an additional constructed TLV carrying the
    /// overridden tag.
    pub explicit: bool,
    /// The field may be absent.
    pub optional: bool,
    /// Treat an empty value as absent.
    pub omit_empty: bool,
    /// Encode the constructed value as a SET.
    pub set: bool,
    /// Encode the constructed value as a SEQUENCE.
    pub sequence: bool,
    /// Request the indefinite length form (BER only).
    pub indefinite: bool,
    /// AUTOMATIC tagging is active for the enclosing component list.
    pub automatic: bool,
    /// This field is the `...` extension marker.
    pub extension: bool,
    /// Inline the fields of an embedded sub-sequence.
    pub components_of: bool,
    /// Field name used in diagnostics.
    pub identifier: Option<String>,
    /// Key into the CHOICE alternatives registry.
    pub choices: Option<String>,
    /// DEFAULT value for an OPTIONAL field.
    pub default_value: Option<DefaultSpec>,
    /// Keys into the WITH COMPONENTS registry.
    pub with_components: Vec<String>,
    /// Keys into the named constraint-group registry.
    pub constraints: Vec<String>,
    /// Adapter type keyword.
    pub keyword: Option<String>,
    pub(crate) depth: usize,
}

impl Options {
    /// Parses a comma-separated annotation string.
    ///
    /// Unknown tokens fail with [`OptionsErrorKind::UnidentifiedKeyword`];
    /// `set` and `sequence` together fail with
    /// [`OptionsErrorKind::ConflictingStructure`].
    pub fn parse(text: &str) -> Result<Self> {
        let mut options = Self::default();

        for token in text.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            options.apply_token(token)?;
        }

        if options.set && options.sequence {
            return Err(OptionsErrorKind::ConflictingStructure.into());
        }

        Ok(options)
    }

    fn apply_token(&mut self, token: &str) -> Result<()> {
        let lowered = token.to_ascii_lowercase();

        match lowered.as_str() {
            "..." => self.extension = true,
            "explicit" => self.explicit = true,
            "optional" => self.optional = true,
            "omitempty" => self.omit_empty = true,
            "set" => self.set = true,
            "sequence" => self.sequence = true,
            "automatic" => self.automatic = true,
            "indefinite" => self.indefinite = true,
            "components-of" => self.components_of = true,
            "universal" => self.class = Some(Class::Universal),
            "application" => self.class = Some(Class::Application),
            "context-specific" => self.class = Some(Class::Context),
            "private" => self.class = Some(Class::Private),
            "ber" => self.rule = Some(EncodingRules::Ber),
            "cer" => self.rule = Some(EncodingRules::Cer),
            "der" => self.rule = Some(EncodingRules::Der),
            _ => return self.apply_argument_token(token, &lowered),
        }

        Ok(())
    }

    fn apply_argument_token(&mut self, token: &str, lowered: &str) -> Result<()> {
        if let Some(rest) = lowered.strip_prefix("tag:") {
            let value = rest.parse::<u32>().map_err(|_| {
                Error::from(OptionsErrorKind::InvalidTagNumber {
                    text: intern(rest),
                })
            })?;
            self.tag = Some(value);
            return Ok(());
        }

        // `default::NAME` before `default:LITERAL`: the former is a prefix
        // of the latter.
        if let Some(name) = token.strip_prefix("default::") {
            Self::require_argument("default", name)?;
            self.default_value = Some(DefaultSpec::Named(name.to_ascii_lowercase()));
            return Ok(());
        }

        if let Some(literal) = token.strip_prefix("default:") {
            Self::require_argument("default", literal)?;
            self.default_value = Some(DefaultSpec::Literal(literal.to_owned()));
            return Ok(());
        }

        if let Some(name) = lowered.strip_prefix("constraint:") {
            Self::require_argument("constraint", name)?;
            self.constraints.push(name.to_owned());
            return Ok(());
        }

        if let Some(name) = lowered.strip_prefix("choices:") {
            Self::require_argument("choices", name)?;
            self.choices = Some(name.to_owned());
            return Ok(());
        }

        if let Some(name) = lowered.strip_prefix("with-components:") {
            Self::require_argument("with-components", name)?;
            self.with_components.push(name.to_owned());
            return Ok(());
        }

        if let Some(name) = token.strip_prefix("identifier:") {
            Self::require_argument("identifier", name)?;
            self.identifier = Some(name.to_owned());
            return Ok(());
        }

        if TYPE_KEYWORDS.contains(&lowered) {
            self.keyword = Some(lowered.to_owned());
            return Ok(());
        }

        Err(OptionsErrorKind::UnidentifiedKeyword {
            word: intern(token),
        }
        .into())
    }

    fn require_argument(word: &str, argument: &str) -> Result<()> {
        if argument.is_empty() {
            Err(OptionsErrorKind::MissingArgument {
                word: intern(word),
            }
            .into())
        } else {
            Ok(())
        }
    }

    /// A fresh overlay for a child field, inheriting only the subset that
    /// crosses constructed-value boundaries.
    pub fn child(&self) -> Self {
        Self {
            rule: self.rule,
            automatic: self.automatic,
            depth: self.depth + 1,
            ..Self::default()
        }
    }

    /// Whether any tag or class override is present.
    pub fn overrides_identifier(&self) -> bool {
        self.tag.is_some() || self.class.is_some()
    }

    /// The effective class override: an explicit class keyword, or
    /// context-specific whenever a bare `tag:N` is given.
    pub fn effective_class(&self) -> Option<Class> {
        match (self.class, self.tag) {
            (Some(class), _) => Some(class),
            (None, Some(_)) => Some(Class::Context),
            (None, None) => None,
        }
    }
}
